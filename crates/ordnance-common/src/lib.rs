//! # Ordnance Common
//!
//! Common types shared by the Ordnance projectile simulation.
//!
//! This crate provides:
//! - Generation-checked handles for objects and projectiles
//! - World coordinates, tile conversion and map bounds
//! - Whole-degree trigonometry for bit-reproducible math
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;
pub mod trig;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::trig::*;
}

pub use prelude::*;
