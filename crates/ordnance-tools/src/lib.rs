//! # Ordnance Tools
//!
//! Headless tooling around the projectile simulation.
//!
//! - [`scenario`]: TOML scenario files, a deterministic runner and JSON reports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod scenario;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::scenario::*;
}

pub use prelude::*;
