//! # Ordnance Sim
//!
//! Deterministic projectile simulation for a real-time strategy game.
//!
//! This crate provides:
//! - Weapon stats, modifier tables and research upgrades
//! - Direct and ballistic trajectory solving
//! - Neighbor queries and collision against objects and other projectiles
//! - Direct, splash and burn damage with kill and experience credit
//! - The [`Simulation`] lifecycle manager and its invariant checks
//! - A [`SandboxWorld`] implementing every world service for tools and tests
//!
//! The simulation never owns game objects. Units, structures and features are
//! reached through the traits in [`world`], passed into each call.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod collision;
pub mod config;
pub mod damage;
pub mod dice;
pub mod experience;
pub mod geometry;
pub mod neighbors;
pub mod presentation;
pub mod projectile;
pub mod sandbox;
pub mod simulation;
pub mod tables;
pub mod trajectory;
pub mod validation;
pub mod weapon;
pub mod world;


/// Prelude for convenient imports
pub mod prelude {
    pub use crate::collision::*;
    pub use crate::config::*;
    pub use crate::damage::*;
    pub use crate::dice::*;
    pub use crate::experience::*;
    pub use crate::geometry::*;
    pub use crate::neighbors::*;
    pub use crate::presentation::*;
    pub use crate::projectile::*;
    pub use crate::sandbox::*;
    pub use crate::simulation::*;
    pub use crate::tables::*;
    pub use crate::trajectory::*;
    pub use crate::validation::*;
    pub use crate::weapon::*;
    pub use crate::world::*;
}

pub use prelude::*;
