//! Error types shared across the Ordnance crates.

use crate::ids::{ObjectHandle, PlayerId, ProjectileId};
use thiserror::Error;

/// Top-level error type for Ordnance operations.
#[derive(Debug, Error)]
pub enum OrdnanceError {
    /// Launch rejected
    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    /// Consistency check failed
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a launch request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    /// Firing player outside the player range
    #[error("invalid firing {0}")]
    InvalidPlayer(PlayerId),

    /// Target object no longer exists
    #[error("target {0} is dead")]
    TargetDead(ObjectHandle),

    /// Attacking projectile no longer exists
    #[error("attacking projectile {0} is gone")]
    UnknownAttacker(ProjectileId),
}

/// A structural invariant that did not hold.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    /// Projectile owned by a player outside the player range
    #[error("{id}: owning {player} out of range")]
    InvalidPlayer {
        /// Offending projectile
        id: ProjectileId,
        /// Recorded player
        player: PlayerId,
    },

    /// Bearing outside 0..=360
    #[error("{id}: direction {direction} out of range")]
    InvalidDirection {
        /// Offending projectile
        id: ProjectileId,
        /// Recorded bearing
        direction: i32,
    },

    /// Death timestamp set on a projectile still expected to run
    #[error("{id}: already marked dead")]
    Dead {
        /// Offending projectile
        id: ProjectileId,
    },

    /// Referenced object owned by a player outside the player range
    #[error("{handle}: owning {player} out of range")]
    ObjectPlayer {
        /// Offending object
        handle: ObjectHandle,
        /// Recorded player
        player: PlayerId,
    },

    /// Referenced object positioned off the map
    #[error("{handle}: position ({x}, {y}) off map")]
    ObjectOffMap {
        /// Offending object
        handle: ObjectHandle,
        /// World x
        x: i32,
        /// World y
        y: i32,
    },
}

/// Result type alias for Ordnance operations.
pub type OrdnanceResult<T> = Result<T, OrdnanceError>;
