//! ID types for game objects, projectiles, players and weapons.
//!
//! Object and projectile handles are generation-checked: a handle keeps
//! the slot index it was issued for plus the slot generation at that time.
//! Once the slot is released and reused the generation moves on and the old
//! handle stops resolving.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of players in a match.
pub const MAX_PLAYERS: u8 = 8;

/// Generation-checked reference to a unit, structure or feature owned by the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

impl ObjectHandle {
    /// Creates a handle from a slot index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation the handle was issued for.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}v{}", self.index, self.generation)
    }
}

/// Generation-checked reference to a projectile owned by the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectileId {
    index: u32,
    generation: u32,
}

impl ProjectileId {
    /// Creates an id from a slot index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation the id was issued for.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ProjectileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proj#{}v{}", self.index, self.generation)
    }
}

/// Player slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// Creates a player id.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Returns the raw slot number.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Checks the slot is below [`MAX_PLAYERS`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 < MAX_PLAYERS
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.0)
    }
}

/// Identifier for a weapon stat entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeaponId(pub u32);

impl WeaponId {
    /// Creates a weapon id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_differ_by_generation() {
        let a = ObjectHandle::new(3, 1);
        let b = ObjectHandle::new(3, 2);
        assert_ne!(a, b);
        assert_eq!(a.index(), b.index());
    }

    #[test]
    fn test_player_validity() {
        assert!(PlayerId::new(0).is_valid());
        assert!(PlayerId::new(MAX_PLAYERS - 1).is_valid());
        assert!(!PlayerId::new(MAX_PLAYERS).is_valid());
    }

    #[test]
    fn test_display() {
        assert_eq!(ProjectileId::new(4, 9).to_string(), "proj#4v9");
        assert_eq!(PlayerId::new(2).to_string(), "player 2");
    }
}
