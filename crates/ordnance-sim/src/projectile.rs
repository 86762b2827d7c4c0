//! The projectile entity.

use std::sync::Arc;

use glam::{IVec2, IVec3};
use ordnance_common::{ObjectHandle, PlayerId, ProjectileId, WeaponId};
use serde::{Deserialize, Serialize};

use crate::config::GameTime;
use crate::weapon::WeaponStats;

/// Weak reference to something a projectile can hit or be fired by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectRef {
    /// A unit, structure or feature
    Object(ObjectHandle),
    /// Another projectile
    Projectile(ProjectileId),
}

impl ObjectRef {
    /// Returns the object handle, if this refers to a world object.
    #[must_use]
    pub const fn object(self) -> Option<ObjectHandle> {
        match self {
            Self::Object(handle) => Some(handle),
            Self::Projectile(_) => None,
        }
    }

    /// Returns the projectile id, if this refers to a projectile.
    #[must_use]
    pub const fn projectile(self) -> Option<ProjectileId> {
        match self {
            Self::Projectile(id) => Some(id),
            Self::Object(_) => None,
        }
    }
}

impl From<ObjectHandle> for ObjectRef {
    fn from(handle: ObjectHandle) -> Self {
        Self::Object(handle)
    }
}

impl From<ProjectileId> for ObjectRef {
    fn from(id: ProjectileId) -> Self {
        Self::Projectile(id)
    }
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProjectileState {
    /// Travelling towards the target.
    #[default]
    InFlight = 0,
    /// Struck something or missed; damage resolves on the next update.
    Impact = 1,
    /// Splash or fire still active.
    PostImpact = 2,
}

/// Flight integration chosen at launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FlightMode {
    /// Straight line from launch point.
    Direct = 0,
    /// Ballistic arc under gravity.
    Indirect = 1,
}

/// A projectile in the simulation.
#[derive(Debug, Clone)]
pub struct Projectile {
    /// Unique identifier.
    pub id: ProjectileId,
    /// Firing player.
    pub player: PlayerId,
    /// Weapon that fired it.
    pub weapon: Arc<WeaponStats>,
    /// Lifecycle state.
    pub state: ProjectileState,
    /// Flight integration, fixed at launch.
    pub flight: FlightMode,
    /// Current position.
    pub position: IVec3,
    /// Launch point on the ground plane.
    pub start: IVec2,
    /// Aim point on the ground plane.
    pub target: IVec2,
    /// Launch height.
    pub src_height: i32,
    /// Height difference from launch to aim point.
    pub alt_change: i32,
    /// Launch time; reset when the projectile enters post-impact.
    pub born: GameTime,
    /// Death time, 0 while alive.
    pub died: GameTime,
    /// Pitch in degrees, signed.
    pub pitch: i32,
    /// Bearing in degrees, 0..=360.
    pub direction: i32,
    /// Roll in degrees. Always 0.
    pub roll: i32,
    /// Horizontal launch speed (indirect only).
    pub v_xy: i32,
    /// Vertical launch speed (indirect only).
    pub v_z: i32,
    /// Seen by the local observer.
    pub visible: bool,
    /// Whatever fired it.
    pub source: Option<ObjectHandle>,
    /// Locked target, `None` for shots at a point or misses.
    pub destination: Option<ObjectRef>,
    /// Last thing this projectile directly damaged.
    pub damaged: Option<ObjectRef>,
}

impl Projectile {
    /// Returns true once a death time has been recorded.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.died != 0
    }

    /// Records the death time. Game time 0 is reserved for "alive".
    pub fn mark_dead(&mut self, now: GameTime) {
        self.died = now.max(1);
    }

    /// Game time elapsed since `born`.
    #[must_use]
    pub const fn age(&self, now: GameTime) -> GameTime {
        now.saturating_sub(self.born)
    }

    /// Captures the serializable state.
    #[must_use]
    pub fn snapshot(&self) -> ProjectileSnapshot {
        ProjectileSnapshot {
            id: self.id,
            player: self.player,
            weapon: self.weapon.id,
            state: self.state,
            flight: self.flight,
            position: self.position,
            target: self.target,
            born: self.born,
            died: self.died,
            pitch: self.pitch,
            direction: self.direction,
            v_xy: self.v_xy,
            v_z: self.v_z,
            source: self.source,
            destination: self.destination,
            damaged: self.damaged,
        }
    }
}

/// Serializable view of a projectile, used for replays and determinism checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    /// Unique identifier
    pub id: ProjectileId,
    /// Firing player
    pub player: PlayerId,
    /// Weapon id
    pub weapon: WeaponId,
    /// Lifecycle state
    pub state: ProjectileState,
    /// Flight integration
    pub flight: FlightMode,
    /// Current position
    pub position: IVec3,
    /// Aim point
    pub target: IVec2,
    /// Launch time
    pub born: GameTime,
    /// Death time
    pub died: GameTime,
    /// Pitch
    pub pitch: i32,
    /// Bearing
    pub direction: i32,
    /// Horizontal launch speed
    pub v_xy: i32,
    /// Vertical launch speed
    pub v_z: i32,
    /// Firer
    pub source: Option<ObjectHandle>,
    /// Locked target
    pub destination: Option<ObjectRef>,
    /// Last damaged
    pub damaged: Option<ObjectRef>,
}
