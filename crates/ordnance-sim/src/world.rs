//! Services the projectile simulation consumes from the surrounding game.
//!
//! The simulation never owns units, structures or features. It resolves
//! [`ObjectHandle`]s through [`ObjectQuery`] each time it needs them, so a
//! handle whose object died simply stops resolving.
//!
//! Everything the core needs from the outside world is grouped into small
//! traits and bundled by the [`World`] supertrait. [`crate::sandbox::SandboxWorld`]
//! provides an in-memory implementation.

use glam::IVec3;
use ordnance_common::{MapBounds, ObjectHandle, PlayerId};
use serde::{Deserialize, Serialize};

use crate::weapon::{WeaponClass, WeaponSubClass};

// ============================================================================
// Object model
// ============================================================================

/// Vertical extents of a model, in world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelExtents {
    /// Lowest point relative to the origin
    pub min_y: i32,
    /// Highest point relative to the origin
    pub max_y: i32,
    /// Bounding radius
    pub radius: i32,
}

impl ModelExtents {
    /// Creates extents.
    #[must_use]
    pub const fn new(min_y: i32, max_y: i32, radius: i32) -> Self {
        Self { min_y, max_y, radius }
    }

    /// Full height of the model.
    #[must_use]
    pub const fn height(self) -> i32 {
        self.max_y - self.min_y
    }

    /// Midpoint between top and bottom.
    #[must_use]
    pub const fn mid_height(self) -> i32 {
        (self.max_y + self.min_y) / 2
    }
}

/// What a unit is built to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitRole {
    /// Weapon turret
    #[default]
    Weapon,
    /// Sensor turret
    Sensor,
    /// Electronic countermeasures
    Ecm,
    /// Construction turret
    Construct,
    /// Repair turret
    Repair,
    /// Commander
    Command,
    /// Infantry
    Person,
    /// Cyborg
    Cyborg,
    /// Construction cyborg
    CyborgConstruct,
    /// Repair cyborg
    CyborgRepair,
    /// Heavy cyborg
    CyborgSuper,
    /// Transport
    Transporter,
    /// Anything without a turret
    Default,
}

/// Locomotion, used by the damage modifier table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropulsionKind {
    /// Wheels
    #[default]
    Wheeled,
    /// Half-tracks
    HalfTracked,
    /// Tracks
    Tracked,
    /// Hover
    Hover,
    /// Legs
    Legged,
    /// Aircraft
    Lift,
}

/// Armour class of a structure, used by the damage modifier table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureStrength {
    /// Walls and light defences
    Soft,
    /// Most buildings
    #[default]
    Medium,
    /// Fortified buildings
    Hard,
    /// Bunkers
    Bunker,
}

/// Mobile unit data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitInfo {
    /// Turret role
    pub role: UnitRole,
    /// Locomotion
    pub propulsion: PropulsionKind,
    /// Body model
    pub body: ModelExtents,
    /// Weapon or utility turret model
    pub turret: Option<ModelExtents>,
    /// Aircraft
    pub vtol: bool,
    /// Currently flying (only meaningful for aircraft)
    pub airborne: bool,
    /// Production cost
    pub power: u32,
    /// Score value
    pub points: u32,
}

impl UnitInfo {
    /// Creates a ground unit with the given body.
    #[must_use]
    pub fn new(role: UnitRole, body: ModelExtents) -> Self {
        Self {
            role,
            propulsion: PropulsionKind::Wheeled,
            body,
            turret: None,
            vtol: false,
            airborne: false,
            power: 100,
            points: 100,
        }
    }

    /// Sets the turret model.
    #[must_use]
    pub fn with_turret(mut self, turret: ModelExtents) -> Self {
        self.turret = Some(turret);
        self
    }

    /// Sets the locomotion.
    #[must_use]
    pub fn with_propulsion(mut self, propulsion: PropulsionKind) -> Self {
        self.propulsion = propulsion;
        self
    }

    /// Makes the unit an aircraft, optionally in flight.
    #[must_use]
    pub fn with_vtol(mut self, airborne: bool) -> Self {
        self.vtol = true;
        self.airborne = airborne;
        self.propulsion = PropulsionKind::Lift;
        self
    }

    /// Sets cost and score value.
    #[must_use]
    pub fn with_value(mut self, power: u32, points: u32) -> Self {
        self.power = power;
        self.points = points;
        self
    }

    /// Aircraft currently in flight.
    #[must_use]
    pub const fn is_flying(&self) -> bool {
        self.vtol && self.airborne
    }
}

/// Structure data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureInfo {
    /// Footprint width in tiles
    pub width: u32,
    /// Footprint breadth in tiles
    pub breadth: u32,
    /// Building model
    pub model: ModelExtents,
    /// Armour class
    pub strength: StructureStrength,
}

/// Terrain feature data (trees, wrecks, boulders).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInfo {
    /// Footprint width in tiles
    pub width: u32,
    /// Footprint breadth in tiles
    pub breadth: u32,
    /// Feature model
    pub model: ModelExtents,
    /// Whether weapons can damage it
    pub damageable: bool,
}

/// Category specific data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Mobile unit
    Unit(UnitInfo),
    /// Building
    Structure(StructureInfo),
    /// Terrain feature
    Feature(FeatureInfo),
}

/// A live game object as seen by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObject {
    /// Handle of this object
    pub handle: ObjectHandle,
    /// Owning player
    pub player: PlayerId,
    /// World position
    pub position: IVec3,
    /// Facing in degrees
    pub direction: i32,
    /// Category data
    pub kind: ObjectKind,
}

impl GameObject {
    /// Returns the unit data if this is a unit.
    #[must_use]
    pub const fn as_unit(&self) -> Option<&UnitInfo> {
        match &self.kind {
            ObjectKind::Unit(unit) => Some(unit),
            _ => None,
        }
    }

    /// Returns true for units.
    #[must_use]
    pub const fn is_unit(&self) -> bool {
        matches!(self.kind, ObjectKind::Unit(_))
    }

    /// Returns true for structures.
    #[must_use]
    pub const fn is_structure(&self) -> bool {
        matches!(self.kind, ObjectKind::Structure(_))
    }

    /// Returns true for terrain features.
    #[must_use]
    pub const fn is_feature(&self) -> bool {
        matches!(self.kind, ObjectKind::Feature(_))
    }

    /// Returns true for features weapons cannot damage.
    #[must_use]
    pub const fn is_indestructible_feature(&self) -> bool {
        matches!(&self.kind, ObjectKind::Feature(f) if !f.damageable)
    }

    /// Aircraft currently in flight.
    #[must_use]
    pub const fn is_flying(&self) -> bool {
        matches!(&self.kind, ObjectKind::Unit(u) if u.is_flying())
    }

    /// Aircraft, flying or landed.
    #[must_use]
    pub const fn is_vtol(&self) -> bool {
        matches!(&self.kind, ObjectKind::Unit(u) if u.vtol)
    }
}

/// Side of a target struck by a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitSide {
    /// Front
    Front,
    /// Rear
    Rear,
    /// Left flank
    Left,
    /// Right flank
    Right,
    /// From above
    Top,
    /// From below
    Bottom,
}

/// Terrain category of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainKind {
    /// Solid ground
    #[default]
    Land,
    /// Water
    Water,
    /// Impassable cliff
    Cliff,
}

// ============================================================================
// Services
// ============================================================================

/// Lookup of live objects.
pub trait ObjectQuery {
    /// Resolves a handle. Returns `None` once the object died or the slot was reused.
    fn object(&self, handle: ObjectHandle) -> Option<&GameObject>;

    /// Whether `observer` can currently see the object.
    fn visible_to(&self, handle: ObjectHandle, observer: PlayerId) -> bool;

    /// Returns true if the handle still resolves.
    fn is_alive(&self, handle: ObjectHandle) -> bool {
        self.object(handle).is_some()
    }
}

/// Spatial index over live objects.
pub trait SpatialIndex {
    /// Handles of live objects whose ground position lies within `range` of `center`.
    ///
    /// Results need not be exact or sorted but must come back in the same
    /// order for the same world state.
    fn objects_near(&self, center: IVec3, range: i32) -> Vec<ObjectHandle>;
}

/// Map and height queries.
pub trait Terrain {
    /// Playable map extent.
    fn map_bounds(&self) -> MapBounds;

    /// Ground height at a world position.
    fn height_at(&self, x: i32, y: i32) -> i32;

    /// Terrain category of a tile.
    fn terrain_at(&self, tile_x: i32, tile_y: i32) -> TerrainKind;

    /// Returns true if the ground position is on the map.
    fn on_map(&self, x: i32, y: i32) -> bool {
        self.map_bounds().contains(x, y)
    }
}

/// Player relations.
pub trait Alliances {
    /// Returns true when the two players are allied. A player is allied with itself.
    fn allied(&self, a: PlayerId, b: PlayerId) -> bool;
}

/// Damage application owned by the game.
pub trait DamageApplier {
    /// Applies damage and returns the fraction of original health removed.
    ///
    /// The result is positive when the target survived and negative when it
    /// was destroyed by this hit.
    fn apply_damage(
        &mut self,
        target: ObjectHandle,
        amount: u32,
        class: WeaponClass,
        sub_class: WeaponSubClass,
        side: HitSide,
    ) -> f32;

    /// Applies electronic warfare damage. Returns true if the target was captured.
    fn electronic_damage(&mut self, target: ObjectHandle, amount: u32, attacker: PlayerId) -> bool;
}

/// Hooks into unit and structure state owned by the game.
///
/// Every method has a do-nothing default so a world only implements the
/// ones it cares about.
pub trait UnitCommands {
    /// Muzzle position of a turret slot.
    fn muzzle_position(&self, _attacker: ObjectHandle, _slot: usize) -> Option<IVec3> {
        None
    }

    /// Points a turret at the launch pitch.
    fn set_turret_pitch(&mut self, _attacker: ObjectHandle, _slot: usize, _pitch: i32) {}

    /// Adds experience to a unit.
    fn add_experience(&mut self, _unit: ObjectHandle, _amount: f32) {}

    /// Drops the current order and action of a unit.
    fn clear_orders(&mut self, _unit: ObjectHandle) {}

    /// Drops the current target of a structure.
    fn clear_structure_target(&mut self, _structure: ObjectHandle) {}

    /// Sensor unit spotting for this unit.
    fn fire_support_sensor(&self, _unit: ObjectHandle) -> Option<ObjectHandle> {
        None
    }

    /// Commander this unit is assigned to.
    fn commander_of(&self, _unit: ObjectHandle) -> Option<ObjectHandle> {
        None
    }

    /// Commander designating targets for a player's structures, with its current target.
    fn designating_commander(&self, _player: PlayerId) -> Option<(ObjectHandle, Option<ObjectHandle>)> {
        None
    }

    /// An indirect shot was fired; counter-battery sensors may react.
    fn counter_battery_fire(&mut self, _attacker: ObjectHandle, _target: Option<ObjectHandle>) {}
}

/// Match statistics.
pub trait MatchStats {
    /// Whether this peer records statistics for `player`.
    fn responsible_for(&self, _player: PlayerId) -> bool {
        true
    }

    /// Damage dealt by one player to another.
    fn record_damage(&mut self, _attacker: PlayerId, _victim: PlayerId, _amount: u32) {}

    /// A kill credited to a player.
    fn record_kill(&mut self, _attacker: PlayerId, _victim: ObjectHandle) {}

    /// A shot fired at an object (`on_target`) or at open ground.
    fn record_shot(&mut self, _player: PlayerId, _on_target: bool) {}
}

/// Everything the simulation needs from the game.
pub trait World:
    ObjectQuery + SpatialIndex + Terrain + Alliances + DamageApplier + UnitCommands + MatchStats
{
}

impl<T> World for T where
    T: ObjectQuery + SpatialIndex + Terrain + Alliances + DamageApplier + UnitCommands + MatchStats
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_extents() {
        let body = ModelExtents::new(-4, 36, 20);
        assert_eq!(body.height(), 40);
        assert_eq!(body.mid_height(), 16);
    }

    #[test]
    fn test_object_classification() {
        let unit = GameObject {
            handle: ObjectHandle::new(0, 0),
            player: PlayerId::new(1),
            position: IVec3::ZERO,
            direction: 0,
            kind: ObjectKind::Unit(UnitInfo::new(UnitRole::Weapon, ModelExtents::default()).with_vtol(true)),
        };
        assert!(unit.is_unit());
        assert!(unit.is_vtol());
        assert!(unit.is_flying());
        assert!(!unit.is_indestructible_feature());

        let rock = GameObject {
            kind: ObjectKind::Feature(FeatureInfo {
                width: 1,
                breadth: 1,
                model: ModelExtents::default(),
                damageable: false,
            }),
            ..unit
        };
        assert!(rock.is_feature());
        assert!(rock.is_indestructible_feature());
        assert!(!rock.is_flying());
    }
}
