//! In-memory world for tests and headless runs.
//!
//! [`SandboxWorld`] implements every service trait in [`crate::world`] with
//! plain vectors and maps: flat terrain with optional water tiles, a linear
//! spatial scan, health pools and logs of every call the simulation makes.

use std::cell::Cell;

use ahash::{AHashMap, AHashSet};
use glam::IVec3;
use ordnance_common::{map_coord, planar_dist_sq, MapBounds, ObjectHandle, PlayerId, MAX_PLAYERS};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::weapon::{WeaponClass, WeaponSubClass};
use crate::world::{
    Alliances, DamageApplier, FeatureInfo, GameObject, HitSide, MatchStats, ModelExtents,
    ObjectKind, ObjectQuery, SpatialIndex, StructureInfo, StructureStrength, Terrain, TerrainKind,
    UnitCommands, UnitInfo, UnitRole,
};

/// Owner recorded on terrain features.
pub const FEATURE_PLAYER: PlayerId = PlayerId(MAX_PLAYERS);

/// Default health of units spawned by the shorthand constructors.
pub const UNIT_HEALTH: u32 = 100;
/// Default health of structures.
pub const STRUCTURE_HEALTH: u32 = 500;
/// Default health of features.
pub const FEATURE_HEALTH: u32 = 200;

/// One `apply_damage` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageRecord {
    /// Object hit
    pub target: ObjectHandle,
    /// Damage requested
    pub amount: u32,
    /// Weapon class
    pub class: WeaponClass,
    /// Weapon sub-class
    pub sub_class: WeaponSubClass,
    /// Side struck
    pub side: HitSide,
    /// Fraction returned to the caller
    pub relative: f32,
}

#[derive(Debug, Clone)]
struct Entry {
    object: GameObject,
    health: u32,
    max_health: u32,
    electronic: u32,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Calls recorded by the sandbox.
#[derive(Debug, Clone, Default)]
pub struct SandboxLog {
    /// Every damage application, in order
    pub damage: Vec<DamageRecord>,
    /// Experience per object
    pub experience: AHashMap<ObjectHandle, f32>,
    /// Kills credited to players
    pub kills: Vec<(PlayerId, ObjectHandle)>,
    /// Damage statistics between players
    pub damage_stats: Vec<(PlayerId, PlayerId, u32)>,
    /// Shots fired, with whether they had a target object
    pub shots: Vec<(PlayerId, bool)>,
    /// Turret pitch updates
    pub turret_pitch: Vec<(ObjectHandle, usize, i32)>,
    /// Units whose orders were cleared
    pub cleared_orders: Vec<ObjectHandle>,
    /// Structures whose target was cleared
    pub cleared_targets: Vec<ObjectHandle>,
    /// Counter-battery notifications
    pub counter_battery: Vec<(ObjectHandle, Option<ObjectHandle>)>,
}

/// In-memory implementation of [`crate::world::World`].
#[derive(Debug, Clone)]
pub struct SandboxWorld {
    bounds: MapBounds,
    ground: i32,
    slots: Vec<Slot>,
    free: Vec<u32>,
    water: AHashSet<(i32, i32)>,
    alliances: AHashSet<(PlayerId, PlayerId)>,
    hidden: AHashSet<(ObjectHandle, PlayerId)>,
    remote: AHashSet<PlayerId>,
    muzzles: AHashMap<ObjectHandle, IVec3>,
    commanders: AHashMap<ObjectHandle, ObjectHandle>,
    sensors: AHashMap<ObjectHandle, ObjectHandle>,
    designators: AHashMap<PlayerId, (ObjectHandle, Option<ObjectHandle>)>,
    spatial_queries: Cell<usize>,
    log: SandboxLog,
}

impl SandboxWorld {
    /// Creates an empty flat map.
    #[must_use]
    pub fn new(bounds: MapBounds) -> Self {
        Self {
            bounds,
            ground: 0,
            slots: Vec::new(),
            free: Vec::new(),
            water: AHashSet::new(),
            alliances: AHashSet::new(),
            hidden: AHashSet::new(),
            remote: AHashSet::new(),
            muzzles: AHashMap::new(),
            commanders: AHashMap::new(),
            sensors: AHashMap::new(),
            designators: AHashMap::new(),
            spatial_queries: Cell::new(0),
            log: SandboxLog::default(),
        }
    }

    /// Sets the ground height of the whole map.
    #[must_use]
    pub fn with_ground_height(mut self, height: i32) -> Self {
        self.ground = height;
        self
    }

    /// Marks a tile as water.
    pub fn set_water(&mut self, tile_x: i32, tile_y: i32) {
        self.water.insert((tile_x, tile_y));
    }

    /// Allies two players in both directions.
    pub fn ally(&mut self, a: PlayerId, b: PlayerId) {
        self.alliances.insert((a, b));
        self.alliances.insert((b, a));
    }

    /// Hands a player to another peer; its damage statistics are no longer recorded here.
    pub fn set_remote(&mut self, player: PlayerId) {
        self.remote.insert(player);
    }

    // ========================================================================
    // Spawning
    // ========================================================================

    /// Adds an object and returns its handle.
    pub fn spawn(&mut self, player: PlayerId, position: IVec3, kind: ObjectKind, health: u32) -> ObjectHandle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            },
        };
        let slot = &mut self.slots[index as usize];
        let handle = ObjectHandle::new(index, slot.generation);
        slot.entry = Some(Entry {
            object: GameObject { handle, player, position, direction: 0, kind },
            health: health.max(1),
            max_health: health.max(1),
            electronic: 0,
        });
        handle
    }

    /// Adds a unit.
    pub fn spawn_unit(&mut self, player: PlayerId, position: IVec3, unit: UnitInfo) -> ObjectHandle {
        self.spawn(player, position, ObjectKind::Unit(unit), UNIT_HEALTH)
    }

    /// Adds a medium tank with a weapon turret.
    pub fn spawn_tank(&mut self, player: PlayerId, position: IVec3) -> ObjectHandle {
        let unit = UnitInfo::new(UnitRole::Weapon, ModelExtents::new(0, 30, 25))
            .with_turret(ModelExtents::new(0, 20, 0));
        self.spawn_unit(player, position, unit)
    }

    /// Adds an aircraft, optionally in flight.
    pub fn spawn_vtol(&mut self, player: PlayerId, position: IVec3, airborne: bool) -> ObjectHandle {
        let unit = UnitInfo::new(UnitRole::Weapon, ModelExtents::new(0, 20, 30)).with_vtol(airborne);
        self.spawn_unit(player, position, unit)
    }

    /// Adds a square structure `size` tiles across.
    pub fn spawn_structure(&mut self, player: PlayerId, position: IVec3, size: u32) -> ObjectHandle {
        let info = StructureInfo {
            width: size,
            breadth: size,
            model: ModelExtents::new(0, 120, 0),
            strength: StructureStrength::Medium,
        };
        self.spawn(player, position, ObjectKind::Structure(info), STRUCTURE_HEALTH)
    }

    /// Adds a one-tile feature.
    pub fn spawn_feature(&mut self, position: IVec3, damageable: bool) -> ObjectHandle {
        let info = FeatureInfo { width: 1, breadth: 1, model: ModelExtents::new(0, 60, 0), damageable };
        self.spawn(FEATURE_PLAYER, position, ObjectKind::Feature(info), FEATURE_HEALTH)
    }

    /// Removes an object. Its handle stops resolving.
    pub fn destroy(&mut self, handle: ObjectHandle) {
        if let Some(slot) = self.slot_mut(handle) {
            slot.entry = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(handle.index());
            debug!("{handle} destroyed");
        }
    }

    // ========================================================================
    // Manipulation
    // ========================================================================

    /// Moves an object.
    pub fn move_to(&mut self, handle: ObjectHandle, position: IVec3) {
        if let Some(entry) = self.entry_mut(handle) {
            entry.object.position = position;
        }
    }

    /// Turns an object to face `direction` degrees.
    pub fn face(&mut self, handle: ObjectHandle, direction: i32) {
        if let Some(entry) = self.entry_mut(handle) {
            entry.object.direction = direction.rem_euclid(360);
        }
    }

    /// Overrides what `observer` can see. Everything is visible by default.
    pub fn set_visible(&mut self, handle: ObjectHandle, observer: PlayerId, visible: bool) {
        if visible {
            self.hidden.remove(&(handle, observer));
        } else {
            self.hidden.insert((handle, observer));
        }
    }

    /// Sets the muzzle position reported for every turret slot of `attacker`.
    pub fn set_muzzle(&mut self, attacker: ObjectHandle, position: IVec3) {
        self.muzzles.insert(attacker, position);
    }

    /// Assigns `unit` to a commander.
    pub fn set_commander(&mut self, unit: ObjectHandle, commander: ObjectHandle) {
        self.commanders.insert(unit, commander);
    }

    /// Links a fire-support sensor to `unit`.
    pub fn set_fire_support(&mut self, unit: ObjectHandle, sensor: ObjectHandle) {
        self.sensors.insert(unit, sensor);
    }

    /// Sets the commander designating targets for a player's structures.
    pub fn set_designator(&mut self, player: PlayerId, commander: ObjectHandle, target: Option<ObjectHandle>) {
        self.designators.insert(player, (commander, target));
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Remaining health, `None` once destroyed.
    #[must_use]
    pub fn health(&self, handle: ObjectHandle) -> Option<u32> {
        self.entry(handle).map(|e| e.health)
    }

    /// Live objects in slot order.
    pub fn objects(&self) -> impl Iterator<Item = &GameObject> {
        self.slots.iter().filter_map(|s| s.entry.as_ref()).map(|e| &e.object)
    }

    /// Number of live objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects().count()
    }

    /// Number of spatial queries served so far.
    #[must_use]
    pub fn spatial_queries(&self) -> usize {
        self.spatial_queries.get()
    }

    /// Experience gained by an object.
    #[must_use]
    pub fn experience(&self, handle: ObjectHandle) -> f32 {
        self.log.experience.get(&handle).copied().unwrap_or(0.0)
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn log(&self) -> &SandboxLog {
        &self.log
    }

    /// Total damage requested against `handle`.
    #[must_use]
    pub fn damage_taken(&self, handle: ObjectHandle) -> u32 {
        self.log.damage.iter().filter(|d| d.target == handle).map(|d| d.amount).sum()
    }

    fn slot_mut(&mut self, handle: ObjectHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|s| s.generation == handle.generation() && s.entry.is_some())
    }

    fn entry(&self, handle: ObjectHandle) -> Option<&Entry> {
        self.slots
            .get(handle.index() as usize)
            .filter(|s| s.generation == handle.generation())
            .and_then(|s| s.entry.as_ref())
    }

    fn entry_mut(&mut self, handle: ObjectHandle) -> Option<&mut Entry> {
        self.slot_mut(handle).and_then(|s| s.entry.as_mut())
    }
}

impl ObjectQuery for SandboxWorld {
    fn object(&self, handle: ObjectHandle) -> Option<&GameObject> {
        self.entry(handle).map(|e| &e.object)
    }

    fn visible_to(&self, handle: ObjectHandle, observer: PlayerId) -> bool {
        !self.hidden.contains(&(handle, observer))
    }
}

impl SpatialIndex for SandboxWorld {
    fn objects_near(&self, center: IVec3, range: i32) -> Vec<ObjectHandle> {
        self.spatial_queries.set(self.spatial_queries.get() + 1);
        let range_sq = i64::from(range) * i64::from(range);
        self.objects()
            .filter(|o| planar_dist_sq(center, o.position) <= range_sq)
            .map(|o| o.handle)
            .collect()
    }
}

impl Terrain for SandboxWorld {
    fn map_bounds(&self) -> MapBounds {
        self.bounds
    }

    fn height_at(&self, _x: i32, _y: i32) -> i32 {
        self.ground
    }

    fn terrain_at(&self, tile_x: i32, tile_y: i32) -> TerrainKind {
        if self.water.contains(&(tile_x, tile_y)) {
            TerrainKind::Water
        } else {
            TerrainKind::Land
        }
    }
}

impl Alliances for SandboxWorld {
    fn allied(&self, a: PlayerId, b: PlayerId) -> bool {
        (a == b && a.is_valid()) || self.alliances.contains(&(a, b))
    }
}

impl DamageApplier for SandboxWorld {
    fn apply_damage(
        &mut self,
        target: ObjectHandle,
        amount: u32,
        class: WeaponClass,
        sub_class: WeaponSubClass,
        side: HitSide,
    ) -> f32 {
        let Some(entry) = self.entry_mut(target) else {
            return 0.0;
        };
        let removed = amount.min(entry.health);
        entry.health -= removed;
        let fraction = removed as f32 / entry.max_health as f32;
        let destroyed = entry.health == 0;
        let relative = if destroyed { -fraction } else { fraction };

        self.log.damage.push(DamageRecord { target, amount, class, sub_class, side, relative });
        if destroyed {
            self.destroy(target);
        }
        relative
    }

    fn electronic_damage(&mut self, target: ObjectHandle, amount: u32, attacker: PlayerId) -> bool {
        let Some(entry) = self.entry_mut(target) else {
            return false;
        };
        entry.electronic = entry.electronic.saturating_add(amount);
        if entry.electronic >= entry.max_health {
            entry.electronic = 0;
            entry.object.player = attacker;
            debug!("{target} captured by {attacker}");
            return true;
        }
        false
    }
}

impl UnitCommands for SandboxWorld {
    fn muzzle_position(&self, attacker: ObjectHandle, _slot: usize) -> Option<IVec3> {
        self.muzzles.get(&attacker).copied()
    }

    fn set_turret_pitch(&mut self, attacker: ObjectHandle, slot: usize, pitch: i32) {
        self.log.turret_pitch.push((attacker, slot, pitch));
    }

    fn add_experience(&mut self, unit: ObjectHandle, amount: f32) {
        *self.log.experience.entry(unit).or_insert(0.0) += amount;
    }

    fn clear_orders(&mut self, unit: ObjectHandle) {
        self.log.cleared_orders.push(unit);
    }

    fn clear_structure_target(&mut self, structure: ObjectHandle) {
        self.log.cleared_targets.push(structure);
    }

    fn fire_support_sensor(&self, unit: ObjectHandle) -> Option<ObjectHandle> {
        self.sensors.get(&unit).copied()
    }

    fn commander_of(&self, unit: ObjectHandle) -> Option<ObjectHandle> {
        self.commanders.get(&unit).copied()
    }

    fn designating_commander(&self, player: PlayerId) -> Option<(ObjectHandle, Option<ObjectHandle>)> {
        self.designators.get(&player).copied()
    }

    fn counter_battery_fire(&mut self, attacker: ObjectHandle, target: Option<ObjectHandle>) {
        self.log.counter_battery.push((attacker, target));
    }
}

impl MatchStats for SandboxWorld {
    fn responsible_for(&self, player: PlayerId) -> bool {
        !self.remote.contains(&player)
    }

    fn record_damage(&mut self, attacker: PlayerId, victim: PlayerId, amount: u32) {
        self.log.damage_stats.push((attacker, victim, amount));
    }

    fn record_kill(&mut self, attacker: PlayerId, victim: ObjectHandle) {
        self.log.kills.push((attacker, victim));
    }

    fn record_shot(&mut self, player: PlayerId, on_target: bool) {
        self.log.shots.push((player, on_target));
    }
}

/// Tile under a world position.
#[must_use]
pub fn tile_of(position: IVec3) -> (i32, i32) {
    (map_coord(position.x), map_coord(position.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> SandboxWorld {
        SandboxWorld::new(MapBounds::new(16, 16))
    }

    #[test]
    fn test_handles_go_stale() {
        let mut world = world();
        let tank = world.spawn_tank(PlayerId::new(0), IVec3::new(100, 100, 0));
        assert!(world.is_alive(tank));

        world.destroy(tank);
        assert!(!world.is_alive(tank));

        // The slot is reused under a new generation.
        let other = world.spawn_tank(PlayerId::new(1), IVec3::new(100, 100, 0));
        assert_eq!(other.index(), tank.index());
        assert_ne!(other.generation(), tank.generation());
        assert!(world.object(tank).is_none());
        assert!(world.object(other).is_some());
    }

    #[test]
    fn test_damage_fraction_sign() {
        let mut world = world();
        let tank = world.spawn_tank(PlayerId::new(0), IVec3::ZERO);

        let hurt = world.apply_damage(tank, 40, WeaponClass::Kinetic, WeaponSubClass::Cannon, HitSide::Front);
        assert!((hurt - 0.4).abs() < f32::EPSILON);
        assert_eq!(world.health(tank), Some(60));

        let killed = world.apply_damage(tank, 80, WeaponClass::Kinetic, WeaponSubClass::Cannon, HitSide::Rear);
        assert!((killed + 0.6).abs() < 1e-6);
        assert_eq!(world.health(tank), None);
        assert_eq!(world.log().damage.len(), 2);
        assert_eq!(world.damage_taken(tank), 120);
    }

    #[test]
    fn test_spatial_scan() {
        let mut world = world();
        let near = world.spawn_tank(PlayerId::new(0), IVec3::new(100, 100, 0));
        world.spawn_tank(PlayerId::new(0), IVec3::new(900, 100, 0));
        assert_eq!(world.objects_near(IVec3::new(150, 100, 0), 100), vec![near]);
        assert_eq!(world.spatial_queries(), 1);
    }

    #[test]
    fn test_alliances_and_visibility() {
        let mut world = world();
        let a = PlayerId::new(0);
        let b = PlayerId::new(1);
        assert!(world.allied(a, a));
        assert!(!world.allied(a, b));
        world.ally(a, b);
        assert!(world.allied(b, a));
        assert!(!world.allied(FEATURE_PLAYER, FEATURE_PLAYER));

        let tank = world.spawn_tank(a, IVec3::ZERO);
        assert!(world.visible_to(tank, b));
        world.set_visible(tank, b, false);
        assert!(!world.visible_to(tank, b));
    }

    #[test]
    fn test_electronic_capture() {
        let mut world = world();
        let tank = world.spawn_tank(PlayerId::new(0), IVec3::ZERO);
        assert!(!world.electronic_damage(tank, 60, PlayerId::new(2)));
        assert!(world.electronic_damage(tank, 60, PlayerId::new(2)));
        assert_eq!(world.object(tank).map(|o| o.player), Some(PlayerId::new(2)));
    }

    #[test]
    fn test_water_tiles() {
        let mut world = world();
        world.set_water(2, 3);
        assert_eq!(world.terrain_at(2, 3), TerrainKind::Water);
        assert_eq!(world.terrain_at(3, 2), TerrainKind::Land);
        assert_eq!(tile_of(IVec3::new(300, 400, 0)), (2, 3));
    }
}
