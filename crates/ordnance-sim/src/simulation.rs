//! Projectile lifecycle manager.
//!
//! [`Simulation`] owns every projectile in a generation-checked arena and
//! drives them through in-flight, impact and post-impact once per tick:
//!
//! - `launch` solves the trajectory and inserts at the front of the update order
//! - `update_all` advances game time, heals stale references, moves, collides,
//!   resolves damage and finally sweeps the dead
//! - iteration and snapshots give read-only views for rendering and replays
//!
//! The world is passed into each call rather than stored, so the simulation
//! never holds a reference into game state between ticks.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use glam::{IVec2, IVec3};
use ordnance_common::{
    map_coord, InvariantViolation, LaunchError, ObjectHandle, OrdnanceError, OrdnanceResult,
    PlayerId, ProjectileId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::collision::{find_hit, penetration_aim};
use crate::config::{GameTime, SimConfig};
use crate::damage::{apply_burn, apply_splash, resolve_direct_hit, BurnLedger, DamageContext, DirectHit};
use crate::dice::{HitDice, SeededDice};
use crate::geometry::{gfx_visible, target_height};
use crate::neighbors::{Neighbor, NeighborCache};
use crate::presentation::{AudioCue, ExplosionGraphic, NullSink, PresentationEvent, PresentationSink, TrailKind};
use crate::projectile::{FlightMode, ObjectRef, Projectile, ProjectileSnapshot, ProjectileState};
use crate::tables::CombatTables;
use crate::trajectory::{direct_step, indirect_pitch, indirect_step, solve_launch, FlightStep};
use crate::validation::{check_projectile, ValidationReport, CHECK_DEPTH};
use crate::weapon::{MovementModel, WeaponStats, WeaponSubClass};
use crate::world::{GameObject, ObjectQuery, SpatialIndex, Terrain, TerrainKind, World};

/// How far past its aim point a ballistic shell may travel.
const INDIRECT_EXTENSION: f32 = 1.2;

/// Mixed into the seed of the cosmetic generator.
const COSMETIC_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

// ============================================================================
// Launch requests
// ============================================================================

/// What fired a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attacker {
    /// A unit or structure
    Object(ObjectHandle),
    /// A projectile continuing after penetrating its target
    Projectile(ProjectileId),
}

/// A request to fire one projectile.
#[derive(Debug, Clone)]
pub struct Shot {
    /// Weapon being fired
    pub weapon: Arc<WeaponStats>,
    /// Firer, if any
    pub attacker: Option<Attacker>,
    /// Firing player
    pub player: PlayerId,
    /// Aim point
    pub target: IVec3,
    /// Object aimed at, if any
    pub target_object: Option<ObjectHandle>,
    /// Treat the shot as visible to the local observer
    pub force_visible: bool,
    /// Turret slot on the attacker
    pub turret_slot: Option<usize>,
}

impl Shot {
    /// A shot at a ground point with no attacker.
    #[must_use]
    pub fn new(weapon: Arc<WeaponStats>, player: PlayerId, target: IVec3) -> Self {
        Self {
            weapon,
            attacker: None,
            player,
            target,
            target_object: None,
            force_visible: false,
            turret_slot: None,
        }
    }

    /// Fired by a unit or structure from a turret slot.
    #[must_use]
    pub fn from_object(mut self, attacker: ObjectHandle, slot: usize) -> Self {
        self.attacker = Some(Attacker::Object(attacker));
        self.turret_slot = Some(slot);
        self
    }

    /// Sets the attacker without a turret slot.
    #[must_use]
    pub fn with_attacker(mut self, attacker: Attacker) -> Self {
        self.attacker = Some(attacker);
        self
    }

    /// Locks onto an object.
    #[must_use]
    pub fn at_object(mut self, target: ObjectHandle) -> Self {
        self.target_object = Some(target);
        self
    }

    /// Forces the shot visible.
    #[must_use]
    pub fn visible(mut self) -> Self {
        self.force_visible = true;
        self
    }
}

/// Where a new projectile starts and what it inherits.
#[derive(Debug, Clone, Copy)]
struct Lineage {
    muzzle: IVec3,
    born: GameTime,
    source: Option<ObjectHandle>,
    damaged: Option<ObjectRef>,
    shooter: Option<ObjectHandle>,
}

impl Lineage {
    fn at(point: IVec3, now: GameTime) -> Self {
        Self { muzzle: point, born: now, source: None, damaged: None, shooter: None }
    }

    /// A continuation lives no longer than its parent could have.
    fn inherit(parent: &Projectile) -> Self {
        Self {
            muzzle: parent.position,
            born: parent.born,
            source: parent.source,
            damaged: parent.damaged,
            shooter: None,
        }
    }
}

// ============================================================================
// Arena
// ============================================================================

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    projectile: Option<Projectile>,
}

fn lookup(slots: &[Slot], id: ProjectileId) -> Option<&Projectile> {
    slots
        .get(id.index() as usize)
        .filter(|s| s.generation == id.generation())
        .and_then(|s| s.projectile.as_ref())
}

fn lookup_mut(slots: &mut [Slot], id: ProjectileId) -> Option<&mut Projectile> {
    slots
        .get_mut(id.index() as usize)
        .filter(|s| s.generation == id.generation())
        .and_then(|s| s.projectile.as_mut())
}

/// Serializable state of the whole simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    /// Game time of the snapshot
    pub game_time: GameTime,
    /// Live projectiles in update order
    pub projectiles: Vec<ProjectileSnapshot>,
}

// ============================================================================
// Simulation
// ============================================================================

/// Owns and updates every projectile.
pub struct Simulation {
    config: SimConfig,
    game_time: GameTime,
    slots: Vec<Slot>,
    free: Vec<u32>,
    order: VecDeque<ProjectileId>,
    cursor: usize,
    neighbors: NeighborCache,
    burns: BurnLedger,
    tables: CombatTables,
    dice: Box<dyn HitDice>,
    sink: Box<dyn PresentationSink>,
    cosmetic: fastrand::Rng,
    last_attacker: Option<ObjectHandle>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("game_time", &self.game_time)
            .field("projectiles", &self.order.len())
            .field("burning", &self.burns.len())
            .field("last_attacker", &self.last_attacker)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Creates an empty simulation.
    #[must_use]
    pub fn new(mut config: SimConfig) -> Self {
        config.validate();
        info!(
            "Projectile simulation ready (tick {}ms, seed {}, multiplayer {})",
            config.tick_ms, config.rng_seed, config.multiplayer
        );
        Self {
            game_time: 0,
            slots: Vec::new(),
            free: Vec::new(),
            order: VecDeque::new(),
            cursor: 0,
            neighbors: NeighborCache::new(config.neighbor_range, config.max_neighbors),
            burns: BurnLedger::new(),
            tables: CombatTables::new(),
            dice: Box::new(SeededDice::new(config.rng_seed)),
            sink: Box::new(NullSink),
            cosmetic: fastrand::Rng::with_seed(config.rng_seed ^ COSMETIC_SALT),
            last_attacker: None,
            config,
        }
    }

    /// Replaces the simulation dice.
    #[must_use]
    pub fn with_dice(mut self, dice: impl HitDice + 'static) -> Self {
        self.dice = Box::new(dice);
        self
    }

    /// Routes presentation events to `sink`.
    #[must_use]
    pub fn with_presentation(mut self, sink: impl PresentationSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Sets upgrade and modifier tables.
    #[must_use]
    pub fn with_tables(mut self, tables: CombatTables) -> Self {
        self.tables = tables;
        self
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current game time.
    #[must_use]
    pub fn game_time(&self) -> GameTime {
        self.game_time
    }

    /// Objects currently burning.
    #[must_use]
    pub fn burns(&self) -> &BurnLedger {
        &self.burns
    }

    /// Source of the most recent impact or burn, if it still existed then.
    #[must_use]
    pub fn last_attacker(&self) -> Option<ObjectHandle> {
        self.last_attacker
    }

    // ========================================================================
    // Launch
    // ========================================================================

    /// Fires a projectile.
    pub fn launch<W: World + ?Sized>(&mut self, world: &mut W, shot: Shot) -> Result<ProjectileId, LaunchError> {
        if !shot.player.is_valid() {
            return Err(LaunchError::InvalidPlayer(shot.player));
        }
        let target_object = match shot.target_object {
            Some(handle) => Some(world.object(handle).cloned().ok_or(LaunchError::TargetDead(handle))?),
            None => None,
        };

        let now = self.game_time;
        let lineage = match shot.attacker {
            None => Lineage::at(shot.target, now),
            Some(Attacker::Object(handle)) => match world.object(handle) {
                Some(attacker) => Lineage {
                    muzzle: shot
                        .turret_slot
                        .and_then(|slot| world.muzzle_position(handle, slot))
                        .unwrap_or(attacker.position),
                    born: now,
                    source: Some(handle),
                    damaged: None,
                    shooter: Some(handle),
                },
                None => {
                    debug!("{handle} is gone, firing from the target point");
                    Lineage::at(shot.target, now)
                },
            },
            Some(Attacker::Projectile(id)) => {
                let parent = lookup(&self.slots, id).ok_or(LaunchError::UnknownAttacker(id))?;
                Lineage::inherit(parent)
            },
        };

        Ok(self.spawn(
            world,
            &shot.weapon,
            lineage,
            shot.player,
            shot.target,
            target_object,
            shot.force_visible,
            shot.turret_slot,
        ))
    }

    fn allocate(&mut self) -> ProjectileId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            },
        };
        ProjectileId::new(index, self.slots[index as usize].generation)
    }

    fn spawn<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        weapon: &Arc<WeaponStats>,
        lineage: Lineage,
        player: PlayerId,
        target: IVec3,
        target_object: Option<GameObject>,
        force_visible: bool,
        turret_slot: Option<usize>,
    ) -> ProjectileId {
        let id = self.allocate();

        let aim_height = match &target_object {
            Some(object) => {
                world.record_shot(player, true);
                let variance = self.dice.roll(target_height(object).max(0) as u32);
                object.position.z + variance as i32
            },
            None => {
                world.record_shot(player, false);
                target.z
            },
        };

        let aim = IVec3::new(target.x, target.y, aim_height);
        let solution = solve_launch(weapon, lineage.muzzle, aim, self.config.gravity, self.config.max_pitch);
        if solution.capped {
            debug!("{id}: {} out of reach at nominal speed, pitch capped", weapon.name);
        }
        if solution.flight == FlightMode::Indirect {
            if let (Some(shooter), Some(slot)) = (lineage.shooter, turret_slot) {
                world.set_turret_pitch(shooter, slot, solution.pitch);
            }
        }

        let mut proj = Projectile {
            id,
            player,
            weapon: Arc::clone(weapon),
            state: ProjectileState::InFlight,
            flight: solution.flight,
            position: lineage.muzzle,
            start: lineage.muzzle.truncate(),
            target: IVec2::new(target.x, target.y),
            src_height: lineage.muzzle.z,
            alt_change: aim_height - lineage.muzzle.z,
            born: lineage.born,
            died: 0,
            pitch: solution.pitch,
            direction: solution.direction,
            roll: 0,
            v_xy: solution.v_xy,
            v_z: solution.v_z,
            visible: false,
            source: lineage.source,
            destination: target_object.as_ref().map(|o| ObjectRef::Object(o.handle)),
            damaged: lineage.damaged,
        };

        if force_visible || gfx_visible(&proj, &*world, self.config.selected_player) {
            proj.visible = true;
            self.fire_cues(&proj);
        }

        if !weapon.is_direct_fire() {
            if let Some(shooter) = lineage.shooter {
                world.counter_battery_fire(shooter, target_object.as_ref().map(|o| o.handle));
            }
        }

        debug!(
            "{id} launched by {player}: {} {:?} pitch {} bearing {}",
            weapon.name, solution.flight, solution.pitch, solution.direction
        );
        self.slots[id.index() as usize].projectile = Some(proj);
        self.order.push_front(id);
        id
    }

    fn fire_cues(&mut self, proj: &Projectile) {
        let weapon = &proj.weapon;
        let Some(cue) = weapon.fire_audio else { return };

        if let Some(source) = proj.source {
            self.sink.notify(PresentationEvent::TrackedAudio {
                cue: AudioCue::Weapon(cue),
                follow: ObjectRef::Object(source),
            });
            if weapon.sub_class == WeaponSubClass::Howitzer {
                self.sink.notify(PresentationEvent::TrackedAudio {
                    cue: AudioCue::HowitzerFlight,
                    follow: ObjectRef::Projectile(proj.id),
                });
            }
        } else if !(self.config.multiplayer && weapon.sub_class == WeaponSubClass::LasSat) {
            self.sink.notify(PresentationEvent::TrackedAudio {
                cue: AudioCue::Weapon(cue),
                follow: ObjectRef::Projectile(proj.id),
            });
        }
    }

    // ========================================================================
    // Update pass
    // ========================================================================

    /// Advances game time by one tick and updates every projectile.
    pub fn update_all<W: World + ?Sized>(&mut self, world: &mut W) {
        self.game_time = self.game_time.saturating_add(self.config.tick_ms);
        let now = self.game_time;

        let ids: Vec<ProjectileId> = self.order.iter().copied().collect();
        for id in ids {
            let Some(mut proj) = self.take(id) else { continue };
            if !proj.is_dead() {
                self.check(&*world, &proj);
                self.update(world, &mut proj, now);
            }
            self.slots[id.index() as usize].projectile = Some(proj);
        }

        self.burns.prune();
        self.sweep();
    }

    /// Removes a projectile from its slot for the duration of its update.
    fn take(&mut self, id: ProjectileId) -> Option<Projectile> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.projectile.take())
    }

    fn update<W: World + ?Sized>(&mut self, world: &mut W, proj: &mut Projectile, now: GameTime) {
        self.heal_references(&*world, proj);

        if !world.on_map(proj.position.x, proj.position.y) {
            debug!("{} outside the map, removed", proj.id);
            proj.mark_dead(now);
            return;
        }

        let slots = &self.slots;
        let others = slots
            .iter()
            .filter_map(|s| s.projectile.as_ref())
            .filter(|p| p.id != proj.id && !p.is_dead())
            .map(|p| (p.id, p.position));
        self.neighbors.refresh(proj.id, now, proj.position, &*world, others);

        match (proj.state, proj.flight) {
            (ProjectileState::InFlight, FlightMode::Direct) => self.fly_direct(world, proj, now),
            (ProjectileState::InFlight, FlightMode::Indirect) => self.fly_indirect(world, proj, now),
            (ProjectileState::Impact, _) => self.impact(world, proj, now),
            (ProjectileState::PostImpact, _) => self.post_impact(world, proj, now),
        }
    }

    fn resolves<W: ObjectQuery + ?Sized>(&self, world: &W, target: ObjectRef) -> bool {
        match target {
            ObjectRef::Object(handle) => world.is_alive(handle),
            ObjectRef::Projectile(id) => lookup(&self.slots, id).is_some_and(|p| !p.is_dead()),
        }
    }

    fn position_of<W: ObjectQuery + ?Sized>(&self, world: &W, target: ObjectRef) -> Option<IVec3> {
        match target {
            ObjectRef::Object(handle) => world.object(handle).map(|o| o.position),
            ObjectRef::Projectile(id) => lookup(&self.slots, id).map(|p| p.position),
        }
    }

    fn heal_references<W: ObjectQuery + ?Sized>(&self, world: &W, proj: &mut Projectile) {
        if proj.source.is_some_and(|h| !world.is_alive(h)) {
            proj.source = None;
        }
        if proj.destination.is_some_and(|r| !self.resolves(world, r)) {
            proj.destination = None;
        }
        if proj.damaged.is_some_and(|r| !self.resolves(world, r)) {
            proj.damaged = None;
        }
    }

    fn fly_direct<W: World + ?Sized>(&mut self, world: &mut W, proj: &mut Projectile, now: GameTime) {
        let weapon = Arc::clone(&proj.weapon);
        let elapsed = proj.age(now);

        if self.config.multiplayer
            && weapon.sub_class == WeaponSubClass::LasSat
            && elapsed < self.config.las_sat_delay()
        {
            return;
        }

        let homing = if weapon.movement == MovementModel::HomingDirect {
            proj.destination.and_then(|r| self.position_of(&*world, r))
        } else {
            None
        };
        let movement = match homing {
            Some(at) => IVec3::new(at.x - proj.start.x, at.y - proj.start.y, at.z - proj.src_height),
            None => {
                let rise = if weapon.sub_class == WeaponSubClass::LasSat { 0 } else { proj.alt_change };
                IVec3::new(proj.target.x - proj.start.x, proj.target.y - proj.start.y, rise)
            },
        };

        let step = direct_step(proj.start, proj.src_height, movement, weapon.flight_speed, elapsed);
        if self.move_to(&*world, proj, &step) {
            self.resolve_flight(world, proj, &step, weapon.sub_class.range_extension_factor());
        }
    }

    fn fly_indirect<W: World + ?Sized>(&mut self, world: &mut W, proj: &mut Projectile, now: GameTime) {
        let elapsed = proj.age(now);
        let gravity = self.config.gravity;
        let step = indirect_step(proj.start, proj.src_height, proj.target, proj.v_xy, proj.v_z, gravity, elapsed);
        if self.move_to(&*world, proj, &step) {
            proj.pitch = indirect_pitch(proj.v_xy, proj.v_z, gravity, elapsed);
            self.resolve_flight(world, proj, &step, INDIRECT_EXTENSION);
        }
    }

    /// Applies a flight step. A step off the map turns into a miss at the
    /// current position and returns false.
    fn move_to<W: Terrain + ?Sized>(&self, world: &W, proj: &mut Projectile, step: &FlightStep) -> bool {
        if !world.on_map(step.position.x, step.position.y) {
            debug!("{} about to leave the map at {}", proj.id, step.position);
            proj.state = ProjectileState::Impact;
            proj.target = proj.position.truncate();
            proj.destination = None;
            return false;
        }
        proj.position = step.position;
        true
    }

    fn resolve_flight<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        proj: &mut Projectile,
        step: &FlightStep,
        factor: f32,
    ) {
        let slots = &self.slots;
        if let Some(hit) = find_hit(proj, self.neighbors.entries(), &*world, |id| lookup(slots, id)) {
            self.register_hit(world, proj, hit, step.movement, factor);
            return;
        }

        let ground = world.height_at(proj.position.x, proj.position.y);
        if step.ratio > factor || proj.position.z < ground {
            trace!("{} missed at {}", proj.id, proj.position);
            proj.state = ProjectileState::Impact;
            proj.destination = None;
            return;
        }

        if gfx_visible(proj, &*world, self.config.selected_player) {
            self.trail(proj, step.percent);
        }
    }

    fn register_hit<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        proj: &mut Projectile,
        hit: ObjectRef,
        movement: IVec3,
        factor: f32,
    ) {
        trace!("{} hit {hit:?}", proj.id);
        proj.destination = Some(hit);

        if let ObjectRef::Object(handle) = hit {
            if proj.weapon.penetrate && world.object(handle).is_some_and(GameObject::is_unit) {
                let aim = penetration_aim(proj.start, proj.src_height, movement, factor, world.map_bounds());
                proj.damaged = Some(hit);
                let weapon = Arc::clone(&proj.weapon);
                let child = self.spawn(world, &weapon, Lineage::inherit(proj), proj.player, aim, None, true, None);
                debug!("{} penetrated {handle}, continuing as {child}", proj.id);
            }
        }

        proj.state = ProjectileState::Impact;
    }

    fn trail(&mut self, proj: &Projectile, percent: u32) {
        let at = proj.position;
        let trail = match proj.weapon.sub_class {
            WeaponSubClass::Flame => Some((TrailKind::Flame, at.z - 8, percent)),
            WeaponSubClass::Command | WeaponSubClass::Electronic | WeaponSubClass::Emp => {
                Some((TrailKind::Laser, at.z - 8, percent / 2))
            },
            sub_class if sub_class.is_missile() => Some((TrailKind::Smoke, at.z + 8, percent)),
            _ if !proj.weapon.is_direct_fire() => Some((TrailKind::Smoke, at.z + 4, percent)),
            _ => None,
        };
        if let Some((kind, z, progress)) = trail {
            self.sink.notify(PresentationEvent::Trail {
                kind,
                position: IVec3::new(at.x, at.y, z),
                progress,
            });
        }
    }

    // ========================================================================
    // Impact
    // ========================================================================

    fn impact<W: World + ?Sized>(&mut self, world: &mut W, proj: &mut Projectile, now: GameTime) {
        let weapon = Arc::clone(&proj.weapon);
        self.last_attacker = proj.source;

        let visible = gfx_visible(proj, &*world, self.config.selected_player);
        if visible {
            self.impact_cues(&*world, proj);
        }

        match proj.destination {
            None => {
                trace!("{} struck the ground at {}", proj.id, proj.position);
                if visible {
                    let tile = (map_coord(proj.position.x), map_coord(proj.position.y));
                    let graphic = if world.terrain_at(tile.0, tile.1) == TerrainKind::Water {
                        ExplosionGraphic::Water
                    } else {
                        ExplosionGraphic::Miss
                    };
                    self.explosion(proj, graphic);
                    if weapon.surface_to_air.is_air_only() {
                        self.smoke(proj);
                    }
                }
            },
            Some(ObjectRef::Projectile(other)) => {
                if visible {
                    self.explosion(proj, ExplosionGraphic::Hit);
                }
                if let Some(target) = lookup_mut(&mut self.slots, other) {
                    if !target.is_dead() {
                        target.mark_dead(now);
                        debug!("{} intercepted {other}", proj.id);
                    }
                }
            },
            Some(dest @ ObjectRef::Object(handle)) => {
                let ctx = DamageContext { tables: &self.tables, multiplayer: self.config.multiplayer };
                match resolve_direct_hit(world, ctx, proj, handle) {
                    DirectHit::Indestructible => {
                        proj.mark_dead(now);
                        return;
                    },
                    DirectHit::Damaged(relative) if relative >= 0.0 => proj.damaged = Some(dest),
                    _ => {},
                }
                if visible {
                    if weapon.surface_to_air.is_air_only() && weapon.sub_class == WeaponSubClass::AaGun {
                        self.smoke(proj);
                        self.explosion(proj, ExplosionGraphic::Miss);
                    } else {
                        self.explosion(proj, ExplosionGraphic::Hit);
                    }
                }
            },
        }

        if weapon.radius == 0 && weapon.incen_time == 0 {
            proj.mark_dead(now);
            return;
        }

        if weapon.radius != 0 {
            proj.state = ProjectileState::PostImpact;
            proj.born = now;
            let ctx = DamageContext { tables: &self.tables, multiplayer: self.config.multiplayer };
            apply_splash(world, ctx, self.dice.as_mut(), proj);
        }

        if weapon.incen_time != 0 {
            proj.state = ProjectileState::PostImpact;
            proj.born = now;
        }
    }

    fn impact_cues<W: World + ?Sized>(&mut self, world: &W, proj: &Projectile) {
        let weapon = &proj.weapon;
        let ground_target = IVec3::new(
            proj.target.x,
            proj.target.y,
            world.height_at(proj.target.x, proj.target.y),
        );
        let struck = proj.destination.and_then(|r| self.position_of(world, r));

        match weapon.impact_audio {
            Some(cue) => self.sink.notify(PresentationEvent::PositionalAudio {
                cue: AudioCue::Weapon(cue),
                position: struck.unwrap_or(ground_target),
            }),
            None => {
                if let Some(position) = struck.filter(|_| weapon.sub_class == WeaponSubClass::MachineGun) {
                    if self.cosmetic.u8(0..3) == 0 {
                        let variant = self.cosmetic.u8(0..3);
                        self.sink.notify(PresentationEvent::PositionalAudio {
                            cue: AudioCue::Ricochet(variant),
                            position,
                        });
                    }
                }
            },
        }

        if weapon.incen_radius > 0 && weapon.incen_time > 0 {
            self.sink.notify(PresentationEvent::Fire {
                position: ground_target,
                radius: weapon.incen_radius,
                duration: weapon.incen_time,
            });
        }

        if weapon.sub_class == WeaponSubClass::LasSat {
            self.sink.notify(PresentationEvent::SatelliteBeam { position: ground_target });
            if world.on_map(ground_target.x, ground_target.y) {
                self.sink.notify(PresentationEvent::ScreenShake);
            }
        }
    }

    fn explosion(&mut self, proj: &Projectile, graphic: ExplosionGraphic) {
        self.sink.notify(PresentationEvent::Explosion {
            position: proj.position,
            scatter: proj.weapon.radius,
            graphic,
            face_player: proj.weapon.face_player,
        });
    }

    fn smoke(&mut self, proj: &Projectile) {
        self.sink.notify(PresentationEvent::Smoke { position: proj.position, scatter: proj.weapon.radius });
    }

    fn post_impact<W: World + ?Sized>(&mut self, world: &mut W, proj: &mut Projectile, now: GameTime) {
        let weapon = Arc::clone(&proj.weapon);
        let age = proj.age(now);

        if age > weapon.radius_life && age > weapon.incen_time {
            trace!("{} effects finished", proj.id);
            proj.mark_dead(now);
            return;
        }

        if weapon.incen_time > 0 {
            self.last_attacker = proj.source;
            let ctx = DamageContext { tables: &self.tables, multiplayer: self.config.multiplayer };
            apply_burn(world, ctx, &mut self.burns, proj, now);
        }
    }

    fn sweep(&mut self) {
        let slots = &mut self.slots;
        let free = &mut self.free;
        let before = self.order.len();

        self.order.retain(|id| {
            let Some(slot) = slots.get_mut(id.index() as usize) else { return false };
            if slot.generation != id.generation() {
                return false;
            }
            if slot.projectile.as_ref().is_some_and(|p| !p.is_dead()) {
                return true;
            }
            slot.projectile = None;
            slot.generation = slot.generation.wrapping_add(1);
            free.push(id.index());
            false
        });

        let swept = before - self.order.len();
        if swept > 0 {
            trace!("swept {swept} projectiles at {}", self.game_time);
        }
    }

    fn check<W: ObjectQuery + Terrain + ?Sized>(&self, world: &W, proj: &Projectile) {
        let result = check_projectile(self, world, proj, CHECK_DEPTH);
        if let Err(violation) = &result {
            warn!("{violation}");
        }
        debug_assert!(result.is_ok(), "{result:?}");
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Resolves a projectile id.
    #[must_use]
    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        lookup(&self.slots, id)
    }

    /// Number of projectiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no projectile exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Projectiles in update order, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Projectile> + '_ {
        self.order.iter().filter_map(|id| lookup(&self.slots, *id))
    }

    /// Restarts the cursor and returns the first projectile.
    pub fn first_projectile(&mut self) -> Option<&Projectile> {
        self.cursor = 0;
        self.next_projectile()
    }

    /// Advances the cursor.
    pub fn next_projectile(&mut self) -> Option<&Projectile> {
        while let Some(id) = self.order.get(self.cursor).copied() {
            self.cursor += 1;
            if let Some(proj) = lookup(&self.slots, id) {
                return Some(proj);
            }
        }
        None
    }

    /// Collision candidates of a projectile at the current game time.
    pub fn neighbors<W>(&mut self, world: &W, id: ProjectileId) -> Vec<Neighbor>
    where
        W: ObjectQuery + SpatialIndex + ?Sized,
    {
        let Some(center) = lookup(&self.slots, id).map(|p| p.position) else {
            return Vec::new();
        };
        let slots = &self.slots;
        let others = slots
            .iter()
            .filter_map(|s| s.projectile.as_ref())
            .filter(|p| p.id != id && !p.is_dead())
            .map(|p| (p.id, p.position));
        self.neighbors.refresh(id, self.game_time, center, world, others).to_vec()
    }

    /// Releases every projectile and clears the caches.
    pub fn free_all(&mut self) {
        let released = self.order.len();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.projectile.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.order.clear();
        self.cursor = 0;
        self.neighbors.invalidate();
        self.burns.clear();
        info!("Released {released} projectiles");
    }

    /// Serializable view of every projectile.
    #[must_use]
    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            game_time: self.game_time,
            projectiles: self.iter().map(Projectile::snapshot).collect(),
        }
    }

    /// Bincode encoding of [`Self::snapshot`].
    pub fn state_digest(&self) -> OrdnanceResult<Vec<u8>> {
        bincode::serialize(&self.snapshot()).map_err(|e| OrdnanceError::Serialization(e.to_string()))
    }

    /// Checks every projectile's structural invariants.
    #[must_use]
    pub fn validate<W: ObjectQuery + Terrain + ?Sized>(&self, world: &W) -> ValidationReport {
        let mut violations = Vec::new();
        for proj in self.iter() {
            if proj.is_dead() {
                violations.push(InvariantViolation::Dead { id: proj.id });
            }
            if let Err(violation) = check_projectile(self, world, proj, CHECK_DEPTH) {
                violations.push(violation);
            }
        }
        ValidationReport::new(self.game_time, self.len(), violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::ChannelSink;
    use crate::sandbox::SandboxWorld;
    use crate::weapon::MovementModel;
    use ordnance_common::{MapBounds, WeaponId, MAX_PLAYERS};

    fn cannon() -> Arc<WeaponStats> {
        Arc::new(WeaponStats::new(WeaponId::new(1), "Cannon", MovementModel::Direct, WeaponSubClass::Cannon))
    }

    fn mortar() -> Arc<WeaponStats> {
        Arc::new(
            WeaponStats::new(WeaponId::new(2), "Mortar", MovementModel::Indirect, WeaponSubClass::Mortar)
                .with_flight_speed(1500)
                .with_range(256, 2048),
        )
    }

    fn world() -> SandboxWorld {
        SandboxWorld::new(MapBounds::new(32, 32))
    }

    #[test]
    fn test_launch_rejects_bad_requests() {
        let mut world = world();
        let enemy = world.spawn_tank(PlayerId::new(1), IVec3::new(800, 800, 0));
        let mut sim = Simulation::new(SimConfig::default());

        let outsider = PlayerId::new(MAX_PLAYERS);
        let bad_player = Shot::new(cannon(), outsider, IVec3::new(100, 100, 0));
        assert_eq!(sim.launch(&mut world, bad_player), Err(LaunchError::InvalidPlayer(outsider)));

        world.destroy(enemy);
        let dead_target = Shot::new(cannon(), PlayerId::new(0), IVec3::new(800, 800, 0)).at_object(enemy);
        assert_eq!(sim.launch(&mut world, dead_target), Err(LaunchError::TargetDead(enemy)));

        let ghost = ProjectileId::new(7, 3);
        let orphan = Shot::new(cannon(), PlayerId::new(0), IVec3::new(100, 100, 0))
            .with_attacker(Attacker::Projectile(ghost));
        assert_eq!(sim.launch(&mut world, orphan), Err(LaunchError::UnknownAttacker(ghost)));

        assert!(sim.is_empty());
        assert!(world.log().shots.is_empty());
    }

    #[test]
    fn test_dead_attacker_fires_from_target() {
        let mut world = world();
        let tank = world.spawn_tank(PlayerId::new(0), IVec3::new(200, 200, 0));
        world.destroy(tank);
        let mut sim = Simulation::new(SimConfig::default());

        let target = IVec3::new(900, 900, 0);
        let shot = Shot::new(cannon(), PlayerId::new(0), target).from_object(tank, 0);
        let id = sim.launch(&mut world, shot).ok();
        let proj = id.and_then(|id| sim.get(id));

        assert!(proj.is_some_and(|p| p.position == target && p.source.is_none()));
    }

    #[test]
    fn test_iteration_newest_first_and_id_reuse() {
        let mut world = world();
        let mut sim = Simulation::new(SimConfig::default());

        let ids: Vec<ProjectileId> = (0..3)
            .filter_map(|i| {
                let shot = Shot::new(cannon(), PlayerId::new(0), IVec3::new(300 + i * 200, 300, 0));
                sim.launch(&mut world, shot).ok()
            })
            .collect();
        assert_eq!(ids.len(), 3);

        let mut seen = Vec::new();
        let mut next = sim.first_projectile().map(|p| p.id);
        while let Some(id) = next {
            seen.push(id);
            next = sim.next_projectile().map(|p| p.id);
        }
        assert_eq!(seen, vec![ids[2], ids[1], ids[0]]);
        assert_eq!(sim.iter().count(), 3);

        // Point shots with no attacker miss on the first tick and die on the next.
        sim.update_all(&mut world);
        sim.update_all(&mut world);
        assert!(sim.is_empty());
        assert!(sim.get(ids[0]).is_none());

        let reused = sim.launch(&mut world, Shot::new(cannon(), PlayerId::new(0), IVec3::new(300, 300, 0)));
        let Ok(reused) = reused else { panic!("launch failed") };
        assert!(ids.iter().any(|id| id.index() == reused.index()));
        assert!(!ids.contains(&reused));
    }

    #[test]
    fn test_free_all() {
        let mut world = world();
        let mut sim = Simulation::new(SimConfig::default());
        for x in [300, 500] {
            assert!(sim.launch(&mut world, Shot::new(cannon(), PlayerId::new(0), IVec3::new(x, 300, 0))).is_ok());
        }

        sim.free_all();
        assert!(sim.is_empty());
        assert!(sim.first_projectile().is_none());
        assert!(sim.burns().is_empty());
    }

    #[test]
    fn test_indirect_launch_notifies_attacker() {
        let mut world = world();
        let tank = world.spawn_tank(PlayerId::new(0), IVec3::new(300, 300, 0));
        let enemy = world.spawn_tank(PlayerId::new(1), IVec3::new(1300, 300, 0));
        let mut sim = Simulation::new(SimConfig::default());

        let shot = Shot::new(mortar(), PlayerId::new(0), IVec3::new(1300, 300, 0))
            .from_object(tank, 1)
            .at_object(enemy);
        let Ok(id) = sim.launch(&mut world, shot) else { panic!("launch failed") };

        assert_eq!(sim.get(id).map(|p| p.flight), Some(FlightMode::Indirect));
        assert_eq!(world.log().counter_battery, vec![(tank, Some(enemy))]);
        assert_eq!(world.log().turret_pitch.len(), 1);
        assert!(world.log().turret_pitch[0].2 > 0);
        assert_eq!(world.log().shots, vec![(PlayerId::new(0), true)]);

        for _ in 0..100 {
            sim.update_all(&mut world);
        }
        assert!(sim.is_empty());
    }

    #[test]
    fn test_direct_launch_skips_counter_battery() {
        let mut world = world();
        let tank = world.spawn_tank(PlayerId::new(0), IVec3::new(300, 300, 0));
        let mut sim = Simulation::new(SimConfig::default());
        let shot = Shot::new(cannon(), PlayerId::new(0), IVec3::new(900, 300, 0)).from_object(tank, 0);
        assert!(sim.launch(&mut world, shot).is_ok());

        assert!(world.log().counter_battery.is_empty());
        assert!(world.log().turret_pitch.is_empty());
        assert_eq!(world.log().shots, vec![(PlayerId::new(0), false)]);
    }

    #[test]
    fn test_fire_cues() {
        let mut world = world();
        let tank = world.spawn_tank(PlayerId::new(0), IVec3::new(300, 300, 0));
        let (sink, events) = ChannelSink::new(16);
        let mut sim = Simulation::new(SimConfig::default()).with_presentation(sink);

        let howitzer = Arc::new(
            WeaponStats::new(WeaponId::new(3), "Howitzer", MovementModel::Indirect, WeaponSubClass::Howitzer)
                .with_flight_speed(2000)
                .with_range(512, 4000)
                .with_audio(Some(11), None),
        );
        let shot = Shot::new(howitzer, PlayerId::new(0), IVec3::new(2000, 300, 0)).from_object(tank, 0);
        let Ok(id) = sim.launch(&mut world, shot) else { panic!("launch failed") };

        let cues: Vec<PresentationEvent> = events.try_iter().collect();
        assert_eq!(
            cues,
            vec![
                PresentationEvent::TrackedAudio { cue: AudioCue::Weapon(11), follow: ObjectRef::Object(tank) },
                PresentationEvent::TrackedAudio { cue: AudioCue::HowitzerFlight, follow: ObjectRef::Projectile(id) },
            ]
        );
    }

    #[test]
    fn test_las_sat_waits_in_multiplayer() {
        let mut world = world();
        let config = SimConfig { multiplayer: true, ..SimConfig::default() };
        let (sink, events) = ChannelSink::new(64);
        let mut sim = Simulation::new(config).with_presentation(sink);

        let las_sat = Arc::new(
            WeaponStats::new(WeaponId::new(9), "Sat", MovementModel::Direct, WeaponSubClass::LasSat)
                .with_audio(Some(40), None),
        );
        let target = IVec3::new(2000, 2000, 0);
        let Ok(id) = sim.launch(&mut world, Shot::new(las_sat, PlayerId::new(0), target)) else {
            panic!("launch failed")
        };
        assert_eq!(events.try_iter().count(), 0);

        for _ in 0..39 {
            sim.update_all(&mut world);
        }
        assert_eq!(sim.get(id).map(|p| p.state), Some(ProjectileState::InFlight));

        sim.update_all(&mut world);
        assert_eq!(sim.get(id).map(|p| p.state), Some(ProjectileState::Impact));

        sim.update_all(&mut world);
        let cues: Vec<PresentationEvent> = events.try_iter().collect();
        assert!(cues.contains(&PresentationEvent::SatelliteBeam { position: target }));
        assert!(cues.contains(&PresentationEvent::ScreenShake));
        assert!(sim.is_empty());
    }
}
