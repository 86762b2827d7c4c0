//! Damage resolver.
//!
//! Applies direct-hit, splash and burn damage through the world's
//! [`crate::world::DamageApplier`] and hands every result to [`update_kills`].

use ahash::AHashMap;
use ordnance_common::{dist_sq, planar_dist_sq, ObjectHandle};
use tracing::{debug, trace};

use crate::config::{GameTime, GAME_TICKS_PER_SEC};
use crate::dice::HitDice;
use crate::experience::{update_kills, KillCredit};
use crate::geometry::hit_side;
use crate::projectile::Projectile;
use crate::tables::CombatTables;
use crate::weapon::{SurfaceToAir, WeaponSubClass};
use crate::world::{GameObject, HitSide, ObjectKind, World};

/// Applies an armour modifier percentage. Never rounds a nonzero base down to 0.
#[must_use]
pub fn calc_damage(base: u32, modifier: u32) -> u32 {
    let damage = (u64::from(base) * u64::from(modifier) / 100).min(u64::from(u32::MAX)) as u32;
    if damage == 0 && base != 0 {
        1
    } else {
        damage
    }
}

/// Shared inputs of one damage pass.
#[derive(Debug, Clone, Copy)]
pub struct DamageContext<'a> {
    /// Upgrades and modifiers
    pub tables: &'a CombatTables,
    /// Multiplayer rules
    pub multiplayer: bool,
}

impl DamageContext<'_> {
    fn credit(&self, proj: &Projectile) -> KillCredit {
        KillCredit { source: proj.source, player: proj.player, multiplayer: self.multiplayer }
    }
}

/// Deals `base` damage from `proj` to `victim` after armour modifiers.
fn strike<W: World + ?Sized>(
    world: &mut W,
    ctx: DamageContext<'_>,
    proj: &Projectile,
    victim: &GameObject,
    base: u32,
    side: HitSide,
) -> f32 {
    let weapon = &proj.weapon;
    let amount = calc_damage(base, ctx.tables.modifier(weapon.effect, &victim.kind));

    if ctx.multiplayer && proj.source.is_some() && world.responsible_for(proj.player) {
        world.record_damage(proj.player, victim.player, amount);
    }

    trace!("{} deals {amount} to {}", proj.id, victim.handle);
    let relative = world.apply_damage(victim.handle, amount, weapon.class, weapon.sub_class, side);
    update_kills(world, ctx.credit(proj), victim.handle, &victim.kind, relative);
    relative
}

// ============================================================================
// Direct hits
// ============================================================================

/// What a direct hit did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectHit {
    /// The target cannot be damaged; the projectile dies on the spot
    Indestructible,
    /// Electronic attack landed, capturing the target or not
    Electronic {
        /// Whether ownership changed
        captured: bool,
    },
    /// Ordinary damage with the signed relative result
    Damaged(f32),
    /// The target no longer resolves
    Missing,
}

/// Resolves the direct-hit part of an impact on `target`.
pub fn resolve_direct_hit<W: World + ?Sized>(
    world: &mut W,
    ctx: DamageContext<'_>,
    proj: &Projectile,
    target: ObjectHandle,
) -> DirectHit {
    let Some(victim) = world.object(target).cloned() else {
        return DirectHit::Missing;
    };
    if victim.is_indestructible_feature() {
        debug!("{}: {target} cannot be damaged, projectile removed", proj.id);
        return DirectHit::Indestructible;
    }

    let weapon = &proj.weapon;
    let base = ctx.tables.weapon_damage(weapon, proj.player);

    if weapon.is_direct_fire() && weapon.sub_class == WeaponSubClass::Electronic {
        if let Some(source) = proj.source {
            let amount = calc_damage(base, ctx.tables.modifier(weapon.effect, &victim.kind));
            let captured = world.electronic_damage(target, amount, proj.player);
            if captured {
                debug!("{target} captured by {}", proj.player);
                match world.object(source).map(|o| o.is_structure()) {
                    Some(true) => world.clear_structure_target(source),
                    Some(false) => world.clear_orders(source),
                    None => {},
                }
            }
            return DirectHit::Electronic { captured };
        }
    }

    // Indirect weapons strike from above even when fired flat inside minimum range.
    let side = match &victim.kind {
        ObjectKind::Unit(_) if weapon.is_direct_fire() => hit_side(proj, &victim),
        ObjectKind::Unit(_) => HitSide::Top,
        _ => HitSide::Front,
    };
    DirectHit::Damaged(strike(world, ctx, proj, &victim, base, side))
}

// ============================================================================
// Splash
// ============================================================================

/// Whether splash from a weapon with `reach` can catch a unit in or out of the air.
fn splash_reaches(reach: SurfaceToAir, in_air: bool) -> bool {
    match reach {
        SurfaceToAir::Air => in_air,
        SurfaceToAir::Ground => !in_air,
        SurfaceToAir::Both => true,
    }
}

/// Applies splash damage around the projectile's position to everything but
/// its destination. Returns the number of objects hit.
pub fn apply_splash<W: World + ?Sized>(
    world: &mut W,
    ctx: DamageContext<'_>,
    dice: &mut dyn HitDice,
    proj: &Projectile,
) -> usize {
    let weapon = &proj.weapon;
    let radius = i64::from(weapon.radius);
    let radius_sq = radius * radius;
    let skip = proj.destination.and_then(|d| d.object());
    let base = ctx.tables.radius_damage(weapon, proj.player);

    let mut hits = 0;
    for handle in world.objects_near(proj.position, weapon.radius as i32) {
        if Some(handle) == skip {
            continue;
        }
        let Some(victim) = world.object(handle).cloned() else { continue };

        let distance_sq = match &victim.kind {
            ObjectKind::Unit(unit) => {
                if !splash_reaches(weapon.surface_to_air, unit.is_flying()) {
                    continue;
                }
                dist_sq(victim.position, proj.position)
            },
            ObjectKind::Structure(_) => {
                if weapon.surface_to_air.is_air_only() {
                    continue;
                }
                planar_dist_sq(victim.position, proj.position)
            },
            ObjectKind::Feature(feature) => {
                if !feature.damageable {
                    continue;
                }
                planar_dist_sq(victim.position, proj.position)
            },
        };
        if distance_sq >= radius_sq {
            continue;
        }

        let distance = (distance_sq as f64).sqrt() as u32;
        let chance = ctx.tables.radius_hit(weapon, proj.player, distance);
        if !dice.hits(chance) {
            continue;
        }

        let side = hit_side(proj, &victim);
        strike(world, ctx, proj, &victim, base, side);
        hits += 1;
    }

    debug!("{}: splash caught {hits} objects", proj.id);
    hits
}

// ============================================================================
// Burning
// ============================================================================

/// Burn bookkeeping for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BurnEntry {
    /// When the object caught fire
    pub start: GameTime,
    /// Damage applied since `start`
    pub applied: u32,
    touched: bool,
}

/// Per-object burn state, shared by every fire in the simulation.
#[derive(Debug, Clone, Default)]
pub struct BurnLedger {
    entries: AHashMap<ObjectHandle, BurnEntry>,
}

impl BurnLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of burning objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is burning.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Burn state of an object.
    #[must_use]
    pub fn get(&self, handle: ObjectHandle) -> Option<&BurnEntry> {
        self.entries.get(&handle)
    }

    /// Marks `handle` as in a fire at `now` and returns the damage it is owed
    /// at `rate` per second. The first touch only starts the clock.
    pub fn accrue(&mut self, handle: ObjectHandle, now: GameTime, rate: u32) -> u32 {
        let entry = self.entries.entry(handle).or_default();
        entry.touched = true;
        if entry.start == 0 {
            entry.start = now;
            entry.applied = 0;
            return 0;
        }

        let due = u64::from(now.saturating_sub(entry.start)) * u64::from(rate) / u64::from(GAME_TICKS_PER_SEC);
        let owed = due.saturating_sub(u64::from(entry.applied)).min(u64::from(u32::MAX)) as u32;
        entry.applied = entry.applied.saturating_add(owed);
        owed
    }

    /// Drops objects not touched since the last prune and clears the marks.
    pub fn prune(&mut self) {
        self.entries.retain(|_, entry| std::mem::take(&mut entry.touched));
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Burns enemy units and structures inside the fire. Returns total damage dealt.
pub fn apply_burn<W: World + ?Sized>(
    world: &mut W,
    ctx: DamageContext<'_>,
    ledger: &mut BurnLedger,
    proj: &Projectile,
    now: GameTime,
) -> u32 {
    let weapon = &proj.weapon;
    let radius_sq = i64::from(weapon.incen_radius) * i64::from(weapon.incen_radius);
    let rate = ctx.tables.incen_damage(weapon, proj.player);

    let mut total = 0;
    for handle in world.objects_near(proj.position, weapon.incen_radius as i32) {
        let Some(victim) = world.object(handle).cloned() else { continue };
        if victim.player == proj.player || victim.is_feature() || victim.is_flying() {
            continue;
        }
        if planar_dist_sq(victim.position, proj.position) > radius_sq {
            continue;
        }

        let owed = ledger.accrue(handle, now, rate);
        if owed == 0 {
            continue;
        }
        trace!("{}: burn {owed} to {handle}", proj.id);
        let relative = world.apply_damage(handle, owed, weapon.class, weapon.sub_class, HitSide::Front);
        update_kills(world, ctx.credit(proj), handle, &victim.kind, relative);
        total += owed;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projectile::{FlightMode, ObjectRef, ProjectileState};
    use crate::sandbox::SandboxWorld;
    use crate::dice::FixedDice;
    use crate::weapon::{HitChance, MovementModel, WeaponStats};
    use crate::world::PropulsionKind;
    use crate::weapon::WeaponEffect;
    use glam::{IVec2, IVec3};
    use ordnance_common::{MapBounds, PlayerId, ProjectileId, WeaponId};
    use std::sync::Arc;

    fn projectile(weapon: WeaponStats, position: IVec3) -> Projectile {
        Projectile {
            id: ProjectileId::new(0, 0),
            player: PlayerId::new(0),
            weapon: Arc::new(weapon),
            state: ProjectileState::Impact,
            flight: FlightMode::Direct,
            position,
            start: IVec2::new(position.x, position.y + 500),
            target: IVec2::new(position.x, position.y),
            src_height: 0,
            alt_change: 0,
            born: 0,
            died: 0,
            pitch: 0,
            direction: 0,
            roll: 0,
            v_xy: 0,
            v_z: 0,
            visible: false,
            source: None,
            destination: None,
            damaged: None,
        }
    }

    fn cannon() -> WeaponStats {
        WeaponStats::new(WeaponId::new(1), "Cannon", MovementModel::Direct, WeaponSubClass::Cannon).with_damage(40)
    }

    fn ctx(tables: &CombatTables) -> DamageContext<'_> {
        DamageContext { tables, multiplayer: false }
    }

    #[test]
    fn test_calc_damage_floor() {
        assert_eq!(calc_damage(40, 50), 20);
        assert_eq!(calc_damage(1, 10), 1);
        assert_eq!(calc_damage(0, 10), 0);
        assert_eq!(calc_damage(40, 0), 1);
    }

    #[test]
    fn test_direct_hit_uses_modifier_and_side() {
        let mut world = SandboxWorld::new(MapBounds::new(16, 16));
        let tank = world.spawn_tank(PlayerId::new(1), IVec3::new(1000, 1000, 0));
        let mut tables = CombatTables::new();
        tables.set_propulsion_modifier(WeaponEffect::AntiTank, PropulsionKind::Wheeled, 50);

        let proj = projectile(cannon(), IVec3::new(1000, 1000, 10));
        let result = resolve_direct_hit(&mut world, ctx(&tables), &proj, tank);
        assert_eq!(result, DirectHit::Damaged(0.2));

        let record = world.log().damage[0];
        assert_eq!(record.amount, 20);
        assert_eq!(record.side, HitSide::Front);

        // Flight mode does not decide the side; the weapon does.
        let mut lob = proj.clone();
        lob.flight = FlightMode::Indirect;
        resolve_direct_hit(&mut world, ctx(&tables), &lob, tank);
        assert_eq!(world.log().damage[1].side, HitSide::Front);
    }

    #[test]
    fn test_mortar_inside_min_range_hits_top() {
        let mut world = SandboxWorld::new(MapBounds::new(16, 16));
        let tank = world.spawn_tank(PlayerId::new(1), IVec3::new(1000, 1000, 0));
        let tables = CombatTables::new();

        let mortar = WeaponStats::new(WeaponId::new(2), "Mortar", MovementModel::Indirect, WeaponSubClass::Mortar)
            .with_range(2000, 4000)
            .with_damage(40);
        let proj = projectile(mortar, IVec3::new(1000, 1000, 10));
        assert_eq!(proj.flight, FlightMode::Direct);

        resolve_direct_hit(&mut world, ctx(&tables), &proj, tank);
        assert_eq!(world.log().damage[0].side, HitSide::Top);
    }

    #[test]
    fn test_direct_hit_on_indestructible_feature() {
        let mut world = SandboxWorld::new(MapBounds::new(16, 16));
        let rock = world.spawn_feature(IVec3::new(500, 500, 0), false);
        let tables = CombatTables::new();
        let proj = projectile(cannon(), IVec3::new(500, 500, 0));
        assert_eq!(resolve_direct_hit(&mut world, ctx(&tables), &proj, rock), DirectHit::Indestructible);
        assert!(world.log().damage.is_empty());
    }

    #[test]
    fn test_electronic_capture_clears_orders() {
        let mut world = SandboxWorld::new(MapBounds::new(16, 16));
        let shooter = world.spawn_tank(PlayerId::new(0), IVec3::new(100, 100, 0));
        let target = world.spawn_tank(PlayerId::new(1), IVec3::new(500, 500, 0));
        let tables = CombatTables::new();

        let nexus = WeaponStats::new(WeaponId::new(9), "Nexus", MovementModel::Direct, WeaponSubClass::Electronic)
            .with_damage(150);
        let mut proj = projectile(nexus, IVec3::new(500, 500, 0));
        proj.source = Some(shooter);

        let result = resolve_direct_hit(&mut world, ctx(&tables), &proj, target);
        assert_eq!(result, DirectHit::Electronic { captured: true });
        assert_eq!(world.log().cleared_orders, vec![shooter]);
        assert!(world.log().damage.is_empty());
    }

    #[test]
    fn test_splash_skips_destination_and_out_of_range() {
        let mut world = SandboxWorld::new(MapBounds::new(32, 32));
        let centre = IVec3::new(2000, 2000, 0);
        let direct = world.spawn_tank(PlayerId::new(1), centre);
        let near_a = world.spawn_tank(PlayerId::new(1), centre + IVec3::new(60, 0, 0));
        let near_b = world.spawn_tank(PlayerId::new(1), centre + IVec3::new(0, -90, 0));
        let far = world.spawn_tank(PlayerId::new(1), centre + IVec3::new(300, 0, 0));
        let tables = CombatTables::new();

        let mortar = cannon().with_splash(128, 25, HitChance::Flat(100), 500);
        let mut proj = projectile(mortar, centre);
        proj.destination = Some(ObjectRef::Object(direct));

        let hits = apply_splash(&mut world, ctx(&tables), &mut FixedDice::new(0), &proj);
        assert_eq!(hits, 2);
        assert_eq!(world.damage_taken(near_a), 25);
        assert_eq!(world.damage_taken(near_b), 25);
        assert_eq!(world.damage_taken(direct), 0);
        assert_eq!(world.damage_taken(far), 0);
    }

    #[test]
    fn test_splash_air_filter_and_rolls() {
        let mut world = SandboxWorld::new(MapBounds::new(32, 32));
        let centre = IVec3::new(2000, 2000, 0);
        let tank = world.spawn_tank(PlayerId::new(1), centre + IVec3::new(10, 0, 0));
        let jet = world.spawn_vtol(PlayerId::new(1), centre + IVec3::new(0, 10, 20), true);
        let tower = world.spawn_structure(PlayerId::new(1), centre + IVec3::new(-10, 0, 0), 1);
        let crate_pile = world.spawn_feature(centre + IVec3::new(0, -20, 0), true);
        let rock = world.spawn_feature(centre + IVec3::new(0, 20, 0), false);
        let tables = CombatTables::new();

        // Air-only splash still catches damageable features.
        let flak = cannon()
            .with_surface_to_air(SurfaceToAir::Air)
            .with_splash(128, 10, HitChance::Flat(100), 0);
        let proj = projectile(flak, centre);
        assert_eq!(apply_splash(&mut world, ctx(&tables), &mut FixedDice::new(0), &proj), 2);
        assert_eq!(world.damage_taken(jet), 10);
        assert_eq!(world.damage_taken(crate_pile), 10);
        assert_eq!(world.damage_taken(rock), 0);
        assert_eq!(world.damage_taken(tank), 0);
        assert_eq!(world.damage_taken(tower), 0);

        // A roll of 99 misses a 50% chance.
        let shell = cannon().with_splash(128, 10, HitChance::Flat(50), 0);
        let proj = projectile(shell, centre);
        assert_eq!(apply_splash(&mut world, ctx(&tables), &mut FixedDice::new(99), &proj), 0);
    }

    #[test]
    fn test_burn_ledger_accrual() {
        let mut ledger = BurnLedger::new();
        let handle = ObjectHandle::new(3, 0);

        assert_eq!(ledger.accrue(handle, 100, 20), 0);
        assert_eq!(ledger.accrue(handle, 600, 20), 10);
        assert_eq!(ledger.accrue(handle, 1100, 20), 10);
        assert_eq!(ledger.get(handle).map(|e| e.applied), Some(20));

        ledger.prune();
        assert_eq!(ledger.len(), 1);
        ledger.prune();
        assert!(ledger.is_empty());

        // A fresh fire restarts the clock.
        assert_eq!(ledger.accrue(handle, 5000, 20), 0);
        assert_eq!(ledger.get(handle).map(|e| e.start), Some(5000));
    }

    #[test]
    fn test_burn_spares_owner_and_aircraft() {
        let mut world = SandboxWorld::new(MapBounds::new(32, 32));
        let centre = IVec3::new(2000, 2000, 0);
        let own = world.spawn_tank(PlayerId::new(0), centre);
        let enemy = world.spawn_tank(PlayerId::new(1), centre + IVec3::new(40, 0, 0));
        let jet = world.spawn_vtol(PlayerId::new(1), centre, true);
        let tables = CombatTables::new();
        let mut ledger = BurnLedger::new();

        let flamer = cannon().with_incendiary(64, 5000, 20);
        let proj = projectile(flamer, centre);

        assert_eq!(apply_burn(&mut world, ctx(&tables), &mut ledger, &proj, 100), 0);
        assert_eq!(apply_burn(&mut world, ctx(&tables), &mut ledger, &proj, 1100), 20);
        assert_eq!(world.damage_taken(enemy), 20);
        assert_eq!(world.damage_taken(own), 0);
        assert_eq!(world.damage_taken(jet), 0);
    }
}
