//! Kill statistics and experience propagation after damage lands.

use ordnance_common::{ObjectHandle, PlayerId};
use tracing::trace;

use crate::world::{MatchStats, ObjectKind, ObjectQuery, UnitCommands, UnitInfo};

/// Lower and upper clamp of each quality ratio.
const QUALITY_MIN: f32 = 0.5;
const QUALITY_MAX: f32 = 2.0;

/// Average of the clamped cost and score ratios between victim and attacker.
#[must_use]
pub fn quality_factor(attacker: &UnitInfo, victim: &UnitInfo) -> f32 {
    let ratio = |victim: u32, attacker: u32| {
        (victim as f32 / attacker.max(1) as f32).clamp(QUALITY_MIN, QUALITY_MAX)
    };
    (ratio(victim.power, attacker.power) + ratio(victim.points, attacker.points)) / 2.0
}

/// Who fired and with what standing.
#[derive(Debug, Clone, Copy)]
pub struct KillCredit {
    /// Firing object, if it still exists
    pub source: Option<ObjectHandle>,
    /// Firing player
    pub player: PlayerId,
    /// Multiplayer rules
    pub multiplayer: bool,
}

/// Credits a damage result to the attacker.
///
/// `relative` is the signed fraction returned by the damage applier; a
/// negative value means `victim` was destroyed. `victim_kind` must be taken
/// before damage is applied since a destroyed victim no longer resolves.
pub fn update_kills<W>(world: &mut W, credit: KillCredit, victim: ObjectHandle, victim_kind: &ObjectKind, relative: f32)
where
    W: ObjectQuery + UnitCommands + MatchStats + ?Sized,
{
    let Some(source) = credit.source else { return };
    if matches!(victim_kind, ObjectKind::Feature(_)) {
        return;
    }

    if credit.multiplayer && relative < 0.0 {
        world.record_kill(credit.player, victim);
    }

    let Some(attacker) = world.object(source) else { return };
    let attacker_kind = attacker.kind.clone();
    let mut increment = relative.abs();

    match &attacker_kind {
        ObjectKind::Unit(unit) => {
            if credit.multiplayer {
                if let ObjectKind::Unit(target) = victim_kind {
                    increment *= quality_factor(unit, target);
                }
            }
            trace!("{source} gains {increment:.3} experience");
            world.add_experience(source, increment);

            if let Some(commander) = world.commander_of(source) {
                world.add_experience(commander, increment);
            }
            if let Some(sensor) = world.fire_support_sensor(source) {
                world.add_experience(sensor, increment);
            }
        },
        ObjectKind::Structure(_) => {
            if let Some((commander, Some(target))) = world.designating_commander(credit.player) {
                if target == victim {
                    world.add_experience(commander, increment);
                }
            }
        },
        ObjectKind::Feature(_) => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxWorld;
    use crate::world::{ModelExtents, UnitRole};
    use glam::IVec3;
    use ordnance_common::MapBounds;

    fn unit(power: u32, points: u32) -> UnitInfo {
        UnitInfo::new(UnitRole::Weapon, ModelExtents::new(0, 30, 20)).with_value(power, points)
    }

    fn credit(source: ObjectHandle, multiplayer: bool) -> KillCredit {
        KillCredit { source: Some(source), player: PlayerId::new(0), multiplayer }
    }

    #[test]
    fn test_quality_factor() {
        assert!((quality_factor(&unit(100, 100), &unit(400, 100)) - 1.5).abs() < f32::EPSILON);
        assert!((quality_factor(&unit(100, 100), &unit(100, 100)) - 1.0).abs() < f32::EPSILON);
        assert!((quality_factor(&unit(400, 400), &unit(10, 10)) - 0.5).abs() < f32::EPSILON);
        assert!((quality_factor(&unit(0, 0), &unit(10, 10)) - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unit_experience_chain() {
        let mut world = SandboxWorld::new(MapBounds::new(8, 8));
        let shooter = world.spawn_tank(PlayerId::new(0), IVec3::ZERO);
        let commander = world.spawn_tank(PlayerId::new(0), IVec3::ZERO);
        let sensor = world.spawn_tank(PlayerId::new(0), IVec3::ZERO);
        let victim = world.spawn_tank(PlayerId::new(1), IVec3::ZERO);
        world.set_commander(shooter, commander);
        world.set_fire_support(shooter, sensor);

        let kind = ObjectKind::Unit(unit(100, 100));
        update_kills(&mut world, credit(shooter, false), victim, &kind, 0.25);

        assert!((world.experience(shooter) - 0.25).abs() < f32::EPSILON);
        assert!((world.experience(commander) - 0.25).abs() < f32::EPSILON);
        assert!((world.experience(sensor) - 0.25).abs() < f32::EPSILON);
        assert!(world.log().kills.is_empty());
    }

    #[test]
    fn test_multiplayer_kill_and_scaling() {
        let mut world = SandboxWorld::new(MapBounds::new(8, 8));
        let shooter = world.spawn_tank(PlayerId::new(0), IVec3::ZERO);
        let victim = world.spawn_tank(PlayerId::new(1), IVec3::ZERO);

        let strong = ObjectKind::Unit(unit(400, 100));
        update_kills(&mut world, credit(shooter, true), victim, &strong, -0.5);

        assert!((world.experience(shooter) - 0.75).abs() < f32::EPSILON);
        assert_eq!(world.log().kills, vec![(PlayerId::new(0), victim)]);

        // Single player neither scales nor records kills.
        let mut solo = SandboxWorld::new(MapBounds::new(8, 8));
        let shooter = solo.spawn_tank(PlayerId::new(0), IVec3::ZERO);
        update_kills(&mut solo, credit(shooter, false), victim, &strong, -0.5);
        assert!((solo.experience(shooter) - 0.5).abs() < f32::EPSILON);
        assert!(solo.log().kills.is_empty());
    }

    #[test]
    fn test_kill_recorded_for_remote_player() {
        let mut world = SandboxWorld::new(MapBounds::new(8, 8));
        let shooter = world.spawn_tank(PlayerId::new(0), IVec3::ZERO);
        let victim = world.spawn_tank(PlayerId::new(1), IVec3::ZERO);
        world.set_remote(PlayerId::new(0));
        assert!(!world.responsible_for(PlayerId::new(0)));

        let kind = ObjectKind::Unit(unit(100, 100));
        update_kills(&mut world, credit(shooter, true), victim, &kind, -1.0);
        assert_eq!(world.log().kills, vec![(PlayerId::new(0), victim)]);
    }

    #[test]
    fn test_features_and_missing_source_skip() {
        let mut world = SandboxWorld::new(MapBounds::new(8, 8));
        let shooter = world.spawn_tank(PlayerId::new(0), IVec3::ZERO);
        let tree = world.spawn_feature(IVec3::ZERO, true);
        let tree_kind = world.object(tree).map(|o| o.kind.clone());

        if let Some(kind) = tree_kind {
            update_kills(&mut world, credit(shooter, true), tree, &kind, -1.0);
        }
        let orphan = KillCredit { source: None, player: PlayerId::new(0), multiplayer: true };
        update_kills(&mut world, orphan, tree, &ObjectKind::Unit(unit(1, 1)), -1.0);

        assert!((world.experience(shooter)).abs() < f32::EPSILON);
        assert!(world.log().kills.is_empty());
    }

    #[test]
    fn test_structure_designator() {
        let mut world = SandboxWorld::new(MapBounds::new(8, 8));
        let tower = world.spawn_structure(PlayerId::new(0), IVec3::ZERO, 1);
        let commander = world.spawn_tank(PlayerId::new(0), IVec3::ZERO);
        let victim = world.spawn_tank(PlayerId::new(1), IVec3::ZERO);
        let bystander = world.spawn_tank(PlayerId::new(1), IVec3::ZERO);
        world.set_designator(PlayerId::new(0), commander, Some(victim));

        let kind = ObjectKind::Unit(unit(100, 100));
        update_kills(&mut world, credit(tower, false), bystander, &kind, 0.2);
        assert!(world.experience(commander).abs() < f32::EPSILON);

        update_kills(&mut world, credit(tower, false), victim, &kind, 0.2);
        assert!((world.experience(commander) - 0.2).abs() < f32::EPSILON);
        assert!(world.experience(tower).abs() < f32::EPSILON);
    }
}
