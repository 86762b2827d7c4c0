//! Collision resolver.
//!
//! Walks a projectile's neighbor list nearest first, drops candidates it may
//! not hit, and reports the first one whose hit cylinder contains the
//! projectile.

use glam::{IVec2, IVec3};
use ordnance_common::{planar_dist_sq, MapBounds, ProjectileId};

use crate::geometry::{target_height, target_radius, BULLET_FLIGHT_HEIGHT, PROJECTILE_HIT_RADIUS};
use crate::neighbors::Neighbor;
use crate::projectile::{FlightMode, ObjectRef, Projectile};
use crate::weapon::WeaponSubClass;
use crate::world::{Alliances, GameObject, ObjectQuery};

/// Cylinder test: inside the height band and inside the radius.
#[must_use]
pub fn inside_hit_cylinder(position: IVec3, target: IVec3, height: i32, radius: i32) -> bool {
    let dz = (position.z - target.z).abs();
    dz < height && planar_dist_sq(position, target) < i64::from(radius) * i64::from(radius)
}

/// Whether two projectiles may collide with each other.
#[must_use]
pub fn projectiles_can_collide(proj: &Projectile, other: &Projectile) -> bool {
    if proj.flight != FlightMode::Direct {
        return false;
    }
    let mine = proj.weapon.sub_class;
    mine.is_missile() || mine == WeaponSubClass::Counter || other.weapon.sub_class == WeaponSubClass::Counter
}

/// Air-only direct weapons ignore anything on the ground.
fn wrong_domain(proj: &Projectile, object: &GameObject) -> bool {
    proj.flight == FlightMode::Direct
        && proj.weapon.surface_to_air.is_air_only()
        && (object.is_structure() || object.is_feature() || (object.is_unit() && !object.is_vtol()))
}

/// Finds the first neighbor the projectile strikes.
///
/// `lookup` resolves other live projectiles.
pub fn find_hit<'p, W, F>(
    proj: &Projectile,
    neighbors: &[Neighbor],
    world: &W,
    lookup: F,
) -> Option<ObjectRef>
where
    W: ObjectQuery + Alliances + ?Sized,
    F: Fn(ProjectileId) -> Option<&'p Projectile>,
{
    for neighbor in neighbors {
        let candidate = neighbor.target;
        if proj.damaged == Some(candidate) {
            continue;
        }
        let friendly_block = |owner| world.allied(owner, proj.player) && proj.destination != Some(candidate);

        let hit = match candidate {
            ObjectRef::Projectile(id) => {
                let Some(other) = lookup(id) else { continue };
                if other.is_dead() || !projectiles_can_collide(proj, other) || friendly_block(other.player) {
                    continue;
                }
                inside_hit_cylinder(proj.position, other.position, BULLET_FLIGHT_HEIGHT, PROJECTILE_HIT_RADIUS)
            },
            ObjectRef::Object(handle) => {
                let Some(object) = world.object(handle) else { continue };
                if object.is_indestructible_feature() || friendly_block(object.player) || wrong_domain(proj, object) {
                    continue;
                }
                inside_hit_cylinder(
                    proj.position,
                    object.position,
                    target_height(object),
                    target_radius(object),
                )
            },
        };

        if hit {
            return Some(candidate);
        }
    }
    None
}

/// Aim point of a penetration continuation: the movement vector scaled by
/// the extension factor, clamped to the map.
#[must_use]
pub fn penetration_aim(
    start: IVec2,
    src_height: i32,
    movement: IVec3,
    factor: f32,
    bounds: MapBounds,
) -> IVec3 {
    let ground = bounds.clamp(IVec2::new(
        start.x + (movement.x as f32 * factor) as i32,
        start.y + (movement.y as f32 * factor) as i32,
    ));
    IVec3::new(ground.x, ground.y, src_height + (movement.z as f32 * factor) as i32)
}
