//! Visibility and target geometry helpers.

use ordnance_common::{atan2_deg_signed, PlayerId, TILE_UNITS};

use crate::projectile::Projectile;
use crate::world::{GameObject, HitSide, ObjectKind, ObjectQuery, UnitRole};

/// Hit radius used when a projectile is the target.
pub const PROJECTILE_HIT_RADIUS: i32 = TILE_UNITS / 8;

/// Hit height used when a projectile is the target.
pub const BULLET_FLIGHT_HEIGHT: i32 = 16;

/// Extra hit height granted to aircraft.
pub const VTOL_HITBOX_MODIFIER: i32 = 100;

/// Altitude change beyond which a hit counts as coming from above.
const TOP_HIT_ALT_CHANGE: i32 = 300;

/// How far below a target's origin a projectile must be to hit its underside.
const BOTTOM_HIT_DEPTH: i32 = 50;

/// Whether `observer` should see and hear this projectile.
pub fn gfx_visible<W: ObjectQuery + ?Sized>(proj: &Projectile, world: &W, observer: PlayerId) -> bool {
    if proj.visible || proj.player == observer {
        return true;
    }

    let source = proj.source.and_then(|h| world.object(h));
    let dest = proj
        .destination
        .and_then(|r| r.object())
        .and_then(|h| world.object(h));
    let source_seen = source.is_some_and(|s| world.visible_to(s.handle, observer));
    let dest_seen = dest.is_some_and(|d| world.visible_to(d.handle, observer));

    // Someone else's structure firing at something you can't see
    if source.is_some_and(|s| s.is_structure() && s.player != observer) && !dest_seen {
        return false;
    }

    // Something you can't see firing at a structure that isn't yours
    if dest.is_some_and(|d| d.is_structure() && d.player != observer) && !source_seen {
        return false;
    }

    source_seen || dest_seen
}

/// Horizontal hit radius of an object.
#[must_use]
pub fn target_radius(object: &GameObject) -> i32 {
    match &object.kind {
        ObjectKind::Unit(unit) => match unit.role {
            UnitRole::Default | UnitRole::Transporter => TILE_UNITS / 4,
            _ => unit.body.radius.abs() * 2,
        },
        ObjectKind::Structure(s) => s.width.max(s.breadth) as i32 * TILE_UNITS / 2,
        ObjectKind::Feature(f) => f.width.max(f.breadth) as i32 * TILE_UNITS / 2,
    }
}

/// Vertical hit extent of an object.
#[must_use]
pub fn target_height(object: &GameObject) -> i32 {
    match &object.kind {
        ObjectKind::Unit(unit) => {
            let body = unit.body.height();
            if unit.vtol {
                return body + VTOL_HITBOX_MODIFIER;
            }
            let utility = match unit.role {
                UnitRole::Weapon
                | UnitRole::Sensor
                | UnitRole::Ecm
                | UnitRole::Construct
                | UnitRole::Repair => unit.turret.map_or(0, |t| t.mid_height()),
                _ => 0,
            };
            body + utility
        },
        ObjectKind::Structure(s) => s.model.mid_height(),
        ObjectKind::Feature(f) => f.model.mid_height(),
    }
}

/// Which side of `target` the projectile struck.
#[must_use]
pub fn hit_side(proj: &Projectile, target: &GameObject) -> HitSide {
    if proj.alt_change > TOP_HIT_ALT_CHANGE {
        return HitSide::Top;
    }
    if proj.position.z < target.position.z - BOTTOM_HIT_DEPTH {
        return HitSide::Bottom;
    }

    let dx = proj.start.x - target.position.x;
    let dy = proj.start.y - target.position.y;
    let from = atan2_deg_signed(f64::from(dx), f64::from(dy));
    let angle = (target.direction - from).abs().rem_euclid(360);
    match angle {
        46..=134 => HitSide::Right,
        135..=225 => HitSide::Rear,
        226..=314 => HitSide::Left,
        _ => HitSide::Front,
    }
}
