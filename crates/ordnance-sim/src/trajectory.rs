//! Trajectory model.
//!
//! Pure functions for the launch solve and the per-tick position update of
//! each flight mode. Nothing here touches the world; callers decide what a
//! step means (hit, miss, off map).
//!
//! Angles come from [`ordnance_common::trig`] and vertical ballistic motion
//! is integer arithmetic, so results are identical on every peer.

use glam::{IVec2, IVec3};
use ordnance_common::{atan2_deg_signed, bearing_deg, cos_deg, sin_deg, tan_deg};

use crate::config::{GameTime, GAME_TICKS_PER_SEC};
use crate::projectile::FlightMode;
use crate::weapon::WeaponStats;

/// Result of the launch solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchSolution {
    /// Flight integration to use
    pub flight: FlightMode,
    /// Launch pitch in degrees
    pub pitch: i32,
    /// Bearing from muzzle to target, 0..360
    pub direction: i32,
    /// Horizontal launch speed (indirect only)
    pub v_xy: i32,
    /// Vertical launch speed (indirect only)
    pub v_z: i32,
    /// The nominal speed could not reach; pitch was capped and speed raised
    pub capped: bool,
}

/// Computes pitch, bearing and launch velocity for a shot from `muzzle` at `target`.
#[must_use]
pub fn solve_launch(
    weapon: &WeaponStats,
    muzzle: IVec3,
    target: IVec3,
    gravity: i32,
    max_pitch: i32,
) -> LaunchSolution {
    let dx = f64::from(target.x - muzzle.x);
    let dy = f64::from(target.y - muzzle.y);
    let dz = f64::from(target.z - muzzle.z);
    let direction = bearing_deg(target.x - muzzle.x, target.y - muzzle.y);
    let rad_sq = dx * dx + dy * dy + dz * dz;
    let min_range = f64::from(weapon.min_range);

    if weapon.is_direct_fire() || rad_sq <= min_range * min_range {
        let planar = (dx * dx + dy * dy).sqrt();
        return LaunchSolution {
            flight: FlightMode::Direct,
            pitch: atan2_deg_signed(dz, planar),
            direction,
            v_xy: 0,
            v_z: 0,
            capped: false,
        };
    }

    let range = rad_sq.sqrt();
    let speed = f64::from(weapon.flight_speed);
    let g = f64::from(gravity);

    let a = g * rad_sq / (2.0 * speed * speed);
    let c = 4.0 * a * (dz + a);
    let discriminant = rad_sq - c;

    let (pitch, velocity, capped) = if discriminant < 0.0 || !discriminant.is_finite() {
        // Out of reach at nominal speed: fix the pitch and find the speed that lands on target.
        let t = tan_deg(max_pitch);
        let lift = (range * t - dz).max(1.0);
        let k = g * (1.0 + t * t) / (2.0 * lift);
        let velocity = (k * rad_sq).sqrt() as i32;
        (max_pitch, velocity, true)
    } else {
        let root = discriminant.sqrt();
        let high = atan2_deg_signed(range + root, 2.0 * a);
        let low = atan2_deg_signed(range - root, 2.0 * a);
        let pitch = if low >= 0 { low } else { high };
        (pitch, weapon.flight_speed as i32, false)
    };

    LaunchSolution {
        flight: FlightMode::Indirect,
        pitch,
        direction,
        v_xy: (f64::from(velocity) * cos_deg(pitch)) as i32,
        v_z: (f64::from(velocity) * sin_deg(pitch)) as i32,
        capped,
    }
}

/// Position reached after one flight update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightStep {
    /// New position
    pub position: IVec3,
    /// Progress towards the aim point, 1.0 at the aim point
    pub ratio: f32,
    /// Progress as a whole percentage
    pub percent: u32,
    /// Movement vector the step was interpolated along
    pub movement: IVec3,
}

fn progress(movement: IVec3, travelled: u64) -> (f32, u32) {
    let mx = f64::from(movement.x);
    let my = f64::from(movement.y);
    let target_distance = ((mx * mx + my * my).sqrt() as u64).max(1);
    let ratio = travelled as f32 / target_distance as f32;
    let percent = (travelled * 100 / target_distance).min(u64::from(u32::MAX)) as u32;
    (ratio, percent)
}

fn interpolate(start: IVec2, movement: IVec3, ratio: f32) -> IVec2 {
    IVec2::new(
        start.x + (ratio * movement.x as f32) as i32,
        start.y + (ratio * movement.y as f32) as i32,
    )
}

/// Straight-line position after `elapsed` game time.
///
/// `movement` is the full vector from the launch point (ground plane) and
/// launch height to the aim point.
#[must_use]
pub fn direct_step(
    start: IVec2,
    src_height: i32,
    movement: IVec3,
    speed: u32,
    elapsed: GameTime,
) -> FlightStep {
    let travelled = u64::from(elapsed) * u64::from(speed) / u64::from(GAME_TICKS_PER_SEC);
    let (ratio, percent) = progress(movement, travelled);
    let ground = interpolate(start, movement, ratio);
    FlightStep {
        position: IVec3::new(ground.x, ground.y, src_height + (ratio * movement.z as f32) as i32),
        ratio,
        percent,
        movement,
    }
}

/// Height gained since launch under gravity, in world units.
fn ballistic_rise(v_z: i32, gravity: i32, elapsed: GameTime) -> i64 {
    let t = i64::from(elapsed);
    let ticks = i64::from(GAME_TICKS_PER_SEC);
    (i64::from(v_z) - t * i64::from(gravity) / (ticks * 2)) * t / ticks
}

/// Ballistic position after `elapsed` game time.
#[must_use]
pub fn indirect_step(
    start: IVec2,
    src_height: i32,
    target: IVec2,
    v_xy: i32,
    v_z: i32,
    gravity: i32,
    elapsed: GameTime,
) -> FlightStep {
    let rise = ballistic_rise(v_z, gravity, elapsed);
    let movement = IVec3::new(
        target.x - start.x,
        target.y - start.y,
        rise.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
    );
    let travelled = (i64::from(elapsed) * i64::from(v_xy) / i64::from(GAME_TICKS_PER_SEC)).max(0) as u64;
    let (ratio, percent) = progress(movement, travelled);
    let ground = interpolate(start, movement, ratio);
    let z = (i64::from(src_height) + rise).clamp(0, i64::from(i32::MAX)) as i32;
    FlightStep {
        position: IVec3::new(ground.x, ground.y, z),
        ratio,
        percent,
        movement,
    }
}

/// Instantaneous flight-path angle of a ballistic shot.
#[must_use]
pub fn indirect_pitch(v_xy: i32, v_z: i32, gravity: i32, elapsed: GameTime) -> i32 {
    let vertical = i64::from(v_z) - i64::from(elapsed) * i64::from(gravity) / i64::from(GAME_TICKS_PER_SEC);
    atan2_deg_signed(vertical as f64, f64::from(v_xy))
}
