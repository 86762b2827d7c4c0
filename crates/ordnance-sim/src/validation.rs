//! Structural invariant checks.
//!
//! Run on every projectile before its update and on demand through
//! [`crate::Simulation::validate`].

use ordnance_common::{InvariantViolation, ProjectileId};
use serde::{Deserialize, Serialize};

use crate::config::GameTime;
use crate::projectile::{ObjectRef, Projectile};
use crate::simulation::Simulation;
use crate::world::{ObjectQuery, Terrain};

/// How many projectile references deep the check follows.
pub const CHECK_DEPTH: u32 = 2;

/// Checks one projectile and whatever it references.
///
/// References that no longer resolve are skipped; they are cleared at the
/// start of the next update.
pub fn check_projectile<W>(sim: &Simulation, world: &W, proj: &Projectile, depth: u32) -> Result<(), InvariantViolation>
where
    W: ObjectQuery + Terrain + ?Sized,
{
    if !proj.player.is_valid() {
        return Err(InvariantViolation::InvalidPlayer { id: proj.id, player: proj.player });
    }
    if !(0..=360).contains(&proj.direction) {
        return Err(InvariantViolation::InvalidDirection { id: proj.id, direction: proj.direction });
    }

    let source = proj.source.map(ObjectRef::Object);
    for target in [source, proj.destination, proj.damaged].into_iter().flatten() {
        check_reference(sim, world, proj.id, target, depth)?;
    }
    Ok(())
}

fn check_reference<W>(
    sim: &Simulation,
    world: &W,
    owner: ProjectileId,
    target: ObjectRef,
    depth: u32,
) -> Result<(), InvariantViolation>
where
    W: ObjectQuery + Terrain + ?Sized,
{
    match target {
        ObjectRef::Object(handle) => {
            let Some(object) = world.object(handle) else { return Ok(()) };
            if !object.is_feature() && !object.player.is_valid() {
                return Err(InvariantViolation::ObjectPlayer { handle, player: object.player });
            }
            if !world.on_map(object.position.x, object.position.y) {
                return Err(InvariantViolation::ObjectOffMap {
                    handle,
                    x: object.position.x,
                    y: object.position.y,
                });
            }
            Ok(())
        },
        ObjectRef::Projectile(id) if id != owner && depth > 0 => match sim.get(id) {
            Some(other) => check_projectile(sim, world, other, depth - 1),
            None => Ok(()),
        },
        ObjectRef::Projectile(_) => Ok(()),
    }
}

/// Outcome of a full validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether every check held
    pub passed: bool,
    /// Violation messages
    pub violations: Vec<String>,
    /// Projectiles checked
    pub checked: usize,
    /// Game time of the pass
    pub game_time: GameTime,
}

impl ValidationReport {
    /// Builds a report from collected violations.
    #[must_use]
    pub fn new(game_time: GameTime, checked: usize, violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations: violations.iter().map(ToString::to_string).collect(),
            checked,
            game_time,
        }
    }

    /// A passing report.
    #[must_use]
    pub fn pass(game_time: GameTime, checked: usize) -> Self {
        Self::new(game_time, checked, Vec::new())
    }
}
