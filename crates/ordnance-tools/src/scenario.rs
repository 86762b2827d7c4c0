//! Scenario files and the headless runner.
//!
//! A scenario describes a map, the weapons in play, the objects on the map
//! and a schedule of shots. [`run`] plays it against a [`SandboxWorld`] and
//! returns a [`ScenarioReport`] that serializes to JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use glam::IVec3;
use ordnance_common::{MapBounds, ObjectHandle, PlayerId};
use ordnance_sim::{
    Attacker, ChannelSink, CombatTables, ObjectQuery, SandboxWorld, Shot, SimConfig, Simulation, TablesFile,
    ValidationReport, WeaponError, WeaponRegistry, WeaponStats,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Presentation events buffered per tick before the oldest are dropped.
const EVENT_CAPACITY: usize = 4096;

/// Errors raised while loading or running a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Reading the file failed
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid scenario
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),

    /// A weapon failed validation
    #[error(transparent)]
    Weapon(#[from] WeaponError),

    /// A shot names a weapon that is not defined
    #[error("unknown weapon {0:?}")]
    UnknownWeapon(String),

    /// A shot names an object that is not defined
    #[error("unknown object {0:?}")]
    UnknownObject(String),

    /// Two objects share a name
    #[error("object name {0:?} used twice")]
    DuplicateObject(String),

    /// A shot has nothing to aim at
    #[error("shot at tick {0} has neither a target nor a point")]
    NoTarget(u32),

    /// Encoding the report failed
    #[error("failed to encode report: {0}")]
    Report(#[from] serde_json::Error),
}

/// Result type for scenario operations.
pub type ScenarioResult<T> = Result<T, ScenarioError>;

// ============================================================================
// File format
// ============================================================================

/// Map layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSpec {
    /// Width in tiles
    pub width: u32,
    /// Height in tiles
    pub height: u32,
    /// Ground height everywhere
    pub ground_height: i32,
    /// Water tiles
    pub water: Vec<[i32; 2]>,
    /// Allied player pairs
    pub alliances: Vec<[u8; 2]>,
}

impl Default for MapSpec {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            ground_height: 0,
            water: Vec::new(),
            alliances: Vec::new(),
        }
    }
}

/// Object archetypes the sandbox can spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectTemplate {
    /// Medium tank with a weapon turret
    Tank,
    /// Aircraft
    Vtol,
    /// Square structure
    Structure,
    /// Terrain feature
    Feature,
}

/// An object placed on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    /// Name used by shots
    pub name: String,
    /// Archetype
    pub kind: ObjectTemplate,
    /// Owner; ignored for features
    #[serde(default)]
    pub player: PlayerId,
    /// World position
    pub position: IVec3,
    /// Structure size in tiles
    #[serde(default = "default_size")]
    pub size: u32,
    /// Aircraft starts in flight
    #[serde(default)]
    pub airborne: bool,
    /// Feature can be damaged
    #[serde(default = "default_damageable")]
    pub damageable: bool,
    /// Muzzle offset from which this object fires
    #[serde(default)]
    pub muzzle: Option<IVec3>,
}

fn default_size() -> u32 {
    1
}

fn default_damageable() -> bool {
    true
}

/// A scheduled shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotSpec {
    /// Tick before whose update the shot is fired
    pub tick: u32,
    /// Weapon name
    pub weapon: String,
    /// Firing object name
    #[serde(default)]
    pub attacker: Option<String>,
    /// Firing player; defaults to the attacker's owner, else player 0
    #[serde(default)]
    pub player: Option<PlayerId>,
    /// Target object name
    #[serde(default)]
    pub target: Option<String>,
    /// Aim point; defaults to the target's position when fired
    #[serde(default)]
    pub point: Option<IVec3>,
    /// Turret slot on the attacker
    #[serde(default)]
    pub slot: Option<usize>,
    /// Force the shot visible
    #[serde(default)]
    pub visible: bool,
}

/// A complete scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Number of ticks to run
    pub ticks: u32,
    /// Map layout
    #[serde(default)]
    pub map: MapSpec,
    /// Simulation parameters
    #[serde(default)]
    pub config: SimConfig,
    /// Modifiers and upgrades
    #[serde(default)]
    pub tables: TablesFile,
    /// Weapons in play
    #[serde(default)]
    pub weapons: Vec<WeaponStats>,
    /// Objects on the map
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    /// Shot schedule
    #[serde(default)]
    pub shots: Vec<ShotSpec>,
}

impl Scenario {
    /// Parses a scenario from TOML.
    pub fn from_toml_str(contents: &str) -> ScenarioResult<Self> {
        let mut scenario: Self = toml::from_str(contents)?;
        scenario.config.validate();
        Ok(scenario)
    }

    /// Loads a scenario file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> ScenarioResult<Self> {
        let path = path.as_ref();
        let scenario = Self::from_toml_str(&fs::read_to_string(path)?)?;
        info!(
            "Loaded scenario {:?} from {} ({} objects, {} shots)",
            scenario.name,
            path.display(),
            scenario.objects.len(),
            scenario.shots.len()
        );
        Ok(scenario)
    }
}

// ============================================================================
// Report
// ============================================================================

/// Final state of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectReport {
    /// Scenario name of the object
    pub name: String,
    /// Owner at the end of the run
    pub player: PlayerId,
    /// Whether it survived
    pub alive: bool,
    /// Remaining health
    pub health: Option<u32>,
    /// Total damage received
    pub damage_taken: u32,
    /// Experience gained
    pub experience: f32,
}

/// A kill credited to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillReport {
    /// Credited player
    pub player: PlayerId,
    /// Scenario name of the victim
    pub victim: String,
}

/// Outcome of a scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Ticks run
    pub ticks: u32,
    /// Final game time
    pub game_time: u32,
    /// Shots launched
    pub shots_fired: usize,
    /// Shots refused
    pub launch_failures: usize,
    /// Projectiles still alive
    pub projectiles_remaining: usize,
    /// Presentation events emitted
    pub presentation_events: usize,
    /// Kills recorded
    pub kills: Vec<KillReport>,
    /// Per-object results in scenario order
    pub objects: Vec<ObjectReport>,
    /// Final invariant check
    pub validation: ValidationReport,
}

impl ScenarioReport {
    /// Pretty JSON encoding.
    pub fn to_json(&self) -> ScenarioResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// Runner
// ============================================================================

/// A shot with names resolved.
#[derive(Debug, Clone)]
struct PlannedShot {
    tick: u32,
    weapon: Arc<WeaponStats>,
    attacker: Option<ObjectHandle>,
    player: PlayerId,
    target: Option<ObjectHandle>,
    point: Option<IVec3>,
    slot: Option<usize>,
    visible: bool,
}

impl PlannedShot {
    /// Builds the launch request against the current world.
    fn to_shot(&self, world: &SandboxWorld) -> Option<Shot> {
        let aim = self
            .point
            .or_else(|| self.target.and_then(|h| world.object(h)).map(|o| o.position))?;
        let mut shot = Shot::new(Arc::clone(&self.weapon), self.player, aim);
        if let Some(attacker) = self.attacker {
            shot = match self.slot {
                Some(slot) => shot.from_object(attacker, slot),
                None => shot.with_attacker(Attacker::Object(attacker)),
            };
        }
        if let Some(target) = self.target {
            shot = shot.at_object(target);
        }
        if self.visible {
            shot = shot.visible();
        }
        Some(shot)
    }
}

fn spawn(world: &mut SandboxWorld, spec: &ObjectSpec) -> ObjectHandle {
    let handle = match spec.kind {
        ObjectTemplate::Tank => world.spawn_tank(spec.player, spec.position),
        ObjectTemplate::Vtol => world.spawn_vtol(spec.player, spec.position, spec.airborne),
        ObjectTemplate::Structure => world.spawn_structure(spec.player, spec.position, spec.size),
        ObjectTemplate::Feature => world.spawn_feature(spec.position, spec.damageable),
    };
    if let Some(muzzle) = spec.muzzle {
        world.set_muzzle(handle, muzzle);
    }
    debug!("Spawned {} as {handle}", spec.name);
    handle
}

fn plan_shot(
    spec: &ShotSpec,
    registry: &WeaponRegistry,
    names: &BTreeMap<String, ObjectHandle>,
    world: &SandboxWorld,
) -> ScenarioResult<PlannedShot> {
    let weapon = registry
        .get_by_name(&spec.weapon)
        .ok_or_else(|| ScenarioError::UnknownWeapon(spec.weapon.clone()))?;
    let lookup = |name: &Option<String>| -> ScenarioResult<Option<ObjectHandle>> {
        match name {
            Some(name) => names
                .get(name)
                .copied()
                .map(Some)
                .ok_or_else(|| ScenarioError::UnknownObject(name.clone())),
            None => Ok(None),
        }
    };
    let attacker = lookup(&spec.attacker)?;
    let target = lookup(&spec.target)?;
    if target.is_none() && spec.point.is_none() {
        return Err(ScenarioError::NoTarget(spec.tick));
    }

    let player = spec
        .player
        .or_else(|| attacker.and_then(|h| world.object(h)).map(|o| o.player))
        .unwrap_or_default();

    Ok(PlannedShot {
        tick: spec.tick,
        weapon,
        attacker,
        player,
        target,
        point: spec.point,
        slot: spec.slot,
        visible: spec.visible,
    })
}

/// Runs a scenario to completion.
pub fn run(scenario: &Scenario) -> ScenarioResult<ScenarioReport> {
    let mut registry = WeaponRegistry::new();
    for weapon in &scenario.weapons {
        registry.register(weapon.clone())?;
    }

    let map = &scenario.map;
    let mut world = SandboxWorld::new(MapBounds::new(map.width, map.height)).with_ground_height(map.ground_height);
    for [x, y] in &map.water {
        world.set_water(*x, *y);
    }
    for [a, b] in &map.alliances {
        world.ally(PlayerId::new(*a), PlayerId::new(*b));
    }

    let mut names = BTreeMap::new();
    let mut order = Vec::with_capacity(scenario.objects.len());
    for spec in &scenario.objects {
        if names.contains_key(&spec.name) {
            return Err(ScenarioError::DuplicateObject(spec.name.clone()));
        }
        let handle = spawn(&mut world, spec);
        names.insert(spec.name.clone(), handle);
        order.push((spec, handle));
    }

    let mut plan = scenario
        .shots
        .iter()
        .map(|spec| plan_shot(spec, &registry, &names, &world))
        .collect::<ScenarioResult<Vec<_>>>()?;
    plan.sort_by_key(|shot| shot.tick);

    let (sink, events) = ChannelSink::new(EVENT_CAPACITY);
    let mut sim = Simulation::new(scenario.config.clone())
        .with_tables(CombatTables::from_file(&scenario.tables))
        .with_presentation(sink);

    let mut shots_fired = 0;
    let mut launch_failures = 0;
    let mut presentation_events = 0;
    let mut pending = plan.into_iter().peekable();

    for tick in 0..scenario.ticks {
        while let Some(planned) = pending.next_if(|shot| shot.tick <= tick) {
            let launched = match planned.to_shot(&world) {
                Some(shot) => sim.launch(&mut world, shot).map_err(|e| e.to_string()),
                None => Err("target gone and no aim point".to_string()),
            };
            match launched {
                Ok(id) => {
                    debug!("tick {tick}: launched {id} with {}", planned.weapon.name);
                    shots_fired += 1;
                },
                Err(reason) => {
                    warn!("tick {tick}: shot with {} refused: {reason}", planned.weapon.name);
                    launch_failures += 1;
                },
            }
        }
        sim.update_all(&mut world);
        presentation_events += events.try_iter().count();
    }

    let validation = sim.validate(&world);
    if !validation.passed {
        warn!("Scenario ended with {} invariant violations", validation.violations.len());
    }

    let name_of = |handle: ObjectHandle| {
        order
            .iter()
            .find(|(_, h)| *h == handle)
            .map_or_else(|| handle.to_string(), |(spec, _)| spec.name.clone())
    };
    let kills = world
        .log()
        .kills
        .iter()
        .map(|(player, victim)| KillReport { player: *player, victim: name_of(*victim) })
        .collect();
    let objects = order
        .iter()
        .map(|(spec, handle)| ObjectReport {
            name: spec.name.clone(),
            player: world.object(*handle).map_or(spec.player, |o| o.player),
            alive: world.is_alive(*handle),
            health: world.health(*handle),
            damage_taken: world.damage_taken(*handle),
            experience: world.experience(*handle),
        })
        .collect();

    info!(
        "Scenario {:?} finished at {}ms: {shots_fired} shots, {} projectiles left",
        scenario.name,
        sim.game_time(),
        sim.len()
    );

    Ok(ScenarioReport {
        name: scenario.name.clone(),
        ticks: scenario.ticks,
        game_time: sim.game_time(),
        shots_fired,
        launch_failures,
        projectiles_remaining: sim.len(),
        presentation_events,
        kills,
        objects,
        validation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DUEL: &str = r#"
name = "duel"
ticks = 20

[map]
width = 16
height = 16

[config]
rng_seed = 3

[[weapons]]
id = 1
name = "Light Cannon"
movement = "direct"
sub_class = "cannon"
effect = "anti_tank"
flight_speed = 1000
long_range = 2048
damage = 20

[[objects]]
name = "gun"
kind = "tank"
player = 0
position = [200, 200, 0]

[[objects]]
name = "target"
kind = "tank"
player = 1
position = [1000, 200, 0]

[[shots]]
tick = 0
weapon = "light cannon"
attacker = "gun"
target = "target"
slot = 0
"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_toml_str(DUEL).ok();
        let Some(scenario) = scenario else { panic!("scenario should parse") };
        assert_eq!(scenario.ticks, 20);
        assert_eq!(scenario.map.width, 16);
        assert_eq!(scenario.config.rng_seed, 3);
        assert_eq!(scenario.config.tick_ms, 100);
        assert_eq!(scenario.objects.len(), 2);
        assert_eq!(scenario.objects[0].size, 1);
        assert!(scenario.objects[1].damageable);
        assert_eq!(scenario.shots[0].slot, Some(0));
    }

    #[test]
    fn test_run_duel() {
        let Ok(scenario) = Scenario::from_toml_str(DUEL) else { panic!("scenario should parse") };
        let Ok(report) = run(&scenario) else { panic!("scenario should run") };

        assert_eq!(report.shots_fired, 1);
        assert_eq!(report.launch_failures, 0);
        assert_eq!(report.projectiles_remaining, 0);
        assert_eq!(report.game_time, 2000);
        assert!(report.validation.passed);

        let target = &report.objects[1];
        assert_eq!(target.name, "target");
        assert_eq!(target.damage_taken, 20);
        assert_eq!(target.health, Some(80));
        assert!(report.objects[0].experience > 0.0);
        assert!(report.kills.is_empty());
    }

    #[test]
    fn test_report_json() {
        let Ok(scenario) = Scenario::from_toml_str(DUEL) else { panic!("scenario should parse") };
        let json = run(&scenario).and_then(|r| r.to_json());
        let Ok(json) = json else { panic!("report should encode") };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap_or_default();
        assert_eq!(value["name"], "duel");
        assert_eq!(value["objects"][1]["health"], 80);
    }

    #[test]
    fn test_unknown_references() {
        let bad_weapon = DUEL.replace("weapon = \"light cannon\"", "weapon = \"nope\"");
        let scenario = Scenario::from_toml_str(&bad_weapon).ok();
        assert!(matches!(scenario.map(|s| run(&s)), Some(Err(ScenarioError::UnknownWeapon(_)))));

        let bad_target = DUEL.replace("target = \"target\"", "target = \"ghost\"");
        let scenario = Scenario::from_toml_str(&bad_target).ok();
        assert!(matches!(scenario.map(|s| run(&s)), Some(Err(ScenarioError::UnknownObject(_)))));
    }

    #[test]
    fn test_duplicate_object_name() {
        let twice = DUEL.replace("name = \"target\"", "name = \"gun\"");
        let scenario = Scenario::from_toml_str(&twice).ok();
        assert!(matches!(scenario.map(|s| run(&s)), Some(Err(ScenarioError::DuplicateObject(_)))));
    }

    #[test]
    fn test_shot_at_dead_target_is_refused() {
        let scenario = format!(
            "{DUEL}\n[[shots]]\ntick = 15\nweapon = \"Light Cannon\"\nattacker = \"gun\"\ntarget = \"target\"\n"
        );
        let heavy = scenario.replace("damage = 20", "damage = 500");
        let Ok(scenario) = Scenario::from_toml_str(&heavy) else { panic!("scenario should parse") };
        let Ok(report) = run(&scenario) else { panic!("scenario should run") };

        assert!(!report.objects[1].alive);
        assert_eq!(report.shots_fired, 1);
        assert_eq!(report.launch_failures, 1);
    }

    #[test]
    fn test_bundled_skirmish() {
        let scenario = Scenario::from_toml_str(include_str!("../scenarios/skirmish.toml"));
        let Ok(scenario) = scenario else { panic!("skirmish should parse") };
        assert_eq!(scenario.weapons.len(), 3);
        assert!(scenario.config.multiplayer);

        let Ok(report) = run(&scenario) else { panic!("skirmish should run") };
        assert_eq!(report.shots_fired + report.launch_failures, 6);
        assert!(report.validation.passed, "{:?}", report.validation.violations);
        assert_eq!(report.objects.len(), 7);
        assert!(report.objects.iter().any(|o| o.damage_taken > 0));
    }

    #[test]
    fn test_load_from_file() {
        let Ok(mut file) = tempfile::NamedTempFile::new() else { panic!("tempfile") };
        assert!(file.write_all(DUEL.as_bytes()).is_ok());

        let scenario = Scenario::load_from(file.path()).ok();
        assert_eq!(scenario.map(|s| s.name), Some("duel".to_string()));
        assert!(Scenario::load_from("/nonexistent/scenario.toml").is_err());
    }
}
