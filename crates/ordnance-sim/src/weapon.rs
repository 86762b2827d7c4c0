//! Weapon statistics and the weapon registry.
//!
//! Stats are immutable once registered and shared as `Arc<WeaponStats>`;
//! projectiles hold a clone of the `Arc` for their whole life.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use ordnance_common::WeaponId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while loading weapon stats.
#[derive(Debug, Error)]
pub enum WeaponError {
    /// Failed to read file.
    #[error("Failed to read weapon file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("Failed to parse weapon TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error.
    #[error("Weapon validation error: {0}")]
    ValidationError(String),

    /// Duplicate weapon ID.
    #[error("Duplicate weapon ID: {0:?}")]
    DuplicateId(WeaponId),
}

/// Result type for weapon loading operations.
pub type WeaponResult<T> = Result<T, WeaponError>;

// ============================================================================
// Classification
// ============================================================================

/// How a projectile travels from muzzle to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementModel {
    /// Straight line
    Direct,
    /// Ballistic arc
    Indirect,
    /// Straight line bending towards a moving target
    HomingDirect,
    /// Ballistic arc with homing guidance
    HomingIndirect,
    /// Straight line with visual wobble
    ErraticDirect,
    /// Sweeping beam
    Sweep,
}

impl MovementModel {
    /// Returns true for the straight-line models.
    #[must_use]
    pub const fn is_direct(self) -> bool {
        matches!(
            self,
            Self::Direct | Self::HomingDirect | Self::ErraticDirect | Self::Sweep
        )
    }
}

/// Damage class passed to the damage callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponClass {
    /// Solid rounds and explosives
    #[default]
    Kinetic,
    /// Fire and energy
    Heat,
}

/// Weapon family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponSubClass {
    /// Machine guns
    MachineGun,
    /// Cannons
    Cannon,
    /// Mortars
    Mortar,
    /// Guided missiles
    Missile,
    /// Unguided rockets
    Rocket,
    /// Lasers
    Energy,
    /// Rail guns
    Gauss,
    /// Flamethrowers
    Flame,
    /// Howitzers
    Howitzer,
    /// Electronic warfare (capture)
    Electronic,
    /// Anti-aircraft guns
    AaGun,
    /// Slow guided missiles
    SlowMissile,
    /// Slow rockets
    SlowRocket,
    /// Orbital laser strike
    LasSat,
    /// Air-dropped bombs
    Bomb,
    /// Command turret
    Command,
    /// Electromagnetic pulse
    Emp,
    /// Counter-projectile interceptors
    Counter,
}

impl WeaponSubClass {
    /// How far past its aim point a direct-mode projectile may travel,
    /// as a multiple of the target distance.
    #[must_use]
    pub const fn range_extension_factor(self) -> f32 {
        match self {
            Self::MachineGun | Self::Command => 1.2,
            Self::AaGun => 1.0,
            _ => 1.5,
        }
    }

    /// Missile-class weapons can collide with other projectiles.
    #[must_use]
    pub const fn is_missile(self) -> bool {
        matches!(
            self,
            Self::Rocket | Self::Missile | Self::SlowRocket | Self::SlowMissile
        )
    }
}

/// What the warhead is designed against; indexes the modifier tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponEffect {
    /// Against infantry and light targets
    AntiPersonnel,
    /// Against armour
    AntiTank,
    /// Against hardened structures
    BunkerBuster,
    /// Area bombardment
    ArtilleryRound,
    /// Incendiary
    Flamer,
    /// Against aircraft
    AntiAircraft,
}

/// Which domains a weapon can engage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceToAir {
    /// Ground targets only
    #[default]
    Ground,
    /// Airborne targets only
    Air,
    /// Both
    Both,
}

impl SurfaceToAir {
    /// Can engage airborne targets.
    #[must_use]
    pub const fn shoots_in_air(self) -> bool {
        matches!(self, Self::Air | Self::Both)
    }

    /// Can engage ground targets.
    #[must_use]
    pub const fn shoots_on_ground(self) -> bool {
        matches!(self, Self::Ground | Self::Both)
    }

    /// Engages airborne targets and nothing else.
    #[must_use]
    pub const fn is_air_only(self) -> bool {
        matches!(self, Self::Air)
    }
}

// ============================================================================
// Splash hit chance
// ============================================================================

/// One step of a falloff curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitChanceStep {
    /// Applies to candidates at most this far from the blast centre
    pub within: u32,
    /// Percent chance to be hit
    pub percent: u32,
}

/// Per-target chance to be caught by splash damage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HitChance {
    /// Same percentage anywhere inside the blast radius
    Flat(u32),
    /// Percentage chosen by distance, steps ordered by ascending `within`
    Falloff(Vec<HitChanceStep>),
}

impl HitChance {
    /// Percent chance for a candidate at `distance` from the blast centre.
    #[must_use]
    pub fn chance_at(&self, distance: u32) -> u32 {
        match self {
            Self::Flat(percent) => *percent,
            Self::Falloff(steps) => steps
                .iter()
                .find(|step| distance <= step.within)
                .map_or(0, |step| step.percent),
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Flat(percent) if *percent > 100 => Err(format!("hit chance {percent} > 100")),
            Self::Flat(_) => Ok(()),
            Self::Falloff(steps) => {
                if steps.iter().any(|s| s.percent > 100) {
                    return Err("falloff step above 100 percent".to_string());
                }
                if steps.windows(2).any(|w| w[0].within >= w[1].within) {
                    return Err("falloff steps must be strictly ascending".to_string());
                }
                Ok(())
            },
        }
    }
}

impl Default for HitChance {
    fn default() -> Self {
        Self::Flat(100)
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Static statistics for one weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponStats {
    /// Unique weapon identifier
    pub id: WeaponId,
    /// Display name
    pub name: String,
    /// Flight model
    pub movement: MovementModel,
    /// Damage class
    #[serde(default)]
    pub class: WeaponClass,
    /// Weapon family
    pub sub_class: WeaponSubClass,
    /// Warhead type
    pub effect: WeaponEffect,
    /// Engageable domains
    #[serde(default)]
    pub surface_to_air: SurfaceToAir,
    /// Flight speed in world units per second
    pub flight_speed: u32,
    /// Minimum range; indirect weapons fire directly inside it
    #[serde(default)]
    pub min_range: u32,
    /// Maximum range
    pub long_range: u32,
    /// Direct-hit damage
    pub damage: u32,
    /// Splash radius (0 = none)
    #[serde(default)]
    pub radius: u32,
    /// Splash hit chance
    #[serde(default)]
    pub radius_hit: HitChance,
    /// Splash damage
    #[serde(default)]
    pub radius_damage: u32,
    /// How long the blast lingers, in milliseconds
    #[serde(default)]
    pub radius_life: u32,
    /// Fire radius (0 = none)
    #[serde(default)]
    pub incen_radius: u32,
    /// How long the fire burns, in milliseconds
    #[serde(default)]
    pub incen_time: u32,
    /// Burn damage per second
    #[serde(default)]
    pub incen_damage: u32,
    /// Hits on units spawn a continuation projectile
    #[serde(default)]
    pub penetrate: bool,
    /// Explosion sprites face the camera
    #[serde(default)]
    pub face_player: bool,
    /// Sound played on firing
    #[serde(default)]
    pub fire_audio: Option<u32>,
    /// Sound played on impact
    #[serde(default)]
    pub impact_audio: Option<u32>,
}

impl WeaponStats {
    /// Creates stats with no splash, fire or audio.
    #[must_use]
    pub fn new(
        id: WeaponId,
        name: impl Into<String>,
        movement: MovementModel,
        sub_class: WeaponSubClass,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            movement,
            class: WeaponClass::Kinetic,
            sub_class,
            effect: WeaponEffect::AntiTank,
            surface_to_air: SurfaceToAir::Ground,
            flight_speed: 1000,
            min_range: 0,
            long_range: 1024,
            damage: 10,
            radius: 0,
            radius_hit: HitChance::default(),
            radius_damage: 0,
            radius_life: 0,
            incen_radius: 0,
            incen_time: 0,
            incen_damage: 0,
            penetrate: false,
            face_player: false,
            fire_audio: None,
            impact_audio: None,
        }
    }

    /// Sets the damage class.
    #[must_use]
    pub fn with_class(mut self, class: WeaponClass) -> Self {
        self.class = class;
        self
    }

    /// Sets the warhead type.
    #[must_use]
    pub fn with_effect(mut self, effect: WeaponEffect) -> Self {
        self.effect = effect;
        self
    }

    /// Sets the engageable domains.
    #[must_use]
    pub fn with_surface_to_air(mut self, surface_to_air: SurfaceToAir) -> Self {
        self.surface_to_air = surface_to_air;
        self
    }

    /// Sets the flight speed.
    #[must_use]
    pub fn with_flight_speed(mut self, speed: u32) -> Self {
        self.flight_speed = speed;
        self
    }

    /// Sets minimum and maximum range.
    #[must_use]
    pub fn with_range(mut self, min_range: u32, long_range: u32) -> Self {
        self.min_range = min_range;
        self.long_range = long_range;
        self
    }

    /// Sets direct-hit damage.
    #[must_use]
    pub fn with_damage(mut self, damage: u32) -> Self {
        self.damage = damage;
        self
    }

    /// Sets splash radius, damage, hit chance and lifetime.
    #[must_use]
    pub fn with_splash(mut self, radius: u32, damage: u32, hit: HitChance, life: u32) -> Self {
        self.radius = radius;
        self.radius_damage = damage;
        self.radius_hit = hit;
        self.radius_life = life;
        self
    }

    /// Sets fire radius, duration and damage per second.
    #[must_use]
    pub fn with_incendiary(mut self, radius: u32, time: u32, damage: u32) -> Self {
        self.incen_radius = radius;
        self.incen_time = time;
        self.incen_damage = damage;
        self
    }

    /// Sets the penetration flag.
    #[must_use]
    pub fn with_penetrate(mut self, penetrate: bool) -> Self {
        self.penetrate = penetrate;
        self
    }

    /// Sets fire and impact sounds.
    #[must_use]
    pub fn with_audio(mut self, fire: Option<u32>, impact: Option<u32>) -> Self {
        self.fire_audio = fire;
        self.impact_audio = impact;
        self
    }

    /// Returns true if the weapon fires along a straight line.
    #[must_use]
    pub const fn is_direct_fire(&self) -> bool {
        self.movement.is_direct()
    }

    /// Maximum range of the weapon.
    #[must_use]
    pub const fn max_range(&self) -> u32 {
        self.long_range
    }

    /// Validates the stats.
    pub fn validate(&self) -> WeaponResult<()> {
        if self.name.is_empty() {
            return Err(WeaponError::ValidationError(format!(
                "Weapon {:?} has empty name",
                self.id
            )));
        }

        if self.flight_speed == 0 && self.sub_class != WeaponSubClass::LasSat {
            return Err(WeaponError::ValidationError(format!(
                "Weapon {} has zero flight speed",
                self.name
            )));
        }

        if self.long_range < self.min_range {
            return Err(WeaponError::ValidationError(format!(
                "Weapon {} has long range {} below min range {}",
                self.name, self.long_range, self.min_range
            )));
        }

        self.radius_hit.validate().map_err(|e| {
            WeaponError::ValidationError(format!("Weapon {} splash: {e}", self.name))
        })?;

        if self.incen_time > 0 && self.incen_radius == 0 {
            warn!("Weapon {} burns for {}ms but has no fire radius", self.name, self.incen_time);
        }

        Ok(())
    }
}

/// Returns true if the weapon fires along a straight line.
#[must_use]
pub fn is_direct_fire(weapon: &WeaponStats) -> bool {
    weapon.is_direct_fire()
}

/// Maximum range of the weapon.
#[must_use]
pub fn max_range(weapon: &WeaponStats) -> u32 {
    weapon.max_range()
}

// ============================================================================
// Registry
// ============================================================================

/// A collection of weapons from a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponFile {
    /// File format version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Weapons in this file.
    pub weapons: Vec<WeaponStats>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Weapon registry with lookup by id and name.
#[derive(Debug, Default)]
pub struct WeaponRegistry {
    by_id: AHashMap<WeaponId, Arc<WeaponStats>>,
    by_name: AHashMap<String, WeaponId>,
}

impl WeaponRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered weapons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Validates and registers a weapon.
    pub fn register(&mut self, weapon: WeaponStats) -> WeaponResult<Arc<WeaponStats>> {
        weapon.validate()?;
        if self.by_id.contains_key(&weapon.id) {
            return Err(WeaponError::DuplicateId(weapon.id));
        }

        let id = weapon.id;
        self.by_name.insert(weapon.name.to_lowercase(), id);
        let shared = Arc::new(weapon);
        self.by_id.insert(id, Arc::clone(&shared));
        debug!("Registered weapon {} ({id:?})", shared.name);
        Ok(shared)
    }

    /// Gets a weapon by id.
    #[must_use]
    pub fn get(&self, id: WeaponId) -> Option<Arc<WeaponStats>> {
        self.by_id.get(&id).cloned()
    }

    /// Gets a weapon by name (case-insensitive).
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<Arc<WeaponStats>> {
        self.by_name
            .get(&name.to_lowercase())
            .and_then(|id| self.get(*id))
    }

    /// Returns an iterator over all weapons.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<WeaponStats>> {
        self.by_id.values()
    }

    /// Registers every weapon in a TOML document. Returns the count added.
    pub fn load_from_str(&mut self, contents: &str) -> WeaponResult<usize> {
        let file: WeaponFile = toml::from_str(contents)?;
        let count = file.weapons.len();
        for weapon in file.weapons {
            self.register(weapon)?;
        }
        Ok(count)
    }

    /// Registers every weapon in a TOML file. Returns the count added.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> WeaponResult<usize> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let count = self.load_from_str(&contents)?;
        info!("Loaded {count} weapons from {}", path.display());
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cannon() -> WeaponStats {
        WeaponStats::new(WeaponId::new(1), "Light Cannon", MovementModel::Direct, WeaponSubClass::Cannon)
    }

    #[test]
    fn test_direct_models() {
        assert!(MovementModel::Direct.is_direct());
        assert!(MovementModel::HomingDirect.is_direct());
        assert!(MovementModel::ErraticDirect.is_direct());
        assert!(MovementModel::Sweep.is_direct());
        assert!(!MovementModel::Indirect.is_direct());
        assert!(!MovementModel::HomingIndirect.is_direct());
    }

    #[test]
    fn test_extension_factors() {
        assert!((WeaponSubClass::MachineGun.range_extension_factor() - 1.2).abs() < f32::EPSILON);
        assert!((WeaponSubClass::AaGun.range_extension_factor() - 1.0).abs() < f32::EPSILON);
        assert!((WeaponSubClass::Missile.range_extension_factor() - 1.5).abs() < f32::EPSILON);
        assert!(WeaponSubClass::SlowRocket.is_missile());
        assert!(!WeaponSubClass::Counter.is_missile());
    }

    #[test]
    fn test_hit_chance_curve() {
        let curve = HitChance::Falloff(vec![
            HitChanceStep { within: 32, percent: 90 },
            HitChanceStep { within: 96, percent: 40 },
        ]);
        assert_eq!(curve.chance_at(0), 90);
        assert_eq!(curve.chance_at(32), 90);
        assert_eq!(curve.chance_at(50), 40);
        assert_eq!(curve.chance_at(97), 0);
        assert_eq!(HitChance::Flat(65).chance_at(1_000), 65);
    }

    #[test]
    fn test_validation() {
        assert!(cannon().validate().is_ok());
        assert!(cannon().with_flight_speed(0).validate().is_err());
        assert!(cannon().with_range(500, 100).validate().is_err());
        assert!(cannon()
            .with_splash(64, 5, HitChance::Flat(150), 0)
            .validate()
            .is_err());

        let las_sat = WeaponStats::new(WeaponId::new(9), "Sat", MovementModel::Direct, WeaponSubClass::LasSat)
            .with_flight_speed(0);
        assert!(las_sat.validate().is_ok());
    }

    #[test]
    fn test_registry_duplicate_and_lookup() {
        let mut registry = WeaponRegistry::new();
        registry.register(cannon()).expect("register");
        assert!(matches!(registry.register(cannon()), Err(WeaponError::DuplicateId(_))));
        assert_eq!(registry.len(), 1);
        assert!(registry.get_by_name("light cannon").is_some());
        assert!(registry.get(WeaponId::new(2)).is_none());
    }

    #[test]
    fn test_registry_load_toml() {
        let toml_str = r#"
            [[weapons]]
            id = 3
            name = "Mortar"
            movement = "indirect"
            sub_class = "mortar"
            effect = "artillery_round"
            flight_speed = 600
            min_range = 256
            long_range = 1536
            damage = 40
            radius = 128
            radius_damage = 20
            radius_life = 500
            radius_hit = [{ within = 64, percent = 100 }, { within = 128, percent = 50 }]

            [[weapons]]
            id = 4
            name = "Inferno"
            movement = "direct"
            class = "heat"
            sub_class = "flame"
            effect = "flamer"
            flight_speed = 400
            long_range = 384
            damage = 12
            incen_radius = 96
            incen_time = 4000
            incen_damage = 15
        "#;

        let mut registry = WeaponRegistry::new();
        let count = registry.load_from_str(toml_str).expect("load");
        assert_eq!(count, 2);

        let mortar = registry.get(WeaponId::new(3)).expect("mortar");
        assert!(!is_direct_fire(&mortar));
        assert_eq!(max_range(&mortar), 1536);
        assert_eq!(mortar.radius_hit.chance_at(100), 50);

        let flamer = registry.get_by_name("inferno").expect("flamer");
        assert_eq!(flamer.class, WeaponClass::Heat);
        assert_eq!(flamer.radius_hit, HitChance::Flat(100));
        assert_eq!(flamer.surface_to_air, SurfaceToAir::Ground);
    }
}
