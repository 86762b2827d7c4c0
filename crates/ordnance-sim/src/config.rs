//! Simulation configuration.
//!
//! Tunable parameters for tick length, ballistics, neighbor queries and
//! match mode. Loaded from and saved to TOML.

use ordnance_common::{PlayerId, MAX_PLAYERS, TILE_UNITS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Game time in milliseconds.
pub type GameTime = u32;

/// Game time units per second.
pub const GAME_TICKS_PER_SEC: u32 = 1000;

/// Downward acceleration in world units per second squared.
pub const ACC_GRAVITY: i32 = 1000;

/// Pitch forced on ballistic shots that cannot reach at nominal speed.
pub const PROJ_MAX_PITCH: i32 = 30;

/// Radius searched for collision candidates.
pub const PROJ_NEIGHBOR_RANGE: i32 = TILE_UNITS * 4;

/// Capacity of the neighbor list.
pub const MAX_NEIGHBORS: usize = 120;

/// Errors raised while reading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("config IO error: {0}")]
    Io(#[from] io::Error),

    /// The file is not valid TOML for this config
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Encoding to TOML failed
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Simulation configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Timing ===
    /// Game time advanced per update pass, in milliseconds
    pub tick_ms: u32,

    // === Ballistics ===
    /// Gravity applied to indirect shots
    pub gravity: i32,
    /// Pitch used when the nominal speed cannot reach the target
    pub max_pitch: i32,

    // === Neighbor queries ===
    /// Search radius for collision candidates (world units)
    pub neighbor_range: i32,
    /// Maximum collision candidates kept per projectile
    pub max_neighbors: usize,

    // === Match ===
    /// Multiplayer rules (quality factor, kill stats, las-sat delay)
    pub multiplayer: bool,
    /// Local observer used for visibility decisions
    pub selected_player: PlayerId,
    /// Seconds a las-sat strike waits before moving in multiplayer
    pub las_sat_delay_secs: u32,
    /// Seed for simulation dice
    pub rng_seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,

            gravity: ACC_GRAVITY,
            max_pitch: PROJ_MAX_PITCH,

            neighbor_range: PROJ_NEIGHBOR_RANGE,
            max_neighbors: MAX_NEIGHBORS,

            multiplayer: false,
            selected_player: PlayerId::new(0),
            las_sat_delay_secs: 4,
            rng_seed: 0,
        }
    }
}

impl SimConfig {
    /// Load configuration from a TOML file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&contents)?;
        config.validate();
        info!("Loaded sim config from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults on any failure.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_from(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load sim config from {}: {e}", path.as_ref().display());
                Self::default()
            },
        }
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(contents)?;
        config.validate();
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        info!("Saved sim config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to usable ranges.
    pub fn validate(&mut self) {
        if self.tick_ms == 0 {
            warn!("tick_ms of 0 would stall the simulation, using 1");
            self.tick_ms = 1;
        }
        if self.gravity <= 0 {
            warn!("Non-positive gravity {}, using {ACC_GRAVITY}", self.gravity);
            self.gravity = ACC_GRAVITY;
        }
        self.max_pitch = self.max_pitch.clamp(1, 89);
        self.neighbor_range = self.neighbor_range.clamp(TILE_UNITS, TILE_UNITS * 16);
        self.max_neighbors = self.max_neighbors.clamp(1, 1024);
        if !self.selected_player.is_valid() {
            warn!("Selected {} out of range, using player 0", self.selected_player);
            self.selected_player = PlayerId::new(0);
        }
        debug_assert!(self.selected_player.raw() < MAX_PLAYERS);
    }

    /// Las-sat delay in game time.
    #[must_use]
    pub fn las_sat_delay(&self) -> GameTime {
        self.las_sat_delay_secs.saturating_mul(GAME_TICKS_PER_SEC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.tick_ms, 100);
        assert_eq!(config.gravity, 1000);
        assert_eq!(config.neighbor_range, 512);
        assert!(!config.multiplayer);
        assert_eq!(config.las_sat_delay(), 4000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SimConfig {
            tick_ms: 0,
            gravity: -5,
            max_pitch: 120,
            max_neighbors: 0,
            selected_player: PlayerId::new(40),
            ..SimConfig::default()
        };

        config.validate();

        assert_eq!(config.tick_ms, 1);
        assert_eq!(config.gravity, ACC_GRAVITY);
        assert_eq!(config.max_pitch, 89);
        assert_eq!(config.max_neighbors, 1);
        assert_eq!(config.selected_player, PlayerId::new(0));
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("sim.toml");

        let config = SimConfig {
            multiplayer: true,
            rng_seed: 77,
            ..SimConfig::default()
        };
        config.save_to(&path).expect("Failed to save config");

        let loaded = SimConfig::load_from(&path).expect("Failed to load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_partial_toml() {
        let config = SimConfig::from_toml_str("multiplayer = true\ntick_ms = 50\n")
            .expect("Failed to parse");
        assert!(config.multiplayer);
        assert_eq!(config.tick_ms, 50);
        assert_eq!(config.gravity, ACC_GRAVITY);
    }

    #[test]
    fn test_config_load_missing_file() {
        assert!(SimConfig::load_from("/nonexistent/path/sim.toml").is_err());
        let config = SimConfig::load_or_default("/nonexistent/path/sim.toml");
        assert_eq!(config, SimConfig::default());
    }
}
