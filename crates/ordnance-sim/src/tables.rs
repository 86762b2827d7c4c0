//! Damage modifier and research upgrade tables.
//!
//! Both are read-only during a tick. Missing modifier entries count as 100%
//! and players without upgrades deal base damage.

use ahash::AHashMap;
use ordnance_common::{PlayerId, MAX_PLAYERS};
use serde::{Deserialize, Serialize};

use crate::weapon::{WeaponEffect, WeaponResult, WeaponStats};
use crate::world::{ObjectKind, PropulsionKind, StructureStrength};

/// Percentage bonuses from research, per player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerUpgrades {
    /// Extra direct damage percent
    pub damage: u32,
    /// Extra splash damage percent
    pub radius_damage: u32,
    /// Extra splash hit chance percent
    pub radius_hit: u32,
    /// Extra burn damage percent
    pub incen_damage: u32,
}

/// Modifier of a warhead against a propulsion type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropulsionModifier {
    /// Warhead
    pub effect: WeaponEffect,
    /// Target propulsion
    pub propulsion: PropulsionKind,
    /// Percent of base damage dealt
    pub percent: u32,
}

/// Modifier of a warhead against a structure armour class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureModifier {
    /// Warhead
    pub effect: WeaponEffect,
    /// Target armour
    pub strength: StructureStrength,
    /// Percent of base damage dealt
    pub percent: u32,
}

/// Upgrades for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeEntry {
    /// Player the upgrades apply to
    pub player: PlayerId,
    /// Upgrade percentages
    #[serde(flatten)]
    pub upgrades: PlayerUpgrades,
}

/// On-disk layout of the tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesFile {
    /// Propulsion modifiers
    pub propulsion: Vec<PropulsionModifier>,
    /// Structure modifiers
    pub structure: Vec<StructureModifier>,
    /// Player upgrades
    pub upgrades: Vec<UpgradeEntry>,
}

/// Combat lookup tables used by the damage resolver.
#[derive(Debug, Clone)]
pub struct CombatTables {
    propulsion: AHashMap<(WeaponEffect, PropulsionKind), u32>,
    structure: AHashMap<(WeaponEffect, StructureStrength), u32>,
    upgrades: [PlayerUpgrades; MAX_PLAYERS as usize],
}

impl Default for CombatTables {
    fn default() -> Self {
        Self {
            propulsion: AHashMap::new(),
            structure: AHashMap::new(),
            upgrades: [PlayerUpgrades::default(); MAX_PLAYERS as usize],
        }
    }
}

impl CombatTables {
    /// Creates empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds tables from their on-disk layout.
    #[must_use]
    pub fn from_file(file: &TablesFile) -> Self {
        let mut tables = Self::new();
        for m in &file.propulsion {
            tables.set_propulsion_modifier(m.effect, m.propulsion, m.percent);
        }
        for m in &file.structure {
            tables.set_structure_modifier(m.effect, m.strength, m.percent);
        }
        for entry in &file.upgrades {
            tables.set_upgrades(entry.player, entry.upgrades);
        }
        tables
    }

    /// Parses tables from TOML.
    pub fn from_toml_str(contents: &str) -> WeaponResult<Self> {
        let file: TablesFile = toml::from_str(contents)?;
        Ok(Self::from_file(&file))
    }

    /// Sets a propulsion modifier.
    pub fn set_propulsion_modifier(&mut self, effect: WeaponEffect, propulsion: PropulsionKind, percent: u32) {
        self.propulsion.insert((effect, propulsion), percent);
    }

    /// Sets a structure modifier.
    pub fn set_structure_modifier(&mut self, effect: WeaponEffect, strength: StructureStrength, percent: u32) {
        self.structure.insert((effect, strength), percent);
    }

    /// Sets the upgrades of a player. Out-of-range players are ignored.
    pub fn set_upgrades(&mut self, player: PlayerId, upgrades: PlayerUpgrades) {
        if let Some(slot) = self.upgrades.get_mut(usize::from(player.raw())) {
            *slot = upgrades;
        }
    }

    fn upgrades_of(&self, player: PlayerId) -> PlayerUpgrades {
        self.upgrades
            .get(usize::from(player.raw()))
            .copied()
            .unwrap_or_default()
    }

    /// Percent of damage a warhead deals to a target of this kind.
    #[must_use]
    pub fn modifier(&self, effect: WeaponEffect, kind: &ObjectKind) -> u32 {
        match kind {
            ObjectKind::Unit(unit) => self
                .propulsion
                .get(&(effect, unit.propulsion))
                .copied()
                .unwrap_or(100),
            ObjectKind::Structure(s) => self
                .structure
                .get(&(effect, s.strength))
                .copied()
                .unwrap_or(100),
            ObjectKind::Feature(_) => 100,
        }
    }

    /// Direct damage including the player's upgrades.
    #[must_use]
    pub fn weapon_damage(&self, weapon: &WeaponStats, player: PlayerId) -> u32 {
        apply_percent(weapon.damage, self.upgrades_of(player).damage)
    }

    /// Splash damage including the player's upgrades.
    #[must_use]
    pub fn radius_damage(&self, weapon: &WeaponStats, player: PlayerId) -> u32 {
        apply_percent(weapon.radius_damage, self.upgrades_of(player).radius_damage)
    }

    /// Splash hit chance at `distance`, including upgrades, capped at 100.
    #[must_use]
    pub fn radius_hit(&self, weapon: &WeaponStats, player: PlayerId, distance: u32) -> u32 {
        apply_percent(weapon.radius_hit.chance_at(distance), self.upgrades_of(player).radius_hit).min(100)
    }

    /// Burn damage per second including the player's upgrades.
    #[must_use]
    pub fn incen_damage(&self, weapon: &WeaponStats, player: PlayerId) -> u32 {
        apply_percent(weapon.incen_damage, self.upgrades_of(player).incen_damage)
    }
}

fn apply_percent(base: u32, bonus: u32) -> u32 {
    (u64::from(base) * u64::from(100 + bonus) / 100) as u32
}
