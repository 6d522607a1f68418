use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::{self, Archetype};
use crate::state::{Cast, Character, Item, Party, Side, Summon, Weapon};

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("failed to read encounter file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse encounter file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{side:?} roster does not fit its layout ({found} members for {expected} slots)")]
    SlotMismatch {
        side: Side,
        expected: usize,
        found: usize,
    },
    #[error("{side:?} roster is empty")]
    EmptySide { side: Side },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncounterManifest {
    pub name: String,
    pub ally_slots: usize,
    pub enemy_slots: usize,
    pub allies: Vec<MemberSpec>,
    pub enemies: Vec<MemberSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MemberSpec {
    pub name: String,
    pub archetype: Archetype,
    #[serde(default)]
    pub xp: u32,
    /// Authored pools, used whenever the experience formulas derive zero
    /// (fresh characters, and every Bandit).
    #[serde(default)]
    pub hp: u32,
    #[serde(default)]
    pub mp: u32,
    #[serde(default)]
    pub armor_rate: f32,
    #[serde(default)]
    pub fades_out: bool,
    pub weapon: WeaponSpec,
    #[serde(default)]
    pub casts: Vec<String>,
    #[serde(default)]
    pub summons: Vec<SummonSpec>,
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeaponSpec {
    pub name: String,
    pub attack_points: u32,
    #[serde(default)]
    pub long_range: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummonSpec {
    pub name: String,
    pub mp_cost: u32,
    pub attack_points: u32,
}

/// A validated encounter, ready to drop into the battle state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncounterRuntime {
    pub name: String,
    pub allies: Party,
    pub enemies: Party,
}

pub async fn load_encounter(path: &Path) -> Result<EncounterRuntime, RosterError> {
    let contents = tokio::fs::read_to_string(path).await?;
    let manifest: EncounterManifest = serde_json::from_str(&contents)?;
    build_encounter(manifest)
}

pub fn build_encounter(manifest: EncounterManifest) -> Result<EncounterRuntime, RosterError> {
    if manifest.allies.is_empty() {
        return Err(RosterError::EmptySide { side: Side::Allies });
    }
    if manifest.enemies.is_empty() {
        return Err(RosterError::EmptySide {
            side: Side::Enemies,
        });
    }
    let allies = Party::init(
        Side::Allies,
        manifest.allies.iter().map(build_character).collect(),
        manifest.ally_slots,
    )?;
    let enemies = Party::init(
        Side::Enemies,
        manifest.enemies.iter().map(build_character).collect(),
        manifest.enemy_slots,
    )?;
    Ok(EncounterRuntime {
        name: manifest.name,
        allies,
        enemies,
    })
}

fn build_character(spec: &MemberSpec) -> Character {
    let derived_hp = rules::hp_pool(spec.xp, spec.archetype);
    let derived_mp = rules::mp_pool(spec.xp, spec.archetype);
    let max_hp = if derived_hp == 0 { spec.hp } else { derived_hp };
    let max_mp = if derived_mp == 0 { spec.mp } else { derived_mp };
    Character {
        name: spec.name.clone(),
        archetype: spec.archetype,
        slot: 0,
        hp: max_hp,
        max_hp,
        mp: max_mp,
        max_mp,
        xp: spec.xp,
        armor_rate: spec.armor_rate.clamp(0.0, 1.0),
        fades_out: spec.fades_out,
        weapon: Weapon {
            name: spec.weapon.name.clone(),
            attack_points: spec.weapon.attack_points,
            long_range: spec.weapon.long_range,
        },
        casts: spec
            .casts
            .iter()
            .map(|name| Cast { name: name.clone() })
            .collect(),
        summons: spec
            .summons
            .iter()
            .map(|s| Summon {
                name: s.name.clone(),
                mp_cost: s.mp_cost,
                attack_points: s.attack_points,
            })
            .collect(),
        items: spec
            .items
            .iter()
            .map(|name| Item { name: name.clone() })
            .collect(),
    }
}
