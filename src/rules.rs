use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Archetype {
    Warrior,
    Archer,
    Sorcerer,
    Bandit,
}

impl Archetype {
    pub fn label(self) -> &'static str {
        match self {
            Archetype::Warrior => "Warrior",
            Archetype::Archer => "Archer",
            Archetype::Sorcerer => "Sorcerer",
            Archetype::Bandit => "Bandit",
        }
    }
}

// The hp/mp rates double as starting pools and the xp rate is the
// level-2 threshold. Bandit is enemy-only and has no growth table.
const WARRIOR_HP_RATE: u32 = 110;
const WARRIOR_MP_RATE: u32 = 0;
const WARRIOR_XP_RATE: u32 = 1200;
const ARCHER_HP_RATE: u32 = 90;
const ARCHER_MP_RATE: u32 = 0;
const ARCHER_XP_RATE: u32 = 1400;
const SORCERER_HP_RATE: u32 = 76;
const SORCERER_MP_RATE: u32 = 30;
const SORCERER_XP_RATE: u32 = 1500;

pub const HP_GROWTH_RATE: f32 = 0.17;
pub const LEVEL_GROWTH_RATE: f32 = 0.17;

pub fn hp_rate(archetype: Archetype) -> u32 {
    match archetype {
        Archetype::Warrior => WARRIOR_HP_RATE,
        Archetype::Archer => ARCHER_HP_RATE,
        Archetype::Sorcerer => SORCERER_HP_RATE,
        Archetype::Bandit => 0,
    }
}

pub fn mp_rate(archetype: Archetype) -> u32 {
    match archetype {
        Archetype::Warrior => WARRIOR_MP_RATE,
        Archetype::Archer => ARCHER_MP_RATE,
        Archetype::Sorcerer => SORCERER_MP_RATE,
        Archetype::Bandit => 0,
    }
}

pub fn level_rate(archetype: Archetype) -> u32 {
    match archetype {
        Archetype::Warrior => WARRIOR_XP_RATE,
        Archetype::Archer => ARCHER_XP_RATE,
        Archetype::Sorcerer => SORCERER_XP_RATE,
        Archetype::Bandit => 0,
    }
}

fn growth_factor(chunks: u32, rate: u32, growth: f32) -> u32 {
    chunks * (rate as f32 * growth) as u32
}

/// Derived hp pool for a character with the given lifetime experience.
/// A rate of zero (Bandit) derives zero; callers fall back to authored
/// pools in that case.
pub fn hp_pool(xp: u32, archetype: Archetype) -> u32 {
    let rate = hp_rate(archetype);
    if rate == 0 {
        return 0;
    }
    let chunks = xp / rate;
    chunks + growth_factor(chunks, rate, HP_GROWTH_RATE)
}

/// Derived mp pool. Shares the hp growth constant.
pub fn mp_pool(xp: u32, archetype: Archetype) -> u32 {
    let rate = mp_rate(archetype);
    if rate == 0 {
        return 0;
    }
    let chunks = xp / rate;
    chunks + growth_factor(chunks, rate, HP_GROWTH_RATE)
}

/// Experience total at which the next level is reached. Grows by more
/// than one rate chunk per level so later levels come slower.
pub fn xp_for_next_level(xp: u32, archetype: Archetype) -> u32 {
    let rate = level_rate(archetype);
    if rate == 0 {
        return 0;
    }
    let chunks = xp / rate;
    (chunks + 1) * rate + growth_factor(chunks, rate, LEVEL_GROWTH_RATE)
}

/// Damage actually endured after armor: the mitigated share is floored,
/// so armor below 1.0 never absorbs a full hit outright. Saturating,
/// since f32 rounding can push the absorbed share past the hit itself
/// once points outgrow the 24-bit mantissa.
pub fn mitigate(points: u32, armor_rate: f32) -> u32 {
    points.saturating_sub((points as f32 * armor_rate) as u32)
}

pub const GOLD_PER_ENEMY: u32 = 11;
pub const XP_PER_ENEMY: u32 = 27;

pub fn gold_reward(enemy_count: usize) -> u32 {
    enemy_count as u32 * GOLD_PER_ENEMY
}

pub fn xp_reward(enemy_count: usize) -> u32 {
    enemy_count as u32 * XP_PER_ENEMY
}

pub fn next_u32(seed: &mut u64) -> u32 {
    *seed = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    (*seed >> 32) as u32
}

/// Uniform index into a non-empty list. Callers check emptiness first.
pub fn random_index(seed: &mut u64, len: usize) -> usize {
    (next_u32(seed) % len as u32) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mitigation_floors_absorbed_share() {
        assert_eq!(mitigate(40, 0.0), 40);
        assert_eq!(mitigate(40, 0.25), 30);
        assert_eq!(mitigate(10, 0.17), 9);
        assert_eq!(mitigate(40, 1.0), 0);
        assert_eq!(mitigate(0, 0.5), 0);
    }

    #[test]
    fn mitigation_never_exceeds_the_hit() {
        // 99_999_999 rounds up to 1e8 as f32, so the absorbed share
        // overshoots the hit; the result must clamp at zero.
        assert_eq!(mitigate(99_999_999, 1.0), 0);
        assert_eq!(mitigate(u32::MAX, 1.0), 0);
    }

    #[test]
    fn pools_at_zero_xp_are_zero() {
        assert_eq!(hp_pool(0, Archetype::Warrior), 0);
        assert_eq!(mp_pool(0, Archetype::Sorcerer), 0);
    }

    #[test]
    fn bandit_has_no_growth_table() {
        assert_eq!(hp_pool(5000, Archetype::Bandit), 0);
        assert_eq!(mp_pool(5000, Archetype::Bandit), 0);
        assert_eq!(xp_for_next_level(5000, Archetype::Bandit), 0);
    }

    #[test]
    fn warrior_pool_growth() {
        // one full chunk: 1200 / 110 = 10 chunks, step floor(110 * 0.17) = 18
        assert_eq!(hp_pool(1200, Archetype::Warrior), 10 + 10 * 18);
        // warriors never gain mana
        assert_eq!(mp_pool(1200, Archetype::Warrior), 0);
    }

    #[test]
    fn sorcerer_mana_growth() {
        // 1500 / 30 = 50 chunks, step floor(30 * 0.17) = 5
        assert_eq!(mp_pool(1500, Archetype::Sorcerer), 50 + 50 * 5);
    }

    #[test]
    fn level_threshold_starts_at_rate() {
        assert_eq!(xp_for_next_level(0, Archetype::Warrior), 1200);
        assert_eq!(xp_for_next_level(0, Archetype::Archer), 1400);
        // one chunk in: floor(1200 * 0.17) = 204 on top of the linear step
        assert_eq!(xp_for_next_level(1200, Archetype::Warrior), 2400 + 204);
    }

    #[test]
    fn rewards_scale_with_enemy_count() {
        assert_eq!(gold_reward(3), 33);
        assert_eq!(xp_reward(3), 81);
        assert_eq!(gold_reward(0), 0);
    }

    #[test]
    fn random_index_stays_in_bounds() {
        let mut seed = 42;
        for _ in 0..200 {
            assert!(random_index(&mut seed, 3) < 3);
        }
    }

    #[test]
    fn random_index_reaches_every_slot() {
        let mut seed = 7;
        let mut seen = [false; 3];
        for _ in 0..200 {
            seen[random_index(&mut seed, 3)] = true;
        }
        assert_eq!(seen, [true, true, true]);
    }
}
