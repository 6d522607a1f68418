use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tui_dispatch_debug::debug::{ron_string, DebugSection, DebugState};

use crate::roster::RosterError;
use crate::rules::{self, Archetype};

pub const TICK_MS: u64 = 100;

// One abstract battle "beat" is a second's worth of ticks. All of the
// staged waits below are expressed in beats of that clock.
pub const TICKS_PER_UNIT: u16 = 10;
pub const ENEMY_THINK_TICKS: u16 = 2 * TICKS_PER_UNIT;
pub const STRIKE_WINDUP_TICKS: u16 = TICKS_PER_UNIT;
pub const PROJECTILE_FLIGHT_TICKS: u16 = TICKS_PER_UNIT;
pub const SUMMON_WINDUP_TICKS: u16 = 2 * TICKS_PER_UNIT;
pub const END_BATTLE_TICKS: u16 = 3 * TICKS_PER_UNIT;
pub const RESULTS_STAGE_TICKS: u16 = 3 * TICKS_PER_UNIT;
pub const ERROR_FLASH_TICKS: u16 = TICKS_PER_UNIT;
pub const DAMAGE_FLASH_TICKS: u16 = 2 * TICKS_PER_UNIT;

pub const EVENT_LOG_CAP: usize = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Side {
    Allies,
    Enemies,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Allies => "allies",
            Side::Enemies => "enemies",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Weapon {
    pub name: String,
    pub attack_points: u32,
    pub long_range: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Cast {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Summon {
    pub name: String,
    pub mp_cost: u32,
    pub attack_points: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Item {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Character {
    pub name: String,
    pub archetype: Archetype,
    /// Display row, fixed for the whole battle even as roster indices shift.
    pub slot: usize,
    pub hp: u32,
    pub max_hp: u32,
    pub mp: u32,
    pub max_mp: u32,
    pub xp: u32,
    pub armor_rate: f32,
    pub fades_out: bool,
    pub weapon: Weapon,
    pub casts: Vec<Cast>,
    pub summons: Vec<Summon>,
    pub items: Vec<Item>,
}

impl Character {
    pub fn is_terminated(&self) -> bool {
        self.hp == 0
    }

    pub fn has_casts(&self) -> bool {
        !self.casts.is_empty()
    }

    pub fn has_summons(&self) -> bool {
        !self.summons.is_empty()
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Affordability and deduction stay two explicit steps; menus check
    /// before any mana leaves the pool.
    pub fn can_afford(&self, cost: u32) -> bool {
        self.mp >= cost
    }

    pub fn spend_mana(&mut self, cost: u32) {
        self.mp = self.mp.saturating_sub(cost);
    }

    pub fn gain_experience(&mut self, amount: u32) {
        self.xp = self.xp.saturating_add(amount);
    }

    pub fn next_level_at(&self) -> u32 {
        rules::xp_for_next_level(self.xp, self.archetype)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default, JsonSchema)]
pub struct StatusBar {
    pub current: u32,
    pub max: u32,
}

impl StatusBar {
    pub fn new(current: u32, max: u32) -> Self {
        Self { current, max }
    }

    pub fn set(&mut self, current: u32) {
        self.current = current;
    }

    pub fn ratio(&self) -> f64 {
        if self.max == 0 {
            0.0
        } else {
            f64::from(self.current) / f64::from(self.max)
        }
    }
}

/// What a single hit did to a member, reported back to the reducer so it
/// can flash damage text, drop a knockout marker, and advance the battle.
#[derive(Clone, Debug, PartialEq)]
pub struct EndureOutcome {
    pub endured: u32,
    pub terminated: bool,
    pub slot: usize,
    pub name: String,
    pub faded: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Party {
    pub side: Side,
    pub members: Vec<Character>,
    /// Dense member index -> display slot. Regenerated on every removal.
    pub arrows: Vec<usize>,
    /// Per-slot gauges; empty on the enemy side.
    pub hp_bars: Vec<StatusBar>,
    pub mp_bars: Vec<StatusBar>,
}

impl Party {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            members: Vec::new(),
            arrows: Vec::new(),
            hp_bars: Vec::new(),
            mp_bars: Vec::new(),
        }
    }

    /// Binds a roster to display slots and builds the gauges and the arrow
    /// map. Ally rosters must fill their bar rows exactly; either side must
    /// fit its slots.
    pub fn init(
        side: Side,
        mut members: Vec<Character>,
        slot_count: usize,
    ) -> Result<Self, RosterError> {
        let fits = match side {
            Side::Allies => members.len() == slot_count,
            Side::Enemies => members.len() <= slot_count,
        };
        if !fits {
            return Err(RosterError::SlotMismatch {
                side,
                expected: slot_count,
                found: members.len(),
            });
        }
        for (index, member) in members.iter_mut().enumerate() {
            member.slot = index;
        }
        let (hp_bars, mp_bars) = match side {
            Side::Allies => (
                members
                    .iter()
                    .map(|m| StatusBar::new(m.hp, m.max_hp))
                    .collect(),
                members
                    .iter()
                    .map(|m| StatusBar::new(m.mp, m.max_mp))
                    .collect(),
            ),
            Side::Enemies => (Vec::new(), Vec::new()),
        };
        let mut party = Self {
            side,
            members,
            arrows: Vec::new(),
            hp_bars,
            mp_bars,
        };
        party.update_arrows();
        Ok(party)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn update_arrows(&mut self) {
        self.arrows = self.members.iter().map(|m| m.slot).collect();
    }

    /// Removes the member at `index`, compacting the roster while keeping
    /// relative order. Out-of-range indices (including a second removal of
    /// the same member) are ignored.
    pub fn remove_member(&mut self, index: usize) {
        if index >= self.members.len() {
            return;
        }
        if self.members.len() > 1 {
            self.members.remove(index);
        } else {
            self.members.clear();
        }
        self.update_arrows();
    }

    pub fn sync_hp_bar(&mut self, slot: usize, current: u32) {
        if let Some(bar) = self.hp_bars.get_mut(slot) {
            bar.set(current);
        }
    }

    pub fn sync_mp_bar(&mut self, slot: usize, current: u32) {
        if let Some(bar) = self.mp_bars.get_mut(slot) {
            bar.set(current);
        }
    }

    /// Applies one hit to the member at `index`: armor mitigation, hp floor
    /// at zero, gauge sync, and removal when the hit terminates. Returns
    /// `None` for a stale index.
    pub fn endure_member(&mut self, index: usize, raw_points: u32) -> Option<EndureOutcome> {
        let member = self.members.get_mut(index)?;
        let endured = rules::mitigate(raw_points, member.armor_rate);
        member.hp = member.hp.saturating_sub(endured);
        let outcome = EndureOutcome {
            endured,
            terminated: member.is_terminated(),
            slot: member.slot,
            name: member.name.clone(),
            faded: member.fades_out,
        };
        let (slot, hp) = (member.slot, member.hp);
        self.sync_hp_bar(slot, hp);
        if outcome.terminated {
            self.remove_member(index);
        }
        Some(outcome)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum GameMode {
    Loading,
    Battle,
    LoadFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum MenuScreen {
    None,
    PartySelection,
    ActionSelection,
    CastSelection,
    SummonSelection,
    ItemSelection,
    TargetSelection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ActionKind {
    None,
    Attack,
    Cast,
    Summon,
    UseItem,
}

pub const ACTION_CHOICES: &[&str] = &["Attack", "Cast", "Summon", "Item"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MenuState {
    pub screen: MenuScreen,
    /// One-level history: the screen that was active before the last
    /// forward transition. Falls back to the action menu once spent.
    pub previous: MenuScreen,
    pub action_cursor: usize,
    pub cast_cursor: usize,
    pub summon_cursor: usize,
    pub item_cursor: usize,
    pub target_cursor: usize,
    /// Summons strike the whole opposing roster; the target menu shows
    /// every arrow at once instead of a cursor.
    pub target_all: bool,
    pub pending_kind: ActionKind,
    pub pending_choice: usize,
}

impl Default for MenuState {
    fn default() -> Self {
        Self {
            screen: MenuScreen::None,
            previous: MenuScreen::ActionSelection,
            action_cursor: 0,
            cast_cursor: 0,
            summon_cursor: 0,
            item_cursor: 0,
            target_cursor: 0,
            target_all: false,
            pending_kind: ActionKind::None,
            pending_choice: 0,
        }
    }
}

impl MenuState {
    /// Forward transition: records the current screen as the place Cancel
    /// will come back to.
    pub fn open(&mut self, screen: MenuScreen) {
        self.previous = self.screen;
        self.screen = screen;
    }

    /// Backward transition out of target selection. The history is one
    /// level deep, so the record resets to the action menu once used.
    pub fn return_to_previous(&mut self) {
        self.screen = self.previous;
        self.previous = MenuScreen::ActionSelection;
    }

    pub fn close_all(&mut self) {
        self.screen = MenuScreen::None;
        self.previous = MenuScreen::ActionSelection;
        self.action_cursor = 0;
        self.target_all = false;
        self.pending_kind = ActionKind::None;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BattlePhase {
    Idle,
    AwaitingPlayerChoice,
    ResolvingAction,
    EnemyActing,
    Victory,
    Defeat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BattleOutcome {
    InProgress,
    Victory,
    Defeat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum StrikeStep {
    /// The attack animation is playing; melee damage lands when it ends.
    Windup,
    /// Long-range only: the projectile is in the air, damage waits for it.
    Flight,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum PendingResolution {
    Strike {
        side: Side,
        attacker: usize,
        target: usize,
        step: StrikeStep,
    },
    Summon {
        caster: usize,
        choice: usize,
        targets: Vec<usize>,
        attack_points: u32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ResultsStage {
    Gold,
    Experience,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DamageFlash {
    pub side: Side,
    pub slot: usize,
    pub amount: u32,
    pub ticks_left: u16,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KoMarker {
    pub side: Side,
    pub slot: usize,
    pub name: String,
    /// Faded characters leave the field entirely; the rest stay visible
    /// knocked out.
    pub faded: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AppState {
    pub mode: GameMode,
    pub encounter_path: String,
    pub encounter_name: String,
    pub load_error: Option<String>,

    pub allies: Party,
    pub enemies: Party,
    /// Name rows of the ally panel, fixed at setup.
    pub ally_names: Vec<String>,
    pub ko_markers: Vec<KoMarker>,

    pub menu: MenuState,

    pub phase: BattlePhase,
    /// Countdown for whatever staged wait the current phase is in.
    pub phase_ticks: u16,
    pub pending: Option<PendingResolution>,
    pub player_turn: usize,
    pub enemy_turn: usize,
    pub current_member: usize,

    pub earned_gold: u32,
    pub earned_experience: u32,
    pub results: Option<ResultsStage>,
    pub victory_dance: bool,
    pub dance_frame: u8,

    pub error_ticks: u16,
    pub damage_flashes: Vec<DamageFlash>,
    pub events: VecDeque<String>,
    pub message: String,

    pub seed: u64,
    pub tick: u64,
    pub terminal_size: (u16, u16),
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: GameMode::Loading,
            encounter_path: String::new(),
            encounter_name: String::new(),
            load_error: None,
            allies: Party::new(Side::Allies),
            enemies: Party::new(Side::Enemies),
            ally_names: Vec::new(),
            ko_markers: Vec::new(),
            menu: MenuState::default(),
            phase: BattlePhase::Idle,
            phase_ticks: 0,
            pending: None,
            player_turn: 0,
            enemy_turn: 0,
            current_member: 0,
            earned_gold: 0,
            earned_experience: 0,
            results: None,
            victory_dance: false,
            dance_frame: 0,
            error_ticks: 0,
            damage_flashes: Vec::new(),
            events: VecDeque::new(),
            message: String::new(),
            seed: seed_from_time(),
            tick: 0,
            terminal_size: (0, 0),
        }
    }
}

impl AppState {
    pub fn new(encounter_path: String) -> Self {
        Self {
            encounter_path,
            ..Self::default()
        }
    }

    pub fn outcome(&self) -> BattleOutcome {
        match self.phase {
            BattlePhase::Victory => BattleOutcome::Victory,
            BattlePhase::Defeat => BattleOutcome::Defeat,
            _ => BattleOutcome::InProgress,
        }
    }

    pub fn current_ally(&self) -> Option<&Character> {
        self.allies.members.get(self.current_member)
    }

    pub fn push_event(&mut self, text: impl Into<String>) {
        self.events.push_back(text.into());
        while self.events.len() > EVENT_LOG_CAP {
            self.events.pop_front();
        }
    }
}

impl DebugState for AppState {
    fn debug_sections(&self) -> Vec<DebugSection> {
        let mut sections = vec![
            DebugSection::new("Battle")
                .entry("mode", ron_string(&self.mode))
                .entry("phase", ron_string(&self.phase))
                .entry("outcome", ron_string(&self.outcome()))
                .entry("phase_ticks", ron_string(&self.phase_ticks))
                .entry("player_turn", ron_string(&self.player_turn))
                .entry("enemy_turn", ron_string(&self.enemy_turn))
                .entry("current_member", ron_string(&self.current_member)),
            DebugSection::new("Menu")
                .entry("screen", ron_string(&self.menu.screen))
                .entry("previous", ron_string(&self.menu.previous))
                .entry("action_cursor", ron_string(&self.menu.action_cursor))
                .entry("target_cursor", ron_string(&self.menu.target_cursor))
                .entry("pending_kind", ron_string(&self.menu.pending_kind)),
            DebugSection::new("Parties")
                .entry("allies", ron_string(&self.allies.len()))
                .entry("enemies", ron_string(&self.enemies.len()))
                .entry("arrows", ron_string(&self.allies.arrows))
                .entry("enemy_arrows", ron_string(&self.enemies.arrows)),
        ];

        if let Some(pending) = &self.pending {
            sections.push(DebugSection::new("Pending").entry("action", ron_string(pending)));
        }
        if let Some(stage) = &self.results {
            sections.push(
                DebugSection::new("Results")
                    .entry("stage", ron_string(stage))
                    .entry("gold", ron_string(&self.earned_gold))
                    .entry("experience", ron_string(&self.earned_experience)),
            );
        }

        sections
    }
}

fn seed_from_time() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs() << 32) ^ now.subsec_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, hp: u32) -> Character {
        Character {
            name: name.to_string(),
            archetype: Archetype::Bandit,
            slot: 0,
            hp,
            max_hp: hp,
            mp: 0,
            max_mp: 0,
            xp: 0,
            armor_rate: 0.0,
            fades_out: true,
            weapon: Weapon {
                name: "Club".to_string(),
                attack_points: 10,
                long_range: false,
            },
            casts: Vec::new(),
            summons: Vec::new(),
            items: Vec::new(),
        }
    }

    fn party_of(names: &[&str]) -> Party {
        let members = names.iter().map(|n| member(n, 50)).collect();
        Party::init(Side::Enemies, members, names.len()).unwrap()
    }

    #[test]
    fn init_assigns_slots_and_arrows() {
        let party = party_of(&["a", "b", "c"]);
        assert_eq!(party.members[1].slot, 1);
        assert_eq!(party.arrows, vec![0, 1, 2]);
    }

    #[test]
    fn init_rejects_ally_bar_mismatch() {
        let members = vec![member("a", 50), member("b", 50)];
        assert!(Party::init(Side::Allies, members, 3).is_err());
    }

    #[test]
    fn init_rejects_overfull_enemy_slots() {
        let members = vec![member("a", 50), member("b", 50)];
        assert!(Party::init(Side::Enemies, members, 1).is_err());
    }

    #[test]
    fn removal_compacts_and_keeps_order() {
        let mut party = party_of(&["a", "b", "c"]);
        party.remove_member(1);
        let names: Vec<&str> = party.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(party.arrows, vec![0, 2]);
    }

    #[test]
    fn removing_last_member_empties_roster() {
        let mut party = party_of(&["a"]);
        party.remove_member(0);
        assert!(party.is_empty());
        assert!(party.arrows.is_empty());
    }

    #[test]
    fn repeated_removal_is_ignored() {
        let mut party = party_of(&["a", "b"]);
        party.remove_member(1);
        party.remove_member(1);
        assert_eq!(party.len(), 1);
        party.remove_member(0);
        party.remove_member(0);
        assert!(party.is_empty());
    }

    #[test]
    fn endure_applies_armor_and_floors_at_zero() {
        let mut party = party_of(&["a", "b"]);
        party.members[0].armor_rate = 0.25;
        let outcome = party.endure_member(0, 40).unwrap();
        assert_eq!(outcome.endured, 30);
        assert!(!outcome.terminated);
        assert_eq!(party.members[0].hp, 20);

        let outcome = party.endure_member(0, 100).unwrap();
        assert!(outcome.terminated);
        assert_eq!(party.len(), 1);
        assert_eq!(party.members[0].name, "b");
    }

    #[test]
    fn endure_syncs_ally_bars_by_slot() {
        let members = vec![member("a", 50), member("b", 50)];
        let mut party = Party::init(Side::Allies, members, 2).unwrap();
        party.endure_member(1, 20).unwrap();
        assert_eq!(party.hp_bars[1].current, 30);
        assert_eq!(party.hp_bars[0].current, 50);
    }

    #[test]
    fn endure_out_of_range_is_none() {
        let mut party = party_of(&["a"]);
        assert!(party.endure_member(3, 10).is_none());
    }

    #[test]
    fn mana_check_then_deduct() {
        let mut m = member("sorcerer", 40);
        m.mp = 25;
        assert!(m.can_afford(20));
        assert!(!m.can_afford(30));
        m.spend_mana(20);
        assert_eq!(m.mp, 5);
    }

    #[test]
    fn experience_gain_moves_the_level_threshold() {
        let mut m = member("warrior", 50);
        m.archetype = Archetype::Warrior;
        assert_eq!(m.next_level_at(), 1200);
        m.gain_experience(1350);
        assert_eq!(m.xp, 1350);
        // one chunk banked: 2 * 1200 plus the floor(1200 * 0.17) step
        assert_eq!(m.next_level_at(), 2400 + 204);
        m.gain_experience(u32::MAX);
        assert_eq!(m.xp, u32::MAX);
    }

    #[test]
    fn event_log_stays_capped() {
        let mut state = AppState::default();
        for i in 0..40 {
            state.push_event(format!("event {i}"));
        }
        assert_eq!(state.events.len(), EVENT_LOG_CAP);
        assert_eq!(state.events.back().unwrap(), "event 39");
    }
}
