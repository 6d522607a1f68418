use tui_dispatch::DispatchResult;

use crate::action::Action;
use crate::effect::Effect;
use crate::roster::EncounterRuntime;
use crate::rules;
use crate::state::{
    ActionKind, AppState, BattlePhase, DamageFlash, GameMode, KoMarker, MenuScreen, MenuState,
    PendingResolution, ResultsStage, Side, StrikeStep, ACTION_CHOICES, DAMAGE_FLASH_TICKS,
    END_BATTLE_TICKS, ENEMY_THINK_TICKS, ERROR_FLASH_TICKS, PROJECTILE_FLIGHT_TICKS,
    RESULTS_STAGE_TICKS, STRIKE_WINDUP_TICKS, SUMMON_WINDUP_TICKS,
};

pub fn reducer(state: &mut AppState, action: Action) -> DispatchResult<Effect> {
    match action {
        Action::Init => {
            state.mode = GameMode::Loading;
            state.message = format!("Loading {}", state.encounter_path);
            DispatchResult::changed_with(Effect::LoadEncounter {
                path: state.encounter_path.clone(),
            })
        }

        Action::UiTerminalResize(width, height) => {
            if state.terminal_size == (width, height) {
                DispatchResult::unchanged()
            } else {
                state.terminal_size = (width, height);
                DispatchResult::changed()
            }
        }

        Action::Tick => tick(state),

        Action::MenuUp => menu_move(state, -1),
        Action::MenuDown => menu_move(state, 1),
        Action::MenuConfirm => menu_confirm(state),
        Action::MenuCancel => menu_cancel(state),

        Action::EncounterDidLoad(runtime) => encounter_loaded(state, *runtime),

        Action::EncounterDidError { error } => {
            state.mode = GameMode::LoadFailed;
            state.load_error = Some(error);
            DispatchResult::changed()
        }

        Action::Quit => DispatchResult::unchanged(),
    }
}

fn encounter_loaded(state: &mut AppState, runtime: EncounterRuntime) -> DispatchResult<Effect> {
    state.encounter_name = runtime.name;
    state.allies = runtime.allies;
    state.enemies = runtime.enemies;
    state.ally_names = state
        .allies
        .members
        .iter()
        .map(|member| member.name.clone())
        .collect();
    state.earned_gold = rules::gold_reward(state.enemies.len());
    state.earned_experience = rules::xp_reward(state.enemies.len());
    state.mode = GameMode::Battle;
    state.player_turn = 0;
    state.enemy_turn = 0;
    state.current_member = 0;
    state.message = format!("{} begins", state.encounter_name);
    let name = state.encounter_name.clone();
    state.push_event(format!("{name} begins!"));
    turn_next(state);
    DispatchResult::changed()
}

// One scheduler step. Checks victory and defeat first, then hands the
// turn to the next ally who has not acted, then to the next enemy.
// When both cursors run off the end the round starts over.
fn turn_next(state: &mut AppState) {
    if state.enemies.is_empty() {
        state.phase = BattlePhase::Victory;
        state.phase_ticks = END_BATTLE_TICKS;
        state.menu.close_all();
        return;
    }
    if state.allies.is_empty() {
        // End scene switches over right away; the closing message waits
        // out the same delay the victory path uses.
        state.phase = BattlePhase::Defeat;
        state.phase_ticks = END_BATTLE_TICKS;
        state.menu.close_all();
        return;
    }
    if state.player_turn < state.allies.len() {
        state.current_member = state.player_turn;
        state.player_turn += 1;
        state.menu = MenuState {
            screen: MenuScreen::ActionSelection,
            ..MenuState::default()
        };
        state.phase = BattlePhase::AwaitingPlayerChoice;
        return;
    }
    if state.enemy_turn >= state.enemies.len() {
        state.player_turn = 0;
        state.enemy_turn = 0;
        turn_next(state);
        return;
    }
    state.phase = BattlePhase::EnemyActing;
    state.pending = None;
    state.phase_ticks = ENEMY_THINK_TICKS;
}

fn tick(state: &mut AppState) -> DispatchResult<Effect> {
    state.tick = state.tick.wrapping_add(1);
    let mut changed = false;
    let mut effects = Vec::new();

    if state.victory_dance {
        state.dance_frame = state.dance_frame.wrapping_add(1);
        changed = true;
    }
    if state.error_ticks > 0 {
        state.error_ticks -= 1;
        changed = true;
    }
    if !state.damage_flashes.is_empty() {
        for flash in &mut state.damage_flashes {
            flash.ticks_left = flash.ticks_left.saturating_sub(1);
        }
        state.damage_flashes.retain(|flash| flash.ticks_left > 0);
        changed = true;
    }
    if state.phase_ticks > 0 {
        state.phase_ticks -= 1;
        changed = true;
        if state.phase_ticks == 0 {
            phase_elapsed(state, &mut effects);
        }
    }

    if !effects.is_empty() {
        DispatchResult::changed_with_many(effects)
    } else if changed {
        DispatchResult::changed()
    } else {
        DispatchResult::unchanged()
    }
}

// A staged wait ran out. What happens next depends on which phase was
// waiting: an enemy finishing its think delay starts a strike, a strike
// wind-up lands or launches its projectile, a summon wind-up hits the
// whole enemy line, and the end screens advance their result stages.
fn phase_elapsed(state: &mut AppState, effects: &mut Vec<Effect>) {
    match state.phase {
        BattlePhase::EnemyActing if state.pending.is_none() => enemy_strike(state, effects),
        BattlePhase::ResolvingAction | BattlePhase::EnemyActing => resolve_pending(state),
        BattlePhase::Victory => advance_victory(state),
        BattlePhase::Defeat => {
            state.message = "The party has fallen.".to_string();
            state.push_event("Defeat...");
        }
        BattlePhase::Idle | BattlePhase::AwaitingPlayerChoice => {}
    }
}

fn enemy_strike(state: &mut AppState, effects: &mut Vec<Effect>) {
    let cursor = state.enemy_turn;
    state.enemy_turn += 1;
    if cursor >= state.enemies.len() {
        // The roster shrank while this enemy was waiting to act. Skip
        // the slot instead of stalling the round.
        turn_next(state);
        return;
    }
    let target = rules::random_index(&mut state.seed, state.allies.len());
    start_strike(state, Side::Enemies, cursor, target, effects);
}

fn start_strike(
    state: &mut AppState,
    side: Side,
    attacker: usize,
    target: usize,
    effects: &mut Vec<Effect>,
) {
    let party = match side {
        Side::Allies => &state.allies,
        Side::Enemies => &state.enemies,
    };
    let foes = match side {
        Side::Allies => &state.enemies,
        Side::Enemies => &state.allies,
    };
    let Some(member) = party.members.get(attacker) else {
        turn_next(state);
        return;
    };
    let Some(foe) = foes.members.get(target) else {
        turn_next(state);
        return;
    };
    let attacker_name = member.name.clone();
    let target_name = foe.name.clone();
    let long_range = member.weapon.long_range;
    state.pending = Some(PendingResolution::Strike {
        side,
        attacker,
        target,
        step: StrikeStep::Windup,
    });
    state.phase = match side {
        Side::Allies => BattlePhase::ResolvingAction,
        Side::Enemies => BattlePhase::EnemyActing,
    };
    state.phase_ticks = STRIKE_WINDUP_TICKS;
    state.push_event(format!("{attacker_name} attacks {target_name}."));
    effects.push(Effect::PlayStrikeSound { long_range });
}

fn resolve_pending(state: &mut AppState) {
    match state.pending.take() {
        Some(PendingResolution::Strike {
            side,
            attacker,
            target,
            step,
        }) => {
            let party = match side {
                Side::Allies => &state.allies,
                Side::Enemies => &state.enemies,
            };
            let Some(member) = party.members.get(attacker) else {
                turn_next(state);
                return;
            };
            if step == StrikeStep::Windup && member.weapon.long_range {
                // The swing animation ends before a ranged shot lands;
                // damage waits for the projectile.
                state.pending = Some(PendingResolution::Strike {
                    side,
                    attacker,
                    target,
                    step: StrikeStep::Flight,
                });
                state.phase_ticks = PROJECTILE_FLIGHT_TICKS;
                return;
            }
            let points = member.weapon.attack_points;
            let target_side = match side {
                Side::Allies => Side::Enemies,
                Side::Enemies => Side::Allies,
            };
            apply_hit(state, target_side, target, points);
            turn_next(state);
        }
        Some(PendingResolution::Summon {
            caster,
            choice,
            targets,
            attack_points,
        }) => {
            if let Some(name) = state
                .allies
                .members
                .get(caster)
                .and_then(|member| member.summons.get(choice))
                .map(|summon| summon.name.clone())
            {
                state.push_event(format!("{name} sweeps the enemy line!"));
            }
            // Highest index first so earlier removals cannot shift the
            // slots still waiting to be hit.
            for index in targets.into_iter().rev() {
                apply_hit(state, Side::Enemies, index, attack_points);
            }
            turn_next(state);
        }
        None => turn_next(state),
    }
}

fn apply_hit(state: &mut AppState, target_side: Side, index: usize, points: u32) {
    let party = match target_side {
        Side::Allies => &mut state.allies,
        Side::Enemies => &mut state.enemies,
    };
    let Some(outcome) = party.endure_member(index, points) else {
        return;
    };
    // A fresh hit restarts the flash on that slot.
    state
        .damage_flashes
        .retain(|flash| flash.side != target_side || flash.slot != outcome.slot);
    state.damage_flashes.push(DamageFlash {
        side: target_side,
        slot: outcome.slot,
        amount: outcome.endured,
        ticks_left: DAMAGE_FLASH_TICKS,
    });
    let name = outcome.name.clone();
    let endured = outcome.endured;
    state.push_event(format!("{name} endures {endured} damage."));
    if outcome.terminated {
        state.ko_markers.push(KoMarker {
            side: target_side,
            slot: outcome.slot,
            name: outcome.name.clone(),
            faded: outcome.faded,
        });
        if outcome.faded {
            state.push_event(format!("{name} fades from the field."));
        } else {
            state.push_event(format!("{name} is knocked out."));
        }
    }
}

fn advance_victory(state: &mut AppState) {
    match state.results {
        None if !state.victory_dance => {
            // Battle scene gives way to the results screen.
            state.victory_dance = true;
            state.results = Some(ResultsStage::Gold);
            state.phase_ticks = RESULTS_STAGE_TICKS;
            state.message = "Victory!".to_string();
            let gold = state.earned_gold;
            let experience = state.earned_experience;
            state.push_event("Victory!");
            state.push_event(format!("The party recovers {gold} gold."));
            state.push_event(format!("Each survivor earns {experience} experience."));
        }
        Some(ResultsStage::Gold) => {
            state.results = Some(ResultsStage::Experience);
            state.phase_ticks = RESULTS_STAGE_TICKS;
        }
        Some(ResultsStage::Experience) => {
            state.results = None;
            state.message = "The battle is over.".to_string();
        }
        None => {}
    }
}

fn menu_move(state: &mut AppState, delta: i32) -> DispatchResult<Effect> {
    if state.mode != GameMode::Battle || state.phase != BattlePhase::AwaitingPlayerChoice {
        return DispatchResult::unchanged();
    }
    let Some(ally) = state.current_ally() else {
        return DispatchResult::unchanged();
    };
    let (cast_len, summon_len, item_len) =
        (ally.casts.len(), ally.summons.len(), ally.items.len());
    let menu = &mut state.menu;
    match menu.screen {
        MenuScreen::ActionSelection => {
            menu.action_cursor = wrap_cursor(menu.action_cursor, delta, ACTION_CHOICES.len());
        }
        MenuScreen::CastSelection => {
            menu.cast_cursor = wrap_cursor(menu.cast_cursor, delta, cast_len);
        }
        MenuScreen::SummonSelection => {
            menu.summon_cursor = wrap_cursor(menu.summon_cursor, delta, summon_len);
        }
        MenuScreen::ItemSelection => {
            menu.item_cursor = wrap_cursor(menu.item_cursor, delta, item_len);
        }
        MenuScreen::TargetSelection => {
            if menu.target_all {
                // Every enemy is already marked; the cursor has nothing
                // to point at.
                return DispatchResult::unchanged();
            }
            menu.target_cursor = wrap_cursor(menu.target_cursor, delta, state.enemies.len());
        }
        MenuScreen::None | MenuScreen::PartySelection => return DispatchResult::unchanged(),
    }
    DispatchResult::changed()
}

fn wrap_cursor(current: usize, delta: i32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    if delta < 0 {
        if current == 0 {
            len - 1
        } else {
            current - 1
        }
    } else if current + 1 >= len {
        0
    } else {
        current + 1
    }
}

fn menu_confirm(state: &mut AppState) -> DispatchResult<Effect> {
    if state.mode != GameMode::Battle || state.phase != BattlePhase::AwaitingPlayerChoice {
        return DispatchResult::unchanged();
    }
    match state.menu.screen {
        MenuScreen::ActionSelection => confirm_action(state),
        MenuScreen::CastSelection => confirm_cast(state),
        MenuScreen::SummonSelection => confirm_summon(state),
        MenuScreen::ItemSelection => confirm_item(state),
        MenuScreen::TargetSelection => confirm_target(state),
        MenuScreen::None | MenuScreen::PartySelection => DispatchResult::unchanged(),
    }
}

fn confirm_action(state: &mut AppState) -> DispatchResult<Effect> {
    match state.menu.action_cursor {
        0 => {
            state.menu.pending_kind = ActionKind::Attack;
            state.menu.open(MenuScreen::TargetSelection);
            state.menu.target_cursor = 0;
            state.menu.target_all = false;
        }
        1 => {
            state.menu.open(MenuScreen::CastSelection);
            state.menu.cast_cursor = 0;
        }
        2 => {
            state.menu.open(MenuScreen::SummonSelection);
            state.menu.summon_cursor = 0;
        }
        3 => {
            state.menu.open(MenuScreen::ItemSelection);
            state.menu.item_cursor = 0;
        }
        _ => return DispatchResult::unchanged(),
    }
    DispatchResult::changed()
}

fn confirm_cast(state: &mut AppState) -> DispatchResult<Effect> {
    let Some(ally) = state.current_ally() else {
        return DispatchResult::unchanged();
    };
    if !ally.has_casts() || state.menu.cast_cursor >= ally.casts.len() {
        return error_flash(state);
    }
    state.menu.pending_choice = state.menu.cast_cursor;
    state.menu.pending_kind = ActionKind::Cast;
    state.menu.open(MenuScreen::TargetSelection);
    state.menu.target_cursor = 0;
    state.menu.target_all = false;
    DispatchResult::changed()
}

fn confirm_summon(state: &mut AppState) -> DispatchResult<Effect> {
    let Some(ally) = state.current_ally() else {
        return DispatchResult::unchanged();
    };
    let cursor = state.menu.summon_cursor;
    let affordable = ally
        .summons
        .get(cursor)
        .is_some_and(|summon| ally.can_afford(summon.mp_cost));
    if !ally.has_summons() || !affordable {
        return error_flash(state);
    }
    state.menu.pending_choice = cursor;
    state.menu.pending_kind = ActionKind::Summon;
    state.menu.open(MenuScreen::TargetSelection);
    state.menu.target_all = true;
    DispatchResult::changed()
}

fn confirm_item(state: &mut AppState) -> DispatchResult<Effect> {
    let cursor = state.menu.item_cursor;
    let Some(ally) = state.current_ally() else {
        return DispatchResult::unchanged();
    };
    if !ally.has_items() || cursor >= ally.items.len() {
        return error_flash(state);
    }
    let name = ally.name.clone();
    let item = ally.items[cursor].name.clone();
    state.menu.pending_choice = cursor;
    state.menu.pending_kind = ActionKind::UseItem;
    // Items stop here for now; the pouch never opens.
    state.push_event(format!("{name} reaches for {item}, then thinks better of it."));
    DispatchResult::changed()
}

fn confirm_target(state: &mut AppState) -> DispatchResult<Effect> {
    match state.menu.pending_kind {
        ActionKind::Attack => confirm_attack_target(state),
        ActionKind::Summon => confirm_summon_target(state),
        ActionKind::Cast => {
            // Casting is not wired to a resolution yet. Note it and
            // leave the menu where it is.
            if let Some(ally) = state.current_ally() {
                let name = ally.name.clone();
                let cast = ally
                    .casts
                    .get(state.menu.pending_choice)
                    .map(|cast| cast.name.clone())
                    .unwrap_or_default();
                state.push_event(format!("{name}'s {cast} sputters out. Nothing happens."));
                return DispatchResult::changed();
            }
            DispatchResult::unchanged()
        }
        ActionKind::UseItem | ActionKind::None => DispatchResult::unchanged(),
    }
}

fn confirm_attack_target(state: &mut AppState) -> DispatchResult<Effect> {
    let target = state.menu.target_cursor;
    if target >= state.enemies.len() {
        return DispatchResult::unchanged();
    }
    state.menu.close_all();
    let attacker = state.current_member;
    let mut effects = Vec::new();
    start_strike(state, Side::Allies, attacker, target, &mut effects);
    if effects.is_empty() {
        DispatchResult::changed()
    } else {
        DispatchResult::changed_with_many(effects)
    }
}

fn confirm_summon_target(state: &mut AppState) -> DispatchResult<Effect> {
    if state.enemies.is_empty() {
        return DispatchResult::unchanged();
    }
    let caster = state.current_member;
    let choice = state.menu.pending_choice;
    let Some((cost, attack_points, summon_name, caster_name)) = state
        .allies
        .members
        .get(caster)
        .and_then(|member| {
            member.summons.get(choice).map(|summon| {
                (
                    summon.mp_cost,
                    summon.attack_points,
                    summon.name.clone(),
                    member.name.clone(),
                )
            })
        })
    else {
        return DispatchResult::unchanged();
    };
    // Mana is paid up front, before the summon arrives.
    if let Some(member) = state.allies.members.get_mut(caster) {
        member.spend_mana(cost);
        let slot = member.slot;
        let mp = member.mp;
        state.allies.sync_mp_bar(slot, mp);
    }
    state.menu.close_all();
    state.pending = Some(PendingResolution::Summon {
        caster,
        choice,
        targets: (0..state.enemies.len()).collect(),
        attack_points,
    });
    state.phase = BattlePhase::ResolvingAction;
    state.phase_ticks = SUMMON_WINDUP_TICKS;
    state.push_event(format!("{caster_name} calls on {summon_name}!"));
    DispatchResult::changed_with(Effect::PlaySummonSound)
}

fn menu_cancel(state: &mut AppState) -> DispatchResult<Effect> {
    if state.mode != GameMode::Battle || state.phase != BattlePhase::AwaitingPlayerChoice {
        return DispatchResult::unchanged();
    }
    match state.menu.screen {
        MenuScreen::CastSelection | MenuScreen::SummonSelection | MenuScreen::ItemSelection => {
            state.menu.open(MenuScreen::ActionSelection);
            DispatchResult::changed()
        }
        MenuScreen::TargetSelection => {
            state.menu.target_all = false;
            state.menu.pending_kind = ActionKind::None;
            state.menu.return_to_previous();
            DispatchResult::changed()
        }
        MenuScreen::ActionSelection | MenuScreen::None | MenuScreen::PartySelection => {
            DispatchResult::unchanged()
        }
    }
}

fn error_flash(state: &mut AppState) -> DispatchResult<Effect> {
    state.error_ticks = ERROR_FLASH_TICKS;
    DispatchResult::changed()
}
