use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{block::Title, Block, BorderType, Borders, Paragraph, Wrap},
    Frame,
};
use tui_dispatch::{EventKind, EventOutcome, RenderContext};

use crate::action::Action;
use crate::state::{
    AppState, BattlePhase, Character, GameMode, KoMarker, MenuScreen, Party, PendingResolution,
    ResultsStage, Side, StatusBar, ACTION_CHOICES,
};

const BG_BASE: Color = Color::Rgb(26, 22, 30);
const BG_PANEL: Color = Color::Rgb(40, 32, 44);
const BG_PANEL_ALT: Color = Color::Rgb(34, 28, 38);
const BG_HEADER: Color = Color::Rgb(36, 28, 40);
const TEXT_MAIN: Color = Color::Rgb(232, 224, 214);
const TEXT_DIM: Color = Color::Rgb(168, 156, 152);
const ACCENT_ROSE: Color = Color::Rgb(214, 112, 140);
const ACCENT_GOLD: Color = Color::Rgb(222, 196, 120);
const ACCENT_LEAF: Color = Color::Rgb(128, 186, 122);
const ACCENT_MANA: Color = Color::Rgb(120, 152, 214);
const DANGER: Color = Color::Rgb(220, 96, 96);
const HIGHLIGHT_BG: Color = ACCENT_ROSE;
const HIGHLIGHT_TEXT: Color = Color::Rgb(26, 16, 20);
const BORDER_ACCENT: Color = Color::Rgb(92, 74, 96);

const DANCE_POSES: [&str; 4] = ["\\o/", "|o|", "/o\\", "|o|"];

pub fn render(frame: &mut Frame, area: Rect, state: &AppState, _ctx: RenderContext) {
    frame.render_widget(Block::default().style(Style::default().bg(BG_BASE)), area);
    match state.mode {
        GameMode::Loading => render_loading(frame, area, state),
        GameMode::LoadFailed => render_load_failed(frame, area, state),
        GameMode::Battle => render_battle(frame, area, state),
    }
}

pub fn handle_event(event: &EventKind, state: &AppState) -> EventOutcome<Action> {
    match event {
        EventKind::Resize(width, height) => {
            EventOutcome::action(Action::UiTerminalResize(*width, *height)).with_render()
        }
        EventKind::Key(key) => handle_key(*key, state),
        _ => EventOutcome::ignored(),
    }
}

fn handle_key(key: KeyEvent, state: &AppState) -> EventOutcome<Action> {
    if matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q')) {
        return EventOutcome::action(Action::Quit);
    }
    match state.mode {
        GameMode::Loading => EventOutcome::ignored(),
        GameMode::LoadFailed => match key.code {
            KeyCode::Esc | KeyCode::Enter => EventOutcome::action(Action::Quit),
            _ => EventOutcome::ignored(),
        },
        GameMode::Battle => handle_battle_key(key),
    }
}

// Keys collapse to Up/Down/Confirm/Cancel here; the reducer decides
// what each one means in the current menu state.
fn handle_battle_key(key: KeyEvent) -> EventOutcome<Action> {
    let action = match key.code {
        KeyCode::Up | KeyCode::Char('w') => Some(Action::MenuUp),
        KeyCode::Down | KeyCode::Char('s') => Some(Action::MenuDown),
        KeyCode::Enter | KeyCode::Char('z') | KeyCode::Char('Z') => Some(Action::MenuConfirm),
        KeyCode::Esc | KeyCode::Char('x') | KeyCode::Char('X') => Some(Action::MenuCancel),
        _ => None,
    };
    EventOutcome::from(action)
}

fn render_loading(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" ROSETUI ", BG_PANEL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Loading encounter...",
            Style::default().fg(TEXT_MAIN),
        )),
        Line::from(Span::styled(
            state.encounter_path.clone(),
            Style::default().fg(TEXT_DIM),
        )),
    ];
    let paragraph = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn render_load_failed(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" ROSETUI ", BG_PANEL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let error = state
        .load_error
        .as_deref()
        .unwrap_or("unknown error")
        .to_string();
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "COULD NOT LOAD ENCOUNTER",
            Style::default().fg(DANGER).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(error, Style::default().fg(TEXT_MAIN))),
        Line::from(""),
        Line::from(Span::styled("Q: Quit", Style::default().fg(TEXT_DIM))),
    ];
    let paragraph = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn render_battle(frame: &mut Frame, area: Rect, state: &AppState) {
    if area.width < 60 || area.height < 18 {
        let warning = Paragraph::new("Terminal too small - expand window.")
            .style(Style::default().fg(TEXT_DIM))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(warning, area);
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(9),
        ])
        .split(area);

    render_header(frame, layout[0], state);

    // The end scene replaces the battlefield once the victory wait runs
    // out; until then (and through a defeat) the field stays up.
    if state.victory_dance {
        render_end_scene(frame, layout[1], state);
    } else {
        let field = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(layout[1]);
        render_enemy_panel(frame, field[0], state);
        render_ally_panel(frame, field[1], state);
    }

    render_command_area(frame, layout[2], state);
}

fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" BATTLE ", BG_HEADER);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let line = Line::from(vec![
        Span::styled(
            state.encounter_name.to_ascii_uppercase(),
            Style::default()
                .fg(ACCENT_ROSE)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(phase_label(state), Style::default().fg(TEXT_MAIN)),
        Span::raw("  |  "),
        Span::styled(
            format!(
                "{} allies vs {} enemies",
                state.allies.len(),
                state.enemies.len()
            ),
            Style::default().fg(TEXT_DIM),
        ),
    ]);
    let paragraph = Paragraph::new(Text::from(vec![line]))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn phase_label(state: &AppState) -> String {
    match state.phase {
        BattlePhase::Idle => String::new(),
        BattlePhase::AwaitingPlayerChoice => match state.current_ally() {
            Some(ally) => format!("{}'s move", ally.name),
            None => "Choose".to_string(),
        },
        BattlePhase::ResolvingAction => "Resolving...".to_string(),
        BattlePhase::EnemyActing => "The enemy moves".to_string(),
        BattlePhase::Victory => "Victory".to_string(),
        BattlePhase::Defeat => "Defeat".to_string(),
    }
}

enum PartyRow<'a> {
    Living { dense: usize, member: &'a Character },
    Fallen(&'a KoMarker),
}

// Rows keyed by display slot: living members interleaved with the
// markers left behind by terminated ones, in their original order.
fn party_rows<'a>(party: &'a Party, markers: &'a [KoMarker], side: Side) -> Vec<(usize, PartyRow<'a>)> {
    let mut rows: Vec<(usize, PartyRow)> = party
        .members
        .iter()
        .enumerate()
        .map(|(dense, member)| (member.slot, PartyRow::Living { dense, member }))
        .collect();
    rows.extend(
        markers
            .iter()
            .filter(|marker| marker.side == side)
            .map(|marker| (marker.slot, PartyRow::Fallen(marker))),
    );
    rows.sort_by_key(|(slot, _)| *slot);
    rows
}

fn flash_amount(state: &AppState, side: Side, slot: usize) -> Option<u32> {
    state
        .damage_flashes
        .iter()
        .find(|flash| flash.side == side && flash.slot == slot)
        .map(|flash| flash.amount)
}

fn render_enemy_panel(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" ENEMIES ", BG_PANEL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let targeting = state.menu.screen == MenuScreen::TargetSelection;
    let acting_enemy = acting_enemy_index(state);

    let mut lines = vec![Line::from("")];
    for (slot, row) in party_rows(&state.enemies, &state.ko_markers, Side::Enemies) {
        match row {
            PartyRow::Living { dense, member } => {
                let targeted =
                    targeting && (state.menu.target_all || state.menu.target_cursor == dense);
                let marker = if targeted {
                    Span::styled("> ", Style::default().fg(ACCENT_ROSE))
                } else if acting_enemy == Some(dense) {
                    Span::styled("! ", Style::default().fg(ACCENT_GOLD))
                } else {
                    Span::raw("  ")
                };
                let name_style = if targeted {
                    Style::default()
                        .fg(HIGHLIGHT_TEXT)
                        .bg(HIGHLIGHT_BG)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(TEXT_MAIN)
                };
                let mut spans = vec![
                    marker,
                    Span::styled(format!("{:<12}", member.name), name_style),
                    Span::styled(
                        format!("  {}", member.weapon.name),
                        Style::default().fg(TEXT_DIM),
                    ),
                ];
                if let Some(amount) = flash_amount(state, Side::Enemies, slot) {
                    spans.push(Span::styled(
                        format!("  -{amount}"),
                        Style::default().fg(DANGER).add_modifier(Modifier::BOLD),
                    ));
                }
                lines.push(Line::from(spans));
            }
            PartyRow::Fallen(marker) => {
                if marker.faded {
                    // Faded enemies leave nothing behind but their row.
                    lines.push(Line::from(Span::styled(
                        "  . . .",
                        Style::default().fg(BORDER_ACCENT),
                    )));
                } else {
                    lines.push(Line::from(Span::styled(
                        format!("  {:<12}  down", marker.name),
                        Style::default().fg(TEXT_DIM),
                    )));
                }
            }
        }
        lines.push(Line::from(""));
    }

    let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, inner);
}

fn acting_enemy_index(state: &AppState) -> Option<usize> {
    if state.phase != BattlePhase::EnemyActing {
        return None;
    }
    match &state.pending {
        Some(PendingResolution::Strike {
            side: Side::Enemies,
            attacker,
            ..
        }) => Some(*attacker),
        None if state.enemy_turn < state.enemies.len() => Some(state.enemy_turn),
        _ => None,
    }
}

fn render_ally_panel(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" PARTY ", BG_PANEL_ALT);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let choosing = state.phase == BattlePhase::AwaitingPlayerChoice;
    let bar_width = if inner.width >= 44 { 14 } else { 8 };

    let mut lines = vec![Line::from("")];
    for (slot, row) in party_rows(&state.allies, &state.ko_markers, Side::Allies) {
        match row {
            PartyRow::Living { dense, member } => {
                let acting = choosing && state.current_member == dense;
                let marker = if acting {
                    Span::styled("> ", Style::default().fg(ACCENT_LEAF))
                } else {
                    Span::raw("  ")
                };
                let name_style = if acting {
                    Style::default()
                        .fg(ACCENT_LEAF)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(TEXT_MAIN)
                };
                let mut name_spans = vec![
                    marker,
                    Span::styled(format!("{:<10}", member.name), name_style),
                    Span::styled(
                        format!(" {}", member.archetype.label()),
                        Style::default().fg(TEXT_DIM),
                    ),
                ];
                if let Some(amount) = flash_amount(state, Side::Allies, slot) {
                    name_spans.push(Span::styled(
                        format!("  -{amount}"),
                        Style::default().fg(DANGER).add_modifier(Modifier::BOLD),
                    ));
                }
                lines.push(Line::from(name_spans));

                let hp = state.allies.hp_bars.get(slot).copied().unwrap_or_default();
                let mp = state.allies.mp_bars.get(slot).copied().unwrap_or_default();
                let mut meters = vec![Span::raw("  ")];
                meters.extend(meter_spans("HP", hp, bar_width, ACCENT_LEAF));
                if mp.max > 0 {
                    meters.push(Span::raw("  "));
                    meters.extend(meter_spans("MP", mp, bar_width, ACCENT_MANA));
                }
                lines.push(Line::from(meters));
            }
            PartyRow::Fallen(marker) => {
                lines.push(Line::from(Span::styled(
                    format!("  {:<10} knocked out", marker.name),
                    Style::default().fg(TEXT_DIM),
                )));
                lines.push(Line::from(""));
            }
        }
        lines.push(Line::from(""));
    }

    let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, inner);
}

fn render_end_scene(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" VICTORY ", BG_PANEL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![Line::from("")];

    // The troupe celebrates under the results box.
    let mut dance = Vec::new();
    for (index, name) in state.ally_names.iter().enumerate() {
        let alive = state.allies.members.iter().any(|m| &m.name == name);
        let pose = if alive {
            DANCE_POSES[(state.dance_frame as usize / 3 + index) % DANCE_POSES.len()]
        } else {
            " x "
        };
        dance.push(Span::styled(
            format!("{pose}  "),
            Style::default().fg(if alive { ACCENT_ROSE } else { TEXT_DIM }),
        ));
    }
    lines.push(Line::from(dance));
    let names = state.ally_names.join("  ");
    lines.push(Line::from(Span::styled(
        names,
        Style::default().fg(TEXT_DIM),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(""));

    match state.results {
        Some(ResultsStage::Gold) => {
            lines.push(results_line(
                "GOLD",
                format!("{} recovered", state.earned_gold),
            ));
        }
        Some(ResultsStage::Experience) => {
            lines.push(results_line(
                "EXPERIENCE",
                format!("{} earned", state.earned_experience),
            ));
        }
        None => {
            lines.push(Line::from(Span::styled(
                "The battle is over.",
                Style::default().fg(TEXT_MAIN),
            )));
        }
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn results_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{label}  "),
            Style::default()
                .fg(ACCENT_GOLD)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(value, Style::default().fg(TEXT_MAIN)),
    ])
}

fn render_command_area(frame: &mut Frame, area: Rect, state: &AppState) {
    let layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(24), Constraint::Length(30)])
        .split(area);
    render_event_log(frame, layout[0], state);
    render_menu_column(frame, layout[1], state);
}

fn render_event_log(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" FIELD LOG ", BG_PANEL_ALT);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let visible = inner.height as usize;
    let mut lines: Vec<Line> = state
        .events
        .iter()
        .rev()
        .take(visible.saturating_sub(1))
        .map(|event| Line::from(Span::styled(event.clone(), Style::default().fg(TEXT_MAIN))))
        .collect();
    lines.reverse();
    if !state.message.is_empty() {
        lines.push(Line::from(Span::styled(
            state.message.clone(),
            Style::default().fg(ACCENT_GOLD),
        )));
    }
    let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn render_menu_column(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" COMMAND ", BG_PANEL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = Vec::new();
    if state.error_ticks > 0 {
        lines.push(Line::from(Span::styled(
            "x Nothing there",
            Style::default().fg(DANGER).add_modifier(Modifier::BOLD),
        )));
    }

    match state.menu.screen {
        MenuScreen::ActionSelection => {
            for (index, label) in ACTION_CHOICES.iter().enumerate() {
                lines.push(menu_line(label, index == state.menu.action_cursor));
            }
        }
        MenuScreen::CastSelection => {
            lines.extend(submenu_lines(
                state.current_ally().map(|a| {
                    a.casts
                        .iter()
                        .map(|cast| cast.name.clone())
                        .collect::<Vec<_>>()
                }),
                state.menu.cast_cursor,
                "No casts learned.",
            ));
        }
        MenuScreen::SummonSelection => {
            lines.extend(submenu_lines(
                state.current_ally().map(|a| {
                    a.summons
                        .iter()
                        .map(|summon| format!("{} ({} MP)", summon.name, summon.mp_cost))
                        .collect::<Vec<_>>()
                }),
                state.menu.summon_cursor,
                "No pacts sworn.",
            ));
        }
        MenuScreen::ItemSelection => {
            lines.extend(submenu_lines(
                state.current_ally().map(|a| {
                    a.items
                        .iter()
                        .map(|item| item.name.clone())
                        .collect::<Vec<_>>()
                }),
                state.menu.item_cursor,
                "The pouch is empty.",
            ));
        }
        MenuScreen::TargetSelection => {
            let target = if state.menu.target_all {
                "every enemy".to_string()
            } else {
                state
                    .enemies
                    .members
                    .get(state.menu.target_cursor)
                    .map(|member| member.name.clone())
                    .unwrap_or_default()
            };
            lines.push(Line::from(Span::styled(
                "Choose a target",
                Style::default().fg(TEXT_MAIN),
            )));
            lines.push(Line::from(Span::styled(
                format!("> {target}"),
                Style::default()
                    .fg(ACCENT_ROSE)
                    .add_modifier(Modifier::BOLD),
            )));
        }
        MenuScreen::None | MenuScreen::PartySelection => {
            lines.push(Line::from(Span::styled(
                "...",
                Style::default().fg(TEXT_DIM),
            )));
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "W/S move  Z confirm  X back",
        Style::default().fg(TEXT_DIM),
    )));
    let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn submenu_lines(entries: Option<Vec<String>>, cursor: usize, empty_hint: &str) -> Vec<Line<'static>> {
    let entries = entries.unwrap_or_default();
    if entries.is_empty() {
        return vec![Line::from(Span::styled(
            empty_hint.to_string(),
            Style::default().fg(TEXT_DIM),
        ))];
    }
    entries
        .iter()
        .enumerate()
        .map(|(index, label)| menu_line(label, index == cursor))
        .collect()
}

fn panel_block<'a, T>(title: T, bg: Color) -> Block<'a>
where
    T: Into<Title<'a>>,
{
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(title)
        .style(Style::default().bg(bg).fg(TEXT_MAIN))
        .border_style(Style::default().fg(BORDER_ACCENT))
}

fn meter_spans(label: &str, bar: StatusBar, width: usize, color: Color) -> Vec<Span<'static>> {
    let filled = ((bar.ratio() * width as f64).round() as usize).min(width);
    let empty = width.saturating_sub(filled);
    let filled_bar = "█".repeat(filled);
    let empty_bar = "░".repeat(empty);
    vec![
        Span::styled(format!("{label} "), Style::default().fg(TEXT_DIM)),
        Span::styled(
            filled_bar,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(empty_bar, Style::default().fg(TEXT_DIM)),
        Span::styled(
            format!(" {}/{}", bar.current, bar.max),
            Style::default().fg(TEXT_DIM),
        ),
    ]
}

fn menu_line(label: &str, selected: bool) -> Line<'static> {
    let style = if selected {
        Style::default()
            .fg(HIGHLIGHT_TEXT)
            .bg(HIGHLIGHT_BG)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(TEXT_MAIN)
    };
    Line::from(Span::styled(label.to_string(), style))
}
