use std::io;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::Terminal;
use rodio::{source::SineWave, OutputStream, Sink, Source};
use tui_dispatch::{
    EffectContext, EffectStoreLike, EffectStoreWithMiddleware, EventOutcome, RenderContext, TaskKey,
};
use tui_dispatch_debug::debug::DebugLayer;
use tui_dispatch_debug::{
    DebugCliArgs, DebugRunOutput, DebugSession, DebugSessionError, ReplayItem,
};

use rosetui::action::Action;
use rosetui::effect::Effect;
use rosetui::reducer::reducer;
use rosetui::roster;
use rosetui::state::{AppState, TICK_MS};
use rosetui::ui;

#[derive(Parser, Debug)]
#[command(name = "rosetui")]
#[command(about = "Turn-based party battles in the terminal")]
struct Args {
    #[command(flatten)]
    debug: DebugCliArgs,
    /// Encounter file describing both rosters
    #[arg(long, default_value = "assets/encounters/bandit_ambush.json")]
    encounter: String,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    let debug = DebugSession::new(args.debug);
    debug.save_state_schema::<AppState>().map_err(debug_error)?;
    debug.save_actions_schema::<Action>().map_err(debug_error)?;

    let encounter = args.encounter.clone();
    let state = debug
        .load_state_or_else_async(move || async move {
            Ok::<AppState, io::Error>(AppState::new(encounter))
        })
        .await
        .map_err(debug_error)?;
    let replay_actions = debug.load_replay_items().map_err(debug_error)?;
    let (middleware, recorder) = debug.middleware_with_recorder();
    let store = EffectStoreWithMiddleware::new(state, reducer, middleware);

    let use_alt_screen = debug.use_alt_screen();
    let mut stdout = io::stdout();
    if use_alt_screen {
        enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    }
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &debug, store, replay_actions).await;

    if use_alt_screen {
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
    }

    let run_output = result?;
    run_output.write_render_output()?;
    debug.save_actions(recorder.as_ref()).map_err(debug_error)?;
    Ok(())
}

fn debug_error(error: DebugSessionError) -> io::Error {
    io::Error::other(format!("debug session error: {error}"))
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    debug: &DebugSession,
    store: impl EffectStoreLike<AppState, Action, Effect>,
    replay_actions: Vec<ReplayItem<Action>>,
) -> io::Result<DebugRunOutput<AppState>> {
    debug
        .run_effect_app(
            terminal,
            store,
            DebugLayer::simple(),
            replay_actions,
            Some(Action::Init),
            Some(Action::Quit),
            |runtime| {
                if debug.render_once() {
                    return;
                }
                runtime
                    .subscriptions()
                    .interval("tick", Duration::from_millis(TICK_MS), || Action::Tick);
            },
            |frame, area, state, render_ctx: RenderContext| {
                ui::render(frame, area, state, render_ctx);
            },
            |event, state| -> EventOutcome<Action> { ui::handle_event(event, state) },
            |action| matches!(action, Action::Quit),
            handle_effect,
        )
        .await
}

fn handle_effect(effect: Effect, ctx: &mut EffectContext<Action>) {
    match effect {
        Effect::LoadEncounter { path } => {
            ctx.tasks()
                .spawn(TaskKey::new("load_encounter"), async move {
                    match roster::load_encounter(Path::new(&path)).await {
                        Ok(runtime) => Action::EncounterDidLoad(Box::new(runtime)),
                        Err(error) => Action::EncounterDidError {
                            error: error.to_string(),
                        },
                    }
                });
        }
        Effect::PlayStrikeSound { long_range } => {
            // A higher, shorter note for an arrow; a low thud for steel.
            if long_range {
                play_tone(880.0, 120);
            } else {
                play_tone(520.0, 140);
            }
        }
        Effect::PlaySummonSound => play_tone(320.0, 420),
    }
}

// Short detached beep; audio failures are ignored.
fn play_tone(frequency: f32, millis: u64) {
    std::thread::spawn(move || {
        let Ok((stream, handle)) = OutputStream::try_default() else {
            return;
        };
        let Ok(sink) = Sink::try_new(&handle) else {
            return;
        };
        let source = SineWave::new(frequency)
            .take_duration(Duration::from_millis(millis))
            .amplify(0.18);
        sink.append(source);
        sink.sleep_until_end();
        drop(stream);
    });
}
