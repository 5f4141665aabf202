use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use shugyo_core::history::{HistoryStore, MemoryHistory};
use shugyo_core::input::parse_duration;
use shugyo_core::notify::{BellNotifier, PhaseNotifier, SilentNotifier};
use shugyo_core::storage::Database;
use shugyo_core::{BodyPart, Config, CycleController, Event, MonotonicClock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;

const TICK_MS: u64 = 250;

const HELP: &str = "commands: s start, p pause, r resume, f finish, x reset, ? status, q quit";

#[derive(Subcommand)]
pub enum SessionAction {
    /// Run sessions interactively; events are printed as JSON lines
    Run {
        /// Practice length in seconds, or mm:ss
        #[arg(long)]
        practice: Option<String>,
        /// Rest length in seconds, or mm:ss
        #[arg(long)]
        rest: Option<String>,
        /// Tag for the recorded session
        #[arg(long)]
        body_part: Option<BodyPart>,
        /// Keep history in memory only
        #[arg(long)]
        memory: bool,
        /// Start the first session immediately
        #[arg(long)]
        now: bool,
    },
    /// Print the effective session settings
    Settings,
}

enum Input {
    Start,
    Pause,
    Resume,
    Finish,
    Reset,
    Status,
    Quit,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        let cmd = match line.trim() {
            "" => return None,
            "s" | "start" => Input::Start,
            "p" | "pause" => Input::Pause,
            "r" | "resume" => Input::Resume,
            "f" | "finish" => Input::Finish,
            "x" | "reset" => Input::Reset,
            "?" | "status" => Input::Status,
            "q" | "quit" => Input::Quit,
            other => Input::Unknown(other.to_string()),
        };
        Some(cmd)
    }
}

fn emit(event: &Event) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();

    match action {
        SessionAction::Settings => {
            println!(
                "{}",
                serde_json::to_string_pretty(&config.controller_config())?
            );
            Ok(())
        }
        SessionAction::Run {
            practice,
            rest,
            body_part,
            memory,
            now,
        } => {
            let mut settings = config.controller_config();
            if let Some(practice) = practice {
                settings.practice_secs = parse_duration(&practice)?;
            }
            if let Some(rest) = rest {
                settings.rest_secs = parse_duration(&rest)?;
            }
            if let Some(part) = body_part {
                settings.body_part = part;
            }

            let store: Box<dyn HistoryStore> = if memory {
                Box::new(MemoryHistory::new())
            } else {
                Box::new(Database::open()?)
            };
            let notifications = &config.notifications;
            let audible = notifications.sound && notifications.volume > 0;
            let notifier: Box<dyn PhaseNotifier> =
                if audible || notifications.vibrate {
                    Box::new(
                        BellNotifier::new(
                            std::io::stderr(),
                            notifications.sound,
                            notifications.vibrate,
                        )
                        .with_volume(notifications.volume),
                    )
                } else {
                    Box::new(SilentNotifier)
                };

            let controller = CycleController::new(
                settings,
                Arc::new(MonotonicClock::new()),
                store,
                notifier,
            )?;

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            runtime.block_on(run_loop(controller, now || config.timer.auto_start))
        }
    }
}

async fn run_loop(
    mut controller: CycleController,
    start_now: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    eprintln!("{HELP}");
    if start_now {
        emit(&controller.start_session()?)?;
    }

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for event in controller.tick() {
                    emit(&event)?;
                }
            }
            line = lines.next_line() => {
                // EOF quits like `q`.
                let Some(line) = line? else {
                    quit(&mut controller)?;
                    break;
                };
                let Some(input) = Input::parse(&line) else {
                    continue;
                };
                match input {
                    Input::Start => match controller.start_session() {
                        Ok(event) => emit(&event)?,
                        Err(e) => eprintln!("{e}"),
                    },
                    Input::Pause => match controller.pause() {
                        Some(event) => emit(&event)?,
                        None => eprintln!("nothing to pause"),
                    },
                    Input::Resume => match controller.resume() {
                        Some(event) => emit(&event)?,
                        None => eprintln!("nothing to resume"),
                    },
                    Input::Finish => {
                        let outcome = controller.finish_session();
                        for event in &outcome.settled {
                            emit(event)?;
                        }
                        if let Some(warning) = &outcome.warning {
                            eprintln!("warning: {warning}");
                        }
                        emit(&outcome.event)?;
                    }
                    Input::Reset => emit(&controller.reset_session())?,
                    Input::Status => emit(&controller.snapshot())?,
                    Input::Quit => {
                        quit(&mut controller)?;
                        break;
                    }
                    Input::Unknown(other) => eprintln!("unknown command '{other}'; {HELP}"),
                }
            }
        }
    }
    Ok(())
}

/// Leaving abandons a running session without recording it.
fn quit(controller: &mut CycleController) -> Result<(), serde_json::Error> {
    if controller.session_id().is_some() {
        emit(&controller.reset_session())?;
    }
    Ok(())
}
