use std::io::{BufRead, Write};
use std::sync::Arc;

use clap::Args;
use pomato_core::{
    Config, CountdownEngine, DesktopScheduler, Event, HarvestStore, NotificationScheduler,
    NullScheduler, Phase, RemainingTime, SessionRunner,
};
use tokio::sync::mpsc;

use super::harvest::tomato_row;

#[derive(Args)]
pub struct RunArgs {
    /// Work period length in minutes (fractional allowed; overrides config)
    #[arg(long = "work", value_name = "MINUTES")]
    work_minutes: Option<f64>,
    /// Break length in minutes (fractional allowed; overrides config)
    #[arg(long = "break", value_name = "MINUTES")]
    break_minutes: Option<f64>,
    /// Exit after this many completed work sessions
    #[arg(long, value_name = "N")]
    cycles: Option<u32>,
    /// Skip desktop notifications for this run
    #[arg(long)]
    no_notify: bool,
    /// Print the event stream as JSON lines instead of the live display
    #[arg(long)]
    json: bool,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_session(args))
}

async fn run_session(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load_or_default();
    if let Some(minutes) = args.work_minutes {
        config.timer.work_minutes = minutes;
    }
    if let Some(minutes) = args.break_minutes {
        config.timer.break_minutes = minutes;
    }
    config.validate()?;

    if args.cycles == Some(0) {
        return Ok(());
    }

    let store = HarvestStore::open()?;
    let scheduler: Arc<dyn NotificationScheduler> =
        if args.no_notify || !config.notifications.enabled {
            Arc::new(NullScheduler)
        } else {
            Arc::new(DesktopScheduler::new())
        };
    let engine = CountdownEngine::new(config.timer.work_minutes, config.timer.break_minutes);
    let (runner, mut events) = SessionRunner::new(engine, store, scheduler);

    if !args.json {
        println!("harvested today: {}", tomato_row(runner.harvested_today()?));
        println!("commands: [p]ause  [s]tart/resume/skip  [x] stop  [q]uit");
    }
    runner.start().await;

    let mut completed: u32 = 0;
    let mut commands = spawn_stdin_reader();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            maybe_event = events.recv() => {
                let Some(event) = maybe_event else { break };
                if args.json {
                    println!("{}", event.to_json()?);
                } else {
                    render_event(&runner, &event)?;
                }
                if matches!(event, Event::WorkCompleted { .. }) {
                    completed += 1;
                    if args.cycles.is_some_and(|cycles| completed >= cycles) {
                        break;
                    }
                }
            }
            command = commands.recv(), if stdin_open => {
                match command {
                    Some(command) => {
                        let command = command.trim();
                        if command == "q" {
                            break;
                        }
                        dispatch(&runner, command).await;
                    }
                    // Stdin is gone (piped input ran out); the countdown
                    // keeps going on its own.
                    None => stdin_open = false,
                }
            }
        }
    }

    runner.shutdown().await;
    if !args.json {
        println!();
    }
    Ok(())
}

/// Stdin commands, forwarded line by line from a dedicated reader thread.
///
/// Dropping the runtime waits out any read still in flight on its blocking
/// pool, so reading stdin through `tokio::io::stdin` would hold the process
/// open after the session loop ends until the user presses Enter. A plain
/// detached thread dies with the process instead.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (lines, receiver) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if lines.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

fn render_event(runner: &SessionRunner, event: &Event) -> std::io::Result<()> {
    match event {
        Event::Snapshot { phase, display, .. } => render_tick(*phase, display)?,
        Event::Started { .. } => println!("work period started"),
        Event::Resumed { .. } => println!("resumed"),
        Event::Paused { remaining_ms, .. } => {
            println!("\npaused at {}", RemainingTime::from_ms(*remaining_ms));
        }
        Event::Stopped { .. } => println!("\nstopped"),
        Event::BreakSkipped { .. } => println!("\nbreak skipped; back to work"),
        Event::BreakCompleted { .. } => println!("\nbreak over; next work period started"),
        Event::WorkCompleted { .. } => match runner.harvested_today() {
            Ok(count) => println!("\nPomodoro complete! harvested today: {}", tomato_row(count)),
            Err(err) => println!("\nPomodoro complete! ({err})"),
        },
    }
    Ok(())
}

// Feedback for rejected commands goes to stderr; stdout carries only the
// countdown display or the JSON event stream.
async fn dispatch(runner: &SessionRunner, command: &str) {
    match command {
        "p" => {
            if runner.pause().await.is_none() {
                eprintln!("nothing to pause");
            }
        }
        "s" => {
            if runner.start().await.is_none() {
                eprintln!("already running");
            }
        }
        "x" => {
            if runner.stop().await.is_none() {
                eprintln!("nothing to stop");
            }
        }
        "" => {}
        other => eprintln!("unknown command {other:?} (p pause, s start, x stop, q quit)"),
    }
}

fn render_tick(phase: Phase, display: &str) -> std::io::Result<()> {
    let label = match phase {
        Phase::Active => "work",
        Phase::Break => "break",
        Phase::Paused => "paused",
        Phase::Idle => "idle",
    };
    print!("\r{display} [{label}]  ");
    std::io::stdout().flush()
}
