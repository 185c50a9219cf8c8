//! Idlewatch - idle detection daemon
//!
//! Reads activity events and control commands from stdin, tracks idle and
//! active periods, and journals transitions to JSONL.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use idlewatch::config::Config;
use idlewatch::console::{self, Command, Input};
use idlewatch::idle::{ActivityState, EventBus, IdleTimer};
use idlewatch::logging::JsonlLogger;

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Transitions reported by the timer callbacks.
#[derive(Debug, Clone, Copy)]
enum Notice {
    Idle,
    Active,
}

fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    init_tracing(&config.logging.level, config.logging.json)?;

    info!("Starting idlewatch v{}", VERSION);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config))?;

    info!("Idlewatch shutdown complete");
    Ok(())
}

/// Feed stdin into the timer until EOF, `:quit` or Ctrl-C.
async fn run(config: Config) -> Result<()> {
    info!(
        "Configuration loaded: timeout={}ms, stop_on_idle={}, events_throttle={}ms",
        config.idle.timeout_ms, config.idle.stop_on_idle, config.idle.events_throttle_ms
    );

    let mut journal = JsonlLogger::new(config.logging.logs_dir())?;
    let bus = Arc::new(EventBus::new());
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel::<Notice>();

    let idle_tx = notice_tx.clone();
    let active_tx = notice_tx;
    let timer = IdleTimer::builder(config.idle.clone())
        .source(bus.clone())
        .on_idle(move |_| {
            let _ = idle_tx.send(Notice::Idle);
        })
        .on_active(move |_| {
            let _ = active_tx.send(Notice::Active);
        })
        .on_action(|event| {
            if let Some(event) = event {
                debug!("Activity: {}", event.kind);
            }
        })
        .build()?;

    journal.log_session_start(VERSION, timer.timeout())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Entering main loop");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("Input closed");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                };

                match console::parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(Input::Activity(event))) => bus.dispatch(&event),
                    Ok(Some(Input::Command(Command::Quit))) => {
                        info!("Quit command received");
                        break;
                    }
                    Ok(Some(Input::Command(command))) => {
                        apply_command(&timer, &mut journal, command);
                    }
                    Err(e) => warn!("Ignoring input {:?}: {}", line, e),
                }
            }
            Some(notice) = notice_rx.recv() => {
                let logged = match notice {
                    Notice::Idle => {
                        info!("User idle since {:?}", timer.last_idle_time());
                        journal.log_idle_start(timer.last_idle_time())
                    }
                    Notice::Active => {
                        info!("User activity resumed, idle since {:?}", journal.idle_since());
                        journal.log_idle_end()
                    }
                };
                if let Err(e) = logged {
                    warn!("Failed to journal transition: {}", e);
                }
            }
            _ = &mut shutdown => {
                info!("Interrupt received");
                break;
            }
        }
    }

    info!("Shutting down...");
    journal.log_session_end(timer.total_idle_time(), timer.total_active_time())?;
    timer.destroy();

    Ok(())
}

fn apply_command(timer: &IdleTimer, journal: &mut JsonlLogger, command: Command) {
    let logged = match command {
        Command::Pause if !timer.is_paused() => {
            timer.pause();
            journal.log_paused(timer.remaining_time())
        }
        Command::Resume if timer.is_paused() => {
            timer.resume();
            journal.log_resumed(timer.remaining_time())
        }
        Command::Pause | Command::Resume => Ok(()),
        Command::Reset => {
            timer.reset();
            Ok(())
        }
        Command::Timeout(timeout) => {
            if let Err(e) = timer.set_timeout(timeout) {
                warn!("{}", e);
            }
            Ok(())
        }
        Command::Status => {
            print_status(timer);
            Ok(())
        }
        Command::Quit => Ok(()),
    };
    if let Err(e) = logged {
        warn!("Failed to journal command: {}", e);
    }
}

fn print_status(timer: &IdleTimer) {
    let state = match timer.state() {
        ActivityState::Active if timer.is_paused() => "active (paused)".to_string(),
        ActivityState::Active => "active".to_string(),
        ActivityState::Idle { since } => format!("idle since {}", since),
    };
    println!(
        "{} | remaining {:?} | elapsed {:?} | idle {:?} | active {:?}",
        state,
        timer.remaining_time(),
        timer.elapsed_time(),
        timer.total_idle_time(),
        timer.total_active_time()
    );
}

/// Initialize tracing subscriber with the given log level.
fn init_tracing(level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let text = (!json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
    });
    let json = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(text)
        .with(json)
        .with(filter)
        .init();

    Ok(())
}
