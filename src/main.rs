//! Pachinko Sim headless runner
//!
//! Plays a scripted session against the simulation core and prints a JSON
//! summary. Useful for balancing layouts and rules without a renderer.
//!
//! ```text
//! pachinko-sim [--seconds N] [--seed N] [--layout FILE] [--settings FILE]
//!              [--query "score-target=20000&num-reserve-balls=5"] [--dump-frame]
//! ```

use std::fs;

use pachinko_sim::layout::LayoutError;
use pachinko_sim::sim::AutomationError;
use pachinko_sim::{Game, MachineLayout, Settings};
use serde::Serialize;
use thiserror::Error;

const FRAME_DT: f32 = 1.0 / 60.0;
/// Frames between shots of the scripted shooter
const SHOT_PERIOD_FRAMES: u64 = 90;

#[derive(Debug, Error)]
enum RunError {
    #[error("bad argument: {0}")]
    BadArg(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
    #[error("simulation stopped: {0}")]
    Automation(#[from] AutomationError),
}

#[derive(Debug)]
struct Options {
    seconds: f32,
    seed: u64,
    layout: Option<String>,
    settings: Option<String>,
    query: Option<String>,
    dump_frame: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            seconds: 120.0,
            seed: 1,
            layout: None,
            settings: None,
            query: None,
            dump_frame: false,
        }
    }
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, RunError> {
        let mut options = Self::default();
        while let Some(arg) = args.next() {
            let mut value = |name: &str| {
                args.next()
                    .ok_or_else(|| RunError::BadArg(format!("{name} needs a value")))
            };
            match arg.as_str() {
                "--seconds" => {
                    let v = value("--seconds")?;
                    options.seconds = v
                        .parse()
                        .map_err(|_| RunError::BadArg(format!("--seconds {v}")))?;
                }
                "--seed" => {
                    let v = value("--seed")?;
                    options.seed = v
                        .parse()
                        .map_err(|_| RunError::BadArg(format!("--seed {v}")))?;
                }
                "--layout" => options.layout = Some(value("--layout")?),
                "--settings" => options.settings = Some(value("--settings")?),
                "--query" => options.query = Some(value("--query")?),
                "--dump-frame" => options.dump_frame = true,
                other => return Err(RunError::BadArg(other.to_string())),
            }
        }
        Ok(options)
    }
}

#[derive(Serialize)]
struct RunReport {
    seed: u64,
    ruleset: &'static str,
    seconds: f32,
    ticks: u64,
    shots: u32,
    summary: pachinko_sim::game::SessionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug_frame: Option<pachinko_sim::sim::DebugFrame>,
}

fn read(path: &str) -> Result<String, RunError> {
    fs::read_to_string(path).map_err(|source| RunError::Io {
        path: path.to_string(),
        source,
    })
}

fn run(options: Options) -> Result<RunReport, RunError> {
    let mut settings = match &options.settings {
        Some(path) => Settings::from_json(&read(path)?)?,
        None => Settings::default(),
    };
    if let Some(query) = &options.query {
        settings.apply_query(query);
    }
    let layout = match &options.layout {
        Some(path) => MachineLayout::from_json(&read(path)?)?,
        None => MachineLayout::demo(),
    };

    let ruleset = settings.ruleset.as_str();
    let mut game = Game::new(settings, layout, options.seed);
    let frames = (options.seconds / FRAME_DT) as u64;
    let mut shots = 0;

    for frame in 0..frames {
        // Hold longer on each cycle so every force bucket gets used
        let cycle = frame / SHOT_PERIOD_FRAMES;
        let hold = 20 + (cycle % 4) * 15;
        match frame % SHOT_PERIOD_FRAMES {
            0 => game.shoot_pressed(),
            f if f == hold => {
                if game.shoot_released() {
                    shots += 1;
                }
            }
            _ => {}
        }

        game.advance(FRAME_DT)?;
        if game.state.outcome.is_some() {
            log::info!("Session over after {frame} frames");
            break;
        }
    }

    Ok(RunReport {
        seed: options.seed,
        ruleset,
        seconds: options.seconds,
        ticks: game.ticks(),
        shots,
        summary: game.summary(),
        debug_frame: options.dump_frame.then(|| game.debug_frame()),
    })
}

fn main() {
    #[cfg(not(target_arch = "wasm32"))]
    env_logger::init();
    log::info!("Pachinko Sim (headless) starting...");

    let report = Options::parse(std::env::args().skip(1)).and_then(run);
    match report {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                log::error!("Failed to encode report: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
