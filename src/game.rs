//! Fixed-timestep driver
//!
//! Hosts call `advance` once per display frame with the elapsed wall time.
//! The driver turns that into whole timer ticks, each running several
//! physics updates, then runs the presentation pass once.

use serde::Serialize;

use crate::consts::*;
use crate::layout::MachineLayout;
use crate::settings::Settings;
use crate::sim::physics::DebugFrame;
use crate::sim::state::{GameOutcome, State};
use crate::sim::AutomationError;
use crate::sim::tick::{self, TickInput};

/// Longest frame time accepted from the host (seconds)
const MAX_FRAME_DT: f32 = 0.1;

/// Host-facing snapshot of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub score: f64,
    pub score_target: u32,
    pub num_reserve_balls: u32,
    pub balls_in_play: usize,
    pub visible_reserve_balls: usize,
    pub captures: u32,
    pub icon: Option<String>,
    pub is_game_complete: bool,
    pub outcome: Option<GameOutcome>,
}

pub struct Game {
    pub state: State,
    pub input: TickInput,
    layout: MachineLayout,
    seed: u64,
    accumulator: f32,
    ticks: u64,
}

impl Game {
    /// Build the machine and start a session
    pub fn new(settings: Settings, layout: MachineLayout, seed: u64) -> Self {
        let mut state = State::from_layout(settings, &layout, seed);
        state.start_session();
        Self {
            state,
            input: TickInput::default(),
            layout,
            seed,
            accumulator: 0.0,
            ticks: 0,
        }
    }

    /// Start over with the same settings, layout and seed
    pub fn restart(&mut self) {
        let settings = self.state.settings.clone();
        *self = Self::new(settings, self.layout.clone(), self.seed);
        log::info!("Session restarted");
    }

    /// Run the simulation for `frame_dt` seconds of wall time.
    ///
    /// Returns the number of timer ticks run.
    pub fn advance(&mut self, frame_dt: f32) -> Result<u32, AutomationError> {
        let frame_dt = frame_dt.clamp(0.0, MAX_FRAME_DT);
        self.accumulator += frame_dt;

        let mut ticks = 0;
        while self.accumulator >= TICK_INTERVAL && ticks < MAX_TICKS_PER_FRAME {
            for _ in 0..UPDATES_PER_TICK {
                tick::update(&mut self.state, &self.input, PHYSICS_DT)?;
            }
            self.accumulator -= TICK_INTERVAL;
            ticks += 1;
        }
        if ticks == MAX_TICKS_PER_FRAME {
            // Drop the backlog instead of spiralling
            self.accumulator = self.accumulator.min(TICK_INTERVAL);
        }
        self.ticks += ticks as u64;

        tick::present(&mut self.state, frame_dt * 1000.0);
        Ok(ticks)
    }

    pub fn shoot_pressed(&mut self) {
        self.input.shoot_held = true;
    }

    /// Returns whether a ball was launched
    pub fn shoot_released(&mut self) -> bool {
        self.input.shoot_held = false;
        tick::release_shot(&mut self.state)
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.state.physics.resize(width, height);
    }

    pub fn debug_frame(&self) -> DebugFrame {
        self.state.physics.debug_frame()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn summary(&self) -> SessionSummary {
        let state = &self.state;
        SessionSummary {
            score: state.score,
            score_target: state.settings.score_target,
            num_reserve_balls: state.num_reserve_balls,
            balls_in_play: state.pachinko_balls.len(),
            visible_reserve_balls: state.reserve_balls.len(),
            captures: state.captures,
            icon: state.icon.clone(),
            is_game_complete: state.is_game_complete,
            outcome: state.outcome,
        }
    }
}
