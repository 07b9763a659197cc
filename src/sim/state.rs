//! Session state
//!
//! The single aggregate every update, action and host query works on. It owns
//! the physics engine, every entity, both automation queues and the seeded
//! RNG, so a session replays identically from the same seed and inputs.

use std::collections::VecDeque;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::actions::{Action, ActionKind};
use super::automation::{AutomatedAction, EntryId, enqueue_action};
use super::entities::{
    AnimatedParticle, ArmSegment, BallId, Edge, FlashingArrow, FlowerRoof, FlowerSensor, Handle,
    PachinkoBall, Pin, Spinner,
};
use super::physics::Physics;
use super::timer::Timer;
use crate::layout::MachineLayout;
use crate::settings::Settings;
use crate::vec2_from_pair;

/// Roof index of the center flower
pub const PRIMARY_ROOF: usize = 0;

/// Number of success/fail icon variants
pub const NUM_ICONS: u32 = 3;

/// Icon shown when nothing is queued
pub const IDLE_ICON: &str = "icon_start0";
/// Icon shown once the session is over
pub const COMPLETE_ICON: &str = "icon_loading";

/// Final result of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOutcome {
    Won,
    Lost,
}

pub struct State {
    pub settings: Settings,
    pub physics: Physics,
    pub rng: Pcg32,

    /// Balls in play
    pub pachinko_balls: Vec<PachinkoBall>,
    /// Visible tray balls, bottom (next to shoot) first
    pub reserve_balls: VecDeque<PachinkoBall>,
    /// Balls left for the session, visible or not
    pub num_reserve_balls: u32,

    pub edges: Vec<Edge>,
    pub pins: Vec<Pin>,
    pub arm_segments: Vec<ArmSegment>,
    pub flower_roofs: Vec<FlowerRoof>,
    pub flower_sensors: Vec<FlowerSensor>,
    pub flashing_arrows: Vec<FlashingArrow>,
    pub spinners: Vec<Spinner>,
    pub animated_particles: Vec<AnimatedParticle>,

    /// Sequential queue, only the front entry advances
    pub actions: VecDeque<AutomatedAction>,
    /// Entries that all advance independently
    pub parallel_actions: Vec<AutomatedAction>,

    pub score: f64,
    pub captures: u32,
    pub is_game_complete: bool,
    pub outcome: Option<GameOutcome>,

    /// Pending UI icons, shown one after another
    pub icon_stack: VecDeque<String>,
    pub icon: Option<String>,
    pub icon_timer: Timer,
    pub handle: Handle,
    pub shoot_pressed: bool,

    pub reserve_inlet: Vec2,
    pub launch_pos: Vec2,

    next_ball_id: u32,
    next_entry_id: u64,
}

impl State {
    /// Empty machine with the given canvas size
    pub fn new(settings: Settings, width: f32, height: f32, seed: u64) -> Self {
        let mut icon_timer = Timer::new(settings.icon_display_ms);
        icon_timer.t = icon_timer.duration;

        Self {
            physics: Physics::with_params(width, height, settings.physics),
            rng: Pcg32::seed_from_u64(seed),
            pachinko_balls: Vec::new(),
            reserve_balls: VecDeque::new(),
            num_reserve_balls: settings.num_reserve_balls,
            edges: Vec::new(),
            pins: Vec::new(),
            arm_segments: Vec::new(),
            flower_roofs: Vec::new(),
            flower_sensors: Vec::new(),
            flashing_arrows: Vec::new(),
            spinners: Vec::new(),
            animated_particles: Vec::new(),
            actions: VecDeque::new(),
            parallel_actions: Vec::new(),
            score: 0.0,
            captures: 0,
            is_game_complete: false,
            outcome: None,
            icon_stack: VecDeque::new(),
            icon: None,
            icon_timer,
            handle: Handle::new(Vec2::ZERO, settings.handle_max_rotation_deg),
            shoot_pressed: false,
            reserve_inlet: Vec2::new(20.0, 10.0),
            launch_pos: Vec2::new(width / 2.0 + 5.0, height - 10.0),
            next_ball_id: 1,
            next_entry_id: 1,
            settings,
        }
    }

    /// Build every entity the layout describes. Roofs start open.
    pub fn from_layout(settings: Settings, layout: &MachineLayout, seed: u64) -> Self {
        let mut state = Self::new(settings, layout.width, layout.height, seed);
        state.reserve_inlet = vec2_from_pair(layout.reserve_inlet);
        state.handle.pos = vec2_from_pair(layout.handle);

        for polyline in layout.lines.iter().chain(&layout.flowers) {
            for pair in polyline.windows(2) {
                let edge = Edge::new(
                    vec2_from_pair(pair[0]),
                    vec2_from_pair(pair[1]),
                    &mut state.physics,
                );
                state.edges.push(edge);
            }
        }

        for (index, points) in layout.flower_roofs.iter().enumerate() {
            let roof = FlowerRoof::new(points.iter().copied().map(vec2_from_pair).collect());
            let mut sensor_pos = roof.anchor + Vec2::new(0.0, 15.0);
            // The third flower sits deeper in its cup
            if index == 2 {
                sensor_pos.y += 10.0;
            }
            state.flower_sensors.push(FlowerSensor::new(sensor_pos, index));
            state.flower_roofs.push(roof);
        }

        for (index, chain) in layout.arms.iter().enumerate() {
            let chain: Vec<Vec2> = chain.iter().copied().map(vec2_from_pair).collect();
            let arm = ArmSegment::new(&chain, &mut state.physics);
            let spinner_pos = chain.first().copied().unwrap_or(Vec2::ZERO) - Vec2::new(0.0, 10.0);
            state.spinners.push(Spinner::new(spinner_pos, index));
            state.arm_segments.push(arm);
        }

        for &center in &layout.pins {
            let pin = Pin::new(vec2_from_pair(center), &mut state.physics);
            state.pins.push(pin);
        }

        for (index, arrow) in layout.arrows.iter().enumerate() {
            state.flashing_arrows.push(FlashingArrow::new(
                index as u32,
                vec2_from_pair(arrow.pos),
                arrow.angle_deg,
                arrow.roof,
            ));
        }

        log::debug!(
            "Built machine: {} edges, {} pins, {} roofs, {} arms",
            state.edges.len(),
            state.pins.len(),
            state.flower_roofs.len(),
            state.arm_segments.len()
        );
        state
    }

    /// Close the primary flower, start the arrows and fill the reserve tray
    pub fn start_session(&mut self) {
        self.set_roof_active(PRIMARY_ROOF, true);
        for arrow in &mut self.flashing_arrows {
            if arrow.is_flashing {
                arrow.flashing_timeline.start();
            }
        }
        let count = self.num_reserve_balls;
        enqueue_action(
            self,
            Some(Action::new(ActionKind::SpawnInitialReserveBalls { count })),
            0.0,
        );
        log::info!(
            "Session started: {} balls, target {}",
            self.num_reserve_balls,
            self.settings.score_target
        );
    }

    pub fn next_ball_id(&mut self) -> BallId {
        let id = BallId(self.next_ball_id);
        self.next_ball_id += 1;
        id
    }

    pub fn next_entry_id(&mut self) -> EntryId {
        let id = EntryId(self.next_entry_id);
        self.next_entry_id += 1;
        id
    }

    pub fn find_ball(&self, id: BallId) -> Option<&PachinkoBall> {
        self.pachinko_balls.iter().find(|b| b.id == id)
    }

    /// Remove a ball in play from the list and the physics engine
    pub fn remove_ball(&mut self, id: BallId) -> bool {
        let Some(index) = self.pachinko_balls.iter().position(|b| b.id == id) else {
            return false;
        };
        let ball = self.pachinko_balls.remove(index);
        ball.remove(&mut self.physics);
        true
    }

    /// Open or close a roof and update the arrows pointing at it.
    /// Arrows flash while their roof is open.
    pub fn set_roof_active(&mut self, roof: usize, active: bool) {
        let Some(flower_roof) = self.flower_roofs.get_mut(roof) else {
            log::warn!("No flower roof {roof}");
            return;
        };
        if active {
            flower_roof.activate(&mut self.edges, &mut self.physics);
        } else {
            flower_roof.deactivate(&mut self.edges, &mut self.physics);
        }
        for arrow in self.flashing_arrows.iter_mut().filter(|a| a.roof == roof) {
            arrow.set_flashing(!active);
        }
    }

    pub fn is_roof_active(&self, roof: usize) -> bool {
        self.flower_roofs.get(roof).is_some_and(|r| r.active)
    }

    pub fn random_icon(&mut self, prefix: &str) -> String {
        let n = self.rng.random_range(0..NUM_ICONS);
        format!("{prefix}{n}")
    }

    pub fn capture_award(&self, roof: usize) -> f64 {
        if roof == PRIMARY_ROOF {
            self.settings.ruleset.primary_capture_score()
        } else {
            self.settings.ruleset.secondary_capture_score()
        }
    }
}
