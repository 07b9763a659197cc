//! Scheduled game actions
//!
//! An action is a one-shot mutation of the session state. The scheduler in
//! `automation` decides when it runs; the action itself only guarantees it
//! never applies its effects twice.

use glam::Vec2;

use super::automation::{EntryId, add_parallel_action, insert_action, longest_pending_parallel};
use super::entities::{AnimatedParticle, BallId, PachinkoBall};
use super::state::{GameOutcome, PRIMARY_ROOF, State};
use crate::consts::*;

/// Pause between a primary capture and the side flowers reopening (scaled ms)
pub const ROOF_REOPEN_DELAY_MS: f32 = 250.0;

#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// Launch a ball; the force is applied as an initial acceleration up and left
    SpawnPachinkoBall { pos: Vec2, force: f32 },
    /// Drop one ball into the reserve tray
    SpawnReserveBall,
    /// Fill the tray, at most `VISIBLE_RESERVE_BALLS` of `count`
    SpawnInitialReserveBalls { count: u32 },
    /// Take the bottom tray ball (it was just shot)
    DespawnBottomReserveBall,
    ActivateFlowerRoof { roof: usize },
    DeactivateFlowerRoof { roof: usize },
    /// Capture `ball` if the sensor is still holding it
    GetBallInFlower { sensor: usize, ball: BallId },
    PushIconStack { icon: String },
    /// Decide win or loss
    GameComplete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub has_executed: bool,
    /// Follow-ups already inserted behind this action's queue entry
    pub insert_count: usize,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            has_executed: false,
            insert_count: 0,
        }
    }

    pub fn spawn_pachinko_ball(pos: Vec2, force: f32) -> Self {
        Self::new(ActionKind::SpawnPachinkoBall { pos, force })
    }

    pub fn spawn_reserve_ball() -> Self {
        Self::new(ActionKind::SpawnReserveBall)
    }

    pub fn despawn_bottom_reserve_ball() -> Self {
        Self::new(ActionKind::DespawnBottomReserveBall)
    }

    pub fn get_ball_in_flower(sensor: usize, ball: BallId) -> Self {
        Self::new(ActionKind::GetBallInFlower { sensor, ball })
    }

    pub fn push_icon(icon: impl Into<String>) -> Self {
        Self::new(ActionKind::PushIconStack { icon: icon.into() })
    }

    /// Apply the action's effects. Later calls are no-ops.
    ///
    /// `owner` is the queue entry holding this action; follow-ups are
    /// inserted right behind it.
    pub fn execute(&mut self, state: &mut State, owner: EntryId) {
        if self.has_executed {
            return;
        }
        self.has_executed = true;
        self.act(state, owner);
    }

    /// Queue a follow-up directly after the owner entry (after any earlier
    /// follow-ups of this action).
    pub fn insert_action(
        &mut self,
        state: &mut State,
        owner: EntryId,
        action: Option<Action>,
        duration_ms: f32,
    ) {
        insert_action(state, owner, &mut self.insert_count, action, duration_ms);
    }

    fn act(&mut self, state: &mut State, owner: EntryId) {
        match self.kind.clone() {
            ActionKind::SpawnPachinkoBall { pos, force } => {
                let id = state.next_ball_id();
                let ball = PachinkoBall::spawn(id, pos, &mut state.physics);
                if let Some(point) = state.physics.point_mut(ball.point) {
                    point.acc = Vec2::new(-force, -force);
                }
                log::debug!("Ball {} launched with force {force}", id.0);
                state.pachinko_balls.push(ball);
            }
            ActionKind::SpawnReserveBall => {
                let id = state.next_ball_id();
                let ball = PachinkoBall::spawn(id, state.reserve_inlet, &mut state.physics);
                state.reserve_balls.push_back(ball);
            }
            ActionKind::SpawnInitialReserveBalls { count } => {
                let visible = count.min(VISIBLE_RESERVE_BALLS);
                for i in 0..visible {
                    add_parallel_action(
                        state,
                        Action::spawn_reserve_ball(),
                        i as f32 * RESERVE_SPAWN_STAGGER_MS,
                    );
                }
            }
            ActionKind::DespawnBottomReserveBall => {
                if let Some(ball) = state.reserve_balls.pop_front() {
                    ball.remove(&mut state.physics);
                }
                state.num_reserve_balls = state.num_reserve_balls.saturating_sub(1);

                let pending = pending_reserve_spawns(state);
                if state.num_reserve_balls as usize > state.reserve_balls.len() + pending {
                    let delay = longest_pending_parallel(state) + RESERVE_REPLENISH_OFFSET_MS;
                    add_parallel_action(state, Action::spawn_reserve_ball(), delay);
                }
            }
            ActionKind::ActivateFlowerRoof { roof } => state.set_roof_active(roof, true),
            ActionKind::DeactivateFlowerRoof { roof } => state.set_roof_active(roof, false),
            ActionKind::GetBallInFlower { sensor, ball } => {
                self.capture(state, owner, sensor, ball)
            }
            ActionKind::PushIconStack { icon } => state.icon_stack.push_back(icon),
            ActionKind::GameComplete => {
                let won = state.score >= state.settings.score_target as f64;
                let outcome = if won { GameOutcome::Won } else { GameOutcome::Lost };
                state.outcome = Some(outcome);
                log::info!(
                    "Game complete: {outcome:?} with {} (target {})",
                    state.score,
                    state.settings.score_target
                );
            }
        }
    }

    fn capture(&mut self, state: &mut State, owner: EntryId, sensor: usize, ball: BallId) {
        let Some(flower_sensor) = state.flower_sensors.get(sensor) else {
            log::warn!("No flower sensor {sensor}");
            return;
        };
        let roof = flower_sensor.roof;
        let pos = flower_sensor.pos;

        // A newer contact keeps its own timer
        if !flower_sensor.is_contacting || flower_sensor.ball != Some(ball) {
            log::debug!("Ball {} left sensor {sensor} before capture", ball.0);
            return;
        }
        if state.find_ball(ball).is_none() {
            log::debug!("Sensor {sensor} lost its ball before capture");
            state.flower_sensors[sensor].clear_contact();
            return;
        }

        state.remove_ball(ball);
        let award = state.capture_award(roof);
        state.score += award;
        state.captures += 1;
        state.animated_particles.push(AnimatedParticle::new(pos));

        let now_active = !state.is_roof_active(roof);
        state.set_roof_active(roof, now_active);

        if roof == PRIMARY_ROOF {
            let closed: Vec<usize> = (0..state.flower_roofs.len())
                .filter(|&r| r != PRIMARY_ROOF && state.is_roof_active(r))
                .collect();
            if !closed.is_empty() {
                self.insert_action(state, owner, None, ROOF_REOPEN_DELAY_MS);
            }
            for r in closed {
                self.insert_action(
                    state,
                    owner,
                    Some(Action::new(ActionKind::DeactivateFlowerRoof { roof: r })),
                    0.0,
                );
            }
        } else if state.is_roof_active(PRIMARY_ROOF) {
            self.insert_action(
                state,
                owner,
                Some(Action::new(ActionKind::DeactivateFlowerRoof { roof: PRIMARY_ROOF })),
                0.0,
            );
        }

        let icon = state.random_icon("icon_success");
        state.icon_stack.push_back(icon);
        state.flower_sensors[sensor].clear_contact();
        log::info!("Captured ball {} in flower {roof} for {award}", ball.0);
    }
}

/// Reserve spawns scheduled but not yet run
fn pending_reserve_spawns(state: &State) -> usize {
    state
        .parallel_actions
        .iter()
        .filter_map(|entry| entry.action.as_ref())
        .filter(|action| !action.has_executed && action.kind == ActionKind::SpawnReserveBall)
        .count()
}
