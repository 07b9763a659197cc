//! Per-update orchestration
//!
//! One `update` advances the whole machine by a fixed step: physics, game
//! rules for every ball, sensor timers, spinners, the shooter handle, the
//! end-of-session check and finally the automation queues.

use glam::Vec2;
use rand::Rng;

use super::actions::{Action, ActionKind};
use super::automation::{AutomationError, enqueue_action, update_automations};
use super::entities::BallId;
use super::state::{COMPLETE_ICON, IDLE_ICON, State};
use crate::consts::*;
use crate::remap;

/// Input commands for a single update
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Shoot button held (eases the handle)
    pub shoot_held: bool,
}

/// Advance the game state by one fixed step of `dt` seconds
pub fn update(state: &mut State, input: &TickInput, dt: f32) -> Result<(), AutomationError> {
    state.shoot_pressed = input.shoot_held;

    state.physics.run(dt);

    apply_ball_rules(state);

    let physics = &mut state.physics;
    state.pachinko_balls.retain(|ball| {
        if ball.should_remove() {
            ball.remove(physics);
            false
        } else {
            true
        }
    });

    update_sensors(state, dt * AUTOMATION_TIME_SCALE);

    for spinner in &mut state.spinners {
        let Some(arm) = state.arm_segments.get(spinner.arm) else {
            continue;
        };
        state.score += spinner.update(arm, &state.physics, dt, &mut state.rng);
    }

    state.handle.update(state.shoot_pressed, dt);

    if !state.is_game_complete && state.num_reserve_balls == 0 && state.pachinko_balls.is_empty() {
        state.is_game_complete = true;
        log::debug!("Out of balls, scheduling game complete");
        enqueue_action(state, None, GAME_COMPLETE_DELAY_MS);
        enqueue_action(state, Some(Action::new(ActionKind::GameComplete)), 0.0);
    }

    update_automations(state, dt * AUTOMATION_TIME_SCALE)
}

/// Pins, sensor contact and drain for every ball in play
fn apply_ball_rules(state: &mut State) {
    for i in 0..state.pachinko_balls.len() {
        let ball = &state.pachinko_balls[i];
        let id = ball.id;
        let Some(point) = state.physics.point_mut(ball.point) else {
            state.pachinko_balls[i].remove_flag = true;
            continue;
        };
        point.acc = Vec2::ZERO;
        let pos = point.pos;
        let radius = point.radius;

        if state
            .pins
            .iter()
            .any(|pin| pin.anchor.distance(pos) < radius + PIN_HIT_MARGIN)
        {
            state.score += 1.0;
        }

        update_sensor_contact(state, id, pos, radius);

        if pos.y > DRAIN_MIN_Y && pos.x > DRAIN_MIN_X {
            state.pachinko_balls[i].remove_flag = true;
            if state.icon_stack.is_empty() {
                let icon = state.random_icon("icon_fail");
                enqueue_action(state, Some(Action::push_icon(icon)), 0.0);
            }
        }
    }
}

/// A sensor takes the first ball that touches it and lets go when that ball
/// leaves. One sensor change per ball per update.
fn update_sensor_contact(state: &mut State, id: BallId, pos: Vec2, radius: f32) {
    for sensor in &mut state.flower_sensors {
        if sensor.is_touching(pos, radius) {
            if !sensor.is_contacting {
                sensor.begin_contact(id);
                break;
            }
        } else if sensor.is_contacting && sensor.ball == Some(id) {
            sensor.clear_contact();
            break;
        }
    }
}

/// Advance contact timers and queue one capture per completed contact
fn update_sensors(state: &mut State, scaled_dt: f32) {
    let mut captures = Vec::new();
    for (index, sensor) in state.flower_sensors.iter_mut().enumerate() {
        if !sensor.is_contacting {
            continue;
        }
        sensor.contact_timer.update(scaled_dt);
        if sensor.contact_timer.is_complete() && !sensor.capture_pending {
            if let Some(ball) = sensor.ball {
                sensor.capture_pending = true;
                captures.push((index, ball));
            }
        }
    }
    for (index, ball) in captures {
        enqueue_action(state, Some(Action::get_ball_in_flower(index, ball)), 0.0);
    }
}

/// Launch force for the current handle angle, drawn from the matching bucket
pub fn shot_force<R: Rng>(
    rotation_deg: f32,
    max_rotation_deg: f32,
    buckets: &[[u32; 2]],
    rng: &mut R,
) -> Option<f32> {
    let last = buckets.len().checked_sub(1)?;
    let index = if max_rotation_deg > 0.0 {
        remap(rotation_deg, 0.0, max_rotation_deg, 0.0, last as f32).floor()
    } else {
        0.0
    };
    let [lo, hi] = buckets[(index.max(0.0) as usize).min(last)];
    Some(rng.random_range(lo.min(hi)..=hi.max(lo)) as f32)
}

/// Shoot button released: launch a ball and take one from the tray.
///
/// Ignored once the session is over or the reserve is empty. Returns whether
/// a shot was queued.
pub fn release_shot(state: &mut State) -> bool {
    let rotation = state.handle.rotation_deg;
    state.shoot_pressed = false;
    state.handle.update(false, 0.0);

    if state.is_game_complete || state.num_reserve_balls == 0 {
        return false;
    }
    let Some(force) = shot_force(
        rotation,
        state.handle.max_rotation_deg,
        &state.settings.shot_force_buckets,
        &mut state.rng,
    ) else {
        log::warn!("No shot force buckets configured");
        return false;
    };

    let pos = state.launch_pos;
    enqueue_action(state, Some(Action::spawn_pachinko_ball(pos, force)), 0.0);
    enqueue_action(state, Some(Action::despawn_bottom_reserve_ball()), 0.0);
    true
}

/// Presentation pass, run once per host frame with the frame time in ms
pub fn present(state: &mut State, frame_ms: f32) {
    state.icon_timer.update(frame_ms);
    if state.icon_timer.is_complete() {
        match state.icon_stack.pop_front() {
            Some(icon) => {
                state.icon = Some(icon);
                state.icon_timer.start();
            }
            None => state.icon = Some(IDLE_ICON.to_string()),
        }
    }
    if state.is_game_complete {
        state.icon = Some(COMPLETE_ICON.to_string());
    }

    for particle in &mut state.animated_particles {
        particle.timeline.update(frame_ms);
    }
    state
        .animated_particles
        .retain(|particle| !particle.timeline.is_finished());

    for roof in &mut state.flower_roofs {
        roof.open_timeline.update(frame_ms);
        roof.close_timeline.update(frame_ms);
    }
    for arrow in &mut state.flashing_arrows {
        arrow.flashing_timeline.update(frame_ms);
        arrow.dull_timeline.update(frame_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::MachineLayout;
    use crate::settings::Settings;
    use crate::sim::entities::PachinkoBall;
    use crate::sim::state::{GameOutcome, PRIMARY_ROOF};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const DT: f32 = PHYSICS_DT;

    fn bare_state() -> State {
        State::new(Settings::default(), CANVAS_WIDTH, CANVAS_HEIGHT, 11)
    }

    fn place_ball(state: &mut State, pos: Vec2) -> BallId {
        let id = state.next_ball_id();
        let ball = PachinkoBall::spawn(id, pos, &mut state.physics);
        state.pachinko_balls.push(ball);
        id
    }

    /// Pin a ball in place so rules see a fixed position every update
    fn freeze(state: &mut State, id: BallId) {
        let ball = state.find_ball(id).unwrap().point;
        state.physics.point_mut(ball).unwrap().fixed = true;
    }

    #[test]
    fn test_pin_scores_once_per_update() {
        let mut state = bare_state();
        for center in [Vec2::new(100.0, 100.0), Vec2::new(101.0, 100.0)] {
            let pin = crate::sim::entities::Pin::new(center, &mut state.physics);
            state.pins.push(pin);
        }
        let id = place_ball(&mut state, Vec2::new(99.0, 95.0));
        freeze(&mut state, id);

        update(&mut state, &TickInput::default(), DT).unwrap();
        assert_eq!(state.score, 1.0);
    }

    #[test]
    fn test_drain_removes_ball_and_pushes_fail_icon() {
        let mut state = bare_state();
        let first = place_ball(&mut state, Vec2::new(300.0, 295.0));
        let second = place_ball(&mut state, Vec2::new(350.0, 295.0));
        freeze(&mut state, first);
        freeze(&mut state, second);

        update(&mut state, &TickInput::default(), DT).unwrap();
        assert!(state.pachinko_balls.is_empty());
        assert_eq!(state.physics.point_count(), 0);
        // Both fail icons were queued before either ran
        assert_eq!(state.icon_stack.len(), 2);
        assert!(state.icon_stack.iter().all(|i| i.starts_with("icon_fail")));
    }

    #[test]
    fn test_left_of_drain_stays() {
        let mut state = bare_state();
        let id = place_ball(&mut state, Vec2::new(150.0, 295.0));
        freeze(&mut state, id);
        update(&mut state, &TickInput::default(), DT).unwrap();
        assert_eq!(state.pachinko_balls.len(), 1);
    }

    #[test]
    fn test_capture_after_contact_time() {
        let mut state = State::from_layout(Settings::default(), &MachineLayout::demo(), 5);
        state.start_session();
        state.set_roof_active(PRIMARY_ROOF, false);
        let sensor_pos = state.flower_sensors[PRIMARY_ROOF].pos;
        let id = place_ball(&mut state, sensor_pos);
        freeze(&mut state, id);

        // 500 scaled ms at 100x time scale is about 300 updates
        let mut steps = 0;
        while state.find_ball(id).is_some() && steps < 400 {
            update(&mut state, &TickInput::default(), DT).unwrap();
            steps += 1;
        }
        assert!((298..=302).contains(&steps), "captured after {steps} updates");
        assert!(state.score >= 4000.0);
        assert!(state.is_roof_active(PRIMARY_ROOF));
        assert!(!state.flower_sensors[PRIMARY_ROOF].is_contacting);
    }

    #[test]
    fn test_leaving_sensor_resets_contact() {
        let mut state = armless_state();
        let sensor_pos = state.flower_sensors[1].pos;
        let id = place_ball(&mut state, sensor_pos);
        freeze(&mut state, id);

        for _ in 0..10 {
            update(&mut state, &TickInput::default(), DT).unwrap();
        }
        assert!(state.flower_sensors[1].is_contacting);

        move_ball(&mut state, id, sensor_pos + Vec2::new(0.0, -30.0));
        update(&mut state, &TickInput::default(), DT).unwrap();

        let sensor = &state.flower_sensors[1];
        assert!(!sensor.is_contacting);
        assert_eq!(sensor.ball, None);
        assert_eq!(state.score, 0.0);
    }

    fn move_ball(state: &mut State, id: BallId, pos: Vec2) {
        let point = state.find_ball(id).unwrap().point;
        let p = state.physics.point_mut(point).unwrap();
        p.pos = pos;
        p.old_pos = pos;
    }

    fn armless_state() -> State {
        let layout = MachineLayout {
            arms: Vec::new(),
            ..MachineLayout::demo()
        };
        State::from_layout(Settings::default(), &layout, 5)
    }

    #[test]
    fn test_reentering_sensor_restarts_timer() {
        let mut state = armless_state();
        let sensor_pos = state.flower_sensors[1].pos;
        let id = place_ball(&mut state, sensor_pos);
        freeze(&mut state, id);

        // About 400 scaled ms of contact
        for _ in 0..240 {
            update(&mut state, &TickInput::default(), DT).unwrap();
        }
        assert!(state.flower_sensors[1].contact_timer.t > 390.0);

        move_ball(&mut state, id, sensor_pos + Vec2::new(0.0, -30.0));
        update(&mut state, &TickInput::default(), DT).unwrap();
        assert!(!state.flower_sensors[1].is_contacting);

        move_ball(&mut state, id, sensor_pos);
        update(&mut state, &TickInput::default(), DT).unwrap();
        let sensor = &state.flower_sensors[1];
        assert!(sensor.is_contacting);
        assert!(sensor.contact_timer.t <= DT * AUTOMATION_TIME_SCALE + 1e-3);

        // The earlier 400 ms do not count towards the capture
        let mut steps = 1;
        while state.find_ball(id).is_some() && steps < 400 {
            if steps == 250 {
                assert_eq!(state.captures, 0);
            }
            update(&mut state, &TickInput::default(), DT).unwrap();
            steps += 1;
        }
        assert!((298..=302).contains(&steps), "captured after {steps} updates");
        assert_eq!(state.captures, 1);
    }

    #[test]
    fn test_delayed_capture_skips_newer_ball() {
        let mut state = armless_state();
        // Holds the sequential queue so the first capture waits
        enqueue_action(&mut state, None, 1000.0);

        let sensor_pos = state.flower_sensors[1].pos;
        let first = place_ball(&mut state, sensor_pos);
        freeze(&mut state, first);
        let mut steps = 0;
        while !state.flower_sensors[1].capture_pending && steps < 400 {
            update(&mut state, &TickInput::default(), DT).unwrap();
            steps += 1;
        }
        assert!(state.flower_sensors[1].capture_pending);
        assert!(state.find_ball(first).is_some());

        move_ball(&mut state, first, sensor_pos + Vec2::new(0.0, -30.0));
        for _ in 0..20 {
            update(&mut state, &TickInput::default(), DT).unwrap();
        }
        assert!(!state.flower_sensors[1].is_contacting);

        let second = place_ball(&mut state, sensor_pos);
        freeze(&mut state, second);

        // The wait ends and the stale capture runs well before 500 ms of new contact
        let mut steps = 0;
        while state.find_ball(second).is_some() && steps < 400 {
            update(&mut state, &TickInput::default(), DT).unwrap();
            steps += 1;
            if steps == 290 {
                assert!(state.actions.is_empty(), "wait and stale capture have run");
                assert_eq!(state.captures, 0);
                assert!(state.flower_sensors[1].is_contacting);
                assert_eq!(state.flower_sensors[1].ball, Some(second));
            }
        }
        assert!((298..=302).contains(&steps), "captured after {steps} updates");
        assert_eq!(state.captures, 1);
        assert!(state.find_ball(first).is_some());
    }

    #[test]
    fn test_game_complete_once() {
        let mut state = bare_state();
        state.num_reserve_balls = 0;
        update(&mut state, &TickInput::default(), DT).unwrap();
        assert!(state.is_game_complete);
        assert_eq!(state.actions.len(), 2);

        update(&mut state, &TickInput::default(), DT).unwrap();
        assert_eq!(state.actions.len(), 2, "completion is scheduled once");

        // 1000 scaled ms is about 600 updates at 60 Hz
        for _ in 0..610 {
            update(&mut state, &TickInput::default(), DT).unwrap();
        }
        assert_eq!(state.outcome, Some(GameOutcome::Lost));
        assert!(state.actions.is_empty());
    }

    #[test]
    fn test_no_completion_while_balls_in_play() {
        let mut state = bare_state();
        state.num_reserve_balls = 0;
        place_ball(&mut state, Vec2::new(100.0, 100.0));
        update(&mut state, &TickInput::default(), DT).unwrap();
        assert!(!state.is_game_complete);
    }

    #[test]
    fn test_shot_force_buckets() {
        let buckets = Settings::default().shot_force_buckets;
        let mut rng = Pcg32::seed_from_u64(9);
        for _ in 0..50 {
            let weak = shot_force(0.0, 60.0, &buckets, &mut rng).unwrap();
            assert!((15800.0..=16200.0).contains(&weak));
            let full = shot_force(60.0, 60.0, &buckets, &mut rng).unwrap();
            assert!((17500.0..=19000.0).contains(&full));
            let mid = shot_force(25.0, 60.0, &buckets, &mut rng).unwrap();
            assert!((16500.0..=17500.0).contains(&mid));
        }
        assert_eq!(shot_force(10.0, 60.0, &[], &mut rng), None);
    }

    #[test]
    fn test_release_shot_queues_spawn_and_despawn() {
        let mut state = State::from_layout(Settings::default(), &MachineLayout::demo(), 5);
        state.start_session();
        assert!(release_shot(&mut state));
        // Queued behind the initial tray fill
        assert_eq!(state.actions.len(), 3);

        update(&mut state, &TickInput::default(), DT).unwrap();
        assert_eq!(state.pachinko_balls.len(), 1);
        assert_eq!(state.num_reserve_balls, 19);
        assert_eq!(state.handle.rotation_deg, 0.0);
    }

    #[test]
    fn test_release_shot_ignored_when_empty() {
        let mut state = bare_state();
        state.num_reserve_balls = 0;
        assert!(!release_shot(&mut state));
        assert!(state.actions.is_empty());

        let mut state = bare_state();
        state.is_game_complete = true;
        assert!(!release_shot(&mut state));
    }

    #[test]
    fn test_handle_follows_input() {
        let mut state = bare_state();
        let held = TickInput { shoot_held: true };
        for _ in 0..60 {
            update(&mut state, &held, DT).unwrap();
        }
        assert!((state.handle.rotation_deg - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_present_rotates_icons() {
        let mut state = bare_state();
        present(&mut state, 16.0);
        assert_eq!(state.icon.as_deref(), Some(IDLE_ICON));

        state.icon_stack.push_back("icon_success1".into());
        state.icon_stack.push_back("icon_fail0".into());
        present(&mut state, 16.0);
        assert_eq!(state.icon.as_deref(), Some("icon_success1"));
        present(&mut state, 500.0);
        assert_eq!(state.icon.as_deref(), Some("icon_success1"));
        present(&mut state, 600.0);
        assert_eq!(state.icon.as_deref(), Some("icon_fail0"));

        state.is_game_complete = true;
        present(&mut state, 16.0);
        assert_eq!(state.icon.as_deref(), Some(COMPLETE_ICON));
    }

    #[test]
    fn test_present_expires_particles() {
        let mut state = bare_state();
        state
            .animated_particles
            .push(crate::sim::entities::AnimatedParticle::new(Vec2::new(10.0, 10.0)));
        present(&mut state, 100.0);
        assert_eq!(state.animated_particles.len(), 1);
        present(&mut state, 1000.0);
        assert!(state.animated_particles.is_empty());
    }
}
