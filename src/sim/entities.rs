//! Machine entities
//!
//! Each entity owns handles to the physics primitives it registered and is
//! responsible for deregistering them. Cross references (sensor to ball,
//! roof to edges) are handles, so an entity removed earlier in the same tick
//! simply fails to resolve.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::physics::{Arm, ArmId, Physics, Point, PointId, Slope, SlopeId};
use super::timeline::Timeline;
use super::timer::Timer;
use crate::consts::*;

/// Session-unique ball identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BallId(pub u32);

/// A pachinko ball
#[derive(Debug, Clone)]
pub struct PachinkoBall {
    pub id: BallId,
    pub point: PointId,
    /// Set by game rules, the orchestrator removes flagged balls after the rule pass
    pub remove_flag: bool,
}

impl PachinkoBall {
    pub fn spawn(id: BallId, pos: Vec2, physics: &mut Physics) -> Self {
        let point = Point::new(pos, false)
            .with_radius(BALL_RADIUS)
            .with_damping(BALL_DAMPING);
        Self {
            id,
            point: physics.add_point(point),
            remove_flag: false,
        }
    }

    pub fn position(&self, physics: &Physics) -> Option<Vec2> {
        physics.point(self.point).map(|p| p.pos)
    }

    pub fn should_remove(&self) -> bool {
        self.remove_flag
    }

    pub fn remove(&self, physics: &mut Physics) {
        physics.remove(self.point);
    }
}

/// A peg: a short slope the ball deflects off
#[derive(Debug, Clone)]
pub struct Pin {
    pub slope: SlopeId,
    /// First endpoint, used for the scoring proximity check
    pub anchor: Vec2,
}

impl Pin {
    pub fn new(center: Vec2, physics: &mut Physics) -> Self {
        let a = center + Vec2::new(-2.0, 1.0);
        let b = center + Vec2::new(2.0, -1.0);
        Self {
            slope: physics.add_slope(Slope::new(a, b)),
            anchor: a,
        }
    }

    pub fn remove(&self, physics: &mut Physics) {
        physics.remove(self.slope);
    }
}

/// A chain of points joined by arms, anchored at its last point
#[derive(Debug, Clone, Default)]
pub struct ArmSegment {
    pub points: Vec<PointId>,
    pub arms: Vec<ArmId>,
}

impl ArmSegment {
    pub fn new(chain: &[Vec2], physics: &mut Physics) -> Self {
        let points: Vec<PointId> = chain
            .iter()
            .enumerate()
            .map(|(i, &pos)| {
                let anchored = i == chain.len() - 1;
                physics.add_point(Point::new(pos, anchored).with_radius(ARM_POINT_RADIUS))
            })
            .collect();

        let arms = points
            .windows(2)
            .zip(chain.windows(2))
            .map(|(ids, pos)| physics.add_arm(Arm::new(ids[0], ids[1], pos[0].distance(pos[1]))))
            .collect();

        Self { points, arms }
    }

    pub fn remove(&self, physics: &mut Physics) {
        for &point in &self.points {
            physics.remove(point);
        }
        for &arm in &self.arms {
            physics.remove(arm);
        }
    }
}

/// A static wall segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub slope: SlopeId,
}

impl Edge {
    pub fn new(a: Vec2, b: Vec2, physics: &mut Physics) -> Self {
        Self {
            slope: physics.add_slope(Slope::new(a, b)),
        }
    }

    pub fn remove(&self, physics: &mut Physics) {
        physics.remove(self.slope);
    }
}

/// Lid of a scoring pocket. Active means walled off, inactive means open.
#[derive(Debug, Clone)]
pub struct FlowerRoof {
    /// Apex of the roof polygon, sensors hang below it
    pub anchor: Vec2,
    pub points: Vec<Vec2>,
    pub active: bool,
    pub open_timeline: Timeline,
    pub close_timeline: Timeline,
    /// Edges this roof added to the shared edge list
    pub edges: Vec<SlopeId>,
}

impl FlowerRoof {
    pub fn new(points: Vec<Vec2>) -> Self {
        let anchor = points.get(1).or(points.first()).copied().unwrap_or(Vec2::ZERO);
        Self {
            anchor,
            points,
            active: false,
            open_timeline: Timeline::new("flowerRoofOpen", 4, false),
            close_timeline: Timeline::new("flowerRoofClose", 4, false),
            edges: Vec::new(),
        }
    }

    /// Raise the walls. Already-active roofs keep their existing walls.
    pub fn activate(&mut self, edges: &mut Vec<Edge>, physics: &mut Physics) {
        self.active = true;
        self.open_timeline.start();
        if !self.edges.is_empty() {
            return;
        }
        for pair in self.points.windows(2) {
            let edge = Edge::new(pair[0], pair[1], physics);
            edges.push(edge);
            self.edges.push(edge.slope);
        }
    }

    /// Drop the walls this roof added, leaving every other edge in place
    pub fn deactivate(&mut self, edges: &mut Vec<Edge>, physics: &mut Physics) {
        self.active = false;
        self.close_timeline.start();
        for slope in self.edges.drain(..) {
            physics.remove(slope);
            edges.retain(|e| e.slope != slope);
        }
    }
}

/// Arrow indicator pointing at a roof; flashes while the roof is open
#[derive(Debug, Clone)]
pub struct FlashingArrow {
    pub index: u32,
    pub pos: Vec2,
    pub angle_deg: f32,
    pub roof: usize,
    pub is_flashing: bool,
    pub flashing_timeline: Timeline,
    pub dull_timeline: Timeline,
}

impl FlashingArrow {
    pub fn new(index: u32, pos: Vec2, angle_deg: f32, roof: usize) -> Self {
        Self {
            index,
            pos,
            angle_deg,
            roof,
            is_flashing: true,
            flashing_timeline: Timeline::new(format!("flashingArrow{index}"), 4, true),
            dull_timeline: Timeline::new("dullArrow", 4, false),
        }
    }

    pub fn set_flashing(&mut self, flashing: bool) {
        if flashing == self.is_flashing {
            return;
        }
        self.is_flashing = flashing;
        if flashing {
            self.flashing_timeline.start();
        } else {
            self.flashing_timeline.stop();
            self.dull_timeline.start();
        }
    }
}

/// Proximity trigger under a roof entrance
#[derive(Debug, Clone)]
pub struct FlowerSensor {
    pub pos: Vec2,
    pub roof: usize,
    pub radius: f32,
    pub contact_timer: Timer,
    pub is_contacting: bool,
    /// Contacted ball; not owned, may already be gone
    pub ball: Option<BallId>,
    /// A capture action is queued for the current contact
    pub capture_pending: bool,
}

impl FlowerSensor {
    pub fn new(pos: Vec2, roof: usize) -> Self {
        Self {
            pos,
            roof,
            radius: SENSOR_RADIUS,
            contact_timer: Timer::new(SENSOR_CONTACT_MS),
            is_contacting: false,
            ball: None,
            capture_pending: false,
        }
    }

    pub fn is_touching(&self, ball_pos: Vec2, ball_radius: f32) -> bool {
        ball_pos.distance(self.pos) < self.radius + ball_radius
    }

    pub fn begin_contact(&mut self, ball: BallId) {
        self.is_contacting = true;
        self.ball = Some(ball);
        self.capture_pending = false;
        self.contact_timer.start();
    }

    pub fn clear_contact(&mut self) {
        self.is_contacting = false;
        self.ball = None;
        self.capture_pending = false;
    }
}

/// Rotating element driven by the motion of an arm segment
#[derive(Debug, Clone)]
pub struct Spinner {
    pub pos: Vec2,
    /// Index into the state's arm segments
    pub arm: usize,
    pub angle: f32,
    pub rotation_vx: f32,
    pub spin_direction: f32,
    pub starting_angle: f32,
}

impl Spinner {
    /// Impulse gain applied to the arm's per-step displacement
    pub const IMPULSE_GAIN: f32 = 100.0;
    pub const DECAY: f32 = 0.9;
    pub const REST_THRESHOLD: f32 = 0.01;

    pub fn new(pos: Vec2, arm: usize) -> Self {
        Self {
            pos,
            arm,
            angle: 0.0,
            rotation_vx: 0.0,
            spin_direction: 1.0,
            starting_angle: 0.0,
        }
    }

    /// Advance the spin from the arm's latest motion. Returns the score earned.
    pub fn update<R: Rng>(
        &mut self,
        arm: &ArmSegment,
        physics: &Physics,
        dt: f32,
        rng: &mut R,
    ) -> f64 {
        let displacement: f32 = arm
            .points
            .iter()
            .take(2)
            .filter_map(|&id| physics.point(id))
            .map(|p| p.pos.distance(p.old_pos))
            .sum();

        let force = displacement * Self::IMPULSE_GAIN;
        if force.abs() > Self::REST_THRESHOLD {
            if self.rotation_vx == 0.0 {
                self.spin_direction = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
                self.starting_angle = self.angle;
            }
            self.rotation_vx += force;
        }

        self.angle += self.rotation_vx * self.spin_direction * dt;
        self.rotation_vx *= Self::DECAY;

        if self.rotation_vx.abs() < Self::REST_THRESHOLD {
            self.rotation_vx = 0.0;
            return 0.0;
        }
        let earned = (self.angle - self.starting_angle).abs() as f64;
        self.starting_angle = self.angle;
        earned
    }
}

/// Cosmetic burst shown where a ball was captured
#[derive(Debug, Clone)]
pub struct AnimatedParticle {
    pub pos: Vec2,
    pub timeline: Timeline,
}

impl AnimatedParticle {
    pub fn new(pos: Vec2) -> Self {
        let mut timeline = Timeline::new("particleBurst", 5, false);
        timeline.start();
        Self { pos, timeline }
    }
}

/// Shooter handle, its rotation selects the launch force
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handle {
    pub pos: Vec2,
    pub rotation_deg: f32,
    pub max_rotation_deg: f32,
}

impl Handle {
    pub fn new(pos: Vec2, max_rotation_deg: f32) -> Self {
        Self {
            pos,
            rotation_deg: 0.0,
            max_rotation_deg,
        }
    }

    /// Ease toward the max angle while held, snap back when released
    pub fn update(&mut self, shoot_held: bool, dt: f32) {
        if shoot_held {
            self.rotation_deg =
                (self.rotation_deg + HANDLE_EASE_DEG_PER_SEC * dt).min(self.max_rotation_deg);
        } else {
            self.rotation_deg = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_ball_registers_and_removes_point() {
        let mut physics = Physics::new(CANVAS_WIDTH, CANVAS_HEIGHT);
        let ball = PachinkoBall::spawn(BallId(1), Vec2::new(50.0, 50.0), &mut physics);
        let point = physics.point(ball.point).unwrap();
        assert_eq!(point.radius, BALL_RADIUS);
        assert_eq!(point.damping, BALL_DAMPING);

        ball.remove(&mut physics);
        assert_eq!(physics.point_count(), 0);
        ball.remove(&mut physics);
    }

    #[test]
    fn test_pin_is_short_slope() {
        let mut physics = Physics::new(CANVAS_WIDTH, CANVAS_HEIGHT);
        let pin = Pin::new(Vec2::new(100.0, 100.0), &mut physics);
        let slope = physics.slope(pin.slope).unwrap();
        assert!((slope.length_squared().sqrt() - 20.0f32.sqrt()).abs() < 1e-4);
        assert_eq!(pin.anchor, Vec2::new(98.0, 101.0));
    }

    #[test]
    fn test_arm_segment_anchors_last_point() {
        let mut physics = Physics::new(CANVAS_WIDTH, CANVAS_HEIGHT);
        let chain = [
            Vec2::new(100.0, 130.0),
            Vec2::new(100.0, 120.0),
            Vec2::new(100.0, 110.0),
        ];
        let arm = ArmSegment::new(&chain, &mut physics);
        assert_eq!(arm.points.len(), 3);
        assert_eq!(arm.arms.len(), 2);
        assert!(!physics.point(arm.points[0]).unwrap().fixed);
        assert!(physics.point(arm.points[2]).unwrap().fixed);
        assert!((physics.arm(arm.arms[0]).unwrap().length - 10.0).abs() < 1e-5);

        arm.remove(&mut physics);
        assert_eq!(physics.point_count(), 0);
        assert_eq!(physics.arm_count(), 0);
    }

    #[test]
    fn test_roof_toggle_only_touches_its_edges() {
        let mut physics = Physics::new(CANVAS_WIDTH, CANVAS_HEIGHT);
        let mut edges = vec![Edge::new(Vec2::ZERO, Vec2::new(10.0, 0.0), &mut physics)];
        let mut roof = FlowerRoof::new(vec![
            Vec2::new(100.0, 100.0),
            Vec2::new(110.0, 90.0),
            Vec2::new(120.0, 100.0),
        ]);
        assert_eq!(roof.anchor, Vec2::new(110.0, 90.0));

        roof.activate(&mut edges, &mut physics);
        assert!(roof.active);
        assert_eq!(edges.len(), 3);
        assert_eq!(physics.slope_count(), 3);

        // Second activation does not stack walls
        roof.activate(&mut edges, &mut physics);
        assert_eq!(edges.len(), 3);

        roof.deactivate(&mut edges, &mut physics);
        assert!(!roof.active);
        assert_eq!(edges.len(), 1);
        assert_eq!(physics.slope_count(), 1);
        assert!(physics.contains(edges[0].slope));

        roof.deactivate(&mut edges, &mut physics);
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn test_sensor_contact_lifecycle() {
        let mut sensor = FlowerSensor::new(Vec2::new(50.0, 50.0), 0);
        assert!(sensor.is_touching(Vec2::new(55.0, 50.0), 4.0));
        assert!(!sensor.is_touching(Vec2::new(60.0, 50.0), 4.0));

        sensor.begin_contact(BallId(7));
        assert!(sensor.is_contacting);
        assert_eq!(sensor.ball, Some(BallId(7)));
        assert_eq!(sensor.contact_timer.t, 0.0);

        sensor.clear_contact();
        assert!(!sensor.is_contacting);
        assert_eq!(sensor.ball, None);
    }

    #[test]
    fn test_spinner_idle_without_motion() {
        let mut physics = Physics::new(CANVAS_WIDTH, CANVAS_HEIGHT);
        let arm = ArmSegment::new(&[Vec2::new(100.0, 120.0), Vec2::new(100.0, 110.0)], &mut physics);
        let mut spinner = Spinner::new(Vec2::new(100.0, 110.0), 0);
        let mut rng = Pcg32::seed_from_u64(1);
        let earned = spinner.update(&arm, &physics, 1.0 / 60.0, &mut rng);
        assert_eq!(earned, 0.0);
        assert_eq!(spinner.rotation_vx, 0.0);
        assert_eq!(spinner.angle, 0.0);
    }

    #[test]
    fn test_spinner_scores_and_decays() {
        let mut physics = Physics::new(CANVAS_WIDTH, CANVAS_HEIGHT);
        let arm = ArmSegment::new(&[Vec2::new(100.0, 120.0), Vec2::new(100.0, 110.0)], &mut physics);
        // Knock the free end sideways
        physics.point_mut(arm.points[0]).unwrap().old_pos = Vec2::new(99.0, 120.0);
        let mut spinner = Spinner::new(Vec2::new(100.0, 110.0), 0);
        let mut rng = Pcg32::seed_from_u64(1);

        let earned = spinner.update(&arm, &physics, 1.0 / 60.0, &mut rng);
        assert!(earned > 0.0);
        assert!(spinner.spin_direction == 1.0 || spinner.spin_direction == -1.0);
        assert!((spinner.rotation_vx - 90.0).abs() < 1e-3);

        // Arm at rest: spin decays to zero eventually
        physics.point_mut(arm.points[0]).unwrap().old_pos = Vec2::new(100.0, 120.0);
        for _ in 0..200 {
            spinner.update(&arm, &physics, 1.0 / 60.0, &mut rng);
        }
        assert_eq!(spinner.rotation_vx, 0.0);
    }

    #[test]
    fn test_handle_eases_and_snaps_back() {
        let mut handle = Handle::new(Vec2::new(50.0, 260.0), 60.0);
        handle.update(true, 1.0);
        assert_eq!(handle.rotation_deg, 30.0);
        handle.update(true, 10.0);
        assert_eq!(handle.rotation_deg, 60.0);
        handle.update(false, 1.0);
        assert_eq!(handle.rotation_deg, 0.0);
    }

    #[test]
    fn test_arrow_flash_toggle() {
        let mut arrow = FlashingArrow::new(2, Vec2::ZERO, -45.0, 1);
        assert_eq!(arrow.flashing_timeline.name, "flashingArrow2");
        arrow.set_flashing(false);
        assert!(!arrow.is_flashing);
        assert!(arrow.dull_timeline.playing);
    }
}
