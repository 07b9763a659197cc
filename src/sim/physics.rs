//! Verlet physics engine
//!
//! Point masses integrated with position Verlet, rigid distance constraints
//! ("arms") between points, and immovable line segments ("slopes"). Each step
//! integrates, clamps to the canvas, then relaxes arms and collisions over a
//! fixed number of solver iterations.
//!
//! The engine owns every primitive. Entities hold the handles returned by
//! [`Physics::add`] and hand them back to [`Physics::remove`] when they leave
//! the simulation. Collision checks are brute force.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::{
    EPSILON, circle_line_collision, circle_segment_contact, reflect_velocity,
};

/// Handle to a point registered with the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointId(u32);

/// Handle to an arm registered with the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArmId(u32);

/// Handle to a slope registered with the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlopeId(u32);

/// Tagged handle for any registered primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyHandle {
    Point(PointId),
    Arm(ArmId),
    Slope(SlopeId),
}

impl From<PointId> for BodyHandle {
    fn from(id: PointId) -> Self {
        BodyHandle::Point(id)
    }
}

impl From<ArmId> for BodyHandle {
    fn from(id: ArmId) -> Self {
        BodyHandle::Arm(id)
    }
}

impl From<SlopeId> for BodyHandle {
    fn from(id: SlopeId) -> Self {
        BodyHandle::Slope(id)
    }
}

/// A simulated point mass with a collision radius
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub pos: Vec2,
    /// Position at the previous step; `pos - old_pos` is the implied velocity
    pub old_pos: Vec2,
    /// Acceleration accumulator, gravity is added on top
    pub acc: Vec2,
    /// Anchored points never integrate
    pub fixed: bool,
    /// Fraction of velocity kept per step (0-1)
    pub damping: f32,
    pub radius: f32,
    /// Restitution against slopes and canvas bounds (0-1)
    pub bounce: f32,
}

impl Point {
    pub fn new(pos: Vec2, fixed: bool) -> Self {
        Self {
            pos,
            old_pos: pos,
            acc: Vec2::ZERO,
            fixed,
            damping: 0.99,
            radius: 10.0,
            bounce: 0.7,
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    /// Displacement over the last step
    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.pos - self.old_pos
    }
}

/// Rigid distance constraint between two points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arm {
    pub p1: PointId,
    pub p2: PointId,
    pub length: f32,
}

impl Arm {
    pub fn new(p1: PointId, p2: PointId, length: f32) -> Self {
        Self { p1, p2, length }
    }
}

/// Immovable line segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slope {
    pub a: Vec2,
    pub b: Vec2,
    /// Angle of the segment normal, `atan2(dy, dx) - 90°`
    pub surface_normal: f32,
}

impl Slope {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        let d = b - a;
        Self {
            a,
            b,
            surface_normal: d.y.atan2(d.x) - std::f32::consts::FRAC_PI_2,
        }
    }

    #[inline]
    pub fn length_squared(&self) -> f32 {
        (self.b - self.a).length_squared()
    }
}

/// Any primitive accepted by [`Physics::add`]
#[derive(Debug, Clone)]
pub enum Body {
    Point(Point),
    Arm(Arm),
    Slope(Slope),
}

impl From<Point> for Body {
    fn from(p: Point) -> Self {
        Body::Point(p)
    }
}

impl From<Arm> for Body {
    fn from(a: Arm) -> Self {
        Body::Arm(a)
    }
}

impl From<Slope> for Body {
    fn from(s: Slope) -> Self {
        Body::Slope(s)
    }
}

/// Solver tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsParams {
    /// Constant downward acceleration
    pub gravity: f32,
    /// Relaxation passes per step
    pub solver_iterations: u32,
    /// Corrective pushes per point/slope pair per pass
    pub max_slope_pushes: u32,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            gravity: 100.3,
            solver_iterations: 10,
            max_slope_pushes: 10,
        }
    }
}

/// Circle drawn by a debug view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugCircle {
    pub pos: Vec2,
    pub radius: f32,
    pub fixed: bool,
}

/// Line drawn by a debug view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugLine {
    pub a: Vec2,
    pub b: Vec2,
    pub is_arm: bool,
}

/// Snapshot of every registered primitive for diagnostic drawing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugFrame {
    pub circles: Vec<DebugCircle>,
    pub lines: Vec<DebugLine>,
}

/// The physics world
#[derive(Debug, Clone)]
pub struct Physics {
    params: PhysicsParams,
    width: f32,
    height: f32,
    points: Vec<(PointId, Point)>,
    arms: Vec<(ArmId, Arm)>,
    slopes: Vec<(SlopeId, Slope)>,
    next_id: u32,
}

impl Physics {
    pub fn new(width: f32, height: f32) -> Self {
        Self::with_params(width, height, PhysicsParams::default())
    }

    pub fn with_params(width: f32, height: f32, params: PhysicsParams) -> Self {
        Self {
            params,
            width,
            height,
            points: Vec::new(),
            arms: Vec::new(),
            slopes: Vec::new(),
            next_id: 1,
        }
    }

    pub fn params(&self) -> &PhysicsParams {
        &self.params
    }

    pub fn bounds(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Register a primitive; it takes part in every following step
    pub fn add(&mut self, body: impl Into<Body>) -> BodyHandle {
        match body.into() {
            Body::Point(p) => self.add_point(p).into(),
            Body::Arm(a) => self.add_arm(a).into(),
            Body::Slope(s) => self.add_slope(s).into(),
        }
    }

    pub fn add_point(&mut self, point: Point) -> PointId {
        let id = PointId(self.allocate_id());
        self.points.push((id, point));
        id
    }

    pub fn add_arm(&mut self, arm: Arm) -> ArmId {
        let id = ArmId(self.allocate_id());
        self.arms.push((id, arm));
        id
    }

    pub fn add_slope(&mut self, slope: Slope) -> SlopeId {
        let id = SlopeId(self.allocate_id());
        self.slopes.push((id, slope));
        id
    }

    /// Deregister a primitive. Returns `false` if it was not registered.
    pub fn remove(&mut self, handle: impl Into<BodyHandle>) -> bool {
        match handle.into() {
            BodyHandle::Point(id) => remove_entry(&mut self.points, id),
            BodyHandle::Arm(id) => remove_entry(&mut self.arms, id),
            BodyHandle::Slope(id) => remove_entry(&mut self.slopes, id),
        }
    }

    pub fn contains(&self, handle: impl Into<BodyHandle>) -> bool {
        match handle.into() {
            BodyHandle::Point(id) => self.point(id).is_some(),
            BodyHandle::Arm(id) => self.arm(id).is_some(),
            BodyHandle::Slope(id) => self.slope(id).is_some(),
        }
    }

    pub fn point(&self, id: PointId) -> Option<&Point> {
        self.points.iter().find(|(pid, _)| *pid == id).map(|(_, p)| p)
    }

    pub fn point_mut(&mut self, id: PointId) -> Option<&mut Point> {
        self.points
            .iter_mut()
            .find(|(pid, _)| *pid == id)
            .map(|(_, p)| p)
    }

    pub fn arm(&self, id: ArmId) -> Option<&Arm> {
        self.arms.iter().find(|(aid, _)| *aid == id).map(|(_, a)| a)
    }

    pub fn slope(&self, id: SlopeId) -> Option<&Slope> {
        self.slopes.iter().find(|(sid, _)| *sid == id).map(|(_, s)| s)
    }

    pub fn points(&self) -> impl Iterator<Item = (PointId, &Point)> {
        self.points.iter().map(|(id, p)| (*id, p))
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn arm_count(&self) -> usize {
        self.arms.len()
    }

    pub fn slope_count(&self) -> usize {
        self.slopes.len()
    }

    fn point_index(&self, id: PointId) -> Option<usize> {
        self.points.iter().position(|(pid, _)| *pid == id)
    }

    /// Advance the simulation by one fixed step
    pub fn run(&mut self, dt: f32) {
        self.integrate(dt);
        self.apply_bounds();

        for _ in 0..self.params.solver_iterations {
            self.solve_arms();
            self.solve_slopes();
            self.solve_point_pairs();
        }
    }

    fn integrate(&mut self, dt: f32) {
        let gravity = Vec2::new(0.0, self.params.gravity);
        let dt2 = dt * dt;

        for (_, p) in &mut self.points {
            if p.fixed {
                // No spurious velocity if the point is released later
                p.old_pos = p.pos;
                continue;
            }
            let prev = p.old_pos;
            p.old_pos = p.pos;
            p.pos = p.pos + (p.pos - prev) * p.damping + (p.acc + gravity) * dt2;
        }
    }

    fn apply_bounds(&mut self) {
        let (width, height) = (self.width, self.height);

        for (_, p) in &mut self.points {
            if p.fixed {
                continue;
            }
            let prev = p.pos - p.old_pos;

            if p.pos.x - p.radius < 0.0 {
                p.pos.x = p.radius;
                p.old_pos.x = p.pos.x + prev.x * p.bounce;
            } else if p.pos.x + p.radius > width {
                p.pos.x = width - p.radius;
                p.old_pos.x = p.pos.x + prev.x * p.bounce;
            }

            if p.pos.y - p.radius < 0.0 {
                p.pos.y = p.radius;
                p.old_pos.y = p.pos.y + prev.y * p.bounce;
            } else if p.pos.y + p.radius > height {
                p.pos.y = height - p.radius;
                p.old_pos.y = p.pos.y + prev.y * p.bounce;
            }
        }
    }

    fn solve_arms(&mut self) {
        for k in 0..self.arms.len() {
            let arm = &self.arms[k].1;
            let length = arm.length;
            let (Some(i), Some(j)) = (self.point_index(arm.p1), self.point_index(arm.p2)) else {
                continue;
            };
            let Some((p1, p2)) = pair_mut(&mut self.points, i, j) else {
                continue;
            };

            let delta = p2.pos - p1.pos;
            let dist_sq = delta.length_squared();
            if dist_sq < EPSILON {
                continue;
            }
            let dist = dist_sq.sqrt();
            let percent = (length - dist) / dist / 2.0;
            let offset = delta * percent;

            if !p1.fixed {
                p1.pos -= offset;
            }
            if !p2.fixed {
                p2.pos += offset;
            }
        }
    }

    fn solve_slopes(&mut self) {
        let max_pushes = self.params.max_slope_pushes;
        let Self { points, slopes, .. } = self;

        for (_, p) in points.iter_mut() {
            if p.fixed {
                continue;
            }
            for (_, s) in slopes.iter() {
                if s.length_squared() < EPSILON {
                    continue;
                }
                let mut pushes = 0;
                while pushes < max_pushes && circle_line_collision(p.pos, p.radius, s.a, s.b) {
                    let contact = circle_segment_contact(p.pos, p.radius, s.a, s.b, s.surface_normal);
                    if !contact.hit {
                        break;
                    }

                    let incident = p.pos - p.old_pos;
                    let v_dot_n = incident.dot(contact.normal);
                    p.pos += contact.normal * contact.penetration;

                    // Only bounce when moving into the surface, resting contact just slides
                    if v_dot_n < 0.0 {
                        let bounced = reflect_velocity(incident, contact.normal, p.bounce);
                        p.old_pos = p.pos - bounced;
                    }
                    pushes += 1;
                }
            }
        }
    }

    fn solve_point_pairs(&mut self) {
        let n = self.points.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let Some((p1, p2)) = pair_mut(&mut self.points, i, j) else {
                    continue;
                };
                if p1.fixed && p2.fixed {
                    continue;
                }

                let delta = p2.pos - p1.pos;
                let dist_sq = delta.length_squared();
                let sum_radii = p1.radius + p2.radius;
                if dist_sq >= sum_radii * sum_radii {
                    continue;
                }

                let dist = dist_sq.sqrt();
                let (normal, overlap) = if dist < EPSILON {
                    (Vec2::X, sum_radii)
                } else {
                    (delta / dist, sum_radii - dist)
                };
                if overlap <= 0.0 {
                    continue;
                }

                if p1.fixed {
                    p2.pos += normal * overlap;
                } else if p2.fixed {
                    p1.pos -= normal * overlap;
                } else {
                    let half = overlap * 0.5;
                    p1.pos -= normal * half;
                    p2.pos += normal * half;
                }
            }
        }
    }

    /// Current primitive state for diagnostic drawing
    pub fn debug_frame(&self) -> DebugFrame {
        let circles = self
            .points
            .iter()
            .map(|(_, p)| DebugCircle {
                pos: p.pos,
                radius: p.radius,
                fixed: p.fixed,
            })
            .collect();

        let arm_lines = self.arms.iter().filter_map(|(_, a)| {
            let p1 = self.point(a.p1)?;
            let p2 = self.point(a.p2)?;
            Some(DebugLine {
                a: p1.pos,
                b: p2.pos,
                is_arm: true,
            })
        });
        let slope_lines = self.slopes.iter().map(|(_, s)| DebugLine {
            a: s.a,
            b: s.b,
            is_arm: false,
        });

        DebugFrame {
            circles,
            lines: arm_lines.chain(slope_lines).collect(),
        }
    }
}

fn remove_entry<I: PartialEq, T>(entries: &mut Vec<(I, T)>, id: I) -> bool {
    let before = entries.len();
    entries.retain(|(eid, _)| *eid != id);
    entries.len() != before
}

/// Two distinct mutable entries, in `(i, j)` order
fn pair_mut<I, T>(entries: &mut [(I, T)], i: usize, j: usize) -> Option<(&mut T, &mut T)> {
    if i == j || i >= entries.len() || j >= entries.len() {
        return None;
    }
    if i < j {
        let (left, right) = entries.split_at_mut(j);
        Some((&mut left[i].1, &mut right[0].1))
    } else {
        let (left, right) = entries.split_at_mut(i);
        Some((&mut right[0].1, &mut left[j].1))
    }
}
