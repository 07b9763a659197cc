//! Collision detection and response for circles against line segments
//!
//! Balls and arm points are circles; walls, pins and flower roofs are static
//! segments. Detection is a cheap quadratic line/circle test, the response
//! works from the closest point on the segment.

use glam::Vec2;

/// Threshold below which lengths and depths are treated as zero
pub const EPSILON: f32 = 1e-9;

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Closest point on the segment
    pub point: Vec2,
    /// Push direction (from the segment toward the circle center)
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Fast test whether a circle intersects the segment `a`-`b`.
///
/// Solves the quadratic for the segment parameter `u` where the infinite line
/// crosses the circle. The segment collides when the discriminant is real and
/// at least one root lies in `[0, 1]`.
pub fn circle_line_collision(center: Vec2, radius: f32, a: Vec2, b: Vec2) -> bool {
    let v1 = b - a;
    let v2 = a - center;
    let c = 2.0 * v1.dot(v1);
    if c < EPSILON {
        return false; // Degenerate segment
    }
    let b_coef = v1.dot(v2) * -2.0;
    let d = (b_coef * b_coef - 2.0 * c * (v2.dot(v2) - radius * radius)).sqrt();
    if d.is_nan() {
        return false;
    }

    let u1 = (b_coef - d) / c;
    let u2 = (b_coef + d) / c;
    (0.0..=1.0).contains(&u1) || (0.0..=1.0).contains(&u2)
}

/// Closest point to `p` on the segment `a`-`b`
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let line = b - a;
    let len_sq = line.length_squared();
    if len_sq == 0.0 {
        return a;
    }

    let t = (p - a).dot(line) / len_sq;
    if t < 0.0 {
        a
    } else if t > 1.0 {
        b
    } else {
        a + line * t
    }
}

/// Contact between a circle and a segment, ready for positional correction.
///
/// `fallback_angle` is the segment's surface normal angle, used when the
/// circle center sits exactly on the segment and no push direction can be
/// derived from the geometry.
pub fn circle_segment_contact(
    center: Vec2,
    radius: f32,
    a: Vec2,
    b: Vec2,
    fallback_angle: f32,
) -> CollisionResult {
    let closest = closest_point_on_segment(center, a, b);
    let offset = center - closest;
    let dist = offset.length();

    let mut penetration = radius - dist;
    if penetration <= -EPSILON {
        return CollisionResult::miss();
    }
    penetration = penetration.max(0.0);

    let normal = if dist < EPSILON {
        penetration = radius;
        Vec2::new(fallback_angle.cos(), fallback_angle.sin())
    } else {
        offset / dist
    };

    CollisionResult {
        hit: penetration > EPSILON,
        point: closest,
        normal,
        penetration,
    }
}

/// Velocity after bouncing off a surface with the given restitution.
///
/// v' = v - (1 + e)(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2, restitution: f32) -> Vec2 {
    velocity - (1.0 + restitution) * velocity.dot(normal) * normal
}
