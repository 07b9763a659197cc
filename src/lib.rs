//! Pachinko Sim - simulation core of a pachinko arcade machine
//!
//! Core modules:
//! - `sim`: Deterministic simulation (Verlet physics, entities, action scheduling)
//! - `game`: Fixed-timestep driver hosts call once per display frame
//! - `layout`: Static machine layout consumed at session start
//! - `settings`: Data-driven rules (score target, reserve balls, capture awards)

pub mod game;
pub mod layout;
pub mod settings;
pub mod sim;

pub use game::Game;
pub use layout::MachineLayout;
pub use settings::{Ruleset, Settings};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Physics step handed to every update (seconds)
    pub const PHYSICS_DT: f32 = 1.0 / 60.0;
    /// Interval of the fixed update timer (seconds)
    pub const TICK_INTERVAL: f32 = 1.0 / 60.0;
    /// Updates run per timer tick, keeps balls from phasing through thin walls
    pub const UPDATES_PER_TICK: u32 = 4;
    /// Maximum timer ticks per host frame to prevent spiral of death
    pub const MAX_TICKS_PER_FRAME: u32 = 8;
    /// Automation and contact timers run in scaled units (`dt * 100`)
    pub const AUTOMATION_TIME_SCALE: f32 = 100.0;

    /// Canvas dimensions
    pub const CANVAS_WIDTH: f32 = 390.0;
    pub const CANVAS_HEIGHT: f32 = 300.0;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 4.0;
    pub const BALL_DAMPING: f32 = 0.991;

    /// Arm segment point radius
    pub const ARM_POINT_RADIUS: f32 = 2.0;

    /// Pins score when a ball passes within `ball.radius + PIN_HIT_MARGIN`
    pub const PIN_HIT_MARGIN: f32 = 3.0;

    /// Drain region: balls below and right of this corner leave the playfield
    pub const DRAIN_MIN_X: f32 = 200.0;
    pub const DRAIN_MIN_Y: f32 = 290.0;

    /// Flower sensor contact
    pub const SENSOR_RADIUS: f32 = 5.0;
    pub const SENSOR_CONTACT_MS: f32 = 500.0;

    /// Shooter handle easing (degrees per second while shoot is held)
    pub const HANDLE_EASE_DEG_PER_SEC: f32 = 30.0;

    /// Reserve tray
    pub const VISIBLE_RESERVE_BALLS: u32 = 10;
    pub const RESERVE_SPAWN_STAGGER_MS: f32 = 100.0;
    pub const RESERVE_REPLENISH_OFFSET_MS: f32 = 100.0;

    /// Wait before the game-complete evaluation runs
    pub const GAME_COMPLETE_DELAY_MS: f32 = 1000.0;
}

/// Linearly remap `x` from `[a, b]` into `[c, d]`
#[inline]
pub fn remap(x: f32, a: f32, b: f32, c: f32, d: f32) -> f32 {
    c + (x - a) * (d - c) / (b - a)
}

/// Build a point from an `[x, y]` pair as stored in layout tables
#[inline]
pub fn vec2_from_pair(pair: [f32; 2]) -> Vec2 {
    Vec2::new(pair[0], pair[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap() {
        assert!((remap(30.0, 0.0, 60.0, 0.0, 3.0) - 1.5).abs() < 1e-6);
        assert!((remap(60.0, 0.0, 60.0, 0.0, 3.0) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_vec2_from_pair() {
        assert_eq!(vec2_from_pair([3.0, 4.0]), Vec2::new(3.0, 4.0));
    }
}
