//! Presentation timelines
//!
//! Named, timer-driven animation cursors. The simulation only starts and
//! advances them; hosts look the name up in their own sprite tables.

use serde::{Deserialize, Serialize};

use super::timer::Timer;

/// Default frame length used by the machine's sprite strips (ms)
pub const FRAME_MS: f32 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    /// Opaque lookup key for the host renderer
    pub name: String,
    pub timer: Timer,
    pub looping: bool,
    pub playing: bool,
}

impl Timeline {
    pub fn new(name: impl Into<String>, frames: u32, looping: bool) -> Self {
        Self {
            name: name.into(),
            timer: Timer::new(frames as f32 * FRAME_MS),
            looping,
            playing: false,
        }
    }

    pub fn start(&mut self) {
        self.timer.start();
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn update(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        self.timer.update(dt);
        if self.timer.is_complete() {
            if self.looping {
                self.timer.start();
            } else {
                self.playing = false;
            }
        }
    }

    /// Frame index the host should draw
    pub fn frame(&self) -> usize {
        (self.timer.t / FRAME_MS) as usize
    }

    pub fn is_finished(&self) -> bool {
        !self.looping && self.timer.is_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_finishes() {
        let mut timeline = Timeline::new("flowerRoofOpen", 4, false);
        timeline.update(1000.0);
        assert!(!timeline.is_finished(), "not started yet");
        timeline.start();
        timeline.update(250.0);
        assert_eq!(timeline.frame(), 2);
        timeline.update(1000.0);
        assert!(timeline.is_finished());
        assert!(!timeline.playing);
    }

    #[test]
    fn test_looping_wraps() {
        let mut timeline = Timeline::new("flashingArrow0", 4, true);
        timeline.start();
        timeline.update(400.0);
        assert!(timeline.playing);
        assert_eq!(timeline.frame(), 0);
    }
}
