//! Game settings and rules
//!
//! Everything tunable per build or per session: score target, reserve ball
//! count, capture awards, shot force buckets and physics tuning. Hosts can
//! load settings from JSON and override single values from a URL-style
//! query string.

use serde::{Deserialize, Serialize};

use crate::sim::PhysicsParams;

/// Scoring preset for flower captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Ruleset {
    #[default]
    Standard,
    Jackpot,
}

impl Ruleset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ruleset::Standard => "Standard",
            Ruleset::Jackpot => "Jackpot",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "standard" | "std" => Some(Ruleset::Standard),
            "jackpot" => Some(Ruleset::Jackpot),
            _ => None,
        }
    }

    /// Award for a capture in one of the side flowers
    pub fn secondary_capture_score(&self) -> f64 {
        match self {
            Ruleset::Standard => 1000.0,
            Ruleset::Jackpot => 1500.0,
        }
    }

    /// Award for a capture in the center flower
    pub fn primary_capture_score(&self) -> f64 {
        match self {
            Ruleset::Standard => 4000.0,
            Ruleset::Jackpot => 9500.0,
        }
    }
}

/// Session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ruleset: Ruleset,
    /// Score needed to win once every ball is spent
    pub score_target: u32,
    /// Balls available for the whole session
    pub num_reserve_balls: u32,
    /// Maximum shooter handle angle (degrees)
    pub handle_max_rotation_deg: f32,
    /// Launch force ranges, selected by handle angle (weakest first)
    pub shot_force_buckets: Vec<[u32; 2]>,
    /// Duration an icon stays on screen before the next one is shown (ms)
    pub icon_display_ms: f32,
    pub physics: PhysicsParams,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ruleset: Ruleset::Standard,
            score_target: 15000,
            num_reserve_balls: 20,
            handle_max_rotation_deg: 60.0,
            shot_force_buckets: vec![
                [15800, 16200],
                [16500, 17500],
                [16700, 18500],
                [17500, 19000],
            ],
            icon_display_ms: 1000.0,
            physics: PhysicsParams::default(),
        }
    }
}

impl Settings {
    /// Create settings from a ruleset (applies preset defaults)
    pub fn from_ruleset(ruleset: Ruleset) -> Self {
        Self {
            ruleset,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Apply `key=value` pairs such as `score-target=20000&num-reserve-balls=5`.
    ///
    /// Unknown keys and unparsable values are logged and skipped.
    pub fn apply_query(&mut self, query: &str) {
        let query = query.trim_start_matches('?');
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "score-target" => match value.parse() {
                    Ok(v) => self.score_target = v,
                    Err(_) => log::warn!("Ignoring score-target={value}"),
                },
                "num-reserve-balls" => match value.parse() {
                    Ok(v) => self.num_reserve_balls = v,
                    Err(_) => log::warn!("Ignoring num-reserve-balls={value}"),
                },
                "ruleset" => match Ruleset::from_str(value) {
                    Some(r) => self.ruleset = r,
                    None => log::warn!("Unknown ruleset {value}"),
                },
                _ => log::debug!("Unknown setting {key}"),
            }
        }
    }
}
