//! Static machine layout
//!
//! Geometry of the playfield as plain `[x, y]` tables: walls, flower bodies,
//! flower roofs, hanging arms, pins and arrow indicators. A layout is read
//! once when a session starts and turned into physics primitives.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{CANVAS_HEIGHT, CANVAS_WIDTH};

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("failed to parse layout: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("flower roof {index} needs at least 2 points, got {len}")]
    RoofTooShort { index: usize, len: usize },
    #[error("arm {index} needs at least 2 points, got {len}")]
    ArmTooShort { index: usize, len: usize },
    #[error("arrow {index} points at missing roof {roof}")]
    UnknownRoof { index: usize, roof: usize },
    #[error("layout has no flower roofs")]
    NoRoofs,
}

/// Arrow indicator placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowLayout {
    pub pos: [f32; 2],
    pub angle_deg: f32,
    /// Roof the arrow points at
    pub roof: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineLayout {
    pub width: f32,
    pub height: f32,
    /// Wall polylines
    pub lines: Vec<Vec<[f32; 2]>>,
    /// Flower body polylines (always solid)
    pub flowers: Vec<Vec<[f32; 2]>>,
    /// Roof polylines, the first is the primary (center) flower
    pub flower_roofs: Vec<Vec<[f32; 2]>>,
    /// Hanging arm chains, anchored at their last point
    pub arms: Vec<Vec<[f32; 2]>>,
    /// Pin centers
    pub pins: Vec<[f32; 2]>,
    pub arrows: Vec<ArrowLayout>,
    /// Where reserve balls drop into the tray
    pub reserve_inlet: [f32; 2],
    pub handle: [f32; 2],
}

impl Default for MachineLayout {
    fn default() -> Self {
        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
            lines: Vec::new(),
            flowers: Vec::new(),
            flower_roofs: Vec::new(),
            arms: Vec::new(),
            pins: Vec::new(),
            arrows: Vec::new(),
            reserve_inlet: [20.0, 10.0],
            handle: [40.0, 260.0],
        }
    }
}

/// Roof apex positions of the demo machine: primary first
const DEMO_FLOWERS: [[f32; 2]; 4] = [[230.0, 150.0], [140.0, 110.0], [320.0, 110.0], [230.0, 220.0]];

impl MachineLayout {
    pub fn from_json(json: &str) -> Result<Self, LayoutError> {
        let layout: Self = serde_json::from_str(json)?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn to_json(&self) -> Result<String, LayoutError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.flower_roofs.is_empty() {
            return Err(LayoutError::NoRoofs);
        }
        for (index, roof) in self.flower_roofs.iter().enumerate() {
            if roof.len() < 2 {
                return Err(LayoutError::RoofTooShort { index, len: roof.len() });
            }
        }
        for (index, arm) in self.arms.iter().enumerate() {
            if arm.len() < 2 {
                return Err(LayoutError::ArmTooShort { index, len: arm.len() });
            }
        }
        for (index, arrow) in self.arrows.iter().enumerate() {
            if arrow.roof >= self.flower_roofs.len() {
                return Err(LayoutError::UnknownRoof { index, roof: arrow.roof });
            }
        }
        Ok(())
    }

    /// Built-in machine: reserve tray top-left, four flowers, two spinners
    /// and a staggered pin field.
    pub fn demo() -> Self {
        let mut layout = Self {
            lines: vec![
                vec![[70.0, 0.0], [70.0, 100.0], [0.0, 100.0]],
                vec![[70.0, 300.0], [90.0, 270.0]],
            ],
            ..Self::default()
        };

        for (i, &[cx, ty]) in DEMO_FLOWERS.iter().enumerate() {
            let left = [cx - 12.0, ty + 10.0];
            let right = [cx + 12.0, ty + 10.0];
            layout.flower_roofs.push(vec![left, [cx, ty], right]);
            layout
                .flowers
                .push(vec![left, [cx - 12.0, ty + 25.0], [cx + 12.0, ty + 25.0], right]);
            layout.arrows.push(ArrowLayout {
                pos: [cx - 22.0, ty - 8.0],
                angle_deg: 45.0,
                roof: i,
            });
            layout.arrows.push(ArrowLayout {
                pos: [cx + 22.0, ty - 8.0],
                angle_deg: 135.0,
                roof: i,
            });
        }

        for cx in [110.0, 360.0] {
            layout
                .arms
                .push(vec![[cx, 200.0], [cx, 190.0], [cx, 180.0]]);
        }

        // Staggered rows, kept clear of flowers and arms
        for row in 0..8 {
            let y = 40.0 + row as f32 * 30.0;
            let offset = if row % 2 == 0 { 0.0 } else { 12.5 };
            let mut x = 90.0 + offset;
            while x < 385.0 {
                let clear_of_flowers = DEMO_FLOWERS
                    .iter()
                    .all(|&[fx, fy]| (x - fx).abs() > 24.0 || !(fy - 15.0..=fy + 35.0).contains(&y));
                let clear_of_arms = [110.0f32, 360.0]
                    .iter()
                    .all(|&ax| (x - ax).abs() > 10.0 || !(170.0..=210.0).contains(&y));
                if clear_of_flowers && clear_of_arms {
                    layout.pins.push([x, y]);
                }
                x += 25.0;
            }
        }

        layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_is_valid() {
        let layout = MachineLayout::demo();
        layout.validate().unwrap();
        assert_eq!(layout.flower_roofs.len(), 4);
        assert_eq!(layout.arrows.len(), 8);
        assert!(!layout.pins.is_empty());
    }

    #[test]
    fn test_demo_json_round_trip() {
        let layout = MachineLayout::demo();
        let json = layout.to_json().unwrap();
        assert_eq!(MachineLayout::from_json(&json).unwrap(), layout);
    }

    #[test]
    fn test_rejects_short_roof() {
        let err = MachineLayout::from_json(r#"{"flower_roofs": [[[1.0, 2.0]]]}"#).unwrap_err();
        assert!(matches!(err, LayoutError::RoofTooShort { index: 0, len: 1 }));
    }

    #[test]
    fn test_rejects_dangling_arrow() {
        let json = r#"{
            "flower_roofs": [[[0.0, 10.0], [5.0, 0.0], [10.0, 10.0]]],
            "arrows": [{"pos": [0.0, 0.0], "angle_deg": 0.0, "roof": 3}]
        }"#;
        let err = MachineLayout::from_json(json).unwrap_err();
        assert!(matches!(err, LayoutError::UnknownRoof { index: 0, roof: 3 }));
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(matches!(
            MachineLayout::from_json("not json"),
            Err(LayoutError::Parse(_))
        ));
    }
}
