// src/types.rs

use crate::geometry::{BBox, Point};
use crate::pipeline::occupancy_engine::EngineConfig;
use crate::replay::ReplayConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// tracker / fusion / filter / classifier / seating / region sections
    #[serde(flatten)]
    pub engine: EngineConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing directive; RUST_LOG takes precedence when set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "zone_occupancy=info".to_string(),
        }
    }
}

/// Packed RGB frame handed to the body-analysis collaborators.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp: f64,
}

pub const FRAME_CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: usize, height: usize, timestamp: f64) -> Self {
        Self {
            data,
            width,
            height,
            timestamp,
        }
    }

    /// Solid black frame, mostly useful for tests and replay.
    pub fn blank(width: usize, height: usize, timestamp: f64) -> Self {
        Self::new(vec![0; width * height * FRAME_CHANNELS], width, height, timestamp)
    }

    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.width * self.height * FRAME_CHANNELS
    }

    /// Copy out the pixels under `region`. Coordinates are truncated to
    /// whole pixels and clamped to the frame; `None` when nothing is left.
    pub fn crop(&self, region: &BBox) -> Option<Frame> {
        if !self.is_well_formed() || !region.is_finite() {
            return None;
        }
        let x_min = region.x1.max(0.0) as usize;
        let y_min = region.y1.max(0.0) as usize;
        let x_max = (region.x2.max(0.0) as usize).min(self.width);
        let y_max = (region.y2.max(0.0) as usize).min(self.height);
        if x_max <= x_min || y_max <= y_min {
            return None;
        }

        let crop_w = x_max - x_min;
        let crop_h = y_max - y_min;
        let row_bytes = crop_w * FRAME_CHANNELS;
        let mut data = Vec::with_capacity(row_bytes * crop_h);
        for y in y_min..y_max {
            let start = (y * self.width + x_min) * FRAME_CHANNELS;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Some(Frame::new(data, crop_w, crop_h, self.timestamp))
    }
}

/// One person box from a detector, full-frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BBox, confidence: f32) -> Self {
        Self { bbox, confidence }
    }

    pub fn from_coords(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self::new(BBox::new(x1, y1, x2, y2), confidence)
    }

    pub fn center(&self) -> Point {
        self.bbox.center()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.bbox.aspect_ratio()
    }

    pub fn area(&self) -> f32 {
        self.bbox.area()
    }
}
