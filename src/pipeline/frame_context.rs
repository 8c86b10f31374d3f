// src/pipeline/frame_context.rs
//
// Everything the engine decided on one frame. Callers read occupancy from
// here instead of reaching into the engine's zones.

use crate::analysis::{Track, Zone};
use crate::geometry::BBox;
use crate::types::Detection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TrackSummary {
    pub id: u32,
    pub bbox: BBox,
    pub avg_speed: f32,
    pub age: u32,
}

impl From<&Track> for TrackSummary {
    fn from(t: &Track) -> Self {
        Self {
            id: t.id,
            bbox: t.bbox,
            avg_speed: t.avg_speed,
            age: t.age,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneReport {
    pub zone_id: String,
    pub occupied: bool,
    pub people_seated: usize,
    pub seated: Vec<u32>,
    pub staff: Vec<u32>,
}

impl From<&Zone> for ZoneReport {
    fn from(z: &Zone) -> Self {
        Self {
            zone_id: z.id().to_string(),
            occupied: z.occupied,
            people_seated: z.people_seated,
            seated: z.seated_ids().iter().copied().collect(),
            staff: z.staff_ids().iter().copied().collect(),
        }
    }
}

/// One line of the per-frame zone log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneRow {
    pub frame: u64,
    pub time: f64,
    pub zone_id: String,
    pub occupied: bool,
    pub people_seated: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameContext {
    pub frame_id: u64,
    pub timestamp: f64,
    /// Fused detections fed to the tracker
    pub detections: Vec<Detection>,
    pub rejected: usize,
    pub tracks: Vec<TrackSummary>,
    pub zones: Vec<ZoneReport>,
}

impl FrameContext {
    pub fn new(frame_id: u64, timestamp: f64) -> Self {
        Self {
            frame_id,
            timestamp,
            detections: Vec::new(),
            rejected: 0,
            tracks: Vec::new(),
            zones: Vec::new(),
        }
    }

    pub fn zone(&self, zone_id: &str) -> Option<&ZoneReport> {
        self.zones.iter().find(|z| z.zone_id == zone_id)
    }

    pub fn occupied_count(&self) -> usize {
        self.zones.iter().filter(|z| z.occupied).count()
    }

    pub fn total_seated(&self) -> usize {
        self.zones.iter().map(|z| z.people_seated).sum()
    }

    pub fn rows(&self) -> Vec<ZoneRow> {
        self.zones
            .iter()
            .map(|z| ZoneRow {
                frame: self.frame_id,
                time: self.timestamp,
                zone_id: z.zone_id.clone(),
                occupied: z.occupied,
                people_seated: z.people_seated,
            })
            .collect()
    }
}
