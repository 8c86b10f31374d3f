// src/analysis/person_tracker.rs
//
// Lightweight nearest-centroid tracker for people in a fixed camera view.
//
// Design:
//   - Greedy nearest-center association (a dining room rarely has more than
//     a few dozen people in frame)
//   - Tracks coast through detection gaps; after max_misses they move to a
//     lost pool instead of being deleted
//   - Lost tracks are reactivated with a relaxed radius, so a person who was
//     occluded by a passing waiter keeps their identity
//   - Every track carries a rolling average speed; downstream seating logic
//     reads only that field

use crate::geometry::{BBox, Point};
use crate::types::Detection;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum center distance (px) to match a detection to an active track
    pub max_dist: f32,
    /// Consecutive unmatched frames tolerated before a track moves to the lost pool
    pub max_misses: u32,
    /// Radius multiplier applied to max_dist when reactivating lost tracks
    pub reactivation_factor: f32,
    /// Seconds a lost track survives before it is purged
    pub lost_ttl_secs: f64,
    /// Number of instantaneous speed samples in the rolling average
    pub speed_window: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_dist: 80.0,
            max_misses: 30,
            reactivation_factor: 2.0,
            lost_ttl_secs: 60.0,
            speed_window: 10,
        }
    }
}

/// Floor for the elapsed time between two updates, so back-to-back updates
/// with the same timestamp do not divide by zero.
const MIN_DT_SECS: f64 = 1e-3;

// ============================================================================
// TRACK
// ============================================================================

#[derive(Debug, Clone)]
pub struct Track {
    pub id: u32,
    pub bbox: BBox,
    pub center: Point,
    /// Timestamp (seconds) of the last matched detection
    pub last_seen: f64,
    /// Instantaneous speed in px/s at the last update
    pub speed: f32,
    /// Mean of the last `speed_window` instantaneous speeds
    pub avg_speed: f32,
    pub age: u32,
    pub hits: u32,
    pub misses: u32,
    speed_history: VecDeque<f32>,
}

impl Track {
    pub fn new(id: u32, det: &Detection, timestamp: f64, speed_window: usize) -> Self {
        Self {
            id,
            bbox: det.bbox,
            center: det.center(),
            last_seen: timestamp,
            speed: 0.0,
            avg_speed: 0.0,
            age: 1,
            hits: 1,
            misses: 0,
            speed_history: VecDeque::with_capacity(speed_window),
        }
    }

    pub fn speed_samples(&self) -> usize {
        self.speed_history.len()
    }

    fn update_with_detection(&mut self, det: &Detection, timestamp: f64, speed_window: usize) {
        let center = det.center();
        let dt = (timestamp - self.last_seen).max(MIN_DT_SECS);
        let instant = (center.distance(&self.center) as f64 / dt) as f32;

        self.speed_history.push_back(instant);
        while self.speed_history.len() > speed_window {
            self.speed_history.pop_front();
        }
        self.avg_speed = self.speed_history.iter().sum::<f32>() / self.speed_history.len() as f32;
        self.speed = instant;

        self.bbox = det.bbox;
        self.center = center;
        self.last_seen = timestamp;
        self.age += 1;
        self.hits += 1;
        self.misses = 0;
    }

    fn mark_missed(&mut self) {
        self.misses += 1;
    }
}

// ============================================================================
// MAIN TRACKER
// ============================================================================

pub struct PersonTracker {
    pub config: TrackerConfig,
    active: Vec<Track>,
    lost: Vec<Track>,
    next_id: u32,
}

impl PersonTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            active: Vec::with_capacity(32),
            lost: Vec::new(),
            next_id: 1,
        }
    }

    /// Process one frame of detections. Returns the active tracks.
    pub fn update(&mut self, detections: &[Detection], timestamp: f64) -> &[Track] {
        let centers: Vec<Point> = detections.iter().map(|d| d.center()).collect();
        let mut consumed = vec![false; detections.len()];
        let window = self.config.speed_window.max(1);

        // ════════════════════════════════════════════════════════════════
        // PHASE 1: NEAREST-CENTER MATCHING
        // Each active track, in pool order, claims its nearest unclaimed
        // detection. Strict `<` keeps the first detection on distance ties.
        // ════════════════════════════════════════════════════════════════
        for track in &mut self.active {
            let mut best: Option<(usize, f32)> = None;
            for (di, c) in centers.iter().enumerate() {
                if consumed[di] {
                    continue;
                }
                let d = c.distance(&track.center);
                if best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((di, d));
                }
            }

            match best {
                Some((di, d)) if d <= self.config.max_dist => {
                    consumed[di] = true;
                    track.update_with_detection(&detections[di], timestamp, window);
                }
                _ => track.mark_missed(),
            }
        }

        // ════════════════════════════════════════════════════════════════
        // EXPIRED → LOST POOL
        // ════════════════════════════════════════════════════════════════
        let max_misses = self.config.max_misses;
        let (still_active, expired): (Vec<Track>, Vec<Track>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|t| t.misses <= max_misses);
        self.active = still_active;
        for t in expired {
            debug!("Track {} moved to lost pool after {} misses", t.id, t.misses);
            self.lost.push(t);
        }

        // ════════════════════════════════════════════════════════════════
        // PHASE 2: LOST-TRACK REACTIVATION
        // ════════════════════════════════════════════════════════════════
        let reactivation_radius = self.config.max_dist * self.config.reactivation_factor;
        for (di, c) in centers.iter().enumerate() {
            if consumed[di] {
                continue;
            }
            let mut best: Option<(usize, f32)> = None;
            for (li, t) in self.lost.iter().enumerate() {
                let d = c.distance(&t.center);
                if d <= reactivation_radius && best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((li, d));
                }
            }
            if let Some((li, d)) = best {
                let mut track = self.lost.remove(li);
                let unseen = timestamp - track.last_seen;
                track.update_with_detection(&detections[di], timestamp, window);
                info!(
                    "Track T{} reactivated (dist={:.0}px, unseen {:.1}s)",
                    track.id, d, unseen
                );
                self.active.push(track);
                consumed[di] = true;
            }
        }

        // ════════════════════════════════════════════════════════════════
        // UNMATCHED DETECTIONS → NEW TRACKS
        // ════════════════════════════════════════════════════════════════
        for (di, det) in detections.iter().enumerate() {
            if consumed[di] {
                continue;
            }
            let track = Track::new(self.next_id, det, timestamp, window);
            info!(
                "New track T{} created: bbox=[{:.0},{:.0},{:.0},{:.0}] conf={:.2}",
                track.id, det.bbox.x1, det.bbox.y1, det.bbox.x2, det.bbox.y2, det.confidence
            );
            self.next_id += 1;
            self.active.push(track);
        }

        // ════════════════════════════════════════════════════════════════
        // PURGE STALE LOST TRACKS
        // ════════════════════════════════════════════════════════════════
        let ttl = self.config.lost_ttl_secs;
        self.lost.retain(|t| {
            let unseen = timestamp - t.last_seen;
            if unseen > ttl {
                debug!("Track {} purged (unseen {:.1}s)", t.id, unseen);
                return false;
            }
            true
        });

        &self.active
    }

    pub fn active_tracks(&self) -> &[Track] {
        &self.active
    }

    pub fn lost_tracks(&self) -> &[Track] {
        &self.lost
    }

    pub fn get_track(&self, id: u32) -> Option<&Track> {
        self.active.iter().find(|t| t.id == id)
    }

    pub fn is_lost(&self, id: u32) -> bool {
        self.lost.iter().any(|t| t.id == id)
    }

    /// Number of identities handed out so far.
    pub fn tracks_created(&self) -> u32 {
        self.next_id - 1
    }
}

// ============================================================================
// TESTS
// ============================================================================
