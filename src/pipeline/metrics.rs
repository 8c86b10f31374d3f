// src/pipeline/metrics.rs
//
// Counters and timings for the occupancy engine. Cloning shares the
// counters, so a handle can be passed to a reporting thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct EngineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub frames_with_people: Arc<AtomicU64>,
    pub detections_in: Arc<AtomicU64>,
    pub detections_rejected: Arc<AtomicU64>,
    pub fusion_refined: Arc<AtomicU64>,
    pub fusion_discovered: Arc<AtomicU64>,
    pub tracks_created: Arc<AtomicU64>,
    pub collaborator_fallbacks: Arc<AtomicU64>,
    pub detector_failures: Arc<AtomicU64>,
    pub partial_bodies_dropped: Arc<AtomicU64>,
    pub seats_confirmed: Arc<AtomicU64>,
    pub occupancy_changes: Arc<AtomicU64>,
    pub frame_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            frames_with_people: Arc::new(AtomicU64::new(0)),
            detections_in: Arc::new(AtomicU64::new(0)),
            detections_rejected: Arc::new(AtomicU64::new(0)),
            fusion_refined: Arc::new(AtomicU64::new(0)),
            fusion_discovered: Arc::new(AtomicU64::new(0)),
            tracks_created: Arc::new(AtomicU64::new(0)),
            collaborator_fallbacks: Arc::new(AtomicU64::new(0)),
            detector_failures: Arc::new(AtomicU64::new(0)),
            partial_bodies_dropped: Arc::new(AtomicU64::new(0)),
            seats_confirmed: Arc::new(AtomicU64::new(0)),
            occupancy_changes: Arc::new(AtomicU64::new(0)),
            frame_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            frames_with_people: self.frames_with_people.load(Ordering::Relaxed),
            detections_in: self.detections_in.load(Ordering::Relaxed),
            detections_rejected: self.detections_rejected.load(Ordering::Relaxed),
            fusion_refined: self.fusion_refined.load(Ordering::Relaxed),
            fusion_discovered: self.fusion_discovered.load(Ordering::Relaxed),
            tracks_created: self.tracks_created.load(Ordering::Relaxed),
            collaborator_fallbacks: self.collaborator_fallbacks.load(Ordering::Relaxed),
            detector_failures: self.detector_failures.load(Ordering::Relaxed),
            partial_bodies_dropped: self.partial_bodies_dropped.load(Ordering::Relaxed),
            seats_confirmed: self.seats_confirmed.load(Ordering::Relaxed),
            occupancy_changes: self.occupancy_changes.load(Ordering::Relaxed),
            last_frame_us: self.frame_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub frames_with_people: u64,
    pub detections_in: u64,
    pub detections_rejected: u64,
    pub fusion_refined: u64,
    pub fusion_discovered: u64,
    pub tracks_created: u64,
    pub collaborator_fallbacks: u64,
    pub detector_failures: u64,
    /// Zone-crop boxes dropped because no head or torso was visible
    pub partial_bodies_dropped: u64,
    pub seats_confirmed: u64,
    pub occupancy_changes: u64,
    pub last_frame_us: u64,
    pub elapsed_secs: f64,
}
