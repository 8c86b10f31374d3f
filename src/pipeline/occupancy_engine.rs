// src/pipeline/occupancy_engine.rs
//
// Orchestrator that wires together the detection filter, fusion, tracker,
// classifier and per-zone state machines.
//
// Two entry points:
//   - step():          caller already has detections (replay, tests)
//   - process_frame(): engine drives a PersonDetector over the full frame
//                      and every zone's padded region, then calls step()
//
// Frame order: filter → fuse → track → (classify → seat) per zone.
// Nothing in here returns an error; collaborator trouble turns into
// fallbacks and counters.

use crate::analysis::{
    ClassifierConfig, DetectionFusion, FusionConfig, PersonClassifier, PersonLabel,
    PersonTracker, SeatObservation, SeatingConfig, TrackerConfig, Zone, ZoneConfig,
    ZoneStateMachine, ZoneTransition,
};
use crate::detection::{
    crop_local_box, padded_region, BodyAnalyzer, DetectionFilter, FilterConfig, PersonDetector,
    RegionConfig,
};
use crate::error::CollaboratorError;
use crate::geometry::{BBox, Polygon};
use crate::pipeline::event_bus::{EventBus, OccupancyEvent};
use crate::pipeline::frame_context::{FrameContext, TrackSummary, ZoneReport};
use crate::pipeline::metrics::EngineMetrics;
use crate::types::{Detection, Frame};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, warn};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tracker: TrackerConfig,
    pub fusion: FusionConfig,
    pub filter: FilterConfig,
    pub classifier: ClassifierConfig,
    pub seating: SeatingConfig,
    pub region: RegionConfig,
    /// Pending events kept before the oldest are dropped
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            fusion: FusionConfig::default(),
            filter: FilterConfig::default(),
            classifier: ClassifierConfig::default(),
            seating: SeatingConfig::default(),
            region: RegionConfig::default(),
            event_capacity: 256,
        }
    }
}

// ============================================================================
// INPUT
// ============================================================================

pub struct FrameInput<'a> {
    /// Detections from the full-frame pass
    pub global_detections: &'a [Detection],
    /// Detections from zone-focused passes, full-frame coordinates
    pub zone_detections: &'a [Detection],
    /// Pixels for the body analyzer; `None` disables model checks
    pub frame: Option<&'a Frame>,
    /// Seconds, monotonic
    pub timestamp: f64,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct OccupancyEngine {
    region: RegionConfig,
    filter: DetectionFilter,
    fusion: DetectionFusion,
    tracker: PersonTracker,
    classifier: PersonClassifier,
    state_machine: ZoneStateMachine,
    zones: Vec<Zone>,
    events: EventBus,
    metrics: EngineMetrics,
    frame_width: f32,
    frame_height: f32,
    frame_count: u64,
}

impl OccupancyEngine {
    pub fn new(
        config: EngineConfig,
        zones: Vec<ZoneConfig>,
        exclusions: Vec<Polygon>,
        frame_width: f32,
        frame_height: f32,
    ) -> Self {
        let state_machine = ZoneStateMachine::new(config.seating);
        let zones: Vec<Zone> = zones
            .into_iter()
            .map(|z| state_machine.new_zone(z))
            .collect();

        info!(
            "Occupancy engine: {} zones, {} exclusions, frame {}x{}",
            zones.len(),
            exclusions.len(),
            frame_width,
            frame_height
        );

        Self {
            region: config.region,
            filter: DetectionFilter::new(config.filter, frame_width, frame_height, exclusions),
            fusion: DetectionFusion::new(config.fusion),
            tracker: PersonTracker::new(config.tracker),
            classifier: PersonClassifier::new(config.classifier),
            state_machine,
            zones,
            events: EventBus::new(config.event_capacity),
            metrics: EngineMetrics::new(),
            frame_width,
            frame_height,
            frame_count: 0,
        }
    }

    /// Run one frame of already-detected people through the engine.
    pub fn step(&mut self, input: FrameInput, analyzer: &dyn BodyAnalyzer) -> FrameContext {
        let started = Instant::now();
        self.frame_count += 1;
        let frame_id = self.frame_count;
        let now = input.timestamp;
        let mut ctx = FrameContext::new(frame_id, now);

        // ════════════════════════════════════════════════════════════
        // 1. FILTER + FUSE
        // ════════════════════════════════════════════════════════════
        let global = self.filter.apply(input.global_detections);
        let zone = self.filter.apply(input.zone_detections);
        ctx.rejected = global.rejected + zone.rejected;

        let fused = self.fusion.fuse(&global.kept, &zone.kept);

        self.metrics.add(
            &self.metrics.detections_in,
            (input.global_detections.len() + input.zone_detections.len()) as u64,
        );
        self.metrics.add(&self.metrics.detections_rejected, ctx.rejected as u64);
        self.metrics.add(&self.metrics.fusion_refined, fused.refined as u64);
        self.metrics.add(&self.metrics.fusion_discovered, fused.discovered as u64);

        // ════════════════════════════════════════════════════════════
        // 2. TRACKING
        // ════════════════════════════════════════════════════════════
        let created_before = self.tracker.tracks_created();
        self.tracker.update(&fused.detections, now);
        self.metrics.add(
            &self.metrics.tracks_created,
            (self.tracker.tracks_created() - created_before) as u64,
        );
        let tracks = self.tracker.active_tracks();
        if !tracks.is_empty() {
            self.metrics.inc(&self.metrics.frames_with_people);
        }

        // ════════════════════════════════════════════════════════════
        // 3. PER-ZONE CLASSIFICATION + SEATING
        // ════════════════════════════════════════════════════════════
        let mut fallbacks = 0u64;
        for zone in self.zones.iter_mut() {
            let mut customers = Vec::new();
            let mut staff = BTreeSet::new();

            for track in tracks {
                let result = self
                    .classifier
                    .classify(track, &zone.config, input.frame, analyzer);
                fallbacks += result.metrics.fallbacks as u64;

                match result.label {
                    PersonLabel::Customer => customers.push(SeatObservation {
                        track_id: track.id,
                        center: track.center,
                        avg_speed: track.avg_speed,
                    }),
                    PersonLabel::Staff => {
                        staff.insert(track.id);
                    }
                    PersonLabel::Excluded => {}
                }

                if result.metrics.area_pct > 0.0 {
                    debug!(
                        "Zone {}: T{} → {} ({}, area={:.2}, AR={:.2}, speed={:.1})",
                        zone.config.id,
                        track.id,
                        result.label.as_str(),
                        result.reason.as_str(),
                        result.metrics.area_pct,
                        result.metrics.aspect_ratio,
                        result.metrics.speed
                    );
                }
            }

            let transitions = self
                .state_machine
                .update_zone(zone, &customers, staff, now);
            for t in transitions {
                match t {
                    ZoneTransition::TrackSeated { .. } => {
                        self.metrics.inc(&self.metrics.seats_confirmed)
                    }
                    ZoneTransition::Occupied { .. } | ZoneTransition::Vacated => {
                        self.metrics.inc(&self.metrics.occupancy_changes)
                    }
                    _ => {}
                }
                self.events
                    .publish(OccupancyEvent::new(frame_id, now, &zone.config.id, t));
            }
            ctx.zones.push(ZoneReport::from(&*zone));
        }
        self.metrics.add(&self.metrics.collaborator_fallbacks, fallbacks);

        ctx.detections = fused.detections;
        ctx.tracks = tracks.iter().map(TrackSummary::from).collect();

        self.metrics.inc(&self.metrics.total_frames);
        self.metrics.set_timing(
            &self.metrics.frame_time_us,
            started.elapsed().as_micros() as u64,
        );
        ctx
    }

    /// Detect people with `detector` (full frame plus one pass per zone
    /// region), then run `step`. Detector failures become empty lists.
    /// Region boxes the analyzer says show no head or torso are dropped
    /// before fusion.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        detector: &mut dyn PersonDetector,
        analyzer: &dyn BodyAnalyzer,
    ) -> FrameContext {
        let global = match detector.detect(frame) {
            Ok(dets) => dets,
            Err(e) => {
                warn!("Global detection failed: {}", e);
                self.metrics.inc(&self.metrics.detector_failures);
                Vec::new()
            }
        };

        let mut zone_dets = Vec::new();
        for zone in &self.zones {
            let Some(region) = padded_region(
                &zone.config.polygon,
                self.frame_width,
                self.frame_height,
                &self.region,
            ) else {
                continue;
            };
            match detector.detect_in_region(frame, &region) {
                Ok(dets) => {
                    let crop = frame.crop(&region);
                    for det in dets {
                        if self.shows_head_or_torso(&det, &region, crop.as_ref(), analyzer) {
                            zone_dets.push(det);
                        } else {
                            debug!(
                                "Zone {}: dropped partial body at ({:.0},{:.0})-({:.0},{:.0})",
                                zone.config.id, det.bbox.x1, det.bbox.y1, det.bbox.x2, det.bbox.y2
                            );
                            self.metrics.inc(&self.metrics.partial_bodies_dropped);
                        }
                    }
                }
                Err(CollaboratorError::Unsupported(_)) => break,
                Err(e) => {
                    warn!("Zone {} region detection failed: {}", zone.config.id, e);
                    self.metrics.inc(&self.metrics.detector_failures);
                }
            }
        }

        self.step(
            FrameInput {
                global_detections: &global,
                zone_detections: &zone_dets,
                frame: Some(frame),
                timestamp: frame.timestamp,
            },
            analyzer,
        )
    }

    /// Only an explicit "no" from the analyzer rejects a region box.
    fn shows_head_or_torso(
        &self,
        det: &Detection,
        region: &BBox,
        crop: Option<&Frame>,
        analyzer: &dyn BodyAnalyzer,
    ) -> bool {
        let Some(crop) = crop else {
            return true;
        };
        let Some(local) = crop_local_box(&det.bbox, region, crop) else {
            return true;
        };
        match analyzer.has_head_or_torso_in_region(crop, &local) {
            Ok(answer) => answer,
            Err(e) => {
                debug!("has_head_or_torso_in_region unavailable, keeping box: {}", e);
                true
            }
        }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, zone_id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id() == zone_id)
    }

    pub fn drain_events(&mut self) -> Vec<OccupancyEvent> {
        self.events.drain()
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

// ============================================================================
// TESTS
// ============================================================================
