// src/analysis/mod.rs
//
// Per-frame occupancy analysis.
//
// Signal flow:
//   global + zone Detections → fusion → person_tracker → Track[]
//   Track × Zone → person_classifier → customer / staff / excluded
//   customers + staff → zone_state → seated set, occupied flag
//
// Orchestrated by pipeline::occupancy_engine::OccupancyEngine.

pub mod fusion;
pub mod person_classifier;
pub mod person_tracker;
pub mod zone_state;

pub use fusion::{DetectionFusion, FusionConfig, FusionOutcome};
pub use person_classifier::{
    Classification, ClassificationMetrics, ClassifierConfig, PersonClassifier, PersonLabel,
    ReasonCode, SignalSource,
};
pub use person_tracker::{PersonTracker, Track, TrackerConfig};
pub use zone_state::{
    HysteresisWindow, SeatObservation, SeatState, SeatingConfig, Zone, ZoneConfig,
    ZoneStateMachine, ZoneTransition,
};
