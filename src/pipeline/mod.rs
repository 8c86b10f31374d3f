// src/pipeline/mod.rs

pub mod event_bus;
pub mod frame_context;
pub mod metrics;
pub mod occupancy_engine;

pub use event_bus::{EventBus, OccupancyEvent};
pub use frame_context::{FrameContext, TrackSummary, ZoneReport, ZoneRow};
pub use metrics::{EngineMetrics, MetricsSummary};
pub use occupancy_engine::{EngineConfig, FrameInput, OccupancyEngine};
