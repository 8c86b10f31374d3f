// src/lib.rs
//
// Zone occupancy engine: decides, frame by frame, which configured zones
// (restaurant tables) are occupied by seated people.

pub mod analysis;
pub mod config;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod replay;
pub mod types;

pub use config::{load_zones, ZoneFile};
pub use error::{CollaboratorError, ConfigError};
pub use pipeline::{EngineConfig, FrameContext, FrameInput, OccupancyEngine, OccupancyEvent};
pub use types::{Config, Detection, Frame};
