// src/detection/mod.rs
//
// Interfaces to the model collaborators and the detection pre-filter.
// The engine never runs inference itself; it talks to whatever implements
// `PersonDetector` and `BodyAnalyzer`.

mod collaborators;
mod filter;

pub use collaborators::{
    crop_local_box, padded_region, BodyAnalyzer, NoBodyAnalyzer, PersonDetector, RegionConfig,
};
pub use filter::{DetectionFilter, FilterConfig, FilterOutcome, Rejection};
