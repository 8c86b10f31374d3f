// src/error.rs
//
// Library error types. Application code (main.rs, replay) wraps these in
// anyhow with context; the per-frame engine path never returns them.

use thiserror::Error;

/// Errors raised while loading engine or zone configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("zone file has neither a `tables` nor a `mesas` list")]
    MissingZones,

    #[error("zone {id}: polygon needs at least 3 vertices, got {count}")]
    TooFewVertices { id: String, count: usize },

    #[error("zone {id}: polygon has non-finite coordinates")]
    NonFiniteVertex { id: String },

    #[error("zone {id}: y_band min {min} exceeds max {max}")]
    InvertedBand { id: String, min: f32, max: f32 },

    #[error("duplicate zone id {0}")]
    DuplicateZone(String),

    #[error("exclusion polygon {index} needs at least 3 vertices")]
    InvalidExclusion { index: usize },
}

/// Outcome of a failed or unavailable collaborator call.
///
/// `Unsupported` is what the default trait methods return, so a collaborator
/// that only implements part of the interface falls back cleanly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    #[error("{0} is not supported by this collaborator")]
    Unsupported(&'static str),

    #[error("{operation} failed: {message}")]
    Failed {
        operation: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn failed<S: Into<String>>(operation: &'static str, message: S) -> Self {
        Self::Failed {
            operation,
            message: message.into(),
        }
    }
}
