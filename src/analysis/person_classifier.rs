// src/analysis/person_classifier.rs
//
// Decides, for one track and one zone, whether the person is a seated
// customer, standing staff, or someone to ignore.
//
// Short-circuiting checks, cheapest first:
//   0. box sanity
//   1. overlap of the person box with the zone polygon
//   2. average speed
//   3. optional vertical band
//   4. posture (model, else aspect-ratio fallback) and walking
//   5. "likely seated" shape/speed gate
//   6. segment validation (model only)
//   7. zone-local head/torso check (model only)
//
// Model signals are optional. A missing or failing collaborator never
// rejects a person by itself; it only switches the check to its fallback.

use crate::analysis::person_tracker::Track;
use crate::analysis::zone_state::ZoneConfig;
use crate::detection::{crop_local_box, BodyAnalyzer};
use crate::error::CollaboratorError;
use crate::geometry::{BBox, Point};
use crate::types::Frame;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum fraction of the person box inside the zone (zone `iop_thr` overrides)
    pub min_area_pct: f32,
    /// Rolling-average speed (px/s) above which a track is a passer-by
    pub max_speed: f32,
    /// Aspect ratio (h/w) above which a person counts as standing when no
    /// posture model answers
    pub standing_aspect: f32,
    /// Rolling-average speed (px/s) above which a person counts as walking
    pub walking_speed: f32,
    /// Tallest aspect ratio still compatible with sitting
    pub seated_aspect_max: f32,
    /// Relative heights (from the box top) of the head and torso probe points
    pub head_frac: f32,
    pub torso_frac: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_area_pct: 0.08,
            max_speed: 80.0,
            standing_aspect: 2.5,
            walking_speed: 12.0,
            seated_aspect_max: 2.0,
            head_frac: 0.15,
            torso_frac: 0.40,
        }
    }
}

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonLabel {
    Customer,
    Staff,
    Excluded,
}

impl PersonLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonLabel::Customer => "customer",
            PersonLabel::Staff => "staff",
            PersonLabel::Excluded => "excluded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    InvalidBbox,
    InsufficientArea,
    MovingTooFast,
    OutsideYBand,
    PersonStandingOrWalking,
    AmbiguousClassification,
    SegmentValidationFailed,
    OnlyFeetInZone,
    Accepted,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::InvalidBbox => "invalid_bbox",
            ReasonCode::InsufficientArea => "insufficient_area",
            ReasonCode::MovingTooFast => "moving_too_fast",
            ReasonCode::OutsideYBand => "outside_y_band",
            ReasonCode::PersonStandingOrWalking => "person_standing_or_walking",
            ReasonCode::AmbiguousClassification => "ambiguous_classification",
            ReasonCode::SegmentValidationFailed => "segment_validation_failed",
            ReasonCode::OnlyFeetInZone => "only_feet_in_zone",
            ReasonCode::Accepted => "accepted",
        }
    }
}

/// Where a posture or body-part signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Model,
    Fallback,
}

/// Numeric inputs behind a classification. Fields stay `None` when the
/// check that produces them was never reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub area_pct: f32,
    pub aspect_ratio: f32,
    pub speed: f32,
    pub center_y: f32,
    pub standing: Option<bool>,
    pub posture_source: Option<SignalSource>,
    pub walking: Option<bool>,
    pub segment_valid: Option<bool>,
    pub segment_source: Option<SignalSource>,
    pub head_torso_valid: Option<bool>,
    pub head_torso_source: Option<SignalSource>,
    pub head_in_zone: Option<bool>,
    pub torso_in_zone: Option<bool>,
    /// Collaborator calls that were unavailable or failed
    pub fallbacks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: PersonLabel,
    pub reason: ReasonCode,
    pub metrics: ClassificationMetrics,
}

impl Classification {
    fn new(label: PersonLabel, reason: ReasonCode, metrics: ClassificationMetrics) -> Self {
        Self {
            label,
            reason,
            metrics,
        }
    }

    pub fn is_customer(&self) -> bool {
        self.label == PersonLabel::Customer
    }

    pub fn is_staff(&self) -> bool {
        self.label == PersonLabel::Staff
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct PersonClassifier {
    config: ClassifierConfig,
}

impl PersonClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn classify(
        &self,
        track: &Track,
        zone: &ZoneConfig,
        frame: Option<&Frame>,
        analyzer: &dyn BodyAnalyzer,
    ) -> Classification {
        use PersonLabel::*;
        use ReasonCode::*;

        let cfg = &self.config;
        let bbox = track.bbox;
        let center = bbox.center();
        let mut m = ClassificationMetrics {
            aspect_ratio: bbox.aspect_ratio(),
            speed: track.avg_speed,
            center_y: center.y,
            ..ClassificationMetrics::default()
        };

        // ════════════════════════════════════════════════════════════
        // 0-3. GEOMETRY AND MOTION
        // ════════════════════════════════════════════════════════════
        if bbox.is_degenerate() {
            return Classification::new(Excluded, InvalidBbox, m);
        }

        m.area_pct = zone.polygon.intersection_area(&bbox) / bbox.area();
        let min_area = zone.iop_thr.unwrap_or(cfg.min_area_pct);
        if m.area_pct < min_area {
            return Classification::new(Excluded, InsufficientArea, m);
        }

        if track.avg_speed > cfg.max_speed {
            return Classification::new(Excluded, MovingTooFast, m);
        }

        if let Some((y_min, y_max)) = zone.y_band {
            if center.y < y_min || center.y > y_max {
                return Classification::new(Excluded, OutsideYBand, m);
            }
        }

        // ════════════════════════════════════════════════════════════
        // 4-5. POSTURE
        // ════════════════════════════════════════════════════════════
        let standing = match self.ask(frame, "is_standing_with_feet_visible", |f| {
            analyzer.is_standing_with_feet_visible(f, &bbox)
        }) {
            Some(standing) => {
                m.posture_source = Some(SignalSource::Model);
                standing
            }
            None => {
                m.fallbacks += 1;
                m.posture_source = Some(SignalSource::Fallback);
                m.aspect_ratio > cfg.standing_aspect
            }
        };
        let walking = track.avg_speed > cfg.walking_speed;
        m.standing = Some(standing);
        m.walking = Some(walking);

        if standing {
            return Classification::new(Staff, PersonStandingOrWalking, m);
        }
        if walking {
            return Classification::new(Excluded, PersonStandingOrWalking, m);
        }

        let likely_seated = m.aspect_ratio <= cfg.seated_aspect_max
            && track.avg_speed < cfg.walking_speed
            && m.area_pct > min_area;
        if !likely_seated {
            return Classification::new(Excluded, AmbiguousClassification, m);
        }

        // ════════════════════════════════════════════════════════════
        // 6-7. MODEL VALIDATION
        // ════════════════════════════════════════════════════════════
        match self.ask(frame, "validate_person_segment", |f| {
            analyzer.validate_person_segment(f, &bbox)
        }) {
            Some(valid) => {
                m.segment_valid = Some(valid);
                m.segment_source = Some(SignalSource::Model);
                if !valid {
                    debug!(
                        "Zone {}: track T{} rejected, segment is not a full person (AR={:.2}, speed={:.1})",
                        zone.id, track.id, m.aspect_ratio, m.speed
                    );
                    return Classification::new(Excluded, SegmentValidationFailed, m);
                }
            }
            None => {
                m.fallbacks += 1;
                m.segment_source = Some(SignalSource::Fallback);
            }
        }

        match frame.and_then(|f| self.zone_local_check(f, &bbox, zone, analyzer)) {
            Some(valid) => {
                m.head_torso_valid = Some(valid);
                m.head_torso_source = Some(SignalSource::Model);
                if !valid {
                    debug!(
                        "Zone {}: track T{} rejected, only feet/legs inside the zone (AR={:.2}, speed={:.1})",
                        zone.id, track.id, m.aspect_ratio, m.speed
                    );
                    return Classification::new(Excluded, OnlyFeetInZone, m);
                }
            }
            None => {
                m.fallbacks += 1;
                m.head_torso_source = Some(SignalSource::Fallback);
            }
        }

        // ════════════════════════════════════════════════════════════
        // 8. ACCEPT
        // ════════════════════════════════════════════════════════════
        let h = bbox.height();
        let head = Point::new(center.x, bbox.y1 + h * cfg.head_frac);
        let torso = Point::new(center.x, bbox.y1 + h * cfg.torso_frac);
        m.head_in_zone = Some(zone.polygon.contains(&head));
        m.torso_in_zone = Some(zone.polygon.contains(&torso));

        Classification::new(Customer, Accepted, m)
    }

    /// Run a frame-based collaborator query. `None` means no usable answer.
    fn ask<F>(&self, frame: Option<&Frame>, operation: &str, query: F) -> Option<bool>
    where
        F: FnOnce(&Frame) -> Result<bool, CollaboratorError>,
    {
        let frame = frame?;
        match query(frame) {
            Ok(answer) => Some(answer),
            Err(e) => {
                debug!("{} unavailable, using fallback: {}", operation, e);
                None
            }
        }
    }

    /// Head/torso check restricted to the zone's bounding rectangle.
    /// `None` when the crop is empty, the person lies outside it, or the
    /// collaborator has no answer.
    fn zone_local_check(
        &self,
        frame: &Frame,
        bbox: &BBox,
        zone: &ZoneConfig,
        analyzer: &dyn BodyAnalyzer,
    ) -> Option<bool> {
        let zone_box = zone.polygon.bounding_box()?;
        let crop = frame.crop(&zone_box)?;
        let local = crop_local_box(bbox, &zone_box, &crop)?;

        self.ask(Some(&crop), "has_head_or_torso_in_region", |c| {
            analyzer.has_head_or_torso_in_region(c, &local)
        })
    }
}

impl Default for PersonClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
