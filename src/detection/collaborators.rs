// src/detection/collaborators.rs

use crate::error::CollaboratorError;
use crate::geometry::{BBox, Polygon};
use crate::types::{Detection, Frame};
use serde::{Deserialize, Serialize};

/// Person detector backing the global and zone-focused passes.
pub trait PersonDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, CollaboratorError>;

    /// Detect inside `region` (full-frame coordinates). Returned boxes must
    /// be in full-frame coordinates as well.
    fn detect_in_region(
        &mut self,
        _frame: &Frame,
        _region: &BBox,
    ) -> Result<Vec<Detection>, CollaboratorError> {
        Err(CollaboratorError::Unsupported("detect_in_region"))
    }
}

/// Optional pose/segmentation signals used by the classifier.
///
/// Every method defaults to `Unsupported`; the classifier treats that as
/// "no signal" and takes its fallback branch.
pub trait BodyAnalyzer {
    fn is_standing_with_feet_visible(
        &self,
        _frame: &Frame,
        _bbox: &BBox,
    ) -> Result<bool, CollaboratorError> {
        Err(CollaboratorError::Unsupported("is_standing_with_feet_visible"))
    }

    fn validate_person_segment(
        &self,
        _frame: &Frame,
        _bbox: &BBox,
    ) -> Result<bool, CollaboratorError> {
        Err(CollaboratorError::Unsupported("validate_person_segment"))
    }

    /// `region` is in `crop` coordinates.
    fn has_head_or_torso_in_region(
        &self,
        _crop: &Frame,
        _region: &BBox,
    ) -> Result<bool, CollaboratorError> {
        Err(CollaboratorError::Unsupported("has_head_or_torso_in_region"))
    }
}

/// Analyzer with no models loaded. Every signal is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBodyAnalyzer;

impl BodyAnalyzer for NoBodyAnalyzer {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Pixels added around the zone's bounding box
    pub padding: f32,
    /// Regions narrower or shorter than this are skipped
    pub min_size: f32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            padding: 50.0,
            min_size: 100.0,
        }
    }
}

/// Padded, frame-clamped search region around a zone polygon.
pub fn padded_region(
    polygon: &Polygon,
    frame_width: f32,
    frame_height: f32,
    config: &RegionConfig,
) -> Option<BBox> {
    let region = polygon
        .bounding_box()?
        .expand(config.padding)
        .clamp_to(frame_width, frame_height);
    if region.width() < config.min_size || region.height() < config.min_size {
        return None;
    }
    Some(region)
}

/// Map a full-frame `bbox` into the coordinates of `crop`, cut from
/// `region` by `Frame::crop`, clipped to the crop. `None` when nothing of the
/// box lies inside.
pub fn crop_local_box(bbox: &BBox, region: &BBox, crop: &Frame) -> Option<BBox> {
    // Same origin `Frame::crop` used: truncated and clamped at zero
    let ox = region.x1.max(0.0).floor();
    let oy = region.y1.max(0.0).floor();
    let shifted = bbox.translate(-ox, -oy);
    let local = BBox::new(
        shifted.x1.max(0.0),
        shifted.y1.max(0.0),
        shifted.x2.min(crop.width as f32),
        shifted.y2.min(crop.height as f32),
    );
    if local.x2 <= local.x1 || local.y2 <= local.y1 {
        return None;
    }
    Some(local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_methods_report_unsupported() {
        let frame = Frame::blank(4, 4, 0.0);
        let bbox = BBox::new(0.0, 0.0, 2.0, 2.0);
        let analyzer = NoBodyAnalyzer;
        assert_eq!(
            analyzer.is_standing_with_feet_visible(&frame, &bbox),
            Err(CollaboratorError::Unsupported("is_standing_with_feet_visible"))
        );
        assert!(analyzer.validate_person_segment(&frame, &bbox).is_err());
        assert!(analyzer.has_head_or_torso_in_region(&frame, &bbox).is_err());
    }

    #[test]
    fn test_crop_local_box_shifts_and_clips() {
        let frame = Frame::blank(200, 200, 0.0);
        let region = BBox::new(50.5, 40.0, 150.0, 140.0);
        let crop = frame.crop(&region).unwrap();
        assert_eq!((crop.width, crop.height), (100, 100));

        let local = crop_local_box(&BBox::new(70.0, 20.0, 180.0, 90.0), &region, &crop).unwrap();
        assert_eq!(local, BBox::new(20.0, 0.0, 100.0, 50.0));
        assert!(crop_local_box(&BBox::new(0.0, 0.0, 30.0, 30.0), &region, &crop).is_none());
    }

    #[test]
    fn test_padded_region_clamps_to_frame() {
        let poly = Polygon::from_coords(&[(20.0, 30.0), (200.0, 30.0), (200.0, 150.0)]);
        let region = padded_region(&poly, 640.0, 480.0, &RegionConfig::default()).unwrap();
        assert_eq!(region, BBox::new(0.0, 0.0, 250.0, 200.0));
    }

    #[test]
    fn test_small_region_is_skipped() {
        // 20x20 polygon near a corner: padded to at most 70 px wide after clamping
        let poly = Polygon::from_coords(&[(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0)]);
        assert!(padded_region(&poly, 640.0, 480.0, &RegionConfig::default()).is_none());

        let poly = Polygon::from_coords(&[(300.0, 200.0), (320.0, 200.0), (320.0, 220.0)]);
        // 120 x 120 once padded
        assert!(padded_region(&poly, 640.0, 480.0, &RegionConfig::default()).is_some());
    }
}
