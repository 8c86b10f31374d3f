// src/detection/filter.rs
//
// Cheap geometric sanity checks applied to raw detections before fusion.
// Detections are dropped when they are:
//   - below the confidence threshold
//   - degenerate (zero area / non-finite)
//   - too small or too large relative to the frame
//   - implausibly shaped for a person
//   - clipped by the frame border
//   - centered inside an exclusion polygon (bar counters, doorways, ...)

use crate::geometry::Polygon;
use crate::types::Detection;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub conf_thr: f32,
    /// Box area as a fraction of the frame area
    pub min_bbox_frac: f32,
    pub max_bbox_frac: f32,
    /// Height over width
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
    /// Boxes within this many pixels of the border are partial people
    pub edge_margin: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            conf_thr: 0.5,
            min_bbox_frac: 0.001,
            max_bbox_frac: 0.09,
            min_aspect_ratio: 0.35,
            max_aspect_ratio: 3.2,
            edge_margin: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    LowConfidence,
    Degenerate,
    AreaOutOfRange,
    AspectOutOfRange,
    TouchesBorder,
    InExclusionZone,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::LowConfidence => "low_confidence",
            Rejection::Degenerate => "degenerate",
            Rejection::AreaOutOfRange => "area_out_of_range",
            Rejection::AspectOutOfRange => "aspect_out_of_range",
            Rejection::TouchesBorder => "touches_border",
            Rejection::InExclusionZone => "in_exclusion_zone",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub kept: Vec<Detection>,
    pub rejected: usize,
}

pub struct DetectionFilter {
    config: FilterConfig,
    frame_width: f32,
    frame_height: f32,
    exclusions: Vec<Polygon>,
}

impl DetectionFilter {
    pub fn new(
        config: FilterConfig,
        frame_width: f32,
        frame_height: f32,
        exclusions: Vec<Polygon>,
    ) -> Self {
        Self {
            config,
            frame_width,
            frame_height,
            exclusions,
        }
    }

    pub fn check(&self, det: &Detection) -> Result<(), Rejection> {
        let cfg = &self.config;
        if det.confidence < cfg.conf_thr {
            return Err(Rejection::LowConfidence);
        }
        let b = &det.bbox;
        if b.is_degenerate() {
            return Err(Rejection::Degenerate);
        }

        let frame_area = self.frame_width * self.frame_height;
        if frame_area > 0.0 {
            let frac = b.area() / frame_area;
            if frac < cfg.min_bbox_frac || frac > cfg.max_bbox_frac {
                return Err(Rejection::AreaOutOfRange);
            }
        }

        let aspect = b.aspect_ratio();
        if aspect < cfg.min_aspect_ratio || aspect > cfg.max_aspect_ratio {
            return Err(Rejection::AspectOutOfRange);
        }

        let m = cfg.edge_margin;
        if b.x1 <= m
            || b.y1 <= m
            || b.x2 >= self.frame_width - m
            || b.y2 >= self.frame_height - m
        {
            return Err(Rejection::TouchesBorder);
        }

        let center = b.center();
        if self.exclusions.iter().any(|poly| poly.contains(&center)) {
            return Err(Rejection::InExclusionZone);
        }
        Ok(())
    }

    pub fn apply(&self, detections: &[Detection]) -> FilterOutcome {
        let mut out = FilterOutcome::default();
        for det in detections {
            match self.check(det) {
                Ok(()) => out.kept.push(*det),
                Err(reason) => {
                    debug!(
                        "Filter: rejected box {:?} (conf={:.2}): {}",
                        det.bbox,
                        det.confidence,
                        reason.as_str()
                    );
                    out.rejected += 1;
                }
            }
        }

        if !detections.is_empty() && out.rejected * 2 > detections.len() {
            warn!(
                "Filter rejected {}/{} detections this frame",
                out.rejected,
                detections.len()
            );
        }
        out
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32, conf: f32) -> Detection {
        Detection::from_coords(x1, y1, x2, y2, conf)
    }

    fn filter() -> DetectionFilter {
        DetectionFilter::new(FilterConfig::default(), 1000.0, 1000.0, Vec::new())
    }

    #[test]
    fn test_plausible_person_is_kept() {
        // 100x200 in a 1000x1000 frame: 2% of the area, aspect 2.0
        assert_eq!(filter().check(&det(400.0, 300.0, 500.0, 500.0, 0.8)), Ok(()));
    }

    #[test]
    fn test_rejection_reasons() {
        let f = filter();
        assert_eq!(
            f.check(&det(400.0, 300.0, 500.0, 500.0, 0.3)),
            Err(Rejection::LowConfidence)
        );
        assert_eq!(
            f.check(&det(400.0, 300.0, 400.0, 500.0, 0.9)),
            Err(Rejection::Degenerate)
        );
        // 400x400 = 16% of the frame
        assert_eq!(
            f.check(&det(100.0, 100.0, 500.0, 500.0, 0.9)),
            Err(Rejection::AreaOutOfRange)
        );
        // 50x200 → aspect 4.0
        assert_eq!(
            f.check(&det(400.0, 300.0, 450.0, 500.0, 0.9)),
            Err(Rejection::AspectOutOfRange)
        );
        assert_eq!(
            f.check(&det(3.0, 300.0, 103.0, 500.0, 0.9)),
            Err(Rejection::TouchesBorder)
        );
        assert_eq!(
            f.check(&det(880.0, 300.0, 996.0, 500.0, 0.9)),
            Err(Rejection::TouchesBorder)
        );
    }

    #[test]
    fn test_exclusion_polygon_rejects_by_center() {
        let bar = Polygon::from_coords(&[(400.0, 350.0), (600.0, 350.0), (600.0, 450.0), (400.0, 450.0)]);
        let f = DetectionFilter::new(FilterConfig::default(), 1000.0, 1000.0, vec![bar]);
        assert_eq!(
            f.check(&det(400.0, 300.0, 500.0, 500.0, 0.8)),
            Err(Rejection::InExclusionZone)
        );
        assert_eq!(f.check(&det(100.0, 300.0, 200.0, 500.0, 0.8)), Ok(()));
    }

    #[test]
    fn test_apply_counts_rejections_and_keeps_order() {
        let dets = vec![
            det(100.0, 300.0, 200.0, 500.0, 0.9),
            det(400.0, 300.0, 500.0, 500.0, 0.1),
            det(600.0, 300.0, 700.0, 450.0, 0.7),
        ];
        let out = filter().apply(&dets);
        assert_eq!(out.kept, vec![dets[0], dets[2]]);
        assert_eq!(out.rejected, 1);
    }
}
