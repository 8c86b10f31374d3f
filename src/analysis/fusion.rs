// src/analysis/fusion.rs
//
// Merges the wide-field detection set with detections from zone-focused
// crops. The wide detector is coarse around occlusion-heavy tables; a crop
// around the table often yields a tighter, more confident box.
//
//   1. REFINE:   a global box is replaced by the best-overlapping zone box
//                when that box is an improvement (confidence or shape) and
//                does not sit on another global box or an earlier output
//   2. KEEP:     unrefined global boxes pass through untouched
//   3. DISCOVER: leftover zone boxes are added only if they do not overlap
//                anything already in the output
//
// All scans run in input order and only a strictly better candidate
// replaces the current best, so ties go to the first box seen.

use crate::geometry::iou;
use crate::types::Detection;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Minimum IoU (exclusive) between a global and a zone box for refinement
    pub improvement_threshold: f32,
    /// Confidence added to a zone box that replaces a global one (capped at 1.0)
    pub confidence_boost: f32,
    /// Zone confidence must reach this fraction of the global confidence
    pub min_confidence_ratio: f32,
    /// Aspect ratio (h/w) range of a well-framed person box
    pub person_aspect_min: f32,
    pub person_aspect_max: f32,
    /// Global boxes below this aspect ratio are considered squashed/partial
    pub coarse_aspect_max: f32,
    /// Leftover zone boxes overlapping any output box above this IoU are duplicates
    pub duplicate_iou: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            improvement_threshold: 0.3,
            confidence_boost: 0.1,
            min_confidence_ratio: 0.9,
            person_aspect_min: 1.5,
            person_aspect_max: 3.0,
            coarse_aspect_max: 1.2,
            duplicate_iou: 0.3,
        }
    }
}

/// Merged detections plus what happened to the inputs.
#[derive(Debug, Clone, Default)]
pub struct FusionOutcome {
    pub detections: Vec<Detection>,
    /// Global boxes replaced by a zone box
    pub refined: usize,
    /// Zone boxes added as newly discovered people
    pub discovered: usize,
    /// Zone boxes dropped as duplicates
    pub duplicates: usize,
}

pub struct DetectionFusion {
    config: FusionConfig,
}

impl DetectionFusion {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Merge `global` and `zone` detections into one list.
    pub fn combine(&self, global: &[Detection], zone: &[Detection]) -> Vec<Detection> {
        self.fuse(global, zone).detections
    }

    pub fn fuse(&self, global: &[Detection], zone: &[Detection]) -> FusionOutcome {
        let cfg = &self.config;
        let mut out = FusionOutcome {
            detections: Vec::with_capacity(global.len() + zone.len()),
            ..FusionOutcome::default()
        };
        let mut used = vec![false; zone.len()];

        for (gi, g) in global.iter().enumerate() {
            let mut best: Option<(usize, f32)> = None;
            for (zi, z) in zone.iter().enumerate() {
                if used[zi] {
                    continue;
                }
                let overlap = iou(&g.bbox, &z.bbox);
                if overlap <= cfg.improvement_threshold {
                    continue;
                }
                if best.map_or(false, |(_, b)| overlap <= b) {
                    continue;
                }
                if self.is_improvement(g, z) && !self.collides(gi, z, global, &out.detections) {
                    best = Some((zi, overlap));
                }
            }

            match best {
                Some((zi, overlap)) => {
                    used[zi] = true;
                    let z = &zone[zi];
                    debug!(
                        "Fusion: refined global box (conf={:.2}) with zone box (conf={:.2}, IoU={:.2})",
                        g.confidence, z.confidence, overlap
                    );
                    out.detections.push(Detection::new(
                        z.bbox,
                        (z.confidence + cfg.confidence_boost).min(1.0),
                    ));
                    out.refined += 1;
                }
                None => out.detections.push(*g),
            }
        }

        for (zi, z) in zone.iter().enumerate() {
            if used[zi] {
                continue;
            }
            let duplicate = out
                .detections
                .iter()
                .any(|d| iou(&d.bbox, &z.bbox) > cfg.duplicate_iou);
            if duplicate {
                out.duplicates += 1;
            } else {
                out.detections.push(*z);
                out.discovered += 1;
            }
        }

        if out.refined + out.discovered + out.duplicates > 0 {
            debug!(
                "Fusion: {} global + {} zone → {} (refined={}, discovered={}, duplicates={})",
                global.len(),
                zone.len(),
                out.detections.len(),
                out.refined,
                out.discovered,
                out.duplicates
            );
        }
        out
    }

    /// A refinement candidate for `global[gi]` must not duplicate another
    /// person: a global box distinct from `global[gi]`, or anything already
    /// emitted. Globals that themselves duplicate `global[gi]` don't count.
    fn collides(
        &self,
        gi: usize,
        zone: &Detection,
        global: &[Detection],
        emitted: &[Detection],
    ) -> bool {
        let limit = self.config.duplicate_iou;
        let target = &global[gi].bbox;
        global.iter().enumerate().any(|(i, g)| {
            i != gi && iou(&g.bbox, target) <= limit && iou(&g.bbox, &zone.bbox) > limit
        }) || emitted.iter().any(|d| iou(&d.bbox, &zone.bbox) > limit)
    }

    /// A zone box improves a global one if it is about as confident, or if
    /// it is person-shaped where the global box is squashed.
    fn is_improvement(&self, global: &Detection, zone: &Detection) -> bool {
        let cfg = &self.config;
        if zone.confidence >= global.confidence * cfg.min_confidence_ratio {
            return true;
        }
        let zone_aspect = zone.aspect_ratio();
        let global_aspect = global.aspect_ratio();
        (cfg.person_aspect_min..=cfg.person_aspect_max).contains(&zone_aspect)
            && global_aspect < cfg.coarse_aspect_max
    }
}

impl Default for DetectionFusion {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
