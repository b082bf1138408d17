//! Detection normalization.
//!
//! Upstream detectors emit overlapping boxes, boxes that spill off the frame,
//! and the occasional garbage value. The normalizer turns one frame's raw
//! detections into a canonical set:
//!
//! 1. **Sanitize:** drop non-finite values, confidences outside [0, 1],
//!    and boxes with no usable area inside the frame.
//! 2. **Clip:** intersect boxes with the frame; drop off-frame keypoints.
//! 3. **Threshold:** drop detections below the confidence threshold.
//! 4. **Deduplicate:** greedy non-maximum suppression by IoU.
//!
//! An empty result is a normal outcome, not an error.

use reframe_model::detection::{Detection, Keypoint};
use reframe_model::geometry::FrameSize;
use serde::{Deserialize, Serialize};

/// Configuration for the detection normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Detections below this confidence are dropped.
    pub confidence_threshold: f64,

    /// Boxes overlapping a more confident box by at least this IoU are
    /// treated as duplicates.
    pub dedup_iou_threshold: f64,

    /// Minimum clipped box width and height in pixels.
    pub min_box_size_px: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            dedup_iou_threshold: 0.6,
            min_box_size_px: 4.0,
        }
    }
}

/// Per-frame bookkeeping of what the normalizer removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub input: usize,
    pub kept: usize,
    pub malformed: usize,
    pub below_threshold: usize,
    pub suppressed: usize,
    pub keypoints_dropped: usize,
}

impl NormalizeStats {
    /// Accumulate another frame's stats.
    pub fn merge(&mut self, other: &NormalizeStats) {
        self.input += other.input;
        self.kept += other.kept;
        self.malformed += other.malformed;
        self.below_threshold += other.below_threshold;
        self.suppressed += other.suppressed;
        self.keypoints_dropped += other.keypoints_dropped;
    }
}

/// Stateless detection normalizer.
#[derive(Debug, Clone)]
pub struct DetectionNormalizer {
    config: NormalizerConfig,
}

impl DetectionNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(NormalizerConfig::default())
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize one frame's detections. Output is sorted by confidence,
    /// highest first.
    pub fn normalize(&self, raw: &[Detection], frame: FrameSize) -> Vec<Detection> {
        self.normalize_with_stats(raw, frame).0
    }

    /// Normalize and report what was removed.
    pub fn normalize_with_stats(
        &self,
        raw: &[Detection],
        frame: FrameSize,
    ) -> (Vec<Detection>, NormalizeStats) {
        let mut stats = NormalizeStats {
            input: raw.len(),
            ..Default::default()
        };

        let mut candidates = Vec::with_capacity(raw.len());
        for detection in raw {
            match self.sanitize(detection, frame, &mut stats) {
                Some(clean) if clean.confidence >= self.config.confidence_threshold => {
                    candidates.push(clean)
                }
                Some(_) => stats.below_threshold += 1,
                None => stats.malformed += 1,
            }
        }

        // Stable sort keeps input order among equal confidences.
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let duplicate = kept
                .iter()
                .any(|k| k.bbox.iou(&candidate.bbox) >= self.config.dedup_iou_threshold);
            if duplicate {
                stats.suppressed += 1;
            } else {
                kept.push(candidate);
            }
        }

        stats.kept = kept.len();
        (kept, stats)
    }

    fn sanitize(
        &self,
        detection: &Detection,
        frame: FrameSize,
        stats: &mut NormalizeStats,
    ) -> Option<Detection> {
        let confidence = detection.confidence;
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return None;
        }

        let bbox = detection.bbox;
        if !bbox.is_finite() || bbox.width <= 0.0 || bbox.height <= 0.0 {
            return None;
        }

        let clipped = bbox.clip_to(frame)?;
        let min_size = self.config.min_box_size_px;
        if clipped.width < min_size || clipped.height < min_size {
            return None;
        }

        let keypoints: Vec<Keypoint> = detection
            .keypoints
            .iter()
            .filter(|k| {
                k.x.is_finite()
                    && k.y.is_finite()
                    && k.visibility.is_finite()
                    && (0.0..=frame.w()).contains(&k.x)
                    && (0.0..=frame.h()).contains(&k.y)
            })
            .map(|k| Keypoint {
                visibility: k.visibility.clamp(0.0, 1.0),
                ..k.clone()
            })
            .collect();
        stats.keypoints_dropped += detection.keypoints.len() - keypoints.len();

        Some(Detection {
            bbox: clipped,
            confidence,
            keypoints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reframe_model::geometry::BoundingBox;

    const HD: FrameSize = FrameSize {
        width: 1920,
        height: 1080,
    };

    fn det(x: f64, y: f64, w: f64, h: f64, confidence: f64) -> Detection {
        Detection::new(BoundingBox::new(x, y, w, h), confidence)
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        let normalizer = DetectionNormalizer::with_defaults();
        let (out, stats) = normalizer.normalize_with_stats(&[], HD);
        assert!(out.is_empty());
        assert_eq!(stats, NormalizeStats::default());
    }

    #[test]
    fn test_below_threshold_is_dropped() {
        let normalizer = DetectionNormalizer::with_defaults();
        let (out, stats) =
            normalizer.normalize_with_stats(&[det(100.0, 100.0, 50.0, 100.0, 0.3)], HD);
        assert!(out.is_empty());
        assert_eq!(stats.below_threshold, 1);
        assert_eq!(stats.malformed, 0);
    }

    #[test]
    fn test_malformed_detections_are_discarded() {
        let normalizer = DetectionNormalizer::with_defaults();
        let raw = vec![
            det(100.0, 100.0, 50.0, 100.0, -0.2),
            det(100.0, 100.0, 50.0, 100.0, 1.5),
            det(f64::NAN, 100.0, 50.0, 100.0, 0.9),
            det(100.0, 100.0, -50.0, 100.0, 0.9),
            det(3000.0, 100.0, 50.0, 100.0, 0.9),
            det(1918.0, 100.0, 50.0, 100.0, 0.9), // clipped to 2px wide
            det(500.0, 200.0, 100.0, 300.0, 0.9),
        ];
        let (out, stats) = normalizer.normalize_with_stats(&raw, HD);
        assert_eq!(out.len(), 1);
        assert_eq!(stats.malformed, 6);
        assert_eq!(stats.kept, 1);
    }

    #[test]
    fn test_boxes_are_clipped_to_frame() {
        let normalizer = DetectionNormalizer::with_defaults();
        let out = normalizer.normalize(&[det(-40.0, 900.0, 200.0, 400.0, 0.9)], HD);
        assert_eq!(out[0].bbox, BoundingBox::new(0.0, 900.0, 160.0, 180.0));
    }

    #[test]
    fn test_duplicates_keep_most_confident() {
        let normalizer = DetectionNormalizer::with_defaults();
        let raw = vec![
            det(500.0, 200.0, 200.0, 600.0, 0.7),
            det(505.0, 205.0, 200.0, 600.0, 0.95),
            det(1200.0, 200.0, 200.0, 600.0, 0.6),
        ];
        let (out, stats) = normalizer.normalize_with_stats(&raw, HD);
        assert_eq!(out.len(), 2);
        assert_eq!(stats.suppressed, 1);
        assert_eq!(out[0].confidence, 0.95);
        assert_eq!(out[1].confidence, 0.6);
    }

    #[test]
    fn test_off_frame_keypoints_are_dropped() {
        let normalizer = DetectionNormalizer::with_defaults();
        let raw = vec![Detection::with_keypoints(
            BoundingBox::new(500.0, 200.0, 200.0, 600.0),
            0.9,
            vec![
                Keypoint::named("nose", 600.0, 250.0, 1.4),
                Keypoint::named("left_ankle", 600.0, 1200.0, 0.9),
            ],
        )];
        let (out, stats) = normalizer.normalize_with_stats(&raw, HD);
        assert_eq!(out[0].keypoints.len(), 1);
        assert_eq!(out[0].keypoints[0].visibility, 1.0);
        assert_eq!(stats.keypoints_dropped, 1);
    }
}
