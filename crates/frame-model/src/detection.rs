//! Subject detections supplied by an external person/pose detector.
//!
//! Detections are exchanged as JSON Lines, one record per frame:
//!
//! ```text
//! {"frame": 12, "detections": [{"bbox": {"x": 812.0, "y": 160.0, "width": 240.0, "height": 700.0}, "confidence": 0.93}]}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Frames that do not
//! appear in the stream have no detections.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point2D};

/// A named body landmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Landmark name (e.g. `nose`, `left_shoulder`), if the detector provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// X coordinate in frame pixels.
    pub x: f64,
    /// Y coordinate in frame pixels.
    pub y: f64,
    /// Visibility/presence score in [0.0, 1.0].
    #[serde(default = "default_visibility")]
    pub visibility: f64,
}

fn default_visibility() -> f64 {
    1.0
}

impl Keypoint {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self {
            name: None,
            x,
            y,
            visibility,
        }
    }

    pub fn named(name: impl Into<String>, x: f64, y: f64, visibility: f64) -> Self {
        Self {
            name: Some(name.into()),
            x,
            y,
            visibility,
        }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

/// One subject detected in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Subject bounding box in frame pixels.
    pub bbox: BoundingBox,
    /// Detector confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Optional pose landmarks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f64) -> Self {
        Self {
            bbox,
            confidence,
            keypoints: Vec::new(),
        }
    }

    pub fn with_keypoints(bbox: BoundingBox, confidence: f64, keypoints: Vec<Keypoint>) -> Self {
        Self {
            bbox,
            confidence,
            keypoints,
        }
    }

    /// Mean position of keypoints whose visibility is at least `min_visibility`.
    pub fn visible_keypoint_center(&self, min_visibility: f64) -> Option<Point2D> {
        let visible: Vec<&Keypoint> = self
            .keypoints
            .iter()
            .filter(|k| k.visibility >= min_visibility)
            .collect();
        if visible.is_empty() {
            return None;
        }
        let n = visible.len() as f64;
        let sum_x: f64 = visible.iter().map(|k| k.x).sum();
        let sum_y: f64 = visible.iter().map(|k| k.y).sum();
        Some(Point2D::new(sum_x / n, sum_y / n))
    }
}

/// All detections reported for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    /// Zero-based frame index.
    pub frame: u64,
    /// Detections in this frame (possibly empty).
    #[serde(default)]
    pub detections: Vec<Detection>,
}

impl FrameDetections {
    pub fn new(frame: u64, detections: Vec<Detection>) -> Self {
        Self { frame, detections }
    }

    pub fn empty(frame: u64) -> Self {
        Self::new(frame, Vec::new())
    }
}

/// Parse detection records from JSONL content.
pub fn parse_detections(jsonl: &str) -> Result<Vec<FrameDetections>, DetectionError> {
    jsonl
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            serde_json::from_str(line).map_err(|source| DetectionError::Parse {
                line: line_no,
                source,
            })
        })
        .collect()
}

/// Serialize detection records as JSONL.
pub fn write_detections(records: &[FrameDetections]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Frame-indexed detection lookup for a whole clip.
#[derive(Debug, Clone, Default)]
pub struct DetectionTimeline {
    frames: BTreeMap<u64, Vec<Detection>>,
}

impl DetectionTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parsed records. Repeated frame indices are merged.
    pub fn from_records(records: impl IntoIterator<Item = FrameDetections>) -> Self {
        let mut frames: BTreeMap<u64, Vec<Detection>> = BTreeMap::new();
        for record in records {
            frames
                .entry(record.frame)
                .or_default()
                .extend(record.detections);
        }
        Self { frames }
    }

    /// Load a JSONL detection file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DetectionError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DetectionError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let records = parse_detections(&content).map_err(|e| e.with_path(path))?;
        Ok(Self::from_records(records))
    }

    /// Detections for a frame; empty when the frame has none.
    pub fn get(&self, frame: u64) -> &[Detection] {
        self.frames.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Highest frame index with a record.
    pub fn last_frame(&self) -> Option<u64> {
        self.frames.keys().next_back().copied()
    }

    /// Number of frames that have at least one record.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Total number of detections across all frames.
    pub fn detection_count(&self) -> usize {
        self.frames.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterate `(frame, detections)` in frame order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[Detection])> {
        self.frames.iter().map(|(f, d)| (*f, d.as_slice()))
    }
}

/// Errors that can occur when reading detection streams.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },

    #[error("Parse error in {path} on line {line}: {source}")]
    ParseInFile {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

impl DetectionError {
    fn with_path(self, path: &Path) -> Self {
        match self {
            Self::Parse { line, source } => Self::ParseInFile {
                path: path.to_path_buf(),
                line,
                source,
            },
            other => other,
        }
    }
}
