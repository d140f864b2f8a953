//! Common types shared across the roadwatch crates
//!
//! Defines the error taxonomy, the detection source tag, and the boundary
//! `Detection` record handed to the rendering collaborator once per frame.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Processing errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Frame conversion error: {0}")]
    Conversion(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Which model produced a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionSource {
    Vehicle,
    Sign,
}

impl DetectionSource {
    /// Generic label used when a class id falls outside the class table
    #[must_use]
    pub fn generic_label(self) -> &'static str {
        match self {
            DetectionSource::Vehicle => "vehicle",
            DetectionSource::Sign => "sign",
        }
    }
}

impl std::fmt::Display for DetectionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.generic_label())
    }
}

/// Axis-aligned bounding box with normalized corner coordinates
///
/// Coordinates are fractions of the model input frame. Boxes produced by the
/// decoder may extend outside `[0, 1]` and are kept as-is; clamping is the
/// renderer's concern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X coordinate of the left edge (normalized)
    pub left: f32,
    /// Y coordinate of the top edge (normalized)
    pub top: f32,
    /// X coordinate of the right edge (normalized)
    pub right: f32,
    /// Y coordinate of the bottom edge (normalized)
    pub bottom: f32,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates
    #[must_use]
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Get box width
    #[must_use]
    #[inline]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Get box height
    #[must_use]
    #[inline]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Get area of bounding box
    #[must_use]
    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Calculate Intersection over Union (`IoU`) with another box
    ///
    /// Disjoint boxes yield exactly 0.0, never a negative value. A pair of
    /// zero-area boxes also yields 0.0 rather than dividing by zero; a
    /// zero-area box against a real box unions to the real box's area.
    #[must_use]
    #[inline]
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let intersection_left = self.left.max(other.left);
        let intersection_top = self.top.max(other.top);
        let intersection_right = self.right.min(other.right);
        let intersection_bottom = self.bottom.min(other.bottom);

        if intersection_right < intersection_left || intersection_bottom < intersection_top {
            return 0.0;
        }

        let intersection_area = (intersection_right - intersection_left)
            * (intersection_bottom - intersection_top);

        let union_area = self.area() + other.area() - intersection_area;

        if union_area > 0.0 {
            intersection_area / union_area
        } else {
            0.0
        }
    }
}

/// A single labeled detection emitted to the rendering collaborator
///
/// Detections live for one frame; the caller replaces its set every frame
/// rather than accumulating history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Bounding box with normalized corner coordinates
    pub bbox: BoundingBox,
    /// Human-readable class label
    pub label: String,
    /// Confidence score (0-1), clamped at creation
    pub confidence: f32,
    /// Which model produced this detection
    pub source: DetectionSource,
}
