//! Detection post-processing module
//!
//! Turns a model's raw per-cell regression output into a clean set of
//! labeled bounding boxes: tensor preparation, per-cell score/box
//! extraction, class selection, confidence gating, and geometric
//! non-maximum suppression (NMS).
//!
//! Two detector configurations ship with the crate (a vehicle model with
//! an 85-wide output row and a road-sign model with an 8-wide row), but the
//! decoder itself is generic: each source is a configuration value, not a
//! separate code path.
//!
//! # Example
//! ```
//! use roadwatch_detection::{decode_cells, suppress, DecoderConfig, DEFAULT_IOU_THRESHOLD};
//!
//! let config = DecoderConfig::sign();
//! let mut row = vec![0.0f32; config.dimensions];
//! row[..5].copy_from_slice(&[320.0, 320.0, 64.0, 64.0, 0.9]);
//! row[5] = 0.8; // "crossing"
//!
//! let candidates = decode_cells(&row, &config);
//! let detections = suppress(candidates, DEFAULT_IOU_THRESHOLD);
//! assert_eq!(detections.len(), 1);
//! assert_eq!(detections[0].label, "crossing");
//! ```

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use roadwatch_common::{BoundingBox, Detection, DetectionSource};

/// Model input edge length in pixels
pub const INPUT_SIZE: u32 = 640;

/// Per-channel normalization mean (`ImageNet` statistics)
pub const NORM_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel normalization standard deviation (`ImageNet` statistics)
pub const NORM_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Confidence gate a cell's objectness must strictly exceed to emit a candidate
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.45;

/// `IoU` overlap above which the lower-confidence candidate is suppressed
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

/// Vehicle model class table (the 4 named classes of its 80 class slots)
pub const VEHICLE_CLASSES: &[&str] = &["car", "motorcycle", "bus", "truck"];

/// Road-sign model class table
pub const SIGN_CLASSES: &[&str] = &["crossing", "near_crossing", "crossing_ahead"];

/// Per-cell row width of the vehicle model output (4 box + objectness + 80 class slots)
pub const VEHICLE_OUTPUT_DIMENSIONS: usize = 85;

/// Per-cell row width of the sign model output (4 box + objectness + class slots)
pub const SIGN_OUTPUT_DIMENSIONS: usize = 5 + SIGN_CLASSES.len();

/// Configuration for one detection source
///
/// Class tables and thresholds travel with the configuration value rather
/// than living in globals, so both model configurations coexist safely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Per-cell row width of the raw model output
    pub dimensions: usize,
    /// Class-id to label table; ids past the end fall back to the source's
    /// generic label
    pub class_names: Vec<String>,
    /// Minimum objectness (strict `>`) for a cell to emit a candidate
    pub confidence_threshold: f32,
    /// Source tag stamped on every emitted candidate
    pub source: DetectionSource,
}

impl DecoderConfig {
    /// Configuration for the vehicle model
    #[must_use]
    pub fn vehicle() -> Self {
        Self {
            dimensions: VEHICLE_OUTPUT_DIMENSIONS,
            class_names: VEHICLE_CLASSES.iter().map(|&s| s.to_string()).collect(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            source: DetectionSource::Vehicle,
        }
    }

    /// Configuration for the road-sign model
    #[must_use]
    pub fn sign() -> Self {
        Self {
            dimensions: SIGN_OUTPUT_DIMENSIONS,
            class_names: SIGN_CLASSES.iter().map(|&s| s.to_string()).collect(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            source: DetectionSource::Sign,
        }
    }
}

/// Resize and normalize an RGB image into the model input tensor
///
/// The image is resized to exactly 640x640 with bilinear filtering whatever
/// its aspect ratio (distortion is accepted, not corrected), then each
/// channel is normalized as `(pixel/255 - mean) / std`. Output shape is
/// `(3, 640, 640)` channel-first for any input size.
#[must_use]
pub fn prepare(image: &RgbImage) -> Array3<f32> {
    let resized = imageops::resize(image, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let mut tensor = Array3::zeros((3, INPUT_SIZE as usize, INPUT_SIZE as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for channel in 0..3 {
            let value = f32::from(pixel[channel]) / 255.0;
            tensor[[channel, y as usize, x as usize]] =
                (value - NORM_MEAN[channel]) / NORM_STD[channel];
        }
    }

    tensor
}

/// Decode a raw model output into unordered candidate detections
///
/// The output is a flat array of implicit rows, cell `i` occupying
/// `[i * dimensions, (i + 1) * dimensions)`; a trailing partial row is
/// truncated. Per cell: objectness (slot 4) is capped at 1.0 and must
/// strictly exceed the configured threshold; the class is the first maximum
/// over the class slots; the box converts from center/size in 640-space to
/// normalized corners without clamping, so boxes may extend outside the
/// unit square.
#[must_use]
pub fn decode_cells(outputs: &[f32], config: &DecoderConfig) -> Vec<Detection> {
    let dimensions = config.dimensions;
    if dimensions < 5 {
        warn!("decoder configured with row width {dimensions}, need at least 5 slots");
        return Vec::new();
    }

    let num_cells = outputs.len() / dimensions;
    let mut candidates = Vec::new();

    for cell in 0..num_cells {
        let row = &outputs[cell * dimensions..(cell + 1) * dimensions];

        // Raw objectness can exceed 1.0; cap before gating
        let confidence = row[4].min(1.0);
        if confidence <= config.confidence_threshold {
            continue;
        }

        // First maximum wins ties; all-nonpositive scores keep class 0
        let mut class_id = 0;
        let mut max_score = 0.0f32;
        for (slot, &score) in row[5..].iter().enumerate() {
            if score > max_score {
                max_score = score;
                class_id = slot;
            }
        }

        let (x, y, w, h) = (row[0], row[1], row[2], row[3]);
        let size = INPUT_SIZE as f32;
        let bbox = BoundingBox::new(
            (x - w / 2.0) / size,
            (y - h / 2.0) / size,
            (x + w / 2.0) / size,
            (y + h / 2.0) / size,
        );

        let label = config
            .class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| config.source.generic_label().to_string());

        candidates.push(Detection {
            bbox,
            label,
            confidence,
            source: config.source,
        });
    }

    debug!(
        "decoded {} candidates from {} cells ({})",
        candidates.len(),
        num_cells,
        config.source
    );

    candidates
}

/// Apply non-maximum suppression to one source's candidates
///
/// Candidates are stable-sorted by confidence descending, then greedily
/// accepted; every later candidate overlapping an accepted one with IoU
/// strictly above the threshold is dropped. The result keeps the
/// confidence-descending order. Candidates from different sources must be
/// suppressed separately; they are never cross-suppressed.
#[must_use]
pub fn suppress(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    // Stable sort keeps equal-confidence candidates in decode order
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut removed = vec![false; candidates.len()];
    for i in 0..candidates.len() {
        if removed[i] {
            continue;
        }
        for j in (i + 1)..candidates.len() {
            if removed[j] {
                continue;
            }
            if candidates[i].bbox.iou(&candidates[j].bbox) > iou_threshold {
                removed[j] = true;
            }
        }
    }

    let kept: Vec<Detection> = candidates
        .into_iter()
        .zip(removed)
        .filter_map(|(candidate, removed)| (!removed).then_some(candidate))
        .collect();

    debug!("non-maximum suppression kept {} candidates", kept.len());
    kept
}
