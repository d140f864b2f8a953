//! Per-frame analysis pipeline
//!
//! Composes the full frame path: planar camera frame -> interleaved RGB ->
//! normalized tensor -> two independent model runs -> per-source decode and
//! suppression -> fused detection list for the rendering collaborator.
//!
//! The models are external collaborators reached through the
//! [`ModelRunner`] trait. A failing model degrades the frame to
//! single-source output instead of failing it; only an unusable frame
//! (bad plane geometry or pixel format) surfaces as an error. Every call is
//! independent: no state, queue, or statistics survive across frames.

use ndarray::Array3;
use roadwatch_common::ProcessingError;
use roadwatch_detection::{decode_cells, prepare, suppress, DecoderConfig, DEFAULT_IOU_THRESHOLD};
use roadwatch_frame_converter::convert;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use roadwatch_common::{BoundingBox, Detection, DetectionSource};
pub use roadwatch_frame_converter::{
    ConversionError, PixelPlane, PlanarYuvFrame, SensorFormat,
};

/// Error types for pipeline execution
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Frame conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Inference failed: {0}")]
    Inference(String),
}

impl From<PipelineError> for ProcessingError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Conversion(inner) => inner.into(),
            PipelineError::Inference(msg) => ProcessingError::Inference(msg),
        }
    }
}

/// Raw output delivered by a model runner
///
/// Models return either a bare tensor or a tuple whose first element is the
/// tensor; any other shape decodes to no detections rather than an error.
#[derive(Debug, Clone)]
pub enum ModelOutput {
    /// A flat tensor of implicit per-cell rows
    Tensor(Vec<f32>),
    /// A tuple of tensors; only the first element is consumed
    Tuple(Vec<Vec<f32>>),
}

impl ModelOutput {
    /// Extract the detection tensor, if the shape carries one
    #[must_use]
    pub fn into_tensor(self) -> Option<Vec<f32>> {
        match self {
            ModelOutput::Tensor(tensor) => Some(tensor),
            ModelOutput::Tuple(elements) => elements.into_iter().next(),
        }
    }
}

/// Boundary to an opaque inference engine
///
/// Implementations map a fixed `(3, 640, 640)` channel-first tensor to a
/// raw output and must not retain the input past the call.
pub trait ModelRunner {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Run one inference pass
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying engine fails; the pipeline
    /// isolates the failure to this source.
    fn run(&self, input: &Array3<f32>) -> Result<ModelOutput, PipelineError>;
}

/// Configuration for the frame analyzer
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Decoder configuration for the vehicle model output
    pub vehicle: DecoderConfig,
    /// Decoder configuration for the sign model output
    pub sign: DecoderConfig,
    /// `IoU` threshold for per-source non-maximum suppression
    pub iou_threshold: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            vehicle: DecoderConfig::vehicle(),
            sign: DecoderConfig::sign(),
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

/// End-to-end analyzer for one camera frame
pub struct FrameAnalyzer<V, S> {
    vehicle_model: V,
    sign_model: S,
    config: AnalyzerConfig,
}

impl<V: ModelRunner, S: ModelRunner> FrameAnalyzer<V, S> {
    /// Create an analyzer over the two model runners
    pub fn new(vehicle_model: V, sign_model: S, config: AnalyzerConfig) -> Self {
        Self {
            vehicle_model,
            sign_model,
            config,
        }
    }

    /// Analyze one camera frame end-to-end
    ///
    /// # Errors
    ///
    /// Returns an error only when the frame itself is unusable (bad plane
    /// geometry or pixel format). Model failures never propagate: the
    /// failing source contributes no detections and the other source's
    /// results are still returned.
    pub fn analyze(&self, frame: &PlanarYuvFrame<'_>) -> Result<Vec<Detection>, PipelineError> {
        let start = Instant::now();

        let rgb = convert(frame)?;
        let tensor = prepare(&rgb);

        let vehicle = self.run_source(&self.vehicle_model, &tensor, &self.config.vehicle);
        let sign = self.run_source(&self.sign_model, &tensor, &self.config.sign);

        let detections = fuse(vehicle, sign);

        info!(
            "analyzed frame in {:?}: {} detections",
            start.elapsed(),
            detections.len()
        );

        Ok(detections)
    }

    /// Analyze multiple frames (batch processing)
    ///
    /// # Errors
    ///
    /// Fails on the first unusable frame; model failures degrade per frame
    /// exactly as in [`FrameAnalyzer::analyze`].
    pub fn analyze_frames(
        &self,
        frames: &[PlanarYuvFrame<'_>],
    ) -> Result<Vec<Vec<Detection>>, PipelineError> {
        let mut results = Vec::with_capacity(frames.len());
        for frame in frames {
            results.push(self.analyze(frame)?);
        }
        Ok(results)
    }

    /// Run one source: inference, decode, suppress
    ///
    /// Inference failures and unusable output shapes are absorbed here so a
    /// broken model never takes the other source's detections down with it.
    fn run_source(
        &self,
        runner: &dyn ModelRunner,
        tensor: &Array3<f32>,
        config: &DecoderConfig,
    ) -> Vec<Detection> {
        let output = match runner.run(tensor) {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    "{} model failed, dropping this source for the frame: {err}",
                    runner.name()
                );
                return Vec::new();
            }
        };

        let Some(raw) = output.into_tensor() else {
            debug!(
                "{} model returned no usable tensor, treating as no detections",
                runner.name()
            );
            return Vec::new();
        };

        let candidates = decode_cells(&raw, config);
        suppress(candidates, self.config.iou_threshold)
    }
}

/// Merge the two sources' detections into one ordered list
///
/// Plain concatenation: each source's internal confidence-descending order
/// is preserved, and sources are never re-ranked or re-suppressed against
/// each other.
#[must_use]
pub fn fuse(vehicle: Vec<Detection>, sign: Vec<Detection>) -> Vec<Detection> {
    let mut merged = Vec::with_capacity(vehicle.len() + sign.len());
    merged.extend(vehicle);
    merged.extend(sign);
    merged
}

/// Drop-latest admission gate for frame delivery
///
/// The pipeline holds no queue: while one frame is in flight, newly
/// arriving frames should be dropped rather than buffered. The frame source
/// asks for a permit before handing a frame over and discards the frame
/// when none is available.
#[derive(Debug, Default)]
pub struct FrameGate {
    in_flight: AtomicBool,
}

impl FrameGate {
    /// Create an open gate
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to admit a frame
    ///
    /// Returns `None` while a previous frame is still in flight, in which
    /// case the new frame should be dropped.
    #[must_use]
    pub fn try_acquire(&self) -> Option<FramePermit<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| FramePermit { gate: self })
    }
}

/// Permit for one in-flight frame; dropping it re-opens the gate
#[derive(Debug)]
pub struct FramePermit<'a> {
    gate: &'a FrameGate,
}

impl Drop for FramePermit<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.store(false, Ordering::Release);
    }
}
