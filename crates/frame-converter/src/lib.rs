//! Camera frame conversion module
//!
//! Converts planar 4:2:0 camera frames (a full-resolution luma plane and two
//! half-resolution chroma planes, each with its own row and pixel stride)
//! into contiguous interleaved RGB images, applying the sensor orientation
//! on the way out.
//!
//! # Features
//! - Bounds-checked strided plane reads (trailing padding never faults)
//! - NV21 packing with the V-then-U interleave the color transform expects
//! - Full-range BT.601 `YCbCr` -> RGB conversion
//! - Orientation rotation: exact for 90-degree multiples, bilinear
//!   resampling about the center for arbitrary angles
//!
//! # Example
//! ```
//! use roadwatch_frame_converter::{convert, PixelPlane, PlanarYuvFrame, SensorFormat};
//!
//! let luma = [128u8; 16];
//! let chroma = [128u8; 4];
//! let frame = PlanarYuvFrame {
//!     width: 4,
//!     height: 4,
//!     format: SensorFormat::Yuv420,
//!     luma: PixelPlane { data: &luma, width: 4, height: 4, row_stride: 4, pixel_stride: 1 },
//!     chroma_u: PixelPlane { data: &chroma, width: 2, height: 2, row_stride: 2, pixel_stride: 1 },
//!     chroma_v: PixelPlane { data: &chroma, width: 2, height: 2, row_stride: 2, pixel_stride: 1 },
//!     rotation_degrees: 0,
//! };
//!
//! let rgb = convert(&frame).unwrap();
//! assert_eq!((rgb.width(), rgb.height()), (4, 4));
//! assert_eq!(rgb.get_pixel(0, 0).0, [128, 128, 128]);
//! ```

use image::{imageops, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use roadwatch_common::ProcessingError;
use thiserror::Error;
use tracing::debug;

/// Pixel format reported by the camera frame source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFormat {
    /// Planar 4:2:0 with two separate chroma planes
    Yuv420,
    /// Any other sensor-reported format code
    Other(u32),
}

/// One sample plane of a camera frame
#[derive(Debug, Clone, Copy)]
pub struct PixelPlane<'a> {
    /// Raw plane bytes, possibly with trailing padding
    pub data: &'a [u8],
    /// Logical samples per row
    pub width: usize,
    /// Logical rows
    pub height: usize,
    /// Bytes between the start of consecutive rows (may exceed `width * pixel_stride`)
    pub row_stride: usize,
    /// Bytes between consecutive samples within a row (>1 for interleaved chroma)
    pub pixel_stride: usize,
}

impl PixelPlane<'_> {
    /// Read the sample at (row, col), or `None` when the offset falls past
    /// the plane's capacity. Trailing padding rows are a legitimate
    /// occurrence in camera buffers, so a missing sample is skipped, never
    /// a fault.
    #[inline]
    fn sample(&self, row: usize, col: usize) -> Option<u8> {
        let offset = row * self.row_stride + col * self.pixel_stride;
        self.data.get(offset).copied()
    }
}

/// A planar 4:2:0 frame plus the metadata the frame source reports with it
///
/// Borrowed for the duration of one conversion call; nothing is retained
/// past the call.
#[derive(Debug, Clone, Copy)]
pub struct PlanarYuvFrame<'a> {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Sensor pixel format; anything but 4:2:0 is rejected
    pub format: SensorFormat,
    /// Luma plane at full resolution
    pub luma: PixelPlane<'a>,
    /// First chroma plane (U / Cb), half resolution in both dimensions
    pub chroma_u: PixelPlane<'a>,
    /// Second chroma plane (V / Cr), half resolution in both dimensions
    pub chroma_v: PixelPlane<'a>,
    /// Sensor orientation in degrees, applied after conversion
    pub rotation_degrees: i32,
}

/// Error types for frame conversion
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Unsupported sensor format: {0:?}")]
    UnsupportedFormat(SensorFormat),

    #[error("Plane geometry mismatch: {0}")]
    PlaneGeometry(String),
}

impl From<ConversionError> for ProcessingError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::UnsupportedFormat(_) => {
                ProcessingError::UnsupportedFormat(err.to_string())
            }
            ConversionError::PlaneGeometry(_) => ProcessingError::Conversion(err.to_string()),
        }
    }
}

/// Convert a planar 4:2:0 camera frame into an interleaved RGB image
///
/// Validates the plane geometry, packs the strided planes into a contiguous
/// NV21 buffer, applies the full-range BT.601 color transform and finally
/// rotates by the sensor orientation.
///
/// # Errors
///
/// Returns an error if the frame is not 4:2:0 or the plane dimensions are
/// inconsistent with the frame size; no out-of-bounds read is ever
/// attempted.
pub fn convert(frame: &PlanarYuvFrame<'_>) -> Result<RgbImage, ConversionError> {
    validate_geometry(frame)?;

    let nv21 = pack_nv21(frame);
    let rgb = nv21_to_rgb(&nv21, frame.width as usize, frame.height as usize);

    debug!(
        "converted {}x{} frame, rotation {} degrees",
        frame.width, frame.height, frame.rotation_degrees
    );

    Ok(apply_rotation(rgb, frame.rotation_degrees))
}

/// Check the 4:2:0 plane geometry before any sample is read
fn validate_geometry(frame: &PlanarYuvFrame<'_>) -> Result<(), ConversionError> {
    if frame.format != SensorFormat::Yuv420 {
        return Err(ConversionError::UnsupportedFormat(frame.format));
    }

    let width = frame.width as usize;
    let height = frame.height as usize;

    if frame.luma.width != width || frame.luma.height != height {
        return Err(ConversionError::PlaneGeometry(format!(
            "luma plane is {}x{}, frame is {width}x{height}",
            frame.luma.width, frame.luma.height
        )));
    }

    // 4:2:0: chroma planes are exactly half the luma size, rounded down
    let chroma_width = width / 2;
    let chroma_height = height / 2;
    for (name, plane) in [("U", &frame.chroma_u), ("V", &frame.chroma_v)] {
        if plane.width != chroma_width || plane.height != chroma_height {
            return Err(ConversionError::PlaneGeometry(format!(
                "{name} plane is {}x{}, expected {chroma_width}x{chroma_height}",
                plane.width, plane.height
            )));
        }
    }

    for (name, plane) in [
        ("luma", &frame.luma),
        ("U", &frame.chroma_u),
        ("V", &frame.chroma_v),
    ] {
        if plane.row_stride == 0 || plane.pixel_stride == 0 {
            return Err(ConversionError::PlaneGeometry(format!(
                "{name} plane has zero stride (row {}, pixel {})",
                plane.row_stride, plane.pixel_stride
            )));
        }
    }

    Ok(())
}

/// Pack strided planes into a contiguous NV21 buffer
///
/// Layout: full-resolution luma rows first, then interleaved chroma rows
/// with the V sample of each 2x2 block before the U sample. The V-then-U
/// order must match the color transform in [`nv21_to_rgb`]; a swapped order
/// shifts hue without crashing, which is why tests assert exact bytes.
/// Samples past a plane's capacity leave their slot at zero.
#[must_use]
pub fn pack_nv21(frame: &PlanarYuvFrame<'_>) -> Vec<u8> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let chroma_width = width / 2;
    let chroma_height = height / 2;

    let mut nv21 = vec![0u8; width * height + chroma_width * chroma_height * 2];
    let mut position = 0;

    for row in 0..height {
        for col in 0..width {
            if let Some(sample) = frame.luma.sample(row, col) {
                nv21[position] = sample;
            }
            position += 1;
        }
    }

    for row in 0..chroma_height {
        for col in 0..chroma_width {
            if let Some(sample) = frame.chroma_v.sample(row, col) {
                nv21[position] = sample;
            }
            if let Some(sample) = frame.chroma_u.sample(row, col) {
                nv21[position + 1] = sample;
            }
            position += 2;
        }
    }

    nv21
}

/// Convert a packed NV21 buffer to an interleaved RGB image
///
/// Applies the full-range BT.601 `YCbCr` -> RGB transform, the same
/// colorimetry a JPEG round trip of the packed buffer would produce. Each
/// 2x2 luma block shares one chroma pair; edge pixels of odd-sized frames
/// reuse the last available block.
#[must_use]
pub fn nv21_to_rgb(nv21: &[u8], width: usize, height: usize) -> RgbImage {
    let chroma_width = width / 2;
    let chroma_height = height / 2;
    let luma_size = width * height;

    let mut rgb = Vec::with_capacity(width * height * 3);

    for row in 0..height {
        for col in 0..width {
            let y = f32::from(nv21[row * width + col]);

            let (u, v) = if chroma_width == 0 || chroma_height == 0 {
                // No chroma samples at all (degenerate 1-pixel-wide or
                // 1-pixel-tall frames): decode as grayscale.
                (128.0, 128.0)
            } else {
                let block_row = (row / 2).min(chroma_height - 1);
                let block_col = (col / 2).min(chroma_width - 1);
                let offset = luma_size + (block_row * chroma_width + block_col) * 2;
                (f32::from(nv21[offset + 1]), f32::from(nv21[offset]))
            };

            let u = u - 128.0;
            let v = v - 128.0;

            let r = (y + 1.402 * v).clamp(0.0, 255.0);
            let g = (y - 0.344_13 * u - 0.714_14 * v).clamp(0.0, 255.0);
            let b = (y + 1.772 * u).clamp(0.0, 255.0);

            rgb.push(r as u8);
            rgb.push(g as u8);
            rgb.push(b as u8);
        }
    }

    RgbImage::from_raw(width as u32, height as u32, rgb)
        .expect("buffer length matches width * height * 3")
}

/// Rotate by the sensor-reported orientation
///
/// Multiples of 90 degrees use exact dimension-swapping rotations; any
/// other angle falls back to bilinear resampling about the image center,
/// which keeps the canvas size and fills uncovered corners with black.
fn apply_rotation(image: RgbImage, degrees: i32) -> RgbImage {
    match degrees.rem_euclid(360) {
        0 => image,
        90 => imageops::rotate90(&image),
        180 => imageops::rotate180(&image),
        270 => imageops::rotate270(&image),
        other => {
            debug!("rotating by non-cardinal angle {other} degrees");
            let theta = (other as f32).to_radians();
            rotate_about_center(&image, theta, Interpolation::Bilinear, Rgb([0, 0, 0]))
        }
    }
}
