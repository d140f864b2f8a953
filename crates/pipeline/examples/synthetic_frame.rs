//! Run the full analysis pipeline on a synthetic camera frame with stub
//! model runners, printing the fused detections as JSON.
//!
//! Usage: cargo run --example synthetic_frame

use anyhow::Result;
use ndarray::Array3;
use roadwatch_pipeline::{
    AnalyzerConfig, FrameAnalyzer, ModelOutput, ModelRunner, PipelineError, PixelPlane,
    PlanarYuvFrame, SensorFormat,
};

/// Stub runner standing in for a real inference engine
struct CannedRunner {
    name: &'static str,
    cells: Vec<f32>,
}

impl ModelRunner for CannedRunner {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, _input: &Array3<f32>) -> Result<ModelOutput, PipelineError> {
        Ok(ModelOutput::Tensor(self.cells.clone()))
    }
}

fn cell(dimensions: usize, x: f32, y: f32, w: f32, h: f32, objectness: f32, slot: usize) -> Vec<f32> {
    let mut row = vec![0.0f32; dimensions];
    row[0] = x;
    row[1] = y;
    row[2] = w;
    row[3] = h;
    row[4] = objectness;
    row[slot] = 0.97;
    row
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // A 64x48 frame with a horizontal luma gradient and neutral chroma,
    // using padded row strides the way camera buffers usually arrive.
    let width = 64usize;
    let height = 48usize;
    let luma_stride = width + 16;
    let chroma_stride = width / 2 + 8;

    let mut luma = vec![0u8; luma_stride * height];
    for (row, chunk) in luma.chunks_mut(luma_stride).enumerate() {
        for col in 0..width {
            chunk[col] = (row * 2 + col) as u8;
        }
    }
    let chroma = vec![128u8; chroma_stride * (height / 2)];

    let frame = PlanarYuvFrame {
        width: width as u32,
        height: height as u32,
        format: SensorFormat::Yuv420,
        luma: PixelPlane {
            data: &luma,
            width,
            height,
            row_stride: luma_stride,
            pixel_stride: 1,
        },
        chroma_u: PixelPlane {
            data: &chroma,
            width: width / 2,
            height: height / 2,
            row_stride: chroma_stride,
            pixel_stride: 1,
        },
        chroma_v: PixelPlane {
            data: &chroma,
            width: width / 2,
            height: height / 2,
            row_stride: chroma_stride,
            pixel_stride: 1,
        },
        rotation_degrees: 90,
    };

    // Two overlapping vehicle cells (one will be suppressed) and one sign cell
    let mut vehicle_cells = cell(85, 320.0, 320.0, 200.0, 100.0, 0.95, 5);
    vehicle_cells.extend(cell(85, 330.0, 325.0, 200.0, 100.0, 0.55, 5));
    let sign_cells = cell(8, 160.0, 160.0, 80.0, 80.0, 0.6, 7);

    let analyzer = FrameAnalyzer::new(
        CannedRunner {
            name: "vehicle",
            cells: vehicle_cells,
        },
        CannedRunner {
            name: "sign",
            cells: sign_cells,
        },
        AnalyzerConfig::default(),
    );

    let detections = analyzer.analyze(&frame)?;

    println!("{}", serde_json::to_string_pretty(&detections)?);
    Ok(())
}
