//! End-to-end smoke test: planar frame in, fused detections out, across
//! every crate in the workspace.

use ndarray::Array3;
use roadwatch_pipeline::{
    AnalyzerConfig, DetectionSource, FrameAnalyzer, ModelOutput, ModelRunner, PipelineError,
    PixelPlane, PlanarYuvFrame, SensorFormat,
};

struct CannedRunner {
    name: &'static str,
    cells: Vec<f32>,
}

impl ModelRunner for CannedRunner {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, input: &Array3<f32>) -> Result<ModelOutput, PipelineError> {
        // The contract every real engine adapter relies on
        assert_eq!(input.dim(), (3, 640, 640));
        Ok(ModelOutput::Tensor(self.cells.clone()))
    }
}

#[test]
fn test_smoke_full_pipeline() {
    let width = 32usize;
    let height = 24usize;
    let luma = vec![90u8; width * height];
    let chroma = vec![128u8; (width / 2) * (height / 2)];

    let frame = PlanarYuvFrame {
        width: width as u32,
        height: height as u32,
        format: SensorFormat::Yuv420,
        luma: PixelPlane {
            data: &luma,
            width,
            height,
            row_stride: width,
            pixel_stride: 1,
        },
        chroma_u: PixelPlane {
            data: &chroma,
            width: width / 2,
            height: height / 2,
            row_stride: width / 2,
            pixel_stride: 1,
        },
        chroma_v: PixelPlane {
            data: &chroma,
            width: width / 2,
            height: height / 2,
            row_stride: width / 2,
            pixel_stride: 1,
        },
        rotation_degrees: 180,
    };

    let mut vehicle_cells = vec![0.0f32; 85];
    vehicle_cells[..5].copy_from_slice(&[320.0, 320.0, 120.0, 90.0, 0.88]);
    vehicle_cells[5] = 0.95; // "car"

    let mut sign_cells = vec![0.0f32; 8];
    sign_cells[..5].copy_from_slice(&[480.0, 160.0, 50.0, 50.0, 0.66]);
    sign_cells[7] = 0.9; // "crossing_ahead"

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

    let detections = analyzer.analyze(&frame).unwrap();

    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].source, DetectionSource::Vehicle);
    assert_eq!(detections[0].label, "car");
    assert_eq!(detections[0].confidence, 0.88);
    assert_eq!(detections[1].source, DetectionSource::Sign);
    assert_eq!(detections[1].label, "crossing_ahead");

    // Normalized corner geometry of the vehicle box
    let bbox = detections[0].bbox;
    assert!((bbox.left - (320.0 - 60.0) / 640.0).abs() < 1e-6);
    assert!((bbox.right - (320.0 + 60.0) / 640.0).abs() < 1e-6);
}
