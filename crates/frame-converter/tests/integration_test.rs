use roadwatch_frame_converter::{convert, pack_nv21, PixelPlane, PlanarYuvFrame, SensorFormat};

/// Build an unpadded frame whose planes use the given pixel stride, placing
/// each sample at its tightly-strided offset.
fn frame_with_pixel_stride<'a>(
    luma: &'a [u8],
    chroma_u: &'a [u8],
    chroma_v: &'a [u8],
    width: usize,
    height: usize,
    pixel_stride: usize,
) -> PlanarYuvFrame<'a> {
    PlanarYuvFrame {
        width: width as u32,
        height: height as u32,
        format: SensorFormat::Yuv420,
        luma: PixelPlane {
            data: luma,
            width,
            height,
            row_stride: width * pixel_stride,
            pixel_stride,
        },
        chroma_u: PixelPlane {
            data: chroma_u,
            width: width / 2,
            height: height / 2,
            row_stride: (width / 2) * pixel_stride,
            pixel_stride,
        },
        chroma_v: PixelPlane {
            data: chroma_v,
            width: width / 2,
            height: height / 2,
            row_stride: (width / 2) * pixel_stride,
            pixel_stride,
        },
        rotation_degrees: 0,
    }
}

#[test]
fn test_round_trip_unpadded_pixel_stride_one() {
    // With row_stride == width * pixel_stride and pixel stride 1, every
    // packed sample must equal the directly-indexed source sample.
    let width = 6;
    let height = 4;
    let luma: Vec<u8> = (0..(width * height) as u8).collect();
    let chroma_u: Vec<u8> = (100..100 + (width / 2 * height / 2) as u8).collect();
    let chroma_v: Vec<u8> = (200..200 + (width / 2 * height / 2) as u8).collect();

    let frame = frame_with_pixel_stride(&luma, &chroma_u, &chroma_v, width, height, 1);
    let nv21 = pack_nv21(&frame);

    for row in 0..height {
        for col in 0..width {
            assert_eq!(
                nv21[row * width + col],
                luma[row * width + col],
                "luma mismatch at ({row}, {col})"
            );
        }
    }

    let chroma_width = width / 2;
    for row in 0..height / 2 {
        for col in 0..chroma_width {
            let pair = (width * height) + (row * chroma_width + col) * 2;
            assert_eq!(nv21[pair], chroma_v[row * chroma_width + col]);
            assert_eq!(nv21[pair + 1], chroma_u[row * chroma_width + col]);
        }
    }
}

#[test]
fn test_round_trip_unpadded_pixel_stride_two() {
    // Pixel stride 2 models interleaved chroma: samples sit at even offsets
    let width = 4;
    let height = 4;

    let mut luma = vec![0u8; width * height * 2];
    for i in 0..width * height {
        luma[i * 2] = i as u8;
    }
    let mut chroma_u = vec![0u8; 8];
    let mut chroma_v = vec![0u8; 8];
    for i in 0..4 {
        chroma_u[i * 2] = 100 + i as u8;
        chroma_v[i * 2] = 200 + i as u8;
    }

    let frame = frame_with_pixel_stride(&luma, &chroma_u, &chroma_v, width, height, 2);
    let nv21 = pack_nv21(&frame);

    for row in 0..height {
        for col in 0..width {
            assert_eq!(
                nv21[row * width + col],
                luma[(row * width + col) * 2],
                "luma mismatch at ({row}, {col})"
            );
        }
    }

    for block in 0..4 {
        let pair = width * height + block * 2;
        assert_eq!(nv21[pair], chroma_v[block * 2]);
        assert_eq!(nv21[pair + 1], chroma_u[block * 2]);
    }
}

#[test]
fn test_padded_and_unpadded_buffers_convert_identically() {
    let width = 4;
    let height = 4;
    let luma: Vec<u8> = (0..16u8).map(|v| v * 10).collect();
    let chroma_u = vec![90u8, 110, 130, 150];
    let chroma_v = vec![140u8, 120, 160, 100];

    let tight = frame_with_pixel_stride(&luma, &chroma_u, &chroma_v, width, height, 1);
    let tight_rgb = convert(&tight).unwrap();

    // Same samples with 3 bytes of garbage padding at the end of each row
    let pad = 3;
    let mut padded_luma = vec![0xAB; (width + pad) * height];
    for row in 0..height {
        for col in 0..width {
            padded_luma[row * (width + pad) + col] = luma[row * width + col];
        }
    }
    let mut padded_u = vec![0xCD; (width / 2 + pad) * (height / 2)];
    let mut padded_v = vec![0xEF; (width / 2 + pad) * (height / 2)];
    for row in 0..height / 2 {
        for col in 0..width / 2 {
            padded_u[row * (width / 2 + pad) + col] = chroma_u[row * (width / 2) + col];
            padded_v[row * (width / 2 + pad) + col] = chroma_v[row * (width / 2) + col];
        }
    }

    let padded = PlanarYuvFrame {
        width: width as u32,
        height: height as u32,
        format: SensorFormat::Yuv420,
        luma: PixelPlane {
            data: &padded_luma,
            width,
            height,
            row_stride: width + pad,
            pixel_stride: 1,
        },
        chroma_u: PixelPlane {
            data: &padded_u,
            width: width / 2,
            height: height / 2,
            row_stride: width / 2 + pad,
            pixel_stride: 1,
        },
        chroma_v: PixelPlane {
            data: &padded_v,
            width: width / 2,
            height: height / 2,
            row_stride: width / 2 + pad,
            pixel_stride: 1,
        },
        rotation_degrees: 0,
    };
    let padded_rgb = convert(&padded).unwrap();

    assert_eq!(tight_rgb.as_raw(), padded_rgb.as_raw());
}

#[test]
fn test_grayscale_frame_output_matches_luma() {
    // Neutral chroma: the converted pixel value equals the luma sample, so
    // the full convert() path exposes the stride walk directly.
    let width = 6;
    let height = 2;
    let luma: Vec<u8> = (0..12u8).map(|v| v * 20).collect();
    let chroma = vec![128u8; 3];

    let frame = frame_with_pixel_stride(&luma, &chroma, &chroma, width, height, 1);
    let rgb = convert(&frame).unwrap();

    for row in 0..height {
        for col in 0..width {
            let expected = luma[row * width + col];
            assert_eq!(
                rgb.get_pixel(col as u32, row as u32).0,
                [expected, expected, expected],
                "pixel mismatch at ({row}, {col})"
            );
        }
    }
}
