// Conversion pipeline tests: codecs, resizing, icons

use convert_image::constants::DEFAULT_ICON_SIZES;
use convert_image::converter::{convert, decode, ConversionRequest, ImageError, TargetFormat};
use image::{DynamicImage, ImageFormat, RgbaImage};
use rstest::rstest;
use std::io::Cursor;

fn encode_source(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 90, 255])
    });
    if format == ImageFormat::WebP {
        return webp::Encoder::from_rgba(img.as_raw(), width, height)
            .encode_lossless()
            .to_vec();
    }
    let img = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img).to_rgb8()),
        _ => DynamicImage::ImageRgba8(img),
    };
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn has_magic(format: TargetFormat, data: &[u8]) -> bool {
    match format {
        TargetFormat::WebP => data.len() > 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP",
        TargetFormat::Avif => data.len() > 12 && &data[4..8] == b"ftyp" && &data[8..12] == b"avif",
        TargetFormat::Jpeg => data.starts_with(&[0xFF, 0xD8, 0xFF]),
        TargetFormat::Png => data.starts_with(&[0x89, b'P', b'N', b'G']),
        TargetFormat::Ico => data.starts_with(&[0, 0, 1, 0]),
    }
}

#[rstest]
#[case(TargetFormat::WebP)]
#[case(TargetFormat::Avif)]
#[case(TargetFormat::Jpeg)]
#[case(TargetFormat::Png)]
#[case(TargetFormat::Ico)]
fn test_every_format_produces_matching_magic_bytes(#[case] format: TargetFormat) {
    let source = encode_source(24, 16, ImageFormat::Png);
    let result = convert(&source, "sample.png", &ConversionRequest::new(format), DEFAULT_ICON_SIZES)
        .unwrap();

    assert_eq!(result.content_type, format.content_type());
    assert!(has_magic(format, &result.data), "bad magic for {}", format);
    assert_eq!(result.filename, format!("sample.{}", format.extension()));
}

#[rstest]
#[case(ImageFormat::Png, "in.png")]
#[case(ImageFormat::Jpeg, "in.jpg")]
#[case(ImageFormat::WebP, "in.webp")]
fn test_accepted_sources_decode(#[case] source_format: ImageFormat, #[case] name: &str) {
    let source = encode_source(20, 10, source_format);
    let result = convert(&source, name, &ConversionRequest::new(TargetFormat::Png), DEFAULT_ICON_SIZES)
        .unwrap();
    assert_eq!(result.source_size, (20, 10));
}

#[test]
fn test_webp_quality_50_keeps_dimensions() {
    let source = encode_source(100, 50, ImageFormat::Png);
    let request = ConversionRequest::new(TargetFormat::WebP).with_quality(50);
    let result = convert(&source, "wide.png", &request, DEFAULT_ICON_SIZES).unwrap();

    assert_eq!(result.content_type, "image/webp");
    let decoded = image::load_from_memory_with_format(&result.data, ImageFormat::WebP).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 50));
}

#[test]
fn test_max_width_50_gives_50_by_25() {
    let source = encode_source(100, 50, ImageFormat::Png);
    let request = ConversionRequest::new(TargetFormat::WebP)
        .with_quality(50)
        .with_max_width(50);
    let result = convert(&source, "wide.png", &request, DEFAULT_ICON_SIZES).unwrap();

    let decoded = image::load_from_memory_with_format(&result.data, ImageFormat::WebP).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (50, 25));
}

#[rstest]
#[case(40, 30, 100, (40, 30))]
#[case(300, 1200, 600, (150, 600))]
#[case(640, 480, 64, (64, 48))]
fn test_max_width_bounds_without_upscaling(
    #[case] width: u32,
    #[case] height: u32,
    #[case] max_width: u32,
    #[case] expected: (u32, u32),
) {
    let source = encode_source(width, height, ImageFormat::Png);
    let request = ConversionRequest::new(TargetFormat::Png).with_max_width(max_width);
    let result = convert(&source, "x.png", &request, DEFAULT_ICON_SIZES).unwrap();

    let decoded = decode(&result.data).unwrap();
    assert_eq!((decoded.width(), decoded.height()), expected);
}

#[test]
fn test_png_output_is_lossless_at_any_quality() {
    let source = encode_source(16, 16, ImageFormat::Png);
    let original = decode(&source).unwrap().to_rgba8();

    for quality in [1, 5, 50, 100] {
        let request = ConversionRequest::new(TargetFormat::Png).with_quality(quality);
        let result = convert(&source, "x.png", &request, DEFAULT_ICON_SIZES).unwrap();
        assert_eq!(decode(&result.data).unwrap().to_rgba8(), original);
    }
}

#[test]
fn test_ico_contains_16_and_256_entries() {
    let source = encode_source(100, 50, ImageFormat::Png);
    let result = convert(&source, "logo.png", &ConversionRequest::new(TargetFormat::Ico), DEFAULT_ICON_SIZES)
        .unwrap();

    let data = &result.data;
    let count = u16::from_le_bytes([data[4], data[5]]) as usize;
    assert_eq!(count, DEFAULT_ICON_SIZES.len());

    let edges: Vec<u32> = (0..count)
        .map(|i| match data[6 + i * 16] {
            0 => 256,
            b => u32::from(b),
        })
        .collect();
    assert!(edges.contains(&16));
    assert!(edges.contains(&256));

    let decoded = image::load_from_memory_with_format(data, ImageFormat::Ico).unwrap();
    assert_eq!(decoded.width(), 256);
}

#[test]
fn test_ico_respects_max_width_before_framing() {
    let source = encode_source(400, 200, ImageFormat::Png);
    let request = ConversionRequest::new(TargetFormat::Ico).with_max_width(32);
    let result = convert(&source, "logo.png", &request, &[32, 16]).unwrap();
    assert_eq!(result.output_size, (32, 16));
}

#[test]
fn test_avif_source_converts() {
    let source = encode_source(32, 32, ImageFormat::Png);
    let avif = convert(&source, "a.png", &ConversionRequest::new(TargetFormat::Avif), DEFAULT_ICON_SIZES)
        .unwrap();

    let result = convert(&avif.data, "a.avif", &ConversionRequest::new(TargetFormat::WebP), DEFAULT_ICON_SIZES)
        .unwrap();
    assert_eq!(result.source_size, (32, 32));
    assert_eq!(result.filename, "a.webp");
}

#[test]
fn test_corrupt_source_is_decode_error() {
    let mut source = encode_source(8, 8, ImageFormat::Png);
    source.truncate(20);
    let err = convert(&source, "broken.png", &ConversionRequest::new(TargetFormat::WebP), DEFAULT_ICON_SIZES)
        .unwrap_err();
    assert!(matches!(err, ImageError::DecodeFailed { .. }));
    assert_eq!(err.to_http_status(), 500);
}
