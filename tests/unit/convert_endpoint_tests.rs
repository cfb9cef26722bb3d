// Conversion endpoint behaviour, exercised through the handler without a socket

use bytes::Bytes;
use convert_image::config::ConverterConfig;
use convert_image::metrics::Metrics;
use convert_image::server::{ConvertHandler, EndpointResponse};
use image::{DynamicImage, ImageFormat, RgbaImage};
use rstest::rstest;
use std::io::Cursor;
use std::sync::Arc;

const BOUNDARY: &str = "endpoint-test-boundary";

struct Form<'a> {
    file: Option<(&'a str, Vec<u8>)>,
    fields: Vec<(&'a str, &'a str)>,
}

impl<'a> Form<'a> {
    fn image(file_name: &'a str, data: Vec<u8>) -> Self {
        Self {
            file: Some((file_name, data)),
            fields: Vec::new(),
        }
    }

    fn field(mut self, name: &'a str, value: &'a str) -> Self {
        self.fields.push((name, value));
        self
    }

    fn encode(&self) -> (String, Bytes) {
        let mut body = Vec::new();
        for (name, value) in &self.fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, data)) = &self.file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        (format!("multipart/form-data; boundary={}", BOUNDARY), Bytes::from(body))
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x * 3 % 256) as u8, (y * 11 % 256) as u8, 200, 255])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn handler() -> (ConvertHandler, Arc<Metrics>) {
    handler_with(ConverterConfig::default())
}

fn handler_with(config: ConverterConfig) -> (ConvertHandler, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    (ConvertHandler::new(config, metrics.clone()), metrics)
}

async fn send(handler: &ConvertHandler, form: Form<'_>) -> EndpointResponse {
    let (content_type, body) = form.encode();
    handler.handle("test-request", Some(&content_type), body).await
}

fn dimensions(response: &EndpointResponse) -> (u32, u32) {
    let img = image::load_from_memory(&response.body).unwrap();
    (img.width(), img.height())
}

#[tokio::test]
async fn test_webp_conversion_end_to_end() {
    let (handler, metrics) = handler();
    let response = send(
        &handler,
        Form::image("wide.png", png(100, 50))
            .field("format", "webp")
            .field("quality", "50"),
    )
    .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "image/webp");
    assert_eq!(
        response.header("Content-Disposition"),
        Some("attachment; filename=\"wide.webp\"")
    );
    assert_eq!(dimensions(&response), (100, 50));
    assert_eq!(metrics.get_conversion_count("webp"), 1);
}

#[tokio::test]
async fn test_max_width_resizes_into_box() {
    let (handler, _) = handler();
    let response = send(
        &handler,
        Form::image("wide.png", png(100, 50))
            .field("format", "webp")
            .field("quality", "50")
            .field("maxWidth", "50"),
    )
    .await;

    assert_eq!(response.status, 200);
    assert_eq!(dimensions(&response), (50, 25));
}

#[rstest]
#[case("0")]
#[case("8001")]
#[case("-20")]
#[case("wide")]
#[case("")]
#[tokio::test]
async fn test_unusable_max_width_is_ignored(#[case] max_width: &str) {
    let (handler, _) = handler();
    let response = send(
        &handler,
        Form::image("a.png", png(64, 32))
            .field("format", "png")
            .field("maxWidth", max_width),
    )
    .await;

    assert_eq!(response.status, 200);
    assert_eq!(dimensions(&response), (64, 32));
}

#[tokio::test]
async fn test_max_width_never_upscales() {
    let (handler, _) = handler();
    let response = send(
        &handler,
        Form::image("small.png", png(30, 20))
            .field("format", "png")
            .field("maxWidth", "500"),
    )
    .await;
    assert_eq!(dimensions(&response), (30, 20));
}

#[rstest]
#[case("0")]
#[case("101")]
#[case("excellent")]
#[tokio::test]
async fn test_unusable_quality_falls_back_to_80(#[case] quality: &str) {
    let (handler, _) = handler();
    let source = png(40, 40);

    let reference = send(
        &handler,
        Form::image("q.png", source.clone())
            .field("format", "jpg")
            .field("quality", "80"),
    )
    .await;
    let response = send(
        &handler,
        Form::image("q.png", source)
            .field("format", "jpg")
            .field("quality", quality),
    )
    .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, reference.body);
}

#[tokio::test]
async fn test_lenient_integer_parsing() {
    let (handler, _) = handler();
    let response = send(
        &handler,
        Form::image("a.png", png(80, 40))
            .field("format", "png")
            .field("maxWidth", "  40px"),
    )
    .await;
    assert_eq!(dimensions(&response), (40, 20));
}

#[tokio::test]
async fn test_missing_format_defaults_to_webp() {
    let (handler, _) = handler();
    let response = send(&handler, Form::image("photo.jpeg", png(8, 8))).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "image/webp");
    assert_eq!(
        response.header("Content-Disposition"),
        Some("attachment; filename=\"photo.webp\"")
    );
}

#[rstest]
#[case("gif")]
#[case("jpeg")]
#[case("bmp")]
#[case(" png ")]
#[case("   ")]
#[tokio::test]
async fn test_invalid_format_rejected_before_codecs(#[case] format: &str) {
    let (handler, metrics) = handler();
    let response = send(&handler, Form::image("a.png", png(8, 8)).field("format", format)).await;

    assert_eq!(response.status, 400);
    assert_eq!(
        response.error_message().as_deref(),
        Some("Format invalide. Choisissez webp, avif, jpg, png ou ico.")
    );
    assert_eq!(metrics.get_conversion_count(format), 0);
    assert_eq!(metrics.get_upload_rejection_count("invalid_format"), 1);
}

#[tokio::test]
async fn test_format_is_case_insensitive() {
    let (handler, _) = handler();
    let response = send(&handler, Form::image("a.png", png(8, 8)).field("format", "PNG")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "image/png");
}

#[tokio::test]
async fn test_missing_image() {
    let (handler, _) = handler();
    let form = Form {
        file: None,
        fields: vec![("format", "png")],
    };
    let response = send(&handler, form).await;
    assert_eq!(response.status, 400);
    assert_eq!(response.error_message().as_deref(), Some("Aucune image fournie."));
}

#[tokio::test]
async fn test_wrong_extension_rejected_before_codecs() {
    let (handler, metrics) = handler();
    let response = send(&handler, Form::image("document.pdf", png(8, 8)).field("format", "png")).await;

    assert_eq!(response.status, 400);
    assert_eq!(
        response.error_message().as_deref(),
        Some("Format non supporté. Utilisez JPG, PNG, WebP ou AVIF.")
    );
    assert_eq!(metrics.get_conversion_count("png"), 0);
    assert_eq!(metrics.get_conversion_failure_count("png"), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_too_large() {
    let (handler, metrics) = handler();
    let oversized = vec![0u8; 50 * 1024 * 1024 + 1];
    let response = send(&handler, Form::image("huge.png", oversized)).await;

    assert_eq!(response.status, 400);
    assert_eq!(
        response.error_message().as_deref(),
        Some("Fichier trop volumineux (max 50 Mo).")
    );
    assert_eq!(metrics.get_upload_rejection_count("file_too_large"), 1);
}

#[tokio::test]
async fn test_corrupt_image_is_server_error() {
    let (handler, metrics) = handler();
    let response = send(
        &handler,
        Form::image("broken.png", b"\x89PNG\r\n\x1a\nnot really".to_vec()).field("format", "webp"),
    )
    .await;

    assert_eq!(response.status, 500);
    assert!(response.error_message().is_some());
    assert_eq!(metrics.get_conversion_failure_count("webp"), 1);
}

#[tokio::test]
async fn test_ico_download() {
    let (handler, _) = handler();
    let response = send(&handler, Form::image("logo.png", png(48, 48)).field("format", "ico")).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "image/x-icon");
    assert_eq!(
        response.header("Content-Disposition"),
        Some("attachment; filename=\"logo.ico\"")
    );
    assert_eq!(&response.body[0..4], &[0, 0, 1, 0]);
}

#[tokio::test]
async fn test_configured_limits_apply() {
    let config = ConverterConfig {
        max_width_limit: 100,
        default_quality: 90,
        ..ConverterConfig::default()
    };
    let (handler, _) = handler_with(config);
    let response = send(
        &handler,
        Form::image("a.png", png(300, 150))
            .field("format", "png")
            .field("maxWidth", "200"),
    )
    .await;
    // 200 exceeds the configured limit and is ignored
    assert_eq!(dimensions(&response), (300, 150));
}
