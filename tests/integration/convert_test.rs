// End-to-end tests against the running binary

use super::test_harness::ServerTestHarness;
use image::{DynamicImage, ImageFormat, RgbaImage};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use std::io::{Cursor, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, image::Rgba([30, 60, 90, 255]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn image_part(file_name: &str, data: Vec<u8>) -> Part {
    Part::bytes(data)
        .file_name(file_name.to_string())
        .mime_str("image/png")
        .unwrap()
}

fn client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap()
}

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<!doctype html><title>Convert</title>").unwrap();
    dir
}

#[test]
#[ignore] // Requires the server binary
fn test_convert_png_to_webp_over_http() {
    let dir = site();
    let server = ServerTestHarness::start(18308, dir.path()).expect("server should start");

    let form = Form::new()
        .part("image", image_part("wide.png", png(100, 50)))
        .text("format", "webp")
        .text("quality", "50")
        .text("maxWidth", "50");

    let response = client().post(server.url("/api/convert")).multipart(form).send().unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "image/webp");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"wide.webp\""
    );

    let body = response.bytes().unwrap();
    let decoded = image::load_from_memory_with_format(&body, ImageFormat::WebP).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (50, 25));
}

#[test]
#[ignore] // Requires the server binary
fn test_errors_are_json_over_http() {
    let dir = site();
    let server = ServerTestHarness::start(18309, dir.path()).expect("server should start");

    let form = Form::new()
        .part("image", image_part("a.png", png(4, 4)))
        .text("format", "tiff");
    let response = client().post(server.url("/api/convert")).multipart(form).send().unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["error"], "Format invalide. Choisissez webp, avif, jpg, png ou ico.");

    let response = client().get(server.url("/api/convert")).send().unwrap();
    assert_eq!(response.status(), 405);
}

#[test]
#[ignore] // Requires the server binary
fn test_static_and_operational_endpoints() {
    let dir = site();
    let server = ServerTestHarness::start(18310, dir.path()).expect("server should start");
    let client = client();

    let index = client.get(server.url("/")).send().unwrap();
    assert_eq!(index.status(), 200);
    assert!(index.text().unwrap().contains("<title>Convert</title>"));

    let missing = client.get(server.url("/missing.js")).send().unwrap();
    assert_eq!(missing.status(), 404);

    let health: serde_json::Value = client.get(server.url("/health")).send().unwrap().json().unwrap();
    assert_eq!(health["status"], "healthy");

    let metrics = client.get(server.url("/metrics")).send().unwrap().text().unwrap();
    assert!(metrics.contains("http_requests_total"));
}

/// Declare a body well over the limit but send only its first 64 KiB,
/// then return the raw response.
fn post_oversized(port: u16, file_name: &str) -> String {
    const BOUNDARY: &str = "oversizedboundary";
    const SENT: usize = 64 * 1024;

    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.resize(SENT, b'x');

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(30))).unwrap();
    write!(
        stream,
        "POST /api/convert HTTP/1.1\r\nHost: 127.0.0.1\r\n\
         Content-Type: multipart/form-data; boundary={BOUNDARY}\r\n\
         Content-Length: {}\r\n\r\n",
        60 * 1024 * 1024
    )
    .unwrap();
    stream.write_all(&body).unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[test]
#[ignore] // Requires the server binary
fn test_oversized_upload_is_rejected_over_http() {
    let dir = site();
    let server = ServerTestHarness::start(18311, dir.path()).expect("server should start");

    let response = post_oversized(server.port, "huge.png");
    assert!(response.starts_with("HTTP/1.1 400"), "{response}");
    assert!(response.contains(r#"{"error":"Fichier trop volumineux (max 50 Mo)."}"#));
}

#[test]
#[ignore] // Requires the server binary
fn test_oversized_upload_with_wrong_extension_reports_format() {
    let dir = site();
    let server = ServerTestHarness::start(18312, dir.path()).expect("server should start");

    let response = post_oversized(server.port, "notes.txt");
    assert!(response.starts_with("HTTP/1.1 400"), "{response}");
    assert!(response.contains(r#"{"error":"Format non supporté. Utilisez JPG, PNG, WebP ou AVIF."}"#));
}
