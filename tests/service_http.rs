// End-to-end tool flows against a mock image-processing server
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image_toolbox::settings::{Presentation, ToolSettings};
use image_toolbox::tools::{
    OutputFormat, QrRequest, ToolConfig, ToolKind, ToolRequest, ToolService, commands,
};
use mockito::{Matcher, Server};

fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]));
    let path = dir.join(name);
    img.save(&path).expect("save test png");
    path
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 0, 255]));
    let mut cursor = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .expect("encode png");
    cursor.into_inner()
}

fn service_for(base: &str) -> ToolService {
    let mut settings = ToolSettings::default();
    settings.api_base_url = base.to_string();
    ToolService::new(ToolConfig::default(), settings.endpoints()).expect("service should build")
}

#[tokio::test]
async fn resize_with_one_side_keeps_aspect_ratio() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/resize")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("name=\"width\"\r\n\r\n50\r\n".to_string()),
            Matcher::Regex("name=\"height\"\r\n\r\n25\r\n".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(vec![1u8; 10])
        .create_async()
        .await;

    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_png(dir.path(), "wide.png", 100, 50);
    let mut request = ToolRequest::new(ToolKind::Resize);
    request.width = Some(50);

    let output = commands::process_file(
        &service_for(&server.url()),
        &input,
        request,
        &dir.path().join("out"),
        Presentation::Plain,
    )
    .await
    .expect("resize should succeed");

    mock.assert_async().await;
    assert!(output.outputs[0].path.ends_with("resized-50x25.png"));
    assert!(output.message.starts_with("Resized 50x25!"));
}

#[tokio::test]
async fn server_error_body_is_surfaced() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/convert")
        .with_status(500)
        .with_body("Unsupported image")
        .create_async()
        .await;

    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_png(dir.path(), "a.png", 4, 4);
    let mut request = ToolRequest::new(ToolKind::Convert);
    request.format = Some(OutputFormat::Jpeg);

    let err = commands::process_file(
        &service_for(&server.url()),
        &input,
        request,
        dir.path(),
        Presentation::Plain,
    )
    .await
    .expect_err("server error should surface");

    assert_eq!(err.code, "E_REMOTE_STATUS");
    assert_eq!(err.message, "Unsupported image");
}

#[tokio::test]
async fn remove_bg_without_key_never_reaches_network() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut settings = ToolSettings::default();
    settings.remove_bg_url = format!("{}/v1.0/removebg", server.url());
    let service = ToolService::new(ToolConfig::default(), settings.endpoints())
        .expect("service should build");

    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_png(dir.path(), "cat.png", 4, 4);
    let err = commands::process_file(
        &service,
        &input,
        ToolRequest::new(ToolKind::RemoveBackground),
        dir.path(),
        Presentation::Plain,
    )
    .await
    .expect_err("missing key must fail");

    assert_eq!(err.code, "E_VALIDATION");
    mock.assert_async().await;
}

#[tokio::test]
async fn pdf_skips_non_images_and_keeps_order() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/image-to-pdf")
        .match_body(Matcher::Regex("(?s)filename=\"1.png\".*filename=\"2.png\"".to_string()))
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body("%PDF-1.7")
        .create_async()
        .await;

    let dir = tempfile::tempdir().expect("temp dir");
    let first = write_png(dir.path(), "1.png", 4, 4);
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "hello").expect("write notes");
    let second = write_png(dir.path(), "2.png", 4, 4);

    let output = commands::images_to_pdf(
        &service_for(&server.url()),
        &[first, notes, second],
        &dir.path().join("out"),
        Presentation::Decorated,
    )
    .await
    .expect("pdf should succeed");

    mock.assert_async().await;
    assert!(output.outputs[0].path.ends_with("images.pdf"));
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].name, "notes.txt");
    assert_eq!(output.failures[0].error.code, "E_INVALID_FILE_TYPE");
    assert!(output.message.starts_with("✅ Conversion Complete!"));
}

#[tokio::test]
async fn qr_code_is_written_as_png() {
    use base64::Engine as _;

    let mut server = Server::new_async().await;
    let data_url = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png_bytes(8, 8))
    );
    let _mock = server
        .mock("POST", "/qr-code")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "text": "https://example.com",
            "size": 256
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::json!({ "qrDataUrl": data_url }).to_string())
        .create_async()
        .await;

    let dir = tempfile::tempdir().expect("temp dir");
    let output = commands::generate_qr(
        &service_for(&server.url()),
        QrRequest::new("https://example.com"),
        dir.path(),
        false,
        Presentation::Plain,
    )
    .await
    .expect("qr should succeed");

    let path = &output.outputs[0].path;
    let name = path.file_name().and_then(|n| n.to_str()).expect("file name");
    assert!(name.starts_with("qr-code-") && name.ends_with(".png"));
    let written = std::fs::read(path).expect("read qr png");
    assert!(image::load_from_memory(&written).is_ok());
}
