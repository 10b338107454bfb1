use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::{middleware, routing::get, routing::post, Router};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use crate::api::{auth, handlers, AppState};

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false)
        .expose_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    let max_upload_bytes = state.config.server.max_upload_bytes;
    let max_concurrency = state.config.server.max_concurrency;

    // 转换路由：鉴权最先执行（早于 body 大小检查），上传大小与并发数受限
    let conversion_routes = Router::new()
        .route("/convert", post(handlers::convert::convert))
        .route("/pdf-images", post(handlers::pdf_images::pdf_images))
        .route_layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key))
        .layer(DefaultBodyLimit::disable())
        .layer(ConcurrencyLimitLayer::new(max_concurrency));

    Router::new()
        .route("/", get(handlers::health::health))
        .merge(conversion_routes)
        .fallback(handlers::health::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::model::convert::TargetFormat;
    use crate::service::convert::{ConvertError, MockDocumentConverter};
    use crate::service::pdf::{EmbeddedImage, MockPdfEngine, PdfEngine};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::path::Path;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "doc-gateway-test-boundary";

    enum Part<'a> {
        File { filename: &'a str, data: &'a [u8] },
        Text { name: &'a str, value: &'a str },
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::File { filename, data } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                            filename
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
                Part::Text { name, value } => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}", name, value).as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn post(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    fn with_key(mut request: Request<Body>, key: &str) -> Request<Body> {
        request
            .headers_mut()
            .insert(auth::API_KEY_HEADER, key.parse().unwrap());
        request
    }

    fn test_config(work_dir: &Path, api_key: Option<&str>) -> AppConfig {
        let mut config = AppConfig::default();
        config.converter.work_dir = work_dir.to_path_buf();
        config.auth.api_key = api_key.map(str::to_string);
        config
    }

    fn app(config: AppConfig, converter: MockDocumentConverter, engine: MockPdfEngine) -> Router {
        let engine: Arc<dyn PdfEngine> = Arc::new(engine);
        create_router(AppState::with_backends(config, Arc::new(converter), engine))
    }

    /// 模拟转换器：在输入旁写出替换扩展名后的文件
    fn copying_converter() -> MockDocumentConverter {
        let mut converter = MockDocumentConverter::new();
        converter.expect_convert().returning(|input, target, _| {
            let output = input.with_extension(target.extension());
            std::fs::write(&output, b"converted-document").unwrap();
            Ok(output)
        });
        converter
    }

    fn idle_converter() -> MockDocumentConverter {
        let mut converter = MockDocumentConverter::new();
        converter.expect_convert().never();
        converter
    }

    fn idle_engine() -> MockPdfEngine {
        let mut engine = MockPdfEngine::new();
        engine.expect_render_pages().never();
        engine.expect_embedded_images().never();
        engine
    }

    fn leftover_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_running() {
        let work = tempfile::tempdir().unwrap();
        let app = app(test_config(work.path(), Some("secret")), idle_converter(), idle_engine());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "running");
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let work = tempfile::tempdir().unwrap();
        let app = app(test_config(work.path(), None), idle_converter(), idle_engine());

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn convert_streams_result_and_cleans_up() {
        let work = tempfile::tempdir().unwrap();
        let app = app(test_config(work.path(), None), copying_converter(), idle_engine());

        let response = app
            .oneshot(post(
                "/convert?to=pdf",
                &[Part::File { filename: "Quarterly Report.docx", data: b"docx-bytes" }],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"converted.pdf\""
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"converted-document");
        assert_eq!(leftover_files(work.path()), 0);
    }

    #[tokio::test]
    async fn very_long_filename_still_converts() {
        let work = tempfile::tempdir().unwrap();
        let app = app(test_config(work.path(), None), copying_converter(), idle_engine());

        let filename = format!("{}.docx", "a".repeat(240));
        let response = app
            .oneshot(post("/convert?to=pdf", &[Part::File { filename: &filename, data: b"docx" }]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(leftover_files(work.path()), 0);
    }

    #[tokio::test]
    async fn target_format_from_form_field() {
        let work = tempfile::tempdir().unwrap();
        let mut converter = MockDocumentConverter::new();
        converter
            .expect_convert()
            .withf(|_, target, _| *target == TargetFormat::Docx)
            .times(1)
            .returning(|input, target, _| {
                let output = input.with_extension(target.extension());
                std::fs::write(&output, b"docx").unwrap();
                Ok(output)
            });
        let app = app(test_config(work.path(), None), converter, idle_engine());

        let response = app
            .oneshot(post(
                "/convert",
                &[
                    Part::Text { name: "format", value: "DOCX" },
                    Part::File { filename: "legacy.doc", data: b"doc" },
                ],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"converted.docx\""
        );
    }

    #[tokio::test]
    async fn margin_top_reaches_converter_as_twips() {
        let work = tempfile::tempdir().unwrap();
        let mut converter = MockDocumentConverter::new();
        converter
            .expect_convert()
            .withf(|_, target, options| {
                options.writer_filter_options(*target).as_deref() == Some(r#"{"MargTop":567}"#)
            })
            .times(1)
            .returning(|input, target, _| {
                let output = input.with_extension(target.extension());
                std::fs::write(&output, b"pdf").unwrap();
                Ok(output)
            });
        let app = app(test_config(work.path(), None), converter, idle_engine());

        let response = app
            .oneshot(post(
                "/convert?to=pdf&margin_top=10",
                &[Part::File { filename: "a.docx", data: b"docx" }],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rejected_inputs_never_touch_disk() {
        let cases: Vec<(&str, Vec<Part<'static>>, &str)> = vec![
            ("/convert", vec![Part::Text { name: "to", value: "pdf" }], "file is required"),
            ("/convert", vec![Part::File { filename: "", data: b"x" }], "No file selected"),
            ("/convert", vec![Part::File { filename: "virus.exe", data: b"x" }], "not allowed"),
            ("/convert?to=odt", vec![Part::File { filename: "a.docx", data: b"x" }], "Unsupported target format"),
            ("/convert?margin_left=-3", vec![Part::File { filename: "a.docx", data: b"x" }], "margin_left"),
        ];

        for (uri, parts, expected) in cases {
            let work = tempfile::tempdir().unwrap();
            let app = app(test_config(work.path(), None), idle_converter(), idle_engine());

            let response = app.oneshot(post(uri, &parts)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");

            let body = json_body(response).await;
            let message = body["error"].as_str().unwrap_or_default().to_string();
            assert!(message.contains(expected), "{uri}: {message}");
            assert_eq!(leftover_files(work.path()), 0, "{uri}");
        }
    }

    #[tokio::test]
    async fn api_key_is_enforced_before_upload() {
        for key in [None, Some("wrong")] {
            let work = tempfile::tempdir().unwrap();
            let app = app(test_config(work.path(), Some("secret")), idle_converter(), idle_engine());

            let mut request = post("/convert", &[Part::File { filename: "a.docx", data: b"x" }]);
            if let Some(key) = key {
                request = with_key(request, key);
            }

            let response = app.oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(leftover_files(work.path()), 0);
        }
    }

    #[tokio::test]
    async fn matching_api_key_is_accepted() {
        let work = tempfile::tempdir().unwrap();
        let app = app(test_config(work.path(), Some("secret")), copying_converter(), idle_engine());

        let request = with_key(post("/convert", &[Part::File { filename: "a.doc", data: b"x" }]), "secret");
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(leftover_files(work.path()), 0);
    }

    #[tokio::test]
    async fn converter_failure_is_500_and_cleans_partial_output() {
        let work = tempfile::tempdir().unwrap();
        let mut converter = MockDocumentConverter::new();
        converter.expect_convert().times(1).returning(|input, target, _| {
            // 失败前留下半成品
            std::fs::write(input.with_extension(target.extension()), b"partial").unwrap();
            Err(ConvertError::Failed {
                status: "exit status: 1".into(),
                stderr: "Error: source file could not be loaded".into(),
            })
        });
        let app = app(test_config(work.path(), None), converter, idle_engine());

        let response = app
            .oneshot(post("/convert", &[Part::File { filename: "broken.docx", data: b"x" }]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("could not be loaded"));
        assert_eq!(leftover_files(work.path()), 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let work = tempfile::tempdir().unwrap();
        let mut config = test_config(work.path(), None);
        config.server.max_upload_bytes = 1024;
        let app = app(config, idle_converter(), idle_engine());

        let data = vec![b'x'; 4096];
        let body = multipart_body(&[Part::File { filename: "big.docx", data: &data }]);
        let mut request = post("/convert", &[]);
        request
            .headers_mut()
            .insert(header::CONTENT_LENGTH, body.len().to_string().parse().unwrap());
        *request.body_mut() = Body::from(body);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(leftover_files(work.path()), 0);
    }

    #[tokio::test]
    async fn oversized_upload_without_key_is_unauthorized() {
        let work = tempfile::tempdir().unwrap();
        let mut config = test_config(work.path(), Some("secret"));
        config.server.max_upload_bytes = 1024;
        let app = app(config, idle_converter(), idle_engine());

        let data = vec![b'x'; 4096];
        let body = multipart_body(&[Part::File { filename: "big.docx", data: &data }]);
        let mut request = post("/convert", &[]);
        request
            .headers_mut()
            .insert(header::CONTENT_LENGTH, body.len().to_string().parse().unwrap());
        *request.body_mut() = Body::from(body);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(json_body(response).await["error"].is_string());
    }

    fn blank_page(scale: f32) -> DynamicImage {
        let width = (612.0 * scale).round() as u32;
        let height = (792.0 * scale).round() as u32;
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
    }

    #[tokio::test]
    async fn pdf_pages_returns_every_page() {
        let work = tempfile::tempdir().unwrap();
        let mut engine = MockPdfEngine::new();
        engine
            .expect_render_pages()
            .withf(|path, scale, _| path.exists() && (*scale - 1.0).abs() < 1e-6)
            .times(1)
            .returning(|_, scale, sink| {
                sink.push(blank_page(scale))?;
                sink.push(blank_page(scale))
            });
        let app = app(test_config(work.path(), None), idle_converter(), engine);

        let response = app
            .oneshot(post("/pdf-images?dpi=72", &[Part::File { filename: "two.pdf", data: b"%PDF" }]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["images"][1]["index"], 1);
        assert_eq!(body["images"][0]["format"], "png");
        assert_eq!(body["images"][0]["width"], 612);
        assert_eq!(body["images"][0]["height"], 792);
        assert!(body["images"][0].get("page").is_none());
        assert_eq!(leftover_files(work.path()), 0);
    }

    #[tokio::test]
    async fn pdf_without_pages_is_server_error() {
        let work = tempfile::tempdir().unwrap();
        let mut engine = MockPdfEngine::new();
        engine.expect_render_pages().returning(|_, _, _| Ok(()));
        let app = app(test_config(work.path(), None), idle_converter(), engine);

        let response = app
            .oneshot(post("/pdf-images", &[Part::File { filename: "empty.pdf", data: b"%PDF" }]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(response).await["error"].as_str().unwrap().contains("no pages found"));
        assert_eq!(leftover_files(work.path()), 0);
    }

    #[tokio::test]
    async fn extract_mode_returns_embedded_images() {
        let work = tempfile::tempdir().unwrap();
        let mut engine = MockPdfEngine::new();
        engine.expect_embedded_images().times(1).returning(|_| {
            let logo = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 8, Rgb([0, 128, 255])));
            Ok(vec![
                EmbeddedImage { page_index: 1, image: logo.clone(), native: None },
                EmbeddedImage { page_index: 3, image: logo, native: None },
            ])
        });
        let app = app(test_config(work.path(), None), idle_converter(), engine);

        let response = app
            .oneshot(post(
                "/pdf-images?mode=extract&format=jpeg",
                &[Part::File { filename: "brochure.PDF", data: b"%PDF" }],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["images"][0]["page"], 2);
        assert_eq!(body["images"][1]["page"], 4);
        assert_eq!(body["images"][1]["index"], 1);
        assert_eq!(body["images"][1]["format"], "jpeg");
    }

    #[tokio::test]
    async fn extract_without_images_is_404() {
        let work = tempfile::tempdir().unwrap();
        let mut engine = MockPdfEngine::new();
        engine.expect_embedded_images().returning(|_| Ok(Vec::new()));
        let app = app(test_config(work.path(), None), idle_converter(), engine);

        let response = app
            .oneshot(post(
                "/pdf-images?mode=extract",
                &[Part::File { filename: "text.pdf", data: b"%PDF" }],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(leftover_files(work.path()), 0);
    }

    #[tokio::test]
    async fn pdf_images_validation() {
        let cases = [
            ("/pdf-images", "slides.docx"),
            ("/pdf-images?mode=thumbnails", "a.pdf"),
            ("/pdf-images?format=gif", "a.pdf"),
            ("/pdf-images?dpi=abc", "a.pdf"),
            ("/pdf-images?dpi=100000", "a.pdf"),
        ];

        for (uri, filename) in cases {
            let work = tempfile::tempdir().unwrap();
            let app = app(test_config(work.path(), None), idle_converter(), idle_engine());

            let response = app
                .oneshot(post(uri, &[Part::File { filename, data: b"%PDF" }]))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri} {filename}");
            assert_eq!(leftover_files(work.path()), 0);
        }
    }

    #[tokio::test]
    async fn pdf_library_failure_is_500() {
        let work = tempfile::tempdir().unwrap();
        let mut engine = MockPdfEngine::new();
        engine
            .expect_render_pages()
            .returning(|_, _, _| Err(crate::service::pdf::PdfError::Open("FormatError".into())));
        let app = app(test_config(work.path(), Some("k")), idle_converter(), engine);

        let request = with_key(
            post("/pdf-images", &[Part::File { filename: "corrupt.pdf", data: b"garbage" }]),
            "k",
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(leftover_files(work.path()), 0);
    }
}
