use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use crate::api::upload::UploadForm;
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::model::image::{ImageMode, ImagesResponse, PdfImagesQuery};
use crate::service::pdf::{extract_images, render_pages, PdfError};
use crate::util::path::{unique_upload_name, validate_upload_name};
use crate::util::temp::TempFile;

pub async fn pdf_images(
    State(state): State<AppState>,
    Query(query): Query<PdfImagesQuery>,
    multipart: Multipart,
) -> AppResult<Json<ImagesResponse>> {
    let mut form = UploadForm::read(multipart).await?;
    let upload = form.take_file()?;

    validate_upload_name(&upload.file_name, &["pdf"])?;
    let params = query
        .validate(state.config.pdf.default_dpi, state.config.pdf.max_dpi)
        .map_err(AppError::Validation)?;

    tracing::info!(
        "收到 PDF 图片请求: {} ({} bytes), {:?}",
        upload.file_name,
        upload.data.len(),
        params
    );

    let input = TempFile::create(
        state.config.converter.work_dir.join(unique_upload_name(&upload.file_name, "pdf")),
        &upload.data,
    )
    .await?;

    // pdfium 为同步调用，放到阻塞线程池执行
    let engine = state.pdf_engine.clone();
    let path = input.path().to_path_buf();
    let artifacts = tokio::task::spawn_blocking(move || match params.mode {
        ImageMode::Pages => render_pages(engine.as_ref(), &path, params.dpi, params.format),
        ImageMode::Extract => extract_images(engine.as_ref(), &path, params.format),
    })
    .await
    .map_err(|e| PdfError::Join(e.to_string()))??;

    tracing::info!("✅ 输出 {} 张图片", artifacts.len());
    Ok(Json(ImagesResponse::from(artifacts)))
}
