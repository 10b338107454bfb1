use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use crate::api::upload::UploadForm;
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::model::convert::{ConvertOptions, ConvertQuery, TargetFormat, ALLOWED_INPUT_EXTENSIONS};
use crate::util::path::{converted_output_path, unique_upload_name, validate_upload_name};
use crate::util::temp::TempFile;

/// 目标格式优先取查询参数 `to`，其次表单字段 `to` / `format`，缺省为 pdf
fn resolve_target(query: &ConvertQuery, form: &UploadForm) -> AppResult<TargetFormat> {
    let requested = query
        .to
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| form.field("to"))
        .or_else(|| form.field("format"));

    match requested {
        Some(raw) => raw.parse().map_err(AppError::Validation),
        None => Ok(TargetFormat::default()),
    }
}

pub async fn convert(
    State(state): State<AppState>,
    Query(query): Query<ConvertQuery>,
    multipart: Multipart,
) -> AppResult<Response> {
    let mut form = UploadForm::read(multipart).await?;
    let upload = form.take_file()?;

    // 所有校验都在落盘之前完成
    let ext = validate_upload_name(&upload.file_name, &ALLOWED_INPUT_EXTENSIONS)?;
    let target = resolve_target(&query, &form)?;
    let options = ConvertOptions {
        margins: query.margins().map_err(AppError::Validation)?,
    };

    tracing::info!(
        "收到转换请求: {} ({} bytes) → {}",
        upload.file_name,
        upload.data.len(),
        target
    );

    let work_dir = &state.config.converter.work_dir;
    let input = TempFile::create(
        work_dir.join(unique_upload_name(&upload.file_name, &ext)),
        &upload.data,
    )
    .await?;
    // 先接管预期的输出路径，转换失败留下的残余文件同样会被清理
    let expected_output = TempFile::adopt(converted_output_path(input.path(), work_dir, target.extension()));

    let produced = state.converter.convert(input.path(), target, &options).await?;
    let _produced = (produced.as_path() != expected_output.path()).then(|| TempFile::adopt(produced.clone()));

    let bytes = tokio::fs::read(&produced).await?;
    if bytes.is_empty() {
        return Err(AppError::Internal("converter produced an empty file".to_string()));
    }

    Ok((
        [
            (header::CONTENT_TYPE, target.mime_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", target.download_name()),
            ),
        ],
        bytes,
    )
        .into_response())
}
