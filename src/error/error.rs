use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use crate::service::convert::ConvertError;
use crate::service::pdf::PdfError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("{0}")]
    NotFound(String),

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConvertError),

    #[error("PDF processing failed: {0}")]
    Pdf(#[from] PdfError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            // 上传超过 body 限制时 multer 会报错，透传其状态码（413）
            AppError::Multipart(e) => e.status(),
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Pdf(PdfError::NoImages) => StatusCode::NOT_FOUND,
            AppError::Conversion(_)
            | AppError::Pdf(_)
            | AppError::Io(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
        } else {
            tracing::warn!("请求被拒绝 ({}): {}", status.as_u16(), self);
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
