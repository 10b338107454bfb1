use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use crate::api::AppState;
use crate::error::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// 配置了密钥时校验 `X-API-KEY`，在读取请求体之前执行
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = state.config.api_key() {
        let authorized = request
            .headers()
            .get(API_KEY_HEADER)
            .map(|value| constant_time_eq(value.as_bytes(), expected.as_bytes()))
            .unwrap_or(false);

        if !authorized {
            return Err(AppError::Unauthorized);
        }
    }

    Ok(next.run(request).await)
}

/// 逐字节比较，耗时与首个不同字节的位置无关
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
