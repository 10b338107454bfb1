mod office;

pub use office::OfficeConverter;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use crate::model::convert::{ConvertOptions, TargetFormat};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("failed to start converter '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("converter exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("converter did not finish within {0:?}")]
    Timeout(Duration),

    #[error("converter reported success but produced no output at {0}")]
    MissingOutput(PathBuf),
}

/// 文档格式转换的外部协作者
///
/// 返回转换产物路径，由调用方负责清理。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(
        &self,
        input: &Path,
        target: TargetFormat,
        options: &ConvertOptions,
    ) -> Result<PathBuf, ConvertError>;
}
