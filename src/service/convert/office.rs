use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use crate::config::AppConfig;
use crate::model::convert::{ConvertOptions, TargetFormat};
use crate::util::path::converted_output_path;
use super::{ConvertError, DocumentConverter};

/// 调用无界面办公套件（soffice / libreoffice）完成一次性转换
#[derive(Debug, Clone)]
pub struct OfficeConverter {
    binary: String,
    out_dir: PathBuf,
    timeout: Option<Duration>,
}

impl OfficeConverter {
    pub fn new(binary: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            out_dir: out_dir.into(),
            timeout: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.converter.binary.clone(), config.converter.work_dir.clone())
            .with_timeout(config.conversion_timeout())
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `--headless --convert-to <fmt> --outdir <dir> [--writer-filter-options=<json>] <input>`
    pub fn build_args(&self, input: &Path, target: TargetFormat, options: &ConvertOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--headless".into(),
            "--convert-to".into(),
            target.extension().into(),
            "--outdir".into(),
            self.out_dir.clone().into_os_string(),
        ];

        if let Some(filter_options) = options.writer_filter_options(target) {
            args.push(format!("--writer-filter-options={}", filter_options).into());
        }

        args.push(input.as_os_str().to_os_string());
        args
    }

    async fn run(&self, args: Vec<OsString>) -> Result<std::process::Output, ConvertError> {
        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConvertError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let output = child.wait_with_output();
        let result = match self.timeout {
            // 超时后 future 被丢弃，kill_on_drop 负责结束子进程
            Some(limit) => tokio::time::timeout(limit, output)
                .await
                .map_err(|_| ConvertError::Timeout(limit))?,
            None => output.await,
        };

        result.map_err(|source| ConvertError::Spawn {
            binary: self.binary.clone(),
            source,
        })
    }
}

#[async_trait]
impl DocumentConverter for OfficeConverter {
    async fn convert(
        &self,
        input: &Path,
        target: TargetFormat,
        options: &ConvertOptions,
    ) -> Result<PathBuf, ConvertError> {
        let args = self.build_args(input, target, options);
        tracing::info!(
            "执行转换命令: {} {}",
            self.binary,
            args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ")
        );

        let start_time = std::time::Instant::now();
        let output = self.run(args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!("⚠️  转换进程异常退出 ({}): {}", output.status, stderr);
            return Err(ConvertError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        let output_path = converted_output_path(input, &self.out_dir, target.extension());
        if !tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            return Err(ConvertError::MissingOutput(output_path));
        }

        tracing::info!(
            "✅ 转换完成: {} (耗时 {:.2}s)",
            output_path.display(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(output_path)
    }
}
