use config::{Config, Environment, File};
use serde::Deserialize;
use serde_aux::field_attributes::{
    deserialize_number_from_string, deserialize_option_number_from_string,
};
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Context, Result};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    #[serde(default)]
    #[validate(nested)]
    pub converter: ConverterConfig,
    #[serde(default)]
    #[validate(nested)]
    pub pdf: PdfConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    #[validate(length(min = 1))]
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "deserialize_number_from_string")]
    #[validate(range(min = 1))]
    pub port: u16,
    /// 单个请求体上限（字节），包含 multipart 开销
    #[serde(default = "default_max_upload_bytes", deserialize_with = "deserialize_number_from_string")]
    #[validate(range(min = 1024))]
    pub max_upload_bytes: usize,
    /// 转换接口的同时在途请求上限
    #[serde(default = "default_max_concurrency", deserialize_with = "deserialize_number_from_string")]
    #[validate(range(min = 1))]
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConverterConfig {
    #[serde(default = "default_binary")]
    #[validate(length(min = 1))]
    pub binary: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// 为空时不限制外部进程运行时长
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    #[validate(range(min = 1))]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_dpi_bounds"))]
pub struct PdfConfig {
    /// pdfium 动态库所在目录，为空时使用系统库
    #[serde(default)]
    pub library_path: Option<PathBuf>,
    #[serde(default = "default_dpi", deserialize_with = "deserialize_number_from_string")]
    #[validate(range(min = 1))]
    pub default_dpi: u32,
    #[serde(default = "default_max_dpi", deserialize_with = "deserialize_number_from_string")]
    #[validate(range(min = 1, max = 2400))]
    pub max_dpi: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_key: Option<String>,
}

fn validate_dpi_bounds(pdf: &PdfConfig) -> Result<(), validator::ValidationError> {
    if pdf.default_dpi > pdf.max_dpi {
        return Err(validator::ValidationError::new("default_dpi_exceeds_max_dpi"));
    }
    Ok(())
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3501
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_max_concurrency() -> usize {
    16
}

fn default_binary() -> String {
    "soffice".to_string()
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("doc_gateway")
}

fn default_dpi() -> u32 {
    150
}

fn default_max_dpi() -> u32 {
    600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            work_dir: default_work_dir(),
            timeout_secs: None,
        }
    }
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            default_dpi: default_dpi(),
            max_dpi: default_max_dpi(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            converter: ConverterConfig::default(),
            pdf: PdfConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置：配置文件可选，环境变量（DOCGW_ 前缀，`__` 分隔层级）覆盖文件
    pub async fn load(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("DOCGW")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to load config")?;

        let app_config: AppConfig = config.try_deserialize()
            .context("Failed to deserialize config")?;

        app_config.validate()
            .context("Invalid config")?;

        Ok(app_config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 空字符串视为未配置，此时不做鉴权
    pub fn api_key(&self) -> Option<&str> {
        self.auth
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn conversion_timeout(&self) -> Option<Duration> {
        self.converter.timeout_secs.map(Duration::from_secs)
    }
}
