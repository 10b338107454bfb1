use std::sync::Arc;
use crate::config::AppConfig;
use crate::service::convert::{DocumentConverter, OfficeConverter};
use crate::service::pdf::{PdfEngine, PdfiumEngine};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub converter: Arc<dyn DocumentConverter>,
    pub pdf_engine: Arc<dyn PdfEngine>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &"AppConfig")
            .field("converter", &"DocumentConverter")
            .field("pdf_engine", &"PdfEngine")
            .finish()
    }
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let converter = Arc::new(OfficeConverter::from_config(&config));
        let pdf_engine = Arc::new(PdfiumEngine::from_config(&config));
        Self::with_backends(config, converter, pdf_engine)
    }

    /// 注入自定义的转换器与 PDF 引擎
    pub fn with_backends(
        config: AppConfig,
        converter: Arc<dyn DocumentConverter>,
        pdf_engine: Arc<dyn PdfEngine>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            converter,
            pdf_engine,
        }
    }
}
