mod images;
mod pdfium;

pub use images::{extract_images, render_pages, PageEncoder};
pub use pdfium::PdfiumEngine;

use image::DynamicImage;
use std::path::Path;
use thiserror::Error;
use crate::model::image::ImageFormat;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("failed to bind to pdfium library: {0}")]
    Bind(String),

    #[error("failed to open PDF: {0}")]
    Open(String),

    #[error("failed to render page {page}: {detail}")]
    Render { page: usize, detail: String },

    #[error("failed to read image on page {page}: {detail}")]
    Image { page: usize, detail: String },

    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("no pages found")]
    NoPages,

    #[error("no images found")]
    NoImages,

    #[error("PDF task aborted: {0}")]
    Join(String),
}

/// 从 PDF 中取出的一张内嵌图片
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// 来源页（从 0 开始）
    pub page_index: usize,
    pub image: DynamicImage,
    /// 内嵌流本身可直接输出时保留原始字节
    pub native: Option<NativeImage>,
}

/// 未经解码的内嵌图片流及其格式（目前只有 DCTDecode → jpeg）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeImage {
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

/// PDF 渲染库的窄接口，调用均为阻塞操作
#[cfg_attr(test, mockall::automock)]
pub trait PdfEngine: Send + Sync {
    /// 按文档顺序逐页渲染并立即交给 `sink` 编码，`scale` 为相对 72 DPI 的缩放系数
    fn render_pages(&self, path: &Path, scale: f32, sink: &mut PageEncoder) -> Result<(), PdfError>;

    /// 按页序、库内对象顺序列出所有内嵌图片
    fn embedded_images(&self, path: &Path) -> Result<Vec<EmbeddedImage>, PdfError>;
}
