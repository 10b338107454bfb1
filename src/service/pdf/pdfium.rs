use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use crate::config::AppConfig;
use crate::model::image::ImageFormat;
use super::{EmbeddedImage, NativeImage, PageEncoder, PdfEngine, PdfError};

/// 可直接作为 JPEG 文件输出的流过滤器
const JPEG_FILTER: &str = "DCTDecode";

/// 基于 pdfium 的实现
///
/// 每次调用单独绑定并打开文档，不在请求之间共享库状态。
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    library_path: Option<PathBuf>,
}

impl PdfiumEngine {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.pdf.library_path.clone())
    }

    fn bind(&self) -> Result<Pdfium, PdfError> {
        let bindings = match &self.library_path {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PdfError::Bind(format!("{:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

impl PdfEngine for PdfiumEngine {
    fn render_pages(&self, path: &Path, scale: f32, sink: &mut PageEncoder) -> Result<(), PdfError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| PdfError::Open(format!("{:?}", e)))?;

        let pages = document.pages();
        info!("PDF 已加载: {} 页, 缩放系数 {:.3}", pages.len(), scale);

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

        for (index, page) in pages.iter().enumerate() {
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| PdfError::Render {
                    page: index + 1,
                    detail: format!("{:?}", e),
                })?;

            let image = bitmap.as_image();
            debug!("渲染第 {} 页 → {}x{} px", index + 1, image.width(), image.height());
            // 当前页编码完成后位图即被释放
            sink.push(image)?;
        }

        info!("✅ 已渲染 {} 页", sink.len());
        Ok(())
    }

    fn embedded_images(&self, path: &Path) -> Result<Vec<EmbeddedImage>, PdfError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| PdfError::Open(format!("{:?}", e)))?;

        let mut images = Vec::new();
        for (page_index, page) in document.pages().iter().enumerate() {
            for object in page.objects().iter() {
                let Some(image_object) = object.as_image_object() else {
                    continue;
                };

                let image = image_object.get_raw_image().map_err(|e| PdfError::Image {
                    page: page_index + 1,
                    detail: format!("{:?}", e),
                })?;

                let native = native_jpeg(image_object).map_err(|e| PdfError::Image {
                    page: page_index + 1,
                    detail: format!("{:?}", e),
                })?;

                debug!(
                    "第 {} 页内嵌图片 → {}x{} px{}",
                    page_index + 1,
                    image.width(),
                    image.height(),
                    if native.is_some() { " (DCTDecode)" } else { "" }
                );
                images.push(EmbeddedImage { page_index, image, native });
            }
        }

        info!("共找到 {} 张内嵌图片", images.len());
        Ok(images)
    }
}

/// 仅有单一 DCTDecode 过滤器时，原始流就是完整的 JPEG 文件
fn native_jpeg(image_object: &PdfPageImageObject) -> Result<Option<NativeImage>, PdfiumError> {
    let filters = image_object.filters();
    if filters.len() != 1 || !filters.iter().all(|filter| filter.name() == JPEG_FILTER) {
        return Ok(None);
    }

    let data = image_object.get_raw_image_data()?;
    if data.is_empty() {
        return Ok(None);
    }

    Ok(Some(NativeImage {
        format: ImageFormat::Jpeg,
        data,
    }))
}
