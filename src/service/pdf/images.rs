use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use crate::model::image::{ImageArtifact, ImageFormat, JPEG_QUALITY, PDF_POINTS_PER_INCH};
use super::{PdfEngine, PdfError};

/// 逐页编码：每收到一页位图立即压缩成 artifact，位图随即释放
#[derive(Debug)]
pub struct PageEncoder {
    format: ImageFormat,
    artifacts: Vec<ImageArtifact>,
}

impl PageEncoder {
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            artifacts: Vec::new(),
        }
    }

    pub fn push(&mut self, page: DynamicImage) -> Result<(), PdfError> {
        let rgb = DynamicImage::ImageRgb8(page.into_rgb8());
        let artifact = to_artifact(self.artifacts.len(), &rgb, self.format, None)?;
        self.artifacts.push(artifact);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    fn finish(self) -> Result<Vec<ImageArtifact>, PdfError> {
        if self.is_empty() {
            return Err(PdfError::NoPages);
        }
        Ok(self.artifacts)
    }
}

/// 按 DPI 渲染每一页；空文档视为错误而不是空结果
pub fn render_pages(
    engine: &dyn PdfEngine,
    path: &Path,
    dpi: u32,
    format: ImageFormat,
) -> Result<Vec<ImageArtifact>, PdfError> {
    let scale = dpi as f32 / PDF_POINTS_PER_INCH;
    let mut encoder = PageEncoder::new(format);
    engine.render_pages(path, scale, &mut encoder)?;
    encoder.finish()
}

/// 提取所有内嵌图片，序号跨页递增；一张都没有时返回 `NoImages`
///
/// 内嵌流格式与请求一致时原样输出，否则重新编码。
pub fn extract_images(
    engine: &dyn PdfEngine,
    path: &Path,
    format: ImageFormat,
) -> Result<Vec<ImageArtifact>, PdfError> {
    let embedded = engine.embedded_images(path)?;
    if embedded.is_empty() {
        return Err(PdfError::NoImages);
    }

    embedded
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let page = Some(item.page_index + 1);
            match item.native {
                Some(native) if native.format == format => Ok(ImageArtifact {
                    index,
                    data: STANDARD.encode(&native.data),
                    format,
                    width: item.image.width(),
                    height: item.image.height(),
                    page,
                }),
                _ => to_artifact(index, &item.image, format, page),
            }
        })
        .collect()
}

fn to_artifact(
    index: usize,
    image: &DynamicImage,
    format: ImageFormat,
    page: Option<usize>,
) -> Result<ImageArtifact, PdfError> {
    let bytes = encode_image(image, format)?;
    Ok(ImageArtifact {
        index,
        data: STANDARD.encode(&bytes),
        format,
        width: image.width(),
        height: image.height(),
        page,
    })
}

/// PNG 原样编码；JPEG 先把透明通道合成到白底再以固定质量压缩
pub fn encode_image(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Png => {
            image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        }
        ImageFormat::Jpeg => {
            let rgb = flatten_onto_white(image);
            JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(&rgb)?;
        }
    }
    Ok(buf)
}

fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        rgb.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    rgb
}
