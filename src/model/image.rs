use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// PDF 的原生参考分辨率
pub const PDF_POINTS_PER_INCH: f32 = 72.0;

pub const JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageMode {
    /// 逐页栅格化
    #[default]
    Pages,
    /// 提取内嵌图片
    Extract,
}

impl FromStr for ImageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pages" => Ok(ImageMode::Pages),
            "extract" => Ok(ImageMode::Extract),
            other => Err(format!("Invalid mode '{}', expected 'pages' or 'extract'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            other => Err(format!("Invalid format '{}', expected 'png' or 'jpeg'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageArtifact {
    pub index: usize,
    /// base64 编码后的图片字节
    pub data: String,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// 来源页码（从 1 开始），仅 extract 模式输出
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImagesResponse {
    pub images: Vec<ImageArtifact>,
    pub count: usize,
}

impl From<Vec<ImageArtifact>> for ImagesResponse {
    fn from(images: Vec<ImageArtifact>) -> Self {
        let count = images.len();
        Self { images, count }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PdfImagesQuery {
    pub mode: Option<String>,
    pub format: Option<String>,
    pub dpi: Option<String>,
}

/// 校验后的 `/pdf-images` 参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfImagesParams {
    pub mode: ImageMode,
    pub format: ImageFormat,
    pub dpi: u32,
}

impl PdfImagesQuery {
    pub fn validate(&self, default_dpi: u32, max_dpi: u32) -> Result<PdfImagesParams, String> {
        let mode = match non_blank(self.mode.as_deref()) {
            Some(raw) => raw.parse::<ImageMode>()?,
            None => ImageMode::default(),
        };
        let format = match non_blank(self.format.as_deref()) {
            Some(raw) => raw.parse::<ImageFormat>()?,
            None => ImageFormat::default(),
        };
        let dpi = match non_blank(self.dpi.as_deref()) {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|dpi| (1..=max_dpi).contains(dpi))
                .ok_or_else(|| format!("Invalid dpi '{}', expected an integer between 1 and {}", raw, max_dpi))?,
            None => default_dpi,
        };

        Ok(PdfImagesParams { mode, format, dpi })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_defaults() {
        let params = PdfImagesQuery::default().validate(150, 600).unwrap();
        assert_eq!(
            params,
            PdfImagesParams { mode: ImageMode::Pages, format: ImageFormat::Png, dpi: 150 }
        );
    }

    #[test]
    fn query_parses_all_fields() {
        let query = PdfImagesQuery {
            mode: Some("Extract".into()),
            format: Some("jpg".into()),
            dpi: Some("300".into()),
        };
        let params = query.validate(150, 600).unwrap();
        assert_eq!(params.mode, ImageMode::Extract);
        assert_eq!(params.format, ImageFormat::Jpeg);
        assert_eq!(params.dpi, 300);
    }

    #[test]
    fn query_rejects_bad_values() {
        let bad_mode = PdfImagesQuery { mode: Some("thumbnails".into()), ..Default::default() };
        assert!(bad_mode.validate(150, 600).is_err());

        let bad_format = PdfImagesQuery { format: Some("gif".into()), ..Default::default() };
        assert!(bad_format.validate(150, 600).is_err());

        for dpi in ["0", "601", "-5", "abc", "72.5"] {
            let query = PdfImagesQuery { dpi: Some(dpi.into()), ..Default::default() };
            assert!(query.validate(150, 600).is_err(), "dpi {dpi} should be rejected");
        }
    }

    #[test]
    fn artifact_serialization_omits_missing_page() {
        let artifact = ImageArtifact {
            index: 0,
            data: "AAAA".into(),
            format: ImageFormat::Jpeg,
            width: 10,
            height: 20,
            page: None,
        };
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["format"], "jpeg");
        assert!(json.get("page").is_none());

        let response = ImagesResponse::from(vec![artifact]);
        assert_eq!(response.count, 1);
    }
}
