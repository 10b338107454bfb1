use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 1 毫米对应的 twips 数（1 twip = 1/1440 英寸）
pub const TWIPS_PER_MM: f64 = 56.7;

/// 允许上传的文档扩展名
pub const ALLOWED_INPUT_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    Pdf,
    Doc,
    Docx,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Pdf => "pdf",
            TargetFormat::Doc => "doc",
            TargetFormat::Docx => "docx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            TargetFormat::Pdf => "application/pdf",
            TargetFormat::Doc => "application/msword",
            TargetFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    pub fn download_name(&self) -> String {
        format!("converted.{}", self.extension())
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(TargetFormat::Pdf),
            "doc" => Ok(TargetFormat::Doc),
            "docx" => Ok(TargetFormat::Docx),
            other => Err(format!(
                "Unsupported target format '{}', expected one of: pdf, doc, docx",
                other
            )),
        }
    }
}

/// 页边距覆盖（毫米）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Margins {
    pub top: Option<f64>,
    pub bottom: Option<f64>,
    pub left: Option<f64>,
    pub right: Option<f64>,
}

/// 写入 `--writer-filter-options` 的 JSON 对象，单位 twips
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct MarginFilterOptions {
    #[serde(rename = "MargTop", skip_serializing_if = "Option::is_none")]
    pub top: Option<i64>,
    #[serde(rename = "MargBottom", skip_serializing_if = "Option::is_none")]
    pub bottom: Option<i64>,
    #[serde(rename = "MargLeft", skip_serializing_if = "Option::is_none")]
    pub left: Option<i64>,
    #[serde(rename = "MargRight", skip_serializing_if = "Option::is_none")]
    pub right: Option<i64>,
}

pub fn mm_to_twips(mm: f64) -> i64 {
    (mm * TWIPS_PER_MM).trunc() as i64
}

impl Margins {
    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.bottom.is_none() && self.left.is_none() && self.right.is_none()
    }

    /// 从查询参数解析，非数字、负数或非有限值均视为非法
    pub fn parse(
        top: Option<&str>,
        bottom: Option<&str>,
        left: Option<&str>,
        right: Option<&str>,
    ) -> Result<Self, String> {
        Ok(Self {
            top: parse_margin("margin_top", top)?,
            bottom: parse_margin("margin_bottom", bottom)?,
            left: parse_margin("margin_left", left)?,
            right: parse_margin("margin_right", right)?,
        })
    }

    pub fn to_filter_options(&self) -> MarginFilterOptions {
        MarginFilterOptions {
            top: self.top.map(mm_to_twips),
            bottom: self.bottom.map(mm_to_twips),
            left: self.left.map(mm_to_twips),
            right: self.right.map(mm_to_twips),
        }
    }
}

fn parse_margin(name: &str, raw: Option<&str>) -> Result<Option<f64>, String> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(Some(value)),
        _ => Err(format!("Invalid {} '{}': expected a non-negative number of millimeters", name, raw)),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertOptions {
    pub margins: Margins,
}

impl ConvertOptions {
    /// 页边距仅在导出 PDF 时生效，返回序列化后的 filter options
    pub fn writer_filter_options(&self, target: TargetFormat) -> Option<String> {
        if target != TargetFormat::Pdf || self.margins.is_empty() {
            return None;
        }
        serde_json::to_string(&self.margins.to_filter_options()).ok()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertQuery {
    pub to: Option<String>,
    pub margin_top: Option<String>,
    pub margin_bottom: Option<String>,
    pub margin_left: Option<String>,
    pub margin_right: Option<String>,
}

impl ConvertQuery {
    pub fn margins(&self) -> Result<Margins, String> {
        Margins::parse(
            self.margin_top.as_deref(),
            self.margin_bottom.as_deref(),
            self.margin_left.as_deref(),
            self.margin_right.as_deref(),
        )
    }
}
