use axum::body::Bytes;
use axum::extract::Multipart;
use std::collections::HashMap;
use crate::error::{AppError, AppResult};

pub const FILE_FIELD: &str = "file";

#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub data: Bytes,
}

/// multipart 表单：上传文件加其余文本字段
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<Upload>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == FILE_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                form.file = Some(Upload { file_name, data });
            } else if !name.is_empty() {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn take_file(&mut self) -> AppResult<Upload> {
        self.file
            .take()
            .ok_or_else(|| AppError::Validation("file is required".to_string()))
    }
}
