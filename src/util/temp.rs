use std::path::{Path, PathBuf};

/// 请求级临时文件，离开作用域时删除
///
/// 删除失败只记 debug 日志，不向上传播；文件本就不存在（例如转换失败没有产物）也视为正常。
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// 把上传内容写到 `path` 并接管其生命周期
    pub async fn create(path: PathBuf, data: &[u8]) -> std::io::Result<Self> {
        // 先建 guard，写到一半失败也会被清理
        let guard = Self { path };
        tokio::fs::write(&guard.path, data).await?;
        Ok(guard)
    }

    /// 接管一个可能尚未生成的路径（外部进程的输出）
    pub fn adopt(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    // 同步删除：guard 离开作用域后文件必须已不存在
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("已删除临时文件: {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::debug!("删除临时文件失败 {}: {}", self.path.display(), e),
        }
    }
}
