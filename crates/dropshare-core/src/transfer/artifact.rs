//! 下载内容的落盘
//!
//! 文件先写入目标目录下的临时 `.part` 文件，完成后再改名。
//! 任何失败路径上临时文件都会被删除。已存在的同名文件不会被覆盖，
//! 依次尝试 `name (1).ext`、`name (2).ext` ……

use log::{debug, info};

use crate::error::Result;
use crate::transfer::client::ShareClient;
use crate::transfer::protocol::{DEFAULT_DOWNLOAD_NAME, DownloadArtifact, TextArtifact};
use std::path::{Path, PathBuf};

/// 一次下载的最终结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// 文件已保存到该路径
    Saved(PathBuf),
    /// 文本内容，交给预览显示
    Text(TextArtifact),
}

/// 下载并处理结果：文件直接保存到 `dir`，文本原样返回
pub async fn retrieve(client: &ShareClient, id: &str, dir: &Path) -> Result<DownloadOutcome> {
    match client.download(id).await? {
        DownloadArtifact::Binary { filename, data } => {
            let path = save_binary(dir, &filename, &data).await?;
            Ok(DownloadOutcome::Saved(path))
        }
        DownloadArtifact::Text(text) => Ok(DownloadOutcome::Text(text)),
    }
}

/// 保存文本内容
pub async fn save_text(dir: &Path, text: &TextArtifact) -> Result<PathBuf> {
    save_binary(dir, text.file_name(), text.content.as_bytes()).await
}

/// 保存文件内容，返回最终路径
pub async fn save_binary(dir: &Path, filename: &str, data: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let name = safe_file_name(filename);
    let target = unique_target(dir, &name).await?;
    let partial = dir.join(format!(".{}.part", name));

    // 未成功改名前退出时删除临时文件
    let guard = scopeguard::guard(partial, |path| {
        if std::fs::remove_file(&path).is_ok() {
            debug!("Removed partial file {:?}", path);
        }
    });

    tokio::fs::write(&*guard, data).await?;
    tokio::fs::rename(&*guard, &target).await?;
    scopeguard::ScopeGuard::into_inner(guard);

    info!("Saved {} byte(s) to {:?}", data.len(), target);
    Ok(target)
}

/// 只保留最后一个路径组件，防止写到目标目录之外
pub fn safe_file_name(filename: &str) -> String {
    let normalized = filename.replace('\\', "/");
    Path::new(&normalized)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string())
}

async fn unique_target(dir: &Path, name: &str) -> Result<PathBuf> {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());
    let extension = path.extension().map(|e| e.to_string_lossy().to_string());

    let mut n = 1u32;
    loop {
        let numbered = match &extension {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = dir.join(numbered);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("report.pdf"), "report.pdf");
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name("C:\\Users\\me\\notes.txt"), "notes.txt");
        assert_eq!(safe_file_name(".."), DEFAULT_DOWNLOAD_NAME);
        assert_eq!(safe_file_name(""), DEFAULT_DOWNLOAD_NAME);
    }

    #[tokio::test]
    async fn test_save_binary_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();

        let first = save_binary(dir.path(), "data.bin", b"one").await.unwrap();
        let second = save_binary(dir.path(), "data.bin", b"two").await.unwrap();
        let third = save_binary(dir.path(), "data.bin", b"three").await.unwrap();

        assert_eq!(first, dir.path().join("data.bin"));
        assert_eq!(second, dir.path().join("data (1).bin"));
        assert_eq!(third, dir.path().join("data (2).bin"));
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&third).unwrap(), b"three");
    }

    #[tokio::test]
    async fn test_save_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        save_binary(dir.path(), "a.txt", b"hello").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_write_failure_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        // 临时文件位置被目录占用，写入失败
        std::fs::create_dir(dir.path().join(".x.bin.part")).unwrap();

        let result = save_binary(dir.path(), "x.bin", b"data").await;
        assert!(matches!(result, Err(crate::ShareError::Io(_))));
        assert!(!dir.path().join("x.bin").exists());
    }

    #[tokio::test]
    async fn test_save_text_uses_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let text = TextArtifact {
            content: "line 1\n  line 2\n".to_string(),
            filename: None,
        };
        let path = save_text(dir.path(), &text).await.unwrap();
        assert_eq!(path, dir.path().join("shared-text.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "line 1\n  line 2\n");
    }
}
