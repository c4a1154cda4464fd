//! 待上传文件集合
//!
//! 文件列表的显示内容和实际提交的内容来自同一个 `StagedFiles`，
//! 任意增删之后两者都保持一致。

use std::path::{Path, PathBuf};

/// 文件内容来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// 磁盘上的文件，上传时才读取
    Path(PathBuf),
    /// 内存中的内容
    Memory(Vec<u8>),
}

/// 单个待上传文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub name: String,
    pub source: FileSource,
    /// 添加时记录的大小，磁盘文件无法读取元数据时为 `None`
    pub size: Option<u64>,
}

impl StagedFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let size = std::fs::metadata(&path).ok().map(|m| m.len());

        Self {
            name,
            source: FileSource::Path(path),
            size,
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: Some(bytes.len() as u64),
            source: FileSource::Memory(bytes),
        }
    }

    /// 根据文件名猜测 MIME 类型
    pub fn mime_type(&self) -> String {
        mime_guess::from_path(Path::new(&self.name))
            .first_or_octet_stream()
            .to_string()
    }
}

/// 有序的待上传文件集合，允许同名文件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedFiles {
    files: Vec<StagedFile>,
}

impl StagedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加文件（文件选择器）
    pub fn add_files(&mut self, incoming: impl IntoIterator<Item = StagedFile>) {
        self.files.extend(incoming);
    }

    /// 用拖放的文件替换当前集合
    pub fn replace_with(&mut self, incoming: impl IntoIterator<Item = StagedFile>) {
        self.files = incoming.into_iter().collect();
    }

    /// 删除指定位置的文件，其余文件保持原有顺序
    pub fn remove_file(&mut self, index: usize) -> Option<StagedFile> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StagedFile> {
        self.files.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StagedFile> {
        self.files.iter()
    }

    pub fn as_slice(&self) -> &[StagedFile] {
        &self.files
    }

    /// 已知大小之和
    pub fn total_size(&self) -> u64 {
        self.files.iter().filter_map(|f| f.size).sum()
    }

    /// 列表的显示内容，每个文件一行
    pub fn render(&self) -> Vec<String> {
        self.files.iter().map(|f| format!("📄 {}", f.name)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged(names: &[&str]) -> StagedFiles {
        let mut files = StagedFiles::new();
        files.add_files(names.iter().map(|n| StagedFile::from_bytes(*n, n.as_bytes())));
        files
    }

    fn names(files: &StagedFiles) -> Vec<&str> {
        files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_add_keeps_order_and_duplicates() {
        let mut files = staged(&["a.txt", "b.txt"]);
        files.add_files([StagedFile::from_bytes("a.txt", "again")]);
        assert_eq!(names(&files), ["a.txt", "b.txt", "a.txt"]);
    }

    #[test]
    fn test_remove_preserves_relative_order() {
        for i in 0..4 {
            let mut files = staged(&["a", "b", "c", "d"]);
            let removed = files.remove_file(i).unwrap();

            let mut expected = vec!["a", "b", "c", "d"];
            assert_eq!(removed.name, expected.remove(i));
            assert_eq!(names(&files), expected);

            // 提交内容与显示内容一致
            let rendered: Vec<String> = expected.iter().map(|n| format!("📄 {}", n)).collect();
            assert_eq!(files.render(), rendered);
        }
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut files = staged(&["a"]);
        assert!(files.remove_file(1).is_none());
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_replace_with_dropped_files() {
        let mut files = staged(&["a", "b"]);
        files.replace_with([StagedFile::from_bytes("c", "c")]);
        assert_eq!(names(&files), ["c"]);
        assert_eq!(files.total_size(), 1);
    }

    #[test]
    fn test_from_path_reads_name_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"12345").unwrap();

        let file = StagedFile::from_path(&path);
        assert_eq!(file.name, "report.pdf");
        assert_eq!(file.size, Some(5));
        assert_eq!(file.mime_type(), "application/pdf");
    }
}
