//! 文件传输模块
//!
//! 包含:
//! - 上传/下载接口的数据格式
//! - HTTP 客户端（multipart 上传、按 ID 下载）
//! - 上传进度上报
//! - 下载内容落盘

pub mod artifact;
pub mod client;
pub mod progress;
pub mod protocol;

pub use artifact::{DownloadOutcome, retrieve, save_binary, save_text};
pub use client::{ShareClient, UploadRequest};
pub use progress::{NoProgress, ProgressMode, UploadProgressCallback, percent};
pub use protocol::{DownloadArtifact, TextArtifact, UploadRecord, UploadResponse};
