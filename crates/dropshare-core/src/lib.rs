//! DropShare Core Library
//!
//! 文件/文本分享服务的客户端实现：暂存待上传文件、提交 multipart 上传并上报进度、
//! 按 ID 取回内容（文件直接保存，文本进入预览）。
//!
//! # 模块
//!
//! - **staging**: 待上传文件集合
//! - **expiration**: 过期策略
//! - **transfer**: HTTP 客户端、数据格式、上传进度、下载落盘
//! - **controller**: 界面状态控制器（分区、遮罩、结果、预览）
//! - **config**: 客户端设置
//! - **logging**: 日志级别与日志缓冲区
//!
//! # 使用示例
//!
//! ## 上传
//!
//! ```ignore
//! use dropshare_core::{ShareClient, ShareController, StagedFile, NoProgress};
//!
//! let client = ShareClient::new("http://127.0.0.1:8000")?;
//! let mut controller = ShareController::default();
//! controller.add_files([StagedFile::from_path("report.pdf")]);
//!
//! let request = controller.begin_upload()?;
//! let result = client.upload(&request, Arc::new(NoProgress)).await;
//! controller.finish_upload(result);
//! println!("{}", controller.upload_result().join("\n"));
//! ```
//!
//! ## 下载
//!
//! ```ignore
//! use dropshare_core::transfer::{retrieve, DownloadOutcome};
//!
//! match retrieve(&client, "S3-ABC123", &download_dir).await? {
//!     DownloadOutcome::Saved(path) => println!("saved to {:?}", path),
//!     DownloadOutcome::Text(text) => println!("{}", text.content),
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod expiration;
pub mod logging;
pub mod staging;
pub mod transfer;

pub use config::ClientSettings;
pub use controller::{LoadingOverlay, Section, ShareController, TextPreview};
pub use error::{Operation, Result, ShareError};
pub use expiration::ExpirationPolicy;
pub use logging::{LogBuffer, LogEntry, LogLevel};
pub use staging::{FileSource, StagedFile, StagedFiles};

// Transfer re-exports
pub use transfer::{
    DownloadArtifact, DownloadOutcome, NoProgress, ProgressMode, ShareClient, TextArtifact,
    UploadProgressCallback, UploadRecord, UploadRequest, UploadResponse,
};
