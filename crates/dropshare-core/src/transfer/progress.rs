//! 上传进度
//!
//! 两种进度上报方式：
//!
//! - **Milestones**: 固定的阶段性进度（发送前 50%，收到响应 90%，解析完成 100%）
//! - **Bytes**: 按实际发送的字节数上报，`sent / total`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 进度上报方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    Milestones,
    #[default]
    Bytes,
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "milestones" => Ok(ProgressMode::Milestones),
            "bytes" => Ok(ProgressMode::Bytes),
            other => Err(format!(
                "unknown progress mode '{}', expected 'bytes' or 'milestones'",
                other
            )),
        }
    }
}

impl fmt::Display for ProgressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressMode::Milestones => write!(f, "milestones"),
            ProgressMode::Bytes => write!(f, "bytes"),
        }
    }
}

/// 上传进度回调
pub trait UploadProgressCallback: Send + Sync {
    /// `sent` 不会超过 `total`；阶段性进度以 `total = 100` 上报
    fn on_progress(&self, sent: u64, total: u64);
}

impl<F> UploadProgressCallback for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn on_progress(&self, sent: u64, total: u64) {
        self(sent, total)
    }
}

/// 忽略所有进度
pub struct NoProgress;

impl UploadProgressCallback for NoProgress {
    fn on_progress(&self, _sent: u64, _total: u64) {}
}

/// 百分比，`total` 为 0 时为 0
pub fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (sent.min(total) as u128 * 100 / total as u128) as u8
}

/// 在多个文件流之间共享的字节计数器
pub(crate) struct ByteCounter<C: ?Sized> {
    sent: AtomicU64,
    total: u64,
    callback: Arc<C>,
}

impl<C: UploadProgressCallback + ?Sized> ByteCounter<C> {
    pub(crate) fn new(total: u64, callback: Arc<C>) -> Self {
        Self {
            sent: AtomicU64::new(0),
            total,
            callback,
        }
    }

    pub(crate) fn advance(&self, bytes: usize) {
        let sent = self.sent.fetch_add(bytes as u64, Ordering::SeqCst) + bytes as u64;
        self.callback.on_progress(sent.min(self.total), self.total);
    }

    pub(crate) fn total(&self) -> u64 {
        self.total
    }
}
