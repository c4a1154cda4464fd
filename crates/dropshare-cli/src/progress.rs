//! 终端进度行

use dropshare_core::UploadProgressCallback;
use dropshare_core::transfer::percent;
use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};

/// 在 stderr 上原地刷新的上传进度
pub struct ProgressLine {
    last: AtomicU8,
}

impl ProgressLine {
    pub fn new() -> Self {
        Self {
            last: AtomicU8::new(u8::MAX),
        }
    }

    /// 结束进度行
    pub fn finish(&self) {
        if self.last.load(Ordering::Relaxed) != u8::MAX {
            eprintln!();
        }
    }
}

impl UploadProgressCallback for ProgressLine {
    fn on_progress(&self, sent: u64, total: u64) {
        let p = percent(sent, total);
        // 百分比没变化时不重绘
        if self.last.swap(p, Ordering::Relaxed) == p {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r⏫ Uploading... {:>3}%", p);
        let _ = stderr.flush();
    }
}
