//! 上传/下载界面控制器
//!
//! 持有界面的全部可变状态：当前分区、待上传文件、加载遮罩和进度、
//! 结果和状态文字、文本预览。只由 UI 所在的任务修改；网络操作在别处执行，
//! 通过 `begin_*` / `finish_*` 与控制器交互。
//!
//! 无论成功、HTTP 错误还是网络错误，`finish_upload` 都会隐藏加载遮罩。

use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{Operation, Result, ShareError};
use crate::expiration::ExpirationPolicy;
use crate::staging::{StagedFile, StagedFiles};
use crate::transfer::{DownloadOutcome, TextArtifact, UploadRequest, UploadResponse, percent};

/// 下载成功提示在此之后自动清除
pub const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(3);

pub const MISSING_ID_MESSAGE: &str = "Please enter a file ID";
pub const DOWNLOADING_MESSAGE: &str = "Downloading...";
pub const DOWNLOAD_SUCCESS_MESSAGE: &str = "Download successful!";
pub const DOWNLOAD_ERROR_MESSAGE: &str = "Error downloading file";
pub const NO_IDS_MESSAGE: &str = "Upload finished, but the server returned no IDs";

/// 互斥的两个分区
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    #[default]
    Upload,
    Download,
}

impl Section {
    pub fn other(&self) -> Self {
        match self {
            Section::Upload => Section::Download,
            Section::Download => Section::Upload,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Section::Upload => "Upload",
            Section::Download => "Download",
        }
    }
}

/// 加载遮罩
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadingOverlay {
    pub visible: bool,
    pub percent: u8,
}

impl LoadingOverlay {
    fn show(&mut self) {
        self.visible = true;
        self.percent = 0;
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    pub fn label(&self) -> String {
        format!("Uploading... {}%", self.percent)
    }
}

/// 正在预览的文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPreview {
    pub content: String,
    pub filename: Option<String>,
}

impl From<TextArtifact> for TextPreview {
    fn from(text: TextArtifact) -> Self {
        Self {
            content: text.content,
            filename: text.filename,
        }
    }
}

impl From<TextPreview> for TextArtifact {
    fn from(preview: TextPreview) -> Self {
        Self {
            content: preview.content,
            filename: preview.filename,
        }
    }
}

/// 界面控制器
#[derive(Debug, Default)]
pub struct ShareController {
    section: Section,

    staged: StagedFiles,
    text_input: String,
    expiration: ExpirationPolicy,
    upload_in_flight: bool,
    overlay: LoadingOverlay,
    upload_result: Vec<String>,

    download_id: String,
    download_in_flight: bool,
    download_status: String,
    status_clear_at: Option<Instant>,
    preview: Option<TextPreview>,
}

impl ShareController {
    pub fn new(expiration: ExpirationPolicy) -> Self {
        Self {
            expiration,
            ..Default::default()
        }
    }

    // ---- 分区切换 ----

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn show_section(&mut self, section: Section) {
        self.section = section;
    }

    pub fn toggle_section(&mut self) {
        self.section = self.section.other();
    }

    pub fn is_active(&self, section: Section) -> bool {
        self.section == section
    }

    // ---- 文件选择 ----

    pub fn staged(&self) -> &StagedFiles {
        &self.staged
    }

    /// 文件选择器选中的文件追加到列表
    pub fn add_files(&mut self, incoming: impl IntoIterator<Item = StagedFile>) {
        self.staged.add_files(incoming);
    }

    /// 拖放的文件替换当前列表
    pub fn drop_files(&mut self, incoming: impl IntoIterator<Item = StagedFile>) {
        self.staged.replace_with(incoming);
    }

    pub fn remove_file(&mut self, index: usize) -> Option<StagedFile> {
        self.staged.remove_file(index)
    }

    pub fn rendered_files(&self) -> Vec<String> {
        self.staged.render()
    }

    pub fn text_input(&self) -> &str {
        &self.text_input
    }

    pub fn text_input_mut(&mut self) -> &mut String {
        &mut self.text_input
    }

    pub fn expiration(&self) -> &ExpirationPolicy {
        &self.expiration
    }

    pub fn set_expiration(&mut self, expiration: ExpirationPolicy) {
        self.expiration = expiration;
    }

    pub fn cycle_expiration(&mut self) {
        self.expiration = self.expiration.next();
    }

    // ---- 上传 ----

    pub fn is_uploading(&self) -> bool {
        self.upload_in_flight
    }

    pub fn overlay(&self) -> LoadingOverlay {
        self.overlay
    }

    pub fn upload_result(&self) -> &[String] {
        &self.upload_result
    }

    /// 开始上传：显示遮罩（0%）并返回要提交的内容
    ///
    /// 已有上传进行中时拒绝，不产生新的请求。
    pub fn begin_upload(&mut self) -> Result<UploadRequest> {
        if self.upload_in_flight {
            let err = ShareError::Busy(Operation::Upload);
            self.upload_result = vec![err.to_string()];
            return Err(err);
        }

        let request = UploadRequest::new(&self.staged, &self.text_input, self.expiration.clone());
        self.upload_in_flight = true;
        self.upload_result.clear();
        self.overlay.show();
        Ok(request)
    }

    pub fn on_upload_progress(&mut self, sent: u64, total: u64) {
        if self.upload_in_flight {
            self.overlay.percent = percent(sent, total);
        }
    }

    /// 上传结束，无论结果如何都隐藏遮罩
    pub fn finish_upload(&mut self, result: Result<UploadResponse>) {
        self.overlay.hide();
        self.upload_in_flight = false;

        self.upload_result = match result {
            Ok(response) if response.uploads.is_empty() => vec![NO_IDS_MESSAGE.to_string()],
            Ok(response) => response.uploads.iter().map(|u| u.summary()).collect(),
            Err(e) => vec![format!("Error uploading: {}", e)],
        };
    }

    // ---- 下载 ----

    pub fn download_id(&self) -> &str {
        &self.download_id
    }

    pub fn download_id_mut(&mut self) -> &mut String {
        &mut self.download_id
    }

    pub fn is_downloading(&self) -> bool {
        self.download_in_flight
    }

    pub fn download_status(&self) -> &str {
        &self.download_status
    }

    /// 校验 ID 并开始下载，返回去除空白后的 ID
    ///
    /// ID 为空时直接给出提示，不发出请求。
    pub fn begin_download(&mut self) -> Result<String> {
        if self.download_in_flight {
            let err = ShareError::Busy(Operation::Download);
            self.download_status = err.to_string();
            return Err(err);
        }

        let id = self.download_id.trim().to_string();
        self.status_clear_at = None;
        if id.is_empty() {
            self.download_status = MISSING_ID_MESSAGE.to_string();
            return Err(ShareError::MissingId);
        }

        self.download_in_flight = true;
        self.download_status = DOWNLOADING_MESSAGE.to_string();
        Ok(id)
    }

    /// 下载结束
    pub fn finish_download(&mut self, result: Result<DownloadOutcome>, now: Instant) {
        self.download_in_flight = false;
        self.status_clear_at = None;

        match result {
            Ok(DownloadOutcome::Saved(_)) => {
                self.download_status = DOWNLOAD_SUCCESS_MESSAGE.to_string();
                self.status_clear_at = Some(now + STATUS_CLEAR_DELAY);
            }
            Ok(DownloadOutcome::Text(text)) => {
                self.preview = Some(text.into());
                self.download_status.clear();
            }
            Err(e) => {
                self.download_status = download_error_message(&e);
            }
        }
    }

    /// 到期后清除状态文字
    pub fn tick(&mut self, now: Instant) {
        if let Some(deadline) = self.status_clear_at
            && now >= deadline
        {
            self.download_status.clear();
            self.status_clear_at = None;
        }
    }

    // ---- 文本预览 ----

    pub fn preview(&self) -> Option<&TextPreview> {
        self.preview.as_ref()
    }

    pub fn close_preview(&mut self) {
        self.preview = None;
    }

    /// 取出预览内容用于保存，同时关闭预览
    pub fn take_preview(&mut self) -> Option<TextPreview> {
        self.preview.take()
    }

    /// 预览内容保存结束
    pub fn finish_preview_save(&mut self, result: Result<PathBuf>, now: Instant) {
        match result {
            Ok(path) => {
                self.download_status = format!("Saved to {}", path.display());
                self.status_clear_at = Some(now + STATUS_CLEAR_DELAY);
            }
            Err(e) => {
                self.download_status = format!("Error saving text: {}", e);
                self.status_clear_at = None;
            }
        }
    }
}

/// 下载失败时显示的文字：服务端消息原样显示，否则使用通用提示
pub fn download_error_message(error: &ShareError) -> String {
    match error {
        ShareError::MissingId | ShareError::Busy(_) => error.to_string(),
        _ => error
            .server_message()
            .map(str::to_string)
            .unwrap_or_else(|| DOWNLOAD_ERROR_MESSAGE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::UploadRecord;
    use reqwest::StatusCode;

    fn upload_ok(records: Vec<UploadRecord>) -> Result<UploadResponse> {
        Ok(UploadResponse { uploads: records })
    }

    #[test]
    fn test_section_toggle_is_exclusive() {
        let mut controller = ShareController::default();
        assert!(controller.is_active(Section::Upload));
        assert!(!controller.is_active(Section::Download));

        controller.show_section(Section::Download);
        assert!(controller.is_active(Section::Download));
        assert!(!controller.is_active(Section::Upload));

        controller.toggle_section();
        assert_eq!(controller.section(), Section::Upload);
    }

    #[test]
    fn test_upload_result_contains_id() {
        let mut controller = ShareController::default();
        controller.begin_upload().unwrap();
        controller.finish_upload(upload_ok(vec![UploadRecord {
            message: "ok".to_string(),
            file_id: Some("abc123".to_string()),
            text_id: None,
        }]));

        assert!(controller.upload_result().join("\n").contains("abc123"));
        assert!(!controller.overlay().visible);
    }

    #[test]
    fn test_upload_progress_then_hidden() {
        let mut controller = ShareController::default();
        controller.add_files([StagedFile::from_bytes("a.bin", vec![0u8; 10])]);

        let request = controller.begin_upload().unwrap();
        assert_eq!(request.files.len(), 1);
        assert!(controller.overlay().visible);
        assert_eq!(controller.overlay().percent, 0);

        controller.on_upload_progress(5, 10);
        assert_eq!(controller.overlay().percent, 50);
        assert_eq!(controller.overlay().label(), "Uploading... 50%");
        controller.on_upload_progress(10, 10);
        assert_eq!(controller.overlay().percent, 100);

        controller.finish_upload(upload_ok(vec![]));
        assert!(!controller.overlay().visible);
        assert_eq!(controller.upload_result(), [NO_IDS_MESSAGE]);
    }

    #[test]
    fn test_upload_failure_hides_overlay() {
        let mut controller = ShareController::default();
        controller.begin_upload().unwrap();
        controller.finish_upload(Err(ShareError::Http {
            status: StatusCode::BAD_REQUEST,
            message: Some("Invalid expiration policy".to_string()),
        }));

        assert!(!controller.overlay().visible);
        assert!(!controller.is_uploading());
        assert_eq!(
            controller.upload_result(),
            ["Error uploading: Invalid expiration policy"]
        );
    }

    #[test]
    fn test_second_upload_is_rejected_while_in_flight() {
        let mut controller = ShareController::default();
        controller.begin_upload().unwrap();
        assert!(matches!(
            controller.begin_upload(),
            Err(ShareError::Busy(Operation::Upload))
        ));
        assert_eq!(
            controller.upload_result(),
            ["An upload is already in progress"]
        );
        assert!(controller.overlay().visible);

        controller.finish_upload(upload_ok(vec![]));
        assert!(controller.begin_upload().is_ok());
    }

    #[test]
    fn test_progress_ignored_when_idle() {
        let mut controller = ShareController::default();
        controller.on_upload_progress(5, 10);
        assert_eq!(controller.overlay(), LoadingOverlay::default());
    }

    #[test]
    fn test_remove_file_keeps_list_and_submission_in_sync() {
        let mut controller = ShareController::default();
        controller.add_files(["a", "b", "c"].map(|n| StagedFile::from_bytes(n, n)));
        controller.remove_file(1);

        assert_eq!(controller.rendered_files(), ["📄 a", "📄 c"]);
        let request = controller.begin_upload().unwrap();
        let submitted: Vec<&str> = request.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(submitted, ["a", "c"]);
    }

    #[test]
    fn test_empty_download_id() {
        let mut controller = ShareController::default();
        *controller.download_id_mut() = "   ".to_string();

        assert!(matches!(
            controller.begin_download(),
            Err(ShareError::MissingId)
        ));
        assert_eq!(controller.download_status(), MISSING_ID_MESSAGE);
        assert!(!controller.is_downloading());
    }

    #[test]
    fn test_text_download_opens_preview() {
        let mut controller = ShareController::default();
        *controller.download_id_mut() = " T-1 ".to_string();
        assert_eq!(controller.begin_download().unwrap(), "T-1");
        assert_eq!(controller.download_status(), DOWNLOADING_MESSAGE);

        controller.finish_download(
            Ok(DownloadOutcome::Text(TextArtifact {
                content: "hello\nworld".to_string(),
                filename: Some("a.txt".to_string()),
            })),
            Instant::now(),
        );

        let preview = controller.preview().unwrap();
        assert_eq!(preview.content, "hello\nworld");
        assert_eq!(preview.filename.as_deref(), Some("a.txt"));
        assert_eq!(controller.download_status(), "");

        controller.close_preview();
        assert!(controller.preview().is_none());
    }

    #[test]
    fn test_take_preview_closes_it() {
        let mut controller = ShareController::default();
        *controller.download_id_mut() = "T-2".to_string();
        controller.begin_download().unwrap();
        controller.finish_download(
            Ok(DownloadOutcome::Text(TextArtifact {
                content: "x".to_string(),
                filename: None,
            })),
            Instant::now(),
        );

        let preview = controller.take_preview().unwrap();
        assert_eq!(TextArtifact::from(preview).file_name(), "shared-text.txt");
        assert!(controller.preview().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_message_clears_after_delay() {
        let mut controller = ShareController::default();
        *controller.download_id_mut() = "S3-ABC".to_string();
        controller.begin_download().unwrap();
        controller.finish_download(
            Ok(DownloadOutcome::Saved(PathBuf::from("/tmp/a.bin"))),
            Instant::now(),
        );
        assert_eq!(controller.download_status(), DOWNLOAD_SUCCESS_MESSAGE);

        tokio::time::advance(Duration::from_millis(2900)).await;
        controller.tick(Instant::now());
        assert_eq!(controller.download_status(), DOWNLOAD_SUCCESS_MESSAGE);

        tokio::time::advance(Duration::from_millis(200)).await;
        controller.tick(Instant::now());
        assert_eq!(controller.download_status(), "");
    }

    #[test]
    fn test_download_error_messages() {
        let mut controller = ShareController::default();
        *controller.download_id_mut() = "nope".to_string();

        controller.begin_download().unwrap();
        controller.finish_download(
            Err(ShareError::Http {
                status: StatusCode::NOT_FOUND,
                message: Some("File not found".to_string()),
            }),
            Instant::now(),
        );
        assert_eq!(controller.download_status(), "File not found");

        controller.begin_download().unwrap();
        controller.finish_download(
            Err(ShareError::Server("File has expired".to_string())),
            Instant::now(),
        );
        assert_eq!(controller.download_status(), "File has expired");

        controller.begin_download().unwrap();
        controller.finish_download(
            Err(ShareError::Http {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: None,
            }),
            Instant::now(),
        );
        assert_eq!(controller.download_status(), DOWNLOAD_ERROR_MESSAGE);
        assert!(!controller.is_downloading());
    }

    #[test]
    fn test_second_download_is_rejected_while_in_flight() {
        let mut controller = ShareController::default();
        *controller.download_id_mut() = "abc".to_string();
        controller.begin_download().unwrap();
        assert!(matches!(
            controller.begin_download(),
            Err(ShareError::Busy(Operation::Download))
        ));
        assert_eq!(
            controller.download_status(),
            "A download is already in progress"
        );
        assert!(controller.is_downloading());

        // 进行中的下载结束后照常更新状态
        controller.finish_download(
            Err(ShareError::Server("File has expired".into())),
            Instant::now(),
        );
        assert_eq!(controller.download_status(), "File has expired");
    }
}
