//! Application state

use dropshare_core::transfer::{retrieve, save_text};
use dropshare_core::{
    ClientSettings, DownloadOutcome, LogBuffer, LogEntry, LogLevel, Operation, Section,
    ShareClient, ShareController, ShareError, StagedFile, UploadResponse,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// 日志面板保留的条目数
const LOG_CAPACITY: usize = 500;

/// 后台任务和日志层发回 UI 循环的事件
#[derive(Debug)]
pub enum AppEvent {
    UploadProgress { sent: u64, total: u64 },
    UploadFinished(dropshare_core::Result<UploadResponse>),
    DownloadFinished(dropshare_core::Result<DownloadOutcome>),
    PreviewSaved(dropshare_core::Result<PathBuf>),
    LogMessage { level: String, message: String },
}

impl AppEvent {
    /// 任务没有给出结果就结束时补发的完成事件
    fn interrupted(operation: Operation) -> Self {
        let err = ShareError::Interrupted(operation);
        match operation {
            Operation::Upload => AppEvent::UploadFinished(Err(err)),
            Operation::Download => AppEvent::DownloadFinished(Err(err)),
        }
    }
}

/// 在后台执行 `work` 并把结果事件发回 UI 循环
///
/// 任务 panic 或被取消时，guard 补发 `operation` 的失败事件，
/// 控制器因此总能离开进行中状态。
pub fn spawn_guarded<F>(
    tx: mpsc::Sender<AppEvent>,
    operation: Operation,
    work: F,
) -> JoinHandle<()>
where
    F: Future<Output = AppEvent> + Send + 'static,
{
    // guard 在 spawn 之前创建，任务未被轮询就取消时同样触发
    let guard = scopeguard::guard(tx, move |tx| {
        let _ = tx.try_send(AppEvent::interrupted(operation));
    });

    tokio::spawn(async move {
        let event = work.await;
        let tx = scopeguard::ScopeGuard::into_inner(guard);
        let _ = tx.send(event).await;
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppMode {
    Normal,
    EditText,
    EditId,
    FileSelection,
    Settings,
}

/// 简单的目录浏览器
pub struct FileSelector {
    pub current_dir: PathBuf,
    pub entries: Vec<PathBuf>,
    pub selected: usize,
}

impl FileSelector {
    pub fn new(dir: PathBuf) -> Self {
        let mut selector = Self {
            current_dir: dir,
            entries: vec![],
            selected: 0,
        };
        selector.refresh();
        selector
    }

    /// 重新读取当前目录：上级目录在最前，然后是子目录和文件，各自按名称排序
    pub fn refresh(&mut self) {
        let mut dirs = vec![];
        let mut files = vec![];
        if let Ok(read_dir) = std::fs::read_dir(&self.current_dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    dirs.push(path);
                } else {
                    files.push(path);
                }
            }
        }
        dirs.sort();
        files.sort();

        self.entries.clear();
        if let Some(parent) = self.current_dir.parent() {
            self.entries.push(parent.to_path_buf());
        }
        self.entries.extend(dirs);
        self.entries.extend(files);
        self.selected = self.selected.min(self.entries.len().saturating_sub(1));
    }

    pub fn next(&mut self) {
        if !self.entries.is_empty() {
            self.selected = (self.selected + 1) % self.entries.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.entries.is_empty() {
            self.selected = self
                .selected
                .checked_sub(1)
                .unwrap_or(self.entries.len() - 1);
        }
    }

    /// 目录则进入并返回 `None`，文件则返回其路径
    pub fn enter(&mut self) -> Option<PathBuf> {
        let path = self.entries.get(self.selected)?.clone();
        if path.is_dir() {
            self.current_dir = path;
            self.selected = 0;
            self.refresh();
            None
        } else {
            Some(path)
        }
    }

    /// 列表中显示的名称
    pub fn display_name(&self, path: &Path) -> String {
        if Some(path) == self.current_dir.parent() {
            return "../".to_string();
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        if path.is_dir() {
            format!("{}/", name)
        } else {
            name
        }
    }
}

/// 解析粘贴（拖放到终端）的路径，每行一个，忽略不存在的文件
pub fn parse_dropped_paths(text: &str) -> Vec<PathBuf> {
    let mut paths = vec![];
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let candidate = unquote(line);
        if Path::new(&candidate).is_file() {
            paths.push(PathBuf::from(candidate));
            continue;
        }
        // 一行中有多个以空白分隔的路径
        paths.extend(
            line.split_whitespace()
                .map(unquote)
                .filter(|p| Path::new(p).is_file())
                .map(PathBuf::from),
        );
    }
    paths
}

fn unquote(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .trim_start_matches("file://");
    trimmed.replace("\\ ", " ")
}

pub struct App {
    pub controller: ShareController,
    pub settings: ClientSettings,
    client: Option<ShareClient>,
    pub mode: AppMode,
    pub file_selector: FileSelector,
    pub selected_file: usize,
    pub input_buffer: String,
    pub preview_scroll: u16,
    pub logs: LogBuffer,
    pub log_level: LogLevel,
    pub event_tx: mpsc::Sender<AppEvent>,
    event_rx: mpsc::Receiver<AppEvent>,
}

impl App {
    pub fn new(settings: ClientSettings) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        let start_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let mut app = Self {
            controller: ShareController::new(settings.expiration_policy.clone()),
            client: None,
            mode: AppMode::Normal,
            file_selector: FileSelector::new(start_dir),
            selected_file: 0,
            input_buffer: String::new(),
            preview_scroll: 0,
            logs: LogBuffer::new(LOG_CAPACITY),
            log_level: LogLevel::Info,
            event_tx,
            event_rx,
            settings,
        };
        app.rebuild_client();
        app.add_log(LogLevel::Info, "Dropshare TUI 启动");
        app.add_log(
            LogLevel::Info,
            "按 'a' 添加文件, Enter 上传, Tab 切换上传/下载, 'q' 退出",
        );
        app
    }

    pub fn add_log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.logs.push(LogEntry::new(level, message));
    }

    pub fn toggle_log_level(&mut self) {
        self.log_level = match self.log_level {
            LogLevel::Info => LogLevel::Debug,
            _ => LogLevel::Info,
        };
        let level = self.log_level;
        self.add_log(LogLevel::Info, format!("日志级别: {}", level));
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }

    /// 按当前设置重建 HTTP 客户端
    fn rebuild_client(&mut self) {
        match ShareClient::from_settings(&self.settings) {
            Ok(client) => self.client = Some(client),
            Err(e) => {
                self.client = None;
                self.add_log(LogLevel::Error, format!("服务地址无效: {}", e));
            }
        }
    }

    pub fn server_url(&self) -> &str {
        &self.settings.server_url
    }

    // ---- 上传分区 ----

    pub fn open_file_selector(&mut self) {
        self.file_selector.refresh();
        self.mode = AppMode::FileSelection;
    }

    /// 文件选择器中选中的文件追加到待上传列表
    pub fn stage_path(&mut self, path: PathBuf) {
        self.add_log(LogLevel::Info, format!("已添加: {}", path.display()));
        self.controller.add_files([StagedFile::from_path(path)]);
    }

    /// 拖放进终端的文件替换待上传列表
    pub fn drop_paths(&mut self, text: &str) {
        let paths = parse_dropped_paths(text);
        if paths.is_empty() {
            return;
        }
        self.add_log(LogLevel::Info, format!("拖入 {} 个文件", paths.len()));
        self.controller
            .drop_files(paths.into_iter().map(StagedFile::from_path));
        self.selected_file = 0;
    }

    pub fn next_file(&mut self) {
        let len = self.controller.staged().len();
        if len > 0 {
            self.selected_file = (self.selected_file + 1) % len;
        }
    }

    pub fn previous_file(&mut self) {
        let len = self.controller.staged().len();
        if len > 0 {
            self.selected_file = self.selected_file.checked_sub(1).unwrap_or(len - 1);
        }
    }

    pub fn remove_selected_file(&mut self) {
        if let Some(file) = self.controller.remove_file(self.selected_file) {
            self.add_log(LogLevel::Info, format!("已移除: {}", file.name));
        }
        let len = self.controller.staged().len();
        self.selected_file = self.selected_file.min(len.saturating_sub(1));
    }

    pub fn start_upload(&mut self) {
        let Some(client) = self.client.clone() else {
            self.add_log(LogLevel::Error, "没有可用的服务地址，按 's' 设置");
            return;
        };

        let request = match self.controller.begin_upload() {
            Ok(request) => request,
            Err(e) => {
                self.log_rejection(&e);
                return;
            }
        };

        let progress_tx = self.event_tx.clone();
        let progress = Arc::new(move |sent: u64, total: u64| {
            // 通道满时丢弃中间进度，完成事件不会丢
            let _ = progress_tx.try_send(AppEvent::UploadProgress { sent, total });
        });

        spawn_guarded(self.event_tx.clone(), Operation::Upload, async move {
            AppEvent::UploadFinished(client.upload(&request, progress).await)
        });
    }

    fn log_rejection(&mut self, error: &ShareError) {
        let level = if error.is_local() {
            LogLevel::Warn
        } else {
            LogLevel::Error
        };
        self.add_log(level, error.to_string());
    }

    // ---- 下载分区 ----

    pub fn start_download(&mut self) {
        let Some(client) = self.client.clone() else {
            self.add_log(LogLevel::Error, "没有可用的服务地址，按 's' 设置");
            return;
        };

        let id = match self.controller.begin_download() {
            Ok(id) => id,
            Err(e) => {
                self.log_rejection(&e);
                return;
            }
        };

        let dir = self.settings.download_dir.clone();
        spawn_guarded(self.event_tx.clone(), Operation::Download, async move {
            AppEvent::DownloadFinished(retrieve(&client, &id, &dir).await)
        });
    }

    /// 保存预览中的文本并关闭预览
    pub fn save_preview(&mut self) {
        let Some(preview) = self.controller.take_preview() else {
            return;
        };
        self.preview_scroll = 0;

        let dir = self.settings.download_dir.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = save_text(&dir, &preview.into()).await;
            let _ = tx.send(AppEvent::PreviewSaved(result)).await;
        });
    }

    pub fn close_preview(&mut self) {
        self.controller.close_preview();
        self.preview_scroll = 0;
    }

    // ---- 设置 ----

    pub fn open_settings(&mut self) {
        self.input_buffer = self.settings.server_url.clone();
        self.mode = AppMode::Settings;
    }

    /// 应用输入的服务地址，地址有效时写入配置文件
    pub fn apply_server_url(&mut self) {
        let url = self.input_buffer.trim().to_string();
        if let Err(e) = ShareClient::new(&url) {
            self.add_log(LogLevel::Error, format!("服务地址无效: {}", e));
            return;
        }

        self.settings.server_url = url;
        self.rebuild_client();
        match self.settings.save() {
            Ok(()) => self.add_log(
                LogLevel::Info,
                format!("服务地址已更新为: {}", self.settings.server_url),
            ),
            Err(e) => self.add_log(LogLevel::Warn, format!("保存配置失败: {}", e)),
        }
        self.mode = AppMode::Normal;
    }

    pub fn show_section(&mut self, section: Section) {
        self.controller.show_section(section);
        self.mode = AppMode::Normal;
    }

    // ---- 事件处理 ----

    pub fn handle_event(&mut self, event: AppEvent, now: Instant) {
        match event {
            AppEvent::UploadProgress { sent, total } => {
                self.controller.on_upload_progress(sent, total);
            }
            AppEvent::UploadFinished(result) => {
                match &result {
                    Ok(response) => self.add_log(
                        LogLevel::Info,
                        format!("上传完成，{} 条记录", response.uploads.len()),
                    ),
                    Err(e) => self.add_log(LogLevel::Error, format!("上传失败: {}", e)),
                }
                self.controller.finish_upload(result);
            }
            AppEvent::DownloadFinished(result) => {
                match &result {
                    Ok(DownloadOutcome::Saved(path)) => {
                        self.add_log(LogLevel::Info, format!("已保存: {}", path.display()))
                    }
                    Ok(DownloadOutcome::Text(_)) => self.preview_scroll = 0,
                    Err(e) => self.add_log(LogLevel::Error, format!("下载失败: {}", e)),
                }
                self.controller.finish_download(result, now);
            }
            AppEvent::PreviewSaved(result) => {
                self.controller.finish_preview_save(result, now);
            }
            AppEvent::LogMessage { level, message } => {
                let level = level.parse().unwrap_or(LogLevel::Info);
                self.add_log(level, message);
            }
        }
    }

    /// 处理后台事件并更新定时状态
    pub fn tick(&mut self) {
        let now = Instant::now();
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_event(event, now);
        }
        self.controller.tick(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropshare_core::UploadRecord;

    fn offline_app() -> App {
        App::new(ClientSettings {
            server_url: "http://127.0.0.1:1".to_string(),
            download_dir: std::env::temp_dir(),
            ..Default::default()
        })
    }

    #[test]
    fn test_file_selector_navigation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("sub").join("inner.txt"), "i").unwrap();

        let mut selector = FileSelector::new(dir.path().to_path_buf());
        // ../, sub/, b.txt
        assert_eq!(selector.entries.len(), 3);
        assert_eq!(selector.display_name(&selector.entries[0]), "../");
        assert_eq!(selector.display_name(&selector.entries[1]), "sub/");

        selector.previous();
        assert_eq!(selector.selected, 2);
        assert_eq!(selector.enter(), Some(dir.path().join("b.txt")));

        selector.next();
        assert_eq!(selector.selected, 0);
        selector.next();
        assert_eq!(selector.enter(), None);
        assert_eq!(selector.current_dir, dir.path().join("sub"));
        assert_eq!(selector.entries.len(), 2);
    }

    #[test]
    fn test_parse_dropped_paths() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let spaced = dir.path().join("my file.txt");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&spaced, "s").unwrap();

        let pasted = format!(
            "'{}'\n{}\n{}\n",
            spaced.display(),
            a.display(),
            dir.path().join("missing.txt").display()
        );
        assert_eq!(parse_dropped_paths(&pasted), vec![spaced, a.clone()]);

        let one_line = format!("file://{} {}", a.display(), a.display());
        assert_eq!(parse_dropped_paths(&one_line), vec![a.clone(), a]);
    }

    #[test]
    fn test_drop_replaces_and_selection_adds() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&b, "b").unwrap();

        let mut app = offline_app();
        app.stage_path(a.clone());
        app.stage_path(b.clone());
        assert_eq!(app.controller.rendered_files(), ["📄 a.txt", "📄 b.txt"]);

        app.selected_file = 1;
        app.remove_selected_file();
        assert_eq!(app.controller.rendered_files(), ["📄 a.txt"]);
        assert_eq!(app.selected_file, 0);

        app.drop_paths(&b.display().to_string());
        assert_eq!(app.controller.rendered_files(), ["📄 b.txt"]);
    }

    #[tokio::test]
    async fn test_second_upload_is_rejected() {
        let mut app = offline_app();
        *app.controller.text_input_mut() = "hello".to_string();

        app.start_upload();
        assert!(app.controller.overlay().visible);

        app.start_upload();
        let last = app.logs.recent(LogLevel::Trace).next().unwrap();
        assert_eq!(last.level, LogLevel::Warn);
        assert_eq!(last.message, "An upload is already in progress");
    }

    #[tokio::test]
    async fn test_aborted_upload_task_hides_overlay() {
        let mut app = offline_app();
        app.controller.begin_upload().unwrap();

        let handle = spawn_guarded(
            app.event_tx.clone(),
            Operation::Upload,
            std::future::pending::<AppEvent>(),
        );
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        app.tick();
        assert!(!app.controller.overlay().visible);
        assert!(!app.controller.is_uploading());
        assert_eq!(
            app.controller.upload_result(),
            ["Error uploading: An upload was interrupted"]
        );
        assert!(app.controller.begin_upload().is_ok());
    }

    #[tokio::test]
    async fn test_panicked_download_task_settles() {
        let mut app = offline_app();
        *app.controller.download_id_mut() = "abc".to_string();
        app.controller.begin_download().unwrap();

        let handle = spawn_guarded(app.event_tx.clone(), Operation::Download, async {
            let missing: Option<AppEvent> = None;
            missing.expect("download task failed")
        });
        assert!(handle.await.unwrap_err().is_panic());

        app.tick();
        assert!(!app.controller.is_downloading());
        assert_eq!(app.controller.download_status(), "Error downloading file");
    }

    #[tokio::test]
    async fn test_guarded_task_sends_result_once() {
        let mut app = offline_app();
        app.controller.begin_upload().unwrap();

        let handle = spawn_guarded(app.event_tx.clone(), Operation::Upload, async {
            AppEvent::UploadFinished(Ok(UploadResponse::default()))
        });
        handle.await.unwrap();

        app.tick();
        assert_eq!(
            app.controller.upload_result(),
            ["Upload finished, but the server returned no IDs"]
        );
        // 正常结束时 guard 不再补发
        assert!(app.event_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_second_download_is_rejected() {
        let mut app = offline_app();
        *app.controller.download_id_mut() = "abc".to_string();

        app.start_download();
        app.start_download();
        assert_eq!(
            app.controller.download_status(),
            "A download is already in progress"
        );
        let last = app.logs.recent(LogLevel::Trace).next().unwrap();
        assert_eq!(last.level, LogLevel::Warn);
    }

    #[test]
    fn test_events_update_controller() {
        let mut app = offline_app();
        let now = Instant::now();
        app.controller.begin_upload().unwrap();

        app.handle_event(AppEvent::UploadProgress { sent: 1, total: 2 }, now);
        assert_eq!(app.controller.overlay().percent, 50);

        let response = UploadResponse {
            uploads: vec![UploadRecord {
                message: "ok".to_string(),
                file_id: Some("abc123".to_string()),
                text_id: None,
            }],
        };
        app.handle_event(AppEvent::UploadFinished(Ok(response)), now);
        assert!(!app.controller.overlay().visible);
        assert!(app.controller.upload_result()[0].contains("abc123"));

        *app.controller.download_id_mut() = "gone".to_string();
        app.controller.begin_download().unwrap();
        app.handle_event(
            AppEvent::DownloadFinished(Err(ShareError::Server("File has expired".into()))),
            now,
        );
        assert_eq!(app.controller.download_status(), "File has expired");
    }

    #[test]
    fn test_log_messages_from_layer() {
        let mut app = offline_app();
        app.clear_logs();
        app.handle_event(
            AppEvent::LogMessage {
                level: "DEBUG".to_string(),
                message: "chunk sent".to_string(),
            },
            Instant::now(),
        );
        assert_eq!(app.logs.recent(LogLevel::Info).count(), 0);
        app.toggle_log_level();
        assert_eq!(app.logs.recent(app.log_level).count(), 2);
    }

    #[test]
    fn test_invalid_server_url_is_not_applied() {
        let mut app = offline_app();
        app.open_settings();
        app.input_buffer = "not a url".to_string();
        app.apply_server_url();
        assert_eq!(app.mode, AppMode::Settings);
        assert_eq!(app.server_url(), "http://127.0.0.1:1");
    }
}
