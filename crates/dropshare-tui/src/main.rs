//! Dropshare TUI - 交互式终端界面
//!
//! 使用 ratatui 提供上传和下载两个分区，上传时显示进度遮罩，
//! 下载的文本在弹窗中预览。
//!
//! # 日志
//!
//! 日志默认显示在 TUI 底部的日志面板中。
//! 如需输出到文件进行调试，设置 RUST_LOG 环境变量：
//!
//! ```bash
//! RUST_LOG=debug cargo run -p dropshare-tui 2>> /tmp/dropshare.log
//! ```

mod app;
mod tui_log;
mod ui;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent,
        KeyEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use dropshare_core::{ClientSettings, Section};
use ratatui::prelude::*;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use app::{App, AppMode};
use tui_log::TuiLogLayer;

#[derive(Parser)]
#[command(name = "dropshare-tui", version, about = "Dropshare 交互式终端界面")]
struct Args {
    /// 分享服务地址 (覆盖配置文件)
    #[arg(short, long, env = "DROPSHARE_SERVER")]
    server: Option<String>,

    /// 启动时加入上传列表的文件
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = ClientSettings::load();
    if let Some(server) = args.server {
        settings.server_url = server;
    }

    // 创建 App（获取日志发送器）
    let mut app = App::new(settings);
    for path in args.files {
        app.stage_path(path);
    }

    // 初始化日志系统，发送到 TUI 日志面板
    init_logging(app.event_tx.clone());

    // Setup terminal
    enable_raw_mode()?;
    // 任何退出路径上都恢复终端
    let _restore = scopeguard::guard((), |_| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableBracketedPaste);
    });
    execute!(io::stdout(), EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app).await;
    terminal.show_cursor()?;

    res
}

/// 初始化日志系统
///
/// - 总是将日志发送到 TUI 日志面板
/// - 如果设置了 RUST_LOG，同时输出到 stderr（用于调试）
fn init_logging(log_tx: tokio::sync::mpsc::Sender<app::AppEvent>) {
    // 桥接 log crate（dropshare-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    let tui_layer = TuiLogLayer::new(log_tx);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dropshare_core=debug"));

    if std::env::var("RUST_LOG").is_ok() {
        use tracing_subscriber::fmt;

        let stderr_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .compact();

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tui_layer)
            .with(stderr_layer)
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tui_layer)
            .try_init();
    }
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, &app))?;

        // 使用 poll 避免无限阻塞，同时让后台任务有机会运行
        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if handle_key(&mut app, key) {
                        return Ok(());
                    }
                }
                Event::Paste(text) => handle_paste(&mut app, &text),
                _ => {}
            }
        }
        tokio::task::yield_now().await;

        // 处理后台事件
        app.tick();
    }
}

/// 粘贴的内容：编辑中插入文字，否则视为拖入的文件
fn handle_paste(app: &mut App, text: &str) {
    match app.mode {
        AppMode::EditText => app.controller.text_input_mut().push_str(text),
        AppMode::EditId => app.controller.download_id_mut().push_str(text.trim()),
        AppMode::Settings => app.input_buffer.push_str(text.trim()),
        AppMode::Normal if app.controller.section() == Section::Upload => app.drop_paths(text),
        _ => {}
    }
}

/// 处理按键，返回 true 表示退出
fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    // 预览弹窗拦截按键
    if app.controller.preview().is_some() {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => app.close_preview(),
            KeyCode::Char('s') => app.save_preview(),
            KeyCode::Down | KeyCode::Char('j') => {
                app.preview_scroll = app.preview_scroll.saturating_add(1)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                app.preview_scroll = app.preview_scroll.saturating_sub(1)
            }
            _ => {}
        }
        return false;
    }

    match app.mode {
        AppMode::EditText => match key.code {
            KeyCode::Esc => app.mode = AppMode::Normal,
            KeyCode::Enter => app.controller.text_input_mut().push('\n'),
            KeyCode::Char(c) => app.controller.text_input_mut().push(c),
            KeyCode::Backspace => {
                app.controller.text_input_mut().pop();
            }
            _ => {}
        },
        AppMode::EditId => match key.code {
            KeyCode::Esc => app.mode = AppMode::Normal,
            KeyCode::Enter => {
                app.mode = AppMode::Normal;
                app.start_download();
            }
            KeyCode::Char(c) => app.controller.download_id_mut().push(c),
            KeyCode::Backspace => {
                app.controller.download_id_mut().pop();
            }
            _ => {}
        },
        AppMode::Settings => match key.code {
            KeyCode::Esc => app.mode = AppMode::Normal,
            KeyCode::Enter => app.apply_server_url(),
            KeyCode::Char(c) => app.input_buffer.push(c),
            KeyCode::Backspace => {
                app.input_buffer.pop();
            }
            _ => {}
        },
        AppMode::FileSelection => match key.code {
            KeyCode::Esc => app.mode = AppMode::Normal,
            KeyCode::Up | KeyCode::Char('k') => app.file_selector.previous(),
            KeyCode::Down | KeyCode::Char('j') => app.file_selector.next(),
            KeyCode::Enter => {
                // 选中文件后留在选择器中，可以继续添加
                if let Some(path) = app.file_selector.enter() {
                    app.stage_path(path);
                }
            }
            _ => {}
        },
        AppMode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => app.controller.toggle_section(),
            KeyCode::Char('1') => app.show_section(Section::Upload),
            KeyCode::Char('2') => app.show_section(Section::Download),
            KeyCode::Char('s') => app.open_settings(),
            KeyCode::Char('v') => app.toggle_log_level(),
            KeyCode::Char('c') => app.clear_logs(),
            _ => match app.controller.section() {
                Section::Upload => handle_upload_key(app, key.code),
                Section::Download => handle_download_key(app, key.code),
            },
        },
    }
    false
}

fn handle_upload_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('a') => app.open_file_selector(),
        KeyCode::Char('t') => app.mode = AppMode::EditText,
        KeyCode::Char('e') => app.controller.cycle_expiration(),
        KeyCode::Char('d') | KeyCode::Delete => app.remove_selected_file(),
        KeyCode::Up | KeyCode::Char('k') => app.previous_file(),
        KeyCode::Down | KeyCode::Char('j') => app.next_file(),
        KeyCode::Enter | KeyCode::Char('u') => app.start_upload(),
        _ => {}
    }
}

fn handle_download_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('i') => app.mode = AppMode::EditId,
        KeyCode::Enter => app.start_download(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_section_keys() {
        let mut app = App::new(ClientSettings::default());
        assert!(app.controller.is_active(Section::Upload));

        press(&mut app, KeyCode::Tab);
        assert!(app.controller.is_active(Section::Download));
        press(&mut app, KeyCode::Char('1'));
        assert!(app.controller.is_active(Section::Upload));
    }

    #[test]
    fn test_typing_goes_to_focused_field() {
        let mut app = App::new(ClientSettings::default());
        press(&mut app, KeyCode::Char('t'));
        for c in "hi q".chars() {
            assert!(!press(&mut app, KeyCode::Char(c)));
        }
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.controller.text_input(), "hi q");

        press(&mut app, KeyCode::Char('2'));
        press(&mut app, KeyCode::Char('i'));
        handle_paste(&mut app, " S3-ABC \n");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.controller.download_id(), "S3-ABC");
        assert!(press(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn test_empty_id_download_key() {
        let mut app = App::new(ClientSettings::default());
        press(&mut app, KeyCode::Char('2'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.controller.download_status(), "Please enter a file ID");
        assert!(!app.controller.is_downloading());
    }
}
