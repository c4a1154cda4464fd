//! UI rendering module

use dropshare_core::Section;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Tabs, Wrap},
};

use crate::app::{App, AppMode};

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Active section
            Constraint::Length(8), // Log
            Constraint::Length(3), // Status bar
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);
    match app.controller.section() {
        Section::Upload => draw_upload_section(frame, app, chunks[1]),
        Section::Download => draw_download_section(frame, app, chunks[1]),
    }
    draw_log(frame, app, chunks[2]);
    draw_status_bar(frame, app, chunks[3]);

    // 弹窗，后绘制的在最上层
    if app.mode == AppMode::FileSelection {
        draw_file_selector(frame, app);
    }
    if app.mode == AppMode::Settings {
        draw_settings(frame, app);
    }
    if app.controller.preview().is_some() {
        draw_preview(frame, app);
    }
    if app.controller.overlay().visible {
        draw_loading_overlay(frame, app);
    }
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let titles = vec!["📤 上传 [1]", "📥 下载 [2]"];
    let selected = match app.controller.section() {
        Section::Upload => 0,
        Section::Download => 1,
    };

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Dropshare · {} ", app.server_url())),
        )
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().fg(Color::Yellow).bold());

    frame.render_widget(tabs, area);
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn draw_upload_section(frame: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    // 待上传文件
    let staged = app.controller.staged();
    let items: Vec<ListItem> = app
        .controller
        .rendered_files()
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let style = if i == app.selected_file {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else {
                Style::default()
            };
            ListItem::new(line).style(style)
        })
        .collect();

    let title = format!(
        " 文件 ({}, {}) ",
        staged.len(),
        format_size(staged.total_size())
    );
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // Text
            Constraint::Length(3), // Expiration
            Constraint::Length(5), // Result
        ])
        .split(columns[1]);

    let editing = app.mode == AppMode::EditText;
    let mut text = app.controller.text_input().to_string();
    if editing {
        text.push('▏');
    }
    let text_box = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(focus_style(editing))
                .title(" 文本 [t] "),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(text_box, right[0]);

    let expiration = app.controller.expiration();
    let expiration_box = Paragraph::new(format!("⏳ {}", expiration.label()))
        .block(Block::default().borders(Borders::ALL).title(" 过期策略 [e] "));
    frame.render_widget(expiration_box, right[1]);

    let result: Vec<Line> = app
        .controller
        .upload_result()
        .iter()
        .map(|line| Line::from(line.as_str()))
        .collect();
    let result_box = Paragraph::new(result)
        .block(Block::default().borders(Borders::ALL).title(" 结果 "))
        .wrap(Wrap { trim: true });
    frame.render_widget(result_box, right[2]);
}

fn draw_download_section(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // ID
            Constraint::Length(3), // Status
            Constraint::Min(3),    // Help
        ])
        .split(area);

    let editing = app.mode == AppMode::EditId;
    let mut id = app.controller.download_id().to_string();
    if editing {
        id.push('▏');
    }
    let id_box = Paragraph::new(id).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(editing))
            .title(" 文件 ID [i] "),
    );
    frame.render_widget(id_box, chunks[0]);

    let status_style = if app.controller.is_downloading() {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let status = Paragraph::new(app.controller.download_status())
        .style(status_style)
        .block(Block::default().borders(Borders::ALL).title(" 状态 "));
    frame.render_widget(status, chunks[1]);

    let help = Paragraph::new(format!(
        "i 输入 ID，Enter 下载\n文件保存到: {}",
        app.settings.download_dir.display()
    ))
    .block(Block::default().borders(Borders::ALL).title(" 帮助 "))
    .wrap(Wrap { trim: true });
    frame.render_widget(help, chunks[2]);
}

fn draw_log(frame: &mut Frame, app: &App, area: Rect) {
    let visible = area.height.saturating_sub(2) as usize;
    let mut items: Vec<ListItem> = app
        .logs
        .recent(app.log_level)
        .take(visible)
        .map(|entry| {
            let style = match entry.level {
                dropshare_core::LogLevel::Error => Style::default().fg(Color::Red),
                dropshare_core::LogLevel::Warn => Style::default().fg(Color::Yellow),
                _ => Style::default(),
            };
            ListItem::new(entry.to_string()).style(style)
        })
        .collect();
    items.reverse();

    let title = format!(" 📋 日志 ({}) ", app.log_level);
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode_text = match app.mode {
        AppMode::Normal => " ⏸️  浏览 ",
        AppMode::EditText => " ✏️  编辑文本 ",
        AppMode::EditId => " ✏️  输入 ID ",
        AppMode::FileSelection => " 📂 选择文件 ",
        AppMode::Settings => " ⚙️  设置 ",
    };

    let keys = match (app.mode, app.controller.section()) {
        (AppMode::Normal, Section::Upload) => {
            "[a]添加 [d]移除 [t]文本 [e]过期 [Enter]上传 [Tab]切换 [s]设置 [q]退出"
        }
        (AppMode::Normal, Section::Download) => {
            "[i]输入ID [Enter]下载 [Tab]切换 [v]日志级别 [c]清空日志 [q]退出"
        }
        (AppMode::EditText, _) => "[Esc]完成",
        (AppMode::EditId, _) => "[Enter]下载 [Esc]完成",
        (AppMode::FileSelection, _) => "[↑/↓]选择 [Enter]添加/进入 [Esc]返回",
        (AppMode::Settings, _) => "[Enter]保存 [Esc]取消",
    };

    let status = Paragraph::new(format!("{}│ {}", mode_text, keys))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, area);
}

fn draw_file_selector(frame: &mut Frame, app: &App) {
    let area = centered_rect(70, 70, frame.area());
    let selector = &app.file_selector;

    let items: Vec<ListItem> = selector
        .entries
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let style = if i == selector.selected {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else {
                Style::default()
            };
            ListItem::new(selector.display_name(path)).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" 📂 {} ", selector.current_dir.display())),
    );

    frame.render_widget(Clear, area);
    frame.render_widget(list, area);
}

fn draw_settings(frame: &mut Frame, app: &App) {
    let area = centered_rect(60, 20, frame.area());
    let input = Paragraph::new(format!("{}▏", app.input_buffer)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(true))
            .title(" ⚙️  服务地址 "),
    );

    frame.render_widget(Clear, area);
    frame.render_widget(input, area);
}

fn draw_preview(frame: &mut Frame, app: &App) {
    let Some(preview) = app.controller.preview() else {
        return;
    };
    let area = centered_rect(80, 80, frame.area());

    let title = format!(
        " 📝 {} · [s]保存 [Esc]关闭 ",
        preview.filename.as_deref().unwrap_or("Text")
    );
    let paragraph = Paragraph::new(preview.content.as_str())
        .block(Block::default().borders(Borders::ALL).title(title))
        .scroll((app.preview_scroll, 0));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn draw_loading_overlay(frame: &mut Frame, app: &App) {
    let overlay = app.controller.overlay();
    let popup = centered_rect(50, 20, frame.area());
    let area = Rect {
        height: popup.height.min(3),
        ..popup
    };

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" ⏫ 上传中 "))
        .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
        .percent(overlay.percent.min(100) as u16)
        .label(overlay.label());

    frame.render_widget(Clear, area);
    frame.render_widget(gauge, area);
}

/// 屏幕中央按百分比划出的区域
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < KB * KB {
        format!("{:.1} KB", bytes / KB)
    } else if bytes < KB * KB * KB {
        format!("{:.1} MB", bytes / KB / KB)
    } else {
        format!("{:.2} GB", bytes / KB / KB / KB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropshare_core::ClientSettings;
    use ratatui::backend::TestBackend;

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>()
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_only_active_section_is_drawn() {
        let mut app = App::new(ClientSettings::default());
        *app.controller.download_id_mut() = "ZZTOP".to_string();

        assert!(!screen(&app).contains("ZZTOP"));
        app.show_section(Section::Download);
        assert!(screen(&app).contains("ZZTOP"));
    }

    #[test]
    fn test_overlay_shows_percent() {
        let mut app = App::new(ClientSettings::default());
        app.controller.begin_upload().unwrap();
        app.controller.on_upload_progress(42, 100);
        assert!(screen(&app).contains("Uploading... 42%"));
    }
}
