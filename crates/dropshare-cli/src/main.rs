//! Dropshare CLI
//!
//! 命令行客户端，直接与分享服务通信

mod progress;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dropshare_core::transfer::{retrieve, save_text};
use dropshare_core::{
    ClientSettings, DownloadOutcome, ExpirationPolicy, ProgressMode, ShareClient, StagedFile,
    StagedFiles, UploadRequest,
};
use progress::ProgressLine;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dropshare", version, about = "Dropshare - 文件和文本分享客户端")]
struct Cli {
    /// 分享服务地址 (覆盖配置文件)
    #[arg(short, long, global = true, env = "DROPSHARE_SERVER")]
    server: Option<String>,

    /// 输出详细日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 上传文件和/或文本
    Upload {
        /// 要上传的文件
        files: Vec<PathBuf>,
        /// 一起分享的文本 ("-" 表示从标准输入读取)
        #[arg(short, long)]
        text: Option<String>,
        /// 过期策略 (默认使用配置文件中的值)
        #[arg(short, long)]
        expiration: Option<ExpirationPolicy>,
        /// 进度上报方式: bytes 或 milestones
        #[arg(short, long)]
        progress: Option<ProgressMode>,
    },
    /// 按 ID 下载
    Download {
        /// 上传时返回的 ID
        id: String,
        /// 保存目录 (默认: 配置中的下载目录)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// 文本内容也保存为文件，而不只是打印
        #[arg(long)]
        save_text: bool,
    },
    /// 列出服务端支持的过期策略
    Policies,
    /// 查看或修改配置
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 显示当前配置
    Show,
    /// 设置服务地址
    SetServer { url: String },
    /// 设置默认过期策略
    SetExpiration { policy: ExpirationPolicy },
    /// 设置下载目录
    SetDownloadDir { dir: PathBuf },
    /// 设置进度上报方式
    SetProgress { mode: ProgressMode },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = ClientSettings::load();
    init_logging(cli.verbose || settings.verbose);

    if let Some(server) = &cli.server {
        settings.server_url = server.clone();
    }
    tracing::debug!("Using server {}", settings.server_url);

    match cli.command {
        Commands::Upload {
            files,
            text,
            expiration,
            progress,
        } => {
            let expiration = expiration.unwrap_or_else(|| settings.expiration_policy.clone());
            let mode = progress.unwrap_or(settings.progress_mode);
            upload(&settings, files, text, expiration, mode).await?;
        }
        Commands::Download {
            id,
            output,
            save_text,
        } => {
            let dir = output.unwrap_or_else(|| settings.download_dir.clone());
            download(&settings, &id, dir, save_text).await?;
        }
        Commands::Policies => {
            for policy in ExpirationPolicy::KNOWN.iter() {
                let marker = if *policy == settings.expiration_policy {
                    "*"
                } else {
                    " "
                };
                let retention = policy
                    .nominal_retention()
                    .map(format_retention)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{} {:<28} {:<8} {}",
                    marker,
                    policy.as_str(),
                    retention,
                    policy.label()
                );
            }
        }
        Commands::Config { action } => configure(settings, action)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    // 桥接 log crate（dropshare-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    let default_filter = if verbose {
        "info,dropshare_core=debug"
    } else {
        "warn"
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .try_init();
}

async fn upload(
    settings: &ClientSettings,
    files: Vec<PathBuf>,
    text: Option<String>,
    expiration: ExpirationPolicy,
    mode: ProgressMode,
) -> Result<()> {
    let text = match text.as_deref() {
        Some("-") => std::io::read_to_string(std::io::stdin()).context("读取标准输入失败")?,
        Some(t) => t.to_string(),
        None => String::new(),
    };

    let mut staged = StagedFiles::new();
    for path in files {
        if !path.is_file() {
            bail!("不是文件: {}", path.display());
        }
        staged.add_files([StagedFile::from_path(path)]);
    }

    let request = UploadRequest::new(&staged, &text, expiration);
    if request.is_empty() {
        bail!("没有可上传的内容，请指定文件或 --text");
    }

    for line in staged.render() {
        println!("   {}", line);
    }
    println!(
        "📤 上传到 {} (过期策略: {})",
        settings.server_url,
        request.expiration.label()
    );

    let client = ShareClient::from_settings(settings)?.with_progress_mode(mode);
    let progress = Arc::new(ProgressLine::new());
    let result = client.upload(&request, progress.clone()).await;
    progress.finish();

    let response = result.map_err(|e| {
        tracing::warn!("Upload to {} failed: {:?}", settings.server_url, e);
        anyhow::anyhow!("Error uploading: {}", e)
    })?;
    if response.uploads.is_empty() {
        println!("⚠️  Upload finished, but the server returned no IDs");
    }
    for record in &response.uploads {
        println!("✅ {}", record.summary());
    }
    Ok(())
}

async fn download(
    settings: &ClientSettings,
    id: &str,
    dir: PathBuf,
    keep_text: bool,
) -> Result<()> {
    let client = ShareClient::from_settings(settings)?;
    println!("📥 Downloading...");

    let outcome = retrieve(&client, id, &dir).await.map_err(|e| {
        if !e.is_local() {
            tracing::warn!("Download of {} failed: {:?}", id.trim(), e);
        }
        anyhow::anyhow!(dropshare_core::controller::download_error_message(&e))
            .context(format!("下载 {} 失败", id.trim()))
    })?;

    match outcome {
        DownloadOutcome::Saved(path) => {
            println!("✅ Download successful! 保存到 {}", path.display());
        }
        DownloadOutcome::Text(text) => {
            println!("📝 {}", text.file_name());
            println!("{}", text.content);
            if keep_text {
                let path = save_text(&dir, &text).await?;
                println!("✅ 保存到 {}", path.display());
            }
        }
    }
    Ok(())
}

fn configure(mut settings: ClientSettings, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("配置文件: {}", ClientSettings::config_path().display());
            println!("  server_url        = {}", settings.server_url);
            println!(
                "  expiration_policy = {} ({})",
                settings.expiration_policy,
                settings.expiration_policy.label()
            );
            println!("  download_dir      = {}", settings.download_dir.display());
            println!("  progress_mode     = {}", settings.progress_mode);
            println!("  request_timeout   = {}s", settings.request_timeout_secs);
            println!("  verbose           = {}", settings.verbose);
            return Ok(());
        }
        ConfigAction::SetServer { url } => {
            // 先确认地址可以解析
            ShareClient::new(&url)?;
            settings.server_url = url;
        }
        ConfigAction::SetExpiration { policy } => settings.expiration_policy = policy,
        ConfigAction::SetDownloadDir { dir } => settings.download_dir = dir,
        ConfigAction::SetProgress { mode } => settings.progress_mode = mode,
    }

    settings.save().context("保存配置失败")?;
    tracing::info!("Saved settings to {:?}", ClientSettings::config_path());
    println!("✅ 已保存到 {}", ClientSettings::config_path().display());
    Ok(())
}

/// 保留时长的简短写法，如 `5m`、`1h`、`1d`
fn format_retention(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        s if s >= 86_400 && s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s >= 3_600 && s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s >= 60 && s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}
