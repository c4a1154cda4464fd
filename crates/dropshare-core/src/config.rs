//! 客户端配置和持久化
//!
//! 提供服务地址、默认过期策略、下载目录等设置的存储和读取。

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::expiration::ExpirationPolicy;
use crate::transfer::ProgressMode;

/// 默认服务地址
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// 客户端设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// 分享服务地址
    pub server_url: String,
    /// 上传时默认选择的过期策略
    pub expiration_policy: ExpirationPolicy,
    /// 下载目录
    pub download_dir: PathBuf,
    /// 上传进度上报方式
    pub progress_mode: ProgressMode,
    /// 单个请求的超时时间（秒）
    pub request_timeout_secs: u64,
    /// 详细日志模式
    pub verbose: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            expiration_policy: ExpirationPolicy::default(),
            download_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            progress_mode: ProgressMode::default(),
            request_timeout_secs: 300,
            verbose: false,
        }
    }
}

impl ClientSettings {
    /// 获取配置文件路径
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dropshare");
        config_dir.join("settings.toml")
    }

    /// 加载设置（如果文件不存在则使用默认值）
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(settings) => {
                        debug!("Loaded settings from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse settings: {}, using defaults", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read settings file: {}, using defaults", e);
                }
            }
        }
        Self::default()
    }

    /// 保存设置
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)?;
        debug!("Saved settings to {:?}", path);
        Ok(())
    }
}
