//! 过期策略
//!
//! 随上传请求一起提交的字符串字段。具体语义完全由服务端决定，
//! 客户端只负责选择和原样提交。

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 上传时选择的过期策略
///
/// 未知的取值保存在 `Other` 中原样提交。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExpirationPolicy {
    #[default]
    DeleteAfterFirstDownload,
    Store1Hour,
    Store1Day,
    Other(String),
}

impl ExpirationPolicy {
    /// 服务端已知的策略，按 UI 中的显示顺序排列
    pub const KNOWN: [ExpirationPolicy; 3] = [
        ExpirationPolicy::DeleteAfterFirstDownload,
        ExpirationPolicy::Store1Hour,
        ExpirationPolicy::Store1Day,
    ];

    /// 表单字段 `expiration_policy` 的取值
    pub fn as_str(&self) -> &str {
        match self {
            ExpirationPolicy::DeleteAfterFirstDownload => "delete_after_first_download",
            ExpirationPolicy::Store1Hour => "store_1_hour",
            ExpirationPolicy::Store1Day => "store_1_day",
            ExpirationPolicy::Other(value) => value,
        }
    }

    /// 显示名称
    pub fn label(&self) -> &str {
        match self {
            ExpirationPolicy::DeleteAfterFirstDownload => "Delete after first download",
            ExpirationPolicy::Store1Hour => "Keep for 1 hour",
            ExpirationPolicy::Store1Day => "Keep for 1 day",
            ExpirationPolicy::Other(value) => value,
        }
    }

    /// 服务端标称的保留时长，仅用于展示
    pub fn nominal_retention(&self) -> Option<Duration> {
        match self {
            ExpirationPolicy::DeleteAfterFirstDownload => Some(Duration::from_secs(300)),
            ExpirationPolicy::Store1Hour => Some(Duration::from_secs(3600)),
            ExpirationPolicy::Store1Day => Some(Duration::from_secs(86400)),
            ExpirationPolicy::Other(_) => None,
        }
    }

    /// 循环切换到下一个已知策略（自定义取值回到第一个）
    pub fn next(&self) -> Self {
        match self {
            ExpirationPolicy::DeleteAfterFirstDownload => ExpirationPolicy::Store1Hour,
            ExpirationPolicy::Store1Hour => ExpirationPolicy::Store1Day,
            ExpirationPolicy::Store1Day | ExpirationPolicy::Other(_) => {
                ExpirationPolicy::DeleteAfterFirstDownload
            }
        }
    }
}

impl FromStr for ExpirationPolicy {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "delete_after_first_download" => ExpirationPolicy::DeleteAfterFirstDownload,
            "store_1_hour" => ExpirationPolicy::Store1Hour,
            "store_1_day" => ExpirationPolicy::Store1Day,
            other => ExpirationPolicy::Other(other.to_string()),
        })
    }
}

impl From<String> for ExpirationPolicy {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(policy) => policy,
            Err(never) => match never {},
        }
    }
}

impl From<ExpirationPolicy> for String {
    fn from(policy: ExpirationPolicy) -> Self {
        policy.as_str().to_string()
    }
}

impl fmt::Display for ExpirationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
