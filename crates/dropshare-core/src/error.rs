//! 错误类型
//!
//! 按来源划分三类：本地校验（`MissingId`、`Busy`）、传输层（`Transport`）、
//! 应用层（`Http`、`Server`）。每个错误只终止当前这一次操作，不会自动重试。

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShareError>;

/// 可能处于进行中的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Download,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Upload => write!(f, "An upload"),
            Operation::Download => write!(f, "A download"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShareError {
    /// 下载 ID 为空，未发出请求
    #[error("Please enter a file ID")]
    MissingId,

    /// 同类操作仍在进行中
    #[error("{0} is already in progress")]
    Busy(Operation),

    /// 请求没有得到任何响应
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 非 2xx 响应，`message` 为服务端给出的错误文本（如有）
    #[error("{}", describe_http(.status, .message.as_deref()))]
    Http {
        status: StatusCode,
        message: Option<String>,
    },

    /// 2xx 响应但 JSON 中带有 `error`
    #[error("{0}")]
    Server(String),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    /// 后台任务在给出结果前异常结束（panic 或被取消）
    #[error("{0} was interrupted")]
    Interrupted(Operation),
}

impl ShareError {
    /// 服务端原样给出的错误信息
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ShareError::Http {
                message: Some(message),
                ..
            } => Some(message),
            ShareError::Server(message) => Some(message),
            _ => None,
        }
    }

    /// 是否为本地校验错误（未发出网络请求）
    pub fn is_local(&self) -> bool {
        matches!(self, ShareError::MissingId | ShareError::Busy(_))
    }
}

fn describe_http(status: &StatusCode, message: Option<&str>) -> String {
    match message {
        Some(message) => message.to_string(),
        None => format!("HTTP error! status: {}", status.as_u16()),
    }
}
