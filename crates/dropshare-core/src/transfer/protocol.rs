//! 上传/下载接口的数据格式
//!
//! - `POST /upload/` 成功返回 `{"uploads": [{"message", "file_id" | "text_id"}]}`
//! - `GET /download/{id}` 返回 JSON（错误或文本）或者任意类型的文件内容
//! - 失败时 JSON 中带有 `error`（FastAPI 的校验错误使用 `detail`）

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 无法从 `content-disposition` 得到文件名时使用
pub const DEFAULT_DOWNLOAD_NAME: &str = "downloaded-file";

/// 共享文本的默认文件名
pub const DEFAULT_TEXT_NAME: &str = "shared-text.txt";

/// 单条上传结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_id: Option<String>,
}

impl UploadRecord {
    /// 文件 ID 或文本 ID，优先文件 ID
    pub fn id(&self) -> Option<&str> {
        self.file_id.as_deref().or(self.text_id.as_deref())
    }

    /// 显示用的一行文字
    pub fn summary(&self) -> String {
        match self.id() {
            Some(id) => format!("{} Your ID is: {}", self.message, id),
            None => self.message.clone(),
        }
    }
}

/// `POST /upload/` 的响应
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub uploads: Vec<UploadRecord>,
}

/// 文本类下载结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextArtifact {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl TextArtifact {
    /// 保存时使用的文件名
    pub fn file_name(&self) -> &str {
        self.filename
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_TEXT_NAME)
    }
}

/// 下载得到的内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadArtifact {
    /// 文件内容，需要保存到磁盘
    Binary { filename: String, data: Vec<u8> },
    /// 文本内容，在预览中显示
    Text(TextArtifact),
}

/// JSON 下载响应的分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonReply {
    Error(String),
    Text(TextArtifact),
    /// 无法识别的 JSON，按普通文件处理
    Other,
}

#[derive(Deserialize)]
struct RawReply {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// 对 `application/json` 下载响应进行分类
pub fn classify_json(body: &[u8]) -> serde_json::Result<JsonReply> {
    let value: Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Ok(JsonReply::Other);
    }

    let reply: RawReply = serde_json::from_value(value)?;
    if let Some(error) = reply.error {
        return Ok(JsonReply::Error(error));
    }

    match (reply.kind.as_deref(), reply.content) {
        // 没有 type 只有 content 的是仅含文本的压缩包
        (Some("text") | None, Some(content)) => Ok(JsonReply::Text(TextArtifact {
            content,
            filename: reply.filename,
        })),
        _ => Ok(JsonReply::Other),
    }
}

/// 从错误响应体中提取服务端消息
pub fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("error").or_else(|| value.get("detail"))? {
        Value::String(message) => Some(message.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// 从 `content-disposition` 中取出 `filename=` 之后的部分
///
/// 去掉引号，截止到下一个 `;`。没有可用文件名时返回 [`DEFAULT_DOWNLOAD_NAME`]。
pub fn filename_from_disposition(header: Option<&str>) -> String {
    header
        .and_then(|value| {
            let start = value.to_ascii_lowercase().find("filename=")? + "filename=".len();
            let name = value[start..].split(';').next()?.replace('"', "");
            let name = name.trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string())
}
