//! 上传/下载 HTTP 客户端
//!
//! # 上传
//!
//! `POST {server}/upload/`，multipart 表单：
//!
//! - `expiration_policy`: 必填
//! - `text_content`: 去除首尾空白后非空时才提交
//! - `files`: 零个或多个文件
//!
//! # 下载
//!
//! `GET {server}/download/{id}`，`id` 作为单个路径段编码。
//! 根据 `content-type` 区分 JSON（错误或文本）和普通文件。

use log::{debug, info, warn};

use crate::config::ClientSettings;
use crate::error::{Result, ShareError};
use crate::staging::{FileSource, StagedFile};
use crate::transfer::progress::{ByteCounter, ProgressMode, UploadProgressCallback};
use crate::transfer::protocol::{self, DownloadArtifact, JsonReply, UploadResponse};
use crate::{ExpirationPolicy, StagedFiles};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Url};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;

/// 内存内容按此大小分块发送，以便上报进度
const CHUNK_SIZE: usize = 64 * 1024;

/// 一次上传的全部内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub files: Vec<StagedFile>,
    /// 已去除首尾空白，空文本为 `None`
    pub text: Option<String>,
    pub expiration: ExpirationPolicy,
}

impl UploadRequest {
    pub fn new(files: &StagedFiles, text: &str, expiration: ExpirationPolicy) -> Self {
        let text = text.trim();
        Self {
            files: files.as_slice().to_vec(),
            text: (!text.is_empty()).then(|| text.to_string()),
            expiration,
        }
    }

    /// 没有文件也没有文本
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.text.is_none()
    }
}

/// 分享服务客户端
#[derive(Debug, Clone)]
pub struct ShareClient {
    base: Url,
    http: reqwest::Client,
    mode: ProgressMode,
}

impl ShareClient {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_timeout(server_url, Duration::from_secs(300))
    }

    pub fn with_timeout(server_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(server_url)
            .map_err(|e| ShareError::InvalidUrl(format!("{}: {}", server_url, e)))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ShareError::InvalidUrl(format!(
                "{}: expected an http(s) URL",
                server_url
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base,
            http,
            mode: ProgressMode::default(),
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        Ok(Self::with_timeout(
            &settings.server_url,
            Duration::from_secs(settings.request_timeout_secs),
        )?
        .with_progress_mode(settings.progress_mode))
    }

    pub fn with_progress_mode(mut self, mode: ProgressMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn progress_mode(&self) -> ProgressMode {
        self.mode
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// 在服务地址后追加路径段，每段单独编码
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ShareError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn upload_url(&self) -> Result<Url> {
        self.endpoint(&["upload", ""])
    }

    pub fn download_url(&self, id: &str) -> Result<Url> {
        self.endpoint(&["download", id])
    }

    /// 上传文件和文本
    pub async fn upload<C>(
        &self,
        request: &UploadRequest,
        progress: Arc<C>,
    ) -> Result<UploadResponse>
    where
        C: UploadProgressCallback + ?Sized + 'static,
    {
        let url = self.upload_url()?;

        let (form, total) = match self.mode {
            ProgressMode::Milestones => (buffered_form(request).await?, 100),
            ProgressMode::Bytes => streaming_form(request, progress.clone()).await?,
        };

        info!(
            "Uploading {} file(s){} to {} (policy: {})",
            request.files.len(),
            if request.text.is_some() { " and text" } else { "" },
            url,
            request.expiration
        );

        match self.mode {
            ProgressMode::Milestones => progress.on_progress(50, 100),
            ProgressMode::Bytes => progress.on_progress(0, total),
        }

        let response = self.http.post(url).multipart(form).send().await?;

        match self.mode {
            ProgressMode::Milestones => progress.on_progress(90, 100),
            ProgressMode::Bytes => progress.on_progress(total, total),
        }

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let message = protocol::error_message(&body);
            warn!("Upload failed: {} {:?}", status, message);
            return Err(ShareError::Http { status, message });
        }

        let parsed: UploadResponse = serde_json::from_slice(&body)?;
        if self.mode == ProgressMode::Milestones {
            progress.on_progress(100, 100);
        }

        info!("Upload finished with {} record(s)", parsed.uploads.len());
        Ok(parsed)
    }

    /// 按 ID 获取内容
    pub async fn download(&self, id: &str) -> Result<DownloadArtifact> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ShareError::MissingId);
        }

        let url = self.download_url(id)?;
        info!("Downloading from: {}", url);

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let content_type = header_str(&response, CONTENT_TYPE);
        let disposition = header_str(&response, CONTENT_DISPOSITION);
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = protocol::error_message(&body);
            warn!("Download failed: {} {:?}", status, message);
            return Err(ShareError::Http { status, message });
        }

        let is_json = content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"));
        if is_json {
            match protocol::classify_json(&body)? {
                JsonReply::Error(message) => return Err(ShareError::Server(message)),
                JsonReply::Text(text) => {
                    debug!("Received text artifact ({} bytes)", text.content.len());
                    return Ok(DownloadArtifact::Text(text));
                }
                JsonReply::Other => debug!("Unrecognized JSON reply, treating as file"),
            }
        }

        let filename = protocol::filename_from_disposition(disposition.as_deref());
        debug!("Received file '{}' ({} bytes)", filename, body.len());

        Ok(DownloadArtifact::Binary {
            filename,
            data: body.to_vec(),
        })
    }
}

fn header_str(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .map(|v| decode_header_value(v.as_bytes()))
}

/// 头部值按 UTF-8 解码，失败时按 latin-1 逐字节解码（与浏览器一致）
fn decode_header_value(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(value) => value.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// 表单的固定字段：过期策略和可选文本
fn base_form(request: &UploadRequest) -> Form {
    let form = Form::new().text("expiration_policy", request.expiration.to_string());
    match &request.text {
        Some(text) => form.text("text_content", text.clone()),
        None => form,
    }
}

fn named(part: Part, file: &StagedFile) -> Result<Part> {
    Ok(part.file_name(file.name.clone()).mime_str(&file.mime_type())?)
}

/// 一次性读入全部文件内容
async fn buffered_form(request: &UploadRequest) -> Result<Form> {
    let mut form = base_form(request);
    for file in &request.files {
        let data = match &file.source {
            FileSource::Path(path) => tokio::fs::read(path).await?,
            FileSource::Memory(bytes) => bytes.clone(),
        };
        form = form.part("files", named(Part::bytes(data), file)?);
    }
    Ok(form)
}

/// 以流的方式发送文件，每读出一块就上报一次进度
async fn streaming_form<C>(request: &UploadRequest, progress: Arc<C>) -> Result<(Form, u64)>
where
    C: UploadProgressCallback + ?Sized + 'static,
{
    // 先确定所有文件的实际大小，total 在发送前固定
    let mut sources = Vec::with_capacity(request.files.len());
    let mut total = 0u64;
    for file in &request.files {
        let (source, len) = match &file.source {
            FileSource::Path(path) => {
                let handle = tokio::fs::File::open(path).await?;
                let len = handle.metadata().await?.len();
                (OpenedSource::File(handle), len)
            }
            FileSource::Memory(bytes) => (OpenedSource::Memory(bytes.clone()), bytes.len() as u64),
        };
        total += len;
        sources.push((file, source, len));
    }

    let counter = Arc::new(ByteCounter::new(total, progress));
    let mut form = base_form(request);

    for (file, source, len) in sources {
        let counter = counter.clone();
        let body = match source {
            OpenedSource::File(handle) => {
                Body::wrap_stream(ReaderStream::new(handle).map(move |chunk| {
                    if let Ok(bytes) = &chunk {
                        counter.advance(bytes.len());
                    }
                    chunk
                }))
            }
            OpenedSource::Memory(bytes) => {
                let chunks: Vec<Vec<u8>> = bytes.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();
                Body::wrap_stream(futures_util::stream::iter(chunks).map(move |chunk| {
                    counter.advance(chunk.len());
                    Ok::<_, std::io::Error>(chunk)
                }))
            }
        };
        form = form.part("files", named(Part::stream_with_length(body, len), file)?);
    }

    debug!("Streaming {} byte(s) of file content", counter.total());
    Ok((form, total))
}

enum OpenedSource {
    File(tokio::fs::File),
    Memory(Vec<u8>),
}
