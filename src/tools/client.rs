//! # 远端处理客户端
//!
//! ## 设计思路
//!
//! 本地不做任何像素运算：缩放、转换、压缩、抠图、合成 PDF、生成二维码全部交给远端。
//! 这里只负责三件事：
//! 1. 发送前的同步预检（缺文件、缺宽高、缺密钥时不发出任何请求）
//! 2. 按工具组装 multipart / JSON 请求，单次交换，不自动重试
//! 3. 把非成功状态与网络异常映射到 `ToolError`
//!
//! ## 实现思路
//!
//! - `RemoteProcessor` 作为接缝，会话层、批量层与测试只依赖该 trait。
//! - `HttpRemoteProcessor` 基于 reqwest，按 `ToolConfig` 设置总超时与连接超时。
//! - 响应体分块读取，超过 `max_response_size` 立即中止。
//! - 日志中的 URL 一律去掉查询参数，API Key 不进入日志。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use super::qr::{QrCode, QrRequest, QrResponse};
use super::source::{FileInput, RemoteOutput, ToolKind, TransformOptions, UploadCandidate};
use super::{ToolConfig, ToolError};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_REMOVE_BG_URL: &str = "https://api.remove.bg/v1.0/removebg";

const BUFFER_INITIAL_CAPACITY: usize = 64 * 1024;
/// 错误响应体只读取这么多用于提示文案。
const ERROR_BODY_LIMIT: u64 = 16 * 1024;

/// 远端地址与凭据。
#[derive(Clone, Default)]
pub struct RemoteEndpoints {
    /// 缩放 / 转换 / 合成 PDF 使用的基础地址。
    pub api_base: String,
    /// 压缩与二维码使用的基础地址（历史上与 `api_base` 分离）。
    pub legacy_base: String,
    /// remove.bg 完整地址。
    pub remove_bg_url: String,
    /// remove.bg API Key；为空表示未配置。
    pub remove_bg_api_key: Option<String>,
}

impl std::fmt::Debug for RemoteEndpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEndpoints")
            .field("api_base", &self.api_base)
            .field("legacy_base", &self.legacy_base)
            .field("remove_bg_url", &self.remove_bg_url)
            .field(
                "remove_bg_api_key",
                &self.remove_bg_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl RemoteEndpoints {
    /// 所有工具共用一个基础地址。
    pub fn with_base(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            api_base: base.clone(),
            legacy_base: base,
            remove_bg_url: DEFAULT_REMOVE_BG_URL.to_string(),
            remove_bg_api_key: None,
        }
    }

    /// 指定工具的完整请求地址。
    pub fn url_for(&self, kind: ToolKind) -> String {
        let Some(path) = kind.endpoint_path() else {
            return self.remove_bg_url.clone();
        };
        let base = match kind {
            ToolKind::Compress | ToolKind::QrCode => &self.legacy_base,
            _ => &self.api_base,
        };
        join_url(base, path)
    }

    pub fn has_remove_bg_key(&self) -> bool {
        self.remove_bg_api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// 一次单文件处理任务（已通过预检）。
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    pub kind: ToolKind,
    pub file: FileInput,
    pub options: TransformOptions,
}

/// 发送前的同步预检，失败时不会产生任何网络请求。
///
/// `has_remove_bg_key` 只对抠图生效，通常取自 [`RemoteProcessor::has_remove_bg_key`]。
pub fn preflight(
    kind: ToolKind,
    candidate: Option<&UploadCandidate>,
    options: &TransformOptions,
    has_remove_bg_key: bool,
) -> Result<ProcessingJob, ToolError> {
    let Some(candidate) = candidate else {
        return Err(ToolError::Validation(match kind {
            ToolKind::Resize => "Please select an image and enter both width and height",
            _ => "Please select an image first",
        }
        .to_string()));
    };

    if kind == ToolKind::Resize {
        let (Some(width), Some(height)) = (options.target_width, options.target_height) else {
            return Err(ToolError::Validation(
                "Please select an image and enter both width and height".to_string(),
            ));
        };
        if width == 0 || height == 0 {
            return Err(ToolError::Validation(
                "Width and height must be greater than 0".to_string(),
            ));
        }
    }

    if kind == ToolKind::RemoveBackground && !has_remove_bg_key {
        return Err(missing_remove_bg_key());
    }

    if matches!(kind, ToolKind::ImageToPdf | ToolKind::QrCode) {
        return Err(ToolError::Validation(format!("{} 不是单文件工具", kind)));
    }

    Ok(ProcessingJob {
        kind,
        file: candidate.file.clone(),
        options: options.clone(),
    })
}

fn missing_remove_bg_key() -> ToolError {
    ToolError::Validation("remove.bg API key is not configured (REMOVE_BG_API_KEY)".to_string())
}

/// 远端处理器接缝。
#[async_trait]
pub trait RemoteProcessor: Send + Sync {
    /// 单文件工具：缩放 / 转换 / 压缩 / 抠图。
    async fn process(&self, job: &ProcessingJob) -> Result<RemoteOutput, ToolError>;

    /// 多张图片按提交顺序合成一个 PDF。
    async fn images_to_pdf(&self, files: &[FileInput]) -> Result<RemoteOutput, ToolError>;

    /// 生成二维码。
    async fn generate_qr(&self, request: &QrRequest) -> Result<QrCode, ToolError>;

    /// 抠图凭据是否就绪；预检据此在本地拦截。
    fn has_remove_bg_key(&self) -> bool {
        true
    }
}

/// 基于 reqwest 的远端处理器。
#[derive(Debug, Clone)]
pub struct HttpRemoteProcessor {
    client: reqwest::Client,
    endpoints: RemoteEndpoints,
    request_timeout: u64,
    max_response_size: u64,
    stream_chunk_timeout: Duration,
}

impl HttpRemoteProcessor {
    pub fn new(endpoints: RemoteEndpoints, config: &ToolConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .build()
            .map_err(|e| ToolError::Network(format!("无法创建 HTTP 客户端：{}", e)))?;

        Ok(Self {
            client,
            endpoints,
            request_timeout: config.request_timeout,
            max_response_size: config.max_response_size,
            stream_chunk_timeout: Duration::from_millis(config.stream_chunk_timeout_ms),
        })
    }

    fn file_part(file: &FileInput) -> Result<Part, ToolError> {
        Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(|e| ToolError::Validation(format!("无效的 MIME 类型 {}：{}", file.mime, e)))
    }

    fn build_form(job: &ProcessingJob) -> Result<Form, ToolError> {
        let image = Self::file_part(&job.file)?;
        let format = job.options.output_format.as_str();
        let quality = job.options.quality().to_string();

        let form = match job.kind {
            ToolKind::Resize => Form::new()
                .part("image", image)
                .text("width", job.options.target_width.unwrap_or(0).to_string())
                .text("height", job.options.target_height.unwrap_or(0).to_string())
                .text("format", format)
                .text("quality", quality),
            ToolKind::Convert => Form::new()
                .part("image", image)
                .text("format", format)
                .text("quality", quality),
            ToolKind::Compress => Form::new()
                .part("image", image)
                .text("format", format)
                .text("quality", quality)
                .text("compress", "true"),
            ToolKind::RemoveBackground => Form::new()
                .part("image_file", image)
                .text("size", "auto"),
            ToolKind::ImageToPdf | ToolKind::QrCode => {
                return Err(ToolError::Validation(format!("{} 不是单文件工具", job.kind)));
            }
        };

        Ok(form)
    }

    /// 发送请求并读取成功响应；非成功状态按工具映射。
    async fn exchange(
        &self,
        kind: ToolKind,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<RemoteOutput, ToolError> {
        let started = Instant::now();
        log::info!(
            "🚀 提交远端处理 - 工具: {} 端点: {}",
            kind,
            redact_url_for_log(url)
        );

        let response = request
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, url, kind))?;

        let status = response.status();
        if !status.is_success() {
            let error = self.map_failure_status(kind, response).await;
            log::warn!(
                "⚠️ 远端处理失败 - 工具: {} 状态: {} 错误: {}",
                kind,
                status.as_u16(),
                error
            );
            return Err(error);
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let blob = self
            .read_body_with_limit(response, self.max_response_size, url, kind)
            .await?;

        log::info!(
            "✅ 远端处理完成 - 工具: {} 大小: {} bytes 耗时: {}ms",
            kind,
            blob.len(),
            started.elapsed().as_millis()
        );

        Ok(RemoteOutput { blob, mime })
    }

    /// 非成功状态映射。
    ///
    /// - remove.bg：402 额度耗尽、403 密钥无效，其余为 `API error: {status}`
    /// - 合成 PDF：固定通用文案
    /// - 二维码：`Server error: {status}`
    /// - 其他：响应体文本，为空时使用通用文案
    async fn map_failure_status(&self, kind: ToolKind, response: reqwest::Response) -> ToolError {
        let status = response.status().as_u16();

        match kind {
            ToolKind::RemoveBackground => match status {
                402 => ToolError::QuotaExhausted,
                403 => ToolError::InvalidCredential,
                _ => ToolError::Remote {
                    status,
                    message: format!("API error: {}", status),
                },
            },
            ToolKind::ImageToPdf => ToolError::Remote {
                status,
                message: kind.failure_message().to_string(),
            },
            ToolKind::QrCode => ToolError::Remote {
                status,
                message: format!("Server error: {}", status),
            },
            ToolKind::Resize | ToolKind::Convert | ToolKind::Compress => {
                let url = response.url().to_string();
                let text = self
                    .read_body_with_limit(response, ERROR_BODY_LIMIT, &url, kind)
                    .await
                    .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
                    .unwrap_or_default();

                ToolError::Remote {
                    status,
                    message: if text.is_empty() {
                        kind.failure_message().to_string()
                    } else {
                        text
                    },
                }
            }
        }
    }

    /// 分块读取响应体，超过上限立即中止。
    async fn read_body_with_limit(
        &self,
        response: reqwest::Response,
        limit: u64,
        url: &str,
        kind: ToolKind,
    ) -> Result<Bytes, ToolError> {
        let declared_len = response.content_length();
        if let Some(len) = declared_len {
            if len > limit {
                return Err(ToolError::ResourceLimit(format!(
                    "响应体过大：{:.2} MB（限制：{:.2} MB）",
                    len as f64 / 1024.0 / 1024.0,
                    limit as f64 / 1024.0 / 1024.0
                )));
            }
        }

        let initial_capacity = declared_len
            .map(|len| len.min(limit).min(usize::MAX as u64) as usize)
            .filter(|len| *len > 0)
            .unwrap_or(BUFFER_INITIAL_CAPACITY);
        let mut buffer = Vec::with_capacity(initial_capacity);
        let mut total: u64 = 0;
        let mut response = response;

        loop {
            let next_chunk = tokio::time::timeout(self.stream_chunk_timeout, response.chunk())
                .await
                .map_err(|_| ToolError::Timeout("响应数据流读取超时".to_string()))?;

            let Some(chunk) = next_chunk.map_err(|e| self.map_reqwest_error(e, url, kind))? else {
                break;
            };

            total = total.saturating_add(chunk.len() as u64);
            if total > limit {
                return Err(ToolError::ResourceLimit(format!(
                    "响应体超过大小限制（{:.2} MB）",
                    limit as f64 / 1024.0 / 1024.0
                )));
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(Bytes::from(buffer))
    }

    /// 统一映射 reqwest 错误，错误信息中的 URL 去掉查询参数。
    fn map_reqwest_error(&self, e: reqwest::Error, url: &str, kind: ToolKind) -> ToolError {
        let err_msg = e.to_string().replace(url, &redact_url_for_log(url));

        if e.is_timeout() {
            ToolError::Timeout(format!(
                "{}（{}秒）",
                kind.exception_message(),
                self.request_timeout
            ))
        } else if e.is_connect() {
            ToolError::Network(format!("{}：无法连接（{}）", kind.exception_message(), err_msg))
        } else {
            ToolError::Network(format!("{}：{}", kind.exception_message(), err_msg))
        }
    }
}

#[async_trait]
impl RemoteProcessor for HttpRemoteProcessor {
    async fn process(&self, job: &ProcessingJob) -> Result<RemoteOutput, ToolError> {
        let url = self.endpoints.url_for(job.kind);
        let form = Self::build_form(job)?;

        let mut request = self.client.post(&url).multipart(form);
        if job.kind == ToolKind::RemoveBackground {
            let key = self
                .endpoints
                .remove_bg_api_key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .ok_or_else(missing_remove_bg_key)?;
            request = request.header("X-Api-Key", key);
        }

        self.exchange(job.kind, request, &url).await
    }

    async fn images_to_pdf(&self, files: &[FileInput]) -> Result<RemoteOutput, ToolError> {
        if files.is_empty() {
            return Err(ToolError::Validation(
                "Please select at least one image".to_string(),
            ));
        }

        let mut form = Form::new();
        for file in files {
            form = form.part("images", Self::file_part(file)?);
        }

        let url = self.endpoints.url_for(ToolKind::ImageToPdf);
        let request = self.client.post(&url).multipart(form);
        self.exchange(ToolKind::ImageToPdf, request, &url).await
    }

    async fn generate_qr(&self, request: &QrRequest) -> Result<QrCode, ToolError> {
        request.validate()?;

        let url = self.endpoints.url_for(ToolKind::QrCode);
        let builder = self.client.post(&url).json(request);
        let output = self.exchange(ToolKind::QrCode, builder, &url).await?;

        let body: QrResponse = serde_json::from_slice(&output.blob)
            .map_err(|e| ToolError::Decode(format!("二维码响应解析失败：{}", e)))?;
        QrCode::from_data_url(body.qr_data_url)
    }

    fn has_remove_bg_key(&self) -> bool {
        self.endpoints.has_remove_bg_key()
    }
}

/// 日志用 URL：保留协议、主机、端口与路径，去掉查询参数与片段。
pub(crate) fn redact_url_for_log(url: &str) -> String {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return "<invalid-url>".to_string();
    };

    let host = parsed.host_str().unwrap_or("<unknown-host>");
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();

    format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::object_url::ObjectUrlRegistry;
    use crate::tools::source::OutputFormat;
    use base64::{Engine as _, engine::general_purpose};
    use chrono::Utc;
    use mockito::{Matcher, Server};

    fn sample_file() -> FileInput {
        FileInput::new("cat.png", "image/png", b"fake-png-bytes".to_vec())
    }

    fn candidate(registry: &ObjectUrlRegistry) -> UploadCandidate {
        let file = sample_file();
        UploadCandidate {
            preview: registry.create(file.bytes.clone()),
            file,
            dimensions: None,
            accepted_at: Utc::now(),
        }
    }

    fn processor(server: &Server) -> HttpRemoteProcessor {
        let mut endpoints = RemoteEndpoints::with_base(server.url());
        endpoints.remove_bg_url = format!("{}/v1.0/removebg", server.url());
        endpoints.remove_bg_api_key = Some("test-key".to_string());
        HttpRemoteProcessor::new(endpoints, &ToolConfig::default()).expect("client init failed")
    }

    fn job(kind: ToolKind, options: TransformOptions) -> ProcessingJob {
        ProcessingJob {
            kind,
            file: sample_file(),
            options,
        }
    }

    #[test]
    fn preflight_requires_candidate() {
        let result = preflight(ToolKind::Convert, None, &TransformOptions::default(), true);
        assert!(matches!(result, Err(ToolError::Validation(_))));
    }

    #[test]
    fn preflight_rejects_zero_dimensions() {
        let registry = ObjectUrlRegistry::new();
        let candidate = candidate(&registry);
        let mut options = TransformOptions::default();
        options.target_width = Some(0);
        options.target_height = Some(200);

        let err = preflight(ToolKind::Resize, Some(&candidate), &options, true)
            .expect_err("zero width must be rejected");

        assert_eq!(err.to_string(), "Width and height must be greater than 0");
        assert!(err.is_client_side());
    }

    #[test]
    fn preflight_rejects_missing_height() {
        let registry = ObjectUrlRegistry::new();
        let candidate = candidate(&registry);
        let mut options = TransformOptions::default();
        options.target_width = Some(100);

        let err = preflight(ToolKind::Resize, Some(&candidate), &options, true)
            .expect_err("missing height must be rejected");

        assert_eq!(
            err.to_string(),
            "Please select an image and enter both width and height"
        );
    }

    #[test]
    fn preflight_rejects_remove_bg_without_key() {
        let registry = ObjectUrlRegistry::new();
        let candidate = candidate(&registry);
        let options = TransformOptions::default();

        let err = preflight(ToolKind::RemoveBackground, Some(&candidate), &options, false)
            .expect_err("missing key must be rejected");
        assert!(err.to_string().contains("REMOVE_BG_API_KEY"));
        assert!(err.is_client_side());

        assert!(preflight(ToolKind::RemoveBackground, Some(&candidate), &options, true).is_ok());
        assert!(preflight(ToolKind::Convert, Some(&candidate), &options, false).is_ok());
    }

    #[test]
    fn http_processor_reports_key_state() {
        let mut endpoints = RemoteEndpoints::with_base("http://localhost");
        let config = ToolConfig::default();
        let without = HttpRemoteProcessor::new(endpoints.clone(), &config).expect("client init");
        assert!(!without.has_remove_bg_key());

        endpoints.remove_bg_api_key = Some("  ".to_string());
        let blank = HttpRemoteProcessor::new(endpoints.clone(), &config).expect("client init");
        assert!(!blank.has_remove_bg_key());

        endpoints.remove_bg_api_key = Some("key".to_string());
        let with = HttpRemoteProcessor::new(endpoints, &config).expect("client init");
        assert!(with.has_remove_bg_key());
    }

    #[test]
    fn endpoints_route_legacy_tools_separately() {
        let endpoints = RemoteEndpoints {
            api_base: "https://api.example.com/".to_string(),
            legacy_base: "http://localhost:5000".to_string(),
            remove_bg_url: DEFAULT_REMOVE_BG_URL.to_string(),
            remove_bg_api_key: None,
        };

        assert_eq!(endpoints.url_for(ToolKind::Resize), "https://api.example.com/resize");
        assert_eq!(
            endpoints.url_for(ToolKind::ImageToPdf),
            "https://api.example.com/image-to-pdf"
        );
        assert_eq!(endpoints.url_for(ToolKind::Compress), "http://localhost:5000/compress");
        assert_eq!(endpoints.url_for(ToolKind::QrCode), "http://localhost:5000/qr-code");
        assert_eq!(endpoints.url_for(ToolKind::RemoveBackground), DEFAULT_REMOVE_BG_URL);
    }

    #[test]
    fn debug_output_hides_api_key() {
        let mut endpoints = RemoteEndpoints::with_base("http://localhost");
        endpoints.remove_bg_api_key = Some("super-secret".to_string());
        assert!(!format!("{:?}", endpoints).contains("super-secret"));
    }

    #[test]
    fn redact_url_for_log_removes_query_and_fragment() {
        assert_eq!(
            redact_url_for_log("https://example.com:8443/resize?token=abc#frag"),
            "https://example.com:8443/resize"
        );
        assert_eq!(redact_url_for_log("not a url"), "<invalid-url>");
    }

    #[tokio::test]
    async fn resize_posts_multipart_fields() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/resize")
            .match_header(
                "content-type",
                Matcher::Regex("multipart/form-data; boundary=.*".to_string()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="image"; filename="cat.png""#.to_string()),
                Matcher::Regex("name=\"width\"\r\n\r\n400\r\n".to_string()),
                Matcher::Regex("name=\"height\"\r\n\r\n200\r\n".to_string()),
                Matcher::Regex("name=\"format\"\r\n\r\nwebp\r\n".to_string()),
                Matcher::Regex("name=\"quality\"\r\n\r\n80\r\n".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "image/webp")
            .with_body("resized-bytes")
            .create_async()
            .await;

        let mut options = TransformOptions::new(OutputFormat::Webp, 80).expect("valid options");
        options.target_width = Some(400);
        options.target_height = Some(200);

        let output = processor(&server)
            .process(&job(ToolKind::Resize, options))
            .await
            .expect("resize should succeed");

        mock.assert_async().await;
        assert_eq!(&output.blob[..], b"resized-bytes");
        assert_eq!(output.mime, "image/webp");
    }

    #[tokio::test]
    async fn compress_sends_compress_flag() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/compress")
            .match_body(Matcher::Regex("name=\"compress\"\r\n\r\ntrue\r\n".to_string()))
            .with_status(200)
            .with_body("small")
            .create_async()
            .await;

        let options = TransformOptions::new(OutputFormat::Jpeg, 75).expect("valid options");
        let output = processor(&server)
            .process(&job(ToolKind::Compress, options))
            .await
            .expect("compress should succeed");

        mock.assert_async().await;
        assert_eq!(output.mime, "application/octet-stream");
    }

    #[tokio::test]
    async fn remove_bg_sends_api_key_and_image_file() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1.0/removebg")
            .match_header("x-api-key", "test-key")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="image_file""#.to_string()),
                Matcher::Regex("name=\"size\"\r\n\r\nauto\r\n".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("transparent")
            .create_async()
            .await;

        processor(&server)
            .process(&job(ToolKind::RemoveBackground, TransformOptions::default()))
            .await
            .expect("remove background should succeed");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn remove_bg_402_maps_to_quota_exhausted() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1.0/removebg")
            .with_status(402)
            .with_body("payment required")
            .create_async()
            .await;

        let err = processor(&server)
            .process(&job(ToolKind::RemoveBackground, TransformOptions::default()))
            .await
            .expect_err("402 must fail");

        assert!(matches!(err, ToolError::QuotaExhausted));
        assert!(err.to_string().starts_with("API credits exhausted"));
    }

    #[tokio::test]
    async fn remove_bg_403_maps_to_invalid_credential() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1.0/removebg")
            .with_status(403)
            .create_async()
            .await;

        let err = processor(&server)
            .process(&job(ToolKind::RemoveBackground, TransformOptions::default()))
            .await
            .expect_err("403 must fail");

        assert!(matches!(err, ToolError::InvalidCredential));
        assert!(err.to_string().starts_with("Invalid API key"));
    }

    #[tokio::test]
    async fn remove_bg_other_status_is_generic() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1.0/removebg")
            .with_status(500)
            .create_async()
            .await;

        let err = processor(&server)
            .process(&job(ToolKind::RemoveBackground, TransformOptions::default()))
            .await
            .expect_err("500 must fail");

        assert_eq!(err.to_string(), "API error: 500");
    }

    #[tokio::test]
    async fn remove_bg_without_key_never_hits_network() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1.0/removebg")
            .expect(0)
            .create_async()
            .await;

        let mut endpoints = RemoteEndpoints::with_base(server.url());
        endpoints.remove_bg_url = format!("{}/v1.0/removebg", server.url());
        let processor = HttpRemoteProcessor::new(endpoints, &ToolConfig::default())
            .expect("client init failed");

        let err = processor
            .process(&job(ToolKind::RemoveBackground, TransformOptions::default()))
            .await
            .expect_err("missing key must fail");

        mock.assert_async().await;
        assert!(err.is_client_side());
    }

    #[tokio::test]
    async fn convert_failure_surfaces_body_text() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/convert")
            .with_status(422)
            .with_body("unsupported color profile")
            .create_async()
            .await;

        let err = processor(&server)
            .process(&job(ToolKind::Convert, TransformOptions::default()))
            .await
            .expect_err("422 must fail");

        assert!(matches!(err, ToolError::Remote { status: 422, .. }));
        assert_eq!(err.to_string(), "unsupported color profile");
    }

    #[tokio::test]
    async fn convert_failure_with_empty_body_uses_generic_message() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/convert")
            .with_status(500)
            .create_async()
            .await;

        let err = processor(&server)
            .process(&job(ToolKind::Convert, TransformOptions::default()))
            .await
            .expect_err("500 must fail");

        assert_eq!(err.to_string(), "Failed to convert image");
    }

    #[tokio::test]
    async fn images_to_pdf_sends_files_in_order() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/image-to-pdf")
            .match_body(Matcher::Regex(
                r#"(?s)filename="first.png".*filename="second.jpg""#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.4")
            .create_async()
            .await;

        let files = vec![
            FileInput::new("first.png", "image/png", b"one".to_vec()),
            FileInput::new("second.jpg", "image/jpeg", b"two".to_vec()),
        ];
        let output = processor(&server)
            .images_to_pdf(&files)
            .await
            .expect("pdf should succeed");

        mock.assert_async().await;
        assert_eq!(output.mime, "application/pdf");
    }

    #[tokio::test]
    async fn images_to_pdf_failure_uses_generic_message() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/image-to-pdf")
            .with_status(500)
            .with_body("stack trace")
            .create_async()
            .await;

        let err = processor(&server)
            .images_to_pdf(&[sample_file()])
            .await
            .expect_err("500 must fail");

        assert_eq!(err.to_string(), ToolKind::ImageToPdf.failure_message());
    }

    #[tokio::test]
    async fn generate_qr_decodes_data_url() {
        let png = [137_u8, 80, 78, 71, 13, 10, 26, 10];
        let body = format!(
            r#"{{"qrDataUrl":"data:image/png;base64,{}"}}"#,
            general_purpose::STANDARD.encode(png)
        );

        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/qr-code")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "text": "https://example.com",
                "size": 256,
                "fgColor": "#000000",
                "bgColor": "#ffffff"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let code = processor(&server)
            .generate_qr(&QrRequest::new("https://example.com"))
            .await
            .expect("qr should succeed");

        mock.assert_async().await;
        assert_eq!(&code.png[..], &png);
    }

    #[tokio::test]
    async fn generate_qr_failure_reports_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/qr-code")
            .with_status(503)
            .create_async()
            .await;

        let err = processor(&server)
            .generate_qr(&QrRequest::new("hello"))
            .await
            .expect_err("503 must fail");

        assert_eq!(err.to_string(), "Server error: 503");
    }

    #[tokio::test]
    async fn oversized_response_is_rejected() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/convert")
            .with_status(200)
            .with_body(vec![b'x'; 4096])
            .create_async()
            .await;

        let config = ToolConfig {
            max_file_size: 1024,
            max_response_size: 2048,
            ..ToolConfig::default()
        };
        let processor = HttpRemoteProcessor::new(RemoteEndpoints::with_base(server.url()), &config)
            .expect("client init failed");

        let err = processor
            .process(&job(ToolKind::Convert, TransformOptions::default()))
            .await
            .expect_err("oversized body must fail");

        assert!(matches!(err, ToolError::ResourceLimit(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let processor = HttpRemoteProcessor::new(
            RemoteEndpoints::with_base("http://127.0.0.1:1"),
            &ToolConfig::default(),
        )
        .expect("client init failed");

        let err = processor
            .process(&job(ToolKind::Convert, TransformOptions::default()))
            .await
            .expect_err("connection must fail");

        assert!(matches!(err, ToolError::Network(_) | ToolError::Timeout(_)));
        assert!(err.to_string().contains("An error occurred while converting"));
    }
}
