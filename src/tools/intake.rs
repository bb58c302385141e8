//! # 入口校验模块
//!
//! ## 设计思路
//!
//! 选择文件与拖入文件最终都归一为 `FileInput`，在“尽可能早”的阶段执行校验：
//! 目标是尽快失败，减少不必要的内存与网络消耗。
//!
//! ## 实现思路
//!
//! - 本地路径：存在性 + metadata 体积限制 + 读取 + 签名识别 MIME。
//! - 通用校验：MIME 必须以 `image/` 开头，体积不超过上限。
//! - 需要尺寸的工具：在阻塞线程池里只读图片头拿宽高，不做完整解码。
//! - 校验通过后登记预览引用，生成 `UploadCandidate`。

use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use chrono::Utc;

use super::object_url::ObjectUrlRegistry;
use super::source::{Dimensions, FileInput, UploadCandidate};
use super::{ToolConfig, ToolError};

impl FileInput {
    /// 以“点击选择”方式从本地路径读取文件。
    ///
    /// MIME 优先按文件签名识别，识别失败时回退到扩展名。
    pub fn from_path(path: impl AsRef<Path>, max_file_size: u64) -> Result<Self, ToolError> {
        let path = path.as_ref();
        log::info!("📁 开始读取本地文件 - 路径: {}", path.display());

        if !path.exists() {
            return Err(ToolError::FileSystem(format!("文件不存在：{}", path.display())));
        }

        let metadata = std::fs::metadata(path)
            .map_err(|e| ToolError::FileSystem(format!("无法读取文件信息：{}", e)))?;

        if metadata.len() > max_file_size {
            return Err(ToolError::FileTooLarge {
                size: metadata.len(),
                limit: max_file_size,
            });
        }

        let bytes = std::fs::read(path)
            .map_err(|e| ToolError::FileSystem(format!("无法读取文件：{}", e)))?;

        let mime = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or_else(|| Self::mime_from_extension(path))
            .to_string();

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();

        Ok(Self {
            name,
            mime,
            bytes: Bytes::from(bytes),
            source_hint: "picker",
        })
    }
}

/// 入口校验器。
#[derive(Debug, Clone)]
pub struct Intake {
    max_file_size: u64,
}

impl Intake {
    pub fn new(config: &ToolConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
        }
    }

    /// 同步校验：MIME 前缀与体积上限。
    pub fn validate(&self, input: &FileInput) -> Result<(), ToolError> {
        if !is_image_mime(&input.mime) {
            return Err(ToolError::InvalidFileType(if input.mime.is_empty() {
                "<unknown>".to_string()
            } else {
                input.mime.clone()
            }));
        }

        if input.len() > self.max_file_size {
            return Err(ToolError::FileTooLarge {
                size: input.len(),
                limit: self.max_file_size,
            });
        }

        Ok(())
    }

    /// 校验并生成待提交文件。
    ///
    /// `probe_dimensions` 为真时读取图片固有宽高（缩放工具需要）。
    pub async fn accept(
        &self,
        input: FileInput,
        registry: &ObjectUrlRegistry,
        probe_dimensions: bool,
    ) -> Result<UploadCandidate, ToolError> {
        self.validate(&input)?;

        let dimensions = if probe_dimensions {
            let bytes = input.bytes.clone();
            let dims = tokio::task::spawn_blocking(move || inspect_dimensions(&bytes))
                .await
                .map_err(|e| ToolError::ResourceLimit(format!("尺寸读取线程执行失败：{}", e)))??;
            Some(dims)
        } else {
            None
        };

        log::info!(
            "✅ 文件已接收 - 来源: {} 名称: {} 类型: {} 体积: {} bytes 尺寸: {}",
            input.source_hint,
            input.name,
            input.mime,
            input.len(),
            dimensions
                .map(|d| format!("{}x{}", d.width, d.height))
                .unwrap_or_else(|| "-".to_string())
        );

        let preview = registry.create(input.bytes.clone());
        Ok(UploadCandidate {
            file: input,
            preview,
            dimensions,
            accepted_at: Utc::now(),
        })
    }
}

fn is_image_mime(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("image/")
}

/// 仅通过图片头信息读取宽高。
pub(crate) fn inspect_dimensions(bytes: &[u8]) -> Result<Dimensions, ToolError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ToolError::Decode(format!("无法识别图片格式：{}", e)))?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ToolError::Decode(format!("无法读取图片尺寸：{}", e)))?;

    Ok(Dimensions::new(width, height))
}
