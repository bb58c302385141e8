//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入”和“流水线中间结果”解耦：
//! - `FileInput` 表示选择或拖入的原始文件（尚未校验）
//! - `UploadCandidate` 表示通过校验、可提交的文件
//! - `TransformOptions` 表示用户实时调整的输出参数
//! - `ProcessingResult` 表示远端处理成功后的二进制结果

use std::fmt;
use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ToolError;
use super::object_url::ObjectUrl;

/// 工具种类，每种对应一个远端端点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    Resize,
    Convert,
    Compress,
    RemoveBackground,
    ImageToPdf,
    QrCode,
}

impl ToolKind {
    /// 相对于 API 基础地址的路径；抠图走独立配置的完整地址，返回 `None`。
    pub fn endpoint_path(self) -> Option<&'static str> {
        match self {
            Self::Resize => Some("/resize"),
            Self::Convert => Some("/convert"),
            Self::Compress => Some("/compress"),
            Self::RemoveBackground => None,
            Self::ImageToPdf => Some("/image-to-pdf"),
            Self::QrCode => Some("/qr-code"),
        }
    }

    /// 远端失败且响应体为空时的通用提示。
    pub fn failure_message(self) -> &'static str {
        match self {
            Self::Resize => "Failed to resize image",
            Self::Convert => "Failed to convert image",
            Self::Compress => "Failed to compress image",
            Self::RemoveBackground => "Failed to remove background. Please try again.",
            Self::ImageToPdf => "Failed to convert images to PDF. Please try again.",
            Self::QrCode => "Failed to generate QR code",
        }
    }

    /// 网络异常时的通用提示。
    pub fn exception_message(self) -> &'static str {
        match self {
            Self::Resize => "An error occurred while resizing",
            Self::Convert => "An error occurred while converting",
            Self::Compress => "An error occurred while compressing",
            Self::RemoveBackground => "Failed to remove background. Please try again.",
            Self::ImageToPdf => "Failed to convert images. Please try again.",
            Self::QrCode => "Failed to generate QR code",
        }
    }

    /// 该工具在入口处是否需要读取图片宽高。
    pub fn needs_dimensions(self) -> bool {
        matches!(self, Self::Resize)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resize => "resize",
            Self::Convert => "convert",
            Self::Compress => "compress",
            Self::RemoveBackground => "remove-background",
            Self::ImageToPdf => "image-to-pdf",
            Self::QrCode => "qr-code",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 输出格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(format: &str) -> Result<Self, ToolError> {
        match format.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(ToolError::Validation(format!(
                "未知输出格式：{}（可选：png / jpeg / webp）",
                other
            ))),
        }
    }

    /// 多部分表单里使用的取值，同时也是文件扩展名。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    /// 是否为有损格式（质量滑块只对有损格式有意义）。
    pub fn is_lossy(self) -> bool {
        !matches!(self, Self::Png)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 图片固有宽高（像素）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// 选择或拖入的原始文件。
#[derive(Debug, Clone)]
pub struct FileInput {
    /// 文件名（用于派生下载文件名）。
    pub name: String,
    /// 声明的 MIME 类型。
    pub mime: String,
    /// 原始字节。
    pub bytes: Bytes,
    /// 来源提示（用于日志与诊断）。
    pub source_hint: &'static str,
}

impl FileInput {
    /// 以拖放方式构造：MIME 由调用方声明。
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
            source_hint: "drop",
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 由文件名推断扩展名对应的 MIME（签名无法识别时的兜底）。
    pub(crate) fn mime_from_extension(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "tif" | "tiff" => "image/tiff",
            "svg" => "image/svg+xml",
            "avif" => "image/avif",
            "ico" => "image/x-icon",
            "pdf" => "application/pdf",
            "txt" => "text/plain",
            _ => "application/octet-stream",
        }
    }
}

/// 通过校验的待提交文件。
///
/// 每个工具实例同一时刻至多持有一个；重新选择或重置时整体丢弃，
/// 预览引用随之释放。
#[derive(Debug)]
pub struct UploadCandidate {
    pub file: FileInput,
    pub preview: ObjectUrl,
    pub dimensions: Option<Dimensions>,
    pub accepted_at: DateTime<Utc>,
}

impl UploadCandidate {
    pub fn original_bytes(&self) -> u64 {
        self.file.len()
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }
}

/// 用户选择的输出参数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOptions {
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,
    pub output_format: OutputFormat,
    quality: u8,
    pub aspect_locked: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            target_width: None,
            target_height: None,
            output_format: OutputFormat::Png,
            quality: 80,
            aspect_locked: false,
        }
    }
}

impl TransformOptions {
    pub fn new(output_format: OutputFormat, quality: u8) -> Result<Self, ToolError> {
        let mut options = Self {
            output_format,
            ..Self::default()
        };
        options.set_quality(quality)?;
        Ok(options)
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// 质量必须在 1~100 之间。
    pub fn set_quality(&mut self, quality: u8) -> Result<(), ToolError> {
        if !(1..=100).contains(&quality) {
            return Err(ToolError::Validation(format!(
                "quality 必须在 1~100 之间（当前：{}）",
                quality
            )));
        }
        self.quality = quality;
        Ok(())
    }

    /// 将宽高初始化为图片固有尺寸。
    pub fn reset_to(&mut self, dimensions: Dimensions) {
        self.target_width = Some(dimensions.width);
        self.target_height = Some(dimensions.height);
    }

    /// 修改宽度；锁定宽高比时按原图比例重算高度。
    pub fn set_width(&mut self, width: Option<u32>, original: Option<Dimensions>) {
        self.target_width = width;
        if !self.aspect_locked {
            return;
        }
        if let (Some(w), Some(orig)) = (width, original) {
            if w > 0 && orig.width > 0 {
                self.target_height = Some(scale_side(w, orig.width, orig.height));
            }
        }
    }

    /// 修改高度；锁定宽高比时按原图比例重算宽度。
    pub fn set_height(&mut self, height: Option<u32>, original: Option<Dimensions>) {
        self.target_height = height;
        if !self.aspect_locked {
            return;
        }
        if let (Some(h), Some(orig)) = (height, original) {
            if h > 0 && orig.height > 0 {
                self.target_width = Some(scale_side(h, orig.height, orig.width));
            }
        }
    }

    pub fn target_dimensions(&self) -> Option<Dimensions> {
        match (self.target_width, self.target_height) {
            (Some(w), Some(h)) => Some(Dimensions::new(w, h)),
            _ => None,
        }
    }
}

/// `round(new / original_side * other_side)`，四舍五入到整数像素。
fn scale_side(new_side: u32, original_side: u32, other_side: u32) -> u32 {
    let scaled = (new_side as f64 / original_side as f64) * other_side as f64;
    scaled.round().clamp(0.0, u32::MAX as f64) as u32
}

/// 远端处理成功后的结果。
#[derive(Debug)]
pub struct ProcessingResult {
    pub kind: ToolKind,
    pub blob: Bytes,
    pub mime: String,
    pub result_url: ObjectUrl,
    pub original_bytes: u64,
    pub result_bytes: u64,
    pub file_name: String,
}

/// 远端返回的原始结果，尚未登记对象引用。
#[derive(Debug, Clone)]
pub struct RemoteOutput {
    pub blob: Bytes,
    pub mime: String,
}
