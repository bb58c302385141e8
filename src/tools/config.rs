//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ToolConfig`，保证运行时行为可观测、可调整、可测试。
//! 页面上的“快速预设”（压缩档位、社交平台尺寸）作为高层语义，映射到底层参数。
//!
//! ## 实现思路
//!
//! - `Default` 提供与原页面一致的限制（单文件 10MB）。
//! - `CompressionPreset` 负责档位字符串解析与反向输出。
//! - `ResizePreset` 是静态表，只提供宽高，不触碰任何像素。

use super::ToolError;

/// 单个文件允许的最大体积（10MB）。
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// 工具链路配置。
///
/// 字段覆盖了入口校验、网络请求与批量压缩三个阶段。
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// 选择/拖入文件时允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 远端处理结果允许的最大体积（字节）。
    pub max_response_size: u64,
    /// 单次请求总超时（秒）。
    pub request_timeout: u64,
    /// 建立连接（TCP/TLS）超时时间（秒）。
    pub connect_timeout: u64,
    /// 响应体分块读取超时（毫秒）。
    pub stream_chunk_timeout_ms: u64,
    /// 批量压缩同时在途的请求上限。
    pub batch_concurrency: usize,
    /// 剪贴板写入失败时最大重试次数。
    pub clipboard_retries: u32,
    /// 重试间隔（毫秒）。
    pub clipboard_retry_delay: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_response_size: 100 * 1024 * 1024,
            request_timeout: 120,
            connect_timeout: 8,
            stream_chunk_timeout_ms: 30_000,
            batch_concurrency: 4,
            clipboard_retries: 3,
            clipboard_retry_delay: 100,
        }
    }
}

impl ToolConfig {
    /// 校验配置取值范围。
    pub fn validate(&self) -> Result<(), ToolError> {
        if self.max_file_size == 0 {
            return Err(ToolError::Validation("max_file_size 必须大于 0".to_string()));
        }
        if self.max_response_size < self.max_file_size {
            return Err(ToolError::Validation(
                "max_response_size 不能小于 max_file_size".to_string(),
            ));
        }
        if !(1..=600).contains(&self.request_timeout) {
            return Err(ToolError::Validation("request_timeout 必须在 1~600 秒之间".to_string()));
        }
        if !(1..=120).contains(&self.connect_timeout) {
            return Err(ToolError::Validation("connect_timeout 必须在 1~120 秒之间".to_string()));
        }
        if !(1..=600_000).contains(&self.stream_chunk_timeout_ms) {
            return Err(ToolError::Validation(
                "stream_chunk_timeout_ms 必须在 1~600000 毫秒之间".to_string(),
            ));
        }
        if !(1..=64).contains(&self.batch_concurrency) {
            return Err(ToolError::Validation("batch_concurrency 必须在 1~64 之间".to_string()));
        }
        Ok(())
    }
}

/// 压缩档位（面向用户语义）。
///
/// - `HighQuality`：90
/// - `Balanced`：75（压缩页默认值）
/// - `Maximum`：50
/// - `Extreme`：30
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionPreset {
    HighQuality,
    Balanced,
    Maximum,
    Extreme,
}

impl CompressionPreset {
    pub const ALL: [CompressionPreset; 4] = [
        Self::HighQuality,
        Self::Balanced,
        Self::Maximum,
        Self::Extreme,
    ];

    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use image_toolbox::tools::CompressionPreset;
    ///
    /// let p = CompressionPreset::from_str("balanced")?;
    /// assert_eq!(p.quality(), 75);
    /// # Ok::<(), image_toolbox::tools::ToolError>(())
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(preset: &str) -> Result<Self, ToolError> {
        match preset.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "high-quality" | "high" => Ok(Self::HighQuality),
            "balanced" => Ok(Self::Balanced),
            "maximum" | "max" => Ok(Self::Maximum),
            "extreme" => Ok(Self::Extreme),
            other => Err(ToolError::Validation(format!(
                "未知压缩档位：{}（可选：high-quality / balanced / maximum / extreme）",
                other
            ))),
        }
    }

    /// 输出稳定字符串。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HighQuality => "high-quality",
            Self::Balanced => "balanced",
            Self::Maximum => "maximum",
            Self::Extreme => "extreme",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::HighQuality => "High Quality",
            Self::Balanced => "Balanced",
            Self::Maximum => "Maximum",
            Self::Extreme => "Extreme",
        }
    }

    /// 档位对应的质量百分比。
    pub fn quality(self) -> u8 {
        match self {
            Self::HighQuality => 90,
            Self::Balanced => 75,
            Self::Maximum => 50,
            Self::Extreme => 30,
        }
    }
}

/// 常用社交平台尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePreset {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const RESIZE_PRESETS: [ResizePreset; 6] = [
    ResizePreset {
        name: "Instagram Square",
        width: 1080,
        height: 1080,
    },
    ResizePreset {
        name: "Instagram Story",
        width: 1080,
        height: 1920,
    },
    ResizePreset {
        name: "Twitter",
        width: 1200,
        height: 630,
    },
    ResizePreset {
        name: "LinkedIn",
        width: 1200,
        height: 628,
    },
    ResizePreset {
        name: "Facebook",
        width: 1200,
        height: 630,
    },
    ResizePreset {
        name: "YouTube Thumbnail",
        width: 1280,
        height: 720,
    },
];

impl ResizePreset {
    /// 按名称查找（忽略大小写与空白/连字符差异）。
    pub fn find(name: &str) -> Option<ResizePreset> {
        let wanted = normalize_preset_name(name);
        RESIZE_PRESETS
            .iter()
            .copied()
            .find(|preset| normalize_preset_name(preset.name) == wanted)
    }
}

fn normalize_preset_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
