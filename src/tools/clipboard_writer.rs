//! # 剪贴板写入模块
//!
//! ## 设计思路
//!
//! 生成好的二维码除了下载，还可以直接复制到系统剪贴板。
//! 与操作系统剪贴板的交互不稳定（其他程序可能正占用剪贴板），因此：
//! - PNG 解码为 RGBA 在打开剪贴板之前完成
//! - 写入在阻塞线程池执行，避免阻塞 async 运行时
//! - 失败时按指数退避 + 抖动有限重试，区分可重试与不可重试错误

use std::borrow::Cow;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{ToolConfig, ToolError};

/// 单次退避的上限（毫秒）。
const RETRY_MAX_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClipboardFailureKind {
    Busy,
    Fatal,
}

#[derive(Debug, Clone)]
struct ClipboardWriteFailure {
    kind: ClipboardFailureKind,
    message: String,
}

impl ClipboardWriteFailure {
    fn busy(message: impl Into<String>) -> Self {
        Self {
            kind: ClipboardFailureKind::Busy,
            message: message.into(),
        }
    }

    fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: ClipboardFailureKind::Fatal,
            message: message.into(),
        }
    }

    fn is_retryable(&self) -> bool {
        self.kind == ClipboardFailureKind::Busy
    }
}

/// 解码后的 RGBA 像素。
#[derive(Debug, Clone)]
pub struct RgbaImage {
    pub width: usize,
    pub height: usize,
    pub bytes: Vec<u8>,
}

impl RgbaImage {
    /// 将 PNG（或其他可识别格式）解码为 RGBA8。
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, ToolError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| ToolError::Decode(format!("图片解码失败：{}", e)))?
            .to_rgba8();

        Ok(Self {
            width: decoded.width() as usize,
            height: decoded.height() as usize,
            bytes: decoded.into_raw(),
        })
    }
}

/// 第 `retry` 次重试前的等待：按 2 的幂增长并封顶，再叠加至多三分之一的抖动。
fn retry_delay_ms(base_ms: u64, retry: u32, max_ms: u64, entropy: u64) -> u64 {
    let factor = 1_u64 << retry.saturating_sub(1).min(8);
    let delay = base_ms.saturating_mul(factor).min(max_ms.max(base_ms));
    delay.saturating_add(entropy % (delay / 3 + 1))
}

fn clock_entropy() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0)
}

/// 将编码后的图片复制到系统剪贴板（含重试）。
pub async fn copy_image_to_clipboard(png: &[u8], config: &ToolConfig) -> Result<(), ToolError> {
    let image = RgbaImage::from_encoded(png)?;
    log::debug!("📋 准备复制到剪贴板 - {}x{}", image.width, image.height);

    let retries = config.clipboard_retries;
    let retry_delay = config.clipboard_retry_delay;

    tokio::task::spawn_blocking(move || write_image_with_retry(&image, retries, retry_delay))
        .await
        .map_err(|e| ToolError::Clipboard(format!("线程执行失败：{}", e)))?
}

fn write_image_with_retry(
    image: &RgbaImage,
    retries: u32,
    retry_delay: u64,
) -> Result<(), ToolError> {
    let attempts = retries.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            let base = retry_delay.max(1);
            let wait_ms = retry_delay_ms(base, attempt - 1, RETRY_MAX_DELAY_MS, clock_entropy());
            log::debug!("🔄 重试 {}/{}，等待 {}ms", attempt, attempts, wait_ms);
            std::thread::sleep(Duration::from_millis(wait_ms));
        }

        match try_write(image) {
            Ok(()) => {
                log::info!("✅ 复制成功 (尝试 {})", attempt);
                return Ok(());
            }
            Err(failure) => {
                log::warn!(
                    "❌ 尝试 {} 失败: {}（kind={:?}）",
                    attempt,
                    failure.message,
                    failure.kind
                );
                let retryable = failure.is_retryable();
                last_error = Some(failure.message);
                if !retryable {
                    log::warn!("🛑 非可重试错误，提前终止重试");
                    break;
                }
            }
        }
    }

    Err(ToolError::Clipboard(
        last_error.unwrap_or_else(|| "未知错误".to_string()),
    ))
}

fn try_write(image: &RgbaImage) -> Result<(), ClipboardWriteFailure> {
    let mut clipboard = arboard::Clipboard::new()
        .map_err(|e| ClipboardWriteFailure::busy(format!("无法访问剪贴板：{}", e)))?;

    let data = arboard::ImageData {
        width: image.width,
        height: image.height,
        bytes: Cow::Borrowed(&image.bytes),
    };

    clipboard.set_image(data).map_err(|e| match e {
        arboard::Error::ConversionFailure => ClipboardWriteFailure::fatal("图片格式转换失败"),
        other => ClipboardWriteFailure::busy(format!("复制失败：{}", other)),
    })
}
