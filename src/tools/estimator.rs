//! # 本地体积估算
//!
//! 纯函数：只依赖原始体积、输出格式、质量与像素比例，不读取任何像素，
//! 每次滑块移动或按键都可以直接重算。数值是经验系数的线性插值，仅供展示。

use serde::Serialize;

use super::source::{Dimensions, OutputFormat, TransformOptions, UploadCandidate};

/// 无损格式保留的体积比例。
const LOSSLESS_FRACTION: f64 = 0.85;
const JPEG_FRACTION_RANGE: (f64, f64) = (0.30, 0.70);
const WEBP_FRACTION_RANGE: (f64, f64) = (0.25, 0.55);

/// 输出体积与原体积之比。
pub fn format_fraction(format: OutputFormat, quality: u8) -> f64 {
    let q = quality.min(100) as f64 / 100.0;
    match format {
        OutputFormat::Png => LOSSLESS_FRACTION,
        OutputFormat::Jpeg => lerp(JPEG_FRACTION_RANGE, q),
        OutputFormat::Webp => lerp(WEBP_FRACTION_RANGE, q),
    }
}

fn lerp((low, high): (f64, f64), t: f64) -> f64 {
    low + t * (high - low)
}

/// 目标像素面积 / 原始像素面积；任一方未知或为 0 时视为 1。
pub fn pixel_ratio(original: Option<Dimensions>, target: Option<Dimensions>) -> f64 {
    match (original, target) {
        (Some(orig), Some(target)) if orig.pixels() > 0 && target.pixels() > 0 => {
            target.pixels() as f64 / orig.pixels() as f64
        }
        _ => 1.0,
    }
}

/// 估算输出体积（字节）。
///
/// # 示例
/// ```rust
/// use image_toolbox::tools::{estimate_output_bytes, OutputFormat};
///
/// assert_eq!(estimate_output_bytes(1_000_000, OutputFormat::Png, 80, 1.0), 850_000);
/// ```
pub fn estimate_output_bytes(
    original_bytes: u64,
    format: OutputFormat,
    quality: u8,
    pixel_ratio: f64,
) -> u64 {
    let ratio = if pixel_ratio.is_finite() && pixel_ratio >= 0.0 {
        pixel_ratio
    } else {
        1.0
    };
    let estimated = original_bytes as f64 * ratio * format_fraction(format, quality);
    estimated.round().clamp(0.0, u64::MAX as f64) as u64
}

/// 派生的估算结果，不持久化。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EstimatedOutcome {
    pub estimated_bytes: u64,
}

impl EstimatedOutcome {
    /// 针对当前候选文件与参数估算。
    ///
    /// `resizing` 为真时，若宽高尚未填写则直接返回原体积。
    pub fn for_candidate(
        candidate: &UploadCandidate,
        options: &TransformOptions,
        resizing: bool,
    ) -> Self {
        let original = candidate.original_bytes();

        if resizing {
            let Some(target) = options.target_dimensions() else {
                return Self { estimated_bytes: original };
            };
            if target.width == 0 || target.height == 0 {
                return Self { estimated_bytes: original };
            }
            let ratio = pixel_ratio(candidate.dimensions, Some(target));
            return Self {
                estimated_bytes: estimate_output_bytes(
                    original,
                    options.output_format,
                    options.quality(),
                    ratio,
                ),
            };
        }

        Self {
            estimated_bytes: estimate_output_bytes(
                original,
                options.output_format,
                options.quality(),
                1.0,
            ),
        }
    }
}
