//! # 结果展示模块
//!
//! ## 设计思路
//!
//! 把远端返回的二进制结果转换成用户可感知的东西：
//! - 派生下载文件名并落盘（对应页面上的“下载”）
//! - 计算体积变化百分比，增大与减小分开表述
//! - 生成状态提示文案，样式由显式传入的 `Presentation` 决定，而不是全局主题

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::source::{OutputFormat, ProcessingResult, ToolKind, TransformOptions};
use super::ToolError;
use crate::settings::Presentation;

/// 体积变化方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SavingsDirection {
    Smaller,
    Larger,
    Unchanged,
}

/// 体积变化统计：`(1 - result / original) * 100`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Savings {
    /// 变化幅度（非负，保留原始精度）。
    pub percent: f64,
    pub direction: SavingsDirection,
}

impl Savings {
    pub fn between(original_bytes: u64, result_bytes: u64) -> Self {
        if original_bytes == 0 {
            return Self {
                percent: 0.0,
                direction: if result_bytes == 0 {
                    SavingsDirection::Unchanged
                } else {
                    SavingsDirection::Larger
                },
            };
        }

        let raw = (1.0 - result_bytes as f64 / original_bytes as f64) * 100.0;
        let direction = if result_bytes < original_bytes {
            SavingsDirection::Smaller
        } else if result_bytes > original_bytes {
            SavingsDirection::Larger
        } else {
            SavingsDirection::Unchanged
        };

        Self {
            percent: raw.abs(),
            direction,
        }
    }
}

impl fmt::Display for Savings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SavingsDirection::Smaller => write!(f, "{:.1}% smaller", self.percent),
            SavingsDirection::Larger => write!(f, "{:.1}% larger", self.percent),
            SavingsDirection::Unchanged => f.write_str("no size change"),
        }
    }
}

/// 人类可读体积（1024 进制，最多两位小数，去掉尾随 0）。
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    const UNITS: [&str; 3] = ["B", "KB", "MB"];
    let k = 1024_f64;
    let value = bytes as f64;
    let exponent = ((value.ln() / k.ln()).floor() as usize).min(UNITS.len() - 1);
    let scaled = (value / k.powi(exponent as i32) * 100.0).round() / 100.0;

    let mut text = format!("{:.2}", scaled);
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }

    format!("{} {}", text, UNITS[exponent])
}

/// 按工具派生下载文件名。
pub fn download_file_name(
    kind: ToolKind,
    options: &TransformOptions,
    original_name: Option<&str>,
) -> String {
    match kind {
        ToolKind::Resize => format!(
            "resized-{}x{}.{}",
            options.target_width.unwrap_or(0),
            options.target_height.unwrap_or(0),
            options.output_format
        ),
        ToolKind::Convert => format!("converted-image.{}", options.output_format),
        ToolKind::Compress => compressed_file_name(options.output_format, original_name),
        ToolKind::RemoveBackground => format!(
            "background_removed_{}",
            sanitize_file_name(original_name.unwrap_or("image.png"))
        ),
        ToolKind::ImageToPdf => "images.pdf".to_string(),
        ToolKind::QrCode => format!("qr-code-{}.png", chrono::Utc::now().timestamp_millis()),
    }
}

/// 单文件压缩沿用 `compressed.{fmt}`；批量时带上原文件名避免互相覆盖。
fn compressed_file_name(format: OutputFormat, original_name: Option<&str>) -> String {
    match original_name {
        Some(name) => {
            let stem = Path::new(name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("image");
            format!("compressed-{}.{}", sanitize_file_name(stem), format)
        }
        None => format!("compressed.{}", format),
    }
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.trim().is_empty() || cleaned == "." || cleaned == ".." {
        "image".to_string()
    } else {
        cleaned
    }
}

/// 将结果写入目录，返回最终路径。
pub async fn save_result(result: &ProcessingResult, dir: &Path) -> Result<PathBuf, ToolError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ToolError::FileSystem(format!("创建输出目录失败：{}", e)))?;

    let path = dir.join(&result.file_name);
    tokio::fs::write(&path, &result.blob)
        .await
        .map_err(|e| ToolError::FileSystem(format!("写入结果文件失败：{}", e)))?;

    log::info!(
        "💾 结果已保存 - {} ({} bytes)",
        path.display(),
        result.result_bytes
    );
    Ok(path)
}

/// 生成成功提示文案。
pub fn success_message(
    result: &ProcessingResult,
    options: &TransformOptions,
    presentation: Presentation,
) -> String {
    let savings = Savings::between(result.original_bytes, result.result_bytes);
    let size = format_file_size(result.result_bytes);

    let body = match result.kind {
        ToolKind::Resize => format!(
            "Resized {}x{}! Size: {} ({})",
            options.target_width.unwrap_or(0),
            options.target_height.unwrap_or(0),
            size,
            savings
        ),
        ToolKind::Convert => format!(
            "Converted to {}! Size: {} ({})",
            options.output_format.as_str().to_uppercase(),
            size,
            savings
        ),
        ToolKind::Compress => format!(
            "Compressed! {} → {} ({})",
            format_file_size(result.original_bytes),
            size,
            savings
        ),
        ToolKind::RemoveBackground => format!("Background removed! Size: {}", size),
        ToolKind::ImageToPdf => format!("Conversion Complete! PDF size: {}", size),
        ToolKind::QrCode => "QR code generated successfully!".to_string(),
    };

    presentation.decorate_success(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::object_url::ObjectUrlRegistry;
    use bytes::Bytes;

    #[test]
    fn savings_reports_shrinkage() {
        let savings = Savings::between(2_400_000, 400_000);
        assert_eq!(savings.direction, SavingsDirection::Smaller);
        assert_eq!(savings.to_string(), "83.3% smaller");
    }

    #[test]
    fn savings_reports_growth_distinctly() {
        let savings = Savings::between(1_000, 1_250);
        assert_eq!(savings.direction, SavingsDirection::Larger);
        assert_eq!(savings.to_string(), "25.0% larger");
    }

    #[test]
    fn savings_handles_zero_original() {
        assert_eq!(Savings::between(0, 0).direction, SavingsDirection::Unchanged);
        assert_eq!(Savings::between(0, 10).direction, SavingsDirection::Larger);
        assert_eq!(Savings::between(10, 10).to_string(), "no size change");
    }

    #[test]
    fn file_size_formatting_matches_page_output() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2_400_000), "2.29 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024), "5120 MB");
    }

    #[test]
    fn file_names_follow_tool_conventions() {
        let mut options = TransformOptions::new(OutputFormat::Webp, 80).expect("valid options");
        options.target_width = Some(400);
        options.target_height = Some(200);

        assert_eq!(
            download_file_name(ToolKind::Resize, &options, Some("cat.png")),
            "resized-400x200.webp"
        );
        assert_eq!(
            download_file_name(ToolKind::Convert, &options, Some("cat.png")),
            "converted-image.webp"
        );
        assert_eq!(download_file_name(ToolKind::Compress, &options, None), "compressed.webp");
        assert_eq!(
            download_file_name(ToolKind::Compress, &options, Some("cat.png")),
            "compressed-cat.webp"
        );
        assert_eq!(
            download_file_name(ToolKind::RemoveBackground, &options, Some("a/b.png")),
            "background_removed_a_b.png"
        );
        assert!(download_file_name(ToolKind::QrCode, &options, None).starts_with("qr-code-"));
    }

    #[tokio::test]
    async fn save_result_writes_blob() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let registry = ObjectUrlRegistry::new();
        let blob = Bytes::from_static(b"result-bytes");
        let result = ProcessingResult {
            kind: ToolKind::Convert,
            blob: blob.clone(),
            mime: "image/png".to_string(),
            result_url: registry.create(blob.clone()),
            original_bytes: 100,
            result_bytes: blob.len() as u64,
            file_name: "converted-image.png".to_string(),
        };

        let path = save_result(&result, dir.path()).await.expect("save should succeed");

        assert_eq!(std::fs::read(path).expect("read back"), b"result-bytes");
    }

    #[test]
    fn success_message_respects_presentation() {
        let registry = ObjectUrlRegistry::new();
        let blob = Bytes::from(vec![0u8; 400_000]);
        let result = ProcessingResult {
            kind: ToolKind::Compress,
            blob: blob.clone(),
            mime: "image/webp".to_string(),
            result_url: registry.create(blob),
            original_bytes: 2_400_000,
            result_bytes: 400_000,
            file_name: "compressed.webp".to_string(),
        };
        let options = TransformOptions::default();

        let plain = success_message(&result, &options, Presentation::Plain);
        let decorated = success_message(&result, &options, Presentation::Decorated);

        assert_eq!(plain, "Compressed! 2.29 MB → 390.63 KB (83.3% smaller)");
        assert_eq!(decorated, format!("✅ {}", plain));
    }
}
