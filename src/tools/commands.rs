//! # 命令层
//!
//! ## 设计思路
//!
//! 命令层仅做参数接收、结果落盘与输出结构组装，不承载业务逻辑。
//! 所有实际处理交由 `ToolService`，保持命令函数薄、稳定、易测试。

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::batch::BatchStatus;
use super::config::{CompressionPreset, RESIZE_PRESETS};
use super::presenter::{Savings, format_file_size, save_result, success_message};
use super::qr::QrRequest;
use super::service::{EstimateReport, ToolRequest, ToolService};
use super::source::{FileInput, ProcessingResult, ToolKind};
use super::ToolError;
use crate::settings::Presentation;

/// 输出给用户 / 脚本的结构化错误。
#[derive(Debug, Clone, Serialize)]
pub struct CommandError {
    pub code: &'static str,
    pub stage: &'static str,
    pub message: String,
}

impl From<ToolError> for CommandError {
    fn from(error: ToolError) -> Self {
        Self {
            code: error.code(),
            stage: error.stage(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// 已写入磁盘的一个结果文件。
#[derive(Debug, Clone, Serialize)]
pub struct SavedOutput {
    pub path: PathBuf,
    pub original_bytes: u64,
    pub result_bytes: u64,
    pub savings: Savings,
}

/// 批量中单个失败项。
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub name: String,
    pub error: CommandError,
}

/// 命令执行结果。
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub tool: ToolKind,
    pub message: String,
    pub outputs: Vec<SavedOutput>,
    pub failures: Vec<ItemFailure>,
}

async fn save(result: &ProcessingResult, out_dir: &Path) -> Result<SavedOutput, ToolError> {
    let path = save_result(result, out_dir).await?;
    Ok(SavedOutput {
        path,
        original_bytes: result.original_bytes,
        result_bytes: result.result_bytes,
        savings: Savings::between(result.original_bytes, result.result_bytes),
    })
}

fn read_inputs(service: &ToolService, paths: &[PathBuf]) -> (Vec<FileInput>, Vec<ItemFailure>) {
    let mut inputs = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();

    for path in paths {
        match service.read_file(path) {
            Ok(input) => inputs.push(input),
            Err(err) => failures.push(ItemFailure {
                name: path.display().to_string(),
                error: err.into(),
            }),
        }
    }

    (inputs, failures)
}

/// 单文件工具：缩放 / 转换 / 压缩 / 抠图。
pub async fn process_file(
    service: &ToolService,
    path: &Path,
    request: ToolRequest,
    out_dir: &Path,
    presentation: Presentation,
) -> Result<CommandOutput, CommandError> {
    let input = service.read_file(path)?;
    let (result, options) = service.run_single(input, &request).await?;
    let saved = save(&result, out_dir).await?;

    Ok(CommandOutput {
        tool: request.kind,
        message: success_message(&result, &options, presentation),
        outputs: vec![saved],
        failures: Vec::new(),
    })
}

/// 压缩多个文件；单个文件失败不影响其他文件。
pub async fn compress_files(
    service: &ToolService,
    paths: &[PathBuf],
    request: ToolRequest,
    out_dir: &Path,
    presentation: Presentation,
) -> Result<CommandOutput, CommandError> {
    if paths.len() == 1 {
        return process_file(service, &paths[0], request, out_dir, presentation).await;
    }

    let (inputs, mut failures) = read_inputs(service, paths);
    let batch = service
        .compress_batch(inputs, request.format, request.quality)
        .await?;

    let mut outputs = Vec::new();
    for item in batch.items() {
        match (item.status, &item.result, &item.error) {
            (BatchStatus::Done, Some(result), _) => outputs.push(save(result, out_dir).await?),
            (_, _, Some(err)) => failures.push(ItemFailure {
                name: item.name.clone(),
                error: err.clone().into(),
            }),
            _ => {}
        }
    }

    let original: u64 = outputs.iter().map(|o| o.original_bytes).sum();
    let compressed: u64 = outputs.iter().map(|o| o.result_bytes).sum();
    let body = format!(
        "Compressed {} of {} images! {} → {} ({})",
        outputs.len(),
        paths.len(),
        format_file_size(original),
        format_file_size(compressed),
        Savings::between(original, compressed)
    );

    Ok(CommandOutput {
        tool: ToolKind::Compress,
        message: presentation.decorate_success(&body),
        outputs,
        failures,
    })
}

/// 多张图片合成一个 PDF。
pub async fn images_to_pdf(
    service: &ToolService,
    paths: &[PathBuf],
    out_dir: &Path,
    presentation: Presentation,
) -> Result<CommandOutput, CommandError> {
    let (inputs, mut failures) = read_inputs(service, paths);
    let (result, outcome) = service.images_to_pdf(inputs).await?;
    failures.extend(outcome.rejected.into_iter().map(|rejected| ItemFailure {
        name: rejected.name,
        error: rejected.error.into(),
    }));
    let saved = save(&result, out_dir).await?;

    Ok(CommandOutput {
        tool: ToolKind::ImageToPdf,
        message: success_message(&result, &Default::default(), presentation),
        outputs: vec![saved],
        failures,
    })
}

/// 生成二维码，可选复制到剪贴板。
pub async fn generate_qr(
    service: &ToolService,
    request: QrRequest,
    out_dir: &Path,
    copy_to_clipboard: bool,
    presentation: Presentation,
) -> Result<CommandOutput, CommandError> {
    let code = service.generate_qr(&request).await?;

    let file_name =
        super::presenter::download_file_name(ToolKind::QrCode, &Default::default(), None);
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| ToolError::FileSystem(format!("创建输出目录失败：{}", e)))?;
    let path = out_dir.join(file_name);
    tokio::fs::write(&path, &code.png)
        .await
        .map_err(|e| ToolError::FileSystem(format!("写入二维码失败：{}", e)))?;

    let mut body = "QR code generated successfully!".to_string();
    if copy_to_clipboard {
        service.copy_qr_to_clipboard(&code).await?;
        body.push_str(" Copied to clipboard.");
    }

    let size = code.png.len() as u64;
    Ok(CommandOutput {
        tool: ToolKind::QrCode,
        message: presentation.decorate_success(&body),
        outputs: vec![SavedOutput {
            path,
            original_bytes: 0,
            result_bytes: size,
            savings: Savings::between(0, size),
        }],
        failures: Vec::new(),
    })
}

/// 仅本地估算。
pub async fn estimate(
    service: &ToolService,
    path: &Path,
    request: ToolRequest,
) -> Result<EstimateReport, CommandError> {
    let input = service.read_file(path)?;
    Ok(service.estimate(input, &request).await?)
}

/// 预设列表。
#[derive(Debug, Clone, Serialize)]
pub struct PresetListing {
    pub compression: Vec<CompressionPresetEntry>,
    pub resize: Vec<ResizePresetEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompressionPresetEntry {
    pub id: &'static str,
    pub label: &'static str,
    pub quality: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResizePresetEntry {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

pub fn list_presets() -> PresetListing {
    PresetListing {
        compression: CompressionPreset::ALL
            .iter()
            .map(|p| CompressionPresetEntry {
                id: p.as_str(),
                label: p.label(),
                quality: p.quality(),
            })
            .collect(),
        resize: RESIZE_PRESETS
            .iter()
            .map(|p| ResizePresetEntry {
                name: p.name,
                width: p.width,
                height: p.height,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::client::{ProcessingJob, RemoteProcessor};
    use crate::tools::qr::QrCode;
    use crate::tools::source::RemoteOutput;
    use crate::tools::ToolConfig;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::io::Write;
    use std::sync::Arc;

    struct HalvingProcessor;

    #[async_trait]
    impl RemoteProcessor for HalvingProcessor {
        async fn process(&self, job: &ProcessingJob) -> Result<RemoteOutput, ToolError> {
            Ok(RemoteOutput {
                blob: Bytes::from(vec![0u8; job.file.bytes.len() / 2]),
                mime: job.options.output_format.mime_type().to_string(),
            })
        }

        async fn images_to_pdf(&self, _files: &[FileInput]) -> Result<RemoteOutput, ToolError> {
            Ok(RemoteOutput {
                blob: Bytes::from_static(b"%PDF"),
                mime: "application/pdf".to_string(),
            })
        }

        async fn generate_qr(&self, _request: &QrRequest) -> Result<QrCode, ToolError> {
            Err(ToolError::Remote {
                status: 500,
                message: "Server error: 500".to_string(),
            })
        }
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([9, 9, 9, 255]));
        let path = dir.join(name);
        img.save(&path).expect("save test png");
        path
    }

    fn service() -> ToolService {
        ToolService::with_processor(ToolConfig::default(), Arc::new(HalvingProcessor))
    }

    #[test]
    fn command_error_carries_code_and_stage() {
        let err = CommandError::from(ToolError::InvalidFileType("text/plain".to_string()));
        assert_eq!(err.code, "E_INVALID_FILE_TYPE");
        assert_eq!(err.stage, "intake");
        let json = serde_json::to_value(&err).expect("serialize error");
        assert_eq!(json["code"], "E_INVALID_FILE_TYPE");
    }

    #[tokio::test]
    async fn convert_writes_result_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let input = write_png(dir.path(), "in.png");
        let out = dir.path().join("out");

        let mut request = ToolRequest::new(ToolKind::Convert);
        request.format = Some(crate::tools::OutputFormat::Webp);

        let output = process_file(&service(), &input, request, &out, Presentation::Plain)
            .await
            .expect("convert should succeed");

        assert_eq!(output.outputs.len(), 1);
        assert!(output.outputs[0].path.ends_with("converted-image.webp"));
        assert!(output.outputs[0].path.exists());
        assert!(output.message.starts_with("Converted to WEBP!"));
    }

    #[tokio::test]
    async fn batch_compress_reports_failures_separately() {
        let dir = tempfile::tempdir().expect("temp dir");
        let first = write_png(dir.path(), "first.png");
        let second = write_png(dir.path(), "second.png");
        let mut notes = std::fs::File::create(dir.path().join("notes.txt")).expect("create notes");
        notes.write_all(b"plain text").expect("write notes");
        let out = dir.path().join("out");

        let output = compress_files(
            &service(),
            &[first, second, dir.path().join("notes.txt")],
            ToolRequest::new(ToolKind::Compress),
            &out,
            Presentation::Plain,
        )
        .await
        .expect("batch should succeed");

        assert_eq!(output.outputs.len(), 2);
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].error.code, "E_INVALID_FILE_TYPE");
        assert!(output.message.starts_with("Compressed 2 of 3 images!"));
        assert!(out.join("compressed-first.jpeg").exists());
    }

    #[tokio::test]
    async fn missing_file_is_file_system_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = process_file(
            &service(),
            &dir.path().join("missing.png"),
            ToolRequest::new(ToolKind::Convert),
            dir.path(),
            Presentation::Plain,
        )
        .await
        .expect_err("missing file must fail");

        assert_eq!(err.code, "E_FILE_SYSTEM");
    }

    #[test]
    fn presets_listing_is_complete() {
        let listing = list_presets();
        assert_eq!(listing.compression.len(), 4);
        assert_eq!(listing.resize.len(), 6);
        assert_eq!(listing.compression[1].quality, 75);
    }
}
