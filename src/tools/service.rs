//! # 服务层
//!
//! ## 设计思路
//!
//! `ToolService` 是命令层唯一依赖的入口，持有：
//! - `Arc<RwLock<ToolConfig>>`：运行时可调整的限制与超时
//! - `Arc<dyn RemoteProcessor>`：远端处理器（测试中可替换）
//! - `ObjectUrlRegistry`：预览与结果引用
//!
//! ## 实现思路
//!
//! - 单次请求内使用同一份配置快照，避免处理中途配置漂移。
//! - 记录 `intake/submit/total` 阶段耗时，便于定位慢在本地还是远端。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::Serialize;

use super::batch::BatchCompressor;
use super::client::{HttpRemoteProcessor, RemoteEndpoints, RemoteProcessor};
use super::clipboard_writer::copy_image_to_clipboard;
use super::config::CompressionPreset;
use super::estimator::EstimatedOutcome;
use super::object_url::ObjectUrlRegistry;
use super::pdf_queue::{AddOutcome, PdfQueue};
use super::qr::{QrCode, QrRequest};
use super::session::ToolSession;
use super::source::{FileInput, OutputFormat, ProcessingResult, ToolKind, TransformOptions};
use super::{ToolConfig, ToolError};

/// 单文件工具的一次请求参数。
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub kind: ToolKind,
    pub format: Option<OutputFormat>,
    pub quality: Option<u8>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ToolRequest {
    pub fn new(kind: ToolKind) -> Self {
        Self {
            kind,
            format: None,
            quality: None,
            width: None,
            height: None,
        }
    }
}

/// 本地估算报告。
#[derive(Debug, Clone, Serialize)]
pub struct EstimateReport {
    pub tool: ToolKind,
    pub original_bytes: u64,
    pub estimated_bytes: u64,
    pub options: TransformOptions,
}

/// 工具服务。
pub struct ToolService {
    config: Arc<RwLock<ToolConfig>>,
    compression_preset: RwLock<CompressionPreset>,
    processor: Arc<dyn RemoteProcessor>,
    registry: ObjectUrlRegistry,
}

impl ToolService {
    /// 使用 HTTP 远端处理器创建服务。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_toolbox::tools::{RemoteEndpoints, ToolConfig, ToolService};
    ///
    /// let service = ToolService::new(
    ///     ToolConfig::default(),
    ///     RemoteEndpoints::with_base("http://localhost:5000"),
    /// )?;
    /// # Ok::<(), image_toolbox::tools::ToolError>(())
    /// ```
    pub fn new(config: ToolConfig, endpoints: RemoteEndpoints) -> Result<Self, ToolError> {
        config.validate()?;
        let processor = HttpRemoteProcessor::new(endpoints, &config)?;
        Ok(Self::with_processor(config, Arc::new(processor)))
    }

    /// 注入自定义远端处理器（主要用于测试）。
    pub fn with_processor(config: ToolConfig, processor: Arc<dyn RemoteProcessor>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            compression_preset: RwLock::new(CompressionPreset::Balanced),
            processor,
            registry: ObjectUrlRegistry::new(),
        }
    }

    pub fn registry(&self) -> &ObjectUrlRegistry {
        &self.registry
    }

    pub fn config_snapshot(&self) -> Result<ToolConfig, ToolError> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|_| ToolError::ResourceLimit("配置锁已中毒".to_string()))
    }

    /// 整体替换配置（先校验）。
    pub fn update_config(&self, config: ToolConfig) -> Result<(), ToolError> {
        config.validate()?;
        let mut guard = self
            .config
            .write()
            .map_err(|_| ToolError::ResourceLimit("配置锁已中毒".to_string()))?;
        *guard = config;
        log::info!("⚙️ 工具配置已更新");
        Ok(())
    }

    /// 设置压缩默认档位。
    pub fn set_compression_preset(&self, preset: &str) -> Result<(), ToolError> {
        let preset = CompressionPreset::from_str(preset)?;
        let mut guard = self
            .compression_preset
            .write()
            .map_err(|_| ToolError::ResourceLimit("压缩档位锁已中毒".to_string()))?;
        *guard = preset;
        log::info!("⚙️ 压缩默认档位：{}（{}%）", preset.label(), preset.quality());
        Ok(())
    }

    pub fn compression_preset(&self) -> Result<CompressionPreset, ToolError> {
        self.compression_preset
            .read()
            .map(|p| *p)
            .map_err(|_| ToolError::ResourceLimit("压缩档位锁已中毒".to_string()))
    }

    /// 新建一个单文件会话，压缩工具套用当前默认档位。
    pub fn new_session(&self, kind: ToolKind) -> Result<ToolSession, ToolError> {
        let config = self.config_snapshot()?;
        let mut session = ToolSession::new(kind, &config, self.registry.clone());
        if kind == ToolKind::Compress {
            session.apply_compression_preset(self.compression_preset()?);
        }
        Ok(session)
    }

    /// 读取本地文件（按当前体积上限）。
    pub fn read_file(&self, path: &std::path::Path) -> Result<FileInput, ToolError> {
        let config = self.config_snapshot()?;
        FileInput::from_path(path, config.max_file_size)
    }

    async fn prepare_session(
        &self,
        input: FileInput,
        request: &ToolRequest,
    ) -> Result<ToolSession, ToolError> {
        let mut session = self.new_session(request.kind)?;
        session.select(input).await?;

        if let Some(format) = request.format {
            session.set_output_format(format);
        }
        if let Some(quality) = request.quality {
            session.set_quality(quality)?;
        }
        if request.kind == ToolKind::Resize {
            match (request.width, request.height) {
                (Some(width), Some(height)) => {
                    session.set_aspect_locked(false);
                    session.set_width(Some(width));
                    session.set_height(Some(height));
                }
                (Some(width), None) => session.set_width(Some(width)),
                (None, Some(height)) => session.set_height(Some(height)),
                (None, None) => {}
            }
        }

        Ok(session)
    }

    /// 只做本地估算，不发出任何请求。
    pub async fn estimate(
        &self,
        input: FileInput,
        request: &ToolRequest,
    ) -> Result<EstimateReport, ToolError> {
        let session = self.prepare_session(input, request).await?;
        let original_bytes = session
            .candidate()
            .map(|c| c.original_bytes())
            .unwrap_or(0);
        let EstimatedOutcome { estimated_bytes } = session
            .estimate()
            .ok_or_else(|| ToolError::Validation("Please select an image first".to_string()))?;

        Ok(EstimateReport {
            tool: request.kind,
            original_bytes,
            estimated_bytes,
            options: session.options().clone(),
        })
    }

    /// 单文件工具的完整链路：入口校验 → 预检 → 远端处理。
    pub async fn run_single(
        &self,
        input: FileInput,
        request: &ToolRequest,
    ) -> Result<(ProcessingResult, TransformOptions), ToolError> {
        let total_start = Instant::now();

        let intake_start = Instant::now();
        let mut session = self.prepare_session(input, request).await?;
        let intake_elapsed = intake_start.elapsed();

        if let Some(estimate) = session.estimate() {
            log::debug!("📐 预计输出体积：{} bytes", estimate.estimated_bytes);
        }

        let submit_start = Instant::now();
        session.submit(self.processor.as_ref()).await?;
        let submit_elapsed = submit_start.elapsed();

        log::info!(
            "✅ 工具处理完成 - tool={} intake={}ms submit={}ms total={}ms",
            request.kind,
            intake_elapsed.as_millis(),
            submit_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        let options = session.options().clone();
        let result = session
            .into_result()
            .ok_or_else(|| ToolError::ResourceLimit("提交结束但没有结果".to_string()))?;
        Ok((result, options))
    }

    /// 批量压缩。
    pub async fn compress_batch(
        &self,
        inputs: Vec<FileInput>,
        format: Option<OutputFormat>,
        quality: Option<u8>,
    ) -> Result<BatchCompressor, ToolError> {
        let config = self.config_snapshot()?;
        let preset = self.compression_preset()?;
        let options = TransformOptions::new(
            format.unwrap_or(OutputFormat::Jpeg),
            quality.unwrap_or_else(|| preset.quality()),
        )?;

        let started = Instant::now();
        let mut batch = BatchCompressor::new(&config, self.registry.clone(), options);
        batch.add_files(inputs).await;
        let summary = batch.run(Arc::clone(&self.processor)).await;

        log::info!(
            "✅ 批量压缩完成 - done={} failed={} total={}ms",
            summary.done,
            summary.failed,
            started.elapsed().as_millis()
        );
        Ok(batch)
    }

    /// 图片合成 PDF；不合法的文件被跳过并在结果中报告。
    ///
    /// 所有文件都被拒绝时直接返回最后一个拒绝原因。
    pub async fn images_to_pdf(
        &self,
        inputs: Vec<FileInput>,
    ) -> Result<(ProcessingResult, AddOutcome), ToolError> {
        let config = self.config_snapshot()?;
        let started = Instant::now();

        let mut queue = PdfQueue::new(&config, self.registry.clone());
        let outcome = queue.add_files(inputs).await;
        if let Some(message) = outcome.message() {
            log::warn!("⚠️ 部分文件未加入队列：{}", message);
        }
        if queue.is_empty() {
            if let Some(err) = outcome.last_rejection() {
                return Err(err.clone());
            }
        }
        queue.submit(self.processor.as_ref()).await?;

        log::info!(
            "✅ PDF 合成完成 - pages={} total={}ms",
            queue.len(),
            started.elapsed().as_millis()
        );

        let result = queue
            .into_result()
            .ok_or_else(|| ToolError::ResourceLimit("提交结束但没有结果".to_string()))?;
        Ok((result, outcome))
    }

    pub async fn generate_qr(&self, request: &QrRequest) -> Result<QrCode, ToolError> {
        request.validate()?;
        let started = Instant::now();
        let code = self.processor.generate_qr(request).await?;
        log::info!(
            "✅ 二维码生成完成 - size={} bytes={} total={}ms",
            request.size,
            code.png.len(),
            started.elapsed().as_millis()
        );
        Ok(code)
    }

    pub async fn copy_qr_to_clipboard(&self, code: &QrCode) -> Result<(), ToolError> {
        let config = self.config_snapshot()?;
        copy_image_to_clipboard(&code.png, &config).await
    }
}
