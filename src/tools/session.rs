//! # 单文件工具会话
//!
//! ## 设计思路
//!
//! 每个工具实例独占一个会话，状态机如下：
//!
//! ```text
//! Empty ──select──▶ CandidateSelected ──begin_submission──▶ Submitting
//!   ▲                     ▲   (估算不改变状态)                    │
//!   │                     └──────────select──────────────────────┤
//!   └──────────reset─────────────── ResultReady / Error ◀────────┘
//! ```
//!
//! - 任意状态下 `select` 都会替换候选文件并丢弃旧结果；`reset` 回到 `Empty`。
//! - 同一时刻最多一个在途请求。
//! - 抠图缺少 API Key 属于预检失败，状态停在 `CandidateSelected`，处理器不会被调用。
//! - 每次选择 / 重置都会递增 generation；响应回来时携带发起时的 token，
//!   token 过期说明用户已经换了文件，这个响应直接丢弃（`Completion::Stale`）。
//!
//! ## 实现思路
//!
//! `begin_submission` 与 `complete` 都是同步方法，网络等待发生在二者之间且不持有会话锁，
//! 因此 `submit_shared` 期间仍可以并发地选择新文件。

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use super::client::{ProcessingJob, RemoteProcessor, preflight};
use super::config::{CompressionPreset, ResizePreset};
use super::estimator::EstimatedOutcome;
use super::intake::Intake;
use super::object_url::ObjectUrlRegistry;
use super::presenter::download_file_name;
use super::source::{
    FileInput, OutputFormat, ProcessingResult, RemoteOutput, ToolKind, TransformOptions,
    UploadCandidate,
};
use super::{ToolConfig, ToolError};

/// 会话状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Empty,
    CandidateSelected,
    Submitting,
    ResultReady,
    Error,
}

/// 一次已发起的提交。
#[derive(Debug, Clone)]
pub struct Submission {
    pub token: u64,
    pub job: ProcessingJob,
}

/// 响应回填结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// 响应属于当前候选文件，已写入会话。
    Applied,
    /// 发起后候选文件已变化，响应被丢弃。
    Stale,
}

/// 单文件工具会话。
#[derive(Debug)]
pub struct ToolSession {
    kind: ToolKind,
    intake: Intake,
    registry: ObjectUrlRegistry,
    state: SessionState,
    generation: u64,
    candidate: Option<UploadCandidate>,
    options: TransformOptions,
    result: Option<ProcessingResult>,
    last_error: Option<ToolError>,
    has_remove_bg_key: bool,
}

impl ToolSession {
    pub fn new(kind: ToolKind, config: &ToolConfig, registry: ObjectUrlRegistry) -> Self {
        Self {
            kind,
            intake: Intake::new(config),
            registry,
            state: SessionState::Empty,
            generation: 0,
            candidate: None,
            options: default_options_for(kind),
            result: None,
            last_error: None,
            has_remove_bg_key: true,
        }
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn candidate(&self) -> Option<&UploadCandidate> {
        self.candidate.as_ref()
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    pub fn result(&self) -> Option<&ProcessingResult> {
        self.result.as_ref()
    }

    /// 取走结果并结束会话（候选预览随之释放）。
    pub fn into_result(self) -> Option<ProcessingResult> {
        self.result
    }

    /// 最近一次错误（入口拒绝、预检失败或远端失败）。
    pub fn last_error(&self) -> Option<&ToolError> {
        self.last_error.as_ref()
    }

    /// 选择文件。
    ///
    /// 校验失败时保留原候选文件，只记录错误；成功则替换候选、丢弃旧结果。
    pub async fn select(&mut self, input: FileInput) -> Result<(), ToolError> {
        let candidate = match self
            .intake
            .accept(input, &self.registry, self.kind.needs_dimensions())
            .await
        {
            Ok(candidate) => candidate,
            Err(err) => {
                log::warn!("⚠️ 文件被拒绝 - 工具: {} 原因: {}", self.kind, err);
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };

        self.generation = self.generation.wrapping_add(1);
        if let Some(dimensions) = candidate.dimensions {
            self.options.reset_to(dimensions);
        }
        self.candidate = Some(candidate);
        self.result = None;
        self.last_error = None;
        self.state = SessionState::CandidateSelected;
        Ok(())
    }

    /// 回到初始状态，释放候选与结果引用。
    pub fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.candidate = None;
        self.result = None;
        self.last_error = None;
        self.options.target_width = None;
        self.options.target_height = None;
        self.state = SessionState::Empty;
        log::debug!("🔄 会话已重置 - 工具: {}", self.kind);
    }

    /// 本地估算；没有候选文件时返回 `None`。
    pub fn estimate(&self) -> Option<EstimatedOutcome> {
        let candidate = self.candidate.as_ref()?;
        Some(EstimatedOutcome::for_candidate(
            candidate,
            &self.options,
            self.kind == ToolKind::Resize,
        ))
    }

    pub fn set_width(&mut self, width: Option<u32>) {
        let original = self.candidate.as_ref().and_then(|c| c.dimensions);
        self.options.set_width(width, original);
    }

    pub fn set_height(&mut self, height: Option<u32>) {
        let original = self.candidate.as_ref().and_then(|c| c.dimensions);
        self.options.set_height(height, original);
    }

    pub fn set_aspect_locked(&mut self, locked: bool) {
        self.options.aspect_locked = locked;
    }

    pub fn set_output_format(&mut self, format: OutputFormat) {
        self.options.output_format = format;
    }

    pub fn set_quality(&mut self, quality: u8) -> Result<(), ToolError> {
        self.options.set_quality(quality)
    }

    pub fn apply_compression_preset(&mut self, preset: CompressionPreset) {
        self.options.set_quality(preset.quality()).ok();
    }

    /// 记录抠图凭据是否就绪；`submit` 会按处理器的实际情况覆盖。
    pub fn set_remove_bg_key(&mut self, configured: bool) {
        self.has_remove_bg_key = configured;
    }

    /// 套用社交平台尺寸（不受宽高比锁定影响）。
    pub fn apply_resize_preset(&mut self, preset: ResizePreset) {
        self.options.target_width = Some(preset.width);
        self.options.target_height = Some(preset.height);
    }

    /// 发起提交：预检通过后进入 `Submitting` 并返回 token。
    pub fn begin_submission(&mut self) -> Result<Submission, ToolError> {
        if self.state == SessionState::Submitting {
            return Err(ToolError::Validation(
                "A request is already in progress".to_string(),
            ));
        }

        let job = match preflight(
            self.kind,
            self.candidate.as_ref(),
            &self.options,
            self.has_remove_bg_key,
        ) {
            Ok(job) => job,
            Err(err) => {
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };

        self.result = None;
        self.last_error = None;
        self.state = SessionState::Submitting;
        log::debug!(
            "📤 开始提交 - 工具: {} generation: {}",
            self.kind,
            self.generation
        );

        Ok(Submission {
            token: self.generation,
            job,
        })
    }

    /// 回填远端响应；token 过期时丢弃。
    pub fn complete(
        &mut self,
        token: u64,
        outcome: Result<RemoteOutput, ToolError>,
    ) -> Completion {
        if token != self.generation || self.state != SessionState::Submitting {
            log::info!(
                "🗑️ 丢弃过期响应 - 工具: {} token: {} 当前: {}",
                self.kind,
                token,
                self.generation
            );
            return Completion::Stale;
        }

        match outcome {
            Ok(output) => {
                let original_bytes = self
                    .candidate
                    .as_ref()
                    .map(|c| c.original_bytes())
                    .unwrap_or(0);
                let name_hint = match self.kind {
                    ToolKind::Compress => None,
                    _ => self.candidate.as_ref().map(|c| c.name()),
                };
                let file_name = download_file_name(self.kind, &self.options, name_hint);
                let result_bytes = output.blob.len() as u64;

                self.result = Some(ProcessingResult {
                    kind: self.kind,
                    result_url: self.registry.create(output.blob.clone()),
                    blob: output.blob,
                    mime: output.mime,
                    original_bytes,
                    result_bytes,
                    file_name,
                });
                self.state = SessionState::ResultReady;
            }
            Err(err) => {
                self.last_error = Some(err);
                self.state = SessionState::Error;
            }
        }

        Completion::Applied
    }

    /// 独占会话时的一次完整提交。
    pub async fn submit(
        &mut self,
        processor: &dyn RemoteProcessor,
    ) -> Result<&ProcessingResult, ToolError> {
        self.has_remove_bg_key = processor.has_remove_bg_key();
        let submission = self.begin_submission()?;
        let outcome = processor.process(&submission.job).await;
        self.complete(submission.token, outcome);

        match (&self.result, &self.last_error) {
            (Some(result), _) => Ok(result),
            (None, Some(err)) => Err(err.clone()),
            (None, None) => Err(ToolError::ResourceLimit("提交结束但没有结果".to_string())),
        }
    }

    /// 共享会话的提交：等待远端期间不持有锁。
    pub async fn submit_shared(
        session: &Arc<Mutex<ToolSession>>,
        processor: &dyn RemoteProcessor,
    ) -> Result<Completion, ToolError> {
        let submission = {
            let mut guard = session.lock().await;
            guard.has_remove_bg_key = processor.has_remove_bg_key();
            guard.begin_submission()?
        };
        let outcome = processor.process(&submission.job).await;
        Ok(session.lock().await.complete(submission.token, outcome))
    }
}

/// 各工具页面的默认参数。
fn default_options_for(kind: ToolKind) -> TransformOptions {
    let mut options = TransformOptions::default();
    match kind {
        ToolKind::Resize => options.aspect_locked = true,
        ToolKind::Compress => {
            options.output_format = OutputFormat::Jpeg;
            options.set_quality(CompressionPreset::Balanced.quality()).ok();
        }
        _ => {}
    }
    options
}
