//! # 批量压缩
//!
//! ## 设计思路
//!
//! 批量压缩持有一个有序的文件列表，每个文件独立经历
//! `Pending → Compressing → Done | Error`。
//!
//! - 并发上限由 `ToolConfig::batch_concurrency` 决定（信号量），不会一次性把所有请求打出去。
//! - 工作任务不直接修改列表，而是通过 mpsc 上报事件；
//!   列表只由一个所有者按事件顺序推进，乱序或重复的事件会被拒绝。
//! - 单个文件入口校验失败直接记为 `Error`，不影响其他文件。

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

use super::client::{ProcessingJob, RemoteProcessor};
use super::intake::Intake;
use super::object_url::ObjectUrlRegistry;
use super::presenter::{Savings, download_file_name};
use super::source::{
    FileInput, ProcessingResult, RemoteOutput, ToolKind, TransformOptions, UploadCandidate,
};
use super::{ToolConfig, ToolError};

/// 单个文件的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Compressing,
    Done,
    Error,
}

/// 列表中的一项。
#[derive(Debug)]
pub struct BatchItem {
    pub id: u64,
    pub name: String,
    pub original_bytes: u64,
    pub status: BatchStatus,
    pub candidate: Option<UploadCandidate>,
    pub result: Option<ProcessingResult>,
    pub error: Option<ToolError>,
}

impl BatchItem {
    pub fn savings(&self) -> Option<Savings> {
        self.result
            .as_ref()
            .map(|r| Savings::between(r.original_bytes, r.result_bytes))
    }
}

/// 工作任务上报的事件。
#[derive(Debug)]
pub enum BatchEvent {
    Started { id: u64 },
    Finished {
        id: u64,
        outcome: Result<RemoteOutput, ToolError>,
    },
}

/// 一轮运行的汇总，只统计本轮实际发出的文件。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub done: usize,
    pub failed: usize,
    pub rejected_events: usize,
}

/// 批量压缩器。
#[derive(Debug)]
pub struct BatchCompressor {
    intake: Intake,
    registry: ObjectUrlRegistry,
    options: TransformOptions,
    concurrency: usize,
    next_id: u64,
    items: Vec<BatchItem>,
}

impl BatchCompressor {
    pub fn new(
        config: &ToolConfig,
        registry: ObjectUrlRegistry,
        options: TransformOptions,
    ) -> Self {
        Self {
            intake: Intake::new(config),
            registry,
            options,
            concurrency: config.batch_concurrency.max(1),
            next_id: 0,
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn item(&self, id: u64) -> Option<&BatchItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// 修改共享参数，只影响之后开始压缩的文件。
    pub fn options_mut(&mut self) -> &mut TransformOptions {
        &mut self.options
    }

    /// 追加文件；校验失败的文件以 `Error` 状态加入列表。
    pub async fn add_files(&mut self, files: Vec<FileInput>) -> Vec<u64> {
        let mut ids = Vec::with_capacity(files.len());

        for file in files {
            self.next_id += 1;
            let id = self.next_id;
            let name = file.name.clone();
            let original_bytes = file.len();

            let item = match self.intake.accept(file, &self.registry, false).await {
                Ok(candidate) => BatchItem {
                    id,
                    name,
                    original_bytes,
                    status: BatchStatus::Pending,
                    candidate: Some(candidate),
                    result: None,
                    error: None,
                },
                Err(err) => {
                    log::warn!("⚠️ 批量文件被拒绝 - {}: {}", name, err);
                    BatchItem {
                        id,
                        name,
                        original_bytes,
                        status: BatchStatus::Error,
                        candidate: None,
                        result: None,
                        error: Some(err),
                    }
                }
            };

            self.items.push(item);
            ids.push(id);
        }

        ids
    }

    /// 移除一项（正在压缩的除外）。
    pub fn remove(&mut self, id: u64) -> Result<(), ToolError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| ToolError::Validation(format!("批量列表中不存在 id={}", id)))?;

        if self.items[index].status == BatchStatus::Compressing {
            return Err(ToolError::Validation(format!(
                "文件 {} 正在压缩，无法移除",
                self.items[index].name
            )));
        }

        self.items.remove(index);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// 单一所有者推进状态；乱序事件返回错误且不修改列表。
    pub fn apply(&mut self, event: BatchEvent) -> Result<(), ToolError> {
        match event {
            BatchEvent::Started { id } => {
                let item = self.item_mut(id)?;
                if item.status != BatchStatus::Pending {
                    return Err(out_of_order(id, item.status, "compressing"));
                }
                item.status = BatchStatus::Compressing;
                Ok(())
            }
            BatchEvent::Finished { id, outcome } => {
                let registry = self.registry.clone();
                let options = self.options.clone();
                let item = self.item_mut(id)?;
                if item.status != BatchStatus::Compressing {
                    return Err(out_of_order(id, item.status, "finished"));
                }

                match outcome {
                    Ok(output) => {
                        let result_bytes = output.blob.len() as u64;
                        item.result = Some(ProcessingResult {
                            kind: ToolKind::Compress,
                            result_url: registry.create(output.blob.clone()),
                            blob: output.blob,
                            mime: output.mime,
                            original_bytes: item.original_bytes,
                            result_bytes,
                            file_name: download_file_name(
                                ToolKind::Compress,
                                &options,
                                Some(item.name.as_str()),
                            ),
                        });
                        item.status = BatchStatus::Done;
                    }
                    Err(err) => {
                        item.error = Some(err);
                        item.status = BatchStatus::Error;
                    }
                }
                Ok(())
            }
        }
    }

    fn item_mut(&mut self, id: u64) -> Result<&mut BatchItem, ToolError> {
        self.items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| ToolError::Validation(format!("批量列表中不存在 id={}", id)))
    }

    /// 压缩所有 `Pending` 项，返回本轮汇总。
    ///
    /// 入口校验阶段就被拒绝的文件与之前几轮已完成的文件不计入汇总。
    pub async fn run(&mut self, processor: Arc<dyn RemoteProcessor>) -> BatchSummary {
        let started = Instant::now();
        let jobs: Vec<(u64, ProcessingJob)> = self
            .items
            .iter()
            .filter(|item| item.status == BatchStatus::Pending)
            .filter_map(|item| {
                item.candidate.as_ref().map(|candidate| {
                    (
                        item.id,
                        ProcessingJob {
                            kind: ToolKind::Compress,
                            file: candidate.file.clone(),
                            options: self.options.clone(),
                        },
                    )
                })
            })
            .collect();

        let mut summary = BatchSummary::default();
        if jobs.is_empty() {
            return summary;
        }
        let run_ids: Vec<u64> = jobs.iter().map(|(id, _)| *id).collect();

        log::info!(
            "📦 批量压缩开始 - 文件数: {} 并发上限: {}",
            jobs.len(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::channel::<BatchEvent>(jobs.len() * 2);
        let mut workers = JoinSet::new();

        for (id, job) in jobs {
            let semaphore = Arc::clone(&semaphore);
            let processor = Arc::clone(&processor);
            let tx = tx.clone();

            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        let _ = tx
                            .send(BatchEvent::Finished {
                                id,
                                outcome: Err(ToolError::ResourceLimit(format!(
                                    "并发控制信号量已关闭：{}",
                                    e
                                ))),
                            })
                            .await;
                        return;
                    }
                };

                if tx.send(BatchEvent::Started { id }).await.is_err() {
                    return;
                }
                let outcome = processor.process(&job).await;
                let _ = tx.send(BatchEvent::Finished { id, outcome }).await;
            });
        }
        drop(tx);

        while let Some(event) = rx.recv().await {
            if let Err(err) = self.apply(event) {
                summary.rejected_events += 1;
                log::warn!("⚠️ 忽略乱序事件：{}", err);
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                log::error!("❌ 批量压缩任务异常退出：{}", e);
            }
        }

        for item in self.items.iter_mut() {
            if item.status == BatchStatus::Compressing {
                item.status = BatchStatus::Error;
                item.error = Some(ToolError::ResourceLimit("压缩任务异常退出".to_string()));
            }
        }

        for item in self.items.iter().filter(|item| run_ids.contains(&item.id)) {
            match item.status {
                BatchStatus::Done => summary.done += 1,
                BatchStatus::Error => summary.failed += 1,
                _ => {}
            }
        }

        log::info!(
            "✅ 批量压缩结束 - 成功: {} 失败: {} 耗时: {}ms",
            summary.done,
            summary.failed,
            started.elapsed().as_millis()
        );

        summary
    }
}

fn out_of_order(id: u64, current: BatchStatus, wanted: &str) -> ToolError {
    ToolError::Validation(format!(
        "id={} 当前状态 {:?}，不能转换为 {}",
        id, current, wanted
    ))
}
