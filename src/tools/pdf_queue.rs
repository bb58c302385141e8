//! # 图片转 PDF 队列
//!
//! 多文件有序队列：逐个校验后追加，可按下标移除或整体清空，提交时按当前顺序合成一个 PDF。

use serde::Serialize;

use super::client::RemoteProcessor;
use super::intake::Intake;
use super::object_url::ObjectUrlRegistry;
use super::presenter::download_file_name;
use super::source::{FileInput, ProcessingResult, ToolKind, TransformOptions, UploadCandidate};
use super::{ToolConfig, ToolError};

/// 被跳过的文件。
#[derive(Debug, Clone)]
pub struct RejectedFile {
    pub name: String,
    pub error: ToolError,
}

/// 一次追加的结果：合法文件照常入队，被拒绝的文件按输入顺序记录。
#[derive(Debug, Default)]
pub struct AddOutcome {
    pub added: usize,
    pub rejected: Vec<RejectedFile>,
}

impl AddOutcome {
    /// 最后一个拒绝原因。
    pub fn last_rejection(&self) -> Option<&ToolError> {
        self.rejected.last().map(|r| &r.error)
    }

    /// 页面上的提示文案，取最后一个拒绝原因。
    pub fn message(&self) -> Option<String> {
        self.last_rejection().map(|err| match err {
            ToolError::InvalidFileType(_) => "Please select only image files".to_string(),
            ToolError::FileTooLarge { limit, .. } => format!(
                "Each file must be less than {}MB",
                limit / 1024 / 1024
            ),
            other => other.to_string(),
        })
    }
}

/// 队列中文件的摘要（用于列表展示）。
#[derive(Debug, Clone, Serialize)]
pub struct QueuedFile {
    pub index: usize,
    pub name: String,
    pub bytes: u64,
    pub preview: String,
}

#[derive(Debug)]
pub struct PdfQueue {
    intake: Intake,
    registry: ObjectUrlRegistry,
    files: Vec<UploadCandidate>,
    result: Option<ProcessingResult>,
    last_error: Option<ToolError>,
}

impl PdfQueue {
    pub fn new(config: &ToolConfig, registry: ObjectUrlRegistry) -> Self {
        Self {
            intake: Intake::new(config),
            registry,
            files: Vec::new(),
            result: None,
            last_error: None,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> Vec<QueuedFile> {
        self.files
            .iter()
            .enumerate()
            .map(|(index, candidate)| QueuedFile {
                index,
                name: candidate.name().to_string(),
                bytes: candidate.original_bytes(),
                preview: candidate.preview.as_string(),
            })
            .collect()
    }

    pub fn result(&self) -> Option<&ProcessingResult> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<ProcessingResult> {
        self.result
    }

    pub fn last_error(&self) -> Option<&ToolError> {
        self.last_error.as_ref()
    }

    /// 追加文件；队列变化会使旧结果失效。
    ///
    /// 只要有一个文件入队就清掉错误提示，全部被拒绝时保留最后一个原因。
    pub async fn add_files(&mut self, files: Vec<FileInput>) -> AddOutcome {
        let mut outcome = AddOutcome::default();

        for file in files {
            let name = file.name.clone();
            match self.intake.accept(file, &self.registry, false).await {
                Ok(candidate) => {
                    self.files.push(candidate);
                    outcome.added += 1;
                }
                Err(error) => outcome.rejected.push(RejectedFile { name, error }),
            }
        }

        if outcome.added > 0 {
            self.result = None;
            self.last_error = None;
        } else if let Some(err) = outcome.last_rejection() {
            self.last_error = Some(err.clone());
        }
        outcome
    }

    /// 按下标移除。
    pub fn remove(&mut self, index: usize) -> Result<(), ToolError> {
        if index >= self.files.len() {
            return Err(ToolError::Validation(format!(
                "下标越界：{}（共 {} 个文件）",
                index,
                self.files.len()
            )));
        }
        self.files.remove(index);
        self.result = None;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.files.clear();
        self.result = None;
        self.last_error = None;
    }

    /// 按当前顺序提交合成。
    pub async fn submit(
        &mut self,
        processor: &dyn RemoteProcessor,
    ) -> Result<&ProcessingResult, ToolError> {
        if self.files.is_empty() {
            let err = ToolError::Validation("Please select at least one image".to_string());
            self.last_error = Some(err.clone());
            return Err(err);
        }

        let inputs: Vec<FileInput> = self.files.iter().map(|c| c.file.clone()).collect();
        let original_bytes: u64 = inputs.iter().map(FileInput::len).sum();

        match processor.images_to_pdf(&inputs).await {
            Ok(output) => {
                let result_bytes = output.blob.len() as u64;
                self.last_error = None;
                let result = self.result.insert(ProcessingResult {
                    kind: ToolKind::ImageToPdf,
                    result_url: self.registry.create(output.blob.clone()),
                    blob: output.blob,
                    mime: output.mime,
                    original_bytes,
                    result_bytes,
                    file_name: download_file_name(
                        ToolKind::ImageToPdf,
                        &TransformOptions::default(),
                        None,
                    ),
                });
                Ok(result)
            }
            Err(err) => {
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }
}
