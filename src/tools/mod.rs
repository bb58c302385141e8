//! # 图片工具模块（tools）
//!
//! ## 设计思路
//!
//! 每个图片工具都遵循同一条链路：
//! “选择文件 → 入口校验 → 调整参数（本地估算） → 提交远端 → 展示 / 下载结果”。
//! 像素级处理全部发生在远端服务，本模块只负责校验、编排、状态与结果呈现。
//!
//! - `commands`：命令层，参数适配与输出结构（薄封装）
//! - `service`：承载可共享状态（配置快照、压缩档位、远端处理器）
//! - `session`：单文件工具的状态机与代次令牌
//! - `batch` / `pdf_queue`：多文件变体（并发上限 / 有序队列）
//! - `intake`：MIME 前缀 + 体积上限校验、读取宽高
//! - `estimator`：纯函数体积估算
//! - `client`：远端端点（multipart / JSON）
//! - `presenter`：节省比例、文件名派生、落盘与提示文案
//! - `qr` / `clipboard_writer`：二维码请求与复制到剪贴板
//! - `config/error/source/object_url`：配置、错误、中间数据模型、预览引用
//!
//! ## 新同事快速上手
//!
//! ```text
//! CLI 子命令
//!    ↓
//! commands.rs（参数适配 + 结果落盘）
//!    ↓
//! service.rs（配置快照 + 阶段耗时日志）
//!    ├─ session.rs / batch.rs / pdf_queue.rs（状态机）
//!    │     ├─ intake.rs（类型 / 体积校验 + 宽高）
//!    │     └─ estimator.rs（本地估算）
//!    ├─ client.rs（预检 + 远端请求 + 状态码映射）
//!    └─ clipboard_writer.rs（二维码写剪贴板 + 重试）
//!    ↓
//! presenter.rs（文件名 + 节省比例 + 提示文案）
//!    ↓
//! 返回 CommandError / CommandOutput
//! ```
//!
//! ## 分层职责建议
//!
//! - 子命令与输出结构变更优先改 `commands.rs`
//! - 限制、超时、档位变更优先改 `config.rs`
//! - 端点地址、表单字段、错误映射变更优先改 `client.rs`
//! - 状态流转与过期响应问题优先看 `session.rs` 与 `batch.rs`

pub mod commands;
mod batch;
mod client;
mod clipboard_writer;
mod config;
mod error;
mod estimator;
mod intake;
mod object_url;
mod pdf_queue;
mod presenter;
mod qr;
mod service;
mod session;
mod source;

pub use batch::{BatchCompressor, BatchEvent, BatchItem, BatchStatus, BatchSummary};
pub use client::{
    DEFAULT_API_BASE_URL, DEFAULT_REMOVE_BG_URL, HttpRemoteProcessor, ProcessingJob,
    RemoteEndpoints, RemoteProcessor, preflight,
};
pub use clipboard_writer::copy_image_to_clipboard;
pub use commands::{CommandError, CommandOutput, ItemFailure, PresetListing, SavedOutput};
pub use config::{
    CompressionPreset, DEFAULT_MAX_FILE_SIZE, RESIZE_PRESETS, ResizePreset, ToolConfig,
};
pub use error::ToolError;
pub use estimator::{EstimatedOutcome, estimate_output_bytes, format_fraction, pixel_ratio};
pub use intake::Intake;
pub use object_url::{ObjectUrl, ObjectUrlRegistry};
pub use pdf_queue::{AddOutcome, PdfQueue, QueuedFile, RejectedFile};
pub use presenter::{
    Savings, SavingsDirection, download_file_name, format_file_size, save_result,
    success_message,
};
pub use qr::{QR_DEFAULT_SIZE, QR_MAX_SIZE, QR_MIN_SIZE, QrCode, QrRequest};
pub use service::{EstimateReport, ToolRequest, ToolService};
pub use session::{Completion, SessionState, Submission, ToolSession};
pub use source::{
    Dimensions, FileInput, OutputFormat, ProcessingResult, RemoteOutput, ToolKind,
    TransformOptions, UploadCandidate,
};
