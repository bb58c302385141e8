//! # 图片工具箱 · 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 CLI (clap 子命令 / --json)                │
//! │   resize · convert · compress · remove-bg · pdf · qr      │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Result<CommandOutput, CommandError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            库 (Rust)                             │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  │                                                       │
//! │  ├─ settings ─── 默认值 < JSON < 环境变量 < CLI           │
//! │  │                                                       │
//! │  └─ tools                                                │
//! │      ├─ commands / service     命令适配 · 编排 · 计时      │
//! │      ├─ session / batch / pdf  状态机 · 并发上限 · 队列    │
//! │      ├─ intake / estimator     入口校验 · 本地估算         │
//! │      ├─ client                 远端 multipart / JSON       │
//! │      └─ presenter / qr         文件名 · 节省比例 · 二维码  │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ HTTP (reqwest)
//!   图片处理服务 / remove.bg
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，CLI 入口的返回类型 |
//! | [`settings`] | 端点地址、API Key、广告位、提示样式的加载与脱敏 |
//! | [`tools`] | 六个图片工具的校验、估算、提交、状态与结果展示 |

pub mod error;
pub mod settings;
pub mod tools;
