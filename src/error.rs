//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 工具链路内部使用 `ToolError`（带错误码与阶段），命令层输出 `CommandError`；
//! 设置加载、CLI 入口这类链路之外的失败统一收敛到 `AppError`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ToolError` / `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于 `--json` 输出。

use serde::Serialize;

use crate::tools::ToolError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 图片工具链路错误（校验 / 远端 / 输出）
    #[error("{0}")]
    Tool(#[from] ToolError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设置文件或参数不合法
    #[error("配置错误: {0}")]
    Config(String),

    /// 运行时初始化失败
    #[error("运行时错误: {0}")]
    Runtime(String),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
