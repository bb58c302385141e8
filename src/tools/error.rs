//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载工具链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 错误分三类：
//! 1. 本地校验错误（类型 / 体积 / 缺少尺寸），一定发生在任何网络调用之前
//! 2. 远端返回的非成功状态（remove.bg 的额度耗尽与密钥无效单独成支）
//! 3. 网络层异常（断网、超时）
//!
//! 所有错误都只作用于当前这一次工具交互，不会让进程退出，也不会自动重试。

/// 工具链路统一错误类型。
///
/// 该类型会在命令层被上转为 `CommandError`，最终输出给用户。
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("invalid file type: {0}")]
    InvalidFileType(String),

    #[error("file too large: {:.2} MB (limit {:.2} MB)", megabytes(.size), megabytes(.limit))]
    FileTooLarge { size: u64, limit: u64 },

    #[error("{0}")]
    Validation(String),

    #[error("API credits exhausted. Please check your remove.bg account.")]
    QuotaExhausted,

    #[error("Invalid API key. Please check your remove.bg API key.")]
    InvalidCredential,

    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("file error: {0}")]
    FileSystem(String),

    #[error("clipboard error: {0}")]
    Clipboard(String),

    #[error("resource limit: {0}")]
    ResourceLimit(String),
}

fn megabytes(bytes: &u64) -> f64 {
    *bytes as f64 / 1024.0 / 1024.0
}

impl ToolError {
    /// 稳定错误码，供命令层输出与脚本判断。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFileType(_) => "E_INVALID_FILE_TYPE",
            Self::FileTooLarge { .. } => "E_FILE_TOO_LARGE",
            Self::Validation(_) => "E_VALIDATION",
            Self::QuotaExhausted => "E_QUOTA_EXHAUSTED",
            Self::InvalidCredential => "E_INVALID_CREDENTIAL",
            Self::Remote { .. } => "E_REMOTE_STATUS",
            Self::Network(_) => "E_NETWORK",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::Decode(_) => "E_DECODE",
            Self::FileSystem(_) => "E_FILE_SYSTEM",
            Self::Clipboard(_) => "E_CLIPBOARD",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
        }
    }

    /// 出错阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidFileType(_) | Self::FileTooLarge { .. } | Self::Decode(_) => "intake",
            Self::Validation(_) => "preflight",
            Self::QuotaExhausted
            | Self::InvalidCredential
            | Self::Remote { .. }
            | Self::Network(_)
            | Self::Timeout(_) => "remote",
            Self::FileSystem(_) | Self::Clipboard(_) => "output",
            Self::ResourceLimit(_) => "runtime",
        }
    }

    /// 是否属于“未发出任何网络请求”的本地校验错误。
    pub fn is_client_side(&self) -> bool {
        matches!(
            self,
            Self::InvalidFileType(_) | Self::FileTooLarge { .. } | Self::Validation(_)
        )
    }
}

impl From<ToolError> for String {
    fn from(error: ToolError) -> Self {
        error.to_string()
    }
}
