//! # 应用设置
//!
//! ## 设计思路
//!
//! 设置按优先级叠加：内置默认值 < JSON 设置文件 < 环境变量 < 命令行参数。
//! 环境变量通过查找闭包注入，测试无需修改进程环境。
//!
//! ## 实现思路
//!
//! - `ToolSettings` 使用 `#[serde(default)]`，设置文件可以只写部分字段。
//! - `endpoints()` / `tool_config()` 把设置转换为工具链路所需的类型。
//! - `redacted()` 用于 `settings` 子命令输出，API Key 只显示是否已配置。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::tools::{DEFAULT_API_BASE_URL, DEFAULT_REMOVE_BG_URL, RemoteEndpoints, ToolConfig};

/// 提示文案样式，显式传给结果展示层。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presentation {
    Plain,
    #[default]
    Decorated,
}

impl Presentation {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plain" => Some(Self::Plain),
            "decorated" | "fancy" => Some(Self::Decorated),
            _ => None,
        }
    }

    pub fn decorate_success(self, message: &str) -> String {
        match self {
            Self::Plain => message.to_string(),
            Self::Decorated => format!("✅ {}", message),
        }
    }

    pub fn decorate_error(self, message: &str) -> String {
        match self {
            Self::Plain => message.to_string(),
            Self::Decorated => format!("❌ {}", message),
        }
    }
}

/// 广告位配置。发布者 ID 为空时不渲染任何广告位。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdSettings {
    pub client: Option<String>,
    pub slot: Option<String>,
}

impl AdSettings {
    pub fn ads_enabled(&self) -> bool {
        self.client
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub api_base_url: String,
    /// 未设置时沿用 `api_base_url`。
    pub legacy_api_base_url: Option<String>,
    pub remove_bg_url: String,
    pub remove_bg_api_key: Option<String>,
    pub presentation: Presentation,
    pub ads: AdSettings,
    pub max_file_size: Option<u64>,
    pub request_timeout: Option<u64>,
    pub batch_concurrency: Option<usize>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            legacy_api_base_url: None,
            remove_bg_url: DEFAULT_REMOVE_BG_URL.to_string(),
            remove_bg_api_key: None,
            presentation: Presentation::default(),
            ads: AdSettings::default(),
            max_file_size: None,
            request_timeout: None,
            batch_concurrency: None,
        }
    }
}

impl ToolSettings {
    /// 读取 JSON 设置文件。
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("解析设置文件失败: {}", e)))
    }

    /// 默认值（或设置文件）之上叠加进程环境变量。
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// 用查找函数覆盖字段；空字符串视为未设置。
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = get("LEGACY_API_BASE_URL") {
            self.legacy_api_base_url = Some(v);
        }
        if let Some(v) = get("REMOVE_BG_URL") {
            self.remove_bg_url = v;
        }
        if let Some(v) = get("REMOVE_BG_API_KEY") {
            self.remove_bg_api_key = Some(v);
        }
        if let Some(v) = get("ADSENSE_CLIENT") {
            self.ads.client = Some(v);
        }
        if let Some(v) = get("ADSENSE_SLOT") {
            self.ads.slot = Some(v);
        }
        if let Some(v) = get("IMAGE_TOOLBOX_STYLE") {
            match Presentation::parse(&v) {
                Some(p) => self.presentation = p,
                None => log::warn!("⚠️ 未知提示样式 IMAGE_TOOLBOX_STYLE={}，保持默认", v),
            }
        }
    }

    pub fn endpoints(&self) -> RemoteEndpoints {
        RemoteEndpoints {
            api_base: self.api_base_url.clone(),
            legacy_base: self
                .legacy_api_base_url
                .clone()
                .unwrap_or_else(|| self.api_base_url.clone()),
            remove_bg_url: self.remove_bg_url.clone(),
            remove_bg_api_key: self.remove_bg_api_key.clone(),
        }
    }

    pub fn tool_config(&self) -> ToolConfig {
        let mut config = ToolConfig::default();
        if let Some(size) = self.max_file_size {
            config.max_file_size = size;
        }
        if let Some(timeout) = self.request_timeout {
            config.request_timeout = timeout;
        }
        if let Some(concurrency) = self.batch_concurrency {
            config.batch_concurrency = concurrency;
        }
        config
    }

    /// 可安全打印的副本。
    pub fn redacted(&self) -> Self {
        Self {
            remove_bg_api_key: self
                .remove_bg_api_key
                .as_ref()
                .map(|_| "<configured>".to_string()),
            ..self.clone()
        }
    }
}
