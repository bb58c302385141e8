//! # 二维码请求模型
//!
//! 二维码的编码由远端完成，这里只负责请求参数校验与结果 Data URL 的解析。

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ToolError;

pub const QR_MIN_SIZE: u32 = 100;
pub const QR_MAX_SIZE: u32 = 2000;
pub const QR_DEFAULT_SIZE: u32 = 256;

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap());

/// 远端 `/qr-code` 请求体。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrRequest {
    pub text: String,
    pub size: u32,
    pub fg_color: String,
    pub bg_color: String,
}

impl Default for QrRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            size: QR_DEFAULT_SIZE,
            fg_color: "#000000".to_string(),
            bg_color: "#ffffff".to_string(),
        }
    }
}

impl QrRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// 发送前校验；失败时不会发出任何请求。
    pub fn validate(&self) -> Result<(), ToolError> {
        if self.text.trim().is_empty() {
            return Err(ToolError::Validation(
                "Please enter text or URL to generate QR code".to_string(),
            ));
        }
        if !(QR_MIN_SIZE..=QR_MAX_SIZE).contains(&self.size) {
            return Err(ToolError::Validation(format!(
                "QR size must be between {} and {} pixels",
                QR_MIN_SIZE, QR_MAX_SIZE
            )));
        }
        for (label, color) in [("foreground", &self.fg_color), ("background", &self.bg_color)] {
            if !HEX_COLOR.is_match(color) {
                return Err(ToolError::Validation(format!(
                    "Invalid {} color: {} (expected #rrggbb)",
                    label, color
                )));
            }
        }
        Ok(())
    }
}

/// 远端 `/qr-code` 响应体。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrResponse {
    pub qr_data_url: String,
}

/// 生成好的二维码。
#[derive(Debug, Clone)]
pub struct QrCode {
    pub data_url: String,
    pub mime: String,
    pub png: Bytes,
}

impl QrCode {
    pub fn from_data_url(data_url: String) -> Result<Self, ToolError> {
        let (mime, bytes) = parse_data_url(&data_url)?;
        Ok(Self {
            data_url,
            mime,
            png: Bytes::from(bytes),
        })
    }
}

/// 解析 `data:<mime>;base64,<payload>`。
pub(crate) fn parse_data_url(data: &str) -> Result<(String, Vec<u8>), ToolError> {
    let normalized = data.trim();
    let rest = normalized
        .strip_prefix("data:")
        .ok_or_else(|| ToolError::Decode("缺少 data: 前缀".to_string()))?;

    let marker = rest
        .find(";base64,")
        .ok_or_else(|| ToolError::Decode("缺少 base64 标记".to_string()))?;

    let mime = &rest[..marker];
    if !mime.starts_with("image/") {
        return Err(ToolError::Decode(format!("Data URL 不是图片类型：{}", mime)));
    }

    let payload = &rest[marker + 8..];
    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ToolError::Decode(format!("Base64 解码失败：{}", e)))?;

    if bytes.is_empty() {
        return Err(ToolError::Decode("图片内容为空".to_string()));
    }

    Ok((mime.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_text() {
        let request = QrRequest::new("   ");
        assert!(matches!(request.validate(), Err(ToolError::Validation(_))));
    }

    #[test]
    fn rejects_size_out_of_range() {
        let mut request = QrRequest::new("https://example.com");
        request.size = 99;
        assert!(request.validate().is_err());
        request.size = 2001;
        assert!(request.validate().is_err());
        request.size = 2000;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn rejects_malformed_colors() {
        let mut request = QrRequest::new("hello");
        request.fg_color = "black".to_string();
        assert!(request.validate().is_err());
        request.fg_color = "#00FF00".to_string();
        request.bg_color = "#fff".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(QrRequest::new("hi")).expect("serialize request");
        assert_eq!(json["fgColor"], "#000000");
        assert_eq!(json["bgColor"], "#ffffff");
        assert_eq!(json["size"], 256);
    }

    #[test]
    fn parses_png_data_url() {
        let png_signature = [137_u8, 80, 78, 71, 13, 10, 26, 10];
        let url = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(png_signature)
        );

        let code = QrCode::from_data_url(url).expect("data url should parse");

        assert_eq!(code.mime, "image/png");
        assert_eq!(&code.png[..], &png_signature);
    }

    #[test]
    fn rejects_non_image_data_url() {
        assert!(matches!(
            parse_data_url("data:text/plain;base64,SGVsbG8="),
            Err(ToolError::Decode(_))
        ));
        assert!(matches!(parse_data_url("SGVsbG8="), Err(ToolError::Decode(_))));
    }
}
