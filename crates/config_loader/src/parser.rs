//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{CaptureConfig, ContractError};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// 无扩展名时根据内容猜测
    pub fn sniff(content: &str) -> Self {
        if content.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Toml
        }
    }
}

/// 解析 TOML 格式配置
///
/// 错误信息带行号，方便定位手写配置中的问题。
pub fn parse_toml(content: &str) -> Result<CaptureConfig, ContractError> {
    toml::from_str(content).map_err(|e| {
        let line = e.span().map(|span| line_of(content, span.start));
        parse_error("TOML", line, e.message().trim().to_string(), e)
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<CaptureConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| {
        let line = Some(e.line()).filter(|l| *l > 0);
        parse_error("JSON", line, e.to_string(), e)
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<CaptureConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

/// 字节偏移 -> 行号 (从 1 开始)
fn line_of(content: &str, offset: usize) -> usize {
    let end = offset.min(content.len());
    content.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

fn parse_error(
    format: &str,
    line: Option<usize>,
    detail: String,
    source: impl std::error::Error + Send + Sync + 'static,
) -> ContractError {
    let message = match line {
        Some(line) => format!("{format} parse error at line {line}: {detail}"),
        None => format!("{format} parse error: {detail}"),
    };
    ContractError::ConfigParse {
        message,
        source: Some(Box::new(source)),
    }
}
