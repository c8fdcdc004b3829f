//! 配置错误：在任何扫描开始之前返回给调用方。
//!
//! 不变量被破坏（块内重复片段、解析后仍有重叠等）属于程序逻辑错误，
//! 直接 `assert!` 终止，不经过这里。

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("anchor size must be in 1..={max}, got {got}")]
    AnchorSize { got: usize, max: usize },

    #[error("{name} must be at least {min}, got {got}")]
    TooSmall { name: &'static str, min: i64, got: i64 },

    #[error("false positive rate must be in (0, 1), got {0}")]
    FalsePositiveRate(f64),

    #[error("gap range {gap_range} with gap penalty {gap_penalty} exceeds error budget {max_errors}")]
    BandExceedsBudget { gap_range: usize, gap_penalty: u32, max_errors: u32 },

    #[error("unknown step '{0}'")]
    UnknownStep(String),

    #[error("unknown parameter '{param}' for step '{step}'")]
    UnknownParam { step: String, param: String },

    #[error("invalid value '{value}' for parameter '{param}'")]
    InvalidValue { param: String, value: String },

    #[error("cannot build worker pool: {0}")]
    Pool(String),
}

impl ConfigError {
    pub fn too_small(name: &'static str, min: i64, got: i64) -> Self {
        Self::TooSmall { name, min, got }
    }

    pub fn invalid_value<S: Into<String>>(param: S, value: S) -> Self {
        Self::InvalidValue { param: param.into(), value: value.into() }
    }
}
