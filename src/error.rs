//! 错误分类 (Error taxonomy)
//!
//! - `Open`:     视频源无法打开 (启动时致命)
//! - `Read`:     读帧失败 (瞬时错误, 有限重试后重新打开)
//! - `Config`:   配置非法 (启动时致命)
//! - `Emission`: 告警通知失败 (记录日志后忽略)
//! - `Detect`:   模型推理失败 (按 Read 处理, 跳过本周期)

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("failed to open video source `{source_uri}`: {reason}")]
    Open { source_uri: String, reason: String },

    #[error("frame read failed: {0}")]
    Read(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("alert emission failed: {0}")]
    Emission(String),

    #[error("detection failed: {0}")]
    Detect(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl SentinelError {
    pub fn open(source_uri: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Open {
            source_uri: source_uri.into(),
            reason: reason.to_string(),
        }
    }

    /// 运行期可恢复的错误 (读帧/推理), 循环不会因此退出
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Read(_) | Self::Detect(_))
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;
