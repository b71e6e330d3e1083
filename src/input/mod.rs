/// 视频输入系统 (Video Input System)
///
/// - FrameSource:          有限重试读帧, 网络流失败时完整释放并重新打开
/// - ImageSequenceCapture: 图片序列目录 (纯 Rust, 无需 FFmpeg)
/// - FfmpegCapture:        视频文件 / RTSP 等网络流 (feature = "ffmpeg")
#[cfg(feature = "ffmpeg")]
pub mod decode_filter;
#[cfg(feature = "ffmpeg")]
pub mod decoder;
pub mod image_sequence;
pub mod source;

use std::path::Path;
use std::time::Duration;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::Result;

#[cfg(feature = "ffmpeg")]
pub use decoder::FfmpegCapture;
pub use image_sequence::ImageSequenceCapture;
pub use source::FrameSource;

/// 网络流协议前缀
const STREAM_SCHEMES: &[&str] = &["rtsp", "rtsps", "rtmp", "http", "https", "udp", "tcp", "srt"];

/// 视频源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// 网络流 (rtsp:// 等), 读失败需要重连
    Stream,
    /// 本地视频文件
    File,
    /// 图片序列目录
    ImageSequence,
}

impl SourceKind {
    pub fn classify(uri: &str) -> Self {
        if let Some((scheme, _)) = uri.split_once("://") {
            if STREAM_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
                return SourceKind::Stream;
            }
        }
        if Path::new(uri).is_dir() {
            SourceKind::ImageSequence
        } else {
            SourceKind::File
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, SourceKind::Stream)
    }
}

/// 视频源配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub uri: String,
    pub kind: SourceKind,
    /// 单次读帧的最大尝试次数
    pub read_attempts: u32,
    /// 两次尝试之间的等待 (网络流同时完整重连)
    pub reconnect_delay: Duration,
    /// 单次读帧等待上限 (解码线程)
    pub read_timeout: Duration,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl SourceConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self {
            kind: SourceKind::classify(&uri),
            uri,
            read_attempts: 3,
            reconnect_delay: Duration::from_secs(5),
            read_timeout: Duration::from_secs(2),
            frame_width: 640,
            frame_height: 360,
        }
    }
}

/// 采集句柄
pub trait Capture: Send {
    /// `Ok(None)` 表示本次没有读到帧 (流中断 / 文件结束)
    fn read(&mut self) -> Result<Option<RgbImage>>;

    /// 释放底层资源, 可重复调用
    fn release(&mut self);

    fn is_live(&self) -> bool;
}

/// 打开采集句柄 (重连时需要从头重新打开)
pub trait CaptureOpener: Send {
    fn open(&self, config: &SourceConfig) -> Result<Box<dyn Capture>>;
}

/// 按源类型选择采集实现
pub struct DefaultOpener;

impl CaptureOpener for DefaultOpener {
    fn open(&self, config: &SourceConfig) -> Result<Box<dyn Capture>> {
        match config.kind {
            SourceKind::ImageSequence => Ok(Box::new(ImageSequenceCapture::open(&config.uri)?)),
            #[cfg(feature = "ffmpeg")]
            SourceKind::Stream | SourceKind::File => Ok(Box::new(FfmpegCapture::open(config)?)),
            #[cfg(not(feature = "ffmpeg"))]
            SourceKind::Stream | SourceKind::File => Err(crate::SentinelError::open(
                &config.uri,
                "video files and streams need the `ffmpeg` feature",
            )),
        }
    }
}
