//! 帧源 (Frame source)
//!
//! 独占一个采集句柄。`read_next` 最多尝试 `read_attempts` 次, 每次失败后等待
//! `reconnect_delay`; 网络流在两次尝试之间完整释放并重新打开句柄。
//! 全部失败时返回 `Read` 错误, 由调用方决定是否从头重新打开。

use tracing::{info, warn};

use super::{Capture, CaptureOpener, SourceConfig};
use crate::detection::Frame;
use crate::pipeline::StopHandle;
use crate::utils::resize_rgb;
use crate::{Result, SentinelError};

pub struct FrameSource {
    config: SourceConfig,
    opener: Box<dyn CaptureOpener>,
    capture: Option<Box<dyn Capture>>,
    stop: StopHandle,
    frames_read: u64,
    opens: u64,
}

impl FrameSource {
    pub fn new(config: SourceConfig, opener: Box<dyn CaptureOpener>) -> Self {
        Self {
            config,
            opener,
            capture: None,
            stop: StopHandle::new(),
            frames_read: 0,
            opens: 0,
        }
    }

    /// 重试等待期间响应停止信号
    pub fn with_stop(mut self, stop: StopHandle) -> Self {
        self.set_stop(stop);
        self
    }

    pub fn set_stop(&mut self, stop: StopHandle) {
        self.stop = stop;
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// 打开采集句柄; 已打开的句柄先释放
    pub fn open(&mut self) -> Result<()> {
        self.release();
        let capture = self.opener.open(&self.config)?;
        self.opens += 1;
        info!(
            "📹 视频源已打开: {} ({:?}, 第{}次)",
            self.config.uri, self.config.kind, self.opens
        );
        self.capture = Some(capture);
        Ok(())
    }

    /// 完整释放后重新打开
    pub fn reopen(&mut self) -> Result<()> {
        info!("🔄 重新打开视频源: {}", self.config.uri);
        self.open()
    }

    pub fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.release();
        }
    }

    pub fn is_open(&self) -> bool {
        self.capture.is_some()
    }

    /// 成功打开的次数 (含初次)
    pub fn opens(&self) -> u64 {
        self.opens
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// 读取下一帧 (有限重试)
    pub fn read_next(&mut self) -> Result<Frame> {
        let attempts = self.config.read_attempts.max(1);
        let live = self.config.kind.is_live();

        for attempt in 1..=attempts {
            if self.stop.is_stopped() {
                return Err(SentinelError::Read("stopped".to_string()));
            }

            let reason = match self.capture.as_mut() {
                Some(capture) => match capture.read() {
                    Ok(Some(image)) => {
                        let image =
                            resize_rgb(image, self.config.frame_width, self.config.frame_height)?;
                        let frame = Frame::new(image, self.frames_read);
                        self.frames_read += 1;
                        return Ok(frame);
                    }
                    Ok(None) => "no frame".to_string(),
                    Err(e) => e.to_string(),
                },
                None => "capture not open".to_string(),
            };

            warn!("⚠️ 读帧失败 ({}), attempt {}/{}", reason, attempt, attempts);

            if attempt == attempts {
                break;
            }
            if live {
                self.release();
            }
            if self.stop.sleep(self.config.reconnect_delay) {
                return Err(SentinelError::Read("stopped".to_string()));
            }
            if live {
                if let Err(e) = self.open() {
                    warn!("⚠️ 重连失败: {}", e);
                }
            }
        }

        Err(SentinelError::Read(format!(
            "no frame from `{}` after {} attempts",
            self.config.uri, attempts
        )))
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use image::RgbImage;

    use super::*;
    use crate::input::SourceKind;

    /// 按脚本返回帧 (true = 有帧), 脚本由所有句柄共享
    struct Scripted {
        script: Arc<std::sync::Mutex<VecDeque<bool>>>,
        releases: Arc<AtomicU32>,
        live: bool,
    }

    impl Capture for Scripted {
        fn read(&mut self) -> Result<Option<RgbImage>> {
            let next = self.script.lock().unwrap().pop_front().unwrap_or(false);
            Ok(next.then(|| RgbImage::new(32, 18)))
        }
        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
        fn is_live(&self) -> bool {
            self.live
        }
    }

    struct Opener {
        script: Arc<std::sync::Mutex<VecDeque<bool>>>,
        releases: Arc<AtomicU32>,
    }

    impl CaptureOpener for Opener {
        fn open(&self, config: &SourceConfig) -> Result<Box<dyn Capture>> {
            Ok(Box::new(Scripted {
                script: self.script.clone(),
                releases: self.releases.clone(),
                live: config.kind.is_live(),
            }))
        }
    }

    fn source(uri: &str, script: &[bool]) -> (FrameSource, Arc<AtomicU32>) {
        let releases = Arc::new(AtomicU32::new(0));
        let mut config = SourceConfig::new(uri);
        config.reconnect_delay = Duration::from_millis(1);
        config.frame_width = 16;
        config.frame_height = 9;
        let opener = Opener {
            script: Arc::new(std::sync::Mutex::new(script.iter().copied().collect())),
            releases: releases.clone(),
        };
        (FrameSource::new(config, Box::new(opener)), releases)
    }

    #[test]
    fn frames_are_resized_and_indexed() {
        let (mut src, _) = source("rtsp://cam", &[true, true]);
        src.open().unwrap();
        let a = src.read_next().unwrap();
        let b = src.read_next().unwrap();
        assert_eq!((a.width(), a.height()), (16, 9));
        assert_eq!((a.index, b.index), (0, 1));
    }

    #[test]
    fn live_source_reopens_between_failed_attempts() {
        let (mut src, releases) = source("rtsp://cam", &[false, false, false]);
        src.open().unwrap();
        assert_eq!(src.config().kind, SourceKind::Stream);

        let err = src.read_next().unwrap_err();
        assert!(matches!(err, SentinelError::Read(_)));
        // 初次 + 两次尝试间重连, 最后一次失败后不再重连
        assert_eq!(src.opens(), 3);
        assert_eq!(releases.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn recovers_within_the_attempt_budget() {
        let (mut src, _) = source("rtsp://cam", &[false, true]);
        src.open().unwrap();
        assert!(src.read_next().is_ok());
        assert_eq!(src.opens(), 2);
    }

    #[test]
    fn file_source_retries_without_reopening() {
        let (mut src, _) = source("video.mp4", &[false, false, false]);
        src.open().unwrap();
        assert!(src.read_next().is_err());
        assert_eq!(src.opens(), 1);
    }

    #[test]
    fn drop_releases_the_capture() {
        let (mut src, releases) = source("video.mp4", &[]);
        src.open().unwrap();
        drop(src);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
