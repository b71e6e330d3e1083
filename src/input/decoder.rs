/// FFmpeg 采集 (视频文件 / RTSP 等网络流)
///
/// 解码在 ez-ffmpeg 调度线程中进行, 帧经有界通道交给 `read`。
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::core::scheduler::ffmpeg_scheduler::{FfmpegScheduler, Running};
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbImage;
use tracing::{info, warn};

use super::decode_filter::DecodeFilter;
use super::{Capture, SourceConfig, SourceKind};
use crate::{Result, SentinelError};

/// 解码线程与消费端之间最多缓存的帧数
const CHANNEL_CAPACITY: usize = 2;

pub struct FfmpegCapture {
    rx: Option<Receiver<RgbImage>>,
    scheduler: Option<FfmpegScheduler<Running>>,
    read_timeout: std::time::Duration,
    live: bool,
}

impl FfmpegCapture {
    pub fn open(config: &SourceConfig) -> Result<Self> {
        let (tx, rx) = bounded(CHANNEL_CAPACITY);

        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let live = config.kind == SourceKind::Stream;
        let pipe = pipe.filter("decode", Box::new(DecodeFilter::new(tx, live)));
        let out = create_null_output().add_frame_pipeline(pipe);

        let mut input = Input::new(config.uri.as_str());
        if config.uri.to_ascii_lowercase().starts_with("rtsp") {
            input = input
                .set_input_opts([("rtsp_transport", "tcp"), ("rtsp_flags", "prefer_tcp")].into());
        }

        let desc = format!(
            "scale={}:{},format=rgb24",
            config.frame_width, config.frame_height
        );
        let ctx = FfmpegContext::builder()
            .input(input)
            .filter_descs([desc.as_str()].into())
            .output(out)
            .build()
            .map_err(|e| SentinelError::open(&config.uri, format!("构建失败: {}", e)))?;

        let scheduler = ctx
            .start()
            .map_err(|e| SentinelError::open(&config.uri, format!("启动失败: {}", e)))?;

        info!("🎬 FFmpeg 解码启动: {}", config.uri);
        Ok(Self {
            rx: Some(rx),
            scheduler: Some(scheduler),
            read_timeout: config.read_timeout,
            live,
        })
    }
}

impl Capture for FfmpegCapture {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        let Some(rx) = self.rx.as_ref() else {
            return Err(SentinelError::Read("capture released".to_string()));
        };
        match rx.recv_timeout(self.read_timeout) {
            Ok(image) => Ok(Some(image)),
            Err(RecvTimeoutError::Timeout) => {
                warn!("⏳ {}ms 内未收到新帧", self.read_timeout.as_millis());
                Ok(None)
            }
            // 解码线程已退出 (流断开 / 文件结束)
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn release(&mut self) {
        // 先断开通道, 唤醒阻塞在 send 上的解码线程
        self.rx = None;
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.abort();
            info!("🛑 FFmpeg 解码已停止");
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

impl Drop for FfmpegCapture {
    fn drop(&mut self) {
        self.release();
    }
}
