/// FFmpeg解码过滤器: 视频帧 (rgb24) → RgbImage → 采集通道
/// FFmpeg decode filter feeding the capture channel
use std::time::Instant;

use crossbeam_channel::{Sender, TrySendError};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use tracing::{debug, info, warn};

/// 单边最大分辨率, 超出视为损坏帧
const MAX_DIMENSION: u32 = 8192;

pub struct DecodeFilter {
    tx: Sender<RgbImage>,
    /// 实时流丢帧保低延迟; 文件阻塞等待消费端, 不丢帧
    live: bool,
    count: usize,
    last: Instant,
    pub dropped_frames: usize,
    pub total_frames: usize,
}

impl DecodeFilter {
    pub fn new(tx: Sender<RgbImage>, live: bool) -> Self {
        Self {
            tx,
            live,
            count: 0,
            last: Instant::now(),
            dropped_frames: 0,
            total_frames: 0,
        }
    }

    /// 交给消费端; 通道已断开 (采集已释放) 时返回错误以结束解码
    fn forward(&mut self, image: RgbImage) -> Result<(), String> {
        if self.live {
            match self.tx.try_send(image) {
                Ok(()) => self.count += 1,
                Err(TrySendError::Full(_)) => self.dropped_frames += 1,
                Err(TrySendError::Disconnected(_)) => return Err("capture released".to_string()),
            }
        } else if self.tx.send(image).is_ok() {
            self.count += 1;
        } else {
            return Err("capture released".to_string());
        }
        Ok(())
    }

    fn drop_frame(&mut self, reason: &str) {
        self.dropped_frames += 1;
        if self.total_frames <= 10 {
            warn!("⚠️ 丢弃帧 #{}: {}", self.total_frames, reason);
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        info!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        self.total_frames += 1;

        unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.drop_frame("空帧/损坏帧");
                return Ok(None);
            }

            let raw = &*frame.as_ptr();
            let w = raw.width as u32;
            let h = raw.height as u32;
            if w == 0 || h == 0 || w > MAX_DIMENSION || h > MAX_DIMENSION {
                self.drop_frame(&format!("非法分辨率 {}x{}", w, h));
                return Ok(None);
            }

            // 缺少参考帧 / 无效比特流
            if raw.decode_error_flags & 0x03 != 0 {
                self.drop_frame(&format!("解码错误标志=0x{:02x}", raw.decode_error_flags));
                return Ok(None);
            }

            // 滤镜链已转换为 rgb24, 只有一个平面
            let plane = raw.data[0];
            let stride = raw.linesize[0] as usize;
            let row_bytes = w as usize * 3;
            if plane.is_null() || stride < row_bytes {
                self.drop_frame(&format!("步长异常 stride={}", stride));
                return Ok(None);
            }

            let mut pixels = Vec::with_capacity(row_bytes * h as usize);
            for row in 0..h as usize {
                let src = std::slice::from_raw_parts(plane.add(row * stride), row_bytes);
                pixels.extend_from_slice(src);
            }

            let Some(image) = RgbImage::from_raw(w, h, pixels) else {
                self.drop_frame("像素缓冲区长度不匹配");
                return Ok(None);
            };

            self.forward(image)?;
        }

        if self.last.elapsed().as_secs_f64() >= 5.0 {
            let elapsed = self.last.elapsed().as_secs_f64();
            debug!(
                "📺 解码统计: {:.1}fps | 总帧{} | 丢弃{}",
                self.count as f64 / elapsed,
                self.total_frames,
                self.dropped_frames
            );
            self.last = Instant::now();
            self.count = 0;
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        info!(
            "❌ 解码线程退出 (总帧{} 丢弃{})",
            self.total_frames, self.dropped_frames
        );
    }
}
