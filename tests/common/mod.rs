#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::NaiveTime;
use image::{Rgb, RgbImage};

use security_sentinel::alerts::{Alert, AlertKind, Notifier};
use security_sentinel::detection::{Detection, Detector, Frame, Label};
use security_sentinel::input::{Capture, CaptureOpener, SourceConfig};
use security_sentinel::pipeline::Clock;
use security_sentinel::{Result, SentinelError};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 36;
pub const GREY: Rgb<u8> = Rgb([90, 90, 90]);

/// 所有句柄共享的读帧脚本与计数器
#[derive(Clone, Default)]
pub struct ScriptedOpener {
    /// true = 读到帧, false = 读失败; 脚本耗尽后返回 `fallback`
    script: Arc<Mutex<VecDeque<bool>>>,
    fallback: bool,
    pub opens: Arc<AtomicU32>,
    pub releases: Arc<AtomicU32>,
}

impl ScriptedOpener {
    pub fn new(script: &[bool], fallback: bool) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.iter().copied().collect())),
            fallback,
            ..Default::default()
        }
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }
}

struct ScriptedCapture {
    opener: ScriptedOpener,
    live: bool,
    released: bool,
}

impl Capture for ScriptedCapture {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        if self.released {
            return Err(SentinelError::Read("released".into()));
        }
        let ok = self
            .opener
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.opener.fallback);
        Ok(ok.then(|| RgbImage::from_pixel(WIDTH, HEIGHT, GREY)))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.opener.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

impl CaptureOpener for ScriptedOpener {
    fn open(&self, config: &SourceConfig) -> Result<Box<dyn Capture>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedCapture {
            opener: self.clone(),
            live: config.kind.is_live(),
            released: false,
        }))
    }
}

pub fn source_config(uri: &str) -> SourceConfig {
    let mut config = SourceConfig::new(uri);
    config.reconnect_delay = Duration::from_millis(1);
    config.frame_width = WIDTH;
    config.frame_height = HEIGHT;
    config
}

/// 每次调用依次返回脚本中的检测结果 (耗尽后重复最后一项)
pub struct ScriptedDetector {
    script: VecDeque<Result<Vec<Detection>>>,
    last: Vec<Detection>,
    pub calls: Arc<AtomicU32>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Result<Vec<Detection>>>) -> Self {
        Self {
            script: script.into(),
            last: Vec::new(),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn always(detections: Vec<Detection>) -> Self {
        Self::new(vec![Ok(detections)])
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, _frame: &Frame, allowed: &[Label]) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Ok(dets)) => {
                self.last = dets.clone();
                Ok(dets.into_iter().filter(|d| allowed.contains(&d.label)).collect())
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last.clone()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// 记录收到的告警
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub delivered: Arc<Mutex<Vec<(AlertKind, String, usize)>>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<AlertKind> {
        self.delivered.lock().unwrap().iter().map(|d| d.0).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, alert: &Alert, jpeg: &[u8]) -> Result<Option<PathBuf>> {
        self.delivered
            .lock()
            .unwrap()
            .push((alert.kind, alert.message.clone(), jpeg.len()));
        Ok(None)
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// 手动推进的时钟
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
    wall: NaiveTime,
}

impl ManualClock {
    pub fn new(wall: NaiveTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
            wall,
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    fn wall(&self) -> NaiveTime {
        self.wall
    }
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}
