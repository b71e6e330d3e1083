//! 告警发送 (Alert emitter)
//! 职责: 候选告警 + 当前标注帧 → 告警记录 → 通知方 + 进程内日志
//!
//! 这是唯一产生外部可见副作用的地方; 任何通知失败只记录日志, 不会中断检测循环。

use image::RgbImage;
use tracing::{error, info};

use super::log::AlertLog;
use super::notify::Notifier;
use super::types::{Alert, CandidateAlert};
use crate::utils::{encode_jpeg, gen_time_string};

pub struct AlertEmitter {
    log: AlertLog,
    notifiers: Vec<Box<dyn Notifier>>,
    jpeg_quality: u8,
    failures: u64,
}

impl AlertEmitter {
    pub fn new(log: AlertLog) -> Self {
        Self {
            log,
            notifiers: Vec::new(),
            jpeg_quality: 85,
            failures: 0,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn log(&self) -> &AlertLog {
        &self.log
    }

    /// 累计通知失败次数
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn emit(&mut self, candidate: &CandidateAlert, snapshot: &RgbImage, frame_index: u64) -> Alert {
        let mut alert = Alert {
            kind: candidate.kind,
            message: candidate.message.clone(),
            timestamp: gen_time_string(),
            track: candidate.key.track(),
            frame_index,
            image: None,
        };

        info!("🚨 ALERT [{}]: {}", alert.kind, alert.message);

        if !self.notifiers.is_empty() {
            match encode_jpeg(snapshot, self.jpeg_quality) {
                Ok(jpeg) => {
                    for notifier in &self.notifiers {
                        match notifier.deliver(&alert, &jpeg) {
                            Ok(Some(path)) => {
                                info!("💾 告警快照已保存: {}", path.display());
                                alert.image.get_or_insert(path);
                            }
                            Ok(None) => {}
                            Err(e) => {
                                self.failures += 1;
                                error!("❌ 告警通知失败 ({}): {}", notifier.name(), e);
                            }
                        }
                    }
                }
                Err(e) => {
                    self.failures += 1;
                    error!("❌ 告警快照编码失败: {}", e);
                }
            }
        }

        self.log.push(alert.clone());
        alert
    }
}
