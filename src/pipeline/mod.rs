/// 检测流水线 (Detection pipeline)
///
/// 单线程工作者: 取帧 → 检测 → 策略评估 → 冷却 → 告警 → 发布最新帧
pub mod annotate;
pub mod latest;
pub mod orchestrator;
pub mod session;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use annotate::Annotator;
pub use latest::LatestFrame;
pub use orchestrator::{Clock, CycleReport, DetectionLoop, LoopConfig, LoopState, SystemClock};
pub use session::{CycleOutcome, SessionContext, TrackedPerson};

/// 等待期间检查停止信号的间隔
const STOP_POLL: Duration = Duration::from_millis(100);

/// 协作式停止信号 (可克隆, 跨线程共享)
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// 分片睡眠, 收到停止信号立即返回; 返回 true 表示已被停止
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stopped() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(STOP_POLL.min(deadline - now));
        }
    }
}
