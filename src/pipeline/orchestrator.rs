/// 检测循环编排器 (Detection loop orchestrator)
/// 职责: 取帧 → 跳帧 → 检测 → 策略评估 → 冷却 → 告警 → 发布最新帧
///
/// 单线程串行执行, 通过 `StopHandle` 协作式停止; 退出前释放视频源。
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveTime;
use tracing::{info, warn};

use super::annotate::Annotator;
use super::latest::LatestFrame;
use super::session::SessionContext;
use super::StopHandle;
use crate::alerts::{Alert, AlertEmitter};
use crate::detection::{Detector, Frame, ALERT_LABELS};
use crate::input::FrameSource;
use crate::Result;

/// 时间来源 (计时用单调时钟 + 限制时段用本地时刻)
pub trait Clock: Send {
    fn now(&self) -> Instant;
    fn wall(&self) -> NaiveTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> NaiveTime {
        chrono::Local::now().time()
    }
}

/// 循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Acquiring,
    Detecting,
    Evaluating,
    IdleSkipped,
    Stopping,
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// 每 N 帧检测一次 (≥1)
    pub frame_skip: u32,
    /// 非实时源读完后停止, 而不是重新打开
    pub stop_at_end: bool,
    /// 统计日志间隔
    pub stats_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frame_skip: 2,
            stop_at_end: false,
            stats_interval: Duration::from_secs(10),
        }
    }
}

/// 单个周期的结果
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// 周期结束时的状态
    pub state: LoopState,
    pub frame_index: Option<u64>,
    pub detections: usize,
    pub alerts: Vec<Alert>,
    /// 帧源耗尽后已重新打开
    pub reopened: bool,
    /// 检测失败, 本周期按跳帧处理
    pub detect_failed: bool,
}

impl CycleReport {
    fn new(state: LoopState) -> Self {
        Self {
            state,
            frame_index: None,
            detections: 0,
            alerts: Vec::new(),
            reopened: false,
            detect_failed: false,
        }
    }
}

pub struct DetectionLoop {
    source: FrameSource,
    detector: Box<dyn Detector>,
    session: SessionContext,
    emitter: AlertEmitter,
    annotator: Annotator,
    latest: LatestFrame<Frame>,
    clock: Box<dyn Clock>,
    stop: StopHandle,
    config: LoopConfig,
    state: LoopState,

    // 统计
    counter: u64,
    detected: u64,
    count: u64,
    detections_since: usize,
    last: Instant,
    current_fps: f64,
}

impl DetectionLoop {
    pub fn new(
        source: FrameSource,
        detector: Box<dyn Detector>,
        session: SessionContext,
        emitter: AlertEmitter,
        config: LoopConfig,
    ) -> Self {
        let stop = StopHandle::new();
        Self {
            source: source.with_stop(stop.clone()),
            detector,
            session,
            emitter,
            annotator: Annotator::new(),
            latest: LatestFrame::new(),
            clock: Box::new(SystemClock),
            stop,
            config: LoopConfig {
                frame_skip: config.frame_skip.max(1),
                ..config
            },
            state: LoopState::Starting,
            counter: 0,
            detected: 0,
            count: 0,
            detections_since: 0,
            last: Instant::now(),
            current_fps: 0.0,
        }
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 使用外部停止信号 (例如 Ctrl-C)
    pub fn with_stop(mut self, stop: StopHandle) -> Self {
        self.source.set_stop(stop.clone());
        self.stop = stop;
        self
    }

    /// 发布到已有的最新帧槽 (供流媒体接口读取)
    pub fn with_latest(mut self, latest: LatestFrame<Frame>) -> Self {
        self.latest = latest;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn latest(&self) -> LatestFrame<Frame> {
        self.latest.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn emitter(&self) -> &AlertEmitter {
        &self.emitter
    }

    pub fn source(&self) -> &FrameSource {
        &self.source
    }

    /// 已取到的帧数 (含跳过的帧)
    pub fn frames_acquired(&self) -> u64 {
        self.counter
    }

    /// 实际执行检测的帧数
    pub fn frames_detected(&self) -> u64 {
        self.detected
    }

    /// 打开视频源; 失败为致命错误
    pub fn start(&mut self) -> Result<()> {
        self.state = LoopState::Starting;
        info!(
            "🚀 检测循环启动 (检测器: {}, 每{}帧检测一次)",
            self.detector.name(),
            self.config.frame_skip
        );
        self.source.open()?;
        self.state = LoopState::Acquiring;
        Ok(())
    }

    /// 运行直到收到停止信号 (或非实时源读完且 `stop_at_end`)
    pub fn run(&mut self) -> Result<()> {
        if self.state == LoopState::Starting {
            self.start()?;
        }
        let result = loop {
            match self.step() {
                Ok(report) if report.state == LoopState::Stopping => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };
        self.source.release();
        self.state = LoopState::Stopping;
        info!(
            "🛑 检测循环退出 (取帧{} 检测{} 告警{})",
            self.counter,
            self.detected,
            self.emitter.log().total()
        );
        result
    }

    /// 执行一个周期
    pub fn step(&mut self) -> Result<CycleReport> {
        if self.stop.is_stopped() {
            return Ok(self.stopping());
        }

        self.state = LoopState::Acquiring;
        let frame = match self.source.read_next() {
            Ok(frame) => frame,
            Err(e) if e.is_transient() => return Ok(self.recover(e)),
            Err(e) => return Err(e),
        };

        self.counter += 1;
        let mut report = CycleReport::new(LoopState::IdleSkipped);
        report.frame_index = Some(frame.index);

        if self.counter % u64::from(self.config.frame_skip) != 0 {
            self.state = LoopState::IdleSkipped;
            self.latest.publish(frame);
            return Ok(report);
        }

        self.state = LoopState::Detecting;
        let detections = match self.detector.detect(&frame, ALERT_LABELS) {
            Ok(detections) => detections,
            Err(e) => {
                warn!("⚠️ 检测失败, 跳过本周期: {}", e);
                self.state = LoopState::IdleSkipped;
                self.latest.publish(frame);
                report.detect_failed = true;
                return Ok(report);
            }
        };
        self.detected += 1;
        report.detections = detections.len();

        self.state = LoopState::Evaluating;
        let outcome = self
            .session
            .evaluate(&detections, self.clock.now(), self.clock.wall());

        let mut annotated = frame.image.as_ref().clone();
        self.annotator.draw(
            &mut annotated,
            self.session.zone(),
            &outcome.persons,
            &detections,
            Some(self.current_fps),
        );
        for candidate in &outcome.admitted {
            self.annotator.draw_alert_border(&mut annotated, candidate.kind);
        }
        for candidate in &outcome.admitted {
            report
                .alerts
                .push(self.emitter.emit(candidate, &annotated, frame.index));
        }

        self.latest.publish(Frame {
            image: Arc::new(annotated),
            index: frame.index,
            captured_at: frame.captured_at,
        });

        self.update_stats(detections.len());
        report.state = LoopState::Evaluating;
        Ok(report)
    }

    /// 帧源耗尽: 释放 → 等待 → 从头重新打开
    fn recover(&mut self, cause: crate::SentinelError) -> CycleReport {
        if self.stop.is_stopped() {
            return self.stopping();
        }
        if self.config.stop_at_end && !self.source.config().kind.is_live() {
            info!("🏁 视频源已读完: {}", self.source.config().uri);
            return self.stopping();
        }

        let delay = self.source.config().reconnect_delay;
        warn!("⚠️ 视频源耗尽 ({}), {}s 后重新打开", cause, delay.as_secs());
        self.source.release();
        if self.stop.sleep(delay) {
            return self.stopping();
        }

        let mut report = CycleReport::new(LoopState::Acquiring);
        match self.source.reopen() {
            Ok(()) => report.reopened = true,
            Err(e) => warn!("⚠️ 重新打开失败, 稍后重试: {}", e),
        }
        report
    }

    fn stopping(&mut self) -> CycleReport {
        self.state = LoopState::Stopping;
        self.source.release();
        CycleReport::new(LoopState::Stopping)
    }

    fn update_stats(&mut self, detections: usize) {
        self.count += 1;
        self.detections_since += detections;
        let elapsed = self.last.elapsed();
        if elapsed >= Duration::from_secs(1) {
            self.current_fps = self.count as f64 / elapsed.as_secs_f64();
        }
        if elapsed >= self.config.stats_interval {
            info!(
                "📊 检测 {:.1}fps | 平均目标数 {:.1} | 轨迹 {} | 告警 {}",
                self.current_fps,
                self.detections_since as f64 / self.count.max(1) as f64,
                self.session.tracks().len(),
                self.emitter.log().total()
            );
            self.last = Instant::now();
            self.count = 0;
            self.detections_since = 0;
        }
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.source.release();
    }
}
