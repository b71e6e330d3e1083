/// 安防告警主程序 (Security Sentinel)
///
/// 单线程检测循环:
/// 1. 取帧: 视频文件 / 图片目录 / 网络流 (有限重试 + 重连)
/// 2. 检测: YOLOv8 (ONNX)
/// 3. 告警: 保护区域停留 / 车后徘徊 / 限制时段 → 冷却 → 快照 + 通知
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use security_sentinel::alerts::{AlertEmitter, AlertLog, LocalImageStore, RemoteAlertClient};
use security_sentinel::detection::Detector;
use security_sentinel::input::{DefaultOpener, FrameSource};
use security_sentinel::pipeline::{Annotator, DetectionLoop, LoopConfig, SessionContext, StopHandle};
use security_sentinel::{Args, SentinelConfig};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("security_sentinel=info,sentinel=info,ort=warn")),
        )
        .init();

    let args = Args::parse();
    let config = SentinelConfig::from_args(&args)?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    info!("🚀 安防告警启动");
    info!("📹 视频源: {} ({:?})", config.source.uri, config.source.kind);
    info!(
        "⚙️ 特性: 保护区域={} 车后徘徊={} 限制时段={}",
        config.features.protected_zone, config.features.loitering, config.features.time_window
    );

    // ========== 检测器 ==========
    let detector = build_detector(&config)?;

    // ========== 告警发送 ==========
    let log = AlertLog::new(config.emitter.log_capacity);
    let store = LocalImageStore::new(&config.emitter.alert_dir)
        .with_context(|| format!("创建告警目录 {}", config.emitter.alert_dir.display()))?;
    info!("💾 告警快照目录: {}", store.dir().display());
    let mut emitter = AlertEmitter::new(log)
        .with_jpeg_quality(config.emitter.jpeg_quality)
        .with_notifier(Box::new(store));
    if let Some(endpoint) = &config.emitter.endpoint {
        info!("🌐 远程告警接口: {}", endpoint);
        emitter = emitter.with_notifier(Box::new(RemoteAlertClient::new(
            endpoint.clone(),
            config.emitter.camera_id.clone(),
            config.emitter.user_id.clone(),
        )));
    }

    // ========== 标注 ==========
    let mut annotator = Annotator::new();
    if let Some(font) = &config.detector.font {
        match Annotator::new().with_font_file(font) {
            Ok(a) => annotator = a,
            Err(e) => warn!("⚠️ 字体加载失败, 只绘制检测框: {}", e),
        }
    }

    // ========== 检测循环 ==========
    let stop = StopHandle::new();
    let ctrlc_stop = stop.clone();
    ctrlc::set_handler(move || {
        info!("🛑 收到中断信号, 正在停止...");
        ctrlc_stop.stop();
    })
    .context("注册 Ctrl-C 处理失败")?;

    let source = FrameSource::new(config.source.clone(), Box::new(DefaultOpener));
    let session = SessionContext::new(
        config.features,
        config.zone.clone(),
        &config.thresholds,
        config.tracker,
    );
    let loop_config = LoopConfig {
        frame_skip: config.frame_skip,
        stop_at_end: config.stop_at_end,
        ..LoopConfig::default()
    };

    let mut detection_loop = DetectionLoop::new(source, detector, session, emitter, loop_config)
        .with_annotator(annotator)
        .with_stop(stop);

    detection_loop.start()?;
    detection_loop.run()?;

    let log = detection_loop.emitter().log();
    for alert in log.recent(10) {
        info!("📋 [{}] {} {}", alert.kind, alert.timestamp, alert.message);
    }
    info!("✅ 共产生 {} 条告警", log.total());
    Ok(())
}

#[cfg(feature = "onnx")]
fn build_detector(config: &SentinelConfig) -> Result<Box<dyn Detector>> {
    use security_sentinel::detection::{YoloV8Config, YoloV8Detector};

    let detector = YoloV8Detector::new(
        &config.detector.model,
        YoloV8Config {
            conf_threshold: config.detector.conf_threshold,
            iou_threshold: config.detector.iou_threshold,
            ..YoloV8Config::default()
        },
    )?;
    Ok(Box::new(detector))
}

#[cfg(not(feature = "onnx"))]
fn build_detector(_config: &SentinelConfig) -> Result<Box<dyn Detector>> {
    Err(security_sentinel::SentinelError::Config(
        "no detector available: rebuild with `--features onnx`".to_string(),
    )
    .into())
}
