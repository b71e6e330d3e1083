//! 配置 (Configuration)
//!
//! 命令行 / 环境变量 → `Args` → 校验后得到不可变的 `SentinelConfig`。
//! 特性编号: 1 = 保护区域, 2 = 车后徘徊, 3 = 限制时段。

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::alerts::time_window::parse_time_of_day;
use crate::alerts::{ProtectedZone, TimeWindow};
use crate::detection::TrackerConfig;
use crate::input::SourceConfig;
use crate::{Result, SentinelError};

/// 安防告警主程序
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sentinel",
    author,
    version,
    about = "安防告警: 保护区域停留 / 车后徘徊 / 限制时段",
    long_about = None
)]
pub struct Args {
    /// 视频源: 视频文件 / 图片目录 / rtsp:// 等网络流
    #[arg(env = "VIDEO_SOURCE")]
    pub source: String,

    /// 启用的特性编号 (逗号分隔): 1=保护区域 2=车后徘徊 3=限制时段
    #[arg(short, long, env = "SENTINEL_FEATURES")]
    pub features: String,

    /// 保护区域顶点 "x,y;x,y;x,y" (帧坐标)
    #[arg(long, env = "SENTINEL_ZONE")]
    pub zone: Option<String>,

    /// 保护区域 JSON 文件: [[x, y], ...]
    #[arg(long, env = "SENTINEL_ZONE_FILE", conflicts_with = "zone")]
    pub zone_file: Option<PathBuf>,

    /// 区域停留告警阈值 (秒)
    #[arg(long, env = "SENTINEL_ZONE_DWELL_SECS", default_value_t = 3)]
    pub zone_dwell_secs: u64,

    /// 车后徘徊告警阈值 (秒)
    #[arg(long, env = "SENTINEL_LOITER_SECS", default_value_t = 10)]
    pub loiter_secs: u64,

    /// 同一告警键的冷却时间 (秒)
    #[arg(long, env = "SENTINEL_COOLDOWN_SECS", default_value_t = 60)]
    pub cooldown_secs: u64,

    /// 限制时段起点 HH:MM
    #[arg(long, env = "SENTINEL_WINDOW_START", default_value = "22:00")]
    pub window_start: String,

    /// 限制时段终点 HH:MM (小于起点表示跨午夜)
    #[arg(long, env = "SENTINEL_WINDOW_END", default_value = "05:00")]
    pub window_end: String,

    /// 每 N 帧检测一次
    #[arg(long, env = "SENTINEL_FRAME_SKIP", default_value_t = 2)]
    pub frame_skip: u32,

    /// 单次读帧最大尝试次数
    #[arg(long, env = "SENTINEL_READ_ATTEMPTS", default_value_t = 3)]
    pub read_attempts: u32,

    /// 读帧失败 / 重连等待 (秒)
    #[arg(long, env = "SENTINEL_RECONNECT_DELAY_SECS", default_value_t = 5)]
    pub reconnect_delay_secs: u64,

    #[arg(long, env = "SENTINEL_FRAME_WIDTH", default_value_t = 640)]
    pub frame_width: u32,

    #[arg(long, env = "SENTINEL_FRAME_HEIGHT", default_value_t = 360)]
    pub frame_height: u32,

    /// 文件 / 图片序列读完后退出, 而不是从头重新打开
    #[arg(long, env = "SENTINEL_STOP_AT_END")]
    pub stop_at_end: bool,

    /// 轨迹关联的最大质心距离 (像素)
    #[arg(long, env = "SENTINEL_MATCH_DISTANCE", default_value_t = 64.0)]
    pub match_distance: f32,

    /// 轨迹淘汰时间 (秒), 默认 2 × 冷却时间
    #[arg(long, env = "SENTINEL_TRACK_TTL_SECS")]
    pub track_ttl_secs: Option<u64>,

    /// 告警快照目录
    #[arg(long, env = "SENTINEL_ALERT_DIR", default_value = "alerts")]
    pub alert_dir: PathBuf,

    /// 远程告警接口 (POST JSON)
    #[arg(long, env = "SENTINEL_ALERT_ENDPOINT")]
    pub alert_endpoint: Option<String>,

    #[arg(long, env = "SENTINEL_CAMERA_ID")]
    pub camera_id: Option<String>,

    #[arg(long, env = "SENTINEL_USER_ID")]
    pub user_id: Option<String>,

    /// 告警快照 JPEG 质量 (1-100)
    #[arg(long, env = "SENTINEL_JPEG_QUALITY", default_value_t = 85)]
    pub jpeg_quality: u8,

    /// 进程内保留的告警条数
    #[arg(long, env = "SENTINEL_ALERT_LOG_CAPACITY", default_value_t = 100)]
    pub alert_log_capacity: usize,

    /// YOLOv8 ONNX 模型路径
    #[arg(short, long, env = "SENTINEL_MODEL", default_value = "yolov8n.onnx")]
    pub model: PathBuf,

    /// 置信度阈值
    #[arg(long, env = "SENTINEL_CONF", default_value_t = 0.25)]
    pub conf: f32,

    /// NMS IoU 阈值
    #[arg(long, env = "SENTINEL_IOU", default_value_t = 0.45)]
    pub iou: f32,

    /// 标注字体 (TTF), 不提供时只画框
    #[arg(long, env = "SENTINEL_FONT")]
    pub font: Option<PathBuf>,

    /// 打印解析后的配置 (JSON) 并退出
    #[arg(long)]
    pub print_config: bool,
}

/// 启用的告警特性
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub protected_zone: bool,
    pub loitering: bool,
    pub time_window: bool,
}

impl FeatureConfig {
    /// 解析 "1,2,3"; 未知编号或空选择均为配置错误
    pub fn parse_codes(codes: &str) -> Result<Self> {
        let mut features = FeatureConfig::default();
        for code in codes.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            match code {
                "1" => features.protected_zone = true,
                "2" => features.loitering = true,
                "3" => features.time_window = true,
                other => {
                    return Err(SentinelError::Config(format!(
                        "unknown feature code `{}` (expected 1, 2 or 3)",
                        other
                    )))
                }
            }
        }
        if !features.any() {
            return Err(SentinelError::Config("no feature selected".to_string()));
        }
        Ok(features)
    }

    pub fn any(&self) -> bool {
        self.protected_zone || self.loitering || self.time_window
    }
}

/// 告警阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub zone_dwell: Duration,
    pub loiter: Duration,
    pub cooldown: Duration,
    pub window: TimeWindow,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            zone_dwell: Duration::from_secs(3),
            loiter: Duration::from_secs(10),
            cooldown: Duration::from_secs(60),
            window: TimeWindow::default(),
        }
    }
}

/// 告警发送配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitterConfig {
    pub alert_dir: PathBuf,
    pub endpoint: Option<String>,
    pub camera_id: Option<String>,
    pub user_id: Option<String>,
    pub log_capacity: usize,
    pub jpeg_quality: u8,
}

/// 检测器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub model: PathBuf,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub font: Option<PathBuf>,
}

/// 校验后的完整配置 (会话期间不可变)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentinelConfig {
    pub source: SourceConfig,
    pub features: FeatureConfig,
    pub zone: Option<ProtectedZone>,
    pub thresholds: Thresholds,
    pub tracker: TrackerConfig,
    pub frame_skip: u32,
    pub stop_at_end: bool,
    pub emitter: EmitterConfig,
    pub detector: DetectorConfig,
}

impl SentinelConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut features = FeatureConfig::parse_codes(&args.features)?;

        if args.frame_skip == 0 {
            return Err(SentinelError::Config("frame skip must be at least 1".to_string()));
        }
        if args.read_attempts == 0 {
            return Err(SentinelError::Config("read attempts must be at least 1".to_string()));
        }

        if !(args.match_distance.is_finite() && args.match_distance > 0.0) {
            return Err(SentinelError::Config(format!(
                "match distance must be a positive number, got {}",
                args.match_distance
            )));
        }
        for (name, value) in [("conf", args.conf), ("iou", args.iou)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(SentinelError::Config(format!(
                    "{} threshold must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        if !(1..=100).contains(&args.jpeg_quality) {
            return Err(SentinelError::Config(format!(
                "jpeg quality must be in 1..=100, got {}",
                args.jpeg_quality
            )));
        }

        let mut zone = None;
        if features.protected_zone {
            let points = match (&args.zone, &args.zone_file) {
                (Some(text), _) => parse_zone_points(text)?,
                (None, Some(path)) => load_zone_file(path)?,
                (None, None) => Vec::new(),
            };
            match ProtectedZone::new(points) {
                Ok(z) => zone = Some(z),
                Err(e) => {
                    warn!("⚠️ 保护区域定义不完整, 已禁用该特性: {}", e);
                    features.protected_zone = false;
                }
            }
            if !features.any() {
                return Err(SentinelError::Config(
                    "protected zone disabled and no other feature enabled".to_string(),
                ));
            }
        }

        let thresholds = Thresholds {
            zone_dwell: Duration::from_secs(args.zone_dwell_secs),
            loiter: Duration::from_secs(args.loiter_secs),
            cooldown: Duration::from_secs(args.cooldown_secs),
            window: TimeWindow::new(
                parse_time_of_day(&args.window_start)?,
                parse_time_of_day(&args.window_end)?,
            ),
        };

        let tracker = TrackerConfig {
            match_distance: args.match_distance,
            ttl: args
                .track_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| thresholds.cooldown.checked_mul(2).unwrap_or(Duration::MAX)),
            ..TrackerConfig::default()
        };

        let mut source = SourceConfig::new(args.source.clone());
        source.read_attempts = args.read_attempts;
        source.reconnect_delay = Duration::from_secs(args.reconnect_delay_secs);
        source.frame_width = args.frame_width;
        source.frame_height = args.frame_height;

        Ok(Self {
            source,
            features,
            zone,
            thresholds,
            tracker,
            frame_skip: args.frame_skip,
            stop_at_end: args.stop_at_end,
            emitter: EmitterConfig {
                alert_dir: args.alert_dir.clone(),
                endpoint: args.alert_endpoint.clone(),
                camera_id: args.camera_id.clone(),
                user_id: args.user_id.clone(),
                log_capacity: args.alert_log_capacity.max(1),
                jpeg_quality: args.jpeg_quality,
            },
            detector: DetectorConfig {
                model: args.model.clone(),
                conf_threshold: args.conf,
                iou_threshold: args.iou,
                font: args.font.clone(),
            },
        })
    }
}

/// 解析 "x,y;x,y;x,y"
pub fn parse_zone_points(text: &str) -> Result<Vec<(f32, f32)>> {
    text.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| SentinelError::Config(format!("invalid zone point `{}`", pair)))?;
            let parse = |v: &str| {
                v.trim()
                    .parse::<f32>()
                    .map_err(|_| SentinelError::Config(format!("invalid zone coordinate `{}`", v)))
            };
            Ok((parse(x)?, parse(y)?))
        })
        .collect()
}

fn load_zone_file(path: &Path) -> Result<Vec<(f32, f32)>> {
    let text = std::fs::read_to_string(path)?;
    let points: Vec<[f32; 2]> = serde_json::from_str(&text)
        .map_err(|e| SentinelError::Config(format!("zone file {}: {}", path.display(), e)))?;
    Ok(points.into_iter().map(|[x, y]| (x, y)).collect())
}
