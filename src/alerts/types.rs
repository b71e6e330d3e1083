/// 告警数据结构
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::detection::TrackId;

/// 告警类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertKind {
    Zone,
    Loiter,
    Night,
}

impl AlertKind {
    pub fn tag(&self) -> &'static str {
        match self {
            AlertKind::Zone => "ZONE",
            AlertKind::Loiter => "LOITER",
            AlertKind::Night => "NIGHT",
        }
    }

    /// 标注颜色 (RGB)
    pub fn color(&self) -> [u8; 3] {
        match self {
            AlertKind::Zone => [255, 255, 0],
            AlertKind::Loiter => [255, 165, 0],
            AlertKind::Night => [255, 0, 0],
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// 冷却去重键: 策略 + 轨迹 (时段告警全局共享一个键)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKey {
    Zone(TrackId),
    Loiter(TrackId),
    Night,
}

impl AlertKey {
    pub fn track(&self) -> Option<TrackId> {
        match self {
            AlertKey::Zone(id) | AlertKey::Loiter(id) => Some(*id),
            AlertKey::Night => None,
        }
    }
}

/// 候选告警 (策略产出, 尚未经过冷却过滤)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAlert {
    pub kind: AlertKind,
    pub key: AlertKey,
    pub message: String,
}

impl CandidateAlert {
    pub fn zone(track: TrackId, dwell_secs: u64) -> Self {
        Self {
            kind: AlertKind::Zone,
            key: AlertKey::Zone(track),
            message: format!("Person in protected zone for {}s", dwell_secs),
        }
    }

    pub fn loiter(track: TrackId, loiter_secs: u64) -> Self {
        Self {
            kind: AlertKind::Loiter,
            key: AlertKey::Loiter(track),
            message: format!("Person behind car for {}s", loiter_secs),
        }
    }

    pub fn night() -> Self {
        Self {
            kind: AlertKind::Night,
            key: AlertKey::Night,
            message: "Person detected during restricted hours".to_string(),
        }
    }
}

/// 已发送告警记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    /// 本地时间戳 `%Y%m%d_%H%M%S_%f`
    pub timestamp: String,
    pub track: Option<TrackId>,
    /// 帧序号
    pub frame_index: u64,
    /// 本地快照路径 (保存成功时)
    pub image: Option<PathBuf>,
}
