//! 保护区域停留检测 (Protected-zone dwell)
//!
//! 行人质心落入多边形后开始计时, 停留时长达到阈值即产出候选告警。
//! 离开区域不会清除计时器, 计时器随轨迹淘汰一起删除。

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::types::CandidateAlert;
use crate::detection::TrackState;
use crate::{Result, SentinelError};

/// 保护区域 (帧坐标多边形, 配置后不可变)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ZonePoints")]
pub struct ProtectedZone {
    points: Vec<(f32, f32)>,
}

/// 反序列化中间形态, 经 `ProtectedZone::new` 校验
#[derive(Deserialize)]
struct ZonePoints {
    points: Vec<(f32, f32)>,
}

impl TryFrom<ZonePoints> for ProtectedZone {
    type Error = SentinelError;

    fn try_from(raw: ZonePoints) -> Result<Self> {
        Self::new(raw.points)
    }
}

impl ProtectedZone {
    pub const MIN_POINTS: usize = 3;

    pub fn new(points: Vec<(f32, f32)>) -> Result<Self> {
        if points.len() < Self::MIN_POINTS {
            return Err(SentinelError::Config(format!(
                "protected zone needs at least {} points, got {}",
                Self::MIN_POINTS,
                points.len()
            )));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    /// 射线法 (even-odd) 判断点是否在多边形内部
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let n = self.points.len();
        if n < Self::MIN_POINTS {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.points[i];
            let (xj, yj) = self.points[j];
            if (yi > y) != (yj > y) {
                let x_cross = (xj - xi) * (y - yi) / (yj - yi) + xi;
                if x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// 区域停留策略
#[derive(Debug, Clone, Copy)]
pub struct ZoneContainmentEvaluator {
    pub min_dwell: Duration,
}

impl ZoneContainmentEvaluator {
    pub fn new(min_dwell: Duration) -> Self {
        Self { min_dwell }
    }

    pub fn evaluate(
        &self,
        zone: &ProtectedZone,
        track: &mut TrackState,
        now: Instant,
    ) -> Option<CandidateAlert> {
        let (cx, cy) = track.center();
        if !zone.contains(cx, cy) {
            return None;
        }

        let since = *track.zone_since.get_or_insert(now);
        let dwell = now.saturating_duration_since(since);
        if dwell >= self.min_dwell {
            Some(CandidateAlert::zone(track.id, dwell.as_secs()))
        } else {
            None
        }
    }
}
