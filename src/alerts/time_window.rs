//! 限制时段检测 (Restricted time window)
//!
//! 每个周期最多产出一条候选告警 (不按人数), 全局共用 `NIGHT` 冷却键。

use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::types::CandidateAlert;
use crate::SentinelError;

/// 一天内的时间窗口, 起点大于终点表示跨越午夜
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// 两端均为闭区间
    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= now && now <= self.end
        } else {
            now >= self.start || now <= self.end
        }
    }
}

impl Default for TimeWindow {
    /// 默认 22:00 - 05:00
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(5, 0, 0).unwrap_or_default(),
        }
    }
}

/// 解析 `HH:MM` 或 `HH:MM:SS`
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, SentinelError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| SentinelError::Config(format!("invalid time of day `{}` (expected HH:MM)", s)))
}

impl FromStr for TimeWindow {
    type Err = SentinelError;

    /// `22:00-05:00`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| SentinelError::Config(format!("invalid time window `{}`", s)))?;
        Ok(Self::new(parse_time_of_day(start)?, parse_time_of_day(end)?))
    }
}

/// 限制时段策略
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeWindowEvaluator {
    pub window: TimeWindow,
}

impl TimeWindowEvaluator {
    pub fn new(window: TimeWindow) -> Self {
        Self { window }
    }

    pub fn evaluate(&self, persons_present: bool, now: NaiveTime) -> Option<CandidateAlert> {
        if persons_present && self.window.contains(now) {
            Some(CandidateAlert::night())
        } else {
            None
        }
    }
}
