//! 车后徘徊检测 (Loitering behind a parked vehicle)
//!
//! 行人框与车框相交, 或行人中心低于车中心 ("车后"近似), 即视为徘徊关系。
//! 按车辆列表顺序匹配, 第一辆满足条件的车即短路。
//! 当前帧没有任何车辆满足条件时计时器立即清除, 中断后重新计时。

use std::time::{Duration, Instant};

use super::types::CandidateAlert;
use crate::detection::{BBox, TrackState};

/// 车后徘徊策略
#[derive(Debug, Clone, Copy)]
pub struct LoiterGeometryEvaluator {
    pub min_loiter: Duration,
}

impl LoiterGeometryEvaluator {
    pub fn new(min_loiter: Duration) -> Self {
        Self { min_loiter }
    }

    /// 行人中心Y大于车中心Y (图像坐标向下为正)
    pub fn is_behind(person: &BBox, car: &BBox) -> bool {
        person.center().1 > car.center().1
    }

    pub fn relates(person: &BBox, car: &BBox) -> bool {
        person.intersects(car) || Self::is_behind(person, car)
    }

    /// 返回第一辆满足条件的车的下标
    pub fn matching_car(person: &BBox, cars: &[BBox]) -> Option<usize> {
        cars.iter().position(|car| Self::relates(person, car))
    }

    pub fn evaluate(
        &self,
        track: &mut TrackState,
        cars: &[BBox],
        now: Instant,
    ) -> Option<CandidateAlert> {
        if Self::matching_car(&track.bbox, cars).is_none() {
            track.loiter_since = None;
            return None;
        }

        let since = *track.loiter_since.get_or_insert(now);
        let elapsed = now.saturating_duration_since(since);
        if elapsed >= self.min_loiter {
            Some(CandidateAlert::loiter(track.id, elapsed.as_secs()))
        } else {
            None
        }
    }
}
