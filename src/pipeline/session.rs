//! 会话上下文 (Session context)
//!
//! 保护区域, 轨迹表 (含计时器), 三个告警策略和冷却门都归它所有,
//! 由编排器在每个周期串行调用, 不需要加锁。

use std::time::Instant;

use chrono::NaiveTime;
use tracing::debug;

use crate::alerts::{
    CandidateAlert, CooldownGate, LoiterGeometryEvaluator, ProtectedZone, TimeWindowEvaluator,
    ZoneContainmentEvaluator,
};
use crate::config::{FeatureConfig, Thresholds};
use crate::detection::{BBox, Detection, Label, TrackId, TrackTable, TrackerConfig};

/// 本周期带轨迹ID的行人
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedPerson {
    pub id: TrackId,
    pub bbox: BBox,
}

/// 一次评估的结果
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub persons: Vec<TrackedPerson>,
    /// 策略产出的全部候选告警
    pub candidates: Vec<CandidateAlert>,
    /// 通过冷却门的告警
    pub admitted: Vec<CandidateAlert>,
    /// 本周期被淘汰的轨迹
    pub evicted: Vec<TrackId>,
}

pub struct SessionContext {
    features: FeatureConfig,
    zone: Option<ProtectedZone>,
    zone_eval: ZoneContainmentEvaluator,
    loiter_eval: LoiterGeometryEvaluator,
    window_eval: TimeWindowEvaluator,
    tracks: TrackTable,
    cooldown: CooldownGate,
}

impl SessionContext {
    pub fn new(
        features: FeatureConfig,
        zone: Option<ProtectedZone>,
        thresholds: &Thresholds,
        tracker: TrackerConfig,
    ) -> Self {
        Self {
            features,
            zone,
            zone_eval: ZoneContainmentEvaluator::new(thresholds.zone_dwell),
            loiter_eval: LoiterGeometryEvaluator::new(thresholds.loiter),
            window_eval: TimeWindowEvaluator::new(thresholds.window),
            tracks: TrackTable::new(tracker),
            cooldown: CooldownGate::new(thresholds.cooldown),
        }
    }

    pub fn features(&self) -> &FeatureConfig {
        &self.features
    }

    pub fn zone(&self) -> Option<&ProtectedZone> {
        self.zone.as_ref()
    }

    pub fn tracks(&self) -> &TrackTable {
        &self.tracks
    }

    pub fn cooldown(&self) -> &CooldownGate {
        &self.cooldown
    }

    /// 关联轨迹 → 三个策略 → 冷却过滤 → 淘汰过期轨迹
    ///
    /// `now` 用于计时, `wall` 是当前本地时刻 (限制时段判断)。
    pub fn evaluate(&mut self, detections: &[Detection], now: Instant, wall: NaiveTime) -> CycleOutcome {
        // 先收集本帧全部车辆, 再逐个评估行人
        let cars: Vec<BBox> = detections
            .iter()
            .filter(|d| d.label == Label::Car)
            .map(|d| d.bbox)
            .collect();
        let person_boxes: Vec<BBox> = detections
            .iter()
            .filter(|d| d.label == Label::Person)
            .map(|d| d.bbox)
            .collect();

        let ids = self.tracks.associate(&person_boxes, now);
        let mut outcome = CycleOutcome {
            persons: ids
                .iter()
                .zip(&person_boxes)
                .map(|(&id, &bbox)| TrackedPerson { id, bbox })
                .collect(),
            ..Default::default()
        };

        for &id in &ids {
            let Some(track) = self.tracks.get_mut(id) else {
                continue;
            };

            if self.features.protected_zone {
                if let Some(zone) = &self.zone {
                    outcome.candidates.extend(self.zone_eval.evaluate(zone, track, now));
                }
            }
            if self.features.loitering {
                outcome.candidates.extend(self.loiter_eval.evaluate(track, &cars, now));
            }
        }

        if self.features.time_window {
            outcome
                .candidates
                .extend(self.window_eval.evaluate(!ids.is_empty(), wall));
        }

        for candidate in &outcome.candidates {
            if self.cooldown.admit(candidate.key, now) {
                outcome.admitted.push(candidate.clone());
            } else {
                debug!("🔕 冷却中, 忽略告警 {:?}", candidate.key);
            }
        }

        outcome.evicted = self.tracks.evict_stale(now);
        for &id in &outcome.evicted {
            self.cooldown.forget_track(id);
        }
        self.cooldown.prune(now);
        if !outcome.evicted.is_empty() {
            debug!("🧹 淘汰轨迹 {:?}, 剩余 {}", outcome.evicted, self.tracks.len());
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::alerts::{AlertKey, AlertKind};

    fn night() -> NaiveTime {
        NaiveTime::from_hms_opt(23, 30, 0).unwrap()
    }

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    fn session(features: &str, zone: Option<ProtectedZone>) -> SessionContext {
        SessionContext::new(
            FeatureConfig::parse_codes(features).unwrap(),
            zone,
            &Thresholds::default(),
            TrackerConfig::default(),
        )
    }

    #[test]
    fn night_alert_is_one_per_cycle_regardless_of_people() {
        let mut s = session("3", None);
        let t0 = Instant::now();
        let dets = [
            Detection::person(0.0, 0.0, 10.0, 30.0),
            Detection::person(200.0, 0.0, 210.0, 30.0),
        ];
        let out = s.evaluate(&dets, t0, night());
        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.admitted[0].key, AlertKey::Night);

        // 冷却期内第二个周期不放行
        let out = s.evaluate(&dets, t0 + Duration::from_secs(1), night());
        assert_eq!(out.candidates.len(), 1);
        assert!(out.admitted.is_empty());

        assert!(s.evaluate(&dets, t0, noon()).candidates.is_empty());
    }

    #[test]
    fn no_people_no_night_alert() {
        let mut s = session("3", None);
        let dets = [Detection::car(0.0, 0.0, 50.0, 50.0)];
        assert!(s.evaluate(&dets, Instant::now(), night()).candidates.is_empty());
    }

    #[test]
    fn disabled_features_produce_nothing() {
        let zone = ProtectedZone::new(vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)])
            .unwrap();
        let mut s = session("2", Some(zone));
        let t0 = Instant::now();
        let dets = [Detection::person(40.0, 40.0, 60.0, 60.0)];
        s.evaluate(&dets, t0, night());
        let out = s.evaluate(&dets, t0 + Duration::from_secs(5), night());
        assert!(out.candidates.is_empty());
    }

    #[test]
    fn loiter_uses_every_car_in_the_frame() {
        let mut s = session("2", None);
        let t0 = Instant::now();
        // 车辆排在行人之后, 仍参与匹配
        let dets = [
            Detection::person(100.0, 150.0, 120.0, 250.0),
            Detection::car(0.0, 0.0, 50.0, 50.0),
        ];
        for sec in 0..10 {
            assert!(s.evaluate(&dets, t0 + Duration::from_secs(sec), noon()).admitted.is_empty());
        }
        let out = s.evaluate(&dets, t0 + Duration::from_secs(10), noon());
        assert_eq!(out.admitted.len(), 1);
        assert_eq!(out.admitted[0].kind, AlertKind::Loiter);
        assert_eq!(out.admitted[0].message, "Person behind car for 10s");
    }

    #[test]
    fn evicted_tracks_leave_no_state_behind() {
        let mut s = SessionContext::new(
            FeatureConfig::parse_codes("2").unwrap(),
            None,
            &Thresholds::default(),
            TrackerConfig {
                ttl: Duration::from_secs(5),
                ..TrackerConfig::default()
            },
        );
        let t0 = Instant::now();
        let dets = [
            Detection::person(100.0, 150.0, 120.0, 250.0),
            Detection::car(0.0, 0.0, 50.0, 50.0),
        ];
        for sec in 0..=10 {
            s.evaluate(&dets, t0 + Duration::from_secs(sec), noon());
        }
        assert_eq!(s.cooldown().len(), 1);

        let out = s.evaluate(&[], t0 + Duration::from_secs(20), noon());
        assert_eq!(out.evicted.len(), 1);
        assert!(s.tracks().is_empty());
        assert!(s.cooldown().is_empty());
    }
}
