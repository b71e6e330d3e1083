//! 行人轨迹表 (Track table)
//!
//! 相邻帧之间按质心最近邻贪心关联, 分配稳定的整数ID。
//! 每条轨迹携带告警策略需要的计时器 (区域停留 / 车后徘徊),
//! 长时间未出现的轨迹连同其计时器一起被淘汰。

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::types::BBox;

/// 轨迹ID (从1开始分配, 会话内不复用)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u32);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 关联参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// 质心最大匹配距离 (像素)
    pub match_distance: f32,
    /// 超过该时长未匹配的轨迹不再参与关联
    pub association_gap: Duration,
    /// 超过该时长未出现的轨迹被删除 (连同计时器)
    pub ttl: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_distance: 64.0,
            association_gap: Duration::from_secs(2),
            ttl: Duration::from_secs(120),
        }
    }
}

/// 单条轨迹状态
#[derive(Debug, Clone)]
pub struct TrackState {
    pub id: TrackId,
    pub bbox: BBox,
    pub first_seen: Instant,
    pub last_seen: Instant,
    /// 首次进入保护区域的时间 (轨迹存活期间不清除)
    pub zone_since: Option<Instant>,
    /// 首次与车辆形成徘徊关系的时间 (关系中断即清除)
    pub loiter_since: Option<Instant>,
}

impl TrackState {
    fn new(id: TrackId, bbox: BBox, now: Instant) -> Self {
        Self {
            id,
            bbox,
            first_seen: now,
            last_seen: now,
            zone_since: None,
            loiter_since: None,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        self.bbox.center()
    }
}

/// 轨迹表
pub struct TrackTable {
    tracks: BTreeMap<TrackId, TrackState>,
    next_id: u32,
    config: TrackerConfig,
}

impl TrackTable {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tracks: BTreeMap::new(),
            next_id: 1,
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// 关联当前帧的行人框, 返回与输入顺序一致的轨迹ID
    pub fn associate(&mut self, persons: &[BBox], now: Instant) -> Vec<TrackId> {
        let mut assigned: Vec<Option<TrackId>> = vec![None; persons.len()];

        // 候选对: (距离, 检测下标, 轨迹ID)
        let mut candidates = Vec::new();
        for (det_idx, bbox) in persons.iter().enumerate() {
            let (cx, cy) = bbox.center();
            for track in self.tracks.values() {
                if now.saturating_duration_since(track.last_seen) > self.config.association_gap {
                    continue;
                }
                let (tx, ty) = track.center();
                let dist = ((cx - tx).powi(2) + (cy - ty).powi(2)).sqrt();
                if dist <= self.config.match_distance {
                    candidates.push((dist, det_idx, track.id));
                }
            }
        }

        // 贪心匹配: 按距离排序
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.2.cmp(&b.2)));

        let mut used_tracks = Vec::new();
        for (_, det_idx, track_id) in candidates {
            if assigned[det_idx].is_some() || used_tracks.contains(&track_id) {
                continue;
            }
            assigned[det_idx] = Some(track_id);
            used_tracks.push(track_id);
            if let Some(track) = self.tracks.get_mut(&track_id) {
                track.bbox = persons[det_idx];
                track.last_seen = now;
            }
        }

        // 未匹配的检测 → 新建轨迹
        assigned
            .into_iter()
            .zip(persons)
            .map(|(id, bbox)| match id {
                Some(id) => id,
                None => {
                    let id = TrackId(self.next_id);
                    self.next_id += 1;
                    self.tracks.insert(id, TrackState::new(id, *bbox, now));
                    id
                }
            })
            .collect()
    }

    /// 删除超过 ttl 未出现的轨迹, 返回被删除的ID
    pub fn evict_stale(&mut self, now: Instant) -> Vec<TrackId> {
        let ttl = self.config.ttl;
        let stale: Vec<TrackId> = self
            .tracks
            .values()
            .filter(|t| now.saturating_duration_since(t.last_seen) > ttl)
            .map(|t| t.id)
            .collect();
        for id in &stale {
            self.tracks.remove(id);
        }
        stale
    }

    pub fn get(&self, id: TrackId) -> Option<&TrackState> {
        self.tracks.get(&id)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut TrackState> {
        self.tracks.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl Default for TrackTable {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
