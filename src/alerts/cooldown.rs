//! 冷却去重 (Cooldown gate)
//!
//! 同一告警键在冷却期内只放行一次, 所有策略的候选告警都必须经过这里。
//! 单线程顺序调用, 不需要内部同步。

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use super::types::AlertKey;
use crate::detection::TrackId;

pub struct CooldownGate<K = AlertKey> {
    cooldown: Duration,
    last_emission: HashMap<K, Instant>,
}

impl<K: Eq + Hash + Clone> CooldownGate<K> {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_emission: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// 首次出现或距上次放行 ≥ cooldown 时放行, 并记录本次时间
    pub fn admit(&mut self, key: K, now: Instant) -> bool {
        if let Some(last) = self.last_emission.get(&key) {
            if now.saturating_duration_since(*last) < self.cooldown {
                return false;
            }
        }
        self.last_emission.insert(key, now);
        true
    }

    pub fn last_emission(&self, key: &K) -> Option<Instant> {
        self.last_emission.get(key).copied()
    }

    /// 删除已过冷却期的记录; 对 `admit` 的结果没有影响
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.last_emission.len();
        let cooldown = self.cooldown;
        self.last_emission
            .retain(|_, last| now.saturating_duration_since(*last) < cooldown);
        before - self.last_emission.len()
    }

    pub fn len(&self) -> usize {
        self.last_emission.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_emission.is_empty()
    }
}

impl CooldownGate<AlertKey> {
    /// 轨迹淘汰时删除其所有告警键
    pub fn forget_track(&mut self, track: TrackId) {
        self.last_emission.retain(|key, _| key.track() != Some(track));
    }
}
