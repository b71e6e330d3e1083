//! 进程内告警日志 (有界, 供外部查询最近 N 条)

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::types::Alert;

struct Inner {
    entries: VecDeque<Alert>,
    total: u64,
}

/// 可克隆的共享句柄: 检测线程追加, 任意线程读取
#[derive(Clone)]
pub struct AlertLog {
    inner: Arc<Mutex<Inner>>,
    capacity: usize,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity),
                total: 0,
            })),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // 持锁期间不会 panic, 中毒时直接取回数据
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, alert: Alert) {
        let mut inner = self.lock();
        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(alert);
        inner.total += 1;
    }

    /// 最近 n 条, 按时间先后排列 (最新的在最后)
    pub fn recent(&self, n: usize) -> Vec<Alert> {
        let inner = self.lock();
        let skip = inner.entries.len().saturating_sub(n);
        inner.entries.iter().skip(skip).cloned().collect()
    }

    /// 累计告警数 (包括已被挤出的)
    pub fn total(&self) -> u64 {
        self.lock().total
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new(100)
    }
}
