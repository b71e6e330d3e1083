//! 最新帧单槽通道 (Latest-value slot)
//!
//! 单生产者发布, 任意多个读者取快照。读者只会看到最近一次发布的值或空值,
//! 没有队列也没有背压: 慢读者看到旧帧, 快读者可能重复看到同一帧。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub struct LatestFrame<T> {
    slot: Arc<Mutex<Option<Arc<T>>>>,
    version: Arc<AtomicU64>,
}

impl<T> Clone for LatestFrame<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            version: Arc::clone(&self.version),
        }
    }
}

impl<T> Default for LatestFrame<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            version: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<T> LatestFrame<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 替换槽内的值 (锁内只做指针交换)
    pub fn publish(&self, value: impl Into<Arc<T>>) {
        let value = value.into();
        let previous = {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            slot.replace(value)
        };
        self.version.fetch_add(1, Ordering::Release);
        // 旧值在锁外释放
        drop(previous);
    }

    pub fn snapshot(&self) -> Option<Arc<T>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 已发布次数, 读者可据此判断是否有新帧
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}
