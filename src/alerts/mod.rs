/// 告警系统 (Alert System)
///
/// 三个互相独立的告警策略 + 冷却去重 + 告警发送:
/// - Zone:       保护区域停留
/// - Loiter:     车后徘徊
/// - TimeWindow: 限制时段出现
/// - Cooldown:   按告警键去重
/// - Emitter:    打包快照并交给通知/存储方
pub mod cooldown;
pub mod emitter;
pub mod log;
pub mod loiter;
pub mod notify;
pub mod time_window;
pub mod types;
pub mod zone;

pub use cooldown::CooldownGate;
pub use emitter::AlertEmitter;
pub use log::AlertLog;
pub use loiter::LoiterGeometryEvaluator;
pub use notify::{LocalImageStore, Notifier, RemoteAlertClient};
pub use time_window::{TimeWindow, TimeWindowEvaluator};
pub use types::{Alert, AlertKey, AlertKind, CandidateAlert};
pub use zone::{ProtectedZone, ZoneContainmentEvaluator};
