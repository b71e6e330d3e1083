pub mod alerts; // 告警策略 / 冷却 / 发送
pub mod config; // 命令行与会话配置
pub mod detection; // 检测适配与轨迹
pub mod error; // 错误分类
pub mod input; // 视频输入系统
pub mod pipeline; // 检测循环编排
pub mod utils; // 时间戳 / JPEG / 缩放

pub use crate::config::{Args, SentinelConfig};
pub use crate::error::{Result, SentinelError};
