/// 检测系统 (Detection System)
///
/// - Detector: 目标检测适配层 (模型本身视为黑盒)
/// - Tracker:  行人轨迹ID分配 (最近邻关联)
/// - YOLOv8:   ONNX 检测器实现 (feature = "onnx")
pub mod detector;
pub mod tracker;
pub mod types;
#[cfg(feature = "onnx")]
pub mod yolov8;

pub use detector::{retain_allowed, Detector};
pub use tracker::{TrackId, TrackState, TrackTable, TrackerConfig};
pub use types::{BBox, Detection, Frame, Label, ALERT_LABELS};
#[cfg(feature = "onnx")]
pub use yolov8::{YoloV8Config, YoloV8Detector};
