//! 检测器接口 (Detector)
//! 职责: Frame → Vec<Detection>, 核心只消费检测列表

use super::types::{Detection, Frame, Label};
use crate::Result;

/// 目标检测适配器
///
/// 实现方可以是本地 ONNX 模型、远程推理服务或测试脚本。
/// `allowed` 是本次调用关心的类别, 其他类别应被丢弃。
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame, allowed: &[Label]) -> Result<Vec<Detection>>;

    /// 检测器名称 (日志用)
    fn name(&self) -> &str {
        "detector"
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, frame: &Frame, allowed: &[Label]) -> Result<Vec<Detection>> {
        (**self).detect(frame, allowed)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// 过滤掉不在白名单内的类别 (Other 永远不会进入告警引擎)
pub fn retain_allowed(detections: &mut Vec<Detection>, allowed: &[Label]) {
    detections.retain(|d| d.label != Label::Other && allowed.contains(&d.label));
}
