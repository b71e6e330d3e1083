/// 检测系统数据结构定义
/// Data structures shared by the capture, detection and alert stages
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use serde::{Deserialize, Serialize};

// ========== 公共常量 ==========

/// COCO 类别: 0=person, 2=car
pub const COCO_PERSON: usize = 0;
pub const COCO_CAR: usize = 2;

/// 告警引擎关心的类别
pub const ALERT_LABELS: &[Label] = &[Label::Person, Label::Car];

// ========== 枚举类型 ==========

/// 检测类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Person,
    Car,
    Other,
}

impl Label {
    pub fn from_coco(class_id: usize) -> Self {
        match class_id {
            COCO_PERSON => Label::Person,
            COCO_CAR => Label::Car,
            _ => Label::Other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Label::Person => "person",
            Label::Car => "car",
            Label::Other => "other",
        }
    }
}

// ========== 数据结构 ==========

/// 检测框 (帧像素坐标, 左上 + 右下)
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// 闭区间相交 (边界接触也算相交)
    pub fn intersects(&self, other: &BBox) -> bool {
        self.x1 <= other.x2 && other.x1 <= self.x2 && self.y1 <= other.y2 && other.y1 <= self.y2
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

/// 单个检测结果 (每周期生成, 用完即弃)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: Label,
    pub confidence: f32,
    pub bbox: BBox,
}

impl Detection {
    pub fn new(label: Label, confidence: f32, bbox: BBox) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
        }
    }

    pub fn person(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(Label::Person, 0.9, BBox::new(x1, y1, x2, y2))
    }

    pub fn car(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(Label::Car, 0.9, BBox::new(x1, y1, x2, y2))
    }
}

/// 已采集帧 (采集 → 检测 → 发布)
#[derive(Clone)]
pub struct Frame {
    pub image: Arc<RgbImage>, // 使用Arc共享数据,避免复制
    pub index: u64,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage, index: u64) -> Self {
        Self {
            image: Arc::new(image),
            index,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("size", &format_args!("{}x{}", self.width(), self.height()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_boxes_intersect() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(10.0, 5.0, 20.0, 15.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&BBox::new(10.5, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&BBox::new(20.0, 20.0, 30.0, 30.0)), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn coco_ids_map_to_labels() {
        assert_eq!(Label::from_coco(0), Label::Person);
        assert_eq!(Label::from_coco(2), Label::Car);
        assert_eq!(Label::from_coco(7), Label::Other);
    }
}
