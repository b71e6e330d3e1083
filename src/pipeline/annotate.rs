/// 帧标注 (Frame annotation)
/// 行人绿框 / 车辆蓝框 / 保护区域黄色多边形; 提供字体时额外绘制标签与FPS
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;

use super::session::TrackedPerson;
use crate::alerts::{AlertKind, ProtectedZone};
use crate::detection::{BBox, Detection, Label};
use crate::{Result, SentinelError};

const PERSON_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CAR_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const OTHER_COLOR: Rgb<u8> = Rgb([200, 200, 200]);
const ZONE_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub struct Annotator {
    font: Option<FontArc>,
    scale: f32,
}

impl Annotator {
    pub fn new() -> Self {
        Self {
            font: None,
            scale: 16.0,
        }
    }

    /// 从 TTF/OTF 文件加载字体
    pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| SentinelError::Config(format!("font {}: {}", path.display(), e)))?;
        self.font = Some(font);
        Ok(self)
    }

    pub fn draw(
        &self,
        image: &mut RgbImage,
        zone: Option<&ProtectedZone>,
        persons: &[TrackedPerson],
        detections: &[Detection],
        fps: Option<f64>,
    ) {
        if let Some(zone) = zone {
            draw_polygon_outline(image, zone.points(), ZONE_COLOR);
        }

        for det in detections.iter().filter(|d| d.label != Label::Person) {
            let color = if det.label == Label::Car { CAR_COLOR } else { OTHER_COLOR };
            draw_box(image, &det.bbox, color);
            self.label(image, &det.bbox, &format!("{} {:.2}", det.label.name(), det.confidence));
        }

        for person in persons {
            draw_box(image, &person.bbox, PERSON_COLOR);
            self.label(image, &person.bbox, &format!("person {}", person.id));
        }

        if let (Some(font), Some(fps)) = (&self.font, fps) {
            draw_text_mut(
                image,
                TEXT_COLOR,
                8,
                8,
                PxScale::from(self.scale * 1.25),
                font,
                &format!("FPS: {:.1}", fps),
            );
        }
    }

    /// 告警帧加一圈告警类型颜色的边框
    pub fn draw_alert_border(&self, image: &mut RgbImage, kind: AlertKind) {
        let (w, h) = image.dimensions();
        let color = Rgb(kind.color());
        for inset in 0..4u32 {
            if w <= 2 * inset || h <= 2 * inset {
                break;
            }
            let rect = Rect::at(inset as i32, inset as i32).of_size(w - 2 * inset, h - 2 * inset);
            draw_hollow_rect_mut(image, rect, color);
        }
    }

    fn label(&self, image: &mut RgbImage, bbox: &BBox, text: &str) {
        let Some(font) = &self.font else {
            return;
        };
        let y = (bbox.y1 - self.scale - 2.0).max(0.0);
        draw_text_mut(
            image,
            TEXT_COLOR,
            bbox.x1.max(0.0) as i32,
            y as i32,
            PxScale::from(self.scale),
            font,
            text,
        );
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

fn draw_box(image: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
    let w = bbox.width().round() as u32;
    let h = bbox.height().round() as u32;
    if w == 0 || h == 0 {
        return;
    }
    let rect = Rect::at(bbox.x1.round() as i32, bbox.y1.round() as i32).of_size(w, h);
    draw_hollow_rect_mut(image, rect, color);
    // 2px 边框
    if w > 2 && h > 2 {
        let inner = Rect::at(rect.left() + 1, rect.top() + 1).of_size(w - 2, h - 2);
        draw_hollow_rect_mut(image, inner, color);
    }
}

fn draw_polygon_outline(image: &mut RgbImage, points: &[(f32, f32)], color: Rgb<u8>) {
    for (i, &start) in points.iter().enumerate() {
        let end = points[(i + 1) % points.len()];
        draw_line_segment_mut(image, start, end, color);
    }
}
