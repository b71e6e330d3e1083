// YOLOv8 ONNX 检测器
// 包含: 模型加载、letterbox 预处理、推理、后处理 (置信度过滤 + NMS)

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::{ArrayView, Axis, IxDyn};
use ort::{GraphOptimizationLevel, Session};
use tracing::info;

use super::detector::{retain_allowed, Detector};
use super::types::{BBox, Detection, Frame, Label};
use crate::{Result, SentinelError};

/// YOLOv8 推理参数
#[derive(Debug, Clone)]
pub struct YoloV8Config {
    pub input_size: u32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for YoloV8Config {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
        }
    }
}

/// YOLOv8 检测器 (COCO 80类, 输出 [1, 4+nc, N])
pub struct YoloV8Detector {
    session: Session,
    config: YoloV8Config,
    name: String,
}

impl YoloV8Detector {
    pub fn new(model_path: impl AsRef<Path>, config: YoloV8Config) -> Result<Self> {
        let model_path = model_path.as_ref();
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| {
                SentinelError::Config(format!("模型加载失败 {}: {}", model_path.display(), e))
            })?;

        info!(
            "✅ YOLOv8 检测模型加载成功: {} (输入 {}x{})",
            model_path.display(),
            config.input_size,
            config.input_size
        );

        Ok(Self {
            session,
            name: format!("yolov8:{}", model_path.display()),
            config,
        })
    }

    /// letterbox: 等比缩放到左上角, 其余部分填充灰色
    fn preprocess(&self, image: &RgbImage) -> (Vec<f32>, f32) {
        let size = self.config.input_size;
        let ratio = (size as f32 / image.width() as f32).min(size as f32 / image.height() as f32);
        let w = ((image.width() as f32 * ratio).round() as u32).clamp(1, size);
        let h = ((image.height() as f32 * ratio).round() as u32).clamp(1, size);

        let resized = imageops::resize(image, w, h, FilterType::Triangle);
        let mut canvas = RgbImage::from_pixel(size, size, Rgb([114, 114, 114]));
        imageops::replace(&mut canvas, &resized, 0, 0);

        // HWC u8 → NCHW f32 (0-1)
        let plane = (size * size) as usize;
        let mut data = vec![0f32; 3 * plane];
        for (x, y, pixel) in canvas.enumerate_pixels() {
            let idx = (y * size + x) as usize;
            data[idx] = pixel[0] as f32 / 255.0;
            data[plane + idx] = pixel[1] as f32 / 255.0;
            data[2 * plane + idx] = pixel[2] as f32 / 255.0;
        }
        (data, ratio)
    }

    fn postprocess(
        &self,
        output: ArrayView<f32, IxDyn>,
        ratio: f32,
        frame_w: f32,
        frame_h: f32,
    ) -> Vec<Detection> {
        const CXYWH_OFFSET: usize = 4;

        let mut candidates = Vec::new();
        // [1, 4+nc, N] → 逐个 anchor
        let preds = output.index_axis(Axis(0), 0);
        for pred in preds.axis_iter(Axis(1)) {
            let (class_id, confidence) = pred
                .iter()
                .skip(CXYWH_OFFSET)
                .enumerate()
                .fold((0usize, f32::MIN), |best, (i, &c)| if c > best.1 { (i, c) } else { best });

            if confidence < self.config.conf_threshold {
                continue;
            }

            let cx = pred[0] / ratio;
            let cy = pred[1] / ratio;
            let w = pred[2] / ratio;
            let h = pred[3] / ratio;
            let bbox = BBox::new(
                (cx - w / 2.0).clamp(0.0, frame_w),
                (cy - h / 2.0).clamp(0.0, frame_h),
                (cx + w / 2.0).clamp(0.0, frame_w),
                (cy + h / 2.0).clamp(0.0, frame_h),
            );
            candidates.push(Detection::new(Label::from_coco(class_id), confidence, bbox));
        }

        non_max_suppression(&mut candidates, self.config.iou_threshold);
        candidates
    }
}

impl Detector for YoloV8Detector {
    fn detect(&mut self, frame: &Frame, allowed: &[Label]) -> Result<Vec<Detection>> {
        let size = self.config.input_size as usize;
        let (data, ratio) = self.preprocess(&frame.image);

        let input = ort::Tensor::from_array(([1usize, 3, size, size], data))
            .map_err(|e| SentinelError::Detect(e.to_string()))?;
        let inputs = ort::inputs![input].map_err(|e| SentinelError::Detect(e.to_string()))?;
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| SentinelError::Detect(e.to_string()))?;

        let (shape, raw) = outputs[0]
            .try_extract_raw_tensor::<f32>()
            .map_err(|e| SentinelError::Detect(e.to_string()))?;
        let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let view = ArrayView::from_shape(IxDyn(&shape), raw)
            .map_err(|e| SentinelError::Detect(e.to_string()))?;

        let mut detections =
            self.postprocess(view, ratio, frame.width() as f32, frame.height() as f32);
        retain_allowed(&mut detections, allowed);
        Ok(detections)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 按类别做 NMS (高分优先)
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].label == xs[index].label
                && xs[prev_index].bbox.iou(&xs[index].bbox) > iou_threshold
            {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}
