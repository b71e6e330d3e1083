/// 工具模块
/// Utility helpers: timestamps, JPEG encoding, frame resizing
use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::{Result, SentinelError};

/// 本地时间戳 `20260101_223000_123456` (告警文件名与记录共用)
pub fn gen_time_string() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S_%6f").to_string()
}

/// RGB 帧 → JPEG 字节
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity((image.width() * image.height() / 4) as usize);
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(image)?;
    Ok(buf)
}

/// 缩放到固定分辨率 (fast_image_resize, 双线性插值); 尺寸一致时直接返回
pub fn resize_rgb(image: RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    if image.width() == width && image.height() == height {
        return Ok(image);
    }

    let (src_w, src_h) = image.dimensions();
    let src_image = fr::images::Image::from_vec_u8(src_w, src_h, image.into_raw(), fr::PixelType::U8x3)
        .map_err(|e| SentinelError::Read(format!("resize source: {}", e)))?;
    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src_image,
            &mut dst_image,
            &fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )
        .map_err(|e| SentinelError::Read(format!("resize: {}", e)))?;

    RgbImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| SentinelError::Read("resized buffer size mismatch".to_string()))
}
