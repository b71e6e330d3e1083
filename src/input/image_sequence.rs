//! 图片序列输入 - 按文件名排序逐帧读取目录中的图片
//!
//! 序列读完后 `read` 返回 `Ok(None)`, 由 FrameSource 按普通读失败处理。

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{info, warn};

use super::Capture;
use crate::{Result, SentinelError};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

pub struct ImageSequenceCapture {
    files: Vec<PathBuf>,
    cursor: usize,
    released: bool,
}

impl ImageSequenceCapture {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries =
            std::fs::read_dir(dir).map_err(|e| SentinelError::open(dir.display().to_string(), e))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(SentinelError::open(
                dir.display().to_string(),
                "directory contains no images",
            ));
        }

        info!("🖼️ 图片序列: {} ({} 帧)", dir.display(), files.len());
        Ok(Self {
            files,
            cursor: 0,
            released: false,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Capture for ImageSequenceCapture {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        if self.released {
            return Err(SentinelError::Read("capture released".to_string()));
        }
        while let Some(path) = self.files.get(self.cursor) {
            self.cursor += 1;
            match image::open(path) {
                Ok(img) => return Ok(Some(img.to_rgb8())),
                Err(e) => {
                    // 损坏的图片直接跳过
                    warn!("⚠️ 跳过无法解码的图片 {}: {}", path.display(), e);
                }
            }
        }
        Ok(None)
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn is_live(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_frames_in_name_order_then_ends() {
        let dir = std::env::temp_dir().join(format!("sentinel-seq-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        RgbImage::from_pixel(8, 8, image::Rgb([200, 0, 0]))
            .save(dir.join("b.png"))
            .unwrap();
        RgbImage::from_pixel(8, 8, image::Rgb([0, 200, 0]))
            .save(dir.join("a.png"))
            .unwrap();
        std::fs::write(dir.join("notes.txt"), "skip me").unwrap();

        let mut capture = ImageSequenceCapture::open(&dir).unwrap();
        assert_eq!(capture.len(), 2);
        assert_eq!(capture.read().unwrap().unwrap().get_pixel(0, 0)[1], 200);
        assert_eq!(capture.read().unwrap().unwrap().get_pixel(0, 0)[0], 200);
        assert!(capture.read().unwrap().is_none());

        capture.release();
        assert!(capture.read().is_err());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_directory_is_an_open_error() {
        let err = ImageSequenceCapture::open("/definitely/not/here").err().unwrap();
        assert!(matches!(err, SentinelError::Open { .. }));
    }
}
