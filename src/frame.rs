// 该文件是 Dongcha （洞察） 项目的一部分。
// src/frame.rs - RGB 帧定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::RgbImage;
use thiserror::Error;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 一帧 HWC 排布的 RGB 图像，附带帧序号与时间戳
#[derive(Debug, Clone)]
pub struct RgbFrame {
  image: RgbImage,
  /// 帧索引，从 0 开始
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl RgbFrame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  /// 从 HWC 排布的原始字节构建帧
  pub fn from_hwc(
    width: u32,
    height: u32,
    data: Vec<u8>,
    index: u64,
  ) -> Result<Self, FrameError> {
    let expected = RGB_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }
    let image = RgbImage::from_raw(width, height, data).ok_or(FrameError::LengthMismatch {
      expected,
      actual: 0,
    })?;
    Ok(Self::new(image, index, 0))
  }

  pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
    self.timestamp_ms = timestamp_ms;
    self
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_hwc(&self) -> &[u8] {
    self.image.as_raw()
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn into_image(self) -> RgbImage {
    self.image
  }
}

impl From<RgbImage> for RgbFrame {
  fn from(image: RgbImage) -> Self {
    Self::new(image, 0, 0)
  }
}

impl AsRef<RgbImage> for RgbFrame {
  fn as_ref(&self) -> &RgbImage {
    &self.image
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_wrong_buffer_length() {
    let err = RgbFrame::from_hwc(4, 4, vec![0u8; 10], 0).unwrap_err();
    match err {
      FrameError::LengthMismatch { expected, actual } => {
        assert_eq!(expected, 48);
        assert_eq!(actual, 10);
      }
    }
  }

  #[test]
  fn keeps_hwc_layout() {
    let data: Vec<u8> = (0..12).collect();
    let frame = RgbFrame::from_hwc(2, 2, data, 3).unwrap();
    assert_eq!(frame.index, 3);
    assert_eq!(frame.image().get_pixel(1, 0).0, [3, 4, 5]);
    assert_eq!(frame.as_hwc().len(), 12);
  }
}
