// 该文件是 Dongcha （洞察） 项目的一部分。
// src/morphology.rs - 形态学图像处理
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

//! # 形态学图像处理
//!
//! 灰度图像统一使用 [`image::GrayImage`]，二值图像取值为 0 / 255，
//! 与灰度图共用同一组算子：
//!
//! - 结构元素：[`Footprint::disk`]、[`Footprint::square`]、[`Footprint::cross`]
//! - 基本运算：[`erosion`]、[`dilation`]、[`opening`]、[`closing`]
//! - 派生运算：[`white_tophat`]、[`black_tophat`]、[`gradient`]
//! - 分割相关：[`threshold_otsu`]、[`distance_transform_edt`]、[`peak_local_max`]、
//!   [`label`]、[`watershed`]、[`regionprops`]、[`skeletonize`]

use image::{GrayImage, Luma};
use thiserror::Error;

pub mod contour;
mod distance;
mod footprint;
mod label;
mod ops;
mod peaks;
mod regionprops;
mod skeleton;
mod threshold;
mod watershed;

pub use self::distance::distance_transform_edt;
pub use self::footprint::Footprint;
pub use self::label::{LabelImage, label, label_points, max_label};
pub use self::ops::{black_tophat, closing, dilation, erosion, gradient, opening, white_tophat};
pub use self::peaks::peak_local_max;
pub use self::regionprops::{RegionProps, perimeter, regionprops};
pub use self::skeleton::skeletonize;
pub use self::threshold::{binarize, threshold_otsu};
pub use self::watershed::watershed;

#[derive(Error, Debug, PartialEq)]
pub enum MorphologyError {
  #[error("图像尺寸不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  DimensionMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
}

pub(crate) fn check_dimensions(expected: (u32, u32), actual: (u32, u32)) -> Result<(), MorphologyError> {
  if expected != actual {
    return Err(MorphologyError::DimensionMismatch { expected, actual });
  }
  Ok(())
}

/// 行优先存储的浮点图像，用于距离图与高程图
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
  width: u32,
  height: u32,
  data: Vec<f64>,
}

impl FloatImage {
  pub fn new(width: u32, height: u32) -> Self {
    Self::from_raw(width, height, vec![0.0; width as usize * height as usize])
  }

  /// `data` 的长度必须等于 `width * height`
  pub fn from_raw(width: u32, height: u32, data: Vec<f64>) -> Self {
    debug_assert_eq!(data.len(), width as usize * height as usize);
    Self { width, height, data }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  pub fn get(&self, x: u32, y: u32) -> f64 {
    self.data[y as usize * self.width as usize + x as usize]
  }

  pub fn set(&mut self, x: u32, y: u32, value: f64) {
    self.data[y as usize * self.width as usize + x as usize] = value;
  }

  pub fn as_slice(&self) -> &[f64] {
    &self.data
  }

  pub fn max(&self) -> f64 {
    self.data.iter().copied().fold(0.0, f64::max)
  }

  /// 逐像素取反，把距离图转换为分水岭的高程图
  pub fn negated(&self) -> Self {
    Self::from_raw(self.width, self.height, self.data.iter().map(|v| -v).collect())
  }

  /// 线性拉伸到 0..=255，便于显示
  pub fn to_gray_normalized(&self) -> GrayImage {
    let min = self.data.iter().copied().fold(f64::INFINITY, f64::min);
    let max = self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    GrayImage::from_fn(self.width, self.height, |x, y| {
      let v = if range > 0.0 {
        (self.get(x, y) - min) / range * 255.0
      } else {
        0.0
      };
      Luma([v.round().clamp(0.0, 255.0) as u8])
    })
  }
}

impl From<&GrayImage> for FloatImage {
  fn from(image: &GrayImage) -> Self {
    Self::from_raw(
      image.width(),
      image.height(),
      image.as_raw().iter().map(|&v| v as f64).collect(),
    )
  }
}

/// 两幅图逐像素饱和相减
pub(crate) fn saturating_sub(a: &GrayImage, b: &GrayImage) -> GrayImage {
  let data = a
    .as_raw()
    .iter()
    .zip(b.as_raw())
    .map(|(&x, &y)| x.saturating_sub(y))
    .collect();
  GrayImage::from_raw(a.width(), a.height(), data).unwrap_or_else(|| GrayImage::new(a.width(), a.height()))
}
