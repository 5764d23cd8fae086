// 该文件是 Dongcha （洞察） 项目的一部分。
// src/morphology/footprint.rs - 结构元素
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

use image::{GrayImage, Luma};
use imageproc::morphology::Mask;

/// 以原点为中心的结构元素，保存 (dx, dy) 偏移
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footprint {
  offsets: Vec<(i32, i32)>,
}

impl Footprint {
  /// 圆盘：`dx² + dy² <= r²`
  pub fn disk(radius: u32) -> Self {
    let r = radius as i32;
    let offsets = (-r..=r)
      .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
      .filter(|(dx, dy)| dx * dx + dy * dy <= r * r)
      .collect();
    Self { offsets }
  }

  /// 边长为 `width` 的正方形，偶数边长时中心偏向左上
  pub fn square(width: u32) -> Self {
    let w = width.max(1) as i32;
    let start = -((w - 1) / 2);
    let offsets = (start..start + w)
      .flat_map(|dy| (start..start + w).map(move |dx| (dx, dy)))
      .collect();
    Self { offsets }
  }

  /// 3x3 十字（4 连通），未指定结构元素时的默认值
  pub fn cross() -> Self {
    Self {
      offsets: vec![(0, -1), (-1, 0), (0, 0), (1, 0), (0, 1)],
    }
  }

  pub fn offsets(&self) -> &[(i32, i32)] {
    &self.offsets
  }

  pub fn len(&self) -> usize {
    self.offsets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.offsets.is_empty()
  }

  /// 转为 imageproc 的掩码，外接矩形边长不能超过 511
  pub(crate) fn to_mask(&self) -> Mask {
    let min_x = self.offsets.iter().map(|o| o.0).min().unwrap_or(0);
    let max_x = self.offsets.iter().map(|o| o.0).max().unwrap_or(0);
    let min_y = self.offsets.iter().map(|o| o.1).min().unwrap_or(0);
    let max_y = self.offsets.iter().map(|o| o.1).max().unwrap_or(0);
    let mut image = GrayImage::new((max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32);
    for &(dx, dy) in &self.offsets {
      image.put_pixel((dx - min_x) as u32, (dy - min_y) as u32, Luma([255]));
    }
    Mask::from_image(&image, (-min_x) as u8, (-min_y) as u8)
  }

  /// 关于原点的反射，膨胀时使用
  pub fn reflected(&self) -> Self {
    Self {
      offsets: self.offsets.iter().map(|&(dx, dy)| (-dx, -dy)).collect(),
    }
  }
}

impl Default for Footprint {
  fn default() -> Self {
    Self::cross()
  }
}
