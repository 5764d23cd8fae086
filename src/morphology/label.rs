// 该文件是 Dongcha （洞察） 项目的一部分。
// src/morphology/label.rs - 连通域标记
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

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

/// 标签图，0 为背景，目标编号为 1..=n
pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// 8 连通的连通域标记，按行优先扫描顺序编号
pub fn label(binary: &GrayImage) -> LabelImage {
  connected_components(binary, Connectivity::Eight, Luma([0u8]))
}

/// 把一组 (x, y) 点标记为种子，每个点单独编号（按扫描顺序）
///
/// 相邻的点会被合并为同一个标签。
pub fn label_points(width: u32, height: u32, points: &[(u32, u32)]) -> LabelImage {
  let mut seeds = GrayImage::new(width, height);
  for &(x, y) in points {
    if x < width && y < height {
      seeds.put_pixel(x, y, Luma([255]));
    }
  }
  label(&seeds)
}

/// 标签图中的最大标签
pub fn max_label(labels: &LabelImage) -> u32 {
  labels.pixels().map(|p| p[0]).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn labels_components_in_scan_order() {
    let mut img = GrayImage::new(10, 10);
    for (x, y) in [(1, 1), (2, 2), (7, 1), (5, 8)] {
      img.put_pixel(x, y, Luma([255]));
    }
    let labels = label(&img);
    // (1,1) 与 (2,2) 对角相连
    assert_eq!(labels.get_pixel(1, 1)[0], labels.get_pixel(2, 2)[0]);
    assert_eq!(max_label(&labels), 3);
    assert_eq!(labels.get_pixel(0, 0)[0], 0);
  }

  #[test]
  fn points_become_markers() {
    let markers = label_points(20, 20, &[(15, 3), (2, 10), (30, 30)]);
    assert_eq!(max_label(&markers), 2);
    assert_eq!(markers.get_pixel(15, 3)[0], 1);
    assert_eq!(markers.get_pixel(2, 10)[0], 2);
  }
}
