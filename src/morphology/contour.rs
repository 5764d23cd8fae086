// 该文件是 Dongcha （洞察） 项目的一部分。
// src/morphology/contour.rs - 二值图像的外轮廓
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

use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};

/// 所有外轮廓，每条轮廓是有序的 (x, y) 像素序列
pub fn external_contours(binary: &GrayImage) -> Vec<Vec<(i32, i32)>> {
  find_contours::<i32>(binary)
    .into_iter()
    .filter(|c| c.border_type == BorderType::Outer)
    .map(|c| c.points.into_iter().map(|p| (p.x, p.y)).collect())
    .collect()
}

/// 点数最多的外轮廓，没有前景时为空
pub fn outer_contour(binary: &GrayImage) -> Vec<(i32, i32)> {
  external_contours(binary)
    .into_iter()
    .max_by_key(Vec::len)
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Luma;

  #[test]
  fn rectangle_outline() {
    let img = GrayImage::from_fn(12, 10, |x, y| {
      Luma([if (2..8).contains(&x) && (3..7).contains(&y) { 255 } else { 0 }])
    });
    let contour = outer_contour(&img);
    // 6x4 矩形的边界像素
    let unique: std::collections::HashSet<_> = contour.iter().copied().collect();
    assert_eq!(unique.len(), 16);
    assert!(contour.iter().all(|&(x, y)| {
      (2..8).contains(&x) && (3..7).contains(&y) && (x == 2 || x == 7 || y == 3 || y == 6)
    }));
  }

  #[test]
  fn picks_largest_component() {
    let mut img = GrayImage::new(20, 20);
    img.put_pixel(1, 1, Luma([255]));
    for y in 8..15 {
      for x in 8..15 {
        img.put_pixel(x, y, Luma([255]));
      }
    }
    assert_eq!(external_contours(&img).len(), 2);
    let contour = outer_contour(&img);
    assert!(contour.iter().all(|&(x, y)| x >= 8 && y >= 8));
  }

  #[test]
  fn empty_image_has_no_contour() {
    assert!(outer_contour(&GrayImage::new(5, 5)).is_empty());
  }
}
