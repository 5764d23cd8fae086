// 该文件是 Dongcha （洞察） 项目的一部分。
// src/morphology/distance.rs - 欧氏距离变换
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
use imageproc::distance_transform::euclidean_squared_distance_transform;

use super::FloatImage;

/// 前景像素 (> 0) 到最近背景像素的欧氏距离，背景为 0
///
/// 图像中没有背景像素时结果为正无穷。
pub fn distance_transform_edt(binary: &GrayImage) -> FloatImage {
  // imageproc 计算到最近非零像素的距离，先把背景翻成源点
  let background = GrayImage::from_fn(binary.width(), binary.height(), |x, y| {
    Luma([if binary.get_pixel(x, y)[0] > 0 { 0 } else { 255 }])
  });
  let squared = euclidean_squared_distance_transform(&background);
  let data = squared.into_raw().into_iter().map(f64::sqrt).collect();
  FloatImage::from_raw(binary.width(), binary.height(), data)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Luma;

  #[test]
  fn distance_inside_square() {
    let img = GrayImage::from_fn(7, 7, |x, y| {
      if (1..=5).contains(&x) && (1..=5).contains(&y) {
        Luma([255])
      } else {
        Luma([0])
      }
    });
    let d = distance_transform_edt(&img);
    assert_eq!(d.get(0, 0), 0.0);
    assert_eq!(d.get(1, 1), 1.0);
    assert_eq!(d.get(3, 3), 3.0);
    assert_eq!(d.get(2, 3), 2.0);
    assert_eq!(d.max(), 3.0);
  }

  #[test]
  fn distance_is_euclidean() {
    // 只有左上角是背景
    let mut img = GrayImage::from_pixel(5, 5, Luma([255]));
    img.put_pixel(0, 0, Luma([0]));
    let d = distance_transform_edt(&img);
    assert!((d.get(2, 2) - 8f64.sqrt()).abs() < 1e-12);
    assert!((d.get(4, 3) - 5.0).abs() < 1e-12);
    assert_eq!(d.get(0, 0), 0.0);
  }

  #[test]
  fn matches_nearest_background_search_on_cells() {
    let stages = crate::cells::process(&crate::cells::simulate_cells(0)).unwrap();
    let mask = &stages.separated;
    let background: Vec<(i64, i64)> = mask
      .enumerate_pixels()
      .filter(|(_, _, p)| p[0] == 0)
      .map(|(x, y, _)| (x as i64, y as i64))
      .collect();
    let d = distance_transform_edt(mask);
    // 抽查部分前景像素
    for (x, y, p) in mask.enumerate_pixels().step_by(997) {
      let expected = if p[0] == 0 {
        0.0
      } else {
        background
          .iter()
          .map(|&(bx, by)| (((bx - x as i64).pow(2) + (by - y as i64).pow(2)) as f64).sqrt())
          .fold(f64::INFINITY, f64::min)
      };
      assert!((d.get(x, y) - expected).abs() < 1e-9, "({}, {})", x, y);
    }
  }

  #[test]
  fn all_foreground_is_infinite() {
    let img = GrayImage::from_pixel(3, 3, Luma([255]));
    assert!(distance_transform_edt(&img).get(1, 1).is_infinite());
  }
}
