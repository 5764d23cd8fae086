// 该文件是 Dongcha （洞察） 项目的一部分。
// src/morphology/threshold.rs - 全局阈值
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
use imageproc::contrast::otsu_level;

/// Otsu 阈值，最大化前景与背景的类间方差
pub fn threshold_otsu(image: &GrayImage) -> u8 {
  otsu_level(image)
}

/// 大于 `threshold` 的像素为前景 (255)
pub fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
  GrayImage::from_fn(image.width(), image.height(), |x, y| {
    if image.get_pixel(x, y)[0] > threshold {
      Luma([255])
    } else {
      Luma([0])
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn otsu_splits_bimodal_image() {
    let img = GrayImage::from_fn(16, 4, |x, _| if x < 8 { Luma([30]) } else { Luma([220]) });
    let t = threshold_otsu(&img);
    assert!((30..220).contains(&t), "threshold = {}", t);
    let bin = binarize(&img, t);
    assert_eq!(bin.get_pixel(0, 0)[0], 0);
    assert_eq!(bin.get_pixel(15, 3)[0], 255);
  }

  #[test]
  fn binarize_is_strict() {
    let img = GrayImage::from_pixel(2, 2, Luma([100]));
    assert!(binarize(&img, 100).pixels().all(|p| p[0] == 0));
    assert!(binarize(&img, 99).pixels().all(|p| p[0] == 255));
  }
}
