// 该文件是 Dongcha （洞察） 项目的一部分。
// src/morphology/ops.rs - 腐蚀、膨胀及其组合
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
use imageproc::morphology::{grayscale_dilate, grayscale_erode};

use super::{Footprint, saturating_sub};

/// 灰度腐蚀：邻域最小值，图像外的邻居不参与计算
pub fn erosion(image: &GrayImage, footprint: &Footprint) -> GrayImage {
  grayscale_erode(image, &footprint.to_mask())
}

/// 灰度膨胀：反射结构元素下的邻域最大值
pub fn dilation(image: &GrayImage, footprint: &Footprint) -> GrayImage {
  grayscale_dilate(image, &footprint.reflected().to_mask())
}

/// 开运算：先腐蚀后膨胀，去除小于结构元素的亮噪点
pub fn opening(image: &GrayImage, footprint: &Footprint) -> GrayImage {
  dilation(&erosion(image, footprint), footprint)
}

/// 闭运算：先膨胀后腐蚀，填补小于结构元素的暗孔洞
pub fn closing(image: &GrayImage, footprint: &Footprint) -> GrayImage {
  erosion(&dilation(image, footprint), footprint)
}

/// 白顶帽：原图减去开运算，保留小的亮细节
pub fn white_tophat(image: &GrayImage, footprint: &Footprint) -> GrayImage {
  saturating_sub(image, &opening(image, footprint))
}

/// 黑顶帽：闭运算减去原图，保留小的暗细节
pub fn black_tophat(image: &GrayImage, footprint: &Footprint) -> GrayImage {
  saturating_sub(&closing(image, footprint), image)
}

/// 形态学梯度：膨胀减去腐蚀，得到目标边缘
pub fn gradient(image: &GrayImage, footprint: &Footprint) -> GrayImage {
  saturating_sub(&dilation(image, footprint), &erosion(image, footprint))
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Luma;

  fn square_image(size: u32, x0: u32, y0: u32, side: u32, value: u8) -> GrayImage {
    GrayImage::from_fn(size, size, |x, y| {
      if x >= x0 && x < x0 + side && y >= y0 && y < y0 + side {
        Luma([value])
      } else {
        Luma([0])
      }
    })
  }

  fn count_on(image: &GrayImage) -> usize {
    image.pixels().filter(|p| p[0] > 0).count()
  }

  #[test]
  fn erosion_and_dilation_of_square() {
    let img = square_image(20, 5, 5, 6, 255);
    let fp = Footprint::square(3);
    assert_eq!(count_on(&erosion(&img, &fp)), 16);
    assert_eq!(count_on(&dilation(&img, &fp)), 64);
  }

  #[test]
  fn opening_removes_salt_noise() {
    let mut img = square_image(30, 5, 5, 12, 255);
    img.put_pixel(25, 25, Luma([255]));
    let opened = opening(&img, &Footprint::disk(2));
    assert_eq!(opened.get_pixel(25, 25)[0], 0);
    assert_eq!(opened.get_pixel(10, 10)[0], 255);
  }

  #[test]
  fn closing_fills_small_hole() {
    let mut img = square_image(30, 5, 5, 15, 255);
    img.put_pixel(12, 12, Luma([0]));
    let closed = closing(&img, &Footprint::disk(1));
    assert_eq!(closed.get_pixel(12, 12)[0], 255);
    assert_eq!(closed.get_pixel(0, 0)[0], 0);
  }

  /// 逐像素按定义计算邻域极值
  fn brute_force(image: &GrayImage, offsets: &[(i32, i32)], take_max: bool) -> GrayImage {
    let (w, h) = (image.width() as i32, image.height() as i32);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
      let values = offsets.iter().filter_map(|&(dx, dy)| {
        let (nx, ny) = (x as i32 + dx, y as i32 + dy);
        (nx >= 0 && ny >= 0 && nx < w && ny < h).then(|| image.get_pixel(nx as u32, ny as u32)[0])
      });
      Luma([if take_max { values.max().unwrap_or(0) } else { values.min().unwrap_or(255) }])
    })
  }

  #[test]
  fn matches_neighbourhood_definition_on_cell_slide() {
    let slide = image::imageops::crop_imm(&crate::cells::simulate_cells(0), 100, 100, 200, 200).to_image();
    for r in [2, 3, 4, 10] {
      let fp = Footprint::disk(r);
      assert_eq!(erosion(&slide, &fp), brute_force(&slide, fp.offsets(), false), "disk({})", r);
      assert_eq!(dilation(&slide, &fp), brute_force(&slide, fp.offsets(), true), "disk({})", r);
    }
  }

  #[test]
  fn dilation_reflects_asymmetric_footprint() {
    let mut img = GrayImage::new(6, 6);
    img.put_pixel(2, 2, Luma([255]));
    // square(2) 覆盖 (0,0)..=(1,1)
    let fp = Footprint::square(2);
    let dilated = dilation(&img, &fp);
    assert_eq!(dilated, brute_force(&img, fp.reflected().offsets(), true));
    assert_eq!(dilated.get_pixel(3, 3)[0], 255);
    assert_eq!(dilated.get_pixel(1, 1)[0], 0);
    let eroded = erosion(&dilated, &fp);
    assert_eq!(eroded.get_pixel(2, 2)[0], 255);
    assert_eq!(eroded.get_pixel(3, 3)[0], 0);
  }

  #[test]
  fn border_pixels_ignore_outside() {
    let img = GrayImage::from_pixel(4, 4, Luma([200]));
    assert_eq!(erosion(&img, &Footprint::disk(1)), img);
  }

  #[test]
  fn tophats_and_gradient() {
    let mut img = GrayImage::from_pixel(20, 20, Luma([100]));
    img.put_pixel(10, 10, Luma([180]));
    img.put_pixel(4, 4, Luma([20]));
    let fp = Footprint::disk(2);
    let white = white_tophat(&img, &fp);
    assert_eq!(white.get_pixel(10, 10)[0], 80);
    assert_eq!(white.get_pixel(4, 4)[0], 0);
    let black = black_tophat(&img, &fp);
    assert_eq!(black.get_pixel(4, 4)[0], 80);
    assert_eq!(black.get_pixel(10, 10)[0], 0);

    let sq = square_image(20, 5, 5, 8, 255);
    let grad = gradient(&sq, &Footprint::cross());
    assert_eq!(grad.get_pixel(8, 8)[0], 0);
    assert_eq!(grad.get_pixel(5, 8)[0], 255);
    assert_eq!(grad.get_pixel(4, 8)[0], 255);
    assert_eq!(grad.get_pixel(1, 1)[0], 0);
  }
}
