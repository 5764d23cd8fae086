// 该文件是 Dongcha （洞察） 项目的一部分。
// src/cells/pipeline.rs - 细胞分割流程
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

use std::time::Instant;

use image::{GrayImage, Luma};
use tracing::{debug, info};

use crate::morphology::{
  FloatImage, Footprint, LabelImage, MorphologyError, binarize, closing, distance_transform_edt, erosion,
  label_points, max_label, opening, peak_local_max, threshold_otsu, watershed,
};

const OPENING_RADIUS: u32 = 2;
const CLOSING_RADIUS: u32 = 4;
const EROSION_RADIUS: u32 = 3;
const PEAK_MIN_DISTANCE: u32 = 20;
/// 峰值阈值相对距离图最大值的比例
const PEAK_THRESHOLD_RATIO: f64 = 0.3;

/// 分割流程每个阶段的中间结果
#[derive(Debug, Clone)]
pub struct CellStages {
  pub original: GrayImage,
  pub threshold: u8,
  pub binary: GrayImage,
  /// 开运算去噪
  pub opened: GrayImage,
  /// 闭运算填洞，同时是分水岭的掩码
  pub closed: GrayImage,
  pub eroded: GrayImage,
  pub distance: FloatImage,
  /// (x, y)
  pub peaks: Vec<(u32, u32)>,
  pub markers: LabelImage,
  pub labels: LabelImage,
  /// 标签大于 0 的像素
  pub separated: GrayImage,
}

/// 对灰度显微图像执行完整的分割流程
pub fn process(image: &GrayImage) -> Result<CellStages, MorphologyError> {
  let start = Instant::now();
  let (w, h) = image.dimensions();

  let threshold = threshold_otsu(image);
  let binary = binarize(image, threshold);
  let opened = opening(&binary, &Footprint::disk(OPENING_RADIUS));
  let closed = closing(&opened, &Footprint::disk(CLOSING_RADIUS));
  let eroded = erosion(&closed, &Footprint::disk(EROSION_RADIUS));
  debug!("Otsu 阈值 = {}", threshold);

  let distance = distance_transform_edt(&eroded);
  let peaks = peak_local_max(&distance, PEAK_MIN_DISTANCE, PEAK_THRESHOLD_RATIO * distance.max());
  let markers = label_points(w, h, &peaks);
  debug!("距离图最大值 {:.2}, 峰值 {} 个", distance.max(), peaks.len());

  let labels = watershed(&distance.negated(), &markers, Some(&closed))?;
  let separated = GrayImage::from_fn(w, h, |x, y| {
    Luma([if labels.get_pixel(x, y)[0] > 0 { 255 } else { 0 }])
  });

  info!("分割得到 {} 个区域, 耗时 {:.2?}", max_label(&labels), start.elapsed());
  Ok(CellStages {
    original: image.clone(),
    threshold,
    binary,
    opened,
    closed,
    eroded,
    distance,
    peaks,
    markers,
    labels,
    separated,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn two_cells() -> GrayImage {
    GrayImage::from_fn(120, 80, |x, y| {
      let (x, y) = (x as i32, y as i32);
      let a = (x - 30).pow(2) + (y - 40).pow(2) <= 400;
      let b = (x - 90).pow(2) + (y - 40).pow(2) <= 400;
      Luma([if a || b { 200 } else { 10 }])
    })
  }

  #[test]
  fn separates_two_clean_cells() {
    let stages = process(&two_cells()).unwrap();
    assert!((10..200).contains(&stages.threshold));
    assert_eq!(stages.peaks.len(), 2);
    assert_eq!(max_label(&stages.labels), 2);

    let left = stages.labels.get_pixel(30, 40)[0];
    let right = stages.labels.get_pixel(90, 40)[0];
    assert!(left > 0 && right > 0 && left != right);
    assert_eq!(stages.separated.get_pixel(0, 0)[0], 0);
    assert_eq!(stages.separated.get_pixel(30, 40)[0], 255);
  }

  #[test]
  fn labels_stay_inside_mask() {
    let stages = process(&two_cells()).unwrap();
    for (x, y, p) in stages.labels.enumerate_pixels() {
      if p[0] > 0 {
        assert_eq!(stages.closed.get_pixel(x, y)[0], 255);
      }
    }
  }

  #[test]
  fn blank_image_has_no_cells() {
    let stages = process(&GrayImage::new(50, 50)).unwrap();
    assert!(stages.peaks.is_empty());
    assert_eq!(max_label(&stages.labels), 0);
  }
}
