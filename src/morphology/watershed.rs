// 该文件是 Dongcha （洞察） 项目的一部分。
// src/morphology/watershed.rs - 标记控制的分水岭
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

use std::{cmp::Ordering, collections::BinaryHeap};

use image::{GrayImage, Luma};
use tracing::debug;

use super::{FloatImage, LabelImage, MorphologyError, check_dimensions};

const NEIGHBORS_4: [(i64, i64); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];

/// 优先队列元素：高程低者先出，相同高程按入队顺序
#[derive(Debug, Clone, Copy)]
struct FloodItem {
  elevation: f64,
  age: u64,
  index: usize,
}

impl PartialEq for FloodItem {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for FloodItem {}

impl PartialOrd for FloodItem {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for FloodItem {
  fn cmp(&self, other: &Self) -> Ordering {
    // BinaryHeap 是大顶堆，反转比较
    other
      .elevation
      .total_cmp(&self.elevation)
      .then_with(|| other.age.cmp(&self.age))
  }
}

/// 从标记出发按高程从低到高淹没图像
///
/// - `markers` 中大于 0 的像素是种子，标签会传播到 4 邻域；
/// - `mask` 为 0 的像素不参与淹没，结果中为 0；
/// - 与任何种子都不连通的掩码内像素保持为 0。
pub fn watershed(
  elevation: &FloatImage,
  markers: &LabelImage,
  mask: Option<&GrayImage>,
) -> Result<LabelImage, MorphologyError> {
  let dims = elevation.dimensions();
  check_dimensions(dims, markers.dimensions())?;
  if let Some(mask) = mask {
    check_dimensions(dims, mask.dimensions())?;
  }

  let (w, h) = (dims.0 as i64, dims.1 as i64);
  let inside = |idx: usize| mask.is_none_or(|m| m.as_raw()[idx] > 0);
  let values = elevation.as_slice();

  let mut output = vec![0u32; values.len()];
  let mut heap = BinaryHeap::new();
  let mut age = 0u64;

  for (idx, &label) in markers.as_raw().iter().enumerate() {
    if label > 0 && inside(idx) {
      output[idx] = label;
      heap.push(FloodItem {
        elevation: values[idx],
        age,
        index: idx,
      });
      age += 1;
    }
  }
  debug!("分水岭种子像素 {} 个", heap.len());

  while let Some(item) = heap.pop() {
    let label = output[item.index];
    let (x, y) = ((item.index as i64) % w, (item.index as i64) / w);
    for (dx, dy) in NEIGHBORS_4 {
      let (nx, ny) = (x + dx, y + dy);
      if nx < 0 || ny < 0 || nx >= w || ny >= h {
        continue;
      }
      let n = (ny * w + nx) as usize;
      if output[n] != 0 || !inside(n) {
        continue;
      }
      output[n] = label;
      heap.push(FloodItem {
        elevation: values[n],
        age,
        index: n,
      });
      age += 1;
    }
  }

  Ok(LabelImage::from_fn(dims.0, dims.1, |x, y| {
    Luma([output[(y as usize) * dims.0 as usize + x as usize]])
  }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::morphology::{distance_transform_edt, label_points};

  /// 两个相交的圆
  fn two_discs() -> GrayImage {
    GrayImage::from_fn(60, 40, |x, y| {
      let (x, y) = (x as i32, y as i32);
      let a = (x - 20).pow(2) + (y - 20).pow(2) <= 12 * 12;
      let b = (x - 38).pow(2) + (y - 20).pow(2) <= 12 * 12;
      if a || b { Luma([255]) } else { Luma([0]) }
    })
  }

  #[test]
  fn separates_touching_discs() {
    let mask = two_discs();
    let distance = distance_transform_edt(&mask);
    let markers = label_points(60, 40, &[(20, 20), (38, 20)]);
    let labels = watershed(&distance.negated(), &markers, Some(&mask)).unwrap();

    assert_eq!(labels.get_pixel(12, 20)[0], 1);
    assert_eq!(labels.get_pixel(46, 20)[0], 2);
    assert_eq!(labels.get_pixel(0, 0)[0], 0);
    // 分界线在两圆心中间附近
    assert_eq!(labels.get_pixel(27, 20)[0], 1);
    assert_eq!(labels.get_pixel(31, 20)[0], 2);
    // 掩码内的像素全部被标记
    for (x, y, p) in mask.enumerate_pixels() {
      assert_eq!(p[0] > 0, labels.get_pixel(x, y)[0] > 0, "({}, {})", x, y);
    }
  }

  #[test]
  fn unreachable_region_stays_unlabelled() {
    let mut mask = GrayImage::new(10, 1);
    for x in [0, 1, 2, 6, 7] {
      mask.put_pixel(x, 0, Luma([255]));
    }
    let markers = label_points(10, 1, &[(0, 0)]);
    let labels = watershed(&FloatImage::new(10, 1), &markers, Some(&mask)).unwrap();
    assert_eq!(labels.get_pixel(2, 0)[0], 1);
    assert_eq!(labels.get_pixel(6, 0)[0], 0);
  }

  #[test]
  fn rejects_mismatched_sizes() {
    let markers = label_points(5, 5, &[(1, 1)]);
    let err = watershed(&FloatImage::new(4, 5), &markers, None).unwrap_err();
    assert_eq!(
      err,
      MorphologyError::DimensionMismatch {
        expected: (4, 5),
        actual: (5, 5)
      }
    );
  }
}
