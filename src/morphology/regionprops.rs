// 该文件是 Dongcha （洞察） 项目的一部分。
// src/morphology/regionprops.rs - 区域属性
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

use std::{collections::BTreeMap, f64::consts::PI};

use super::LabelImage;

/// 单个标签区域的几何属性
#[derive(Debug, Clone, PartialEq)]
pub struct RegionProps {
  pub label: u32,
  /// 像素个数
  pub area: u32,
  /// (行, 列)
  pub centroid: (f64, f64),
  /// (min_row, min_col, max_row, max_col)，max 不包含
  pub bbox: (u32, u32, u32, u32),
  pub perimeter: f64,
  /// 4π·面积 / 周长²，周长为 0 时为 0
  pub circularity: f64,
}

/// 用 4 邻域边界像素与邻居构型加权估计区域周长
///
/// `inside(x, y)` 判断像素是否属于区域，图像之外视为背景。
pub fn perimeter<F>(width: u32, height: u32, inside: F) -> f64
where
  F: Fn(i64, i64) -> bool,
{
  let (w, h) = (width as i64, height as i64);
  let at = |x: i64, y: i64| x >= 0 && y >= 0 && x < w && y < h && inside(x, y);
  // 4 邻域腐蚀后留下的边界像素
  let border = |x: i64, y: i64| {
    at(x, y) && !(at(x - 1, y) && at(x + 1, y) && at(x, y - 1) && at(x, y + 1))
  };

  let mut weights = [0f64; 50];
  for i in [5, 7, 15, 17, 25, 27] {
    weights[i] = 1.0;
  }
  for i in [21, 33] {
    weights[i] = 2f64.sqrt();
  }
  for i in [13, 23] {
    weights[i] = (1.0 + 2f64.sqrt()) / 2.0;
  }

  let mut total = 0.0;
  for y in 0..h {
    for x in 0..w {
      if !border(x, y) {
        continue;
      }
      let mut code = 1usize;
      for (dx, dy) in [(0, -1), (-1, 0), (1, 0), (0, 1)] {
        if border(x + dx, y + dy) {
          code += 2;
        }
      }
      for (dx, dy) in [(-1, -1), (1, -1), (-1, 1), (1, 1)] {
        if border(x + dx, y + dy) {
          code += 10;
        }
      }
      total += weights[code];
    }
  }
  total
}

/// 计算标签图中每个非零标签的属性，按标签升序返回
pub fn regionprops(labels: &LabelImage) -> Vec<RegionProps> {
  struct Acc {
    area: u32,
    sum_row: f64,
    sum_col: f64,
    bbox: (u32, u32, u32, u32),
  }

  let mut regions: BTreeMap<u32, Acc> = BTreeMap::new();
  for (x, y, p) in labels.enumerate_pixels() {
    let label = p[0];
    if label == 0 {
      continue;
    }
    let acc = regions.entry(label).or_insert(Acc {
      area: 0,
      sum_row: 0.0,
      sum_col: 0.0,
      bbox: (y, x, y + 1, x + 1),
    });
    acc.area += 1;
    acc.sum_row += y as f64;
    acc.sum_col += x as f64;
    acc.bbox.0 = acc.bbox.0.min(y);
    acc.bbox.1 = acc.bbox.1.min(x);
    acc.bbox.2 = acc.bbox.2.max(y + 1);
    acc.bbox.3 = acc.bbox.3.max(x + 1);
  }

  regions
    .into_iter()
    .map(|(label, acc)| {
      let (r0, c0, r1, c1) = acc.bbox;
      // 只在包围盒内计算周长
      let perimeter = perimeter(c1 - c0, r1 - r0, |x, y| {
        labels.get_pixel(c0 + x as u32, r0 + y as u32)[0] == label
      });
      let circularity = if perimeter > 0.0 {
        4.0 * PI * acc.area as f64 / (perimeter * perimeter)
      } else {
        0.0
      };
      RegionProps {
        label,
        area: acc.area,
        centroid: (
          acc.sum_row / acc.area as f64,
          acc.sum_col / acc.area as f64,
        ),
        bbox: acc.bbox,
        perimeter,
        circularity,
      }
    })
    .collect()
}
