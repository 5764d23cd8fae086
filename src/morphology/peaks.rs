// 该文件是 Dongcha （洞察） 项目的一部分。
// src/morphology/peaks.rs - 局部极大值
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

use super::FloatImage;

/// 查找局部极大值，返回 (x, y) 坐标，按强度降序排列
///
/// 候选点需要同时满足：
/// - 是 `(2 * min_distance + 1)²` 窗口内的最大值；
/// - 严格大于 `threshold_abs`；
/// - 与图像边缘的距离不小于 `min_distance`。
///
/// 之后从最强的点开始，丢弃与已接受点切比雪夫距离小于 `min_distance` 的点。
pub fn peak_local_max(image: &FloatImage, min_distance: u32, threshold_abs: f64) -> Vec<(u32, u32)> {
  let (w, h) = (image.width() as i64, image.height() as i64);
  let md = min_distance as i64;
  let mut candidates: Vec<(u32, u32, f64)> = Vec::new();

  for y in md..(h - md) {
    for x in md..(w - md) {
      let v = image.get(x as u32, y as u32);
      if v <= threshold_abs {
        continue;
      }
      let mut is_max = true;
      'window: for ny in (y - md).max(0)..=(y + md).min(h - 1) {
        for nx in (x - md).max(0)..=(x + md).min(w - 1) {
          if image.get(nx as u32, ny as u32) > v {
            is_max = false;
            break 'window;
          }
        }
      }
      if is_max {
        candidates.push((x as u32, y as u32, v));
      }
    }
  }

  // 稳定排序，强度相同时保持行优先顺序
  candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

  let mut accepted: Vec<(u32, u32)> = Vec::new();
  for (x, y, _) in candidates {
    let too_close = accepted.iter().any(|&(ax, ay)| {
      let dx = (ax as i64 - x as i64).abs();
      let dy = (ay as i64 - y as i64).abs();
      dx.max(dy) < md
    });
    if !too_close {
      accepted.push((x, y));
    }
  }
  accepted
}
