// 该文件是 Dongcha （洞察） 项目的一部分。
// src/morphology/skeleton.rs - 骨架化
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
use tracing::trace;

/// Zhang-Suen 细化，把前景收缩为单像素宽的骨架
///
/// 非零像素视为前景，图像之外视为背景。输出为 0 / 255 二值图。
pub fn skeletonize(binary: &GrayImage) -> GrayImage {
  let (w, h) = (binary.width() as i64, binary.height() as i64);
  let mut data: Vec<bool> = binary.as_raw().iter().map(|&v| v > 0).collect();
  let at = |data: &[bool], x: i64, y: i64| x >= 0 && y >= 0 && x < w && y < h && data[(y * w + x) as usize];

  let mut iteration = 0;
  loop {
    let mut changed = false;
    for step in 0..2 {
      let mut removed = Vec::new();
      for y in 0..h {
        for x in 0..w {
          if !data[(y * w + x) as usize] {
            continue;
          }
          // P2..P9，从正上方顺时针
          let p = [
            at(&data, x, y - 1),
            at(&data, x + 1, y - 1),
            at(&data, x + 1, y),
            at(&data, x + 1, y + 1),
            at(&data, x, y + 1),
            at(&data, x - 1, y + 1),
            at(&data, x - 1, y),
            at(&data, x - 1, y - 1),
          ];
          let count = p.iter().filter(|&&v| v).count();
          if !(2..=6).contains(&count) {
            continue;
          }
          let transitions = (0..8).filter(|&i| !p[i] && p[(i + 1) % 8]).count();
          if transitions != 1 {
            continue;
          }
          let [p2, _, p4, _, p6, _, p8, _] = p;
          let keep = if step == 0 {
            (p2 && p4 && p6) || (p4 && p6 && p8)
          } else {
            (p2 && p4 && p8) || (p2 && p6 && p8)
          };
          if !keep {
            removed.push((y * w + x) as usize);
          }
        }
      }
      changed |= !removed.is_empty();
      for idx in removed {
        data[idx] = false;
      }
    }
    iteration += 1;
    if !changed {
      break;
    }
  }
  trace!("骨架化迭代 {} 次", iteration);

  GrayImage::from_fn(binary.width(), binary.height(), |x, y| {
    Luma([if data[(y as usize) * w as usize + x as usize] { 255 } else { 0 }])
  })
}
