// 该文件是 Dongcha （洞察） 项目的一部分。
// src/cells/synth.rs - 合成显微细胞图像
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
use imageproc::drawing::draw_filled_circle_mut;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;
use tracing::debug;

pub const IMAGE_SIZE: u32 = 400;

/// 细胞 (x, y, 半径)
pub const CELLS: [(i32, i32, i32); 7] = [
  (100, 100, 30),
  (200, 150, 25),
  (320, 80, 35),
  (150, 250, 28),
  (300, 280, 32),
  (80, 320, 22),
  (250, 300, 26),
];

/// 互相接触的一对细胞
pub const TOUCHING_CELLS: [(i32, i32, i32); 2] = [(160, 180, 25), (180, 190, 23)];

const CELL_VALUE: u8 = 255;
const NUCLEUS_VALUE: u8 = 128;
const NOISE_SIGMA: f64 = 15.0;
const SALT_PIXELS: usize = 50;
const HOLE_RADIUS: i32 = 3;
/// 前几个细胞带空洞
const CELLS_WITH_HOLES: usize = 3;

/// 生成 400x400 的合成细胞图像，同一个种子得到同一幅图
pub fn simulate_cells(seed: u64) -> GrayImage {
  let mut rng = StdRng::seed_from_u64(seed);
  let mut img = GrayImage::new(IMAGE_SIZE, IMAGE_SIZE);

  for (x, y, r) in CELLS.into_iter().chain(TOUCHING_CELLS) {
    draw_filled_circle_mut(&mut img, (x, y), r, Luma([CELL_VALUE]));
  }
  for (x, y, r) in CELLS {
    draw_filled_circle_mut(&mut img, (x + 5, y - 3), r / 3, Luma([NUCLEUS_VALUE]));
  }

  // 高斯噪声，截断为整数后再裁剪到 0..=255
  for p in img.pixels_mut() {
    let noise: f64 = rng.sample(StandardNormal);
    let noise = (noise * NOISE_SIGMA) as i32;
    p[0] = (p[0] as i32 + noise).clamp(0, 255) as u8;
  }

  for _ in 0..SALT_PIXELS {
    let x = rng.gen_range(0..IMAGE_SIZE);
    let y = rng.gen_range(0..IMAGE_SIZE);
    img.put_pixel(x, y, Luma([255]));
  }

  for (x, y, _) in CELLS.into_iter().take(CELLS_WITH_HOLES) {
    draw_filled_circle_mut(&mut img, (x - 8, y + 5), HOLE_RADIUS, Luma([0]));
  }

  debug!("生成合成细胞图像, seed = {}", seed);
  img
}
