// 该文件是 Dongcha （洞察） 项目的一部分。
// src/cells/panel.rs - 分析结果拼图
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

use ab_glyph::PxScale;
use image::{GrayImage, Rgb, RgbImage, imageops};
use imageproc::drawing::draw_text_mut;

use super::{Applications, CellAnalysis, CellStages};
use crate::{
  morphology::{FloatImage, LabelImage},
  output::draw::embedded_font,
};

const MARGIN: u32 = 10;
const HEADER_HEIGHT: u32 = 40;
const TITLE_HEIGHT: u32 = 28;
const HEADER_FONT_SIZE: f32 = 24.0;
const TITLE_FONT_SIZE: f32 = 18.0;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// 20 色定性调色板，用于标签图
const TAB20: [[u8; 3]; 20] = [
  [31, 119, 180],
  [174, 199, 232],
  [255, 127, 14],
  [255, 187, 120],
  [44, 160, 44],
  [152, 223, 138],
  [214, 39, 40],
  [255, 152, 150],
  [148, 103, 189],
  [197, 176, 213],
  [140, 86, 75],
  [196, 156, 148],
  [227, 119, 194],
  [247, 182, 210],
  [127, 127, 127],
  [199, 199, 199],
  [188, 189, 34],
  [219, 219, 141],
  [23, 190, 207],
  [158, 218, 229],
];

/// 灰度图线性拉伸后转为 RGB
fn gray_tile(image: &GrayImage) -> RgbImage {
  let stretched = FloatImage::from(image).to_gray_normalized();
  RgbImage::from_fn(image.width(), image.height(), |x, y| {
    let v = stretched.get_pixel(x, y)[0];
    Rgb([v, v, v])
  })
}

/// 背景为黑色，标签按调色板循环着色
fn label_tile(labels: &LabelImage) -> RgbImage {
  RgbImage::from_fn(labels.width(), labels.height(), |x, y| match labels.get_pixel(x, y)[0] {
    0 => Rgb([0, 0, 0]),
    l => Rgb(TAB20[((l - 1) % TAB20.len() as u32) as usize]),
  })
}

/// 把九个阶段拼成带标题的 3x3 图像
pub fn render_panel(
  stages: &CellStages,
  analysis: &CellAnalysis,
  edges: &GrayImage,
  applications: &Applications,
) -> RgbImage {
  let tiles: [(String, RgbImage); 9] = [
    ("1. Original".into(), gray_tile(&stages.original)),
    ("2. Opening (noise removed)".into(), gray_tile(&stages.opened)),
    ("3. Closing (holes filled)".into(), gray_tile(&stages.closed)),
    ("4. Separated (watershed)".into(), gray_tile(&stages.separated)),
    (
      format!("5. Labelled ({} cells)", analysis.count()),
      label_tile(&stages.labels),
    ),
    ("6. Edges (gradient)".into(), gray_tile(edges)),
    ("7. White top-hat".into(), gray_tile(&applications.white_tophat)),
    ("8. Black top-hat".into(), gray_tile(&applications.black_tophat)),
    ("9. Skeleton".into(), gray_tile(&applications.skeleton)),
  ];

  let (tw, th) = stages.original.dimensions();
  let width = 3 * tw + 4 * MARGIN;
  let height = HEADER_HEIGHT + 3 * (TITLE_HEIGHT + th + MARGIN);
  let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
  let font = embedded_font();

  draw_text_mut(
    &mut canvas,
    TEXT_COLOR,
    MARGIN as i32,
    (MARGIN / 2) as i32,
    PxScale::from(HEADER_FONT_SIZE),
    &font,
    "Morphological operations in medical image analysis",
  );

  for (i, (title, tile)) in tiles.iter().enumerate() {
    let (col, row) = (i as u32 % 3, i as u32 / 3);
    let x = MARGIN + col * (tw + MARGIN);
    let y = HEADER_HEIGHT + row * (TITLE_HEIGHT + th + MARGIN);
    draw_text_mut(
      &mut canvas,
      TEXT_COLOR,
      x as i32,
      y as i32 + 4,
      PxScale::from(TITLE_FONT_SIZE),
      &font,
      title,
    );
    imageops::replace(&mut canvas, tile, x as i64, (y + TITLE_HEIGHT) as i64);
  }

  canvas
}
