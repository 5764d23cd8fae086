// 该文件是 Dongcha （洞察） 项目的一部分。
// src/model/letterbox.rs - 等比缩放与填充预处理
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

use image::{Rgb, RgbImage, imageops::FilterType};

/// 填充区域的灰度值
pub const LETTERBOX_PAD_VALUE: u8 = 114;

/// 原图与模型输入之间的几何变换
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  /// 模型输入边长
  pub size: u32,
  /// 缩放比例
  pub gain: f32,
  /// 左侧填充
  pub pad_x: f32,
  /// 上方填充
  pub pad_y: f32,
  pub orig_width: u32,
  pub orig_height: u32,
}

impl Letterbox {
  pub fn new(orig_width: u32, orig_height: u32, size: u32) -> Self {
    let gain = (size as f32 / orig_height as f32).min(size as f32 / orig_width as f32);
    let new_w = (orig_width as f32 * gain).round();
    let new_h = (orig_height as f32 * gain).round();
    let pad_x = ((size as f32 - new_w) / 2.0 - 0.1).round().max(0.0);
    let pad_y = ((size as f32 - new_h) / 2.0 - 0.1).round().max(0.0);

    Self {
      size,
      gain,
      pad_x,
      pad_y,
      orig_width,
      orig_height,
    }
  }

  pub fn scaled_size(&self) -> (u32, u32) {
    (
      ((self.orig_width as f32 * self.gain).round() as u32).clamp(1, self.size),
      ((self.orig_height as f32 * self.gain).round() as u32).clamp(1, self.size),
    )
  }

  /// 模型输入坐标 → 原图坐标
  pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
    ((x - self.pad_x) / self.gain, (y - self.pad_y) / self.gain)
  }

  /// 原图坐标 → 模型输入坐标
  pub fn to_letterbox(&self, x: f32, y: f32) -> (f32, f32) {
    (x * self.gain + self.pad_x, y * self.gain + self.pad_y)
  }

  /// 模型输入长度 → 原图长度
  pub fn scale_length(&self, v: f32) -> f32 {
    v / self.gain
  }

  /// 把 xyxy 框映射回原图并裁剪到图像范围内
  pub fn box_to_original(&self, bbox: [f32; 4]) -> [f32; 4] {
    let (x1, y1) = self.to_original(bbox[0], bbox[1]);
    let (x2, y2) = self.to_original(bbox[2], bbox[3]);
    let w = self.orig_width as f32;
    let h = self.orig_height as f32;
    [x1.clamp(0.0, w), y1.clamp(0.0, h), x2.clamp(0.0, w), y2.clamp(0.0, h)]
  }

  /// 生成 1x3xSxS、取值 [0,1] 的 NCHW 输入张量数据
  pub fn apply(&self, image: &RgbImage) -> Vec<f32> {
    let (new_w, new_h) = self.scaled_size();
    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(self.size, self.size, Rgb([LETTERBOX_PAD_VALUE; 3]));
    image::imageops::replace(&mut canvas, &resized, self.pad_x as i64, self.pad_y as i64);

    let plane = (self.size * self.size) as usize;
    let mut data = vec![0f32; plane * 3];
    for (idx, pixel) in canvas.pixels().enumerate() {
      for c in 0..3 {
        data[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }
    data
  }
}
