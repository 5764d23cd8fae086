// 该文件是 Dongcha （洞察） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size},
  rect::Rect,
};

use crate::model::{DetectItem, DetectResult, Keypoint, RotatedBox, WithLabel};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const LABEL_TEXT_HORIZONTAL_PADDING: u32 = 4;
const BOX_THICKNESS: i32 = 2;
const MASK_ALPHA: f32 = 0.5;
const KEYPOINT_RADIUS: i32 = 5;
/// 低于该置信度的关键点不绘制
const KEYPOINT_CONF: f32 = 0.5;

/// 按类别循环使用的颜色
const CLASS_PALETTE: [[u8; 3]; 20] = [
  [0xFF, 0x38, 0x38],
  [0xFF, 0x9D, 0x97],
  [0xFF, 0x70, 0x1F],
  [0xFF, 0xB2, 0x1D],
  [0xCF, 0xD2, 0x31],
  [0x48, 0xF9, 0x0A],
  [0x92, 0xCC, 0x17],
  [0x3D, 0xDB, 0x86],
  [0x1A, 0x93, 0x34],
  [0x00, 0xD4, 0xBB],
  [0x2C, 0x99, 0xA8],
  [0x00, 0xC2, 0xFF],
  [0x34, 0x45, 0x93],
  [0x64, 0x73, 0xFF],
  [0x00, 0x18, 0xEC],
  [0x84, 0x38, 0xFF],
  [0x52, 0x00, 0x85],
  [0xCB, 0x38, 0xFF],
  [0xFF, 0x95, 0xC8],
  [0xFF, 0x37, 0xC7],
];

const POSE_PALETTE: [[u8; 3]; 3] = [[255, 128, 0], [51, 153, 255], [0, 255, 0]];

/// COCO 17 关键点的骨架连线，(起点, 终点, 颜色)
pub const COCO_SKELETON: [(usize, usize, usize); 19] = [
  (15, 13, 0),
  (13, 11, 0),
  (16, 14, 0),
  (14, 12, 0),
  (11, 12, 0),
  (5, 11, 1),
  (6, 12, 1),
  (5, 6, 1),
  (5, 7, 1),
  (6, 8, 1),
  (7, 9, 1),
  (8, 10, 1),
  (1, 2, 2),
  (0, 1, 2),
  (0, 2, 2),
  (1, 3, 2),
  (2, 4, 2),
  (3, 5, 2),
  (4, 6, 2),
];

/// 关键点颜色：头部、上肢、下肢
const KEYPOINT_COLOR: [usize; 17] = [2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0];

/// 内置字体
pub(crate) fn embedded_font() -> FontRef<'static> {
  let font_data = include_bytes!("../../assets/DejaVuSans.ttf");
  FontRef::try_from_slice(font_data).expect("无法加载嵌入的字体文件")
}

pub fn class_color(class_id: u32) -> [u8; 3] {
  CLASS_PALETTE[class_id as usize % CLASS_PALETTE.len()]
}

/// 标签文本，跟踪中的目标带 `id:N` 前缀
pub fn label_text<T: WithLabel>(item: &DetectItem<T>) -> String {
  match item.track_id {
    Some(id) => format!("id:{} {} {:.2}", id, item.kind.to_label_str(), item.score),
    None => format!("{} {:.2}", item.kind.to_label_str(), item.score),
  }
}

pub struct Draw<'a> {
  font_size: f32,
  label_text_vertical_padding: i32,
  font: FontRef<'a>,
}

impl Default for Draw<'static> {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      font: embedded_font(),
    }
  }
}

impl<'a> Draw<'a> {
  /// 返回标注后的新图像
  pub fn plot<T: WithLabel>(&self, image: &RgbImage, result: &DetectResult<T>) -> RgbImage {
    let mut image = image.clone();
    self.draw_detections_on_image(&mut image, result);
    image
  }

  /// 依次绘制掩码、框、关键点，最后绘制标签
  pub fn draw_detections_on_image<T: WithLabel>(&self, image: &mut RgbImage, result: &DetectResult<T>) {
    for item in result.items.iter() {
      let color = class_color(item.kind.to_label_id());
      if let Some(mask) = item.mask.as_ref()
        && mask.dimensions() == image.dimensions()
      {
        for (pixel, m) in image.pixels_mut().zip(mask.pixels()) {
          if m[0] > 0 {
            for c in 0..3 {
              pixel.0[c] = (pixel.0[c] as f32 * (1.0 - MASK_ALPHA) + color[c] as f32 * MASK_ALPHA).round() as u8;
            }
          }
        }
      }
    }

    for item in result.items.iter() {
      let color = class_color(item.kind.to_label_id());
      let anchor = match item.rotated.as_ref() {
        Some(rotated) => self.draw_rotated_box(image, rotated, color),
        None => self.draw_bbox(image, &item.bbox, color),
      };
      if let Some(keypoints) = item.keypoints.as_ref() {
        self.draw_keypoints(image, keypoints);
      }
      if let Some((x, y)) = anchor {
        self.draw_label(image, x, y, &label_text(item), color);
      }
    }
  }

  /// 绘制水平框，返回标签锚点
  fn draw_bbox(&self, image: &mut RgbImage, bbox: &[f32; 4], color: [u8; 3]) -> Option<(i32, i32)> {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (bbox[2].ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox[3].ceil() as i32).clamp(0, h - 1);
    if x_min >= x_max || y_min >= y_max {
      return None;
    }

    // 边框加粗
    for t in 0..BOX_THICKNESS {
      let (bw, bh) = (x_max - x_min - 2 * t, y_max - y_min - 2 * t);
      if bw <= 0 || bh <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(bw as u32 + 1, bh as u32 + 1);
      draw_hollow_rect_mut(image, rect, Rgb(color));
    }
    Some((x_min, y_min))
  }

  fn draw_rotated_box(&self, image: &mut RgbImage, rotated: &RotatedBox, color: [u8; 3]) -> Option<(i32, i32)> {
    let corners = rotated.corners();
    for i in 0..corners.len() {
      let (a, b) = (corners[i], corners[(i + 1) % corners.len()]);
      for t in 0..BOX_THICKNESS {
        let t = t as f32;
        draw_line_segment_mut(image, (a.0 + t, a.1), (b.0 + t, b.1), Rgb(color));
      }
    }
    // 标签放在最上方的角点
    corners
      .iter()
      .min_by(|p, q| p.1.total_cmp(&q.1))
      .map(|&(x, y)| (x.round() as i32, y.round() as i32))
  }

  fn draw_keypoints(&self, image: &mut RgbImage, keypoints: &[Keypoint]) {
    let visible = |i: usize| keypoints.get(i).filter(|k| k.conf >= KEYPOINT_CONF);
    for (a, b, c) in COCO_SKELETON {
      if let (Some(p), Some(q)) = (visible(a), visible(b)) {
        draw_line_segment_mut(image, (p.x, p.y), (q.x, q.y), Rgb(POSE_PALETTE[c]));
      }
    }
    for (i, k) in keypoints.iter().enumerate() {
      if k.conf < KEYPOINT_CONF {
        continue;
      }
      let color = POSE_PALETTE[KEYPOINT_COLOR.get(i).copied().unwrap_or(0)];
      draw_filled_circle_mut(image, (k.x.round() as i32, k.y.round() as i32), KEYPOINT_RADIUS, Rgb(color));
    }
  }

  /// 标签背景在锚点上方，空间不足时移到框内
  fn draw_label(&self, image: &mut RgbImage, x: i32, y: i32, label: &str, color: [u8; 3]) {
    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = text_size(scale, &self.font, label);
    let label_height = text_height as i32 + 2 * self.label_text_vertical_padding;

    let label_x = x.clamp(0, (image.width() as i32 - 1).max(0));
    let label_y = if y - label_height >= 0 { y - label_height } else { y.max(0) };
    let max_width = (image.width() as i32 - label_x).max(0) as u32;
    let label_width = (text_width + 2 * LABEL_TEXT_HORIZONTAL_PADDING).min(max_width);
    if label_width == 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width, label_height as u32);
    draw_filled_rect_mut(image, rect, Rgb(color));
    draw_text_mut(
      image,
      Rgb([255u8, 255u8, 255u8]),
      label_x + LABEL_TEXT_HORIZONTAL_PADDING as i32,
      label_y + self.label_text_vertical_padding,
      scale,
      &self.font,
      label,
    );
  }
}

/// 把检测结果写成文本记录，每个目标一行
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  /// 每行：类别, 置信度, 归一化 x1, y1, x2, y2[, 跟踪 id]
  pub fn lines<T: WithLabel>(&self, result: &DetectResult<T>) -> Vec<String> {
    result
      .items
      .iter()
      .zip(result.xyxyn())
      .map(|(item, b)| {
        let name = if self.label_with_name {
          item.kind.to_label_str()
        } else {
          format!("{}", item.kind.to_label_id())
        };
        let mut record = format!(
          "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
          name, item.score, b[0], b[1], b[2], b[3]
        );
        if let Some(id) = item.track_id {
          record.push_str(&format!(", {}", id));
        }
        record
      })
      .collect()
  }

  pub fn record<T: WithLabel>(&self, result: &DetectResult<T>, path: &Path) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension("txt"), self.lines(result).join("\n"))
  }
}
