// 该文件是 Dongcha （洞察） 项目的一部分。
// src/model.rs - 模型
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

use image::{GrayImage, RgbImage};

use crate::morphology::contour::outer_contour;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

pub trait WithLabel: Sized + Clone + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
  fn from_label_id(id: u32) -> Self;
  fn num_classes() -> usize;
}

/// 人体关键点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
  pub x: f32,
  pub y: f32,
  pub conf: f32,
}

/// 旋转框：中心、宽高与弧度制旋转角
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedBox {
  pub cx: f32,
  pub cy: f32,
  pub w: f32,
  pub h: f32,
  pub angle: f32,
}

impl RotatedBox {
  pub fn xywhr(&self) -> [f32; 5] {
    [self.cx, self.cy, self.w, self.h, self.angle]
  }

  /// 四个角点（顺时针）
  pub fn corners(&self) -> [(f32, f32); 4] {
    let (sin, cos) = self.angle.sin_cos();
    let v1 = (self.w / 2.0 * cos, self.w / 2.0 * sin);
    let v2 = (-self.h / 2.0 * sin, self.h / 2.0 * cos);
    [
      (self.cx + v1.0 + v2.0, self.cy + v1.1 + v2.1),
      (self.cx + v1.0 - v2.0, self.cy + v1.1 - v2.1),
      (self.cx - v1.0 - v2.0, self.cy - v1.1 - v2.1),
      (self.cx - v1.0 + v2.0, self.cy - v1.1 + v2.1),
    ]
  }

  /// 外接水平框 [x_min, y_min, x_max, y_max]
  pub fn bounding_box(&self) -> [f32; 4] {
    let corners = self.corners();
    let mut b = [f32::MAX, f32::MAX, f32::MIN, f32::MIN];
    for (x, y) in corners {
      b[0] = b[0].min(x);
      b[1] = b[1].min(y);
      b[2] = b[2].max(x);
      b[3] = b[3].max(y);
    }
    b
  }
}

#[derive(Debug, Clone)]
pub struct DetectItem<T> {
  pub kind: T,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，原图像素坐标
  pub track_id: Option<u64>,
  /// 与原图同尺寸的二值掩码（0/255）
  pub mask: Option<GrayImage>,
  pub keypoints: Option<Box<[Keypoint]>>,
  pub rotated: Option<RotatedBox>,
}

impl<T> DetectItem<T> {
  pub fn new(kind: T, score: f32, bbox: [f32; 4]) -> Self {
    Self {
      kind,
      score,
      bbox,
      track_id: None,
      mask: None,
      keypoints: None,
      rotated: None,
    }
  }
}

#[derive(Debug, Clone)]
pub struct DetectResult<T> {
  pub orig_width: u32,
  pub orig_height: u32,
  pub items: Box<[DetectItem<T>]>,
}

impl<T: WithLabel> DetectResult<T> {
  pub fn new(orig_width: u32, orig_height: u32, items: Vec<DetectItem<T>>) -> Self {
    Self {
      orig_width,
      orig_height,
      items: items.into_boxed_slice(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn xyxy(&self) -> Vec<[f32; 4]> {
    self.items.iter().map(|item| item.bbox).collect()
  }

  /// 中心点 x, 中心点 y, 宽, 高
  pub fn xywh(&self) -> Vec<[f32; 4]> {
    self
      .items
      .iter()
      .map(|item| {
        let [x1, y1, x2, y2] = item.bbox;
        [(x1 + x2) / 2.0, (y1 + y2) / 2.0, x2 - x1, y2 - y1]
      })
      .collect()
  }

  pub fn xyxyn(&self) -> Vec<[f32; 4]> {
    let (w, h) = (self.orig_width as f32, self.orig_height as f32);
    self
      .xyxy()
      .into_iter()
      .map(|b| [b[0] / w, b[1] / h, b[2] / w, b[3] / h])
      .collect()
  }

  pub fn xywhn(&self) -> Vec<[f32; 4]> {
    let (w, h) = (self.orig_width as f32, self.orig_height as f32);
    self
      .xywh()
      .into_iter()
      .map(|b| [b[0] / w, b[1] / h, b[2] / w, b[3] / h])
      .collect()
  }

  pub fn conf(&self) -> Vec<f32> {
    self.items.iter().map(|item| item.score).collect()
  }

  pub fn cls(&self) -> Vec<u32> {
    self.items.iter().map(|item| item.kind.to_label_id()).collect()
  }

  pub fn names(&self) -> Vec<String> {
    self.items.iter().map(|item| item.kind.to_label_str()).collect()
  }

  pub fn ids(&self) -> Vec<Option<u64>> {
    self.items.iter().map(|item| item.track_id).collect()
  }

  /// 掩码轮廓（像素坐标），没有掩码的目标对应空多边形
  pub fn masks_xy(&self) -> Vec<Vec<(f32, f32)>> {
    self
      .items
      .iter()
      .map(|item| {
        item
          .mask
          .as_ref()
          .map(|mask| {
            outer_contour(mask)
              .into_iter()
              .map(|(x, y)| (x as f32, y as f32))
              .collect()
          })
          .unwrap_or_default()
      })
      .collect()
  }

  /// 归一化的掩码轮廓
  pub fn masks_xyn(&self) -> Vec<Vec<(f32, f32)>> {
    let (w, h) = (self.orig_width as f32, self.orig_height as f32);
    self
      .masks_xy()
      .into_iter()
      .map(|poly| poly.into_iter().map(|(x, y)| (x / w, y / h)).collect())
      .collect()
  }

  pub fn xywhr(&self) -> Vec<[f32; 5]> {
    self
      .items
      .iter()
      .filter_map(|item| item.rotated.map(|r| r.xywhr()))
      .collect()
  }

  pub fn xyxyxyxy(&self) -> Vec<[(f32, f32); 4]> {
    self
      .items
      .iter()
      .filter_map(|item| item.rotated.map(|r| r.corners()))
      .collect()
  }

  /// 把指定类别、置信度不低于 `min_score` 的目标掩码区域涂黑，返回处理的目标数量
  pub fn redact(&self, image: &mut RgbImage, class_id: u32, min_score: f32) -> usize {
    let mut count = 0;
    for item in self.items.iter() {
      if item.kind.to_label_id() != class_id || item.score < min_score {
        continue;
      }
      let Some(mask) = item.mask.as_ref() else {
        continue;
      };
      if mask.dimensions() != image.dimensions() {
        continue;
      }
      for (pixel, m) in image.pixels_mut().zip(mask.pixels()) {
        if m[0] > 0 {
          pixel.0 = [0, 0, 0];
        }
      }
      count += 1;
    }
    count
  }
}

mod labels;
mod letterbox;
pub mod postprocess;
#[cfg(feature = "model_onnx")]
mod yolo;

pub use self::labels::{COCO_CLASSES, CocoLabel, DOTA_CLASSES, DotaLabel};
pub use self::letterbox::{LETTERBOX_PAD_VALUE, Letterbox};
pub use self::postprocess::{DecodeConfig, RawOutput, YoloTask};
#[cfg(feature = "model_onnx")]
pub use self::yolo::{Yolo, YoloBuilder, YoloError};

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Luma, Rgb};

  fn sample() -> DetectResult<CocoLabel> {
    DetectResult::new(
      200,
      100,
      vec![
        DetectItem::new(CocoLabel(0), 0.9, [10.0, 20.0, 50.0, 80.0]),
        DetectItem::new(CocoLabel(5), 0.4, [100.0, 0.0, 200.0, 100.0]),
      ],
    )
  }

  #[test]
  fn box_formats() {
    let r = sample();
    assert_eq!(r.xywh()[0], [30.0, 50.0, 40.0, 60.0]);
    assert_eq!(r.xyxyn()[1], [0.5, 0.0, 1.0, 1.0]);
    assert_eq!(r.xywhn()[1], [0.75, 0.5, 0.5, 1.0]);
    assert_eq!(r.names(), vec!["person", "bus"]);
    assert_eq!(r.cls(), vec![0, 5]);
    assert_eq!(r.ids(), vec![None, None]);
  }

  #[test]
  fn rotated_box_corners() {
    let r = RotatedBox {
      cx: 10.0,
      cy: 10.0,
      w: 4.0,
      h: 2.0,
      angle: 0.0,
    };
    let c = r.corners();
    assert_eq!(c[0], (12.0, 11.0));
    assert_eq!(c[2], (8.0, 9.0));
    assert_eq!(r.bounding_box(), [8.0, 9.0, 12.0, 11.0]);

    let rotated = RotatedBox {
      angle: std::f32::consts::FRAC_PI_2,
      ..r
    };
    let b = rotated.bounding_box();
    assert!((b[2] - b[0] - 2.0).abs() < 1e-4);
    assert!((b[3] - b[1] - 4.0).abs() < 1e-4);
  }

  #[test]
  fn redact_only_confident_persons() {
    let mut r = sample();
    let mut person_mask = GrayImage::new(200, 100);
    person_mask.put_pixel(15, 25, Luma([255]));
    let mut bus_mask = GrayImage::new(200, 100);
    bus_mask.put_pixel(150, 50, Luma([255]));
    let mut items = r.items.into_vec();
    items[0].mask = Some(person_mask);
    items[1].mask = Some(bus_mask);
    r.items = items.into_boxed_slice();

    let mut image = RgbImage::from_pixel(200, 100, Rgb([200, 200, 200]));
    let n = r.redact(&mut image, 0, 0.8);
    assert_eq!(n, 1);
    assert_eq!(image.get_pixel(15, 25).0, [0, 0, 0]);
    assert_eq!(image.get_pixel(150, 50).0, [200, 200, 200]);
    assert_eq!(image.get_pixel(16, 25).0, [200, 200, 200]);
  }
}
