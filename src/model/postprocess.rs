// 该文件是 Dongcha （洞察） 项目的一部分。
// src/model/postprocess.rs - YOLO 输出解码与非极大值抑制
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

//! YOLOv8 / YOLO11 导出模型的输出解码。
//!
//! 所有任务的主输出形状都是 `[1, C, N]`，第 `c` 个通道第 `i` 个锚点位于
//! `data[c * N + i]`：
//!
//! | 任务    | C                 | 附加输出            |
//! |---------|-------------------|---------------------|
//! | detect  | 4 + nc            |                     |
//! | segment | 4 + nc + 32       | 原型 `[1, 32, mh, mw]` |
//! | pose    | 4 + 1 + 17 × 3    |                     |
//! | obb     | 4 + nc + 1        |                     |

use std::{f32::consts::PI, str::FromStr};

use image::{GrayImage, Luma};
use thiserror::Error;
use tracing::debug;

use super::{DetectItem, DetectResult, Keypoint, Letterbox, RotatedBox, WithLabel};

/// 分割模型掩码系数个数
pub const MASK_COEFFICIENTS: usize = 32;
/// COCO 人体关键点个数
pub const POSE_KEYPOINTS: usize = 17;

const PROBIOU_EPS: f64 = 1e-7;

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("缺少模型输出: {0}")]
  MissingOutput(&'static str),
  #[error("输出形状不匹配: {0}")]
  ShapeMismatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YoloTask {
  #[default]
  Detect,
  Segment,
  Pose,
  Obb,
}

impl FromStr for YoloTask {
  type Err = DecodeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "detect" => Ok(YoloTask::Detect),
      "segment" | "seg" => Ok(YoloTask::Segment),
      "pose" => Ok(YoloTask::Pose),
      "obb" => Ok(YoloTask::Obb),
      other => Err(DecodeError::ShapeMismatch(format!("未知的任务类型: {}", other))),
    }
  }
}

impl YoloTask {
  /// 按模型文件名后缀推断任务，例如 `yolo11n-seg.onnx`
  pub fn from_model_path(path: &str) -> Self {
    let stem = std::path::Path::new(path)
      .file_stem()
      .and_then(|s| s.to_str())
      .unwrap_or_default()
      .to_ascii_lowercase();
    if stem.ends_with("-seg") {
      YoloTask::Segment
    } else if stem.ends_with("-pose") {
      YoloTask::Pose
    } else if stem.ends_with("-obb") {
      YoloTask::Obb
    } else {
      YoloTask::Detect
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      YoloTask::Detect => "detect",
      YoloTask::Segment => "segment",
      YoloTask::Pose => "pose",
      YoloTask::Obb => "obb",
    }
  }
}

/// 推理后端给出的一个输出张量
#[derive(Debug, Clone)]
pub struct RawOutput {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

impl RawOutput {
  pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
    Self { shape, data }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeConfig {
  /// 置信度阈值
  pub conf: f32,
  /// NMS 的 IoU 阈值
  pub iou: f32,
  /// 每帧最多保留的目标数
  pub max_det: usize,
}

impl Default for DecodeConfig {
  fn default() -> Self {
    Self {
      conf: 0.25,
      iou: 0.7,
      max_det: 300,
    }
  }
}

/// 模型输入坐标系下的候选框
#[derive(Debug, Clone, Copy)]
struct Candidate {
  anchor: usize,
  class_id: u32,
  score: f32,
  /// cx, cy, w, h
  xywh: [f32; 4],
  angle: f32,
}

impl Candidate {
  fn xyxy(&self) -> [f32; 4] {
    let [cx, cy, w, h] = self.xywh;
    [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
  }

  fn rotated(&self) -> RotatedBox {
    let [cx, cy, w, h] = self.xywh;
    RotatedBox {
      cx,
      cy,
      w,
      h,
      angle: self.angle,
    }
  }
}

/// 水平框 IoU，框格式为 xyxy
pub fn iou(a: [f32; 4], b: [f32; 4]) -> f32 {
  let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
  let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
  let inter = ix * iy;
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - inter;
  if union <= 0.0 { 0.0 } else { inter / union }
}

fn covariance(r: &RotatedBox) -> (f64, f64, f64) {
  let a = (r.w as f64).powi(2) / 12.0;
  let b = (r.h as f64).powi(2) / 12.0;
  let (sin, cos) = (r.angle as f64).sin_cos();
  (
    a * cos * cos + b * sin * sin,
    a * sin * sin + b * cos * cos,
    (a - b) * cos * sin,
  )
}

/// 旋转框之间的概率 IoU（把旋转框视为二维高斯分布，基于 Bhattacharyya 距离）
pub fn probiou(r1: &RotatedBox, r2: &RotatedBox) -> f32 {
  let (x1, y1) = (r1.cx as f64, r1.cy as f64);
  let (x2, y2) = (r2.cx as f64, r2.cy as f64);
  let (a1, b1, c1) = covariance(r1);
  let (a2, b2, c2) = covariance(r2);

  let denom = (a1 + a2) * (b1 + b2) - (c1 + c2).powi(2) + PROBIOU_EPS;
  let t1 = ((a1 + a2) * (y1 - y2).powi(2) + (b1 + b2) * (x1 - x2).powi(2)) / denom * 0.25;
  let t2 = ((c1 + c2) * (x2 - x1) * (y1 - y2)) / denom * 0.5;
  let det1 = (a1 * b1 - c1 * c1).max(0.0);
  let det2 = (a2 * b2 - c2 * c2).max(0.0);
  let t3 = (((a1 + a2) * (b1 + b2) - (c1 + c2).powi(2)) / (4.0 * (det1 * det2).sqrt() + PROBIOU_EPS)
    + PROBIOU_EPS)
    .ln()
    * 0.5;

  let bd = (t1 + t2 + t3).clamp(PROBIOU_EPS, 100.0);
  let hd = (1.0 - (-bd).exp() + PROBIOU_EPS).sqrt();
  (1.0 - hd) as f32
}

/// 角度规整到 `[0, π/2)`，必要时交换宽高
fn regularize(w: f32, h: f32, angle: f32) -> (f32, f32, f32) {
  let t = angle.rem_euclid(PI);
  if t >= PI / 2.0 {
    (h, w, t - PI / 2.0)
  } else {
    (w, h, t)
  }
}

/// 按类别的非极大值抑制，返回保留的候选下标（按置信度降序）
fn non_max_suppression(candidates: &[Candidate], config: &DecodeConfig, rotated: bool) -> Vec<usize> {
  let mut order: Vec<usize> = (0..candidates.len()).collect();
  order.sort_by(|&a, &b| candidates[b].score.total_cmp(&candidates[a].score));

  let mut keep: Vec<usize> = Vec::new();
  for idx in order {
    if keep.len() >= config.max_det {
      break;
    }
    let cand = &candidates[idx];
    let suppressed = keep.iter().any(|&k| {
      let kept = &candidates[k];
      if kept.class_id != cand.class_id {
        return false;
      }
      let overlap = if rotated {
        probiou(&kept.rotated(), &cand.rotated())
      } else {
        iou(kept.xyxy(), cand.xyxy())
      };
      overlap > config.iou
    });
    if !suppressed {
      keep.push(idx);
    }
  }
  keep
}

struct PredTensor<'a> {
  data: &'a [f32],
  channels: usize,
  anchors: usize,
}

impl PredTensor<'_> {
  fn at(&self, c: usize, i: usize) -> f32 {
    self.data[c * self.anchors + i]
  }
}

fn find_prediction(outputs: &[RawOutput]) -> Result<PredTensor<'_>, DecodeError> {
  let output = outputs
    .iter()
    .find(|o| o.shape.len() == 3)
    .ok_or(DecodeError::MissingOutput("[1, C, N] 预测张量"))?;
  let (channels, anchors) = (output.shape[1], output.shape[2]);
  if output.data.len() != channels * anchors {
    return Err(DecodeError::ShapeMismatch(format!(
      "预测张量形状 {:?} 与数据长度 {} 不一致",
      output.shape,
      output.data.len()
    )));
  }
  Ok(PredTensor {
    data: &output.data,
    channels,
    anchors,
  })
}

fn collect_candidates(pred: &PredTensor, num_classes: usize, conf: f32, with_angle: bool) -> Vec<Candidate> {
  let angle_channel = pred.channels - 1;
  (0..pred.anchors)
    .filter_map(|i| {
      let (class_id, score) = (0..num_classes)
        .map(|c| (c, pred.at(4 + c, i)))
        .fold((0usize, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
      if score <= conf {
        return None;
      }
      let mut xywh = [pred.at(0, i), pred.at(1, i), pred.at(2, i), pred.at(3, i)];
      let mut angle = 0.0;
      if with_angle {
        let (w, h, t) = regularize(xywh[2], xywh[3], pred.at(angle_channel, i));
        xywh[2] = w;
        xywh[3] = h;
        angle = t;
      }
      Some(Candidate {
        anchor: i,
        class_id: class_id as u32,
        score,
        xywh,
        angle,
      })
    })
    .collect()
}

/// 解码一帧的模型输出
pub fn decode<T: WithLabel>(
  task: YoloTask,
  outputs: &[RawOutput],
  letterbox: &Letterbox,
  config: &DecodeConfig,
) -> Result<DetectResult<T>, DecodeError> {
  let pred = find_prediction(outputs)?;

  let protos = if task == YoloTask::Segment {
    Some(
      outputs
        .iter()
        .find(|o| o.shape.len() == 4)
        .ok_or(DecodeError::MissingOutput("[1, 32, mh, mw] 掩码原型"))?,
    )
  } else {
    None
  };

  let extra = match task {
    YoloTask::Detect => 0,
    YoloTask::Segment => protos.map(|p| p.shape[1]).unwrap_or(MASK_COEFFICIENTS),
    YoloTask::Pose => POSE_KEYPOINTS * 3,
    YoloTask::Obb => 1,
  };
  if pred.channels <= 4 + extra {
    return Err(DecodeError::ShapeMismatch(format!(
      "{} 任务需要超过 {} 个通道，实际 {}",
      task.as_str(),
      4 + extra,
      pred.channels
    )));
  }
  let num_classes = pred.channels - 4 - extra;
  if task == YoloTask::Pose && num_classes != 1 {
    return Err(DecodeError::ShapeMismatch(format!(
      "姿态模型应只有 1 个类别，实际 {}",
      num_classes
    )));
  }

  let candidates = collect_candidates(&pred, num_classes, config.conf, task == YoloTask::Obb);
  let keep = non_max_suppression(&candidates, config, task == YoloTask::Obb);
  debug!(
    "候选框 {} 个，NMS 后保留 {} 个",
    candidates.len(),
    keep.len()
  );

  let mut items = Vec::with_capacity(keep.len());
  for idx in keep {
    let cand = &candidates[idx];
    let kind = T::from_label_id(cand.class_id);

    let item = match task {
      YoloTask::Detect => DetectItem::new(kind, cand.score, letterbox.box_to_original(cand.xyxy())),
      YoloTask::Segment => {
        let bbox = letterbox.box_to_original(cand.xyxy());
        let coeff_start = 4 + num_classes;
        let coeffs: Vec<f32> = (coeff_start..pred.channels)
          .map(|c| pred.at(c, cand.anchor))
          .collect();
        let mut item = DetectItem::new(kind, cand.score, bbox);
        if let Some(protos) = protos {
          item.mask = Some(build_mask(&coeffs, protos, letterbox, bbox)?);
        }
        item
      }
      YoloTask::Pose => {
        let bbox = letterbox.box_to_original(cand.xyxy());
        let keypoints: Vec<Keypoint> = (0..POSE_KEYPOINTS)
          .map(|k| {
            let base = 5 + k * 3;
            let (x, y) = letterbox.to_original(pred.at(base, cand.anchor), pred.at(base + 1, cand.anchor));
            Keypoint {
              x: x.clamp(0.0, letterbox.orig_width as f32),
              y: y.clamp(0.0, letterbox.orig_height as f32),
              conf: pred.at(base + 2, cand.anchor),
            }
          })
          .collect();
        let mut item = DetectItem::new(kind, cand.score, bbox);
        item.keypoints = Some(keypoints.into_boxed_slice());
        item
      }
      YoloTask::Obb => {
        let r = cand.rotated();
        let (cx, cy) = letterbox.to_original(r.cx, r.cy);
        let rotated = RotatedBox {
          cx,
          cy,
          w: letterbox.scale_length(r.w),
          h: letterbox.scale_length(r.h),
          angle: r.angle,
        };
        let [x1, y1, x2, y2] = rotated.bounding_box();
        let (w, h) = (letterbox.orig_width as f32, letterbox.orig_height as f32);
        let bbox = [x1.clamp(0.0, w), y1.clamp(0.0, h), x2.clamp(0.0, w), y2.clamp(0.0, h)];
        let mut item = DetectItem::new(kind, cand.score, bbox);
        item.rotated = Some(rotated);
        item
      }
    };
    items.push(item);
  }

  Ok(DetectResult::new(letterbox.orig_width, letterbox.orig_height, items))
}

/// 由掩码系数与原型生成原图尺寸的二值掩码，掩码限制在检测框内
fn build_mask(
  coeffs: &[f32],
  protos: &RawOutput,
  letterbox: &Letterbox,
  bbox: [f32; 4],
) -> Result<GrayImage, DecodeError> {
  let (nm, mh, mw) = (protos.shape[1], protos.shape[2], protos.shape[3]);
  if nm != coeffs.len() || protos.data.len() != nm * mh * mw {
    return Err(DecodeError::ShapeMismatch(format!(
      "掩码原型形状 {:?} 与 {} 个系数不匹配",
      protos.shape,
      coeffs.len()
    )));
  }

  let mut mask = GrayImage::new(letterbox.orig_width, letterbox.orig_height);
  let x_start = bbox[0].floor().max(0.0) as u32;
  let y_start = bbox[1].floor().max(0.0) as u32;
  let x_end = (bbox[2].ceil() as u32).min(letterbox.orig_width);
  let y_end = (bbox[3].ceil() as u32).min(letterbox.orig_height);

  let plane = mh * mw;
  let scale_x = mw as f32 / letterbox.size as f32;
  let scale_y = mh as f32 / letterbox.size as f32;
  // 原型网格上的 logit 缓存
  let mut logits: Vec<Option<f32>> = vec![None; plane];

  for y in y_start..y_end {
    for x in x_start..x_end {
      let (lx, ly) = letterbox.to_letterbox(x as f32 + 0.5, y as f32 + 0.5);
      let px = ((lx * scale_x) as usize).min(mw - 1);
      let py = ((ly * scale_y) as usize).min(mh - 1);
      let cell = py * mw + px;
      let logit = *logits[cell].get_or_insert_with(|| {
        coeffs
          .iter()
          .enumerate()
          .map(|(k, c)| c * protos.data[k * plane + cell])
          .sum()
      });
      // sigmoid(logit) > 0.5
      if logit > 0.0 {
        mask.put_pixel(x, y, Luma([255]));
      }
    }
  }
  Ok(mask)
}
