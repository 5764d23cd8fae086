// 该文件是 Dongcha （洞察） 项目的一部分。
// src/output/console.rs - 控制台打印检测结果
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

use serde_json::json;
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::{DetectResult, WithLabel},
  output::Render,
};

#[derive(Error, Debug)]
pub enum ConsoleOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("未知的输出格式: {0}")]
  UnknownFormat(String),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
  #[default]
  Text,
  Json,
}

/// `console://text` 或 `console://json`
pub struct ConsoleOutput {
  format: ConsoleFormat,
}

impl FromUrlWithScheme for ConsoleOutput {
  const SCHEME: &'static str = "console";
}

impl FromUrl for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConsoleOutputError::SchemeMismatch);
    }
    let format = match url.host_str().unwrap_or("text") {
      "text" | "" => ConsoleFormat::Text,
      "json" => ConsoleFormat::Json,
      other => return Err(ConsoleOutputError::UnknownFormat(other.to_string())),
    };
    Ok(ConsoleOutput { format })
  }
}

fn fmt_boxes(boxes: &[[f32; 4]], precision: usize) -> String {
  let rows: Vec<String> = boxes
    .iter()
    .map(|b| {
      let cells: Vec<String> = b.iter().map(|v| format!("{:.*}", precision, v)).collect();
      format!("[{}]", cells.join(", "))
    })
    .collect();
  format!("[{}]", rows.join(",\n  "))
}

impl ConsoleOutput {
  pub fn format(&self) -> ConsoleFormat {
    self.format
  }

  /// 与 Python 示例相同的字段，逐行输出
  pub fn to_text<T: WithLabel>(&self, result: &DetectResult<T>) -> String {
    let confs: Vec<String> = result.conf().iter().map(|c| format!("{:.4}", c)).collect();
    let mut lines = vec![
      format!("xywh: {}", fmt_boxes(&result.xywh(), 1)),
      format!("xywhn: {}", fmt_boxes(&result.xywhn(), 4)),
      format!("xyxy: {}", fmt_boxes(&result.xyxy(), 1)),
      format!("xyxyn: {}", fmt_boxes(&result.xyxyn(), 4)),
      format!("names: {:?}", result.names()),
      format!("confs: [{}]", confs.join(", ")),
    ];
    if result.items.iter().any(|item| item.track_id.is_some()) {
      let ids: Vec<String> = result
        .ids()
        .iter()
        .map(|id| id.map_or_else(|| "-".to_string(), |id| id.to_string()))
        .collect();
      lines.push(format!("ids: [{}]", ids.join(", ")));
    }
    let xywhr = result.xywhr();
    if !xywhr.is_empty() {
      let rows: Vec<String> = xywhr
        .iter()
        .map(|r| format!("[{:.1}, {:.1}, {:.1}, {:.1}, {:.4}]", r[0], r[1], r[2], r[3], r[4]))
        .collect();
      lines.push(format!("xywhr: [{}]", rows.join(", ")));
    }
    if result.items.iter().any(|item| item.mask.is_some()) {
      let sizes: Vec<String> = result.masks_xy().iter().map(|p| p.len().to_string()).collect();
      lines.push(format!("masks.xy: [{}] 个轮廓点", sizes.join(", ")));
    }
    lines.join("\n")
  }

  pub fn to_json<T: WithLabel>(&self, frame: &RgbFrame, result: &DetectResult<T>) -> serde_json::Value {
    let items: Vec<serde_json::Value> = result
      .items
      .iter()
      .zip(result.xywh())
      .map(|(item, xywh)| {
        let mut value = json!({
          "name": item.kind.to_label_str(),
          "class": item.kind.to_label_id(),
          "conf": item.score,
          "xyxy": item.bbox,
          "xywh": xywh,
        });
        if let Some(id) = item.track_id {
          value["id"] = json!(id);
        }
        if let Some(r) = item.rotated {
          value["xywhr"] = json!(r.xywhr());
        }
        if let Some(keypoints) = item.keypoints.as_ref() {
          let kpts: Vec<[f32; 3]> = keypoints.iter().map(|k| [k.x, k.y, k.conf]).collect();
          value["keypoints"] = json!(kpts);
        }
        value
      })
      .collect();
    json!({
      "frame": frame.index,
      "timestamp_ms": frame.timestamp_ms,
      "orig_shape": [result.orig_height, result.orig_width],
      "detections": items,
    })
  }
}

impl<T: WithLabel> Render<RgbFrame, DetectResult<T>> for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn render_result(&self, frame: &RgbFrame, result: &DetectResult<T>) -> Result<(), Self::Error> {
    match self.format {
      ConsoleFormat::Text => println!("{}", self.to_text(result)),
      ConsoleFormat::Json => println!("{}", serde_json::to_string(&self.to_json(frame, result))?),
    }
    Ok(())
  }
}
