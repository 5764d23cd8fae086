// 该文件是 Dongcha （洞察） 项目的一部分。
// src/output/directory_record.rs - 按日期目录记录每一帧
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

use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicU16, Ordering},
};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::{DetectResult, WithLabel},
  output::{
    Render,
    draw::{Draw, Record},
  },
  url_file_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 画框保存，或保存原图加文本记录
pub enum DrawWrapper {
  Draw(Box<Draw<'static>>),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result<T: WithLabel>(
    &self,
    path: &Path,
    frame: &RgbFrame,
    result: &DetectResult<T>,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.plot(frame.image(), result).save(path)?;
      }
      DrawWrapper::Record(record) => {
        frame.image().save(path)?;
        record.record(result, path)?;
      }
    };
    Ok(())
  }

  pub fn with(kind: &str) -> Self {
    match kind {
      "record-name" => DrawWrapper::Record(Record { label_with_name: true }),
      "record-id" => DrawWrapper::Record(Record { label_with_name: false }),
      _ => DrawWrapper::Draw(Box::new(Draw::default())),
    }
  }
}

/// `folder:///dir?record=name|id&always`
///
/// 文件路径为 `dir/YYYY/MM/DD/HH-MM-SS-XXXX.png`，`XXXX` 是十六进制帧计数。
/// 没有检测结果的帧默认跳过，带 `always` 时全部保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = match uri.query_pairs().find(|(k, _)| k == "record") {
      Some((_, v)) if v == "id" => "record-id",
      Some(_) => "record-name",
      None => "draw",
    };
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(url_file_path(uri)),
      draw: DrawWrapper::with(kind),
      frame_counter: AtomicU16::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!("{}-{:04X}.png", now.format("%H-%M-%S"), self.frame_id())))
  }
}

impl<T: WithLabel> Render<RgbFrame, DetectResult<T>> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbFrame, result: &DetectResult<T>) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("第 {} 帧没有检测结果，跳过", frame.index);
      return Ok(());
    }
    let path = self.frame_path()?;
    self.draw.save_result(&path, frame, result)?;
    debug!("第 {} 帧保存到 {}", frame.index, path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{CocoLabel, DetectItem};
  use image::RgbImage;

  fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
      let path = entry.unwrap().path();
      if path.is_dir() {
        found.extend(files_with_extension(&path, ext));
      } else if path.extension().is_some_and(|e| e == ext) {
        found.push(path);
      }
    }
    found
  }

  fn output(dir: &Path, query: &str) -> DirectoryRecordOutput {
    let url = url::Url::parse(&format!("folder://{}{}", dir.display(), query)).unwrap();
    DirectoryRecordOutput::from_url(&url).unwrap()
  }

  fn detections() -> DetectResult<CocoLabel> {
    let item = DetectItem::new(CocoLabel::from_label_id(2), 0.75, [1.0, 1.0, 5.0, 5.0]);
    DetectResult::new(16, 16, vec![item])
  }

  #[test]
  fn skips_empty_frames_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let frame = RgbFrame::from(RgbImage::new(16, 16));
    let empty = DetectResult::<CocoLabel>::new(16, 16, vec![]);

    output(dir.path(), "").render_result(&frame, &empty).unwrap();
    assert!(files_with_extension(dir.path(), "png").is_empty());

    output(dir.path(), "?always").render_result(&frame, &empty).unwrap();
    assert_eq!(files_with_extension(dir.path(), "png").len(), 1);
  }

  #[test]
  fn record_mode_writes_text() {
    let dir = tempfile::tempdir().unwrap();
    let frame = RgbFrame::from(RgbImage::new(16, 16));
    let out = output(dir.path(), "?record=name");
    out.render_result(&frame, &detections()).unwrap();
    out.render_result(&frame, &detections()).unwrap();

    let texts = files_with_extension(dir.path(), "txt");
    assert_eq!(texts.len(), 2);
    let content = std::fs::read_to_string(&texts[0]).unwrap();
    assert!(content.starts_with("car, 0.7500"));
    // 原图不画框
    let png = &files_with_extension(dir.path(), "png")[0];
    let saved = image::open(png).unwrap().to_rgb8();
    assert!(saved.pixels().all(|p| p.0 == [0, 0, 0]));
  }

  #[test]
  fn frame_path_layout() {
    let dir = tempfile::tempdir().unwrap();
    let out = output(dir.path(), "?record=id");
    let path = out.frame_path().unwrap();
    let relative = path.strip_prefix(dir.path()).unwrap();
    let parts: Vec<_> = relative.iter().map(|p| p.to_string_lossy().into_owned()).collect();
    assert_eq!(parts.len(), 4);
    assert_eq!(parts[0].len(), 4);
    assert_eq!(parts[1].len(), 2);
    assert!(parts[3].ends_with("-0001.png"));
  }
}
