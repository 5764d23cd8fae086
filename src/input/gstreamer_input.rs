// 该文件是 Dongcha （洞察） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 输入
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

//! # GStreamer 视频输入模块
//!
//! 基于 GStreamer 读取视频文件或摄像头，输出 RGB 帧：
//!
//! - `gst://file/path/to/people.mp4` 读取视频文件（相对路径以当前目录为准）
//! - `gst://camera/dev/video0?width=640&height=480&fps=30` 读取摄像头
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## Cargo 特性
//!
//! ```toml
//! [dependencies]
//! dongcha = { version = "0.1", features = ["gstreamer_input"] }
//! ```

use std::collections::HashMap;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame, url_file_path};

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://"）
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  /// 未知的输入类型（只支持 file 与 camera）
  #[error("未知的 GStreamer 输入类型: {0}")]
  UnknownSource(String),
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer 布尔错误: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("无法获取 appsink 元素")]
  AppSinkNotFound,
  #[error("无法转换元素为 appsink")]
  AppSinkConversionFailed,
  #[error("无法从 caps 获取视频信息")]
  VideoInfoError,
  #[error("不支持的视频格式")]
  UnsupportedFormat,
  #[error("管道错误: {0}")]
  PipelineError(String),
  #[error("缓冲区大小不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("状态改变错误: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

pub enum GStreamerInputBuilderItem {
  FileSource(String),
  CameraSource {
    camera: String,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
  },
  TargetFormat {
    format: String,
  },
  VideoFlip {
    method: u32,
  },
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      GStreamerInputBuilderItem::FileSource(path) => {
        format!("filesrc location=\"{}\" ! decodebin", path)
      }
      GStreamerInputBuilderItem::CameraSource {
        camera,
        width,
        height,
        fps,
      } => {
        let mut caps = String::from("video/x-raw");
        if let Some(width) = width {
          caps.push_str(&format!(",width={}", width));
        }
        if let Some(height) = height {
          caps.push_str(&format!(",height={}", height));
        }
        if let Some(fps) = fps {
          caps.push_str(&format!(",framerate={}/1", fps));
        }
        format!("v4l2src device={} ! {}", camera, caps)
      }
      GStreamerInputBuilderItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
      GStreamerInputBuilderItem::VideoFlip { method } => {
        format!("videoflip method={}", method)
      }
    }
  }
}

/// GStreamer 输入管道构建器
pub struct GStreamerInputPipelineBuilder {
  items: Vec<GStreamerInputBuilderItem>,
}

impl FromUrlWithScheme for GStreamerInputPipelineBuilder {
  const SCHEME: &'static str = "gst";
}

impl GStreamerInputPipelineBuilder {
  fn build_camera_pipeline(path: &str, query: &HashMap<String, String>) -> Self {
    let camera = if path.is_empty() || path == "/" {
      "/dev/video0".to_string()
    } else {
      path.to_string()
    };
    let parse = |key: &str| query.get(key).and_then(|v| v.parse::<u32>().ok());

    let mut items = vec![GStreamerInputBuilderItem::CameraSource {
      camera,
      width: parse("width"),
      height: parse("height"),
      fps: parse("fps"),
    }];
    if let Some(flip) = Self::video_flip(query.get("rotate").map(|s| s.as_ref())) {
      items.push(flip);
    }
    GStreamerInputPipelineBuilder { items }
  }

  fn build_file_pipeline(path: &str, query: &HashMap<String, String>) -> Self {
    // gst://file/12_YOLO/x.mp4 中的路径相对于当前目录
    let path = path.trim_start_matches('/');
    let path = if query.contains_key("absolute") {
      format!("/{}", path)
    } else {
      path.to_string()
    };

    let mut items = vec![GStreamerInputBuilderItem::FileSource(path)];
    if let Some(flip) = Self::video_flip(query.get("rotate").map(|s| s.as_ref())) {
      items.push(flip);
    }
    GStreamerInputPipelineBuilder { items }
  }

  fn video_flip(rotate: Option<&str>) -> Option<GStreamerInputBuilderItem> {
    let method = match rotate? {
      "90" => 1,
      "180" => 2,
      "270" => 3,
      _ => return None,
    };
    Some(GStreamerInputBuilderItem::VideoFlip { method })
  }

  pub fn build(mut self) -> Result<GStreamerInput, GStreamerInputError> {
    gst::init()?;

    self.items.push(GStreamerInputBuilderItem::TargetFormat {
      format: "RGB".to_string(),
    });

    let basic_pipeline = self
      .items
      .iter()
      .map(GStreamerInputBuilderItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    let full_pipeline = format!("{} ! appsink max-buffers=2 name=sink", basic_pipeline);

    info!("GStreamer 管道描述: {}", full_pipeline);

    let pipeline = gst::parse::launch(&full_pipeline)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("无法创建管道".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerInput {
      pipeline,
      appsink,
      frame_index: 0,
    })
  }
}

impl FromUrl for GStreamerInputPipelineBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();
    let path = url_file_path(url);

    match url.host_str() {
      Some("camera") => Ok(Self::build_camera_pipeline(&path, &query)),
      Some("file") => Ok(Self::build_file_pipeline(&path, &query)),
      other => Err(GStreamerInputError::UnknownSource(
        other.unwrap_or_default().to_string(),
      )),
    }
  }
}

/// GStreamer 视频输入
///
/// 迭代到流结束为止；释放时管道被置为 Null 状态，摄像头随之关闭。
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  frame_index: u64,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("无法停止 GStreamer 管道: {}", e);
    }
  }
}

impl GStreamerInput {
  fn pull_sample(&self) -> Option<gst::Sample> {
    // 流结束（EOS）时 pull_sample 返回错误
    self.appsink.pull_sample().ok()
  }
}

impl Iterator for GStreamerInput {
  type Item = RgbFrame;

  fn next(&mut self) -> Option<Self::Item> {
    let sample = self.pull_sample()?;
    match convert_sample(sample, self.frame_index) {
      Ok(frame) => {
        self.frame_index += 1;
        Some(frame)
      }
      Err(e) => {
        error!("无法转换视频帧: {}", e);
        None
      }
    }
  }
}

fn convert_sample(sample: gst::Sample, index: u64) -> Result<RgbFrame, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("样本中没有缓冲区".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("样本中没有 caps".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;
  if video_info.format() != gst_video::VideoFormat::Rgb {
    return Err(GStreamerInputError::UnsupportedFormat);
  }

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;

  let map = buffer
    .map_readable()
    .map_err(|e| GStreamerInputError::PipelineError(format!("无法映射缓冲区: {}", e)))?;
  let data = map.as_slice();

  let expected = stride * (height.saturating_sub(1)) + width * 3;
  if data.len() < expected {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  // 行可能按 4 字节对齐，逐行拷贝去掉填充
  let mut rgb = Vec::with_capacity(width * height * 3);
  for row in 0..height {
    let start = row * stride;
    rgb.extend_from_slice(&data[start..start + width * 3]);
  }

  let timestamp_ms = buffer.pts().map(|t| t.mseconds()).unwrap_or(0);

  RgbFrame::from_hwc(width as u32, height as u32, rgb, index)
    .map(|frame| frame.with_timestamp(timestamp_ms))
    .map_err(|e| GStreamerInputError::PipelineError(e.to_string()))
}
