// 该文件是 Dongcha （洞察） 项目的一部分。
// src/bin/yolo_track.rs - 视频多目标跟踪
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use dongcha::{
  FromUrl,
  input::InputWrapper,
  model::{CocoLabel, YoloBuilder},
  output::OutputWrapper,
  task::{ContinuousTask, Task},
  track::{TrackerConfig, TrackingModel},
};

/// 在视频上做检测与跟踪，跟踪状态在帧间保持
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型
  #[arg(long, value_name = "MODEL", default_value = "onnx:yolo11n.onnx")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE", default_value = "gst://file/12_YOLO/1_Intro/Videos/people.mp4")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", default_value = "folder:///tmp/dongcha/track?always")]
  pub output: Url,
  /// 最多处理的帧数，0 表示不限
  #[arg(long, value_name = "FRAME_NUMBER", default_value_t = 0)]
  pub frame_number: usize,
  /// 丢失的轨迹保留的帧数
  #[arg(long, value_name = "FRAMES", default_value_t = 30)]
  pub track_buffer: u32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let detector = YoloBuilder::from_url(&args.model)?.build::<CocoLabel>()?;
  let config = TrackerConfig {
    track_buffer: args.track_buffer,
    ..TrackerConfig::default()
  };
  let model = TrackingModel::new(detector, config);
  let output = OutputWrapper::from_url(&args.output)?;

  ContinuousTask::default()
    .with_frame_number(Some(args.frame_number))
    .run_task(input, model, output)
}
