// 该文件是 Dongcha （洞察） 项目的一部分。
// src/bin/yolo_obb.rs - 旋转框检测
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

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::info;
use url::Url;

use dongcha::{
  FromUrl,
  input::InputWrapper,
  model::{DetectResult, DotaLabel, Model, YoloBuilder, YoloTask},
  output::{OutputWrapper, Render},
};

/// 在航拍图片上检测旋转框（DOTA 类别）
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 旋转框模型
  #[arg(long, value_name = "MODEL", default_value = "onnx:yolo11n-obb.onnx")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE", default_value = "https://ultralytics.com/images/boats.jpg")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", default_value = "image:///tmp/dongcha/obb.png")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let mut input = InputWrapper::from_url(&args.input)?;
  let model = YoloBuilder::from_url(&args.model)?
    .with_task(YoloTask::Obb)
    .build::<DotaLabel>()?;
  let output = OutputWrapper::from_url(&args.output)?;

  let frame = input.next().ok_or_else(|| anyhow!("没有输入帧"))?;
  let result: DetectResult<DotaLabel> = model.infer(&frame)?;

  for (((name, conf), xywhr), corners) in result
    .names()
    .iter()
    .zip(result.conf())
    .zip(result.xywhr())
    .zip(result.xyxyxyxy())
  {
    info!("{} {:.2}: xywhr = {:?}, 角点 = {:?}", name, conf, xywhr, corners);
  }

  output.render_result(&frame, &result)?;
  Ok(())
}
