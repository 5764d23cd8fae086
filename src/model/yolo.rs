// 该文件是 Dongcha （洞察） 项目的一部分。
// src/model/yolo.rs - 基于 tract 的 YOLO 推理
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

use std::{marker::PhantomData, time::Instant};

use thiserror::Error;
use tracing::{debug, error, info};
use tract_onnx::prelude::*;
use url::Url;

use super::{
  DetectResult, Letterbox, Model, WithLabel,
  postprocess::{DecodeConfig, DecodeError, RawOutput, YoloTask, decode},
};
use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame, query_param, url_file_path};

const YOLO_DEFAULT_INPUT_SIZE: u32 = 640;

type OnnxPlan = TypedRunnableModel<TypedModel>;

#[derive(Error, Debug)]
pub enum YoloError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型文件不存在: {0}")]
  ModelNotFound(String),
  #[error("推理错误: {0}")]
  Inference(String),
  #[error("输出解码错误: {0}")]
  Decode(#[from] DecodeError),
}

impl From<TractError> for YoloError {
  fn from(err: TractError) -> Self {
    YoloError::Inference(format!("{:#}", err))
  }
}

/// YOLO 模型构建器
///
/// `onnx:///path/yolo11n-seg.onnx?task=segment&conf=0.25&iou=0.7&size=640&max_det=300`
#[derive(Debug, Clone)]
pub struct YoloBuilder {
  model_path: String,
  task: YoloTask,
  size: u32,
  config: DecodeConfig,
}

impl FromUrlWithScheme for YoloBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for YoloBuilder {
  type Error = YoloError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(YoloError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let model_path = url_file_path(url);
    let task = query_param::<String>(url, "task")
      .and_then(|t| t.parse::<YoloTask>().ok())
      .unwrap_or_else(|| YoloTask::from_model_path(&model_path));

    let defaults = DecodeConfig::default();
    let config = DecodeConfig {
      conf: query_param(url, "conf").unwrap_or(defaults.conf),
      iou: query_param(url, "iou").unwrap_or(defaults.iou),
      max_det: query_param(url, "max_det").unwrap_or(defaults.max_det),
    };

    Ok(YoloBuilder {
      model_path,
      task,
      size: query_param(url, "size").unwrap_or(YOLO_DEFAULT_INPUT_SIZE),
      config,
    })
  }
}

impl YoloBuilder {
  pub fn task(&self) -> YoloTask {
    self.task
  }

  pub fn config(&self) -> &DecodeConfig {
    &self.config
  }

  pub fn with_task(mut self, task: YoloTask) -> Self {
    self.task = task;
    self
  }

  pub fn with_conf(mut self, conf: f32) -> Self {
    self.config.conf = conf;
    self
  }

  pub fn build<T: WithLabel>(self) -> Result<Yolo<T>, YoloError> {
    if !std::path::Path::new(&self.model_path).exists() {
      error!("模型文件不存在: {}", self.model_path);
      return Err(YoloError::ModelNotFound(self.model_path));
    }

    info!(
      "加载 {} 模型: {} (输入 {}x{})",
      self.task.as_str(),
      self.model_path,
      self.size,
      self.size
    );
    let s = self.size as usize;
    let start = Instant::now();
    let plan = tract_onnx::onnx()
      .model_for_path(&self.model_path)?
      .with_input_fact(0, f32::fact([1, 3, s, s]).into())?
      .into_optimized()?
      .into_runnable()?;
    info!("模型加载完成，耗时 {:.2?}", start.elapsed());
    debug!("解码参数: {:?}", self.config);

    Ok(Yolo {
      plan,
      task: self.task,
      size: self.size,
      config: self.config,
      _phantom: PhantomData,
    })
  }
}

pub struct Yolo<T> {
  plan: OnnxPlan,
  task: YoloTask,
  size: u32,
  config: DecodeConfig,
  _phantom: PhantomData<T>,
}

impl<T> Yolo<T> {
  pub fn task(&self) -> YoloTask {
    self.task
  }

  fn run(&self, input: Vec<f32>) -> Result<Vec<RawOutput>, YoloError> {
    let s = self.size as usize;
    let tensor = Tensor::from_shape(&[1, 3, s, s], &input)?;
    let outputs = self.plan.run(tvec!(tensor.into()))?;

    outputs
      .iter()
      .map(|value| {
        let view = value.to_array_view::<f32>()?;
        Ok::<_, YoloError>(RawOutput::new(
          view.shape().to_vec(),
          view.iter().copied().collect(),
        ))
      })
      .collect()
  }
}

impl<T: WithLabel> Model for Yolo<T> {
  type Input = RgbFrame;
  type Output = DetectResult<T>;
  type Error = YoloError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let letterbox = Letterbox::new(input.width(), input.height(), self.size);
    debug!("预处理: {:?}", letterbox);
    let tensor = letterbox.apply(input.image());

    let start = Instant::now();
    let outputs = self.run(tensor)?;
    debug!(
      "推理完成，耗时 {:.2?}，输出形状 {:?}",
      start.elapsed(),
      outputs.iter().map(|o| &o.shape).collect::<Vec<_>>()
    );

    let result = decode(self.task, &outputs, &letterbox, &self.config)?;
    debug!("检测到 {} 个目标", result.len());
    Ok(result)
  }
}
