// 该文件是 Dongcha （洞察） 项目的一部分。
// src/task.rs - 输入、推理与输出的任务循环
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
  sync::mpsc::{self, Receiver},
  thread,
  time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::{model::Model, output::Render};

/// 收到中断信号后强制退出前的等待时间
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 只处理第一帧
pub struct OneShotTask;

impl<F, D, ME, RE, I, M, O> Task<I, M, O> for OneShotTask
where
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，总耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 逐帧处理，直到输入结束、达到帧数上限或收到 Ctrl-C
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  interrupt: Option<Receiver<()>>,
}

impl ContinuousTask {
  /// `None` 或 `Some(0)` 表示不限帧数
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number.filter(|&n| n > 0);
    self
  }

  /// 使用自定义的中断信号来源，而不是注册 Ctrl-C 处理函数
  pub fn with_interrupt(mut self, interrupt: Receiver<()>) -> Self {
    self.interrupt = Some(interrupt);
    self
  }

  fn ctrlc_receiver() -> anyhow::Result<Receiver<()>> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(rx)
  }
}

impl<F, D, ME, RE, I, M, O> Task<I, M, O> for ContinuousTask
where
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let rx = match self.interrupt {
      Some(rx) => rx,
      None => Self::ctrlc_receiver()?,
    };

    let mut frame_count = 0usize;
    let mut now = Instant::now();
    for frame in input {
      frame_count += 1;
      info!("处理第 {} 帧图像", frame_count);
      let result = model.infer(&frame)?;
      let elapsed_infer = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_total = now.elapsed();
      now = Instant::now();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_infer, elapsed_total);
      if self.frame_number.is_some_and(|n| frame_count >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_count);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_count);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use thiserror::Error;

  #[derive(Error, Debug)]
  #[error("失败")]
  struct Failure;

  struct Double;

  impl Model for Double {
    type Input = u32;
    type Output = u32;
    type Error = Failure;

    fn infer(&self, input: &u32) -> Result<u32, Failure> {
      if *input == 99 { Err(Failure) } else { Ok(input * 2) }
    }
  }

  #[derive(Default)]
  struct Collect(RefCell<Vec<(u32, u32)>>);

  impl Render<u32, u32> for &Collect {
    type Error = Failure;

    fn render_result(&self, frame: &u32, result: &u32) -> Result<(), Failure> {
      self.0.borrow_mut().push((*frame, *result));
      Ok(())
    }
  }

  fn quiet() -> ContinuousTask {
    let (_tx, rx) = mpsc::channel();
    ContinuousTask::default().with_interrupt(rx)
  }

  #[test]
  fn one_shot_uses_first_frame() {
    let out = Collect::default();
    OneShotTask.run_task(vec![3, 4].into_iter(), Double, &out).unwrap();
    assert_eq!(*out.0.borrow(), vec![(3, 6)]);
  }

  #[test]
  fn one_shot_without_frames_fails() {
    let out = Collect::default();
    assert!(OneShotTask.run_task(Vec::<u32>::new().into_iter(), Double, &out).is_err());
  }

  #[test]
  fn continuous_respects_frame_limit() {
    let out = Collect::default();
    quiet()
      .with_frame_number(Some(2))
      .run_task(1..10, Double, &out)
      .unwrap();
    assert_eq!(*out.0.borrow(), vec![(1, 2), (2, 4)]);
  }

  #[test]
  fn continuous_runs_until_input_ends() {
    let out = Collect::default();
    quiet().with_frame_number(Some(0)).run_task(1..4, Double, &out).unwrap();
    assert_eq!(out.0.borrow().len(), 3);
  }

  #[test]
  fn interrupt_stops_after_current_frame() {
    let (tx, rx) = mpsc::channel();
    tx.send(()).unwrap();
    let out = Collect::default();
    ContinuousTask::default()
      .with_interrupt(rx)
      .run_task(1..10, Double, &out)
      .unwrap();
    assert_eq!(out.0.borrow().len(), 1);
  }

  #[test]
  fn model_error_propagates() {
    let out = Collect::default();
    let err = quiet().run_task(vec![1, 99, 2].into_iter(), Double, &out).unwrap_err();
    assert_eq!(err.to_string(), "失败");
    assert_eq!(out.0.borrow().len(), 1);
  }
}
