// 该文件是 Dongcha （洞察） 项目的一部分。
// src/output.rs - 结果输出
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

use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::{DetectResult, WithLabel},
};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

/// 依次交给每个输出
impl<F, D, O: Render<F, D>> Render<F, D> for Vec<O> {
  type Error = O::Error;

  fn render_result(&self, frame: &F, result: &D) -> Result<(), Self::Error> {
    for output in self {
      output.render_result(frame, result)?;
    }
    Ok(())
  }
}

pub mod draw;

mod console;
pub use self::console::{ConsoleFormat, ConsoleOutput, ConsoleOutputError};

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("控制台输出错误: {0}")]
  ConsoleOutputError(#[from] ConsoleOutputError),
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  Console(ConsoleOutput),
  #[cfg(feature = "save_image_file")]
  SaveImageFile(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecord(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ConsoleOutput::SCHEME => Ok(OutputWrapper::Console(ConsoleOutput::from_url(url)?)),
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => Ok(OutputWrapper::SaveImageFile(SaveImageFileOutput::from_url(url)?)),
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => Ok(OutputWrapper::DirectoryRecord(DirectoryRecordOutput::from_url(url)?)),
      scheme => {
        error!("没有输出能够处理方案 '{}'", scheme);
        Err(OutputError::SchemeMismatch(scheme.to_string()))
      }
    }
  }
}

impl<T: WithLabel> Render<RgbFrame, DetectResult<T>> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &RgbFrame, result: &DetectResult<T>) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Console(output) => output.render_result(frame, result).map_err(OutputError::from),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFile(output) => output.render_result(frame, result).map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecord(output) => output.render_result(frame, result).map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dispatches_on_scheme() {
    let url = Url::parse("console://json").unwrap();
    assert!(matches!(OutputWrapper::from_url(&url), Ok(OutputWrapper::Console(_))));

    let url = Url::parse("rtsp://localhost/live").unwrap();
    match OutputWrapper::from_url(&url) {
      Err(OutputError::SchemeMismatch(scheme)) => assert_eq!(scheme, "rtsp"),
      _ => panic!("rtsp should not be accepted"),
    }
  }

  #[cfg(feature = "save_image_file")]
  #[test]
  fn image_scheme_builds_file_output() {
    let url = Url::parse("image:///tmp/out.png").unwrap();
    assert!(matches!(OutputWrapper::from_url(&url), Ok(OutputWrapper::SaveImageFile(_))));
  }
}
