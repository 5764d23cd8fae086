// 该文件是 Dongcha （洞察） 项目的一部分。
// src/output/save_image_file.rs - 保存标注图像
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::{DetectResult, WithLabel},
  output::{Render, draw::Draw},
  query_param, url_file_path,
};

/// 涂黑模式下默认的最低置信度
const DEFAULT_REDACT_CONF: f32 = 0.8;

/// 保存到单个图像文件
///
/// `image:///out.png` 保存标注图；`image:///out.png?redact=0&min_conf=0.8`
/// 改为保存原图，并把指定类别的掩码区域涂黑。
pub struct SaveImageFileOutput {
  path: PathBuf,
  redact: Option<(u32, f32)>,
  draw: Draw<'static>,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let redact = query_param::<u32>(uri, "redact").map(|class_id| {
      let min_conf = query_param::<f32>(uri, "min_conf").unwrap_or(DEFAULT_REDACT_CONF);
      (class_id, min_conf)
    });

    Ok(SaveImageFileOutput {
      path: PathBuf::from(url_file_path(uri)),
      redact,
      draw: Draw::default(),
    })
  }
}

impl SaveImageFileOutput {
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 保存任意图像，自动创建父目录
  pub fn save(&self, image: &RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    info!("保存图像到文件: {}", self.path.display());
    Ok(())
  }
}

impl<T: WithLabel> Render<RgbFrame, DetectResult<T>> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbFrame, result: &DetectResult<T>) -> Result<(), Self::Error> {
    let image = match self.redact {
      Some((class_id, min_conf)) => {
        let mut image = frame.image().clone();
        let count = result.redact(&mut image, class_id, min_conf);
        if count == 0 {
          warn!("没有类别 {} 且置信度不低于 {} 的掩码可以涂黑", class_id, min_conf);
        }
        image
      }
      None => self.draw.plot(frame.image(), result),
    };
    self.save(&image)
  }
}
