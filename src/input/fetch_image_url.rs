// 该文件是 Dongcha （洞察） 项目的一部分。
// src/input/fetch_image_url.rs - 网络图像输入
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{FromUrl, frame::RgbFrame};

const URL_IMAGE_SCHEMES: [&str; 2] = ["http", "https"];

#[derive(Error, Debug)]
pub enum UrlImageInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("HTTP 错误: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("图像解码错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 下载一张网络图片（例如 bus.jpg 样例），只产生一帧
pub struct UrlImageInput {
  image: Option<RgbImage>,
}

impl UrlImageInput {
  pub fn accepts(url: &Url) -> bool {
    URL_IMAGE_SCHEMES.contains(&url.scheme())
  }
}

impl FromUrl for UrlImageInput {
  type Error = UrlImageInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if !Self::accepts(url) {
      return Err(UrlImageInputError::SchemeMismatch(url.scheme().to_string()));
    }

    info!("下载网络图像: {}", url);
    let bytes = reqwest::blocking::get(url.as_str())?
      .error_for_status()?
      .bytes()?;
    debug!("下载完成，大小: {:.2} KB", bytes.len() as f64 / 1024.0);

    let image = image::load_from_memory(&bytes)?.to_rgb8();
    Ok(UrlImageInput { image: Some(image) })
  }
}

impl Iterator for UrlImageInput {
  type Item = RgbFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take().map(RgbFrame::from)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_http_schemes_are_accepted() {
    assert!(UrlImageInput::accepts(
      &Url::parse("https://ultralytics.com/images/bus.jpg").unwrap()
    ));
    assert!(!UrlImageInput::accepts(
      &Url::parse("image:///tmp/bus.jpg").unwrap()
    ));
  }
}
