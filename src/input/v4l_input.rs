// 该文件是 Dongcha （洞察） 项目的一部分。
// src/input/v4l_input.rs - V4L 摄像头输入
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
use tracing::{error, info, warn};
use url::Url;
use v4l::{
  Device, FourCC,
  buffer::Type,
  io::{mmap::Stream, traits::CaptureStream},
  video::Capture,
};

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame, query_param, url_file_path};

const V4L_BUFFER_COUNT: u32 = 4;

#[derive(Error, Debug)]
pub enum V4lInputError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的摄像头索引: {0}")]
  InvalidCameraIndex(String),
  #[error("摄像头不支持 YUYV 格式，实际格式: {0}")]
  UnsupportedPixelFormat(String),
}

/// V4L2 摄像头输入
///
/// 支持两种写法：
/// - `v4l:///dev/video0` 直接给出设备路径
/// - `v4l://camera/0` 给出摄像头索引
///
/// 可选参数 `width`、`height` 请求采集分辨率。
pub struct V4lInput {
  // 流必须先于设备释放
  stream: Stream<'static>,
  _device: Device,
  width: u32,
  height: u32,
  frame_index: u64,
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lInput {
  type Error = V4lInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4lInputError::SchemaMismatch);
    }

    let device = match url.host_str() {
      Some("camera") => {
        let index_str = url.path().trim_start_matches('/');
        let index = if index_str.is_empty() {
          0
        } else {
          index_str
            .parse::<usize>()
            .map_err(|_| V4lInputError::InvalidCameraIndex(index_str.to_string()))?
        };
        info!("打开摄像头索引: {}", index);
        Device::new(index)?
      }
      _ => {
        let path = url_file_path(url);
        let path = if path.is_empty() || path == "/" {
          "/dev/video0".to_string()
        } else {
          path
        };
        info!("打开摄像头设备: {}", path);
        Device::with_path(&path)?
      }
    };

    let mut format = device.format()?;
    format.fourcc = FourCC::new(b"YUYV");
    if let Some(width) = query_param::<u32>(url, "width") {
      format.width = width;
    }
    if let Some(height) = query_param::<u32>(url, "height") {
      format.height = height;
    }
    let format = device.set_format(&format)?;
    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(V4lInputError::UnsupportedPixelFormat(format.fourcc.to_string()));
    }
    info!("摄像头格式: {}x{} {}", format.width, format.height, format.fourcc);

    let stream = Stream::with_buffers(&device, Type::VideoCapture, V4L_BUFFER_COUNT)?;

    Ok(V4lInput {
      stream,
      _device: device,
      width: format.width,
      height: format.height,
      frame_index: 0,
    })
  }
}

impl V4lInput {
  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  fn capture_frame(&mut self) -> Result<RgbFrame, V4lInputError> {
    let (buf, meta) = self.stream.next()?;
    let rgb = yuyv_to_rgb(buf, self.width as usize, self.height as usize);
    let timestamp_ms =
      meta.timestamp.sec as u64 * 1000 + meta.timestamp.usec as u64 / 1000;
    let frame = RgbFrame::from_hwc(self.width, self.height, rgb, self.frame_index)
      .map_err(|e| V4lInputError::IoError(std::io::Error::other(e.to_string())))?
      .with_timestamp(timestamp_ms);
    self.frame_index += 1;
    Ok(frame)
  }
}

impl Iterator for V4lInput {
  type Item = RgbFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self.capture_frame() {
      Ok(frame) => Some(frame),
      Err(e) => {
        warn!("摄像头采集失败，结束输入: {}", e);
        None
      }
    }
  }
}

fn clamp_u8(v: i32) -> u8 {
  v.clamp(0, 255) as u8
}

/// YUYV (YUV 4:2:2) 转 RGB24，使用 BT.601 系数
fn yuyv_to_rgb(data: &[u8], width: usize, height: usize) -> Vec<u8> {
  let mut rgb = vec![0u8; width * height * 3];
  let pixels = (width * height).min(data.len() / 2);

  for pair in 0..pixels / 2 {
    let base = pair * 4;
    let y0 = data[base] as i32;
    let u = data[base + 1] as i32 - 128;
    let y1 = data[base + 2] as i32;
    let v = data[base + 3] as i32 - 128;

    for (k, y) in [y0, y1].into_iter().enumerate() {
      let c = y - 16;
      let r = (298 * c + 409 * v + 128) >> 8;
      let g = (298 * c - 100 * u - 208 * v + 128) >> 8;
      let b = (298 * c + 516 * u + 128) >> 8;
      let idx = (pair * 2 + k) * 3;
      rgb[idx] = clamp_u8(r);
      rgb[idx + 1] = clamp_u8(g);
      rgb[idx + 2] = clamp_u8(b);
    }
  }

  rgb
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn yuyv_gray_maps_to_gray() {
    // Y=126, U=V=128 是中灰
    let data = [126u8, 128, 126, 128];
    let rgb = yuyv_to_rgb(&data, 2, 1);
    assert_eq!(rgb.len(), 6);
    assert!(rgb.iter().all(|&c| (c as i32 - 128).abs() <= 2));
  }

  #[test]
  fn yuyv_black_and_white() {
    let data = [16u8, 128, 235, 128];
    let rgb = yuyv_to_rgb(&data, 2, 1);
    assert_eq!(&rgb[..3], &[0, 0, 0]);
    assert_eq!(&rgb[3..], &[255, 255, 255]);
  }
}
