// 该文件是 Dongcha （洞察） 项目的一部分。
// src/track/kalman.rs - 匀速运动卡尔曼滤波
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

use nalgebra::{SMatrix, SVector};
use tracing::warn;

/// 状态 (cx, cy, a, h, vx, vy, va, vh)，a 为宽高比
pub type StateMean = SVector<f32, 8>;
pub type StateCov = SMatrix<f32, 8, 8>;
/// 观测 (cx, cy, a, h)
pub type Measurement = SVector<f32, 4>;

const STD_WEIGHT_POSITION: f32 = 1.0 / 20.0;
const STD_WEIGHT_VELOCITY: f32 = 1.0 / 160.0;

/// xyxy → (cx, cy, a, h)
pub fn xyxy_to_xyah(bbox: [f32; 4]) -> Measurement {
  let w = bbox[2] - bbox[0];
  let h = (bbox[3] - bbox[1]).max(f32::EPSILON);
  Measurement::new(bbox[0] + w / 2.0, bbox[1] + h / 2.0, w / h, h)
}

/// 状态均值 → xyxy
pub fn mean_to_xyxy(mean: &StateMean) -> [f32; 4] {
  let (cx, cy, a, h) = (mean[0], mean[1], mean[2], mean[3]);
  let w = a * h;
  [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
}

/// 图像空间中的匀速运动模型，噪声与目标高度成比例
#[derive(Debug, Clone)]
pub struct KalmanFilterXyah {
  motion: StateCov,
  observation: SMatrix<f32, 4, 8>,
}

impl Default for KalmanFilterXyah {
  fn default() -> Self {
    let mut motion = StateCov::identity();
    for i in 0..4 {
      motion[(i, i + 4)] = 1.0;
    }
    let mut observation = SMatrix::<f32, 4, 8>::zeros();
    for i in 0..4 {
      observation[(i, i)] = 1.0;
    }
    Self {
      motion,
      observation,
    }
  }
}

impl KalmanFilterXyah {
  /// 由第一次观测建立轨迹，速度初始化为 0
  pub fn initiate(&self, measurement: &Measurement) -> (StateMean, StateCov) {
    let mut mean = StateMean::zeros();
    mean.fixed_rows_mut::<4>(0).copy_from(measurement);

    let h = measurement[3];
    let std = [
      2.0 * STD_WEIGHT_POSITION * h,
      2.0 * STD_WEIGHT_POSITION * h,
      1e-2,
      2.0 * STD_WEIGHT_POSITION * h,
      10.0 * STD_WEIGHT_VELOCITY * h,
      10.0 * STD_WEIGHT_VELOCITY * h,
      1e-5,
      10.0 * STD_WEIGHT_VELOCITY * h,
    ];
    let cov = StateCov::from_diagonal(&StateMean::from_iterator(std.iter().map(|s| s * s)));
    (mean, cov)
  }

  pub fn predict(&self, mean: &StateMean, cov: &StateCov) -> (StateMean, StateCov) {
    let h = mean[3];
    let std = [
      STD_WEIGHT_POSITION * h,
      STD_WEIGHT_POSITION * h,
      1e-2,
      STD_WEIGHT_POSITION * h,
      STD_WEIGHT_VELOCITY * h,
      STD_WEIGHT_VELOCITY * h,
      1e-5,
      STD_WEIGHT_VELOCITY * h,
    ];
    let noise = StateCov::from_diagonal(&StateMean::from_iterator(std.iter().map(|s| s * s)));

    let mean = self.motion * mean;
    let cov = self.motion * cov * self.motion.transpose() + noise;
    (mean, cov)
  }

  fn project(&self, mean: &StateMean, cov: &StateCov) -> (Measurement, SMatrix<f32, 4, 4>) {
    let h = mean[3];
    let std = [
      STD_WEIGHT_POSITION * h,
      STD_WEIGHT_POSITION * h,
      1e-1,
      STD_WEIGHT_POSITION * h,
    ];
    let noise =
      SMatrix::<f32, 4, 4>::from_diagonal(&Measurement::from_iterator(std.iter().map(|s| s * s)));
    (
      self.observation * mean,
      self.observation * cov * self.observation.transpose() + noise,
    )
  }

  pub fn update(
    &self,
    mean: &StateMean,
    cov: &StateCov,
    measurement: &Measurement,
  ) -> (StateMean, StateCov) {
    let (projected_mean, projected_cov) = self.project(mean, cov);
    let Some(inv) = projected_cov.try_inverse() else {
      warn!("卡尔曼滤波协方差矩阵不可逆，跳过本次更新");
      return (*mean, *cov);
    };
    let gain = cov * self.observation.transpose() * inv;
    let innovation = measurement - projected_mean;
    (
      mean + gain * innovation,
      cov - gain * projected_cov * gain.transpose(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn box_conversion_round_trip() {
    let bbox = [10.0, 20.0, 50.0, 100.0];
    let m = xyxy_to_xyah(bbox);
    assert_eq!(m, Measurement::new(30.0, 60.0, 0.5, 80.0));
    let (mean, _) = KalmanFilterXyah::default().initiate(&m);
    assert_eq!(mean_to_xyxy(&mean), bbox);
  }

  #[test]
  fn learns_constant_velocity() {
    let kf = KalmanFilterXyah::default();
    let (mut mean, mut cov) = kf.initiate(&xyxy_to_xyah([0.0, 0.0, 20.0, 40.0]));
    for step in 1..20 {
      let (m, c) = kf.predict(&mean, &cov);
      let x = 5.0 * step as f32;
      let (m, c) = kf.update(&m, &c, &xyxy_to_xyah([x, 0.0, x + 20.0, 40.0]));
      mean = m;
      cov = c;
    }
    // 速度收敛到每帧 5 像素
    assert!((mean[4] - 5.0).abs() < 0.5, "vx = {}", mean[4]);
    let (predicted, _) = kf.predict(&mean, &cov);
    assert!((predicted[0] - (5.0 * 20.0 + 10.0)).abs() < 1.0);
  }
}
