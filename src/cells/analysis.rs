// 该文件是 Dongcha （洞察） 项目的一部分。
// src/cells/analysis.rs - 细胞统计与诊断
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

use std::fmt;

use image::GrayImage;

use crate::morphology::{
  Footprint, LabelImage, RegionProps, binarize, black_tophat, gradient, regionprops, skeletonize, threshold_otsu,
  white_tophat,
};

/// 可疑细胞：面积大于该值且圆度小于 [`SUSPICIOUS_MAX_CIRCULARITY`]
pub const SUSPICIOUS_MIN_AREA: u32 = 1000;
pub const SUSPICIOUS_MAX_CIRCULARITY: f64 = 0.7;
const TOPHAT_RADIUS: u32 = 10;

/// 分割结果的定量分析
#[derive(Debug, Clone, Default)]
pub struct CellAnalysis {
  pub regions: Vec<RegionProps>,
}

impl CellAnalysis {
  pub fn count(&self) -> usize {
    self.regions.len()
  }

  pub fn areas(&self) -> Vec<u32> {
    self.regions.iter().map(|r| r.area).collect()
  }

  pub fn perimeters(&self) -> Vec<f64> {
    self.regions.iter().map(|r| r.perimeter).collect()
  }

  pub fn circularities(&self) -> Vec<f64> {
    self.regions.iter().map(|r| r.circularity).collect()
  }

  /// (行, 列)
  pub fn centroids(&self) -> Vec<(f64, f64)> {
    self.regions.iter().map(|r| r.centroid).collect()
  }

  /// 没有细胞时以下统计量均为 0
  pub fn mean_area(&self) -> f64 {
    mean(self.regions.iter().map(|r| r.area as f64))
  }

  pub fn min_area(&self) -> u32 {
    self.regions.iter().map(|r| r.area).min().unwrap_or(0)
  }

  pub fn max_area(&self) -> u32 {
    self.regions.iter().map(|r| r.area).max().unwrap_or(0)
  }

  pub fn mean_circularity(&self) -> f64 {
    mean(self.regions.iter().map(|r| r.circularity))
  }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
  let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
  if n == 0 { 0.0 } else { sum / n as f64 }
}

impl fmt::Display for CellAnalysis {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "分析结果:")?;
    writeln!(f, "• 检测到细胞: {}", self.count())?;
    writeln!(f, "• 平均面积: {:.1} 像素²", self.mean_area())?;
    writeln!(f, "• 最小面积: {:.1} 像素²", self.min_area() as f64)?;
    writeln!(f, "• 最大面积: {:.1} 像素²", self.max_area() as f64)?;
    write!(f, "• 平均圆度: {:.3}", self.mean_circularity())
  }
}

/// 统计标签图中的每个细胞
pub fn analyze(labels: &LabelImage) -> CellAnalysis {
  CellAnalysis {
    regions: regionprops(labels),
  }
}

/// 用默认结构元素的形态学梯度提取细胞边缘
pub fn cell_edges(binary: &GrayImage) -> GrayImage {
  gradient(binary, &Footprint::default())
}

/// 形态学在医学图像中的其他用法
#[derive(Debug, Clone)]
pub struct Applications {
  /// 明亮的小结构
  pub white_tophat: GrayImage,
  /// 暗的小结构
  pub black_tophat: GrayImage,
  pub skeleton: GrayImage,
}

/// 直接作用于传入的图像，不另外生成新的合成图像
pub fn applications(image: &GrayImage) -> Applications {
  let footprint = Footprint::disk(TOPHAT_RADIUS);
  let binary = binarize(image, threshold_otsu(image));
  Applications {
    white_tophat: white_tophat(image, &footprint),
    black_tophat: black_tophat(image, &footprint),
    skeleton: skeletonize(&binary),
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
  Normal,
  Suspicious,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellVerdict {
  /// 从 1 开始
  pub index: usize,
  pub area: u32,
  pub circularity: f64,
  pub status: CellStatus,
}

impl fmt::Display for CellVerdict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let status = match self.status {
      CellStatus::Normal => "正常",
      CellStatus::Suspicious => "可疑",
    };
    write!(
      f,
      "细胞 {}: {} (面积: {}, 圆度: {:.3})",
      self.index, status, self.area, self.circularity
    )
  }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnosis {
  pub verdicts: Vec<CellVerdict>,
}

impl Diagnosis {
  pub fn normal_count(&self) -> usize {
    self.verdicts.iter().filter(|v| v.status == CellStatus::Normal).count()
  }

  pub fn suspicious_count(&self) -> usize {
    self.verdicts.iter().filter(|v| v.status == CellStatus::Suspicious).count()
  }

  pub fn needs_review(&self) -> bool {
    self.suspicious_count() > 0
  }

  pub fn recommendation(&self) -> &'static str {
    if self.needs_review() {
      "需要专家复查"
    } else {
      "样本在正常范围内"
    }
  }
}

impl fmt::Display for Diagnosis {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for verdict in &self.verdicts {
      writeln!(f, "  {}", verdict)?;
    }
    writeln!(f, "诊断摘要:")?;
    writeln!(f, "• 正常细胞: {}", self.normal_count())?;
    writeln!(f, "• 可疑细胞: {}", self.suspicious_count())?;
    write!(f, "• 建议: {}", self.recommendation())
  }
}

/// 大而不规则的细胞标记为可疑
pub fn diagnose(analysis: &CellAnalysis) -> Diagnosis {
  let verdicts = analysis
    .regions
    .iter()
    .enumerate()
    .map(|(i, r)| {
      let status = if r.area > SUSPICIOUS_MIN_AREA && r.circularity < SUSPICIOUS_MAX_CIRCULARITY {
        CellStatus::Suspicious
      } else {
        CellStatus::Normal
      };
      CellVerdict {
        index: i + 1,
        area: r.area,
        circularity: r.circularity,
        status,
      }
    })
    .collect();
  Diagnosis { verdicts }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Luma;

  fn region(label: u32, area: u32, circularity: f64) -> RegionProps {
    RegionProps {
      label,
      area,
      centroid: (0.0, 0.0),
      bbox: (0, 0, 1, 1),
      perimeter: 1.0,
      circularity,
    }
  }

  #[test]
  fn empty_analysis_reports_zeros() {
    let analysis = analyze(&LabelImage::new(10, 10));
    assert_eq!(analysis.count(), 0);
    assert_eq!(analysis.mean_area(), 0.0);
    assert_eq!(analysis.min_area(), 0);
    assert_eq!(analysis.max_area(), 0);
    assert_eq!(analysis.mean_circularity(), 0.0);
    assert!(!analysis.to_string().contains("NaN"));
  }

  #[test]
  fn statistics_over_regions() {
    let labels = LabelImage::from_fn(20, 10, |x, y| {
      if x < 4 && y < 4 {
        Luma([1])
      } else if x >= 10 && y < 2 {
        Luma([2])
      } else {
        Luma([0])
      }
    });
    let analysis = analyze(&labels);
    assert_eq!(analysis.count(), 2);
    assert_eq!(analysis.areas(), vec![16, 20]);
    assert_eq!(analysis.min_area(), 16);
    assert_eq!(analysis.max_area(), 20);
    assert_eq!(analysis.mean_area(), 18.0);
    assert_eq!(analysis.centroids()[0], (1.5, 1.5));
    assert_eq!(analysis.perimeters().len(), 2);
  }

  #[test]
  fn suspicious_needs_both_conditions() {
    let analysis = CellAnalysis {
      regions: vec![
        region(1, 1200, 0.5),
        region(2, 1200, 0.8),
        region(3, 900, 0.3),
        region(4, 1000, 0.5),
      ],
    };
    let diagnosis = diagnose(&analysis);
    let statuses: Vec<_> = diagnosis.verdicts.iter().map(|v| v.status).collect();
    assert_eq!(
      statuses,
      vec![
        CellStatus::Suspicious,
        CellStatus::Normal,
        CellStatus::Normal,
        CellStatus::Normal
      ]
    );
    assert_eq!(diagnosis.suspicious_count(), 1);
    assert_eq!(diagnosis.normal_count(), 3);
    assert!(diagnosis.needs_review());
    assert_eq!(diagnosis.verdicts[0].index, 1);
  }

  #[test]
  fn edges_follow_object_outline() {
    let mut binary = GrayImage::new(10, 10);
    for y in 3..7 {
      for x in 3..7 {
        binary.put_pixel(x, y, Luma([255]));
      }
    }
    let edges = cell_edges(&binary);
    assert_eq!(edges.get_pixel(3, 3)[0], 255);
    assert_eq!(edges.get_pixel(2, 4)[0], 255);
    assert_eq!(edges.get_pixel(0, 0)[0], 0);
    // 十字结构元素不会触及对角外侧
    assert_eq!(edges.get_pixel(2, 2)[0], 0);
  }

  #[test]
  fn tophats_pick_small_structures() {
    let mut img = GrayImage::from_pixel(40, 40, Luma([100]));
    img.put_pixel(10, 10, Luma([250]));
    img.put_pixel(30, 30, Luma([5]));
    let apps = applications(&img);
    assert_eq!(apps.white_tophat.get_pixel(10, 10)[0], 150);
    assert_eq!(apps.white_tophat.get_pixel(20, 20)[0], 0);
    assert_eq!(apps.black_tophat.get_pixel(30, 30)[0], 95);
    assert_eq!(apps.black_tophat.get_pixel(20, 20)[0], 0);
    assert_eq!(apps.skeleton.dimensions(), (40, 40));
  }

  #[test]
  fn applications_work_on_the_given_image() {
    let blank = GrayImage::new(30, 20);
    let apps = applications(&blank);
    assert_eq!(apps.white_tophat.dimensions(), (30, 20));
    assert!(apps.white_tophat.pixels().all(|p| p[0] == 0));
    assert!(apps.black_tophat.pixels().all(|p| p[0] == 0));
    assert!(apps.skeleton.pixels().all(|p| p[0] == 0));
  }
}
