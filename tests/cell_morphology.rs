// 该文件是 Dongcha （洞察） 项目的一部分。
// tests/cell_morphology.rs - 细胞分析流程的集成测试
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

use dongcha::{
  cells::{CELLS, analyze, applications, cell_edges, diagnose, process, render_panel, simulate_cells},
  morphology::max_label,
};

#[test]
fn synthetic_cells_are_counted() {
  for seed in [0, 1] {
    let image = simulate_cells(seed);
    let stages = process(&image).unwrap();
    let analysis = analyze(&stages.labels);

    assert!(
      (5..=CELLS.len() + 2).contains(&analysis.count()),
      "seed {}: 计数 {}",
      seed,
      analysis.count()
    );
    assert_eq!(analysis.count() as u32, max_label(&stages.labels));
    assert!(analysis.min_area() > 0);
    assert!(analysis.mean_circularity() > 0.0 && analysis.mean_circularity() <= 1.2);
  }
}

#[test]
fn labels_stay_inside_the_cleaned_mask() {
  let image = simulate_cells(0);
  let stages = process(&image).unwrap();

  for (x, y, label) in stages.labels.enumerate_pixels() {
    if label[0] > 0 {
      assert_eq!(stages.closed.get_pixel(x, y)[0], 255, "({}, {}) 在掩码外", x, y);
    }
    if stages.separated.get_pixel(x, y)[0] > 0 {
      assert!(label[0] > 0);
    }
  }
}

#[test]
fn diagnosis_covers_every_cell() {
  let stages = process(&simulate_cells(0)).unwrap();
  let analysis = analyze(&stages.labels);
  let diagnosis = diagnose(&analysis);

  assert_eq!(diagnosis.verdicts.len(), analysis.count());
  assert_eq!(diagnosis.normal_count() + diagnosis.suspicious_count(), analysis.count());
  let report = diagnosis.to_string();
  assert!(report.contains(diagnosis.recommendation()));
}

#[test]
fn panel_is_saved_to_disk() {
  use dongcha::{FromUrl, output::SaveImageFileOutput};

  let image = simulate_cells(0);
  let stages = process(&image).unwrap();
  let analysis = analyze(&stages.labels);
  let edges = cell_edges(&stages.separated);
  let apps = applications(&image);
  let panel = render_panel(&stages, &analysis, &edges, &apps);

  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("nested").join("cells.png");
  let url = url::Url::parse(&format!("image://{}", path.display())).unwrap();
  let output = SaveImageFileOutput::from_url(&url).unwrap();
  output.save(&panel).unwrap();

  let saved = image::open(&path).unwrap().to_rgb8();
  assert_eq!(saved.dimensions(), panel.dimensions());
}
