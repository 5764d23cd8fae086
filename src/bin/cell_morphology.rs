// 该文件是 Dongcha （洞察） 项目的一部分。
// src/bin/cell_morphology.rs - 细胞形态学分析演示
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

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use dongcha::{
  FromUrl,
  cells::{analyze, applications, cell_edges, diagnose, process, render_panel, simulate_cells},
  output::SaveImageFileOutput,
};

/// 生成合成细胞图像，完成分割、计数与形态分析，并保存九宫格结果图
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 随机种子
  #[arg(long, value_name = "SEED", default_value_t = 0)]
  pub seed: u64,
  /// 结果图保存路径
  #[arg(long, value_name = "OUTPUT", default_value = "image:///tmp/dongcha/cells.png")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("随机种子: {}", args.seed);
  info!("输出路径: {}", args.output);

  let output = SaveImageFileOutput::from_url(&args.output)?;

  let now = Instant::now();
  let image = simulate_cells(args.seed);
  let stages = process(&image)?;
  info!("Otsu 阈值: {}", stages.threshold);
  info!("分割完成，耗时: {:.2?}", now.elapsed());

  let analysis = analyze(&stages.labels);
  let edges = cell_edges(&stages.separated);
  let apps = applications(&image);
  let diagnosis = diagnose(&analysis);

  let panel = render_panel(&stages, &analysis, &edges, &apps);
  output.save(&panel)?;
  info!("结果图已保存到 {}", output.path().display());

  println!("{}", analysis);
  println!("{}", diagnosis);
  Ok(())
}
