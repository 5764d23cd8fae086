// 该文件是 Dongcha （洞察） 项目的一部分。
// src/cells.rs - 显微细胞图像的形态学分析
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

//! # 细胞分析
//!
//! 在合成的显微图像上演示形态学处理的完整流程：
//!
//! 1. [`simulate_cells`] 生成带噪声、核与空洞的细胞图像；
//! 2. [`process`] 依次执行 Otsu 二值化、开运算、闭运算、腐蚀、距离变换与分水岭；
//! 3. [`analyze`] 统计每个细胞的面积、周长与圆度，[`diagnose`] 标记可疑细胞；
//! 4. [`render_panel`] 把各阶段结果拼成 3x3 的图像。

mod analysis;
mod panel;
mod pipeline;
mod synth;

pub use self::analysis::{
  Applications, CellAnalysis, CellStatus, CellVerdict, Diagnosis, analyze, applications, cell_edges, diagnose,
};
pub use self::panel::render_panel;
pub use self::pipeline::{CellStages, process};
pub use self::synth::{CELLS, IMAGE_SIZE, TOUCHING_CELLS, simulate_cells};
