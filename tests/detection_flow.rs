// 该文件是 Dongcha （洞察） 项目的一部分。
// tests/detection_flow.rs - 解码、跟踪与输出的集成测试
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

use std::{cell::RefCell, path::Path, sync::mpsc};

use image::RgbImage;

use dongcha::{
  FromUrl,
  frame::RgbFrame,
  model::{
    CocoLabel, DecodeConfig, DetectResult, Letterbox, Model, RawOutput, YoloTask,
    postprocess::{DecodeError, decode},
  },
  output::{DirectoryRecordOutput, DirectoryRecordOutputError, Render},
  task::{ContinuousTask, Task},
  track::{TrackerConfig, TrackingModel},
};

const COCO_CHANNELS: usize = 4 + 80;

/// 按 [1, C, N] 布局写出检测张量，每个锚点为 (cx, cy, w, h, 类别, 分数)
fn detect_tensor(anchors: &[([f32; 4], usize, f32)]) -> RawOutput {
  let n = anchors.len();
  let mut data = vec![0.0f32; COCO_CHANNELS * n];
  for (i, (xywh, class_id, score)) in anchors.iter().enumerate() {
    for (c, v) in xywh.iter().enumerate() {
      data[c * n + i] = *v;
    }
    data[(4 + class_id) * n + i] = *score;
  }
  RawOutput::new(vec![1, COCO_CHANNELS, n], data)
}

#[test]
fn decodes_letterboxed_detections() {
  // 1280x640 缩放到 640x320，上下各填充 160
  let letterbox = Letterbox::new(1280, 640, 640);
  let output = detect_tensor(&[
    ([100.0, 260.0, 40.0, 80.0], 0, 0.9),
    ([102.0, 261.0, 40.0, 80.0], 0, 0.8),
    ([400.0, 300.0, 120.0, 60.0], 2, 0.7),
    ([500.0, 400.0, 20.0, 20.0], 5, 0.1),
  ]);

  let result: DetectResult<CocoLabel> =
    decode(YoloTask::Detect, &[output], &letterbox, &DecodeConfig::default()).unwrap();

  assert_eq!(result.len(), 2);
  assert_eq!(result.names(), vec!["person".to_string(), "car".to_string()]);
  assert_eq!(result.cls(), vec![0, 2]);

  let [x1, y1, x2, y2] = result.xyxy()[0];
  for (got, want) in [(x1, 160.0), (y1, 120.0), (x2, 240.0), (y2, 280.0)] {
    assert!((got - want).abs() < 0.5, "{} != {}", got, want);
  }
  assert!(result.xyxyn()[0].iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn rejects_tensor_without_class_channels() {
  let letterbox = Letterbox::new(640, 640, 640);
  let output = RawOutput::new(vec![1, 4, 2], vec![0.0; 8]);
  let result = decode::<CocoLabel>(YoloTask::Detect, &[output], &letterbox, &DecodeConfig::default());
  assert!(result.is_err());
}

/// 每帧把两个目标向右平移，模拟检测模型
struct MovingObjects;

impl Model for MovingObjects {
  type Input = RgbFrame;
  type Output = DetectResult<CocoLabel>;
  type Error = DecodeError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let dx = input.index as f32 * 4.0;
    let letterbox = Letterbox::new(input.width(), input.height(), 640);
    let output = detect_tensor(&[
      ([100.0 + dx, 200.0, 40.0, 80.0], 0, 0.9),
      ([400.0 + dx, 300.0, 120.0, 60.0], 2, 0.85),
    ]);
    decode(YoloTask::Detect, &[output], &letterbox, &DecodeConfig::default())
  }
}

/// 记录每帧的轨迹编号，同时写入目录
struct Recorder {
  folder: DirectoryRecordOutput,
  ids: RefCell<Vec<Vec<u64>>>,
}

impl Render<RgbFrame, DetectResult<CocoLabel>> for &Recorder {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbFrame, result: &DetectResult<CocoLabel>) -> Result<(), Self::Error> {
    let mut ids: Vec<u64> = result.ids().into_iter().flatten().collect();
    ids.sort_unstable();
    self.ids.borrow_mut().push(ids);
    self.folder.render_result(frame, result)
  }
}

fn count_png(dir: &Path) -> usize {
  std::fs::read_dir(dir)
    .unwrap()
    .map(|entry| entry.unwrap().path())
    .map(|path| {
      if path.is_dir() {
        count_png(&path)
      } else {
        usize::from(path.extension().is_some_and(|e| e == "png"))
      }
    })
    .sum()
}

#[test]
fn tracked_ids_stay_stable_across_frames() {
  let dir = tempfile::tempdir().unwrap();
  let url = url::Url::parse(&format!("folder://{}?always", dir.path().display())).unwrap();
  let recorder = Recorder {
    folder: DirectoryRecordOutput::from_url(&url).unwrap(),
    ids: RefCell::new(Vec::new()),
  };

  let frames = (0..6).map(|i| RgbFrame::new(RgbImage::new(640, 640), i, i * 33));
  let model = TrackingModel::new(MovingObjects, TrackerConfig::default());
  let (_tx, rx) = mpsc::channel();

  ContinuousTask::default()
    .with_interrupt(rx)
    .run_task(frames, model, &recorder)
    .unwrap();

  let ids = recorder.ids.into_inner();
  assert_eq!(ids.len(), 6);
  assert_eq!(ids[0].len(), 2);
  assert!(ids.iter().all(|frame_ids| *frame_ids == ids[0]));
  assert_eq!(count_png(dir.path()), 6);
}

#[test]
fn frame_limit_stops_the_loop() {
  let dir = tempfile::tempdir().unwrap();
  let url = url::Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
  let recorder = Recorder {
    folder: DirectoryRecordOutput::from_url(&url).unwrap(),
    ids: RefCell::new(Vec::new()),
  };

  let frames = (0..100).map(|i| RgbFrame::new(RgbImage::new(320, 240), i, 0));
  let (_tx, rx) = mpsc::channel();

  ContinuousTask::default()
    .with_frame_number(Some(3))
    .with_interrupt(rx)
    .run_task(frames, MovingObjects, &recorder)
    .unwrap();

  assert_eq!(recorder.ids.borrow().len(), 3);
}
