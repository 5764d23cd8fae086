// 该文件是 Dongcha （洞察） 项目的一部分。
// src/track.rs - 多目标跟踪
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

//! ByteTrack 多目标跟踪。
//!
//! 高分检测先与已跟踪和丢失的轨迹按 IoU 关联，低分检测再与剩余的已跟踪轨迹关联，
//! 这样被遮挡后置信度下降的目标也能保持编号。轨迹状态跨帧保存。

use std::cell::RefCell;

use tracing::debug;

use crate::model::{DetectResult, Model, WithLabel, postprocess::iou};

mod kalman;

pub use self::kalman::KalmanFilterXyah;
use self::kalman::{StateCov, StateMean, mean_to_xyxy, xyxy_to_xyah};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
  /// 第一轮关联的检测置信度下限
  pub track_high_thresh: f32,
  /// 第二轮关联的检测置信度下限
  pub track_low_thresh: f32,
  /// 新建轨迹需要的置信度
  pub new_track_thresh: f32,
  /// 丢失轨迹保留的帧数
  pub track_buffer: u32,
  /// 第一轮关联的代价上限（1 - IoU）
  pub match_thresh: f32,
  pub frame_rate: u32,
}

impl Default for TrackerConfig {
  fn default() -> Self {
    Self {
      track_high_thresh: 0.5,
      track_low_thresh: 0.1,
      new_track_thresh: 0.6,
      track_buffer: 30,
      match_thresh: 0.8,
      frame_rate: 30,
    }
  }
}

impl TrackerConfig {
  fn max_time_lost(&self) -> u64 {
    (self.frame_rate as f32 / 30.0 * self.track_buffer as f32) as u64
  }
}

// 第二轮与未确认轨迹关联的代价上限
const SECOND_MATCH_THRESH: f32 = 0.5;
const UNCONFIRMED_MATCH_THRESH: f32 = 0.7;
const DUPLICATE_THRESH: f32 = 0.15;

/// 跟踪器的输入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub bbox: [f32; 4],
  pub score: f32,
  pub class_id: u32,
}

/// 本帧被跟踪到的目标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedObject {
  pub track_id: u64,
  /// 滤波后的框
  pub bbox: [f32; 4],
  pub score: f32,
  pub class_id: u32,
  /// 对应的检测下标
  pub det_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackState {
  Tracked,
  Lost,
}

#[derive(Debug, Clone)]
struct STrack {
  track_id: u64,
  mean: StateMean,
  cov: StateCov,
  state: TrackState,
  is_activated: bool,
  score: f32,
  class_id: u32,
  det_index: usize,
  start_frame: u64,
  /// 最后一次更新的帧号
  frame_id: u64,
}

impl STrack {
  fn bbox(&self) -> [f32; 4] {
    mean_to_xyxy(&self.mean)
  }

  fn update(&mut self, kf: &KalmanFilterXyah, det: &Detection, det_index: usize, frame_id: u64) {
    let (mean, cov) = kf.update(&self.mean, &self.cov, &xyxy_to_xyah(det.bbox));
    self.mean = mean;
    self.cov = cov;
    self.state = TrackState::Tracked;
    self.is_activated = true;
    self.score = det.score;
    self.class_id = det.class_id;
    self.det_index = det_index;
    self.frame_id = frame_id;
  }

  fn predict(&mut self, kf: &KalmanFilterXyah) {
    let mut mean = self.mean;
    if self.state != TrackState::Tracked {
      mean[7] = 0.0;
    }
    let (mean, cov) = kf.predict(&mean, &self.cov);
    self.mean = mean;
    self.cov = cov;
  }
}

/// 贪心匹配：按代价从小到大接受不冲突、且不超过阈值的配对
///
/// 返回 (匹配对, 未匹配的轨迹, 未匹配的检测)
fn greedy_assignment(
  cost: &[Vec<f32>],
  num_dets: usize,
  thresh: f32,
) -> (Vec<(usize, usize)>, Vec<usize>, Vec<usize>) {
  let mut pairs: Vec<(f32, usize, usize)> = cost
    .iter()
    .enumerate()
    .flat_map(|(t, row)| row.iter().enumerate().map(move |(d, &c)| (c, t, d)))
    .filter(|(c, _, _)| *c <= thresh)
    .collect();
  pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

  let mut track_used = vec![false; cost.len()];
  let mut det_used = vec![false; num_dets];
  let mut matches = Vec::new();
  for (_, t, d) in pairs {
    if !track_used[t] && !det_used[d] {
      track_used[t] = true;
      det_used[d] = true;
      matches.push((t, d));
    }
  }
  let unmatched_tracks = (0..cost.len()).filter(|&t| !track_used[t]).collect();
  let unmatched_dets = (0..num_dets).filter(|&d| !det_used[d]).collect();
  (matches, unmatched_tracks, unmatched_dets)
}

fn iou_cost(tracks: &[STrack], dets: &[(usize, Detection)]) -> Vec<Vec<f32>> {
  tracks
    .iter()
    .map(|t| {
      let tb = t.bbox();
      dets.iter().map(|(_, d)| 1.0 - iou(tb, d.bbox)).collect()
    })
    .collect()
}

#[derive(Debug)]
pub struct ByteTracker {
  config: TrackerConfig,
  kalman: KalmanFilterXyah,
  frame_id: u64,
  next_id: u64,
  tracked: Vec<STrack>,
  lost: Vec<STrack>,
}

impl Default for ByteTracker {
  fn default() -> Self {
    Self::new(TrackerConfig::default())
  }
}

impl ByteTracker {
  pub fn new(config: TrackerConfig) -> Self {
    Self {
      config,
      kalman: KalmanFilterXyah::default(),
      frame_id: 0,
      next_id: 1,
      tracked: Vec::new(),
      lost: Vec::new(),
    }
  }

  pub fn config(&self) -> &TrackerConfig {
    &self.config
  }

  pub fn frame_id(&self) -> u64 {
    self.frame_id
  }

  /// 清空所有轨迹，编号不回退
  pub fn reset(&mut self) {
    self.frame_id = 0;
    self.tracked.clear();
    self.lost.clear();
  }

  fn new_track(&mut self, det: &Detection, det_index: usize) -> STrack {
    let (mean, cov) = self.kalman.initiate(&xyxy_to_xyah(det.bbox));
    let track = STrack {
      track_id: self.next_id,
      mean,
      cov,
      state: TrackState::Tracked,
      // 第一帧的轨迹直接确认
      is_activated: self.frame_id == 1,
      score: det.score,
      class_id: det.class_id,
      det_index,
      start_frame: self.frame_id,
      frame_id: self.frame_id,
    };
    self.next_id += 1;
    track
  }

  /// 输入一帧的检测结果，返回本帧已确认的轨迹
  pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackedObject> {
    self.frame_id += 1;
    let frame_id = self.frame_id;
    let cfg = self.config;

    let high: Vec<(usize, Detection)> = detections
      .iter()
      .copied()
      .enumerate()
      .filter(|(_, d)| d.score >= cfg.track_high_thresh)
      .collect();
    let low: Vec<(usize, Detection)> = detections
      .iter()
      .copied()
      .enumerate()
      .filter(|(_, d)| d.score > cfg.track_low_thresh && d.score < cfg.track_high_thresh)
      .collect();

    let (confirmed, unconfirmed): (Vec<STrack>, Vec<STrack>) =
      std::mem::take(&mut self.tracked).into_iter().partition(|t| t.is_activated);
    let mut pool: Vec<STrack> = confirmed;
    pool.append(&mut self.lost);
    for track in pool.iter_mut() {
      track.predict(&self.kalman);
    }

    let mut activated: Vec<STrack> = Vec::new();

    // 第一轮：高分检测
    let cost = iou_cost(&pool, &high);
    let (matches, _, unmatched_high) = greedy_assignment(&cost, high.len(), cfg.match_thresh);
    let mut pool_slots: Vec<Option<STrack>> = pool.into_iter().map(Some).collect();
    for (t, d) in matches {
      if let Some(mut track) = pool_slots[t].take() {
        let (index, det) = high[d];
        track.update(&self.kalman, &det, index, frame_id);
        activated.push(track);
      }
    }
    let remaining: Vec<STrack> = pool_slots.into_iter().flatten().collect();
    let (r_tracked, mut still_lost): (Vec<STrack>, Vec<STrack>) = remaining
      .into_iter()
      .partition(|t| t.state == TrackState::Tracked);

    // 第二轮：低分检测只与本来处于跟踪状态的轨迹关联
    let cost = iou_cost(&r_tracked, &low);
    let (matches, _, _) = greedy_assignment(&cost, low.len(), SECOND_MATCH_THRESH);
    let mut slots: Vec<Option<STrack>> = r_tracked.into_iter().map(Some).collect();
    for (t, d) in matches {
      if let Some(mut track) = slots[t].take() {
        let (index, det) = low[d];
        track.update(&self.kalman, &det, index, frame_id);
        activated.push(track);
      }
    }
    for mut track in slots.into_iter().flatten() {
      track.state = TrackState::Lost;
      still_lost.push(track);
    }

    // 未确认轨迹只能与剩余的高分检测关联，失败即删除
    let rest_high: Vec<(usize, Detection)> = unmatched_high.iter().map(|&d| high[d]).collect();
    let cost = iou_cost(&unconfirmed, &rest_high);
    let (matches, _, unmatched_rest) =
      greedy_assignment(&cost, rest_high.len(), UNCONFIRMED_MATCH_THRESH);
    let mut slots: Vec<Option<STrack>> = unconfirmed.into_iter().map(Some).collect();
    for (t, d) in matches {
      if let Some(mut track) = slots[t].take() {
        let (index, det) = rest_high[d];
        track.update(&self.kalman, &det, index, frame_id);
        activated.push(track);
      }
    }
    let removed = slots.into_iter().flatten().count();
    if removed > 0 {
      debug!("删除 {} 条未确认的轨迹", removed);
    }

    // 新建轨迹
    for d in unmatched_rest {
      let (index, det) = rest_high[d];
      if det.score < cfg.new_track_thresh {
        continue;
      }
      let track = self.new_track(&det, index);
      activated.push(track);
    }

    // 超时的丢失轨迹
    let max_time_lost = cfg.max_time_lost();
    still_lost.retain(|t| frame_id - t.frame_id <= max_time_lost);

    let (tracked, lost) = remove_duplicates(activated, still_lost, frame_id);
    self.tracked = tracked;
    self.lost = lost;

    debug!(
      "第 {} 帧: 跟踪中 {} 条, 丢失 {} 条",
      frame_id,
      self.tracked.len(),
      self.lost.len()
    );

    self
      .tracked
      .iter()
      .filter(|t| t.is_activated)
      .map(|t| TrackedObject {
        track_id: t.track_id,
        bbox: t.bbox(),
        score: t.score,
        class_id: t.class_id,
        det_index: t.det_index,
      })
      .collect()
  }
}

/// 跟踪中与丢失的轨迹高度重合时，保留存在时间更长的一条
fn remove_duplicates(tracked: Vec<STrack>, lost: Vec<STrack>, frame_id: u64) -> (Vec<STrack>, Vec<STrack>) {
  let mut drop_tracked = vec![false; tracked.len()];
  let mut drop_lost = vec![false; lost.len()];
  for (i, t) in tracked.iter().enumerate() {
    for (j, l) in lost.iter().enumerate() {
      if 1.0 - iou(t.bbox(), l.bbox()) < DUPLICATE_THRESH {
        let age_t = frame_id - t.start_frame;
        let age_l = frame_id - l.start_frame;
        if age_t > age_l {
          drop_lost[j] = true;
        } else {
          drop_tracked[i] = true;
        }
      }
    }
  }
  (
    tracked
      .into_iter()
      .zip(drop_tracked)
      .filter_map(|(t, d)| (!d).then_some(t))
      .collect(),
    lost
      .into_iter()
      .zip(drop_lost)
      .filter_map(|(t, d)| (!d).then_some(t))
      .collect(),
  )
}

/// 在检测模型之后运行跟踪器，把轨迹编号写回检测结果
pub struct TrackingModel<M> {
  model: M,
  tracker: RefCell<ByteTracker>,
}

impl<M> TrackingModel<M> {
  pub fn new(model: M, config: TrackerConfig) -> Self {
    Self {
      model,
      tracker: RefCell::new(ByteTracker::new(config)),
    }
  }

  pub fn inner(&self) -> &M {
    &self.model
  }
}

impl<M, T> Model for TrackingModel<M>
where
  M: Model<Output = DetectResult<T>>,
  T: WithLabel,
{
  type Input = M::Input;
  type Output = DetectResult<T>;
  type Error = M::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let result = self.model.infer(input)?;
    let detections: Vec<Detection> = result
      .items
      .iter()
      .map(|item| Detection {
        bbox: item.bbox,
        score: item.score,
        class_id: item.kind.to_label_id(),
      })
      .collect();

    let tracks = self.tracker.borrow_mut().update(&detections);
    let (w, h) = (result.orig_width as f32, result.orig_height as f32);
    let items = tracks
      .iter()
      .filter_map(|track| {
        let mut item = result.items.get(track.det_index)?.clone();
        item.track_id = Some(track.track_id);
        item.bbox = [
          track.bbox[0].clamp(0.0, w),
          track.bbox[1].clamp(0.0, h),
          track.bbox[2].clamp(0.0, w),
          track.bbox[3].clamp(0.0, h),
        ];
        Some(item)
      })
      .collect();

    Ok(DetectResult::new(result.orig_width, result.orig_height, items))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn det(x: f32, y: f32, score: f32) -> Detection {
    Detection {
      bbox: [x, y, x + 40.0, y + 80.0],
      score,
      class_id: 0,
    }
  }

  #[test]
  fn first_frame_tracks_are_confirmed() {
    let mut tracker = ByteTracker::default();
    let out = tracker.update(&[det(10.0, 10.0, 0.9), det(200.0, 10.0, 0.8)]);
    assert_eq!(out.len(), 2);
    let mut ids: Vec<u64> = out.iter().map(|t| t.track_id).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2]);
  }

  #[test]
  fn moving_object_keeps_its_id() {
    let mut tracker = ByteTracker::default();
    for frame in 0..20 {
      let out = tracker.update(&[det(10.0 + 4.0 * frame as f32, 20.0, 0.9)]);
      assert_eq!(out.len(), 1, "frame {}", frame);
      assert_eq!(out[0].track_id, 1);
      assert_eq!(out[0].det_index, 0);
    }
  }

  #[test]
  fn new_object_is_confirmed_on_second_sighting() {
    let mut tracker = ByteTracker::default();
    tracker.update(&[det(10.0, 10.0, 0.9)]);
    let out = tracker.update(&[det(10.0, 10.0, 0.9), det(300.0, 10.0, 0.9)]);
    assert_eq!(out.len(), 1);
    let out = tracker.update(&[det(10.0, 10.0, 0.9), det(300.0, 10.0, 0.9)]);
    assert_eq!(out.len(), 2);
    let new = out.iter().find(|t| t.det_index == 1).unwrap();
    assert_eq!(new.track_id, 2);
  }

  #[test]
  fn unconfirmed_track_dies_when_unmatched() {
    let mut tracker = ByteTracker::default();
    tracker.update(&[det(10.0, 10.0, 0.9)]);
    tracker.update(&[det(10.0, 10.0, 0.9), det(300.0, 10.0, 0.9)]);
    tracker.update(&[det(10.0, 10.0, 0.9)]);
    let out = tracker.update(&[det(10.0, 10.0, 0.9), det(300.0, 10.0, 0.9)]);
    // 第二次出现时是新的未确认轨迹
    assert_eq!(out.len(), 1);
    let out = tracker.update(&[det(10.0, 10.0, 0.9), det(300.0, 10.0, 0.9)]);
    let ids: Vec<u64> = out.iter().map(|t| t.track_id).collect();
    assert!(ids.contains(&3));
  }

  #[test]
  fn low_score_detection_keeps_track_alive() {
    let mut tracker = ByteTracker::default();
    tracker.update(&[det(50.0, 50.0, 0.9)]);
    let out = tracker.update(&[det(51.0, 50.0, 0.3)]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].track_id, 1);
    assert!((out[0].score - 0.3).abs() < 1e-6);
  }

  #[test]
  fn low_score_detection_never_starts_a_track() {
    let mut tracker = ByteTracker::default();
    assert!(tracker.update(&[det(50.0, 50.0, 0.3)]).is_empty());
    // 高于 high 阈值但低于新建阈值
    assert!(tracker.update(&[det(50.0, 50.0, 0.55)]).is_empty());
    assert!(tracker.update(&[det(50.0, 50.0, 0.55)]).is_empty());
  }

  #[test]
  fn lost_track_is_recovered_within_buffer() {
    let mut tracker = ByteTracker::default();
    tracker.update(&[det(50.0, 50.0, 0.9)]);
    tracker.update(&[det(50.0, 50.0, 0.9)]);
    for _ in 0..5 {
      assert!(tracker.update(&[]).is_empty());
    }
    let out = tracker.update(&[det(50.0, 50.0, 0.9)]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].track_id, 1);
  }

  #[test]
  fn lost_track_expires_and_ids_are_not_reused() {
    let mut tracker = ByteTracker::default();
    tracker.update(&[det(50.0, 50.0, 0.9)]);
    for _ in 0..40 {
      tracker.update(&[]);
    }
    assert!(tracker.update(&[det(50.0, 50.0, 0.9)]).is_empty());
    let out = tracker.update(&[det(50.0, 50.0, 0.9)]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].track_id, 2);
  }

  #[test]
  fn greedy_assignment_prefers_lowest_cost() {
    let cost = vec![vec![0.1, 0.3], vec![0.2, 0.9]];
    let (matches, ut, ud) = greedy_assignment(&cost, 2, 0.8);
    assert_eq!(matches, vec![(0, 0)]);
    assert_eq!(ut, vec![1]);
    assert_eq!(ud, vec![1]);
  }
}
