// 该文件是 Dongcha （洞察） 项目的一部分。
// src/model/labels.rs - 类别标签
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

use super::WithLabel;

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// DOTA v1 数据集类别名称（旋转框模型使用）
pub const DOTA_CLASSES: [&str; 15] = [
  "plane",
  "ship",
  "storage tank",
  "baseball diamond",
  "tennis court",
  "basketball court",
  "ground track field",
  "harbor",
  "bridge",
  "large vehicle",
  "small vehicle",
  "helicopter",
  "roundabout",
  "soccer ball field",
  "swimming pool",
];

macro_rules! label_set {
  ($(#[$meta:meta])* $name:ident, $table:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct $name(pub u32);

    impl WithLabel for $name {
      fn to_label_str(&self) -> String {
        $table
          .get(self.0 as usize)
          .map(|s| s.to_string())
          .unwrap_or_else(|| format!("class{}", self.0))
      }

      fn to_label_id(&self) -> u32 {
        self.0
      }

      fn from_label_id(id: u32) -> Self {
        $name(id)
      }

      fn num_classes() -> usize {
        $table.len()
      }
    }
  };
}

label_set!(
  /// COCO-80 标签
  CocoLabel,
  COCO_CLASSES
);

label_set!(
  /// DOTA-v1 标签
  DotaLabel,
  DOTA_CLASSES
);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn label_names_and_fallback() {
    assert_eq!(CocoLabel(0).to_label_str(), "person");
    assert_eq!(CocoLabel(5).to_label_str(), "bus");
    assert_eq!(CocoLabel(99).to_label_str(), "class99");
    assert_eq!(DotaLabel::from_label_id(1).to_label_str(), "ship");
    assert_eq!(DotaLabel::num_classes(), 15);
  }
}
