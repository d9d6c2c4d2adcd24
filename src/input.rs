// 该文件是 AtomFind 项目的一部分。
// src/input.rs - 训练数据输入
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

use ndarray::ArrayD;
use thiserror::Error;

mod npz_dataset;
pub use self::npz_dataset::load_training_data;

/// 图像数据集名称
pub const IMAGES_DATASET: &str = "Images";
/// 标注数据集名称
pub const GROUND_TRUTH_DATASET: &str = "GT";

#[derive(Error, Debug)]
pub enum InputError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("NPZ 文件读取错误: {0}")]
  Npz(#[from] ndarray_npy::ReadNpzError),
  #[error("文件中缺少数据集: {0}")]
  MissingDataset(String),
  #[error("数据集 {0} 的元素类型不受支持")]
  UnsupportedDtype(String),
  #[error("样本数量不一致: Images 为 {images}, GT 为 {ground_truth}")]
  SampleCountMismatch { images: usize, ground_truth: usize },
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemeMismatch { expected: &'static str, found: String },
}

/// 训练图像与对应的标注数据，按样本维度对齐
#[derive(Debug, Clone)]
pub struct Dataset {
  pub images: ArrayD<f32>,
  pub ground_truth: ArrayD<f32>,
}

impl Dataset {
  pub fn new(images: ArrayD<f32>, ground_truth: ArrayD<f32>) -> Result<Self, InputError> {
    let images_len = images.shape().first().copied().unwrap_or(0);
    let ground_truth_len = ground_truth.shape().first().copied().unwrap_or(0);
    if images_len != ground_truth_len {
      return Err(InputError::SampleCountMismatch {
        images: images_len,
        ground_truth: ground_truth_len,
      });
    }

    Ok(Self {
      images,
      ground_truth,
    })
  }

  /// 样本数量
  pub fn len(&self) -> usize {
    self.images.shape().first().copied().unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
