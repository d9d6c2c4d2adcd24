// 该文件是 AtomFind 项目的一部分。
// src/detector.rs - 坐标检测定义
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

use std::{collections::BTreeMap, fmt, str::FromStr};

use imageproc::region_labelling::Connectivity;
use ndarray::{Array2, ArrayView2};
use thiserror::Error;

mod batch;
mod center_of_mass;
mod log_blob;

pub use self::batch::{binarize, extract_all_coordinates, extract_image_coordinates};
pub use self::center_of_mass::find_com;
pub use self::log_blob::blob_log;

#[derive(Error, Debug)]
pub enum ExtractError {
  #[error("未知的检测方法: '{0}'，可选 LoG 或 CoM")]
  UnknownMethod(String),
  #[error("参数无效: {0}")]
  InvalidConfig(String),
}

/// 像素坐标 `(row, col)`，LoG 检测时附带尺度 `sigma`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
  pub row: f64,
  pub col: f64,
  pub scale: Option<f64>,
}

impl Coordinate {
  pub fn new(row: f64, col: f64) -> Self {
    Self {
      row,
      col,
      scale: None,
    }
  }

  pub fn with_scale(mut self, scale: f64) -> Self {
    self.scale = Some(scale);
    self
  }
}

/// 坐标提取方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectMethod {
  /// 高斯拉普拉斯斑点检测
  #[default]
  Log,
  /// 连通域质心
  Com,
}

impl FromStr for DetectMethod {
  type Err = ExtractError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "log" => Ok(DetectMethod::Log),
      "com" => Ok(DetectMethod::Com),
      _ => Err(ExtractError::UnknownMethod(s.to_string())),
    }
  }
}

impl fmt::Display for DetectMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DetectMethod::Log => f.write_str("LoG"),
      DetectMethod::Com => f.write_str("CoM"),
    }
  }
}

/// LoG 斑点检测参数
#[derive(Debug, Clone, PartialEq)]
pub struct LogParams {
  pub min_sigma: f64,
  pub max_sigma: f64,
  pub num_sigma: usize,
  /// 尺度空间响应的绝对阈值
  pub threshold: f64,
  /// 两个斑点重叠面积超过该比例时去除较小者
  pub overlap: f64,
}

impl Default for LogParams {
  fn default() -> Self {
    Self {
      min_sigma: 1.5,
      max_sigma: 10.0,
      num_sigma: 10,
      threshold: 0.2,
      overlap: 0.5,
    }
  }
}

impl LogParams {
  pub fn validate(&self) -> Result<(), ExtractError> {
    if !(self.min_sigma.is_finite() && self.min_sigma > 0.0) {
      return Err(ExtractError::InvalidConfig(format!(
        "min_sigma 必须为正数, 实际为 {}",
        self.min_sigma
      )));
    }
    if !(self.max_sigma.is_finite() && self.max_sigma >= self.min_sigma) {
      return Err(ExtractError::InvalidConfig(format!(
        "max_sigma ({}) 不能小于 min_sigma ({})",
        self.max_sigma, self.min_sigma
      )));
    }
    if self.num_sigma == 0 {
      return Err(ExtractError::InvalidConfig("num_sigma 不能为 0".to_string()));
    }
    if !self.threshold.is_finite() {
      return Err(ExtractError::InvalidConfig(format!(
        "LoG 阈值无效: {}",
        self.threshold
      )));
    }
    if !(0.0..=1.0).contains(&self.overlap) {
      return Err(ExtractError::InvalidConfig(format!(
        "overlap 必须位于 [0, 1], 实际为 {}",
        self.overlap
      )));
    }
    Ok(())
  }
}

/// 批量坐标提取配置
#[derive(Debug, Clone)]
pub struct ExtractConfig {
  pub method: DetectMethod,
  pub log: LogParams,
  /// 二值化阈值，大于等于该值的像素视为前景
  pub threshold: f32,
  /// 边缘带宽度（像素）
  pub dist_edge: f64,
  /// 边缘过滤使用的图像尺寸，未设置时取输入批量的空间尺寸
  pub target_size: Option<[usize; 2]>,
  pub connectivity: Connectivity,
}

impl Default for ExtractConfig {
  fn default() -> Self {
    Self {
      method: DetectMethod::default(),
      log: LogParams::default(),
      threshold: 0.8,
      dist_edge: 3.0,
      target_size: None,
      connectivity: Connectivity::Four,
    }
  }
}

impl ExtractConfig {
  pub fn with_method(mut self, method: DetectMethod) -> Self {
    self.method = method;
    self
  }

  pub fn with_log_params(mut self, log: LogParams) -> Self {
    self.log = log;
    self
  }

  pub fn with_threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn with_dist_edge(mut self, dist_edge: f64) -> Self {
    self.dist_edge = dist_edge;
    self
  }

  pub fn with_target_size(mut self, target_size: Option<[usize; 2]>) -> Self {
    self.target_size = target_size;
    self
  }

  pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
    self.connectivity = connectivity;
    self
  }

  pub fn validate(&self) -> Result<(), ExtractError> {
    if !self.threshold.is_finite() {
      return Err(ExtractError::InvalidConfig(format!(
        "二值化阈值无效: {}",
        self.threshold
      )));
    }
    if !(self.dist_edge.is_finite() && self.dist_edge >= 0.0) {
      return Err(ExtractError::InvalidConfig(format!(
        "边缘距离必须为非负数, 实际为 {}",
        self.dist_edge
      )));
    }
    if self.method == DetectMethod::Log {
      self.log.validate()?;
    }
    Ok(())
  }

  /// 对单个二值通道执行所选的检测方法
  pub fn detect(&self, channel: ArrayView2<f32>) -> Result<Vec<Coordinate>, ExtractError> {
    match self.method {
      DetectMethod::Log => blob_log(channel, &self.log),
      DetectMethod::Com => Ok(find_com(channel, self.connectivity)),
    }
  }
}

/// 每张图像的检测记录，键为图像在批量中的序号，
/// 值为 `(K, 3)` 数组，每行 `[row, col, channel]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionTable {
  entries: BTreeMap<usize, Array2<f64>>,
}

impl DetectionTable {
  pub(crate) fn insert(&mut self, index: usize, records: Array2<f64>) {
    self.entries.insert(index, records);
  }

  pub fn get(&self, index: usize) -> Option<&Array2<f64>> {
    self.entries.get(&index)
  }

  pub fn iter(&self) -> impl Iterator<Item = (usize, &Array2<f64>)> {
    self.entries.iter().map(|(i, records)| (*i, records))
  }

  /// 图像数量
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// 全部图像的检测总数
  pub fn total_detections(&self) -> usize {
    self.entries.values().map(|r| r.nrows()).sum()
  }
}
