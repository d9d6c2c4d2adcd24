// 该文件是 AtomFind 项目的一部分。
// src/detector/batch.rs - 批量坐标提取
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

use ndarray::{Array2, ArrayView2, ArrayView3, ArrayView4, Axis};
use tracing::{debug, info};

use crate::{
  detector::{DetectionTable, ExtractConfig, ExtractError},
  edge::remove_edge_coordinates,
};

/// 大于等于阈值的像素置 1，其余置 0
pub fn binarize(channel: ArrayView2<f32>, threshold: f32) -> Array2<f32> {
  channel.mapv(|v| if v >= threshold { 1.0 } else { 0.0 })
}

/// 从单张 `(H, W, C)` 解码图像中提取检测记录 `[row, col, channel]`。
///
/// 最后一个通道视为背景，不参与检测。
pub fn extract_image_coordinates(
  image: ArrayView3<f32>,
  target_size: [usize; 2],
  config: &ExtractConfig,
) -> Result<Array2<f64>, ExtractError> {
  let channels = image.len_of(Axis(2));
  let mut records: Vec<[f64; 3]> = Vec::new();

  for ch in 0..channels.saturating_sub(1) {
    let binary = binarize(image.index_axis(Axis(2), ch), config.threshold);
    let coords = config.detect(binary.view())?;
    let kept = remove_edge_coordinates(&coords, target_size, config.dist_edge);
    debug!("通道 {}: 检测 {} 个, 保留 {} 个", ch, coords.len(), kept.len());
    records.extend(kept.iter().map(|c| [c.row, c.col, ch as f64]));
  }

  Ok(Array2::from(records))
}

/// 对 `(N, H, W, C)` 批量逐图像、逐通道提取原子/缺陷坐标
pub fn extract_all_coordinates(
  decoded: ArrayView4<f32>,
  config: &ExtractConfig,
) -> Result<DetectionTable, ExtractError> {
  config.validate()?;

  let (count, height, width, channels) = decoded.dim();
  let target_size = config.target_size.unwrap_or([height, width]);
  info!(
    "使用 {} 方法提取 {} 张图像 ({}x{}, {} 通道) 的坐标",
    config.method, count, height, width, channels
  );

  let mut table = DetectionTable::default();
  for (index, image) in decoded.outer_iter().enumerate() {
    let records = extract_image_coordinates(image, target_size, config)?;
    debug!("图像 {}: {} 条检测记录", index, records.nrows());
    table.insert(index, records);
  }

  info!("原子/缺陷坐标提取完成，共 {} 条记录", table.total_detections());
  Ok(table)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detector::DetectMethod;
  use approx::assert_relative_eq;
  use ndarray::{Array4, s};

  fn paint_square(batch: &mut Array4<f32>, n: usize, ch: usize, row: usize, col: usize) {
    batch
      .slice_mut(s![n, row - 2..=row + 2, col - 2..=col + 2, ch])
      .fill(1.0);
  }

  #[test]
  fn all_zero_image_gives_empty_entry() {
    let batch = Array4::<f32>::zeros((1, 32, 32, 2));
    for method in [DetectMethod::Log, DetectMethod::Com] {
      let config = ExtractConfig::default().with_method(method);
      let table = extract_all_coordinates(batch.view(), &config).unwrap();
      assert_eq!(table.len(), 1);
      assert_eq!(table.get(0).unwrap().dim(), (0, 3));
    }
  }

  #[test]
  fn last_channel_is_never_processed() {
    let mut batch = Array4::<f32>::zeros((1, 32, 32, 2));
    paint_square(&mut batch, 0, 1, 16, 16);

    let config = ExtractConfig::default().with_method(DetectMethod::Com);
    let table = extract_all_coordinates(batch.view(), &config).unwrap();
    assert_eq!(table.get(0).unwrap().nrows(), 0);
  }

  #[test]
  fn records_are_tagged_with_channel_and_ordered() {
    let mut batch = Array4::<f32>::zeros((2, 40, 40, 3));
    paint_square(&mut batch, 0, 0, 10, 10);
    paint_square(&mut batch, 0, 0, 30, 20);
    paint_square(&mut batch, 0, 1, 20, 30);
    // 边缘处的斑点会被去除
    paint_square(&mut batch, 0, 1, 2, 20);
    paint_square(&mut batch, 1, 1, 15, 25);

    let config = ExtractConfig::default().with_method(DetectMethod::Com);
    let table = extract_all_coordinates(batch.view(), &config).unwrap();

    let first = table.get(0).unwrap();
    assert_eq!(first.dim(), (3, 3));
    assert_relative_eq!(first[[0, 0]], 10.0);
    assert_relative_eq!(first[[0, 2]], 0.0);
    assert_relative_eq!(first[[1, 0]], 30.0);
    assert_relative_eq!(first[[1, 1]], 20.0);
    assert_relative_eq!(first[[2, 1]], 30.0);
    assert_relative_eq!(first[[2, 2]], 1.0);

    let second = table.get(1).unwrap();
    assert_eq!(second.dim(), (1, 3));
    assert_relative_eq!(second[[0, 2]], 1.0);
    assert_eq!(table.total_detections(), 4);
  }

  #[test]
  fn threshold_is_inclusive() {
    let mut batch = Array4::<f32>::zeros((1, 20, 20, 2));
    batch.slice_mut(s![0, 8..=12, 8..=12, 0]).fill(0.8);

    let config = ExtractConfig::default()
      .with_method(DetectMethod::Com)
      .with_threshold(0.8);
    let table = extract_all_coordinates(batch.view(), &config).unwrap();
    assert_eq!(table.get(0).unwrap().nrows(), 1);

    let config = config.with_threshold(0.81);
    let table = extract_all_coordinates(batch.view(), &config).unwrap();
    assert_eq!(table.get(0).unwrap().nrows(), 0);
  }

  #[test]
  fn log_method_finds_blobs_away_from_edges() {
    let mut batch = Array4::<f32>::zeros((1, 48, 48, 2));
    for r in 0..48usize {
      for c in 0..48usize {
        let d = (r as f64 - 24.0).hypot(c as f64 - 24.0);
        if d <= 4.0 {
          batch[[0, r, c, 0]] = 0.95;
        }
      }
    }

    let table = extract_all_coordinates(batch.view(), &ExtractConfig::default()).unwrap();
    let records = table.get(0).unwrap();
    assert_eq!(records.nrows(), 1);
    assert!((records[[0, 0]] - 24.0).abs() <= 1.0);
    assert_relative_eq!(records[[0, 2]], 0.0);
  }

  #[test]
  fn log_method_keeps_every_atom_in_dense_lattice() {
    let mut batch = Array4::<f32>::zeros((1, 64, 64, 2));
    let mut centers = Vec::new();
    for i in 1..=7 {
      for j in 1..=7 {
        let (row, col) = (i * 8, j * 8);
        batch
          .slice_mut(s![0, row - 1..=row + 1, col - 1..=col + 1, 0])
          .fill(0.9);
        centers.push((row as f64, col as f64));
      }
    }

    let config = ExtractConfig::default().with_method(DetectMethod::Log);
    let table = extract_all_coordinates(batch.view(), &config).unwrap();
    let records = table.get(0).unwrap();
    assert_eq!(records.nrows(), 49);
    for record in records.outer_iter() {
      assert_relative_eq!(record[2], 0.0);
      assert!(
        centers
          .iter()
          .any(|&(r, c)| (record[0] - r).abs() <= 1.0 && (record[1] - c).abs() <= 1.0),
        "unexpected detection at ({}, {})",
        record[0],
        record[1]
      );
    }
  }

  #[test]
  fn explicit_target_size_drives_edge_filter() {
    let mut batch = Array4::<f32>::zeros((1, 40, 40, 2));
    paint_square(&mut batch, 0, 0, 30, 30);

    let config = ExtractConfig::default()
      .with_method(DetectMethod::Com)
      .with_target_size(Some([20, 20]));
    let table = extract_all_coordinates(batch.view(), &config).unwrap();
    assert_eq!(table.get(0).unwrap().nrows(), 0);
  }

  #[test]
  fn invalid_config_is_rejected_before_work() {
    let batch = Array4::<f32>::zeros((1, 8, 8, 2));
    let config = ExtractConfig::default().with_dist_edge(f64::NAN);
    assert!(matches!(
      extract_all_coordinates(batch.view(), &config),
      Err(ExtractError::InvalidConfig(_))
    ));
  }
}
