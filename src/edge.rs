// 该文件是 AtomFind 项目的一部分。
// src/edge.rs - 图像边缘坐标过滤
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

use tracing::debug;

use crate::detector::Coordinate;

/// 判断坐标是否落在边缘带内，依次返回
/// `[row > H - D, row < D, col > H - D, col < D]`。
///
/// 列方向同样以 `target_size[0]` 作为上界，与训练数据（正方形图像）的约定保持一致。
pub fn edge_flags(coord: &Coordinate, target_size: [usize; 2], dist_edge: f64) -> [bool; 4] {
  let upper = target_size[0] as f64 - dist_edge;
  [
    coord.row > upper,
    coord.row < dist_edge,
    coord.col > upper,
    coord.col < dist_edge,
  ]
}

pub fn is_on_edge(coord: &Coordinate, target_size: [usize; 2], dist_edge: f64) -> bool {
  edge_flags(coord, target_size, dist_edge).into_iter().any(|f| f)
}

/// 去除边缘带内的坐标，其余坐标保持原有顺序
pub fn remove_edge_coordinates(
  coords: &[Coordinate],
  target_size: [usize; 2],
  dist_edge: f64,
) -> Vec<Coordinate> {
  let kept: Vec<Coordinate> = coords
    .iter()
    .filter(|c| !is_on_edge(c, target_size, dist_edge))
    .copied()
    .collect();
  debug!("边缘过滤: {} -> {}", coords.len(), kept.len());
  kept
}

#[cfg(test)]
mod tests {
  use super::*;

  fn at(row: f64, col: f64) -> Coordinate {
    Coordinate::new(row, col)
  }

  #[test]
  fn flags_follow_border_band() {
    let size = [64, 64];
    assert_eq!(edge_flags(&at(32.0, 32.0), size, 3.0), [false; 4]);
    assert_eq!(edge_flags(&at(61.5, 32.0), size, 3.0), [true, false, false, false]);
    assert_eq!(edge_flags(&at(2.9, 32.0), size, 3.0), [false, true, false, false]);
    assert_eq!(edge_flags(&at(32.0, 61.5), size, 3.0), [false, false, true, false]);
    assert_eq!(edge_flags(&at(32.0, 0.0), size, 3.0), [false, false, false, true]);
  }

  #[test]
  fn band_limits_are_exclusive() {
    let size = [64, 64];
    assert!(!is_on_edge(&at(3.0, 3.0), size, 3.0));
    assert!(!is_on_edge(&at(61.0, 61.0), size, 3.0));
  }

  #[test]
  fn column_bound_uses_first_size_component() {
    // 100 行 x 40 列: 列 50 仍在 H - D = 97 以内
    let size = [100, 40];
    assert_eq!(edge_flags(&at(50.0, 50.0), size, 3.0), [false; 4]);
    assert_eq!(edge_flags(&at(50.0, 98.0), size, 3.0), [false, false, true, false]);
  }

  #[test]
  fn removal_preserves_order() {
    let coords = vec![at(10.0, 10.0), at(1.0, 10.0), at(20.0, 30.0), at(10.0, 63.0), at(40.0, 5.0)];
    let kept = remove_edge_coordinates(&coords, [64, 64], 3.0);
    assert_eq!(kept, vec![at(10.0, 10.0), at(20.0, 30.0), at(40.0, 5.0)]);
  }

  #[test]
  fn removal_is_idempotent() {
    let coords: Vec<Coordinate> = (0..40)
      .map(|i| at((i * 7 % 64) as f64 + 0.25, (i * 13 % 64) as f64 + 0.5))
      .collect();
    let once = remove_edge_coordinates(&coords, [64, 64], 4.0);
    let twice = remove_edge_coordinates(&once, [64, 64], 4.0);
    assert_eq!(once, twice);
    assert!(once.len() < coords.len());
  }

  #[test]
  fn zero_margin_keeps_interior_points() {
    let coords = vec![at(0.0, 0.0), at(63.5, 10.0), at(64.5, 10.0)];
    let kept = remove_edge_coordinates(&coords, [64, 64], 0.0);
    assert_eq!(kept, vec![at(0.0, 0.0), at(63.5, 10.0)]);
  }
}
