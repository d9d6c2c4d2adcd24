// 该文件是 AtomFind 项目的一部分。
// src/detector/center_of_mass.rs - 连通域质心
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

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use ndarray::ArrayView2;
use tracing::debug;

use crate::detector::Coordinate;

#[derive(Debug, Clone, Copy, Default)]
struct Moments {
  weight: f64,
  row: f64,
  col: f64,
  pixels: usize,
  row_plain: f64,
  col_plain: f64,
}

impl Moments {
  fn add(&mut self, row: usize, col: usize, value: f64) {
    self.weight += value;
    self.row += value * row as f64;
    self.col += value * col as f64;
    self.pixels += 1;
    self.row_plain += row as f64;
    self.col_plain += col as f64;
  }

  fn centroid(&self) -> Coordinate {
    if self.weight != 0.0 {
      Coordinate::new(self.row / self.weight, self.col / self.weight)
    } else {
      let n = self.pixels as f64;
      Coordinate::new(self.row_plain / n, self.col_plain / n)
    }
  }
}

/// 对非零像素做连通域标记，返回每个连通域按灰度加权的质心。
///
/// 结果按标签序号升序排列，标签按光栅扫描顺序分配。
pub fn find_com(image: ArrayView2<f32>, connectivity: Connectivity) -> Vec<Coordinate> {
  let (height, width) = image.dim();
  if height == 0 || width == 0 {
    return Vec::new();
  }

  let mask: GrayImage = ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
    Luma([u8::from(image[[y as usize, x as usize]] != 0.0)])
  });
  let labels = connected_components(&mask, connectivity, Luma([0u8]));

  let count = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
  let mut moments = vec![Moments::default(); count];
  for (x, y, label) in labels.enumerate_pixels() {
    let label = label[0] as usize;
    if label == 0 {
      continue;
    }
    let (row, col) = (y as usize, x as usize);
    moments[label - 1].add(row, col, f64::from(image[[row, col]]));
  }

  debug!("连通域数量: {}", count);
  moments.iter().map(Moments::centroid).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;
  use ndarray::Array2;

  fn paint_square(image: &mut Array2<f32>, row: usize, col: usize, half: usize) {
    for r in row - half..=row + half {
      for c in col - half..=col + half {
        image[[r, c]] = 1.0;
      }
    }
  }

  #[test]
  fn separated_blobs_give_one_centroid_each() {
    let mut image = Array2::<f32>::zeros((48, 48));
    let centers = [(8, 30), (20, 10), (20, 40), (37, 24)];
    for &(r, c) in &centers {
      paint_square(&mut image, r, c, 2);
    }

    let coords = find_com(image.view(), Connectivity::Four);
    assert_eq!(coords.len(), centers.len());
    for (coord, &(r, c)) in coords.iter().zip(&centers) {
      assert_relative_eq!(coord.row, r as f64, epsilon = 1e-9);
      assert_relative_eq!(coord.col, c as f64, epsilon = 1e-9);
      assert_eq!(coord.scale, None);
    }
  }

  #[test]
  fn diagonal_neighbours_depend_on_connectivity() {
    let mut image = Array2::<f32>::zeros((6, 6));
    image[[2, 2]] = 1.0;
    image[[3, 3]] = 1.0;

    assert_eq!(find_com(image.view(), Connectivity::Four).len(), 2);
    let merged = find_com(image.view(), Connectivity::Eight);
    assert_eq!(merged.len(), 1);
    assert_relative_eq!(merged[0].row, 2.5);
    assert_relative_eq!(merged[0].col, 2.5);
  }

  #[test]
  fn centroid_is_intensity_weighted() {
    let mut image = Array2::<f32>::zeros((5, 5));
    image[[2, 1]] = 1.0;
    image[[2, 2]] = 3.0;

    let coords = find_com(image.view(), Connectivity::Four);
    assert_eq!(coords.len(), 1);
    assert_relative_eq!(coords[0].row, 2.0);
    assert_relative_eq!(coords[0].col, 1.75);
  }

  #[test]
  fn empty_image_has_no_components() {
    let image = Array2::<f32>::zeros((16, 16));
    assert!(find_com(image.view(), Connectivity::Eight).is_empty());
    assert!(find_com(Array2::<f32>::zeros((0, 0)).view(), Connectivity::Four).is_empty());
  }
}
