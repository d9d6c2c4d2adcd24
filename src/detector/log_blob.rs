// 该文件是 AtomFind 项目的一部分。
// src/detector/log_blob.rs - 高斯拉普拉斯（LoG）斑点检测
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

use std::f64::consts::{PI, SQRT_2};

use imageproc::filter::separable_filter_equal;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use tracing::debug;

use crate::{
  detector::{Coordinate, ExtractError, LogParams},
  frame::{from_gray_image, to_gray_image, value_range},
};

/// 高斯核截断半径（以 sigma 为单位）
const KERNEL_TRUNCATE: f64 = 4.0;

/// 尺度空间 LoG 斑点检测，返回的坐标附带检测尺度 `sigma`。
pub fn blob_log(image: ArrayView2<f32>, params: &LogParams) -> Result<Vec<Coordinate>, ExtractError> {
  params.validate()?;

  let (height, width) = image.dim();
  if height == 0 || width == 0 {
    return Ok(Vec::new());
  }
  let Some((lo, range)) = value_range(image) else {
    debug!("图像为常数，不存在斑点");
    return Ok(Vec::new());
  };

  // 高斯模糊是线性的，在 [0, 1] 上计算后再乘回原始幅度
  let gray = to_gray_image(image.mapv(|v| (v - lo) / range).view());
  let sigmas = sigma_list(params);
  let mut cube = Array3::<f32>::zeros((sigmas.len(), height, width));
  for (k, &sigma) in sigmas.iter().enumerate() {
    let blurred = from_gray_image(&separable_filter_equal(&gray, &gaussian_kernel(sigma)));
    let scale = (sigma * sigma) as f32 * range;
    cube
      .index_axis_mut(Axis(0), k)
      .assign(&laplacian(blurred.view()).mapv(|v| -v * scale));
  }

  let blobs: Vec<Coordinate> = local_maxima(cube.view(), params.threshold)
    .into_iter()
    .map(|(s, r, c)| Coordinate::new(r as f64, c as f64).with_scale(sigmas[s]))
    .collect();
  let found = blobs.len();
  let blobs = prune_blobs(blobs, params.overlap);
  debug!("LoG 峰值 {} 个，去重叠后 {} 个", found, blobs.len());

  Ok(blobs)
}

fn sigma_list(params: &LogParams) -> Vec<f64> {
  if params.num_sigma == 1 {
    return vec![params.min_sigma];
  }
  let step = (params.max_sigma - params.min_sigma) / (params.num_sigma - 1) as f64;
  (0..params.num_sigma)
    .map(|k| params.min_sigma + step * k as f64)
    .collect()
}

/// 归一化的一维高斯核，半径 `round(4 * sigma)`。
///
/// 截断半径小于 4 sigma 时，乘以 `sigma²` 后的大尺度响应会失真。
fn gaussian_kernel(sigma: f64) -> Vec<f32> {
  let radius = (KERNEL_TRUNCATE * sigma + 0.5) as i64;
  let weights: Vec<f64> = (-radius..=radius)
    .map(|x| (-((x * x) as f64) / (2.0 * sigma * sigma)).exp())
    .collect();
  let sum: f64 = weights.iter().sum();
  weights.iter().map(|w| (w / sum) as f32).collect()
}

/// 五点差分拉普拉斯算子，边界按最近像素延拓
fn laplacian(plane: ArrayView2<f32>) -> Array2<f32> {
  let (height, width) = plane.dim();
  Array2::from_shape_fn((height, width), |(r, c)| {
    let up = plane[[r.saturating_sub(1), c]];
    let down = plane[[(r + 1).min(height - 1), c]];
    let left = plane[[r, c.saturating_sub(1)]];
    let right = plane[[r, (c + 1).min(width - 1)]];
    up + down + left + right - 4.0 * plane[[r, c]]
  })
}

fn is_neighbourhood_max(cube: ArrayView3<f32>, s: usize, r: usize, c: usize) -> bool {
  let (depth, height, width) = cube.dim();
  let value = cube[[s, r, c]];
  for ns in s.saturating_sub(1)..=(s + 1).min(depth - 1) {
    for nr in r.saturating_sub(1)..=(r + 1).min(height - 1) {
      for nc in c.saturating_sub(1)..=(c + 1).min(width - 1) {
        if cube[[ns, nr, nc]] > value {
          return false;
        }
      }
    }
  }
  true
}

/// 在 `(sigma, row, col)` 立方体中寻找 3x3x3 邻域极大值。
///
/// 按响应从大到小保留峰值，相互之间的切比雪夫距离必须大于 1。
fn local_maxima(cube: ArrayView3<f32>, threshold: f64) -> Vec<(usize, usize, usize)> {
  let (depth, height, width) = cube.dim();
  let first = cube[[0, 0, 0]];
  if cube.iter().all(|v| *v == first) {
    return Vec::new();
  }

  let mut candidates = Vec::new();
  for r in 0..height {
    for c in 0..width {
      for s in 0..depth {
        let value = cube[[s, r, c]];
        if f64::from(value) > threshold && is_neighbourhood_max(cube, s, r, c) {
          candidates.push((value, s, r, c));
        }
      }
    }
  }
  candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

  let mut peaks: Vec<(usize, usize, usize)> = Vec::new();
  for (_, s, r, c) in candidates {
    let isolated = peaks
      .iter()
      .all(|&(ps, pr, pc)| s.abs_diff(ps).max(r.abs_diff(pr)).max(c.abs_diff(pc)) > 1);
    if isolated {
      peaks.push((s, r, c));
    }
  }
  peaks
}

/// 两个斑点（半径 `sigma * sqrt(2)` 的圆盘）的重叠面积占较小者面积的比例
fn blob_overlap(a: &Coordinate, b: &Coordinate) -> f64 {
  let (sa, sb) = (a.scale.unwrap_or(0.0), b.scale.unwrap_or(0.0));
  if sa == 0.0 && sb == 0.0 {
    return 0.0;
  }
  let (max_sigma, r1, r2) = if sa > sb {
    (sa, 1.0, sb / sa)
  } else {
    (sb, sa / sb, 1.0)
  };

  let d = (a.row - b.row).hypot(a.col - b.col) / (max_sigma * SQRT_2);
  if d > r1 + r2 {
    return 0.0;
  }
  if d <= (r1 - r2).abs() {
    return 1.0;
  }
  disk_overlap(d, r1, r2)
}

fn disk_overlap(d: f64, r1: f64, r2: f64) -> f64 {
  let acos1 = ((d * d + r1 * r1 - r2 * r2) / (2.0 * d * r1))
    .clamp(-1.0, 1.0)
    .acos();
  let acos2 = ((d * d + r2 * r2 - r1 * r1) / (2.0 * d * r2))
    .clamp(-1.0, 1.0)
    .acos();

  let a = -d + r2 + r1;
  let b = d - r2 + r1;
  let c = d + r2 - r1;
  let e = d + r2 + r1;
  let area = r1 * r1 * acos1 + r2 * r2 * acos2 - 0.5 * (a * b * c * e).abs().sqrt();
  area / (PI * r1.min(r2).powi(2))
}

/// 重叠超过 `overlap` 的两个斑点中去除尺度较小的一个
fn prune_blobs(mut blobs: Vec<Coordinate>, overlap: f64) -> Vec<Coordinate> {
  let Some(max_sigma) = blobs.iter().filter_map(|b| b.scale).reduce(f64::max) else {
    return blobs;
  };
  let reach = 2.0 * max_sigma * SQRT_2;

  for i in 0..blobs.len() {
    for j in (i + 1)..blobs.len() {
      let (a, b) = (blobs[i], blobs[j]);
      let (sa, sb) = (a.scale.unwrap_or(0.0), b.scale.unwrap_or(0.0));
      if sa == 0.0 || sb == 0.0 || (a.row - b.row).hypot(a.col - b.col) > reach {
        continue;
      }
      if blob_overlap(&a, &b) > overlap {
        if sa > sb {
          blobs[j].scale = Some(0.0);
        } else {
          blobs[i].scale = Some(0.0);
        }
      }
    }
  }

  blobs.retain(|b| b.scale.is_some_and(|s| s > 0.0));
  blobs
}
