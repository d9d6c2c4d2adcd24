// 该文件是 AtomFind 项目的一部分。
// src/frame.rs - NHWC 批量图像格式转换与上采样
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

use image::{ImageBuffer, Luma, imageops::FilterType};
use ndarray::{Array2, Array4, ArrayView2, ArrayView4, ArrayViewD, s};
use thiserror::Error;
use tracing::{debug, warn};

/// 单通道浮点图像
pub type GrayF32Image = ImageBuffer<Luma<f32>, Vec<f32>>;

#[derive(Error, Debug)]
pub enum FormatError {
  #[error("数据长度不匹配: 共 {len} 个元素, 无法整除 {height}x{width}")]
  ShapeMismatch {
    len: usize,
    height: usize,
    width: usize,
  },
  #[error("数组形状错误: {0}")]
  Shape(#[from] ndarray::ShapeError),
}

/// 将原始图像数据整理为 `(N, H, W, 1)` 的 `f32` 批量，并做全局最小-最大归一化。
///
/// 归一化在整个输入上计算，而不是逐样本。输入为常数时返回全零并给出警告。
pub fn format_nhwc(data: ArrayViewD<f32>, image_size: [usize; 2]) -> Result<Array4<f32>, FormatError> {
  let [height, width] = image_size;
  let plane = height * width;
  let len = data.len();
  if plane == 0 || len % plane != 0 {
    return Err(FormatError::ShapeMismatch { len, height, width });
  }

  let values: Vec<f32> = data.iter().copied().collect();
  let mut batch = Array4::from_shape_vec((len / plane, height, width, 1), values)?;
  if len == 0 {
    return Ok(batch);
  }

  let (min, max) = batch
    .iter()
    .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
      (lo.min(v), hi.max(v))
    });
  let range = max - min;
  debug!("归一化范围: [{}, {}]", min, max);

  if range.is_nan() || range <= 0.0 {
    warn!("输入数据为常数 ({}), 归一化结果置零", min);
    batch.fill(0.0);
    return Ok(batch);
  }

  batch.mapv_inplace(|v| (v - min) / range);
  Ok(batch)
}

/// 双线性插值上采样，`size` 为输出的 `[行, 列]`，批量与通道维度保持不变
pub fn upsample(batch: ArrayView4<f32>, size: [usize; 2]) -> Array4<f32> {
  let (count, height, width, channels) = batch.dim();
  let [rows, cols] = size;
  let mut resized = Array4::<f32>::zeros((count, rows, cols, channels));
  if rows == 0 || cols == 0 || height == 0 || width == 0 {
    return resized;
  }

  debug!(
    "上采样 {} 张图像: {}x{} -> {}x{}",
    count, height, width, rows, cols
  );

  for n in 0..count {
    for c in 0..channels {
      let plane = resize_plane(batch.slice(s![n, .., .., c]), rows, cols);
      resized.slice_mut(s![n, .., .., c]).assign(&plane);
    }
  }

  resized
}

/// 平面的最小值与取值范围，常数平面返回 `None`
pub(crate) fn value_range(plane: ArrayView2<f32>) -> Option<(f32, f32)> {
  let (lo, hi) = plane
    .iter()
    .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
      (lo.min(v), hi.max(v))
    });
  let range = hi - lo;
  if range.is_nan() || range <= 0.0 {
    None
  } else {
    Some((lo, range))
  }
}

fn resize_plane(plane: ArrayView2<f32>, rows: usize, cols: usize) -> Array2<f32> {
  let Some((lo, range)) = value_range(plane) else {
    let fill = plane.iter().next().copied().unwrap_or(0.0);
    return Array2::from_elem((rows, cols), fill);
  };

  // resize 会把浮点像素截断到 [0, 1]，先映射到该区间再还原
  let unit = plane.mapv(|v| (v - lo) / range);
  let image = image::imageops::resize(
    &to_gray_image(unit.view()),
    cols as u32,
    rows as u32,
    FilterType::Triangle,
  );
  from_gray_image(&image).mapv(|v| v * range + lo)
}

/// `(H, W)` 数组转为单通道浮点图像
pub fn to_gray_image(plane: ArrayView2<f32>) -> GrayF32Image {
  let (height, width) = plane.dim();
  ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
    Luma([plane[[y as usize, x as usize]]])
  })
}

/// 单通道浮点图像转为 `(H, W)` 数组
pub fn from_gray_image(image: &GrayF32Image) -> Array2<f32> {
  let (width, height) = image.dimensions();
  Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
    image.get_pixel(c as u32, r as u32)[0]
  })
}
