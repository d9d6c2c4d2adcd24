// 该文件是 AtomFind 项目的一部分。
// src/output/draw.rs - 检测坐标可视化
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

use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut};
use ndarray::{Array2, ArrayView2};

const MARKER_RADIUS: i32 = 3;
const PALETTE_SIZE: usize = 8;

pub struct Draw {
  marker_radius: i32,
  colors: Vec<Rgb<u8>>,
}

impl Default for Draw {
  fn default() -> Self {
    // 每个通道一种颜色，超出后循环使用
    let colors = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb((i as f32 / PALETTE_SIZE as f32) * 360.0, 0.9, 1.0))
      .collect();

    Self {
      marker_radius: MARKER_RADIUS,
      colors,
    }
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = match h as u32 {
    0..=59 => (c, x, 0.0),
    60..=119 => (x, c, 0.0),
    120..=179 => (0.0, c, x),
    180..=239 => (0.0, x, c),
    240..=299 => (x, 0.0, c),
    _ => (c, 0.0, x),
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

impl Draw {
  pub fn color_of(&self, channel: usize) -> Rgb<u8> {
    self.colors[channel % self.colors.len()]
  }

  /// 将 `[0, 1]` 灰度平面转为 RGB 图像
  pub fn to_rgb_image(&self, plane: ArrayView2<f32>) -> RgbImage {
    let (height, width) = plane.dim();
    ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
      let v = (plane[[y as usize, x as usize]].clamp(0.0, 1.0) * 255.0).round() as u8;
      Rgb([v, v, v])
    })
  }

  /// 在灰度图上按通道颜色绘制每条检测记录 `[row, col, channel]`
  pub fn draw_detections(&self, plane: ArrayView2<f32>, records: &Array2<f64>) -> RgbImage {
    let mut image = self.to_rgb_image(plane);
    let (width, height) = (image.width() as f64, image.height() as f64);

    for record in records.outer_iter() {
      let (row, col, channel) = (record[0], record[1], record[2]);
      if !(0.0..height).contains(&row) || !(0.0..width).contains(&col) {
        continue;
      }
      let center = (col.round() as i32, row.round() as i32);
      let color = self.color_of(channel.max(0.0) as usize);
      draw_cross_mut(&mut image, color, center.0, center.1);
      draw_hollow_circle_mut(&mut image, center, self.marker_radius, color);
    }

    image
  }
}
