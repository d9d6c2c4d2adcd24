// 该文件是 AtomFind 项目的一部分。
// src/task.rs - 坐标提取任务
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

use std::time::Instant;

use anyhow::{Context, bail};
use ndarray::{Array4, Ix4};
use tracing::info;

use crate::{
  detector::{DetectionTable, ExtractConfig, extract_all_coordinates},
  frame::{format_nhwc, upsample},
  input::Dataset,
  output::Render,
};

pub trait Task<I, O>: Sized {
  type Error;
  fn run_task(self, input: I, output: O) -> Result<(), Self::Error>;
}

/// 将数据集中的 `GT` 概率图视为解码结果，提取坐标并交给输出
#[derive(Debug, Default, Clone)]
pub struct ExtractTask {
  config: ExtractConfig,
  upsample_to: Option<[usize; 2]>,
}

impl ExtractTask {
  pub fn new(config: ExtractConfig) -> Self {
    Self {
      config,
      upsample_to: None,
    }
  }

  /// 提取前先将图像与概率图上采样到 `[行, 列]`
  pub fn with_upsample(mut self, size: Option<[usize; 2]>) -> Self {
    self.upsample_to = size;
    self
  }

  /// 返回 `(显示用图像, 检测表)`
  pub fn extract(&self, input: &Dataset) -> anyhow::Result<(Array4<f32>, DetectionTable)> {
    let image_shape = input.images.shape();
    if image_shape.len() < 3 {
      bail!("Images 至少需要三个维度 (N, H, W), 实际为 {:?}", image_shape);
    }
    let images = format_nhwc(input.images.view(), [image_shape[1], image_shape[2]])
      .context("Images 格式转换失败")?;

    let decoded = input
      .ground_truth
      .view()
      .into_dimensionality::<Ix4>()
      .with_context(|| format!("GT 必须为 (N, H, W, C) 数组, 实际为 {:?}", input.ground_truth.shape()))?;

    let (images, decoded) = match self.upsample_to {
      Some(size) => {
        let now = Instant::now();
        let resized = (upsample(images.view(), size), upsample(decoded, size));
        info!("上采样完成，耗时: {:.2?}", now.elapsed());
        resized
      }
      None => (images, decoded.to_owned()),
    };

    let now = Instant::now();
    let table = extract_all_coordinates(decoded.view(), &self.config)?;
    info!("坐标提取完成，耗时: {:.2?}", now.elapsed());

    Ok((images, table))
  }
}

impl<O, RE> Task<Dataset, O> for ExtractTask
where
  RE: std::error::Error + Sync + Send + 'static,
  O: Render<Array4<f32>, DetectionTable, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: Dataset, output: O) -> Result<(), Self::Error> {
    info!("开始任务，共 {} 个样本", input.len());
    let (images, table) = self.extract(&input)?;

    let now = Instant::now();
    output.render_result(&images, &table)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    info!("任务完成，共 {} 条检测记录", table.total_detections());
    Ok(())
  }
}
