// 该文件是 AtomFind 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use ndarray::{Array2, Array4, s};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  FromUrl, FromUrlWithScheme,
  detector::DetectionTable,
  output::{Render, draw::Draw, format_record},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按日期分目录保存每张图像的检测记录（`.txt`）与标注图（`.png`）
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Option<Draw>,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    // ?record 只保存文本记录
    let record_only = uri.query_pairs().any(|(k, _)| k == "record");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw: (!record_only).then(Draw::default),
    })
  }
}

impl DirectoryRecordOutput {
  fn run_directory(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;
    Ok(directory)
  }

  fn save_records(&self, path: &Path, records: &Array2<f64>) -> Result<(), DirectoryRecordOutputError> {
    let lines: Vec<String> = records
      .outer_iter()
      .map(|record| format_record(&record.to_vec()))
      .collect();
    std::fs::write(path, lines.join("\n"))?;
    Ok(())
  }
}

impl Render<Array4<f32>, DetectionTable> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Array4<f32>, result: &DetectionTable) -> Result<(), Self::Error> {
    let now = Utc::now();
    let directory = self.run_directory(now)?;
    let stamp = now.format("%H-%M-%S");

    for (index, records) in result.iter() {
      let base = directory.join(format!("{stamp}-{index:04}"));
      self.save_records(&base.with_extension("txt"), records)?;

      let Some(draw) = &self.draw else {
        continue;
      };
      if index >= frame.dim().0 || frame.dim().3 == 0 {
        warn!("图像 {} 没有对应的原始图像，跳过标注图", index);
        continue;
      }
      let plane = frame.slice(s![index, .., .., 0]);
      draw
        .draw_detections(plane, records)
        .save(base.with_extension("png"))?;
      debug!("保存标注图: {}", base.with_extension("png").display());
    }

    info!(
      "{} 张图像的检测记录已保存到: {}",
      result.len(),
      directory.display()
    );
    Ok(())
  }
}
