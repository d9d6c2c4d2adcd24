// 该文件是 AtomFind 项目的一部分。
// src/output/json_file.rs - 保存检测结果为 JSON 文件
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

use std::{fs::File, io::BufWriter, path::Path};

use ndarray::Array4;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, detector::DetectionTable, output::Render};

#[derive(Error, Debug)]
pub enum JsonFileOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 将整个检测表写入一个 JSON 对象，键为图像序号
pub struct JsonFileOutput {
  path: String,
}

impl FromUrlWithScheme for JsonFileOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonFileOutputError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(JsonFileOutput {
      path: uri.path().to_string(),
    })
  }
}

/// `{ "0": [[row, col, channel], ...], ... }`
pub fn table_to_json(table: &DetectionTable) -> Value {
  let mut object = Map::new();
  for (index, records) in table.iter() {
    let rows: Vec<Value> = records
      .outer_iter()
      .map(|record| Value::from(record.to_vec()))
      .collect();
    object.insert(index.to_string(), Value::Array(rows));
  }
  Value::Object(object)
}

impl Render<Array4<f32>, DetectionTable> for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn render_result(&self, _frame: &Array4<f32>, result: &DetectionTable) -> Result<(), Self::Error> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let writer = BufWriter::new(File::create(&self.path)?);
    serde_json::to_writer_pretty(writer, &table_to_json(result))?;
    info!("检测结果已保存到: {}", self.path);

    Ok(())
  }
}
