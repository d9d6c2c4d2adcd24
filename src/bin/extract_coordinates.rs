// 该文件是 AtomFind 项目的一部分。
// src/bin/extract_coordinates.rs - 从训练数据中提取原子/缺陷坐标
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

use anyhow::Result;
use clap::Parser;
use imageproc::region_labelling::Connectivity;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use atomfind::{
  DetectMethod, ExtractConfig, FromUrl, LogParams,
  input::Dataset,
  output::OutputWrapper,
  task::{ExtractTask, Task},
};

/// 坐标提取参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 训练数据，例如 npz:///data/train.npz
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 json:///tmp/coords.json 或 folder:///tmp/records
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 提取方法: LoG 或 CoM
  #[arg(long, default_value = "LoG", value_name = "METHOD")]
  pub method: DetectMethod,

  /// 二值化阈值，在 LoG 与 CoM 检测之前对每个通道生效
  #[arg(long, default_value = "0.8", value_name = "THRESHOLD")]
  pub threshold: f32,

  #[arg(long, default_value = "1.5", value_name = "SIGMA")]
  pub min_sigma: f64,
  #[arg(long, default_value = "10.0", value_name = "SIGMA")]
  pub max_sigma: f64,
  /// LoG 尺度数量
  #[arg(long, default_value = "10", value_name = "COUNT")]
  pub num_sigma: usize,
  /// LoG 尺度空间响应阈值
  #[arg(long, default_value = "0.2", value_name = "THRESHOLD")]
  pub log_threshold: f64,
  /// 重叠比例超过该值时去除较小的斑点
  #[arg(long, default_value = "0.5", value_name = "RATIO")]
  pub overlap: f64,

  /// 距离边界小于该值的坐标会被丢弃
  #[arg(long, default_value = "3.0", value_name = "PIXELS")]
  pub dist_edge: f64,

  /// 提取前上采样到 `H W`
  #[arg(long, num_args = 2, value_names = ["H", "W"])]
  pub size: Option<Vec<usize>>,

  /// 连通域使用 8 邻域
  #[arg(long)]
  pub eight_connected: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!("提取方法: {}", args.method);

  let size = args.size.as_deref().map(|s| [s[0], s[1]]);
  let connectivity = if args.eight_connected {
    Connectivity::Eight
  } else {
    Connectivity::Four
  };

  let config = ExtractConfig::default()
    .with_method(args.method)
    .with_threshold(args.threshold)
    .with_log_params(LogParams {
      min_sigma: args.min_sigma,
      max_sigma: args.max_sigma,
      num_sigma: args.num_sigma,
      threshold: args.log_threshold,
      overlap: args.overlap,
    })
    .with_dist_edge(args.dist_edge)
    .with_connectivity(connectivity);

  let dataset = Dataset::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  ExtractTask::new(config)
    .with_upsample(size)
    .run_task(dataset, output)?;

  Ok(())
}
