// 该文件是 AtomFind 项目的一部分。
// src/input/npz_dataset.rs - NPZ 数据集读取
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

use std::{fs::File, path::Path};

use ndarray::{ArrayD, IxDyn, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpyError, ReadNpzError, ReadableElement};
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{Dataset, GROUND_TRUTH_DATASET, IMAGES_DATASET, InputError},
};

/// 从 NPZ 文件中读取 `Images` 与 `GT` 两个数据集，完整载入内存。
///
/// 文件句柄只在本函数内存活，任何返回路径上都会被关闭。
pub fn load_training_data(path: impl AsRef<Path>) -> Result<Dataset, InputError> {
  let path = path.as_ref();
  info!("加载训练数据: {}", path.display());

  let file = File::open(path).inspect_err(|e| error!("无法打开文件 {}: {}", path.display(), e))?;
  let mut archive = NpzReader::new(file)?;
  let names = archive.names()?;
  debug!("NPZ 文件包含: {:?}", names);

  let images = read_dataset(&mut archive, &names, IMAGES_DATASET)?;
  let ground_truth = read_dataset(&mut archive, &names, GROUND_TRUTH_DATASET)?;
  debug!(
    "Images 形状 {:?}, GT 形状 {:?}",
    images.shape(),
    ground_truth.shape()
  );

  let dataset = Dataset::new(images, ground_truth)?;
  info!("训练数据加载完成，共 {} 个样本", dataset.len());
  Ok(dataset)
}

impl FromUrlWithScheme for Dataset {
  const SCHEME: &'static str = "npz";
}

impl FromUrl for Dataset {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemeMismatch {
        expected: Self::SCHEME,
        found: url.scheme().to_string(),
      });
    }

    load_training_data(url.path())
  }
}

/// 查找数据集在压缩包中的条目名，`name` 与 `name.npy` 均可
fn resolve_entry<'a>(names: &'a [String], name: &str) -> Option<&'a str> {
  let with_ext = format!("{name}.npy");
  names
    .iter()
    .find(|n| n.as_str() == name || n.as_str() == with_ext)
    .map(String::as_str)
}

fn read_dataset(
  archive: &mut NpzReader<File>,
  names: &[String],
  name: &str,
) -> Result<ArrayD<f32>, InputError> {
  let entry = resolve_entry(names, name).ok_or_else(|| {
    error!("文件中缺少数据集 {}", name);
    InputError::MissingDataset(name.to_string())
  })?;

  if let Some(array) = read_cast::<f32>(archive, entry, |v| *v)? {
    return Ok(array);
  }
  if let Some(array) = read_cast::<f64>(archive, entry, |v| *v as f32)? {
    return Ok(array);
  }
  if let Some(array) = read_cast::<u8>(archive, entry, |v| f32::from(*v))? {
    return Ok(array);
  }
  if let Some(array) = read_cast::<u16>(archive, entry, |v| f32::from(*v))? {
    return Ok(array);
  }
  if let Some(array) = read_cast::<i32>(archive, entry, |v| *v as f32)? {
    return Ok(array);
  }
  if let Some(array) = read_cast::<i64>(archive, entry, |v| *v as f32)? {
    return Ok(array);
  }

  error!("数据集 {} 的元素类型不受支持", name);
  Err(InputError::UnsupportedDtype(name.to_string()))
}

/// 按元素类型 `T` 读取条目；类型描述不匹配时返回 `None`
fn read_cast<T: ReadableElement>(
  archive: &mut NpzReader<File>,
  entry: &str,
  cast: impl Fn(&T) -> f32,
) -> Result<Option<ArrayD<f32>>, InputError> {
  match archive.by_name::<OwnedRepr<T>, IxDyn>(entry) {
    Ok(array) => Ok(Some(array.map(cast))),
    Err(ReadNpzError::Npy(ReadNpyError::WrongDescriptor(_))) => Ok(None),
    Err(e) => Err(e.into()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::{Array3, Array4};
  use ndarray_npy::NpzWriter;

  fn write_npz(path: &Path, with_gt: bool) {
    let file = File::create(path).unwrap();
    let mut npz = NpzWriter::new(file);
    let images = Array3::<u8>::from_shape_fn((2, 4, 4), |(n, r, c)| (n * 16 + r * 4 + c) as u8);
    npz.add_array("Images", &images).unwrap();
    if with_gt {
      let gt = Array4::<f64>::zeros((2, 4, 4, 3));
      npz.add_array("GT", &gt).unwrap();
    }
    npz.finish().unwrap();
  }

  #[test]
  fn loads_both_datasets_and_casts_to_f32() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.npz");
    write_npz(&path, true);

    let dataset = load_training_data(&path).unwrap();
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.images.shape(), &[2, 4, 4]);
    assert_eq!(dataset.ground_truth.shape(), &[2, 4, 4, 3]);
    assert_eq!(dataset.images[[1, 3, 3]], 31.0);
  }

  #[test]
  fn missing_ground_truth_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("images_only.npz");
    write_npz(&path, false);

    match load_training_data(&path) {
      Err(InputError::MissingDataset(name)) => assert_eq!(name, "GT"),
      other => panic!("expected MissingDataset, got {other:?}"),
    }
  }

  #[test]
  fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_training_data(dir.path().join("nope.npz"));
    assert!(matches!(result, Err(InputError::Io(_))));
  }

  #[test]
  fn url_scheme_must_be_npz() {
    let url = Url::parse("image:///tmp/train.npz").unwrap();
    assert!(matches!(
      Dataset::from_url(&url),
      Err(InputError::SchemeMismatch { .. })
    ));
  }

  #[test]
  fn entry_names_resolve_with_or_without_extension() {
    let names = vec!["Images.npy".to_string(), "GT".to_string()];
    assert_eq!(resolve_entry(&names, "Images"), Some("Images.npy"));
    assert_eq!(resolve_entry(&names, "GT"), Some("GT"));
    assert_eq!(resolve_entry(&names, "Labels"), None);
  }
}
