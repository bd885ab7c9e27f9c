// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入（离线摄像头）
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

use std::path::PathBuf;

use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image format error: {0}")]
  ImageFormatError(#[from] image::ImageError),
}

/// 每次采集都重新读取同一张图片，用于没有摄像头时的调试
pub struct ImageFileInput {
  url: Url,
  path: PathBuf,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Ok(ImageFileInput {
      url: url.clone(),
      path: PathBuf::from(url.path()),
    })
  }
}

impl ImageFileInput {
  pub fn url(&self) -> &Url {
    &self.url
  }

  pub async fn capture(&self) -> Result<Vec<u8>, ImageFileInputError> {
    let data = tokio::fs::read(&self.path).await?;
    // 只校验格式，不解码
    image::guess_format(&data)?;
    Ok(data)
  }
}
