// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/input.rs - 图像采集输入
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

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::FromUrl;

mod http_camera;
pub use self::http_camera::{
  DEFAULT_CAPTURE_TIMEOUT, DEFAULT_MAX_IMAGE_BYTES, HttpCamera, HttpCameraError,
};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

mod upload;
pub use self::upload::{CapturedImage, UploadDirectory};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("HTTP 摄像头错误: {0}")]
  HttpCameraError(#[from] HttpCameraError),
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("保存采集图像失败: {0}")]
  StoreError(#[from] std::io::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 采集单帧图像，返回原始的编码字节（通常为 JPEG）
pub enum InputWrapper {
  HttpCamera(HttpCamera),
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      "http" | "https" => Ok(InputWrapper::HttpCamera(HttpCamera::from_url(url)?)),
      #[cfg(feature = "read_image_file")]
      scheme if scheme == <ImageFileInput as crate::FromUrlWithScheme>::SCHEME => {
        Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?))
      }
      scheme => Err(InputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl InputWrapper {
  /// 设置采集超时，仅对网络摄像头生效
  pub fn with_timeout(self, timeout: Duration) -> Self {
    match self {
      InputWrapper::HttpCamera(camera) => InputWrapper::HttpCamera(camera.with_timeout(timeout)),
      #[cfg(feature = "read_image_file")]
      other => other,
    }
  }

  /// 设置单帧大小上限，仅对网络摄像头生效
  pub fn with_max_bytes(self, max_bytes: usize) -> Self {
    match self {
      InputWrapper::HttpCamera(camera) => InputWrapper::HttpCamera(camera.with_max_bytes(max_bytes)),
      #[cfg(feature = "read_image_file")]
      other => other,
    }
  }

  pub async fn capture(&self) -> Result<Vec<u8>, InputError> {
    match self {
      InputWrapper::HttpCamera(camera) => Ok(camera.capture().await?),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => Ok(input.capture().await?),
    }
  }

  pub fn source(&self) -> &Url {
    match self {
      InputWrapper::HttpCamera(camera) => camera.url(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.url(),
    }
  }
}
