// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/input/upload.rs - 采集图像落盘
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

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::utils::StampedName;

// 无法识别图像格式时使用的扩展名
const FALLBACK_EXTENSION: &str = "jpg";

/// 已保存到上传目录的采集图像
#[derive(Debug, Clone)]
pub struct CapturedImage {
  pub filename: String,
  pub path: PathBuf,
}

/// 上传目录，文件只写不删
pub struct UploadDirectory {
  directory: PathBuf,
  names: StampedName,
}

impl UploadDirectory {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      names: StampedName::new("frame", "jpg"),
    }
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  pub async fn save(&self, data: &[u8]) -> Result<CapturedImage, std::io::Error> {
    tokio::fs::create_dir_all(&self.directory).await?;
    let extension = extension_of(data);

    for _ in 0..u16::MAX {
      let filename = self.names.next_name_with_extension(extension);
      let path = self.directory.join(&filename);

      let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
      {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
          debug!("文件已存在，换一个名字: {}", filename);
          continue;
        }
        Err(e) => return Err(e),
      };

      if let Err(e) = write_all(&mut file, data).await {
        warn!("写入采集图像失败，删除残留文件: {}", path.display());
        drop(file);
        let _ = tokio::fs::remove_file(&path).await;
        return Err(e);
      }

      info!("采集图像已保存: {}", path.display());
      return Ok(CapturedImage { filename, path });
    }

    Err(std::io::Error::new(
      ErrorKind::AlreadyExists,
      "无法生成不重复的文件名",
    ))
  }
}

/// 按图像内容选择扩展名，摄像头不一定返回 JPEG
fn extension_of(data: &[u8]) -> &'static str {
  image::guess_format(data)
    .ok()
    .and_then(|format| format.extensions_str().first().copied())
    .unwrap_or(FALLBACK_EXTENSION)
}

async fn write_all(file: &mut tokio::fs::File, data: &[u8]) -> Result<(), std::io::Error> {
  file.write_all(data).await?;
  file.flush().await?;
  file.sync_all().await
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn saves_each_capture_under_a_new_name() {
    let dir = tempfile::tempdir().unwrap();
    let uploads = UploadDirectory::new(dir.path().join("uploads"));

    let a = uploads.save(b"first").await.unwrap();
    let b = uploads.save(b"second").await.unwrap();

    assert_ne!(a.filename, b.filename);
    assert!(a.filename.starts_with("frame_"));
    assert!(a.filename.ends_with(".jpg"));
    assert_eq!(std::fs::read(&a.path).unwrap(), b"first");
    assert_eq!(std::fs::read(&b.path).unwrap(), b"second");
    assert_eq!(std::fs::read_dir(uploads.directory()).unwrap().count(), 2);
  }

  #[tokio::test]
  async fn extension_follows_image_format() {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    let dir = tempfile::tempdir().unwrap();
    let uploads = UploadDirectory::new(dir.path());

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])))
      .write_to(&mut png, ImageFormat::Png)
      .unwrap();
    let saved = uploads.save(png.get_ref()).await.unwrap();
    assert!(saved.filename.ends_with(".png"));

    let saved = uploads.save(b"unknown").await.unwrap();
    assert!(saved.filename.ends_with(".jpg"));
  }
}
