// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/output.rs - 处理结果输出
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

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{input::CapturedImage, model::DetectOutput, utils::StampedName};

pub trait Render<Frame, Output>: Sized {
  type Saved;
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<Self::Saved, Self::Error>;
}

pub mod draw;
use self::draw::Draw;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 已写入处理目录的结果图
#[derive(Debug, Clone)]
pub struct ProcessedImage {
  pub filename: String,
  pub path: PathBuf,
}

/// 处理结果目录
///
/// 每次成功处理恰好写入一个新文件，文件只写不删。
pub struct ProcessedDirectory {
  directory: PathBuf,
  names: StampedName,
  draw: Draw,
}

impl ProcessedDirectory {
  pub fn new(directory: impl Into<PathBuf>, draw: Draw) -> Self {
    Self {
      directory: directory.into(),
      names: StampedName::new("processed", "jpg"),
      draw,
    }
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn reserve(&self, extension: Option<&str>) -> Result<ProcessedImage, std::io::Error> {
    std::fs::create_dir_all(&self.directory)?;
    loop {
      let filename = match extension {
        Some(ext) => self.names.next_name_with_extension(ext),
        None => self.names.next_name(),
      };
      let path = self.directory.join(&filename);
      if !path.exists() {
        return Ok(ProcessedImage { filename, path });
      }
      debug!("文件已存在，换一个名字: {}", filename);
    }
  }

  /// 把检测程序生成的结果图移入处理目录
  fn relocate(&self, source: &Path) -> Result<ProcessedImage, OutputError> {
    let extension = source
      .extension()
      .and_then(|e| e.to_str())
      .map(|e| e.to_ascii_lowercase());
    let target = self.reserve(extension.as_deref())?;

    if let Err(e) = std::fs::rename(source, &target.path) {
      // 跨文件系统时 rename 会失败，退回到复制后删除
      debug!("rename 失败 ({}), 改为复制", e);
      std::fs::copy(source, &target.path)?;
      if let Err(e) = std::fs::remove_file(source) {
        warn!("删除原结果图失败 {}: {}", source.display(), e);
      }
    }

    info!("结果图已转移: {} -> {}", source.display(), target.path.display());
    Ok(target)
  }

  /// 在采集图像上绘制检测框并保存
  fn draw_and_save(
    &self,
    frame: &CapturedImage,
    output: &DetectOutput,
  ) -> Result<ProcessedImage, OutputError> {
    // 按内容识别格式，不依赖扩展名
    let mut image = ImageReader::open(&frame.path)?
      .with_guessed_format()?
      .decode()?
      .to_rgb8();
    self.draw.draw_detections_on_image(&mut image, &output.result);

    let target = self.reserve(None)?;
    image.save(&target.path)?;
    info!("结果图已保存: {}", target.path.display());
    Ok(target)
  }
}

impl Render<CapturedImage, DetectOutput> for ProcessedDirectory {
  type Saved = ProcessedImage;
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &CapturedImage,
    result: &DetectOutput,
  ) -> Result<Self::Saved, Self::Error> {
    match &result.rendered {
      Some(rendered) => self.relocate(rendered),
      None => self.draw_and_save(frame, result),
    }
  }
}
