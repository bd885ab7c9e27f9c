// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/utils.rs - 文件命名等工具
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

use std::sync::atomic::{AtomicU16, Ordering};

use chrono::Local;

/// 带时间戳与计数器的文件名生成器
///
/// 生成形如 `frame_20260101_120000_0001.jpg` 的文件名。
/// 同一秒内的多次请求依靠计数器区分。
#[derive(Debug)]
pub struct StampedName {
  prefix: &'static str,
  extension: &'static str,
  counter: AtomicU16,
}

impl StampedName {
  pub const fn new(prefix: &'static str, extension: &'static str) -> Self {
    Self {
      prefix,
      extension,
      counter: AtomicU16::new(0),
    }
  }

  pub fn next_name(&self) -> String {
    self.next_name_with_extension(self.extension)
  }

  pub fn next_name_with_extension(&self, extension: &str) -> String {
    let id = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
    format!(
      "{}_{}_{:04X}.{}",
      self.prefix,
      Local::now().format("%Y%m%d_%H%M%S"),
      id,
      extension
    )
  }
}

/// 判断文件名是否只指向目录内的单个文件
pub fn is_plain_file_name(name: &str) -> bool {
  !name.is_empty()
    && name != "."
    && name != ".."
    && !name.contains(['/', '\\', '\0'])
    && !name.starts_with('.')
}

/// 根据扩展名推断图片的 MIME 类型
pub fn image_content_type(name: &str) -> &'static str {
  let ext = name
    .rsplit_once('.')
    .map(|(_, ext)| ext.to_ascii_lowercase())
    .unwrap_or_default();
  match ext.as_str() {
    "jpg" | "jpeg" => "image/jpeg",
    "png" => "image/png",
    "bmp" => "image/bmp",
    "gif" => "image/gif",
    "webp" => "image/webp",
    _ => "application/octet-stream",
  }
}

/// 是否为可作为处理结果的图片文件
pub fn is_image_file(path: &std::path::Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      matches!(
        ext.to_ascii_lowercase().as_str(),
        "jpg" | "jpeg" | "png" | "bmp"
      )
    })
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stamped_names_differ_within_one_second() {
    let names = StampedName::new("frame", "jpg");
    let a = names.next_name();
    let b = names.next_name();
    assert_ne!(a, b);
    assert!(a.starts_with("frame_"));
    assert!(a.ends_with("_0001.jpg"));
    assert!(b.ends_with("_0002.jpg"));
  }

  #[test]
  fn rejects_names_escaping_directory() {
    assert!(is_plain_file_name("processed_20260101_120000_0001.jpg"));
    assert!(!is_plain_file_name("../secret.jpg"));
    assert!(!is_plain_file_name("a/b.jpg"));
    assert!(!is_plain_file_name(".."));
    assert!(!is_plain_file_name(".hidden"));
    assert!(!is_plain_file_name(""));
  }

  #[test]
  fn content_type_follows_extension() {
    assert_eq!(image_content_type("x.JPG"), "image/jpeg");
    assert_eq!(image_content_type("x.png"), "image/png");
    assert_eq!(image_content_type("x"), "application/octet-stream");
  }
}
