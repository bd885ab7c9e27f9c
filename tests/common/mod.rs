// 该文件是 Shaobing （哨兵） 项目的一部分。
// tests/common/mod.rs - 测试辅助
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

#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use axum::{
  Router,
  body::{Body, to_bytes},
  http::{Request, Response, header},
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use shaobing::{
  FromUrl,
  input::{InputWrapper, UploadDirectory},
  model::{DEFAULT_MIN_CONFIDENCE, SharedModel},
  output::{ProcessedDirectory, draw::Draw},
  server::{AppState, create_app},
  task::DetectionTask,
};
use url::Url;

pub fn jpeg_bytes() -> Vec<u8> {
  let image = RgbImage::from_pixel(64, 48, Rgb([120, 130, 140]));
  let mut buf = Cursor::new(Vec::new());
  DynamicImage::ImageRgb8(image)
    .write_to(&mut buf, ImageFormat::Jpeg)
    .unwrap();
  buf.into_inner()
}

/// 在随机端口上启动一个假摄像头
pub async fn spawn_camera(router: Router) -> Url {
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    axum::serve(listener, router).await.unwrap();
  });
  Url::parse(&format!("http://{}/", addr)).unwrap()
}

pub fn count_files(dir: &Path) -> usize {
  match std::fs::read_dir(dir) {
    Ok(entries) => entries.count(),
    Err(_) => 0,
  }
}

pub fn build_app(static_dir: &Path, camera: &Url, model: SharedModel) -> Router {
  build_app_with_confidence(static_dir, camera, model, DEFAULT_MIN_CONFIDENCE)
}

pub fn build_app_with_confidence(
  static_dir: &Path,
  camera: &Url,
  model: SharedModel,
  confidence: f32,
) -> Router {
  let input = InputWrapper::from_url(camera)
    .unwrap()
    .with_timeout(Duration::from_millis(500));
  let task = DetectionTask::new(
    input,
    UploadDirectory::new(static_dir.join("uploads")),
    model,
    ProcessedDirectory::new(static_dir.join("processed"), Draw::default()),
  )
  .with_min_confidence(confidence);
  create_app(AppState::new(task))
}

pub fn get(uri: &str) -> Request<Body> {
  Request::builder()
    .uri(uri)
    .header(header::HOST, "localhost:5000")
    .body(Body::empty())
    .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}
