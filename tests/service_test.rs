// 该文件是 Shaobing （哨兵） 项目的一部分。
// tests/service_test.rs - HTTP 服务测试
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

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
  Router,
  body::to_bytes,
  http::{StatusCode, header},
  routing::get,
};
use shaobing::model::{DetectItem, DetectOutput, DetectResult, Model, ModelError};
use tower::util::ServiceExt;

use common::{build_app, count_files, get as get_request, jpeg_bytes, json_body, spawn_camera};

struct FixedModel {
  items: Vec<DetectItem>,
}

impl Model for FixedModel {
  type Input = Path;
  type Output = DetectOutput;
  type Error = ModelError;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Ok(DetectResult::from(self.items.clone()).into())
  }
}

struct FailingModel;

impl Model for FailingModel {
  type Input = Path;
  type Output = DetectOutput;
  type Error = ModelError;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Err(ModelError::InferenceFailed("model crashed".to_string()))
  }
}

fn detection(class_id: u32, score: f32) -> DetectItem {
  DetectItem {
    class_id,
    score,
    bbox: [0.25, 0.25, 0.75, 0.75],
  }
}

async fn camera() -> url::Url {
  let router = Router::new()
    .route(
      "/capture",
      get(|| async { ([(header::CONTENT_TYPE, "image/jpeg")], jpeg_bytes()) }),
    )
    .route(
      "/broken",
      get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "camera busy") }),
    )
    .route(
      "/slow",
      get(|| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        jpeg_bytes()
      }),
    );
  spawn_camera(router).await
}

#[tokio::test]
async fn process_reports_detected_weapon() {
  let dir = tempfile::tempdir().unwrap();
  let capture = camera().await.join("capture").unwrap();
  let model = Arc::new(FixedModel {
    items: vec![detection(0, 0.4321), detection(1, 0.99), detection(0, 0.8765)],
  });
  let app = build_app(dir.path(), &capture, model);

  let response = app.clone().oneshot(get_request("/process")).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let body = json_body(response).await;

  assert_eq!(body["weapon_detected"], true);
  assert_eq!(body["confidence"], 87.65);
  let url = body["processed_image"].as_str().unwrap();
  assert!(url.starts_with("http://localhost:5000/processed/processed_"));

  assert_eq!(count_files(&dir.path().join("uploads")), 1);
  assert_eq!(count_files(&dir.path().join("processed")), 1);

  // 结果图可以通过返回的地址取回
  let path = url.trim_start_matches("http://localhost:5000");
  let response = app.oneshot(get_request(path)).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  let image = image::load_from_memory(&bytes).unwrap();
  assert_eq!((image.width(), image.height()), (64, 48));
}

#[tokio::test]
async fn process_without_target_class() {
  let dir = tempfile::tempdir().unwrap();
  let capture = camera().await.join("capture").unwrap();
  let model = Arc::new(FixedModel {
    items: vec![detection(3, 0.95)],
  });
  let app = build_app(dir.path(), &capture, model);

  let response = app.oneshot(get_request("/process")).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let body = json_body(response).await;
  assert_eq!(body["weapon_detected"], false);
  assert_eq!(body["confidence"], 0.0);
  assert_eq!(count_files(&dir.path().join("processed")), 1);
}

#[tokio::test]
async fn low_confidence_detection_is_ignored() {
  let dir = tempfile::tempdir().unwrap();
  let capture = camera().await.join("capture").unwrap();
  let model = Arc::new(FixedModel {
    items: vec![detection(0, 0.1)],
  });
  let app = build_app(dir.path(), &capture, model);

  let body = json_body(app.oneshot(get_request("/process")).await.unwrap()).await;
  assert_eq!(body["weapon_detected"], false);
}

#[tokio::test]
async fn camera_error_status_writes_nothing() {
  let dir = tempfile::tempdir().unwrap();
  let broken = camera().await.join("broken").unwrap();
  let app = build_app(dir.path(), &broken, Arc::new(FixedModel { items: vec![] }));

  let response = app.oneshot(get_request("/process")).await.unwrap();
  assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
  let body = json_body(response).await;
  assert_eq!(body["error"], "Failed to capture image from camera");
  assert_eq!(count_files(&dir.path().join("uploads")), 0);
  assert_eq!(count_files(&dir.path().join("processed")), 0);
}

#[tokio::test]
async fn camera_not_found_writes_nothing() {
  let dir = tempfile::tempdir().unwrap();
  let missing = camera().await.join("nothing-here").unwrap();
  let app = build_app(dir.path(), &missing, Arc::new(FixedModel { items: vec![] }));

  let response = app.oneshot(get_request("/process")).await.unwrap();
  assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(count_files(&dir.path().join("uploads")), 0);
}

#[tokio::test]
async fn camera_timeout_writes_nothing() {
  let dir = tempfile::tempdir().unwrap();
  let slow = camera().await.join("slow").unwrap();
  let app = build_app(dir.path(), &slow, Arc::new(FixedModel { items: vec![] }));

  let response = app.oneshot(get_request("/process")).await.unwrap();
  assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
  let body = json_body(response).await;
  assert_eq!(body["error"], "Failed to capture image from camera");
  assert_eq!(count_files(&dir.path().join("uploads")), 0);
}

#[tokio::test]
async fn model_failure_reports_processing_error() {
  let dir = tempfile::tempdir().unwrap();
  let capture = camera().await.join("capture").unwrap();
  let app = build_app(dir.path(), &capture, Arc::new(FailingModel));

  let response = app.oneshot(get_request("/process")).await.unwrap();
  assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
  let body = json_body(response).await;
  assert_eq!(body["error"], "Failed to process image");
  assert_eq!(count_files(&dir.path().join("processed")), 0);
}

#[tokio::test]
async fn missing_processed_image_is_not_found() {
  let dir = tempfile::tempdir().unwrap();
  let capture = camera().await.join("capture").unwrap();
  let app = build_app(dir.path(), &capture, Arc::new(FixedModel { items: vec![] }));

  let response = app
    .clone()
    .oneshot(get_request("/processed/processed_19700101_000000_0001.jpg"))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::NOT_FOUND);
  assert!(json_body(response).await["error"].is_string());

  std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();
  let response = app
    .oneshot(get_request("/processed/..%2Fsecret.txt"))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn index_page_is_served() {
  let dir = tempfile::tempdir().unwrap();
  let capture = camera().await.join("capture").unwrap();
  let app = build_app(dir.path(), &capture, Arc::new(FixedModel { items: vec![] }));

  let response = app.oneshot(get_request("/")).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  let html = String::from_utf8(bytes.to_vec()).unwrap();
  assert!(html.contains("/process"));
}
