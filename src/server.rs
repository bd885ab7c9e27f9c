// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/server.rs - HTTP 服务
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

//! 三个路由：
//! - `GET /` 页面；
//! - `GET /process` 采集并检测，返回 JSON 结论；
//! - `GET /processed/{filename}` 读取结果图。

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
  Json, Router,
  body::Body,
  extract::{Path, State},
  http::{HeaderMap, HeaderValue, StatusCode, header},
  response::{Html, IntoResponse, Response},
  routing::get,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  task::{DetectionTask, TaskError},
  utils::{image_content_type, is_plain_file_name},
};

const DEFAULT_INDEX_PAGE: &str = include_str!("../assets/index.html");
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

#[derive(Error, Debug)]
pub enum ApiError {
  #[error("Failed to capture image from camera")]
  CaptureFailed,
  #[error("Failed to process image")]
  ProcessingFailed,
  #[error("Not found: {0}")]
  NotFound(String),
  #[error("Internal error: {0}")]
  Internal(String),
}

impl ApiError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::CaptureFailed | ApiError::ProcessingFailed | ApiError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl From<TaskError> for ApiError {
  fn from(err: TaskError) -> Self {
    error!("任务失败: {}", err);
    match err {
      TaskError::Capture(_) => ApiError::CaptureFailed,
      TaskError::Processing(_) => ApiError::ProcessingFailed,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
  pub error: String,
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let body = ErrorResponse {
      error: self.to_string(),
    };
    (self.status_code(), Json(body)).into_response()
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessResponse {
  pub weapon_detected: bool,
  pub confidence: f64,
  pub processed_image: String,
}

#[derive(Clone)]
pub struct AppState {
  task: Arc<DetectionTask>,
  index_page: Option<PathBuf>,
  public_url: Option<Url>,
}

impl AppState {
  pub fn new(task: DetectionTask) -> Self {
    Self {
      task: Arc::new(task),
      index_page: None,
      public_url: None,
    }
  }

  pub fn with_index_page(mut self, index_page: Option<PathBuf>) -> Self {
    self.index_page = index_page;
    self
  }

  pub fn with_public_url(mut self, public_url: Option<Url>) -> Self {
    self.public_url = public_url;
    self
  }

  /// 结果图的访问地址
  ///
  /// 优先使用配置的公开地址，其次使用请求的 Host 头，都没有时返回站内路径。
  /// 使用 Host 头时协议取自反向代理的 `X-Forwarded-Proto`，缺省为 http。
  pub fn processed_image_url(&self, headers: &HeaderMap, filename: &str) -> String {
    let path = format!("processed/{}", urlencoding::encode(filename));

    if let Some(base) = &self.public_url {
      let mut base = base.clone();
      if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
      }
      match base.join(&path) {
        Ok(url) => return url.into(),
        Err(e) => warn!("无法拼接公开地址 {}: {}", base, e),
      }
    }

    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
      Some(host) => format!("{}://{}/{}", forwarded_scheme(headers), host, path),
      None => format!("/{}", path),
    }
  }
}

fn forwarded_scheme(headers: &HeaderMap) -> &'static str {
  let proto = headers
    .get(X_FORWARDED_PROTO)
    .and_then(|h| h.to_str().ok())
    .and_then(|v| v.split(',').next())
    .map(|v| v.trim().to_ascii_lowercase());
  match proto.as_deref() {
    Some("https") => "https",
    _ => "http",
  }
}

pub fn create_app(state: AppState) -> Router {
  Router::new()
    .route("/", get(index_handler))
    .route("/process", get(process_handler))
    .route("/processed/:filename", get(processed_image_handler))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
  if let Ok(addr) = listener.local_addr() {
    info!("HTTP 服务监听于 {}", addr);
  }
  axum::serve(listener, create_app(state))
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!("无法监听中断信号: {}", e);
    std::future::pending::<()>().await;
  }
  info!("收到中断信号，准备退出...");
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
  match &state.index_page {
    Some(path) => tokio::fs::read_to_string(path).await.map(Html).map_err(|e| {
      error!("读取页面失败 {}: {}", path.display(), e);
      ApiError::NotFound("index page".to_string())
    }),
    None => Ok(Html(DEFAULT_INDEX_PAGE.to_string())),
  }
}

async fn process_handler(
  State(state): State<AppState>,
  headers: HeaderMap,
) -> Result<Json<ProcessResponse>, ApiError> {
  let verdict = state.task.run_once().await?;
  let processed_image = state.processed_image_url(&headers, &verdict.processed.filename);

  Ok(Json(ProcessResponse {
    weapon_detected: verdict.weapon_detected,
    confidence: verdict.confidence,
    processed_image,
  }))
}

async fn processed_image_handler(
  State(state): State<AppState>,
  Path(filename): Path<String>,
) -> Result<Response, ApiError> {
  if !is_plain_file_name(&filename) {
    warn!("拒绝访问结果图: {}", filename);
    return Err(ApiError::NotFound(filename));
  }

  let path = state.task.processed().directory().join(&filename);
  let file = match tokio::fs::File::open(&path).await {
    Ok(file) => file,
    Err(e) if e.kind() == ErrorKind::NotFound => return Err(ApiError::NotFound(filename)),
    Err(e) => return Err(ApiError::Internal(e.to_string())),
  };
  let metadata = file
    .metadata()
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;
  if !metadata.is_file() {
    return Err(ApiError::NotFound(filename));
  }

  let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
  let headers = response.headers_mut();
  headers.insert(
    header::CONTENT_TYPE,
    HeaderValue::from_static(image_content_type(&filename)),
  );
  headers.insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
  Ok(response)
}
