// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/input/http_camera.rs - HTTP 摄像头单帧采集
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

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::FromUrl;

pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum HttpCameraError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("请求错误: {0}")]
  RequestError(#[from] reqwest::Error),
  #[error("摄像头返回状态码 {0}")]
  BadStatus(StatusCode),
  #[error("画面超过 {0} 字节上限")]
  TooLarge(usize),
}

/// 通过一次 HTTP GET 获取摄像头当前画面，不做重试
pub struct HttpCamera {
  url: Url,
  client: Client,
  timeout: Duration,
  max_bytes: usize,
}

impl FromUrl for HttpCamera {
  type Error = HttpCameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if !matches!(url.scheme(), "http" | "https") {
      error!("URI scheme mismatch: expected 'http', found '{}'", url.scheme());
      return Err(HttpCameraError::SchemeMismatch(url.scheme().to_string()));
    }

    Ok(HttpCamera {
      url: url.clone(),
      client: Client::builder().build()?,
      timeout: DEFAULT_CAPTURE_TIMEOUT,
      max_bytes: DEFAULT_MAX_IMAGE_BYTES,
    })
  }
}

impl HttpCamera {
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
    self.max_bytes = max_bytes;
    self
  }

  pub fn url(&self) -> &Url {
    &self.url
  }

  pub async fn capture(&self) -> Result<Vec<u8>, HttpCameraError> {
    debug!("请求摄像头画面: {}", self.url);
    let mut response = self
      .client
      .get(self.url.clone())
      .timeout(self.timeout)
      .send()
      .await
      .inspect_err(|e| error!("摄像头请求失败: {}", e))?;

    let status = response.status();
    if status != StatusCode::OK {
      error!("摄像头返回异常状态码: {}", status);
      return Err(HttpCameraError::BadStatus(status));
    }

    if let Some(length) = response.content_length()
      && length > self.max_bytes as u64
    {
      error!("摄像头声明的画面大小 {} 超过上限", length);
      return Err(HttpCameraError::TooLarge(self.max_bytes));
    }

    // 没有 Content-Length 时边读边检查
    let mut data = Vec::new();
    while let Some(chunk) = response.chunk().await? {
      if data.len() + chunk.len() > self.max_bytes {
        error!("摄像头画面超过上限 {} 字节", self.max_bytes);
        return Err(HttpCameraError::TooLarge(self.max_bytes));
      }
      data.extend_from_slice(&chunk);
    }
    debug!("获取画面 {} 字节", data.len());
    Ok(data)
  }
}

#[cfg(test)]
mod tests {
  use axum::{Router, routing::get};

  use super::*;

  async fn spawn_camera() -> Url {
    let router = Router::new()
      .route("/small", get(|| async { vec![7u8; 100] }))
      .route("/large", get(|| async { vec![7u8; 4096] }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{}/", addr)).unwrap()
  }

  #[tokio::test]
  async fn body_within_limit_is_returned() {
    let base = spawn_camera().await;
    let camera = HttpCamera::from_url(&base.join("small").unwrap())
      .unwrap()
      .with_max_bytes(1024);
    assert_eq!(camera.capture().await.unwrap(), vec![7u8; 100]);
  }

  #[tokio::test]
  async fn oversized_body_is_rejected() {
    let base = spawn_camera().await;
    let camera = HttpCamera::from_url(&base.join("large").unwrap())
      .unwrap()
      .with_max_bytes(1024);
    assert!(matches!(
      camera.capture().await,
      Err(HttpCameraError::TooLarge(1024))
    ));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("rtsp://192.168.1.3/stream").unwrap();
    assert!(matches!(
      HttpCamera::from_url(&url),
      Err(HttpCameraError::SchemeMismatch(_))
    ));
  }
}
