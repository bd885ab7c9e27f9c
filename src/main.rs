// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/main.rs - 服务主程序
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

mod args;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use shaobing::{
  FromUrl,
  input::{InputWrapper, UploadDirectory},
  model::ModelWrapper,
  output::{ProcessedDirectory, draw::Draw},
  server::{self, AppState},
  task::DetectionTask,
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("监听地址: {}", args.bind);
  info!("采集来源: {}", args.camera);
  info!("检测模型: {}", args.model);
  info!("静态目录: {}", args.static_dir.display());
  info!("目标类别: {}, 置信度阈值: {}", args.target_class, args.confidence);

  let upload_dir = args.upload_dir();
  let processed_dir = args.processed_dir();
  std::fs::create_dir_all(&upload_dir)
    .with_context(|| format!("无法创建目录: {}", upload_dir.display()))?;
  std::fs::create_dir_all(&processed_dir)
    .with_context(|| format!("无法创建目录: {}", processed_dir.display()))?;

  let timeout = Duration::try_from_secs_f64(args.camera_timeout)
    .with_context(|| format!("采集超时无效: {}", args.camera_timeout))?;
  let input = InputWrapper::from_url(&args.camera)?
    .with_timeout(timeout)
    .with_max_bytes(args.camera_max_bytes);

  info!("正在加载模型...");
  let model = ModelWrapper::from_url(&args.model)?.with_confidence(args.confidence);
  info!("模型加载完成");

  let mut draw = Draw::default().with_labels(args.labels.clone());
  if let Some(font) = &args.font {
    draw = draw.with_font_file(font)?;
  }

  let task = DetectionTask::new(
    input,
    UploadDirectory::new(upload_dir),
    Arc::new(model),
    ProcessedDirectory::new(processed_dir, draw),
  )
  .with_target_class(args.target_class)
  .with_min_confidence(args.confidence);

  let state = AppState::new(task)
    .with_index_page(args.index.clone())
    .with_public_url(args.public_url.clone());

  let listener = tokio::net::TcpListener::bind(args.bind)
    .await
    .with_context(|| format!("无法监听 {}", args.bind))?;
  server::serve(listener, state).await?;

  info!("服务已退出");
  Ok(())
}
