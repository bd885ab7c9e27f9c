// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/task.rs - 采集、推理、结果提取流程
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

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::task::{JoinError, spawn_blocking};
use tracing::{info, warn};

use crate::{
  input::{InputError, InputWrapper, UploadDirectory},
  model::{DEFAULT_MIN_CONFIDENCE, DetectResult, ModelError, SharedModel},
  output::{OutputError, ProcessedDirectory, ProcessedImage, Render},
};

pub const DEFAULT_TARGET_CLASS: u32 = 0;

#[derive(Error, Debug)]
pub enum ProcessingError {
  #[error("模型错误: {0}")]
  ModelError(#[from] ModelError),
  #[error("输出错误: {0}")]
  OutputError(#[from] OutputError),
  #[error("工作线程错误: {0}")]
  JoinError(#[from] JoinError),
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("采集失败: {0}")]
  Capture(#[from] InputError),
  #[error("处理失败: {0}")]
  Processing(#[from] ProcessingError),
}

/// 一次检测的结论
#[derive(Debug, Clone)]
pub struct Verdict {
  pub weapon_detected: bool,
  /// 目标类别的最高置信度，百分比，保留两位小数
  pub confidence: f64,
  pub processed: ProcessedImage,
}

impl Verdict {
  pub fn from_result(result: &DetectResult, target_class: u32, processed: ProcessedImage) -> Self {
    let best = result.best_score_of(target_class).map(to_percent);
    Self {
      weapon_detected: best.is_some(),
      confidence: best.unwrap_or(0.0),
      processed,
    }
  }
}

fn to_percent(score: f32) -> f64 {
  (score as f64 * 100.0 * 100.0).round() / 100.0
}

/// 单次检测任务：采集 → 推理 → 输出结果图 → 提取结论
pub struct DetectionTask {
  input: InputWrapper,
  uploads: UploadDirectory,
  model: SharedModel,
  output: Arc<ProcessedDirectory>,
  target_class: u32,
  min_confidence: f32,
}

impl DetectionTask {
  pub fn new(
    input: InputWrapper,
    uploads: UploadDirectory,
    model: SharedModel,
    output: ProcessedDirectory,
  ) -> Self {
    Self {
      input,
      uploads,
      model,
      output: Arc::new(output),
      target_class: DEFAULT_TARGET_CLASS,
      min_confidence: DEFAULT_MIN_CONFIDENCE,
    }
  }

  pub fn with_target_class(mut self, target_class: u32) -> Self {
    self.target_class = target_class;
    self
  }

  pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
    self.min_confidence = min_confidence;
    self
  }

  pub fn processed(&self) -> &ProcessedDirectory {
    &self.output
  }

  pub async fn run_once(&self) -> Result<Verdict, TaskError> {
    info!("开始任务，采集来源: {}", self.input.source());
    let data = self.input.capture().await?;
    let captured = self.uploads.save(&data).await.map_err(InputError::from)?;

    info!("采集成功，开始推理...");
    let now = Instant::now();
    let model = self.model.clone();
    let path = captured.path.clone();
    let mut detected = spawn_blocking(move || model.infer(&path))
      .await
      .map_err(ProcessingError::from)?
      .map_err(ProcessingError::from)?;
    info!(
      "推理完成，耗时: {:.2?}, 检测到 {} 个目标",
      now.elapsed(),
      detected.result.len()
    );

    detected.result = std::mem::take(&mut detected.result).above(self.min_confidence);

    let output = self.output.clone();
    let (detected, saved) = spawn_blocking(move || {
      let saved = output.render_result(&captured, &detected);
      (detected, saved)
    })
    .await
    .map_err(ProcessingError::from)?;

    if let Some(scratch) = &detected.scratch
      && let Err(e) = tokio::fs::remove_dir_all(scratch).await
    {
      warn!("清理临时目录失败 {}: {}", scratch.display(), e);
    }

    let processed = saved.map_err(ProcessingError::from)?;
    let verdict = Verdict::from_result(&detected.result, self.target_class, processed);
    info!(
      "任务完成: 检出={}, 置信度={:.2}%, 结果图={}",
      verdict.weapon_detected, verdict.confidence, verdict.processed.filename
    );
    Ok(verdict)
  }
}
