// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/model.rs - 模型
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
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::FromUrl;

/// 默认置信度阈值，检测程序与结论提取共用
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.25;

pub trait Model {
  type Input: ?Sized;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 服务内使用的模型：输入为已保存的图像路径
pub type SharedModel =
  Arc<dyn Model<Input = Path, Output = DetectOutput, Error = ModelError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectItem {
  pub class_id: u32,
  #[serde(rename = "confidence")]
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，归一化坐标
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  /// 去掉置信度低于阈值的检测
  pub fn above(self, min_score: f32) -> Self {
    self
      .items
      .into_vec()
      .into_iter()
      .filter(|item| item.score >= min_score)
      .collect::<Vec<_>>()
      .into()
  }

  /// 指定类别的最高置信度，没有该类别时为 None
  pub fn best_score_of(&self, class_id: u32) -> Option<f32> {
    self
      .items
      .iter()
      .filter(|item| item.class_id == class_id)
      .map(|item| item.score)
      .reduce(f32::max)
  }
}

/// 一次推理的全部产物
#[derive(Debug, Clone, Default)]
pub struct DetectOutput {
  pub result: DetectResult,
  /// 模型自己绘制的结果图；为 None 时由服务自行绘制
  pub rendered: Option<PathBuf>,
  /// 本次推理专属的临时目录，结果图转移后删除
  pub scratch: Option<PathBuf>,
}

impl From<DetectResult> for DetectOutput {
  fn from(result: DetectResult) -> Self {
    Self {
      result,
      ..Default::default()
    }
  }
}

mod command;
pub use self::command::{CommandDetector, CommandDetectorError};

#[cfg(feature = "model_yolo26")]
mod yolo26;
#[cfg(feature = "model_yolo26")]
pub use self::yolo26::{Yolo26, Yolo26Builder, Yolo26Error};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("外部检测程序错误: {0}")]
  CommandDetectorError(#[from] CommandDetectorError),
  #[cfg(feature = "model_yolo26")]
  #[error("YOLO26 模型错误: {0}")]
  Yolo26Error(#[from] Yolo26Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("推理失败: {0}")]
  InferenceFailed(String),
}

pub enum ModelWrapper {
  Command(CommandDetector),
  #[cfg(feature = "model_yolo26")]
  Yolo26(Yolo26),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    match url.scheme() {
      CommandDetector::SCHEME => Ok(ModelWrapper::Command(CommandDetector::from_url(url)?)),
      #[cfg(feature = "model_yolo26")]
      Yolo26Builder::SCHEME => Ok(ModelWrapper::Yolo26(Yolo26Builder::from_url(url)?.build()?)),
      scheme => Err(ModelError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl ModelWrapper {
  /// 设置模型侧的置信度阈值，应与结论提取使用的阈值一致
  pub fn with_confidence(self, confidence: f32) -> Self {
    match self {
      ModelWrapper::Command(model) => ModelWrapper::Command(model.with_confidence(confidence)),
      #[cfg(feature = "model_yolo26")]
      ModelWrapper::Yolo26(model) => ModelWrapper::Yolo26(model.with_confidence(confidence)),
    }
  }
}

impl Model for ModelWrapper {
  type Input = Path;
  type Output = DetectOutput;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self {
      ModelWrapper::Command(model) => model.infer(input).map_err(ModelError::from),
      #[cfg(feature = "model_yolo26")]
      ModelWrapper::Yolo26(model) => model.infer(input).map_err(ModelError::from),
    }
  }
}
