// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/model/command.rs - 外部检测程序
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

//! 把检测模型当作黑盒，通过子进程调用。
//!
//! 调用方式为 `<program> [arg..] <source> <output_dir> <conf>`：
//! - `source` 是待检测的图像；
//! - `output_dir` 是本次调用独占的目录，检测程序可以把结果图写到这里；
//! - `conf` 是置信度阈值。
//!
//! 标准输出必须是 JSON 数组，每项为 `{"class_id", "confidence", "bbox"}`，
//! `bbox` 为归一化的 `[x_min, y_min, x_max, y_max]`。

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DEFAULT_MIN_CONFIDENCE, DetectItem, DetectOutput, Model},
  utils::is_image_file,
};

const DEFAULT_SCRATCH_DIR: &str = "runs/detect";

#[derive(Error, Debug)]
pub enum CommandDetectorError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("参数无效: {0}")]
  InvalidParameter(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("检测程序异常退出 ({status}): {stderr}")]
  ExitFailure { status: ExitStatus, stderr: String },
  #[error("检测结果解析失败: {0}")]
  OutputParseError(#[from] serde_json::Error),
  #[error("未找到检测结果图: {0}")]
  NoOutputImage(PathBuf),
}

/// 结果图由谁绘制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotate {
  /// 由服务使用内置的绘制器绘制
  Builtin,
  /// 由检测程序写入输出目录
  Detector,
}

#[derive(Debug)]
pub struct CommandDetector {
  program: PathBuf,
  args: Vec<String>,
  annotate: Annotate,
  scratch: PathBuf,
  confidence: f32,
}

impl FromUrlWithScheme for CommandDetector {
  const SCHEME: &'static str = "command";
}

impl FromUrl for CommandDetector {
  type Error = CommandDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(CommandDetectorError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let program = urlencoding::decode(url.path())
      .map_err(|e| CommandDetectorError::InvalidParameter(e.to_string()))?
      .into_owned();
    if program.is_empty() {
      return Err(CommandDetectorError::InvalidParameter(
        "未指定检测程序".to_string(),
      ));
    }

    let mut args = Vec::new();
    let mut annotate = Annotate::Builtin;
    let mut scratch = PathBuf::from(DEFAULT_SCRATCH_DIR);

    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "arg" => args.push(v.into_owned()),
        "annotate" => {
          annotate = match v.as_ref() {
            "detector" => Annotate::Detector,
            "builtin" => Annotate::Builtin,
            other => {
              return Err(CommandDetectorError::InvalidParameter(format!(
                "annotate={}",
                other
              )));
            }
          }
        }
        "scratch" => scratch = PathBuf::from(v.as_ref()),
        other => warn!("忽略未知参数: {}", other),
      }
    }

    Ok(CommandDetector {
      program: PathBuf::from(program),
      args,
      annotate,
      scratch,
      confidence: DEFAULT_MIN_CONFIDENCE,
    })
  }
}

impl CommandDetector {
  pub fn with_confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn annotate(&self) -> Annotate {
    self.annotate
  }

  pub fn scratch(&self) -> &Path {
    &self.scratch
  }

  fn output_dir(&self, input: &Path) -> Result<PathBuf, CommandDetectorError> {
    let stem = input
      .file_stem()
      .and_then(|s| s.to_str())
      .ok_or_else(|| CommandDetectorError::InvalidParameter(input.display().to_string()))?;
    Ok(self.scratch.join(stem))
  }

  fn run(&self, input: &Path, output_dir: &Path) -> Result<DetectOutput, CommandDetectorError> {
    debug!(
      "执行检测程序: {} {:?} {} {}",
      self.program.display(),
      self.args,
      input.display(),
      output_dir.display()
    );

    let output = Command::new(&self.program)
      .args(&self.args)
      .arg(input)
      .arg(output_dir)
      .arg(self.confidence.to_string())
      .stdin(Stdio::null())
      .output()?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      error!("检测程序退出状态 {}: {}", output.status, stderr);
      return Err(CommandDetectorError::ExitFailure {
        status: output.status,
        stderr,
      });
    }

    let items: Vec<DetectItem> = serde_json::from_slice(&output.stdout)?;
    info!("检测程序返回 {} 个目标", items.len());

    let rendered = match self.annotate {
      Annotate::Builtin => None,
      Annotate::Detector => Some(
        find_rendered(output_dir, input)?
          .ok_or_else(|| CommandDetectorError::NoOutputImage(output_dir.to_path_buf()))?,
      ),
    };

    Ok(DetectOutput {
      result: items.into(),
      rendered,
      scratch: Some(output_dir.to_path_buf()),
    })
  }
}

impl Model for CommandDetector {
  type Input = Path;
  type Output = DetectOutput;
  type Error = CommandDetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let output_dir = self.output_dir(input)?;
    std::fs::create_dir_all(&output_dir)?;

    self.run(input, &output_dir).inspect_err(|_| {
      if let Err(e) = std::fs::remove_dir_all(&output_dir) {
        warn!("清理临时目录失败 {}: {}", output_dir.display(), e);
      }
    })
  }
}

/// 在本次调用的输出目录中查找结果图
///
/// 优先选择与输入同名的文件，否则取文件名排序后的第一张图片。
fn find_rendered(output_dir: &Path, input: &Path) -> Result<Option<PathBuf>, std::io::Error> {
  let mut candidates = std::fs::read_dir(output_dir)?
    .filter_map(|entry| entry.ok().map(|e| e.path()))
    .filter(|path| path.is_file() && is_image_file(path))
    .collect::<Vec<_>>();
  candidates.sort();

  let same_stem = candidates
    .iter()
    .position(|path| path.file_stem() == input.file_stem());

  Ok(match same_stem {
    Some(idx) => Some(candidates.swap_remove(idx)),
    None => candidates.into_iter().next(),
  })
}
