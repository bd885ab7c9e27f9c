// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/model/yolo26.rs - RKNPU 上的 YOLO26 检测模型
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

use std::path::Path;
use std::sync::Mutex;

use image::{ImageReader, imageops::FilterType};
use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DEFAULT_MIN_CONFIDENCE, DetectItem, DetectOutput, DetectResult, Model},
};

const YOLO26_NUM_INPUTS: u32 = 1;
const YOLO26_NUM_OUTPUTS: u32 = 6;
const YOLO26_INPUT_SIZE: u32 = 640;
const YOLO26_HEAD_SIZES: [usize; 3] = [80, 40, 20];
const YOLO26_STRIDES: [f32; 3] = [8.0, 16.0, 32.0];
const YOLO26_DEFAULT_CLASSES: usize = 1;

#[derive(Error, Debug)]
pub enum Yolo26Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("RKNN 错误: {0}")]
  RknnError(#[from] rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("推理上下文不可用")]
  ContextPoisoned,
}

pub struct Yolo26Builder {
  model_path: String,
  classes: usize,
}

impl FromUrlWithScheme for Yolo26Builder {
  const SCHEME: &'static str = "yolo26";
}

impl FromUrl for Yolo26Builder {
  type Error = Yolo26Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolo26Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let classes = match url.query_pairs().find(|(k, _)| k == "classes") {
      Some((_, v)) => v
        .parse()
        .map_err(|_| Yolo26Error::ModelPathError(format!("classes={}", v)))?,
      None => YOLO26_DEFAULT_CLASSES,
    };

    Ok(Yolo26Builder {
      model_path: url.path().to_string(),
      classes,
    })
  }
}

impl Yolo26Builder {
  pub fn build(self) -> Result<Yolo26, Yolo26Error> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    let context = Context::new(&model_data, InitFlags::default())?;

    let num_inputs = context.num_inputs()?;
    let num_outputs = context.num_outputs()?;
    if num_inputs != YOLO26_NUM_INPUTS || num_outputs != YOLO26_NUM_OUTPUTS {
      let msg = format!(
        "预期 {} 个输入 {} 个输出, 实际为 {} 个输入 {} 个输出",
        YOLO26_NUM_INPUTS, YOLO26_NUM_OUTPUTS, num_inputs, num_outputs
      );
      error!("{}", msg);
      return Err(Yolo26Error::ModelInvalid(msg));
    }

    info!("模型加载完成，类别数 {}", self.classes);
    Ok(Yolo26 {
      context: Mutex::new(context),
      classes: self.classes,
      confidence: DEFAULT_MIN_CONFIDENCE,
    })
  }
}

pub struct Yolo26 {
  context: Mutex<Context>,
  classes: usize,
  confidence: f32,
}

impl Yolo26 {
  pub fn with_confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }
}

impl Model for Yolo26 {
  type Input = Path;
  type Output = DetectOutput;
  type Error = Yolo26Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    // 直接拉伸到模型输入尺寸，归一化坐标即可对应原图
    let frame = ImageReader::open(input)?
      .with_guessed_format()?
      .decode()?
      .resize_exact(YOLO26_INPUT_SIZE, YOLO26_INPUT_SIZE, FilterType::Triangle)
      .to_rgb8()
      .into_raw();

    let context = self
      .context
      .lock()
      .map_err(|_| Yolo26Error::ContextPoisoned)?;
    context.set_input(0, &frame, TensorFormat::NHWC, TensorType::UInt8)?;
    context.run()?;
    let output = context.get_outputs()?;

    Ok(self.postprocess(output).into())
  }
}

impl Yolo26 {
  fn postprocess(&self, output: rknpu::Output) -> DetectResult {
    let mut items = Vec::new();
    let input_size = YOLO26_INPUT_SIZE as f32;

    for (head_idx, (&map_size, stride)) in YOLO26_HEAD_SIZES.iter().zip(YOLO26_STRIDES).enumerate() {
      let spatial = map_size * map_size;
      let reg_len = 4 * spatial;
      let cls_len = self.classes * spatial;

      let (first, second) = match (output.get_f32(head_idx * 2), output.get_f32(head_idx * 2 + 1)) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => {
          error!("检测头 {} 输出读取失败: {}", head_idx, e);
          continue;
        }
      };

      // RKNN 的输出顺序不固定，按张量大小区分回归和分类
      let (reg, cls) = if first.len() == reg_len && second.len() == cls_len {
        (first, second)
      } else if first.len() == cls_len && second.len() == reg_len {
        (second, first)
      } else {
        error!(
          "检测头 {}: 输出大小 {} / {} 与期望 {} / {} 不符",
          head_idx,
          first.len(),
          second.len(),
          reg_len,
          cls_len
        );
        continue;
      };

      for idx in 0..spatial {
        let (class_id, logit) = (0..self.classes)
          .map(|c| (c, cls[c * spatial + idx]))
          .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        let score = sigmoid(logit);
        if score < self.confidence {
          continue;
        }

        let grid_x = (idx % map_size) as f32 + 0.5;
        let grid_y = (idx / map_size) as f32 + 0.5;
        let edge = |offset: f32, center: f32| ((center + offset) * stride).clamp(0.0, input_size) / input_size;

        items.push(DetectItem {
          class_id: class_id as u32,
          score,
          bbox: [
            edge(-reg[idx], grid_x),
            edge(-reg[spatial + idx], grid_y),
            edge(reg[2 * spatial + idx], grid_x),
            edge(reg[3 * spatial + idx], grid_y),
          ],
        });
      }
    }

    debug!("检测到 {} 个物体", items.len());
    items.into()
  }
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}
