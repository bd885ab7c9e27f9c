// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use url::Url;

use shaobing::input::DEFAULT_MAX_IMAGE_BYTES;

/// Shaobing 服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 监听地址
  #[arg(long, env = "SHAOBING_BIND", default_value = "127.0.0.1:5000", value_name = "ADDR")]
  pub bind: SocketAddr,

  /// 摄像头采集地址
  /// 支持:
  /// - http(s)://<摄像头地址>/capture
  /// - image:///path/to/image.jpg （离线调试）
  #[arg(
    long,
    env = "SHAOBING_CAMERA",
    default_value = "http://192.168.1.3/capture",
    value_name = "SOURCE"
  )]
  pub camera: Url,

  /// 采集超时（秒）
  #[arg(long, env = "SHAOBING_CAMERA_TIMEOUT", default_value = "5", value_name = "SECONDS")]
  pub camera_timeout: f64,

  /// 单帧图像大小上限（字节）
  #[arg(
    long,
    env = "SHAOBING_CAMERA_MAX_BYTES",
    default_value_t = DEFAULT_MAX_IMAGE_BYTES,
    value_name = "BYTES"
  )]
  pub camera_max_bytes: usize,

  /// 检测模型
  /// 支持:
  /// - command:///path/to/detector?arg=..&annotate=detector|builtin&scratch=runs/detect
  /// - yolo26:///path/to/model.rknn?classes=1 （需要 model_yolo26 特性）
  #[arg(long, env = "SHAOBING_MODEL", value_name = "MODEL")]
  pub model: Url,

  /// 静态资源目录，采集图像与结果图分别保存在 uploads/ 与 processed/ 下
  #[arg(long, env = "SHAOBING_STATIC_DIR", default_value = "static", value_name = "DIR")]
  pub static_dir: PathBuf,

  /// 首页文件，不指定时使用内置页面
  #[arg(long, env = "SHAOBING_INDEX", value_name = "FILE")]
  pub index: Option<PathBuf>,

  /// 对外公开的服务地址，用于生成结果图链接
  #[arg(long, env = "SHAOBING_PUBLIC_URL", value_name = "URL")]
  pub public_url: Option<Url>,

  /// 目标类别编号
  #[arg(long, env = "SHAOBING_TARGET_CLASS", default_value = "0", value_name = "ID")]
  pub target_class: u32,

  /// 置信度阈值 (0.0 - 1.0)，同时传给检测模型
  #[arg(long, env = "SHAOBING_CONFIDENCE", default_value = "0.25", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 类别名称，按类别编号顺序，逗号分隔
  #[arg(
    long,
    env = "SHAOBING_LABELS",
    default_value = "weapon",
    value_delimiter = ',',
    value_name = "NAMES"
  )]
  pub labels: Vec<String>,

  /// 标签字体（TTF），不指定时只绘制边框
  #[arg(long, env = "SHAOBING_FONT", value_name = "FILE")]
  pub font: Option<PathBuf>,
}

impl Args {
  pub fn upload_dir(&self) -> PathBuf {
    self.static_dir.join("uploads")
  }

  pub fn processed_dir(&self) -> PathBuf {
    self.static_dir.join("processed")
  }
}
