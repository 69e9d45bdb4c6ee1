//! # Liu (流)
//!
//! 纯 Rust 实现的媒体转码核心, 对标 FFmpeg 中与转码管线相关的部分.
//!
//! - **编解码**: 编解码器生命周期、部分消费解码循环与编码排空协议
//! - **码流滤镜**: 数据包级别的变换
//! - **音频重采样**: 采样率、声道、格式转换, 无漂移的时间戳换算
//! - **图像缩放**: 分辨率与像素格式转换
//!
//! # 快速开始
//!
//! ```rust
//! use liu::core::Rational;
//!
//! let tb = Rational::new(1, 44100);
//! assert_eq!(Rational::new(1, 1000).rescale(44100, tb), 1000);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `liu-core` | 核心类型、有理数时间运算与生命周期状态机 |
//! | `liu-codec` | 编解码器与码流滤镜 |
//! | `liu-resample` | 音频重采样 |
//! | `liu-scale` | 图像缩放 |

/// 核心类型与工具 (对标 libavutil)
pub use liu_core as core;

/// 编解码器框架 (对标 libavcodec)
pub use liu_codec as codec;

/// 音频重采样 (对标 libswresample)
pub use liu_resample as resample;

/// 图像缩放与像素格式转换 (对标 libswscale)
pub use liu_scale as scale;

pub mod config;
pub mod pipeline;

pub use config::{AudioStreamConfig, CompensationConfig, PipelineConfig};
pub use pipeline::{PacketSink, PacketSource, RawPcmSink, RawPcmSource, TranscodeStats, Transcoder};

/// 获取 Liu 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置编解码器的注册表
pub fn default_codec_registry() -> liu_codec::CodecRegistry {
    let mut registry = liu_codec::CodecRegistry::new();
    liu_codec::register_all(&mut registry);
    registry
}
