//! # liu-core
//!
//! Liu 转码核心的底层基础设施: 精确有理数与时间戳换算, 音视频格式描述,
//! 编解码器包装共用的生命周期状态机, 以及统一错误类型.
//!
//! 本 crate 对标 FFmpeg 的 libavutil 中与转码管线相关的部分.

pub mod channel_layout;
pub mod error;
pub mod media_type;
pub mod options;
pub mod pixel_format;
pub mod rational;
pub mod sample_format;
pub mod state;
pub mod timestamp;

// 重导出常用类型
pub use channel_layout::{ChannelLayout, ChannelMask};
pub use error::{LiuError, LiuResult};
pub use media_type::MediaType;
pub use options::Options;
pub use pixel_format::PixelFormat;
pub use rational::{Rational, Rounding};
pub use sample_format::SampleFormat;
pub use state::{CoderState, Lifecycle};
pub use timestamp::{NOPTS_VALUE, Timestamp};
