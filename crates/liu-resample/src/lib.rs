//! # liu-resample
//!
//! Liu 转码核心的音频重采样库.
//!
//! 本 crate 对标 FFmpeg 的 libswresample, 提供:
//! - [`MediaAudioResampler`]: 生命周期与无漂移的时间戳换算. 输出时间基为
//!   `1/lcm(输入采样率, 输出采样率)`, 两侧的采样网格都能被精确表示.
//! - [`ResampleEngine`]: 重采样引擎边界.
//! - [`SoftwareResampler`]: 内置引擎, 支持采样格式、声道布局与采样率转换,
//!   以及漂移补偿、丢弃/插入静音与延迟查询.
//!
//! ## 使用示例
//!
//! ```rust
//! use liu_core::{ChannelLayout, SampleFormat};
//! use liu_resample::MediaAudioResampler;
//!
//! let mut rs = MediaAudioResampler::new(
//!     ChannelLayout::STEREO, 22050, SampleFormat::S16,
//!     ChannelLayout::SURROUND_5_1, 44100, SampleFormat::F64p,
//! ).unwrap();
//! assert_eq!(rs.time_base().den, 44100);
//! rs.open().unwrap();
//! ```

mod convert;
pub mod audio;
pub mod engine;
pub mod multichannel;
pub mod software;

pub use audio::MediaAudioResampler;
pub use engine::{AudioSpec, ResampleEngine, ResampleOptions};
pub use software::SoftwareResampler;
