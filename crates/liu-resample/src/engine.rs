//! 重采样引擎边界.
//!
//! 时间戳接口沿用 libswresample 的约定: `next_pts` 的输入输出单位都是
//! `1/(输入采样率 * 输出采样率)`, `i64::MIN` 表示没有时间戳.

use std::fmt;

use liu_core::{ChannelLayout, LiuResult, SampleFormat};

/// 一侧音频的格式描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub sample_format: SampleFormat,
    pub channel_layout: ChannelLayout,
}

impl AudioSpec {
    pub const fn new(
        sample_rate: u32,
        sample_format: SampleFormat,
        channel_layout: ChannelLayout,
    ) -> Self {
        Self {
            sample_rate,
            sample_format,
            channel_layout,
        }
    }

    pub const fn channels(&self) -> u32 {
        self.channel_layout.channels
    }
}

impl fmt::Display for AudioSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz/{}/{}",
            self.sample_rate, self.sample_format, self.channel_layout
        )
    }
}

/// 时间戳漂移补偿参数
///
/// `min_compensation` 为 `None` 时不做补偿, 输出时间戳直接取输入时间戳减去缓冲延迟.
/// 启用后, 偏差 (秒) 超过 `min_compensation` 才处理: 第一帧或偏差超过
/// `min_hard_compensation` 时插入静音/丢弃输出, 否则在
/// `soft_compensation_duration` 秒内以拉伸方式逐步修正.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResampleOptions {
    pub min_compensation: Option<f64>,
    pub min_hard_compensation: f64,
    pub soft_compensation_duration: f64,
    /// 软补偿的最大比例; 负数表示以输入采样数计
    pub max_soft_compensation: f64,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            min_compensation: None,
            min_hard_compensation: 0.1,
            soft_compensation_duration: 1.0,
            max_soft_compensation: 0.0,
        }
    }
}

/// 重采样引擎
pub trait ResampleEngine: Send {
    /// 引擎名称
    fn name(&self) -> &str;

    /// 配置输入输出格式; 失败时引擎不可用
    fn configure(
        &mut self,
        input: &AudioSpec,
        output: &AudioSpec,
        options: &ResampleOptions,
    ) -> LiuResult<()>;

    /// 转换采样
    ///
    /// `input` 为 `None` 表示排空内部缓冲. 最多写出 `out_capacity` 个采样,
    /// 容纳不下的部分留在引擎内部, 返回写出的采样数.
    fn convert(
        &mut self,
        output: &mut [Vec<u8>],
        out_capacity: u32,
        input: Option<(&[Vec<u8>], u32)>,
    ) -> LiuResult<u32>;

    /// 给定下一个输入的时间戳, 返回下一个输出采样的时间戳
    fn next_pts(&mut self, pts: i64) -> i64;

    /// 在接下来 `distance` 个输出采样内多输出 `sample_delta` 个采样
    fn set_compensation(&mut self, sample_delta: i32, distance: i32) -> LiuResult<()>;

    /// 丢弃接下来的 `count` 个输出采样, 返回实际计入的数量
    fn drop_output(&mut self, count: u32) -> LiuResult<u32>;

    /// 插入 `count` 个输入采样的静音, 返回实际插入的数量
    fn inject_silence(&mut self, count: u32) -> LiuResult<u32>;

    /// 缓冲延迟, 以 `1/base` 秒为单位
    fn delay(&self, base: i64) -> i64;
}
