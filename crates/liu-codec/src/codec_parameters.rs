//! 编解码器参数.
//!
//! 对标 FFmpeg 的 `AVCodecParameters`. `Coder` 在 `open()` 前持有调用方协商的参数,
//! 引擎打开时可以回写实际采用的输出格式.

use liu_core::{ChannelLayout, MediaType, PixelFormat, Rational, SampleFormat};

use crate::codec_id::CodecId;

/// 编解码器参数
#[derive(Debug, Clone)]
pub struct CodecParameters {
    /// 编解码器标识
    pub codec_id: CodecId,
    /// 额外数据
    pub extra_data: Vec<u8>,
    /// 码率 (bits/s)
    pub bit_rate: u64,
    /// 媒体类型特定参数
    pub params: CodecParamsType,
}

/// 媒体类型特定参数
#[derive(Debug, Clone)]
pub enum CodecParamsType {
    /// 视频参数
    Video(VideoCodecParams),
    /// 音频参数
    Audio(AudioCodecParams),
    /// 字幕无额外参数
    Subtitle,
}

/// 视频编解码器参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCodecParams {
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 帧率
    pub frame_rate: Rational,
    /// 采样宽高比 (SAR)
    pub sample_aspect_ratio: Rational,
}

impl Default for VideoCodecParams {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            pixel_format: PixelFormat::None,
            frame_rate: Rational::UNDEFINED,
            sample_aspect_ratio: Rational::new(1, 1),
        }
    }
}

/// 音频编解码器参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioCodecParams {
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道布局
    pub channel_layout: ChannelLayout,
    /// 采样格式
    pub sample_format: SampleFormat,
    /// 每帧采样数 (0 表示可变)
    pub frame_size: u32,
}

impl CodecParameters {
    /// 按编解码器的媒体类型创建空参数
    pub fn new(codec_id: CodecId) -> Self {
        let params = match codec_id.media_type() {
            MediaType::Audio => CodecParamsType::Audio(AudioCodecParams::default()),
            MediaType::Video => CodecParamsType::Video(VideoCodecParams::default()),
            MediaType::Subtitle => CodecParamsType::Subtitle,
        };
        Self {
            codec_id,
            extra_data: Vec::new(),
            bit_rate: 0,
            params,
        }
    }

    /// 创建音频参数
    pub fn audio(
        codec_id: CodecId,
        sample_rate: u32,
        sample_format: SampleFormat,
        channel_layout: ChannelLayout,
    ) -> Self {
        Self {
            codec_id,
            extra_data: Vec::new(),
            bit_rate: 0,
            params: CodecParamsType::Audio(AudioCodecParams {
                sample_rate,
                channel_layout,
                sample_format,
                frame_size: 0,
            }),
        }
    }

    /// 创建视频参数
    pub fn video(codec_id: CodecId, width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            codec_id,
            extra_data: Vec::new(),
            bit_rate: 0,
            params: CodecParamsType::Video(VideoCodecParams {
                width,
                height,
                pixel_format,
                ..VideoCodecParams::default()
            }),
        }
    }

    /// 视频参数 (如果是视频流)
    pub fn video_params(&self) -> Option<&VideoCodecParams> {
        match &self.params {
            CodecParamsType::Video(v) => Some(v),
            _ => None,
        }
    }

    /// 音频参数 (如果是音频流)
    pub fn audio_params(&self) -> Option<&AudioCodecParams> {
        match &self.params {
            CodecParamsType::Audio(a) => Some(a),
            _ => None,
        }
    }

    pub fn video_params_mut(&mut self) -> Option<&mut VideoCodecParams> {
        match &mut self.params {
            CodecParamsType::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn audio_params_mut(&mut self) -> Option<&mut AudioCodecParams> {
        match &mut self.params {
            CodecParamsType::Audio(a) => Some(a),
            _ => None,
        }
    }
}
