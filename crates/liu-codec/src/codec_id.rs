//! 编解码器标识符.
//!
//! 对标 FFmpeg 的 `AVCodecID`.

use std::fmt;

use liu_core::MediaType;

/// 编解码器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    /// Raw 视频 (未压缩)
    RawVideo,
    /// PCM 无符号 8 位
    PcmU8,
    /// PCM 有符号 16 位小端
    PcmS16le,
    /// PCM 有符号 16 位大端
    PcmS16be,
    /// PCM 有符号 24 位小端
    PcmS24le,
    /// PCM 有符号 32 位小端
    PcmS32le,
    /// PCM 32 位浮点小端
    PcmF32le,
    /// 纯文本字幕 (UTF-8)
    Text,
}

impl CodecId {
    /// 所有内置标识
    pub const ALL: [CodecId; 8] = [
        Self::RawVideo,
        Self::PcmU8,
        Self::PcmS16le,
        Self::PcmS16be,
        Self::PcmS24le,
        Self::PcmS32le,
        Self::PcmF32le,
        Self::Text,
    ];

    /// 编解码器对应的媒体类型
    pub const fn media_type(&self) -> MediaType {
        match self {
            Self::RawVideo => MediaType::Video,
            Self::PcmU8
            | Self::PcmS16le
            | Self::PcmS16be
            | Self::PcmS24le
            | Self::PcmS32le
            | Self::PcmF32le => MediaType::Audio,
            Self::Text => MediaType::Subtitle,
        }
    }

    /// PCM 编码中每个采样的字节数, 非 PCM 返回 `None`
    pub const fn pcm_sample_size(&self) -> Option<usize> {
        match self {
            Self::PcmU8 => Some(1),
            Self::PcmS16le | Self::PcmS16be => Some(2),
            Self::PcmS24le => Some(3),
            Self::PcmS32le | Self::PcmF32le => Some(4),
            Self::RawVideo | Self::Text => None,
        }
    }

    /// 编解码器名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RawVideo => "rawvideo",
            Self::PcmU8 => "pcm_u8",
            Self::PcmS16le => "pcm_s16le",
            Self::PcmS16be => "pcm_s16be",
            Self::PcmS24le => "pcm_s24le",
            Self::PcmS32le => "pcm_s32le",
            Self::PcmF32le => "pcm_f32le",
            Self::Text => "text",
        }
    }

    /// 按名称查找
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
