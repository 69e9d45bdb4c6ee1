//! 音频采样格式定义.
//!
//! 对标 FFmpeg 的 `AVSampleFormat`.

use std::fmt;
use std::str::FromStr;

use crate::error::LiuError;

/// 音频采样格式
///
/// - 交错 (Interleaved): 所有声道的采样点交替排列, 如 LRLRLR...
/// - 平面 (Planar): 每个声道独立存储, 如 LLL...RRR...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleFormat {
    /// 未指定
    #[default]
    None,
    /// 无符号 8 位整数, 交错
    U8,
    /// 有符号 16 位整数, 交错
    S16,
    /// 有符号 32 位整数, 交错
    S32,
    /// 32 位浮点, 交错
    F32,
    /// 64 位浮点, 交错
    F64,
    /// 无符号 8 位整数, 平面
    U8p,
    /// 有符号 16 位整数, 平面
    S16p,
    /// 有符号 32 位整数, 平面
    S32p,
    /// 32 位浮点, 平面
    F32p,
    /// 64 位浮点, 平面
    F64p,
}

impl SampleFormat {
    /// 每个采样点占用的字节数
    pub const fn bytes_per_sample(&self) -> usize {
        match self {
            Self::None => 0,
            Self::U8 | Self::U8p => 1,
            Self::S16 | Self::S16p => 2,
            Self::S32 | Self::S32p | Self::F32 | Self::F32p => 4,
            Self::F64 | Self::F64p => 8,
        }
    }

    /// 是否为平面格式
    pub const fn is_planar(&self) -> bool {
        matches!(
            self,
            Self::U8p | Self::S16p | Self::S32p | Self::F32p | Self::F64p
        )
    }

    /// 获取对应的平面格式
    pub const fn to_planar(&self) -> Self {
        match self {
            Self::U8 => Self::U8p,
            Self::S16 => Self::S16p,
            Self::S32 => Self::S32p,
            Self::F32 => Self::F32p,
            Self::F64 => Self::F64p,
            other => *other,
        }
    }

    /// 获取对应的交错格式
    pub const fn to_interleaved(&self) -> Self {
        match self {
            Self::U8p => Self::U8,
            Self::S16p => Self::S16,
            Self::S32p => Self::S32,
            Self::F32p => Self::F32,
            Self::F64p => Self::F64,
            other => *other,
        }
    }

    /// 一帧音频所需的平面数
    pub const fn plane_count(&self, channels: u32) -> usize {
        if self.is_planar() {
            channels as usize
        } else {
            1
        }
    }

    /// 每个平面容纳 `nb_samples` 个采样所需的字节数
    pub const fn plane_size(&self, channels: u32, nb_samples: u32) -> usize {
        let per_plane_channels = if self.is_planar() { 1 } else { channels as usize };
        nb_samples as usize * per_plane_channels * self.bytes_per_sample()
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::U8 => "u8",
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::F32 => "flt",
            Self::F64 => "dbl",
            Self::U8p => "u8p",
            Self::S16p => "s16p",
            Self::S32p => "s32p",
            Self::F32p => "fltp",
            Self::F64p => "dblp",
        };
        write!(f, "{name}")
    }
}

impl FromStr for SampleFormat {
    type Err = LiuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "u8" => Self::U8,
            "s16" => Self::S16,
            "s32" => Self::S32,
            "flt" | "f32" => Self::F32,
            "dbl" | "f64" => Self::F64,
            "u8p" => Self::U8p,
            "s16p" => Self::S16p,
            "s32p" => Self::S32p,
            "fltp" | "f32p" => Self::F32p,
            "dblp" | "f64p" => Self::F64p,
            other => {
                return Err(LiuError::InvalidArgument(format!(
                    "未知采样格式: {other}"
                )));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_format_平面尺寸() {
        assert_eq!(SampleFormat::S16.plane_count(2), 1);
        assert_eq!(SampleFormat::S16.plane_size(2, 100), 400);
        assert_eq!(SampleFormat::F64p.plane_count(6), 6);
        assert_eq!(SampleFormat::F64p.plane_size(6, 100), 800);
    }

    #[test]
    fn test_sample_format_名称解析() {
        assert_eq!("dblp".parse::<SampleFormat>().unwrap(), SampleFormat::F64p);
        assert_eq!("S16".parse::<SampleFormat>().unwrap(), SampleFormat::S16);
        assert!("xyz".parse::<SampleFormat>().is_err());
        assert_eq!(SampleFormat::F32p.to_string(), "fltp");
    }
}
