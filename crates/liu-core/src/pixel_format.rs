//! 像素格式定义.
//!
//! 对标 FFmpeg 的 `AVPixelFormat`, 仅包含图像重采样器支持的 8 位格式.

use std::fmt;
use std::str::FromStr;

use crate::error::LiuError;

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 未指定
    #[default]
    None,
    /// YUV 4:2:0 平面格式
    Yuv420p,
    /// YUV 4:2:2 平面格式
    Yuv422p,
    /// YUV 4:4:4 平面格式
    Yuv444p,
    /// NV12: Y 平面 + UV 交错, 4:2:0
    Nv12,
    /// RGB 各 8 位, 打包
    Rgb24,
    /// BGR 各 8 位, 打包
    Bgr24,
    /// RGBA 各 8 位, 打包
    Rgba,
    /// BGRA 各 8 位, 打包
    Bgra,
    /// 灰度 8 位
    Gray8,
}

impl PixelFormat {
    /// 色度子采样 (log2 水平, log2 垂直)
    pub const fn chroma_subsampling(&self) -> (u32, u32) {
        match self {
            Self::Yuv420p | Self::Nv12 => (1, 1),
            Self::Yuv422p => (1, 0),
            _ => (0, 0),
        }
    }

    /// 是否为 YUV 色彩空间
    pub const fn is_yuv(&self) -> bool {
        matches!(
            self,
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p | Self::Nv12
        )
    }

    /// 打包格式每像素字节数, 平面格式返回 1
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb24 | Self::Bgr24 => 3,
            Self::Rgba | Self::Bgra => 4,
            Self::None => 0,
            _ => 1,
        }
    }

    /// 平面数量
    pub const fn plane_count(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => 3,
            Self::Nv12 => 2,
            Self::Rgb24 | Self::Bgr24 | Self::Rgba | Self::Bgra | Self::Gray8 => 1,
        }
    }

    /// 指定平面每行的字节数, 奇数尺寸的色度平面向上取整
    pub fn plane_linesize(&self, plane: usize, width: u32) -> Option<usize> {
        if plane >= self.plane_count() {
            return None;
        }
        let w = width as usize;
        let (sub_h, _) = self.chroma_subsampling();
        let chroma_w = (w + (1 << sub_h) - 1) >> sub_h;
        Some(match (self, plane) {
            (Self::Yuv420p | Self::Yuv422p | Self::Yuv444p, 0) => w,
            (Self::Yuv420p | Self::Yuv422p | Self::Yuv444p, _) => chroma_w,
            (Self::Nv12, 0) => w,
            (Self::Nv12, _) => chroma_w * 2,
            _ => w * self.bytes_per_pixel(),
        })
    }

    /// 指定平面的行数
    pub fn plane_height(&self, plane: usize, height: u32) -> Option<usize> {
        if plane >= self.plane_count() {
            return None;
        }
        let h = height as usize;
        let (_, sub_v) = self.chroma_subsampling();
        Some(if plane == 0 {
            h
        } else {
            (h + (1 << sub_v) - 1) >> sub_v
        })
    }

    /// 整帧字节数
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        if *self == Self::None {
            return None;
        }
        let mut total = 0usize;
        for plane in 0..self.plane_count() {
            total += self.plane_linesize(plane, width)? * self.plane_height(plane, height)?;
        }
        Some(total)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Yuv420p => "yuv420p",
            Self::Yuv422p => "yuv422p",
            Self::Yuv444p => "yuv444p",
            Self::Nv12 => "nv12",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Rgba => "rgba",
            Self::Bgra => "bgra",
            Self::Gray8 => "gray8",
        };
        write!(f, "{name}")
    }
}

impl FromStr for PixelFormat {
    type Err = LiuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "yuv420p" => Self::Yuv420p,
            "yuv422p" => Self::Yuv422p,
            "yuv444p" => Self::Yuv444p,
            "nv12" => Self::Nv12,
            "rgb24" => Self::Rgb24,
            "bgr24" => Self::Bgr24,
            "rgba" => Self::Rgba,
            "bgra" => Self::Bgra,
            "gray" | "gray8" => Self::Gray8,
            other => {
                return Err(LiuError::InvalidArgument(format!(
                    "未知像素格式: {other}"
                )));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv420p_frame_size() {
        let pf = PixelFormat::Yuv420p;
        assert_eq!(pf.frame_size(1920, 1080), Some(1920 * 1080 * 3 / 2));
        assert_eq!(pf.plane_linesize(1, 1920), Some(960));
        assert_eq!(pf.plane_height(2, 1080), Some(540));
    }

    #[test]
    fn test_yuv420p_奇数尺寸向上取整() {
        let pf = PixelFormat::Yuv420p;
        assert_eq!(pf.plane_linesize(1, 5), Some(3));
        assert_eq!(pf.plane_height(1, 3), Some(2));
        assert_eq!(pf.frame_size(5, 3), Some(15 + 2 * 6));
    }

    #[test]
    fn test_nv12_frame_size() {
        let pf = PixelFormat::Nv12;
        assert_eq!(pf.plane_linesize(1, 1920), Some(1920));
        assert_eq!(pf.frame_size(1920, 1080), Some(1920 * 1080 * 3 / 2));
    }

    #[test]
    fn test_packed_frame_size() {
        assert_eq!(PixelFormat::Rgb24.frame_size(320, 240), Some(320 * 240 * 3));
        assert_eq!(PixelFormat::Bgra.plane_linesize(0, 10), Some(40));
        assert_eq!(PixelFormat::Gray8.frame_size(320, 240), Some(320 * 240));
    }

    #[test]
    fn test_none_与越界平面() {
        assert_eq!(PixelFormat::None.frame_size(16, 16), None);
        assert_eq!(PixelFormat::Rgb24.plane_linesize(1, 16), None);
        assert_eq!(PixelFormat::Nv12.plane_height(2, 16), None);
    }
}
