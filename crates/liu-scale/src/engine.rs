//! 缩放引擎边界.

use std::fmt;

use liu_core::{LiuResult, PixelFormat};

use crate::ScaleAlgorithm;

/// 一侧图像的格式描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureSpec {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl PictureSpec {
    pub const fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            pixel_format,
        }
    }
}

impl fmt::Display for PictureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}/{}", self.width, self.height, self.pixel_format)
    }
}

/// 缩放引擎
pub trait ScaleEngine: Send {
    /// 引擎名称
    fn name(&self) -> &str;

    /// 配置输入输出格式与算法; 不支持时返回错误
    fn configure(
        &mut self,
        input: &PictureSpec,
        output: &PictureSpec,
        algorithm: ScaleAlgorithm,
    ) -> LiuResult<()>;

    /// 把一幅输入图像缩放/转换到输出缓冲
    fn scale(
        &mut self,
        src: &[Vec<u8>],
        src_linesize: &[usize],
        dst: &mut [Vec<u8>],
        dst_linesize: &[usize],
    ) -> LiuResult<()>;
}
