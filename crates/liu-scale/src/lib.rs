//! # liu-scale
//!
//! Liu 转码核心的图像缩放与像素格式转换库.
//!
//! 本 crate 对标 FFmpeg 的 libswscale, 提供:
//! - [`MediaPictureResampler`]: 参数校验、生命周期以及时间戳的透传.
//! - [`ScaleEngine`]: 缩放引擎边界.
//! - [`SoftwareScaler`]: 内置引擎, 支持最近邻/双线性/双三次/区域平均缩放,
//!   以及 YUV420P/422P/444P, NV12, RGB24, BGR24, RGBA, BGRA, GRAY8 之间的
//!   BT.601 转换.

mod convert;
mod scale;
pub mod engine;
pub mod picture;
pub mod software;

pub use engine::{PictureSpec, ScaleEngine};
pub use picture::MediaPictureResampler;
pub use software::SoftwareScaler;

/// 缩放算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScaleAlgorithm {
    /// 最近邻 (速度最快, 质量最低)
    NearestNeighbor,
    /// 双线性插值 (速度与质量均衡)
    #[default]
    Bilinear,
    /// 双三次插值 (放大时质量较高)
    Bicubic,
    /// 区域平均 (缩小时效果好)
    Area,
}

impl ScaleAlgorithm {
    /// 按缩放方向选择默认算法: 放大 (或尺寸不变) 用双三次, 缩小用区域平均
    pub fn for_sizes(in_width: u32, in_height: u32, out_width: u32, out_height: u32) -> Self {
        let in_area = u64::from(in_width) * u64::from(in_height);
        let out_area = u64::from(out_width) * u64::from(out_height);
        if out_area >= in_area {
            Self::Bicubic
        } else {
            Self::Area
        }
    }
}
