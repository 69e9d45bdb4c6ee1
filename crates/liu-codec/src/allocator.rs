//! 帧缓冲分配器.
//!
//! 对标 FFmpeg 的 `get_buffer2` 回调: 解码引擎通过注入的分配器申请输出缓冲,
//! 分配失败以 `BadAlloc` 报告.

use liu_core::{LiuError, LiuResult, SampleFormat};

/// 帧缓冲分配器
pub trait FrameAllocator: Send {
    /// 分配 `size` 字节的零填充缓冲
    fn allocate(&mut self, size: usize) -> LiuResult<Vec<u8>>;

    /// 分配一帧音频所需的全部平面
    fn allocate_audio(
        &mut self,
        format: SampleFormat,
        channels: u32,
        nb_samples: u32,
    ) -> LiuResult<Vec<Vec<u8>>> {
        let size = format.plane_size(channels, nb_samples);
        (0..format.plane_count(channels))
            .map(|_| self.allocate(size))
            .collect()
    }
}

/// 默认分配器, 使用可失败的预留
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAllocator;

impl FrameAllocator for DefaultAllocator {
    fn allocate(&mut self, size: usize) -> LiuResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|e| LiuError::BadAlloc(format!("申请 {size} 字节失败: {e}")))?;
        buf.resize(size, 0);
        Ok(buf)
    }
}
