//! 编解码引擎边界.
//!
//! `Decoder`/`Encoder` 只负责生命周期与循环协议, 实际的码流处理由实现这些 trait 的引擎完成.
//! 引擎通过 `NeedMoreData` / `Eof` 报告流控信号, 其它错误视为引擎故障.

use bitflags::bitflags;
use liu_core::{LiuError, LiuResult, Options};

use crate::allocator::FrameAllocator;
use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::frame::{AudioFrame, Frame, VideoFrame};
use crate::packet::Packet;

bitflags! {
    /// 引擎能力
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CodecCapabilities: u32 {
        /// 使用调用方提供的分配器输出帧缓冲
        const DR1 = 1 << 1;
        /// 有内部延迟, 结束时需要排空
        const DELAY = 1 << 5;
        /// 允许最后一帧小于 frame_size
        const SMALL_LAST_FRAME = 1 << 6;
        /// 接受任意大小的输入帧
        const VARIABLE_FRAME_SIZE = 1 << 16;
    }
}

/// 引擎共用的打开/关闭接口
pub trait CodecEngine: Send {
    /// 编解码器标识
    fn codec_id(&self) -> CodecId;

    /// 引擎名称
    fn name(&self) -> &str;

    /// 能力位
    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities::empty()
    }

    /// 按参数与选项打开引擎
    ///
    /// 引擎从 `options` 中取走认识的键, 剩余键由调用方返回给用户;
    /// 引擎可以把实际采用的输出格式回写到 `params`.
    fn open(&mut self, params: &mut CodecParameters, options: &mut Options) -> LiuResult<()>;

    /// 释放引擎资源
    fn close(&mut self) {}
}

/// 传给解码引擎的输入: 数据包及起始偏移
#[derive(Debug, Clone, Copy)]
pub struct PacketSlice<'a> {
    /// 原数据包
    pub packet: &'a Packet,
    /// 本次调用的起始字节偏移
    pub offset: usize,
}

impl PacketSlice<'_> {
    /// 偏移之后的剩余数据
    pub fn data(&self) -> &[u8] {
        &self.packet.data[self.offset..]
    }

    /// 剩余字节数
    pub fn remaining(&self) -> usize {
        self.packet.size() - self.offset
    }
}

/// 一次解码调用的结果
#[derive(Debug)]
pub struct Decoded {
    /// 消耗的输入字节数
    pub consumed: usize,
    /// 产出的帧 (可能没有)
    pub frame: Option<Frame>,
}

impl Decoded {
    /// 没有消耗也没有产出
    pub fn nothing() -> Self {
        Self {
            consumed: 0,
            frame: None,
        }
    }
}

/// 解码引擎
pub trait DecodeEngine: CodecEngine {
    /// 从 `input` 解码; `None` 表示排空内部缓冲
    ///
    /// 返回 `Err(NeedMoreData)` / `Err(Eof)` 等价于未产出帧.
    fn decode(
        &mut self,
        input: Option<PacketSlice<'_>>,
        allocator: &mut dyn FrameAllocator,
    ) -> LiuResult<Decoded>;

    /// 清空内部缓冲 (用于 seek)
    fn flush(&mut self);
}

/// 编码引擎
///
/// 帧为 `None` 表示排空内部缓冲. 返回的数据包时间戳使用数据包自身的 `time_base`,
/// `Ok(None)` / `Err(NeedMoreData)` / `Err(Eof)` 都表示本次没有产出.
pub trait EncodeEngine: CodecEngine {
    /// 编码一帧音频
    fn encode_audio(&mut self, _frame: Option<&AudioFrame>) -> LiuResult<Option<Packet>> {
        Err(LiuError::Unsupported(format!("{} 不支持音频编码", self.name())))
    }

    /// 编码一帧图像
    fn encode_video(&mut self, _frame: Option<&VideoFrame>) -> LiuResult<Option<Packet>> {
        Err(LiuError::Unsupported(format!("{} 不支持视频编码", self.name())))
    }
}
