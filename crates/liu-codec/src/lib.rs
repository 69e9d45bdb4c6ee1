//! # liu-codec
//!
//! Liu 转码核心的编解码器层: 数据包/帧抽象, 编解码器生命周期,
//! 部分消费解码循环, 编码排空协议, 以及码流滤镜.
//!
//! 本 crate 对标 FFmpeg 的 libavcodec 中与转码管线相关的部分. 实际的码流处理
//! 由实现 [`DecodeEngine`] / [`EncodeEngine`] / [`bsf::BsfEngine`] 的引擎完成,
//! 内置 PCM、rawvideo 与文本字幕引擎.
//!
//! ## 使用示例
//!
//! ```rust
//! use liu_codec::{AudioFrame, CodecId, Context, Decoder, Packet};
//! use liu_core::ChannelLayout;
//!
//! let ctx = Context::new();
//! let mut dec = Decoder::new(&ctx, CodecId::PcmS16le).unwrap();
//! dec.coder_mut().set_sample_rate(8000).unwrap();
//! dec.coder_mut().set_channel_layout(ChannelLayout::MONO).unwrap();
//! dec.open(None).unwrap();
//!
//! let c = dec.coder();
//! let mut frame = AudioFrame::new(0, c.sample_rate(), c.sample_format(), c.channel_layout());
//! let pkt = Packet::from_data(vec![0u8; 16]);
//! let mut offset = 0;
//! while offset < pkt.size() {
//!     offset += dec.decode_audio(&mut frame, Some(&pkt), offset).unwrap();
//! }
//! assert!(frame.complete);
//! assert_eq!(frame.nb_samples, 8);
//! ```

pub mod allocator;
pub mod bsf;
pub mod codec_id;
pub mod codec_parameters;
pub mod coder;
pub mod context;
pub mod decoder;
pub mod decoders;
pub mod encoder;
pub mod encoders;
pub mod engine;
pub mod frame;
pub mod packet;
pub mod registry;

// 重导出常用类型
pub use allocator::{DefaultAllocator, FrameAllocator};
pub use bsf::{BitStreamFilter, BsfEngine, ProcessorResult};
pub use codec_id::CodecId;
pub use codec_parameters::{AudioCodecParams, CodecParameters, CodecParamsType, VideoCodecParams};
pub use coder::{Coder, CodecFlags, CodecFlags2};
pub use context::Context;
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use engine::{CodecCapabilities, CodecEngine, DecodeEngine, Decoded, EncodeEngine, PacketSlice};
pub use frame::{AudioFrame, Frame, PictureType, SubtitleFrame, VideoFrame};
pub use packet::Packet;
pub use registry::{BitStreamFilterType, BsfRegistry, CodecRegistry};

/// 注册所有内置编解码引擎
pub fn register_all(registry: &mut CodecRegistry) {
    decoders::register_all_decoders(registry);
    encoders::register_all_encoders(registry);
}
