//! 解码器: 部分消费解码循环与排空协议.
//!
//! 一次调用可能只消耗数据包的一部分, 调用方按返回的字节数推进偏移并循环,
//! 每次检查输出帧的 `complete` 标志:
//!
//! ```text
//! offset = 0
//! while offset < packet.size():
//!     offset += decoder.decode_audio(&mut frame, Some(&packet), offset)?
//!     if frame.complete { emit(&frame) }
//! ```
//!
//! 输入结束后以 `None` 反复调用, 直到输出不再完整, 以取出引擎内部缓冲的帧.

use std::sync::Arc;

use liu_core::{
    CoderState, LiuError, LiuResult, MediaType, NOPTS_VALUE, Options, Rational, Rounding,
};
use log::{debug, warn};

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::coder::Coder;
use crate::context::Context;
use crate::engine::{DecodeEngine, Decoded, PacketSlice};
use crate::frame::{AudioFrame, Frame, SubtitleFrame, VideoFrame};
use crate::packet::Packet;

/// 解码器
pub struct Decoder {
    coder: Coder,
    engine: Box<dyn DecodeEngine>,
    /// 上一次时间戳不连续处的起点 (编解码器时间基)
    audio_origin: Option<i64>,
    /// 起点之后已输出的采样数
    samples_since_origin: i64,
}

impl Decoder {
    /// 按编解码器标识从上下文注册表创建
    pub fn new(ctx: &Arc<Context>, codec_id: CodecId) -> LiuResult<Self> {
        let engine = ctx.codecs().create_decoder(codec_id)?;
        Ok(Self::with_engine(ctx, engine))
    }

    /// 使用给定引擎创建
    pub fn with_engine(ctx: &Arc<Context>, engine: Box<dyn DecodeEngine>) -> Self {
        let params = CodecParameters::new(engine.codec_id());
        let caps = engine.capabilities();
        Self {
            coder: Coder::new(Arc::clone(ctx), params, caps, "解码器"),
            engine,
            audio_origin: None,
            samples_since_origin: 0,
        }
    }

    /// 按容器给出的参数创建, 参数作为初始属性
    pub fn from_parameters(ctx: &Arc<Context>, params: &CodecParameters) -> LiuResult<Self> {
        let engine = ctx.codecs().create_decoder(params.codec_id)?;
        let caps = engine.capabilities();
        Ok(Self {
            coder: Coder::new(Arc::clone(ctx), params.clone(), caps, "解码器"),
            engine,
            audio_origin: None,
            samples_since_origin: 0,
        })
    }

    /// 公共属性与状态
    pub fn coder(&self) -> &Coder {
        &self.coder
    }

    /// 可修改的公共属性 (仅在打开前有效)
    pub fn coder_mut(&mut self) -> &mut Coder {
        &mut self.coder
    }

    pub fn state(&self) -> CoderState {
        self.coder.state()
    }

    /// 打开解码器, 返回引擎未使用的选项
    pub fn open(&mut self, options: Option<&Options>) -> LiuResult<Options> {
        self.coder.open_engine(self.engine.as_mut(), options)
    }

    /// 关闭解码器; 重复调用无效果
    pub fn close(&mut self) {
        self.coder.close_engine(self.engine.as_mut());
    }

    /// 清空引擎缓冲, 用于 seek 之后重新开始解码
    pub fn reset(&mut self) -> LiuResult<()> {
        self.coder.lifecycle().require_opened("reset")?;
        self.engine.flush();
        self.audio_origin = None;
        self.samples_since_origin = 0;
        debug!("重置 {} 解码器", self.engine.name());
        Ok(())
    }

    /// 解码音频
    ///
    /// `packet` 为 `None` 表示排空. 返回本次消耗的字节数; 产出完整帧时
    /// `output.complete` 为 `true`, 时间戳位于编解码器时间基.
    pub fn decode_audio(
        &mut self,
        output: &mut AudioFrame,
        packet: Option<&Packet>,
        byte_offset: usize,
    ) -> LiuResult<usize> {
        self.check_call(MediaType::Audio, packet, byte_offset)?;
        self.coder.ensure_audio_params_match(output)?;
        output.complete = false;
        output.pts = NOPTS_VALUE;

        let decoded = self.run_engine(packet, byte_offset)?;
        match decoded.frame {
            Some(Frame::Audio(mut frame)) => {
                self.stamp_audio(&mut frame, packet, byte_offset);
                frame.complete = true;
                *output = frame;
            }
            Some(other) => return Err(self.wrong_kind(MediaType::Audio, &other)),
            None => {}
        }
        Ok(decoded.consumed)
    }

    /// 解码图像
    pub fn decode_video(
        &mut self,
        output: &mut VideoFrame,
        packet: Option<&Packet>,
        byte_offset: usize,
    ) -> LiuResult<usize> {
        self.check_call(MediaType::Video, packet, byte_offset)?;
        self.coder.ensure_picture_params_match(output)?;
        output.complete = false;
        output.pts = NOPTS_VALUE;

        let decoded = self.run_engine(packet, byte_offset)?;
        match decoded.frame {
            Some(Frame::Video(mut frame)) => {
                let (pts, tb) = self.rebase(frame.pts, frame.time_base);
                frame.duration = rebase_duration(frame.duration, frame.time_base, tb);
                frame.pts = pts;
                frame.time_base = tb;
                frame.complete = true;
                *output = frame;
            }
            Some(other) => return Err(self.wrong_kind(MediaType::Video, &other)),
            None => {}
        }
        Ok(decoded.consumed)
    }

    /// 解码字幕
    pub fn decode_subtitle(
        &mut self,
        output: &mut SubtitleFrame,
        packet: Option<&Packet>,
        byte_offset: usize,
    ) -> LiuResult<usize> {
        self.check_call(MediaType::Subtitle, packet, byte_offset)?;
        output.complete = false;
        output.pts = NOPTS_VALUE;

        let decoded = self.run_engine(packet, byte_offset)?;
        match decoded.frame {
            Some(Frame::Subtitle(mut frame)) => {
                let (pts, tb) = self.rebase(frame.pts, frame.time_base);
                frame.duration = rebase_duration(frame.duration, frame.time_base, tb);
                frame.pts = pts;
                frame.time_base = tb;
                frame.complete = true;
                *output = frame;
            }
            Some(other) => return Err(self.wrong_kind(MediaType::Subtitle, &other)),
            None => {}
        }
        Ok(decoded.consumed)
    }

    /// 按输出帧的类型分派到对应的解码方法
    pub fn decode(
        &mut self,
        output: &mut Frame,
        packet: Option<&Packet>,
        byte_offset: usize,
    ) -> LiuResult<usize> {
        match output {
            Frame::Audio(a) => self.decode_audio(a, packet, byte_offset),
            Frame::Video(v) => self.decode_video(v, packet, byte_offset),
            Frame::Subtitle(s) => self.decode_subtitle(s, packet, byte_offset),
        }
    }

    /// 调用前的状态与参数检查, 失败不改变状态
    fn check_call(
        &self,
        media: MediaType,
        packet: Option<&Packet>,
        byte_offset: usize,
    ) -> LiuResult<()> {
        let lifecycle = self.coder.lifecycle();
        match packet {
            Some(_) => lifecycle.require_opened("decode")?,
            None => lifecycle.require_active("decode")?,
        }
        if self.coder.media_type() != media {
            return Err(LiuError::InvalidArgument(format!(
                "{} 解码器不能解码{}",
                self.coder.codec_id(),
                media
            )));
        }
        match packet {
            Some(p) if !p.complete => Err(LiuError::InvalidArgument(
                "数据包未完成, 不能用于解码".into(),
            )),
            Some(p) if byte_offset >= p.size() => Err(LiuError::InvalidArgument(format!(
                "字节偏移 {byte_offset} 超出数据包大小 {}",
                p.size()
            ))),
            Some(_) => Ok(()),
            None => {
                if byte_offset > 0 {
                    warn!("排空解码器时忽略字节偏移 {byte_offset}");
                }
                Ok(())
            }
        }
    }

    fn run_engine(&mut self, packet: Option<&Packet>, byte_offset: usize) -> LiuResult<Decoded> {
        let input = packet.map(|p| PacketSlice {
            packet: p,
            offset: byte_offset,
        });
        let remaining = input.map_or(0, |i| i.remaining());
        if input.is_none() {
            self.coder.lifecycle_mut().mark_flushing();
        }

        match self.engine.decode(input, self.coder.allocator_mut()) {
            Ok(d) if d.consumed > remaining => Err(self.coder.lifecycle_mut().fail(
                "decode",
                format!("引擎消耗 {} 字节, 超过剩余的 {remaining} 字节", d.consumed),
            )),
            Ok(d) => Ok(d),
            Err(e) if e.is_flow_control() => Ok(Decoded::nothing()),
            Err(LiuError::BadAlloc(msg)) => {
                self.coder.lifecycle_mut().fail("decode", &msg);
                Err(LiuError::BadAlloc(msg))
            }
            Err(e) => Err(self.coder.lifecycle_mut().fail("decode", e)),
        }
    }

    fn wrong_kind(&mut self, expected: MediaType, got: &Frame) -> LiuError {
        self.coder.lifecycle_mut().fail(
            "decode",
            format!("期望{expected}帧, 引擎返回了{}帧", got.media_type()),
        )
    }

    /// 根据起点和累计采样数计算音频时间戳
    ///
    /// 仅在数据包的第一次调用 (偏移为 0) 时与数据包时间戳比对,
    /// 偏差超过一个时间基单位时重新以数据包时间戳为起点.
    fn stamp_audio(&mut self, frame: &mut AudioFrame, packet: Option<&Packet>, byte_offset: usize) {
        let tb = self.coder.time_base();
        let rate = if frame.sample_rate > 0 {
            frame.sample_rate
        } else {
            self.coder.sample_rate()
        };
        let sample_tb = Rational::for_sample_rate(rate);
        if !sample_tb.is_valid() || !tb.is_valid() {
            let (pts, tb) = self.rebase(frame.pts, frame.time_base);
            frame.pts = pts;
            frame.time_base = tb;
            return;
        }

        if let Some(p) = packet.filter(|p| byte_offset == 0 && p.pts != NOPTS_VALUE) {
            let src_tb = if p.time_base.is_valid() {
                p.time_base
            } else {
                tb
            };
            let packet_pts = tb.rescale_rnd(p.pts, src_tb, Rounding::Down);
            match self.audio_origin {
                None => {
                    self.audio_origin = Some(packet_pts);
                    self.samples_since_origin = 0;
                }
                Some(origin) => {
                    let expected = origin
                        + tb.rescale_rnd(self.samples_since_origin, sample_tb, Rounding::Down);
                    if (expected - packet_pts).abs() > 1 {
                        debug!("音频时间戳漂移, 重置: 期望 {expected}, 数据包 {packet_pts}");
                        self.audio_origin = Some(packet_pts);
                        self.samples_since_origin = 0;
                    }
                }
            }
        }

        let origin = *self.audio_origin.get_or_insert(0);
        frame.pts =
            origin + tb.rescale_rnd(self.samples_since_origin, sample_tb, Rounding::Down);
        frame.duration = tb.rescale_rnd(i64::from(frame.nb_samples), sample_tb, Rounding::Down);
        frame.time_base = tb;
        self.samples_since_origin += i64::from(frame.nb_samples);
    }

    /// 把引擎给出的时间戳换算到编解码器时间基
    fn rebase(&self, pts: i64, src_tb: Rational) -> (i64, Rational) {
        let tb = self.coder.time_base();
        if !tb.is_valid() {
            return (pts, src_tb);
        }
        if pts == NOPTS_VALUE || !src_tb.is_valid() || src_tb == tb {
            return (pts, tb);
        }
        (tb.rescale(pts, src_tb), tb)
    }
}

fn rebase_duration(duration: i64, src_tb: Rational, dst_tb: Rational) -> i64 {
    if !src_tb.is_valid() || !dst_tb.is_valid() || src_tb == dst_tb {
        return duration;
    }
    dst_tb.rescale(duration, src_tb)
}

impl Drop for Decoder {
    fn drop(&mut self) {
        self.close();
    }
}
