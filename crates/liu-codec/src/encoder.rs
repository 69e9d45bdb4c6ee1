//! 编码器: 解码循环的镜像.
//!
//! `encode_audio(packet, Some(frame))` 返回产出的字节数并设置 `packet.complete`;
//! 输入结束后以 `None` 反复调用, 直到 `packet.complete` 为 `false`.

use std::sync::Arc;

use liu_core::{CoderState, LiuError, LiuResult, MediaType, NOPTS_VALUE, Options};
use log::trace;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::coder::Coder;
use crate::context::Context;
use crate::engine::{CodecCapabilities, EncodeEngine};
use crate::frame::{AudioFrame, Frame, VideoFrame};
use crate::packet::Packet;

/// 编码器
pub struct Encoder {
    coder: Coder,
    engine: Box<dyn EncodeEngine>,
}

impl Encoder {
    /// 按编解码器标识从上下文注册表创建
    pub fn new(ctx: &Arc<Context>, codec_id: CodecId) -> LiuResult<Self> {
        let engine = ctx.codecs().create_encoder(codec_id)?;
        Ok(Self::with_engine(ctx, engine))
    }

    /// 使用给定引擎创建
    pub fn with_engine(ctx: &Arc<Context>, engine: Box<dyn EncodeEngine>) -> Self {
        let params = CodecParameters::new(engine.codec_id());
        let caps = engine.capabilities();
        Self {
            coder: Coder::new(Arc::clone(ctx), params, caps, "编码器"),
            engine,
        }
    }

    /// 按已有参数创建 (例如沿用解码器的输出格式)
    pub fn from_parameters(ctx: &Arc<Context>, params: &CodecParameters) -> LiuResult<Self> {
        let engine = ctx.codecs().create_encoder(params.codec_id)?;
        let caps = engine.capabilities();
        Ok(Self {
            coder: Coder::new(Arc::clone(ctx), params.clone(), caps, "编码器"),
            engine,
        })
    }

    pub fn coder(&self) -> &Coder {
        &self.coder
    }

    pub fn coder_mut(&mut self) -> &mut Coder {
        &mut self.coder
    }

    pub fn state(&self) -> CoderState {
        self.coder.state()
    }

    /// 打开编码器, 返回引擎未使用的选项
    pub fn open(&mut self, options: Option<&Options>) -> LiuResult<Options> {
        self.coder.open_engine(self.engine.as_mut(), options)
    }

    /// 关闭编码器; 重复调用无效果
    pub fn close(&mut self) {
        self.coder.close_engine(self.engine.as_mut());
    }

    /// 编码一帧音频, `None` 表示排空
    pub fn encode_audio(
        &mut self,
        output: &mut Packet,
        frame: Option<&AudioFrame>,
    ) -> LiuResult<usize> {
        self.check_call(MediaType::Audio, frame.is_some())?;
        if let Some(f) = frame {
            if !f.complete {
                return Err(LiuError::InvalidArgument("音频帧未完成, 不能编码".into()));
            }
            self.coder.ensure_audio_params_match(f)?;
            let frame_size = self.coder.parameters().audio_params().map_or(0, |a| a.frame_size);
            if frame_size > 0
                && f.nb_samples > frame_size
                && !self
                    .coder
                    .capabilities()
                    .contains(CodecCapabilities::VARIABLE_FRAME_SIZE)
            {
                return Err(LiuError::InvalidArgument(format!(
                    "音频帧包含 {} 个采样, 超过帧长 {frame_size}",
                    f.nb_samples
                )));
            }
        }
        output.reset();
        if frame.is_none() {
            self.coder.lifecycle_mut().mark_flushing();
        }
        let result = self.engine.encode_audio(frame);
        self.finish(output, result)
    }

    /// 编码一帧图像, `None` 表示排空
    pub fn encode_video(
        &mut self,
        output: &mut Packet,
        frame: Option<&VideoFrame>,
    ) -> LiuResult<usize> {
        self.check_call(MediaType::Video, frame.is_some())?;
        if let Some(f) = frame {
            if !f.complete {
                return Err(LiuError::InvalidArgument("图像未完成, 不能编码".into()));
            }
            self.coder.ensure_picture_params_match(f)?;
        }
        output.reset();
        if frame.is_none() {
            self.coder.lifecycle_mut().mark_flushing();
        }
        let result = self.engine.encode_video(frame);
        self.finish(output, result)
    }

    /// 按输入帧的类型分派; `None` 时按编码器的媒体类型排空
    pub fn encode(&mut self, output: &mut Packet, frame: Option<&Frame>) -> LiuResult<usize> {
        match frame {
            Some(Frame::Audio(a)) => self.encode_audio(output, Some(a)),
            Some(Frame::Video(v)) => self.encode_video(output, Some(v)),
            Some(Frame::Subtitle(_)) => Err(LiuError::Unsupported("不支持字幕编码".into())),
            None => match self.coder.media_type() {
                MediaType::Audio => self.encode_audio(output, None),
                MediaType::Video => self.encode_video(output, None),
                other => Err(LiuError::Unsupported(format!("不支持{other}编码"))),
            },
        }
    }

    fn check_call(&self, media: MediaType, has_input: bool) -> LiuResult<()> {
        let lifecycle = self.coder.lifecycle();
        if has_input {
            lifecycle.require_opened("encode")?;
        } else {
            lifecycle.require_active("encode")?;
        }
        if self.coder.media_type() != media {
            return Err(LiuError::InvalidArgument(format!(
                "{} 编码器不能编码{}",
                self.coder.codec_id(),
                media
            )));
        }
        Ok(())
    }

    fn finish(&mut self, output: &mut Packet, result: LiuResult<Option<Packet>>) -> LiuResult<usize> {
        match result {
            Ok(Some(mut pkt)) => {
                self.rebase_packet(&mut pkt);
                pkt.stream_index = output.stream_index;
                pkt.complete = true;
                let size = pkt.size();
                trace!("编码输出 {size} 字节, pts={}", pkt.pts);
                *output = pkt;
                Ok(size)
            }
            Ok(None) => Ok(0),
            Err(e) if e.is_flow_control() => Ok(0),
            Err(LiuError::BadAlloc(msg)) => {
                self.coder.lifecycle_mut().fail("encode", &msg);
                Err(LiuError::BadAlloc(msg))
            }
            Err(e) => Err(self.coder.lifecycle_mut().fail("encode", e)),
        }
    }

    /// 把数据包时间戳换算到编码器时间基
    fn rebase_packet(&self, pkt: &mut Packet) {
        let tb = self.coder.time_base();
        if !tb.is_valid() {
            return;
        }
        if pkt.time_base.is_valid() && pkt.time_base != tb {
            let src = pkt.time_base;
            if pkt.pts != NOPTS_VALUE {
                pkt.pts = tb.rescale(pkt.pts, src);
            }
            if pkt.dts != NOPTS_VALUE {
                pkt.dts = tb.rescale(pkt.dts, src);
            }
            pkt.duration = tb.rescale(pkt.duration, src);
        }
        pkt.time_base = tb;
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liu_core::{ChannelLayout, Rational, SampleFormat};

    fn open_encoder(frame_size: u32) -> Encoder {
        let ctx = Context::new();
        let mut enc = Encoder::new(&ctx, CodecId::PcmS16le).unwrap();
        let c = enc.coder_mut();
        c.set_sample_rate(8000).unwrap();
        c.set_sample_format(SampleFormat::S16).unwrap();
        c.set_channel_layout(ChannelLayout::MONO).unwrap();
        c.set_frame_size(frame_size).unwrap();
        enc.open(None).unwrap();
        enc
    }

    fn frame(nb: u32, pts: i64) -> AudioFrame {
        let mut f = AudioFrame::new(nb, 8000, SampleFormat::S16, ChannelLayout::MONO);
        f.pts = pts;
        f.time_base = Rational::new(1, 8000);
        f.complete = true;
        f
    }

    #[test]
    fn test_encoder_打开后设置属性报状态错误() {
        let mut enc = open_encoder(0);
        assert!(matches!(
            enc.coder_mut().set_property("bitrate", "64000"),
            Err(LiuError::InvalidState(_))
        ));
    }

    #[test]
    fn test_encoder_按帧长缓冲并排空() {
        let mut enc = open_encoder(4);
        let mut pkt = Packet::empty();

        // 3 个采样不足一帧, 没有输出
        assert_eq!(enc.encode_audio(&mut pkt, Some(&frame(3, 0))).unwrap(), 0);
        assert!(!pkt.complete);

        // 再来 3 个: 输出 4 个采样, 剩 2 个缓冲
        assert_eq!(enc.encode_audio(&mut pkt, Some(&frame(3, 3))).unwrap(), 8);
        assert!(pkt.complete);
        assert_eq!(pkt.pts, 0);

        let mut flushed = Vec::new();
        loop {
            enc.encode_audio(&mut pkt, None).unwrap();
            if !pkt.complete {
                break;
            }
            flushed.push((pkt.size(), pkt.pts));
        }
        assert_eq!(flushed, vec![(4, 4)]);
        // 排空结束后再次调用无输出
        assert_eq!(enc.encode_audio(&mut pkt, None).unwrap(), 0);
        assert!(!pkt.complete);
        assert_eq!(enc.state(), CoderState::Flushing);
    }

    #[test]
    fn test_encoder_超过帧长的输入被拒绝() {
        let mut enc = open_encoder(4);
        let mut pkt = Packet::empty();
        assert!(matches!(
            enc.encode_audio(&mut pkt, Some(&frame(6, 0))),
            Err(LiuError::InvalidArgument(_))
        ));
        assert_eq!(enc.state(), CoderState::Opened);
    }

    #[test]
    fn test_encoder_拒绝未完成的帧() {
        let mut enc = open_encoder(0);
        let mut f = frame(4, 0);
        f.complete = false;
        let mut pkt = Packet::empty();
        assert!(matches!(
            enc.encode_audio(&mut pkt, Some(&f)),
            Err(LiuError::InvalidArgument(_))
        ));
        assert_eq!(enc.state(), CoderState::Opened);
    }

    #[test]
    fn test_encoder_按帧类型分派() {
        let mut enc = open_encoder(0);
        let mut pkt = Packet::empty();
        let input = Frame::Audio(frame(4, 0));
        assert_eq!(enc.encode(&mut pkt, Some(&input)).unwrap(), 8);
        assert!(pkt.complete);

        let sub = Frame::Subtitle(crate::frame::SubtitleFrame::new());
        assert!(matches!(
            enc.encode(&mut pkt, Some(&sub)),
            Err(LiuError::Unsupported(_))
        ));

        enc.encode(&mut pkt, None).unwrap();
        assert!(!pkt.complete);
        assert_eq!(enc.state(), CoderState::Flushing);
    }
}
