//! PCM 音频编码引擎.
//!
//! 把交错格式的采样转换为目标码流. 设置了帧长时按帧长攒批输出,
//! 每次调用最多产出一个数据包; 排空时输出不足一帧的剩余采样.
//! 数据包时间戳以 `1/采样率` 为时间基.

use bytes::Bytes;
use log::debug;
use liu_core::{LiuError, LiuResult, NOPTS_VALUE, Options, Rational, Rounding, SampleFormat};

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::engine::{CodecCapabilities, CodecEngine, EncodeEngine};
use crate::frame::AudioFrame;
use crate::packet::Packet;

/// PCM 编码格式描述
struct PcmEncodeDesc {
    codec_id: CodecId,
    /// 期望的输入采样格式
    input_format: SampleFormat,
    /// 输出码流中每个样本的字节数
    bytes_per_sample: usize,
    /// 编码转换函数
    encode_fn: fn(&[u8], &mut Vec<u8>),
}

fn encode_copy(src: &[u8], dst: &mut Vec<u8>) {
    dst.extend_from_slice(src);
}

/// S16 小端转大端: 每 2 字节翻转
fn encode_s16be(src: &[u8], dst: &mut Vec<u8>) {
    for chunk in src.chunks_exact(2) {
        dst.push(chunk[1]);
        dst.push(chunk[0]);
    }
}

/// S32 截断为 S24LE: 取低 3 字节
fn encode_s24le(src: &[u8], dst: &mut Vec<u8>) {
    for chunk in src.chunks_exact(4) {
        dst.extend_from_slice(&chunk[..3]);
    }
}

fn pcm_encode_desc(codec_id: CodecId) -> Option<PcmEncodeDesc> {
    let (input_format, bytes_per_sample, encode_fn): (SampleFormat, usize, fn(&[u8], &mut Vec<u8>)) =
        match codec_id {
            CodecId::PcmU8 => (SampleFormat::U8, 1, encode_copy),
            CodecId::PcmS16le => (SampleFormat::S16, 2, encode_copy),
            CodecId::PcmS16be => (SampleFormat::S16, 2, encode_s16be),
            CodecId::PcmS24le => (SampleFormat::S32, 3, encode_s24le),
            CodecId::PcmS32le => (SampleFormat::S32, 4, encode_copy),
            CodecId::PcmF32le => (SampleFormat::F32, 4, encode_copy),
            _ => return None,
        };
    Some(PcmEncodeDesc {
        codec_id,
        input_format,
        bytes_per_sample,
        encode_fn,
    })
}

/// PCM 编码引擎
pub struct PcmEncoder {
    desc: PcmEncodeDesc,
    sample_rate: u32,
    /// 每个采样块在码流中的字节数
    block_align: usize,
    /// 每个数据包的采样数, 0 表示逐帧输出
    frame_size: usize,
    /// 已编码但尚未输出的码流
    pending: Vec<u8>,
    /// `pending` 第一个采样的时间戳 (1/采样率)
    pending_pts: i64,
}

impl PcmEncoder {
    fn create(codec_id: CodecId) -> LiuResult<Box<dyn EncodeEngine>> {
        let desc = pcm_encode_desc(codec_id)
            .ok_or_else(|| LiuError::CodecNotFound(format!("不支持的 PCM 格式: {codec_id}")))?;
        Ok(Box::new(Self {
            desc,
            sample_rate: 0,
            block_align: 0,
            frame_size: 0,
            pending: Vec::new(),
            pending_pts: 0,
        }))
    }

    pub fn new_u8() -> LiuResult<Box<dyn EncodeEngine>> {
        Self::create(CodecId::PcmU8)
    }

    pub fn new_s16le() -> LiuResult<Box<dyn EncodeEngine>> {
        Self::create(CodecId::PcmS16le)
    }

    pub fn new_s16be() -> LiuResult<Box<dyn EncodeEngine>> {
        Self::create(CodecId::PcmS16be)
    }

    pub fn new_s24le() -> LiuResult<Box<dyn EncodeEngine>> {
        Self::create(CodecId::PcmS24le)
    }

    pub fn new_s32le() -> LiuResult<Box<dyn EncodeEngine>> {
        Self::create(CodecId::PcmS32le)
    }

    pub fn new_f32le() -> LiuResult<Box<dyn EncodeEngine>> {
        Self::create(CodecId::PcmF32le)
    }

    fn pending_samples(&self) -> usize {
        self.pending.len() / self.block_align
    }

    /// 从缓冲头部取出 `nb_samples` 个采样组成数据包
    fn take_packet(&mut self, nb_samples: usize) -> Packet {
        let bytes: Vec<u8> = self.pending.drain(..nb_samples * self.block_align).collect();
        let tb = Rational::new(1, self.sample_rate as i32);
        let mut pkt = Packet::from_data(Bytes::from(bytes)).with_pts(self.pending_pts, tb);
        pkt.duration = nb_samples as i64;
        self.pending_pts += nb_samples as i64;
        pkt
    }
}

impl CodecEngine for PcmEncoder {
    fn codec_id(&self) -> CodecId {
        self.desc.codec_id
    }

    fn name(&self) -> &str {
        self.desc.codec_id.name()
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities::SMALL_LAST_FRAME
    }

    fn open(&mut self, params: &mut CodecParameters, _options: &mut Options) -> LiuResult<()> {
        let audio = params
            .audio_params_mut()
            .ok_or_else(|| LiuError::InvalidArgument("PCM 编码器需要音频参数".into()))?;
        if audio.sample_rate == 0 || audio.sample_rate > i32::MAX as u32 {
            return Err(LiuError::InvalidArgument(format!(
                "无效的采样率: {}",
                audio.sample_rate
            )));
        }
        if audio.channel_layout.channels == 0 {
            return Err(LiuError::InvalidArgument("声道数不能为 0".into()));
        }
        match audio.sample_format {
            SampleFormat::None => audio.sample_format = self.desc.input_format,
            f if f == self.desc.input_format => {}
            f => {
                return Err(LiuError::InvalidArgument(format!(
                    "{} 需要 {} 输入, 实际为 {f}",
                    self.name(),
                    self.desc.input_format
                )));
            }
        }

        self.sample_rate = audio.sample_rate;
        self.block_align = self.desc.bytes_per_sample * audio.channel_layout.channels as usize;
        self.frame_size = audio.frame_size as usize;
        self.pending.clear();
        self.pending_pts = 0;

        debug!(
            "打开 {} 编码器: {} Hz, {} 声道, 帧长={}",
            self.name(),
            self.sample_rate,
            audio.channel_layout.channels,
            self.frame_size,
        );
        Ok(())
    }

    fn close(&mut self) {
        self.pending.clear();
    }
}

impl EncodeEngine for PcmEncoder {
    fn encode_audio(&mut self, frame: Option<&AudioFrame>) -> LiuResult<Option<Packet>> {
        let Some(frame) = frame else {
            let remaining = self.pending_samples();
            if remaining == 0 {
                return Err(LiuError::Eof);
            }
            return Ok(Some(self.take_packet(remaining)));
        };

        let valid = frame.valid_plane_size();
        let src = frame
            .data
            .first()
            .and_then(|p| p.get(..valid))
            .ok_or_else(|| LiuError::InvalidData("音频帧数据短于有效采样数".into()))?;

        if self.pending.is_empty() && frame.pts != NOPTS_VALUE && frame.time_base.is_valid() {
            let tb = Rational::new(1, self.sample_rate as i32);
            self.pending_pts = tb.rescale_rnd(frame.pts, frame.time_base, Rounding::Down);
        }
        (self.desc.encode_fn)(src, &mut self.pending);

        let available = self.pending_samples();
        if self.frame_size == 0 {
            if available == 0 {
                return Ok(None);
            }
            return Ok(Some(self.take_packet(available)));
        }
        if available >= self.frame_size {
            return Ok(Some(self.take_packet(self.frame_size)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liu_core::ChannelLayout;

    fn open(codec_id: CodecId, frame_size: u32) -> Box<dyn EncodeEngine> {
        let mut enc = PcmEncoder::create(codec_id).unwrap();
        let mut params =
            CodecParameters::audio(codec_id, 100, SampleFormat::None, ChannelLayout::MONO);
        if let Some(a) = params.audio_params_mut() {
            a.frame_size = frame_size;
        }
        enc.open(&mut params, &mut Options::new()).unwrap();
        enc
    }

    fn frame(format: SampleFormat, data: Vec<u8>, pts: i64) -> AudioFrame {
        let nb = (data.len() / format.bytes_per_sample()) as u32;
        let mut f = AudioFrame::new(nb, 100, format, ChannelLayout::MONO);
        f.data = vec![data];
        f.pts = pts;
        f.time_base = Rational::new(1, 100);
        f.complete = true;
        f
    }

    #[test]
    fn test_pcm_encoder_s16be_字节序翻转() {
        let mut enc = open(CodecId::PcmS16be, 0);
        let f = frame(SampleFormat::S16, vec![0x01, 0x00, 0xFF, 0x7F], 7);
        let pkt = enc.encode_audio(Some(&f)).unwrap().unwrap();
        assert_eq!(&pkt.data[..], &[0x00, 0x01, 0x7F, 0xFF]);
        assert_eq!(pkt.pts, 7);
        assert_eq!(pkt.duration, 2);
    }

    #[test]
    fn test_pcm_encoder_s24le_截断() {
        let mut enc = open(CodecId::PcmS24le, 0);
        let f = frame(SampleFormat::S32, vec![0x56, 0x34, 0x12, 0x00], 0);
        let pkt = enc.encode_audio(Some(&f)).unwrap().unwrap();
        assert_eq!(&pkt.data[..], &[0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_pcm_encoder_输入格式不符拒绝打开() {
        let mut enc = PcmEncoder::new_f32le().unwrap();
        let mut params =
            CodecParameters::audio(CodecId::PcmF32le, 100, SampleFormat::S16, ChannelLayout::MONO);
        assert!(enc.open(&mut params, &mut Options::new()).is_err());
    }

    #[test]
    fn test_pcm_encoder_帧长攒批的时间戳连续() {
        let mut enc = open(CodecId::PcmU8, 4);
        assert!(enc
            .encode_audio(Some(&frame(SampleFormat::U8, vec![1, 2, 3], 10)))
            .unwrap()
            .is_none());
        let pkt = enc
            .encode_audio(Some(&frame(SampleFormat::U8, vec![4, 5, 6], 13)))
            .unwrap()
            .unwrap();
        assert_eq!(&pkt.data[..], &[1, 2, 3, 4]);
        assert_eq!(pkt.pts, 10);
        let tail = enc.encode_audio(None).unwrap().unwrap();
        assert_eq!(&tail.data[..], &[5, 6]);
        assert_eq!(tail.pts, 14);
        assert!(matches!(enc.encode_audio(None), Err(LiuError::Eof)));
    }
}
