//! PCM 音频解码引擎.
//!
//! 支持 6 种 PCM 变体, 共用解码逻辑. 设置了帧长时每次调用最多输出一帧,
//! 其余数据留给调用方以后续偏移再次送入; 数据包末尾不足一个采样块的字节
//! 会暂存, 与下一个数据包拼接.

use log::debug;
use liu_core::{ChannelLayout, LiuError, LiuResult, Options, SampleFormat};

use crate::allocator::FrameAllocator;
use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::engine::{CodecCapabilities, CodecEngine, DecodeEngine, Decoded, PacketSlice};
use crate::frame::{AudioFrame, Frame};

/// PCM 格式描述
struct PcmFormatDesc {
    codec_id: CodecId,
    /// 码流中每个样本的字节数
    bytes_per_sample: usize,
    /// 输出的采样格式
    output_format: SampleFormat,
    /// 把码流字节转换为输出格式字节, `dst` 已按输出大小分配
    decode_fn: fn(&[u8], &mut [u8]),
}

fn decode_copy(src: &[u8], dst: &mut [u8]) {
    dst.copy_from_slice(src);
}

/// 大端 16 位转小端
fn decode_s16be(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(2).zip(dst.chunks_exact_mut(2)) {
        d[0] = s[1];
        d[1] = s[0];
    }
}

/// 24 位符号扩展到 32 位
fn decode_s24le(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(3).zip(dst.chunks_exact_mut(4)) {
        d[..3].copy_from_slice(s);
        d[3] = if s[2] & 0x80 != 0 { 0xFF } else { 0x00 };
    }
}

fn pcm_format_desc(codec_id: CodecId) -> Option<PcmFormatDesc> {
    let (bytes_per_sample, output_format, decode_fn): (usize, SampleFormat, fn(&[u8], &mut [u8])) =
        match codec_id {
            CodecId::PcmU8 => (1, SampleFormat::U8, decode_copy),
            CodecId::PcmS16le => (2, SampleFormat::S16, decode_copy),
            CodecId::PcmS16be => (2, SampleFormat::S16, decode_s16be),
            CodecId::PcmS24le => (3, SampleFormat::S32, decode_s24le),
            CodecId::PcmS32le => (4, SampleFormat::S32, decode_copy),
            CodecId::PcmF32le => (4, SampleFormat::F32, decode_copy),
            _ => return None,
        };
    Some(PcmFormatDesc {
        codec_id,
        bytes_per_sample,
        output_format,
        decode_fn,
    })
}

/// PCM 解码引擎
pub struct PcmDecoder {
    desc: PcmFormatDesc,
    sample_rate: u32,
    channel_layout: ChannelLayout,
    /// 每次输出的最大采样数, 0 表示不限
    frame_size: u32,
    /// 每个采样块的字节数 (每样本字节数 * 声道数)
    block_align: usize,
    /// 上一个数据包末尾不完整的采样块
    stash: Vec<u8>,
}

impl PcmDecoder {
    fn create(codec_id: CodecId) -> LiuResult<Box<dyn DecodeEngine>> {
        let desc = pcm_format_desc(codec_id)
            .ok_or_else(|| LiuError::CodecNotFound(format!("不支持的 PCM 格式: {codec_id}")))?;
        Ok(Box::new(Self {
            desc,
            sample_rate: 0,
            channel_layout: ChannelLayout::UNKNOWN,
            frame_size: 0,
            block_align: 0,
            stash: Vec::new(),
        }))
    }

    pub fn new_u8() -> LiuResult<Box<dyn DecodeEngine>> {
        Self::create(CodecId::PcmU8)
    }

    pub fn new_s16le() -> LiuResult<Box<dyn DecodeEngine>> {
        Self::create(CodecId::PcmS16le)
    }

    pub fn new_s16be() -> LiuResult<Box<dyn DecodeEngine>> {
        Self::create(CodecId::PcmS16be)
    }

    pub fn new_s24le() -> LiuResult<Box<dyn DecodeEngine>> {
        Self::create(CodecId::PcmS24le)
    }

    pub fn new_s32le() -> LiuResult<Box<dyn DecodeEngine>> {
        Self::create(CodecId::PcmS32le)
    }

    pub fn new_f32le() -> LiuResult<Box<dyn DecodeEngine>> {
        Self::create(CodecId::PcmF32le)
    }
}

impl CodecEngine for PcmDecoder {
    fn codec_id(&self) -> CodecId {
        self.desc.codec_id
    }

    fn name(&self) -> &str {
        self.desc.codec_id.name()
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities::DR1
    }

    fn open(&mut self, params: &mut CodecParameters, options: &mut Options) -> LiuResult<()> {
        let audio = params
            .audio_params_mut()
            .ok_or_else(|| LiuError::InvalidArgument("PCM 解码器需要音频参数".into()))?;
        if audio.sample_rate == 0 {
            return Err(LiuError::InvalidArgument("采样率不能为 0".into()));
        }
        if audio.channel_layout.channels == 0 {
            return Err(LiuError::InvalidArgument("声道数不能为 0".into()));
        }
        if let Some(n) = options.take_parsed::<u32>("frame_size")? {
            audio.frame_size = n;
        }

        audio.sample_format = self.desc.output_format;
        self.sample_rate = audio.sample_rate;
        self.channel_layout = audio.channel_layout;
        self.frame_size = audio.frame_size;
        self.block_align = self.desc.bytes_per_sample * audio.channel_layout.channels as usize;
        self.stash.clear();

        debug!(
            "打开 {} 解码器: {} Hz, {} 声道, 输出格式={}, 帧长={}",
            self.name(),
            self.sample_rate,
            self.channel_layout.channels,
            self.desc.output_format,
            self.frame_size,
        );
        Ok(())
    }
}

impl DecodeEngine for PcmDecoder {
    fn decode(
        &mut self,
        input: Option<PacketSlice<'_>>,
        allocator: &mut dyn FrameAllocator,
    ) -> LiuResult<Decoded> {
        let Some(slice) = input else {
            if !self.stash.is_empty() {
                debug!("排空时丢弃 {} 字节不完整采样", self.stash.len());
                self.stash.clear();
            }
            return Err(LiuError::Eof);
        };
        let data = slice.data();

        let available = self.stash.len() + data.len();
        let mut nb_samples = available / self.block_align;
        if self.frame_size > 0 {
            nb_samples = nb_samples.min(self.frame_size as usize);
        }
        if nb_samples == 0 {
            self.stash.extend_from_slice(data);
            return Ok(Decoded {
                consumed: data.len(),
                frame: None,
            });
        }

        let from_data = nb_samples * self.block_align - self.stash.len();
        let mut consumed = from_data;

        let out_bps = self.desc.output_format.bytes_per_sample();
        let channels = self.channel_layout.channels as usize;
        let mut plane = allocator.allocate(nb_samples * channels * out_bps)?;
        if self.stash.is_empty() {
            (self.desc.decode_fn)(&data[..from_data], &mut plane);
        } else {
            let mut joined = std::mem::take(&mut self.stash);
            joined.extend_from_slice(&data[..from_data]);
            (self.desc.decode_fn)(&joined, &mut plane);
        }

        // 末尾不足一个采样块的数据直接暂存, 保证调用方能走到数据包末尾
        let rest = &data[consumed..];
        if !rest.is_empty() && rest.len() < self.block_align {
            self.stash.extend_from_slice(rest);
            consumed += rest.len();
        }

        let packet = slice.packet;
        let frame = AudioFrame {
            data: vec![plane],
            nb_samples: nb_samples as u32,
            capacity: nb_samples as u32,
            sample_rate: self.sample_rate,
            sample_format: self.desc.output_format,
            channel_layout: self.channel_layout,
            pts: if slice.offset == 0 {
                packet.pts
            } else {
                liu_core::NOPTS_VALUE
            },
            time_base: packet.time_base,
            duration: 0,
            complete: false,
        };
        Ok(Decoded {
            consumed,
            frame: Some(Frame::Audio(frame)),
        })
    }

    fn flush(&mut self) {
        self.stash.clear();
    }
}
