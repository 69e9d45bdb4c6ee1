//! PCM 重新分块滤镜.
//!
//! 把任意大小的 PCM 数据包拼接/切分为每包 `nb_out_samples` 个采样:
//! 小包合并 (fan-in), 大包拆分 (fan-out). 流结束时不足一包的剩余采样
//! 按 `pad` 选项补零或原样输出.

use liu_core::{LiuError, LiuResult, NOPTS_VALUE, Options, Rational, Rounding};
use log::debug;

use crate::bsf::BsfEngine;
use crate::codec_parameters::CodecParameters;
use crate::packet::Packet;

const DEFAULT_NB_OUT_SAMPLES: usize = 1024;

/// PCM 重新分块引擎
pub struct PcmRechunkBsf {
    nb_out_samples: usize,
    pad: bool,
    block_align: usize,
    sample_rate: u32,
    /// 待输出的字节
    buffer: Vec<u8>,
    /// 当前时间戳起点 (数据包时间基)
    origin_pts: i64,
    /// 起点之后已输出的采样数
    samples_since_origin: i64,
    time_base: Rational,
    eof: bool,
}

impl PcmRechunkBsf {
    pub fn create() -> Box<dyn BsfEngine> {
        Box::new(Self {
            nb_out_samples: DEFAULT_NB_OUT_SAMPLES,
            pad: true,
            block_align: 0,
            sample_rate: 0,
            buffer: Vec::new(),
            origin_pts: NOPTS_VALUE,
            samples_since_origin: 0,
            time_base: Rational::UNDEFINED,
            eof: false,
        })
    }

    fn chunk_bytes(&self) -> usize {
        self.nb_out_samples * self.block_align
    }

    fn next_pts(&self) -> i64 {
        let sample_tb = Rational::for_sample_rate(self.sample_rate);
        if self.origin_pts == NOPTS_VALUE || !sample_tb.is_valid() || !self.time_base.is_valid() {
            return NOPTS_VALUE;
        }
        self.origin_pts
            + self
                .time_base
                .rescale_rnd(self.samples_since_origin, sample_tb, Rounding::Down)
    }

    fn emit(&mut self, data: Vec<u8>, nb_samples: usize) -> Packet {
        let mut pkt = Packet::from_data(data).with_pts(self.next_pts(), self.time_base);
        let sample_tb = Rational::for_sample_rate(self.sample_rate);
        if sample_tb.is_valid() && self.time_base.is_valid() {
            pkt.duration = self.time_base.rescale(nb_samples as i64, sample_tb);
        }
        self.samples_since_origin += nb_samples as i64;
        pkt
    }
}

impl BsfEngine for PcmRechunkBsf {
    fn name(&self) -> &str {
        "pcm_rechunk"
    }

    fn open(&mut self, params: &mut CodecParameters, options: &mut Options) -> LiuResult<()> {
        let bytes = params.codec_id.pcm_sample_size().ok_or_else(|| {
            LiuError::InvalidArgument(format!("{} 不是 PCM 编解码器", params.codec_id))
        })?;
        let audio = params
            .audio_params()
            .ok_or_else(|| LiuError::InvalidArgument("pcm_rechunk 需要音频参数".into()))?;
        if audio.channel_layout.channels == 0 {
            return Err(LiuError::InvalidArgument("声道数不能为 0".into()));
        }
        if let Some(n) = options.take_parsed::<usize>("nb_out_samples")? {
            if n == 0 {
                return Err(LiuError::InvalidArgument("nb_out_samples 不能为 0".into()));
            }
            self.nb_out_samples = n;
        }
        if let Some(pad) = options.take_parsed::<bool>("pad")? {
            self.pad = pad;
        }
        self.block_align = bytes * audio.channel_layout.channels as usize;
        self.sample_rate = audio.sample_rate;
        debug!(
            "打开 pcm_rechunk: 每包 {} 个采样, 块大小 {} 字节, 补零={}",
            self.nb_out_samples, self.block_align, self.pad
        );
        Ok(())
    }

    fn send(&mut self, packet: Option<&Packet>) -> LiuResult<()> {
        let Some(p) = packet else {
            self.eof = true;
            return Ok(());
        };
        if self.buffer.len() >= self.chunk_bytes() {
            return Err(LiuError::NeedMoreData);
        }
        if p.size() % self.block_align != 0 {
            return Err(LiuError::InvalidData(format!(
                "数据包大小 {} 不是采样块 {} 字节的整数倍",
                p.size(),
                self.block_align
            )));
        }
        if self.buffer.is_empty() && p.pts != NOPTS_VALUE {
            self.origin_pts = p.pts;
            self.samples_since_origin = 0;
            self.time_base = p.time_base;
        } else if !self.time_base.is_valid() {
            self.time_base = p.time_base;
        }
        self.buffer.extend_from_slice(&p.data);
        Ok(())
    }

    fn receive(&mut self) -> LiuResult<Packet> {
        let chunk = self.chunk_bytes();
        if self.buffer.len() >= chunk {
            let data: Vec<u8> = self.buffer.drain(..chunk).collect();
            return Ok(self.emit(data, self.nb_out_samples));
        }
        if !self.eof {
            return Err(LiuError::NeedMoreData);
        }
        if self.buffer.is_empty() {
            return Err(LiuError::Eof);
        }
        let mut data = std::mem::take(&mut self.buffer);
        let nb_samples = if self.pad {
            data.resize(chunk, 0);
            self.nb_out_samples
        } else {
            data.len() / self.block_align
        };
        Ok(self.emit(data, nb_samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec_id::CodecId;
    use liu_core::{ChannelLayout, SampleFormat};

    fn open(nb: usize, pad: bool) -> Box<dyn BsfEngine> {
        let mut bsf = PcmRechunkBsf::create();
        let mut params =
            CodecParameters::audio(CodecId::PcmS16le, 1000, SampleFormat::S16, ChannelLayout::MONO);
        let mut opts = Options::new()
            .with("nb_out_samples", nb.to_string())
            .with("pad", pad.to_string());
        bsf.open(&mut params, &mut opts).unwrap();
        assert!(opts.is_empty());
        bsf
    }

    fn drain(bsf: &mut Box<dyn BsfEngine>) -> Vec<Packet> {
        let mut out = Vec::new();
        while let Ok(p) = bsf.receive() {
            out.push(p);
        }
        out
    }

    #[test]
    fn test_pcm_rechunk_大包拆分() {
        let mut bsf = open(2, true);
        let tb = Rational::new(1, 1000);
        bsf.send(Some(&Packet::from_data(vec![0u8; 10]).with_pts(100, tb)))
            .unwrap();
        let out = drain(&mut bsf);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].pts, 100);
        assert_eq!(out[1].pts, 102);
        assert!(out.iter().all(|p| p.size() == 4 && p.duration == 2));
        // 剩 1 个采样, 结束时补零
        bsf.send(None).unwrap();
        let tail = drain(&mut bsf);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].size(), 4);
        assert_eq!(tail[0].pts, 104);
        assert!(matches!(bsf.receive(), Err(LiuError::Eof)));
    }

    #[test]
    fn test_pcm_rechunk_小包合并() {
        let mut bsf = open(4, false);
        let tb = Rational::new(1, 1000);
        for i in 0..3 {
            bsf.send(Some(&Packet::from_data(vec![i as u8; 6]).with_pts(i * 3, tb)))
                .unwrap();
            let out = drain(&mut bsf);
            assert_eq!(out.len(), usize::from(i == 1 || i == 2));
        }
        bsf.send(None).unwrap();
        let tail = drain(&mut bsf);
        assert_eq!(tail.len(), 1);
        // 不补零时输出剩余的 1 个采样
        assert_eq!(tail[0].size(), 2);
        assert_eq!(tail[0].pts, 8);
    }

    #[test]
    fn test_pcm_rechunk_拒绝不完整采样块() {
        let mut bsf = open(4, true);
        let r = bsf.send(Some(&Packet::from_data(vec![0u8; 3])));
        assert!(matches!(r, Err(LiuError::InvalidData(_))));
    }
}
