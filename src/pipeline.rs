//! 音频转码流水线.
//!
//! 数据包源 → 解码器 → (重采样器) → 编码器 → 数据包汇. 解码按部分消费
//! 循环推进, 输入结束后依次排空解码器、重采样器与编码器.

use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;

use liu_codec::{AudioFrame, Context, Decoder, Encoder, Packet};
use liu_core::{LiuError, LiuResult, NOPTS_VALUE, Rational};
use liu_resample::{MediaAudioResampler, ResampleOptions};
use log::{debug, info};
use serde::Serialize;

use crate::config::{AudioStreamConfig, PipelineConfig};

/// 数据包来源
pub trait PacketSource {
    /// 读取下一个数据包, 输入结束时返回 `None`
    fn read_packet(&mut self) -> LiuResult<Option<Packet>>;
}

/// 数据包去处
pub trait PacketSink {
    fn write_packet(&mut self, packet: &Packet) -> LiuResult<()>;
}

impl PacketSink for Vec<Packet> {
    fn write_packet(&mut self, packet: &Packet) -> LiuResult<()> {
        self.push(packet.clone());
        Ok(())
    }
}

/// 从裸 PCM 字节流按固定大小切出数据包
///
/// 包大小向下取整到完整采样块, 时间戳以采样为单位.
pub struct RawPcmSource<R> {
    reader: R,
    packet_size: usize,
    block_align: usize,
    time_base: Rational,
    next_pts: i64,
}

impl<R: Read> RawPcmSource<R> {
    pub fn new(reader: R, stream: &AudioStreamConfig, packet_size: usize) -> LiuResult<Self> {
        let codec = stream.codec_id()?;
        let sample_size = codec
            .pcm_sample_size()
            .ok_or_else(|| LiuError::Unsupported(format!("{codec} 不是 PCM 编码")))?;
        let block_align = sample_size * stream.channel_layout()?.channels as usize;
        let rate = i32::try_from(stream.sample_rate)
            .map_err(|_| LiuError::InvalidArgument(format!("采样率过大: {}", stream.sample_rate)))?;
        Ok(Self {
            reader,
            packet_size: (packet_size / block_align).max(1) * block_align,
            block_align,
            time_base: Rational::new(1, rate),
            next_pts: 0,
        })
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }
}

impl<R: Read> PacketSource for RawPcmSource<R> {
    fn read_packet(&mut self) -> LiuResult<Option<Packet>> {
        let mut buf = vec![0u8; self.packet_size];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);

        let nb_samples = (filled / self.block_align) as i64;
        let mut packet = Packet::from_data(buf).with_pts(self.next_pts, self.time_base);
        packet.duration = nb_samples;
        self.next_pts += nb_samples;
        Ok(Some(packet))
    }
}

/// 把数据包载荷原样写入字节流
pub struct RawPcmSink<W: Write> {
    writer: W,
    bytes_written: u64,
}

impl<W: Write> RawPcmSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// 刷新并取回底层写入器
    pub fn into_inner(mut self) -> LiuResult<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> PacketSink for RawPcmSink<W> {
    fn write_packet(&mut self, packet: &Packet) -> LiuResult<()> {
        self.writer.write_all(&packet.data)?;
        self.bytes_written += packet.size() as u64;
        Ok(())
    }
}

/// 转码统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TranscodeStats {
    pub packets_read: u64,
    pub frames_decoded: u64,
    pub samples_resampled: u64,
    pub packets_written: u64,
}

/// 重采样与编码阶段
struct OutputStage {
    resampler: Option<MediaAudioResampler>,
    resampled: AudioFrame,
    encoder: Encoder,
    packet: Packet,
    frame_size: u32,
}

impl OutputStage {
    fn push(
        &mut self,
        frame: &AudioFrame,
        sink: &mut dyn PacketSink,
        stats: &mut TranscodeStats,
    ) -> LiuResult<()> {
        let Some(rs) = self.resampler.as_mut() else {
            return encode_frame(&mut self.encoder, &mut self.packet, frame, self.frame_size, sink, stats);
        };

        let delay = rs.get_delay(i64::from(rs.output_sample_rate()))?;
        let needed = rs
            .get_num_resampled_samples(frame.nb_samples)
            .saturating_add(u32::try_from(delay).unwrap_or(u32::MAX))
            .saturating_add(1);
        if self.resampled.capacity < needed {
            self.resampled = AudioFrame::with_capacity(
                needed,
                rs.output_sample_rate(),
                rs.output_format(),
                rs.output_layout(),
            );
        }

        let n = rs.resample(&mut self.resampled, Some(frame))?;
        stats.samples_resampled += u64::from(n);
        if self.resampled.complete {
            encode_frame(
                &mut self.encoder,
                &mut self.packet,
                &self.resampled,
                self.frame_size,
                sink,
                stats,
            )?;
        }
        Ok(())
    }

    fn finish(&mut self, sink: &mut dyn PacketSink, stats: &mut TranscodeStats) -> LiuResult<()> {
        if let Some(rs) = self.resampler.as_mut() {
            if self.resampled.capacity == 0 {
                self.resampled = AudioFrame::with_capacity(
                    1024,
                    rs.output_sample_rate(),
                    rs.output_format(),
                    rs.output_layout(),
                );
            }
            loop {
                rs.resample(&mut self.resampled, None)?;
                if !self.resampled.complete {
                    break;
                }
                stats.samples_resampled += u64::from(self.resampled.nb_samples);
                encode_frame(
                    &mut self.encoder,
                    &mut self.packet,
                    &self.resampled,
                    self.frame_size,
                    sink,
                    stats,
                )?;
            }
        }

        loop {
            self.encoder.encode_audio(&mut self.packet, None)?;
            if !self.packet.complete {
                break;
            }
            write_packet(sink, &self.packet, stats)?;
        }
        Ok(())
    }
}

/// 按编码器帧长切块后送入编码器
fn encode_frame(
    encoder: &mut Encoder,
    packet: &mut Packet,
    frame: &AudioFrame,
    frame_size: u32,
    sink: &mut dyn PacketSink,
    stats: &mut TranscodeStats,
) -> LiuResult<()> {
    if frame_size == 0 || frame.nb_samples <= frame_size {
        encoder.encode_audio(packet, Some(frame))?;
        if packet.complete {
            write_packet(sink, packet, stats)?;
        }
        return Ok(());
    }

    let mut start = 0;
    while start < frame.nb_samples {
        let len = frame_size.min(frame.nb_samples - start);
        let chunk = slice_frame(frame, start, len)?;
        encoder.encode_audio(packet, Some(&chunk))?;
        if packet.complete {
            write_packet(sink, packet, stats)?;
        }
        start += len;
    }
    Ok(())
}

fn write_packet(
    sink: &mut dyn PacketSink,
    packet: &Packet,
    stats: &mut TranscodeStats,
) -> LiuResult<()> {
    sink.write_packet(packet)?;
    stats.packets_written += 1;
    Ok(())
}

/// 截取 `[start, start + len)` 范围内的采样
fn slice_frame(frame: &AudioFrame, start: u32, len: u32) -> LiuResult<AudioFrame> {
    let format = frame.sample_format;
    let channels = frame.channels();
    let begin = format.plane_size(channels, start);
    let end = format.plane_size(channels, start + len);
    let data = frame
        .data
        .iter()
        .map(|plane| plane.get(begin..end).map(<[u8]>::to_vec))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| LiuError::InvalidData("音频帧数据短于有效采样数".into()))?;

    let sample_tb = Rational::new(1, frame.sample_rate as i32);
    let rebase = |n: u32| {
        if frame.time_base.is_valid() {
            frame.time_base.rescale(i64::from(n), sample_tb)
        } else {
            i64::from(n)
        }
    };
    Ok(AudioFrame {
        data,
        nb_samples: len,
        capacity: len,
        sample_rate: frame.sample_rate,
        sample_format: format,
        channel_layout: frame.channel_layout,
        pts: if frame.pts == NOPTS_VALUE {
            NOPTS_VALUE
        } else {
            frame.pts + rebase(start)
        },
        time_base: frame.time_base,
        duration: rebase(len),
        complete: true,
    })
}

/// 音频转码器
///
/// 解码器与编码器的采样参数不一致时自动插入重采样器.
pub struct Transcoder {
    decoder: Decoder,
    decoded: AudioFrame,
    output: OutputStage,
    stats: TranscodeStats,
}

impl Transcoder {
    /// 按配置创建并打开各阶段
    pub fn new(ctx: &Arc<Context>, config: &PipelineConfig) -> LiuResult<Self> {
        config.validate()?;

        let mut decoder = Decoder::new(ctx, config.input.codec_id()?)?;
        {
            let c = decoder.coder_mut();
            c.set_sample_rate(config.input.sample_rate)?;
            c.set_channel_layout(config.input.channel_layout()?)?;
            c.set_frame_size(config.input.frame_size)?;
        }
        decoder.open(None)?;

        let mut encoder = Encoder::new(ctx, config.output.codec_id()?)?;
        {
            let c = encoder.coder_mut();
            c.set_sample_rate(config.output.sample_rate)?;
            c.set_channel_layout(config.output.channel_layout()?)?;
            c.set_frame_size(config.output.frame_size)?;
        }
        encoder.open(None)?;

        let dc = decoder.coder();
        let (in_rate, in_format, in_layout) =
            (dc.sample_rate(), dc.sample_format(), dc.channel_layout());
        let ec = encoder.coder();
        let (out_rate, out_format, out_layout) =
            (ec.sample_rate(), ec.sample_format(), ec.channel_layout());

        let resampler = if (in_rate, in_format, in_layout) == (out_rate, out_format, out_layout) {
            None
        } else {
            let mut rs = MediaAudioResampler::new(
                out_layout, out_rate, out_format, in_layout, in_rate, in_format,
            )?;
            rs.set_options(ResampleOptions::from(&config.compensation))?;
            rs.open()?;
            debug!(
                "插入重采样器: {in_layout}/{in_rate}/{in_format} -> {out_layout}/{out_rate}/{out_format}"
            );
            Some(rs)
        };

        info!(
            "转码: {} {} Hz {} 声道 -> {} {} Hz {} 声道",
            config.input.codec,
            in_rate,
            in_layout.channels,
            config.output.codec,
            out_rate,
            out_layout.channels
        );

        Ok(Self {
            decoder,
            decoded: AudioFrame::with_capacity(0, in_rate, in_format, in_layout),
            output: OutputStage {
                resampler,
                resampled: AudioFrame::with_capacity(0, out_rate, out_format, out_layout),
                encoder,
                packet: Packet::empty(),
                frame_size: config.output.frame_size,
            },
            stats: TranscodeStats::default(),
        })
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn encoder(&self) -> &Encoder {
        &self.output.encoder
    }

    pub fn resampler(&self) -> Option<&MediaAudioResampler> {
        self.output.resampler.as_ref()
    }

    pub fn stats(&self) -> TranscodeStats {
        self.stats
    }

    /// 读完 `source` 的全部数据包并排空各阶段
    pub fn run(
        &mut self,
        source: &mut dyn PacketSource,
        sink: &mut dyn PacketSink,
    ) -> LiuResult<TranscodeStats> {
        while let Some(packet) = source.read_packet()? {
            self.stats.packets_read += 1;
            self.decode_packet(&packet, sink)?;
        }
        self.flush(sink)?;
        info!(
            "转码完成: 读入 {} 包, 解码 {} 帧, 重采样 {} 个采样, 写出 {} 包",
            self.stats.packets_read,
            self.stats.frames_decoded,
            self.stats.samples_resampled,
            self.stats.packets_written
        );
        Ok(self.stats)
    }

    /// 部分消费循环: 一个数据包可能产出多帧
    fn decode_packet(&mut self, packet: &Packet, sink: &mut dyn PacketSink) -> LiuResult<()> {
        let mut offset = 0;
        while offset < packet.size() {
            let consumed = self
                .decoder
                .decode_audio(&mut self.decoded, Some(packet), offset)?;
            offset += consumed;
            if self.decoded.complete {
                self.stats.frames_decoded += 1;
                self.output.push(&self.decoded, sink, &mut self.stats)?;
            } else if consumed == 0 {
                break;
            }
        }
        Ok(())
    }

    fn flush(&mut self, sink: &mut dyn PacketSink) -> LiuResult<()> {
        loop {
            self.decoder.decode_audio(&mut self.decoded, None, 0)?;
            if !self.decoded.complete {
                break;
            }
            self.stats.frames_decoded += 1;
            self.output.push(&self.decoded, sink, &mut self.stats)?;
        }
        self.output.finish(sink, &mut self.stats)
    }

    /// 关闭各阶段; 重复调用无效果
    pub fn close(&mut self) {
        self.decoder.close();
        if let Some(rs) = self.output.resampler.as_mut() {
            rs.close();
        }
        self.output.encoder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn transcode(config: &PipelineConfig, input: Vec<u8>) -> (Vec<Packet>, TranscodeStats) {
        let ctx = Context::new();
        let mut transcoder = Transcoder::new(&ctx, config).unwrap();
        let mut source = RawPcmSource::new(Cursor::new(input), &config.input, config.packet_size)
            .unwrap();
        let mut packets = Vec::new();
        let stats = transcoder.run(&mut source, &mut packets).unwrap();
        (packets, stats)
    }

    fn s16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_pipeline_参数相同时直通() {
        let mut config = PipelineConfig::new(
            AudioStreamConfig::new("pcm_s16le", 8000, 1),
            AudioStreamConfig::new("pcm_s16le", 8000, 1),
        );
        config.packet_size = 512;
        let input: Vec<i16> = (0..1000).map(|i| (i * 7) as i16).collect();
        let bytes = s16_bytes(&input);

        let (packets, stats) = transcode(&config, bytes.clone());
        let output: Vec<u8> = packets.iter().flat_map(|p| p.data.to_vec()).collect();
        assert_eq!(output, bytes);
        assert_eq!(stats.packets_read, 4);
        assert_eq!(stats.frames_decoded, 4);
        assert_eq!(stats.samples_resampled, 0);
        assert_eq!(stats.packets_written, 4);
    }

    #[test]
    fn test_pipeline_仅格式转换() {
        let config = PipelineConfig::new(
            AudioStreamConfig::new("pcm_u8", 8000, 1),
            AudioStreamConfig::new("pcm_s16le", 8000, 1),
        );
        let (packets, stats) = transcode(&config, vec![128u8; 300]);
        let output: Vec<u8> = packets.iter().flat_map(|p| p.data.to_vec()).collect();
        assert_eq!(output, vec![0u8; 600]);
        assert_eq!(stats.samples_resampled, 300);
    }

    #[test]
    fn test_pipeline_上采样保持常量() {
        let mut config = PipelineConfig::new(
            AudioStreamConfig::new("pcm_s16le", 8000, 1),
            AudioStreamConfig::new("pcm_s16le", 16000, 1),
        );
        config.packet_size = 200;
        let (packets, stats) = transcode(&config, s16_bytes(&[1000; 800]));
        let output: Vec<i16> = packets
            .iter()
            .flat_map(|p| p.data.to_vec())
            .collect::<Vec<u8>>()
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(output.len(), 1600);
        assert!(output.iter().all(|&s| (s - 1000).abs() <= 1));
        assert_eq!(stats.samples_resampled, 1600);
        assert_eq!(stats.packets_read, 8);
    }

    #[test]
    fn test_pipeline_按编码帧长切包() {
        let mut config = PipelineConfig::new(
            AudioStreamConfig::new("pcm_s16le", 8000, 1),
            AudioStreamConfig::new("pcm_s16le", 8000, 1),
        );
        config.output.frame_size = 100;
        let (packets, _) = transcode(&config, s16_bytes(&[5; 250]));
        let sizes: Vec<usize> = packets.iter().map(Packet::size).collect();
        assert_eq!(sizes, vec![200, 200, 100]);
        let pts: Vec<i64> = packets.iter().map(|p| p.pts).collect();
        assert_eq!(pts, vec![0, 100, 200]);
    }

    #[test]
    fn test_pipeline_数据源按采样块切包() {
        let stream = AudioStreamConfig::new("pcm_s24le", 8000, 2);
        let mut source = RawPcmSource::new(Cursor::new(vec![0u8; 20]), &stream, 16).unwrap();
        assert_eq!(source.packet_size(), 12);
        let first = source.read_packet().unwrap().unwrap();
        assert_eq!((first.size(), first.pts, first.duration), (12, 0, 2));
        let second = source.read_packet().unwrap().unwrap();
        assert_eq!((second.size(), second.pts), (8, 2));
        assert!(source.read_packet().unwrap().is_none());
    }

    #[test]
    fn test_pipeline_写出字节流() {
        let mut sink = RawPcmSink::new(Vec::new());
        sink.write_packet(&Packet::from_data(vec![1u8, 2, 3])).unwrap();
        assert_eq!(sink.bytes_written(), 3);
        assert_eq!(sink.into_inner().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_pipeline_无效配置() {
        let ctx = Context::new();
        let config = PipelineConfig::new(
            AudioStreamConfig::new("pcm_s16le", 0, 1),
            AudioStreamConfig::default(),
        );
        assert!(matches!(
            Transcoder::new(&ctx, &config),
            Err(LiuError::InvalidArgument(_))
        ));
        assert!(matches!(
            RawPcmSource::new(Cursor::new(Vec::new()), &AudioStreamConfig::new("text", 8000, 1), 64),
            Err(LiuError::InvalidArgument(_))
        ));
    }
}
