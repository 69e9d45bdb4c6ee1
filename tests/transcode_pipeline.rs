//! 端到端集成测试: 完整的转码管线.
//!
//! 音频: 裸 PCM 文件 → 解码 → 重采样 → 编码 → 裸 PCM 文件
//! 视频: rawvideo 数据包 → 解码 → 缩放与像素格式转换 → 编码

use std::fs::File;
use std::io::{BufReader, BufWriter};

use liu::codec::{CodecId, Context, Decoder, Encoder, Packet, VideoFrame};
use liu::core::{PixelFormat, Rational};
use liu::scale::{MediaPictureResampler, ScaleAlgorithm};
use liu::{AudioStreamConfig, PipelineConfig, RawPcmSink, RawPcmSource, Transcoder};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 交错的 F32LE 立体声, 左右声道取相反数
fn stereo_f32(nb_samples: usize, value: f32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(nb_samples * 8);
    for _ in 0..nb_samples {
        buf.extend_from_slice(&value.to_le_bytes());
        buf.extend_from_slice(&(-value).to_le_bytes());
    }
    buf
}

#[test]
fn test_transcode_文件到文件() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.pcm");
    let output_path = dir.path().join("output.pcm");
    std::fs::write(&input_path, stereo_f32(1600, 0.5)).unwrap();

    let mut config = PipelineConfig::new(
        AudioStreamConfig::new("pcm_f32le", 16000, 2),
        AudioStreamConfig::new("pcm_s16le", 8000, 1),
    );
    config.output.frame_size = 160;

    let ctx = Context::new();
    let mut transcoder = Transcoder::new(&ctx, &config).unwrap();
    assert!(transcoder.resampler().is_some());

    let reader = BufReader::new(File::open(&input_path).unwrap());
    let writer = BufWriter::new(File::create(&output_path).unwrap());
    let mut source = RawPcmSource::new(reader, &config.input, config.packet_size).unwrap();
    let mut sink = RawPcmSink::new(writer);
    let stats = transcoder.run(&mut source, &mut sink).unwrap();
    sink.into_inner().unwrap();
    transcoder.close();

    assert_eq!(stats.packets_read, 4);
    assert_eq!(stats.frames_decoded, 4);
    assert_eq!(stats.samples_resampled, 800);
    assert_eq!(stats.packets_written, 5);

    let output = std::fs::read(&output_path).unwrap();
    assert_eq!(output.len(), 1600);
    assert!(
        output
            .chunks_exact(2)
            .all(|b| i16::from_le_bytes([b[0], b[1]]).abs() <= 1)
    );
}

#[test]
fn test_transcode_从配置文件读取() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("pipeline.json");
    std::fs::write(
        &config_path,
        r#"{
            "input": { "codec": "pcm_s16le", "sample_rate": 8000, "channels": 1 },
            "output": { "codec": "pcm_s16be", "sample_rate": 8000, "channels": 1 },
            "packet_size": 6
        }"#,
    )
    .unwrap();
    let config = PipelineConfig::load(&config_path).unwrap();

    let ctx = Context::new();
    let mut transcoder = Transcoder::new(&ctx, &config).unwrap();
    // 采样格式相同, 只是字节序不同: 不需要重采样
    assert!(transcoder.resampler().is_none());

    let input: Vec<u8> = [0x0102i16, 0x0304, 0x0506, 0x0708]
        .iter()
        .flat_map(|s| s.to_le_bytes())
        .collect();
    let mut source =
        RawPcmSource::new(std::io::Cursor::new(input), &config.input, config.packet_size).unwrap();
    let mut packets: Vec<Packet> = Vec::new();
    let stats = transcoder.run(&mut source, &mut packets).unwrap();

    assert_eq!(stats.packets_read, 2);
    let output: Vec<u8> = packets.iter().flat_map(|p| p.data.to_vec()).collect();
    assert_eq!(output, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    let pts: Vec<i64> = packets.iter().map(|p| p.pts).collect();
    assert_eq!(pts, vec![0, 3]);
}

#[test]
fn test_transcode_图像缩放管线() {
    init_logger();
    let ctx = Context::new();
    let tb = Rational::new(1, 25);

    let mut dec = Decoder::new(&ctx, CodecId::RawVideo).unwrap();
    {
        let c = dec.coder_mut();
        c.set_width(4).unwrap();
        c.set_height(4).unwrap();
        c.set_pixel_format(PixelFormat::Rgb24).unwrap();
        c.set_time_base(tb).unwrap();
    }
    dec.open(None).unwrap();

    let mut scaler =
        MediaPictureResampler::new(2, 2, PixelFormat::Yuv420p, 4, 4, PixelFormat::Rgb24).unwrap();
    assert_eq!(scaler.algorithm(), ScaleAlgorithm::Area);
    scaler.open().unwrap();

    let mut enc = Encoder::new(&ctx, CodecId::RawVideo).unwrap();
    {
        let c = enc.coder_mut();
        c.set_width(2).unwrap();
        c.set_height(2).unwrap();
        c.set_pixel_format(PixelFormat::Yuv420p).unwrap();
        c.set_time_base(tb).unwrap();
    }
    enc.open(None).unwrap();

    // 4x4 纯红 RGB24
    let red: Vec<u8> = [255u8, 0, 0].repeat(16);
    let pkt = Packet::from_data(red).with_pts(3, tb);

    let mut decoded = VideoFrame::new(4, 4, PixelFormat::Rgb24);
    let mut offset = 0;
    while offset < pkt.size() {
        offset += dec.decode_video(&mut decoded, Some(&pkt), offset).unwrap();
    }
    assert!(decoded.complete);

    let mut scaled = VideoFrame::new(2, 2, PixelFormat::Yuv420p);
    scaler.resample(&mut scaled, &decoded).unwrap();
    assert!(scaled.complete);
    assert_eq!(scaled.pts, 3);

    let mut out = Packet::empty();
    assert_eq!(enc.encode_video(&mut out, Some(&scaled)).unwrap(), 6);
    assert!(out.complete);
    assert_eq!(out.pts, 3);
    assert_eq!(&out.data[..], &[77, 77, 77, 77, 85, 255]);

    enc.encode_video(&mut out, None).unwrap();
    assert!(!out.complete);
}
