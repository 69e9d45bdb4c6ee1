//! 集成测试: 音频重采样器.
//!
//! 5.1 声道 44100 Hz F64 平面 → 立体声 22050 Hz S16, 输出容量小于
//! 每帧产出量, 剩余采样在排空时分批取出.

use liu::codec::AudioFrame;
use liu::core::{ChannelLayout, CoderState, LiuError, Rational, SampleFormat};
use liu::resample::{MediaAudioResampler, ResampleOptions};

const IN_RATE: u32 = 44100;
const OUT_RATE: u32 = 22050;
const FRAME_LEN: u32 = 1024;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 只有左前声道有信号的 5.1 输入帧
fn surround_frame(index: i64) -> AudioFrame {
    let mut f = AudioFrame::new(
        FRAME_LEN,
        IN_RATE,
        SampleFormat::F64p,
        ChannelLayout::SURROUND_5_1,
    );
    for (ch, plane) in f.data.iter_mut().enumerate() {
        let value = if ch == 0 { 0.25f64 } else { 0.0 };
        for sample in plane.chunks_exact_mut(8) {
            sample.copy_from_slice(&value.to_le_bytes());
        }
    }
    f.pts = index * i64::from(FRAME_LEN);
    f.time_base = Rational::new(1, IN_RATE as i32);
    f.complete = true;
    f
}

fn open_resampler() -> MediaAudioResampler {
    init_logger();
    let mut rs = MediaAudioResampler::new(
        ChannelLayout::STEREO,
        OUT_RATE,
        SampleFormat::S16,
        ChannelLayout::SURROUND_5_1,
        IN_RATE,
        SampleFormat::F64p,
    )
    .unwrap();
    rs.open().unwrap();
    rs
}

#[test]
fn test_resampler_降采样与混音() {
    let mut rs = open_resampler();
    assert_eq!(rs.time_base(), Rational::new(1, 44100));
    assert_eq!(rs.get_num_resampled_samples(FRAME_LEN), 512);

    let mut out = AudioFrame::with_capacity(256, OUT_RATE, SampleFormat::S16, ChannelLayout::STEREO);
    let mut chunks = Vec::new();
    let mut samples = Vec::new();
    let mut collect = |out: &AudioFrame, chunks: &mut Vec<(i64, i64)>| {
        chunks.push((out.pts, out.duration));
        for frame in out.data[0][..out.valid_plane_size()].chunks_exact(4) {
            samples.push((
                i16::from_le_bytes([frame[0], frame[1]]),
                i16::from_le_bytes([frame[2], frame[3]]),
            ));
        }
    };

    for i in 0..4 {
        let n = rs.resample(&mut out, Some(&surround_frame(i))).unwrap();
        assert_eq!(n, 256);
        assert!(out.complete);
        collect(&out, &mut chunks);
    }

    let mut flushed = Vec::new();
    loop {
        rs.resample(&mut out, None).unwrap();
        flushed.push(out.complete);
        if !out.complete {
            break;
        }
        collect(&out, &mut chunks);
    }
    assert_eq!(rs.state(), CoderState::Flushing);
    assert_eq!(flushed.last(), Some(&false));
    assert!(flushed[..flushed.len() - 1].iter().all(|&c| c));

    // 4096 个输入采样 → 2048 个输出采样
    assert_eq!(samples.len(), 2048);
    // 时间戳连续
    for pair in chunks.windows(2) {
        assert_eq!(pair[0].0 + pair[0].1, pair[1].0);
    }
    assert_eq!(chunks[0].0, 0);
    // 只有左声道有信号
    assert!(samples.iter().all(|&(l, r)| l > 0 && r == 0));
}

#[test]
fn test_resampler_时间基取最小公倍数() {
    init_logger();
    let rs = MediaAudioResampler::new(
        ChannelLayout::STEREO,
        48000,
        SampleFormat::S16,
        ChannelLayout::STEREO,
        44100,
        SampleFormat::S16,
    )
    .unwrap();
    assert_eq!(rs.time_base(), Rational::new(1, 7_056_000));
    assert_eq!(rs.get_num_resampled_samples(441), 480);
}

#[test]
fn test_resampler_参数不符的帧被拒绝() {
    let mut rs = open_resampler();
    let mut out = AudioFrame::with_capacity(256, OUT_RATE, SampleFormat::S16, ChannelLayout::MONO);
    assert!(matches!(
        rs.resample(&mut out, Some(&surround_frame(0))),
        Err(LiuError::InvalidArgument(_))
    ));
    assert_eq!(rs.state(), CoderState::Opened);

    let mut out = AudioFrame::with_capacity(256, OUT_RATE, SampleFormat::S16, ChannelLayout::STEREO);
    let mut incomplete = surround_frame(0);
    incomplete.complete = false;
    assert!(matches!(
        rs.resample(&mut out, Some(&incomplete)),
        Err(LiuError::InvalidArgument(_))
    ));
    assert_eq!(rs.state(), CoderState::Opened);
}

#[test]
fn test_resampler_打开后不能修改选项() {
    let mut rs = open_resampler();
    assert!(matches!(
        rs.set_options(ResampleOptions::default()),
        Err(LiuError::InvalidState(_))
    ));
    assert_eq!(rs.get_delay(1).unwrap(), 0);
    assert!(matches!(rs.get_delay(0), Err(LiuError::InvalidArgument(_))));

    rs.close();
    rs.close();
    let mut out = AudioFrame::with_capacity(16, OUT_RATE, SampleFormat::S16, ChannelLayout::STEREO);
    assert!(matches!(
        rs.resample(&mut out, None),
        Err(LiuError::InvalidState(_))
    ));
}
