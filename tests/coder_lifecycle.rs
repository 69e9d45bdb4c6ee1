//! 集成测试: 编解码器生命周期.
//!
//! INITED → OPENED → FLUSHING 的正常流转, 打开失败进入 ERROR,
//! 以及关闭后的快速失败.

use liu::codec::{AudioFrame, CodecId, Context, Decoder, Encoder, Packet};
use liu::core::{ChannelLayout, CoderState, LiuError, Rational, SampleFormat};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn s16_packet(samples: &[i16], pts: i64) -> Packet {
    let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    Packet::from_data(data).with_pts(pts, Rational::new(1, 8000))
}

#[test]
fn test_decoder_完整生命周期() {
    init_logger();
    let ctx = Context::new();
    let mut dec = Decoder::new(&ctx, CodecId::PcmS16le).unwrap();
    assert_eq!(dec.state(), CoderState::Inited);

    let mut frame = AudioFrame::new(0, 8000, SampleFormat::S16, ChannelLayout::MONO);
    let pkt = s16_packet(&[1, 2, 3, 4, 5, 6, 7, 8], 0);

    // 打开前解码: 状态错误, 状态不变
    assert!(matches!(
        dec.decode_audio(&mut frame, Some(&pkt), 0),
        Err(LiuError::InvalidState(_))
    ));
    assert_eq!(dec.state(), CoderState::Inited);

    dec.coder_mut().set_sample_rate(8000).unwrap();
    dec.coder_mut().set_channel_layout(ChannelLayout::MONO).unwrap();
    dec.open(None).unwrap();
    assert_eq!(dec.state(), CoderState::Opened);
    assert_eq!(dec.coder().sample_format(), SampleFormat::S16);
    assert_eq!(dec.coder().time_base(), Rational::new(1, 8000));

    assert_eq!(dec.decode_audio(&mut frame, Some(&pkt), 0).unwrap(), 16);
    assert!(frame.complete);
    assert_eq!((frame.nb_samples, frame.pts, frame.duration), (8, 0, 8));

    let next = s16_packet(&[9, 10], 8);
    dec.decode_audio(&mut frame, Some(&next), 0).unwrap();
    assert_eq!((frame.nb_samples, frame.pts), (2, 8));

    // 排空: 没有更多帧, 进入 FLUSHING
    assert_eq!(dec.decode_audio(&mut frame, None, 0).unwrap(), 0);
    assert!(!frame.complete);
    assert_eq!(dec.state(), CoderState::Flushing);

    // FLUSHING 不再接受数据包, 也不能修改配置
    assert!(matches!(
        dec.decode_audio(&mut frame, Some(&pkt), 0),
        Err(LiuError::InvalidState(_))
    ));
    assert!(matches!(
        dec.coder_mut().set_sample_rate(16000),
        Err(LiuError::InvalidState(_))
    ));

    dec.close();
    assert!(dec.coder().is_closed());
    assert!(matches!(
        dec.decode_audio(&mut frame, None, 0),
        Err(LiuError::InvalidState(_))
    ));
    // 重复关闭无效果
    dec.close();
    assert!(dec.coder().is_closed());
}

#[test]
fn test_encoder_打开失败进入错误状态() {
    init_logger();
    let ctx = Context::new();
    let mut enc = Encoder::new(&ctx, CodecId::PcmS16le).unwrap();
    let c = enc.coder_mut();
    c.set_sample_rate(8000).unwrap();
    c.set_channel_layout(ChannelLayout::MONO).unwrap();
    c.set_sample_format(SampleFormat::F32).unwrap();

    assert!(matches!(enc.open(None), Err(LiuError::Runtime(_))));
    assert_eq!(enc.state(), CoderState::Error);

    // ERROR 状态下的任何调用都报运行时错误
    assert!(matches!(enc.open(None), Err(LiuError::Runtime(_))));
    let mut pkt = Packet::empty();
    assert!(matches!(
        enc.encode_audio(&mut pkt, None),
        Err(LiuError::Runtime(_))
    ));

    // 关闭优先于 ERROR
    enc.close();
    assert!(matches!(
        enc.encode_audio(&mut pkt, None),
        Err(LiuError::InvalidState(_))
    ));
}

#[test]
fn test_coder_未识别属性交还调用方() {
    init_logger();
    let ctx = Context::new();
    let mut dec = Decoder::new(&ctx, CodecId::PcmS16le).unwrap();
    let c = dec.coder_mut();
    c.set_property("ar", "8000").unwrap();
    c.set_property("ac", "2").unwrap();
    c.set_property("frame_size", "4").unwrap();
    c.set_property("no_such_option", "1").unwrap();
    assert_eq!(c.get_property("no_such_option").as_deref(), Some("1"));

    let unused = dec.open(None).unwrap();
    assert_eq!(unused.get("no_such_option"), Some("1"));
    assert!(!unused.contains("frame_size"));
    assert_eq!(dec.coder().channels(), 2);
    assert_eq!(dec.coder().frame_size(), 4);
}

#[test]
fn test_coder_按媒体类型拒绝调用() {
    init_logger();
    let ctx = Context::new();
    let mut dec = Decoder::new(&ctx, CodecId::Text).unwrap();
    dec.open(None).unwrap();
    let mut frame = AudioFrame::new(0, 8000, SampleFormat::S16, ChannelLayout::MONO);
    let pkt = Packet::from_data(b"hello".to_vec());
    assert!(matches!(
        dec.decode_audio(&mut frame, Some(&pkt), 0),
        Err(LiuError::InvalidArgument(_))
    ));
    assert_eq!(dec.state(), CoderState::Opened);
}
