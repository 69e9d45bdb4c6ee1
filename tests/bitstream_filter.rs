//! 集成测试: 码流滤镜的送入/取出协议.
//!
//! 送入返回 `AwaitingData` 时必须先取出输出; 流结束后取出返回
//! `EndOfStream`, 再送入数据包也只会得到 `EndOfStream`.

use liu::codec::{BitStreamFilter, CodecId, CodecParameters, Context, Packet, ProcessorResult};
use liu::core::{ChannelLayout, CoderState, LiuError, Options, Rational, SampleFormat};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn mono_s16(nb_samples: usize, value: u8, pts: i64) -> Packet {
    Packet::from_data(vec![value; nb_samples * 2]).with_pts(pts, Rational::new(1, 8000))
}

fn receive_all(bsf: &mut BitStreamFilter) -> (Vec<Packet>, ProcessorResult) {
    let mut out = Vec::new();
    let mut pkt = Packet::empty();
    loop {
        match bsf.receive_packet(&mut pkt).unwrap() {
            ProcessorResult::Success => out.push(pkt.clone()),
            other => return (out, other),
        }
    }
}

fn open_rechunk(nb_out_samples: usize) -> BitStreamFilter {
    init_logger();
    let ctx = Context::new();
    let mut bsf = BitStreamFilter::new(&ctx, "pcm_rechunk").unwrap();
    bsf.set_parameters(CodecParameters::audio(
        CodecId::PcmS16le,
        8000,
        SampleFormat::S16,
        ChannelLayout::MONO,
    ))
    .unwrap();
    let opts = Options::new()
        .with("nb_out_samples", nb_out_samples.to_string())
        .with("pad", "true")
        .with("unknown", "1");
    let unused = bsf.open(Some(&opts)).unwrap();
    assert_eq!(unused.len(), 1);
    assert_eq!(unused.get("unknown"), Some("1"));
    bsf
}

#[test]
fn test_bsf_重新分块与反压() {
    let mut bsf = open_rechunk(4);

    assert_eq!(
        bsf.send_packet(Some(&mono_s16(3, 1, 0))).unwrap(),
        ProcessorResult::Success
    );
    assert_eq!(
        bsf.send_packet(Some(&mono_s16(3, 2, 3))).unwrap(),
        ProcessorResult::Success
    );
    // 已攒够一包, 未取出前拒绝新的输入
    let third = mono_s16(4, 3, 6);
    assert_eq!(
        bsf.send_packet(Some(&third)).unwrap(),
        ProcessorResult::AwaitingData
    );

    let mut out = Packet::empty();
    assert_eq!(bsf.receive_packet(&mut out).unwrap(), ProcessorResult::Success);
    assert_eq!((out.size(), out.pts, out.duration), (8, 0, 4));
    assert_eq!(&out.data[..], &[1, 1, 1, 1, 1, 1, 2, 2]);

    assert_eq!(
        bsf.send_packet(Some(&third)).unwrap(),
        ProcessorResult::Success
    );
    let (packets, last) = receive_all(&mut bsf);
    assert_eq!(last, ProcessorResult::AwaitingData);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].pts, 4);

    // 流结束: 剩余的 2 个采样补零成一整包
    assert_eq!(bsf.send_packet(None).unwrap(), ProcessorResult::Success);
    assert_eq!(bsf.state(), CoderState::Flushing);
    let (packets, last) = receive_all(&mut bsf);
    assert_eq!(last, ProcessorResult::EndOfStream);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].pts, 8);
    assert_eq!(&packets[0].data[..], &[3, 3, 3, 3, 0, 0, 0, 0]);

    assert_eq!(
        bsf.send_packet(Some(&third)).unwrap(),
        ProcessorResult::EndOfStream
    );
}

#[test]
fn test_bsf_不完整采样块进入错误状态() {
    let mut bsf = open_rechunk(4);
    let odd = Packet::from_data(vec![0u8; 3]);
    assert!(matches!(
        bsf.send_packet(Some(&odd)),
        Err(LiuError::Runtime(_))
    ));
    assert_eq!(bsf.state(), CoderState::Error);
    let mut out = Packet::empty();
    assert!(matches!(
        bsf.receive_packet(&mut out),
        Err(LiuError::Runtime(_))
    ));
}

#[test]
fn test_bsf_串联滤镜() {
    init_logger();
    let ctx = Context::new();
    let mut chomp = BitStreamFilter::new(&ctx, "chomp").unwrap();
    let mut null = BitStreamFilter::new(&ctx, "null").unwrap();
    chomp.open(None).unwrap();
    null.open(None).unwrap();

    let inputs = [vec![1u8, 2, 0, 0], vec![0u8, 5, 0], vec![0u8; 2]];
    let mut outputs = Vec::new();
    let mut mid = Packet::empty();
    for data in inputs {
        assert_eq!(
            chomp.send_packet(Some(&Packet::from_data(data))).unwrap(),
            ProcessorResult::Success
        );
        while chomp.receive_packet(&mut mid).unwrap() == ProcessorResult::Success {
            assert_eq!(null.send_packet(Some(&mid)).unwrap(), ProcessorResult::Success);
            let (packets, _) = receive_all(&mut null);
            outputs.extend(packets.into_iter().map(|p| p.data.to_vec()));
        }
    }
    chomp.send_packet(None).unwrap();
    null.send_packet(None).unwrap();
    assert_eq!(receive_all(&mut chomp).1, ProcessorResult::EndOfStream);
    assert_eq!(receive_all(&mut null).1, ProcessorResult::EndOfStream);

    assert_eq!(outputs, vec![vec![1, 2], vec![0, 5], vec![]]);
}
