//! liu - 音频转码命令行工具
//!
//! 读取裸 PCM 文件, 经解码、重采样、编码后写出裸 PCM.
//! 参数可来自 JSON 配置文件, 命令行取值优先.

mod logging;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context as _, Result, bail};
use clap::Parser;
use liu::codec::Context;
use liu::{PipelineConfig, RawPcmSink, RawPcmSource, Transcoder};

#[derive(Parser, Debug)]
#[command(name = "liu", version, about = "纯 Rust 音频转码工具")]
struct Cli {
    /// 输入文件路径 (裸 PCM)
    #[arg(short, long)]
    input: Option<String>,

    /// 输出文件路径 (裸 PCM)
    #[arg(short, long)]
    output: Option<String>,

    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 输入编解码器 (如 "pcm_s16le")
    #[arg(long = "in-codec")]
    in_codec: Option<String>,

    /// 输入采样率 (Hz)
    #[arg(long = "in-rate")]
    in_rate: Option<u32>,

    /// 输入声道数
    #[arg(long = "in-channels")]
    in_channels: Option<u32>,

    /// 输出编解码器 (如 "pcm_f32le")
    #[arg(short = 'c', long = "acodec")]
    acodec: Option<String>,

    /// 目标采样率 (Hz)
    #[arg(long)]
    ar: Option<u32>,

    /// 目标声道数
    #[arg(long)]
    ac: Option<u32>,

    /// 输出数据包的采样数, 0 表示不限
    #[arg(long = "frame-size")]
    frame_size: Option<u32>,

    /// 每次读取的字节数
    #[arg(long = "packet-size")]
    packet_size: Option<usize>,

    /// 打印生效的配置后退出
    #[arg(long)]
    dump_config: bool,

    /// 结束后以 JSON 打印统计
    #[arg(long)]
    stats: bool,

    /// 覆盖输出文件
    #[arg(short = 'y', long)]
    overwrite: bool,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init("liu-cli", cli.verbose) {
        eprintln!("警告: {e:#}");
    }

    if let Err(e) = run(&cli) {
        tracing::error!("{e:#}");
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = build_config(cli)?;
    if cli.dump_config {
        println!("{}", config.to_json_string()?);
        return Ok(());
    }

    let Some(input_path) = cli.input.as_deref() else {
        bail!("必须指定输入文件 (-i <输入文件>)");
    };
    let Some(output_path) = cli.output.as_deref() else {
        bail!("必须指定输出文件 (-o <输出文件>)");
    };
    if !cli.overwrite && Path::new(output_path).exists() {
        bail!("输出文件已存在 '{output_path}', 使用 -y 覆盖");
    }

    eprintln!("liu 版本 {} -- 纯 Rust 音频转码工具", liu::version());
    eprintln!(
        "输入: {input_path} ({}, {} Hz, {} 声道)",
        config.input.codec, config.input.sample_rate, config.input.channels
    );
    eprintln!(
        "输出: {output_path} ({}, {} Hz, {} 声道)",
        config.output.codec, config.output.sample_rate, config.output.channels
    );

    let ctx = Context::new();
    let mut transcoder = Transcoder::new(&ctx, &config).context("创建转码器失败")?;
    if let Some(rs) = transcoder.resampler() {
        tracing::debug!("重采样时间基: {}", rs.time_base());
    }

    let reader = File::open(input_path)
        .with_context(|| format!("无法打开输入文件 '{input_path}'"))?;
    let writer = File::create(output_path)
        .with_context(|| format!("无法创建输出文件 '{output_path}'"))?;
    let mut source = RawPcmSource::new(BufReader::new(reader), &config.input, config.packet_size)?;
    let mut sink = RawPcmSink::new(BufWriter::new(writer));

    let stats = transcoder.run(&mut source, &mut sink)?;
    let written = sink.bytes_written();
    sink.into_inner()?;
    transcoder.close();

    eprintln!(
        "完成: {} 个数据包 -> {} 个数据包, 写出 {written} 字节",
        stats.packets_read, stats.packets_written
    );
    if cli.stats {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}

/// 合并配置文件与命令行参数
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("读取配置文件 '{}' 失败", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(codec) = &cli.in_codec {
        config.input.codec = codec.clone();
    }
    if let Some(rate) = cli.in_rate {
        config.input.sample_rate = rate;
    }
    if let Some(channels) = cli.in_channels {
        config.input.channels = channels;
    }
    if let Some(codec) = &cli.acodec {
        config.output.codec = codec.clone();
    }
    if let Some(rate) = cli.ar {
        config.output.sample_rate = rate;
    }
    if let Some(channels) = cli.ac {
        config.output.channels = channels;
    }
    if let Some(n) = cli.frame_size {
        config.output.frame_size = n;
    }
    if let Some(n) = cli.packet_size {
        config.packet_size = n;
    }

    config.validate().context("配置无效")?;
    Ok(config)
}
