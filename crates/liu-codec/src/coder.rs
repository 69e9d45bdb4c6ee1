//! 编解码器包装共用的配置与生命周期.
//!
//! 属性只能在 `Inited` 状态下修改, 是一次性的协商而不是通往引擎的实时通道.
//! `open()` 把属性和选项交给引擎, 成功进入 `Opened`, 失败进入 `Error`.

use std::sync::Arc;

use bitflags::bitflags;
use liu_core::state::Lifecycle;
use liu_core::{
    ChannelLayout, CoderState, LiuError, LiuResult, MediaType, Options, PixelFormat, Rational,
    SampleFormat,
};
use log::debug;

use crate::allocator::{DefaultAllocator, FrameAllocator};
use crate::codec_id::CodecId;
use crate::codec_parameters::{AudioCodecParams, CodecParameters, VideoCodecParams};
use crate::context::Context;
use crate::engine::{CodecCapabilities, CodecEngine};
use crate::frame::{AudioFrame, VideoFrame};

/// 音频编码器未声明帧长时使用的默认帧长
const DEFAULT_AUDIO_FRAME_SIZE: u32 = 576;

bitflags! {
    /// 编解码器标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CodecFlags: u32 {
        const UNALIGNED = 1 << 0;
        const QSCALE = 1 << 1;
        const FOUR_MV = 1 << 2;
        const OUTPUT_CORRUPT = 1 << 3;
        const QPEL = 1 << 4;
        const PASS1 = 1 << 9;
        const PASS2 = 1 << 10;
        const LOOP_FILTER = 1 << 11;
        const GRAY = 1 << 13;
        const PSNR = 1 << 15;
        const INTERLACED_DCT = 1 << 18;
        const LOW_DELAY = 1 << 19;
        const GLOBAL_HEADER = 1 << 22;
        const BITEXACT = 1 << 23;
        const AC_PRED = 1 << 24;
        const INTERLACED_ME = 1 << 29;
        const CLOSED_GOP = 1 << 31;
    }
}

bitflags! {
    /// 编解码器扩展标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CodecFlags2: u32 {
        const FAST = 1 << 0;
        const NO_OUTPUT = 1 << 2;
        const LOCAL_HEADER = 1 << 3;
        const DROP_FRAME_TIMECODE = 1 << 13;
        const CHUNKS = 1 << 15;
        const IGNORE_CROP = 1 << 16;
        const SHOW_ALL = 1 << 22;
        const EXPORT_MVS = 1 << 28;
        const SKIP_MANUAL = 1 << 29;
        const RO_FLUSH_NOOP = 1 << 30;
    }
}

/// 编解码器公共部分
pub struct Coder {
    ctx: Arc<Context>,
    lifecycle: Lifecycle,
    params: CodecParameters,
    time_base: Rational,
    flags: CodecFlags,
    flags2: CodecFlags2,
    capabilities: CodecCapabilities,
    /// 未识别的属性, 打开时作为选项交给引擎
    pending: Options,
    allocator: Box<dyn FrameAllocator>,
}

impl Coder {
    pub(crate) fn new(
        ctx: Arc<Context>,
        params: CodecParameters,
        capabilities: CodecCapabilities,
        owner: &'static str,
    ) -> Self {
        Self {
            ctx,
            lifecycle: Lifecycle::new(owner),
            params,
            time_base: Rational::UNDEFINED,
            flags: CodecFlags::empty(),
            flags2: CodecFlags2::empty(),
            capabilities,
            pending: Options::new(),
            allocator: Box::new(DefaultAllocator),
        }
    }

    // ========================
    // 查询
    // ========================

    /// 当前状态
    pub fn state(&self) -> CoderState {
        self.lifecycle.state()
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn codec_id(&self) -> CodecId {
        self.params.codec_id
    }

    pub fn media_type(&self) -> MediaType {
        self.params.codec_id.media_type()
    }

    /// 当前参数 (打开后为引擎实际采用的参数)
    pub fn parameters(&self) -> &CodecParameters {
        &self.params
    }

    /// 引擎能力
    pub fn capabilities(&self) -> CodecCapabilities {
        self.capabilities
    }

    /// 时间基; 音频在打开时若未设置则取 1/采样率
    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn bit_rate(&self) -> u64 {
        self.params.bit_rate
    }

    pub fn flags(&self) -> CodecFlags {
        self.flags
    }

    pub fn get_flag(&self, flag: CodecFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn flags2(&self) -> CodecFlags2 {
        self.flags2
    }

    pub fn get_flag2(&self, flag: CodecFlags2) -> bool {
        self.flags2.contains(flag)
    }

    pub fn width(&self) -> u32 {
        self.params.video_params().map_or(0, |v| v.width)
    }

    pub fn height(&self) -> u32 {
        self.params.video_params().map_or(0, |v| v.height)
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.params
            .video_params()
            .map_or(PixelFormat::None, |v| v.pixel_format)
    }

    pub fn sample_rate(&self) -> u32 {
        self.params.audio_params().map_or(0, |a| a.sample_rate)
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.params
            .audio_params()
            .map_or(SampleFormat::None, |a| a.sample_format)
    }

    pub fn channel_layout(&self) -> ChannelLayout {
        self.params
            .audio_params()
            .map_or(ChannelLayout::UNKNOWN, |a| a.channel_layout)
    }

    pub fn channels(&self) -> u32 {
        self.channel_layout().channels
    }

    /// 每帧采样数
    ///
    /// 音频引擎报告的帧长不大于 1 时返回 576.
    pub fn frame_size(&self) -> u32 {
        match self.params.audio_params() {
            Some(a) if a.frame_size <= 1 => DEFAULT_AUDIO_FRAME_SIZE,
            Some(a) => a.frame_size,
            None => 0,
        }
    }

    /// 按名称读取属性
    pub fn get_property(&self, name: &str) -> Option<String> {
        let value = match name {
            "b" | "bitrate" | "bit_rate" => self.bit_rate().to_string(),
            "time_base" => self.time_base.to_string(),
            "flags" => self.flags.bits().to_string(),
            "flags2" => self.flags2.bits().to_string(),
            "width" if self.params.video_params().is_some() => self.width().to_string(),
            "height" if self.params.video_params().is_some() => self.height().to_string(),
            "pix_fmt" | "pixel_format" if self.params.video_params().is_some() => {
                self.pixel_format().to_string()
            }
            "ar" | "sample_rate" if self.params.audio_params().is_some() => {
                self.sample_rate().to_string()
            }
            "sample_fmt" | "sample_format" if self.params.audio_params().is_some() => {
                self.sample_format().to_string()
            }
            "ac" | "channels" if self.params.audio_params().is_some() => {
                self.channels().to_string()
            }
            "frame_size" if self.params.audio_params().is_some() => {
                self.frame_size().to_string()
            }
            other => return self.pending.get(other).map(str::to_string),
        };
        Some(value)
    }

    // ========================
    // 配置 (仅 Inited)
    // ========================

    pub fn set_time_base(&mut self, time_base: Rational) -> LiuResult<()> {
        self.lifecycle.require_inited("set_time_base")?;
        if time_base.num <= 0 || time_base.den <= 0 {
            return Err(LiuError::InvalidArgument(format!(
                "时间基必须为正: {time_base}"
            )));
        }
        self.time_base = time_base;
        Ok(())
    }

    pub fn set_bit_rate(&mut self, bit_rate: u64) -> LiuResult<()> {
        self.lifecycle.require_inited("set_bit_rate")?;
        self.params.bit_rate = bit_rate;
        Ok(())
    }

    pub fn set_flags(&mut self, flags: CodecFlags) -> LiuResult<()> {
        self.lifecycle.require_inited("set_flags")?;
        self.flags = flags;
        Ok(())
    }

    pub fn set_flag(&mut self, flag: CodecFlags, value: bool) -> LiuResult<()> {
        self.lifecycle.require_inited("set_flag")?;
        self.flags.set(flag, value);
        Ok(())
    }

    pub fn set_flags2(&mut self, flags: CodecFlags2) -> LiuResult<()> {
        self.lifecycle.require_inited("set_flags2")?;
        self.flags2 = flags;
        Ok(())
    }

    pub fn set_flag2(&mut self, flag: CodecFlags2, value: bool) -> LiuResult<()> {
        self.lifecycle.require_inited("set_flag2")?;
        self.flags2.set(flag, value);
        Ok(())
    }

    pub fn set_width(&mut self, width: u32) -> LiuResult<()> {
        self.video_mut("set_width")?.width = width;
        Ok(())
    }

    pub fn set_height(&mut self, height: u32) -> LiuResult<()> {
        self.video_mut("set_height")?.height = height;
        Ok(())
    }

    pub fn set_pixel_format(&mut self, format: PixelFormat) -> LiuResult<()> {
        self.video_mut("set_pixel_format")?.pixel_format = format;
        Ok(())
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) -> LiuResult<()> {
        self.audio_mut("set_sample_rate")?.sample_rate = sample_rate;
        Ok(())
    }

    pub fn set_sample_format(&mut self, format: SampleFormat) -> LiuResult<()> {
        self.audio_mut("set_sample_format")?.sample_format = format;
        Ok(())
    }

    pub fn set_channel_layout(&mut self, layout: ChannelLayout) -> LiuResult<()> {
        self.audio_mut("set_channel_layout")?.channel_layout = layout;
        Ok(())
    }

    pub fn set_frame_size(&mut self, frame_size: u32) -> LiuResult<()> {
        self.audio_mut("set_frame_size")?.frame_size = frame_size;
        Ok(())
    }

    /// 替换帧缓冲分配器
    pub fn set_allocator(&mut self, allocator: Box<dyn FrameAllocator>) -> LiuResult<()> {
        self.lifecycle.require_inited("set_allocator")?;
        self.allocator = allocator;
        Ok(())
    }

    /// 按名称设置属性
    ///
    /// 未识别的名称会保留下来, 在 `open()` 时作为选项交给引擎.
    pub fn set_property(&mut self, name: &str, value: &str) -> LiuResult<()> {
        self.lifecycle.require_inited("set_property")?;
        match name {
            "b" | "bitrate" | "bit_rate" => self.set_bit_rate(parse_value(name, value)?),
            "time_base" => self.set_time_base(parse_rational(value)?),
            "flags" => self.set_flags(CodecFlags::from_bits_truncate(parse_value(name, value)?)),
            "flags2" => {
                self.set_flags2(CodecFlags2::from_bits_truncate(parse_value(name, value)?))
            }
            "width" => self.set_width(parse_value(name, value)?),
            "height" => self.set_height(parse_value(name, value)?),
            "pix_fmt" | "pixel_format" => self.set_pixel_format(value.parse()?),
            "ar" | "sample_rate" => self.set_sample_rate(parse_value(name, value)?),
            "sample_fmt" | "sample_format" => self.set_sample_format(value.parse()?),
            "ac" | "channels" => {
                self.set_channel_layout(ChannelLayout::from_channels(parse_value(name, value)?))
            }
            "frame_size" => self.set_frame_size(parse_value(name, value)?),
            _ => {
                self.pending.set(name, value);
                Ok(())
            }
        }
    }

    fn video_mut(&mut self, op: &str) -> LiuResult<&mut VideoCodecParams> {
        self.lifecycle.require_inited(op)?;
        let id = self.params.codec_id;
        self.params
            .video_params_mut()
            .ok_or_else(|| LiuError::InvalidArgument(format!("{id} 不是视频编解码器")))
    }

    fn audio_mut(&mut self, op: &str) -> LiuResult<&mut AudioCodecParams> {
        self.lifecycle.require_inited(op)?;
        let id = self.params.codec_id;
        self.params
            .audio_params_mut()
            .ok_or_else(|| LiuError::InvalidArgument(format!("{id} 不是音频编解码器")))
    }

    // ========================
    // 校验
    // ========================

    /// 检查音频帧的采样率/格式/布局与本编解码器一致
    pub fn ensure_audio_params_match(&self, frame: &AudioFrame) -> LiuResult<()> {
        if frame.sample_rate != self.sample_rate() {
            return Err(LiuError::InvalidArgument(format!(
                "音频帧采样率 {} 与编解码器的 {} 不一致",
                frame.sample_rate,
                self.sample_rate()
            )));
        }
        if frame.sample_format != self.sample_format() {
            return Err(LiuError::InvalidArgument(format!(
                "音频帧采样格式 {} 与编解码器的 {} 不一致",
                frame.sample_format,
                self.sample_format()
            )));
        }
        if frame.channel_layout != self.channel_layout() {
            return Err(LiuError::InvalidArgument(format!(
                "音频帧声道布局 {} 与编解码器的 {} 不一致",
                frame.channel_layout,
                self.channel_layout()
            )));
        }
        Ok(())
    }

    /// 检查图像的宽高/像素格式与本编解码器一致
    pub fn ensure_picture_params_match(&self, frame: &VideoFrame) -> LiuResult<()> {
        if frame.width != self.width() || frame.height != self.height() {
            return Err(LiuError::InvalidArgument(format!(
                "图像尺寸 {}x{} 与编解码器的 {}x{} 不一致",
                frame.width,
                frame.height,
                self.width(),
                self.height()
            )));
        }
        if frame.pixel_format != self.pixel_format() {
            return Err(LiuError::InvalidArgument(format!(
                "图像像素格式 {} 与编解码器的 {} 不一致",
                frame.pixel_format,
                self.pixel_format()
            )));
        }
        Ok(())
    }

    // ========================
    // 生命周期 (由 Decoder / Encoder 驱动)
    // ========================

    /// 打开引擎, 返回引擎未使用的选项
    pub(crate) fn open_engine<E: CodecEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        options: Option<&Options>,
    ) -> LiuResult<Options> {
        self.lifecycle.require_inited("open")?;

        let mut opts = self.pending.clone();
        if let Some(extra) = options {
            opts.merge(extra);
        }
        let mut params = self.params.clone();

        let result = {
            let _guard = self.ctx.lock_engines();
            engine.open(&mut params, &mut opts)
        };
        if let Err(e) = result {
            return Err(self.lifecycle.fail("open", e));
        }

        self.params = params;
        self.capabilities = engine.capabilities();
        if !self.time_base.is_valid() {
            self.time_base = self.default_time_base();
        }
        self.lifecycle.mark_opened();
        debug!(
            "打开 {}: 时间基 {}, 未使用选项 {}",
            engine.name(),
            self.time_base,
            opts.len()
        );
        Ok(opts)
    }

    fn default_time_base(&self) -> Rational {
        if let Some(a) = self.params.audio_params() {
            let tb = Rational::for_sample_rate(a.sample_rate);
            if tb.is_valid() {
                return tb;
            }
        }
        if let Some(v) = self.params.video_params() {
            if v.frame_rate.num > 0 && v.frame_rate.den > 0 {
                return v.frame_rate.invert();
            }
        }
        Rational::UNDEFINED
    }

    /// 关闭引擎; 重复调用无效果
    pub(crate) fn close_engine<E: CodecEngine + ?Sized>(&mut self, engine: &mut E) {
        if self.lifecycle.close() {
            engine.close();
            debug!("关闭 {}", engine.name());
        }
    }

    pub(crate) fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub(crate) fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    pub(crate) fn allocator_mut(&mut self) -> &mut dyn FrameAllocator {
        self.allocator.as_mut()
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> LiuResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| LiuError::InvalidArgument(format!("属性 {name} 的值无效: {value}")))
}

/// 解析 `num/den` 或单个整数
fn parse_rational(value: &str) -> LiuResult<Rational> {
    let invalid = || LiuError::InvalidArgument(format!("无效的有理数: {value}"));
    match value.split_once('/') {
        Some((n, d)) => {
            let num = n.trim().parse::<i32>().map_err(|_| invalid())?;
            let den = d.trim().parse::<i32>().map_err(|_| invalid())?;
            Ok(Rational::make(num, den))
        }
        None => value
            .trim()
            .parse::<i32>()
            .map(Rational::from)
            .map_err(|_| invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_coder() -> Coder {
        Coder::new(
            Context::new(),
            CodecParameters::new(CodecId::PcmS16le),
            CodecCapabilities::empty(),
            "测试编解码器",
        )
    }

    #[test]
    fn test_coder_按名称设置属性() {
        let mut coder = audio_coder();
        coder.set_property("bitrate", "128000").unwrap();
        coder.set_property("sample_rate", "44100").unwrap();
        coder.set_property("channels", "2").unwrap();
        coder.set_property("sample_fmt", "s16").unwrap();
        coder.set_property("time_base", "2/88200").unwrap();
        coder.set_property("custom_key", "v").unwrap();
        assert_eq!(coder.bit_rate(), 128_000);
        assert_eq!(coder.sample_rate(), 44100);
        assert_eq!(coder.channel_layout(), ChannelLayout::STEREO);
        assert_eq!(coder.time_base(), Rational::new(1, 44100));
        assert_eq!(coder.get_property("custom_key").as_deref(), Some("v"));
        assert_eq!(coder.get_property("bitrate").as_deref(), Some("128000"));
    }

    #[test]
    fn test_coder_属性类型不匹配() {
        let mut coder = audio_coder();
        assert!(matches!(
            coder.set_property("width", "640"),
            Err(LiuError::InvalidArgument(_))
        ));
        assert!(matches!(
            coder.set_property("sample_rate", "abc"),
            Err(LiuError::InvalidArgument(_))
        ));
        assert!(matches!(
            coder.set_time_base(Rational::new(0, 1)),
            Err(LiuError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_coder_帧长默认值() {
        let mut coder = audio_coder();
        assert_eq!(coder.frame_size(), 576);
        coder.set_frame_size(1).unwrap();
        assert_eq!(coder.frame_size(), 576);
        coder.set_frame_size(1024).unwrap();
        assert_eq!(coder.frame_size(), 1024);
    }

    #[test]
    fn test_coder_标志位() {
        let mut coder = audio_coder();
        coder.set_flag(CodecFlags::BITEXACT, true).unwrap();
        coder.set_flag2(CodecFlags2::FAST, true).unwrap();
        assert!(coder.get_flag(CodecFlags::BITEXACT));
        assert!(!coder.get_flag(CodecFlags::QSCALE));
        assert!(coder.get_flag2(CodecFlags2::FAST));
        coder.set_flag(CodecFlags::BITEXACT, false).unwrap();
        assert!(coder.flags().is_empty());
    }

    #[test]
    fn test_coder_默认时间基() {
        let mut coder = audio_coder();
        coder.set_sample_rate(48000).unwrap();
        assert_eq!(coder.default_time_base(), Rational::new(1, 48000));
        // 超出 i32 的采样率不能表示为时间基
        coder.set_sample_rate(3_000_000_000).unwrap();
        assert_eq!(coder.default_time_base(), Rational::UNDEFINED);
        coder.set_sample_rate(0).unwrap();
        assert_eq!(coder.default_time_base(), Rational::UNDEFINED);
    }

    #[test]
    fn test_coder_音频参数校验() {
        let mut coder = audio_coder();
        coder.set_sample_rate(8000).unwrap();
        coder.set_sample_format(SampleFormat::S16).unwrap();
        coder.set_channel_layout(ChannelLayout::MONO).unwrap();
        let ok = AudioFrame::new(10, 8000, SampleFormat::S16, ChannelLayout::MONO);
        assert!(coder.ensure_audio_params_match(&ok).is_ok());
        let bad = AudioFrame::new(10, 16000, SampleFormat::S16, ChannelLayout::MONO);
        assert!(matches!(
            coder.ensure_audio_params_match(&bad),
            Err(LiuError::InvalidArgument(_))
        ));
    }
}
