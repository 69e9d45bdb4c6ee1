//! 音频重采样器: 格式/采样率/声道布局转换与无漂移时间戳换算.
//!
//! 输出时间基固定为 `1/lcm(输入采样率, 输出采样率)`, 它能精确表示两侧的采样网格,
//! 因此两侧之间的时间戳换算不会舍入. 输入时间戳先以 `Rounding::Down` 换算到
//! `1/(输入采样率 * 输出采样率)` 的联合单位, 交给引擎的 `next_pts` 扣除缓冲延迟,
//! 再换算回输出时间基.
//!
//! 使用方式与解码器一致: 打开后逐帧调用 [`MediaAudioResampler::resample`],
//! 输入结束后以 `None` 反复调用, 直到输出帧的 `complete` 为 `false`.

use liu_codec::AudioFrame;
use liu_core::rational::{lcm, rescale};
use liu_core::{
    ChannelLayout, CoderState, Lifecycle, LiuError, LiuResult, NOPTS_VALUE, Rational, Rounding,
    SampleFormat,
};
use log::{debug, trace};

use crate::engine::{AudioSpec, ResampleEngine, ResampleOptions};
use crate::software::SoftwareResampler;

/// 音频重采样器
pub struct MediaAudioResampler {
    lifecycle: Lifecycle,
    input: AudioSpec,
    output: AudioSpec,
    time_base: Rational,
    options: ResampleOptions,
    engine: Box<dyn ResampleEngine>,
}

impl MediaAudioResampler {
    /// 使用内置软件引擎创建
    pub fn new(
        out_layout: ChannelLayout,
        out_sample_rate: u32,
        out_format: SampleFormat,
        in_layout: ChannelLayout,
        in_sample_rate: u32,
        in_format: SampleFormat,
    ) -> LiuResult<Self> {
        Self::with_engine(
            out_layout,
            out_sample_rate,
            out_format,
            in_layout,
            in_sample_rate,
            in_format,
            Box::new(SoftwareResampler::new()),
        )
    }

    /// 使用给定引擎创建; 六个参数必须都有效
    #[allow(clippy::too_many_arguments)]
    pub fn with_engine(
        out_layout: ChannelLayout,
        out_sample_rate: u32,
        out_format: SampleFormat,
        in_layout: ChannelLayout,
        in_sample_rate: u32,
        in_format: SampleFormat,
        engine: Box<dyn ResampleEngine>,
    ) -> LiuResult<Self> {
        let output = AudioSpec::new(out_sample_rate, out_format, out_layout);
        let input = AudioSpec::new(in_sample_rate, in_format, in_layout);
        for (side, spec) in [("输出", &output), ("输入", &input)] {
            if !spec.channel_layout.is_known() {
                return Err(LiuError::InvalidArgument(format!("{side}声道布局未知")));
            }
            if spec.sample_rate == 0 || spec.sample_rate > i32::MAX as u32 {
                return Err(LiuError::InvalidArgument(format!(
                    "{side}采样率无效: {}",
                    spec.sample_rate
                )));
            }
            if spec.sample_format == SampleFormat::None {
                return Err(LiuError::InvalidArgument(format!("{side}采样格式未指定")));
            }
        }

        let den = lcm(i64::from(in_sample_rate), i64::from(out_sample_rate));
        let den = i32::try_from(den).map_err(|_| {
            LiuError::InvalidArgument(format!(
                "采样率 {in_sample_rate} 与 {out_sample_rate} 的最小公倍数超出时间基范围"
            ))
        })?;

        Ok(Self {
            lifecycle: Lifecycle::new("音频重采样器"),
            input,
            output,
            time_base: Rational::new(1, den),
            options: ResampleOptions::default(),
            engine,
        })
    }

    pub fn state(&self) -> CoderState {
        self.lifecycle.state()
    }

    /// 引擎名称
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// 输出时间基, 默认 `1/lcm(输入采样率, 输出采样率)`
    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /// 覆盖输出时间基 (仅 `Inited`)
    pub fn set_time_base(&mut self, time_base: Rational) -> LiuResult<()> {
        self.lifecycle.require_inited("set_time_base")?;
        if time_base.num <= 0 || time_base.den <= 0 {
            return Err(LiuError::InvalidArgument(format!("无效的时间基: {time_base}")));
        }
        self.time_base = time_base;
        Ok(())
    }

    pub fn options(&self) -> &ResampleOptions {
        &self.options
    }

    /// 设置时间戳补偿参数 (仅 `Inited`)
    pub fn set_options(&mut self, options: ResampleOptions) -> LiuResult<()> {
        self.lifecycle.require_inited("set_options")?;
        self.options = options;
        Ok(())
    }

    pub fn output_layout(&self) -> ChannelLayout {
        self.output.channel_layout
    }

    pub fn output_channels(&self) -> u32 {
        self.output.channels()
    }

    pub fn output_sample_rate(&self) -> u32 {
        self.output.sample_rate
    }

    pub fn output_format(&self) -> SampleFormat {
        self.output.sample_format
    }

    pub fn input_layout(&self) -> ChannelLayout {
        self.input.channel_layout
    }

    pub fn input_channels(&self) -> u32 {
        self.input.channels()
    }

    pub fn input_sample_rate(&self) -> u32 {
        self.input.sample_rate
    }

    pub fn input_format(&self) -> SampleFormat {
        self.input.sample_format
    }

    /// `n` 个输入采样大约对应的输出采样数 (向上取整)
    pub fn get_num_resampled_samples(&self, n: u32) -> u32 {
        let out = u64::from(n) * u64::from(self.output.sample_rate);
        let r = out.div_ceil(u64::from(self.input.sample_rate));
        u32::try_from(r).unwrap_or(u32::MAX)
    }

    /// 配置引擎; 失败时进入 `Error`
    pub fn open(&mut self) -> LiuResult<()> {
        self.lifecycle.require_inited("open")?;
        if let Err(e) = self
            .engine
            .configure(&self.input, &self.output, &self.options)
        {
            return Err(self.lifecycle.fail("open", e));
        }
        self.lifecycle.mark_opened();
        debug!(
            "打开音频重采样器 ({}): {} -> {}, 时间基 {}",
            self.engine.name(),
            self.input,
            self.output,
            self.time_base
        );
        Ok(())
    }

    /// 关闭重采样器; 重复调用无效果
    pub fn close(&mut self) {
        if self.lifecycle.close() {
            debug!("关闭音频重采样器 ({})", self.engine.name());
        }
    }

    /// 重采样一帧, `None` 表示排空; 返回写入 `out` 的采样数
    pub fn resample(&mut self, out: &mut AudioFrame, input: Option<&AudioFrame>) -> LiuResult<u32> {
        match input {
            Some(_) => self.lifecycle.require_opened("resample")?,
            None => self.lifecycle.require_active("resample")?,
        }
        self.check_output(out)?;
        if let Some(f) = input {
            self.check_input(f)?;
        }
        out.complete = false;
        out.nb_samples = 0;

        let in_rate = i64::from(self.input.sample_rate);
        let out_rate = i64::from(self.output.sample_rate);
        let joint = in_rate * out_rate;

        let input_ts = match input {
            Some(f) if f.pts != NOPTS_VALUE => {
                let (num, den) = if f.time_base.is_valid() && f.time_base.num != 0 {
                    (i64::from(f.time_base.num), i64::from(f.time_base.den))
                } else {
                    (1, in_rate)
                };
                rescale(f.pts, 1, joint, num, den, Rounding::Down)
            }
            _ => NOPTS_VALUE,
        };
        if input.is_none() {
            self.lifecycle.mark_flushing();
        }

        let next = self.engine.next_pts(input_ts);
        let tb = self.time_base;
        let pts = rescale(
            next,
            i64::from(tb.num),
            i64::from(tb.den),
            1,
            joint,
            Rounding::Down,
        );

        let planes = input.map(|f| (f.data.as_slice(), f.nb_samples));
        let produced = match self.engine.convert(&mut out.data, out.capacity, planes) {
            Ok(n) => n,
            Err(e) => return Err(self.lifecycle.fail("resample", e)),
        };

        out.nb_samples = produced;
        out.pts = pts;
        out.time_base = tb;
        out.duration = rescale(
            i64::from(produced),
            i64::from(tb.num),
            i64::from(tb.den),
            1,
            out_rate,
            Rounding::Down,
        );
        out.complete = produced > 0;
        trace!(
            "重采样: 输入 {} 个采样, 输出 {produced} 个采样, pts={pts}",
            input.map_or(0, |f| f.nb_samples)
        );
        Ok(produced)
    }

    /// 在接下来 `distance` 个输出采样内增减 `sample_delta` 个采样
    pub fn set_compensation(&mut self, sample_delta: i32, distance: i32) -> LiuResult<()> {
        self.lifecycle.require_opened("set_compensation")?;
        self.engine.set_compensation(sample_delta, distance)
    }

    /// 丢弃接下来的 `count` 个输出采样, 返回实际计入的数量
    pub fn drop_output(&mut self, count: u32) -> LiuResult<u32> {
        self.lifecycle.require_opened("drop_output")?;
        self.engine.drop_output(count)
    }

    /// 在缓冲中插入 `count` 个静音采样, 返回实际插入的数量
    pub fn inject_silence(&mut self, count: u32) -> LiuResult<u32> {
        self.lifecycle.require_opened("inject_silence")?;
        self.engine.inject_silence(count)
    }

    /// 缓冲延迟, 单位 `1/base` 秒 (`base` 为 1 得到秒, 为输出采样率得到输出采样数)
    pub fn get_delay(&self, base: i64) -> LiuResult<i64> {
        self.lifecycle.require_active("get_delay")?;
        if base <= 0 {
            return Err(LiuError::InvalidArgument(format!("无效的延迟单位: {base}")));
        }
        Ok(self.engine.delay(base))
    }

    fn check_output(&self, out: &AudioFrame) -> LiuResult<()> {
        check_spec("输出", &self.output, out)?;
        let need = self
            .output
            .sample_format
            .plane_size(self.output.channels(), out.capacity);
        let planes = self.output.sample_format.plane_count(self.output.channels());
        if out.data.len() != planes || out.data.iter().any(|p| p.len() < need) {
            return Err(LiuError::InvalidArgument(format!(
                "输出帧缓冲不足以容纳 {} 个采样",
                out.capacity
            )));
        }
        Ok(())
    }

    fn check_input(&self, f: &AudioFrame) -> LiuResult<()> {
        check_spec("输入", &self.input, f)?;
        if !f.complete {
            return Err(LiuError::InvalidArgument("输入音频帧未完成".into()));
        }
        let need = f.valid_plane_size();
        let planes = self.input.sample_format.plane_count(self.input.channels());
        if f.data.len() != planes || f.data.iter().any(|p| p.len() < need) {
            return Err(LiuError::InvalidArgument(format!(
                "输入帧数据不足 {} 个采样",
                f.nb_samples
            )));
        }
        Ok(())
    }
}

fn check_spec(side: &str, spec: &AudioSpec, f: &AudioFrame) -> LiuResult<()> {
    let actual = AudioSpec::new(f.sample_rate, f.sample_format, f.channel_layout);
    if actual != *spec {
        return Err(LiuError::InvalidArgument(format!(
            "{side}帧格式不匹配: 期望 {spec}, 实际 {actual}"
        )));
    }
    Ok(())
}

impl Drop for MediaAudioResampler {
    fn drop(&mut self) {
        self.close();
    }
}
