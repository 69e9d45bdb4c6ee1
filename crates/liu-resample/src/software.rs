//! 内置软件重采样引擎.
//!
//! 处理顺序: 采样格式解码为 f64, 按矩阵混合到输出声道, 追加到输入采样率的
//! 缓冲, 再以线性插值生成输出采样率的采样. 源位置用整数分数表示
//! (`index + frac / frac_den`), 长时间运行也不会累积浮点误差.
//!
//! 时间戳逻辑与 libswresample 的 `swr_next_pts` 一致, 单位为
//! `1/(输入采样率 * 输出采样率)`.

use liu_core::{LiuError, LiuResult, NOPTS_VALUE};
use log::{debug, trace, warn};

use crate::convert::{read_planes, write_planes};
use crate::engine::{AudioSpec, ResampleEngine, ResampleOptions};
use crate::multichannel::{apply_mix, mix_matrix};

/// 软件重采样引擎
pub struct SoftwareResampler {
    input: Option<AudioSpec>,
    output: Option<AudioSpec>,
    options: ResampleOptions,
    /// 混合矩阵 `[输出声道][输入声道]`
    matrix: Vec<Vec<f64>>,
    /// 混合后按输入采样率排列的待处理采样, 每个输出声道一个
    fifo: Vec<Vec<f64>>,
    /// 下一个输出采样在 `fifo` 中的整数位置 (可能越过缓冲末尾)
    index: usize,
    /// 位置的小数部分, 单位 `1/frac_den` 个输入采样
    frac: u64,
    frac_den: u64,
    /// 每个输出采样前进的距离, 单位同 `frac`
    incr: u64,
    /// 剩余的补偿输出采样数
    comp_remaining: u64,
    /// 待丢弃的输出采样数
    drop_pending: u64,
    /// 下一个输出采样的时间戳
    out_pts: i64,
    first_pts: i64,
}

impl SoftwareResampler {
    pub fn new() -> Self {
        Self {
            input: None,
            output: None,
            options: ResampleOptions::default(),
            matrix: Vec::new(),
            fifo: Vec::new(),
            index: 0,
            frac: 0,
            frac_den: 1,
            incr: 1,
            comp_remaining: 0,
            drop_pending: 0,
            out_pts: 0,
            first_pts: NOPTS_VALUE,
        }
    }

    fn specs(&self) -> LiuResult<(AudioSpec, AudioSpec)> {
        match (self.input, self.output) {
            (Some(i), Some(o)) => Ok((i, o)),
            _ => Err(LiuError::InvalidState("重采样引擎尚未配置".into())),
        }
    }

    fn rates(&self) -> (u64, u64) {
        match (self.input, self.output) {
            (Some(i), Some(o)) => (u64::from(i.sample_rate), u64::from(o.sample_rate)),
            _ => (1, 1),
        }
    }

    fn buffered(&self) -> usize {
        self.fifo.first().map_or(0, Vec::len)
    }

    /// 恢复为无补偿的步长, 保留当前小数位置
    fn reset_step(&mut self) {
        let (in_rate, out_rate) = self.rates();
        self.frac = rebase_frac(self.frac, self.frac_den, out_rate);
        self.frac_den = out_rate;
        self.incr = in_rate;
        self.comp_remaining = 0;
    }

    fn advance(&mut self) {
        self.frac += self.incr;
        self.index += (self.frac / self.frac_den) as usize;
        self.frac %= self.frac_den;
        if self.comp_remaining > 0 {
            self.comp_remaining -= 1;
            if self.comp_remaining == 0 {
                self.reset_step();
            }
        }
    }
}

/// 把 `frac / old_den` 换算到分母 `new_den`; `frac < old_den` 时结果小于 `new_den`
fn rebase_frac(frac: u64, old_den: u64, new_den: u64) -> u64 {
    let scaled = u128::from(frac) * u128::from(new_den) / u128::from(old_den.max(1));
    u64::try_from(scaled).unwrap_or(new_den.saturating_sub(1))
}

/// 采样数超出 `u32` 时截到上限
fn clamp_count(samples: i64, what: &str) -> u32 {
    u32::try_from(samples).unwrap_or_else(|_| {
        warn!("{what} {samples} 个采样超出上限, 按 {} 处理", u32::MAX);
        u32::MAX
    })
}

impl Default for SoftwareResampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResampleEngine for SoftwareResampler {
    fn name(&self) -> &str {
        "software"
    }

    fn configure(
        &mut self,
        input: &AudioSpec,
        output: &AudioSpec,
        options: &ResampleOptions,
    ) -> LiuResult<()> {
        for spec in [input, output] {
            if spec.sample_rate == 0 || spec.channels() == 0 {
                return Err(LiuError::InvalidArgument(format!("无效的音频格式: {spec}")));
            }
            if spec.sample_format.bytes_per_sample() == 0 {
                return Err(LiuError::InvalidArgument(format!("无效的采样格式: {spec}")));
            }
        }
        *self = Self::new();
        self.matrix = mix_matrix(input.channel_layout, output.channel_layout);
        self.fifo = vec![Vec::new(); output.channels() as usize];
        self.input = Some(*input);
        self.output = Some(*output);
        self.options = *options;
        self.reset_step();
        debug!("配置软件重采样: {input} -> {output}");
        Ok(())
    }

    fn convert(
        &mut self,
        output: &mut [Vec<u8>],
        out_capacity: u32,
        input: Option<(&[Vec<u8>], u32)>,
    ) -> LiuResult<u32> {
        let (in_spec, out_spec) = self.specs()?;

        if let Some((planes, nb_samples)) = input {
            let decoded = read_planes(
                planes,
                in_spec.sample_format,
                in_spec.channels() as usize,
                nb_samples as usize,
            )?;
            let mixed = apply_mix(&self.matrix, &decoded);
            for (dst, src) in self.fifo.iter_mut().zip(mixed) {
                dst.extend(src);
            }
        }
        let flushing = input.is_none();

        let capacity = out_capacity as usize;
        let mut produced = vec![Vec::with_capacity(capacity); self.fifo.len()];
        let mut written = 0usize;
        loop {
            if written >= capacity && self.drop_pending == 0 {
                break;
            }
            let avail = self.buffered();
            if self.index >= avail {
                break;
            }
            if self.frac != 0 && self.index + 1 >= avail && !flushing {
                break;
            }
            if self.drop_pending > 0 {
                self.drop_pending -= 1;
            } else {
                let t = self.frac as f64 / self.frac_den as f64;
                for (dst, ch) in produced.iter_mut().zip(&self.fifo) {
                    let s0 = ch[self.index];
                    let s1 = ch.get(self.index + 1).copied().unwrap_or(s0);
                    dst.push(s0 + (s1 - s0) * t);
                }
                written += 1;
            }
            self.advance();
        }

        let consumed = self.index.min(self.buffered());
        for ch in &mut self.fifo {
            ch.drain(..consumed);
        }
        self.index -= consumed;

        write_planes(&produced, written, out_spec.sample_format, output)?;
        self.out_pts += written as i64 * i64::from(in_spec.sample_rate);
        trace!(
            "重采样输出 {written} 个采样, 缓冲剩余 {} 个输入采样",
            self.buffered()
        );
        Ok(written as u32)
    }

    fn next_pts(&mut self, pts: i64) -> i64 {
        if pts == NOPTS_VALUE {
            return self.out_pts;
        }
        let (in_rate, out_rate) = self.rates();
        if self.first_pts == NOPTS_VALUE {
            self.first_pts = pts;
            self.out_pts = pts;
        }
        let base = (in_rate * out_rate) as i64;
        let delay = self.delay(base);

        let Some(min_compensation) = self.options.min_compensation else {
            self.out_pts = pts - delay;
            return self.out_pts;
        };

        let delta = pts - delay - self.out_pts + self.drop_pending as i64 * in_rate as i64;
        let fdelta = delta as f64 / base as f64;
        if fdelta.abs() > min_compensation {
            if self.out_pts == self.first_pts || fdelta.abs() > self.options.min_hard_compensation
            {
                let result = if delta > 0 {
                    self.inject_silence(clamp_count(delta / out_rate as i64, "插入静音"))
                } else {
                    self.drop_output(clamp_count(-delta / in_rate as i64, "丢弃"))
                };
                match result {
                    Ok(n) => debug!("时间戳偏差 {fdelta:.6} 秒, 硬补偿 {n} 个采样"),
                    Err(e) => warn!("无法补偿 {fdelta:.6} 秒的时间戳偏差: {e}"),
                }
            } else if self.options.soft_compensation_duration > 0.0
                && self.options.max_soft_compensation != 0.0
            {
                let duration = (out_rate as f64 * self.options.soft_compensation_duration) as i32;
                let max_soft = if self.options.max_soft_compensation < 0.0 {
                    self.options.max_soft_compensation / -(in_rate as f64)
                } else {
                    self.options.max_soft_compensation
                };
                let comp = (fdelta.clamp(-max_soft, max_soft) * f64::from(duration)) as i32;
                debug!("时间戳漂移 {fdelta:.6} 秒, 软补偿 {comp} 个采样 / {duration}");
                if let Err(e) = self.set_compensation(comp, duration) {
                    warn!("设置软补偿失败: {e}");
                }
            }
        }
        self.out_pts
    }

    fn set_compensation(&mut self, sample_delta: i32, distance: i32) -> LiuResult<()> {
        self.specs()?;
        if distance < 0 || (distance == 0 && sample_delta != 0) {
            return Err(LiuError::InvalidArgument(format!(
                "无效的补偿距离: {distance}"
            )));
        }
        if sample_delta == 0 {
            self.reset_step();
            return Ok(());
        }
        if sample_delta >= distance {
            return Err(LiuError::InvalidArgument(format!(
                "补偿量 {sample_delta} 必须小于补偿距离 {distance}"
            )));
        }
        let (in_rate, out_rate) = self.rates();
        let distance = distance as u64;
        let new_den = out_rate * distance;
        let incr = i128::from(in_rate) * (i128::from(distance) - i128::from(sample_delta));
        let incr = u64::try_from(incr).map_err(|_| {
            LiuError::InvalidArgument(format!("补偿量 {sample_delta} 超出范围"))
        })?;
        self.frac = rebase_frac(self.frac, self.frac_den, new_den);
        self.frac_den = new_den;
        self.incr = incr;
        self.comp_remaining = distance;
        Ok(())
    }

    fn drop_output(&mut self, count: u32) -> LiuResult<u32> {
        self.specs()?;
        self.drop_pending += u64::from(count);
        Ok(count)
    }

    fn inject_silence(&mut self, count: u32) -> LiuResult<u32> {
        self.specs()?;
        let n = count as usize;
        for ch in &mut self.fifo {
            ch.try_reserve(n)
                .map_err(|e| LiuError::BadAlloc(format!("插入 {n} 个静音采样失败: {e}")))?;
            ch.resize(ch.len() + n, 0.0);
        }
        Ok(count)
    }

    fn delay(&self, base: i64) -> i64 {
        let (in_rate, _) = self.rates();
        // 单位 1/frac_den 个输入采样, 补偿期间 frac_den 可达 out_rate * distance
        let remaining = (self.buffered() as i128 - self.index as i128)
            * i128::from(self.frac_den)
            - i128::from(self.frac);
        if remaining <= 0 || base <= 0 {
            return 0;
        }
        let den = i128::from(self.frac_den) * i128::from(in_rate);
        let delay = (remaining * i128::from(base) + den / 2) / den;
        i64::try_from(delay).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liu_core::{ChannelLayout, SampleFormat};

    fn f64_mono(rate: u32) -> AudioSpec {
        AudioSpec::new(rate, SampleFormat::F64, ChannelLayout::MONO)
    }

    fn plane(values: &[f64]) -> Vec<Vec<u8>> {
        vec![values.iter().flat_map(|v| v.to_le_bytes()).collect()]
    }

    fn values(planes: &[Vec<u8>], n: usize) -> Vec<f64> {
        planes[0]
            .chunks_exact(8)
            .take(n)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }

    fn engine(in_rate: u32, out_rate: u32) -> SoftwareResampler {
        let mut e = SoftwareResampler::new();
        e.configure(&f64_mono(in_rate), &f64_mono(out_rate), &ResampleOptions::default())
            .unwrap();
        e
    }

    #[test]
    fn test_software_同采样率直通无延迟() {
        let mut e = engine(1000, 1000);
        let mut out = vec![vec![0u8; 8 * 4]];
        let n = e.convert(&mut out, 4, Some((&plane(&[0.1, 0.2, 0.3]), 3))).unwrap();
        assert_eq!(n, 3);
        assert_eq!(values(&out, 3), vec![0.1, 0.2, 0.3]);
        assert_eq!(e.delay(1000), 0);
    }

    #[test]
    fn test_software_升采样线性插值() {
        let mut e = engine(1000, 2000);
        let mut out = vec![vec![0u8; 8 * 8]];
        let n = e.convert(&mut out, 8, Some((&plane(&[0.0, 1.0]), 2))).unwrap();
        // 位置 0, 0.5, 1.0; 1.5 需要下一个输入
        assert_eq!(n, 3);
        assert_eq!(values(&out, 3), vec![0.0, 0.5, 1.0]);
        assert_eq!(e.delay(2000), 1);

        // 排空时保持最后一个采样
        let n = e.convert(&mut out, 8, None).unwrap();
        assert_eq!(n, 1);
        assert_eq!(values(&out, 1), vec![1.0]);
        assert_eq!(e.convert(&mut out, 8, None).unwrap(), 0);
    }

    #[test]
    fn test_software_输出容量不足时保留缓冲() {
        let mut e = engine(1000, 1000);
        let mut out = vec![vec![0u8; 8 * 2]];
        let input = plane(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(e.convert(&mut out, 2, Some((&input, 5))).unwrap(), 2);
        assert_eq!(e.delay(1000), 3);
        assert_eq!(e.convert(&mut out, 2, None).unwrap(), 2);
        assert_eq!(values(&out, 2), vec![3.0, 4.0]);
        assert_eq!(e.convert(&mut out, 2, None).unwrap(), 1);
        assert_eq!(e.convert(&mut out, 2, None).unwrap(), 0);
    }

    #[test]
    fn test_software_丢弃与插入静音() {
        let mut e = engine(1000, 1000);
        assert_eq!(e.drop_output(2).unwrap(), 2);
        assert_eq!(e.inject_silence(1).unwrap(), 1);
        let mut out = vec![vec![0u8; 8 * 8]];
        let n = e
            .convert(&mut out, 8, Some((&plane(&[0.5, 0.6, 0.7]), 3)))
            .unwrap();
        // 静音 + 3 个采样, 丢弃前 2 个
        assert_eq!(n, 2);
        assert_eq!(values(&out, 2), vec![0.6, 0.7]);
    }

    #[test]
    fn test_software_补偿拉伸输出() {
        let mut e = engine(1000, 1000);
        // 10 个输出采样内多输出 2 个
        e.set_compensation(2, 10).unwrap();
        let mut out = vec![vec![0u8; 8 * 32]];
        let input: Vec<f64> = (0..9).map(f64::from).collect();
        let n = e.convert(&mut out, 32, Some((&plane(&input), 9))).unwrap();
        // 前 8 个输入采样产出 10 个, 之后恢复正常步长
        assert_eq!(n, 11);
        assert!(e.set_compensation(1, 0).is_err());
        assert!(e.set_compensation(10, 10).is_err());
    }

    #[test]
    fn test_software_时间戳跟随输入() {
        let mut e = engine(1000, 2000);
        let base = 1000 * 2000;
        assert_eq!(e.next_pts(0), 0);
        let mut out = vec![vec![0u8; 8 * 16]];
        e.convert(&mut out, 16, Some((&plane(&[0.0; 4]), 4))).unwrap();
        // 输出 7 个, 缓冲 1 个输入采样的一半
        assert_eq!(e.next_pts(NOPTS_VALUE), 7 * 1000);
        assert_eq!(e.delay(base), 1000);
        assert_eq!(e.next_pts(4 * 2000), 4 * 2000 - 1000);
    }

    #[test]
    fn test_software_硬补偿插入静音() {
        let mut e = SoftwareResampler::new();
        let opts = ResampleOptions {
            min_compensation: Some(0.001),
            min_hard_compensation: 0.01,
            ..ResampleOptions::default()
        };
        e.configure(&f64_mono(1000), &f64_mono(1000), &opts).unwrap();
        let mut out = vec![vec![0u8; 8 * 256]];
        e.next_pts(0);
        assert_eq!(e.convert(&mut out, 256, Some((&plane(&[0.1; 100]), 100))).unwrap(), 100);
        // 输入跳过 50 个采样
        assert_eq!(e.next_pts(150 * 1000), 100 * 1000);
        assert_eq!(e.convert(&mut out, 256, Some((&plane(&[0.1; 100]), 100))).unwrap(), 150);
        assert_eq!(e.next_pts(250 * 1000), 250 * 1000);
    }

    #[test]
    fn test_software_格式与声道转换() {
        let mut e = SoftwareResampler::new();
        e.configure(
            &AudioSpec::new(8000, SampleFormat::F64p, ChannelLayout::STEREO),
            &AudioSpec::new(8000, SampleFormat::S16, ChannelLayout::MONO),
            &ResampleOptions::default(),
        )
        .unwrap();
        let input = vec![
            0.5f64.to_le_bytes().to_vec(),
            0.0f64.to_le_bytes().to_vec(),
        ];
        let mut out = vec![vec![0u8; 2]];
        assert_eq!(e.convert(&mut out, 1, Some((&input, 1))).unwrap(), 1);
        assert_eq!(i16::from_le_bytes([out[0][0], out[0][1]]), 8192);
    }

    #[test]
    fn test_software_未配置报错() {
        let mut e = SoftwareResampler::new();
        let mut out = vec![vec![0u8; 8]];
        assert!(e.convert(&mut out, 1, None).is_err());
        assert!(e.drop_output(1).is_err());
    }

    #[test]
    fn test_software_高采样率下连续软补偿() {
        for rate in [96_000u32, 192_000] {
            let mut e = engine(rate, rate);
            let distance = rate as i32;
            e.set_compensation(1, distance).unwrap();
            let mut out = vec![vec![0u8; 8 * 16]];
            let n = e
                .convert(&mut out, 16, Some((&plane(&[0.0, 1.0, 2.0, 3.0]), 4)))
                .unwrap();
            assert_eq!(n, 4);
            assert_ne!(e.frac, 0);

            // 上一次补偿尚未结束时再次设置
            e.set_compensation(1, distance).unwrap();
            assert!(e.frac < e.frac_den);
            assert_eq!(e.frac_den, u64::from(rate) * u64::from(rate));
            let n = e
                .convert(&mut out, 16, Some((&plane(&[4.0, 5.0, 6.0, 7.0]), 4)))
                .unwrap();
            assert_eq!(n, 4);
            let got = values(&out, 4);
            assert!(got.windows(2).all(|w| w[1] > w[0]));
            assert_eq!(e.comp_remaining, u64::from(rate) - 4);
        }
    }

    #[test]
    fn test_software_补偿结束恢复正常步长() {
        let mut e = engine(96_000, 96_000);
        e.set_compensation(1, 4).unwrap();
        let mut out = vec![vec![0u8; 8 * 16]];
        let input: Vec<f64> = (0..8).map(f64::from).collect();
        e.convert(&mut out, 16, Some((&plane(&input), 8))).unwrap();
        assert_eq!(e.frac_den, 96_000);
        assert_eq!(e.incr, 96_000);
        assert!(e.frac < e.frac_den);
    }

    #[test]
    fn test_software_超大时间戳跳变按上限丢弃() {
        let mut e = SoftwareResampler::new();
        let opts = ResampleOptions {
            min_compensation: Some(0.001),
            min_hard_compensation: 0.01,
            ..ResampleOptions::default()
        };
        e.configure(&f64_mono(96_000), &f64_mono(96_000), &opts).unwrap();
        let base = 96_000i64 * 96_000;
        // 起点在 200000 秒处, 随后时间戳回到 0
        e.next_pts(200_000 * base);
        let mut out = vec![vec![0u8; 8]];
        assert_eq!(e.convert(&mut out, 1, Some((&plane(&[0.5]), 1))).unwrap(), 1);
        e.next_pts(0);
        assert_eq!(e.drop_pending, u64::from(u32::MAX));
    }
}
