//! 采样字节与归一化 f64 之间的转换.
//!
//! 交错格式只有一个平面, 所有声道交替排列; 平面格式每个声道一个平面.

use liu_core::{LiuError, LiuResult, SampleFormat};

/// 把音频平面解码为每声道一个的 f64 序列 (-1.0 ~ 1.0)
pub(crate) fn read_planes(
    planes: &[Vec<u8>],
    format: SampleFormat,
    channels: usize,
    nb_samples: usize,
) -> LiuResult<Vec<Vec<f64>>> {
    let bps = format.bytes_per_sample();
    if bps == 0 {
        return Err(LiuError::InvalidArgument("无效的采样格式".into()));
    }
    let mut out = vec![Vec::with_capacity(nb_samples); channels];

    if format.is_planar() {
        if planes.len() < channels {
            return Err(LiuError::InvalidArgument(format!(
                "平面数不足: 期望 {channels}, 实际 {}",
                planes.len()
            )));
        }
        for (ch, dst) in out.iter_mut().enumerate() {
            let plane = &planes[ch];
            check_len(plane, nb_samples * bps)?;
            for s in 0..nb_samples {
                dst.push(decode_sample(&plane[s * bps..(s + 1) * bps], format)?);
            }
        }
    } else {
        let plane = planes
            .first()
            .ok_or_else(|| LiuError::InvalidArgument("缺少音频数据平面".into()))?;
        check_len(plane, nb_samples * channels * bps)?;
        for s in 0..nb_samples {
            for (ch, dst) in out.iter_mut().enumerate() {
                let offset = (s * channels + ch) * bps;
                dst.push(decode_sample(&plane[offset..offset + bps], format)?);
            }
        }
    }
    Ok(out)
}

/// 把每声道的 f64 序列编码写入音频平面的开头
pub(crate) fn write_planes(
    samples: &[Vec<f64>],
    nb_samples: usize,
    format: SampleFormat,
    planes: &mut [Vec<u8>],
) -> LiuResult<()> {
    let bps = format.bytes_per_sample();
    let channels = samples.len();
    if format.is_planar() {
        if planes.len() < channels {
            return Err(LiuError::InvalidArgument(format!(
                "输出平面数不足: 期望 {channels}, 实际 {}",
                planes.len()
            )));
        }
        for (src, plane) in samples.iter().zip(planes.iter_mut()) {
            check_len(plane, nb_samples * bps)?;
            for (s, &v) in src.iter().take(nb_samples).enumerate() {
                encode_sample(v, format, &mut plane[s * bps..(s + 1) * bps])?;
            }
        }
    } else {
        let plane = planes
            .first_mut()
            .ok_or_else(|| LiuError::InvalidArgument("缺少输出数据平面".into()))?;
        check_len(plane, nb_samples * channels * bps)?;
        for s in 0..nb_samples {
            for (ch, src) in samples.iter().enumerate() {
                let offset = (s * channels + ch) * bps;
                encode_sample(src[s], format, &mut plane[offset..offset + bps])?;
            }
        }
    }
    Ok(())
}

fn check_len(plane: &[u8], expected: usize) -> LiuResult<()> {
    if plane.len() < expected {
        return Err(LiuError::InvalidArgument(format!(
            "数据不足: 期望 {expected} 字节, 实际 {} 字节",
            plane.len()
        )));
    }
    Ok(())
}

/// 将原始字节解码为归一化 f64 样本
fn decode_sample(data: &[u8], format: SampleFormat) -> LiuResult<f64> {
    match format.to_interleaved() {
        SampleFormat::U8 => Ok((f64::from(data[0]) - 128.0) / 128.0),
        SampleFormat::S16 => {
            let v = i16::from_le_bytes([data[0], data[1]]);
            Ok(f64::from(v) / 32768.0)
        }
        SampleFormat::S32 => {
            let v = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
            Ok(f64::from(v) / 2_147_483_648.0)
        }
        SampleFormat::F32 => {
            let v = f32::from_le_bytes([data[0], data[1], data[2], data[3]]);
            Ok(f64::from(v))
        }
        SampleFormat::F64 => {
            let v = f64::from_le_bytes([
                data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
            ]);
            Ok(v)
        }
        _ => Err(LiuError::Unsupported(format!("不支持的采样格式: {format}"))),
    }
}

/// 将归一化 f64 样本编码到 `out`
fn encode_sample(value: f64, format: SampleFormat, out: &mut [u8]) -> LiuResult<()> {
    match format.to_interleaved() {
        SampleFormat::U8 => {
            out[0] = ((value * 128.0) + 128.0).round().clamp(0.0, 255.0) as u8;
        }
        SampleFormat::S16 => {
            let v = (value * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
            out.copy_from_slice(&v.to_le_bytes());
        }
        SampleFormat::S32 => {
            let v = (value * 2_147_483_648.0)
                .round()
                .clamp(-2_147_483_648.0, 2_147_483_647.0) as i32;
            out.copy_from_slice(&v.to_le_bytes());
        }
        SampleFormat::F32 => {
            out.copy_from_slice(&(value as f32).to_le_bytes());
        }
        SampleFormat::F64 => {
            out.copy_from_slice(&value.to_le_bytes());
        }
        _ => {
            return Err(LiuError::Unsupported(format!("不支持的采样格式: {format}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_s16_交错解码() {
        let mut plane = Vec::new();
        for v in [16384i16, -16384, 0, 32767] {
            plane.extend_from_slice(&v.to_le_bytes());
        }
        let ch = read_planes(&[plane], SampleFormat::S16, 2, 2).unwrap();
        assert_eq!(ch[0], vec![0.5, 0.0]);
        assert_eq!(ch[1][0], -0.5);
    }

    #[test]
    fn test_convert_平面格式往返() {
        let samples = vec![vec![0.25, -1.0], vec![0.5, 0.75]];
        let mut planes = vec![vec![0u8; 16]; 2];
        write_planes(&samples, 2, SampleFormat::F64p, &mut planes).unwrap();
        let back = read_planes(&planes, SampleFormat::F64p, 2, 2).unwrap();
        assert_eq!(back, samples);
    }

    #[test]
    fn test_convert_饱和截断() {
        let mut planes = vec![vec![0u8; 4]];
        write_planes(&[vec![1.0, -2.0]], 2, SampleFormat::S16, &mut planes).unwrap();
        assert_eq!(i16::from_le_bytes([planes[0][0], planes[0][1]]), 32767);
        assert_eq!(i16::from_le_bytes([planes[0][2], planes[0][3]]), -32768);

        let mut planes = vec![vec![0u8; 1]];
        write_planes(&[vec![0.0]], 1, SampleFormat::U8, &mut planes).unwrap();
        assert_eq!(planes[0][0], 128);
    }

    #[test]
    fn test_convert_数据不足报错() {
        let r = read_planes(&[vec![0u8; 3]], SampleFormat::S16, 1, 2);
        assert!(matches!(r, Err(LiuError::InvalidArgument(_))));
    }
}
