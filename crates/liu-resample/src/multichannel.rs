//! 声道混合矩阵.
//!
//! 声道顺序:
//! - 5.1: L, R, C, LFE, Ls, Rs (6ch)
//! - 7.1: L, R, C, LFE, Ls, Rs, Lsr, Rsr (8ch)
//!
//! 矩阵按 `matrix[输出声道][输入声道]` 存放系数.

use liu_core::ChannelLayout;

/// 5.1 下混到立体声的 C/Ls/Rs 系数 (1/sqrt(2))
const DOWNMIX_COEF: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// 7.1 后环绕声道下混系数
const DOWNMIX_SIDE_COEF: f64 = 0.5;

/// 立体声上混到 5.1 的 LFE 衰减
const UPMIX_LFE_COEF: f64 = 0.1;

/// 立体声上混到 5.1 的环绕声道系数
const UPMIX_SURROUND_COEF: f64 = 0.5;

/// 根据输入输出布局生成混合矩阵
///
/// - 5.1/7.1 → 立体声: L' = L + 0.707*C + 0.707*Ls (+ 0.5*Lsr)
/// - 立体声 → 5.1: C = 0.5*(L+R), LFE = 0.05*(L+R), Ls = 0.5*L, Rs = 0.5*R
/// - 单声道 → N 声道: 复制到所有声道
/// - N 声道 → 单声道: 取平均
/// - 其它: 对应声道直接映射, 多出的输出声道填静音
pub fn mix_matrix(input: ChannelLayout, output: ChannelLayout) -> Vec<Vec<f64>> {
    let src = input.channels as usize;
    let dst = output.channels as usize;
    let mut m = vec![vec![0.0; src]; dst];

    match (src, dst) {
        (s, d) if s == d => {
            for (i, row) in m.iter_mut().enumerate() {
                row[i] = 1.0;
            }
        }
        (6 | 8, 2) => {
            m[0][0] = 1.0;
            m[1][1] = 1.0;
            m[0][2] = DOWNMIX_COEF;
            m[1][2] = DOWNMIX_COEF;
            m[0][4] = DOWNMIX_COEF;
            m[1][5] = DOWNMIX_COEF;
            if src == 8 {
                m[0][6] = DOWNMIX_SIDE_COEF;
                m[1][7] = DOWNMIX_SIDE_COEF;
            }
        }
        (2, 6) => {
            m[0][0] = 1.0;
            m[1][1] = 1.0;
            m[2] = vec![0.5, 0.5];
            m[3] = vec![UPMIX_LFE_COEF * 0.5, UPMIX_LFE_COEF * 0.5];
            m[4][0] = UPMIX_SURROUND_COEF;
            m[5][1] = UPMIX_SURROUND_COEF;
        }
        (1, _) => {
            for row in &mut m {
                row[0] = 1.0;
            }
        }
        (_, 1) => {
            m[0] = vec![1.0 / src as f64; src];
        }
        _ => {
            for (i, row) in m.iter_mut().enumerate().take(src) {
                row[i] = 1.0;
            }
        }
    }
    m
}

/// 按矩阵混合每声道的采样序列
pub fn apply_mix(matrix: &[Vec<f64>], input: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let nb = input.first().map_or(0, Vec::len);
    matrix
        .iter()
        .map(|row| {
            (0..nb)
                .map(|s| {
                    row.iter()
                        .zip(input)
                        .map(|(&coef, ch)| coef * ch[s])
                        .sum()
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_51_to_stereo() {
        let m = mix_matrix(ChannelLayout::SURROUND_5_1, ChannelLayout::STEREO);
        // L=0, R=0.1, C=0.2, LFE=0.3, Ls=0.4, Rs=0.5
        let input: Vec<Vec<f64>> = (0..6).map(|c| vec![c as f64 * 0.1]).collect();
        let out = apply_mix(&m, &input);
        // out_l = 0.707*0.2 + 0.707*0.4 ≈ 0.424
        assert!(out[0][0] > 0.42 && out[0][0] < 0.43);
        // out_r = 0.1 + 0.707*0.2 + 0.707*0.5 ≈ 0.595
        assert!(out[1][0] > 0.59 && out[1][0] < 0.6);
    }

    #[test]
    fn test_downmix_71_包含后环绕() {
        let m = mix_matrix(ChannelLayout::SURROUND_7_1, ChannelLayout::STEREO);
        assert_eq!(m[0][6], DOWNMIX_SIDE_COEF);
        assert_eq!(m[1][7], DOWNMIX_SIDE_COEF);
        assert_eq!(m[0][3], 0.0);
    }

    #[test]
    fn test_upmix_stereo_to_51() {
        let m = mix_matrix(ChannelLayout::STEREO, ChannelLayout::SURROUND_5_1);
        let out = apply_mix(&m, &[vec![1.0], vec![0.0]]);
        let first: Vec<f64> = out.iter().map(|c| c[0]).collect();
        assert_eq!(first[0], 1.0);
        assert_eq!(first[1], 0.0);
        assert!((first[2] - 0.5).abs() < 1e-9);
        assert!((first[3] - 0.05).abs() < 1e-9);
        assert!((first[4] - 0.5).abs() < 1e-9);
        assert_eq!(first[5], 0.0);
    }

    #[test]
    fn test_mono_stereo_互转() {
        let up = apply_mix(
            &mix_matrix(ChannelLayout::MONO, ChannelLayout::STEREO),
            &[vec![0.25, -0.5]],
        );
        assert_eq!(up, vec![vec![0.25, -0.5], vec![0.25, -0.5]]);
        let down = apply_mix(
            &mix_matrix(ChannelLayout::STEREO, ChannelLayout::MONO),
            &[vec![0.2], vec![0.6]],
        );
        assert!((down[0][0] - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_静音保持静音() {
        let m = mix_matrix(ChannelLayout::SURROUND_5_1, ChannelLayout::STEREO);
        let out = apply_mix(&m, &vec![vec![0.0; 10]; 6]);
        assert!(out.iter().flatten().all(|&v| v == 0.0));
    }
}
