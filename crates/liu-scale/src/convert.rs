//! 像素格式转换.
//!
//! 所有转换都经过全分辨率的分量平面: YUV 族 (含灰度) 展开为 4:4:4 的 Y/U/V,
//! RGB 族展开为 R/G/B/A. 同族之间只做子采样或重排, 跨族时逐像素做色彩变换.
//!
//! 使用 BT.601 标准色彩矩阵:
//! ```text
//! Y  =  0.299 * R + 0.587 * G + 0.114 * B
//! Cb = -0.169 * R - 0.331 * G + 0.500 * B + 128
//! Cr =  0.500 * R - 0.419 * G - 0.081 * B + 128
//! ```

use liu_core::{LiuError, LiuResult, PixelFormat};

// BT.601 定点系数 (缩放 256 倍)
const Y_R: i32 = 77;
const Y_G: i32 = 150;
const Y_B: i32 = 29;
const CB_R: i32 = -43;
const CB_G: i32 = -85;
const CB_B: i32 = 128;
const CR_R: i32 = 128;
const CR_G: i32 = -107;
const CR_B: i32 = -21;

/// 全分辨率分量平面, 每个 Vec 为 `width * height` 字节
enum Components {
    Yuv {
        y: Vec<u8>,
        u: Vec<u8>,
        v: Vec<u8>,
    },
    Rgb {
        r: Vec<u8>,
        g: Vec<u8>,
        b: Vec<u8>,
        a: Vec<u8>,
    },
}

impl Components {
    fn into_yuv(self) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        match self {
            Self::Yuv { y, u, v } => (y, u, v),
            Self::Rgb { r, g, b, .. } => {
                let n = r.len();
                let (mut y, mut u, mut v) = (vec![0; n], vec![0; n], vec![0; n]);
                for i in 0..n {
                    let (yy, uu, vv) = rgb_to_yuv(r[i], g[i], b[i]);
                    y[i] = yy;
                    u[i] = uu;
                    v[i] = vv;
                }
                (y, u, v)
            }
        }
    }

    fn into_rgb(self) -> (Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>) {
        match self {
            Self::Rgb { r, g, b, a } => (r, g, b, a),
            Self::Yuv { y, u, v } => {
                let n = y.len();
                let (mut r, mut g, mut b) = (vec![0; n], vec![0; n], vec![0; n]);
                for i in 0..n {
                    let (rr, gg, bb) = yuv_to_rgb(y[i], u[i], v[i]);
                    r[i] = rr;
                    g[i] = gg;
                    b[i] = bb;
                }
                (r, g, b, vec![255; n])
            }
        }
    }
}

fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    let y = ((Y_R * r + Y_G * g + Y_B * b + 128) >> 8).clamp(0, 255);
    let cb = (((CB_R * r + CB_G * g + CB_B * b + 128) >> 8) + 128).clamp(0, 255);
    let cr = (((CR_R * r + CR_G * g + CR_B * b + 128) >> 8) + 128).clamp(0, 255);
    (y as u8, cb as u8, cr as u8)
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = i32::from(y);
    let u = i32::from(u) - 128;
    let v = i32::from(v) - 128;
    let r = (y + ((v * 359 + 128) >> 8)).clamp(0, 255);
    let g = (y - ((u * 88 + v * 183 + 128) >> 8)).clamp(0, 255);
    let b = (y + ((u * 454 + 128) >> 8)).clamp(0, 255);
    (r as u8, g as u8, b as u8)
}

/// 打包 RGB 格式中 R/G/B/A 分量的字节偏移
fn rgb_offsets(format: PixelFormat) -> Option<([usize; 3], Option<usize>)> {
    match format {
        PixelFormat::Rgb24 => Some(([0, 1, 2], None)),
        PixelFormat::Bgr24 => Some(([2, 1, 0], None)),
        PixelFormat::Rgba => Some(([0, 1, 2], Some(3))),
        PixelFormat::Bgra => Some(([2, 1, 0], Some(3))),
        _ => None,
    }
}

/// 转换同尺寸图像的像素格式, 调用方保证缓冲大小有效
#[allow(clippy::too_many_arguments)]
pub(crate) fn convert(
    src: &[&[u8]],
    src_linesize: &[usize],
    src_format: PixelFormat,
    dst: &mut [&mut [u8]],
    dst_linesize: &[usize],
    dst_format: PixelFormat,
    width: u32,
    height: u32,
) -> LiuResult<()> {
    let (w, h) = (width as usize, height as usize);
    let comps = unpack(src, src_linesize, src_format, w, h)?;
    pack(comps, dst, dst_linesize, dst_format, w, h)
}

fn unpack(
    src: &[&[u8]],
    linesize: &[usize],
    format: PixelFormat,
    w: usize,
    h: usize,
) -> LiuResult<Components> {
    let n = w * h;
    let luma = |plane: &[u8], stride: usize| {
        let mut out = Vec::with_capacity(n);
        for row in 0..h {
            out.extend_from_slice(&plane[row * stride..row * stride + w]);
        }
        out
    };

    match format {
        PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p => {
            let (sub_h, sub_v) = format.chroma_subsampling();
            let y = luma(src[0], linesize[0]);
            let mut u = Vec::with_capacity(n);
            let mut v = Vec::with_capacity(n);
            for row in 0..h {
                let ur = (row >> sub_v) * linesize[1];
                let vr = (row >> sub_v) * linesize[2];
                for col in 0..w {
                    u.push(src[1][ur + (col >> sub_h)]);
                    v.push(src[2][vr + (col >> sub_h)]);
                }
            }
            Ok(Components::Yuv { y, u, v })
        }
        PixelFormat::Nv12 => {
            let y = luma(src[0], linesize[0]);
            let mut u = Vec::with_capacity(n);
            let mut v = Vec::with_capacity(n);
            for row in 0..h {
                let uv_row = (row >> 1) * linesize[1];
                for col in 0..w {
                    let off = uv_row + (col >> 1) * 2;
                    u.push(src[1][off]);
                    v.push(src[1][off + 1]);
                }
            }
            Ok(Components::Yuv { y, u, v })
        }
        PixelFormat::Gray8 => Ok(Components::Yuv {
            y: luma(src[0], linesize[0]),
            u: vec![128; n],
            v: vec![128; n],
        }),
        _ => {
            let (offsets, alpha) = rgb_offsets(format)
                .ok_or_else(|| LiuError::Unsupported(format!("不支持的源像素格式: {format}")))?;
            let bpp = format.bytes_per_pixel();
            let mut ch = [
                Vec::with_capacity(n),
                Vec::with_capacity(n),
                Vec::with_capacity(n),
            ];
            let mut a = Vec::with_capacity(n);
            for row in 0..h {
                for col in 0..w {
                    let px = row * linesize[0] + col * bpp;
                    for (dst, off) in ch.iter_mut().zip(offsets) {
                        dst.push(src[0][px + off]);
                    }
                    a.push(alpha.map_or(255, |off| src[0][px + off]));
                }
            }
            let [r, g, b] = ch;
            Ok(Components::Rgb { r, g, b, a })
        }
    }
}

fn pack(
    comps: Components,
    dst: &mut [&mut [u8]],
    linesize: &[usize],
    format: PixelFormat,
    w: usize,
    h: usize,
) -> LiuResult<()> {
    let write_luma = |plane: &mut [u8], stride: usize, y: &[u8]| {
        for row in 0..h {
            plane[row * stride..row * stride + w].copy_from_slice(&y[row * w..(row + 1) * w]);
        }
    };

    match format {
        PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p => {
            let (sub_h, sub_v) = format.chroma_subsampling();
            let (y, u, v) = comps.into_yuv();
            write_luma(&mut *dst[0], linesize[0], &y);
            subsample(&u, w, h, sub_h, sub_v, |cy, cx, val| {
                dst[1][cy * linesize[1] + cx] = val;
            });
            subsample(&v, w, h, sub_h, sub_v, |cy, cx, val| {
                dst[2][cy * linesize[2] + cx] = val;
            });
            Ok(())
        }
        PixelFormat::Nv12 => {
            let (y, u, v) = comps.into_yuv();
            write_luma(&mut *dst[0], linesize[0], &y);
            subsample(&u, w, h, 1, 1, |cy, cx, val| {
                dst[1][cy * linesize[1] + cx * 2] = val;
            });
            subsample(&v, w, h, 1, 1, |cy, cx, val| {
                dst[1][cy * linesize[1] + cx * 2 + 1] = val;
            });
            Ok(())
        }
        PixelFormat::Gray8 => {
            let (y, _, _) = comps.into_yuv();
            write_luma(&mut *dst[0], linesize[0], &y);
            Ok(())
        }
        _ => {
            let (offsets, alpha) = rgb_offsets(format)
                .ok_or_else(|| LiuError::Unsupported(format!("不支持的目标像素格式: {format}")))?;
            let bpp = format.bytes_per_pixel();
            let (r, g, b, a) = comps.into_rgb();
            for row in 0..h {
                for col in 0..w {
                    let i = row * w + col;
                    let px = row * linesize[0] + col * bpp;
                    dst[0][px + offsets[0]] = r[i];
                    dst[0][px + offsets[1]] = g[i];
                    dst[0][px + offsets[2]] = b[i];
                    if let Some(off) = alpha {
                        dst[0][px + off] = a[i];
                    }
                }
            }
            Ok(())
        }
    }
}

/// 按 `(1 << sub_h) x (1 << sub_v)` 块取平均, 奇数尺寸的边缘块只统计有效像素
fn subsample(
    plane: &[u8],
    w: usize,
    h: usize,
    sub_h: u32,
    sub_v: u32,
    mut put: impl FnMut(usize, usize, u8),
) {
    let bw = 1usize << sub_h;
    let bh = 1usize << sub_v;
    for cy in 0..h.div_ceil(bh) {
        for cx in 0..w.div_ceil(bw) {
            let mut sum = 0u32;
            let mut count = 0u32;
            for row in cy * bh..((cy + 1) * bh).min(h) {
                for col in cx * bw..((cx + 1) * bw).min(w) {
                    sum += u32::from(plane[row * w + col]);
                    count += 1;
                }
            }
            put(cy, cx, ((sum + count / 2) / count) as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_rgb24(w: usize, h: usize, px: [u8; 3]) -> Vec<u8> {
        px.repeat(w * h)
    }

    #[test]
    fn test_convert_rgb24_to_yuv420p_纯红() {
        let rgb = solid_rgb24(4, 4, [255, 0, 0]);
        let mut y = vec![0u8; 16];
        let mut u = vec![0u8; 4];
        let mut v = vec![0u8; 4];
        convert(
            &[&rgb],
            &[12],
            PixelFormat::Rgb24,
            &mut [&mut y, &mut u, &mut v],
            &[4, 2, 2],
            PixelFormat::Yuv420p,
            4,
            4,
        )
        .unwrap();
        assert!(y.iter().all(|&p| p == 77));
        assert!(u.iter().all(|&p| p == 85));
        assert!(v.iter().all(|&p| p == 255));
    }

    #[test]
    fn test_convert_绿色亮度() {
        let rgb = solid_rgb24(2, 2, [0, 255, 0]);
        let mut gray = vec![0u8; 4];
        convert(
            &[&rgb],
            &[6],
            PixelFormat::Rgb24,
            &mut [&mut gray],
            &[2],
            PixelFormat::Gray8,
            2,
            2,
        )
        .unwrap();
        assert!(gray.iter().all(|&p| p == 149), "{gray:?}");
    }

    #[test]
    fn test_convert_灰度扩展到bgra() {
        let gray = [0u8, 100, 200, 255];
        let mut bgra = vec![0u8; 16];
        convert(
            &[&gray],
            &[2],
            PixelFormat::Gray8,
            &mut [&mut bgra],
            &[8],
            PixelFormat::Bgra,
            2,
            2,
        )
        .unwrap();
        assert_eq!(&bgra[4..8], &[100, 100, 100, 255]);
        assert_eq!(&bgra[12..16], &[255, 255, 255, 255]);
    }

    #[test]
    fn test_convert_rgba_to_bgr24_交换分量() {
        let rgba = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut bgr = vec![0u8; 6];
        convert(
            &[&rgba],
            &[8],
            PixelFormat::Rgba,
            &mut [&mut bgr],
            &[6],
            PixelFormat::Bgr24,
            2,
            1,
        )
        .unwrap();
        assert_eq!(bgr, vec![3, 2, 1, 7, 6, 5]);
    }

    #[test]
    fn test_convert_nv12_yuv420p_无损往返() {
        let y: Vec<u8> = (0..16).collect();
        let uv = [10u8, 20, 30, 40, 50, 60, 70, 80];
        let mut py = vec![0u8; 16];
        let mut pu = vec![0u8; 4];
        let mut pv = vec![0u8; 4];
        convert(
            &[&y, &uv],
            &[4, 4],
            PixelFormat::Nv12,
            &mut [&mut py, &mut pu, &mut pv],
            &[4, 2, 2],
            PixelFormat::Yuv420p,
            4,
            4,
        )
        .unwrap();
        assert_eq!(py, y);
        assert_eq!(pu, vec![10, 30, 50, 70]);
        assert_eq!(pv, vec![20, 40, 60, 80]);

        let mut back_y = vec![0u8; 16];
        let mut back_uv = vec![0u8; 8];
        convert(
            &[&py, &pu, &pv],
            &[4, 2, 2],
            PixelFormat::Yuv420p,
            &mut [&mut back_y, &mut back_uv],
            &[4, 4],
            PixelFormat::Nv12,
            4,
            4,
        )
        .unwrap();
        assert_eq!(back_uv, uv);
    }

    #[test]
    fn test_convert_奇数尺寸色度取有效像素均值() {
        // 3x1 的 YUV444P -> YUV420P: 色度宽 2, 第二块只有一个像素
        let y = [0u8; 3];
        let u = [10u8, 20, 90];
        let v = [128u8; 3];
        let mut oy = vec![0u8; 3];
        let mut ou = vec![0u8; 2];
        let mut ov = vec![0u8; 2];
        convert(
            &[&y, &u, &v],
            &[3, 3, 3],
            PixelFormat::Yuv444p,
            &mut [&mut oy, &mut ou, &mut ov],
            &[3, 2, 2],
            PixelFormat::Yuv420p,
            3,
            1,
        )
        .unwrap();
        assert_eq!(ou, vec![15, 90]);
    }
}
