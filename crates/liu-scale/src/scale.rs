//! 图像缩放算法实现.
//!
//! 源和目标像素格式必须相同, 每个平面独立缩放; 格式转换在缩放前后单独进行.
//! 目标图像按行并行处理.
//!
//! 支持的算法:
//! - **最近邻** (`NearestNeighbor`): 速度最快, 适合像素艺术/整数倍缩放
//! - **双线性** (`Bilinear`): 8 位定点权重
//! - **双三次** (`Bicubic`): Catmull-Rom 核, 4x4 采样
//! - **区域平均** (`Area`): 按覆盖面积加权, 缩小时不产生混叠

use liu_core::{LiuResult, PixelFormat};
use rayon::prelude::*;

use crate::ScaleAlgorithm;

/// 指定平面的像素尺寸
pub(crate) fn plane_dims(format: PixelFormat, plane: usize, width: u32, height: u32) -> (usize, usize) {
    let bpp = plane_bpp(format, plane);
    let w = format.plane_linesize(plane, width).unwrap_or(0) / bpp.max(1);
    let h = format.plane_height(plane, height).unwrap_or(0);
    (w, h)
}

/// 指定平面每像素的字节数
pub(crate) fn plane_bpp(format: PixelFormat, plane: usize) -> usize {
    match (format, plane) {
        (PixelFormat::Nv12, 1) => 2,
        (f, _) if f.is_yuv() => 1,
        (f, _) => f.bytes_per_pixel(),
    }
}

/// 执行图像缩放, 调用方保证平面数量与缓冲大小有效
#[allow(clippy::too_many_arguments)]
pub(crate) fn scale_image(
    src_data: &[&[u8]],
    src_linesize: &[usize],
    src_width: u32,
    src_height: u32,
    format: PixelFormat,
    dst_data: &mut [&mut [u8]],
    dst_linesize: &[usize],
    dst_width: u32,
    dst_height: u32,
    algorithm: ScaleAlgorithm,
) -> LiuResult<()> {
    for plane in 0..format.plane_count() {
        let (sw, sh) = plane_dims(format, plane, src_width, src_height);
        let (dw, dh) = plane_dims(format, plane, dst_width, dst_height);
        let src = PlaneRef {
            data: src_data[plane],
            stride: src_linesize[plane],
            width: sw,
            height: sh,
        };
        let dst = PlaneMut {
            data: &mut *dst_data[plane],
            stride: dst_linesize[plane],
            width: dw,
            height: dh,
        };
        scale_plane(&src, dst, plane_bpp(format, plane), algorithm);
    }
    Ok(())
}

struct PlaneRef<'a> {
    data: &'a [u8],
    stride: usize,
    width: usize,
    height: usize,
}

struct PlaneMut<'a> {
    data: &'a mut [u8],
    stride: usize,
    width: usize,
    height: usize,
}

fn scale_plane(src: &PlaneRef<'_>, dst: PlaneMut<'_>, bpp: usize, algorithm: ScaleAlgorithm) {
    if src.width == dst.width && src.height == dst.height {
        copy_plane(src, dst, bpp);
        return;
    }
    match algorithm {
        ScaleAlgorithm::NearestNeighbor => scale_plane_nearest(src, dst, bpp),
        ScaleAlgorithm::Bilinear => scale_plane_bilinear(src, dst, bpp),
        ScaleAlgorithm::Bicubic => {
            let hx = cubic_taps(dst.width, src.width);
            let vy = cubic_taps(dst.height, src.height);
            scale_plane_taps(src, dst, bpp, &hx, &vy);
        }
        ScaleAlgorithm::Area => {
            let hx = area_taps(dst.width, src.width);
            let vy = area_taps(dst.height, src.height);
            scale_plane_taps(src, dst, bpp, &hx, &vy);
        }
    }
}

fn copy_plane(src: &PlaneRef<'_>, dst: PlaneMut<'_>, bpp: usize) {
    let row_bytes = src.width * bpp;
    dst.data
        .par_chunks_mut(dst.stride)
        .take(dst.height)
        .enumerate()
        .for_each(|(row, out)| {
            let start = row * src.stride;
            out[..row_bytes].copy_from_slice(&src.data[start..start + row_bytes]);
        });
}

// ============================================================
// 最近邻插值
// ============================================================

/// 每个目标像素直接取源图像中最近的像素
fn scale_plane_nearest(src: &PlaneRef<'_>, dst: PlaneMut<'_>, bpp: usize) {
    let (sw, sh) = (src.width, src.height);
    let (dw, dh) = (dst.width, dst.height);
    let cols: Vec<usize> = (0..dw).map(|dx| ((dx * sw) / dw).min(sw - 1)).collect();

    dst.data
        .par_chunks_mut(dst.stride)
        .take(dh)
        .enumerate()
        .for_each(|(dy, out)| {
            let sy = ((dy * sh) / dh).min(sh - 1);
            let src_row = sy * src.stride;
            for (dx, &sx) in cols.iter().enumerate() {
                let s = src_row + sx * bpp;
                out[dx * bpp..(dx + 1) * bpp].copy_from_slice(&src.data[s..s + bpp]);
            }
        });
}

// ============================================================
// 双线性插值
// ============================================================

/// 双线性插值缩放单个平面
///
/// ```text
/// (x0,y0)---t-----(x1,y0)
///    |              |
///    s    (x,y)     |
///    |              |
/// (x0,y1)---------(x1,y1)
/// ```
///
/// 权重使用 8 位定点数, 四个权重之和为 65536.
fn scale_plane_bilinear(src: &PlaneRef<'_>, dst: PlaneMut<'_>, bpp: usize) {
    let h_map: Vec<(usize, usize, u32)> = (0..dst.width)
        .map(|dx| map_coord(dx, dst.width, src.width))
        .collect();
    let (dw, dh) = (dst.width, dst.height);

    dst.data
        .par_chunks_mut(dst.stride)
        .take(dh)
        .enumerate()
        .for_each(|(dy, out)| {
            let (sy0, sy1, frac_y) = map_coord(dy, dh, src.height);
            let inv_y = 256 - frac_y;
            let src_row0 = sy0 * src.stride;
            let src_row1 = sy1 * src.stride;

            for (dx, &(sx0, sx1, frac_x)) in h_map.iter().enumerate().take(dw) {
                let inv_x = 256 - frac_x;
                let w00 = inv_x * inv_y;
                let w10 = frac_x * inv_y;
                let w01 = inv_x * frac_y;
                let w11 = frac_x * frac_y;

                let off00 = src_row0 + sx0 * bpp;
                let off10 = src_row0 + sx1 * bpp;
                let off01 = src_row1 + sx0 * bpp;
                let off11 = src_row1 + sx1 * bpp;

                for c in 0..bpp {
                    let v = (u32::from(src.data[off00 + c]) * w00
                        + u32::from(src.data[off10 + c]) * w10
                        + u32::from(src.data[off01 + c]) * w01
                        + u32::from(src.data[off11 + c]) * w11
                        + 32768)
                        >> 16;
                    out[dx * bpp + c] = v as u8;
                }
            }
        });
}

/// 目标坐标到源坐标的中心对齐映射
///
/// 返回 `(idx0, idx1, frac)`, `frac` 为 0..256 的定点小数.
#[inline]
fn map_coord(dst_idx: usize, dst_size: usize, src_size: usize) -> (usize, usize, u32) {
    let src_pos_256 =
        ((dst_idx as u64 * 2 + 1) * src_size as u64 * 128 / dst_size as u64).saturating_sub(128);

    let idx0 = (src_pos_256 >> 8) as usize;
    let frac = (src_pos_256 & 0xFF) as u32;
    let max_idx = src_size.saturating_sub(1);
    let idx1 = (idx0 + 1).min(max_idx);
    let idx0 = idx0.min(max_idx);

    (idx0, idx1, frac)
}

// ============================================================
// 可分离滤波 (双三次 / 区域平均)
// ============================================================

/// 每个目标坐标的 (源索引, 权重) 列表, 权重之和为 1
type Taps = Vec<Vec<(usize, f32)>>;

/// Catmull-Rom 核 (a = -0.5)
fn cubic(x: f64) -> f64 {
    const A: f64 = -0.5;
    let x = x.abs();
    if x <= 1.0 {
        (A + 2.0) * x * x * x - (A + 3.0) * x * x + 1.0
    } else if x < 2.0 {
        A * x * x * x - 5.0 * A * x * x + 8.0 * A * x - 4.0 * A
    } else {
        0.0
    }
}

fn cubic_taps(dst_size: usize, src_size: usize) -> Taps {
    let ratio = src_size as f64 / dst_size as f64;
    let max_idx = src_size as i64 - 1;
    (0..dst_size)
        .map(|d| {
            let pos = (d as f64 + 0.5) * ratio - 0.5;
            let base = pos.floor();
            let taps: Vec<(usize, f64)> = (-1..=2)
                .map(|k| {
                    let idx = (base as i64 + k).clamp(0, max_idx) as usize;
                    (idx, cubic(base + k as f64 - pos))
                })
                .collect();
            normalize(taps)
        })
        .collect()
}

fn area_taps(dst_size: usize, src_size: usize) -> Taps {
    let ratio = src_size as f64 / dst_size as f64;
    (0..dst_size)
        .map(|d| {
            let start = d as f64 * ratio;
            let end = (d as f64 + 1.0) * ratio;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_size);
            let taps: Vec<(usize, f64)> = (first..last)
                .filter_map(|i| {
                    let cover = end.min(i as f64 + 1.0) - start.max(i as f64);
                    (cover > 0.0).then_some((i, cover))
                })
                .collect();
            normalize(taps)
        })
        .collect()
}

fn normalize(taps: Vec<(usize, f64)>) -> Vec<(usize, f32)> {
    let sum: f64 = taps.iter().map(|&(_, w)| w).sum();
    if sum == 0.0 {
        return taps.into_iter().map(|(i, _)| (i, 0.0)).collect();
    }
    taps.into_iter().map(|(i, w)| (i, (w / sum) as f32)).collect()
}

fn scale_plane_taps(src: &PlaneRef<'_>, dst: PlaneMut<'_>, bpp: usize, hx: &Taps, vy: &Taps) {
    let dh = dst.height;
    dst.data
        .par_chunks_mut(dst.stride)
        .take(dh)
        .enumerate()
        .for_each(|(dy, out)| {
            let rows = &vy[dy];
            for (dx, cols) in hx.iter().enumerate() {
                for c in 0..bpp {
                    let mut acc = 0f32;
                    for &(sy, wy) in rows {
                        let row = sy * src.stride;
                        let mut line = 0f32;
                        for &(sx, wx) in cols {
                            line += f32::from(src.data[row + sx * bpp + c]) * wx;
                        }
                        acc += line * wy;
                    }
                    out[dx * bpp + c] = acc.round().clamp(0.0, 255.0) as u8;
                }
            }
        });
}
