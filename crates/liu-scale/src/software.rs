//! 内置软件缩放引擎.
//!
//! 源和目标格式相同时直接逐平面缩放; 尺寸相同时只做格式转换;
//! 两者都不同时先在源尺寸下转换到目标格式, 再缩放.

use liu_core::{LiuError, LiuResult, PixelFormat};
use log::debug;

use crate::ScaleAlgorithm;
use crate::convert::convert;
use crate::engine::{PictureSpec, ScaleEngine};
use crate::scale::scale_image;

/// 软件缩放引擎
#[derive(Debug, Default)]
pub struct SoftwareScaler {
    config: Option<(PictureSpec, PictureSpec, ScaleAlgorithm)>,
}

impl SoftwareScaler {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 检查图像缓冲能容纳给定格式与尺寸
fn check_image(side: &str, lens: &[usize], linesize: &[usize], spec: &PictureSpec) -> LiuResult<()> {
    let format = spec.pixel_format;
    let planes = format.plane_count();
    if lens.len() < planes || linesize.len() < planes {
        return Err(LiuError::InvalidArgument(format!(
            "{side}图像平面数不足: 期望 {planes}, 实际 {}",
            lens.len().min(linesize.len())
        )));
    }
    for p in 0..planes {
        let row_bytes = format.plane_linesize(p, spec.width).unwrap_or(0);
        let rows = format.plane_height(p, spec.height).unwrap_or(0);
        if linesize[p] < row_bytes {
            return Err(LiuError::InvalidArgument(format!(
                "{side}平面 {p} 行宽 {} 小于 {row_bytes}",
                linesize[p]
            )));
        }
        let need = linesize[p] * rows.saturating_sub(1) + row_bytes;
        if lens[p] < need {
            return Err(LiuError::InvalidArgument(format!(
                "{side}平面 {p} 数据不足: 需要 {need} 字节, 实际 {} 字节",
                lens[p]
            )));
        }
    }
    Ok(())
}

impl ScaleEngine for SoftwareScaler {
    fn name(&self) -> &str {
        "software"
    }

    fn configure(
        &mut self,
        input: &PictureSpec,
        output: &PictureSpec,
        algorithm: ScaleAlgorithm,
    ) -> LiuResult<()> {
        for spec in [input, output] {
            if spec.width == 0 || spec.height == 0 || spec.pixel_format == PixelFormat::None {
                return Err(LiuError::InvalidArgument(format!("无效的图像格式: {spec}")));
            }
        }
        debug!("配置软件缩放: {input} -> {output}, 算法 {algorithm:?}");
        self.config = Some((*input, *output, algorithm));
        Ok(())
    }

    fn scale(
        &mut self,
        src: &[Vec<u8>],
        src_linesize: &[usize],
        dst: &mut [Vec<u8>],
        dst_linesize: &[usize],
    ) -> LiuResult<()> {
        let (input, output, algorithm) = self
            .config
            .ok_or_else(|| LiuError::InvalidState("缩放引擎尚未配置".into()))?;
        let src_lens: Vec<usize> = src.iter().map(Vec::len).collect();
        let dst_lens: Vec<usize> = dst.iter().map(Vec::len).collect();
        check_image("输入", &src_lens, src_linesize, &input)?;
        check_image("输出", &dst_lens, dst_linesize, &output)?;

        let src_refs: Vec<&[u8]> = src.iter().map(Vec::as_slice).collect();
        let mut dst_refs: Vec<&mut [u8]> = dst.iter_mut().map(Vec::as_mut_slice).collect();

        if input.pixel_format == output.pixel_format {
            return scale_image(
                &src_refs,
                src_linesize,
                input.width,
                input.height,
                input.pixel_format,
                &mut dst_refs,
                dst_linesize,
                output.width,
                output.height,
                algorithm,
            );
        }
        if input.width == output.width && input.height == output.height {
            return convert(
                &src_refs,
                src_linesize,
                input.pixel_format,
                &mut dst_refs,
                dst_linesize,
                output.pixel_format,
                input.width,
                input.height,
            );
        }

        // 源尺寸、目标格式的中间图像
        let format = output.pixel_format;
        let planes = format.plane_count();
        let mut tmp_linesize = Vec::with_capacity(planes);
        let mut tmp = Vec::with_capacity(planes);
        for p in 0..planes {
            let ls = format.plane_linesize(p, input.width).unwrap_or(0);
            let rows = format.plane_height(p, input.height).unwrap_or(0);
            tmp.push(vec![0u8; ls * rows]);
            tmp_linesize.push(ls);
        }
        {
            let mut tmp_refs: Vec<&mut [u8]> = tmp.iter_mut().map(Vec::as_mut_slice).collect();
            convert(
                &src_refs,
                src_linesize,
                input.pixel_format,
                &mut tmp_refs,
                &tmp_linesize,
                format,
                input.width,
                input.height,
            )?;
        }
        let tmp_refs: Vec<&[u8]> = tmp.iter().map(Vec::as_slice).collect();
        scale_image(
            &tmp_refs,
            &tmp_linesize,
            input.width,
            input.height,
            format,
            &mut dst_refs,
            dst_linesize,
            output.width,
            output.height,
            algorithm,
        )
    }
}
