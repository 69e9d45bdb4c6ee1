//! 图像重采样器: 尺寸与像素格式转换, 时间戳原样透传.

use liu_codec::VideoFrame;
use liu_core::{CoderState, Lifecycle, LiuError, LiuResult, PixelFormat};
use log::{debug, trace};

use crate::ScaleAlgorithm;
use crate::engine::{PictureSpec, ScaleEngine};
use crate::software::SoftwareScaler;

/// 图像重采样器
pub struct MediaPictureResampler {
    lifecycle: Lifecycle,
    input: PictureSpec,
    output: PictureSpec,
    algorithm: ScaleAlgorithm,
    engine: Box<dyn ScaleEngine>,
}

impl MediaPictureResampler {
    /// 使用内置软件引擎创建
    pub fn new(
        out_width: u32,
        out_height: u32,
        out_format: PixelFormat,
        in_width: u32,
        in_height: u32,
        in_format: PixelFormat,
    ) -> LiuResult<Self> {
        Self::with_engine(
            out_width,
            out_height,
            out_format,
            in_width,
            in_height,
            in_format,
            Box::new(SoftwareScaler::new()),
        )
    }

    /// 使用给定引擎创建; 六个参数必须都有效
    #[allow(clippy::too_many_arguments)]
    pub fn with_engine(
        out_width: u32,
        out_height: u32,
        out_format: PixelFormat,
        in_width: u32,
        in_height: u32,
        in_format: PixelFormat,
        engine: Box<dyn ScaleEngine>,
    ) -> LiuResult<Self> {
        let output = PictureSpec::new(out_width, out_height, out_format);
        let input = PictureSpec::new(in_width, in_height, in_format);
        for (side, spec) in [("输出", &output), ("输入", &input)] {
            if spec.width == 0 || spec.height == 0 {
                return Err(LiuError::InvalidArgument(format!(
                    "{side}图像尺寸无效: {}x{}",
                    spec.width, spec.height
                )));
            }
            if spec.pixel_format == PixelFormat::None {
                return Err(LiuError::InvalidArgument(format!("{side}像素格式未指定")));
            }
        }
        Ok(Self {
            lifecycle: Lifecycle::new("图像重采样器"),
            input,
            output,
            algorithm: ScaleAlgorithm::for_sizes(in_width, in_height, out_width, out_height),
            engine,
        })
    }

    pub fn state(&self) -> CoderState {
        self.lifecycle.state()
    }

    pub fn algorithm(&self) -> ScaleAlgorithm {
        self.algorithm
    }

    /// 覆盖默认算法 (仅 `Inited`)
    pub fn set_algorithm(&mut self, algorithm: ScaleAlgorithm) -> LiuResult<()> {
        self.lifecycle.require_inited("set_algorithm")?;
        self.algorithm = algorithm;
        Ok(())
    }

    pub fn output_width(&self) -> u32 {
        self.output.width
    }

    pub fn output_height(&self) -> u32 {
        self.output.height
    }

    pub fn output_format(&self) -> PixelFormat {
        self.output.pixel_format
    }

    pub fn input_width(&self) -> u32 {
        self.input.width
    }

    pub fn input_height(&self) -> u32 {
        self.input.height
    }

    pub fn input_format(&self) -> PixelFormat {
        self.input.pixel_format
    }

    pub fn open(&mut self) -> LiuResult<()> {
        self.lifecycle.require_inited("open")?;
        if let Err(e) = self
            .engine
            .configure(&self.input, &self.output, self.algorithm)
        {
            return Err(self.lifecycle.fail("open", e));
        }
        self.lifecycle.mark_opened();
        debug!(
            "打开图像重采样器 ({}): {} -> {}, 算法 {:?}",
            self.engine.name(),
            self.input,
            self.output,
            self.algorithm
        );
        Ok(())
    }

    /// 关闭重采样器; 重复调用无效果
    pub fn close(&mut self) {
        if self.lifecycle.close() {
            debug!("关闭图像重采样器 ({})", self.engine.name());
        }
    }

    /// 把完整的输入图像转换到 `out`, 时间戳与帧属性原样复制
    pub fn resample(&mut self, out: &mut VideoFrame, input: &VideoFrame) -> LiuResult<()> {
        self.lifecycle.require_opened("resample")?;
        check_spec("输入", &self.input, input)?;
        check_spec("输出", &self.output, out)?;
        if !input.complete {
            return Err(LiuError::InvalidArgument("输入图像未完成".into()));
        }
        out.complete = false;

        match self
            .engine
            .scale(&input.data, &input.linesize, &mut out.data, &out.linesize)
        {
            Ok(()) => {}
            Err(e @ LiuError::InvalidArgument(_)) => return Err(e),
            Err(e) => return Err(self.lifecycle.fail("resample", e)),
        }

        out.pts = input.pts;
        out.time_base = input.time_base;
        out.duration = input.duration;
        out.is_keyframe = input.is_keyframe;
        out.picture_type = input.picture_type;
        out.quality = input.quality;
        out.complete = true;
        trace!("图像重采样 pts={}", out.pts);
        Ok(())
    }
}

fn check_spec(side: &str, spec: &PictureSpec, f: &VideoFrame) -> LiuResult<()> {
    let actual = PictureSpec::new(f.width, f.height, f.pixel_format);
    if actual != *spec {
        return Err(LiuError::InvalidArgument(format!(
            "{side}图像格式不匹配: 期望 {spec}, 实际 {actual}"
        )));
    }
    Ok(())
}

impl Drop for MediaPictureResampler {
    fn drop(&mut self) {
        self.close();
    }
}
