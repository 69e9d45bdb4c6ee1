//! RAW 视频解码引擎.
//!
//! 不做压缩/解压缩, 仅按像素格式把数据包拆分为平面. 每次调用消耗一帧的字节数,
//! 一个数据包可以包含多帧.

use log::debug;
use liu_core::{LiuError, LiuResult, Options, PixelFormat};

use crate::allocator::FrameAllocator;
use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::engine::{CodecCapabilities, CodecEngine, DecodeEngine, Decoded, PacketSlice};
use crate::frame::{Frame, PictureType, VideoFrame};

/// RAW 视频解码引擎
pub struct RawVideoDecoder {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    /// 预计算: 每帧总字节数
    frame_bytes: usize,
    /// 预计算: 各平面每行字节数
    linesizes: Vec<usize>,
    /// 预计算: 各平面的行数
    plane_heights: Vec<usize>,
}

impl RawVideoDecoder {
    pub fn create() -> LiuResult<Box<dyn DecodeEngine>> {
        Ok(Box::new(Self {
            width: 0,
            height: 0,
            pixel_format: PixelFormat::None,
            frame_bytes: 0,
            linesizes: Vec::new(),
            plane_heights: Vec::new(),
        }))
    }
}

impl CodecEngine for RawVideoDecoder {
    fn codec_id(&self) -> CodecId {
        CodecId::RawVideo
    }

    fn name(&self) -> &str {
        "rawvideo"
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities::DR1
    }

    fn open(&mut self, params: &mut CodecParameters, _options: &mut Options) -> LiuResult<()> {
        let video = params
            .video_params()
            .ok_or_else(|| LiuError::InvalidArgument("rawvideo 解码器需要视频参数".into()))?;
        if video.width == 0 || video.height == 0 {
            return Err(LiuError::InvalidArgument("宽度和高度不能为 0".into()));
        }
        let pf = video.pixel_format;
        let frame_bytes = pf
            .frame_size(video.width, video.height)
            .ok_or_else(|| LiuError::InvalidArgument(format!("无法计算 {pf} 的帧大小")))?;

        let plane_count = pf.plane_count();
        let mut linesizes = Vec::with_capacity(plane_count);
        let mut plane_heights = Vec::with_capacity(plane_count);
        for i in 0..plane_count {
            let ls = pf.plane_linesize(i, video.width).ok_or_else(|| {
                LiuError::InvalidArgument(format!("无法计算平面 {i} 的 linesize"))
            })?;
            let ph = pf
                .plane_height(i, video.height)
                .ok_or_else(|| LiuError::InvalidArgument(format!("无法计算平面 {i} 的高度")))?;
            linesizes.push(ls);
            plane_heights.push(ph);
        }

        self.width = video.width;
        self.height = video.height;
        self.pixel_format = pf;
        self.frame_bytes = frame_bytes;
        self.linesizes = linesizes;
        self.plane_heights = plane_heights;

        debug!(
            "打开 rawvideo 解码器: {}x{}, 格式={}, 帧大小={}",
            self.width, self.height, self.pixel_format, self.frame_bytes,
        );
        Ok(())
    }
}

impl DecodeEngine for RawVideoDecoder {
    fn decode(
        &mut self,
        input: Option<PacketSlice<'_>>,
        allocator: &mut dyn FrameAllocator,
    ) -> LiuResult<Decoded> {
        let Some(slice) = input else {
            return Err(LiuError::Eof);
        };
        let data = slice.data();
        if data.len() < self.frame_bytes {
            return Err(LiuError::InvalidData(format!(
                "剩余 {} 字节不足一帧 ({} 字节)",
                data.len(),
                self.frame_bytes,
            )));
        }

        let mut planes = Vec::with_capacity(self.linesizes.len());
        let mut offset = 0usize;
        for (&ls, &h) in self.linesizes.iter().zip(&self.plane_heights) {
            let plane_size = ls * h;
            let mut plane = allocator.allocate(plane_size)?;
            plane.copy_from_slice(&data[offset..offset + plane_size]);
            planes.push(plane);
            offset += plane_size;
        }

        let packet = slice.packet;
        let frame = VideoFrame {
            data: planes,
            linesize: self.linesizes.clone(),
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
            pts: if slice.offset == 0 {
                packet.pts
            } else {
                liu_core::NOPTS_VALUE
            },
            time_base: packet.time_base,
            duration: packet.duration,
            is_keyframe: true,
            picture_type: PictureType::I,
            quality: 0,
            complete: false,
        };
        Ok(Decoded {
            consumed: self.frame_bytes,
            frame: Some(Frame::Video(frame)),
        })
    }

    fn flush(&mut self) {}
}
