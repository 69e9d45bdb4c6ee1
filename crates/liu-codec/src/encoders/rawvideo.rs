//! RAW 视频编码引擎.
//!
//! 把图像各平面按行拼接为数据包, 去掉行尾填充, 不做压缩.

use bytes::Bytes;
use log::debug;
use liu_core::{LiuError, LiuResult, Options, PixelFormat};

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::engine::{CodecEngine, EncodeEngine};
use crate::frame::VideoFrame;
use crate::packet::Packet;

/// RAW 视频编码引擎
pub struct RawVideoEncoder {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    /// 预计算: 每帧总字节数
    frame_bytes: usize,
}

impl RawVideoEncoder {
    pub fn create() -> LiuResult<Box<dyn EncodeEngine>> {
        Ok(Box::new(Self {
            width: 0,
            height: 0,
            pixel_format: PixelFormat::None,
            frame_bytes: 0,
        }))
    }
}

impl CodecEngine for RawVideoEncoder {
    fn codec_id(&self) -> CodecId {
        CodecId::RawVideo
    }

    fn name(&self) -> &str {
        "rawvideo"
    }

    fn open(&mut self, params: &mut CodecParameters, _options: &mut Options) -> LiuResult<()> {
        let video = params
            .video_params()
            .ok_or_else(|| LiuError::InvalidArgument("rawvideo 编码器需要视频参数".into()))?;
        if video.width == 0 || video.height == 0 {
            return Err(LiuError::InvalidArgument("宽度和高度不能为 0".into()));
        }
        let pf = video.pixel_format;
        let frame_bytes = pf
            .frame_size(video.width, video.height)
            .ok_or_else(|| LiuError::InvalidArgument(format!("无法计算 {pf} 的帧大小")))?;

        self.width = video.width;
        self.height = video.height;
        self.pixel_format = pf;
        self.frame_bytes = frame_bytes;

        debug!(
            "打开 rawvideo 编码器: {}x{}, 格式={}, 帧大小={}",
            self.width, self.height, self.pixel_format, self.frame_bytes,
        );
        Ok(())
    }
}

impl EncodeEngine for RawVideoEncoder {
    fn encode_video(&mut self, frame: Option<&VideoFrame>) -> LiuResult<Option<Packet>> {
        let Some(frame) = frame else {
            return Err(LiuError::Eof);
        };

        let mut buf = Vec::with_capacity(self.frame_bytes);
        let pf = self.pixel_format;
        for (i, plane) in frame.data.iter().enumerate().take(pf.plane_count()) {
            let row = pf.plane_linesize(i, self.width).unwrap_or(0);
            let rows = pf.plane_height(i, self.height).unwrap_or(0);
            let stride = frame.linesize.get(i).copied().unwrap_or(row);
            for y in 0..rows {
                let start = y * stride;
                let line = plane.get(start..start + row).ok_or_else(|| {
                    LiuError::InvalidData(format!("平面 {i} 第 {y} 行数据不足"))
                })?;
                buf.extend_from_slice(line);
            }
        }
        if buf.len() != self.frame_bytes {
            return Err(LiuError::InvalidData(format!(
                "图像数据 {} 字节与预期 {} 字节不一致",
                buf.len(),
                self.frame_bytes
            )));
        }

        let mut pkt = Packet::from_data(Bytes::from(buf)).with_pts(frame.pts, frame.time_base);
        pkt.duration = frame.duration;
        Ok(Some(pkt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rawvideo_encoder_去掉行尾填充() {
        let mut enc = RawVideoEncoder::create().unwrap();
        let mut params = CodecParameters::video(CodecId::RawVideo, 2, 2, PixelFormat::Gray8);
        enc.open(&mut params, &mut Options::new()).unwrap();

        let mut f = VideoFrame::new(2, 2, PixelFormat::Gray8);
        f.linesize = vec![4];
        f.data = vec![vec![1, 2, 0, 0, 3, 4, 0, 0]];
        f.pts = 5;
        let pkt = enc.encode_video(Some(&f)).unwrap().unwrap();
        assert_eq!(&pkt.data[..], &[1, 2, 3, 4]);
        assert_eq!(pkt.pts, 5);
        assert!(matches!(enc.encode_video(None), Err(LiuError::Eof)));
    }
}
