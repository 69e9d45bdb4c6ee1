//! 纯文本字幕解码引擎.
//!
//! 每个数据包是一条 UTF-8 字幕, 整包消耗; 末尾的 NUL 与换行被去掉.

use liu_core::{LiuError, LiuResult, Options};

use crate::allocator::FrameAllocator;
use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::engine::{CodecEngine, DecodeEngine, Decoded, PacketSlice};
use crate::frame::{Frame, SubtitleFrame};

/// 文本字幕解码引擎
pub struct TextDecoder;

impl TextDecoder {
    pub fn create() -> LiuResult<Box<dyn DecodeEngine>> {
        Ok(Box::new(Self))
    }
}

impl CodecEngine for TextDecoder {
    fn codec_id(&self) -> CodecId {
        CodecId::Text
    }

    fn name(&self) -> &str {
        "text"
    }

    fn open(&mut self, _params: &mut CodecParameters, _options: &mut Options) -> LiuResult<()> {
        Ok(())
    }
}

impl DecodeEngine for TextDecoder {
    fn decode(
        &mut self,
        input: Option<PacketSlice<'_>>,
        _allocator: &mut dyn FrameAllocator,
    ) -> LiuResult<Decoded> {
        let Some(slice) = input else {
            return Err(LiuError::Eof);
        };
        let data = slice.data();
        let text = std::str::from_utf8(data)
            .map_err(|e| LiuError::InvalidData(format!("字幕不是有效的 UTF-8: {e}")))?;
        let text = text.trim_end_matches(['\0', '\r', '\n']);

        let packet = slice.packet;
        let frame = SubtitleFrame {
            text: text.replace("\r\n", "\n"),
            pts: packet.pts,
            duration: packet.duration,
            time_base: packet.time_base,
            complete: false,
        };
        Ok(Decoded {
            consumed: data.len(),
            frame: Some(Frame::Subtitle(frame)),
        })
    }

    fn flush(&mut self) {}
}
