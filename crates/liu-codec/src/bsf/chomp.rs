//! 去掉数据包末尾零填充的滤镜.

use liu_core::{LiuError, LiuResult, Options};

use crate::bsf::BsfEngine;
use crate::codec_parameters::CodecParameters;
use crate::packet::Packet;

/// 截掉末尾连续的 0 字节
#[derive(Default)]
pub struct ChompBsf {
    pending: Option<Packet>,
    eof: bool,
}

impl ChompBsf {
    pub fn create() -> Box<dyn BsfEngine> {
        Box::new(Self::default())
    }
}

impl BsfEngine for ChompBsf {
    fn name(&self) -> &str {
        "chomp"
    }

    fn open(&mut self, _params: &mut CodecParameters, _options: &mut Options) -> LiuResult<()> {
        Ok(())
    }

    fn send(&mut self, packet: Option<&Packet>) -> LiuResult<()> {
        let Some(p) = packet else {
            self.eof = true;
            return Ok(());
        };
        if self.pending.is_some() {
            return Err(LiuError::NeedMoreData);
        }
        let mut out = p.clone();
        let len = out
            .data
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |i| i + 1);
        // Bytes 切片不复制数据
        out.data = out.data.slice(..len);
        self.pending = Some(out);
        Ok(())
    }

    fn receive(&mut self) -> LiuResult<Packet> {
        match self.pending.take() {
            Some(p) => Ok(p),
            None if self.eof => Err(LiuError::Eof),
            None => Err(LiuError::NeedMoreData),
        }
    }
}
