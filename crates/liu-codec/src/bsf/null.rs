//! 透传滤镜.

use liu_core::{LiuError, LiuResult, Options};

use crate::bsf::BsfEngine;
use crate::codec_parameters::CodecParameters;
use crate::packet::Packet;

/// 原样输出每个数据包
#[derive(Default)]
pub struct NullBsf {
    pending: Option<Packet>,
    eof: bool,
}

impl NullBsf {
    pub fn create() -> Box<dyn BsfEngine> {
        Box::new(Self::default())
    }
}

impl BsfEngine for NullBsf {
    fn name(&self) -> &str {
        "null"
    }

    fn open(&mut self, _params: &mut CodecParameters, _options: &mut Options) -> LiuResult<()> {
        Ok(())
    }

    fn send(&mut self, packet: Option<&Packet>) -> LiuResult<()> {
        match packet {
            Some(_) if self.pending.is_some() => Err(LiuError::NeedMoreData),
            Some(p) => {
                self.pending = Some(p.clone());
                Ok(())
            }
            None => {
                self.eof = true;
                Ok(())
            }
        }
    }

    fn receive(&mut self) -> LiuResult<Packet> {
        match self.pending.take() {
            Some(p) => Ok(p),
            None if self.eof => Err(LiuError::Eof),
            None => Err(LiuError::NeedMoreData),
        }
    }
}
