//! 码流滤镜 (BitStreamFilter).
//!
//! 对标 FFmpeg 的 `AVBSFContext`: 不解码, 只把一串数据包变换为另一串数据包.
//! 采用两阶段协议, 每次 `send_packet` 之后调用方都必须反复 `receive_packet`,
//! 直到返回的不再是 [`ProcessorResult::Success`]. 一个输入可能产出 0..N 个输出,
//! 调用方不能假设一一对应.
//!
//! ```text
//! for pkt in input {
//!     bsf.send_packet(Some(&pkt))?;
//!     while bsf.receive_packet(&mut out)? == ProcessorResult::Success { emit(&out) }
//! }
//! bsf.send_packet(None)?;
//! while bsf.receive_packet(&mut out)? == ProcessorResult::Success { emit(&out) }
//! ```

pub mod chomp;
pub mod null;
pub mod pcm_rechunk;

use std::sync::Arc;

use liu_core::{CoderState, Lifecycle, LiuError, LiuResult, Options};
use log::debug;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::context::Context;
use crate::packet::Packet;
use crate::registry::{BitStreamFilterType, BsfRegistry};

/// 送入/取出的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorResult {
    /// 操作成功 (取出时表示输出了一个数据包)
    Success,
    /// 需要先取出输出 (送入时) 或需要更多输入 (取出时)
    AwaitingData,
    /// 流已结束
    EndOfStream,
}

/// 码流滤镜引擎
///
/// `send` 返回 `Err(NeedMoreData)` 表示输出尚未取空; `receive` 返回
/// `Err(NeedMoreData)` 表示需要更多输入, `Err(Eof)` 表示已全部输出.
pub trait BsfEngine: Send {
    /// 引擎名称
    fn name(&self) -> &str;

    /// 按输入流参数与选项打开, 认识的选项从 `options` 中取走
    fn open(&mut self, params: &mut CodecParameters, options: &mut Options) -> LiuResult<()>;

    /// 送入一个数据包, `None` 表示流结束
    fn send(&mut self, packet: Option<&Packet>) -> LiuResult<()>;

    /// 取出一个数据包
    fn receive(&mut self) -> LiuResult<Packet>;
}

/// 码流滤镜
pub struct BitStreamFilter {
    ctx: Arc<Context>,
    lifecycle: Lifecycle,
    filter_type: BitStreamFilterType,
    params: CodecParameters,
    engine: Box<dyn BsfEngine>,
}

impl BitStreamFilter {
    /// 按名称从上下文注册表创建
    pub fn new(ctx: &Arc<Context>, name: &str) -> LiuResult<Self> {
        let ty = ctx
            .filters()
            .by_name(name)
            .ok_or_else(|| LiuError::FilterNotFound(format!("未找到码流滤镜: {name}")))?
            .clone();
        Ok(Self::with_type(ctx, ty))
    }

    /// 按滤镜类型创建
    pub fn with_type(ctx: &Arc<Context>, filter_type: BitStreamFilterType) -> Self {
        let engine = filter_type.create_engine();
        Self {
            ctx: Arc::clone(ctx),
            lifecycle: Lifecycle::new("码流滤镜"),
            params: CodecParameters::new(
                filter_type.codec_ids.first().copied().unwrap_or(CodecId::RawVideo),
            ),
            filter_type,
            engine,
        }
    }

    pub fn filter_type(&self) -> &BitStreamFilterType {
        &self.filter_type
    }

    pub fn name(&self) -> &str {
        self.filter_type.name
    }

    pub fn state(&self) -> CoderState {
        self.lifecycle.state()
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// 输入流参数; 打开后为引擎调整过的输出参数
    pub fn parameters(&self) -> &CodecParameters {
        &self.params
    }

    /// 设置输入流参数, 仅在打开前有效
    pub fn set_parameters(&mut self, params: CodecParameters) -> LiuResult<()> {
        self.lifecycle.require_inited("set_parameters")?;
        if !self.filter_type.supports(params.codec_id) {
            return Err(LiuError::InvalidArgument(format!(
                "码流滤镜 {} 不支持 {}",
                self.filter_type.name, params.codec_id
            )));
        }
        self.params = params;
        Ok(())
    }

    /// 打开滤镜, 返回引擎未使用的选项
    pub fn open(&mut self, options: Option<&Options>) -> LiuResult<Options> {
        self.lifecycle.require_inited("open")?;
        let mut opts = options.cloned().unwrap_or_default();
        let mut params = self.params.clone();
        let result = {
            let _guard = self.ctx.lock_engines();
            self.engine.open(&mut params, &mut opts)
        };
        if let Err(e) = result {
            return Err(self.lifecycle.fail("open", e));
        }
        self.params = params;
        self.lifecycle.mark_opened();
        debug!(
            "打开码流滤镜 {} ({}), 未使用选项 {} 个",
            self.filter_type.name,
            self.params.codec_id,
            opts.len()
        );
        Ok(opts)
    }

    /// 送入数据包, `None` 表示流结束
    pub fn send_packet(&mut self, packet: Option<&Packet>) -> LiuResult<ProcessorResult> {
        self.lifecycle.require_active("send_packet")?;
        match packet {
            Some(p) if !p.complete => {
                return Err(LiuError::InvalidArgument("数据包未完成, 不能送入码流滤镜".into()));
            }
            Some(_) if self.lifecycle.state() == CoderState::Flushing => {
                return Ok(ProcessorResult::EndOfStream);
            }
            Some(_) => {}
            None => self.lifecycle.mark_flushing(),
        }
        match self.engine.send(packet) {
            Ok(()) => Ok(ProcessorResult::Success),
            Err(LiuError::NeedMoreData) => Ok(ProcessorResult::AwaitingData),
            Err(LiuError::Eof) => Ok(ProcessorResult::EndOfStream),
            Err(e) => Err(self.lifecycle.fail("send_packet", e)),
        }
    }

    /// 取出一个数据包; 返回 `Success` 时 `output.complete` 为 `true`
    pub fn receive_packet(&mut self, output: &mut Packet) -> LiuResult<ProcessorResult> {
        self.lifecycle.require_active("receive_packet")?;
        output.reset();
        match self.engine.receive() {
            Ok(mut pkt) => {
                pkt.stream_index = output.stream_index;
                pkt.complete = true;
                *output = pkt;
                Ok(ProcessorResult::Success)
            }
            Err(LiuError::NeedMoreData) => Ok(ProcessorResult::AwaitingData),
            Err(LiuError::Eof) => Ok(ProcessorResult::EndOfStream),
            Err(e) => Err(self.lifecycle.fail("receive_packet", e)),
        }
    }

    /// 关闭滤镜; 重复调用无效果
    pub fn close(&mut self) {
        if self.lifecycle.close() {
            debug!("关闭码流滤镜 {}", self.filter_type.name);
        }
    }
}

impl Drop for BitStreamFilter {
    fn drop(&mut self) {
        self.close();
    }
}

/// PCM 码流的编解码器
pub(crate) const PCM_CODECS: &[CodecId] = &[
    CodecId::PcmU8,
    CodecId::PcmS16le,
    CodecId::PcmS16be,
    CodecId::PcmS24le,
    CodecId::PcmS32le,
    CodecId::PcmF32le,
];

/// 注册所有内置码流滤镜
pub fn register_all(registry: &mut BsfRegistry) {
    registry.register(BitStreamFilterType::new(
        "null",
        "原样透传数据包",
        &[],
        null::NullBsf::create,
    ));
    registry.register(BitStreamFilterType::new(
        "chomp",
        "去掉数据包末尾的零填充",
        &[],
        chomp::ChompBsf::create,
    ));
    registry.register(BitStreamFilterType::new(
        "pcm_rechunk",
        "把 PCM 数据包重新切分为固定采样数",
        PCM_CODECS,
        pcm_rechunk::PcmRechunkBsf::create,
    ));
}
