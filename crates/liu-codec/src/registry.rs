//! 编解码器与码流滤镜注册表.
//!
//! 对标 FFmpeg 的编解码器注册机制, 支持按标识或名称查找并实例化引擎.

use std::collections::HashMap;

use liu_core::{LiuError, LiuResult};

use crate::bsf::BsfEngine;
use crate::codec_id::CodecId;
use crate::engine::{DecodeEngine, EncodeEngine};

/// 解码引擎工厂函数类型
pub type DecoderFactory = fn() -> LiuResult<Box<dyn DecodeEngine>>;

/// 编码引擎工厂函数类型
pub type EncoderFactory = fn() -> LiuResult<Box<dyn EncodeEngine>>;

/// 码流滤镜引擎工厂函数类型
pub type BsfFactory = fn() -> Box<dyn BsfEngine>;

/// 编解码器注册表
#[derive(Default)]
pub struct CodecRegistry {
    decoders: HashMap<CodecId, Vec<(String, DecoderFactory)>>,
    encoders: HashMap<CodecId, Vec<(String, EncoderFactory)>>,
}

impl CodecRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个解码引擎
    pub fn register_decoder(
        &mut self,
        codec_id: CodecId,
        name: impl Into<String>,
        factory: DecoderFactory,
    ) {
        self.decoders
            .entry(codec_id)
            .or_default()
            .push((name.into(), factory));
    }

    /// 注册一个编码引擎
    pub fn register_encoder(
        &mut self,
        codec_id: CodecId,
        name: impl Into<String>,
        factory: EncoderFactory,
    ) {
        self.encoders
            .entry(codec_id)
            .or_default()
            .push((name.into(), factory));
    }

    /// 创建指定标识的解码引擎 (使用第一个注册的实现)
    pub fn create_decoder(&self, codec_id: CodecId) -> LiuResult<Box<dyn DecodeEngine>> {
        let (_, factory) = self
            .decoders
            .get(&codec_id)
            .and_then(|v| v.first())
            .ok_or_else(|| LiuError::CodecNotFound(format!("未找到 {codec_id} 的解码器")))?;
        factory()
    }

    /// 创建指定标识的编码引擎
    pub fn create_encoder(&self, codec_id: CodecId) -> LiuResult<Box<dyn EncodeEngine>> {
        let (_, factory) = self
            .encoders
            .get(&codec_id)
            .and_then(|v| v.first())
            .ok_or_else(|| LiuError::CodecNotFound(format!("未找到 {codec_id} 的编码器")))?;
        factory()
    }

    /// 所有已注册的解码引擎
    pub fn list_decoders(&self) -> Vec<(CodecId, &str)> {
        let mut out: Vec<(CodecId, &str)> = self
            .decoders
            .iter()
            .flat_map(|(id, v)| v.iter().map(move |(n, _)| (*id, n.as_str())))
            .collect();
        out.sort_by_key(|(_, n)| *n);
        out
    }

    /// 所有已注册的编码引擎
    pub fn list_encoders(&self) -> Vec<(CodecId, &str)> {
        let mut out: Vec<(CodecId, &str)> = self
            .encoders
            .iter()
            .flat_map(|(id, v)| v.iter().map(move |(n, _)| (*id, n.as_str())))
            .collect();
        out.sort_by_key(|(_, n)| *n);
        out
    }
}

/// 码流滤镜类型描述
#[derive(Debug, Clone)]
pub struct BitStreamFilterType {
    /// 滤镜名称
    pub name: &'static str,
    /// 简要说明
    pub description: &'static str,
    /// 支持的编解码器, 空表示不限
    pub codec_ids: &'static [CodecId],
    factory: BsfFactory,
}

impl BitStreamFilterType {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        codec_ids: &'static [CodecId],
        factory: BsfFactory,
    ) -> Self {
        Self {
            name,
            description,
            codec_ids,
            factory,
        }
    }

    /// 是否支持该编解码器
    pub fn supports(&self, codec_id: CodecId) -> bool {
        self.codec_ids.is_empty() || self.codec_ids.contains(&codec_id)
    }

    /// 实例化引擎
    pub fn create_engine(&self) -> Box<dyn BsfEngine> {
        (self.factory)()
    }
}

/// 码流滤镜注册表, 保持注册顺序以支持按索引枚举
#[derive(Debug, Default)]
pub struct BsfRegistry {
    types: Vec<BitStreamFilterType>,
}

impl BsfRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册滤镜类型; 同名类型会被替换
    pub fn register(&mut self, ty: BitStreamFilterType) {
        match self.types.iter_mut().find(|t| t.name == ty.name) {
            Some(slot) => *slot = ty,
            None => self.types.push(ty),
        }
    }

    /// 已注册的滤镜类型数量
    pub fn count(&self) -> usize {
        self.types.len()
    }

    /// 按索引获取
    pub fn by_index(&self, index: usize) -> Option<&BitStreamFilterType> {
        self.types.get(index)
    }

    /// 按名称获取
    pub fn by_name(&self, name: &str) -> Option<&BitStreamFilterType> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BitStreamFilterType> {
        self.types.iter()
    }
}
