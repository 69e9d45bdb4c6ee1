//! 显式初始化上下文.
//!
//! 持有编解码器与码流滤镜注册表, 以及引擎打开时的全局锁. 每个 `Decoder`、
//! `Encoder`、`BitStreamFilter` 都由同一个 `Arc<Context>` 创建.

use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::registry::{BsfRegistry, CodecRegistry};

/// 初始化上下文
pub struct Context {
    codecs: CodecRegistry,
    filters: BsfRegistry,
    engine_lock: Mutex<()>,
}

impl Context {
    /// 创建并注册所有内置编解码器与码流滤镜
    pub fn new() -> Arc<Self> {
        let mut codecs = CodecRegistry::new();
        crate::register_all(&mut codecs);
        let mut filters = BsfRegistry::new();
        crate::bsf::register_all(&mut filters);
        debug!(
            "初始化上下文: {} 个解码器, {} 个编码器, {} 个码流滤镜",
            codecs.list_decoders().len(),
            codecs.list_encoders().len(),
            filters.count()
        );
        Self::with_registries(codecs, filters)
    }

    /// 使用自定义注册表创建
    pub fn with_registries(codecs: CodecRegistry, filters: BsfRegistry) -> Arc<Self> {
        Arc::new(Self {
            codecs,
            filters,
            engine_lock: Mutex::new(()),
        })
    }

    /// 编解码器注册表
    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// 码流滤镜注册表
    pub fn filters(&self) -> &BsfRegistry {
        &self.filters
    }

    /// 获取引擎全局锁, 在引擎 `open()` 期间持有
    pub(crate) fn lock_engines(&self) -> MutexGuard<'_, ()> {
        // 锁内不保护任何数据, 中毒后直接继续使用
        self.engine_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
