//! 有状态包装器共用的生命周期状态机.
//!
//! 编解码器、重采样器和码流滤镜都持有一个 [`Lifecycle`]:
//! `Inited -> Opened -> {Flushing, Error}`, 状态只会前进, 不能从 `Error` 恢复.
//! 关闭是独立于状态的一次性标记, 关闭后任何操作都快速失败.

use std::fmt;

use crate::error::{LiuError, LiuResult};

/// 生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoderState {
    /// 已创建, 可以修改配置
    #[default]
    Inited,
    /// 已打开, 可以处理数据
    Opened,
    /// 正在排空内部缓冲
    Flushing,
    /// 引擎报告失败, 实例只能被丢弃
    Error,
}

impl fmt::Display for CoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inited => "INITED",
            Self::Opened => "OPENED",
            Self::Flushing => "FLUSHING",
            Self::Error => "ERROR",
        };
        write!(f, "{name}")
    }
}

/// 状态与关闭标记
#[derive(Debug, Clone)]
pub struct Lifecycle {
    owner: &'static str,
    state: CoderState,
    closed: bool,
}

impl Lifecycle {
    /// 创建处于 `Inited` 的状态机, `owner` 用于错误消息
    pub const fn new(owner: &'static str) -> Self {
        Self {
            owner,
            state: CoderState::Inited,
            closed: false,
        }
    }

    /// 当前状态
    pub const fn state(&self) -> CoderState {
        self.state
    }

    /// 是否已关闭
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// 已关闭或处于错误状态时返回对应错误
    fn check_alive(&self, op: &str) -> LiuResult<()> {
        if self.closed {
            return Err(LiuError::InvalidState(format!(
                "{}已关闭, 不能调用 {op}",
                self.owner
            )));
        }
        if self.state == CoderState::Error {
            return Err(LiuError::Runtime(format!(
                "{}处于错误状态, 不能调用 {op}",
                self.owner
            )));
        }
        Ok(())
    }

    fn wrong_state(&self, op: &str) -> LiuError {
        LiuError::InvalidState(format!(
            "{} 在 {} 状态下不能调用 {op}",
            self.owner, self.state
        ))
    }

    /// 要求处于 `Inited` (配置阶段)
    pub fn require_inited(&self, op: &str) -> LiuResult<()> {
        self.check_alive(op)?;
        if self.state != CoderState::Inited {
            return Err(self.wrong_state(op));
        }
        Ok(())
    }

    /// 要求处于 `Opened`
    pub fn require_opened(&self, op: &str) -> LiuResult<()> {
        self.check_alive(op)?;
        if self.state != CoderState::Opened {
            return Err(self.wrong_state(op));
        }
        Ok(())
    }

    /// 要求处于 `Opened` 或 `Flushing`
    pub fn require_active(&self, op: &str) -> LiuResult<()> {
        self.check_alive(op)?;
        match self.state {
            CoderState::Opened | CoderState::Flushing => Ok(()),
            _ => Err(self.wrong_state(op)),
        }
    }

    /// `Inited -> Opened`
    pub fn mark_opened(&mut self) {
        if self.state == CoderState::Inited {
            self.state = CoderState::Opened;
        }
    }

    /// `Opened -> Flushing`
    pub fn mark_flushing(&mut self) {
        if self.state == CoderState::Opened {
            self.state = CoderState::Flushing;
        }
    }

    /// 进入 `Error`, 返回包装后的运行时错误
    pub fn fail(&mut self, op: &str, cause: impl fmt::Display) -> LiuError {
        self.state = CoderState::Error;
        log::debug!("{} 在 {op} 时失败: {cause}", self.owner);
        LiuError::Runtime(format!("{} {op} 失败: {cause}", self.owner))
    }

    /// 标记关闭; 第一次调用返回 `true`
    pub fn close(&mut self) -> bool {
        !std::mem::replace(&mut self.closed, true)
    }
}
