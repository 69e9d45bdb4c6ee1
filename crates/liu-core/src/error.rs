//! 统一错误类型定义.
//!
//! 所有 Liu crate 共用的错误类型. 前四类对应调用方可见的错误分类:
//! 参数错误与状态错误不改变实例状态, 运行时错误会使实例进入 `Error` 状态.

use thiserror::Error;

/// Liu 统一错误类型
#[derive(Debug, Error)]
pub enum LiuError {
    /// 调用方提供的配置或帧属性不合法 / 不匹配
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 在不允许的生命周期状态下调用
    #[error("无效状态: {0}")]
    InvalidState(String),

    /// 底层引擎报告失败, 实例已进入错误状态
    #[error("运行时错误: {0}")]
    Runtime(String),

    /// 缓冲区分配失败
    #[error("内存分配失败: {0}")]
    BadAlloc(String),

    /// 数据不足, 需要更多输入 (引擎边界的流控信号)
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾 (引擎边界的流控信号)
    #[error("已到达流末尾")]
    Eof,

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 未找到指定的编解码器
    #[error("未找到编解码器: {0}")]
    CodecNotFound(String),

    /// 未找到指定的码流滤镜
    #[error("未找到滤镜: {0}")]
    FilterNotFound(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl LiuError {
    /// 是否为流控信号 (需要更多数据 / 流结束), 而非真正的失败
    pub fn is_flow_control(&self) -> bool {
        matches!(self, Self::NeedMoreData | Self::Eof)
    }
}

/// Liu 统一 Result 类型
pub type LiuResult<T> = Result<T, LiuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_流控信号判定() {
        assert!(LiuError::NeedMoreData.is_flow_control());
        assert!(LiuError::Eof.is_flow_control());
        assert!(!LiuError::Runtime("x".into()).is_flow_control());
    }

    #[test]
    fn test_error_消息格式() {
        let err = LiuError::InvalidState("已打开".into());
        assert_eq!(err.to_string(), "无效状态: 已打开");
    }
}
