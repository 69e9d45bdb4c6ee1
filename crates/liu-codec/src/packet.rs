//! 压缩数据包 (Packet).
//!
//! 对标 FFmpeg 的 `AVPacket`.

use bytes::Bytes;
use liu_core::{NOPTS_VALUE, Rational};

/// 压缩数据包
///
/// `complete == false` 表示数据包未被填充 (例如编码器在排空结束时返回的哨兵).
#[derive(Debug, Clone)]
pub struct Packet {
    /// 压缩数据
    pub data: Bytes,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 解码时间戳 (DTS)
    pub dts: i64,
    /// 数据包时长 (以 time_base 为单位)
    pub duration: i64,
    /// 时间基
    pub time_base: Rational,
    /// 所属流的索引
    pub stream_index: usize,
    /// 是否为关键帧
    pub is_keyframe: bool,
    /// 是否包含完整有效的数据
    pub complete: bool,
}

impl Packet {
    /// 创建空数据包, 未完成
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            pts: NOPTS_VALUE,
            dts: NOPTS_VALUE,
            duration: 0,
            time_base: Rational::UNDEFINED,
            stream_index: 0,
            is_keyframe: false,
            complete: false,
        }
    }

    /// 从数据创建完整的数据包
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            is_keyframe: true,
            complete: true,
            ..Self::empty()
        }
    }

    /// 设置时间戳 (pts 与 dts 相同)
    pub fn with_pts(mut self, pts: i64, time_base: Rational) -> Self {
        self.pts = pts;
        self.dts = pts;
        self.time_base = time_base;
        self
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 清空为未完成状态, 保留流索引
    pub fn reset(&mut self) {
        let stream_index = self.stream_index;
        *self = Self::empty();
        self.stream_index = stream_index;
    }
}
