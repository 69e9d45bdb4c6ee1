//! 解码后的原始帧 (Frame).
//!
//! 对标 FFmpeg 的 `AVFrame`. 帧是值语义的单元, 调用方分配后传入
//! 解码器/重采样器填充; 只有完整产出结果时 `complete` 才为 `true`.

use liu_core::{ChannelLayout, MediaType, NOPTS_VALUE, PixelFormat, Rational, SampleFormat};

/// 视频帧 (图像)
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// 各平面的像素数据
    pub data: Vec<Vec<u8>>,
    /// 各平面每行的字节数
    pub linesize: Vec<usize>,
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 时间基
    pub time_base: Rational,
    /// 帧时长 (以 time_base 为单位)
    pub duration: i64,
    /// 是否为关键帧
    pub is_keyframe: bool,
    /// 图片类型 (I/P/B 帧)
    pub picture_type: PictureType,
    /// 编码质量 (量化参数, 0 表示未知)
    pub quality: i32,
    /// 是否包含完整图像
    pub complete: bool,
}

impl VideoFrame {
    /// 按格式分配零填充的图像, 未完成
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let planes = pixel_format.plane_count();
        let mut data = Vec::with_capacity(planes);
        let mut linesize = Vec::with_capacity(planes);
        for p in 0..planes {
            let ls = pixel_format.plane_linesize(p, width).unwrap_or(0);
            let h = pixel_format.plane_height(p, height).unwrap_or(0);
            data.push(vec![0u8; ls * h]);
            linesize.push(ls);
        }
        Self {
            data,
            linesize,
            width,
            height,
            pixel_format,
            pts: NOPTS_VALUE,
            time_base: Rational::UNDEFINED,
            duration: 0,
            is_keyframe: false,
            picture_type: PictureType::None,
            quality: 0,
            complete: false,
        }
    }
}

/// 音频帧
///
/// 平面格式: `data` 中每个 Vec 对应一个声道.
/// 交错格式: `data` 中只有一个 Vec, 所有声道交替排列.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// 音频采样数据
    pub data: Vec<Vec<u8>>,
    /// 有效采样数 (每声道)
    pub nb_samples: u32,
    /// 缓冲区可容纳的最大采样数 (每声道)
    pub capacity: u32,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 采样格式
    pub sample_format: SampleFormat,
    /// 声道布局
    pub channel_layout: ChannelLayout,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 时间基
    pub time_base: Rational,
    /// 帧时长 (以 time_base 为单位)
    pub duration: i64,
    /// 是否包含完整结果
    pub complete: bool,
}

impl AudioFrame {
    /// 分配可容纳 `nb_samples` 个采样的零填充帧, 有效采样数即为 `nb_samples`
    pub fn new(
        nb_samples: u32,
        sample_rate: u32,
        sample_format: SampleFormat,
        channel_layout: ChannelLayout,
    ) -> Self {
        let channels = channel_layout.channels;
        let planes = sample_format.plane_count(channels);
        let plane_size = sample_format.plane_size(channels, nb_samples);
        Self {
            data: vec![vec![0u8; plane_size]; planes],
            nb_samples,
            capacity: nb_samples,
            sample_rate,
            sample_format,
            channel_layout,
            pts: NOPTS_VALUE,
            time_base: Rational::UNDEFINED,
            duration: 0,
            complete: false,
        }
    }

    /// 分配可容纳 `capacity` 个采样的输出帧, 有效采样数为 0
    pub fn with_capacity(
        capacity: u32,
        sample_rate: u32,
        sample_format: SampleFormat,
        channel_layout: ChannelLayout,
    ) -> Self {
        let mut frame = Self::new(capacity, sample_rate, sample_format, channel_layout);
        frame.nb_samples = 0;
        frame
    }

    /// 声道数
    pub fn channels(&self) -> u32 {
        self.channel_layout.channels
    }

    /// 有效数据在每个平面中的字节数
    pub fn valid_plane_size(&self) -> usize {
        self.sample_format
            .plane_size(self.channel_layout.channels, self.nb_samples)
    }

    /// 把平面缓冲截断到有效数据长度
    pub fn truncate_to_valid(&mut self) {
        let n = self.valid_plane_size();
        for plane in &mut self.data {
            plane.truncate(n);
        }
    }
}

/// 字幕帧
#[derive(Debug, Clone)]
pub struct SubtitleFrame {
    /// 字幕文本 (多行以 `\n` 分隔)
    pub text: String,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 显示时长 (以 time_base 为单位)
    pub duration: i64,
    /// 时间基
    pub time_base: Rational,
    /// 是否包含完整结果
    pub complete: bool,
}

impl SubtitleFrame {
    /// 创建空字幕帧
    pub fn new() -> Self {
        Self {
            text: String::new(),
            pts: NOPTS_VALUE,
            duration: 0,
            time_base: Rational::UNDEFINED,
            complete: false,
        }
    }
}

impl Default for SubtitleFrame {
    fn default() -> Self {
        Self::new()
    }
}

/// 帧: 封闭的载荷类型集合, 各处理阶段按穷尽匹配分派
#[derive(Debug, Clone)]
pub enum Frame {
    /// 视频帧
    Video(VideoFrame),
    /// 音频帧
    Audio(AudioFrame),
    /// 字幕帧
    Subtitle(SubtitleFrame),
}

impl Frame {
    /// 载荷的媒体类型
    pub fn media_type(&self) -> MediaType {
        match self {
            Self::Video(_) => MediaType::Video,
            Self::Audio(_) => MediaType::Audio,
            Self::Subtitle(_) => MediaType::Subtitle,
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            Self::Video(v) => v.complete,
            Self::Audio(a) => a.complete,
            Self::Subtitle(s) => s.complete,
        }
    }

    pub fn pts(&self) -> i64 {
        match self {
            Self::Video(v) => v.pts,
            Self::Audio(a) => a.pts,
            Self::Subtitle(s) => s.pts,
        }
    }

    pub fn time_base(&self) -> Rational {
        match self {
            Self::Video(v) => v.time_base,
            Self::Audio(a) => a.time_base,
            Self::Subtitle(s) => s.time_base,
        }
    }
}

/// 图片类型 (I/P/B 帧)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PictureType {
    /// 未指定
    #[default]
    None,
    /// I 帧 (关键帧, 帧内编码)
    I,
    /// P 帧 (前向预测)
    P,
    /// B 帧 (双向预测)
    B,
}
