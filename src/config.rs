//! 转码流水线配置.
//!
//! 配置以 JSON 描述, 缺省字段取默认值:
//!
//! ```json
//! {
//!     "input": { "codec": "pcm_f32le", "sample_rate": 44100, "channels": 2 },
//!     "output": { "codec": "pcm_s16le", "sample_rate": 22050, "channels": 1 },
//!     "packet_size": 4096
//! }
//! ```

use std::path::Path;

use liu_codec::CodecId;
use liu_core::{ChannelLayout, LiuError, LiuResult, MediaType};
use liu_resample::ResampleOptions;
use serde::{Deserialize, Serialize};

/// 单个音频流的参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStreamConfig {
    /// 编解码器名称, 例如 `pcm_s16le`
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u32,
    /// 每帧采样数, 0 表示不限
    #[serde(default)]
    pub frame_size: u32,
}

impl AudioStreamConfig {
    pub fn new(codec: &str, sample_rate: u32, channels: u32) -> Self {
        Self {
            codec: codec.to_string(),
            sample_rate,
            channels,
            frame_size: 0,
        }
    }

    /// 解析编解码器标识
    pub fn codec_id(&self) -> LiuResult<CodecId> {
        let id = CodecId::from_name(&self.codec)
            .ok_or_else(|| LiuError::CodecNotFound(self.codec.clone()))?;
        if id.media_type() != MediaType::Audio {
            return Err(LiuError::InvalidArgument(format!("{id} 不是音频编解码器")));
        }
        Ok(id)
    }

    /// 由声道数推导声道布局
    pub fn channel_layout(&self) -> LiuResult<ChannelLayout> {
        if !matches!(self.channels, 1 | 2 | 6 | 8) {
            return Err(LiuError::InvalidArgument(format!(
                "不支持的声道数: {}",
                self.channels
            )));
        }
        Ok(ChannelLayout::from_channels(self.channels))
    }
}

impl Default for AudioStreamConfig {
    fn default() -> Self {
        Self::new(&default_codec(), default_sample_rate(), default_channels())
    }
}

/// 重采样漂移补偿参数, 含义同 [`ResampleOptions`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationConfig {
    #[serde(default)]
    pub min_compensation: Option<f64>,
    #[serde(default = "default_min_hard_compensation")]
    pub min_hard_compensation: f64,
    #[serde(default = "default_soft_compensation_duration")]
    pub soft_compensation_duration: f64,
    #[serde(default)]
    pub max_soft_compensation: f64,
}

impl Default for CompensationConfig {
    fn default() -> Self {
        let opts = ResampleOptions::default();
        Self {
            min_compensation: opts.min_compensation,
            min_hard_compensation: opts.min_hard_compensation,
            soft_compensation_duration: opts.soft_compensation_duration,
            max_soft_compensation: opts.max_soft_compensation,
        }
    }
}

impl From<&CompensationConfig> for ResampleOptions {
    fn from(c: &CompensationConfig) -> Self {
        Self {
            min_compensation: c.min_compensation,
            min_hard_compensation: c.min_hard_compensation,
            soft_compensation_duration: c.soft_compensation_duration,
            max_soft_compensation: c.max_soft_compensation,
        }
    }
}

/// 音频转码流水线配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub input: AudioStreamConfig,
    #[serde(default)]
    pub output: AudioStreamConfig,
    /// 每次从输入读取的字节数
    #[serde(default = "default_packet_size")]
    pub packet_size: usize,
    #[serde(default)]
    pub compensation: CompensationConfig,
}

impl PipelineConfig {
    pub fn new(input: AudioStreamConfig, output: AudioStreamConfig) -> Self {
        Self {
            input,
            output,
            packet_size: default_packet_size(),
            compensation: CompensationConfig::default(),
        }
    }

    /// 从 JSON 文本解析并校验
    pub fn from_json_str(text: &str) -> LiuResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| LiuError::InvalidArgument(format!("配置解析失败: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 读取 JSON 配置文件
    pub fn load(path: impl AsRef<Path>) -> LiuResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> LiuResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LiuError::InvalidArgument(format!("配置序列化失败: {e}")))
    }

    /// 校验取值范围
    pub fn validate(&self) -> LiuResult<()> {
        for (side, stream) in [("输入", &self.input), ("输出", &self.output)] {
            stream.codec_id()?;
            stream.channel_layout()?;
            if stream.sample_rate == 0 || stream.sample_rate > i32::MAX as u32 {
                return Err(LiuError::InvalidArgument(format!(
                    "{side}采样率无效: {}",
                    stream.sample_rate
                )));
            }
        }
        if self.packet_size == 0 {
            return Err(LiuError::InvalidArgument("packet_size 不能为 0".into()));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(AudioStreamConfig::default(), AudioStreamConfig::default())
    }
}

fn default_codec() -> String {
    CodecId::PcmS16le.name().to_string()
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_channels() -> u32 {
    2
}

fn default_packet_size() -> usize {
    4096
}

fn default_min_hard_compensation() -> f64 {
    0.1
}

fn default_soft_compensation_duration() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_缺省字段取默认值() {
        let config = PipelineConfig::from_json_str(
            r#"{ "output": { "codec": "pcm_f32le", "sample_rate": 22050 } }"#,
        )
        .unwrap();
        assert_eq!(config.input, AudioStreamConfig::default());
        assert_eq!(config.output.codec, "pcm_f32le");
        assert_eq!(config.output.sample_rate, 22050);
        assert_eq!(config.output.channels, 2);
        assert_eq!(config.packet_size, 4096);
        assert_eq!(config.compensation, CompensationConfig::default());
    }

    #[test]
    fn test_config_序列化后可读回() {
        let mut config = PipelineConfig::new(
            AudioStreamConfig::new("pcm_u8", 8000, 1),
            AudioStreamConfig::new("pcm_s32le", 48000, 6),
        );
        config.compensation.min_compensation = Some(0.01);
        let text = config.to_json_string().unwrap();
        assert_eq!(PipelineConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn test_config_拒绝无效取值() {
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{ "input": { "codec": "mp3" } }"#),
            Err(LiuError::CodecNotFound(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{ "input": { "channels": 3 } }"#),
            Err(LiuError::InvalidArgument(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{ "output": { "codec": "rawvideo" } }"#),
            Err(LiuError::InvalidArgument(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{ "packet_size": 0 }"#),
            Err(LiuError::InvalidArgument(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_str("{"),
            Err(LiuError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_config_补偿参数转换() {
        let opts = ResampleOptions::from(&CompensationConfig::default());
        assert_eq!(opts.min_compensation, None);
        assert_eq!(opts.min_hard_compensation, 0.1);
    }
}
