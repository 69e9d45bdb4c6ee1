//! 引擎配置键值表.
//!
//! 对标 FFmpeg 的 `AVDictionary`: `open()` 时传入引擎, 引擎取走认识的键,
//! 剩余的键原样返回给调用方.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{LiuError, LiuResult};

/// 有序字符串键值表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    entries: BTreeMap<String, String>,
}

impl Options {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置键值, 返回旧值
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// 链式设置
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 取走一个键
    pub fn take(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// 取走一个键并解析为 `T`, 值非法时返回 `InvalidArgument`
    pub fn take_parsed<T: FromStr>(&mut self, key: &str) -> LiuResult<Option<T>> {
        match self.entries.remove(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
                LiuError::InvalidArgument(format!("选项 {key} 的值无效: {raw}"))
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 合并另一张表, 同名键以 `other` 为准
    pub fn merge(&mut self, other: &Options) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut opts = Self::new();
        for (k, v) in iter {
            opts.set(k, v);
        }
        opts
    }
}
