//! 日志初始化.
//!
//! 控制台写 stderr, 文件写 `logs/{prefix}.{date}.log` (按天滚动).
//! 两者级别都由 `-v` 次数决定, 文件级别还可以用 `LIU_LOG` 覆盖.
//! 库 crate 经 `log` 门面产生的记录也会进入这两个输出.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

const LOG_DIR: &str = "logs";
const FILE_FILTER_ENV: &str = "LIU_LOG";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// `-v` 次数对应的级别: 0=info, 1=debug, 2+=trace
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// 安装全局订阅者, 重复调用返回错误
pub fn init(file_prefix: &str, verbosity: u8) -> Result<()> {
    let level = level_for(verbosity);
    let file_writer = daily_writer(Path::new(LOG_DIR), file_prefix)?;

    let console = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(LineFormat::CONSOLE)
        .with_filter(EnvFilter::new(level));

    let file_filter =
        EnvFilter::try_from_env(FILE_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    let file = fmt::Layer::default()
        .with_writer(file_writer)
        .with_ansi(false)
        .event_format(LineFormat::FILE)
        .with_filter(file_filter);

    Registry::default()
        .with(console)
        .with(file)
        .try_init()
        .context("日志系统已初始化")
}

/// 非阻塞的按天滚动写入器, 后台线程的 guard 保存到进程结束
fn daily_writer(dir: &Path, prefix: &str) -> Result<tracing_appender::non_blocking::NonBlocking> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("创建日志目录 '{}' 失败", dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(dir)
        .context("创建日志文件失败")?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    Ok(writer)
}

/// 单行日志格式
///
/// 控制台: `[时:分:秒.毫秒] 级别 > 消息`, 级别带颜色.
/// 文件: `[年-月-日 时:分:秒.毫秒] 级别 目标 > 消息`.
#[derive(Debug, Clone, Copy)]
struct LineFormat {
    time_pattern: &'static str,
    colored: bool,
    show_target: bool,
}

impl LineFormat {
    const CONSOLE: Self = Self {
        time_pattern: "%H:%M:%S%.3f",
        colored: true,
        show_target: false,
    };

    const FILE: Self = Self {
        time_pattern: "%Y-%m-%d %H:%M:%S%.3f",
        colored: false,
        show_target: true,
    };

    fn level_color(level: tracing::Level) -> &'static str {
        match level {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        write!(writer, "[{}] ", Local::now().format(self.time_pattern))?;
        if self.colored {
            write!(writer, "{}{:5}\x1b[0m", Self::level_color(*meta.level()), meta.level())?;
        } else {
            write!(writer, "{:5}", meta.level())?;
        }
        if self.show_target {
            write!(writer, " {}", meta.target())?;
        }
        write!(writer, " > ")?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
