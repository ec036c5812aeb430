use chrono::{DateTime, Local};
use fern::Dispatch;
use log::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => LogLevel::Error,
            log::Level::Warn => LogLevel::Warn,
            log::Level::Info => LogLevel::Info,
            log::Level::Debug => LogLevel::Debug,
            log::Level::Trace => LogLevel::Trace,
        }
    }
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "跟踪",
            LogLevel::Debug => "调试",
            LogLevel::Info => "提示",
            LogLevel::Warn => "警告",
            LogLevel::Error => "错误",
        }
    }
}

/// 交给调用方日志钩子的一条日志。
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    pub target: String,
    pub message: String,
    pub timestamp: DateTime<Local>,
}

/// 构建把每条日志转交给 `hook` 的 fern 分发器，但不安装为全局日志。
pub fn build_dispatch<F>(level: LevelFilter, hook: F) -> Dispatch
where
    F: Fn(LogEntry) + Send + Sync + 'static,
{
    Dispatch::new()
        .level(level)
        .chain(fern::Output::call(move |record| {
            hook(LogEntry {
                level: LogLevel::from(record.level()),
                target: record.target().to_string(),
                message: format!("{}", record.args()),
                timestamp: Local::now(),
            });
        }))
}

/// 安装全局日志，所有日志经由 `hook` 交给调用方。
///
/// 本库自身从不安装日志；进程内只能成功调用一次。
pub fn init_logger<F>(level: LevelFilter, hook: F) -> Result<(), log::SetLoggerError>
where
    F: Fn(LogEntry) + Send + Sync + 'static,
{
    build_dispatch(level, hook).apply()?;
    log::debug!("[Logger] 日志钩子已安装，级别: {level}");
    Ok(())
}
