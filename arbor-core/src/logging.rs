//! 容器日志初始化
//!
//! 引擎内部统一使用 `tracing` 宏输出：查找为 trace，缓存命中与注册为 debug，
//! 单例创建与上下文生命周期为 info，覆盖与被隔离的失败为 warn，销毁失败为 error。
//! 这里只负责按配置安装 `tracing_subscriber::fmt` 订阅者。

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::error::{BeansError, BeansResult};

/// 容器自身日志的 target（crate 名）
pub const CONTAINER_LOG_TARGET: &str = "arbor_core";

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("warning") {
            return Ok(LogLevel::Warn);
        }
        let level = s
            .parse::<Level>()
            .map_err(|_| format!("Invalid log level: {}", s))?;
        let levels = [
            (Level::TRACE, LogLevel::Trace),
            (Level::DEBUG, LogLevel::Debug),
            (Level::INFO, LogLevel::Info),
            (Level::WARN, LogLevel::Warn),
        ];
        Ok(levels
            .into_iter()
            .find(|(candidate, _)| *candidate == level)
            .map_or(LogLevel::Error, |(_, mapped)| mapped))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 紧凑格式（默认）
    Compact,
    Full,
    Json,
    /// 多行美化格式
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "full" => Ok(LogFormat::Full),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// 日志配置
///
/// 作为 `ContainerSettings` 的 `[logging]` 表从 TOML 加载：
///
/// ```toml
/// [logging]
/// level = "info"
/// container_level = "debug"   # 只调整容器引擎自身的输出
/// format = "json"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 全局日志级别（默认：Info）
    pub level: LogLevel,

    /// 容器引擎（`arbor_core` target）的单独级别
    pub container_level: Option<LogLevel>,

    pub format: LogFormat,

    /// 是否显示目标（模块路径）
    pub show_target: bool,

    pub show_thread_ids: bool,

    pub show_thread_names: bool,

    /// 完整的过滤指令，设置后忽略 `level` 和 `container_level`
    /// 例如："arbor_core=trace,my_app=info"
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            container_level: None,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
            show_thread_names: false,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn container_level(mut self, level: LogLevel) -> Self {
        self.container_level = Some(level);
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn show_thread_ids(mut self, show: bool) -> Self {
        self.show_thread_ids = show;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// 从环境变量读取配置：`RUST_LOG`、`LOG_LEVEL`、`LOG_FORMAT`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值查找函数读取配置，无法解析的值保持默认
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.filter = lookup("RUST_LOG").filter(|f| !f.trim().is_empty());
        if let Some(level) = lookup("LOG_LEVEL").and_then(|v| v.parse().ok()) {
            config.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT").and_then(|v| v.parse().ok()) {
            config.format = format;
        }
        config
    }

    /// 生成过滤指令
    pub fn directives(&self) -> String {
        if let Some(filter) = &self.filter {
            return filter.clone();
        }
        match self.container_level {
            Some(container) => format!("{},{}={}", self.level, CONTAINER_LOG_TARGET, container),
            None => self.level.to_string(),
        }
    }

    /// 构建过滤器，非法指令返回配置错误
    pub fn build_filter(&self) -> BeansResult<EnvFilter> {
        let directives = self.directives();
        EnvFilter::try_new(&directives).map_err(|e| {
            BeansError::Configuration(format!("Invalid log filter '{}': {}", directives, e))
        })
    }

    /// 安装全局订阅者；已安装时返回配置错误
    pub fn init(self) -> BeansResult<()> {
        let filter = self.build_filter()?;
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_thread_names(self.show_thread_names);

        let result = match self.format {
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Full => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };
        result.map_err(|e| BeansError::Configuration(format!("Failed to initialize logging: {}", e)))?;

        tracing::debug!("Logging initialized with filter '{}'", self.directives());
        Ok(())
    }
}
