//! 容器设置
//!
//! ```toml
//! id = "orders"
//! allow_bean_definition_overriding = false
//! isolate_listener_failures = true
//! lazy_init_by_default = false
//!
//! [logging]
//! level = "debug"
//! format = "compact"
//! ```

use serde::Deserialize;

use crate::error::{BeansError, BeansResult};
use crate::logging::LoggingConfig;
use crate::resource::Resource;

/// 默认的上下文 ID
pub const DEFAULT_CONTEXT_ID: &str = "application";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// 上下文 ID（出现在生命周期事件与日志中）
    pub id: String,

    /// 是否允许同名 Bean 定义覆盖（默认：false）
    pub allow_bean_definition_overriding: bool,

    /// 监听器失败时是否继续投递给后续监听器（默认：false）
    pub isolate_listener_failures: bool,

    /// 未显式声明的单例是否默认延迟初始化（默认：false）
    pub lazy_init_by_default: bool,

    pub logging: LoggingConfig,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            id: DEFAULT_CONTEXT_ID.to_string(),
            allow_bean_definition_overriding: false,
            isolate_listener_failures: false,
            lazy_init_by_default: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl ContainerSettings {
    pub fn from_toml_str(content: &str) -> BeansResult<Self> {
        toml::from_str(content)
            .map_err(|e| BeansError::Configuration(format!("Invalid container settings: {}", e)))
    }

    pub fn from_resource(resource: &dyn Resource) -> BeansResult<Self> {
        let content = resource.read_to_string().map_err(|e| {
            BeansError::Configuration(format!(
                "Failed to read container settings from {}: {}",
                resource.description(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }
}
