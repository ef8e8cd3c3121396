use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;

use crate::error::{BeansError, BeansResult};
use crate::resource::{FileSystemResource, Resource};

/// 占位符前缀
const PLACEHOLDER_PREFIX: &str = "${";
/// 占位符后缀
const PLACEHOLDER_SUFFIX: char = '}';
/// 默认值分隔符
const VALUE_SEPARATOR: char = ':';
/// 嵌套解析的最大深度
const MAX_PLACEHOLDER_DEPTH: usize = 32;

/// 配置值类型
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    /// 转换为字符串
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 转换为整数
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// 转换为浮点数
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Int(i) => Some(*i as f64),
            ConfigValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// 转换为布尔值
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// 标量的文本表示，用于占位符替换
    pub fn to_text(&self) -> Option<String> {
        match self {
            ConfigValue::String(s) => Some(s.clone()),
            ConfigValue::Int(i) => Some(i.to_string()),
            ConfigValue::Float(f) => Some(f.to_string()),
            ConfigValue::Bool(b) => Some(b.to_string()),
            ConfigValue::Array(items) => {
                let parts: Option<Vec<String>> = items.iter().map(ConfigValue::to_text).collect();
                parts.map(|p| p.join(","))
            }
            ConfigValue::Object(_) => None,
        }
    }
}

/// 配置源 trait
pub trait PropertySource: Send + Sync {
    /// 获取配置源名称
    fn name(&self) -> &str;

    /// 获取配置值
    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// 获取所有配置键
    fn keys(&self) -> Vec<String>;

    /// 配置源优先级（数字越大优先级越高）
    fn priority(&self) -> i32 {
        0
    }
}

/// Environment - 配置管理器
///
/// 类似 Spring 的 Environment，提供统一的配置访问接口和 `${key:default}` 占位符解析
pub struct Environment {
    /// 配置源列表（按优先级排序）
    sources: RwLock<Vec<Box<dyn PropertySource>>>,

    /// 当前激活的 profile
    active_profiles: RwLock<Vec<String>>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("active_profiles", &*self.active_profiles.read())
            .field("sources", &self.property_source_names())
            .finish()
    }
}

impl Environment {
    /// 创建新的环境
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            active_profiles: RwLock::new(Vec::new()),
        }
    }

    /// 添加配置源
    pub fn add_property_source(&self, source: Box<dyn PropertySource>) {
        tracing::debug!(
            "Adding property source '{}' with priority {}",
            source.name(),
            source.priority()
        );
        let mut sources = self.sources.write();
        sources.push(source);
        // 按优先级降序排序（稳定排序，同优先级先加入者优先）
        sources.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn property_source_names(&self) -> Vec<String> {
        self.sources
            .read()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// 获取配置值
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        let sources = self.sources.read();
        for source in sources.iter() {
            if let Some(value) = source.get(key) {
                tracing::trace!("Config '{}' found in source '{}'", key, source.name());
                return Some(value);
            }
        }
        tracing::trace!("Config '{}' not found in any source", key);
        None
    }

    /// 获取字符串配置
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.to_text())
    }

    /// 获取整数配置
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    /// 获取布尔值配置
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// 获取字符串数组配置
    /// 支持两种格式:
    /// 1. TOML数组: key = ["a", "b", "c"]
    /// 2. 逗号分隔字符串: key = "a, b, c"
    pub fn get_string_array(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            ConfigValue::Array(arr) => Some(arr.iter().filter_map(|v| v.to_text()).collect()),
            ConfigValue::String(s) => Some(
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            _ => None,
        }
    }

    /// 设置激活的 profile
    pub fn set_active_profiles(&self, profiles: Vec<String>) {
        *self.active_profiles.write() = profiles;
    }

    /// 检查是否包含指定的 profile
    pub fn accepts_profiles(&self, profile: &str) -> bool {
        self.active_profiles.read().iter().any(|p| p == profile)
    }

    /// 解析 `${key}` / `${key:default}` 占位符
    ///
    /// 没有默认值且无法解析的占位符返回 `Configuration` 错误
    pub fn resolve_placeholders(&self, text: &str) -> BeansResult<String> {
        self.resolve_nested(text, 0)
    }

    fn resolve_nested(&self, text: &str, depth: usize) -> BeansResult<String> {
        if depth > MAX_PLACEHOLDER_DEPTH {
            return Err(BeansError::Configuration(format!(
                "Circular placeholder reference in '{}'",
                text
            )));
        }

        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(PLACEHOLDER_PREFIX) {
            result.push_str(&rest[..start]);
            let after = &rest[start + PLACEHOLDER_PREFIX.len()..];
            let end = find_placeholder_end(after).ok_or_else(|| {
                BeansError::Configuration(format!("Unclosed placeholder in '{}'", text))
            })?;
            let body = &after[..end];
            let (key, default) = match split_default(body) {
                Some((key, default)) => (key, Some(default)),
                None => (body, None),
            };
            let key = self.resolve_nested(key, depth + 1)?;

            let value = match (self.get_string(&key), default) {
                (Some(value), _) => value,
                (None, Some(default)) => default.to_string(),
                (None, None) => {
                    return Err(BeansError::Configuration(format!(
                        "Could not resolve placeholder '{}' in value \"{}\"",
                        key, text
                    )))
                }
            };
            result.push_str(&self.resolve_nested(&value, depth + 1)?);
            rest = &after[end + 1..];
        }
        result.push_str(rest);
        Ok(result)
    }
}

/// 找到与开头 `${` 匹配的 `}`，支持嵌套
fn find_placeholder_end(text: &str) -> Option<usize> {
    let mut nesting = 0usize;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(PLACEHOLDER_PREFIX.as_bytes()) {
            nesting += 1;
            i += PLACEHOLDER_PREFIX.len();
            continue;
        }
        if bytes[i] == PLACEHOLDER_SUFFIX as u8 {
            if nesting == 0 {
                return Some(i);
            }
            nesting -= 1;
        }
        i += 1;
    }
    None
}

/// 在顶层（不在嵌套占位符内）按第一个 `:` 拆分键和默认值
fn split_default(body: &str) -> Option<(&str, &str)> {
    let mut nesting = 0usize;
    for (i, ch) in body.char_indices() {
        match ch {
            '$' if body[i..].starts_with(PLACEHOLDER_PREFIX) => nesting += 1,
            PLACEHOLDER_SUFFIX => nesting = nesting.saturating_sub(1),
            VALUE_SEPARATOR if nesting == 0 => return Some((&body[..i], &body[i + 1..])),
            _ => {}
        }
    }
    None
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Property Sources ==========

/// 环境变量配置源
pub struct EnvironmentPropertySource {
    prefix: String,
    priority: i32,
}

impl EnvironmentPropertySource {
    /// 创建环境变量配置源
    ///
    /// # 参数
    /// * `prefix` - 环境变量前缀，例如 "APP_"
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            priority: 100, // 环境变量优先级较高
        }
    }

    /// 将环境变量名转换为配置键
    /// 例如: APP_DATABASE_URL -> database.url
    fn env_to_key(&self, env_key: &str) -> String {
        env_key
            .strip_prefix(&self.prefix)
            .unwrap_or(env_key)
            .to_lowercase()
            .replace('_', ".")
    }

    /// 将配置键转换为环境变量名
    /// 例如: database.url -> APP_DATABASE_URL
    fn key_to_env(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.replace(['.', '-'], "_").to_uppercase())
    }
}

impl PropertySource for EnvironmentPropertySource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        std::env::var(self.key_to_env(key))
            .ok()
            .map(ConfigValue::String)
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars()
            .filter(|(k, _)| k.starts_with(&self.prefix))
            .map(|(k, _)| self.env_to_key(&k))
            .collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// TOML 配置源
pub struct TomlPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl TomlPropertySource {
    /// 从文件加载 TOML 配置
    pub fn from_file(path: impl AsRef<Path>) -> BeansResult<Self> {
        Self::from_resource(&FileSystemResource::new(path))
    }

    /// 从资源加载 TOML 配置
    pub fn from_resource(resource: &dyn Resource) -> BeansResult<Self> {
        let content = resource.read_to_string().map_err(|e| {
            BeansError::Configuration(format!(
                "Failed to read {}: {}",
                resource.description(),
                e
            ))
        })?;
        Self::from_str(&content, resource.description())
    }

    /// 从字符串解析 TOML 配置
    pub fn from_str(content: &str, name: impl Into<String>) -> BeansResult<Self> {
        let name = name.into();
        let value: toml::Value = toml::from_str(content).map_err(|e| {
            BeansError::Configuration(format!("Failed to parse TOML from {}: {}", name, e))
        })?;

        let mut properties = HashMap::new();
        Self::flatten_toml(&value, String::new(), &mut properties);

        Ok(Self {
            name,
            properties,
            priority: 0, // 文件配置优先级最低
        })
    }

    /// 展平 TOML 结构
    /// 例如: { database: { url: "xxx" } } -> { "database.url": "xxx" }
    fn flatten_toml(value: &toml::Value, prefix: String, result: &mut HashMap<String, ConfigValue>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let new_prefix = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    Self::flatten_toml(val, new_prefix, result);
                }
            }
            other => {
                result.insert(prefix, Self::toml_value_to_config(other));
            }
        }
    }

    /// 转换 TOML 值为 ConfigValue
    fn toml_value_to_config(value: &toml::Value) -> ConfigValue {
        match value {
            toml::Value::String(s) => ConfigValue::String(s.clone()),
            toml::Value::Integer(i) => ConfigValue::Int(*i),
            toml::Value::Float(f) => ConfigValue::Float(*f),
            toml::Value::Boolean(b) => ConfigValue::Bool(*b),
            toml::Value::Array(arr) => {
                ConfigValue::Array(arr.iter().map(Self::toml_value_to_config).collect())
            }
            toml::Value::Table(table) => ConfigValue::Object(
                table
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::toml_value_to_config(v)))
                    .collect(),
            ),
            toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
        }
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for TomlPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 内存配置源（用于测试或运行时配置）
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
            priority: 50,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ByteArrayResource;

    fn environment() -> Environment {
        let env = Environment::new();
        env.add_property_source(Box::new(
            MapPropertySource::new("defaults")
                .with_property("db.host", ConfigValue::String("localhost".into()))
                .with_property("db.port", ConfigValue::Int(5432))
                .with_property(
                    "db.url",
                    ConfigValue::String("postgres://${db.host}:${db.port}".into()),
                )
                .with_property("which", ConfigValue::String("host".into()))
                .with_property("pool.enabled", ConfigValue::String("yes".into())),
        ));
        env
    }

    #[test]
    fn test_priority_order() {
        let env = environment();
        env.add_property_source(Box::new(
            MapPropertySource::new("overrides")
                .with_property("db.host", ConfigValue::String("db.internal".into()))
                .with_priority(90),
        ));

        assert_eq!(env.get_string("db.host").unwrap(), "db.internal");
        assert_eq!(env.get_i64("db.port"), Some(5432));
        assert_eq!(env.property_source_names(), vec!["overrides", "defaults"]);
        assert_eq!(env.get_bool("pool.enabled"), Some(true));
        assert_eq!(env.get_bool("db.host"), None);
    }

    #[test]
    fn test_placeholder_resolution() {
        let env = environment();
        assert_eq!(
            env.resolve_placeholders("url=${db.url}").unwrap(),
            "url=postgres://localhost:5432"
        );
        assert_eq!(env.resolve_placeholders("${missing:fallback}").unwrap(), "fallback");
        assert_eq!(env.resolve_placeholders("${missing:}").unwrap(), "");
        assert_eq!(env.resolve_placeholders("${db.${which}}").unwrap(), "localhost");
        assert_eq!(
            env.resolve_placeholders("${missing:${db.host}}").unwrap(),
            "localhost"
        );
        assert_eq!(env.resolve_placeholders("plain text").unwrap(), "plain text");
    }

    #[test]
    fn test_unresolvable_placeholder_fails() {
        let env = environment();
        assert!(matches!(
            env.resolve_placeholders("${missing}"),
            Err(BeansError::Configuration(_))
        ));
        assert!(env.resolve_placeholders("${unclosed").is_err());
    }

    #[test]
    fn test_circular_placeholder_fails() {
        let env = Environment::new();
        env.add_property_source(Box::new(
            MapPropertySource::new("loop").with_property("a", ConfigValue::String("${a}".into())),
        ));
        assert!(env.resolve_placeholders("${a}").is_err());
    }

    #[test]
    fn test_toml_source_from_resource() {
        let resource = ByteArrayResource::new(
            r#"
            [server]
            port = 8080
            hosts = ["a", "b"]
            "#,
        );
        let source = TomlPropertySource::from_resource(&resource).unwrap();
        assert_eq!(source.get("server.port"), Some(ConfigValue::Int(8080)));

        let env = Environment::new();
        env.add_property_source(Box::new(source));
        assert_eq!(
            env.get_string_array("server.hosts").unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let result = TomlPropertySource::from_str("not = [valid", "broken");
        assert!(matches!(result, Err(BeansError::Configuration(_))));
    }

    #[test]
    fn test_profiles() {
        let env = Environment::new();
        env.set_active_profiles(vec!["dev".to_string()]);
        assert!(env.accepts_profiles("dev"));
        assert!(!env.accepts_profiles("prod"));
    }
}
