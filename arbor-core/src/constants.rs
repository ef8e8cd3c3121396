/// 容器保留的名称常量
///
/// 上下文在刷新时以这些名称注册内置单例，用户定义不应占用它们

/// FactoryBean 解引用前缀：`&name` 返回工厂本身而不是其产品
pub const FACTORY_BEAN_PREFIX: &str = "&";

/// Environment 相关常量
pub const ENVIRONMENT_BEAN_NAME: &str = "environment";

/// EventPublisher 相关常量
pub const EVENT_PUBLISHER_BEAN_NAME: &str = "eventPublisher";

/// 内部 Bean 生成名称的分隔符
pub const GENERATED_BEAN_NAME_SEPARATOR: &str = "#";

/// 所有内置单例的名称
pub const ALL_CORE_COMPONENT_BEAN_NAMES: &[&str] = &[ENVIRONMENT_BEAN_NAME, EVENT_PUBLISHER_BEAN_NAME];

/// 检查给定的名称是否为内置单例
///
/// # Example
/// ```
/// use arbor_core::constants::is_core_component_bean_name;
///
/// assert!(is_core_component_bean_name("environment"));
/// assert!(!is_core_component_bean_name("userService"));
/// ```
pub fn is_core_component_bean_name(name: &str) -> bool {
    ALL_CORE_COMPONENT_BEAN_NAMES.contains(&name)
}

/// 是否为 FactoryBean 解引用名称（`&name`）
pub fn is_factory_dereference(name: &str) -> bool {
    name.starts_with(FACTORY_BEAN_PREFIX)
}

/// 去掉所有 `&` 前缀
pub fn transformed_bean_name(name: &str) -> &str {
    name.trim_start_matches(FACTORY_BEAN_PREFIX)
}
