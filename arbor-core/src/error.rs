//! 容器统一错误类型
//!
//! `BeansError` 是所有容器错误的公共根，调用方可以在边界处统一捕获。
//! 用户提供的回调（构造函数、setter、init/destroy、监听器、后置处理器）
//! 返回 `anyhow::Result`，其错误会作为 `BeanCreation` 的 source 链式保留。

use std::error::Error as StdError;

/// 链式错误源
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// 容器 Result 别名
pub type BeansResult<T> = std::result::Result<T, BeansError>;

/// 兼容 anyhow 风格的 Result（用于用户回调）
pub use anyhow::Result;

/// 容器错误
#[derive(Debug, thiserror::Error)]
pub enum BeansError {
    /// 找不到指定名称（或别名）的 Bean 定义
    #[error("No bean named '{name}' available")]
    NoSuchBeanDefinition { name: String },

    /// 按类型查找时匹配到多个候选
    #[error("No qualifying bean of type '{type_name}' available: expected single matching bean but found {}: {}", .candidates.len(), .candidates.join(", "))]
    NoUniqueBeanDefinition {
        type_name: String,
        candidates: Vec<String>,
    },

    /// 非法或重复的注册
    #[error("Invalid bean definition with name '{name}': {message}")]
    BeanDefinitionStore { name: String, message: String },

    /// Bean 定义结构不合法
    #[error("Validation of bean definition '{name}' failed: {message}")]
    BeanDefinitionValidation { name: String, message: String },

    /// 解析过程中检测到循环依赖
    #[error(
        "Error creating bean with name '{name}': Requested bean is currently in creation: \
         Is there an unresolvable circular reference? ({})",
        .chain.join(" -> ")
    )]
    BeanCurrentlyInCreation { name: String, chain: Vec<String> },

    /// 类型化查找时类型不匹配
    #[error("Bean named '{name}' is expected to be of type '{required}' but was actually of type '{actual}'")]
    BeanNotOfRequiredType {
        name: String,
        required: String,
        actual: String,
    },

    /// 抽象定义不能被实例化
    #[error("Error creating bean with name '{name}': Bean definition is abstract")]
    BeanIsAbstract { name: String },

    /// 创建过程（实例化、属性填充、初始化）中的任意失败
    #[error("Error creating bean with name '{name}': {message}")]
    BeanCreation {
        name: String,
        message: String,
        #[source]
        source: BoxError,
    },

    /// 监听器处理事件失败
    #[error("Listener '{listener}' failed to handle event '{event}'")]
    EventDelivery {
        listener: String,
        event: String,
        #[source]
        source: BoxError,
    },

    /// 销毁阶段累积的失败
    #[error("{} bean(s) failed to destroy: {}", .failures.len(), DestructionFailure::names(.failures))]
    Destruction { failures: Vec<DestructionFailure> },

    /// 配置加载失败
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// 单个 Bean 的销毁失败记录
#[derive(Debug)]
pub struct DestructionFailure {
    pub bean_name: String,
    pub error: anyhow::Error,
}

impl DestructionFailure {
    fn names(failures: &[DestructionFailure]) -> String {
        failures
            .iter()
            .map(|f| format!("'{}'", f.bean_name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl BeansError {
    pub fn no_such_bean(name: impl Into<String>) -> Self {
        Self::NoSuchBeanDefinition { name: name.into() }
    }

    pub fn store(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BeanDefinitionStore {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn validation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BeanDefinitionValidation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// 包装创建阶段的失败，`source` 可以是内层 `BeansError` 或用户回调的 `anyhow::Error`
    pub fn creation(
        name: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::BeanCreation {
            name: name.into(),
            message: message.into(),
            source: source.into(),
        }
    }

    /// 错误所指向的 Bean 名称（如果有）
    pub fn bean_name(&self) -> Option<&str> {
        match self {
            Self::NoSuchBeanDefinition { name }
            | Self::BeanDefinitionStore { name, .. }
            | Self::BeanDefinitionValidation { name, .. }
            | Self::BeanCurrentlyInCreation { name, .. }
            | Self::BeanNotOfRequiredType { name, .. }
            | Self::BeanIsAbstract { name }
            | Self::BeanCreation { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    /// 沿 source 链找到最内层的错误
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    /// 在 source 链中查找第一个满足条件的 `BeansError`
    pub fn find_in_chain<F>(&self, predicate: F) -> Option<&BeansError>
    where
        F: Fn(&BeansError) -> bool,
    {
        let mut current: Option<&(dyn StdError + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(beans_err) = err.downcast_ref::<BeansError>() {
                if predicate(beans_err) {
                    return Some(beans_err);
                }
            }
            current = err.source();
        }
        None
    }

    pub fn is_currently_in_creation(&self) -> bool {
        matches!(self, Self::BeanCurrentlyInCreation { .. })
    }
}
