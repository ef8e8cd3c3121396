// arbor-core: 类似 Spring 的进程内 IoC 容器
//
// 提供类型安全的 Bean 容器，支持：
// - 单例和原型作用域
// - 构造函数、属性与工厂方法注入
// - 生命周期管理（Aware / init / destroy 回调）
// - BeanPostProcessor 链与应用事件

pub mod bean;
pub mod bean_factory;
pub mod bean_post_processor;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod logging;
pub mod registry;
pub mod resource;
pub mod scope;
pub mod settings;
mod singleton;
pub mod utils;
pub mod value;

// 重新导出常用类型
pub use bean::{
    BeanDefinition, BeanDefinitionBuilder, BeanInstance, ConstructorArg, FactoryBean, PropertyValue,
    SharedInstance, ValueSource,
};
pub use bean_factory::{
    BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, ListableBeanFactory, ValueResolver,
};
pub use bean_post_processor::BeanPostProcessor;
pub use config::{
    ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource, PropertySource,
    TomlPropertySource,
};
pub use constants::*;
pub use context::{ApplicationContext, ApplicationContextBuilder};
pub use error::{BeansError, BeansResult, DestructionFailure, Result};
pub use event::{
    ApplicationEventMulticaster, ApplicationEventPublisher, ContextClosedEvent,
    ContextRefreshedEvent, ErrorHandler, Event, EventListener, SimpleApplicationEventMulticaster,
    TypedEventListener, TypedEventListenerAdapter,
};
pub use lifecycle::{
    BeanFactoryAware, BeanFactoryPostProcessor, BeanNameAware, Capability, DisposableBean,
    InitializingBean, SmartInitializingSingleton,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use registry::BeanDefinitionRegistry;
pub use resource::{ByteArrayResource, FileSystemResource, InputStreamSource, Resource};
pub use scope::Scope;
pub use settings::ContainerSettings;
pub use value::{Arguments, BeanValue, SharedBean};

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::bean::{BeanDefinition, BeanInstance, FactoryBean, SharedInstance, ValueSource};
    pub use crate::bean_factory::{
        BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
        DefaultListableBeanFactory, ListableBeanFactory,
    };
    pub use crate::bean_post_processor::BeanPostProcessor;
    pub use crate::config::{
        ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource, PropertySource,
        TomlPropertySource,
    };
    pub use crate::context::{ApplicationContext, ApplicationContextBuilder};
    pub use crate::error::{BeansError, BeansResult};
    pub use crate::event::{
        ApplicationEventPublisher, ContextClosedEvent, ContextRefreshedEvent, Event,
        EventListener, TypedEventListener,
    };
    pub use crate::lifecycle::{
        BeanFactoryAware, BeanFactoryPostProcessor, BeanNameAware, DisposableBean,
        InitializingBean, SmartInitializingSingleton,
    };
    pub use crate::registry::BeanDefinitionRegistry;
    pub use crate::scope::Scope;
    pub use crate::settings::ContainerSettings;
    pub use crate::value::{Arguments, BeanValue};
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
