//! 生命周期与 Aware 回调
//!
//! 这些 trait 对应容器在创建 Bean 时可以调度的能力（capability）。
//! Bean 类型实现 trait 后，需要在定义上声明对应的能力，
//! 引擎只对声明过的能力进行调度，不做运行时类型探测。

use std::sync::{Arc, Weak};

use crate::bean_factory::{BeanFactory, DefaultListableBeanFactory};

/// 类似 Spring 的 BeanNameAware
pub trait BeanNameAware {
    /// 在属性填充之后、初始化之前调用
    fn set_bean_name(&mut self, name: &str);
}

/// 类似 Spring 的 BeanFactoryAware
///
/// 持有的是弱引用：Bean 由工厂拥有，反向强引用会形成环
pub trait BeanFactoryAware {
    fn set_bean_factory(&mut self, bean_factory: Weak<dyn BeanFactory>);
}

/// 类似 Spring 的 InitializingBean，在配置的 init-method 之前执行
pub trait InitializingBean {
    fn after_properties_set(&mut self) -> anyhow::Result<()>;
}

/// 类似 Spring 的 DisposableBean，在配置的 destroy-method 之前执行
///
/// 销毁时实例已被共享，所以只拿到共享引用
pub trait DisposableBean {
    fn destroy(&self) -> anyhow::Result<()>;
}

/// 所有非延迟单例实例化完成后的回调
pub trait SmartInitializingSingleton: Send + Sync {
    fn after_singletons_instantiated(&self) -> anyhow::Result<()>;
}

/// BeanFactoryPostProcessor - 在 Bean 定义加载后、任何 Bean 实例化之前执行
///
/// 可以注册、移除 Bean 定义或添加 BeanPostProcessor
pub trait BeanFactoryPostProcessor: Send + Sync {
    fn post_process_bean_factory(
        &self,
        bean_factory: &Arc<DefaultListableBeanFactory>,
    ) -> anyhow::Result<()>;

    /// 优先级（数字越小越先执行）
    fn order(&self) -> i32 {
        0
    }
}

/// 能力标签：定义上声明的回调能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    BeanNameAware,
    BeanFactoryAware,
    InitializingBean,
    DisposableBean,
    FactoryBean,
    BeanPostProcessor,
    ApplicationListener,
    SmartInitializingSingleton,
}
