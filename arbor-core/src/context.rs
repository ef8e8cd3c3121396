use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bean_factory::{
    BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, ListableBeanFactory,
};
use crate::bean_post_processor::BeanPostProcessor;
use crate::constants::{ENVIRONMENT_BEAN_NAME, EVENT_PUBLISHER_BEAN_NAME};
use crate::{
    bean::{BeanDefinition, SharedInstance},
    config::{Environment, PropertySource},
    error::{BeansError, BeansResult},
    event::{
        ApplicationEventPublisher, ContextClosedEvent, ContextRefreshedEvent, Event, EventListener,
        SimpleApplicationEventMulticaster,
    },
    lifecycle::{BeanFactoryPostProcessor, Capability},
    registry::BeanDefinitionRegistry,
    settings::ContainerSettings,
    value::SharedBean,
    Scope,
};

/// 应用上下文
///
/// ApplicationContext 持有 BeanFactory、Environment 和 EventPublisher，
/// 负责刷新（实例化单例、注册扩展点）与关闭（销毁单例）的整个流程。
/// 每个上下文都是独立的值，可以同时存在多个。
pub struct ApplicationContext {
    /// 上下文 ID（用于事件与日志）
    id: String,

    /// Bean 工厂 - 负责 Bean 的创建和管理
    bean_factory: Arc<DefaultListableBeanFactory>,

    /// 配置环境
    environment: Arc<Environment>,

    multicaster: Arc<SimpleApplicationEventMulticaster>,

    /// 事件发布器
    event_publisher: Arc<ApplicationEventPublisher>,

    /// Bean 工厂后置处理器列表（按优先级排序）
    bean_factory_post_processors: RwLock<Vec<Arc<dyn BeanFactoryPostProcessor>>>,

    refreshed: AtomicBool,

    closed: AtomicBool,
}

impl ApplicationContext {
    /// 使用默认设置创建上下文
    pub fn new() -> Self {
        Self::with_settings(&ContainerSettings::default())
    }

    pub fn with_settings(settings: &ContainerSettings) -> Self {
        let bean_factory = DefaultListableBeanFactory::new();
        bean_factory.set_allow_bean_definition_overriding(settings.allow_bean_definition_overriding);
        bean_factory.set_lazy_init_by_default(settings.lazy_init_by_default);

        let multicaster = Arc::new(SimpleApplicationEventMulticaster::new());
        multicaster.set_isolate_failures(settings.isolate_listener_failures);

        Self {
            id: settings.id.clone(),
            bean_factory,
            environment: Arc::new(Environment::new()),
            event_publisher: Arc::new(ApplicationEventPublisher::new(multicaster.clone())),
            multicaster,
            bean_factory_post_processors: RwLock::new(Vec::new()),
            refreshed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// 构建器模式创建上下文
    pub fn builder() -> ApplicationContextBuilder {
        ApplicationContextBuilder::new()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 获取内部的 BeanFactory
    pub fn get_bean_factory(&self) -> &Arc<DefaultListableBeanFactory> {
        &self.bean_factory
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    pub fn event_publisher(&self) -> &Arc<ApplicationEventPublisher> {
        &self.event_publisher
    }

    /// 获取多播器（用于配置错误处理器）
    pub fn multicaster(&self) -> &Arc<SimpleApplicationEventMulticaster> {
        &self.multicaster
    }

    /// 已刷新且未关闭
    pub fn is_active(&self) -> bool {
        self.refreshed.load(Ordering::Acquire) && !self.closed.load(Ordering::Acquire)
    }

    /// 注册 Bean 定义
    pub fn register(&self, definition: impl Into<BeanDefinition>) -> BeansResult<()> {
        self.bean_factory.register(definition)
    }

    pub fn register_alias(&self, name: &str, alias: &str) -> BeansResult<()> {
        self.bean_factory.register_alias(name, alias)
    }

    /// 手动注册已存在的单例实例
    pub fn register_instance<T: Any + Send + Sync>(&self, name: &str, instance: Arc<T>) -> BeansResult<()> {
        self.bean_factory.register_singleton(name, instance)
    }

    /// 注册单例 Bean
    pub fn register_singleton<T, F>(&self, name: impl Into<String>, factory: F) -> BeansResult<()>
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(BeanDefinition::builder(name, move |_| factory()).with_scope(Scope::Singleton))
    }

    /// 注册原型 Bean
    pub fn register_prototype<T, F>(&self, name: impl Into<String>, factory: F) -> BeansResult<()>
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(BeanDefinition::builder(name, move |_| factory()).with_scope(Scope::Prototype))
    }

    /// 添加 BeanPostProcessor（在定义中声明的后置处理器之前执行）
    pub fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        self.bean_factory.add_bean_post_processor(processor);
    }

    /// 添加 BeanFactoryPostProcessor（按 order 排序）
    pub fn add_bean_factory_post_processor(&self, processor: Arc<dyn BeanFactoryPostProcessor>) {
        let mut processors = self.bean_factory_post_processors.write();
        processors.push(processor);
        processors.sort_by_key(|p| p.order());
        tracing::debug!(
            "Registered BeanFactoryPostProcessor, total: {}",
            processors.len()
        );
    }

    /// 注册事件监听器
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.event_publisher.add_listener(listener);
    }

    /// 发布事件
    pub fn publish_event(&self, event: Arc<dyn Event>) -> BeansResult<()> {
        self.event_publisher.publish_event(event)
    }

    pub fn publish<E: Event>(&self, event: E) -> BeansResult<()> {
        self.event_publisher.publish(event)
    }

    /// 验证所有 Bean 的依赖关系
    ///
    /// 检查：
    /// - 缺失的依赖（声明的依赖没有注册）
    /// - 循环依赖（A -> B -> C -> A）
    pub fn validate_dependencies(&self) -> BeansResult<()> {
        self.bean_factory.validate_dependencies()?;
        tracing::info!(
            "Dependency validation passed for {} bean(s)",
            self.bean_factory.get_bean_definition_count()
        );
        Ok(())
    }

    /// 刷新上下文
    ///
    /// 1. 安装占位符解析器，注册核心组件
    /// 2. 执行 BeanFactoryPostProcessor
    /// 3. 注册声明为后置处理器、监听器的 Bean
    /// 4. 预实例化非延迟单例（含 SmartInitializingSingleton 回调）
    /// 5. 冻结配置并发布 ContextRefreshedEvent
    ///
    /// 任何一步失败都会销毁已经创建的单例
    pub fn refresh(&self) -> BeansResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BeansError::Configuration(format!(
                "Application context '{}' has already been closed",
                self.id
            )));
        }
        if self.refreshed.swap(true, Ordering::AcqRel) {
            return Err(BeansError::Configuration(format!(
                "Application context '{}' has already been refreshed",
                self.id
            )));
        }

        tracing::info!("Refreshing application context '{}'", self.id);

        if let Err(e) = self.do_refresh() {
            tracing::error!("Context refresh failed: {}", e);
            if let Err(destroy_error) = self.bean_factory.destroy_singletons() {
                tracing::error!("Cleanup after failed refresh reported errors: {}", destroy_error);
            }
            self.refreshed.store(false, Ordering::Release);
            return Err(e);
        }

        tracing::info!(
            "Application context '{}' refreshed with {} bean definition(s)",
            self.id,
            self.bean_factory.get_bean_definition_count()
        );
        Ok(())
    }

    fn do_refresh(&self) -> BeansResult<()> {
        self.prepare_bean_factory()?;
        self.invoke_bean_factory_post_processors()?;
        self.register_bean_post_processors()?;
        self.register_listeners()?;

        self.bean_factory.preinstantiate_singletons()?;
        self.bean_factory.freeze_configuration();

        self.publish(ContextRefreshedEvent::new(
            self.id.clone(),
            self.bean_factory.get_bean_definition_count(),
        ))
    }

    fn prepare_bean_factory(&self) -> BeansResult<()> {
        let environment = Arc::clone(&self.environment);
        self.bean_factory
            .set_embedded_value_resolver(Arc::new(move |value: &str| environment.resolve_placeholders(value)));

        if !self.bean_factory.contains_bean(ENVIRONMENT_BEAN_NAME) {
            self.bean_factory
                .register_singleton(ENVIRONMENT_BEAN_NAME, Arc::clone(&self.environment))?;
        }
        if !self.bean_factory.contains_bean(EVENT_PUBLISHER_BEAN_NAME) {
            self.bean_factory
                .register_singleton(EVENT_PUBLISHER_BEAN_NAME, Arc::clone(&self.event_publisher))?;
        }
        Ok(())
    }

    fn invoke_bean_factory_post_processors(&self) -> BeansResult<()> {
        let processors = self.bean_factory_post_processors.read().clone();

        if processors.is_empty() {
            tracing::debug!("No BeanFactoryPostProcessors to invoke");
            return Ok(());
        }

        tracing::info!("Invoking {} BeanFactoryPostProcessor(s)", processors.len());

        for processor in processors {
            processor
                .post_process_bean_factory(&self.bean_factory)
                .map_err(|e| match e.downcast::<BeansError>() {
                    Ok(inner) => inner,
                    Err(other) => BeansError::Configuration(format!(
                        "BeanFactoryPostProcessor failed: {:#}",
                        other
                    )),
                })?;
        }

        tracing::info!("All BeanFactoryPostProcessors invoked successfully");
        Ok(())
    }

    /// 按注册顺序实例化并注册声明了后置处理器能力的 Bean
    fn register_bean_post_processors(&self) -> BeansResult<()> {
        let names = self
            .bean_factory
            .get_bean_names_with_capability(Capability::BeanPostProcessor);
        if names.is_empty() {
            return Ok(());
        }

        tracing::info!("Registering {} BeanPostProcessor bean(s)", names.len());
        for name in names {
            if let Some(processor) = self
                .bean_factory
                .get_capability_bean(&name, |c| c.post_processor)?
            {
                tracing::debug!("  ├─ Registered BeanPostProcessor bean: {}", name);
                self.bean_factory.add_bean_post_processor(processor);
            }
        }
        Ok(())
    }

    fn register_listeners(&self) -> BeansResult<()> {
        let names = self
            .bean_factory
            .get_bean_names_with_capability(Capability::ApplicationListener);

        for name in names {
            if let Some(listener) = self
                .bean_factory
                .get_capability_bean(&name, |c| c.listener)?
            {
                tracing::debug!("Registered listener bean: {}", name);
                self.event_publisher.add_listener(listener);
            }
        }
        Ok(())
    }

    /// 关闭上下文：发布 ContextClosedEvent，然后按依赖逆序销毁单例
    ///
    /// 重复调用是无操作
    pub fn close(&self) -> BeansResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        tracing::info!("Closing application context '{}'", self.id);

        if self.refreshed.load(Ordering::Acquire) {
            if let Err(e) = self.publish(ContextClosedEvent::new(self.id.clone())) {
                tracing::warn!("Exception thrown from listener while publishing close event: {}", e);
            }
        }

        self.bean_factory.destroy_singletons()?;

        tracing::info!("Application context '{}' closed", self.id);
        Ok(())
    }
}

impl Default for ApplicationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanFactory for ApplicationContext {
    fn get_bean(&self, name: &str) -> BeansResult<SharedBean> {
        self.bean_factory.get_bean(name)
    }

    fn contains_bean(&self, name: &str) -> bool {
        self.bean_factory.contains_bean(name)
    }

    fn is_singleton(&self, name: &str) -> BeansResult<bool> {
        self.bean_factory.is_singleton(name)
    }

    fn is_prototype(&self, name: &str) -> BeansResult<bool> {
        self.bean_factory.is_prototype(name)
    }

    fn get_aliases(&self, name: &str) -> Vec<String> {
        BeanFactory::get_aliases(self.bean_factory.as_ref(), name)
    }
}

impl BeanFactoryExt for ApplicationContext {
    fn get_bean_typed<T: Any + Send + Sync>(&self, name: &str) -> BeansResult<Arc<T>> {
        self.bean_factory.get_bean_typed(name)
    }

    fn get_bean_as<I: ?Sized + 'static>(&self, name: &str) -> BeansResult<Arc<I>> {
        self.bean_factory.get_bean_as(name)
    }

    fn get_bean_by_type<T: Any + Send + Sync>(&self) -> BeansResult<Arc<T>> {
        self.bean_factory.get_bean_by_type()
    }

    fn contains_bean_by_type<T: Any + Send + Sync>(&self) -> bool {
        self.bean_factory.contains_bean_by_type::<T>()
    }
}

impl ListableBeanFactory for ApplicationContext {
    fn get_bean_names(&self) -> Vec<String> {
        self.bean_factory.get_bean_names()
    }

    fn get_bean_names_for_type(&self, type_id: TypeId) -> Vec<String> {
        self.bean_factory.get_bean_names_for_type(type_id)
    }

    fn get_bean_names_with_capability(&self, capability: Capability) -> Vec<String> {
        self.bean_factory.get_bean_names_with_capability(capability)
    }
}

/// 应用上下文构建器
///
/// 收集设置、配置源与 Bean 定义，`build()` 时一次性应用
pub struct ApplicationContextBuilder {
    settings: ContainerSettings,
    init_logging: bool,
    property_sources: Vec<Box<dyn PropertySource>>,
    active_profiles: Vec<String>,
    definitions: Vec<BeanDefinition>,
    instances: Vec<(String, SharedInstance)>,
    bean_post_processors: Vec<Arc<dyn BeanPostProcessor>>,
    bean_factory_post_processors: Vec<Arc<dyn BeanFactoryPostProcessor>>,
    listeners: Vec<Arc<dyn EventListener>>,
}

impl ApplicationContextBuilder {
    pub fn new() -> Self {
        Self {
            settings: ContainerSettings::default(),
            init_logging: false,
            property_sources: Vec::new(),
            active_profiles: Vec::new(),
            definitions: Vec::new(),
            instances: Vec::new(),
            bean_post_processors: Vec::new(),
            bean_factory_post_processors: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// 设置容器选项
    pub fn with_settings(mut self, settings: ContainerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.settings.id = id.into();
        self
    }

    /// 构建时按 `settings.logging` 初始化日志系统
    pub fn with_logging(mut self) -> Self {
        self.init_logging = true;
        self
    }

    /// 添加配置源到 Environment
    pub fn add_property_source(mut self, source: Box<dyn PropertySource>) -> Self {
        self.property_sources.push(source);
        self
    }

    /// 设置激活的 profiles
    pub fn set_active_profiles(mut self, profiles: Vec<String>) -> Self {
        self.active_profiles = profiles;
        self
    }

    /// 注册 Bean
    pub fn register(mut self, definition: impl Into<BeanDefinition>) -> Self {
        self.definitions.push(definition.into());
        self
    }

    /// 注册单例 Bean
    pub fn register_singleton<T, F>(self, name: impl Into<String>, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(BeanDefinition::builder(name, move |_| factory()).with_scope(Scope::Singleton))
    }

    /// 注册原型 Bean
    pub fn register_prototype<T, F>(self, name: impl Into<String>, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(BeanDefinition::builder(name, move |_| factory()).with_scope(Scope::Prototype))
    }

    /// 手动注册已存在的单例实例
    pub fn register_instance<T: Any + Send + Sync>(mut self, name: impl Into<String>, instance: Arc<T>) -> Self {
        self.instances.push((name.into(), SharedInstance::new(instance)));
        self
    }

    pub fn add_bean_post_processor(mut self, processor: Arc<dyn BeanPostProcessor>) -> Self {
        self.bean_post_processors.push(processor);
        self
    }

    pub fn add_bean_factory_post_processor(mut self, processor: Arc<dyn BeanFactoryPostProcessor>) -> Self {
        self.bean_factory_post_processors.push(processor);
        self
    }

    pub fn add_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// 构建上下文（尚未刷新）
    pub fn build(self) -> BeansResult<ApplicationContext> {
        if self.init_logging {
            if let Err(e) = self.settings.logging.clone().init() {
                tracing::debug!("Logging was not initialized by the context builder: {}", e);
            }
        }

        let context = ApplicationContext::with_settings(&self.settings);

        for source in self.property_sources {
            context.environment.add_property_source(source);
        }
        if !self.active_profiles.is_empty() {
            context.environment.set_active_profiles(self.active_profiles);
        }

        for definition in self.definitions {
            context.register(definition)?;
        }
        for (name, instance) in self.instances {
            context.bean_factory.register_shared_singleton(&name, instance)?;
        }
        for processor in self.bean_post_processors {
            context.add_bean_post_processor(processor);
        }
        for processor in self.bean_factory_post_processors {
            context.add_bean_factory_post_processor(processor);
        }
        for listener in self.listeners {
            context.add_listener(listener);
        }

        tracing::debug!(
            "Built application context '{}' with {} bean definition(s)",
            context.id,
            context.bean_factory.get_bean_definition_count()
        );
        Ok(context)
    }
}

impl Default for ApplicationContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::ValueSource;
    use crate::config::{ConfigValue, MapPropertySource};
    use crate::event::TypedEventListener;
    use crate::lifecycle::SmartInitializingSingleton;
    use parking_lot::Mutex;

    struct Endpoint {
        url: String,
    }

    #[test]
    fn test_placeholders_resolved_from_environment() {
        let context = ApplicationContext::builder()
            .add_property_source(Box::new(
                MapPropertySource::new("test")
                    .with_property("db.host", ConfigValue::String("localhost".to_string())),
            ))
            .register(
                BeanDefinition::builder("endpoint", |args| Ok(Endpoint { url: args.string(0)? }))
                    .with_constructor_arg(ValueSource::literal("pg://${db.host}:${db.port:5432}")),
            )
            .build()
            .unwrap();
        context.refresh().unwrap();

        let endpoint = context.get_bean_typed::<Endpoint>("endpoint").unwrap();
        assert_eq!(endpoint.url, "pg://localhost:5432");
        assert!(context.contains_bean(ENVIRONMENT_BEAN_NAME));
        assert!(context.get_bean_typed::<Environment>(ENVIRONMENT_BEAN_NAME).is_ok());
    }

    struct Recorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl TypedEventListener<ContextRefreshedEvent> for Recorder {
        fn on_event(&self, event: &ContextRefreshedEvent) -> anyhow::Result<()> {
            self.events
                .lock()
                .push(format!("refreshed:{}", event.context_id));
            Ok(())
        }
    }

    impl TypedEventListener<ContextClosedEvent> for Recorder {
        fn on_event(&self, event: &ContextClosedEvent) -> anyhow::Result<()> {
            self.events.lock().push(format!("closed:{}", event.context_id));
            Ok(())
        }
    }

    #[test]
    fn test_lifecycle_events_published() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::new(Recorder {
            events: Arc::clone(&events),
        });

        let context = ApplicationContext::builder().with_id("orders").build().unwrap();
        context
            .event_publisher()
            .add_typed_listener::<ContextRefreshedEvent, _>(Arc::clone(&recorder));
        context
            .event_publisher()
            .add_typed_listener::<ContextClosedEvent, _>(recorder);

        context.refresh().unwrap();
        assert!(context.is_active());
        context.close().unwrap();
        assert!(!context.is_active());
        context.close().unwrap();

        assert_eq!(
            *events.lock(),
            vec!["refreshed:orders".to_string(), "closed:orders".to_string()]
        );
    }

    #[test]
    fn test_refresh_twice_fails() {
        let context = ApplicationContext::new();
        context.refresh().unwrap();
        assert!(matches!(context.refresh(), Err(BeansError::Configuration(_))));
    }

    struct RenamingProcessor;

    impl BeanFactoryPostProcessor for RenamingProcessor {
        fn post_process_bean_factory(
            &self,
            bean_factory: &Arc<DefaultListableBeanFactory>,
        ) -> anyhow::Result<()> {
            bean_factory.register_alias("endpoint", "primaryEndpoint")?;
            Ok(())
        }
    }

    #[test]
    fn test_bean_factory_post_processor_runs_before_instantiation() {
        let context = ApplicationContext::builder()
            .register(BeanDefinition::builder("endpoint", |_| {
                Ok(Endpoint {
                    url: "mem://".to_string(),
                })
            }))
            .add_bean_factory_post_processor(Arc::new(RenamingProcessor))
            .build()
            .unwrap();
        context.refresh().unwrap();

        let endpoint = context.get_bean_typed::<Endpoint>("primaryEndpoint").unwrap();
        assert_eq!(endpoint.url, "mem://");
        assert!(context.get_bean_factory().is_configuration_frozen());
        assert!(context.register_singleton("late", || Ok(1u8)).is_err());
    }

    struct Warmup {
        ran: Mutex<bool>,
    }

    impl SmartInitializingSingleton for Warmup {
        fn after_singletons_instantiated(&self) -> anyhow::Result<()> {
            *self.ran.lock() = true;
            Ok(())
        }
    }

    #[test]
    fn test_smart_initializing_singleton_invoked() {
        let context = ApplicationContext::builder()
            .register(
                BeanDefinition::builder("warmup", |_| {
                    Ok(Warmup {
                        ran: Mutex::new(false),
                    })
                })
                .smart_initializing_singleton(),
            )
            .build()
            .unwrap();
        context.refresh().unwrap();

        assert!(*context.get_bean_typed::<Warmup>("warmup").unwrap().ran.lock());
    }

    #[test]
    fn test_failed_refresh_destroys_created_singletons() {
        let destroyed = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&destroyed);
        let context = ApplicationContext::builder()
            .register(
                BeanDefinition::builder("first", |_| Ok(Endpoint { url: String::new() })).with_destroy_method(
                    "close",
                    move |_| {
                        *flag.lock() = true;
                        Ok(())
                    },
                ),
            )
            .register(BeanDefinition::builder("broken", |_| -> anyhow::Result<Endpoint> {
                Err(anyhow::anyhow!("boom"))
            }))
            .build()
            .unwrap();

        let err = context.refresh().unwrap_err();
        assert_eq!(err.bean_name(), Some("broken"));
        assert!(*destroyed.lock());
        assert!(!context.is_active());
    }
}
