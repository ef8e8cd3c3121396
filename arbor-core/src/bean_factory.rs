//! Bean Factory - 核心容器接口
//!
//! 参考 Spring 的 BeanFactory 架构设计

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::{
    bean::{BeanDefinition, BeanInstance, Capabilities, FactoryBean, Instantiator, SharedInstance, ValueSource},
    bean_post_processor::BeanPostProcessor,
    constants::{
        is_core_component_bean_name, is_factory_dereference, transformed_bean_name, FACTORY_BEAN_PREFIX,
        GENERATED_BEAN_NAME_SEPARATOR,
    },
    error::{BeansError, BeansResult},
    lifecycle::Capability,
    registry::{BeanDefinitionRegistry, DefinitionStore},
    singleton::{Acquired, DisposableBeanAdapter, SingletonCache},
    utils::{
        dependency::{validate_dependency_graph, CreationTracker, DependencyValidationError},
        naming::inner_bean_name,
    },
    value::{Arguments, BeanValue, SharedBean},
};

/// 嵌入值解析器（例如 `${key:default}` 占位符）
pub type ValueResolver = Arc<dyn Fn(&str) -> BeansResult<String> + Send + Sync>;

/// BeanFactory - 最基础的容器接口
///
/// 提供基本的 Bean 访问功能，类似 Spring 的 BeanFactory
///
/// 注意：此 trait 不包含泛型方法，因此可以作为 trait object 使用
pub trait BeanFactory: Send + Sync {
    /// 通过名称（或别名）获取 Bean，必要时创建
    fn get_bean(&self, name: &str) -> BeansResult<SharedBean>;

    /// 检查是否包含指定名称的 Bean（定义或手动注册的单例）
    fn contains_bean(&self, name: &str) -> bool;

    /// 作用域查询，不会触发实例化
    fn is_singleton(&self, name: &str) -> BeansResult<bool>;

    fn is_prototype(&self, name: &str) -> BeansResult<bool>;

    /// 获取指定 Bean 的所有别名
    fn get_aliases(&self, name: &str) -> Vec<String>;
}

/// BeanFactoryExt - BeanFactory 的扩展 trait
///
/// 提供泛型方法，不能作为 trait object 使用
pub trait BeanFactoryExt: BeanFactory {
    /// 按名称获取并转换为具体类型或声明的接口类型
    fn get_bean_typed<T: Any + Send + Sync>(&self, name: &str) -> BeansResult<Arc<T>>;

    /// 按名称获取声明的接口类型（例如 `dyn Repository`）
    fn get_bean_as<I: ?Sized + 'static>(&self, name: &str) -> BeansResult<Arc<I>>;

    /// 通过类型获取唯一的 Bean
    fn get_bean_by_type<T: Any + Send + Sync>(&self) -> BeansResult<Arc<T>>;

    /// 检查是否包含指定类型的 Bean
    fn contains_bean_by_type<T: Any + Send + Sync>(&self) -> bool;
}

/// ListableBeanFactory - 可列举的 Bean 工厂
///
/// 扩展 BeanFactory，提供列举所有 Bean 的能力
pub trait ListableBeanFactory: BeanFactory {
    /// 获取所有 Bean 定义的名称（注册顺序）
    fn get_bean_names(&self) -> Vec<String>;

    /// 获取可赋值给指定类型的所有 Bean 名称
    fn get_bean_names_for_type(&self, type_id: TypeId) -> Vec<String>;

    /// 获取声明了指定能力的 Bean 名称
    fn get_bean_names_with_capability(&self, capability: Capability) -> Vec<String>;
}

/// ConfigurableBeanFactory - 可配置的 Bean 工厂
///
/// 提供配置和管理 Bean 工厂的能力
pub trait ConfigurableBeanFactory: BeanFactory {
    /// 添加 BeanPostProcessor（追加到链尾）
    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>);

    /// 获取所有 BeanPostProcessor（注册顺序）
    fn get_bean_post_processors(&self) -> Vec<Arc<dyn BeanPostProcessor>>;

    fn get_bean_post_processor_count(&self) -> usize;

    /// 手动注册一个已存在的单例
    fn register_shared_singleton(&self, name: &str, instance: SharedInstance) -> BeansResult<()>;

    /// 已就绪的单例名称（完成顺序）
    fn get_singleton_names(&self) -> Vec<String>;

    fn set_allow_bean_definition_overriding(&self, allow: bool);

    fn is_allow_bean_definition_overriding(&self) -> bool;

    /// 未显式声明时单例是否默认延迟初始化
    fn set_lazy_init_by_default(&self, lazy: bool);

    fn set_embedded_value_resolver(&self, resolver: ValueResolver);

    /// 解析字符串字面量中的嵌入值
    fn resolve_embedded_value(&self, value: &str) -> BeansResult<String>;

    /// 是否有任意线程正在创建该 Bean
    fn is_currently_in_creation(&self, name: &str) -> bool;

    /// 记录 `dependent` 依赖于 `name`（销毁 `name` 前先销毁 `dependent`）
    fn register_dependent_bean(&self, name: &str, dependent: &str);

    fn get_dependent_beans(&self, name: &str) -> Vec<String>;

    /// 销毁单个单例及依赖它的 Bean
    fn destroy_singleton(&self, name: &str) -> BeansResult<()>;
}

/// ConfigurableListableBeanFactory - 可配置且可列举的 Bean 工厂
///
/// 结合了 ListableBeanFactory 和 ConfigurableBeanFactory 的功能
pub trait ConfigurableListableBeanFactory:
    ListableBeanFactory + ConfigurableBeanFactory + BeanDefinitionRegistry
{
    /// 预实例化所有非延迟单例，并执行 SmartInitializingSingleton 回调
    fn preinstantiate_singletons(&self) -> BeansResult<()>;

    /// 冻结配置（不再允许修改 Bean 定义）
    fn freeze_configuration(&self);

    /// 检查配置是否已冻结
    fn is_configuration_frozen(&self) -> bool;

    /// 销毁所有单例 Bean（调用 destroy 回调），失败汇总后一起返回
    fn destroy_singletons(&self) -> BeansResult<()>;

    /// 每个 Bean 的静态依赖（用于依赖验证等）
    fn get_bean_definitions(&self) -> Vec<(String, Vec<String>)>;

    /// 在实例化之前检查缺失与循环的静态依赖
    fn validate_dependencies(&self) -> BeansResult<()>;
}

/// 某个名称的创建记录：进行中的创建数，以及是否至少成功过一次
#[derive(Debug, Default)]
struct CreationMark {
    in_flight: usize,
    succeeded: bool,
}

/// 一次创建的结果：实例以及需要随它一起销毁的内部 Bean
struct CreatedBean {
    instance: SharedInstance,
    inner_beans: Vec<DisposableBeanAdapter>,
}

/// DefaultListableBeanFactory - ConfigurableListableBeanFactory 的默认实现
///
/// 这是实际的 Bean 容器实现，类似 Spring 的 DefaultListableBeanFactory。
/// 始终以 `Arc` 形式创建，BeanFactoryAware 回调拿到的是它的弱引用。
pub struct DefaultListableBeanFactory {
    /// 自身的弱引用
    this: Weak<DefaultListableBeanFactory>,

    /// Bean 定义与别名
    registry: RwLock<DefinitionStore>,

    /// 单例缓存
    singletons: SingletonCache,

    /// 循环依赖检测（按线程）
    creation_tracker: CreationTracker,

    /// Bean 后置处理器列表（注册顺序）
    bean_post_processors: RwLock<Vec<Arc<dyn BeanPostProcessor>>>,

    /// 嵌入值解析器
    value_resolver: RwLock<Option<ValueResolver>>,

    /// 已开始创建的 Bean，其定义不能再被覆盖或移除
    already_created: RwLock<HashMap<String, CreationMark>>,

    allow_bean_definition_overriding: AtomicBool,

    lazy_init_by_default: AtomicBool,

    /// 配置是否已冻结
    configuration_frozen: AtomicBool,

    inner_bean_counter: AtomicUsize,
}

impl DefaultListableBeanFactory {
    /// 创建新的 Bean 工厂
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            registry: RwLock::new(DefinitionStore::new()),
            singletons: SingletonCache::new(),
            creation_tracker: CreationTracker::new(),
            bean_post_processors: RwLock::new(Vec::new()),
            value_resolver: RwLock::new(None),
            already_created: RwLock::new(HashMap::new()),
            allow_bean_definition_overriding: AtomicBool::new(false),
            lazy_init_by_default: AtomicBool::new(false),
            configuration_frozen: AtomicBool::new(false),
            inner_bean_counter: AtomicUsize::new(0),
        })
    }

    /// 注册 Bean 定义，使用定义自身的名称
    pub fn register(&self, definition: impl Into<BeanDefinition>) -> BeansResult<()> {
        let definition = definition.into();
        let name = definition.name().to_string();
        self.register_bean_definition(&name, definition)
    }

    /// 手动注册单例实例
    pub fn register_singleton<T: Any + Send + Sync>(&self, name: &str, instance: Arc<T>) -> BeansResult<()> {
        self.register_shared_singleton(name, SharedInstance::new(instance))
    }

    /// 别名与 `&` 前缀解析为规范名称
    pub fn canonical_name(&self, name: &str) -> String {
        self.registry
            .read()
            .canonical_name(transformed_bean_name(name))
    }

    fn definition_of(&self, canonical: &str) -> Option<Arc<BeanDefinition>> {
        self.registry.read().get(canonical)
    }

    /// 定义是否延迟初始化，未显式设置时取工厂默认值
    pub fn is_lazy_init(&self, name: &str) -> BeansResult<bool> {
        let definition = self.get_bean_definition(name)?;
        Ok(self.is_lazy(&definition))
    }

    fn is_lazy(&self, definition: &BeanDefinition) -> bool {
        definition
            .lazy_init_flag()
            .unwrap_or_else(|| self.lazy_init_by_default.load(Ordering::Acquire))
    }

    fn check_definition_mutable(&self, name: &str, action: &str) -> BeansResult<()> {
        if self.is_configuration_frozen() {
            return Err(BeansError::store(
                name,
                format!("Cannot {} bean definition: configuration is frozen", action),
            ));
        }
        if self.already_created.read().contains_key(name) {
            return Err(BeansError::store(
                name,
                format!("Cannot {} bean definition: bean has already started creation", action),
            ));
        }
        Ok(())
    }

    /// 核心解析：别名 -> 缓存 -> 循环检测 -> 定义 -> 创建
    fn do_get_bean(&self, name: &str) -> BeansResult<SharedInstance> {
        tracing::trace!("Requesting bean: '{}'", name);

        let bean_name = self.canonical_name(name);
        let definition = self.definition_of(&bean_name);

        if let Some(shared) = self.singletons.get(&bean_name) {
            tracing::trace!("Returning cached instance of singleton bean '{}'", bean_name);
            return self.object_for_instance(shared, name, &bean_name, definition.as_deref());
        }

        if self.creation_tracker.is_creating(&bean_name) {
            return Err(self.currently_in_creation(&bean_name));
        }

        let definition = definition.ok_or_else(|| {
            tracing::debug!("Bean '{}' not found in container", name);
            BeansError::no_such_bean(name)
        })?;

        if definition.is_abstract() {
            return Err(BeansError::BeanIsAbstract { name: bean_name });
        }

        let instance = if definition.is_singleton() {
            self.get_or_create_singleton(&bean_name, &definition)?
        } else {
            tracing::debug!("Creating new instance of prototype bean '{}'", bean_name);
            self.create_tracked(&bean_name, &definition)?.instance
        };

        self.object_for_instance(instance, name, &bean_name, Some(&definition))
    }

    fn get_or_create_singleton(
        &self,
        bean_name: &str,
        definition: &Arc<BeanDefinition>,
    ) -> BeansResult<SharedInstance> {
        match self.singletons.acquire(bean_name)? {
            Acquired::Ready(instance) => Ok(instance),
            Acquired::Owner(ownership) => {
                tracing::info!("Creating shared instance of singleton bean '{}'", bean_name);

                let created = self.create_tracked(bean_name, definition)?;
                self.singletons.register_disposable(
                    DisposableBeanAdapter::new(bean_name, created.instance.clone(), Arc::clone(definition))
                        .with_inner_beans(created.inner_beans),
                );
                let instance = ownership.complete(created.instance);

                tracing::debug!("Singleton bean '{}' created and cached", bean_name);
                Ok(instance)
            }
        }
    }

    /// 在当前线程的创建链上登记后创建
    fn create_tracked(&self, bean_name: &str, definition: &BeanDefinition) -> BeansResult<CreatedBean> {
        if !self.creation_tracker.start_creating(bean_name) {
            return Err(self.currently_in_creation(bean_name));
        }

        // 使用 RAII 模式确保在任何情况下都会清理标记
        struct CreationGuard<'a> {
            tracker: &'a CreationTracker,
            name: &'a str,
        }

        impl Drop for CreationGuard<'_> {
            fn drop(&mut self) {
                self.tracker.finish_creating(self.name);
            }
        }

        let _guard = CreationGuard {
            tracker: &self.creation_tracker,
            name: bean_name,
        };

        self.already_created
            .write()
            .entry(bean_name.to_string())
            .or_default()
            .in_flight += 1;
        let result = self.create_bean(bean_name, definition);
        self.finish_creation_mark(bean_name, result.is_ok());
        result
    }

    /// 只有从未成功且没有其它进行中的创建时，失败才会撤销标记
    fn finish_creation_mark(&self, bean_name: &str, succeeded: bool) {
        let mut marks = self.already_created.write();
        let Some(mark) = marks.get_mut(bean_name) else {
            return;
        };
        mark.in_flight = mark.in_flight.saturating_sub(1);
        mark.succeeded |= succeeded;
        if mark.in_flight == 0 && !mark.succeeded {
            marks.remove(bean_name);
        }
    }

    /// 创建 Bean 实例并调用生命周期回调
    ///
    /// # Bean 生命周期顺序
    /// 1. depends-on 中的 Bean 先完成初始化
    /// 2. 解析构造参数并实例化（构造函数或工厂方法）
    /// 3. 依赖注入（属性填充）
    /// 4. Aware 接口回调（BeanNameAware, BeanFactoryAware）
    /// 5. BeanPostProcessor.postProcessBeforeInitialization
    /// 6. InitializingBean.afterPropertiesSet
    /// 7. 自定义 init-method
    /// 8. BeanPostProcessor.postProcessAfterInitialization
    fn create_bean(&self, bean_name: &str, definition: &BeanDefinition) -> BeansResult<CreatedBean> {
        for dependency in definition.depends_on() {
            let dependency_name = self.canonical_name(dependency);
            self.singletons.register_dependent(&dependency_name, bean_name);
            self.do_get_bean(dependency).map_err(|e| {
                wrap_dependency_error(bean_name, format!("Failed to initialize depends-on bean '{}'", dependency), e)
            })?;
        }

        let factory = match definition.factory_bean_name() {
            Some(factory_name) => {
                self.singletons
                    .register_dependent(&self.canonical_name(factory_name), bean_name);
                let factory = self.do_get_bean(factory_name).map_err(|e| {
                    wrap_dependency_error(bean_name, format!("Cannot resolve factory bean '{}'", factory_name), e)
                })?;
                Some(factory)
            }
            None => None,
        };

        let mut inner_beans = Vec::new();
        let args = self.resolve_constructor_args(bean_name, definition, &mut inner_beans)?;

        let mut bean = self.instantiate(bean_name, definition, factory.as_ref(), &args)?;

        self.populate_bean(bean_name, definition, &mut bean, &mut inner_beans)?;

        let bean = self.initialize_bean(bean_name, definition, bean)?;

        Ok(CreatedBean {
            instance: bean.into_shared(),
            inner_beans,
        })
    }

    fn instantiate(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        factory: Option<&SharedInstance>,
        args: &Arguments,
    ) -> BeansResult<BeanInstance> {
        match (&definition.instantiator, factory) {
            (Some(Instantiator::Constructor(constructor)), _) => constructor(args)
                .map_err(|e| callback_error(bean_name, "Instantiation of bean failed", e)),
            (Some(Instantiator::FactoryMethod { method_name, invoke, .. }), Some(factory)) => {
                invoke(factory.object(), args).map_err(|e| {
                    callback_error(
                        bean_name,
                        format!("Factory method '{}' threw exception", method_name),
                        e,
                    )
                })
            }
            _ => Err(BeansError::BeanIsAbstract {
                name: bean_name.to_string(),
            }),
        }
    }

    /// 按位置放置显式索引的参数，其余参数按声明顺序填充空位
    fn resolve_constructor_args(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        inner_beans: &mut Vec<DisposableBeanAdapter>,
    ) -> BeansResult<Arguments> {
        let declared = definition.constructor_args();
        if declared.is_empty() {
            return Ok(Arguments::default());
        }

        let slots = declared
            .iter()
            .filter_map(|arg| arg.index.map(|i| i + 1))
            .max()
            .unwrap_or(0)
            .max(declared.len());
        let mut values: Vec<Option<BeanValue>> = vec![None; slots];
        let mut sequential = Vec::new();

        for arg in declared {
            let value = self.resolve_value(bean_name, &arg.value, inner_beans)?;
            match arg.index {
                Some(index) => values[index] = Some(value),
                None => sequential.push(value),
            }
        }

        let mut sequential = sequential.into_iter();
        for slot in values.iter_mut().filter(|slot| slot.is_none()) {
            match sequential.next() {
                Some(value) => *slot = Some(value),
                None => break,
            }
        }

        Ok(Arguments::new(
            values
                .into_iter()
                .map(|v| v.unwrap_or(BeanValue::Null))
                .collect(),
        ))
    }

    fn populate_bean(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        bean: &mut BeanInstance,
        inner_beans: &mut Vec<DisposableBeanAdapter>,
    ) -> BeansResult<()> {
        for property in definition.properties() {
            let value = self.resolve_value(bean_name, &property.value, inner_beans)?;
            tracing::trace!("Setting property '{}' on bean '{}'", property.name, bean_name);
            property.apply(bean, value).map_err(|e| {
                callback_error(bean_name, format!("Error setting property '{}'", property.name), e)
            })?;
        }
        Ok(())
    }

    /// 解析值描述符
    fn resolve_value(
        &self,
        bean_name: &str,
        source: &ValueSource,
        inner_beans: &mut Vec<DisposableBeanAdapter>,
    ) -> BeansResult<BeanValue> {
        match source {
            ValueSource::Literal(BeanValue::Str(text)) => self
                .resolve_embedded_value(text)
                .map(BeanValue::Str)
                .map_err(|e| BeansError::creation(bean_name, format!("Could not resolve value \"{}\"", text), e)),
            ValueSource::Literal(value) => Ok(value.clone()),
            ValueSource::Reference { name, optional } => {
                if *optional && !self.contains_bean(name) {
                    tracing::trace!("Optional reference '{}' of bean '{}' resolved to null", name, bean_name);
                    return Ok(BeanValue::Null);
                }
                let target = self.canonical_name(name);
                self.singletons.register_dependent(&target, bean_name);
                let definition = self.definition_of(&target);
                self.do_get_bean(name)
                    .map(|instance| BeanValue::Bean(instance.into_object(), definition))
                    .map_err(|e| {
                        wrap_dependency_error(bean_name, format!("Cannot resolve reference to bean '{}'", name), e)
                    })
            }
            ValueSource::Inner(definition) => {
                let (instance, adapter) = self.create_inner_bean(bean_name, definition)?;
                inner_beans.push(adapter);
                Ok(BeanValue::Bean(instance.into_object(), Some(Arc::clone(definition))))
            }
            ValueSource::List(items) => items
                .iter()
                .map(|item| self.resolve_value(bean_name, item, inner_beans))
                .collect::<BeansResult<Vec<_>>>()
                .map(BeanValue::List),
        }
    }

    /// 创建内部 Bean：使用生成的名称，不注册、不缓存
    fn create_inner_bean(
        &self,
        outer_name: &str,
        definition: &Arc<BeanDefinition>,
    ) -> BeansResult<(SharedInstance, DisposableBeanAdapter)> {
        let counter = self.inner_bean_counter.fetch_add(1, Ordering::Relaxed);
        let inner_name = if definition.name().is_empty() {
            inner_bean_name(definition.bean_type_name(), counter)
        } else {
            format!("{}{}{}", definition.name(), GENERATED_BEAN_NAME_SEPARATOR, counter)
        };
        tracing::trace!("Creating inner bean '{}' for bean '{}'", inner_name, outer_name);

        let result = definition
            .validate(&inner_name)
            .and_then(|_| {
                if definition.is_abstract() {
                    Err(BeansError::BeanIsAbstract {
                        name: inner_name.clone(),
                    })
                } else {
                    self.create_tracked(&inner_name, definition)
                }
            });

        let created = result.map_err(|e| {
            wrap_dependency_error(outer_name, format!("Cannot create inner bean '{}'", inner_name), e)
        })?;

        let adapter = DisposableBeanAdapter::new(&inner_name, created.instance.clone(), Arc::clone(definition))
            .with_inner_beans(created.inner_beans);
        Ok((created.instance, adapter))
    }

    /// Aware 回调、后置处理器与 init 回调
    fn initialize_bean(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        mut bean: BeanInstance,
    ) -> BeansResult<BeanInstance> {
        let capabilities: Capabilities = definition.capabilities;

        if let Some(as_name_aware) = capabilities.name_aware {
            if let Some(aware) = as_name_aware(bean.as_any_mut()) {
                aware.set_bean_name(bean_name);
            }
        }

        if let Some(as_factory_aware) = capabilities.factory_aware {
            if let Some(aware) = as_factory_aware(bean.as_any_mut()) {
                let factory: Weak<dyn BeanFactory> = self.this.clone();
                aware.set_bean_factory(factory);
            }
        }

        bean = self.apply_bean_post_processors_before_initialization(bean, bean_name)?;

        self.invoke_init_methods(bean_name, definition, &mut bean)?;

        self.apply_bean_post_processors_after_initialization(bean, bean_name)
    }

    fn invoke_init_methods(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        bean: &mut BeanInstance,
    ) -> BeansResult<()> {
        if let Some(as_initializing) = definition.capabilities.initializing {
            match as_initializing(bean.as_any_mut()) {
                Some(initializing) => {
                    tracing::trace!("Invoking after_properties_set() on bean with name '{}'", bean_name);
                    initializing
                        .after_properties_set()
                        .map_err(|e| callback_error(bean_name, "Invocation of after_properties_set failed", e))?;
                }
                None => tracing::warn!(
                    "Bean '{}' was replaced by a '{}' before initialization, skipping after_properties_set",
                    bean_name,
                    bean.type_name()
                ),
            }
        }

        if let Some(init_method) = &definition.init_method {
            if !init_method.applies_to(bean) {
                tracing::warn!(
                    "Bean '{}' was replaced by a '{}' before initialization, skipping init method '{}'",
                    bean_name,
                    bean.type_name(),
                    init_method.name
                );
                return Ok(());
            }
            tracing::trace!("Invoking init method '{}' on bean with name '{}'", init_method.name, bean_name);
            init_method.invoke(bean).map_err(|e| {
                callback_error(bean_name, format!("Invocation of init method '{}' failed", init_method.name), e)
            })?;
        }

        Ok(())
    }

    /// 应用 BeanPostProcessor.postProcessBeforeInitialization
    fn apply_bean_post_processors_before_initialization(
        &self,
        bean: BeanInstance,
        bean_name: &str,
    ) -> BeansResult<BeanInstance> {
        let mut current_bean = bean;

        for processor in self.get_bean_post_processors() {
            current_bean = processor
                .post_process_before_initialization(current_bean, bean_name)
                .map_err(|e| {
                    callback_error(
                        bean_name,
                        format!("BeanPostProcessor '{}' failed before initialization", processor.name()),
                        e,
                    )
                })?;
        }

        Ok(current_bean)
    }

    /// 应用 BeanPostProcessor.postProcessAfterInitialization（同样按注册顺序）
    fn apply_bean_post_processors_after_initialization(
        &self,
        bean: BeanInstance,
        bean_name: &str,
    ) -> BeansResult<BeanInstance> {
        let mut current_bean = bean;

        for processor in self.get_bean_post_processors() {
            current_bean = processor
                .post_process_after_initialization(current_bean, bean_name)
                .map_err(|e| {
                    callback_error(
                        bean_name,
                        format!("BeanPostProcessor '{}' failed after initialization", processor.name()),
                        e,
                    )
                })?;
        }

        Ok(current_bean)
    }

    /// 处理 FactoryBean：`&name` 返回工厂本身，`name` 返回其产品
    fn object_for_instance(
        &self,
        instance: SharedInstance,
        requested_name: &str,
        bean_name: &str,
        definition: Option<&BeanDefinition>,
    ) -> BeansResult<SharedInstance> {
        let as_factory_bean = definition.and_then(|d| d.capabilities.factory_bean);

        if is_factory_dereference(requested_name) {
            if as_factory_bean.is_none() {
                return Err(BeansError::BeanNotOfRequiredType {
                    name: bean_name.to_string(),
                    required: "FactoryBean".to_string(),
                    actual: instance.type_name().to_string(),
                });
            }
            return Ok(instance);
        }

        let Some(as_factory_bean) = as_factory_bean else {
            return Ok(instance);
        };
        let Some(factory) = as_factory_bean(instance.object().as_ref()) else {
            return Ok(instance);
        };

        let shared_product = factory.is_singleton() && definition.is_some_and(|d| d.is_singleton());
        if !shared_product {
            return self.object_from_factory_bean(factory, bean_name);
        }

        match self.singletons.acquire_factory_object(bean_name)? {
            Acquired::Ready(product) => Ok(product),
            Acquired::Owner(ownership) => {
                let product = self.object_from_factory_bean(factory, bean_name)?;
                Ok(ownership.complete(product))
            }
        }
    }

    fn object_from_factory_bean(&self, factory: &dyn FactoryBean, bean_name: &str) -> BeansResult<SharedInstance> {
        tracing::debug!(
            "Obtaining object of type '{}' from FactoryBean '{}'",
            factory.object_type_name(),
            bean_name
        );
        let product = factory
            .get_object()
            .map_err(|e| callback_error(bean_name, "FactoryBean threw exception on object creation", e))?;
        let product = self.apply_bean_post_processors_after_initialization(product, bean_name)?;
        Ok(product.into_shared())
    }

    fn currently_in_creation(&self, bean_name: &str) -> BeansError {
        let mut chain = self.creation_tracker.current_creating();
        chain.push(bean_name.to_string());
        BeansError::BeanCurrentlyInCreation {
            name: bean_name.to_string(),
            chain,
        }
    }

    /// 转换为声明的可赋值类型
    fn cast_to<I: ?Sized + 'static>(&self, name: &str, instance: &SharedInstance) -> Option<Arc<I>> {
        let definition = self.definition_of(&self.canonical_name(name))?;
        let boxed = definition
            .find_assignable(TypeId::of::<I>())?
            .cast(instance.object())?;
        boxed.downcast::<Arc<I>>().ok().map(|arc| *arc)
    }

    /// 取得声明了某个能力的 Bean，并转换为对应的 trait object
    pub(crate) fn get_capability_bean<R>(
        &self,
        name: &str,
        select: impl Fn(&Capabilities) -> Option<fn(SharedBean) -> Option<R>>,
    ) -> BeansResult<Option<R>> {
        let Some(definition) = self.definition_of(&self.canonical_name(name)) else {
            return Ok(None);
        };
        let Some(cast) = select(&definition.capabilities) else {
            return Ok(None);
        };
        let bean = self.get_bean(name)?;
        Ok(cast(bean))
    }

    fn invoke_smart_initializing_singletons(&self, names: &[String]) -> BeansResult<()> {
        for name in names {
            let smart = self.get_capability_bean(name, |c| c.smart_singleton)?;
            if let Some(smart) = smart {
                tracing::debug!("Invoking after_singletons_instantiated() on bean '{}'", name);
                smart.after_singletons_instantiated().map_err(|e| {
                    callback_error(name, "Invocation of after_singletons_instantiated failed", e)
                })?;
            }
        }
        Ok(())
    }
}

/// 依赖解析失败：循环依赖原样传播，其他错误包装为外层 Bean 的创建失败
fn wrap_dependency_error(bean_name: &str, message: String, error: BeansError) -> BeansError {
    if error.is_currently_in_creation() {
        error
    } else {
        BeansError::creation(bean_name, message, error)
    }
}

/// 用户回调失败：保留内层的 `BeansError`（例如回调中手动获取 Bean 时的失败）
fn callback_error(bean_name: &str, message: impl Into<String>, error: anyhow::Error) -> BeansError {
    match error.downcast::<BeansError>() {
        Ok(inner) => wrap_dependency_error(bean_name, message.into(), inner),
        Err(other) => BeansError::creation(bean_name, message, other),
    }
}

impl BeanFactory for DefaultListableBeanFactory {
    fn get_bean(&self, name: &str) -> BeansResult<SharedBean> {
        self.do_get_bean(name).map(SharedInstance::into_object)
    }

    fn contains_bean(&self, name: &str) -> bool {
        let bean_name = self.canonical_name(name);
        self.singletons.contains(&bean_name) || self.registry.read().contains(&bean_name)
    }

    fn is_singleton(&self, name: &str) -> BeansResult<bool> {
        let bean_name = self.canonical_name(name);
        match self.definition_of(&bean_name) {
            Some(definition) => Ok(definition.is_singleton()),
            None if self.singletons.contains(&bean_name) => Ok(true),
            None => Err(BeansError::no_such_bean(name)),
        }
    }

    fn is_prototype(&self, name: &str) -> BeansResult<bool> {
        let bean_name = self.canonical_name(name);
        match self.definition_of(&bean_name) {
            Some(definition) => Ok(definition.is_prototype()),
            None if self.singletons.contains(&bean_name) => Ok(false),
            None => Err(BeansError::no_such_bean(name)),
        }
    }

    fn get_aliases(&self, name: &str) -> Vec<String> {
        let prefix = if is_factory_dereference(name) { FACTORY_BEAN_PREFIX } else { "" };
        let registry = self.registry.read();
        let bare = transformed_bean_name(name);
        let mut aliases: Vec<String> = registry
            .aliases_of(bare)
            .into_iter()
            .map(|alias| format!("{}{}", prefix, alias))
            .collect();
        // 通过别名查询时，规范名称也是它的"别名"
        let canonical = registry.canonical_name(bare);
        if canonical != bare {
            aliases.insert(0, format!("{}{}", prefix, canonical));
        }
        aliases
    }
}

impl BeanFactoryExt for DefaultListableBeanFactory {
    fn get_bean_typed<T: Any + Send + Sync>(&self, name: &str) -> BeansResult<Arc<T>> {
        let instance = self.do_get_bean(name)?;
        if let Some(bean) = instance.downcast::<T>() {
            return Ok(bean);
        }
        self.cast_to::<T>(name, &instance)
            .ok_or_else(|| BeansError::BeanNotOfRequiredType {
                name: name.to_string(),
                required: std::any::type_name::<T>().to_string(),
                actual: instance.type_name().to_string(),
            })
    }

    fn get_bean_as<I: ?Sized + 'static>(&self, name: &str) -> BeansResult<Arc<I>> {
        let instance = self.do_get_bean(name)?;
        self.cast_to::<I>(name, &instance)
            .ok_or_else(|| BeansError::BeanNotOfRequiredType {
                name: name.to_string(),
                required: std::any::type_name::<I>().to_string(),
                actual: instance.type_name().to_string(),
            })
    }

    fn get_bean_by_type<T: Any + Send + Sync>(&self) -> BeansResult<Arc<T>> {
        let type_name = std::any::type_name::<T>();
        let candidates = self.get_bean_names_for_type(TypeId::of::<T>());
        match candidates.as_slice() {
            [name] => self.get_bean_typed::<T>(name),
            [] => Err(BeansError::NoSuchBeanDefinition {
                name: format!("No bean found for type '{}'", type_name),
            }),
            _ => Err(BeansError::NoUniqueBeanDefinition {
                type_name: type_name.to_string(),
                candidates,
            }),
        }
    }

    fn contains_bean_by_type<T: Any + Send + Sync>(&self) -> bool {
        !self.get_bean_names_for_type(TypeId::of::<T>()).is_empty()
    }
}

impl ListableBeanFactory for DefaultListableBeanFactory {
    fn get_bean_names(&self) -> Vec<String> {
        self.registry.read().names()
    }

    fn get_bean_names_for_type(&self, type_id: TypeId) -> Vec<String> {
        let mut names: Vec<String> = self
            .registry
            .read()
            .iter()
            .filter(|(_, def)| !def.is_abstract() && def.is_assignable_to(type_id))
            .map(|(name, _)| name.clone())
            .collect();

        // 手动注册的单例按具体类型匹配
        for name in self.singletons.names() {
            if names.contains(&name) || self.registry.read().contains(&name) {
                continue;
            }
            if let Some(instance) = self.singletons.get(&name) {
                if (**instance.object()).type_id() == type_id {
                    names.push(name);
                }
            }
        }
        names
    }

    fn get_bean_names_with_capability(&self, capability: Capability) -> Vec<String> {
        self.registry
            .read()
            .iter()
            .filter(|(_, def)| !def.is_abstract() && def.has_capability(capability))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl BeanDefinitionRegistry for DefaultListableBeanFactory {
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> BeansResult<()> {
        self.check_definition_mutable(name, "register")?;

        if is_core_component_bean_name(name) {
            tracing::warn!("Bean definition '{}' uses a built-in singleton name", name);
        }

        tracing::trace!(
            "Attempting to register bean: name='{}', type='{}', scope={}",
            name,
            definition.bean_type_name(),
            definition.scope()
        );

        let allow_override = self.is_allow_bean_definition_overriding();
        let replaced = self
            .registry
            .write()
            .register(name, definition, allow_override)
            .inspect_err(|e| tracing::warn!("Bean '{}' registration failed: {}", name, e))?;

        if replaced.is_some() {
            tracing::warn!("Overriding bean definition for bean '{}'", name);
        } else {
            tracing::debug!("Bean definition registered successfully: '{}'", name);
        }
        Ok(())
    }

    fn remove_bean_definition(&self, name: &str) -> BeansResult<()> {
        self.check_definition_mutable(name, "remove")?;
        self.registry.write().remove(name)?;
        tracing::debug!("Bean definition removed: '{}'", name);
        Ok(())
    }

    fn get_bean_definition(&self, name: &str) -> BeansResult<Arc<BeanDefinition>> {
        self.definition_of(&self.canonical_name(name))
            .ok_or_else(|| BeansError::no_such_bean(name))
    }

    fn contains_bean_definition(&self, name: &str) -> bool {
        self.registry.read().contains(name)
    }

    fn get_bean_definition_names(&self) -> Vec<String> {
        self.registry.read().names()
    }

    fn get_bean_definition_count(&self) -> usize {
        self.registry.read().len()
    }

    fn register_alias(&self, name: &str, alias: &str) -> BeansResult<()> {
        let allow_override = self.is_allow_bean_definition_overriding();
        self.registry
            .write()
            .register_alias(name, alias, allow_override)?;
        tracing::debug!("Alias '{}' registered for bean '{}'", alias, name);
        Ok(())
    }

    fn remove_alias(&self, alias: &str) -> BeansResult<()> {
        self.registry.write().remove_alias(alias)
    }

    fn is_alias(&self, name: &str) -> bool {
        self.registry.read().is_alias(name)
    }
}

impl ConfigurableBeanFactory for DefaultListableBeanFactory {
    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        tracing::debug!("Adding BeanPostProcessor '{}'", processor.name());
        self.bean_post_processors.write().push(processor);
    }

    fn get_bean_post_processors(&self) -> Vec<Arc<dyn BeanPostProcessor>> {
        self.bean_post_processors.read().clone()
    }

    fn get_bean_post_processor_count(&self) -> usize {
        self.bean_post_processors.read().len()
    }

    fn register_shared_singleton(&self, name: &str, instance: SharedInstance) -> BeansResult<()> {
        if name.trim().is_empty() {
            return Err(BeansError::store(name, "bean name must not be empty"));
        }
        let bean_name = self.canonical_name(name);
        self.singletons.register(&bean_name, instance)?;
        tracing::debug!("Registered singleton instance '{}'", bean_name);
        Ok(())
    }

    fn get_singleton_names(&self) -> Vec<String> {
        self.singletons.names()
    }

    fn set_allow_bean_definition_overriding(&self, allow: bool) {
        self.allow_bean_definition_overriding
            .store(allow, Ordering::Release);
    }

    fn is_allow_bean_definition_overriding(&self) -> bool {
        self.allow_bean_definition_overriding
            .load(Ordering::Acquire)
    }

    fn set_lazy_init_by_default(&self, lazy: bool) {
        self.lazy_init_by_default.store(lazy, Ordering::Release);
    }

    fn set_embedded_value_resolver(&self, resolver: ValueResolver) {
        *self.value_resolver.write() = Some(resolver);
    }

    fn resolve_embedded_value(&self, value: &str) -> BeansResult<String> {
        let resolver = self.value_resolver.read().clone();
        match resolver {
            Some(resolver) => resolver(value),
            None => Ok(value.to_string()),
        }
    }

    fn is_currently_in_creation(&self, name: &str) -> bool {
        let bean_name = self.canonical_name(name);
        self.creation_tracker.is_creating(&bean_name) || self.singletons.is_in_creation(&bean_name)
    }

    fn register_dependent_bean(&self, name: &str, dependent: &str) {
        let bean_name = self.canonical_name(name);
        self.singletons.register_dependent(&bean_name, dependent);
    }

    fn get_dependent_beans(&self, name: &str) -> Vec<String> {
        self.singletons.dependents_of(&self.canonical_name(name))
    }

    fn destroy_singleton(&self, name: &str) -> BeansResult<()> {
        let bean_name = self.canonical_name(name);
        let failures = self.singletons.destroy_singleton(&bean_name);
        self.already_created.write().remove(&bean_name);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(BeansError::Destruction { failures })
        }
    }
}

impl ConfigurableListableBeanFactory for DefaultListableBeanFactory {
    fn preinstantiate_singletons(&self) -> BeansResult<()> {
        let candidates: Vec<(String, Arc<BeanDefinition>)> = self
            .registry
            .read()
            .iter()
            .filter(|(_, def)| !def.is_abstract() && def.is_singleton())
            .map(|(name, def)| (name.clone(), Arc::clone(def)))
            .collect();

        let eager: Vec<&(String, Arc<BeanDefinition>)> =
            candidates.iter().filter(|(_, def)| !self.is_lazy(def)).collect();

        tracing::debug!("Pre-instantiating {} singleton beans", eager.len());

        for (name, definition) in &eager {
            if definition.is_factory_bean() {
                self.get_bean(&format!("{}{}", FACTORY_BEAN_PREFIX, name))?;
            } else {
                self.get_bean(name)?;
            }
        }

        let ready: Vec<String> = candidates
            .iter()
            .filter(|(name, _)| self.singletons.contains(name))
            .map(|(name, _)| name.clone())
            .collect();
        self.invoke_smart_initializing_singletons(&ready)
    }

    fn freeze_configuration(&self) {
        self.configuration_frozen.store(true, Ordering::Release);
        tracing::debug!("Bean factory configuration frozen");
    }

    fn is_configuration_frozen(&self) -> bool {
        self.configuration_frozen.load(Ordering::Acquire)
    }

    fn destroy_singletons(&self) -> BeansResult<()> {
        tracing::info!("Destroying singleton beans");

        let failures = self.singletons.destroy_singletons();
        self.already_created.write().clear();

        if failures.is_empty() {
            tracing::info!("Singleton beans destruction completed");
            Ok(())
        } else {
            tracing::error!("{} destroy callback(s) failed during shutdown", failures.len());
            Err(BeansError::Destruction { failures })
        }
    }

    fn get_bean_definitions(&self) -> Vec<(String, Vec<String>)> {
        let registry = self.registry.read();
        let mut graph: Vec<(String, Vec<String>)> = registry
            .iter()
            .map(|(name, definition)| {
                let deps = definition
                    .static_dependencies()
                    .iter()
                    .map(|dep| registry.canonical_name(transformed_bean_name(dep)))
                    .collect();
                (name.clone(), deps)
            })
            .collect();

        for name in self.singletons.names() {
            if !registry.contains(&name) {
                graph.push((name, Vec::new()));
            }
        }
        graph
    }

    fn validate_dependencies(&self) -> BeansResult<()> {
        let graph = self.get_bean_definitions();
        validate_dependency_graph(&graph).map_err(|e| match e {
            DependencyValidationError::MissingDependency { bean, missing } => BeansError::creation(
                bean,
                format!("Unsatisfied dependency on '{}'", missing),
                BeansError::no_such_bean(missing),
            ),
            DependencyValidationError::CircularDependency { cycle } => {
                BeansError::BeanCurrentlyInCreation {
                    name: cycle.first().cloned().unwrap_or_default(),
                    chain: cycle,
                }
            }
        })
    }
}
