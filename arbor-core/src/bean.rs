use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::anyhow;

use crate::bean_post_processor::BeanPostProcessor;
use crate::error::{BeansError, BeansResult};
use crate::event::EventListener;
use crate::lifecycle::{
    BeanFactoryAware, BeanNameAware, Capability, DisposableBean, InitializingBean,
    SmartInitializingSingleton,
};
use crate::value::{Arguments, BeanValue, SharedBean};
use crate::Scope;

/// 创建过程中独占持有的 Bean 实例
///
/// 在属性填充、Aware 回调、后置处理器、init 回调期间实例只有一个所有者，
/// 因此可以安全地获得可变引用；完成后再转换为共享的 `SharedInstance`。
pub struct BeanInstance {
    object: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl BeanInstance {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            object: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.object.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.object.downcast_mut::<T>()
    }

    pub fn into_inner<T: Any>(self) -> std::result::Result<T, Self> {
        let type_name = self.type_name;
        match self.object.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(object) => Err(Self { object, type_name }),
        }
    }

    /// 实际对象（而非 Box）的 TypeId
    pub(crate) fn object_type_id(&self) -> TypeId {
        (*self.object).type_id()
    }

    pub(crate) fn as_any_mut(&mut self) -> &mut (dyn Any + Send + Sync) {
        self.object.as_mut()
    }

    pub(crate) fn into_shared(self) -> SharedInstance {
        SharedInstance {
            object: Arc::from(self.object),
            type_name: self.type_name,
        }
    }
}

impl fmt::Debug for BeanInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanInstance")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// 容器中共享的（已就绪）实例，附带其运行时类型名称
#[derive(Clone)]
pub struct SharedInstance {
    object: SharedBean,
    type_name: &'static str,
}

impl SharedInstance {
    pub fn new<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        Self {
            object,
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn object(&self) -> &SharedBean {
        &self.object
    }

    pub fn into_object(self) -> SharedBean {
        self.object
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.object).downcast::<T>().ok()
    }

    pub fn ptr_eq(&self, other: &SharedInstance) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for SharedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedInstance")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// FactoryBean - 其产品（而非自身）以 Bean 名称暴露
///
/// 通过 `&name` 可以取得工厂本身
pub trait FactoryBean: Send + Sync {
    /// 生产对象
    fn get_object(&self) -> anyhow::Result<BeanInstance>;

    /// 产品类型名称（仅用于日志与诊断）
    fn object_type_name(&self) -> &'static str {
        "unknown"
    }

    /// 产品是否共享；为 false 时每次获取都会调用 `get_object`
    fn is_singleton(&self) -> bool {
        true
    }
}

/// 未解析的值描述符
pub enum ValueSource {
    /// 字面量，字符串会经过占位符解析
    Literal(BeanValue),
    /// 按名称引用另一个 Bean
    Reference { name: String, optional: bool },
    /// 内部 Bean：就地创建，不注册到容器
    Inner(Arc<BeanDefinition>),
    /// 元素逐个解析的列表
    List(Vec<ValueSource>),
}

impl ValueSource {
    pub fn literal(value: impl Into<BeanValue>) -> Self {
        ValueSource::Literal(value.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        ValueSource::Reference {
            name: name.into(),
            optional: false,
        }
    }

    /// 引用的 Bean 不存在时解析为 `BeanValue::Null`
    pub fn optional_reference(name: impl Into<String>) -> Self {
        ValueSource::Reference {
            name: name.into(),
            optional: true,
        }
    }

    pub fn inner(definition: BeanDefinition) -> Self {
        ValueSource::Inner(Arc::new(definition))
    }

    pub fn list(items: Vec<ValueSource>) -> Self {
        ValueSource::List(items)
    }

    /// 收集静态引用（用于依赖图校验）
    pub(crate) fn collect_references(&self, out: &mut Vec<String>) {
        match self {
            ValueSource::Reference { name, optional: false } => out.push(name.clone()),
            ValueSource::Inner(definition) => out.extend(definition.static_dependencies()),
            ValueSource::List(items) => items.iter().for_each(|i| i.collect_references(out)),
            _ => {}
        }
    }
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Literal(value) => write!(f, "{:?}", value),
            ValueSource::Reference { name, optional } => {
                write!(f, "ref({}{})", name, if *optional { ", optional" } else { "" })
            }
            ValueSource::Inner(definition) => write!(f, "inner({})", definition.bean_type_name()),
            ValueSource::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

/// 构造参数描述符：显式位置，或按声明顺序填充剩余位置
#[derive(Debug)]
pub struct ConstructorArg {
    pub index: Option<usize>,
    pub value: ValueSource,
}

type PropertySetter =
    Box<dyn Fn(&mut (dyn Any + Send + Sync), BeanValue) -> anyhow::Result<()> + Send + Sync>;

/// 属性描述符：名称、值来源以及类型化的 setter
pub struct PropertyValue {
    pub name: String,
    pub value: ValueSource,
    target: TypeId,
    setter: PropertySetter,
}

impl PropertyValue {
    pub(crate) fn apply(&self, bean: &mut BeanInstance, value: BeanValue) -> anyhow::Result<()> {
        (self.setter)(bean.as_any_mut(), value)
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyValue")
            .field("name", &self.name)
            .field("value", &self.value)
            .finish()
    }
}

type InitCallback = Box<dyn Fn(&mut (dyn Any + Send + Sync)) -> anyhow::Result<()> + Send + Sync>;
type DestroyCallback = Box<dyn Fn(&(dyn Any + Send + Sync)) -> anyhow::Result<()> + Send + Sync>;

/// 具名的 init-method
pub struct InitMethod {
    pub name: String,
    target: TypeId,
    callback: InitCallback,
}

impl InitMethod {
    /// 实例仍是声明时的类型（未被后置处理器替换）
    pub(crate) fn applies_to(&self, bean: &BeanInstance) -> bool {
        bean.object_type_id() == self.target
    }

    pub(crate) fn invoke(&self, bean: &mut BeanInstance) -> anyhow::Result<()> {
        (self.callback)(bean.as_any_mut())
    }
}

/// 具名的 destroy-method，在关闭时对共享实例调用
pub struct DestroyMethod {
    pub name: String,
    callback: DestroyCallback,
}

impl DestroyMethod {
    pub(crate) fn invoke(&self, bean: &(dyn Any + Send + Sync)) -> anyhow::Result<()> {
        (self.callback)(bean)
    }
}

type Constructor = Box<dyn Fn(&Arguments) -> anyhow::Result<BeanInstance> + Send + Sync>;
type FactoryMethodFn =
    Box<dyn Fn(&SharedBean, &Arguments) -> anyhow::Result<BeanInstance> + Send + Sync>;

/// 实例化方式
pub(crate) enum Instantiator {
    Constructor(Constructor),
    FactoryMethod {
        factory_bean: String,
        method_name: String,
        invoke: FactoryMethodFn,
    },
}

pub(crate) type AsNameAware = fn(&mut (dyn Any + Send + Sync)) -> Option<&mut dyn BeanNameAware>;
pub(crate) type AsFactoryAware =
    fn(&mut (dyn Any + Send + Sync)) -> Option<&mut dyn BeanFactoryAware>;
pub(crate) type AsInitializing =
    fn(&mut (dyn Any + Send + Sync)) -> Option<&mut dyn InitializingBean>;
pub(crate) type AsDisposable = fn(&(dyn Any + Send + Sync)) -> Option<&dyn DisposableBean>;
pub(crate) type AsFactoryBean = fn(&(dyn Any + Send + Sync)) -> Option<&dyn FactoryBean>;
pub(crate) type AsPostProcessor = fn(SharedBean) -> Option<Arc<dyn BeanPostProcessor>>;
pub(crate) type AsListener = fn(SharedBean) -> Option<Arc<dyn EventListener>>;
pub(crate) type AsSmartSingleton = fn(SharedBean) -> Option<Arc<dyn SmartInitializingSingleton>>;

/// 定义上声明的能力及其调度入口
#[derive(Default, Clone, Copy)]
pub(crate) struct Capabilities {
    pub name_aware: Option<AsNameAware>,
    pub factory_aware: Option<AsFactoryAware>,
    pub initializing: Option<AsInitializing>,
    pub disposable: Option<AsDisposable>,
    pub factory_bean: Option<AsFactoryBean>,
    pub post_processor: Option<AsPostProcessor>,
    pub listener: Option<AsListener>,
    pub smart_singleton: Option<AsSmartSingleton>,
}

impl Capabilities {
    fn tags(&self) -> Vec<Capability> {
        let mut tags = Vec::new();
        if self.name_aware.is_some() {
            tags.push(Capability::BeanNameAware);
        }
        if self.factory_aware.is_some() {
            tags.push(Capability::BeanFactoryAware);
        }
        if self.initializing.is_some() {
            tags.push(Capability::InitializingBean);
        }
        if self.disposable.is_some() {
            tags.push(Capability::DisposableBean);
        }
        if self.factory_bean.is_some() {
            tags.push(Capability::FactoryBean);
        }
        if self.post_processor.is_some() {
            tags.push(Capability::BeanPostProcessor);
        }
        if self.listener.is_some() {
            tags.push(Capability::ApplicationListener);
        }
        if self.smart_singleton.is_some() {
            tags.push(Capability::SmartInitializingSingleton);
        }
        tags
    }
}

fn as_name_aware<T: BeanNameAware + Any + Send + Sync>(
    bean: &mut (dyn Any + Send + Sync),
) -> Option<&mut dyn BeanNameAware> {
    bean.downcast_mut::<T>().map(|b| b as &mut dyn BeanNameAware)
}

fn as_factory_aware<T: BeanFactoryAware + Any + Send + Sync>(
    bean: &mut (dyn Any + Send + Sync),
) -> Option<&mut dyn BeanFactoryAware> {
    bean.downcast_mut::<T>().map(|b| b as &mut dyn BeanFactoryAware)
}

fn as_initializing<T: InitializingBean + Any + Send + Sync>(
    bean: &mut (dyn Any + Send + Sync),
) -> Option<&mut dyn InitializingBean> {
    bean.downcast_mut::<T>().map(|b| b as &mut dyn InitializingBean)
}

fn as_disposable<T: DisposableBean + Any + Send + Sync>(
    bean: &(dyn Any + Send + Sync),
) -> Option<&dyn DisposableBean> {
    bean.downcast_ref::<T>().map(|b| b as &dyn DisposableBean)
}

fn as_factory_bean<T: FactoryBean + Any>(bean: &(dyn Any + Send + Sync)) -> Option<&dyn FactoryBean> {
    bean.downcast_ref::<T>().map(|b| b as &dyn FactoryBean)
}

fn as_post_processor<T: BeanPostProcessor + Any>(bean: SharedBean) -> Option<Arc<dyn BeanPostProcessor>> {
    bean.downcast::<T>().ok().map(|b| b as Arc<dyn BeanPostProcessor>)
}

fn as_listener<T: EventListener + Any>(bean: SharedBean) -> Option<Arc<dyn EventListener>> {
    bean.downcast::<T>().ok().map(|b| b as Arc<dyn EventListener>)
}

fn as_smart_singleton<T: SmartInitializingSingleton + Any>(
    bean: SharedBean,
) -> Option<Arc<dyn SmartInitializingSingleton>> {
    bean.downcast::<T>().ok().map(|b| b as Arc<dyn SmartInitializingSingleton>)
}

type Upcast = Box<dyn Fn(&SharedBean) -> Option<Box<dyn Any>> + Send + Sync>;

/// 声明的可赋值类型（通常是 `dyn Trait`），用于协变的类型化查找
pub(crate) struct AssignableType {
    pub type_id: TypeId,
    pub type_name: &'static str,
    upcast: Upcast,
}

impl AssignableType {
    /// 成功时返回装箱的 `Arc<I>`
    pub(crate) fn cast(&self, bean: &SharedBean) -> Option<Box<dyn Any>> {
        (self.upcast)(bean)
    }
}

/// Bean 定义 - 描述如何创建和管理 Bean
///
/// 注册后以 `Arc<BeanDefinition>` 的形式只读共享
pub struct BeanDefinition {
    /// Bean 的名称（内部 Bean 可以为空）
    pub(crate) name: String,

    /// 别名，按声明顺序
    pub(crate) aliases: Vec<String>,

    /// 目标类型
    pub(crate) bean_type: Option<(TypeId, &'static str)>,

    /// Bean 的作用域
    pub(crate) scope: Scope,

    /// 是否延迟初始化（仅对单例有效，未设置时取工厂的默认值）
    pub(crate) lazy_init: Option<bool>,

    /// 抽象定义只能作为模板，不能被实例化
    pub(crate) is_abstract: bool,

    /// 必须先完成初始化的 Bean
    pub(crate) depends_on: Vec<String>,

    pub(crate) constructor_args: Vec<ConstructorArg>,

    pub(crate) properties: Vec<PropertyValue>,

    pub(crate) init_method: Option<InitMethod>,

    pub(crate) destroy_method: Option<DestroyMethod>,

    pub(crate) instantiator: Option<Instantiator>,

    pub(crate) capabilities: Capabilities,

    pub(crate) assignable: Vec<AssignableType>,

    pub(crate) description: Option<String>,
}

impl BeanDefinition {
    /// 以构造函数创建定义，`T` 由闭包返回值推断
    pub fn builder<T, F>(name: impl Into<String>, constructor: F) -> BeanDefinitionBuilder<T>
    where
        T: Any + Send + Sync,
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let instantiator =
            Instantiator::Constructor(Box::new(move |args| constructor(args).map(BeanInstance::new)));
        BeanDefinitionBuilder::with_instantiator(name.into(), Some(instantiator))
    }

    /// 通过调用另一个 Bean（`factory_bean`）上的工厂方法创建实例
    pub fn factory_method<T, B, F>(
        name: impl Into<String>,
        factory_bean: impl Into<String>,
        method_name: impl Into<String>,
        method: F,
    ) -> BeanDefinitionBuilder<T>
    where
        T: Any + Send + Sync,
        B: Any + Send + Sync,
        F: Fn(&B, &Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let factory_bean = factory_bean.into();
        let method_name = method_name.into();
        let target = factory_bean.clone();
        let invoke: FactoryMethodFn = Box::new(move |bean, args| {
            let factory = bean.downcast_ref::<B>().ok_or_else(|| {
                anyhow!(
                    "factory bean '{}' is not of type '{}'",
                    target,
                    std::any::type_name::<B>()
                )
            })?;
            method(factory, args).map(BeanInstance::new)
        });
        BeanDefinitionBuilder::with_instantiator(
            name.into(),
            Some(Instantiator::FactoryMethod {
                factory_bean,
                method_name,
                invoke,
            }),
        )
    }

    /// 抽象模板定义，不可实例化
    pub fn abstract_definition<T: Any + Send + Sync>(name: impl Into<String>) -> BeanDefinitionBuilder<T> {
        let mut builder = BeanDefinitionBuilder::with_instantiator(name.into(), None);
        builder.definition.is_abstract = true;
        builder
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_singleton(&self) -> bool {
        self.scope.is_singleton()
    }

    pub fn is_prototype(&self) -> bool {
        self.scope.is_prototype()
    }

    /// 显式设置的延迟初始化标志，未设置时由工厂默认值决定
    pub fn lazy_init_flag(&self) -> Option<bool> {
        self.lazy_init
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn constructor_args(&self) -> &[ConstructorArg] {
        &self.constructor_args
    }

    pub fn properties(&self) -> &[PropertyValue] {
        &self.properties
    }

    pub fn init_method_name(&self) -> Option<&str> {
        self.init_method.as_ref().map(|m| m.name.as_str())
    }

    pub fn destroy_method_name(&self) -> Option<&str> {
        self.destroy_method.as_ref().map(|m| m.name.as_str())
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn bean_type_id(&self) -> Option<TypeId> {
        self.bean_type.map(|(id, _)| id)
    }

    pub fn bean_type_name(&self) -> &'static str {
        self.bean_type.map(|(_, name)| name).unwrap_or("unknown")
    }

    /// 工厂方法所依赖的工厂 Bean 名称
    pub fn factory_bean_name(&self) -> Option<&str> {
        match &self.instantiator {
            Some(Instantiator::FactoryMethod { factory_bean, .. }) => Some(factory_bean),
            _ => None,
        }
    }

    pub fn factory_method_name(&self) -> Option<&str> {
        match &self.instantiator {
            Some(Instantiator::FactoryMethod { method_name, .. }) => Some(method_name),
            _ => None,
        }
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        self.capabilities.tags()
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.tags().contains(&capability)
    }

    pub fn is_factory_bean(&self) -> bool {
        self.capabilities.factory_bean.is_some()
    }

    /// 是否可以按类型 `type_id` 查找（具体类型或声明的接口）
    pub fn is_assignable_to(&self, type_id: TypeId) -> bool {
        self.bean_type_id() == Some(type_id) || self.assignable.iter().any(|a| a.type_id == type_id)
    }

    pub(crate) fn find_assignable(&self, type_id: TypeId) -> Option<&AssignableType> {
        self.assignable.iter().find(|a| a.type_id == type_id)
    }

    pub(crate) fn has_destroy_callbacks(&self) -> bool {
        self.destroy_method.is_some() || self.capabilities.disposable.is_some()
    }

    /// 静态依赖：depends-on、非可选引用、工厂 Bean
    pub fn static_dependencies(&self) -> Vec<String> {
        let mut deps = self.depends_on.clone();
        if let Some(factory) = self.factory_bean_name() {
            deps.push(factory.to_string());
        }
        for arg in &self.constructor_args {
            arg.value.collect_references(&mut deps);
        }
        for property in &self.properties {
            property.value.collect_references(&mut deps);
        }
        let mut seen = HashSet::new();
        deps.retain(|d| seen.insert(d.clone()));
        deps
    }

    /// 结构校验
    pub fn validate(&self, name: &str) -> BeansResult<()> {
        if self.instantiator.is_none() && !self.is_abstract {
            return Err(BeansError::validation(
                name,
                "no constructor or factory method specified",
            ));
        }

        if self.is_abstract && self.has_destroy_callbacks() {
            return Err(BeansError::validation(
                name,
                "abstract bean definitions cannot declare destroy callbacks",
            ));
        }

        if self.depends_on.iter().any(|d| d == name) {
            return Err(BeansError::validation(name, "bean cannot depend on itself"));
        }

        let mut indexes = HashSet::new();
        for arg in &self.constructor_args {
            if let Some(index) = arg.index {
                if !indexes.insert(index) {
                    return Err(BeansError::validation(
                        name,
                        format!("duplicate constructor argument index {}", index),
                    ));
                }
            }
        }

        let mut property_names = HashSet::new();
        for property in &self.properties {
            if !property_names.insert(property.name.as_str()) {
                return Err(BeansError::validation(
                    name,
                    format!("duplicate property '{}'", property.name),
                ));
            }
            if let Some((type_id, type_name)) = self.bean_type {
                if property.target != type_id && self.instantiator.is_some() {
                    return Err(BeansError::validation(
                        name,
                        format!(
                            "setter for property '{}' does not target bean type '{}'",
                            property.name, type_name
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("type_name", &self.bean_type_name())
            .field("scope", &self.scope)
            .field("lazy_init", &self.lazy_init)
            .field("abstract", &self.is_abstract)
            .field("depends_on", &self.depends_on)
            .field("constructor_args", &self.constructor_args)
            .field("properties", &self.properties)
            .field("init_method", &self.init_method_name())
            .field("destroy_method", &self.destroy_method_name())
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

/// 类型化的 Bean 定义构建器
///
/// setter、init/destroy 回调以及能力声明都以 `T` 为目标类型，
/// `build()` 后擦除类型得到 `BeanDefinition`
pub struct BeanDefinitionBuilder<T> {
    definition: BeanDefinition,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> BeanDefinitionBuilder<T> {
    fn with_instantiator(name: String, instantiator: Option<Instantiator>) -> Self {
        Self {
            definition: BeanDefinition {
                name,
                aliases: Vec::new(),
                bean_type: Some((TypeId::of::<T>(), std::any::type_name::<T>())),
                scope: Scope::default(),
                lazy_init: None,
                is_abstract: false,
                depends_on: Vec::new(),
                constructor_args: Vec::new(),
                properties: Vec::new(),
                init_method: None,
                destroy_method: None,
                instantiator,
                capabilities: Capabilities::default(),
                assignable: Vec::new(),
                description: None,
            },
            _phantom: PhantomData,
        }
    }

    /// 设置作用域
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.definition.scope = scope;
        self
    }

    /// 设置延迟初始化
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.definition.lazy_init = Some(lazy);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.definition.aliases.push(alias.into());
        self
    }

    /// 设置 depends-on 列表（按顺序先初始化）
    pub fn with_depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definition
            .depends_on
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// 追加按顺序匹配的构造参数
    pub fn with_constructor_arg(mut self, value: ValueSource) -> Self {
        self.definition
            .constructor_args
            .push(ConstructorArg { index: None, value });
        self
    }

    /// 指定位置的构造参数
    pub fn with_indexed_constructor_arg(mut self, index: usize, value: ValueSource) -> Self {
        self.definition.constructor_args.push(ConstructorArg {
            index: Some(index),
            value,
        });
        self
    }

    /// 声明属性及其 setter
    pub fn with_property<F>(mut self, name: impl Into<String>, value: ValueSource, setter: F) -> Self
    where
        F: Fn(&mut T, BeanValue) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let property = name.clone();
        let setter: PropertySetter = Box::new(move |bean, value| {
            let target = bean.downcast_mut::<T>().ok_or_else(|| {
                anyhow!(
                    "cannot set property '{}': instance is not of type '{}'",
                    property,
                    std::any::type_name::<T>()
                )
            })?;
            setter(target, value)
        });
        self.definition.properties.push(PropertyValue {
            name,
            value,
            target: TypeId::of::<T>(),
            setter,
        });
        self
    }

    /// 设置 init-method
    pub fn with_init_method<F>(mut self, name: impl Into<String>, init_fn: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let method = name.clone();
        self.definition.init_method = Some(InitMethod {
            name,
            target: TypeId::of::<T>(),
            callback: Box::new(move |bean| {
                let target = bean.downcast_mut::<T>().ok_or_else(|| {
                    anyhow!("init method '{}' is not applicable to the exposed instance", method)
                })?;
                init_fn(target)
            }),
        });
        self
    }

    /// 设置 destroy-method
    pub fn with_destroy_method<F>(mut self, name: impl Into<String>, destroy_fn: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let method = name.clone();
        self.definition.destroy_method = Some(DestroyMethod {
            name,
            callback: Box::new(move |bean| {
                let target = bean.downcast_ref::<T>().ok_or_else(|| {
                    anyhow!("destroy method '{}' is not applicable to the exposed instance", method)
                })?;
                destroy_fn(target)
            }),
        });
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = Some(description.into());
        self
    }

    /// 声明 `T` 可以按接口类型 `I` 查找（例如 `dyn Repository`）
    pub fn assignable_to<I>(mut self, upcast: fn(Arc<T>) -> Arc<I>) -> Self
    where
        I: ?Sized + 'static,
    {
        self.definition.assignable.push(AssignableType {
            type_id: TypeId::of::<I>(),
            type_name: std::any::type_name::<I>(),
            upcast: Box::new(move |bean| {
                Arc::clone(bean)
                    .downcast::<T>()
                    .ok()
                    .map(|concrete| Box::new(upcast(concrete)) as Box<dyn Any>)
            }),
        });
        self
    }

    pub fn build(self) -> BeanDefinition {
        self.definition
    }
}

impl<T: BeanNameAware + Any + Send + Sync> BeanDefinitionBuilder<T> {
    pub fn bean_name_aware(mut self) -> Self {
        self.definition.capabilities.name_aware = Some(as_name_aware::<T>);
        self
    }
}

impl<T: BeanFactoryAware + Any + Send + Sync> BeanDefinitionBuilder<T> {
    pub fn bean_factory_aware(mut self) -> Self {
        self.definition.capabilities.factory_aware = Some(as_factory_aware::<T>);
        self
    }
}

impl<T: InitializingBean + Any + Send + Sync> BeanDefinitionBuilder<T> {
    pub fn initializing_bean(mut self) -> Self {
        self.definition.capabilities.initializing = Some(as_initializing::<T>);
        self
    }
}

impl<T: DisposableBean + Any + Send + Sync> BeanDefinitionBuilder<T> {
    pub fn disposable_bean(mut self) -> Self {
        self.definition.capabilities.disposable = Some(as_disposable::<T>);
        self
    }
}

impl<T: FactoryBean + Any> BeanDefinitionBuilder<T> {
    pub fn factory_bean(mut self) -> Self {
        self.definition.capabilities.factory_bean = Some(as_factory_bean::<T>);
        self
    }
}

impl<T: BeanPostProcessor + Any> BeanDefinitionBuilder<T> {
    /// 刷新上下文时该 Bean 会被实例化并注册为后置处理器
    pub fn bean_post_processor(mut self) -> Self {
        self.definition.capabilities.post_processor = Some(as_post_processor::<T>);
        self
    }
}

impl<T: EventListener + Any> BeanDefinitionBuilder<T> {
    /// 刷新上下文时该 Bean 会被注册为事件监听器
    pub fn application_listener(mut self) -> Self {
        self.definition.capabilities.listener = Some(as_listener::<T>);
        self
    }
}

impl<T: SmartInitializingSingleton + Any> BeanDefinitionBuilder<T> {
    pub fn smart_initializing_singleton(mut self) -> Self {
        self.definition.capabilities.smart_singleton = Some(as_smart_singleton::<T>);
        self
    }
}

impl<T: Any + Send + Sync> From<BeanDefinitionBuilder<T>> for BeanDefinition {
    fn from(builder: BeanDefinitionBuilder<T>) -> Self {
        builder.build()
    }
}
