//! 单例缓存
//!
//! 每个单例名称的状态机：absent -> in-creation -> ready。
//! 同一名称同一时刻只有一个线程拥有创建权，其它线程在条件变量上等待，
//! 被唤醒后重新检查缓存。所有权表只在状态转换时加锁，
//! 不会在传递性依赖解析期间持有。FactoryBean 的共享产品走同一张所有权表，
//! 以独立的槽位区分。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::bean::{BeanDefinition, SharedInstance};
use crate::error::{BeansError, BeansResult, DestructionFailure};

/// 销毁适配器：在关闭时依次调用 DisposableBean 与 destroy-method
pub(crate) struct DisposableBeanAdapter {
    bean_name: String,
    instance: SharedInstance,
    definition: Arc<BeanDefinition>,
    inner_beans: Vec<DisposableBeanAdapter>,
}

impl DisposableBeanAdapter {
    pub fn new(bean_name: &str, instance: SharedInstance, definition: Arc<BeanDefinition>) -> Self {
        Self {
            bean_name: bean_name.to_string(),
            instance,
            definition,
            inner_beans: Vec::new(),
        }
    }

    pub fn with_inner_beans(mut self, inner_beans: Vec<DisposableBeanAdapter>) -> Self {
        self.inner_beans = inner_beans;
        self
    }

    pub fn has_callbacks(&self) -> bool {
        self.definition.has_destroy_callbacks() || self.inner_beans.iter().any(|i| i.has_callbacks())
    }

    /// 调用所有销毁回调，失败记录到 `failures` 后继续
    pub fn destroy(&self, failures: &mut Vec<DestructionFailure>) {
        let object = self.instance.object().as_ref();

        if let Some(as_disposable) = self.definition.capabilities.disposable {
            if let Some(disposable) = as_disposable(object) {
                tracing::debug!("Invoking destroy() on bean with name '{}'", self.bean_name);
                if let Err(e) = disposable.destroy() {
                    tracing::error!("Destroy method on bean with name '{}' threw an exception: {:#}", self.bean_name, e);
                    failures.push(DestructionFailure {
                        bean_name: self.bean_name.clone(),
                        error: e,
                    });
                }
            }
        }

        if let Some(method) = &self.definition.destroy_method {
            tracing::debug!(
                "Invoking custom destroy method '{}' on bean with name '{}'",
                method.name,
                self.bean_name
            );
            if let Err(e) = method.invoke(object) {
                tracing::error!(
                    "Custom destroy method '{}' on bean with name '{}' threw an exception: {:#}",
                    method.name,
                    self.bean_name,
                    e
                );
                failures.push(DestructionFailure {
                    bean_name: self.bean_name.clone(),
                    error: e,
                });
            }
        }

        for inner in &self.inner_beans {
            inner.destroy(failures);
        }
    }
}

/// 所有权表中的槽位：单例本身，或 FactoryBean 的共享产品
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Slot {
    Singleton(String),
    FactoryObject(String),
}

impl Slot {
    fn name(&self) -> &str {
        match self {
            Slot::Singleton(name) | Slot::FactoryObject(name) => name,
        }
    }
}

/// 创建所有权表
#[derive(Default)]
struct CreationTable {
    /// 槽位 -> 正在创建它的线程
    owners: HashMap<Slot, ThreadId>,
    /// 线程 -> 它正在等待的槽位
    waiting: HashMap<ThreadId, Slot>,
}

impl CreationTable {
    /// 沿 wait-for 关系从 `owner` 出发，若回到 `me` 则等待会形成死锁，返回链路
    fn deadlock_chain(&self, slot: &Slot, owner: ThreadId, me: ThreadId) -> Option<Vec<String>> {
        let mut chain = vec![slot.name().to_string()];
        let mut current = owner;
        for _ in 0..=self.waiting.len() {
            if current == me {
                return Some(chain);
            }
            let awaited = self.waiting.get(&current)?;
            chain.push(awaited.name().to_string());
            current = *self.owners.get(awaited)?;
        }
        None
    }
}

/// 获取结果：已就绪的实例，或当前线程获得了创建权
pub(crate) enum Acquired<'a> {
    Ready(SharedInstance),
    Owner(CreationOwnership<'a>),
}

/// 创建权守卫
///
/// `complete` 之前被 drop（创建失败）时释放所有权并唤醒等待者，
/// 名称回到 absent 状态，不留下半成品
pub(crate) struct CreationOwnership<'a> {
    cache: &'a SingletonCache,
    slot: Slot,
    released: bool,
}

impl CreationOwnership<'_> {
    /// 标记为 ready；单例还会记录完成顺序
    pub fn complete(mut self, instance: SharedInstance) -> SharedInstance {
        let mut table = self.cache.creation.lock();
        match &self.slot {
            Slot::Singleton(name) => {
                self.cache.ready.write().insert(name.clone(), instance.clone());
                self.cache.completion_order.lock().push(name.clone());
            }
            Slot::FactoryObject(name) => {
                self.cache
                    .factory_objects
                    .write()
                    .insert(name.clone(), instance.clone());
            }
        }
        table.owners.remove(&self.slot);
        self.released = true;
        drop(table);
        self.cache.creation_done.notify_all();
        instance
    }
}

impl Drop for CreationOwnership<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.cache.creation.lock().owners.remove(&self.slot);
            self.cache.creation_done.notify_all();
            tracing::trace!("Released creation ownership of {:?} without a result", self.slot);
        }
    }
}

/// SingletonCache - 单例注册与缓存
pub(crate) struct SingletonCache {
    ready: RwLock<HashMap<String, SharedInstance>>,
    completion_order: Mutex<Vec<String>>,
    creation: Mutex<CreationTable>,
    creation_done: Condvar,
    /// 名称 -> 依赖它的 Bean
    dependents: RwLock<HashMap<String, Vec<String>>>,
    disposables: Mutex<HashMap<String, DisposableBeanAdapter>>,
    /// FactoryBean 产品缓存
    factory_objects: RwLock<HashMap<String, SharedInstance>>,
}

impl SingletonCache {
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(HashMap::new()),
            completion_order: Mutex::new(Vec::new()),
            creation: Mutex::new(CreationTable::default()),
            creation_done: Condvar::new(),
            dependents: RwLock::new(HashMap::new()),
            disposables: Mutex::new(HashMap::new()),
            factory_objects: RwLock::new(HashMap::new()),
        }
    }

    /// 快速路径：只读查询 ready 状态
    pub fn get(&self, name: &str) -> Option<SharedInstance> {
        self.ready.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ready.read().contains_key(name)
    }

    /// 按完成顺序返回 ready 单例名称
    pub fn names(&self) -> Vec<String> {
        self.completion_order.lock().clone()
    }

    /// 是否有任意线程正在创建该单例
    pub fn is_in_creation(&self, name: &str) -> bool {
        self.creation
            .lock()
            .owners
            .contains_key(&Slot::Singleton(name.to_string()))
    }

    /// 获取 ready 单例，或取得该名称的创建权
    ///
    /// 其它线程正在创建时阻塞等待；等待会形成跨线程死锁时返回
    /// `BeanCurrentlyInCreation`
    pub fn acquire(&self, name: &str) -> BeansResult<Acquired<'_>> {
        self.acquire_slot(Slot::Singleton(name.to_string()))
    }

    /// 获取已缓存的 FactoryBean 产品，或取得创建该产品的权利
    ///
    /// 与 `acquire` 相同的等待与死锁检测规则，保证 `get_object` 只被调用一次
    pub fn acquire_factory_object(&self, name: &str) -> BeansResult<Acquired<'_>> {
        self.acquire_slot(Slot::FactoryObject(name.to_string()))
    }

    fn lookup(&self, slot: &Slot) -> Option<SharedInstance> {
        match slot {
            Slot::Singleton(name) => self.ready.read().get(name).cloned(),
            Slot::FactoryObject(name) => self.factory_objects.read().get(name).cloned(),
        }
    }

    fn acquire_slot(&self, slot: Slot) -> BeansResult<Acquired<'_>> {
        let me = thread::current().id();
        let mut table = self.creation.lock();
        loop {
            if let Some(instance) = self.lookup(&slot) {
                return Ok(Acquired::Ready(instance));
            }

            let owner = match table.owners.get(&slot) {
                None => {
                    table.owners.insert(slot.clone(), me);
                    return Ok(Acquired::Owner(CreationOwnership {
                        cache: self,
                        slot,
                        released: false,
                    }));
                }
                Some(owner) => *owner,
            };

            let name = slot.name().to_string();
            if owner == me {
                return Err(BeansError::BeanCurrentlyInCreation {
                    chain: vec![name.clone(), name.clone()],
                    name,
                });
            }

            if let Some(chain) = table.deadlock_chain(&slot, owner, me) {
                tracing::warn!("Waiting for '{}' would deadlock: {}", name, chain.join(" -> "));
                return Err(BeansError::BeanCurrentlyInCreation { name, chain });
            }

            tracing::trace!("{:?} is being created by another thread, waiting", slot);
            table.waiting.insert(me, slot.clone());
            self.creation_done.wait(&mut table);
            table.waiting.remove(&me);
        }
    }

    /// 手动注册已存在的实例
    pub fn register(&self, name: &str, instance: SharedInstance) -> BeansResult<()> {
        let table = self.creation.lock();
        if table.owners.contains_key(&Slot::Singleton(name.to_string())) {
            return Err(BeansError::store(name, "singleton is currently in creation"));
        }
        let mut ready = self.ready.write();
        if ready.contains_key(name) {
            return Err(BeansError::store(
                name,
                "could not register singleton: there is already an object bound",
            ));
        }
        ready.insert(name.to_string(), instance);
        self.completion_order.lock().push(name.to_string());
        Ok(())
    }

    pub fn register_disposable(&self, adapter: DisposableBeanAdapter) {
        if adapter.has_callbacks() {
            self.disposables
                .lock()
                .insert(adapter.bean_name.clone(), adapter);
        }
    }

    /// 记录 `dependent` 依赖于 `name`
    pub fn register_dependent(&self, name: &str, dependent: &str) {
        let mut dependents = self.dependents.write();
        let entry = dependents.entry(name.to_string()).or_default();
        if !entry.iter().any(|d| d == dependent) {
            entry.push(dependent.to_string());
        }
    }

    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.dependents
            .read()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// 销毁单个单例：先销毁依赖它的 Bean
    pub fn destroy_singleton(&self, name: &str) -> Vec<DestructionFailure> {
        let mut failures = Vec::new();
        let mut destroyed = HashSet::new();
        self.destroy_recursive(name, &mut destroyed, &mut failures);
        failures
    }

    /// 按完成顺序的逆序销毁全部单例，所有回调都会被尝试
    pub fn destroy_singletons(&self) -> Vec<DestructionFailure> {
        let order: Vec<String> = self.completion_order.lock().iter().rev().cloned().collect();
        tracing::debug!("Destroying singletons in order: {:?}", order);

        let mut failures = Vec::new();
        let mut destroyed = HashSet::new();
        for name in order {
            self.destroy_recursive(&name, &mut destroyed, &mut failures);
        }

        self.ready.write().clear();
        self.completion_order.lock().clear();
        self.dependents.write().clear();
        self.disposables.lock().clear();
        self.factory_objects.write().clear();
        failures
    }

    fn destroy_recursive(
        &self,
        name: &str,
        destroyed: &mut HashSet<String>,
        failures: &mut Vec<DestructionFailure>,
    ) {
        if !destroyed.insert(name.to_string()) {
            return;
        }

        for dependent in self.dependents_of(name) {
            self.destroy_recursive(&dependent, destroyed, failures);
        }

        self.ready.write().remove(name);
        self.completion_order.lock().retain(|n| n != name);
        self.factory_objects.write().remove(name);
        self.dependents.write().remove(name);

        let adapter = self.disposables.lock().remove(name);
        if let Some(adapter) = adapter {
            adapter.destroy(failures);
        }
    }
}
