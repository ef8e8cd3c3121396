use std::any::Any;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::error::{BeansError, BeansResult};

/// 事件 trait - 所有事件都必须实现此 trait
///
/// 类似 Spring 的 ApplicationEvent
pub trait Event: Any + Send + Sync {
    /// 获取事件名称
    fn event_name(&self) -> &str;

    /// 获取事件时间戳
    fn timestamp(&self) -> SystemTime;

    /// 获取事件源（可选）
    fn source(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }

    /// 转换为 Any 引用，用于类型转换
    fn as_any(&self) -> &dyn Any;
}

/// 上下文刷新完成事件
///
/// 所有非延迟单例初始化完成后发布
#[derive(Debug, Clone)]
pub struct ContextRefreshedEvent {
    pub context_id: String,
    pub bean_count: usize,
    pub timestamp: SystemTime,
}

impl ContextRefreshedEvent {
    pub fn new(context_id: impl Into<String>, bean_count: usize) -> Self {
        Self {
            context_id: context_id.into(),
            bean_count,
            timestamp: SystemTime::now(),
        }
    }
}

impl Event for ContextRefreshedEvent {
    fn event_name(&self) -> &str {
        "ContextRefreshedEvent"
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 上下文关闭事件
///
/// 在销毁单例之前发布
#[derive(Debug, Clone)]
pub struct ContextClosedEvent {
    pub context_id: String,
    pub timestamp: SystemTime,
}

impl ContextClosedEvent {
    pub fn new(context_id: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
            timestamp: SystemTime::now(),
        }
    }
}

impl Event for ContextClosedEvent {
    fn event_name(&self) -> &str {
        "ContextClosedEvent"
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 事件监听器 trait
///
/// 类似 Spring 的 ApplicationListener，同步执行
pub trait EventListener: Send + Sync {
    /// 处理事件
    fn on_event(&self, event: &Arc<dyn Event>) -> anyhow::Result<()>;

    /// 获取监听器名称（用于日志）
    fn listener_name(&self) -> &str {
        "AnonymousListener"
    }

    /// 是否支持该事件（默认支持所有事件）
    fn supports_event(&self, event: &dyn Event) -> bool {
        let _ = event;
        true
    }
}

/// 类型化事件监听器 trait
///
/// 提供类型安全的事件处理
pub trait TypedEventListener<E: Event>: Send + Sync {
    /// 处理特定类型的事件
    fn on_event(&self, event: &E) -> anyhow::Result<()>;

    /// 获取监听器名称（用于日志）
    fn listener_name(&self) -> &str {
        "AnonymousTypedListener"
    }
}

/// 类型化事件监听器适配器
///
/// 将 TypedEventListener<E> 适配为 EventListener，只接收运行时类型为 `E` 的事件
pub struct TypedEventListenerAdapter<E: Event + 'static, L: TypedEventListener<E>> {
    listener: Arc<L>,
    _phantom: PhantomData<fn(E)>,
}

impl<E: Event + 'static, L: TypedEventListener<E>> TypedEventListenerAdapter<E, L> {
    pub fn new(listener: Arc<L>) -> Self {
        Self {
            listener,
            _phantom: PhantomData,
        }
    }
}

impl<E: Event + 'static, L: TypedEventListener<E> + 'static> EventListener
    for TypedEventListenerAdapter<E, L>
{
    fn on_event(&self, event: &Arc<dyn Event>) -> anyhow::Result<()> {
        match event.as_any().downcast_ref::<E>() {
            Some(typed_event) => self.listener.on_event(typed_event),
            None => Ok(()),
        }
    }

    fn listener_name(&self) -> &str {
        self.listener.listener_name()
    }

    fn supports_event(&self, event: &dyn Event) -> bool {
        event.as_any().is::<E>()
    }
}

/// 错误处理器类型
///
/// 在隔离模式下接收监听器的失败
pub type ErrorHandler = Arc<dyn Fn(&dyn EventListener, &Arc<dyn Event>, &anyhow::Error) + Send + Sync>;

/// 事件多播器 trait
///
/// 类似 Spring 的 ApplicationEventMulticaster
/// 负责将事件传播到所有注册的监听器
pub trait ApplicationEventMulticaster: Send + Sync {
    /// 添加监听器
    fn add_listener(&self, listener: Arc<dyn EventListener>);

    /// 移除监听器
    fn remove_listener(&self, listener_name: &str);

    /// 移除所有监听器
    fn remove_all_listeners(&self);

    /// 广播事件到所有监听器
    ///
    /// 监听器的失败默认会中断后续监听器并返回给发布者；
    /// 开启隔离后失败交给 ErrorHandler（或记录日志），继续投递
    fn multicast_event(&self, event: Arc<dyn Event>) -> BeansResult<()>;

    /// 获取监听器数量
    fn listener_count(&self) -> usize;
}

/// 简单事件多播器实现
///
/// 按注册顺序同步调用监听器
pub struct SimpleApplicationEventMulticaster {
    /// 事件监听器列表
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
    /// 错误处理器
    error_handler: RwLock<Option<ErrorHandler>>,
    /// 是否隔离监听器失败
    isolate_failures: AtomicBool,
}

impl SimpleApplicationEventMulticaster {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            error_handler: RwLock::new(None),
            isolate_failures: AtomicBool::new(false),
        }
    }

    /// 设置错误处理器（同时开启失败隔离）
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&dyn EventListener, &Arc<dyn Event>, &anyhow::Error) + Send + Sync + 'static,
    {
        *self.error_handler.write() = Some(Arc::new(handler));
        self.isolate_failures.store(true, Ordering::Release);
    }

    /// 移除错误处理器并关闭失败隔离
    pub fn remove_error_handler(&self) {
        *self.error_handler.write() = None;
        self.isolate_failures.store(false, Ordering::Release);
    }

    pub fn set_isolate_failures(&self, isolate: bool) {
        self.isolate_failures.store(isolate, Ordering::Release);
    }

    pub fn is_isolating_failures(&self) -> bool {
        self.isolate_failures.load(Ordering::Acquire)
    }

    /// 调用单个监听器，panic 也转换为错误
    fn invoke_listener(listener: &Arc<dyn EventListener>, event: &Arc<dyn Event>) -> anyhow::Result<()> {
        match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(anyhow::anyhow!("Listener panicked: {}", message))
            }
        }
    }
}

impl Default for SimpleApplicationEventMulticaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationEventMulticaster for SimpleApplicationEventMulticaster {
    fn add_listener(&self, listener: Arc<dyn EventListener>) {
        tracing::debug!("Added event listener: {}", listener.listener_name());
        self.listeners.write().push(listener);
    }

    fn remove_listener(&self, listener_name: &str) {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.listener_name() != listener_name);
        if listeners.len() != before {
            tracing::debug!("Removed event listener: {}", listener_name);
        }
    }

    fn remove_all_listeners(&self) {
        self.listeners.write().clear();
        tracing::debug!("Removed all event listeners");
    }

    fn multicast_event(&self, event: Arc<dyn Event>) -> BeansResult<()> {
        // 克隆监听器列表，避免回调期间持锁
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .filter(|l| l.supports_event(event.as_ref()))
            .map(Arc::clone)
            .collect();

        tracing::debug!(
            "Multicasting event: {} to {} listener(s)",
            event.event_name(),
            listeners.len()
        );

        let isolate = self.is_isolating_failures();
        let error_handler = self.error_handler.read().clone();

        for listener in listeners {
            let Err(err) = Self::invoke_listener(&listener, &event) else {
                continue;
            };

            if !isolate {
                return Err(BeansError::EventDelivery {
                    listener: listener.listener_name().to_string(),
                    event: event.event_name().to_string(),
                    source: err.into(),
                });
            }

            match &error_handler {
                Some(handler) => handler(listener.as_ref(), &event, &err),
                None => tracing::warn!(
                    "Listener '{}' failed while handling event '{}': {:#}",
                    listener.listener_name(),
                    event.event_name(),
                    err
                ),
            }
        }

        Ok(())
    }

    fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

/// 事件发布器
///
/// 类似 Spring 的 ApplicationEventPublisher
/// 简化的发布接口，内部使用 ApplicationEventMulticaster
pub struct ApplicationEventPublisher {
    multicaster: Arc<dyn ApplicationEventMulticaster>,
}

impl ApplicationEventPublisher {
    pub fn new(multicaster: Arc<dyn ApplicationEventMulticaster>) -> Self {
        Self { multicaster }
    }

    /// 发布事件
    pub fn publish_event(&self, event: Arc<dyn Event>) -> BeansResult<()> {
        self.multicaster.multicast_event(event)
    }

    /// 发布具体类型的事件
    pub fn publish<E: Event>(&self, event: E) -> BeansResult<()> {
        self.publish_event(Arc::new(event))
    }

    /// 获取多播器
    pub fn multicaster(&self) -> &Arc<dyn ApplicationEventMulticaster> {
        &self.multicaster
    }

    /// 添加监听器
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.multicaster.add_listener(listener);
    }

    /// 添加类型化监听器
    pub fn add_typed_listener<E, L>(&self, listener: Arc<L>)
    where
        E: Event + 'static,
        L: TypedEventListener<E> + 'static,
    {
        self.multicaster
            .add_listener(Arc::new(TypedEventListenerAdapter::<E, L>::new(listener)));
    }

    /// 移除监听器
    pub fn remove_listener(&self, listener_name: &str) {
        self.multicaster.remove_listener(listener_name);
    }

    /// 获取监听器数量
    pub fn listener_count(&self) -> usize {
        self.multicaster.listener_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct OrderPlaced {
        id: u32,
        timestamp: SystemTime,
    }

    impl OrderPlaced {
        fn new(id: u32) -> Self {
            Self {
                id,
                timestamp: SystemTime::now(),
            }
        }
    }

    impl Event for OrderPlaced {
        fn event_name(&self) -> &str {
            "OrderPlaced"
        }

        fn timestamp(&self) -> SystemTime {
            self.timestamp
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl EventListener for Recorder {
        fn on_event(&self, event: &Arc<dyn Event>) -> anyhow::Result<()> {
            self.log
                .lock()
                .push(format!("{}:{}", self.name, event.event_name()));
            if self.fail {
                anyhow::bail!("{} rejected the event", self.name);
            }
            Ok(())
        }

        fn listener_name(&self) -> &str {
            self.name
        }
    }

    struct OrderAudit {
        seen: Mutex<Vec<u32>>,
    }

    impl TypedEventListener<OrderPlaced> for OrderAudit {
        fn on_event(&self, event: &OrderPlaced) -> anyhow::Result<()> {
            self.seen.lock().push(event.id);
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>, fail: bool) -> Arc<dyn EventListener> {
        Arc::new(Recorder {
            name,
            log: Arc::clone(log),
            fail,
        })
    }

    #[test]
    fn test_listeners_invoked_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let multicaster = SimpleApplicationEventMulticaster::new();
        multicaster.add_listener(recorder("first", &log, false));
        multicaster.add_listener(recorder("second", &log, false));

        multicaster
            .multicast_event(Arc::new(OrderPlaced::new(1)))
            .unwrap();

        assert_eq!(
            *log.lock(),
            vec!["first:OrderPlaced".to_string(), "second:OrderPlaced".to_string()]
        );
    }

    #[test]
    fn test_failure_aborts_delivery_by_default() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let multicaster = SimpleApplicationEventMulticaster::new();
        multicaster.add_listener(recorder("failing", &log, true));
        multicaster.add_listener(recorder("after", &log, false));

        let err = multicaster
            .multicast_event(Arc::new(OrderPlaced::new(1)))
            .unwrap_err();

        assert!(matches!(err, BeansError::EventDelivery { ref listener, .. } if listener == "failing"));
        assert_eq!(*log.lock(), vec!["failing:OrderPlaced".to_string()]);
    }

    #[test]
    fn test_isolated_failures_continue_delivery() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handled = Arc::new(Mutex::new(Vec::new()));
        let multicaster = SimpleApplicationEventMulticaster::new();
        multicaster.add_listener(recorder("failing", &log, true));
        multicaster.add_listener(recorder("after", &log, false));

        let sink = Arc::clone(&handled);
        multicaster.set_error_handler(move |listener, _, err| {
            sink.lock()
                .push(format!("{}: {}", listener.listener_name(), err));
        });

        multicaster
            .multicast_event(Arc::new(OrderPlaced::new(1)))
            .unwrap();

        assert_eq!(log.lock().len(), 2);
        assert_eq!(
            *handled.lock(),
            vec!["failing: failing rejected the event".to_string()]
        );
    }

    #[test]
    fn test_removing_error_handler_restores_abort() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let multicaster = SimpleApplicationEventMulticaster::new();
        multicaster.add_listener(recorder("failing", &log, true));
        multicaster.add_listener(recorder("after", &log, false));

        multicaster.set_error_handler(|_, _, _| {});
        assert!(multicaster.is_isolating_failures());
        multicaster.remove_error_handler();
        assert!(!multicaster.is_isolating_failures());

        let err = multicaster
            .multicast_event(Arc::new(OrderPlaced::new(2)))
            .unwrap_err();
        assert!(matches!(err, BeansError::EventDelivery { ref listener, .. } if listener == "failing"));
        assert_eq!(*log.lock(), vec!["failing:OrderPlaced".to_string()]);

        multicaster.set_isolate_failures(true);
        multicaster
            .multicast_event(Arc::new(OrderPlaced::new(3)))
            .unwrap();
        assert_eq!(log.lock().len(), 3);
    }

    #[test]
    fn test_typed_listener_only_sees_matching_events() {
        let audit = Arc::new(OrderAudit {
            seen: Mutex::new(Vec::new()),
        });
        let publisher =
            ApplicationEventPublisher::new(Arc::new(SimpleApplicationEventMulticaster::new()));
        publisher.add_typed_listener::<OrderPlaced, _>(Arc::clone(&audit));

        publisher.publish(OrderPlaced::new(7)).unwrap();
        publisher.publish(ContextClosedEvent::new("ctx")).unwrap();

        assert_eq!(*audit.seen.lock(), vec![7]);
        assert_eq!(publisher.listener_count(), 1);
    }

    #[test]
    fn test_panicking_listener_becomes_error() {
        struct Panicky;

        impl EventListener for Panicky {
            fn on_event(&self, _event: &Arc<dyn Event>) -> anyhow::Result<()> {
                panic!("listener exploded");
            }
        }

        let multicaster = SimpleApplicationEventMulticaster::new();
        multicaster.add_listener(Arc::new(Panicky));
        let err = multicaster
            .multicast_event(Arc::new(OrderPlaced::new(1)))
            .unwrap_err();
        assert!(err.root_cause().to_string().contains("listener exploded"));
    }

    #[test]
    fn test_remove_listener_by_name() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let multicaster = SimpleApplicationEventMulticaster::new();
        multicaster.add_listener(recorder("a", &log, false));
        multicaster.add_listener(recorder("b", &log, false));
        multicaster.remove_listener("a");
        assert_eq!(multicaster.listener_count(), 1);
        multicaster.remove_all_listeners();
        assert_eq!(multicaster.listener_count(), 0);
    }
}
