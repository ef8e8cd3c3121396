//! End-to-end container scenarios: resolution, lifecycle ordering, shutdown,
//! concurrency and the context surface.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, SystemTime};

use anyhow::bail;
use arbor_core::prelude::*;
use arbor_core::{ApplicationEventMulticaster, Capability, SharedBean};
use parking_lot::Mutex;

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

#[derive(Debug)]
struct Node {
    label: String,
}

fn node(name: &str) -> BeanDefinition {
    let label = name.to_string();
    BeanDefinition::builder(name, move |_| Ok(Node { label: label.clone() })).build()
}

#[test]
fn singleton_requests_share_one_instance() {
    let factory = DefaultListableBeanFactory::new();
    factory.register(node("a")).unwrap();

    let first = factory.get_bean("a").unwrap();
    let second = factory.get_bean("a").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(factory.is_singleton("a").unwrap());
}

#[test]
fn prototype_requests_produce_fresh_instances() {
    let factory = DefaultListableBeanFactory::new();
    factory
        .register(
            BeanDefinition::builder("p", |_| Ok(Node { label: "p".into() })).with_scope(Scope::Prototype),
        )
        .unwrap();

    let first = factory.get_bean_typed::<Node>("p").unwrap();
    let second = factory.get_bean_typed::<Node>("p").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.label, second.label);
}

struct Linked {
    other: Option<Arc<Linked>>,
}

fn linked(name: &str, other: &str) -> BeanDefinition {
    BeanDefinition::builder(name, |_| Ok(Linked { other: None }))
        .with_property("other", ValueSource::reference(other), |l: &mut Linked, v| {
            l.other = Some(v.into_bean::<Linked>()?);
            Ok(())
        })
        .build()
}

#[test]
fn property_cycle_fails_without_leaving_ready_state() {
    let factory = DefaultListableBeanFactory::new();
    factory.register(linked("a", "b")).unwrap();
    factory.register(linked("b", "a")).unwrap();

    let err = factory.get_bean("a").unwrap_err();
    assert!(err.is_currently_in_creation(), "unexpected error: {}", err);
    assert!(factory.get_singleton_names().is_empty());
    assert!(!factory.is_currently_in_creation("a"));
    assert!(!factory.is_currently_in_creation("b"));

    // a second attempt fails the same way instead of returning a half-built bean
    assert!(factory.get_bean("b").unwrap_err().is_currently_in_creation());
}

#[test]
fn property_referring_to_its_own_bean_is_a_cycle() {
    let factory = DefaultListableBeanFactory::new();
    factory.register(linked("s", "s")).unwrap();

    let err = factory.get_bean("s").unwrap_err();
    assert!(err.is_currently_in_creation(), "unexpected error: {}", err);
    assert!(!factory.is_currently_in_creation("s"));
}

#[derive(Default)]
struct SelfAware {
    factory: Option<std::sync::Weak<dyn BeanFactory>>,
}

impl BeanFactoryAware for SelfAware {
    fn set_bean_factory(&mut self, bean_factory: std::sync::Weak<dyn BeanFactory>) {
        self.factory = Some(bean_factory);
    }
}

impl SelfAware {
    fn myself(&self) -> anyhow::Result<SharedBean> {
        let Some(factory) = self.factory.as_ref().and_then(|f| f.upgrade()) else {
            bail!("factory is gone");
        };
        Ok(factory.get_bean("s")?)
    }
}

#[test]
fn bean_can_look_itself_up_once_ready() {
    let factory = DefaultListableBeanFactory::new();
    factory
        .register(
            BeanDefinition::builder("s", |_| Ok(SelfAware::default()))
                .bean_factory_aware(),
        )
        .unwrap();

    let exposed = factory.get_bean("s").unwrap();
    let typed = factory.get_bean_typed::<SelfAware>("s").unwrap();
    let looked_up = typed.myself().unwrap();
    assert!(Arc::ptr_eq(&exposed, &looked_up));
}

#[test]
fn prototype_cycle_is_just_as_fatal() {
    let factory = DefaultListableBeanFactory::new();
    for (name, other) in [("a", "b"), ("b", "a")] {
        factory
            .register(
                BeanDefinition::builder(name, |args| Ok(Linked { other: Some(args.bean::<Linked>(0)?) }))
                    .with_scope(Scope::Prototype)
                    .with_constructor_arg(ValueSource::reference(other)),
            )
            .unwrap();
    }

    let err = factory.get_bean("a").unwrap_err();
    assert!(matches!(err, BeansError::BeanCurrentlyInCreation { ref chain, .. } if chain.len() == 3));
}

#[test]
fn duplicate_registration_keeps_the_original() {
    let factory = DefaultListableBeanFactory::new();
    factory.register(node("a")).unwrap();

    let err = factory
        .register(BeanDefinition::builder("a", |_| Ok(Node { label: "second".into() })))
        .unwrap_err();
    assert!(matches!(err, BeansError::BeanDefinitionStore { .. }));
    assert_eq!(factory.get_bean_typed::<Node>("a").unwrap().label, "a");
    assert_eq!(factory.get_bean_definition_count(), 1);
}

#[test]
fn unknown_bean_is_reported_by_name() {
    let factory = DefaultListableBeanFactory::new();
    assert!(!factory.contains_bean("ghost"));

    let err = factory.get_bean("ghost").unwrap_err();
    assert!(matches!(err, BeansError::NoSuchBeanDefinition { .. }));
    assert!(err.to_string().contains("ghost"));
}

struct Recording {
    label: &'static str,
    log: Log,
}

impl BeanPostProcessor for Recording {
    fn post_process_before_initialization(&self, bean: BeanInstance, bean_name: &str) -> anyhow::Result<BeanInstance> {
        self.log.lock().push(format!("{}:before:{}", self.label, bean_name));
        Ok(bean)
    }

    fn post_process_after_initialization(&self, bean: BeanInstance, bean_name: &str) -> anyhow::Result<BeanInstance> {
        self.log.lock().push(format!("{}:after:{}", self.label, bean_name));
        Ok(bean)
    }

    fn name(&self) -> &str {
        self.label
    }
}

#[test]
fn post_processors_run_in_registration_order_for_both_hooks() {
    let log = new_log();
    let factory = DefaultListableBeanFactory::new();
    factory.add_bean_post_processor(Arc::new(Recording {
        label: "P1",
        log: Arc::clone(&log),
    }));
    factory.add_bean_post_processor(Arc::new(Recording {
        label: "P2",
        log: Arc::clone(&log),
    }));
    factory.register(node("x")).unwrap();

    factory.get_bean("x").unwrap();

    assert_eq!(
        *log.lock(),
        vec!["P1:before:x", "P2:before:x", "P1:after:x", "P2:after:x"]
    );
}

struct Wrapped(Node);

struct Wrapping;

impl BeanPostProcessor for Wrapping {
    fn post_process_after_initialization(&self, bean: BeanInstance, _bean_name: &str) -> anyhow::Result<BeanInstance> {
        match bean.into_inner::<Node>() {
            Ok(node) => Ok(BeanInstance::new(Wrapped(node))),
            Err(other) => Ok(other),
        }
    }
}

#[test]
fn post_processor_may_substitute_the_instance() {
    let factory = DefaultListableBeanFactory::new();
    factory.add_bean_post_processor(Arc::new(Wrapping));
    factory.register(node("n")).unwrap();

    let wrapped = factory.get_bean_typed::<Wrapped>("n").unwrap();
    assert_eq!(wrapped.0.label, "n");
    assert!(matches!(
        factory.get_bean_typed::<Node>("n"),
        Err(BeansError::BeanNotOfRequiredType { .. })
    ));
}

struct Holder {
    b: Option<Arc<Node>>,
}

#[test]
fn property_reference_injects_the_shared_instance() {
    let factory = DefaultListableBeanFactory::new();
    factory.register(node("b")).unwrap();
    factory
        .register(
            BeanDefinition::builder("a", |_| Ok(Holder { b: None })).with_property(
                "b",
                ValueSource::reference("b"),
                |h: &mut Holder, v| {
                    h.b = Some(v.into_bean::<Node>()?);
                    Ok(())
                },
            ),
        )
        .unwrap();

    let a = factory.get_bean_typed::<Holder>("a").unwrap();
    let b = factory.get_bean_typed::<Node>("b").unwrap();
    assert!(Arc::ptr_eq(a.b.as_ref().unwrap(), &b));
}

struct Touched {
    touched: bool,
}

#[test]
fn depends_on_initializes_the_dependency_first() {
    let log = new_log();
    let factory = DefaultListableBeanFactory::new();

    let init_log = Arc::clone(&log);
    factory
        .register(
            BeanDefinition::builder("y", |_| Ok(Touched { touched: false })).with_init_method(
                "touch",
                move |t: &mut Touched| {
                    t.touched = true;
                    init_log.lock().push("y.touch".to_string());
                    Ok(())
                },
            ),
        )
        .unwrap();

    let ctor_log = Arc::clone(&log);
    factory
        .register(
            BeanDefinition::builder("x", move |_| {
                ctor_log.lock().push("x.new".to_string());
                Ok(Node { label: "x".into() })
            })
            .with_depends_on(["y"]),
        )
        .unwrap();

    factory.get_bean("x").unwrap();

    assert_eq!(*log.lock(), vec!["y.touch", "x.new"]);
    assert!(factory.get_bean_typed::<Touched>("y").unwrap().touched);
    assert_eq!(factory.get_dependent_beans("y"), vec!["x".to_string()]);
}

fn destroy_logging(name: &'static str, log: &Log, fail: bool) -> BeanDefinition {
    let log = Arc::clone(log);
    BeanDefinition::builder(name, move |_| Ok(Node { label: name.into() }))
        .with_destroy_method("close", move |n: &Node| {
            log.lock().push(n.label.clone());
            if fail {
                bail!("{} refused to close", n.label);
            }
            Ok(())
        })
        .build()
}

#[test]
fn shutdown_runs_in_reverse_order_and_collects_failures() {
    let log = new_log();
    let factory = DefaultListableBeanFactory::new();
    factory.register(destroy_logging("a", &log, false)).unwrap();
    factory.register(destroy_logging("b", &log, true)).unwrap();
    factory.register(destroy_logging("c", &log, false)).unwrap();
    factory.preinstantiate_singletons().unwrap();

    let err = factory.destroy_singletons().unwrap_err();

    assert_eq!(*log.lock(), vec!["c", "b", "a"]);
    match err {
        BeansError::Destruction { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].bean_name, "b");
            assert_eq!(failures[0].error.to_string(), "b refused to close");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(factory.get_singleton_names().is_empty());
}

#[test]
fn dependents_are_destroyed_before_their_dependencies() {
    let log = new_log();
    let factory = DefaultListableBeanFactory::new();
    factory.register(destroy_logging("pool", &log, false)).unwrap();

    let close_log = Arc::clone(&log);
    factory
        .register(
            BeanDefinition::builder("repo", |args| Ok(Node { label: format!("repo({})", args.bean::<Node>(0)?.label) }))
                .with_constructor_arg(ValueSource::reference("pool"))
                .with_destroy_method("close", move |_: &Node| {
                    close_log.lock().push("repo".to_string());
                    Ok(())
                }),
        )
        .unwrap();

    factory.get_bean("repo").unwrap();
    factory.destroy_singleton("pool").unwrap();

    assert_eq!(*log.lock(), vec!["repo", "pool"]);
    assert!(factory.get_singleton_names().is_empty());
}

#[test]
fn concurrent_first_requests_create_exactly_one_instance() {
    let created = Arc::new(AtomicUsize::new(0));
    let factory = DefaultListableBeanFactory::new();
    let counter = Arc::clone(&created);
    factory
        .register(BeanDefinition::builder("slow", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            Ok(Node { label: "slow".into() })
        }))
        .unwrap();

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let factory = Arc::clone(&factory);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                factory.get_bean_typed::<Node>("slow").unwrap()
            })
        })
        .collect();

    let beans: Vec<Arc<Node>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(beans.iter().all(|b| Arc::ptr_eq(b, &beans[0])));
}

#[test]
fn concurrent_unrelated_resolution_reports_no_false_cycle() {
    let factory = DefaultListableBeanFactory::new();
    for i in 0..4 {
        let leaf = format!("leaf{}", i);
        let label = leaf.clone();
        factory
            .register(BeanDefinition::builder(leaf.clone(), move |_| {
                thread::sleep(Duration::from_millis(10));
                Ok(Node { label: label.clone() })
            }))
            .unwrap();
        factory
            .register(
                BeanDefinition::builder(format!("root{}", i), |args| Ok(Holder { b: Some(args.bean::<Node>(0)?) }))
                    .with_scope(Scope::Prototype)
                    .with_constructor_arg(ValueSource::reference(leaf)),
            )
            .unwrap();
    }
    // shared singleton every root also touches
    factory.register(node("shared")).unwrap();

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let factory = Arc::clone(&factory);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..5 {
                    factory.get_bean(&format!("root{}", i))?;
                    factory.get_bean("shared")?;
                }
                Ok::<_, BeansError>(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
}

#[test]
fn aliases_resolve_and_cycles_are_rejected() {
    let factory = DefaultListableBeanFactory::new();
    factory
        .register(BeanDefinition::builder("dataSource", |_| Ok(Node { label: "ds".into() })).with_alias("db"))
        .unwrap();
    factory.register_alias("db", "primary").unwrap();

    let canonical = factory.get_bean("dataSource").unwrap();
    assert!(Arc::ptr_eq(&canonical, &factory.get_bean("db").unwrap()));
    assert!(Arc::ptr_eq(&canonical, &factory.get_bean("primary").unwrap()));
    assert_eq!(factory.get_aliases("dataSource"), vec!["db", "primary"]);
    assert!(factory.is_alias("primary"));

    assert!(matches!(
        factory.register_alias("primary", "db"),
        Err(BeansError::BeanDefinitionStore { .. })
    ));
    assert!(Arc::ptr_eq(&canonical, &factory.get_bean("db").unwrap()));
}

struct Connection {
    id: usize,
}

struct ConnectionFactory {
    issued: AtomicUsize,
}

impl FactoryBean for ConnectionFactory {
    fn get_object(&self) -> anyhow::Result<BeanInstance> {
        let id = self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(BeanInstance::new(Connection { id }))
    }

    fn object_type_name(&self) -> &'static str {
        std::any::type_name::<Connection>()
    }
}

#[test]
fn factory_bean_exposes_its_product_and_dereference_returns_the_factory() {
    let factory = DefaultListableBeanFactory::new();
    factory
        .register(
            BeanDefinition::builder("connection", |_| {
                Ok(ConnectionFactory {
                    issued: AtomicUsize::new(0),
                })
            })
            .factory_bean(),
        )
        .unwrap();

    let product = factory.get_bean_typed::<Connection>("connection").unwrap();
    let again = factory.get_bean_typed::<Connection>("connection").unwrap();
    assert_eq!(product.id, 0);
    assert!(Arc::ptr_eq(&product, &again));

    let creator = factory.get_bean_typed::<ConnectionFactory>("&connection").unwrap();
    assert_eq!(creator.issued.load(Ordering::SeqCst), 1);

    factory.register(node("plain")).unwrap();
    assert!(matches!(
        factory.get_bean("&plain"),
        Err(BeansError::BeanNotOfRequiredType { .. })
    ));
}

struct SlowConnectionFactory {
    calls: Arc<AtomicUsize>,
}

impl FactoryBean for SlowConnectionFactory {
    fn get_object(&self) -> anyhow::Result<BeanInstance> {
        let id = self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        Ok(BeanInstance::new(Connection { id }))
    }
}

#[test]
fn concurrent_product_lookups_share_one_get_object_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = DefaultListableBeanFactory::new();
    let counter = Arc::clone(&calls);
    factory
        .register(
            BeanDefinition::builder("conn", move |_| {
                Ok(SlowConnectionFactory {
                    calls: Arc::clone(&counter),
                })
            })
            .factory_bean(),
        )
        .unwrap();
    // the factory itself is ready before any product is requested
    factory.get_bean("&conn").unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let factory = Arc::clone(&factory);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                factory.get_bean_typed::<Connection>("conn").unwrap()
            })
        })
        .collect();
    let products: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(products.iter().all(|p| Arc::ptr_eq(p, &products[0])));
    assert_eq!(products[0].id, 0);
}

struct Settings {
    url: String,
}

impl Settings {
    fn connect(&self, args: &Arguments) -> anyhow::Result<Connection> {
        Ok(Connection {
            id: self.url.len() + args.int(0)? as usize,
        })
    }
}

#[test]
fn factory_method_uses_the_resolved_factory_bean() {
    let factory = DefaultListableBeanFactory::new();
    factory
        .register(BeanDefinition::builder("settings", |_| {
            Ok(Settings {
                url: "pg://".into(),
            })
        }))
        .unwrap();
    factory
        .register(
            BeanDefinition::factory_method("conn", "settings", "connect", |s: &Settings, args: &Arguments| {
                s.connect(args)
            })
            .with_constructor_arg(ValueSource::literal(10)),
        )
        .unwrap();

    assert_eq!(factory.get_bean_typed::<Connection>("conn").unwrap().id, 15);
    assert_eq!(factory.get_dependent_beans("settings"), vec!["conn".to_string()]);
}

trait Repository: Send + Sync {
    fn find(&self) -> String;
}

struct MemoryRepository;

impl Repository for MemoryRepository {
    fn find(&self) -> String {
        "memory".to_string()
    }
}

#[test]
fn typed_lookup_honors_declared_interfaces() {
    let factory = DefaultListableBeanFactory::new();
    factory
        .register(
            BeanDefinition::builder("repository", |_| Ok(MemoryRepository))
                .assignable_to::<dyn Repository>(|r| r as Arc<dyn Repository>),
        )
        .unwrap();
    factory.register(node("other")).unwrap();

    let repository = factory.get_bean_as::<dyn Repository>("repository").unwrap();
    assert_eq!(repository.find(), "memory");
    assert!(factory.get_bean_typed::<MemoryRepository>("repository").is_ok());

    let err = factory.get_bean_as::<dyn Repository>("other").err().unwrap();
    assert!(matches!(err, BeansError::BeanNotOfRequiredType { ref name, .. } if name == "other"));

    assert!(matches!(
        factory.get_bean_by_type::<Node>(),
        Ok(ref n) if n.label == "other"
    ));
    factory.register(node("another")).unwrap();
    assert!(matches!(
        factory.get_bean_by_type::<Node>(),
        Err(BeansError::NoUniqueBeanDefinition { ref candidates, .. }) if candidates.len() == 2
    ));
}

#[test]
fn deep_failure_names_the_outer_bean_and_keeps_the_root_cause() {
    let factory = DefaultListableBeanFactory::new();
    factory
        .register(BeanDefinition::builder("c", |_| -> anyhow::Result<Node> { bail!("disk full") }))
        .unwrap();
    factory
        .register(
            BeanDefinition::builder("b", |args| Ok(Holder { b: Some(args.bean::<Node>(0)?) }))
                .with_constructor_arg(ValueSource::reference("c")),
        )
        .unwrap();
    factory
        .register(
            BeanDefinition::builder("a", |args| {
                let holder = args.bean::<Holder>(0)?;
                Ok(Node { label: format!("a({})", holder.b.is_some()) })
            })
            .with_constructor_arg(ValueSource::reference("b")),
        )
        .unwrap();

    let err = factory.get_bean("a").unwrap_err();
    assert_eq!(err.bean_name(), Some("a"));
    assert_eq!(err.root_cause().to_string(), "disk full");
    assert!(err
        .find_in_chain(|e| matches!(e, BeansError::BeanCreation { name, .. } if name == "c"))
        .is_some());
    assert!(factory.get_singleton_names().is_empty());
}

#[test]
fn inner_beans_are_destroyed_with_their_outer_bean() {
    let log = new_log();
    let factory = DefaultListableBeanFactory::new();
    let inner_log = Arc::clone(&log);
    let inner = BeanDefinition::builder("", |_| Ok(Node { label: "inner".into() }))
        .with_destroy_method("close", move |n: &Node| {
            inner_log.lock().push(n.label.clone());
            Ok(())
        })
        .build();
    factory
        .register(
            BeanDefinition::builder("outer", |args| Ok(Holder { b: Some(args.bean::<Node>(0)?) }))
                .with_constructor_arg(ValueSource::inner(inner)),
        )
        .unwrap();

    let outer = factory.get_bean_typed::<Holder>("outer").unwrap();
    assert_eq!(outer.b.as_ref().unwrap().label, "inner");
    assert_eq!(factory.get_bean_definition_names(), vec!["outer".to_string()]);

    factory.destroy_singletons().unwrap();
    assert_eq!(*log.lock(), vec!["inner"]);
}

#[test]
fn lazy_singletons_wait_for_first_request() {
    let created = Arc::new(AtomicUsize::new(0));
    let factory = DefaultListableBeanFactory::new();
    let counter = Arc::clone(&created);
    factory
        .register(
            BeanDefinition::builder("lazy", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Node { label: "lazy".into() })
            })
            .with_lazy(true),
        )
        .unwrap();

    factory.preinstantiate_singletons().unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 0);
    factory.get_bean("lazy").unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

struct Audit {
    name: &'static str,
    log: Log,
    fail: bool,
}

impl EventListener for Audit {
    fn on_event(&self, event: &Arc<dyn Event>) -> anyhow::Result<()> {
        self.log.lock().push(format!("{}:{}", self.name, event.event_name()));
        if self.fail {
            bail!("{} rejected the event", self.name);
        }
        Ok(())
    }

    fn listener_name(&self) -> &str {
        self.name
    }
}

struct OrderPlaced;

impl Event for OrderPlaced {
    fn event_name(&self) -> &str {
        "OrderPlaced"
    }

    fn timestamp(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn audited_context(settings: ContainerSettings, log: &Log) -> ApplicationContext {
    let context = ApplicationContext::builder().with_settings(settings).build().unwrap();
    for (name, fail) in [("first", false), ("second", true), ("third", false)] {
        context.add_listener(Arc::new(Audit {
            name,
            log: Arc::clone(log),
            fail,
        }));
    }
    context
}

#[test]
fn listener_failure_aborts_delivery_by_default() {
    let log = new_log();
    let context = audited_context(ContainerSettings::default(), &log);

    let err = context.publish(OrderPlaced).unwrap_err();
    assert!(matches!(err, BeansError::EventDelivery { ref listener, .. } if listener == "second"));
    assert_eq!(*log.lock(), vec!["first:OrderPlaced", "second:OrderPlaced"]);
}

#[test]
fn listener_failures_are_isolated_when_configured() {
    let log = new_log();
    let settings = ContainerSettings {
        isolate_listener_failures: true,
        ..ContainerSettings::default()
    };
    let context = audited_context(settings, &log);

    let handled = new_log();
    let sink = Arc::clone(&handled);
    context
        .multicaster()
        .set_error_handler(move |listener, _event, error| {
            sink.lock().push(format!("{}: {}", listener.listener_name(), error));
        });

    context.publish(OrderPlaced).unwrap();
    assert_eq!(
        *log.lock(),
        vec!["first:OrderPlaced", "second:OrderPlaced", "third:OrderPlaced"]
    );
    assert_eq!(*handled.lock(), vec!["second: second rejected the event"]);
}

#[test]
fn context_discovers_processor_and_listener_beans() {
    let log = new_log();
    let processor_log = Arc::clone(&log);
    let listener_log = Arc::clone(&log);

    let context = ApplicationContext::builder()
        .register(
            BeanDefinition::builder("auditProcessor", move |_| {
                Ok(Recording {
                    label: "audit",
                    log: Arc::clone(&processor_log),
                })
            })
            .bean_post_processor(),
        )
        .register(
            BeanDefinition::builder("auditListener", move |_| {
                Ok(Audit {
                    name: "listener",
                    log: Arc::clone(&listener_log),
                    fail: false,
                })
            })
            .application_listener(),
        )
        .register(node("service"))
        .build()
        .unwrap();

    assert_eq!(
        context.get_bean_names_with_capability(Capability::BeanPostProcessor),
        vec!["auditProcessor".to_string()]
    );
    context.refresh().unwrap();

    let entries = log.lock().clone();
    assert!(entries.contains(&"audit:before:service".to_string()));
    assert!(entries.contains(&"audit:after:service".to_string()));
    assert!(entries.contains(&"listener:ContextRefreshedEvent".to_string()));
    assert!(!entries.iter().any(|e| e.ends_with(":auditProcessor")));

    context.close().unwrap();
    assert!(log.lock().contains(&"listener:ContextClosedEvent".to_string()));
}

#[test]
fn settings_drive_overriding_and_lazy_defaults() {
    let settings = ContainerSettings::from_toml_str(
        r#"
        id = "scenario"
        allow_bean_definition_overriding = true
        lazy_init_by_default = true
        "#,
    )
    .unwrap();

    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let context = ApplicationContext::builder()
        .with_settings(settings)
        .register(node("a"))
        .register(BeanDefinition::builder("a", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Node { label: "override".into() })
        }))
        .build()
        .unwrap();
    context.refresh().unwrap();

    assert_eq!(context.id(), "scenario");
    assert_eq!(created.load(Ordering::SeqCst), 0);
    assert_eq!(context.get_bean_typed::<Node>("a").unwrap().label, "override");
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn independent_contexts_do_not_share_beans() {
    let first = ApplicationContext::new();
    let second = ApplicationContext::new();
    first.register(node("only")).unwrap();
    first.refresh().unwrap();
    second.refresh().unwrap();

    assert!(first.contains_bean("only"));
    assert!(!second.contains_bean("only"));
    assert!(first.publish_event(Arc::new(OrderPlaced)).is_ok());
    assert_eq!(second.multicaster().listener_count(), 0);
}
