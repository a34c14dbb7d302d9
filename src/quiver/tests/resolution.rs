use std::convert::Infallible;
use std::iter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use quiver::bean::BeanBuilder;
use quiver::prelude::*;

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct English;

impl Greeter for English {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}

struct French;

impl Greeter for French {
    fn greet(&self) -> String {
        "bonjour".to_string()
    }
}

type DynGreeter = Arc<dyn Greeter>;

fn greeter() -> Class {
    Class::of::<DynGreeter>()
}

fn greeter_bean(id: &'static str, object: DynGreeter) -> BeanBuilder<DynGreeter> {
    Bean::instance(id, Arc::new(object)).implementation(Class::named(id).extends(greeter()))
}

fn build(components: Components) -> Container {
    Container::builder().provider(components).build().unwrap()
}

fn greet(container: &Container) -> Option<String> {
    container
        .instance(greeter().into(), iter::empty())
        .unwrap()
        .get_as::<DynGreeter>()
        .map(|greeter| greeter.greet())
}

#[test]
fn container_instance_succeeds_when_only_one_bean_matches() {
    let container = build(
        Components::builder()
            .bean(greeter_bean("english", Arc::new(English)).build())
            .build(),
    );

    assert_eq!(greet(&container).as_deref(), Some("hello"));
    let instances = container.select(greeter().into(), iter::empty()).unwrap();
    assert!(instances.is_resolvable());
    assert_eq!(instances.len(), 1);
}

#[test]
fn container_instance_succeeds_when_alternative_exists() {
    let container = build(
        Components::builder()
            .bean(greeter_bean("english", Arc::new(English)).build())
            .bean(greeter_bean("french", Arc::new(French)).alternative(10).build())
            .build(),
    );

    assert_eq!(greet(&container).as_deref(), Some("bonjour"));
}

#[test]
fn container_select_fails_when_beans_are_ambiguous() {
    let container = build(
        Components::builder()
            .bean(greeter_bean("english", Arc::new(English)).build())
            .bean(greeter_bean("french", Arc::new(French)).build())
            .build(),
    );

    assert!(greet(&container).is_none());

    let instances = container.select(greeter().into(), iter::empty()).unwrap();
    assert!(instances.is_ambiguous());
    let Err(ContainerError::Ambiguous { candidates, .. }) = instances.get() else {
        panic!("the lookup should be ambiguous");
    };
    let mut candidates = candidates
        .iter()
        .map(|id| id.as_str().to_string())
        .collect::<Vec<_>>();
    candidates.sort();
    assert_eq!(candidates, ["english", "french"]);

    let greetings = instances
        .handles()
        .unwrap()
        .iter()
        .filter_map(|handle| handle.get_as::<DynGreeter>())
        .map(|greeter| greeter.greet())
        .collect::<Vec<_>>();
    assert_eq!(greetings, ["hello", "bonjour"]);
}

#[test]
fn container_select_fails_when_no_bean_matches() {
    let container = build(Components::default());

    let instances = container.select(greeter().into(), iter::empty()).unwrap();
    assert!(instances.is_unsatisfied());
    assert!(matches!(
        instances.get(),
        Err(ContainerError::Unsatisfied { .. })
    ));
    assert!(!container
        .instance(greeter().into(), iter::empty())
        .unwrap()
        .is_available());
}

#[test]
fn container_instance_succeeds_with_qualifiers() {
    let red = Qualifier::new("Red");
    let large = Qualifier::new("Large");
    let container = build(
        Components::builder()
            .bean(greeter_bean("english", Arc::new(English)).build())
            .bean(
                greeter_bean("french", Arc::new(French))
                    .qualifiers([red.clone(), large.clone()])
                    .build(),
            )
            .build(),
    );

    let greet_with = |qualifiers: Vec<Qualifier>| {
        container
            .instance(greeter().into(), qualifiers)
            .unwrap()
            .get_as::<DynGreeter>()
            .map(|greeter| greeter.greet())
    };
    assert_eq!(greet_with(vec![red.clone()]).as_deref(), Some("bonjour"));
    assert_eq!(greet_with(vec![red, large]).as_deref(), Some("bonjour"));
    assert_eq!(greet_with(Vec::new()).as_deref(), Some("hello"));
    assert_eq!(greet_with(vec![Qualifier::new("Blue")]), None);
}

#[test]
fn container_instance_named_succeeds() {
    let container = build(
        Components::builder()
            .bean(greeter_bean("english", Arc::new(English)).named("en").build())
            .bean(greeter_bean("french", Arc::new(French)).named("fr").build())
            .build(),
    );

    let handle = container.instance_named("fr").unwrap();
    let greeting = handle.get_as::<DynGreeter>().map(|greeter| greeter.greet());
    assert_eq!(greeting.as_deref(), Some("bonjour"));
    assert!(!container.instance_named("de").unwrap().is_available());

    let named = container
        .instance(greeter().into(), [Qualifier::named("en")])
        .unwrap();
    assert!(named.is_available());
}

#[test]
fn container_instance_succeeds_with_parameterized_types() {
    let list = Class::named("List").with_params(["E"]);
    let strings = list.parameterized([Type::of::<String>()]);
    let numbers = list.parameterized([Type::of::<u32>()]);
    let container = build(
        Components::builder()
            .bean(
                Bean::instance("strings", Arc::new(vec!["a".to_string()]))
                    .implementation(strings.clone())
                    .build(),
            )
            .bean(
                Bean::instance("numbers", Arc::new(vec![1u32]))
                    .implementation(numbers.clone())
                    .build(),
            )
            .build(),
    );

    let handle = container.instance(strings, iter::empty()).unwrap();
    assert_eq!(
        handle.get_as::<Vec<String>>().as_deref(),
        Some(&vec!["a".to_string()])
    );

    let handle = container.instance(numbers, iter::empty()).unwrap();
    assert_eq!(handle.get_as::<Vec<u32>>().as_deref(), Some(&vec![1]));

    let any = list.parameterized([Type::wildcard()]);
    let instances = container.select(any, iter::empty()).unwrap();
    assert_eq!(instances.len(), 2);
}

#[test]
fn container_instance_succeeds_with_one_shared_instance_under_contention() {
    const THREADS: usize = 16;
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&constructed);
    let container = build(
        Components::builder()
            .bean(
                Bean::builder("slow", move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    Ok(Ok::<_, Infallible>(AtomicUsize::new(0)))
                })
                .scope(Scope::Application)
                .build(),
            )
            .build(),
    );

    let handles = (0..THREADS)
        .map(|_| {
            let container = container.clone();
            thread::spawn(move || container.instance_of::<AtomicUsize>().unwrap().unwrap())
        })
        .collect::<Vec<_>>();
    let instances = handles
        .into_iter()
        .map(|h| h.join().expect("Each thread should not `panic!()`"))
        .collect::<Vec<_>>();

    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn container_instance_succeeds_when_dependencies_are_injected() {
    struct Repository {
        greeter: DynGreeter,
    }

    let container = build(
        Components::builder()
            .bean(greeter_bean("english", Arc::new(English)).build())
            .bean(
                Bean::builder("repository", |creation| {
                    let greeter = creation.get_qualified::<DynGreeter, _>(greeter().into(), iter::empty())?;
                    Ok(Ok::<_, Infallible>(Repository {
                        greeter: Arc::clone(&*greeter),
                    }))
                })
                .scope(Scope::Singleton)
                .build(),
            )
            .build(),
    );

    let repository = container.instance_of::<Repository>().unwrap().unwrap();
    assert_eq!(repository.greeter.greet(), "hello");
}
