use std::convert::Infallible;
use std::iter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use quiver::prelude::*;

type Log = Arc<Mutex<Vec<String>>>;

struct Engine;

struct Car {
    _engine: Arc<Engine>,
}

fn logged<T>(log: &Log, entry: &'static str) -> impl Fn(&T) -> Result<(), Infallible> + Send + Sync
where
    T: Send + Sync + 'static,
{
    let log = Arc::clone(log);
    move |_: &T| {
        log.lock().push(entry.to_string());
        Ok(())
    }
}

fn car_components(log: &Log, car_scope: Scope) -> Components {
    Components::builder()
        .bean(
            Bean::builder("engine", |_| Ok(Ok::<_, Infallible>(Engine)))
                .destructor(logged::<Engine>(log, "engine"))
                .build(),
        )
        .bean(
            Bean::builder("car", |creation| {
                let engine = creation.get::<Engine>()?;
                Ok(Ok::<_, Infallible>(Car { _engine: engine }))
            })
            .scope(car_scope)
            .destructor(logged::<Car>(log, "car"))
            .build(),
        )
        .build()
}

#[test]
fn instance_handle_destroy_succeeds_with_cascade() {
    let log = Log::default();
    let container = Container::builder()
        .provider(car_components(&log, Scope::Dependent))
        .build()
        .unwrap();

    let handle = container.instance(Type::of::<Car>(), iter::empty()).unwrap();
    assert!(handle.get_as::<Car>().is_some());
    assert!(log.lock().is_empty());

    handle.destroy().unwrap();
    handle.destroy().unwrap();
    assert!(handle.is_destroyed());
    assert_eq!(*log.lock(), ["car", "engine"]);
}

#[test]
fn instance_handle_destroy_succeeds_for_contextual_instance() {
    let log = Log::default();
    let container = Container::builder()
        .provider(car_components(&log, Scope::Application))
        .build()
        .unwrap();

    let first = container.instance(Type::of::<Car>(), iter::empty()).unwrap();
    first.destroy().unwrap();
    first.destroy().unwrap();
    assert_eq!(*log.lock(), ["car", "engine"]);

    let second = container.instance(Type::of::<Car>(), iter::empty()).unwrap();
    let (Some(first), Some(second)) = (first.get_as::<Car>(), second.get_as::<Car>()) else {
        panic!("both handles should be available");
    };
    assert!(!Arc::ptr_eq(&first, &second));

    container.shutdown().unwrap();
    assert_eq!(*log.lock(), ["car", "engine", "car", "engine"]);
}

#[test]
fn request_context_lifecycle_succeeds() {
    let log = Log::default();
    let container = Container::builder()
        .provider(car_components(&log, Scope::Request))
        .build()
        .unwrap();
    let request = container.request_context();

    assert!(!container
        .instance(Type::of::<Car>(), iter::empty())
        .is_ok_and(|handle| handle.is_available()));

    request.activate().unwrap();
    let first = container.instance_of::<Car>().unwrap().unwrap();
    let second = container.instance_of::<Car>().unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let state = request.state().unwrap();
    let shared = {
        let request = Arc::clone(&request);
        let container = container.clone();
        thread::spawn(move || {
            request.activate_with(state).unwrap();
            let car = container.instance_of::<Car>().unwrap().unwrap();
            request.deactivate().unwrap();
            car
        })
        .join()
        .expect("the thread should not panic")
    };
    assert!(Arc::ptr_eq(&first, &shared));

    request.terminate().unwrap();
    assert!(!request.is_active());
    assert_eq!(*log.lock(), ["car", "engine"]);

    request.activate().unwrap();
    request.terminate().unwrap();
    assert_eq!(log.lock().len(), 2);
}

#[test]
fn container_instance_fails_when_request_context_is_inactive() {
    let log = Log::default();
    let container = Container::builder()
        .provider(car_components(&log, Scope::Request))
        .build()
        .unwrap();

    let instances = container.select(Type::of::<Car>(), iter::empty()).unwrap();
    assert!(matches!(
        instances.get(),
        Err(ContainerError::NotActive {
            scope: Scope::Request,
            ..
        })
    ));

    let car = container
        .run_with_request_scope(|| instances.get().map(|handle| handle.is_available()))
        .unwrap();
    assert!(car.unwrap());
    assert_eq!(*log.lock(), ["car", "engine"]);
}

#[test]
fn container_instance_fails_and_releases_dependents_when_constructor_fails() {
    struct Garage;

    for scope in [Scope::Dependent, Scope::Application] {
        let log = Log::default();
        let components = Components::builder()
            .bean(
                Bean::builder("engine", |_| Ok(Ok::<_, Infallible>(Engine)))
                    .destructor(logged::<Engine>(&log, "engine"))
                    .build(),
            )
            .bean(
                Bean::builder("garage", |creation| {
                    creation.get::<Engine>()?;
                    Ok(Err::<Garage, _>("no room"))
                })
                .scope(scope)
                .build(),
            )
            .build();
        let container = Container::builder().provider(components).build().unwrap();

        assert!(matches!(
            container.instance(Type::of::<Garage>(), iter::empty()),
            Err(ContainerError::ObjectConstruction { .. })
        ));
        assert_eq!(*log.lock(), ["engine"]);

        container.shutdown().unwrap();
        assert_eq!(*log.lock(), ["engine"]);
    }
}

#[test]
fn container_shutdown_succeeds_with_lifecycle_events() {
    let log = Log::default();
    let observe = |id: &'static str, qualifier: Qualifier| {
        let log = Arc::clone(&log);
        Observer::builder(id, Type::of::<LifecycleEvent>(), move |event| {
            let scope = event.payload_as::<LifecycleEvent>().map(LifecycleEvent::scope);
            log.lock().push(format!("{id}:{}", scope.unwrap_or(Scope::Dependent)));
            Ok::<_, Infallible>(())
        })
        .qualifier(qualifier)
        .build()
    };
    let destroyed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&destroyed);
    let components = Components::builder()
        .observer(observe("initialized", Qualifier::initialized(Scope::Application)))
        .observer(observe("before", Qualifier::before_destroyed(Scope::Application)))
        .observer(observe("destroyed", Qualifier::destroyed(Scope::Application)))
        .bean(
            Bean::builder("singleton", |_| Ok(Ok::<_, Infallible>(0u8)))
                .scope(Scope::Singleton)
                .destructor(move |_: &u8| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(())
                })
                .build(),
        )
        .build();

    let container = Container::builder().provider(components).build().unwrap();
    assert_eq!(*log.lock(), ["initialized:Application"]);
    assert!(container.instance_of::<u8>().unwrap().is_some());

    container.shutdown().unwrap();
    assert_eq!(
        *log.lock(),
        [
            "initialized:Application",
            "before:Application",
            "destroyed:Application"
        ]
    );
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);

    assert!(!container.is_running());
    assert!(matches!(
        container.instance(Type::of::<u8>(), iter::empty()),
        Err(ContainerError::NotRunning { .. })
    ));
    assert!(matches!(
        container.instance_of::<u8>(),
        Err(ContainerError::NotRunning { .. })
    ));
    container.shutdown().unwrap();
    assert_eq!(log.lock().len(), 3);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn container_shutdown_fails_when_destruction_fails() {
    let components = Components::builder()
        .bean(
            Bean::builder("fragile", |_| Ok(Ok::<_, Infallible>(0u8)))
                .scope(Scope::Application)
                .destructor(|_: &u8| Err("broken"))
                .build(),
        )
        .build();
    let container = Container::builder().provider(components).build().unwrap();
    container.instance_of::<u8>().unwrap();

    let Err(ContainerError::DestructionFailure { errors, .. }) = container.shutdown() else {
        panic!("shutdown should report the failed destruction");
    };
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ContainerError::ObjectDestruction { .. }));
    assert!(!container.is_running());
}
