use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use quiver::prelude::*;

struct Counter(AtomicUsize);

fn builder() -> ContainerBuilder {
    Container::builder().provider(|| {
        Components::builder()
            .bean(
                Bean::builder("counter", |_| Ok(Ok::<_, Infallible>(Counter(AtomicUsize::new(0)))))
                    .scope(Scope::Application)
                    .build(),
            )
            .build()
    })
}

#[test]
fn global_container_lifecycle_succeeds() {
    assert!(quiver::container().is_none());
    quiver::shutdown().unwrap();

    let container = quiver::initialize(builder()).unwrap();
    let counter = container.instance_of::<Counter>().unwrap().unwrap();
    counter.0.fetch_add(1, Ordering::SeqCst);

    let again = quiver::initialize(builder()).unwrap();
    let current = quiver::container().expect("the container should be installed");
    for container in [again, current] {
        let shared = container.instance_of::<Counter>().unwrap().unwrap();
        assert!(Arc::ptr_eq(&counter, &shared));
    }

    quiver::shutdown().unwrap();
    assert!(quiver::container().is_none());
    assert!(!container.is_running());
    assert!(matches!(
        container.instance_of::<Counter>(),
        Err(ContainerError::NotRunning { .. })
    ));
    quiver::shutdown().unwrap();

    let restarted = quiver::initialize(builder()).unwrap();
    assert!(restarted.is_running());
    quiver::shutdown().unwrap();
}
