use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::warn;

use crate::bean::Bean;
use crate::container::instance::InstanceHandle;
use crate::container::{ContainerError, Instance};

/// A node in the tree of creation scopes.
///
/// A creational context owns the dependent instances created on behalf of
/// the instance it belongs to, and destroys them when it is released.
pub struct CreationalContext {
    parent: Option<Weak<CreationalContext>>,
    dependents: Mutex<Vec<Arc<ManagedInstance>>>,
}

impl CreationalContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            dependents: Mutex::new(Vec::new()),
        })
    }

    pub fn child(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(Arc::downgrade(self)),
            dependents: Mutex::new(Vec::new()),
        })
    }

    pub fn parent(&self) -> Option<Arc<Self>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Makes this context the owner of the instance behind `handle`.
    ///
    /// Unavailable handles and instances already owned by this context are
    /// ignored.
    pub fn add_dependent(&self, handle: &InstanceHandle) {
        if let Some(state) = handle.state() {
            self.add_state(Arc::clone(state));
        }
    }

    /// Registers `handle` in the parent of `context`, or in `context` itself
    /// if it is a root.
    pub fn add_to_parent(handle: &InstanceHandle, context: &Arc<Self>) {
        match context.parent() {
            Some(parent) => parent.add_dependent(handle),
            None => context.add_dependent(handle),
        }
    }

    pub fn dependents_len(&self) -> usize {
        self.dependents.lock().len()
    }

    /// Destroys every owned dependent in insertion order.
    ///
    /// Releasing twice is a no-op. Every dependent is attempted even if some
    /// fail; the failures are reported together.
    pub fn release(&self) -> Result<(), ContainerError> {
        let dependents = mem::take(&mut *self.dependents.lock());
        let mut errors = Vec::new();
        for dependent in dependents {
            if let Err(err) = dependent.destroy() {
                warn!(bean = %dependent.bean().id(), error = %err, "failed to destroy a dependent instance");
                errors.push(err);
            }
        }
        ContainerError::aggregate(errors)
    }

    fn add_state(&self, state: Arc<ManagedInstance>) {
        let mut dependents = self.dependents.lock();
        if !dependents.iter().any(|owned| Arc::ptr_eq(owned, &state)) {
            dependents.push(state);
        }
    }
}

/// An instance together with everything needed to destroy it exactly once.
pub(crate) struct ManagedInstance {
    bean: Arc<Bean>,
    instance: Instance,
    creational: Arc<CreationalContext>,
    destroyed: AtomicBool,
}

impl ManagedInstance {
    pub(crate) fn new(
        bean: Arc<Bean>,
        instance: Instance,
        creational: Arc<CreationalContext>,
    ) -> Self {
        Self {
            bean,
            instance,
            creational,
            destroyed: AtomicBool::new(false),
        }
    }

    pub(crate) fn bean(&self) -> &Arc<Bean> {
        &self.bean
    }

    pub(crate) fn instance(&self) -> &Instance {
        &self.instance
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Marks the instance destroyed and returns whether it already was.
    pub(crate) fn mark_destroyed(&self) -> bool {
        self.destroyed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn destroy(&self) -> Result<(), ContainerError> {
        if self.mark_destroyed() {
            return Ok(());
        }
        self.bean.destroy(&self.instance, &self.creational)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;

    use parking_lot::Mutex as PlMutex;

    use super::*;

    fn tracked_handle(
        id: &'static str,
        log: &Arc<PlMutex<Vec<&'static str>>>,
        parent: &Arc<CreationalContext>,
    ) -> InstanceHandle {
        let log = Arc::clone(log);
        let bean = Bean::instance(id, Arc::new(0u8))
            .destructor(move |_: &u8| {
                log.lock().push(id);
                Ok::<_, Infallible>(())
            })
            .build();
        InstanceHandle::dependent(bean, Arc::new(0u8), parent.child(), Some(Arc::clone(parent)))
    }

    #[test]
    fn creational_context_release_succeeds() {
        let log = Arc::new(PlMutex::new(Vec::new()));
        let root = CreationalContext::new();

        let first = tracked_handle("first", &log, &root);
        let second = tracked_handle("second", &log, &root);
        root.add_dependent(&first);
        root.add_dependent(&second);
        root.add_dependent(&first);
        assert_eq!(root.dependents_len(), 2);

        root.release().unwrap();
        assert_eq!(*log.lock(), vec!["first", "second"]);
        assert!(first.is_destroyed());
        assert_eq!(root.dependents_len(), 0);

        root.release().unwrap();
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn creational_context_release_succeeds_when_dependents_share_an_object() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&destroyed);
        let object = Arc::new(0u8);
        let bean = Bean::instance("shared", Arc::clone(&object))
            .destructor(move |_: &u8| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(())
            })
            .build();
        let root = CreationalContext::new();

        for _ in 0..2 {
            let handle = InstanceHandle::dependent(
                Arc::clone(&bean),
                Arc::clone(&object) as Instance,
                root.child(),
                Some(Arc::clone(&root)),
            );
            root.add_dependent(&handle);
        }
        assert_eq!(root.dependents_len(), 2);

        root.release().unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn creational_context_add_to_parent_succeeds() {
        let root = CreationalContext::new();
        let child = root.child();
        let log = Arc::new(PlMutex::new(Vec::new()));

        let handle = tracked_handle("dependent", &log, &root);
        CreationalContext::add_to_parent(&handle, &child);
        assert_eq!(root.dependents_len(), 1);
        assert_eq!(child.dependents_len(), 0);

        CreationalContext::add_to_parent(&handle, &root);
        assert_eq!(root.dependents_len(), 1);
    }

    #[test]
    fn creational_context_release_fails_when_dependent_destruction_fails() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let root = CreationalContext::new();

        let failing = Bean::instance("failing", Arc::new(0u8))
            .destructor(|_: &u8| Err("boom"))
            .build();
        let counter = Arc::clone(&destroyed);
        let counted = Bean::instance("counted", Arc::new(0u8))
            .destructor(move |_: &u8| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(())
            })
            .build();

        root.add_dependent(&InstanceHandle::dependent(failing, Arc::new(0u8), root.child(), None));
        root.add_dependent(&InstanceHandle::dependent(counted, Arc::new(0u8), root.child(), None));

        let err = root.release().unwrap_err();
        assert!(matches!(err, ContainerError::DestructionFailure { ref errors } if errors.len() == 1));
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }
}
