use std::cell::RefCell;
use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{trace, warn};

use crate::bean::Bean;
use crate::container::context::{ContextInstanceHandle, ContextState, InjectableContext, ManagedContext};
use crate::container::injector::Creation;
use crate::container::{ContainerError, Instance};
use crate::scope::Scope;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static BOUND_STATES: RefCell<HashMap<u64, ContextState>> = RefCell::new(HashMap::new());
}

/// A context whose state is bound to the current thread.
///
/// The context is active on a thread between [`ManagedContext::activate`]
/// and [`ManagedContext::deactivate`] on that thread. Instances created while
/// it is active are visible to that thread only, unless the state is handed
/// to another thread through [`ManagedContext::activate_with`].
///
/// Dropping the context deactivates it on the dropping thread. Entries left
/// active on other threads stay there until those threads deactivate it or
/// exit.
pub struct BoundContext {
    id: u64,
    scope: Scope,
}

impl BoundContext {
    /// Creates the context of the request scope.
    pub fn request() -> Self {
        Self::with_scope(Scope::Request)
    }

    pub fn with_scope(scope: Scope) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            scope,
        }
    }

    fn current_state(&self) -> Option<ContextState> {
        BOUND_STATES.with_borrow(|states| states.get(&self.id).cloned())
    }

    fn active_state(&self) -> Result<ContextState, ContainerError> {
        self.current_state()
            .ok_or(ContainerError::NotActive { scope: self.scope })
    }

    fn set_state(&self, state: Option<ContextState>) {
        BOUND_STATES.with_borrow_mut(|states| match state {
            Some(state) => {
                states.insert(self.id, state);
            }
            None => {
                states.remove(&self.id);
            }
        });
    }
}

impl InjectableContext for BoundContext {
    fn scope(&self) -> Scope {
        self.scope
    }

    fn is_active(&self) -> bool {
        self.current_state().is_some()
    }

    fn get(
        &self,
        bean: &Arc<Bean>,
        creation: Option<&Creation<'_>>,
    ) -> Result<Option<Instance>, ContainerError> {
        let state = self.active_state()?;
        if let Some(handle) = state.instances().lock().get(bean.id()) {
            return Ok(Some(Arc::clone(handle.instance())));
        }
        let Some(creation) = creation else {
            return Ok(None);
        };

        // The constructor may look up other beans of this context, so the
        // lock must not be held while it runs.
        let instance = bean.create(creation)?;
        let handle = ContextInstanceHandle::new(
            Arc::clone(bean),
            instance,
            Arc::clone(creation.creational_context()),
        );
        let mut instances = state.instances().lock();
        let stored = instances.entry(bean.id().clone()).or_insert(handle);
        Ok(Some(Arc::clone(stored.instance())))
    }

    fn get_handle(&self, bean: &Bean) -> Result<Option<ContextInstanceHandle>, ContainerError> {
        let state = self.active_state()?;
        let instances = state.instances().lock();
        Ok(instances.get(bean.id()).cloned())
    }

    fn state(&self) -> Result<ContextState, ContainerError> {
        self.active_state()
    }

    fn destroy_bean(&self, bean: &Bean) -> Result<(), ContainerError> {
        let state = self.active_state()?;
        let removed = state.instances().lock().remove(bean.id());
        match removed {
            Some(handle) => handle.destroy(),
            None => Ok(()),
        }
    }

    fn destroy(&self) -> Result<(), ContainerError> {
        let Some(state) = self.current_state() else {
            return Ok(());
        };
        let instances = mem::take(&mut *state.instances().lock());
        let mut errors = Vec::new();
        for (id, handle) in instances {
            if let Err(err) = handle.destroy() {
                warn!(bean = %id, scope = %self.scope, error = %err, "failed to destroy an instance");
                errors.push(err);
            }
        }
        ContainerError::aggregate(errors)
    }
}

impl ManagedContext for BoundContext {
    fn activate(&self) -> Result<(), ContainerError> {
        if !self.is_active() {
            trace!(scope = %self.scope, "activating a bound context");
            self.set_state(Some(ContextState::new()));
        }
        Ok(())
    }

    fn activate_with(&self, state: ContextState) -> Result<(), ContainerError> {
        let handles = state.handles();
        if let Some(handle) = handles.iter().find(|handle| handle.bean().scope() != self.scope) {
            return Err(ContainerError::illegal_argument(format!(
                "the bean {} of the {} scope does not belong to the {} context",
                handle.bean().id(),
                handle.bean().scope(),
                self.scope,
            )));
        }

        trace!(scope = %self.scope, instances = handles.len(), "activating a bound context with a state");
        self.set_state(Some(state));
        Ok(())
    }

    fn deactivate(&self) -> Result<(), ContainerError> {
        trace!(scope = %self.scope, "deactivating a bound context");
        self.set_state(None);
        Ok(())
    }
}

impl Drop for BoundContext {
    fn drop(&mut self) {
        // Accessing a thread local during thread teardown may fail.
        let removed = BOUND_STATES
            .try_with(|states| {
                let mut states = states.try_borrow_mut().ok()?;
                states.remove(&self.id)
            })
            .ok()
            .flatten();
        drop(removed);
    }
}
