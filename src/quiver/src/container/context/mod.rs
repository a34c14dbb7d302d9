//! Storage of instances of normal scopes.

mod request;
mod shared;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bean::{Bean, BeanId};
use crate::container::creational::{CreationalContext, ManagedInstance};
use crate::container::injector::Creation;
use crate::container::{ContainerError, Instance};
use crate::scope::Scope;

pub use request::BoundContext;
pub use shared::SharedContext;

/// A context which stores the instances of beans of one scope.
pub trait InjectableContext: Send + Sync {
    fn scope(&self) -> Scope;

    fn is_active(&self) -> bool;

    /// Returns the stored instance of `bean`.
    ///
    /// If there is none and `creation` is given, a new instance is created
    /// through it and stored. Without `creation`, a missing instance yields
    /// `None`.
    fn get(
        &self,
        bean: &Arc<Bean>,
        creation: Option<&Creation<'_>>,
    ) -> Result<Option<Instance>, ContainerError>;

    fn get_if_present(&self, bean: &Bean) -> Result<Option<Instance>, ContainerError> {
        self.get_handle(bean)
            .map(|handle| handle.map(|handle| Arc::clone(handle.instance())))
    }

    /// Returns the stored entry of `bean`.
    fn get_handle(&self, bean: &Bean) -> Result<Option<ContextInstanceHandle>, ContainerError>;

    /// Returns the stored entries.
    fn state(&self) -> Result<ContextState, ContainerError>;

    /// Removes and destroys the instance of `bean`, if any.
    fn destroy_bean(&self, bean: &Bean) -> Result<(), ContainerError>;

    /// Removes and destroys every stored instance.
    fn destroy(&self) -> Result<(), ContainerError>;
}

/// A context whose activation is controlled by its user.
pub trait ManagedContext: InjectableContext {
    /// Activates the context with an empty state. Does nothing if it is
    /// already active.
    fn activate(&self) -> Result<(), ContainerError>;

    /// Activates the context with the given entries, replacing any current
    /// state. Every entry must belong to a bean of this context's scope.
    fn activate_with(&self, state: ContextState) -> Result<(), ContainerError>;

    /// Deactivates the context without destroying its instances.
    fn deactivate(&self) -> Result<(), ContainerError>;

    /// Destroys every instance and then deactivates the context. The context
    /// is deactivated even if some instance could not be destroyed.
    fn terminate(&self) -> Result<(), ContainerError> {
        let res = self.destroy();
        self.deactivate()?;
        res
    }
}

/// An instance stored in a context.
///
/// Clones refer to the same instance, which is destroyed at most once
/// whichever clone destroys it.
#[derive(Clone)]
pub struct ContextInstanceHandle {
    managed: Arc<ManagedInstance>,
}

impl ContextInstanceHandle {
    pub fn new(bean: Arc<Bean>, instance: Instance, creational: Arc<CreationalContext>) -> Self {
        Self {
            managed: Arc::new(ManagedInstance::new(bean, instance, creational)),
        }
    }

    pub fn bean(&self) -> &Arc<Bean> {
        self.managed.bean()
    }

    pub fn instance(&self) -> &Instance {
        self.managed.instance()
    }

    pub fn is_destroyed(&self) -> bool {
        self.managed.is_destroyed()
    }

    pub fn destroy(&self) -> Result<(), ContainerError> {
        self.managed.destroy()
    }
}

/// The entries of a context.
///
/// Clones share their entries. A state taken from a [`BoundContext`] and
/// activated on another thread is therefore one state seen from both
/// threads, and terminating it on either side empties it for both.
#[derive(Clone, Default)]
pub struct ContextState {
    instances: Arc<Mutex<HashMap<BeanId, ContextInstanceHandle>>>,
}

impl ContextState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state holding `handles`. A later handle of the same bean
    /// replaces an earlier one.
    pub fn from_handles<I>(handles: I) -> Self
    where
        I: IntoIterator<Item = ContextInstanceHandle>,
    {
        let instances = handles
            .into_iter()
            .map(|handle| (handle.bean().id().clone(), handle))
            .collect();
        Self {
            instances: Arc::new(Mutex::new(instances)),
        }
    }

    /// Returns a snapshot of the stored entries.
    pub fn handles(&self) -> Vec<ContextInstanceHandle> {
        self.instances.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }

    pub(crate) fn instances(&self) -> &Mutex<HashMap<BeanId, ContextInstanceHandle>> {
        &self.instances
    }
}

/// Every context known to a container.
pub struct Contexts {
    singleton: Arc<SharedContext>,
    application: Arc<SharedContext>,
    request: Arc<BoundContext>,
    custom: Vec<Arc<dyn InjectableContext>>,
}

impl Contexts {
    pub(crate) fn new(custom: Vec<Arc<dyn InjectableContext>>) -> Self {
        Self {
            singleton: Arc::new(SharedContext::new(Scope::Singleton)),
            application: Arc::new(SharedContext::new(Scope::Application)),
            request: Arc::new(BoundContext::request()),
            custom,
        }
    }

    pub fn singleton(&self) -> &Arc<SharedContext> {
        &self.singleton
    }

    pub fn application(&self) -> &Arc<SharedContext> {
        &self.application
    }

    pub fn request(&self) -> &Arc<BoundContext> {
        &self.request
    }

    /// Returns the active context for `scope`.
    ///
    /// The singleton and application contexts are always active. For other
    /// scopes, at most one registered context may be active on the current
    /// thread.
    pub fn active_context(
        &self,
        scope: Scope,
    ) -> Result<Option<Arc<dyn InjectableContext>>, ContainerError> {
        match scope {
            Scope::Singleton => Ok(Some(Arc::clone(&self.singleton) as Arc<dyn InjectableContext>)),
            Scope::Application => Ok(Some(Arc::clone(&self.application) as Arc<dyn InjectableContext>)),
            Scope::Dependent => Ok(None),
            Scope::Request | Scope::Custom(_) => {
                let builtin = (scope == Scope::Request)
                    .then(|| Arc::clone(&self.request) as Arc<dyn InjectableContext>);
                let mut active = builtin
                    .into_iter()
                    .chain(self.custom.iter().cloned())
                    .filter(|context| context.scope() == scope && context.is_active());

                let Some(first) = active.next() else {
                    return Ok(None);
                };
                if active.next().is_some() {
                    return Err(ContainerError::illegal_argument(format!(
                        "more than one context is active for the {scope} scope"
                    )));
                }
                Ok(Some(first))
            }
        }
    }

    pub(crate) fn custom(&self) -> &[Arc<dyn InjectableContext>] {
        &self.custom
    }
}
