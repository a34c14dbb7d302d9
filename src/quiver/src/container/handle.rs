use std::any::Any;
use std::sync::Arc;

use tracing::warn;

use crate::bean::Bean;
use crate::container::context::{BoundContext, InjectableContext, ManagedContext};
use crate::container::core::ContainerCore;
use crate::container::event::Event;
use crate::container::instance::{InstanceHandle, Instances};
use crate::container::registry::{ComponentsProvider, Registry, ResourceReferenceProvider};
use crate::container::resolver::Resolvable;
use crate::container::ContainerError;
use crate::qualifier::{Qualifier, QualifierSet};
use crate::scope::Scope;
use crate::types::{Type, Typed};

/// A running container.
///
/// Cloning a container is cheap, and every clone refers to the same beans,
/// contexts and observers.
#[derive(Clone)]
pub struct Container {
    core: Arc<ContainerCore>,
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Returns an instance of the bean satisfying `required` and
    /// `qualifiers`. The handle is unavailable when no bean or several beans
    /// match.
    pub fn instance<I>(&self, required: Type, qualifiers: I) -> Result<InstanceHandle, ContainerError>
    where
        I: IntoIterator<Item = Qualifier>,
    {
        self.core.instance(&Resolvable::new(required, qualifiers))
    }

    /// Returns the default instance of the contract `T`, if there is exactly
    /// one.
    ///
    /// Dependent instances obtained this way are never destroyed by the
    /// container; use [`Self::instance`] to keep a handle to them.
    pub fn instance_of<T>(&self) -> Result<Option<Arc<T>>, ContainerError>
    where
        T: Any + Send + Sync,
    {
        let handle = self.core.instance(&Resolvable::of::<T>())?;
        Ok(handle.get_as::<T>())
    }

    /// Looks up every bean satisfying `required` and `qualifiers`.
    pub fn select<I>(&self, required: Type, qualifiers: I) -> Result<Instances, ContainerError>
    where
        I: IntoIterator<Item = Qualifier>,
    {
        self.core.select(Resolvable::new(required, qualifiers))
    }

    pub fn bean(&self, id: &str) -> Result<Option<Arc<Bean>>, ContainerError> {
        self.core.bean(id)
    }

    /// Returns an instance of `bean`, e.g. one found through [`Self::bean`].
    /// A dependent instance is owned by the returned handle.
    pub fn instance_of_bean(&self, bean: &Arc<Bean>) -> Result<InstanceHandle, ContainerError> {
        self.core.bean_instance_handle(bean, None)
    }

    pub fn instance_named(&self, name: &str) -> Result<InstanceHandle, ContainerError> {
        self.core.instance_named(name)
    }

    pub fn active_context(
        &self,
        scope: Scope,
    ) -> Result<Option<Arc<dyn InjectableContext>>, ContainerError> {
        self.core.active_context(scope)
    }

    pub fn request_context(&self) -> Arc<BoundContext> {
        Arc::clone(self.core.contexts().request())
    }

    /// Runs `action` with the request context active on this thread.
    ///
    /// If the request context was not active yet, it is terminated once
    /// `action` returns, even if it panics.
    pub fn run_with_request_scope<F, R>(&self, action: F) -> Result<R, ContainerError>
    where
        F: FnOnce() -> R,
    {
        self.core.check_running()?;
        let request = self.core.contexts().request();
        if request.is_active() {
            return Ok(action());
        }

        request.activate()?;
        let guard = RequestScopeGuard {
            request: Some(request.as_ref()),
        };
        let res = action();
        guard.finish()?;
        Ok(res)
    }

    /// Fires `event` with `qualifiers` to every matching observer.
    pub fn fire<E, I>(&self, event: E, qualifiers: I) -> Result<(), ContainerError>
    where
        E: Typed,
        I: IntoIterator<Item = Qualifier>,
    {
        let runtime = event.runtime_type();
        self.core.fire(&event, runtime, qualifiers.into_iter().collect())
    }

    /// Returns an emitter of events declared as `declared`.
    pub fn event(&self, declared: Type) -> Result<Event, ContainerError> {
        self.core.check_running()?;
        Ok(Event::new(Arc::clone(&self.core), declared, QualifierSet::new()))
    }

    /// Stops the container and destroys the instances of its shared
    /// contexts. Shutting down a stopped container does nothing.
    pub fn shutdown(&self) -> Result<(), ContainerError> {
        self.core.shutdown()
    }

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }
}

struct RequestScopeGuard<'a> {
    request: Option<&'a BoundContext>,
}

impl RequestScopeGuard<'_> {
    fn finish(mut self) -> Result<(), ContainerError> {
        match self.request.take() {
            Some(request) => request.terminate(),
            None => Ok(()),
        }
    }
}

impl Drop for RequestScopeGuard<'_> {
    fn drop(&mut self) {
        if let Some(request) = self.request.take() {
            if let Err(err) = request.terminate() {
                warn!(error = %err, "failed to terminate the request context");
            }
        }
    }
}

/// Collects everything a [`Container`] is started with.
pub struct ContainerBuilder {
    providers: Vec<Arc<dyn ComponentsProvider>>,
    resource_providers: Vec<Arc<dyn ResourceReferenceProvider>>,
    activate_request_context: bool,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            providers: Vec::new(),
            resource_providers: Vec::new(),
            activate_request_context: true,
        }
    }

    pub fn provider<P>(mut self, provider: P) -> Self
    where
        P: ComponentsProvider + 'static,
    {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn resource_provider<P>(mut self, provider: P) -> Self
    where
        P: ResourceReferenceProvider + 'static,
    {
        self.resource_providers.push(Arc::new(provider));
        self
    }

    /// Whether firing an event activates the request context for the
    /// duration of the notification when it is not active. Enabled by
    /// default.
    pub fn activate_request_context(mut self, activate: bool) -> Self {
        self.activate_request_context = activate;
        self
    }

    /// Loads the components of every provider and starts the container.
    pub fn build(self) -> Result<Container, ContainerError> {
        let (registry, custom_contexts) = Registry::load(&self.providers)
            .map_err(|source| ContainerError::Registration { source })?;
        let core = Arc::new(ContainerCore::new(
            registry,
            custom_contexts,
            self.resource_providers,
            self.activate_request_context,
        ));
        core.start()?;
        Ok(Container { core })
    }
}
