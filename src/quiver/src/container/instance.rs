use std::any::Any;
use std::sync::{Arc, Weak};

use crate::bean::Bean;
use crate::container::context::Contexts;
use crate::container::core::ContainerCore;
use crate::container::creational::{CreationalContext, ManagedInstance};
use crate::container::resolver::{Resolution, Resolvable};
use crate::container::{ContainerError, Instance};
use crate::util::any::Downcast;

/// A resolved instance together with the bean that produced it.
///
/// A handle may be *unavailable* when a lookup found no bean or could not
/// decide between several. Destroying a handle is idempotent.
#[derive(Clone, Default)]
pub struct InstanceHandle {
    inner: Option<Arc<HandleInner>>,
}

struct HandleInner {
    state: Arc<ManagedInstance>,
    parent: Option<Arc<CreationalContext>>,
    contexts: Weak<Contexts>,
}

impl InstanceHandle {
    pub fn unavailable() -> Self {
        Self { inner: None }
    }

    /// Wraps an instance created outside of any context, e.g. by a resource
    /// provider. Destroying the handle runs the bean's destroy callback.
    pub fn of(bean: Arc<Bean>, instance: Instance) -> Self {
        Self::dependent(bean, instance, CreationalContext::new(), None)
    }

    pub(crate) fn dependent(
        bean: Arc<Bean>,
        instance: Instance,
        creational: Arc<CreationalContext>,
        parent: Option<Arc<CreationalContext>>,
    ) -> Self {
        Self::new(bean, instance, creational, parent, Weak::new())
    }

    pub(crate) fn contextual(
        bean: Arc<Bean>,
        instance: Instance,
        creational: Arc<CreationalContext>,
        contexts: Weak<Contexts>,
    ) -> Self {
        Self::new(bean, instance, creational, None, contexts)
    }

    fn new(
        bean: Arc<Bean>,
        instance: Instance,
        creational: Arc<CreationalContext>,
        parent: Option<Arc<CreationalContext>>,
        contexts: Weak<Contexts>,
    ) -> Self {
        let state = ManagedInstance::new(bean, instance, creational);
        Self {
            inner: Some(Arc::new(HandleInner {
                state: Arc::new(state),
                parent,
                contexts,
            })),
        }
    }

    pub fn is_available(&self) -> bool {
        self.inner.is_some()
    }

    pub fn get(&self) -> Option<&Instance> {
        self.inner.as_ref().map(|inner| inner.state.instance())
    }

    /// Returns the instance if it was constructed as a `T`.
    pub fn get_as<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.get().and_then(|instance| Arc::clone(instance).downcast::<T>().ok())
    }

    pub fn bean(&self) -> Option<&Arc<Bean>> {
        self.inner.as_ref().map(|inner| inner.state.bean())
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.state.is_destroyed())
    }

    /// Destroys the instance.
    ///
    /// Instances of normal scopes are removed from the active context of
    /// their scope. A dependent instance with a parent creational context
    /// releases that parent, which destroys the instance together with
    /// everything else it owns. Any other dependent instance is destroyed
    /// directly.
    pub fn destroy(&self) -> Result<(), ContainerError> {
        let Some(inner) = self.inner.as_ref() else {
            return Ok(());
        };
        let state = &inner.state;
        if state.is_destroyed() {
            return Ok(());
        }

        let bean = state.bean();
        let scope = bean.scope();
        if scope.is_normal() {
            let contexts = inner
                .contexts
                .upgrade()
                .ok_or(ContainerError::NotRunning {})?;
            let context = contexts
                .active_context(scope)?
                .ok_or(ContainerError::NotActive { scope })?;
            if state.mark_destroyed() {
                return Ok(());
            }
            context.destroy_bean(bean)
        } else if let Some(parent) = inner.parent.as_ref() {
            parent.release()
        } else {
            state.destroy()
        }
    }

    pub(crate) fn state(&self) -> Option<&Arc<ManagedInstance>> {
        self.inner.as_ref().map(|inner| &inner.state)
    }
}

/// The result of an enumerating lookup.
///
/// Unlike single-instance lookups, [`Instances::get`] reports unsatisfied and
/// ambiguous dependencies as errors.
pub struct Instances {
    core: Arc<ContainerCore>,
    resolvable: Resolvable,
    matching: Arc<[Arc<Bean>]>,
    resolution: Resolution,
}

impl Instances {
    pub(crate) fn new(
        core: Arc<ContainerCore>,
        resolvable: Resolvable,
        matching: Arc<[Arc<Bean>]>,
        resolution: Resolution,
    ) -> Self {
        Self {
            core,
            resolvable,
            matching,
            resolution,
        }
    }

    /// Returns the single instance the lookup resolves to.
    pub fn get(&self) -> Result<InstanceHandle, ContainerError> {
        match &self.resolution {
            Resolution::Resolved(bean) => self.core.bean_instance_handle(bean, None),
            Resolution::Unsatisfied => Err(ContainerError::Unsatisfied {
                required: self.resolvable.required().clone(),
                qualifiers: self.resolvable.qualifiers().clone(),
            }),
            Resolution::Ambiguous(beans) => Err(ContainerError::Ambiguous {
                required: self.resolvable.required().clone(),
                qualifiers: self.resolvable.qualifiers().clone(),
                candidates: beans.iter().map(|bean| bean.id().clone()).collect(),
            }),
        }
    }

    /// Returns an instance of every matching bean, without resolving
    /// ambiguities.
    pub fn handles(&self) -> Result<Vec<InstanceHandle>, ContainerError> {
        self.matching
            .iter()
            .map(|bean| self.core.bean_instance_handle(bean, None))
            .collect()
    }

    pub fn beans(&self) -> &[Arc<Bean>] {
        &self.matching
    }

    pub fn is_unsatisfied(&self) -> bool {
        self.matching.is_empty()
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self.resolution, Resolution::Ambiguous(_))
    }

    pub fn is_resolvable(&self) -> bool {
        matches!(self.resolution, Resolution::Resolved(_))
    }

    pub fn len(&self) -> usize {
        self.matching.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matching.is_empty()
    }
}
