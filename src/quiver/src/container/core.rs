use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bean::Bean;
use crate::container::context::{Contexts, InjectableContext, ManagedContext};
use crate::container::creational::CreationalContext;
use crate::container::event::{LifecycleEvent, Notifier};
use crate::container::injector::{CallContext, Creation, Injector};
use crate::container::instance::{InstanceHandle, Instances};
use crate::container::registry::{Registry, ResourceReferenceProvider};
use crate::container::resolver::{Resolution, Resolvable, TypesafeResolver};
use crate::container::{ContainerError, Instance, Managed};
use crate::qualifier::{Qualifier, QualifierSet};
use crate::scope::Scope;
use crate::types::{Type, Typed};
use crate::util::cache::ComputingCache;

pub struct ContainerCore {
    running: AtomicBool,
    shutdown_lock: Mutex<()>,
    registry: Registry,
    resolver: TypesafeResolver,
    contexts: Arc<Contexts>,
    resource_providers: Vec<Arc<dyn ResourceReferenceProvider>>,
    notifiers: ComputingCache<(Type, QualifierSet), Arc<Notifier>>,
    activate_request_context: bool,
}

impl ContainerCore {
    pub fn new(
        registry: Registry,
        custom_contexts: Vec<Arc<dyn InjectableContext>>,
        resource_providers: Vec<Arc<dyn ResourceReferenceProvider>>,
        activate_request_context: bool,
    ) -> Self {
        Self {
            running: AtomicBool::new(true),
            shutdown_lock: Mutex::new(()),
            registry,
            resolver: TypesafeResolver::new(),
            contexts: Arc::new(Contexts::new(custom_contexts)),
            resource_providers,
            notifiers: ComputingCache::new(),
            activate_request_context,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn check_running(&self) -> Result<(), ContainerError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(ContainerError::NotRunning {})
        }
    }

    pub fn contexts(&self) -> &Arc<Contexts> {
        &self.contexts
    }

    /// Fires the event announcing that the application context is ready.
    pub fn start(&self) -> Result<(), ContainerError> {
        debug!(
            beans = self.registry.beans().len(),
            observers = self.registry.observers().len(),
            contexts = self.contexts.custom().len(),
            "container started",
        );
        self.fire_lifecycle(Qualifier::initialized(Scope::Application))
    }

    /// Returns an instance of the bean `resolvable` resolves to.
    ///
    /// If no bean matches, the resource reference providers are consulted.
    /// An unsatisfied or ambiguous lookup yields an unavailable handle.
    pub fn instance(&self, resolvable: &Resolvable) -> Result<InstanceHandle, ContainerError> {
        self.check_running()?;
        match self.resolver.resolve(&self.registry, resolvable) {
            Resolution::Resolved(bean) => self.bean_instance_handle(&bean, None),
            Resolution::Unsatisfied => Ok(self.resource_handle(resolvable).unwrap_or_default()),
            Resolution::Ambiguous(_) => Ok(InstanceHandle::unavailable()),
        }
    }

    pub fn select(self: &Arc<Self>, resolvable: Resolvable) -> Result<Instances, ContainerError> {
        self.check_running()?;
        let matching = self.resolver.matching(&self.registry, &resolvable);
        let resolution = self.resolver.resolve(&self.registry, &resolvable);
        Ok(Instances::new(
            Arc::clone(self),
            resolvable,
            matching,
            resolution,
        ))
    }

    pub fn bean(&self, id: &str) -> Result<Option<Arc<Bean>>, ContainerError> {
        self.check_running()?;
        let beans = self.registry.beans();
        Ok(beans.iter().find(|bean| bean.id().as_str() == id).cloned())
    }

    pub fn instance_named(&self, name: &str) -> Result<InstanceHandle, ContainerError> {
        self.check_running()?;
        match self.resolver.resolve_named(&self.registry, name) {
            Resolution::Resolved(bean) => self.bean_instance_handle(&bean, None),
            _ => Ok(InstanceHandle::unavailable()),
        }
    }

    pub fn active_context(
        &self,
        scope: Scope,
    ) -> Result<Option<Arc<dyn InjectableContext>>, ContainerError> {
        self.check_running()?;
        self.contexts.active_context(scope)
    }

    /// Obtains an instance of `bean`.
    ///
    /// With `creation`, the instance is obtained on behalf of the bean being
    /// created through it: a dependent instance becomes owned by that bean.
    /// Without it, a dependent instance gets a creational context of its
    /// own which is released when the returned handle is destroyed.
    pub fn bean_instance_handle(
        &self,
        bean: &Arc<Bean>,
        creation: Option<&Creation<'_>>,
    ) -> Result<InstanceHandle, ContainerError> {
        self.check_running()?;
        let scope = bean.scope();
        if scope == Scope::Dependent {
            self.dependent_instance_handle(bean, creation)
        } else {
            self.contextual_instance_handle(bean, scope, creation)
        }
    }

    fn dependent_instance_handle(
        &self,
        bean: &Arc<Bean>,
        creation: Option<&Creation<'_>>,
    ) -> Result<InstanceHandle, ContainerError> {
        let parent = match creation {
            Some(creation) => Arc::clone(creation.creational_context()),
            None => CreationalContext::new(),
        };
        let child = parent.child();
        let instance = match creation {
            Some(creation) => bean.create(&creation.nested(bean.id(), Arc::clone(&child)))?,
            None => bean.create(&Creation::new(
                self,
                Arc::clone(&child),
                CallContext::new(bean.id()),
            ))?,
        };

        let owner = creation.is_none().then(|| Arc::clone(&parent));
        let handle = InstanceHandle::dependent(Arc::clone(bean), instance, Arc::clone(&child), owner);
        CreationalContext::add_to_parent(&handle, &child);
        Ok(handle)
    }

    fn contextual_instance_handle(
        &self,
        bean: &Arc<Bean>,
        scope: Scope,
        creation: Option<&Creation<'_>>,
    ) -> Result<InstanceHandle, ContainerError> {
        let context = self
            .contexts
            .active_context(scope)?
            .ok_or(ContainerError::NotActive { scope })?;

        // A contextual instance owns its dependents on its own, whoever asks
        // for it first.
        let creational = CreationalContext::new();
        let instance = match creation {
            Some(creation) => {
                context.get(bean, Some(&creation.nested(bean.id(), Arc::clone(&creational))))?
            }
            None => context.get(
                bean,
                Some(&Creation::new(
                    self,
                    Arc::clone(&creational),
                    CallContext::new(bean.id()),
                )),
            )?,
        };
        let Some(instance) = instance else {
            unreachable!("a context should create an instance when a creation is given")
        };

        Ok(InstanceHandle::contextual(
            Arc::clone(bean),
            instance,
            creational,
            Arc::downgrade(&self.contexts),
        ))
    }

    fn resource_handle(&self, resolvable: &Resolvable) -> Option<InstanceHandle> {
        self.resource_providers.iter().find_map(|provider| {
            provider
                .get(resolvable.required(), resolvable.qualifiers())
                .filter(InstanceHandle::is_available)
        })
    }

    pub(crate) fn notifier(&self, event_type: Type, qualifiers: &QualifierSet) -> Notifier {
        Notifier::resolve(
            &self.registry.observers(),
            event_type,
            qualifiers,
            self.activate_request_context,
        )
    }

    pub(crate) fn notify(&self, notifier: &Notifier, payload: &dyn Managed) -> Result<(), ContainerError> {
        notifier.notify(payload, self.contexts.request())
    }

    /// Fires `payload` to every observer of its runtime type.
    pub fn fire(
        &self,
        payload: &dyn Managed,
        runtime: Type,
        qualifiers: QualifierSet,
    ) -> Result<(), ContainerError> {
        self.check_running()?;
        if runtime.contains_type_variable() {
            return Err(ContainerError::illegal_argument(format!(
                "the event type {runtime} has unresolved type parameters"
            )));
        }
        let notifier = self
            .notifiers
            .get_or_compute(&(runtime, qualifiers), |(event_type, qualifiers)| {
                Arc::new(self.notifier(event_type.clone(), qualifiers))
            });
        self.notify(&notifier, payload)
    }

    fn fire_lifecycle(&self, qualifier: Qualifier) -> Result<(), ContainerError> {
        let event = LifecycleEvent::new(Scope::Application);
        let notifier = Notifier::resolve(
            &self.registry.observers(),
            event.runtime_type(),
            &QualifierSet::from([qualifier]),
            false,
        );
        self.notify(&notifier, &event)
    }

    /// Stops the container.
    ///
    /// The request context of the calling thread is terminated, then the
    /// application context and the singleton context are destroyed. Only
    /// the first call does anything.
    pub fn shutdown(&self) -> Result<(), ContainerError> {
        let _guard = self.shutdown_lock.lock();
        if !self.is_running() {
            return Ok(());
        }
        debug!(
            beans = self.registry.beans().len(),
            observers = self.registry.observers().len(),
            "shutting down the container",
        );

        let mut errors = Vec::new();
        let request = self.contexts.request();
        if request.is_active() {
            if let Err(err) = request.terminate() {
                errors.push(err);
            }
        }

        if let Err(err) = self.fire_lifecycle(Qualifier::before_destroyed(Scope::Application)) {
            warn!(error = %err, "an observer failed before the application context was destroyed");
        }
        if let Err(err) = self.contexts.application().destroy() {
            errors.push(err);
        }
        if let Err(err) = self.fire_lifecycle(Qualifier::destroyed(Scope::Application)) {
            warn!(error = %err, "an observer failed after the application context was destroyed");
        }
        if let Err(err) = self.contexts.singleton().destroy() {
            errors.push(err);
        }

        self.registry.clear();
        self.resolver.clear();
        self.notifiers.clear();
        self.running.store(false, Ordering::Release);
        debug!(failures = errors.len(), "container shut down");

        let errors = errors
            .into_iter()
            .flat_map(|err| match err {
                ContainerError::DestructionFailure { errors } => errors,
                err => vec![err],
            })
            .collect();
        ContainerError::aggregate(errors)
    }
}

impl Injector for ContainerCore {
    fn dyn_inject(
        &self,
        resolvable: &Resolvable,
        creation: &Creation<'_>,
    ) -> Result<Instance, ContainerError> {
        self.check_running()?;
        let bean = match self.resolver.resolve(&self.registry, resolvable) {
            Resolution::Resolved(bean) => bean,
            Resolution::Unsatisfied => {
                let Some(handle) = self.resource_handle(resolvable) else {
                    return Err(ContainerError::Unsatisfied {
                        required: resolvable.required().clone(),
                        qualifiers: resolvable.qualifiers().clone(),
                    });
                };
                creation.creational_context().add_dependent(&handle);
                let Some(instance) = handle.get() else {
                    unreachable!("resource handles should be available")
                };
                return Ok(Arc::clone(instance));
            }
            Resolution::Ambiguous(beans) => {
                return Err(ContainerError::Ambiguous {
                    required: resolvable.required().clone(),
                    qualifiers: resolvable.qualifiers().clone(),
                    candidates: beans.iter().map(|bean| bean.id().clone()).collect(),
                });
            }
        };

        if creation.call().trace().contains(bean.id()) {
            return Err(ContainerError::CyclicDependency {
                bean: bean.id().clone(),
            });
        }
        let handle = self.bean_instance_handle(&bean, Some(creation))?;
        let Some(instance) = handle.get() else {
            unreachable!("bean instance handles should be available")
        };
        Ok(Arc::clone(instance))
    }
}
