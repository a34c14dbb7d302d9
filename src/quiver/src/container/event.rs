//! Typed event delivery.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::container::context::{BoundContext, InjectableContext, ManagedContext};
use crate::container::core::ContainerCore;
use crate::container::{ContainerError, Managed};
use crate::observer::{EventContext, EventMetadata, Observer};
use crate::qualifier::{Qualifier, QualifierSet};
use crate::scope::Scope;
use crate::types::assignability::{AssignabilityRules, EventTypeRules};
use crate::types::hierarchy::resolve_runtime_type;
use crate::types::{Type, Typed};
use crate::util::cache::ComputingCache;

/// The payload of the events fired when a context of `scope` is
/// initialized or destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleEvent {
    scope: Scope,
}

impl LifecycleEvent {
    pub fn new(scope: Scope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

impl Typed for LifecycleEvent {
    fn runtime_type(&self) -> Type {
        Type::of::<LifecycleEvent>()
    }
}

/// The observers of one kind of event, in the order they are notified.
pub(crate) struct Notifier {
    observers: Vec<Arc<Observer>>,
    metadata: EventMetadata,
    activate_request_context: bool,
}

impl Notifier {
    /// Selects the observers of events of `event_type` fired with
    /// `qualifiers`.
    pub(crate) fn resolve(
        observers: &[Arc<Observer>],
        event_type: Type,
        qualifiers: &QualifierSet,
        activate_request_context: bool,
    ) -> Self {
        let qualifiers = qualifiers.union(&QualifierSet::from([Qualifier::ANY]));
        let closure = event_type.closure();
        let mut observers = observers
            .iter()
            .filter(|observer| {
                EventTypeRules.matches(observer.observed_type(), &closure)
                    && observer.qualifiers().is_subset(&qualifiers)
            })
            .cloned()
            .collect::<Vec<_>>();
        observers.sort_by_key(|observer| observer.priority());
        trace!(
            event_type = %event_type,
            qualifiers = %qualifiers,
            observers = observers.len(),
            "resolved event observers",
        );

        Self {
            observers,
            metadata: EventMetadata::new(qualifiers, event_type),
            activate_request_context,
        }
    }

    pub(crate) fn observers(&self) -> &[Arc<Observer>] {
        &self.observers
    }

    /// Notifies every observer in turn. The first failure stops the
    /// notification.
    ///
    /// If request context activation is enabled and `request` is not active
    /// on this thread, it is active during the notification only.
    pub(crate) fn notify(
        &self,
        payload: &dyn Managed,
        request: &BoundContext,
    ) -> Result<(), ContainerError> {
        if self.observers.is_empty() {
            return Ok(());
        }

        let activated = self.activate_request_context && !request.is_active();
        if activated {
            request.activate()?;
        }
        let res = self.notify_observers(payload);
        if activated {
            if let Err(err) = request.terminate() {
                warn!(event_type = %self.metadata.event_type(), error = %err, "failed to terminate the request context after notification");
            }
        }
        res
    }

    fn notify_observers(&self, payload: &dyn Managed) -> Result<(), ContainerError> {
        let event = EventContext::new(payload, &self.metadata);
        for observer in &self.observers {
            trace!(observer = %observer.id(), "notifying an observer");
            if let Err(err) = observer.notify(&event) {
                return Err(ContainerError::ObserverNotification {
                    observer: observer.id().clone(),
                    source: Arc::from(err),
                });
            }
        }
        Ok(())
    }
}

/// Fires events of a declared type.
///
/// Payloads whose runtime type is generic get their type arguments from the
/// declared type.
pub struct Event {
    core: Arc<ContainerCore>,
    declared: Type,
    qualifiers: QualifierSet,
    notifiers: ComputingCache<Type, Arc<Notifier>>,
}

impl Event {
    pub(crate) fn new(core: Arc<ContainerCore>, declared: Type, qualifiers: QualifierSet) -> Self {
        Self {
            core,
            declared,
            qualifiers,
            notifiers: ComputingCache::new(),
        }
    }

    pub fn declared_type(&self) -> &Type {
        &self.declared
    }

    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    /// Returns an event with additional qualifiers.
    pub fn select<I>(&self, qualifiers: I) -> Event
    where
        I: IntoIterator<Item = Qualifier>,
    {
        let mut selected = self.qualifiers.clone();
        selected.extend(qualifiers);
        Event::new(Arc::clone(&self.core), self.declared.clone(), selected)
    }

    /// Returns an event of a narrower declared type with additional
    /// qualifiers.
    pub fn select_type<I>(&self, subtype: Type, qualifiers: I) -> Result<Event, ContainerError>
    where
        I: IntoIterator<Item = Qualifier>,
    {
        if !subtype.is_subtype_of(&self.declared) {
            return Err(ContainerError::illegal_argument(format!(
                "{subtype} is not a subtype of the event type {}",
                self.declared,
            )));
        }
        let mut selected = self.qualifiers.clone();
        selected.extend(qualifiers);
        Ok(Event::new(Arc::clone(&self.core), subtype, selected))
    }

    pub fn fire<E: Typed>(&self, event: E) -> Result<(), ContainerError> {
        let runtime = event.runtime_type();
        self.fire_dyn(&event, runtime)
    }

    /// Fires a payload whose runtime type is given explicitly.
    pub fn fire_dyn(&self, payload: &dyn Managed, runtime: Type) -> Result<(), ContainerError> {
        self.core.check_running()?;
        let resolved = resolve_runtime_type(&runtime, &self.declared).ok_or_else(|| {
            ContainerError::illegal_argument(format!(
                "the event type {runtime} could not be resolved from {}",
                self.declared,
            ))
        })?;
        let notifier = self.notifiers.get_or_compute(&resolved, |event_type| {
            Arc::new(self.core.notifier(event_type.clone(), &self.qualifiers))
        });
        self.core.notify(&notifier, payload)
    }
}
