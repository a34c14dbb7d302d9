//! Event listener definitions.

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::bean::BeanId;
use crate::container::{BoxError, Managed};
use crate::qualifier::{Qualifier, QualifierSet};
use crate::types::Type;
use crate::util::any::AsAny;

type Notify = dyn Fn(&EventContext<'_>) -> Result<(), BoxError> + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(Arc<str>);

impl ObserverId {
    pub fn new<S: Into<Arc<str>>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObserverId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ObserverId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl Display for ObserverId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// A registered event listener.
///
/// An observer is notified of every fired event whose type matches its
/// observed type and whose qualifiers include all of its own.
pub struct Observer {
    id: ObserverId,
    observed_type: Type,
    qualifiers: QualifierSet,
    priority: i32,
    declaring_bean: Option<BeanId>,
    notify: Box<Notify>,
}

impl Observer {
    /// The priority of observers that do not declare one.
    pub const DEFAULT_PRIORITY: i32 = 2500;

    pub fn builder<I, T, F, E>(id: I, observed_type: T, notify: F) -> ObserverBuilder
    where
        I: Into<ObserverId>,
        T: Into<Type>,
        F: Fn(&EventContext<'_>) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let notify = move |event: &EventContext<'_>| -> Result<(), BoxError> {
            notify(event).map_err(Into::into)
        };
        ObserverBuilder {
            id: id.into(),
            observed_type: observed_type.into(),
            qualifiers: QualifierSet::new(),
            priority: Self::DEFAULT_PRIORITY,
            declaring_bean: None,
            notify: Box::new(notify),
        }
    }

    pub fn id(&self) -> &ObserverId {
        &self.id
    }

    pub fn observed_type(&self) -> &Type {
        &self.observed_type
    }

    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn declaring_bean(&self) -> Option<&BeanId> {
        self.declaring_bean.as_ref()
    }

    pub(crate) fn notify(&self, event: &EventContext<'_>) -> Result<(), BoxError> {
        (self.notify)(event)
    }
}

impl Debug for Observer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Observer")
            .field("id", &self.id)
            .field("observed_type", &self.observed_type)
            .field("qualifiers", &self.qualifiers)
            .field("priority", &self.priority)
            .field("declaring_bean", &self.declaring_bean)
            .finish_non_exhaustive()
    }
}

pub struct ObserverBuilder {
    id: ObserverId,
    observed_type: Type,
    qualifiers: QualifierSet,
    priority: i32,
    declaring_bean: Option<BeanId>,
    notify: Box<Notify>,
}

impl ObserverBuilder {
    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.insert(qualifier);
        self
    }

    pub fn qualifiers<I>(mut self, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = Qualifier>,
    {
        self.qualifiers.extend(qualifiers);
        self
    }

    /// Observers with lower priorities are notified first.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn declared_by<I: Into<BeanId>>(mut self, bean: I) -> Self {
        self.declaring_bean = Some(bean.into());
        self
    }

    pub fn build(self) -> Arc<Observer> {
        Arc::new(Observer {
            id: self.id,
            observed_type: self.observed_type,
            qualifiers: self.qualifiers,
            priority: self.priority,
            declaring_bean: self.declaring_bean,
            notify: self.notify,
        })
    }
}

/// Describes a fired event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetadata {
    qualifiers: QualifierSet,
    event_type: Type,
}

impl EventMetadata {
    pub(crate) fn new(qualifiers: QualifierSet, event_type: Type) -> Self {
        Self {
            qualifiers,
            event_type,
        }
    }

    /// Returns the qualifiers of the event, always including `@Any`.
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    /// Returns the resolved runtime type of the event.
    pub fn event_type(&self) -> &Type {
        &self.event_type
    }
}

/// What an observer receives when it is notified.
pub struct EventContext<'a> {
    payload: &'a dyn Managed,
    metadata: &'a EventMetadata,
}

impl<'a> EventContext<'a> {
    pub(crate) fn new(payload: &'a dyn Managed, metadata: &'a EventMetadata) -> Self {
        Self { payload, metadata }
    }

    pub fn payload(&self) -> &'a dyn Managed {
        self.payload
    }

    /// Returns the payload if it is a `T`.
    pub fn payload_as<T: Managed>(&self) -> Option<&'a T> {
        let payload: &'a dyn Managed = self.payload;
        payload.as_any().downcast_ref::<T>()
    }

    pub fn metadata(&self) -> &'a EventMetadata {
        self.metadata
    }
}
