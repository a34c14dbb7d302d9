#![allow(clippy::new_without_default)]

pub mod bean;
pub mod container;
pub mod observer;
pub mod qualifier;
pub mod scope;
pub mod types;
mod util;

pub use container::{container, initialize, shutdown};

pub mod prelude {
    pub use crate::bean::{Bean, BeanId};
    pub use crate::container::context::{ContextState, InjectableContext, ManagedContext};
    pub use crate::container::event::{Event, LifecycleEvent};
    pub use crate::container::injector::Creation;
    pub use crate::container::instance::{InstanceHandle, Instances};
    pub use crate::container::registry::{Components, ComponentsProvider, ResourceReferenceProvider};
    pub use crate::container::resolver::Resolvable;
    pub use crate::container::{Container, ContainerBuilder, ContainerError};
    pub use crate::observer::{EventContext, Observer};
    pub use crate::qualifier::{Qualifier, QualifierSet};
    pub use crate::scope::Scope;
    pub use crate::types::{Class, Type, Typed};
}
