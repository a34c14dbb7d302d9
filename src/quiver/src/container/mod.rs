pub mod context;
pub mod creational;
pub mod event;
pub mod injector;
pub mod instance;
pub mod registry;
pub mod resolver;

mod core;
mod error;
mod global;
mod handle;

use std::error::Error;

use crate::util::any::AsAnyArc;

pub use error::ContainerError;
pub use global::{container, initialize, shutdown};
pub use handle::{Container, ContainerBuilder};

/// An object whose creation and lifetime can be managed by a container.
pub trait Managed: AsAnyArc + 'static {}

impl<T> Managed for T where T: AsAnyArc + 'static {}

/// A managed object as stored and handed out by the container.
pub type Instance = std::sync::Arc<dyn Managed>;

/// The error type returned by user callbacks.
pub type BoxError = Box<dyn Error + Send + Sync>;
