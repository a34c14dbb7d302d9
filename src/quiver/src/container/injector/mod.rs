mod context;

use std::any::{self, Any};
use std::iter;
use std::sync::Arc;

use crate::bean::BeanId;
use crate::container::creational::CreationalContext;
use crate::container::resolver::Resolvable;
use crate::container::{ContainerError, Instance};
use crate::qualifier::Qualifier;
use crate::types::Type;
use crate::util::any::{AsAny, Downcast};

pub use context::{CallContext, InjectionTrace};

/// Supplies dependencies to bean constructors.
pub trait Injector: Send + Sync {
    /// Resolves `resolvable` to exactly one bean and returns an instance of
    /// it on behalf of the bean being created through `creation`.
    fn dyn_inject(
        &self,
        resolvable: &Resolvable,
        creation: &Creation<'_>,
    ) -> Result<Instance, ContainerError>;
}

/// The state handed to a bean constructor while one of its instances is
/// being created.
///
/// Dependencies obtained through a [`Creation`] are owned by its creational
/// context when they are of the dependent scope, so they are destroyed
/// together with the instance being created.
pub struct Creation<'a> {
    injector: &'a dyn Injector,
    context: Arc<CreationalContext>,
    call: CallContext<'a>,
}

impl<'a> Creation<'a> {
    pub(crate) fn new(
        injector: &'a dyn Injector,
        context: Arc<CreationalContext>,
        call: CallContext<'a>,
    ) -> Self {
        Self {
            injector,
            context,
            call,
        }
    }

    /// Creates the state for a dependency of the bean being created.
    pub(crate) fn nested<'b>(
        &'b self,
        bean: &'b BeanId,
        context: Arc<CreationalContext>,
    ) -> Creation<'b> {
        Creation {
            injector: self.injector,
            context,
            call: self.call.append(bean),
        }
    }

    pub fn inject(&self, resolvable: &Resolvable) -> Result<Instance, ContainerError> {
        self.injector.dyn_inject(resolvable, self)
    }

    /// Injects the default instance of the contract `T`.
    pub fn get<T>(&self) -> Result<Arc<T>, ContainerError>
    where
        T: Any + Send + Sync,
    {
        self.get_qualified::<T, _>(Type::of::<T>(), iter::empty())
    }

    /// Injects an instance of `required` carrying `qualifiers`, which must
    /// have been constructed as a `T`.
    pub fn get_qualified<T, I>(&self, required: Type, qualifiers: I) -> Result<Arc<T>, ContainerError>
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = Qualifier>,
    {
        let resolvable = Resolvable::new(required, qualifiers);
        let instance = self.inject(&resolvable)?;
        downcast_instance(instance)
    }

    pub fn creational_context(&self) -> &Arc<CreationalContext> {
        &self.context
    }

    pub fn call(&self) -> &CallContext<'a> {
        &self.call
    }
}

pub(crate) fn downcast_instance<T>(instance: Instance) -> Result<Arc<T>, ContainerError>
where
    T: Any + Send + Sync,
{
    instance.downcast::<T>().map_err(|instance| {
        ContainerError::illegal_argument(format!(
            "the instance of {} could not be used as {}",
            (*instance).type_name(),
            any::type_name::<T>(),
        ))
    })
}
