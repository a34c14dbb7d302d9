//! Component definitions.

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::container::creational::CreationalContext;
use crate::container::injector::Creation;
use crate::container::{BoxError, ContainerError, Instance, Managed};
use crate::qualifier::{Qualifier, QualifierSet};
use crate::scope::Scope;
use crate::types::Type;
use crate::util::any::DowncastRef;

type ConstructorResult = Result<Result<Instance, BoxError>, ContainerError>;

type Constructor = dyn Fn(&Creation<'_>) -> ConstructorResult + Send + Sync;

type Destructor = dyn Fn(&Instance) -> Result<(), BoxError> + Send + Sync;

/// The unique identifier of a [`Bean`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BeanId(Arc<str>);

impl BeanId {
    pub fn new<S: Into<Arc<str>>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BeanId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BeanId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl Display for BeanId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// A registered component: how to create and destroy instances of one
/// implementation, which contracts it satisfies and in which scope its
/// instances live.
pub struct Bean {
    id: BeanId,
    name: Option<Arc<str>>,
    implementation: Type,
    types: Vec<Type>,
    qualifiers: QualifierSet,
    scope: Scope,
    alternative_priority: Option<i32>,
    default_bean: bool,
    declaring_bean: Option<Arc<Bean>>,
    constructor: Box<Constructor>,
    destructor: Option<Box<Destructor>>,
}

impl Bean {
    /// Starts building a bean whose instances are created by `constructor`.
    ///
    /// The constructor returns a nested result: the outer error is a failure
    /// to inject a dependency through the [`Creation`] and is propagated as
    /// is, while the inner error is reported as an object construction
    /// failure of this bean.
    pub fn builder<T, F, E, I>(id: I, constructor: F) -> BeanBuilder<T>
    where
        T: Managed,
        F: Fn(&Creation<'_>) -> Result<Result<T, E>, ContainerError> + Send + Sync + 'static,
        E: Into<BoxError>,
        I: Into<BeanId>,
    {
        let constructor = move |creation: &Creation<'_>| -> ConstructorResult {
            let res = constructor(creation)?;
            Ok(res
                .map(|object| Arc::new(object) as Instance)
                .map_err(Into::into))
        };
        BeanBuilder::new(id.into(), Box::new(constructor))
    }

    /// Starts building a bean which always hands out the given instance.
    pub fn instance<T, I>(id: I, object: Arc<T>) -> BeanBuilder<T>
    where
        T: Managed,
        I: Into<BeanId>,
    {
        let constructor =
            move |_: &Creation<'_>| -> ConstructorResult { Ok(Ok(Arc::clone(&object) as Instance)) };
        BeanBuilder::new(id.into(), Box::new(constructor))
    }

    pub fn id(&self) -> &BeanId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn implementation(&self) -> &Type {
        &self.implementation
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn alternative_priority(&self) -> Option<i32> {
        self.alternative_priority
    }

    /// Returns the priority of this bean, or of its declaring bean if it has
    /// none itself.
    pub fn effective_alternative_priority(&self) -> Option<i32> {
        self.alternative_priority.or_else(|| {
            self.declaring_bean
                .as_ref()
                .and_then(|bean| bean.effective_alternative_priority())
        })
    }

    pub fn is_alternative(&self) -> bool {
        self.effective_alternative_priority().is_some()
    }

    pub fn is_default_bean(&self) -> bool {
        self.default_bean
    }

    pub fn declaring_bean(&self) -> Option<&Arc<Bean>> {
        self.declaring_bean.as_ref()
    }

    /// Runs the constructor. If it fails, the dependents it already obtained
    /// through `creation` are released before the error is returned.
    pub(crate) fn create(&self, creation: &Creation<'_>) -> Result<Instance, ContainerError> {
        trace!(bean = %self.id, scope = %self.scope, "creating a bean instance");
        let res = match (self.constructor)(creation) {
            Ok(Ok(instance)) => Ok(instance),
            Ok(Err(err)) => Err(ContainerError::ObjectConstruction {
                bean: self.id.clone(),
                source: Arc::from(err),
            }),
            Err(err) => Err(err),
        };
        if res.is_err() {
            if let Err(err) = creation.creational_context().release() {
                warn!(bean = %self.id, error = %err, "failed to release the dependents of a failed construction");
            }
        }
        res
    }

    /// Runs the destroy callback and then releases the dependents owned by
    /// `context`. The context is released even if the callback failed.
    pub(crate) fn destroy(
        &self,
        instance: &Instance,
        context: &CreationalContext,
    ) -> Result<(), ContainerError> {
        trace!(bean = %self.id, "destroying a bean instance");
        let mut errors = Vec::new();

        if let Some(destructor) = self.destructor.as_ref() {
            if let Err(err) = destructor(instance) {
                errors.push(ContainerError::ObjectDestruction {
                    bean: self.id.clone(),
                    source: Arc::from(err),
                });
            }
        }
        if let Err(err) = context.release() {
            errors.push(err);
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => ContainerError::aggregate(errors),
        }
    }
}

impl Debug for Bean {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Bean")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("implementation", &self.implementation)
            .field("qualifiers", &self.qualifiers)
            .field("scope", &self.scope)
            .field("alternative_priority", &self.alternative_priority)
            .field("default_bean", &self.default_bean)
            .finish_non_exhaustive()
    }
}

impl Display for Bean {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} [{}, {}]", self.id, self.implementation, self.scope)
    }
}

pub struct BeanBuilder<T> {
    id: BeanId,
    name: Option<Arc<str>>,
    implementation: Type,
    types: Option<Vec<Type>>,
    qualifiers: Vec<Qualifier>,
    scope: Scope,
    alternative_priority: Option<i32>,
    default_bean: bool,
    declaring_bean: Option<Arc<Bean>>,
    constructor: Box<Constructor>,
    destructor: Option<Box<Destructor>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Managed> BeanBuilder<T> {
    fn new(id: BeanId, constructor: Box<Constructor>) -> Self {
        Self {
            id,
            name: None,
            implementation: Type::of::<T>(),
            types: None,
            qualifiers: Vec::new(),
            scope: Scope::Dependent,
            alternative_priority: None,
            default_bean: false,
            declaring_bean: None,
            constructor,
            destructor: None,
            _marker: PhantomData,
        }
    }

    /// Describes the implementation type. Unless [`Self::types`] is called,
    /// the bean exposes the type closure of this type.
    pub fn implementation<I: Into<Type>>(mut self, implementation: I) -> Self {
        self.implementation = implementation.into();
        self
    }

    /// Restricts the contracts the bean satisfies.
    pub fn types<I>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = Type>,
    {
        self.types = Some(types.into_iter().collect());
        self
    }

    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    pub fn qualifiers<I>(mut self, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = Qualifier>,
    {
        self.qualifiers.extend(qualifiers);
        self
    }

    /// Gives the bean a name, which also qualifies it with `@Named(name)`.
    pub fn named<N: Into<Arc<str>>>(mut self, name: N) -> Self {
        let name = name.into();
        self.qualifiers.push(Qualifier::named(name.to_string()));
        self.name = Some(name);
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Marks the bean as an enabled alternative with the given priority.
    /// Higher priorities win.
    pub fn alternative(mut self, priority: i32) -> Self {
        self.alternative_priority = Some(priority);
        self
    }

    /// Marks the bean as a fallback which loses against any other match.
    pub fn default_bean(mut self) -> Self {
        self.default_bean = true;
        self
    }

    pub fn declared_by(mut self, bean: Arc<Bean>) -> Self {
        self.declaring_bean = Some(bean);
        self
    }

    pub fn destructor<F, E>(mut self, destructor: F) -> Self
    where
        F: Fn(&T) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let destructor = move |instance: &Instance| -> Result<(), BoxError> {
            let Some(object) = instance.downcast_ref::<T>() else {
                unreachable!("instances of a bean should be of its constructed type")
            };
            destructor(object).map_err(Into::into)
        };
        self.destructor = Some(Box::new(destructor));
        self
    }

    pub fn build(self) -> Arc<Bean> {
        let types = self
            .types
            .unwrap_or_else(|| self.implementation.closure());
        Arc::new(Bean {
            id: self.id,
            name: self.name,
            implementation: self.implementation,
            types,
            qualifiers: QualifierSet::normalized(self.qualifiers),
            scope: self.scope,
            alternative_priority: self.alternative_priority,
            default_bean: self.default_bean,
            declaring_bean: self.declaring_bean,
            constructor: self.constructor,
            destructor: self.destructor,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use crate::types::Class;

    use super::*;

    struct Service;

    #[test]
    fn bean_builder_build_succeeds() {
        let service = Class::of::<Service>().extends(Class::named("Api"));
        let bean = Bean::builder("service", |_| Ok(Ok::<_, Infallible>(Service)))
            .implementation(service.clone())
            .named("service")
            .scope(Scope::Application)
            .build();

        assert_eq!(bean.id().as_str(), "service");
        assert_eq!(bean.name(), Some("service"));
        assert_eq!(
            bean.types(),
            &[Type::from(service), Type::from(Class::named("Api"))]
        );
        assert!(bean.qualifiers().contains(&Qualifier::DEFAULT));
        assert!(bean.qualifiers().contains(&Qualifier::ANY));
        assert!(bean.qualifiers().contains(&Qualifier::named("service")));
        assert_eq!(bean.scope(), Scope::Application);
        assert!(!bean.is_alternative());
    }

    #[test]
    fn bean_effective_alternative_priority_succeeds_when_declaring_bean_has_priority() {
        let factory = Bean::instance("factory", Arc::new(Service))
            .alternative(10)
            .build();
        let produced = Bean::instance("produced", Arc::new(0u32))
            .declared_by(Arc::clone(&factory))
            .build();
        let plain = Bean::instance("plain", Arc::new(0u32)).build();

        assert_eq!(produced.effective_alternative_priority(), Some(10));
        assert!(produced.is_alternative());
        assert_eq!(plain.effective_alternative_priority(), None);
    }

    #[test]
    fn bean_destroy_succeeds() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&destroyed);
        let bean = Bean::instance("value", Arc::new(7u32))
            .destructor(move |value: &u32| {
                counter.fetch_add(*value as usize, Ordering::SeqCst);
                Ok::<_, Infallible>(())
            })
            .build();

        let instance: Instance = Arc::new(7u32);
        let context = CreationalContext::new();
        bean.destroy(&instance, &context).unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn bean_destroy_fails_when_destructor_fails() {
        let bean = Bean::instance("value", Arc::new(7u32))
            .destructor(|_: &u32| Err("boom"))
            .build();

        let instance: Instance = Arc::new(7u32);
        let context = CreationalContext::new();
        assert!(matches!(
            bean.destroy(&instance, &context),
            Err(ContainerError::ObjectDestruction { .. })
        ));
    }
}
