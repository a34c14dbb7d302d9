mod components;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use snafu::prelude::*;

use crate::bean::{Bean, BeanId};
use crate::container::context::InjectableContext;
use crate::container::instance::InstanceHandle;
use crate::observer::Observer;
use crate::qualifier::QualifierSet;
use crate::scope::Scope;
use crate::types::Type;
use crate::util::display::IndexedDisplayer;

pub use components::{Components, ComponentsBuilder};

/// A source of components, loaded once when a container starts.
#[cfg_attr(test, mockall::automock)]
pub trait ComponentsProvider: Send + Sync {
    fn components(&self) -> Components;
}

impl ComponentsProvider for Components {
    fn components(&self) -> Components {
        self.clone()
    }
}

impl<F> ComponentsProvider for F
where
    F: Fn() -> Components + Send + Sync,
{
    fn components(&self) -> Components {
        self()
    }
}

/// A fallback consulted when a single-instance lookup finds no bean.
#[cfg_attr(test, mockall::automock)]
pub trait ResourceReferenceProvider: Send + Sync {
    fn get(&self, required: &Type, qualifiers: &QualifierSet) -> Option<InstanceHandle>;
}

/// The beans and observers known to a container.
///
/// The registry is filled once and never changes afterwards, except that
/// shutdown empties it.
pub struct Registry {
    beans: RwLock<Arc<[Arc<Bean>]>>,
    observers: RwLock<Arc<[Arc<Observer>]>>,
}

impl Registry {
    /// Collects the components of every provider.
    ///
    /// Returns the registry together with the custom contexts contributed by
    /// the providers. Every problem found is reported, not only the first.
    pub fn load(
        providers: &[Arc<dyn ComponentsProvider>],
    ) -> Result<(Self, Vec<Arc<dyn InjectableContext>>), RegistryError> {
        let mut loader = RegistryLoader::new();
        for provider in providers {
            loader.add(provider.components());
        }
        loader.finish()
    }

    pub fn beans(&self) -> Arc<[Arc<Bean>]> {
        Arc::clone(&self.beans.read())
    }

    pub fn observers(&self) -> Arc<[Arc<Observer>]> {
        Arc::clone(&self.observers.read())
    }

    pub fn clear(&self) {
        *self.beans.write() = Arc::from(Vec::new());
        *self.observers.write() = Arc::from(Vec::new());
    }
}

struct RegistryLoader {
    ids: HashSet<BeanId>,
    beans: Vec<Arc<Bean>>,
    observers: Vec<Arc<Observer>>,
    contexts: Vec<Arc<dyn InjectableContext>>,
    errors: Vec<RegistryError>,
}

impl RegistryLoader {
    fn new() -> Self {
        Self {
            ids: HashSet::new(),
            beans: Vec::new(),
            observers: Vec::new(),
            contexts: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn add(&mut self, components: Components) {
        let (beans, observers, contexts) = components.into_parts();
        for bean in beans {
            if self.ids.insert(bean.id().clone()) {
                self.beans.push(bean);
            } else {
                self.errors.push(RegistryError::BeanDuplicated {
                    id: bean.id().clone(),
                });
            }
        }
        self.observers.extend(observers);
        for context in contexts {
            let scope = context.scope();
            if scope.is_shared() || scope == Scope::Dependent {
                self.errors.push(RegistryError::BuiltInContext { scope });
            } else {
                self.contexts.push(context);
            }
        }
    }

    fn finish(mut self) -> Result<(Registry, Vec<Arc<dyn InjectableContext>>), RegistryError> {
        match self.errors.len() {
            0 => {
                let registry = Registry {
                    beans: RwLock::new(Arc::from(self.beans)),
                    observers: RwLock::new(Arc::from(self.observers)),
                };
                Ok((registry, self.contexts))
            }
            1 => Err(self.errors.remove(0)),
            _ => Err(RegistryError::Aggregated {
                errors: self.errors,
            }),
        }
    }
}

#[derive(Debug, Clone, Snafu)]
#[non_exhaustive]
pub enum RegistryError {
    #[snafu(display("the bean {id} already exists in the registry"))]
    #[non_exhaustive]
    BeanDuplicated { id: BeanId },
    #[snafu(display("could not register a custom context for the built-in {scope} scope"))]
    #[non_exhaustive]
    BuiltInContext { scope: Scope },
    #[snafu(display("aggregated registry errors:\n{}", IndexedDisplayer::new(errors)))]
    Aggregated { errors: Vec<RegistryError> },
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use crate::container::context::{BoundContext, SharedContext};

    use super::*;

    fn bean(id: &'static str) -> Arc<Bean> {
        Bean::builder(id, |_| Ok(Ok::<_, Infallible>(0u8))).build()
    }

    fn observer(id: &'static str) -> Arc<Observer> {
        Observer::builder(id, Type::of::<u8>(), |_| Ok::<_, Infallible>(())).build()
    }

    #[test]
    fn registry_load_succeeds() {
        let mut first = MockComponentsProvider::new();
        first.expect_components().times(1).returning(|| {
            Components::builder()
                .bean(bean("a"))
                .observer(observer("o"))
                .build()
        });
        let second = || {
            Components::builder()
                .bean(bean("b"))
                .context(Arc::new(BoundContext::with_scope(Scope::Custom("Session"))))
                .build()
        };

        let providers: Vec<Arc<dyn ComponentsProvider>> = vec![Arc::new(first), Arc::new(second)];
        let (registry, contexts) = Registry::load(&providers).unwrap();

        assert_eq!(registry.beans().len(), 2);
        assert_eq!(registry.observers().len(), 1);
        assert_eq!(contexts.len(), 1);

        registry.clear();
        assert!(registry.beans().is_empty());
        assert!(registry.observers().is_empty());
    }

    #[test]
    fn registry_load_fails_when_bean_is_duplicated() {
        let components = Components::builder().bean(bean("a")).bean(bean("a")).build();

        let res = Registry::load(&[Arc::new(components) as Arc<dyn ComponentsProvider>]);
        assert!(matches!(res, Err(RegistryError::BeanDuplicated { .. })));
    }

    #[test]
    fn registry_load_fails_with_every_error() {
        let components = Components::builder()
            .bean(bean("a"))
            .bean(bean("a"))
            .context(Arc::new(SharedContext::new(Scope::Application)))
            .build();

        let Err(err) = Registry::load(&[Arc::new(components) as Arc<dyn ComponentsProvider>]) else {
            panic!("loading should fail");
        };
        let RegistryError::Aggregated { errors } = &err else {
            panic!("errors should be aggregated");
        };
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[1], RegistryError::BuiltInContext { .. }));
        assert!(err.to_string().starts_with("aggregated registry errors:\n   1: "));
    }
}
