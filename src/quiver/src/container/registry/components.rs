use std::sync::Arc;

use crate::bean::Bean;
use crate::container::context::InjectableContext;
use crate::observer::Observer;

/// The beans, observers and custom contexts contributed by one provider.
#[derive(Clone, Default)]
pub struct Components {
    beans: Vec<Arc<Bean>>,
    observers: Vec<Arc<Observer>>,
    contexts: Vec<Arc<dyn InjectableContext>>,
}

impl Components {
    pub fn builder() -> ComponentsBuilder {
        ComponentsBuilder {
            components: Components::default(),
        }
    }

    pub fn beans(&self) -> &[Arc<Bean>] {
        &self.beans
    }

    pub fn observers(&self) -> &[Arc<Observer>] {
        &self.observers
    }

    pub fn contexts(&self) -> &[Arc<dyn InjectableContext>] {
        &self.contexts
    }

    pub(super) fn into_parts(
        self,
    ) -> (
        Vec<Arc<Bean>>,
        Vec<Arc<Observer>>,
        Vec<Arc<dyn InjectableContext>>,
    ) {
        (self.beans, self.observers, self.contexts)
    }
}

pub struct ComponentsBuilder {
    components: Components,
}

impl ComponentsBuilder {
    pub fn bean(mut self, bean: Arc<Bean>) -> Self {
        self.components.beans.push(bean);
        self
    }

    pub fn beans<I>(mut self, beans: I) -> Self
    where
        I: IntoIterator<Item = Arc<Bean>>,
    {
        self.components.beans.extend(beans);
        self
    }

    pub fn observer(mut self, observer: Arc<Observer>) -> Self {
        self.components.observers.push(observer);
        self
    }

    /// Contributes a context serving a custom scope.
    pub fn context(mut self, context: Arc<dyn InjectableContext>) -> Self {
        self.components.contexts.push(context);
        self
    }

    pub fn build(self) -> Components {
        self.components
    }
}
