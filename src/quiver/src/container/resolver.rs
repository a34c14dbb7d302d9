//! Typesafe resolution of contracts to beans.

use std::sync::Arc;

use tracing::trace;

use crate::bean::Bean;
use crate::container::registry::Registry;
use crate::qualifier::{Qualifier, QualifierSet};
use crate::types::assignability::{AssignabilityRules, BeanTypeRules};
use crate::types::Type;
use crate::util::cache::ComputingCache;

/// A requested contract: a type and the qualifiers a bean must carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resolvable {
    required: Type,
    qualifiers: QualifierSet,
}

impl Resolvable {
    /// Creates a request. No qualifiers means `@Default`.
    pub fn new<I>(required: Type, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = Qualifier>,
    {
        Self {
            required,
            qualifiers: QualifierSet::required(qualifiers),
        }
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(Type::of::<T>(), std::iter::empty())
    }

    pub fn required(&self) -> &Type {
        &self.required
    }

    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    pub fn matches(&self, bean: &Bean) -> bool {
        BeanTypeRules.matches(&self.required, bean.types())
            && bean.qualifiers().is_superset(&self.qualifiers)
    }
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Unsatisfied,
    Resolved(Arc<Bean>),
    /// Several beans remain after ambiguity resolution. Holds every matching
    /// bean.
    Ambiguous(Arc<[Arc<Bean>]>),
}

/// Resolves requests against the registry, memoizing the results.
pub struct TypesafeResolver {
    matching: ComputingCache<Resolvable, Arc<[Arc<Bean>]>>,
    resolved: ComputingCache<Resolvable, Resolution>,
    named: ComputingCache<Arc<str>, Resolution>,
}

impl TypesafeResolver {
    pub fn new() -> Self {
        Self {
            matching: ComputingCache::new(),
            resolved: ComputingCache::new(),
            named: ComputingCache::new(),
        }
    }

    /// Returns every bean matching `resolvable`, in registration order.
    pub fn matching(&self, registry: &Registry, resolvable: &Resolvable) -> Arc<[Arc<Bean>]> {
        self.matching.get_or_compute(resolvable, |resolvable| {
            trace!(
                required = %resolvable.required(),
                qualifiers = %resolvable.qualifiers(),
                "computing matching beans",
            );
            registry
                .beans()
                .iter()
                .filter(|bean| resolvable.matches(bean))
                .cloned()
                .collect()
        })
    }

    pub fn resolve(&self, registry: &Registry, resolvable: &Resolvable) -> Resolution {
        self.resolved.get_or_compute(resolvable, |resolvable| {
            resolve_ambiguity(&self.matching(registry, resolvable))
        })
    }

    /// Resolves the bean with the given name.
    pub fn resolve_named(&self, registry: &Registry, name: &str) -> Resolution {
        self.named.get_or_compute(&Arc::from(name), |name| {
            trace!(name = %name, "computing beans with a name");
            let matching = registry
                .beans()
                .iter()
                .filter(|bean| bean.name() == Some(&**name))
                .cloned()
                .collect::<Arc<[_]>>();
            resolve_ambiguity(&matching)
        })
    }

    pub fn clear(&self) {
        self.matching.clear();
        self.resolved.clear();
        self.named.clear();
    }
}

/// Picks one bean out of `beans`.
///
/// Default beans are dropped first. If several beans remain, only
/// alternatives are kept, and among them only those with the highest
/// priority.
pub fn resolve_ambiguity(beans: &Arc<[Arc<Bean>]>) -> Resolution {
    match beans.len() {
        0 => return Resolution::Unsatisfied,
        1 => return Resolution::Resolved(Arc::clone(&beans[0])),
        _ => {}
    }

    let mut resolved = beans
        .iter()
        .filter(|bean| !bean.is_default_bean())
        .collect::<Vec<_>>();
    if let [bean] = resolved.as_slice() {
        return Resolution::Resolved(Arc::clone(bean));
    }

    resolved.retain(|bean| bean.is_alternative());
    if let [bean] = resolved.as_slice() {
        return Resolution::Resolved(Arc::clone(bean));
    }

    if let Some(highest) = resolved
        .iter()
        .filter_map(|bean| bean.effective_alternative_priority())
        .max()
    {
        resolved.retain(|bean| bean.effective_alternative_priority() == Some(highest));
        if let [bean] = resolved.as_slice() {
            return Resolution::Resolved(Arc::clone(bean));
        }
    }

    Resolution::Ambiguous(Arc::clone(beans))
}
