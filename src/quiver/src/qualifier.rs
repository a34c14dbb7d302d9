use std::borrow::Cow;
use std::collections::btree_set::{self, BTreeSet};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::scope::Scope;

/// A tag that narrows which components satisfy a request.
///
/// Two qualifiers are equal when both their names and their values match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Qualifier {
    name: Cow<'static, str>,
    value: Option<Cow<'static, str>>,
}

impl Qualifier {
    /// Carried by components that declare no other qualifier.
    pub const DEFAULT: Qualifier = Qualifier::marker("Default");
    /// Carried by every component and every fired event.
    pub const ANY: Qualifier = Qualifier::marker("Any");

    pub const NAMED: &'static str = "Named";
    pub const INITIALIZED: &'static str = "Initialized";
    pub const BEFORE_DESTROYED: &'static str = "BeforeDestroyed";
    pub const DESTROYED: &'static str = "Destroyed";

    const fn marker(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            value: None,
        }
    }

    pub fn new<N>(name: N) -> Self
    where
        N: Into<Cow<'static, str>>,
    {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value<N, V>(name: N, value: V) -> Self
    where
        N: Into<Cow<'static, str>>,
        V: Into<Cow<'static, str>>,
    {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn named<V>(value: V) -> Self
    where
        V: Into<Cow<'static, str>>,
    {
        Self::with_value(Self::NAMED, value)
    }

    pub fn initialized(scope: Scope) -> Self {
        Self::with_value(Self::INITIALIZED, scope.to_str())
    }

    pub fn before_destroyed(scope: Scope) -> Self {
        Self::with_value(Self::BEFORE_DESTROYED, scope.to_str())
    }

    pub fn destroyed(scope: Scope) -> Self {
        Self::with_value(Self::DESTROYED, scope.to_str())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_named(&self) -> bool {
        self.name == Self::NAMED
    }
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.value {
            Some(value) => write!(f, "@{}({})", self.name, value),
            None => write!(f, "@{}", self.name),
        }
    }
}

/// An order-insensitive set of qualifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifierSet(BTreeSet<Qualifier>);

impl QualifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes the qualifiers declared by a component.
    ///
    /// `Any` is always present and `Default` is added when nothing besides
    /// `Any` and `Named` was declared.
    pub fn normalized<I>(declared: I) -> Self
    where
        I: IntoIterator<Item = Qualifier>,
    {
        let mut set: Self = declared.into_iter().collect();
        if set
            .iter()
            .all(|qualifier| *qualifier == Qualifier::ANY || qualifier.is_named())
        {
            set.insert(Qualifier::DEFAULT);
        }
        set.insert(Qualifier::ANY);
        set
    }

    /// Qualifiers of a lookup: an empty request means `{Default}`.
    pub fn required<I>(requested: I) -> Self
    where
        I: IntoIterator<Item = Qualifier>,
    {
        let mut set: Self = requested.into_iter().collect();
        if set.is_empty() {
            set.insert(Qualifier::DEFAULT);
        }
        set
    }

    pub fn insert(&mut self, qualifier: Qualifier) -> bool {
        self.0.insert(qualifier)
    }

    pub fn contains(&self, qualifier: &Qualifier) -> bool {
        self.0.contains(qualifier)
    }

    pub fn is_subset(&self, other: &QualifierSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn is_superset(&self, other: &QualifierSet) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Qualifier> {
        self.0.iter()
    }

    /// Returns the value of the `Named` qualifier if present.
    pub fn name(&self) -> Option<&str> {
        self.iter()
            .find(|qualifier| qualifier.is_named())
            .and_then(Qualifier::value)
    }

    pub fn union(&self, other: &QualifierSet) -> QualifierSet {
        self.0.union(&other.0).cloned().collect()
    }
}

impl FromIterator<Qualifier> for QualifierSet {
    fn from_iter<I: IntoIterator<Item = Qualifier>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Qualifier; N]> for QualifierSet {
    fn from(qualifiers: [Qualifier; N]) -> Self {
        qualifiers.into_iter().collect()
    }
}

impl Extend<Qualifier> for QualifierSet {
    fn extend<I: IntoIterator<Item = Qualifier>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<'a> IntoIterator for &'a QualifierSet {
    type Item = &'a Qualifier;
    type IntoIter = btree_set::Iter<'a, Qualifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for QualifierSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{{")?;
        for (i, qualifier) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{qualifier}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifier_set_normalized_succeeds() {
        let set = QualifierSet::normalized([]);
        assert_eq!(set, QualifierSet::from([Qualifier::ANY, Qualifier::DEFAULT]));

        let set = QualifierSet::normalized([Qualifier::named("cache")]);
        assert!(set.contains(&Qualifier::DEFAULT));
        assert_eq!(set.name(), Some("cache"));

        let red = Qualifier::new("Red");
        let set = QualifierSet::normalized([red.clone()]);
        assert_eq!(set, QualifierSet::from([Qualifier::ANY, red]));
    }

    #[test]
    fn qualifier_set_required_succeeds() {
        assert_eq!(
            QualifierSet::required([]),
            QualifierSet::from([Qualifier::DEFAULT])
        );

        let red = Qualifier::new("Red");
        assert_eq!(
            QualifierSet::required([red.clone()]),
            QualifierSet::from([red])
        );
    }

    #[test]
    fn qualifier_set_is_subset_succeeds() {
        let red = Qualifier::new("Red");
        let large = Qualifier::with_value("Size", "large");
        let event = QualifierSet::from([red.clone(), large.clone(), Qualifier::ANY]);

        assert!(QualifierSet::from([red.clone()]).is_subset(&event));
        assert!(QualifierSet::from([red, large]).is_subset(&event));
        assert!(!QualifierSet::from([Qualifier::new("Blue")]).is_subset(&event));
        assert!(!QualifierSet::from([Qualifier::with_value("Size", "small")]).is_subset(&event));
    }

    #[test]
    fn qualifier_display_succeeds() {
        assert_eq!(Qualifier::named("x").to_string(), "@Named(x)");
        assert_eq!(
            QualifierSet::from([Qualifier::DEFAULT, Qualifier::ANY]).to_string(),
            "{@Any, @Default}"
        );
    }
}
