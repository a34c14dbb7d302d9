//! The type model used for bean contracts and event types.
//!
//! Rust has no runtime reflection over generic parameters or subtyping, so
//! every component describes its types explicitly with [`Class`] and
//! [`Type`]. A [`Class`] is identified by its raw identity only; its declared
//! type parameters and supertypes drive the type closure computed in
//! [`hierarchy`] and the matching rules in [`assignability`].

pub mod assignability;
pub mod hierarchy;

use std::any::{self, TypeId};
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::container::Managed;

/// The raw identity of a [`Class`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawId {
    Rust(TypeId),
    Named(&'static str),
}

/// A raw class together with its declared type parameters and supertypes.
///
/// Supertypes may reference the class's own type parameters through
/// [`Type::variable`]; they are substituted when a parameterization of the
/// class is walked.
#[derive(Clone)]
pub struct Class {
    inner: Arc<ClassInner>,
}

#[derive(Clone)]
struct ClassInner {
    id: RawId,
    name: Cow<'static, str>,
    params: Vec<&'static str>,
    supertypes: Vec<Type>,
}

impl Class {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::with_id(
            RawId::Rust(TypeId::of::<T>()),
            Cow::Borrowed(any::type_name::<T>()),
        )
    }

    pub fn named(name: &'static str) -> Self {
        Self::with_id(RawId::Named(name), Cow::Borrowed(name))
    }

    fn with_id(id: RawId, name: Cow<'static, str>) -> Self {
        Self {
            inner: Arc::new(ClassInner {
                id,
                name,
                params: Vec::new(),
                supertypes: Vec::new(),
            }),
        }
    }

    pub fn with_params<I>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        Arc::make_mut(&mut self.inner).params = params.into_iter().collect();
        self
    }

    pub fn extends<T: Into<Type>>(mut self, supertype: T) -> Self {
        Arc::make_mut(&mut self.inner)
            .supertypes
            .push(supertype.into());
        self
    }

    pub fn parameterized<I>(&self, args: I) -> Type
    where
        I: IntoIterator<Item = Type>,
    {
        Type::parameterized(self.clone(), args)
    }

    pub fn id(&self) -> RawId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn params(&self) -> &[&'static str] {
        &self.inner.params
    }

    pub fn supertypes(&self) -> &[Type] {
        &self.inner.supertypes
    }

    pub fn is_generic(&self) -> bool {
        !self.inner.params.is_empty()
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl Debug for Class {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Class({})", self.name())
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Class(Class),
    Parameterized { class: Class, args: Vec<Type> },
    /// A wildcard argument. Empty `upper` means unbounded above.
    Wildcard { upper: Vec<Type>, lower: Vec<Type> },
    /// A type variable. Empty `bounds` means unbounded.
    Variable {
        name: &'static str,
        bounds: Vec<Type>,
    },
}

impl Type {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Class(Class::of::<T>())
    }

    pub fn parameterized<I>(class: Class, args: I) -> Self
    where
        I: IntoIterator<Item = Type>,
    {
        Self::Parameterized {
            class,
            args: args.into_iter().collect(),
        }
    }

    pub fn wildcard() -> Self {
        Self::Wildcard {
            upper: Vec::new(),
            lower: Vec::new(),
        }
    }

    pub fn extends<T: Into<Type>>(upper: T) -> Self {
        Self::Wildcard {
            upper: vec![upper.into()],
            lower: Vec::new(),
        }
    }

    pub fn super_of<T: Into<Type>>(lower: T) -> Self {
        Self::Wildcard {
            upper: Vec::new(),
            lower: vec![lower.into()],
        }
    }

    pub fn variable(name: &'static str) -> Self {
        Self::Variable {
            name,
            bounds: Vec::new(),
        }
    }

    pub fn bounded_variable<I>(name: &'static str, bounds: I) -> Self
    where
        I: IntoIterator<Item = Type>,
    {
        Self::Variable {
            name,
            bounds: bounds.into_iter().collect(),
        }
    }

    /// Returns the raw class of a class or parameterized type.
    pub fn raw_class(&self) -> Option<&Class> {
        match self {
            Self::Class(class) | Self::Parameterized { class, .. } => Some(class),
            Self::Wildcard { .. } | Self::Variable { .. } => None,
        }
    }

    pub fn is_unbounded_variable(&self) -> bool {
        matches!(self, Self::Variable { bounds, .. } if bounds.is_empty())
    }
}

impl From<Class> for Type {
    fn from(class: Class) -> Self {
        Self::Class(class)
    }
}

impl From<&Class> for Type {
    fn from(class: &Class) -> Self {
        Self::Class(class.clone())
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Class(class) => write!(f, "{class}"),
            Self::Parameterized { class, args } => {
                write!(f, "{class}<")?;
                write_joined(f, args, ", ")?;
                write!(f, ">")
            }
            Self::Wildcard { upper, lower } => {
                write!(f, "?")?;
                if !upper.is_empty() {
                    write!(f, " extends ")?;
                    write_joined(f, upper, " & ")?;
                }
                if !lower.is_empty() {
                    write!(f, " super ")?;
                    write_joined(f, lower, " & ")?;
                }
                Ok(())
            }
            Self::Variable { name, bounds } => {
                write!(f, "{name}")?;
                if !bounds.is_empty() {
                    write!(f, " extends ")?;
                    write_joined(f, bounds, " & ")?;
                }
                Ok(())
            }
        }
    }
}

fn write_joined(f: &mut Formatter<'_>, types: &[Type], sep: &str) -> FmtResult {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{ty}")?;
    }
    Ok(())
}

/// A managed object that knows its own runtime [`Type`].
///
/// Event payloads implement this so that observers of supertypes can be
/// matched.
pub trait Typed: Managed {
    fn runtime_type(&self) -> Type;
}
