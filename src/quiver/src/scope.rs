use std::fmt::{Display, Formatter, Result as FmtResult};

/// Specifies how long a managed object lives and who owns it.
///
/// Objects of a *normal* scope are stored in a context and shared by every
/// consumer while the context is active. A [`Scope::Dependent`] object is
/// created for each consumer and owned by the creational context of whatever
/// requested it, so its destruction follows its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// Created once and kept for the whole container lifetime. Destroyed
    /// last during shutdown.
    Singleton,
    /// Created once and kept for the whole container lifetime.
    Application,
    /// Bound to the thread on which the request context is active.
    Request,
    Dependent,
    /// A scope served by a context contributed by a component provider.
    Custom(&'static str),
}

impl Scope {
    /// Returns true if instances of this scope are stored in a context.
    pub fn is_normal(self) -> bool {
        !matches!(self, Self::Dependent)
    }

    /// Returns true if instances of this scope are shared across threads for
    /// the whole container lifetime.
    pub fn is_shared(self) -> bool {
        matches!(self, Self::Singleton | Self::Application)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Singleton => "Singleton",
            Self::Application => "Application",
            Self::Request => "Request",
            Self::Dependent => "Dependent",
            Self::Custom(name) => name,
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_kind_succeeds() {
        assert!(Scope::Singleton.is_shared());
        assert!(Scope::Application.is_shared());
        assert!(!Scope::Request.is_shared());
        assert!(Scope::Request.is_normal());
        assert!(Scope::Custom("Session").is_normal());
        assert!(!Scope::Dependent.is_normal());
        assert_eq!(Scope::Custom("Session").to_string(), "Session");
    }
}
