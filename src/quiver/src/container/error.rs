use std::borrow::Cow;
use std::error::Error;
use std::sync::Arc;

use snafu::prelude::*;

use crate::bean::BeanId;
use crate::container::registry::RegistryError;
use crate::observer::ObserverId;
use crate::qualifier::QualifierSet;
use crate::scope::Scope;
use crate::types::Type;
use crate::util::display::{IndexedDisplayer, ListDisplayer};

#[derive(Debug, Clone, Snafu)]
#[non_exhaustive]
pub enum ContainerError {
    #[snafu(display("the container is not running"))]
    #[non_exhaustive]
    NotRunning {},
    #[snafu(display("no active context for the {scope} scope"))]
    #[non_exhaustive]
    NotActive { scope: Scope },
    #[snafu(display(
        "ambiguous dependency {required} with qualifiers {qualifiers}, candidates are {}",
        ListDisplayer::new(candidates)
    ))]
    #[non_exhaustive]
    Ambiguous {
        required: Type,
        qualifiers: QualifierSet,
        candidates: Vec<BeanId>,
    },
    #[snafu(display("unsatisfied dependency {required} with qualifiers {qualifiers}"))]
    #[non_exhaustive]
    Unsatisfied {
        required: Type,
        qualifiers: QualifierSet,
    },
    #[snafu(display("failed to destroy some instances:\n{}", IndexedDisplayer::new(errors)))]
    #[non_exhaustive]
    DestructionFailure { errors: Vec<ContainerError> },
    #[snafu(display("illegal argument: {reason}"))]
    #[non_exhaustive]
    IllegalArgument { reason: Cow<'static, str> },
    #[snafu(display("could not construct the bean {bean} which depends on itself somehow"))]
    #[non_exhaustive]
    CyclicDependency { bean: BeanId },
    #[snafu(display("could not construct the bean {bean}"))]
    #[non_exhaustive]
    ObjectConstruction {
        bean: BeanId,
        source: Arc<dyn Error + Send + Sync>,
    },
    #[snafu(display("could not destroy an instance of the bean {bean}"))]
    #[non_exhaustive]
    ObjectDestruction {
        bean: BeanId,
        source: Arc<dyn Error + Send + Sync>,
    },
    #[snafu(display("observer {observer} failed to handle the event"))]
    #[non_exhaustive]
    ObserverNotification {
        observer: ObserverId,
        source: Arc<dyn Error + Send + Sync>,
    },
    #[snafu(display("could not load the components"))]
    #[non_exhaustive]
    Registration { source: RegistryError },
}

impl ContainerError {
    pub(crate) fn illegal_argument<R>(reason: R) -> Self
    where
        R: Into<Cow<'static, str>>,
    {
        Self::IllegalArgument {
            reason: reason.into(),
        }
    }

    /// Folds the failures of a destruction sweep into a single result.
    pub(crate) fn aggregate(errors: Vec<ContainerError>) -> Result<(), ContainerError> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::DestructionFailure { errors })
        }
    }
}
