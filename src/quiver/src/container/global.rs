//! The process-wide container.

use parking_lot::Mutex;

use crate::container::handle::{Container, ContainerBuilder};
use crate::container::ContainerError;

static CURRENT: Mutex<Option<Container>> = parking_lot::const_mutex(None);

/// Starts the process-wide container.
///
/// If a running container is already installed, it is returned and
/// `builder` is discarded.
pub fn initialize(builder: ContainerBuilder) -> Result<Container, ContainerError> {
    if let Some(current) = container() {
        return Ok(current);
    }

    // Observers of the initialization event may look up the current
    // container, so the slot is not locked while the container starts.
    let started = builder.build()?;
    let mut current = CURRENT.lock();
    let installed = current
        .as_ref()
        .filter(|container| container.is_running())
        .cloned();
    if let Some(installed) = installed {
        drop(current);
        started.shutdown()?;
        return Ok(installed);
    }
    *current = Some(started.clone());
    Ok(started)
}

/// Returns the process-wide container, if one is running.
pub fn container() -> Option<Container> {
    CURRENT
        .lock()
        .as_ref()
        .filter(|container| container.is_running())
        .cloned()
}

/// Stops and uninstalls the process-wide container. Does nothing if there
/// is none.
pub fn shutdown() -> Result<(), ContainerError> {
    let current = CURRENT.lock().take();
    match current {
        Some(container) => container.shutdown(),
        None => Ok(()),
    }
}
