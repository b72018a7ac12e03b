//! Demonstration pipelines registered at binary startup, standing in for
//! "importing pipeline modules" the way a real deployment's handler crates
//! would. Each submodule owns one handler and one `register` call.

mod echo;
mod flaky;
mod sleeper;

use crate::core::registry::{Registry, RegistryError};

/// Registers every demonstration pipeline. Called once from `main`.
pub fn register_all(registry: &Registry) -> Result<(), RegistryError> {
    registry.register(echo::definition())?;
    registry.register(sleeper::definition())?;
    registry.register(flaky::definition())?;
    Ok(())
}
