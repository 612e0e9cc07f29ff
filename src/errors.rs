// src/errors.rs

use thiserror::Error;

/// Construction-time faults. These are programmer errors surfaced eagerly
/// as `Result`s; runtime dispatch outcomes are reported through
/// [`crate::models::ExecutionCode`] instead.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("an adapter is already set for this registry")]
    AdapterAlreadySet,

    #[error("cannot register commands without an initialized adapter")]
    AdapterMissing,

    #[error("command definitions require a non-empty label")]
    EmptyLabel,

    #[error("a parameter type for `{0}` is already registered")]
    DuplicateParameterType(&'static str),
}
