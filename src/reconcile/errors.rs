use std::error::Error;
use std::fmt;

use crate::locks::LockError;

use super::markers::MarkerError;
use super::registry::RegistryError;

#[derive(Debug)]
pub enum ReconcileError {
    /// Reading the current records failed; nothing was mutated.
    StoreRead(RegistryError),
    /// The commit failed; the applied-version marker was not advanced.
    Persistence(RegistryError),
    Markers(MarkerError),
    Lock(LockError),
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::StoreRead(err) => {
                write!(f, "unable to read ingredient registry: {}", err)
            }
            ReconcileError::Persistence(err) => {
                write!(f, "unable to commit reconciliation: {}", err)
            }
            ReconcileError::Markers(err) => write!(f, "dataset marker error: {}", err),
            ReconcileError::Lock(err) => write!(f, "{}", err),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReconcileError::StoreRead(err) | ReconcileError::Persistence(err) => Some(err),
            ReconcileError::Markers(err) => Some(err),
            ReconcileError::Lock(err) => Some(err),
        }
    }
}

impl From<MarkerError> for ReconcileError {
    fn from(value: MarkerError) -> Self {
        ReconcileError::Markers(value)
    }
}

impl From<LockError> for ReconcileError {
    fn from(value: LockError) -> Self {
        ReconcileError::Lock(value)
    }
}
