//! error
//!
//! Failure signals raised by genealogy operations.
//!
//! Every fallible operation either fully succeeds or fails with one of these
//! and no observable state change. The enum is generic over the identifier
//! type so callers get the offending key back typed.

use std::fmt::Debug;

use thiserror::Error;

/// Errors from genealogy operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenealogyError<Id: Debug> {
    /// An operation referenced an identifier absent from the registry.
    #[error("strain not found: {0:?}")]
    NotFound(Id),

    /// Creation requested for an identifier that is already registered.
    #[error("strain already registered: {0:?}")]
    AlreadyRegistered(Id),

    /// Removal attempted on the stem strain.
    #[error("the stem strain cannot be removed: {0:?}")]
    StemRemoval(Id),
}
