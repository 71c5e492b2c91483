//! The unified error handling system for the relay.

use std::fmt::Display;

// 1. Core Types
pub use link::LinkError;
pub use types::RelayError;

/// A unified `Result` type for process-level operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type for a single account-linking transaction.
pub type LinkResult<T> = std::result::Result<T, LinkError>;

// 3. Module declarations
pub mod link;
pub mod types;

// 4. Context Trait for adding context to errors.
pub trait Context<T, E> {
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display;

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<RelayError>,
{
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display,
    {
        self.with_context(|| context)
    }

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(RelayError::Context {
                context: context().to_string(),
                source: Box::new(error.into()),
            }),
        }
    }
}

#[cfg(test)]
mod tests;
