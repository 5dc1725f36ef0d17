//! A deferred value: a container for a value that becomes available later,
//! with exactly one eventual outcome.
//!
//! A [`Deferred`] is built from a producer function. The producer receives a
//! [`Resolver`] and a [`Rejecter`] and may settle the value right away or hand
//! the handles to whatever will finish the work later (another thread, an I/O
//! callback, ...). Consumers register one success listener with
//! [`Deferred::then`] and one failure listener with [`Deferred::catch`], or
//! poll [`Deferred::is_pending`] and [`Deferred::value`].
//!
//! # Examples
//!
//! ```
//! use deferred::{Deferred, Error};
//!
//! let ok = Deferred::<i32>::resolved(5);
//! assert!(!ok.is_pending());
//! assert_eq!(ok.value(), Some(5));
//!
//! let failed = Deferred::<i32>::rejected(Error::msg("error"));
//! assert!(!failed.is_pending());
//! assert_eq!(failed.value(), None);
//! ```
mod deferred;

pub use deferred::{Deferred, Rejecter, Resolver};

/// The default failure type of a [`Deferred`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Source(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// A failure described only by a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Error::Failed(message.into())
    }
}
