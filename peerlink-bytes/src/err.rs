//! Error type for message decoding.

use thiserror::Error;

/// An error that occurred while decoding a message from bytes.
#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The message ended before the object we were reading was complete.
    #[error("message truncated (or object not fully present)")]
    Truncated,
}
