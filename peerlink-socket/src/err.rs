//! Error types and OS error formatting for the socket layer.

use thiserror::Error;

/// An error from creating or connecting a socket.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The endpoint belongs to a network the OS cannot route to, so it
    /// has no socket-address form.
    #[error("unsupported network")]
    UnsupportedNetwork,

    /// The operation was attempted on a closed handle.
    #[error("invalid socket handle")]
    InvalidHandle,

    /// The OS refused to create or configure the socket.
    #[error("could not create socket: {}", error_string(*.0))]
    CreateFailed(i32),

    /// The new descriptor cannot be used with the readiness primitive.
    #[error("socket descriptor is not selectable")]
    NotSelectable,

    /// The peer did not become reachable within the allotted time.
    #[error("connection timed out")]
    ConnectTimeout,

    /// The connect itself failed, either synchronously or as reported
    /// by `SO_ERROR` after the readiness wait.
    #[error("connection failed: {}", error_string(*.0))]
    ConnectFailed(i32),
}

/// Return the error code of the last failed OS call on this thread.
pub(crate) fn last_error() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Render an OS-level socket error code as `"<message> (<code>)"`.
///
/// Codes the C library does not recognize render as
/// `"Unknown error (<code>)"`.
///
/// # Example
/// ```
/// let msg = peerlink_socket::error_string(libc::ECONNREFUSED);
/// assert!(msg.ends_with(&format!("({})", libc::ECONNREFUSED)));
/// ```
pub fn error_string(err: i32) -> String {
    // The thread-safe strerror variant; the libc crate binds the POSIX
    // version that always writes into the caller's buffer.
    let mut buf = [0 as libc::c_char; 256];
    let rc = unsafe { libc::strerror_r(err, buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return format!("Unknown error ({})", err);
    }
    let msg = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) };
    format!("{} ({})", msg.to_string_lossy(), err)
}
