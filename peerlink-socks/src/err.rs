//! Declare error types for the SOCKS5 client.

use crate::msg::{SocksMethod, SocksReply};
use peerlink_socket::RecvError;
use thiserror::Error;

/// An error from a proxied connection attempt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The destination hostname does not fit the one-byte length field
    /// of a SOCKS5 request.
    #[error("hostname too long")]
    HostnameTooLong,

    /// The destination hostname was empty.
    #[error("hostname must not be empty")]
    EmptyHostname,

    /// A credential field was empty or longer than 255 bytes.
    #[error("proxy username and password must each be 1 to 255 bytes")]
    BadCredentials,

    /// We never got as far as talking SOCKS5: the proxy itself could
    /// not be reached.
    #[error("could not reach the proxy: {0}")]
    ProxyUnreachable(#[from] peerlink_socket::Error),

    /// A send accepted fewer bytes than the whole message.  The
    /// connection is unusable afterwards; we never retry a partial
    /// message.
    #[error("could not send complete message to proxy")]
    ShortWrite,

    /// The proxy answered with a version byte we do not speak.
    #[error("proxy speaks unrecognized protocol version {0}")]
    BadProtocol(u8),

    /// The proxy insisted on an authentication method we cannot use.
    #[error("proxy requested unsupported authentication method {0}")]
    MethodMismatch(SocksMethod),

    /// The proxy rejected our username/password.
    #[error("proxy authentication unsuccessful")]
    AuthFailed,

    /// The proxy reached its side of the conversation but could not
    /// (or would not) connect to the destination.
    #[error("proxy request failed: {0}")]
    RequestFailed(SocksReply),

    /// The reply violated the protocol: bad reserved byte or an
    /// address type that does not exist.
    #[error("malformed proxy reply")]
    MalformedReply,

    /// A negotiation read failed; see the inner error for how.
    #[error("error reading from proxy: {0}")]
    Recv(#[from] RecvError),
}

impl Error {
    /// True if the failure happened before any SOCKS5 bytes were
    /// exchanged, i.e. the proxy itself was down or unreachable.
    ///
    /// Upper layers back off differently on this: an unreachable proxy
    /// affects every destination, a failed negotiation only one.
    pub fn is_proxy_unreachable(&self) -> bool {
        matches!(self, Error::ProxyUnreachable(_))
    }
}

impl From<peerlink_bytes::Error> for Error {
    fn from(_: peerlink_bytes::Error) -> Error {
        // Every fixed-size message we parse is read in full before
        // parsing, so a decode error always means protocol garbage.
        Error::MalformedReply
    }
}
