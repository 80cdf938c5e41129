//! A SOCKS5 client for dialing peers through a proxy.
//!
//! SOCKS5 is the proxy-connection protocol of [RFC
//! 1928](https://datatracker.ietf.org/doc/html/rfc1928); this crate
//! speaks the client side of it, together with the username/password
//! sub-negotiation of [RFC
//! 1929](https://datatracker.ietf.org/doc/html/rfc1929).  It exists so
//! that the connector can reach destinations the OS cannot route —
//! onion services above all — by handing the *hostname* to the proxy
//! and letting the proxy resolve it.
//!
//! Two properties matter beyond the plain protocol:
//!
//!   * **Stream isolation.**  When asked, [`connect_through_proxy`]
//!     presents a never-before-used username/password pair on each
//!     call.  A Tor proxy keys its circuits on the credential pair, so
//!     every isolated connection travels its own circuit and cannot be
//!     linked to the others.
//!
//!   * **Interruptibility.**  Negotiation reads poll a process-wide
//!     cancel flag, so [`interrupt_socks5`] aborts every in-flight
//!     attempt within about a second, no matter how generous the
//!     per-read deadline is.
//!
//! All I/O happens on the caller's thread over a non-blocking
//! [`Socket`](peerlink_socket::Socket); the caller keeps ownership of
//! the socket whether or not negotiation succeeds.

#![deny(missing_docs)]
#![deny(unreachable_pub)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::cognitive_complexity)]
#![deny(clippy::debug_assert_with_mut_call)]
#![deny(clippy::exhaustive_structs)]
#![deny(clippy::expl_impl_clone_on_copy)]
#![deny(clippy::fallible_impl_from)]
#![deny(clippy::large_stack_arrays)]
#![warn(clippy::manual_ok_or)]
#![deny(clippy::missing_docs_in_private_items)]
#![warn(clippy::option_option)]
#![deny(clippy::ref_option_ref)]
#![warn(clippy::unseparated_literal_suffix)]

mod client;
mod err;
mod msg;

pub use client::{connect_through_proxy, interrupt_socks5, negotiate, SOCKS5_RECV_TIMEOUT};
pub use err::Error;
pub use msg::{ProxyCredentials, SocksAtyp, SocksHostname, SocksMethod, SocksReply};

/// A Result type for the SOCKS5 client.
pub type Result<T> = std::result::Result<T, Error>;
