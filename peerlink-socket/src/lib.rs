//! Non-blocking socket primitives for outbound peer connections.
//!
//! This crate is the descriptor-level layer of the peerlink connector.
//! It knows how to open a stream socket to an [`Endpoint`], connect it
//! within a caller-supplied timeout, and read an exact number of bytes
//! from it while honoring both a deadline and a cooperative cancel
//! flag.  The SOCKS5 negotiation in `peerlink-socks` is built entirely
//! on these primitives.
//!
//! Every [`Socket`] handed to a caller is non-blocking, selectable
//! with the configured readiness primitive, and has `TCP_NODELAY` set.
//! Writes never raise `SIGPIPE`.
//!
//! # Compile-time features
//!
//! `poll` (default): use `poll(2)` to wait for readiness.  When
//! disabled, `select(2)` is used instead, and sockets whose descriptor
//! does not fit in an `fd_set` are rejected at creation time.

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
#![warn(clippy::trait_duplication_in_bounds)]
#![warn(clippy::unseparated_literal_suffix)]

mod addr;
mod err;
mod recv;
mod sock;

pub use addr::{Endpoint, Network};
pub use err::{error_string, Error};
pub use recv::RecvError;
pub use sock::{millis_to_timeval, Socket};

/// A Result type for the socket layer.
pub type Result<T> = std::result::Result<T, Error>;
