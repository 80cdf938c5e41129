//! Network taxonomy and endpoint addresses for outbound connections.

use crate::err::Error;
use std::fmt;
use std::mem;
use std::net::SocketAddr;

/// The network a peer address belongs to.
///
/// Only [`Ipv4`](Network::Ipv4) and [`Ipv6`](Network::Ipv6) endpoints
/// can be dialed directly; everything else has to go through a proxy
/// that resolves the destination itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Network {
    /// IPv4.
    Ipv4,
    /// IPv6.
    Ipv6,
    /// An onion service.  The OS cannot route these; they are reached
    /// by handing the hostname to a SOCKS5 proxy such as Tor.
    Onion,
    /// Any network we have no way to reach at all.
    Unroutable,
}

impl Network {
    /// Return the configuration-file name of this network.
    pub fn name(self) -> &'static str {
        match self {
            Network::Ipv4 => "ipv4",
            Network::Ipv6 => "ipv6",
            Network::Onion => "onion",
            Network::Unroutable => "unroutable",
        }
    }

    /// Parse a network name as used in configuration.
    ///
    /// Matching is case-insensitive, and `"tor"` is accepted as an
    /// alias for the onion network.  Anything unrecognized maps to
    /// [`Network::Unroutable`] rather than failing, so that a stale
    /// configuration never selects a network by accident.
    pub fn from_name(name: &str) -> Network {
        match name.to_ascii_lowercase().as_str() {
            "ipv4" => Network::Ipv4,
            "ipv6" => Network::Ipv6,
            "onion" | "tor" => Network::Onion,
            _ => Network::Unroutable,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The address of a peer we may try to connect to.
///
/// An endpoint is either a routable socket address, or a placeholder
/// for a peer on a network the OS cannot route (see
/// [`Network::Onion`]); the latter has no socket-address form and can
/// never be dialed directly.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Endpoint {
    /// A peer with an address the operating system can route to.
    Ip(SocketAddr),
    /// A peer that only a proxy can reach.
    Unroutable,
}

impl Endpoint {
    /// Return the network this endpoint belongs to.
    pub fn network(&self) -> Network {
        match self {
            Endpoint::Ip(SocketAddr::V4(_)) => Network::Ipv4,
            Endpoint::Ip(SocketAddr::V6(_)) => Network::Ipv6,
            Endpoint::Unroutable => Network::Unroutable,
        }
    }

    /// Serialize this endpoint into the OS socket-address form.
    ///
    /// Fails with [`Error::UnsupportedNetwork`] if the endpoint has no
    /// such form.
    pub(crate) fn to_sockaddr(&self) -> Result<RawSockaddr, Error> {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        match self {
            Endpoint::Ip(SocketAddr::V4(sa)) => {
                let sin = &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr_in;
                unsafe {
                    (*sin).sin_family = libc::AF_INET as libc::sa_family_t;
                    (*sin).sin_port = sa.port().to_be();
                    (*sin).sin_addr = libc::in_addr {
                        s_addr: u32::from(*sa.ip()).to_be(),
                    };
                }
                Ok(RawSockaddr {
                    storage,
                    len: mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                })
            }
            Endpoint::Ip(SocketAddr::V6(sa)) => {
                let sin6 = &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr_in6;
                unsafe {
                    (*sin6).sin6_family = libc::AF_INET6 as libc::sa_family_t;
                    (*sin6).sin6_port = sa.port().to_be();
                    (*sin6).sin6_addr.s6_addr = sa.ip().octets();
                    (*sin6).sin6_scope_id = sa.scope_id();
                }
                Ok(RawSockaddr {
                    storage,
                    len: mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
                })
            }
            Endpoint::Unroutable => Err(Error::UnsupportedNetwork),
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Endpoint {
        Endpoint::Ip(addr)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Ip(addr) => write!(f, "{}", addr),
            Endpoint::Unroutable => write!(f, "unroutable"),
        }
    }
}

/// An endpoint serialized for the OS: a `sockaddr_storage` plus the
/// length of the part that is actually in use.
pub(crate) struct RawSockaddr {
    /// The filled-in address bytes.
    pub(crate) storage: libc::sockaddr_storage,
    /// Number of meaningful bytes in `storage`.
    pub(crate) len: libc::socklen_t,
}

impl RawSockaddr {
    /// The address family, as passed to `socket(2)`.
    pub(crate) fn family(&self) -> libc::c_int {
        libc::c_int::from(self.storage.ss_family)
    }

    /// A pointer suitable for `connect(2)`.
    pub(crate) fn as_ptr(&self) -> *const libc::sockaddr {
        &self.storage as *const libc::sockaddr_storage as *const libc::sockaddr
    }
}
