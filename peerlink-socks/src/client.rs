//! Driving a SOCKS5 negotiation over a connected socket.

use crate::err::Error;
use crate::msg::{
    self, ProxyCredentials, SocksAtyp, SocksHostname, SocksMethod, SocksReply,
};
use crate::Result;

use log::{debug, warn};
use peerlink_socket::{Endpoint, RecvError, Socket};
use std::convert::TryFrom;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// Deadline for each read during negotiation.
///
/// This needs to be generous: a very slow proxy such as Tor may take
/// many seconds to answer a CONNECT for a far-away destination.
pub const SOCKS5_RECV_TIMEOUT: Duration = Duration::from_secs(20);

/// The process-wide cancel flag sampled by every negotiation read.
static INTERRUPT: AtomicBool = AtomicBool::new(false);

/// Source of never-repeating stream-isolation credentials.
static ISOLATION_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Ask every in-flight SOCKS5 negotiation to abort.
///
/// Setting the flag makes each outstanding negotiation read return
/// [`RecvError::Interrupted`](peerlink_socket::RecvError::Interrupted)
/// within about a second.  Passing `false` re-arms the facility for
/// later calls; attempts that already observed the flag stay aborted.
pub fn interrupt_socks5(interrupt: bool) {
    INTERRUPT.store(interrupt, Ordering::SeqCst);
}

/// Fresh credentials that no previous connection of this process has
/// presented.
///
/// A Tor proxy keys its circuits on the credential pair, so handing
/// each connection a distinct pair routes it over its own circuit.
fn isolation_credentials() -> ProxyCredentials {
    let id = ISOLATION_COUNTER.fetch_add(1, Ordering::SeqCst);
    ProxyCredentials::from_isolation_tag(id.to_string().into_bytes())
}

/// Connect to `host:port` by way of the SOCKS5 proxy at `proxy`.
///
/// `sock` must be fresh and unconnected; `timeout` bounds the TCP
/// connect to the proxy itself (negotiation reads use
/// [`SOCKS5_RECV_TIMEOUT`]).  With `randomize_credentials` the
/// negotiation authenticates with a one-time username/password pair so
/// that the proxy gives this connection an isolated upstream stream.
///
/// On success the socket carries a ready byte stream to the
/// destination.  On failure the caller keeps the socket and decides
/// when to close it; [`Error::is_proxy_unreachable`] tells connection
/// management whether the proxy itself was the problem.
pub fn connect_through_proxy(
    proxy: &Endpoint,
    host: &str,
    port: u16,
    sock: &Socket,
    timeout: Duration,
    randomize_credentials: bool,
) -> Result<()> {
    // First reach the proxy; only then is there anyone to talk to.
    sock.connect_direct(proxy, timeout, true)?;

    let host = SocksHostname::try_from(host)?;
    if randomize_credentials {
        negotiate(sock, &host, port, Some(&isolation_credentials()))
    } else {
        negotiate(sock, &host, port, None)
    }
}

/// Run the SOCKS5 dialog on a socket already connected to a proxy.
///
/// On success the proxy has connected to `host:port` and the socket is
/// ready for traffic.  The socket is never closed here, success or
/// failure.
pub fn negotiate(
    sock: &Socket,
    host: &SocksHostname,
    port: u16,
    auth: Option<&ProxyCredentials>,
) -> Result<()> {
    debug!(target: "net", "SOCKS5 connecting {}", host);

    send_message(sock, &msg::build_greeting(auth.is_some()))?;

    let mut selection = [0_u8; 2];
    sock.recv_exact(&mut selection, SOCKS5_RECV_TIMEOUT, &INTERRUPT)
        .map_err(|e| loud_recv(host, port, "method selection", e))?;
    let method = msg::parse_method_selection(selection).map_err(loud)?;

    match (method, auth) {
        (SocksMethod::USERNAME_PASSWORD, Some(auth)) => {
            send_message(sock, &msg::build_auth(auth))?;
            debug!(
                target: "proxy",
                "SOCKS5 sending proxy authentication {}:{}",
                String::from_utf8_lossy(auth.username()),
                String::from_utf8_lossy(auth.password())
            );
            let mut status = [0_u8; 2];
            sock.recv_exact(&mut status, SOCKS5_RECV_TIMEOUT, &INTERRUPT)
                .map_err(|e| loud_recv(host, port, "authentication response", e))?;
            msg::parse_auth_reply(status).map_err(loud)?;
        }
        (SocksMethod::NO_AUTHENTICATION, _) => {
            // Nothing more to prove.
        }
        _ => return Err(loud(Error::MethodMismatch(method))),
    }

    send_message(sock, &msg::build_connect(host, port))?;

    let mut head = [0_u8; 4];
    if let Err(err) = sock.recv_exact(&mut head, SOCKS5_RECV_TIMEOUT, &INTERRUPT) {
        return Err(if err == RecvError::Timeout {
            // Timing out here means the proxy could not reach the
            // destination in time.  Routine when dialing unresponsive
            // onion services, so keep it off the operator's console.
            debug!(
                target: "net",
                "SOCKS5 connect to {}:{}: proxy reply timed out", host, port
            );
            Error::Recv(err)
        } else {
            loud_recv(host, port, "proxy response", err)
        });
    }
    let head = msg::parse_reply_head(head).map_err(loud)?;
    if head.reply != SocksReply::SUCCEEDED {
        // The destination was the problem, not the protocol.
        warn!("SOCKS5 connect to {}:{} failed: {}", host, port, head.reply);
        return Err(Error::RequestFailed(head.reply));
    }
    if head.reserved != 0x00 {
        return Err(loud(Error::MalformedReply));
    }

    // The reply ends with the proxy-side bound address and port, which
    // are of no use to us; read them to keep the stream aligned.
    let mut scratch = [0_u8; 256];
    let addr_len = match head.atyp {
        SocksAtyp::IPV4 => 4,
        SocksAtyp::IPV6 => 16,
        SocksAtyp::DOMAINNAME => {
            sock.recv_exact(&mut scratch[..1], SOCKS5_RECV_TIMEOUT, &INTERRUPT)
                .map_err(|e| loud_recv(host, port, "bound address", e))?;
            scratch[0] as usize
        }
        _ => return Err(loud(Error::MalformedReply)),
    };
    sock.recv_exact(&mut scratch[..addr_len], SOCKS5_RECV_TIMEOUT, &INTERRUPT)
        .map_err(|e| loud_recv(host, port, "bound address", e))?;
    sock.recv_exact(&mut scratch[..2], SOCKS5_RECV_TIMEOUT, &INTERRUPT)
        .map_err(|e| loud_recv(host, port, "bound port", e))?;

    debug!(target: "net", "SOCKS5 connected {}", host);
    Ok(())
}

/// Put one whole message on the wire, or fail.
///
/// The messages are tiny and the socket buffer is empty at every point
/// we send, so a short or failed send means the connection is broken;
/// there is no partial-message retry.
fn send_message(sock: &Socket, message: &[u8]) -> Result<()> {
    match sock.send(message) {
        Ok(n) if n == message.len() => Ok(()),
        _ => Err(loud(Error::ShortWrite)),
    }
}

/// Log a negotiation failure at the always-on sink, then pass it on.
fn loud(err: Error) -> Error {
    warn!("SOCKS5: {}", err);
    err
}

/// Log a failed negotiation read at the always-on sink.
fn loud_recv(host: &SocksHostname, port: u16, what: &str, err: RecvError) -> Error {
    warn!(
        "SOCKS5 connect to {}:{} failed: {} reading {}",
        host, port, err, what
    );
    Error::Recv(err)
}
