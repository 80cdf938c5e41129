//! A one-shot connector for checking peer and proxy reachability.
//!
//! This binary dials a destination exactly once — directly, or through
//! a SOCKS5 proxy — reports the outcome, and exits.  It exists both as
//! a diagnostic tool ("can this machine reach that peer through that
//! proxy?") and as a worked example of the `peerlink-socket` and
//! `peerlink-socks` APIs.
//!
//! # Examples
//!
//! Dial a peer directly:
//!
//! ```text
//! peerlink 203.0.113.9:8333
//! ```
//!
//! Dial an onion service through a local Tor proxy, on its own
//! circuit:
//!
//! ```text
//! peerlink -p 127.0.0.1:9050 -i examplev3abcdefghij.onion:8333
//! ```

#![deny(missing_docs)]
#![deny(unreachable_pub)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::cognitive_complexity)]
#![deny(clippy::debug_assert_with_mut_call)]
#![deny(clippy::exhaustive_structs)]
#![deny(clippy::expl_impl_clone_on_copy)]
#![deny(clippy::large_stack_arrays)]
#![warn(clippy::manual_ok_or)]
#![deny(clippy::missing_docs_in_private_items)]
#![warn(clippy::option_option)]
#![deny(clippy::unwrap_used)]

use anyhow::{anyhow, Context, Result};
use argh::FromArgs;
use log::{info, LevelFilter};
use peerlink_socket::{Endpoint, Socket};
use peerlink_socks::connect_through_proxy;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(FromArgs, Debug)]
/// Dial a peer once, directly or through a SOCKS5 proxy, and report
/// whether it worked.
struct Args {
    /// connect through the SOCKS5 proxy at this address:port
    #[argh(option, short = 'p')]
    proxy: Option<SocketAddr>,

    /// milliseconds to allow for the TCP connect (default: 10000)
    #[argh(option, short = 't', default = "10000")]
    timeout: u64,

    /// present one-time credentials so the proxy isolates this stream
    #[argh(switch, short = 'i')]
    isolate: bool,

    /// log at debug level
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// destination as host:port; without a proxy it must be an
    /// address:port the OS can route
    #[argh(positional)]
    destination: String,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    simple_logging::log_to_stderr(level);

    let timeout = Duration::from_millis(args.timeout);

    match args.proxy {
        Some(proxy) => {
            let (host, port) = split_destination(&args.destination)?;
            let proxy = Endpoint::from(proxy);
            let sock = Socket::new(&proxy)?;
            connect_through_proxy(&proxy, host, port, &sock, timeout, args.isolate)
                .with_context(|| {
                    format!("SOCKS5 connect to {}:{} via {} failed", host, port, proxy)
                })?;
            info!("connected to {}:{} through {}", host, port, proxy);
        }
        None => {
            let addr: SocketAddr = args.destination.parse().context(
                "without a proxy, the destination must be an address:port the OS can route",
            )?;
            let endpoint = Endpoint::from(addr);
            let sock = Socket::new(&endpoint)?;
            sock.connect_direct(&endpoint, timeout, true)
                .with_context(|| format!("connect to {} failed", endpoint))?;
            info!("connected to {}", endpoint);
        }
    }

    // One successful dial was the whole job; the connection closes on
    // exit.
    Ok(())
}

/// Split a `host:port` destination on its last colon.
fn split_destination(destination: &str) -> Result<(&str, u16)> {
    let (host, port) = destination
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("destination must be host:port"))?;
    let port = port
        .parse()
        .with_context(|| format!("bad port in destination {:?}", destination))?;
    Ok((host, port))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_destinations() {
        assert_eq!(
            split_destination("example.onion:8333").ok(),
            Some(("example.onion", 8333))
        );
        assert!(split_destination("no-port").is_err());
        assert!(split_destination("bad:port").is_err());
    }
}
