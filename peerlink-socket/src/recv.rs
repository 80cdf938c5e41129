//! Reading an exact byte count under a deadline and a cancel flag.

use crate::err::last_error;
use crate::sock::{wait_ready, Socket, WaitFor};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Longest single readiness wait inside [`Socket::recv_exact`].
///
/// This bounds how long a set cancel flag can go unobserved: however
/// far away the deadline is, the loop wakes up at least once a second
/// to look at the flag.
const MAX_WAIT: Duration = Duration::from_secs(1);

/// Why a [`Socket::recv_exact`] call gave up.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecvError {
    /// The deadline expired with bytes still outstanding.
    #[error("read timed out")]
    Timeout,

    /// The peer shut the connection down in the middle of an expected
    /// message.
    #[error("peer disconnected mid-read")]
    Disconnected,

    /// The OS reported a hard error on the read or the readiness wait.
    #[error("network error: {}", crate::err::error_string(*.0))]
    Network(i32),

    /// The process-wide cancel flag was raised.
    #[error("read interrupted")]
    Interrupted,
}

impl Socket {
    /// Fill `buf` completely, or say why that was impossible.
    ///
    /// The socket must be non-blocking and selectable.  The read is
    /// optimistic: bytes already queued are taken immediately, and only
    /// a would-block result waits for readability, never longer than
    /// [`MAX_WAIT`] at a time so that `interrupt` stays responsive.
    ///
    /// On `Ok(())` the buffer holds exactly `buf.len()` received
    /// bytes.  On any error the buffer contents are unspecified and
    /// must be discarded.  An empty buffer succeeds without touching
    /// the socket; a raised `interrupt` fails before the first read.
    pub fn recv_exact(
        &self,
        buf: &mut [u8],
        timeout: Duration,
        interrupt: &AtomicBool,
    ) -> Result<(), RecvError> {
        if buf.is_empty() {
            return Ok(());
        }
        let deadline = Instant::now() + timeout;
        let fd = self.as_raw_fd();
        let mut off = 0;
        while off < buf.len() {
            if interrupt.load(Ordering::SeqCst) {
                return Err(RecvError::Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(RecvError::Timeout);
            }

            // Optimistically try the recv first.
            let rest = &mut buf[off..];
            let rc = unsafe {
                libc::recv(
                    fd,
                    rest.as_mut_ptr() as *mut libc::c_void,
                    rest.len(),
                    0,
                )
            };
            if rc > 0 {
                off += rc as usize;
            } else if rc == 0 {
                // Orderly shutdown while we still expected data.
                return Err(RecvError::Disconnected);
            } else {
                let err = last_error();
                if err != libc::EWOULDBLOCK && err != libc::EAGAIN && err != libc::EINPROGRESS {
                    return Err(RecvError::Network(err));
                }
                if !self.is_selectable() {
                    return Err(RecvError::Network(err));
                }
                let wait = std::cmp::min(deadline.saturating_duration_since(now), MAX_WAIT);
                if let Err(code) = wait_ready(fd, WaitFor::Readable, wait) {
                    return Err(RecvError::Network(code));
                }
                // A zero-event wait is not a failure; the loop re-checks
                // the clock and the flag before trying again.
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::addr::Endpoint;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    /// A connected (socket, accepted peer) pair over loopback.
    fn connected_pair() -> (Socket, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let ep = Endpoint::from(listener.local_addr().unwrap());
        let sock = Socket::new(&ep).unwrap();
        sock.connect_direct(&ep, Duration::from_secs(5), true).unwrap();
        let (peer, _) = listener.accept().unwrap();
        (sock, peer)
    }

    /// A flag that nobody ever raises.
    fn unset() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn reads_exactly() {
        let (sock, mut peer) = connected_pair();
        peer.write_all(&b"exactly nine bytes!!"[..9]).unwrap();

        let mut buf = [0_u8; 9];
        sock.recv_exact(&mut buf, Duration::from_secs(5), &unset())
            .unwrap();
        assert_eq!(&buf, b"exactly n");
    }

    #[test]
    fn resumes_across_partial_arrivals() {
        let (sock, mut peer) = connected_pair();
        let writer = thread::spawn(move || {
            peer.write_all(b"piece").unwrap();
            thread::sleep(Duration::from_millis(50));
            peer.write_all(b"meal").unwrap();
            peer
        });

        let mut buf = [0_u8; 9];
        sock.recv_exact(&mut buf, Duration::from_secs(5), &unset())
            .unwrap();
        assert_eq!(&buf, b"piecemeal");
        drop(writer.join().unwrap());
    }

    #[test]
    fn empty_read_needs_no_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let ep = Endpoint::from(listener.local_addr().unwrap());
        let mut sock = Socket::new(&ep).unwrap();
        sock.close();

        // Zero bytes wanted: success, closed handle notwithstanding.
        sock.recv_exact(&mut [], Duration::from_secs(1), &unset())
            .unwrap();
    }

    #[test]
    fn disconnect_mid_message() {
        let (sock, mut peer) = connected_pair();
        peer.write_all(b"hi").unwrap();
        drop(peer);

        let mut buf = [0_u8; 10];
        assert_eq!(
            sock.recv_exact(&mut buf, Duration::from_secs(5), &unset()),
            Err(RecvError::Disconnected)
        );
    }

    #[test]
    fn times_out() {
        let (sock, _peer) = connected_pair();
        let mut buf = [0_u8; 4];
        let started = Instant::now();
        assert_eq!(
            sock.recv_exact(&mut buf, Duration::from_millis(200), &unset()),
            Err(RecvError::Timeout)
        );
        assert!(started.elapsed() >= Duration::from_millis(200));
        // And well under the interrupt granularity cap.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn preset_interrupt_wins() {
        let (sock, mut peer) = connected_pair();
        // Even with data already queued...
        peer.write_all(b"data").unwrap();

        let interrupt = AtomicBool::new(true);
        let mut buf = [0_u8; 4];
        let started = Instant::now();
        assert_eq!(
            sock.recv_exact(&mut buf, Duration::from_secs(30), &interrupt),
            Err(RecvError::Interrupted)
        );
        // ...the flag is observed before any read happens.
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(buf, [0_u8; 4]);
    }

    #[test]
    fn interrupt_observed_within_granularity() {
        let (sock, _peer) = connected_pair();
        let interrupt = AtomicBool::new(false);
        let started = Instant::now();

        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(300));
                interrupt.store(true, Ordering::SeqCst);
            });
            let mut buf = [0_u8; 4];
            assert_eq!(
                sock.recv_exact(&mut buf, Duration::from_secs(30), &interrupt),
                Err(RecvError::Interrupted)
            );
        });
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(1500));
    }
}
