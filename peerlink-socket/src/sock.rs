//! Creating, connecting and closing non-blocking stream sockets.

use crate::addr::Endpoint;
use crate::err::{error_string, last_error, Error};
use log::{debug, warn};
use std::mem;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

/// Sentinel for a handle whose descriptor has been closed.
const INVALID_FD: RawFd = -1;

/// Flags for every send on a connector socket.  `MSG_NOSIGNAL` keeps a
/// dead peer from killing the process with `SIGPIPE`; platforms without
/// it set `SO_NOSIGPIPE` on the socket instead.
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
/// Flags for every send on a connector socket.
#[cfg(any(target_os = "macos", target_os = "ios"))]
const SEND_FLAGS: libc::c_int = 0;

/// An owned, non-blocking TCP socket.
///
/// A `Socket` is created already configured for the connector: it is
/// non-blocking, selectable with the readiness primitive this crate
/// was built with, `TCP_NODELAY` is set, and its writes cannot raise
/// `SIGPIPE`.
///
/// The handle owns its descriptor: dropping an open `Socket` closes
/// it.  Nothing else in this workspace ever closes a caller's socket;
/// after a failed proxy negotiation the caller decides when to call
/// [`close`](Socket::close).
#[derive(Debug)]
pub struct Socket {
    /// The underlying descriptor, or `INVALID_FD` after `close`.
    fd: RawFd,
}

impl Socket {
    /// Open a stream socket suitable for connecting to `endpoint`.
    ///
    /// Fails with [`Error::UnsupportedNetwork`] if the endpoint cannot
    /// be expressed as an OS socket address.  No descriptor survives
    /// any failing path.
    pub fn new(endpoint: &Endpoint) -> Result<Socket, Error> {
        let raw = endpoint.to_sockaddr().map_err(|e| {
            warn!("cannot create socket for {}: unsupported network", endpoint);
            e
        })?;

        let fd = unsafe { libc::socket(raw.family(), libc::SOCK_STREAM, libc::IPPROTO_TCP) };
        if fd < 0 {
            return Err(Error::CreateFailed(last_error()));
        }
        // From here on, dropping `sock` closes the descriptor.
        let sock = Socket { fd };

        if !sock.is_selectable() {
            warn!(
                "cannot create connection: non-selectable socket created (fd {} >= FD_SETSIZE?)",
                fd
            );
            return Err(Error::NotSelectable);
        }

        sock.suppress_sigpipe();

        // Disable Nagle's algorithm.
        sock.set_nodelay();

        if !sock.set_nonblocking() {
            let err = last_error();
            warn!("setting socket to non-blocking failed: {}", error_string(err));
            return Err(Error::CreateFailed(err));
        }

        Ok(sock)
    }

    /// Connect this socket to `endpoint`, waiting at most `timeout`.
    ///
    /// `manual` only affects where failures are logged: operator-initiated
    /// attempts are worth a visible message, automatic ones go to the
    /// `net` debug target.  The result is the same either way.
    pub fn connect_direct(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
        manual: bool,
    ) -> Result<(), Error> {
        if self.fd == INVALID_FD {
            warn!("cannot connect to {}: invalid socket", endpoint);
            return Err(Error::InvalidHandle);
        }
        let raw = endpoint.to_sockaddr().map_err(|e| {
            warn!("cannot connect to {}: unsupported network", endpoint);
            e
        })?;

        let rc = unsafe { libc::connect(self.fd, raw.as_ptr(), raw.len) };
        if rc == 0 {
            return Ok(());
        }
        let err = last_error();
        if err == libc::EINPROGRESS || err == libc::EWOULDBLOCK {
            // The connect is underway; wait for the socket to become
            // writable, then ask the OS how it went.
            match wait_ready(self.fd, WaitFor::Writable, timeout) {
                Ok(false) => {
                    debug!(target: "net", "connection to {} timeout", endpoint);
                    Err(Error::ConnectTimeout)
                }
                Err(code) => {
                    warn!(
                        "readiness wait for {} failed: {}",
                        endpoint,
                        error_string(code)
                    );
                    Err(Error::ConnectFailed(code))
                }
                Ok(true) => {
                    let so_err = self.so_error().map_err(|code| {
                        warn!(
                            "getsockopt() for {} failed: {}",
                            endpoint,
                            error_string(code)
                        );
                        Error::ConnectFailed(code)
                    })?;
                    if so_err != 0 {
                        log_connect_failure(manual, endpoint, "after readiness wait", so_err);
                        return Err(Error::ConnectFailed(so_err));
                    }
                    Ok(())
                }
            }
        } else if err == libc::EISCONN {
            // Already connected; a racing connect finished first.
            Ok(())
        } else {
            log_connect_failure(manual, endpoint, "synchronously", err);
            Err(Error::ConnectFailed(err))
        }
    }

    /// Close the underlying descriptor and invalidate the handle.
    ///
    /// Returns false if the handle was already closed or the close
    /// itself failed.  Closing twice is safe.
    pub fn close(&mut self) -> bool {
        if self.fd == INVALID_FD {
            return false;
        }
        let rc = unsafe { libc::close(self.fd) };
        if rc != 0 {
            warn!(
                "closing socket fd {} failed: {}",
                self.fd,
                error_string(last_error())
            );
        }
        self.fd = INVALID_FD;
        rc == 0
    }

    /// Enable `TCP_NODELAY`; return whether the OS accepted the option.
    pub fn set_nodelay(&self) -> bool {
        let one: libc::c_int = 1;
        let rc = unsafe {
            libc::setsockopt(
                self.fd,
                libc::IPPROTO_TCP,
                libc::TCP_NODELAY,
                &one as *const libc::c_int as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        rc == 0
    }

    /// Whether this descriptor can be used with the readiness primitive.
    ///
    /// With `poll` every descriptor qualifies; with `select` the
    /// descriptor must fit in an `fd_set`.
    pub fn is_selectable(&self) -> bool {
        fd_is_selectable(self.fd)
    }

    /// Send `data` with a single non-blocking `send(2)`.
    ///
    /// Returns the number of bytes the OS accepted.  Callers that need
    /// the whole buffer on the wire must treat a short count as fatal;
    /// there is no retry here.
    pub fn send(&self, data: &[u8]) -> std::io::Result<usize> {
        if self.fd == INVALID_FD {
            return Err(std::io::Error::from_raw_os_error(libc::EBADF));
        }
        let rc = unsafe {
            libc::send(
                self.fd,
                data.as_ptr() as *const libc::c_void,
                data.len(),
                SEND_FLAGS,
            )
        };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(rc as usize)
    }

    /// Set the descriptor non-blocking.
    fn set_nonblocking(&self) -> bool {
        unsafe {
            let flags = libc::fcntl(self.fd, libc::F_GETFL, 0);
            if flags < 0 {
                return false;
            }
            libc::fcntl(self.fd, libc::F_SETFL, flags | libc::O_NONBLOCK) >= 0
        }
    }

    /// Ask the OS for the socket's pending error.
    ///
    /// `Ok(code)` is the value of `SO_ERROR` (zero when the connect
    /// succeeded); `Err(code)` means `getsockopt` itself failed.
    fn so_error(&self) -> Result<i32, i32> {
        let mut err: libc::c_int = 0;
        let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                self.fd,
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                &mut err as *mut libc::c_int as *mut libc::c_void,
                &mut len,
            )
        };
        if rc != 0 {
            return Err(last_error());
        }
        Ok(err)
    }

    /// Keep a dead peer from raising `SIGPIPE`, on platforms where that
    /// is a socket option rather than a send flag.
    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd"
    ))]
    fn suppress_sigpipe(&self) {
        let one: libc::c_int = 1;
        unsafe {
            libc::setsockopt(
                self.fd,
                libc::SOL_SOCKET,
                libc::SO_NOSIGPIPE,
                &one as *const libc::c_int as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
        }
    }

    /// On these platforms `MSG_NOSIGNAL` does the job at send time.
    #[cfg(not(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd"
    )))]
    fn suppress_sigpipe(&self) {}
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        if self.fd != INVALID_FD {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

/// Log a failed connect at the right sink for the kind of attempt.
fn log_connect_failure(manual: bool, endpoint: &Endpoint, when: &str, err: i32) {
    if manual {
        warn!(
            "connect() to {} failed {}: {}",
            endpoint,
            when,
            error_string(err)
        );
    } else {
        debug!(
            target: "net",
            "connect() to {} failed {}: {}",
            endpoint,
            when,
            error_string(err)
        );
    }
}

/// Whether `fd` can be passed to the readiness primitive.
pub(crate) fn fd_is_selectable(fd: RawFd) -> bool {
    if cfg!(feature = "poll") {
        fd != INVALID_FD
    } else {
        fd >= 0 && (fd as usize) < libc::FD_SETSIZE
    }
}

/// What a readiness wait is waiting for.
#[derive(Copy, Clone, Debug)]
pub(crate) enum WaitFor {
    /// Data can be read.
    Readable,
    /// The socket can be written (a pending connect has resolved).
    Writable,
}

/// Wait until `fd` is ready or `timeout` elapses.
///
/// `Ok(true)` means ready, `Ok(false)` means the timeout expired with
/// no events, `Err(code)` means the primitive itself failed.
#[cfg(feature = "poll")]
pub(crate) fn wait_ready(fd: RawFd, wait: WaitFor, timeout: Duration) -> Result<bool, i32> {
    let events = match wait {
        WaitFor::Readable => libc::POLLIN,
        WaitFor::Writable => libc::POLLOUT,
    };
    let mut pollfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    let rc = unsafe { libc::poll(&mut pollfd, 1, clamp_millis(timeout)) };
    if rc < 0 {
        return Err(last_error());
    }
    Ok(rc > 0)
}

/// Wait until `fd` is ready or `timeout` elapses.
///
/// `Ok(true)` means ready, `Ok(false)` means the timeout expired with
/// no events, `Err(code)` means the primitive itself failed.
#[cfg(not(feature = "poll"))]
pub(crate) fn wait_ready(fd: RawFd, wait: WaitFor, timeout: Duration) -> Result<bool, i32> {
    if !fd_is_selectable(fd) {
        return Err(libc::EINVAL);
    }
    let mut tv = millis_to_timeval(i64::from(clamp_millis(timeout)));
    let mut fdset: libc::fd_set = unsafe { mem::zeroed() };
    unsafe {
        libc::FD_ZERO(&mut fdset);
        libc::FD_SET(fd, &mut fdset);
    }
    let rc = unsafe {
        match wait {
            WaitFor::Readable => libc::select(
                fd + 1,
                &mut fdset,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut tv,
            ),
            WaitFor::Writable => libc::select(
                fd + 1,
                std::ptr::null_mut(),
                &mut fdset,
                std::ptr::null_mut(),
                &mut tv,
            ),
        }
    };
    if rc < 0 {
        return Err(last_error());
    }
    Ok(rc > 0)
}

/// Reduce a `Duration` to whole milliseconds that fit a C int.
fn clamp_millis(timeout: Duration) -> libc::c_int {
    std::cmp::min(timeout.as_millis(), i32::MAX as u128) as libc::c_int
}

/// Split a millisecond count into the `timeval` form used by
/// `select`-style interfaces.
///
/// Defined for non-negative input.
///
/// # Example
/// ```
/// let tv = peerlink_socket::millis_to_timeval(2500);
/// assert_eq!(tv.tv_sec, 2);
/// assert_eq!(tv.tv_usec, 500_000);
/// ```
pub fn millis_to_timeval(millis: i64) -> libc::timeval {
    libc::timeval {
        tv_sec: (millis / 1000) as libc::time_t,
        tv_usec: ((millis % 1000) * 1000) as libc::suseconds_t,
    }
}
