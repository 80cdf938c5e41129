//! Structures that represent SOCKS5 messages, and the builders and
//! parsers for the handful of messages a client exchanges.

use crate::{Error, Result};

use caret::caret_int;
use peerlink_bytes::{Reader, Writer};
use std::convert::TryFrom;
use std::fmt;

/// The protocol version byte we speak.  SOCKS4 is long obsolete and
/// not offered.
pub(crate) const SOCKS_VERSION: u8 = 0x05;

/// The version byte of the RFC 1929 username/password sub-negotiation.
/// (This is a version of the sub-protocol, not of SOCKS itself.)
pub(crate) const AUTH_VERSION: u8 = 0x01;

/// The command byte for CONNECT, the only request we ever make.
pub(crate) const CMD_CONNECT: u8 = 0x01;

caret_int! {
    /// An authentication method, as negotiated in the SOCKS5 greeting.
    pub struct SocksMethod(u8) {
        /// No authentication required.
        NO_AUTHENTICATION = 0x00,
        /// Username/password authentication (RFC 1929).
        USERNAME_PASSWORD = 0x02,
        /// The server accepts none of the methods offered.
        NO_ACCEPTABLE = 0xFF,
    }
}

caret_int! {
    /// Possible reply values for a SOCKS5 request.
    ///
    /// The documentation for these values is kind of scant, and is
    /// limited to what RFC 1928 says.
    pub struct SocksReply(u8) {
        /// RFC 1928: "succeeded"
        SUCCEEDED = 0x00,
        /// RFC 1928: "general SOCKS server failure"
        GENERAL_FAILURE = 0x01,
        /// RFC 1928: "connection not allowed by ruleset"
        NOT_ALLOWED = 0x02,
        /// RFC 1928: "Network unreachable"
        NETWORK_UNREACHABLE = 0x03,
        /// RFC 1928: "Host unreachable"
        HOST_UNREACHABLE = 0x04,
        /// RFC 1928: "Connection refused"
        CONNECTION_REFUSED = 0x05,
        /// RFC 1928: "TTL expired"
        TTL_EXPIRED = 0x06,
        /// RFC 1928: "Command not supported"
        COMMAND_NOT_SUPPORTED = 0x07,
        /// RFC 1928: "Address type not supported"
        ADDRTYPE_NOT_SUPPORTED = 0x08,
    }
}

caret_int! {
    /// An address-type code, labeling the bound address in a reply.
    ///
    /// We only ever *send* DOMAINNAME (the proxy does all resolution),
    /// but a reply may carry any of these.
    pub struct SocksAtyp(u8) {
        /// A four-byte IPv4 address.
        IPV4 = 0x01,
        /// A hostname, prefixed with a one-byte length.
        DOMAINNAME = 0x03,
        /// A sixteen-byte IPv6 address.
        IPV6 = 0x04,
    }
}

/// A hostname for use in a SOCKS5 request.
///
/// The wire format carries the name's length in a single byte, so a
/// hostname is limited to 255 bytes; an empty name is meaningless and
/// rejected as well.  Beyond length, the bytes are not interpreted:
/// whatever the caller supplies is handed to the proxy verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocksHostname(String);

impl TryFrom<&str> for SocksHostname {
    type Error = Error;
    fn try_from(s: &str) -> Result<SocksHostname> {
        if s.is_empty() {
            Err(Error::EmptyHostname)
        } else if s.len() > 255 {
            Err(Error::HostnameTooLong)
        } else {
            Ok(SocksHostname(s.to_string()))
        }
    }
}

impl AsRef<str> for SocksHostname {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl fmt::Display for SocksHostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Credentials for the RFC 1929 username/password sub-negotiation.
///
/// The RFC never says what encoding the fields use, so they are
/// treated as opaque byte strings (embedded NUL included); each field
/// must be 1 to 255 bytes to fit its length prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyCredentials {
    /// The username, 1..=255 bytes.
    username: Vec<u8>,
    /// The password, 1..=255 bytes.
    password: Vec<u8>,
}

impl ProxyCredentials {
    /// Construct credentials, enforcing the length-prefix limits.
    pub fn new(username: Vec<u8>, password: Vec<u8>) -> Result<ProxyCredentials> {
        if username.is_empty() || username.len() > 255 || password.is_empty() || password.len() > 255
        {
            return Err(Error::BadCredentials);
        }
        Ok(ProxyCredentials { username, password })
    }

    /// Credentials whose username and password are both `tag`.
    ///
    /// Used for stream isolation, where the only thing that matters is
    /// that the pair differs from every pair used before.  Callers
    /// pass decimal counter renderings, which always fit the limits.
    pub(crate) fn from_isolation_tag(tag: Vec<u8>) -> ProxyCredentials {
        ProxyCredentials {
            username: tag.clone(),
            password: tag,
        }
    }

    /// Return the username bytes.
    pub fn username(&self) -> &[u8] {
        &self.username
    }

    /// Return the password bytes.
    pub fn password(&self) -> &[u8] {
        &self.password
    }
}

/// Build the greeting that opens every SOCKS5 conversation, offering
/// the authentication methods we are prepared to complete.
pub(crate) fn build_greeting(offer_auth: bool) -> Vec<u8> {
    let mut msg: Vec<u8> = Vec::new();
    msg.write_u8(SOCKS_VERSION);
    if offer_auth {
        msg.write_u8(2); // number of methods
        msg.write_u8(SocksMethod::NO_AUTHENTICATION.into());
        msg.write_u8(SocksMethod::USERNAME_PASSWORD.into());
    } else {
        msg.write_u8(1); // number of methods
        msg.write_u8(SocksMethod::NO_AUTHENTICATION.into());
    }
    msg
}

/// Build the RFC 1929 username/password message.
pub(crate) fn build_auth(auth: &ProxyCredentials) -> Vec<u8> {
    let mut msg: Vec<u8> = Vec::new();
    msg.write_u8(AUTH_VERSION);
    msg.write_u8(auth.username().len() as u8);
    msg.write(auth.username());
    msg.write_u8(auth.password().len() as u8);
    msg.write(auth.password());
    msg
}

/// Build a CONNECT request for `host:port`.
///
/// The destination always goes out as a DOMAINNAME: resolving it is
/// the proxy's job, and for onion services only the proxy can.
pub(crate) fn build_connect(host: &SocksHostname, port: u16) -> Vec<u8> {
    let mut msg: Vec<u8> = Vec::new();
    msg.write_u8(SOCKS_VERSION);
    msg.write_u8(CMD_CONNECT);
    msg.write_u8(0x00); // RSV, must be zero
    msg.write_u8(SocksAtyp::DOMAINNAME.into());
    msg.write_u8(host.as_ref().len() as u8); // length checked at construction
    msg.write(host.as_ref().as_bytes());
    msg.write_u16(port);
    msg
}

/// Parse the two-byte method selection that answers our greeting.
pub(crate) fn parse_method_selection(msg: [u8; 2]) -> Result<SocksMethod> {
    let mut r = Reader::from_slice(&msg[..]);
    let version = r.take_u8()?;
    if version != SOCKS_VERSION {
        return Err(Error::BadProtocol(version));
    }
    Ok(r.take_u8()?.into())
}

/// Parse the two-byte status that answers a sub-negotiation.
pub(crate) fn parse_auth_reply(msg: [u8; 2]) -> Result<()> {
    let mut r = Reader::from_slice(&msg[..]);
    if r.take_u8()? != AUTH_VERSION || r.take_u8()? != 0x00 {
        return Err(Error::AuthFailed);
    }
    Ok(())
}

/// The fixed head of a SOCKS5 reply; the variable-length bound address
/// and port follow it on the wire.
pub(crate) struct ReplyHead {
    /// The outcome of our request.
    pub(crate) reply: SocksReply,
    /// The reserved byte, which a conforming server sends as zero.
    pub(crate) reserved: u8,
    /// The type of the bound address that follows.
    pub(crate) atyp: SocksAtyp,
}

/// Parse the first four bytes of a reply.
pub(crate) fn parse_reply_head(msg: [u8; 4]) -> Result<ReplyHead> {
    let mut r = Reader::from_slice(&msg[..]);
    let version = r.take_u8()?;
    if version != SOCKS_VERSION {
        return Err(Error::BadProtocol(version));
    }
    let reply = SocksReply::from(r.take_u8()?);
    let reserved = r.take_u8()?;
    let atyp = SocksAtyp::from(r.take_u8()?);
    Ok(ReplyHead {
        reply,
        reserved,
        atyp,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::convert::TryInto;

    #[test]
    fn greeting_forms() {
        assert_eq!(build_greeting(false), vec![0x05, 0x01, 0x00]);
        assert_eq!(build_greeting(true), vec![0x05, 0x02, 0x00, 0x02]);
    }

    #[test]
    fn auth_message() {
        let auth =
            ProxyCredentials::new(b"user".to_vec(), b"pass".to_vec()).unwrap();
        assert_eq!(
            build_auth(&auth),
            b"\x01\x04user\x04pass".to_vec()
        );
    }

    #[test]
    fn connect_message() {
        let host: SocksHostname = "example.com".try_into().unwrap();
        let msg = build_connect(&host, 80);
        let mut expected = vec![0x05, 0x01, 0x00, 0x03, 0x0b];
        expected.extend_from_slice(b"example.com");
        expected.extend_from_slice(&[0x00, 0x50]);
        assert_eq!(msg, expected);
    }

    #[test]
    fn connect_port_boundaries() {
        let host: SocksHostname = "x".try_into().unwrap();
        let msg = build_connect(&host, 0);
        assert_eq!(&msg[msg.len() - 2..], &[0x00, 0x00]);
        let msg = build_connect(&host, 65535);
        assert_eq!(&msg[msg.len() - 2..], &[0xff, 0xff]);
    }

    #[test]
    fn hostname_limits() {
        let ok: Result<SocksHostname> = "a".repeat(255).as_str().try_into();
        assert!(ok.is_ok());

        let too_long: Result<SocksHostname> = "a".repeat(256).as_str().try_into();
        assert!(matches!(too_long, Err(Error::HostnameTooLong)));

        let empty: Result<SocksHostname> = "".try_into();
        assert!(matches!(empty, Err(Error::EmptyHostname)));
    }

    #[test]
    fn credential_limits() {
        assert!(ProxyCredentials::new(b"u".to_vec(), b"p".to_vec()).is_ok());
        assert!(ProxyCredentials::new(vec![0; 255], vec![1; 255]).is_ok());
        // NUL bytes are data, not terminators.
        assert!(ProxyCredentials::new(b"a\0b".to_vec(), b"\0".to_vec()).is_ok());

        assert!(matches!(
            ProxyCredentials::new(Vec::new(), b"p".to_vec()),
            Err(Error::BadCredentials)
        ));
        assert!(matches!(
            ProxyCredentials::new(b"u".to_vec(), Vec::new()),
            Err(Error::BadCredentials)
        ));
        assert!(matches!(
            ProxyCredentials::new(vec![0; 256], b"p".to_vec()),
            Err(Error::BadCredentials)
        ));
    }

    #[test]
    fn method_selection() {
        assert_eq!(
            parse_method_selection([0x05, 0x00]).unwrap(),
            SocksMethod::NO_AUTHENTICATION
        );
        assert_eq!(
            parse_method_selection([0x05, 0x02]).unwrap(),
            SocksMethod::USERNAME_PASSWORD
        );
        // An unknown method is representable; rejecting it is the
        // driver's decision.
        assert_eq!(
            parse_method_selection([0x05, 0x17]).unwrap(),
            SocksMethod::from(0x17)
        );

        assert!(matches!(
            parse_method_selection([0x04, 0x00]),
            Err(Error::BadProtocol(0x04))
        ));
    }

    #[test]
    fn auth_reply() {
        assert!(parse_auth_reply([0x01, 0x00]).is_ok());
        assert!(matches!(
            parse_auth_reply([0x01, 0x01]),
            Err(Error::AuthFailed)
        ));
        assert!(matches!(
            parse_auth_reply([0x00, 0x00]),
            Err(Error::AuthFailed)
        ));
    }

    #[test]
    fn reply_head() {
        let head = parse_reply_head([0x05, 0x00, 0x00, 0x01]).unwrap();
        assert_eq!(head.reply, SocksReply::SUCCEEDED);
        assert_eq!(head.reserved, 0);
        assert_eq!(head.atyp, SocksAtyp::IPV4);

        let head = parse_reply_head([0x05, 0x05, 0x00, 0x03]).unwrap();
        assert_eq!(head.reply, SocksReply::CONNECTION_REFUSED);
        assert_eq!(head.reply.to_string(), "CONNECTION_REFUSED");
        assert_eq!(head.atyp, SocksAtyp::DOMAINNAME);

        assert!(matches!(
            parse_reply_head([0x04, 0x00, 0x00, 0x01]),
            Err(Error::BadProtocol(0x04))
        ));
    }
}
