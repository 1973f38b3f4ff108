use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// URI scheme accepted for device endpoints.
pub const SCHEME: &str = "tcp://";

/// Default device control port.
pub const DEFAULT_PORT: u16 = 9000;

/// A device control endpoint: `tcp://host:port`.
///
/// The scheme is optional when parsing (`host:port` is accepted) but is
/// always rendered by `Display`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl Endpoint {
    /// Build an endpoint from a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        validate_host(&host, &host)?;
        if port == 0 {
            return Err(invalid(&host, "port must be in 1..=65535"));
        }
        Ok(Self { host, port })
    }

    /// Parse an endpoint string.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let rest = match trimmed.find("://") {
            Some(idx) => {
                let scheme = &trimmed[..idx + 3];
                if !scheme.eq_ignore_ascii_case(SCHEME) {
                    return Err(invalid(input, &format!("unsupported scheme '{scheme}'")));
                }
                &trimmed[idx + 3..]
            }
            None => trimmed,
        };

        let (host, port) = split_host_port(input, rest)?;
        validate_host(input, host)?;

        let port: u16 = port
            .parse()
            .map_err(|_| invalid(input, &format!("invalid port '{port}'")))?;
        if port == 0 {
            return Err(invalid(input, "port must be in 1..=65535"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Host name or address literal (without IPv6 brackets).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to socket addresses.
    pub fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Connect {
                addr: self.to_string(),
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::Connect {
                addr: self.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "endpoint resolved to no addresses",
                ),
            });
        }
        Ok(addrs)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{SCHEME}[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{SCHEME}{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn split_host_port<'a>(input: &str, rest: &'a str) -> Result<(&'a str, &'a str)> {
    if let Some(stripped) = rest.strip_prefix('[') {
        let close = stripped
            .find(']')
            .ok_or_else(|| invalid(input, "unterminated IPv6 literal"))?;
        let host = &stripped[..close];
        let port = stripped[close + 1..]
            .strip_prefix(':')
            .ok_or_else(|| invalid(input, "missing port"))?;
        return Ok((host, port));
    }

    let (host, port) = rest
        .rsplit_once(':')
        .ok_or_else(|| invalid(input, "missing port"))?;
    if host.contains(':') {
        return Err(invalid(input, "IPv6 literals must be bracketed"));
    }
    Ok((host, port))
}

fn validate_host(input: &str, host: &str) -> Result<()> {
    if host.is_empty() {
        return Err(invalid(input, "missing host"));
    }
    if host.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(invalid(input, "host contains invalid characters"));
    }
    Ok(())
}

fn invalid(endpoint: &str, reason: &str) -> TransportError {
    TransportError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_uri() {
        let ep = Endpoint::parse("tcp://193.206.157.36:9000").unwrap();
        assert_eq!(ep.host(), "193.206.157.36");
        assert_eq!(ep.port(), 9000);
        assert_eq!(ep.to_string(), "tcp://193.206.157.36:9000");
    }

    #[test]
    fn parses_bare_host_port() {
        let ep: Endpoint = "localhost:4242".parse().unwrap();
        assert_eq!(ep.host(), "localhost");
        assert_eq!(ep.port(), 4242);
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let ep = Endpoint::parse("tcp://[::1]:9000").unwrap();
        assert_eq!(ep.host(), "::1");
        assert_eq!(ep.to_string(), "tcp://[::1]:9000");
    }

    #[test]
    fn rejects_malformed_endpoints() {
        for bad in [
            "",
            "tcp://",
            "tcp://host",
            "tcp://:9000",
            "tcp://host:port",
            "tcp://host:0",
            "tcp://host:70000",
            "udp://host:9000",
            "tcp://[::1:9000",
            "::1:9000",
            "tcp://bad host:9000",
        ] {
            let err = Endpoint::parse(bad).unwrap_err();
            assert!(
                matches!(err, TransportError::InvalidEndpoint { .. }),
                "{bad:?} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn new_rejects_zero_port() {
        assert!(Endpoint::new("localhost", 0).is_err());
        assert!(Endpoint::new("localhost", DEFAULT_PORT).is_ok());
    }

    #[test]
    fn resolves_loopback() {
        let ep = Endpoint::new("127.0.0.1", 9000).unwrap();
        let addrs = ep.resolve().unwrap();
        assert_eq!(addrs[0].port(), 9000);
        assert!(addrs[0].ip().is_loopback());
    }
}
