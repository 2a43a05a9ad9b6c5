use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
#[cfg(unix)]
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

/// Address of a stream socket a communicator listens on or connects to.
///
/// Textual forms accepted by [`FromStr`]:
/// - `tcp://127.0.0.1:10001` or a bare `127.0.0.1:10001` / `localhost:10001`
/// - `unix:///tmp/rpccomm.sock` or a bare path starting with `/` or `.`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// A TCP socket address.
    Tcp(SocketAddr),
    /// A filesystem-path Unix domain socket.
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Endpoint {
    /// Loopback TCP endpoint on the given port.
    pub fn loopback(port: u16) -> Self {
        Self::Tcp(SocketAddr::from(([127, 0, 0, 1], port)))
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Self::Tcp(_) => "tcp",
            #[cfg(unix)]
            Self::Unix(_) => "unix-domain-socket",
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::Tcp(addr)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            #[cfg(unix)]
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TransportError::InvalidEndpoint(input.to_string()));
        }

        if let Some(rest) = input.strip_prefix("tcp://") {
            return parse_tcp(rest);
        }

        #[cfg(unix)]
        {
            if let Some(rest) = input.strip_prefix("unix://") {
                if rest.is_empty() {
                    return Err(TransportError::InvalidEndpoint(input.to_string()));
                }
                return Ok(Self::Unix(PathBuf::from(rest)));
            }
            if input.starts_with('/') || input.starts_with('.') {
                return Ok(Self::Unix(PathBuf::from(input)));
            }
        }

        parse_tcp(input)
    }
}

fn parse_tcp(input: &str) -> Result<Endpoint, TransportError> {
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(Endpoint::Tcp(addr));
    }
    // Host names (e.g. `localhost:10001`) resolve to their first address.
    input
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .map(Endpoint::Tcp)
        .ok_or_else(|| TransportError::InvalidEndpoint(input.to_string()))
}
