use tokio::net::TcpListener;

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::stream::Stream;
use crate::tcp;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// A bound, listening endpoint.
pub struct Listener {
    inner: ListenerInner,
    local: Endpoint,
}

enum ListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixDomainSocket),
}

impl Listener {
    /// Bind and listen on `endpoint`.
    ///
    /// For TCP, port `0` binds an ephemeral port; [`Listener::local_endpoint`]
    /// reports the port actually chosen.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let listener = tcp::bind(*addr)?;
                let local = Endpoint::Tcp(listener.local_addr()?);
                Ok(Self {
                    inner: ListenerInner::Tcp(listener),
                    local,
                })
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let socket = UnixDomainSocket::bind(path)?;
                Ok(Self {
                    inner: ListenerInner::Unix(socket),
                    local: endpoint.clone(),
                })
            }
        }
    }

    /// Accept the next incoming connection.
    pub async fn accept(&self) -> Result<Stream> {
        match &self.inner {
            ListenerInner::Tcp(listener) => tcp::accept(listener).await,
            #[cfg(unix)]
            ListenerInner::Unix(socket) => socket.accept().await,
        }
    }

    /// The endpoint this listener is actually bound to.
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("endpoint", &self.local)
            .finish()
    }
}

/// Connect to a listening endpoint.
pub async fn connect(endpoint: &Endpoint) -> Result<Stream> {
    match endpoint {
        Endpoint::Tcp(addr) => tcp::connect(*addr).await,
        #[cfg(unix)]
        Endpoint::Unix(path) => UnixDomainSocket::connect(path).await,
    }
}
