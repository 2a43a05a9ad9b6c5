use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::endpoint::Endpoint;
use crate::error::Result;

/// Owned read half of a split [`Stream`].
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Owned write half of a split [`Stream`].
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A connected, bidirectional stream socket.
///
/// This is the fundamental I/O type returned by [`Listener::accept`] and
/// [`connect`]. The communicator splits it into independently owned halves
/// so one read and one write can be outstanding at the same time.
///
/// [`Listener::accept`]: crate::Listener::accept
/// [`connect`]: crate::connect
pub struct Stream {
    inner: StreamInner,
}

enum StreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: StreamInner::Tcp(stream),
        }
    }

    #[cfg(unix)]
    pub(crate) fn from_unix(stream: UnixStream) -> Self {
        Self {
            inner: StreamInner::Unix(stream),
        }
    }

    /// Enable or disable Nagle's algorithm. No-op for Unix domain sockets.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        match &self.inner {
            StreamInner::Tcp(stream) => stream.set_nodelay(nodelay).map_err(Into::into),
            #[cfg(unix)]
            StreamInner::Unix(_) => Ok(()),
        }
    }

    /// Endpoint of the connected peer, when the platform reports one.
    pub fn peer_endpoint(&self) -> Option<Endpoint> {
        match &self.inner {
            StreamInner::Tcp(stream) => stream.peer_addr().ok().map(Endpoint::Tcp),
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream
                .peer_addr()
                .ok()
                .and_then(|addr| addr.as_pathname().map(|p| Endpoint::Unix(p.to_path_buf()))),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            StreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            StreamInner::Unix(_) => "unix-domain-socket",
        }
    }

    /// Split into owned read and write halves.
    ///
    /// The socket is closed once both halves have been dropped.
    pub fn into_split(self) -> (BoxedReader, BoxedWriter) {
        match self.inner {
            StreamInner::Tcp(stream) => {
                let (read, write) = stream.into_split();
                (Box::new(read), Box::new(write))
            }
            #[cfg(unix)]
            StreamInner::Unix(stream) => {
                let (read, write) = stream.into_split();
                (Box::new(read), Box::new(write))
            }
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("type", &self.transport_name())
            .field("peer", &self.peer_endpoint())
            .finish()
    }
}
