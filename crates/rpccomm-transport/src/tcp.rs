use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::stream::Stream;

/// Pending-connection backlog for TCP listeners.
pub const LISTEN_BACKLOG: u32 = 1024;

/// Bind and listen on a TCP address with `SO_REUSEADDR` set.
///
/// Must be called from within a tokio runtime.
pub fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let bind_err = |source| TransportError::Bind {
        endpoint: Endpoint::Tcp(addr),
        source,
    };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_err)?;
    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket.bind(addr).map_err(bind_err)?;
    let listener = socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;

    info!(%addr, "listening on tcp socket");
    Ok(listener)
}

/// Accept an incoming TCP connection.
pub async fn accept(listener: &TcpListener) -> Result<Stream> {
    let (stream, peer) = listener.accept().await.map_err(TransportError::Accept)?;
    debug!(%peer, "accepted tcp connection");
    Ok(Stream::from_tcp(stream))
}

/// Connect to a listening TCP socket.
pub async fn connect(addr: SocketAddr) -> Result<Stream> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| TransportError::Connect {
            endpoint: Endpoint::Tcp(addr),
            source,
        })?;
    debug!(%addr, "connected to tcp socket");
    Ok(Stream::from_tcp(stream))
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn bind_accept_connect() {
        let listener = bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let client = tokio::spawn(async move {
            let (_read, mut write) = connect(addr).await.unwrap().into_split();
            write.write_all(b"hello").await.unwrap();
        });

        let (mut read, _write) = accept(&listener).await.unwrap().into_split();
        let mut buf = [0u8; 5];
        read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        client.await.unwrap();
    }

    #[tokio::test]
    async fn connect_refused_reports_endpoint() {
        // Grab a free port, then release it so nothing is listening there.
        let addr = {
            let listener = bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
            listener.local_addr().unwrap()
        };

        let err = connect(addr).await.unwrap_err();
        match err {
            TransportError::Connect { endpoint, .. } => assert_eq!(endpoint, Endpoint::Tcp(addr)),
            other => panic!("expected connect error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rebind_after_close_with_reuseaddr() {
        let addr = {
            let listener = bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
            listener.local_addr().unwrap()
        };
        let again = bind(addr).unwrap();
        assert_eq!(again.local_addr().unwrap(), addr);
    }
}
