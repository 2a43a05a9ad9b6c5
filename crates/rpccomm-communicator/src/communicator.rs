use std::fmt;
use std::io;

use bytes::Bytes;
use rpccomm_frame::Meta;
use rpccomm_transport::{connect, BoxedReader, BoxedWriter, Endpoint, Listener, Stream};
use tracing::{debug, error, info, warn};

use crate::config::CommunicatorConfig;
use crate::context::{Context, Link};
use crate::error::{CommError, Result};
use crate::event_loop::{EventLoop, StopHandle};
use crate::handler::Handler;
use crate::recv::{ReadStep, RecvOutcome};
use crate::state::{ConnectionState, RecvState, SendState};

/// One framed, checksummed connection and the event loop that drives it.
///
/// Build with [`listen`](Self::listen) or [`connect`](Self::connect), then
/// call [`run`](Self::run). `run` establishes the connection, invokes the
/// handler's callbacks as operations complete, and returns once nothing is
/// outstanding, the connection fails, or a stop is requested.
///
/// At most one receive and one send are outstanding at any time.
pub struct Communicator<H> {
    // Declared before the event loop so sockets are released while the
    // runtime is still alive.
    driver: Driver<H>,
    event_loop: EventLoop,
    local: Option<Endpoint>,
}

enum Establish {
    Accept(Listener),
    Connect(Endpoint),
}

impl Establish {
    async fn complete(&self) -> Result<Stream> {
        match self {
            Self::Accept(listener) => listener.accept().await.map_err(CommError::Accept),
            Self::Connect(endpoint) => connect(endpoint).await.map_err(CommError::Connect),
        }
    }
}

struct Driver<H> {
    handler: H,
    link: Link,
    establish: Option<Establish>,
}

impl<H: Handler> Communicator<H> {
    /// Bind `endpoint` and prepare to accept exactly one connection.
    ///
    /// Binding happens immediately so the resolved address is available from
    /// [`local_endpoint`](Self::local_endpoint) before [`run`](Self::run).
    /// Once accepted, the first receive is armed before
    /// [`Handler::on_connected`] is called.
    pub fn listen(endpoint: &Endpoint, handler: H, config: CommunicatorConfig) -> Result<Self> {
        let event_loop = EventLoop::new()?;
        let listener = event_loop
            .block_on(Listener::bind(endpoint))
            .map_err(CommError::Bind)?;
        let local = listener.local_endpoint().clone();
        info!(endpoint = %local, "listening");

        Ok(Self {
            driver: Driver::new(handler, config, Establish::Accept(listener)),
            event_loop,
            local: Some(local),
        })
    }

    /// Prepare to connect to `endpoint`. The connection is attempted by
    /// [`run`](Self::run).
    pub fn connect(endpoint: Endpoint, handler: H, config: CommunicatorConfig) -> Result<Self> {
        let event_loop = EventLoop::new()?;
        Ok(Self {
            driver: Driver::new(handler, config, Establish::Connect(endpoint)),
            event_loop,
            local: None,
        })
    }

    /// Drive the connection until no operation is outstanding, it fails, or
    /// it is stopped. Callbacks run on the calling thread.
    ///
    /// May be called again after operations are issued through
    /// [`recv_meta`](Self::recv_meta) or [`send_meta`](Self::send_meta).
    pub fn run(&mut self) {
        self.event_loop.block_on(self.driver.drive());
    }

    /// Start receiving the next message.
    pub fn recv_meta(&mut self) -> Result<()> {
        self.driver.link.recv_meta()
    }

    /// Start sending `meta` followed by `payload`.
    pub fn send_meta(&mut self, meta: Meta, payload: impl Into<Bytes>) -> Result<()> {
        self.driver.link.send_meta(meta, payload.into())
    }

    /// Send `payload` under a header computed from it.
    pub fn send_message(&mut self, opcode: u32, payload: impl Into<Bytes>) -> Result<()> {
        let payload = payload.into();
        self.driver
            .link
            .send_meta(Meta::for_payload(opcode, &payload), payload)
    }

    /// Close the connection and abandon any accept or connect in progress.
    ///
    /// An aborted receive or send is reported once through
    /// [`Handler::on_error`]. Calling stop again has no effect.
    pub fn stop(&mut self) {
        self.driver.link.stop.cancel();
        self.driver.shutdown();
    }

    /// Handle for stopping this communicator from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.driver.link.stop.clone())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.driver.link.connection
    }

    pub fn recv_state(&self) -> RecvState {
        self.driver.link.recv.state()
    }

    pub fn send_state(&self) -> SendState {
        self.driver.link.send.state()
    }

    /// Bound address of a listening communicator.
    pub fn local_endpoint(&self) -> Option<&Endpoint> {
        self.local.as_ref()
    }

    /// Endpoint of the connected peer, when known.
    pub fn peer_endpoint(&self) -> Option<&Endpoint> {
        self.driver.link.peer.as_ref()
    }

    pub fn config(&self) -> &CommunicatorConfig {
        &self.driver.link.config
    }

    pub fn handler(&self) -> &H {
        &self.driver.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.driver.handler
    }

    /// Consume the communicator, closing the connection, and return the handler.
    pub fn into_handler(self) -> H {
        self.driver.handler
    }
}

impl<H> fmt::Debug for Communicator<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Communicator")
            .field("connection", &self.driver.link.connection)
            .field("recv", &self.driver.link.recv.state())
            .field("send", &self.driver.link.send.state())
            .field("local", &self.local)
            .field("peer", &self.driver.link.peer)
            .finish()
    }
}

impl<H: Handler> Driver<H> {
    fn new(handler: H, config: CommunicatorConfig, establish: Establish) -> Self {
        Self {
            handler,
            link: Link::new(config),
            establish: Some(establish),
        }
    }

    async fn drive(&mut self) {
        if let Some(establish) = self.establish.take() {
            let outcome = tokio::select! {
                biased;
                _ = self.link.stop.cancelled() => None,
                result = establish.complete() => Some(result),
            };
            match outcome {
                None => {
                    debug!("connection attempt abandoned by stop");
                    self.shutdown();
                    return;
                }
                Some(Ok(stream)) => {
                    let accepted = matches!(establish, Establish::Accept(_));
                    drop(establish);
                    self.open(stream, accepted);
                }
                Some(Err(err)) => {
                    error!(error = %err, "failed to establish connection");
                    self.handler.on_error(err.kind(), &err);
                    return;
                }
            }
        }

        loop {
            if self.link.stop.is_cancelled() {
                self.shutdown();
                return;
            }
            if self.link.connection != ConnectionState::Open || !self.link.is_busy() {
                return;
            }

            // An accepted send must reach the socket even while inbound
            // bytes stay buffered, so the write slot is polled first.
            tokio::select! {
                biased;
                _ = self.link.stop.cancelled() => {}
                (writer, result) = self.link.send.next() => self.on_write(writer, result),
                (reader, result) = self.link.recv.next() => self.on_read(reader, result),
            }
        }
    }

    fn open(&mut self, stream: Stream, accepted: bool) {
        if let Err(err) = stream.set_nodelay(self.link.config.nodelay) {
            warn!(error = %err, "failed to set TCP_NODELAY");
        }
        self.link.peer = stream.peer_endpoint();
        info!(
            transport = stream.transport_name(),
            peer = ?self.link.peer,
            accepted,
            "connection open"
        );

        let (reader, writer) = stream.into_split();
        self.link.recv.attach(reader);
        self.link.send.attach(writer);
        self.link.connection = ConnectionState::Open;

        if accepted {
            if let Err(err) = self.link.recv_meta() {
                warn!(error = %err, "failed to arm first receive");
            }
        }
        self.handler.on_connected(&mut Context::new(&mut self.link));
    }

    fn on_read(&mut self, reader: BoxedReader, result: io::Result<ReadStep>) {
        let max = self.link.config.max_payload_size;
        match self.link.recv.complete(reader, result, max) {
            RecvOutcome::Pending => {}
            RecvOutcome::Failed(err) => self.fail(err),
            RecvOutcome::Delivered(meta, payload) => {
                debug!(opcode = meta.opcode, size = meta.size, "message received");
                self.handler
                    .on_message_received(&mut Context::new(&mut self.link), meta, payload);
                self.link.recv.settle();
            }
        }
    }

    fn on_write(&mut self, writer: BoxedWriter, result: io::Result<()>) {
        match self.link.send.complete(writer, result) {
            Ok(()) => {
                debug!("send complete");
                self.handler.on_send_complete(&mut Context::new(&mut self.link));
                self.link.send.settle();
            }
            Err(err) => self.fail(err),
        }
    }

    /// Fail the connection and report `err` once.
    fn fail(&mut self, err: CommError) {
        if self.link.connection.is_terminal() {
            return;
        }
        self.link.fail();
        if err.is_disconnect() {
            warn!(error = %err, kind = %err.kind(), "peer disconnected");
        } else {
            error!(error = %err, kind = %err.kind(), "connection failed");
        }
        self.handler.on_error(err.kind(), &err);
    }

    /// Local stop: close the socket, report any aborted operation once.
    fn shutdown(&mut self) {
        self.establish = None;
        if self.link.connection.is_terminal() {
            return;
        }
        let aborted = self.link.abort();
        self.link.connection = ConnectionState::Closed;
        info!("communicator stopped");
        if let Some(err) = aborted {
            debug!(error = %err, "outstanding operation aborted");
            self.handler.on_error(err.kind(), &err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[derive(Default)]
    struct Recorder {
        connected: usize,
        messages: Vec<(Meta, Bytes)>,
        errors: Vec<ErrorKind>,
    }

    impl Handler for Recorder {
        fn on_connected(&mut self, _ctx: &mut Context<'_>) {
            self.connected += 1;
        }

        fn on_message_received(&mut self, _ctx: &mut Context<'_>, meta: Meta, payload: Bytes) {
            self.messages.push((meta, payload));
        }

        fn on_error(&mut self, kind: ErrorKind, _error: &CommError) {
            self.errors.push(kind);
        }
    }

    fn closed_port() -> Endpoint {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Endpoint::Tcp(addr)
    }

    #[test]
    fn listen_reports_bound_endpoint() {
        let comm = Communicator::listen(
            &Endpoint::loopback(0),
            Recorder::default(),
            CommunicatorConfig::default(),
        )
        .unwrap();
        match comm.local_endpoint() {
            Some(Endpoint::Tcp(addr)) => assert_ne!(addr.port(), 0),
            other => panic!("unexpected endpoint: {other:?}"),
        }
        assert_eq!(comm.connection_state(), ConnectionState::Unconnected);
    }

    #[test]
    fn listen_conflict_is_bind_error() {
        let first = Communicator::listen(
            &Endpoint::loopback(0),
            Recorder::default(),
            CommunicatorConfig::default(),
        )
        .unwrap();
        let taken = first.local_endpoint().cloned().unwrap();
        let err = Communicator::listen(&taken, Recorder::default(), CommunicatorConfig::default())
            .unwrap_err();
        assert!(matches!(err, CommError::Bind(_)));
        assert_eq!(err.kind(), ErrorKind::AcceptFailure);
    }

    #[test]
    fn operations_before_connect_are_rejected() {
        let mut comm = Communicator::connect(
            closed_port(),
            Recorder::default(),
            CommunicatorConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            comm.recv_meta(),
            Err(CommError::InvalidState { .. })
        ));
        assert!(matches!(
            comm.send_message(1, "x"),
            Err(CommError::InvalidState { .. })
        ));
        assert!(comm.handler().errors.is_empty());
    }

    #[test]
    fn refused_connect_reports_once_and_stays_unconnected() {
        let mut comm = Communicator::connect(
            closed_port(),
            Recorder::default(),
            CommunicatorConfig::default(),
        )
        .unwrap();
        comm.run();
        assert_eq!(comm.connection_state(), ConnectionState::Unconnected);
        assert_eq!(comm.handler().errors, vec![ErrorKind::ConnectFailure]);

        comm.run();
        assert_eq!(comm.handler().errors.len(), 1);
    }

    #[test]
    fn stop_before_run_abandons_accept() {
        let mut comm = Communicator::listen(
            &Endpoint::loopback(0),
            Recorder::default(),
            CommunicatorConfig::default(),
        )
        .unwrap();
        comm.stop_handle().stop();
        comm.run();
        assert_eq!(comm.connection_state(), ConnectionState::Closed);

        comm.stop();
        let handler = comm.into_handler();
        assert_eq!(handler.connected, 0);
        assert!(handler.errors.is_empty());
    }
}
