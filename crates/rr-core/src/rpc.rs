//! Request/response RPC over framed TCP
//!
//! Both halves of a session host an `RpcServer`: the endpoint publishes its
//! session handle, the console publishes its local devices. Calls are made
//! with an `RpcClient`, which keeps a small pool of idle connections so a
//! call never queues behind another call that is still waiting on its reply
//! (a pending readline, for example).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use rr_protocol::{Address, Frame, FrameCodec, Message, ProtocolError};

use crate::error::{ConnectionError, RpcError};

/// How long to wait for a TCP connection to be established
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long shutdown waits for in-flight connections to finish their reply
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

type Connection = Framed<TcpStream, FrameCodec>;

/// Serves requests arriving on an `RpcServer`
#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    /// Produce the reply for one request
    async fn handle(&self, message: Message) -> Message;
}

/// Client side of a service
pub struct RpcClient {
    address: Address,
    idle: Mutex<Vec<Connection>>,
    next_call: AtomicU32,
    next_nonce: AtomicU64,
}

impl RpcClient {
    /// Create a client; connections are made lazily on the first call
    pub fn new(address: Address) -> Self {
        Self {
            address,
            idle: Mutex::new(Vec::new()),
            next_call: AtomicU32::new(1),
            next_nonce: AtomicU64::new(1),
        }
    }

    /// Address of the service
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Send one request and wait for its reply.
    ///
    /// Error replies are returned as `RpcError::Remote`.
    pub async fn call(&self, message: Message) -> Result<Message, RpcError> {
        let mut conn = self.checkout().await?;
        let call_id = self.next_call.fetch_add(1, Ordering::Relaxed);
        let request_type = message.message_type();

        conn.send(Frame::new(call_id, message))
            .await
            .map_err(|e| self.lost(e))?;

        let reply = match conn.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Err(self.lost(e)),
            None => {
                return Err(ConnectionError::ConnectionLost(format!(
                    "{} closed the connection",
                    self.address
                ))
                .into())
            }
        };

        if !reply.answers(call_id) {
            // Connection is out of sync; do not return it to the pool
            return Err(RpcError::UnexpectedReply(format!(
                "reply for call {} while waiting on call {}",
                reply.call_id, call_id
            )));
        }

        self.checkin(conn);
        tracing::trace!(
            "{:?} to {} answered with {:?}",
            request_type,
            self.address,
            reply.message.message_type()
        );

        match reply.message {
            Message::Error { code, message } => Err(RpcError::Remote { code, message }),
            other => Ok(other),
        }
    }

    /// Round-trip a `Ping`
    pub async fn ping(&self) -> Result<(), RpcError> {
        let nonce = self.next_nonce.fetch_add(1, Ordering::Relaxed);
        match self.call(Message::Ping { nonce }).await? {
            Message::Pong { nonce: echoed } if echoed == nonce => Ok(()),
            other => Err(RpcError::UnexpectedReply(format!("{:?}", other))),
        }
    }

    /// Drop all pooled connections
    pub fn close_idle(&self) {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    async fn checkout(&self) -> Result<Connection, RpcError> {
        let pooled = self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop();
        if let Some(conn) = pooled {
            return Ok(conn);
        }

        tracing::debug!("Dialing {}", self.address);
        let target = self.address.socket_addr();
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&target))
            .await
            .map_err(|_| {
                ConnectionError::ConnectionRefused(format!("{}: connection timed out", self.address))
            })?
            .map_err(|e| ConnectionError::ConnectionRefused(format!("{}: {}", self.address, e)))?;
        stream.set_nodelay(true).ok();

        Ok(Framed::new(stream, FrameCodec::new()))
    }

    fn checkin(&self, conn: Connection) {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).push(conn);
    }

    fn lost(&self, err: ProtocolError) -> RpcError {
        match err {
            ProtocolError::Io(e) => {
                ConnectionError::ConnectionLost(format!("{}: {}", self.address, e)).into()
            }
            other => RpcError::Protocol(other),
        }
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// A bound, not yet running, service
pub struct RpcServer {
    listener: TcpListener,
    address: Address,
}

impl RpcServer {
    /// Bind the service address. Port 0 picks an ephemeral port.
    pub async fn bind(address: &Address) -> Result<Self, ConnectionError> {
        let listener = TcpListener::bind(address.socket_addr())
            .await
            .map_err(|e| ConnectionError::AddressUnavailable(format!("{}: {}", address, e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| ConnectionError::AddressUnavailable(format!("{}: {}", address, e)))?
            .port();

        Ok(Self {
            listener,
            address: address.with_port(port),
        })
    }

    /// Address the service is reachable at
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Run the accept loop in the background
    pub fn spawn<H: RpcHandler>(self, handler: Arc<H>) -> ServiceGuard {
        let cancel = CancellationToken::new();
        let accepting = cancel.child_token();
        let (closed_tx, closed_rx) = oneshot::channel();
        let address = self.address.clone();
        let task = tokio::spawn(self.run(handler, cancel.clone(), accepting.clone(), closed_tx));

        ServiceGuard {
            address,
            cancel,
            accepting,
            closed: Some(closed_rx),
            task: Some(task),
        }
    }

    /// Accept connections until `accepting` fires, keep serving the open
    /// ones until `cancel` fires
    async fn run<H: RpcHandler>(
        self,
        handler: Arc<H>,
        cancel: CancellationToken,
        accepting: CancellationToken,
        closed: oneshot::Sender<()>,
    ) {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = accepting.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!("{} accepted connection from {}", self.address, peer);
                        stream.set_nodelay(true).ok();
                        let handler = Arc::clone(&handler);
                        let cancel = cancel.child_token();
                        connections.spawn(async move {
                            if let Err(e) = serve_connection(stream, handler, cancel).await {
                                tracing::debug!("Connection from {} ended: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection on {}: {}", self.address, e);
                    }
                },
                // Reap finished connection tasks
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(self.listener);
        let _ = closed.send(());
        tracing::debug!("{} no longer accepting connections", self.address);

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = async { while connections.join_next().await.is_some() {} } => {}
        }

        let drain = async { while connections.join_next().await.is_some() {} };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::debug!("Aborting connections still open on {}", self.address);
            connections.abort_all();
        }
        tracing::debug!("Service on {} stopped", self.address);
    }
}

/// Handle on a running service; stops it on `shutdown` or drop
pub struct ServiceGuard {
    address: Address,
    cancel: CancellationToken,
    accepting: CancellationToken,
    closed: Option<oneshot::Receiver<()>>,
    task: Option<JoinHandle<()>>,
}

impl ServiceGuard {
    /// Address the service is reachable at
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Close the listener, leaving open connections in service.
    ///
    /// Returns once new connections are refused.
    pub async fn stop_accepting(&mut self) {
        self.accepting.cancel();
        if let Some(closed) = self.closed.take() {
            let _ = closed.await;
        }
    }

    /// Stop accepting and wait for open connections to wind down
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ServiceGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Answer requests on one connection until it closes or `cancel` fires
async fn serve_connection<H: RpcHandler>(
    stream: TcpStream,
    handler: Arc<H>,
    cancel: CancellationToken,
) -> Result<(), ProtocolError> {
    let mut framed = Framed::new(stream, FrameCodec::new());

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            next = framed.next() => match next {
                Some(frame) => frame?,
                None => break,
            },
        };

        let reply = tokio::select! {
            _ = cancel.cancelled() => break,
            reply = handler.handle(frame.message) => reply,
        };

        framed.send(Frame::new(frame.call_id, reply)).await?;
    }

    Ok(())
}
