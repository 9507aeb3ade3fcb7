//! Attaching the console to a session endpoint
//!
//! `connect` binds the console's callback service on the interface that
//! routes to the endpoint, assigns the console's devices to the endpoint's
//! session handle, and parks until the endpoint wakes it at teardown.

mod link;

use std::io::{self, BufReader, Write};
use std::sync::Arc;

use rr_core::config::ConsoleConfig;
use rr_core::{RpcServer, RrError};
use rr_protocol::{Address, HandleField, ObjectId};

use crate::editor::LineEditor;
use crate::net::local_ip_for;
use crate::proxy::{BufReadInput, LocalIoProxy};
use crate::service::{ObjectTable, Parker};

pub use link::{Dialer, HandleLink, RpcLink, TcpDialer};

/// Local devices lent to the remote session
pub struct Devices {
    pub input: LocalIoProxy,
    pub output: LocalIoProxy,
    /// Offered as the endpoint's stdout when capturing
    pub stdout: LocalIoProxy,
    /// Offered as the endpoint's stderr when capturing
    pub stderr: LocalIoProxy,
}

impl Devices {
    /// Interactive terminal: the line editor reads, stdout writes
    pub fn terminal(editor: LineEditor) -> Self {
        Self::with_input(LocalIoProxy::editor(editor))
    }

    /// Non-interactive stdin; prompts are echoed to stdout
    pub fn stdio() -> Self {
        Self::with_input(stdin_reader())
    }

    /// Custom input, process stdout/stderr for everything else
    pub fn with_input(input: LocalIoProxy) -> Self {
        Self {
            input,
            output: LocalIoProxy::writer(io::stdout()),
            stdout: LocalIoProxy::writer(io::stdout()),
            stderr: LocalIoProxy::writer(io::stderr()),
        }
    }
}

fn stdin_reader() -> LocalIoProxy {
    let echo: Box<dyn Write + Send> = Box::new(io::stdout());
    LocalIoProxy::reader(BufReadInput::new(BufReader::new(io::stdin())), Some(echo))
}

/// Ids of the published objects
#[derive(Debug, Clone, Copy)]
struct Published {
    input: ObjectId,
    output: ObjectId,
    stdout: ObjectId,
    stderr: ObjectId,
    thread: ObjectId,
}

/// Console side of a session
pub struct Connector<D = TcpDialer> {
    config: ConsoleConfig,
    dialer: D,
    objects: Arc<ObjectTable>,
    parker: Arc<Parker>,
    published: Published,
}

impl Connector<TcpDialer> {
    pub fn new(config: ConsoleConfig, devices: Devices) -> Self {
        Self::with_dialer(config, devices, TcpDialer)
    }
}

impl<D: Dialer> Connector<D> {
    /// Connector that reaches endpoints through `dialer`
    pub fn with_dialer(config: ConsoleConfig, devices: Devices, dialer: D) -> Self {
        let objects = Arc::new(ObjectTable::new());
        let parker = Arc::new(Parker::new());

        let published = Published {
            input: objects.register_io(devices.input),
            output: objects.register_io(devices.output),
            stdout: objects.register_io(devices.stdout),
            stderr: objects.register_io(devices.stderr),
            thread: objects.register_thread(Arc::clone(&parker)),
        };

        Self {
            config,
            dialer,
            objects,
            parker,
            published,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// The thread of control the endpoint wakes at teardown
    pub fn parker(&self) -> &Arc<Parker> {
        &self.parker
    }

    /// Attach for one session and block until the endpoint ends it
    pub async fn connect(&self) -> Result<(), RrError> {
        let endpoint = self.config.endpoint_address();
        let local_ip = local_ip_for(&endpoint).await?;
        let server = RpcServer::bind(&Address::new(local_ip.to_string(), 0)).await?;
        let service = server.spawn(Arc::clone(&self.objects));
        tracing::debug!("Console service listening on {}", service.address());

        if let Err(e) = self.attach(service.address()).await {
            service.shutdown().await;
            return Err(e);
        }

        tracing::info!("Attached to {}", endpoint);
        self.parker.park().await;
        tracing::info!("Session on {} ended", endpoint);

        service.shutdown().await;
        Ok(())
    }

    /// Connect once, or forever in persist mode
    pub async fn run(&self) -> Result<(), RrError> {
        loop {
            self.connect().await?;
            if !self.config.persist {
                return Ok(());
            }
            tracing::info!(
                "Waiting for the next session on {}",
                self.config.endpoint_address()
            );
        }
    }

    /// Assign the console's objects, retrying connection failures when
    /// waiting or persisting. Returns the number of retries made.
    pub async fn attach(&self, service: &Address) -> Result<u32, RrError> {
        let mut retries = 0;

        loop {
            match self.try_attach(service).await {
                Ok(()) => return Ok(retries),
                Err(e) if e.is_connection() && self.config.retries() => {
                    retries += 1;
                    tracing::debug!(
                        "Endpoint {} unavailable: {}. Retrying in {:?}",
                        self.config.endpoint_address(),
                        e,
                        self.config.retry_interval
                    );
                    tokio::time::sleep(self.config.retry_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_attach(&self, service: &Address) -> Result<(), RrError> {
        let link = self.dialer.dial(&self.config.endpoint_address()).await?;

        if let Err(e) = link.ping().await {
            tracing::debug!("Cleanup probe failed: {}", e);
        }

        let ids = self.published;
        let mut fields = vec![
            (HandleField::Input, ids.input),
            (HandleField::Output, ids.output),
        ];
        if self.config.capture {
            fields.push((HandleField::Stdout, ids.stdout));
            fields.push((HandleField::Stderr, ids.stderr));
        }
        // Thread goes last: it completes the handle and releases the endpoint
        fields.push((HandleField::Thread, ids.thread));

        for (field, id) in fields {
            let reference = self.objects.reference(service, id).ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("{} not published", id))
            })?;
            link.assign(field, reference).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rr_core::{ConnectionError, RpcError};
    use rr_protocol::{ErrorCode, RemoteRef};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Link whose first `failures` dials fail to connect
    #[derive(Clone)]
    struct FlakyDialer {
        failures: u32,
        dials: Arc<AtomicU32>,
        assigned: Arc<Mutex<Vec<HandleField>>>,
        parker: Option<Arc<Parker>>,
        reject_assign: bool,
    }

    impl FlakyDialer {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                dials: Arc::new(AtomicU32::new(0)),
                assigned: Arc::new(Mutex::new(Vec::new())),
                parker: None,
                reject_assign: false,
            }
        }
    }

    struct FakeLink {
        up: bool,
        dialer: FlakyDialer,
    }

    fn refused() -> RpcError {
        ConnectionError::ConnectionRefused("127.0.0.1:9876".into()).into()
    }

    #[async_trait]
    impl HandleLink for FakeLink {
        async fn ping(&self) -> Result<(), RpcError> {
            if self.up {
                Ok(())
            } else {
                Err(refused())
            }
        }

        async fn assign(&self, field: HandleField, _object: RemoteRef) -> Result<(), RpcError> {
            if !self.up {
                return Err(refused());
            }
            if self.dialer.reject_assign {
                return Err(RpcError::Remote {
                    code: ErrorCode::AlreadyAssigned,
                    message: field.to_string(),
                });
            }
            self.dialer.assigned.lock().unwrap().push(field);
            if field == HandleField::Thread {
                if let Some(parker) = &self.dialer.parker {
                    // Stands in for the endpoint finishing its session
                    parker.wake();
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Dialer for FlakyDialer {
        type Link = FakeLink;

        async fn dial(&self, _address: &Address) -> Result<FakeLink, RpcError> {
            let attempt = self.dials.fetch_add(1, Ordering::SeqCst);
            Ok(FakeLink {
                up: attempt >= self.failures,
                dialer: self.clone(),
            })
        }
    }

    fn devices() -> Devices {
        Devices {
            input: LocalIoProxy::reader(BufReadInput::new(Cursor::new("")), None),
            output: LocalIoProxy::writer(io::sink()),
            stdout: LocalIoProxy::writer(io::sink()),
            stderr: LocalIoProxy::writer(io::sink()),
        }
    }

    fn config(wait: bool, persist: bool, capture: bool) -> ConsoleConfig {
        ConsoleConfig {
            wait,
            persist,
            capture,
            history_file: None,
            ..ConsoleConfig::default()
        }
    }

    fn service() -> Address {
        Address::new("127.0.0.1", 40000)
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_retries_every_second() {
        let dialer = FlakyDialer::new(3);
        let connector = Connector::with_dialer(config(true, false, true), devices(), dialer.clone());

        let started = Instant::now();
        let retries = connector.attach(&service()).await.unwrap();

        assert_eq!(retries, 3);
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_also_retries() {
        let dialer = FlakyDialer::new(1);
        let connector = Connector::with_dialer(config(false, true, true), devices(), dialer);
        assert_eq!(connector.attach(&service()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_no_retry_without_wait_or_persist() {
        let dialer = FlakyDialer::new(1);
        let connector = Connector::with_dialer(config(false, false, true), devices(), dialer.clone());

        let err = connector.attach(&service()).await.unwrap_err();
        assert!(err.is_connection());
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_rejection_is_not_retried() {
        let mut dialer = FlakyDialer::new(0);
        dialer.reject_assign = true;
        let connector = Connector::with_dialer(config(true, true, true), devices(), dialer.clone());

        let err = connector.attach(&service()).await.unwrap_err();
        assert!(!err.is_connection());
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_assignment_order_and_capture() {
        let dialer = FlakyDialer::new(0);
        let connector = Connector::with_dialer(config(false, false, true), devices(), dialer.clone());
        connector.attach(&service()).await.unwrap();
        assert_eq!(
            *dialer.assigned.lock().unwrap(),
            vec![
                HandleField::Input,
                HandleField::Output,
                HandleField::Stdout,
                HandleField::Stderr,
                HandleField::Thread
            ]
        );

        let dialer = FlakyDialer::new(0);
        let connector = Connector::with_dialer(config(false, false, false), devices(), dialer.clone());
        connector.attach(&service()).await.unwrap();
        assert_eq!(
            *dialer.assigned.lock().unwrap(),
            vec![HandleField::Input, HandleField::Output, HandleField::Thread]
        );
    }

    #[tokio::test]
    async fn test_connect_returns_once_woken() {
        let mut dialer = FlakyDialer::new(0);
        let template = Connector::with_dialer(config(false, false, true), devices(), dialer.clone());
        dialer.parker = Some(Arc::clone(template.parker()));

        // Rebuild with the wired dialer, sharing its parker
        let connector = Connector {
            dialer,
            ..template
        };
        tokio::time::timeout(Duration::from_secs(5), connector.connect())
            .await
            .unwrap()
            .unwrap();
    }
}
