//! The session handle: where a console deposits its devices
//!
//! The endpoint creates one handle per session and publishes it as object 0
//! of its service. The console assigns references to its input, output,
//! thread of control and, optionally, its capture streams. The endpoint
//! waits until the mandatory fields are present, runs the session, and
//! finally wakes the console's thread through `kill`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use rr_core::SessionError;
use rr_protocol::{HandleField, RemoteRef};

use crate::input::InputProxy;
use crate::remote::{RemoteObject, ServicePool};

/// Current contents of a handle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleFields {
    pub input: Option<RemoteRef>,
    pub output: Option<RemoteRef>,
    pub thread: Option<RemoteRef>,
    pub stdout: Option<RemoteRef>,
    pub stderr: Option<RemoteRef>,
}

impl HandleFields {
    /// Input, output and thread are all present
    pub fn is_populated(&self) -> bool {
        self.input.is_some() && self.output.is_some() && self.thread.is_some()
    }

    pub fn get(&self, field: HandleField) -> Option<&RemoteRef> {
        self.slot(field).as_ref()
    }

    fn slot(&self, field: HandleField) -> &Option<RemoteRef> {
        match field {
            HandleField::Input => &self.input,
            HandleField::Output => &self.output,
            HandleField::Thread => &self.thread,
            HandleField::Stdout => &self.stdout,
            HandleField::Stderr => &self.stderr,
        }
    }

    fn slot_mut(&mut self, field: HandleField) -> &mut Option<RemoteRef> {
        match field {
            HandleField::Input => &mut self.input,
            HandleField::Output => &mut self.output,
            HandleField::Thread => &mut self.thread,
            HandleField::Stdout => &mut self.stdout,
            HandleField::Stderr => &mut self.stderr,
        }
    }
}

/// Rendezvous object shared by the endpoint and one console
pub struct SessionHandle {
    fields: watch::Sender<HandleFields>,
    pool: Arc<ServicePool>,
    killed: AtomicBool,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::with_pool(Arc::new(ServicePool::new()))
    }

    /// Handle whose remote calls go through `pool`
    pub fn with_pool(pool: Arc<ServicePool>) -> Self {
        let (fields, _) = watch::channel(HandleFields::default());
        Self {
            fields,
            pool,
            killed: AtomicBool::new(false),
        }
    }

    /// Store a reference in `field`.
    ///
    /// Every field is write-once. Assigning the reference a field already
    /// holds is accepted again, so a console that lost its connection halfway
    /// through can repeat its assignments.
    pub fn assign(&self, field: HandleField, reference: RemoteRef) -> Result<(), SessionError> {
        let mut accepted = false;
        let mut repeated = false;
        self.fields.send_if_modified(|fields| {
            let slot = fields.slot_mut(field);
            if let Some(current) = slot {
                repeated = *current == reference;
                return false;
            }
            *slot = Some(reference.clone());
            accepted = true;
            true
        });

        if repeated {
            tracing::debug!("Handle field '{}' re-assigned {}", field, reference);
            return Ok(());
        }
        if !accepted {
            tracing::warn!("Rejected second assignment of handle field '{}'", field);
            return Err(SessionError::AlreadyAssigned(field));
        }

        tracing::debug!("Handle field '{}' assigned {}", field, reference);
        Ok(())
    }

    /// Copy of the current fields
    pub fn fields(&self) -> HandleFields {
        self.fields.borrow().clone()
    }

    pub fn is_populated(&self) -> bool {
        self.fields.borrow().is_populated()
    }

    /// Block until input, output and thread have all been assigned
    pub async fn wait(&self) {
        let mut rx = self.fields.subscribe();
        // The sender lives in `self`, so the channel cannot close under us
        let _ = rx.wait_for(HandleFields::is_populated).await;
    }

    /// Resume the console's parked thread.
    ///
    /// Only the first call reaches the console; later calls do nothing.
    pub async fn kill(&self) -> Result<(), SessionError> {
        let thread = self
            .fields
            .borrow()
            .thread
            .clone()
            .ok_or(SessionError::NotAttached)?;

        if self.killed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Console thread {} already resumed", thread);
            return Ok(());
        }

        self.pool.object(thread).wake().await?;
        Ok(())
    }

    /// Whether `kill` has been called on an attached handle
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    /// Fresh input proxy over the assigned input
    pub fn input_proxy(&self) -> Result<InputProxy, SessionError> {
        let object = self.object(HandleField::Input).ok_or(SessionError::NotAttached)?;
        Ok(InputProxy::new(Arc::new(object)))
    }

    /// The assigned output, used as-is
    pub fn output(&self) -> Option<RemoteObject> {
        self.object(HandleField::Output)
    }

    pub fn stdout(&self) -> Option<RemoteObject> {
        self.object(HandleField::Stdout)
    }

    pub fn stderr(&self) -> Option<RemoteObject> {
        self.object(HandleField::Stderr)
    }

    /// Drop connections to the console's service
    pub fn disconnect(&self) {
        self.pool.close_all();
    }

    fn object(&self, field: HandleField) -> Option<RemoteObject> {
        let reference = self.fields.borrow().get(field).cloned()?;
        Some(self.pool.object(reference))
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("fields", &*self.fields.borrow())
            .field("killed", &self.is_killed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rr_core::{RpcHandler, RpcServer};
    use rr_protocol::{Address, ErrorCode, Message, ObjectId, ReadlineCapability};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn reference(id: u32) -> RemoteRef {
        RemoteRef::new(Address::new("127.0.0.1", 1), ObjectId::new(id))
    }

    async fn wait_returns(handle: &SessionHandle) -> bool {
        tokio::time::timeout(Duration::from_millis(50), handle.wait())
            .await
            .is_ok()
    }

    #[tokio::test]
    async fn test_wait_requires_input_output_and_thread() {
        let handle = SessionHandle::new();
        assert!(!wait_returns(&handle).await);

        handle.assign(HandleField::Input, reference(1)).unwrap();
        handle.assign(HandleField::Stdout, reference(4)).unwrap();
        handle.assign(HandleField::Stderr, reference(5)).unwrap();
        assert!(!wait_returns(&handle).await);

        handle.assign(HandleField::Output, reference(2)).unwrap();
        assert!(!wait_returns(&handle).await);

        handle.assign(HandleField::Thread, reference(3)).unwrap();
        assert!(wait_returns(&handle).await);
        assert!(handle.is_populated());
    }

    #[tokio::test]
    async fn test_wait_wakes_on_later_assignment() {
        let handle = Arc::new(SessionHandle::new());
        let waiter = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move { handle.wait().await })
        };

        tokio::task::yield_now().await;
        handle.assign(HandleField::Thread, reference(3)).unwrap();
        handle.assign(HandleField::Output, reference(2)).unwrap();
        handle.assign(HandleField::Input, reference(1)).unwrap();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_fields_are_write_once() {
        let handle = SessionHandle::new();
        handle.assign(HandleField::Input, reference(1)).unwrap();

        let err = handle.assign(HandleField::Input, reference(9)).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyAssigned(HandleField::Input)));
        assert_eq!(handle.fields().input, Some(reference(1)));
    }

    #[test]
    fn test_repeated_identical_assignment_is_accepted() {
        let handle = SessionHandle::new();
        handle.assign(HandleField::Input, reference(1)).unwrap();
        handle.assign(HandleField::Input, reference(1)).unwrap();
        assert_eq!(handle.fields().input, Some(reference(1)));

        // Same object id from another console service is a different writer
        let foreign = RemoteRef::new(Address::new("127.0.0.1", 2), ObjectId::new(1));
        let err = handle.assign(HandleField::Input, foreign).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyAssigned(HandleField::Input)));
    }

    #[test]
    fn test_input_proxy_uses_advertised_capability() {
        let handle = SessionHandle::new();
        assert!(matches!(
            handle.input_proxy(),
            Err(SessionError::NotAttached)
        ));

        handle
            .assign(
                HandleField::Input,
                reference(1).with_readline(ReadlineCapability::PromptAware),
            )
            .unwrap();
        let proxy = handle.input_proxy().unwrap();
        assert_eq!(proxy.capability(), ReadlineCapability::PromptAware);
        assert!(handle.stdout().is_none());
    }

    #[tokio::test]
    async fn test_kill_without_thread_is_not_attached() {
        let handle = SessionHandle::new();
        assert!(matches!(handle.kill().await, Err(SessionError::NotAttached)));
        assert!(!handle.is_killed());
    }

    struct WakeCounter(AtomicUsize);

    #[async_trait]
    impl RpcHandler for WakeCounter {
        async fn handle(&self, message: Message) -> Message {
            match message {
                Message::Wake { .. } => {
                    self.0.fetch_add(1, Ordering::SeqCst);
                    Message::Ack
                }
                _ => Message::error(ErrorCode::InvalidMessage, "unexpected"),
            }
        }
    }

    #[tokio::test]
    async fn test_kill_wakes_thread_exactly_once() {
        let counter = Arc::new(WakeCounter(AtomicUsize::new(0)));
        let server = RpcServer::bind(&Address::new("127.0.0.1", 0)).await.unwrap();
        let service = server.address().clone();
        let guard = server.spawn(Arc::clone(&counter));

        let handle = SessionHandle::new();
        handle
            .assign(HandleField::Thread, RemoteRef::new(service, ObjectId::new(7)))
            .unwrap();

        handle.kill().await.unwrap();
        handle.kill().await.unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert!(handle.is_killed());

        handle.disconnect();
        guard.shutdown().await;
    }

    #[tokio::test]
    async fn test_kill_reports_vanished_console() {
        let server = RpcServer::bind(&Address::new("127.0.0.1", 0)).await.unwrap();
        let service = server.address().clone();
        drop(server);

        let handle = SessionHandle::new();
        handle
            .assign(HandleField::Thread, RemoteRef::new(service, ObjectId::new(7)))
            .unwrap();

        match handle.kill().await {
            Err(SessionError::Rpc(e)) => assert!(e.is_connection()),
            other => panic!("expected connection failure, got {:?}", other),
        }
    }
}
