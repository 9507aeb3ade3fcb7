//! The console's callback service
//!
//! Publishes the local I/O proxies and the parked thread of control to the
//! endpoint. Device I/O blocks, so it runs on the blocking pool.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;

use rr_core::RpcHandler;
use rr_protocol::{Address, ErrorCode, Message, ObjectId, OutputOp, RemoteRef};

use crate::proxy::LocalIoProxy;

/// The console's thread of control, parked while a session runs
#[derive(Debug, Default)]
pub struct Parker {
    notify: Notify,
}

impl Parker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until woken. A wake that arrived first is not lost.
    pub async fn park(&self) {
        self.notify.notified().await;
    }

    pub fn wake(&self) {
        self.notify.notify_one();
    }
}

/// Something the console publishes
#[derive(Clone)]
pub enum LocalObject {
    Io(Arc<Mutex<LocalIoProxy>>),
    Thread(Arc<Parker>),
}

/// Objects published by the console, keyed by id
pub struct ObjectTable {
    objects: DashMap<ObjectId, LocalObject>,
    next_id: AtomicU32,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            // 0 is reserved for the endpoint's session handle
            next_id: AtomicU32::new(1),
        }
    }

    pub fn register_io(&self, proxy: LocalIoProxy) -> ObjectId {
        self.insert(LocalObject::Io(Arc::new(Mutex::new(proxy))))
    }

    pub fn register_thread(&self, parker: Arc<Parker>) -> ObjectId {
        self.insert(LocalObject::Thread(parker))
    }

    pub fn get(&self, id: ObjectId) -> Option<LocalObject> {
        self.objects.get(&id).map(|entry| entry.value().clone())
    }

    /// Reference to object `id` as reachable through `service`
    pub fn reference(&self, service: &Address, id: ObjectId) -> Option<RemoteRef> {
        match self.get(id)? {
            LocalObject::Io(proxy) => Some(lock(&proxy).remote_ref(service, id)),
            LocalObject::Thread(_) => Some(RemoteRef::new(service.clone(), id)),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn insert(&self, object: LocalObject) -> ObjectId {
        let id = ObjectId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.objects.insert(id, object);
        id
    }

    fn io(&self, id: ObjectId) -> Result<Arc<Mutex<LocalIoProxy>>, Message> {
        match self.get(id) {
            Some(LocalObject::Io(proxy)) => Ok(proxy),
            Some(LocalObject::Thread(_)) => Err(Message::error(
                ErrorCode::Unsupported,
                format!("{} is not an I/O object", id),
            )),
            None => Err(not_found(id)),
        }
    }
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RpcHandler for ObjectTable {
    async fn handle(&self, message: Message) -> Message {
        match message {
            Message::Ping { nonce } => Message::Pong { nonce },

            Message::Readline { object, prompt } => {
                let proxy = match self.io(object) {
                    Ok(proxy) => proxy,
                    Err(reply) => return reply,
                };
                match blocking(proxy, move |p| p.readline(prompt.as_deref())).await {
                    Ok(line) => Message::Line(line),
                    Err(e) => io_error(e),
                }
            }

            Message::Output { object, op } => {
                let proxy = match self.io(object) {
                    Ok(proxy) => proxy,
                    Err(reply) => return reply,
                };
                let result = blocking(proxy, move |p| match &op {
                    OutputOp::Write(data) => p.write(data),
                    OutputOp::Print(parts) => p.print(parts),
                    OutputOp::Printf(text) => p.printf(text),
                    OutputOp::Puts(lines) => p.puts(lines),
                })
                .await;
                match result {
                    Ok(()) => Message::Ack,
                    Err(e) => io_error(e),
                }
            }

            Message::SetCompletion { object, candidates } => match self.io(object) {
                Ok(proxy) => {
                    lock(&proxy).set_completion(candidates);
                    Message::Ack
                }
                Err(reply) => reply,
            },

            Message::GetCompletion { object } => match self.io(object) {
                Ok(proxy) => Message::Completion(lock(&proxy).completion()),
                Err(reply) => reply,
            },

            Message::Wake { object } => match self.get(object) {
                Some(LocalObject::Thread(parker)) => {
                    tracing::debug!("Woken by endpoint");
                    parker.wake();
                    Message::Ack
                }
                Some(LocalObject::Io(_)) => Message::error(
                    ErrorCode::Unsupported,
                    format!("{} is not a thread", object),
                ),
                None => not_found(object),
            },

            other => Message::error(
                ErrorCode::InvalidMessage,
                format!("console does not accept {:?}", other.message_type()),
            ),
        }
    }
}

/// Run a device operation on the blocking pool
async fn blocking<T, F>(proxy: Arc<Mutex<LocalIoProxy>>, op: F) -> io::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut LocalIoProxy) -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&mut *lock(&proxy)))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

fn lock(proxy: &Mutex<LocalIoProxy>) -> std::sync::MutexGuard<'_, LocalIoProxy> {
    proxy.lock().unwrap_or_else(|e| e.into_inner())
}

fn not_found(id: ObjectId) -> Message {
    Message::error(ErrorCode::ObjectNotFound, format!("no {}", id))
}

fn io_error(err: io::Error) -> Message {
    let code = match err.kind() {
        io::ErrorKind::Unsupported => ErrorCode::Unsupported,
        _ => ErrorCode::Io,
    };
    Message::error(code, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::BufReadInput;
    use bytes::Bytes;
    use std::io::{Cursor, Write};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn table() -> (ObjectTable, ObjectId, ObjectId, ObjectId, Shared, Arc<Parker>) {
        let table = ObjectTable::new();
        let out = Shared::default();
        let parker = Arc::new(Parker::new());

        let input = table.register_io(LocalIoProxy::reader(
            BufReadInput::new(Cursor::new("first\n")),
            Some(Box::new(out.clone())),
        ));
        let output = table.register_io(LocalIoProxy::writer(out.clone()));
        let thread = table.register_thread(Arc::clone(&parker));
        (table, input, output, thread, out, parker)
    }

    #[tokio::test]
    async fn test_readline_executes_locally() {
        let (table, input, _, _, out, _) = table();

        let reply = table
            .handle(Message::Readline {
                object: input,
                prompt: Some("> ".into()),
            })
            .await;
        assert_eq!(reply, Message::Line(Some("first".into())));

        let reply = table
            .handle(Message::Readline {
                object: input,
                prompt: Some("> ".into()),
            })
            .await;
        assert_eq!(reply, Message::Line(None));
        assert_eq!(out.0.lock().unwrap().as_slice(), b"> > ");
    }

    #[tokio::test]
    async fn test_output_ops() {
        let (table, _, output, _, out, _) = table();

        for op in [
            OutputOp::Write(Bytes::from_static(b"a")),
            OutputOp::Print(vec!["b".into()]),
            OutputOp::Printf("c".into()),
            OutputOp::Puts(vec!["d".into()]),
        ] {
            assert_eq!(table.handle(Message::Output { object: output, op }).await, Message::Ack);
        }
        assert_eq!(out.0.lock().unwrap().as_slice(), b"abcd\n");
    }

    #[tokio::test]
    async fn test_wrong_object_kinds() {
        let (table, input, _, thread, _, _) = table();

        let reply = table
            .handle(Message::Output {
                object: input,
                op: OutputOp::Printf("x".into()),
            })
            .await;
        assert!(matches!(reply, Message::Error { code: ErrorCode::Unsupported, .. }));

        let reply = table.handle(Message::Wake { object: input }).await;
        assert!(matches!(reply, Message::Error { code: ErrorCode::Unsupported, .. }));

        let reply = table.handle(Message::GetCompletion { object: thread }).await;
        assert!(matches!(reply, Message::Error { code: ErrorCode::Unsupported, .. }));

        let reply = table.handle(Message::Wake { object: ObjectId::new(99) }).await;
        assert!(matches!(reply, Message::Error { code: ErrorCode::ObjectNotFound, .. }));
    }

    #[tokio::test]
    async fn test_wake_releases_parker() {
        let (table, _, _, thread, _, parker) = table();

        assert_eq!(table.handle(Message::Wake { object: thread }).await, Message::Ack);
        tokio::time::timeout(Duration::from_secs(1), parker.park())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_completion_without_editor() {
        let (table, input, _, _, _, _) = table();

        let reply = table
            .handle(Message::SetCompletion {
                object: input,
                candidates: vec!["x".into()],
            })
            .await;
        assert_eq!(reply, Message::Ack);
        assert_eq!(
            table.handle(Message::GetCompletion { object: input }).await,
            Message::Completion(None)
        );
    }

    #[test]
    fn test_references() {
        let (table, input, output, thread, _, _) = table();
        let service = Address::new("10.0.0.2", 41000);

        assert!(table.reference(&service, input).unwrap().readline.is_some());
        assert!(table.reference(&service, output).unwrap().readline.is_none());
        assert_eq!(table.reference(&service, thread).unwrap().object, thread);
        assert!(table.reference(&service, ObjectId::new(50)).is_none());
        assert_eq!(table.len(), 3);
    }
}
