//! Proxies for objects living in the console process
//!
//! The console never ships its devices across the connection; it hands out
//! `RemoteRef`s. A `RemoteObject` turns such a reference back into something
//! the REPL can read from and write to, with every operation executed by the
//! console on its own devices.

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use rr_core::{LineSource, OutputSink, RpcClient, RpcError};
use rr_protocol::{Address, Message, OutputOp, ReadlineCapability, RemoteRef};

/// Clients for every console service this endpoint talks to
#[derive(Default)]
pub struct ServicePool {
    clients: DashMap<Address, Arc<RpcClient>>,
}

impl ServicePool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Client for `address`, created on first use
    pub fn client(&self, address: &Address) -> Arc<RpcClient> {
        let entry = self
            .clients
            .entry(address.clone())
            .or_insert_with(|| Arc::new(RpcClient::new(address.clone())));
        Arc::clone(&entry)
    }

    /// Proxy for a referenced object
    pub fn object(&self, reference: RemoteRef) -> RemoteObject {
        let client = self.client(&reference.service);
        RemoteObject { client, reference }
    }

    /// Drop every pooled connection
    pub fn close_all(&self) {
        for entry in self.clients.iter() {
            entry.value().close_idle();
        }
        self.clients.clear();
    }

    /// Number of services known
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Check if pool is empty
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// An object hosted by the console, used through its reference
#[derive(Clone)]
pub struct RemoteObject {
    client: Arc<RpcClient>,
    reference: RemoteRef,
}

impl RemoteObject {
    /// The reference this proxy was built from
    pub fn reference(&self) -> &RemoteRef {
        &self.reference
    }

    /// Resume the console thread this object stands for
    pub async fn wake(&self) -> Result<(), RpcError> {
        let reply = self
            .client
            .call(Message::Wake {
                object: self.reference.object,
            })
            .await?;
        expect_ack(reply)
    }

    /// Write pre-formatted text, e.g. `output.printf(format_args!("{:>4}", n))`
    pub async fn printf(&self, args: fmt::Arguments<'_>) -> io::Result<()> {
        let text = args.to_string();
        self.output(OutputOp::Printf(text)).await
    }

    async fn output(&self, op: OutputOp) -> io::Result<()> {
        let reply = self
            .client
            .call(Message::Output {
                object: self.reference.object,
                op,
            })
            .await?;
        Ok(expect_ack(reply)?)
    }
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RemoteObject")
            .field(&self.reference.to_string())
            .finish()
    }
}

fn expect_ack(reply: Message) -> Result<(), RpcError> {
    match reply {
        Message::Ack => Ok(()),
        other => Err(RpcError::UnexpectedReply(format!("{:?}", other))),
    }
}

#[async_trait]
impl LineSource for RemoteObject {
    fn readline_capability(&self) -> Option<ReadlineCapability> {
        self.reference.readline
    }

    async fn read_line(&self, prompt: Option<&str>) -> io::Result<Option<String>> {
        let reply = self
            .client
            .call(Message::Readline {
                object: self.reference.object,
                prompt: prompt.map(str::to_string),
            })
            .await?;

        match reply {
            Message::Line(line) => Ok(line),
            other => Err(RpcError::UnexpectedReply(format!("{:?}", other)).into()),
        }
    }

    fn supports_completion(&self) -> bool {
        self.reference.completion
    }

    async fn set_completion(&self, candidates: Vec<String>) -> io::Result<()> {
        let reply = self
            .client
            .call(Message::SetCompletion {
                object: self.reference.object,
                candidates,
            })
            .await?;
        Ok(expect_ack(reply)?)
    }

    async fn completion(&self) -> io::Result<Option<Vec<String>>> {
        let reply = self
            .client
            .call(Message::GetCompletion {
                object: self.reference.object,
            })
            .await?;

        match reply {
            Message::Completion(candidates) => Ok(candidates),
            other => Err(RpcError::UnexpectedReply(format!("{:?}", other)).into()),
        }
    }
}

#[async_trait]
impl OutputSink for RemoteObject {
    async fn write(&self, data: &[u8]) -> io::Result<()> {
        self.output(OutputOp::Write(Bytes::copy_from_slice(data)))
            .await
    }

    async fn print(&self, text: &str) -> io::Result<()> {
        self.output(OutputOp::Print(vec![text.to_string()])).await
    }

    async fn puts(&self, line: &str) -> io::Result<()> {
        self.output(OutputOp::Puts(vec![line.to_string()])).await
    }

    /// A proxied device never claims to be a terminal
    fn is_tty(&self) -> bool {
        false
    }
}
