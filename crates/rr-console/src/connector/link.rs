//! How the connector reaches an endpoint's session handle

use async_trait::async_trait;

use rr_core::{RpcClient, RpcError};
use rr_protocol::{Address, HandleField, Message, ObjectId, RemoteRef};

/// A session handle the connector can probe and assign to
#[async_trait]
pub trait HandleLink: Send + Sync {
    /// Round-trip that flushes out a stale connection
    async fn ping(&self) -> Result<(), RpcError>;

    async fn assign(&self, field: HandleField, object: RemoteRef) -> Result<(), RpcError>;
}

/// Produces links to the session handle at an address
#[async_trait]
pub trait Dialer: Send + Sync {
    type Link: HandleLink;

    async fn dial(&self, address: &Address) -> Result<Self::Link, RpcError>;
}

/// Dials endpoints over TCP
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    type Link = RpcLink;

    async fn dial(&self, address: &Address) -> Result<RpcLink, RpcError> {
        Ok(RpcLink {
            client: RpcClient::new(address.clone()),
        })
    }
}

/// Session handle reached through an `RpcClient`
#[derive(Debug)]
pub struct RpcLink {
    client: RpcClient,
}

#[async_trait]
impl HandleLink for RpcLink {
    async fn ping(&self) -> Result<(), RpcError> {
        self.client.ping().await
    }

    async fn assign(&self, field: HandleField, object: RemoteRef) -> Result<(), RpcError> {
        match self.client.call(Message::Assign { field, object }).await? {
            Message::Ack => Ok(()),
            other => Err(RpcError::UnexpectedReply(format!(
                "{:?} assigning {} on {}",
                other,
                field,
                ObjectId::HANDLE
            ))),
        }
    }
}

