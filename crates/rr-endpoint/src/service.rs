//! RPC service publishing the session handle

use std::sync::Arc;

use async_trait::async_trait;

use rr_core::{RpcHandler, SessionError};
use rr_protocol::{ErrorCode, Message, ObjectId};

use crate::handle::SessionHandle;

/// Answers console requests on behalf of one session handle
pub struct HandleService {
    handle: Arc<SessionHandle>,
}

impl HandleService {
    pub fn new(handle: Arc<SessionHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl RpcHandler for HandleService {
    async fn handle(&self, message: Message) -> Message {
        match message {
            Message::Ping { nonce } => Message::Pong { nonce },
            Message::Assign { field, object } => match self.handle.assign(field, object) {
                Ok(()) => Message::Ack,
                Err(e @ SessionError::AlreadyAssigned(_)) => {
                    Message::error(ErrorCode::AlreadyAssigned, e.to_string())
                }
                Err(e) => Message::error(ErrorCode::Unknown, e.to_string()),
            },
            other => {
                tracing::debug!("Session handle ignoring {:?}", other.message_type());
                Message::error(
                    ErrorCode::InvalidMessage,
                    format!("{} only accepts Ping and Assign", ObjectId::HANDLE),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_protocol::{Address, HandleField, RemoteRef};

    fn service() -> (Arc<SessionHandle>, HandleService) {
        let handle = Arc::new(SessionHandle::new());
        (Arc::clone(&handle), HandleService::new(handle))
    }

    fn assign(field: HandleField, id: u32) -> Message {
        Message::Assign {
            field,
            object: RemoteRef::new(Address::new("10.0.0.5", 40000), ObjectId::new(id)),
        }
    }

    #[tokio::test]
    async fn test_ping_echoes_nonce() {
        let (_, service) = service();
        assert_eq!(
            service.handle(Message::Ping { nonce: 99 }).await,
            Message::Pong { nonce: 99 }
        );
    }

    #[tokio::test]
    async fn test_assign_populates_handle() {
        let (handle, service) = service();

        for (field, id) in [
            (HandleField::Input, 1),
            (HandleField::Output, 2),
            (HandleField::Thread, 3),
        ] {
            assert_eq!(service.handle(assign(field, id)).await, Message::Ack);
        }
        assert!(handle.is_populated());
    }

    #[tokio::test]
    async fn test_second_assign_rejected() {
        let (_, service) = service();
        service.handle(assign(HandleField::Output, 2)).await;

        let reply = service.handle(assign(HandleField::Output, 8)).await;
        assert!(matches!(
            reply,
            Message::Error {
                code: ErrorCode::AlreadyAssigned,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_repeated_assign_acked() {
        let (handle, service) = service();
        assert_eq!(service.handle(assign(HandleField::Input, 1)).await, Message::Ack);
        assert_eq!(service.handle(assign(HandleField::Input, 1)).await, Message::Ack);
        assert!(!handle.is_populated());
    }

    #[tokio::test]
    async fn test_other_requests_rejected() {
        let (_, service) = service();
        let reply = service
            .handle(Message::Wake {
                object: ObjectId::HANDLE,
            })
            .await;
        assert!(matches!(
            reply,
            Message::Error {
                code: ErrorCode::InvalidMessage,
                ..
            }
        ));
    }
}
