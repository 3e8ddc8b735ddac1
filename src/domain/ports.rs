use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::domain::errors::LinkError;

// Invoked by a transport when the peer drops the connection.
pub type DisconnectCallback = Box<dyn Fn() + Send + Sync + 'static>;

// Port for discovering a peer that offers the command service.
#[async_trait]
pub trait LinkProvider: Send + Sync {
    async fn request_peer(&self, service: Uuid) -> Result<Arc<dyn Peer>, LinkError>;
}

#[async_trait]
pub trait Peer: Send + Sync {
    fn name(&self) -> String;
    async fn connect_transport(&self) -> Result<Arc<dyn Transport>, LinkError>;
}

// An established connection to one peer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn service(&self, id: Uuid) -> Result<Arc<dyn Service>, LinkError>;
    /// Registers the callback fired when the connection drops for any reason.
    fn on_disconnect(&self, callback: DisconnectCallback);
    async fn disconnect(&self) -> Result<(), LinkError>;
}

#[async_trait]
pub trait Service: Send + Sync {
    async fn characteristic(&self, id: Uuid) -> Result<Arc<dyn Characteristic>, LinkError>;
}

#[async_trait]
pub trait Characteristic: Send + Sync {
    /// Fire-and-forget write; success only means the bytes left this side.
    async fn write_without_response(&self, bytes: &[u8]) -> Result<(), LinkError>;
    /// Stream of inbound notification payloads.
    async fn subscribe(&self) -> Result<BoxStream<'static, Vec<u8>>, LinkError>;
}
