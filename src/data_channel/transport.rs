use async_trait::async_trait;
use bytes::Bytes;

use super::ChannelState;
use crate::error::Result;

/// Seam between a [`DataChannel`](super::DataChannel) and the underlying
/// datagram-style transport (WebSocket, WebRTC data channel).
///
/// The transport must be message-preserving and ordered but may drop the
/// connection at any time. Adapters deliver each received wire chunk to
/// [`DataChannel::handle_chunk`](super::DataChannel::handle_chunk) and
/// implement this trait for the outbound direction.
#[async_trait]
pub trait ChunkTransport {
    /// Hands one wire chunk (tag byte included) to the transport.
    async fn send_chunk(&self, chunk: Bytes) -> Result<()>;

    /// Current ready state of the underlying connection.
    fn ready_state(&self) -> ChannelState;

    /// Closes the underlying connection.
    async fn close(&self) -> Result<()>;
}
