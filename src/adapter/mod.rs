mod memory;
mod tokio_adapter;

pub use memory::{memory_pair, MemoryAdapter};
pub use tokio_adapter::TokioAdapter;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Default chunk size read and relayed at a time.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// The narrow capability an [`crate::engine::StateMachine`] needs from its
/// transport, regardless of whether the transport is a real socket, a
/// polled event loop, or an in-memory byte fabric used in tests.
///
/// Implementors own the inbound (and, once `connect` succeeds, outbound)
/// byte streams and must release them on every exit path — success,
/// protocol error, transport error, or cancellation.
#[async_trait]
pub trait Adapter: Send {
    /// Returns up to a block of bytes from the inbound stream. An empty
    /// return means end of stream.
    async fn read(&mut self) -> Result<Bytes>;

    /// Writes `data` to the inbound stream, flushing it.
    async fn write(&mut self, data: Bytes) -> Result<()>;

    /// Opens the outbound side to `host:port`.
    async fn connect(&mut self, host: &str, port: u16) -> Result<()>;

    /// Relays bytes bidirectionally between the inbound and outbound
    /// streams until either side closes.
    async fn passthrough(&mut self) -> Result<()>;
}
