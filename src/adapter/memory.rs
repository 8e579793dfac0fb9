use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::Adapter;
use crate::error::Result;

/// An in-memory transport adapter backed by channels instead of a network
/// socket.
///
/// Two uses:
/// - a single standalone adapter, fed canned bytes with [`MemoryAdapter::feed`]
///   and inspected with [`MemoryAdapter::written`], to drive one protocol
///   state machine under test without any I/O;
/// - a connected pair built with [`memory_pair`], so a client state machine
///   and a server state machine can be run against each other in the same
///   process (property I5). Dropping one adapter closes its sender, which
///   the peer observes as end-of-stream on its next `read`, exactly as a
///   closed socket would.
pub struct MemoryAdapter {
    read_rx: UnboundedReceiver<Bytes>,
    read_tx: Option<UnboundedSender<Bytes>>,
    write_tx: UnboundedSender<Bytes>,
    write_rx: Option<UnboundedReceiver<Bytes>>,
    connected: bool,
    fail_connect: bool,
}

impl MemoryAdapter {
    /// A standalone adapter: data fed with [`feed`](Self::feed) is what
    /// `read()` returns; data the protocol writes accumulates for
    /// [`written`](Self::written).
    pub fn standalone() -> Self {
        let (read_tx, read_rx) = mpsc::unbounded_channel();
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        Self {
            read_rx,
            read_tx: Some(read_tx),
            write_tx,
            write_rx: Some(write_rx),
            connected: false,
            fail_connect: false,
        }
    }

    /// Queues bytes for the next `read()` call(s).
    pub fn feed(&self, data: impl Into<Bytes>) {
        if let Some(tx) = &self.read_tx {
            let _ = tx.send(data.into());
        }
    }

    /// Makes the next (and every subsequent) `connect()` call fail, to
    /// exercise the upstream-connect-failure reply path.
    pub fn fail_connect(&mut self) {
        self.fail_connect = true;
    }

    /// Signals end-of-stream to the adapter's own reads (as if the peer
    /// had closed its side).
    pub fn close_read(&mut self) {
        self.read_tx = None;
    }

    /// Drains everything written so far, in write order.
    pub fn written(&mut self) -> Bytes {
        let mut out = Vec::new();
        if let Some(rx) = &mut self.write_rx {
            while let Ok(chunk) = rx.try_recv() {
                out.extend_from_slice(&chunk);
            }
        }
        Bytes::from(out)
    }

    pub fn did_connect(&self) -> bool {
        self.connected
    }
}

/// Builds a connected pair: bytes one side writes become reads on the
/// other.
pub fn memory_pair() -> (MemoryAdapter, MemoryAdapter) {
    let (client_to_server_tx, client_to_server_rx) = mpsc::unbounded_channel();
    let (server_to_client_tx, server_to_client_rx) = mpsc::unbounded_channel();

    let client = MemoryAdapter {
        read_rx: server_to_client_rx,
        read_tx: None,
        write_tx: client_to_server_tx,
        write_rx: None,
        connected: false,
        fail_connect: false,
    };
    let server = MemoryAdapter {
        read_rx: client_to_server_rx,
        read_tx: None,
        write_tx: server_to_client_tx,
        write_rx: None,
        connected: false,
        fail_connect: false,
    };
    (client, server)
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn read(&mut self) -> Result<Bytes> {
        match self.read_rx.recv().await {
            Some(data) => Ok(data),
            None => Ok(Bytes::new()),
        }
    }

    async fn write(&mut self, data: Bytes) -> Result<()> {
        let _ = self.write_tx.send(data);
        Ok(())
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        if self.fail_connect {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("simulated connect failure to {host}:{port}"),
            )
            .into());
        }
        self.connected = true;
        Ok(())
    }

    async fn passthrough(&mut self) -> Result<()> {
        Ok(())
    }
}
