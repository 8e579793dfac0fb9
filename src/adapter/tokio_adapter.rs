use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use super::{Adapter, DEFAULT_BLOCK_SIZE};
use crate::error::Result;

/// Reference transport adapter over any `AsyncRead + AsyncWrite` inbound
/// stream (typically a `tokio::net::TcpStream` accepted by a listener the
/// embedding application owns) and a `tokio::net::TcpStream` outbound
/// connection opened on demand by `connect`.
///
/// Splits the inbound stream once and relays both directions concurrently,
/// racing the two halves so whichever side closes first tears down the
/// other.
pub struct TokioAdapter<S> {
    inbound_read: ReadHalf<S>,
    inbound_write: WriteHalf<S>,
    outbound: Option<TcpStream>,
}

impl<S> TokioAdapter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(inbound: S) -> Self {
        let (inbound_read, inbound_write) = split(inbound);
        Self {
            inbound_read,
            inbound_write,
            outbound: None,
        }
    }
}

#[async_trait]
impl<S> Adapter for TokioAdapter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read(&mut self) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(DEFAULT_BLOCK_SIZE);
        let n = self.inbound_read.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf.freeze())
    }

    async fn write(&mut self, data: Bytes) -> Result<()> {
        self.inbound_write.write_all(&data).await?;
        self.inbound_write.flush().await?;
        Ok(())
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        debug!(host, port, "opening outbound connection");
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        self.outbound = Some(stream);
        Ok(())
    }

    async fn passthrough(&mut self) -> Result<()> {
        let outbound = self
            .outbound
            .take()
            .expect("passthrough requires a prior successful connect");
        debug!("passthrough started");
        let (mut out_read, mut out_write) = outbound.into_split();

        let upload = relay(&mut self.inbound_read, &mut out_write);
        let download = relay(&mut out_read, &mut self.inbound_write);

        // Whichever direction finishes first wins; tokio::select! drops
        // (cancels) the other in-flight future before returning, so both
        // halves are released deterministically.
        tokio::select! {
            result = upload => result,
            result = download => result,
        }
    }
}

async fn relay<R, W>(reader: &mut R, writer: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; DEFAULT_BLOCK_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
    }
}
