use bytes::Bytes;

use crate::adapter::Adapter;
use crate::codec::Codec;
use crate::engine::{dispatch, eof_error, Intent, Outcome};
use crate::error::Result;

const DEFAULT_STRING_CAP: usize = 1024;

/// The engine-backed view a protocol state machine reads and writes
/// through. Every method here either resolves straight from the codec's
/// buffer or issues intents against the adapter until it can.
pub struct Io<'a, A: Adapter> {
    codec: &'a mut Codec,
    adapter: &'a mut A,
}

impl<'a, A: Adapter> Io<'a, A> {
    pub fn new(codec: &'a mut Codec, adapter: &'a mut A) -> Self {
        Self { codec, adapter }
    }

    async fn fill(&mut self) -> Result<()> {
        match dispatch(self.adapter, Intent::Read).await? {
            Outcome::Data(data) if data.is_empty() => Err(eof_error()),
            Outcome::Data(data) => {
                self.codec.feed(data);
                Ok(())
            }
            Outcome::Unit => unreachable!("Intent::Read always yields Outcome::Data"),
        }
    }

    /// Never returns fewer than `n` bytes; fails on end-of-stream first.
    pub async fn read_exactly(&mut self, n: usize, put_back: bool) -> Result<Bytes> {
        loop {
            if let Some(bytes) = self.codec.try_read_exactly(n, put_back) {
                return Ok(bytes);
            }
            self.fill().await?;
        }
    }

    pub async fn read_until(
        &mut self,
        delim: u8,
        max_size: Option<usize>,
        put_back: bool,
    ) -> Result<Bytes> {
        loop {
            if let Some(bytes) = self.codec.try_read_until(delim, max_size, put_back)? {
                return Ok(bytes);
            }
            self.fill().await?;
        }
    }

    pub async fn read_u8(&mut self, put_back: bool) -> Result<u8> {
        let bytes = self.read_exactly(1, put_back).await?;
        Ok(bytes[0])
    }

    pub async fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_exactly(2, false).await?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub async fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        self.read_exactly(n, false).await
    }

    /// Reads until a NUL byte (subject to `max_size`), consumes the NUL,
    /// and decodes the preceding bytes per the codec's configured
    /// encoding.
    pub async fn read_c_string(&mut self, max_size: usize) -> Result<String> {
        let raw = self.read_until(0x00, Some(max_size), false).await?;
        self.read_exactly(1, false).await?; // consume the NUL itself
        self.codec.encoding().decode(&raw)
    }

    /// Reads a one-byte length prefix followed by that many bytes, decoded
    /// per the codec's configured encoding.
    pub async fn read_pascal_string(&mut self) -> Result<String> {
        let len = self.read_u8(false).await? as usize;
        let raw = self.read_exactly(len, false).await?;
        self.codec.encoding().decode(&raw)
    }

    pub async fn write(&mut self, bytes: Bytes) -> Result<()> {
        dispatch(self.adapter, Intent::Write(bytes)).await?;
        Ok(())
    }

    pub async fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write(Bytes::copy_from_slice(&[value])).await
    }

    pub async fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write(Bytes::copy_from_slice(&value.to_be_bytes()))
            .await
    }

    pub async fn write_bytes(&mut self, bytes: impl Into<Bytes>) -> Result<()> {
        self.write(bytes.into()).await
    }

    /// Encodes `s` per the codec's configured encoding, appends a NUL, and
    /// writes it in one call.
    pub async fn write_c_string(&mut self, s: &str) -> Result<()> {
        let mut buf = self.codec.encoding().encode(s);
        buf.push(0x00);
        self.write_bytes(buf).await
    }

    /// Encodes `s` per the codec's configured encoding and writes it behind
    /// a one-byte length prefix. The prefix counts encoded bytes, not `str`
    /// bytes, since `Encoding::Raw` can encode to a different byte count
    /// than `s.len()`.
    pub async fn write_pascal_string(&mut self, s: &str) -> Result<()> {
        let mut buf = self.codec.encoding().encode(s);
        if buf.len() > 255 {
            return Err(crate::error::SocksError::StringTooLong(buf.len()));
        }
        let mut framed = Vec::with_capacity(buf.len() + 1);
        framed.push(buf.len() as u8);
        framed.append(&mut buf);
        self.write_bytes(framed).await
    }

    pub async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        dispatch(
            self.adapter,
            Intent::Connect {
                host: host.to_string(),
                port,
            },
        )
        .await?;
        Ok(())
    }

    pub async fn passthrough(&mut self) -> Result<()> {
        dispatch(self.adapter, Intent::Passthrough).await?;
        Ok(())
    }
}

pub(crate) const DEFAULT_MAX_STRING: usize = DEFAULT_STRING_CAP;
