//! Decorates a [`TokioAdapter`] with a toy byte-shift cipher on both
//! directions, then runs an ordinary SOCKS5 [`Dispatcher`] on top of it.
//! Demonstrates that the protocol state machines don't know or care what
//! sits underneath the [`Adapter`] trait: obfuscation, compression, or a
//! nested tunnel can all be layered in without touching `socks4`/`socks5`.
//!
//! Not part of the core library; built as a standalone example.
//!
//! Usage:
//!   cargo run --example shadowsocks_like -- --listen 127.0.0.1:1081

use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use clap::Parser;
use rustsocks_proto::{run_engine, Adapter, Codec, Dispatcher, Encoding, Io, Result, ServerPolicy, TokioAdapter};
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "shadowsocks_like")]
struct Args {
    /// Address this relay listens on for obfuscated SOCKS5 connections.
    #[arg(long, default_value = "127.0.0.1:1081")]
    listen: SocketAddr,
}

// This is very strong encryption method, believe me!
fn encode(data: &[u8]) -> Bytes {
    let shifted: Vec<u8> = data.iter().map(|b| b.wrapping_add(1)).collect();
    Bytes::from(shifted)
}

fn decode(data: &[u8]) -> Bytes {
    let shifted: Vec<u8> = data.iter().map(|b| b.wrapping_sub(1)).collect();
    Bytes::from(shifted)
}

/// Wraps any [`Adapter`] so every byte read is decoded and every byte
/// written is encoded, transparently to whatever protocol sits on top.
struct CipherAdapter<A> {
    inner: A,
}

#[async_trait]
impl<A: Adapter> Adapter for CipherAdapter<A> {
    async fn read(&mut self) -> Result<Bytes> {
        let raw = self.inner.read().await?;
        Ok(decode(&raw))
    }

    async fn write(&mut self, data: Bytes) -> Result<()> {
        self.inner.write(encode(&data)).await
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        self.inner.connect(host, port).await
    }

    async fn passthrough(&mut self) -> Result<()> {
        // The final hop to the real destination runs in the clear; only
        // the client-facing side of this process is obfuscated.
        self.inner.passthrough().await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let listener = TcpListener::bind(args.listen).await?;
    info!(listen = %args.listen, "shadowsocks-like relay listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        tokio::spawn(async move {
            if let Err(err) = handle(stream).await {
                error!(%peer, %err, "relay connection failed");
            }
        });
    }
}

async fn handle(stream: tokio::net::TcpStream) -> anyhow::Result<()> {
    let mut adapter = CipherAdapter {
        inner: TokioAdapter::new(stream),
    };
    let mut codec = Codec::new(Encoding::Utf8);
    let mut io = Io::new(&mut codec, &mut adapter);
    run_engine(Dispatcher::new(ServerPolicy::new()), &mut io).await?;
    Ok(())
}
