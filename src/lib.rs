// rustsocks-proto - sans-I/O SOCKS4/SOCKS4A/SOCKS5 protocol core

pub mod adapter;
pub mod client;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod io;
pub mod socks4;
pub mod socks5;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SocksError};

pub use adapter::{memory_pair, Adapter, MemoryAdapter, TokioAdapter};
pub use client::{Client, SocksClient};
pub use codec::{Codec, Encoding};
pub use config::{ClientPolicy, Credentials, ServerPolicy};
pub use dispatcher::{Dispatcher, SocksServer};
pub use engine::{run_engine, Intent, StateMachine};
pub use io::Io;
pub use socks4::{Socks4Client, Socks4Server};
pub use socks5::{Socks5Client, Socks5Server};
pub use types::{Address, AuthMethod, ReplyCode, Socks4Reply};
