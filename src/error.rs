use thiserror::Error;

/// Unified error type for the SOCKS protocol core.
///
/// Every failure mode the core can produce collapses into one of these
/// variants; there is deliberately no separate hierarchy per protocol
/// version, since the engine and the embedding application both need to
/// react to the same handful of shapes (protocol violation, auth failure,
/// policy rejection, transport I/O) regardless of whether SOCKS4 or SOCKS5
/// was in play.
#[derive(Debug, Error)]
pub enum SocksError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("policy rejected: {0}")]
    Policy(String),

    #[error("unexpected end of data")]
    UnexpectedEof,

    #[error("unsupported command: 0x{0:02x}")]
    UnsupportedCommand(u8),

    #[error("unsupported address type: 0x{0:02x}")]
    UnsupportedAddressType(u8),

    #[error("string exceeds maximum length: {0}")]
    StringTooLong(usize),
}

pub type Result<T> = std::result::Result<T, SocksError>;
