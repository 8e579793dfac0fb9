use crate::adapter::Adapter;
use crate::config::ClientPolicy;
use crate::error::{Result, SocksError};
use crate::io::Io;
use crate::socks4::Socks4Client;
use crate::socks5::Socks5Client;
use crate::types::{SOCKS4_VERSION, SOCKS5_VERSION};

/// Client-side handshake, picked by [`ClientPolicy::version`]. Constructed
/// via [`SocksClient::new`].
#[derive(Debug, Clone)]
pub enum Client {
    V4(Socks4Client),
    V5(Socks5Client),
}

impl Client {
    /// Builds a client for `host:port` under `policy`.
    ///
    /// Fails before any I/O happens if the combination is nonsensical: a
    /// SOCKS4 request carrying a username/password pair has nowhere to put
    /// it, since SOCKS4's only credential field is the unauthenticated
    /// USERID string.
    pub fn new(host: impl Into<String>, port: u16, policy: ClientPolicy) -> Result<Self> {
        let host = host.into();
        match policy.version {
            SOCKS4_VERSION => {
                if policy.credentials.is_some() {
                    return Err(SocksError::Policy(
                        "SOCKS4 has no username/password subnegotiation; use socks4_user_id \
                         or switch to SOCKS5"
                            .to_string(),
                    ));
                }
                Ok(Client::V4(Socks4Client::new(
                    host,
                    port,
                    policy.socks4_user_id,
                )))
            }
            SOCKS5_VERSION => Ok(Client::V5(Socks5Client::new(host, port, policy.credentials))),
            other => Err(SocksError::Protocol(format!(
                "unsupported SOCKS client version {other}"
            ))),
        }
    }

    pub async fn run<A: Adapter>(self, io: &mut Io<'_, A>) -> Result<()> {
        match self {
            Client::V4(client) => client.run(io).await,
            Client::V5(client) => client.run(io).await,
        }
    }
}

/// Factory for client-side handshakes, named to mirror [`crate::dispatcher::SocksServer`].
pub struct SocksClient;

impl SocksClient {
    pub fn new(host: impl Into<String>, port: u16, policy: ClientPolicy) -> Result<Client> {
        Client::new(host, port, policy)
    }
}

/// Runs a full client connection end to end: allocates a fresh [`Codec`],
/// wires it to `adapter`, and drives the handshake.
pub async fn connect<A: Adapter>(
    host: impl Into<String>,
    port: u16,
    policy: ClientPolicy,
    adapter: &mut A,
) -> Result<()> {
    let encoding = policy.encoding;
    let client = Client::new(host, port, policy)?;
    let mut codec = crate::codec::Codec::new(encoding);
    let mut io = Io::new(&mut codec, adapter);
    client.run(&mut io).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::codec::{Codec, Encoding};
    use crate::config::Credentials;

    #[test]
    fn socks4_with_credentials_is_rejected_before_any_io() {
        let policy = ClientPolicy::new(SOCKS4_VERSION).with_credentials(Credentials::new("a", "b"));
        let err = Client::new("example.com", 80, policy).unwrap_err();
        assert!(matches!(err, SocksError::Policy(_)));
    }

    #[tokio::test]
    async fn builds_and_runs_a_socks4_client() {
        let mut adapter = MemoryAdapter::standalone();
        adapter.feed(vec![0x00, 0x5A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let mut codec = Codec::new(Encoding::Utf8);
        let mut io = Io::new(&mut codec, &mut adapter);
        let client = Client::new("127.0.0.1", 123, ClientPolicy::new(SOCKS4_VERSION)).unwrap();
        client.run(&mut io).await.unwrap();
        assert_eq!(
            &adapter.written()[..],
            &[0x04, 0x01, 0x00, 0x7B, 0x7F, 0x00, 0x00, 0x01, 0x00][..]
        );
    }

    #[tokio::test]
    async fn builds_and_runs_a_socks5_client() {
        let mut adapter = MemoryAdapter::standalone();
        adapter.feed(vec![0x05, 0x00]);
        adapter.feed(vec![
            0x05, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]);

        let mut codec = Codec::new(Encoding::Utf8);
        let mut io = Io::new(&mut codec, &mut adapter);
        let client = Client::new("example.com", 80, ClientPolicy::new(SOCKS5_VERSION)).unwrap();
        client.run(&mut io).await.unwrap();
    }

    #[test]
    fn unsupported_version_is_rejected_before_any_io() {
        let err = Client::new("example.com", 80, ClientPolicy::new(6)).unwrap_err();
        assert!(matches!(err, SocksError::Protocol(_)));
    }
}
