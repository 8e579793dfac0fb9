use tracing::trace;

use crate::adapter::Adapter;
use crate::codec::Codec;
use crate::config::ServerPolicy;
use crate::error::{Result, SocksError};
use crate::io::Io;
use crate::socks4::Socks4Server;
use crate::socks5::Socks5Server;
use crate::types::{SOCKS4_VERSION, SOCKS5_VERSION};

/// Server-side entry point: peeks the first byte on the wire to pick a
/// protocol version, then hands the connection to the matching handshake.
/// Constructed via [`SocksServer::new`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    policy: ServerPolicy,
}

impl Dispatcher {
    pub fn new(policy: ServerPolicy) -> Self {
        Self { policy }
    }

    pub async fn run<A: Adapter>(self, io: &mut Io<'_, A>) -> Result<()> {
        let version = io.read_u8(true).await?;
        trace!(version, "dispatching SOCKS connection");

        if !self.policy.allowed_versions.contains(&version) {
            return Err(SocksError::Protocol(format!(
                "SOCKS version {version} is not permitted by policy"
            )));
        }

        // Static property of the policy itself, not of whichever version the
        // connecting client actually sent: a strict policy that still
        // permits SOCKS4 while credentials are configured is rejected
        // regardless of `version`, since SOCKS4 has no way to carry those
        // credentials and the policy combination is unsound on its own.
        if self.policy.strict_security_policy
            && self.policy.credentials.is_some()
            && self.policy.allowed_versions.contains(&SOCKS4_VERSION)
        {
            return Err(SocksError::Policy(
                "strict security policy forbids allowing unauthenticated SOCKS4 connections \
                 when credentials are configured"
                    .to_string(),
            ));
        }

        match version {
            SOCKS4_VERSION => Socks4Server.run(io).await,
            SOCKS5_VERSION => Socks5Server::new(self.policy.credentials).run(io).await,
            other => Err(SocksError::Protocol(format!(
                "unrecognized SOCKS version byte 0x{other:02x}"
            ))),
        }
    }
}

/// Factory for server-side handshakes, named to mirror [`crate::client::SocksClient`].
pub struct SocksServer;

impl SocksServer {
    pub fn new(policy: ServerPolicy) -> Dispatcher {
        Dispatcher::new(policy)
    }
}

/// Runs a full server connection end to end: allocates a fresh [`Codec`],
/// wires it to `adapter`, and dispatches.
pub async fn serve<A: Adapter>(policy: ServerPolicy, adapter: &mut A) -> Result<()> {
    let mut codec = Codec::new(policy.encoding);
    let mut io = Io::new(&mut codec, adapter);
    Dispatcher::new(policy).run(&mut io).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::codec::Encoding;
    use crate::config::Credentials;

    #[tokio::test]
    async fn dispatches_socks4_by_version_byte() {
        let mut adapter = MemoryAdapter::standalone();
        adapter.feed(vec![0x04, 0x01, 0x00, 0x7B, 127, 0, 0, 1, 0x00]);

        let mut codec = Codec::new(Encoding::Utf8);
        let mut io = Io::new(&mut codec, &mut adapter);
        Dispatcher::new(ServerPolicy::new()).run(&mut io).await.unwrap();
        assert!(adapter.did_connect());
    }

    #[tokio::test]
    async fn dispatches_socks5_by_version_byte() {
        let mut adapter = MemoryAdapter::standalone();
        adapter.feed(vec![0x05, 0x01, 0x00]);
        adapter.feed(vec![0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1]);
        adapter.feed(80u16.to_be_bytes().to_vec());

        let mut codec = Codec::new(Encoding::Utf8);
        let mut io = Io::new(&mut codec, &mut adapter);
        Dispatcher::new(ServerPolicy::new()).run(&mut io).await.unwrap();
        assert!(adapter.did_connect());
    }

    #[tokio::test]
    async fn rejects_version_outside_allowed_set() {
        let mut adapter = MemoryAdapter::standalone();
        adapter.feed(vec![0x04, 0x01, 0x00, 0x7B, 127, 0, 0, 1, 0x00]);

        let mut codec = Codec::new(Encoding::Utf8);
        let mut io = Io::new(&mut codec, &mut adapter);
        let policy = ServerPolicy::new().with_allowed_versions([5]);
        let err = Dispatcher::new(policy).run(&mut io).await.unwrap_err();
        assert!(matches!(err, SocksError::Protocol(_)));
    }

    #[tokio::test]
    async fn strict_policy_rejects_socks4_when_credentials_configured() {
        let mut adapter = MemoryAdapter::standalone();
        adapter.feed(vec![0x04, 0x01, 0x00, 0x7B, 127, 0, 0, 1, 0x00]);

        let mut codec = Codec::new(Encoding::Utf8);
        let mut io = Io::new(&mut codec, &mut adapter);
        let policy = ServerPolicy::new()
            .with_credentials(Credentials::new("yoba", "foo"))
            .strict(true);
        let err = Dispatcher::new(policy).run(&mut io).await.unwrap_err();
        assert!(matches!(err, SocksError::Policy(_)));
    }

    #[tokio::test]
    async fn strict_policy_rejects_socks5_client_when_socks4_is_still_allowed() {
        // allowed_versions still contains SOCKS4 (the default), credentials
        // are configured, and the policy is strict: the gate must fire
        // before any byte is read, even though this particular client is
        // speaking SOCKS5 correctly and would otherwise authenticate fine.
        let mut adapter = MemoryAdapter::standalone();
        adapter.feed(vec![0x05, 0x01, 0x02]); // greeting offering userpass
        adapter.feed(vec![0x01, 0x04]);
        adapter.feed(b"yoba".to_vec());
        adapter.feed(vec![0x03]);
        adapter.feed(b"foo".to_vec());
        adapter.feed(vec![0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1]);
        adapter.feed(80u16.to_be_bytes().to_vec());

        let mut codec = Codec::new(Encoding::Utf8);
        let mut io = Io::new(&mut codec, &mut adapter);
        let policy = ServerPolicy::new()
            .with_credentials(Credentials::new("yoba", "foo"))
            .strict(true);
        let err = Dispatcher::new(policy).run(&mut io).await.unwrap_err();
        assert!(matches!(err, SocksError::Policy(_)));
        assert!(!adapter.did_connect());
    }

    #[tokio::test]
    async fn unstrict_policy_allows_socks4_when_credentials_configured() {
        let mut adapter = MemoryAdapter::standalone();
        adapter.feed(vec![0x04, 0x01, 0x00, 0x7B, 127, 0, 0, 1, 0x00]);

        let mut codec = Codec::new(Encoding::Utf8);
        let mut io = Io::new(&mut codec, &mut adapter);
        let policy = ServerPolicy::new()
            .with_credentials(Credentials::new("yoba", "foo"))
            .strict(false);
        Dispatcher::new(policy).run(&mut io).await.unwrap();
        assert!(adapter.did_connect());
    }
}
