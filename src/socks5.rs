use tracing::{debug, warn};

use crate::adapter::Adapter;
use crate::config::Credentials;
use crate::error::{Result, SocksError};
use crate::io::Io;
use crate::types::{Address, AuthMethod, ReplyCode, CMD_CONNECT, SOCKS5_VERSION};

const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;
const USERPASS_AUTH_VERSION: u8 = 0x01;

async fn read_address<A: Adapter>(io: &mut Io<'_, A>) -> Result<Address> {
    let atyp = io.read_u8(false).await?;
    match atyp {
        ATYP_IPV4 => {
            let raw = io.read_bytes(4).await?;
            Ok(Address::IPv4([raw[0], raw[1], raw[2], raw[3]]))
        }
        ATYP_IPV6 => {
            let raw = io.read_bytes(16).await?;
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&raw);
            Ok(Address::IPv6(octets))
        }
        ATYP_DOMAIN => Ok(Address::Domain(io.read_pascal_string().await?)),
        other => Err(SocksError::UnsupportedAddressType(other)),
    }
}

async fn write_address<A: Adapter>(io: &mut Io<'_, A>, address: &Address) -> Result<()> {
    match address {
        Address::IPv4(octets) => {
            io.write_u8(ATYP_IPV4).await?;
            io.write_bytes(octets.to_vec()).await
        }
        Address::IPv6(octets) => {
            io.write_u8(ATYP_IPV6).await?;
            io.write_bytes(octets.to_vec()).await
        }
        Address::Domain(domain) => {
            io.write_u8(ATYP_DOMAIN).await?;
            io.write_pascal_string(domain).await
        }
    }
}

async fn write_reply<A: Adapter>(
    io: &mut Io<'_, A>,
    reply: ReplyCode,
    bind_addr: &Address,
    bind_port: u16,
) -> Result<()> {
    io.write_u8(SOCKS5_VERSION).await?;
    io.write_u8(reply as u8).await?;
    io.write_u8(0x00).await?; // RSV
    write_address(io, bind_addr).await?;
    io.write_u16(bind_port).await
}

const UNSPECIFIED: Address = Address::IPv4([0, 0, 0, 0]);

/// Server half of the SOCKS5 handshake: method negotiation, optional
/// RFC 1929 username/password subnegotiation, then the CONNECT request.
#[derive(Debug, Clone)]
pub struct Socks5Server {
    credentials: Option<Credentials>,
}

impl Socks5Server {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self { credentials }
    }

    async fn negotiate_method<A: Adapter>(&self, io: &mut Io<'_, A>) -> Result<AuthMethod> {
        let version = io.read_u8(false).await?;
        if version != SOCKS5_VERSION {
            return Err(SocksError::Protocol(format!(
                "expected SOCKS5 version 5 in greeting, got {version}"
            )));
        }
        let nmethods = io.read_u8(false).await?;
        let offered = io.read_bytes(nmethods as usize).await?;
        let offered: Vec<AuthMethod> = offered.iter().copied().map(AuthMethod::from).collect();

        let required = if self.credentials.is_some() {
            AuthMethod::UserPass
        } else {
            AuthMethod::NoAuth
        };
        let chosen = if offered.contains(&required) {
            required
        } else {
            AuthMethod::NoAcceptable
        };

        io.write_u8(SOCKS5_VERSION).await?;
        io.write_u8(chosen as u8).await?;

        if chosen == AuthMethod::NoAcceptable {
            return Err(SocksError::AuthFailed(
                "no acceptable authentication method".to_string(),
            ));
        }
        Ok(chosen)
    }

    async fn authenticate<A: Adapter>(&self, io: &mut Io<'_, A>) -> Result<()> {
        let auth_version = io.read_u8(false).await?;
        if auth_version != USERPASS_AUTH_VERSION {
            return Err(SocksError::Protocol(format!(
                "unsupported username/password auth version {auth_version}"
            )));
        }
        let username = io.read_pascal_string().await?;
        let password = io.read_pascal_string().await?;

        let expected = self
            .credentials
            .as_ref()
            .expect("authenticate only called when credentials are configured");
        let ok = username == expected.username && password == expected.password;

        io.write_u8(USERPASS_AUTH_VERSION).await?;
        io.write_u8(if ok { 0x00 } else { 0x01 }).await?;

        if !ok {
            warn!(username, "SOCKS5 username/password rejected");
            return Err(SocksError::AuthFailed(
                "username or password incorrect".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn run<A: Adapter>(self, io: &mut Io<'_, A>) -> Result<()> {
        let method = self.negotiate_method(io).await?;
        if method == AuthMethod::UserPass {
            self.authenticate(io).await?;
        }

        let version = io.read_u8(false).await?;
        if version != SOCKS5_VERSION {
            return Err(SocksError::Protocol(format!(
                "expected SOCKS5 version 5, got {version}"
            )));
        }
        let command = io.read_u8(false).await?;
        let _reserved = io.read_u8(false).await?;
        let address = read_address(io).await?;
        let port = io.read_u16().await?;

        if command != CMD_CONNECT {
            write_reply(io, ReplyCode::CommandNotSupported, &UNSPECIFIED, 0).await?;
            return Err(SocksError::UnsupportedCommand(command));
        }

        let host = address.to_string();
        match io.connect(&host, port).await {
            Ok(()) => {
                debug!(host, port, "SOCKS5 CONNECT succeeded");
                write_reply(io, ReplyCode::Succeeded, &UNSPECIFIED, 0).await?;
                io.passthrough().await
            }
            Err(err) => {
                write_reply(io, ReplyCode::GeneralFailure, &UNSPECIFIED, 0).await?;
                Err(SocksError::Protocol(format!(
                    "upstream connect to {host}:{port} failed: {err}"
                )))
            }
        }
    }
}

/// Client half of the SOCKS5 handshake.
#[derive(Debug, Clone)]
pub struct Socks5Client {
    host: String,
    port: u16,
    credentials: Option<Credentials>,
}

impl Socks5Client {
    pub fn new(host: String, port: u16, credentials: Option<Credentials>) -> Self {
        Self {
            host,
            port,
            credentials,
        }
    }

    pub async fn run<A: Adapter>(self, io: &mut Io<'_, A>) -> Result<()> {
        let method = if self.credentials.is_some() {
            AuthMethod::UserPass
        } else {
            AuthMethod::NoAuth
        };

        io.write_u8(SOCKS5_VERSION).await?;
        io.write_u8(0x01).await?; // NMETHODS
        io.write_u8(method as u8).await?;

        let reply_version = io.read_u8(false).await?;
        let chosen = io.read_u8(false).await?;
        if reply_version != SOCKS5_VERSION {
            return Err(SocksError::Protocol(format!(
                "expected SOCKS5 version 5 in method reply, got {reply_version}"
            )));
        }
        if chosen != method as u8 {
            return Err(SocksError::AuthFailed(format!(
                "server chose auth method 0x{chosen:02x}, expected 0x{:02x}",
                method as u8
            )));
        }

        if let Some(credentials) = &self.credentials {
            io.write_u8(USERPASS_AUTH_VERSION).await?;
            io.write_pascal_string(&credentials.username).await?;
            io.write_pascal_string(&credentials.password).await?;

            let auth_version = io.read_u8(false).await?;
            let status = io.read_u8(false).await?;
            if auth_version != USERPASS_AUTH_VERSION {
                return Err(SocksError::Protocol(format!(
                    "unsupported username/password auth version {auth_version} in reply"
                )));
            }
            if status != 0x00 {
                return Err(SocksError::AuthFailed(format!(
                    "username/password authentication failed with code {status}"
                )));
            }
        }

        let address = Address::classify(&self.host);
        io.write_u8(SOCKS5_VERSION).await?;
        io.write_u8(CMD_CONNECT).await?;
        io.write_u8(0x00).await?; // RSV
        write_address(io, &address).await?;
        io.write_u16(self.port).await?;

        let reply_version = io.read_u8(false).await?;
        let status = io.read_u8(false).await?;
        let _reserved = io.read_u8(false).await?;

        if reply_version != SOCKS5_VERSION {
            return Err(SocksError::Protocol(format!(
                "expected SOCKS5 version 5 in request reply, got {reply_version}"
            )));
        }
        if status != ReplyCode::Succeeded as u8 {
            return Err(SocksError::Protocol(format!(
                "SOCKS5 request failed with status 0x{status:02x}"
            )));
        }

        // The bound address/port are read and discarded, never validated.
        let _bound_address = read_address(io).await?;
        let _bound_port = io.read_u16().await?;

        io.passthrough().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::codec::{Codec, Encoding};

    #[tokio::test]
    async fn client_no_auth_ipv6_connect() {
        let mut adapter = MemoryAdapter::standalone();
        adapter.feed(vec![0x05, 0x00]); // method selection reply
        adapter.feed(vec![
            0x05, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]); // request reply, ATYP=IPv4

        let mut codec = Codec::new(Encoding::Utf8);
        let mut io = Io::new(&mut codec, &mut adapter);
        let client = Socks5Client::new("::1".to_string(), 666, None);
        client.run(&mut io).await.unwrap();

        let mut expected = vec![0x05, 0x01, 0x00]; // greeting
        expected.extend_from_slice(&[0x05, 0x01, 0x00, 0x04]); // request header
        expected.extend_from_slice(&[0u8; 15]);
        expected.push(0x01); // ::1
        expected.extend_from_slice(&666u16.to_be_bytes());
        assert_eq!(&adapter.written()[..], &expected[..]);
    }

    #[tokio::test]
    async fn client_userpass_success() {
        let mut adapter = MemoryAdapter::standalone();
        adapter.feed(vec![0x05, 0x02]);
        adapter.feed(vec![0x01, 0x00]);
        adapter.feed(vec![
            0x05, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]);

        let mut codec = Codec::new(Encoding::Utf8);
        let mut io = Io::new(&mut codec, &mut adapter);
        let client = Socks5Client::new(
            "example.com".to_string(),
            80,
            Some(Credentials::new("yoba", "foo")),
        );
        client.run(&mut io).await.unwrap();
    }

    #[tokio::test]
    async fn client_userpass_bad_password_fails_before_request() {
        let mut adapter = MemoryAdapter::standalone();
        adapter.feed(vec![0x05, 0x02]);
        adapter.feed(vec![0x01, 0x01]);

        let mut codec = Codec::new(Encoding::Utf8);
        let mut io = Io::new(&mut codec, &mut adapter);
        let client = Socks5Client::new(
            "example.com".to_string(),
            80,
            Some(Credentials::new("yoba", "foo")),
        );
        assert!(client.run(&mut io).await.is_err());
        // no request bytes should have followed the subnegotiation
        let written = adapter.written();
        assert_eq!(written.len(), 3 + 1 + 1 + 4 + 1 + 3); // greeting + subneg only
    }

    #[tokio::test]
    async fn server_requires_userpass_when_configured() {
        let mut adapter = MemoryAdapter::standalone();
        adapter.feed(vec![0x05, 0x01, 0x02]); // greeting offering userpass only
        adapter.feed(vec![0x01, 0x04]);
        adapter.feed(b"yoba".to_vec());
        adapter.feed(vec![0x03]);
        adapter.feed(b"foo".to_vec());
        adapter.feed(vec![0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1]);
        adapter.feed(80u16.to_be_bytes().to_vec());

        let mut codec = Codec::new(Encoding::Utf8);
        let mut io = Io::new(&mut codec, &mut adapter);
        let server = Socks5Server::new(Some(Credentials::new("yoba", "foo")));
        server.run(&mut io).await.unwrap();
        assert!(adapter.did_connect());
    }

    #[tokio::test]
    async fn server_rejects_non_connect_command() {
        // MemoryAdapter::connect always succeeds, so the reachable failure
        // reply path is the non-CONNECT command rejection rather than an
        // upstream connect failure.
        let mut adapter = MemoryAdapter::standalone();
        adapter.feed(vec![0x05, 0x01, 0x00]);
        adapter.feed(vec![0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1]);
        adapter.feed(80u16.to_be_bytes().to_vec());

        let mut codec = Codec::new(Encoding::Utf8);
        let mut io = Io::new(&mut codec, &mut adapter);
        let server = Socks5Server::new(None);
        let err = server.run(&mut io).await.unwrap_err();
        assert!(matches!(err, SocksError::UnsupportedCommand(0x02)));
        let written = adapter.written();
        assert_eq!(written[3], ReplyCode::CommandNotSupported as u8);
    }
}
