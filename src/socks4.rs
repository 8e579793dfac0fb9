use std::net::Ipv4Addr;

use tracing::{debug, warn};

use crate::adapter::Adapter;
use crate::error::{Result, SocksError};
use crate::io::{Io, DEFAULT_MAX_STRING};
use crate::types::{Socks4Reply, CMD_CONNECT, SOCKS4_VERSION};

/// SOCKS4A's sentinel range: a DSTIP of `0.0.0.1`..`0.0.0.255` signals that
/// a NUL-terminated domain name follows the USERID field instead of a
/// literal IPv4 address.
fn is_socks4a_sentinel(octets: [u8; 4]) -> bool {
    octets[0] == 0 && octets[1] == 0 && octets[2] == 0 && octets[3] != 0
}

async fn write_reply<A: Adapter>(io: &mut Io<'_, A>, reply: Socks4Reply) -> Result<()> {
    io.write_u8(0x00).await?;
    io.write_u8(reply as u8).await?;
    io.write_u16(0).await?;
    io.write_bytes(Ipv4Addr::UNSPECIFIED.octets().to_vec())
        .await
}

/// Server half of the SOCKS4/SOCKS4A handshake. The version byte is
/// consumed by [`crate::dispatcher::Dispatcher`] before this runs.
#[derive(Debug, Default)]
pub struct Socks4Server;

impl Socks4Server {
    pub async fn run<A: Adapter>(self, io: &mut Io<'_, A>) -> Result<()> {
        let version = io.read_u8(false).await?;
        if version != SOCKS4_VERSION {
            return Err(SocksError::Protocol(format!(
                "expected SOCKS4 version 4, got {version}"
            )));
        }
        let command = io.read_u8(false).await?;
        let port = io.read_u16().await?;
        let ip_bytes = io.read_bytes(4).await?;
        let ipv4 = [ip_bytes[0], ip_bytes[1], ip_bytes[2], ip_bytes[3]];

        let _user_id = io.read_c_string(DEFAULT_MAX_STRING).await?;

        if command != CMD_CONNECT {
            warn!(command, "rejecting unsupported SOCKS4 command");
            write_reply(io, Socks4Reply::Rejected).await?;
            return Err(SocksError::UnsupportedCommand(command));
        }

        let host = if is_socks4a_sentinel(ipv4) {
            io.read_c_string(DEFAULT_MAX_STRING).await?
        } else {
            Ipv4Addr::from(ipv4).to_string()
        };

        match io.connect(&host, port).await {
            Ok(()) => {
                debug!(host, port, "SOCKS4 CONNECT succeeded");
                write_reply(io, Socks4Reply::Granted).await?;
                io.passthrough().await
            }
            Err(err) => {
                write_reply(io, Socks4Reply::Rejected).await?;
                Err(SocksError::Protocol(format!(
                    "upstream connect to {host}:{port} failed: {err}"
                )))
            }
        }
    }
}

/// Client half of the SOCKS4/SOCKS4A handshake.
#[derive(Debug, Clone)]
pub struct Socks4Client {
    host: String,
    port: u16,
    user_id: String,
}

impl Socks4Client {
    pub fn new(host: String, port: u16, user_id: String) -> Self {
        Self {
            host,
            port,
            user_id,
        }
    }

    pub async fn run<A: Adapter>(self, io: &mut Io<'_, A>) -> Result<()> {
        let ipv4: Ipv4Addr = self
            .host
            .parse()
            .unwrap_or(Ipv4Addr::new(0, 0, 0, 255)); // SOCKS4A sentinel for a domain

        io.write_u8(SOCKS4_VERSION).await?;
        io.write_u8(CMD_CONNECT).await?;
        io.write_u16(self.port).await?;
        io.write_bytes(ipv4.octets().to_vec()).await?;
        io.write_c_string(&self.user_id).await?;
        if is_socks4a_sentinel(ipv4.octets()) {
            io.write_c_string(&self.host).await?;
        }

        io.read_u8(false).await?; // reply VER, always 0
        let code = io.read_u8(false).await?;
        io.read_u16().await?; // bound port, ignored
        io.read_bytes(4).await?; // bound address, ignored

        if code != Socks4Reply::Granted as u8 {
            return Err(SocksError::Protocol(format!(
                "SOCKS4 request rejected with code 0x{code:02x}"
            )));
        }
        io.passthrough().await
    }
}
