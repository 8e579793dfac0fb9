use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::codec::Encoding;

/// Username/password pair checked during SOCKS5 RFC 1929 subnegotiation,
/// or rejected outright for SOCKS4 under a strict policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Policy consumed by [`crate::dispatcher::Dispatcher`] (constructed via
/// `SocksServer::new`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerPolicy {
    #[serde(default = "default_allowed_versions")]
    pub allowed_versions: HashSet<u8>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default = "default_strict_security_policy")]
    pub strict_security_policy: bool,
    #[serde(default)]
    pub encoding: Encoding,
}

impl Default for ServerPolicy {
    fn default() -> Self {
        Self {
            allowed_versions: default_allowed_versions(),
            credentials: None,
            strict_security_policy: default_strict_security_policy(),
            encoding: Encoding::default(),
        }
    }
}

impl ServerPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allowed_versions(mut self, versions: impl IntoIterator<Item = u8>) -> Self {
        self.allowed_versions = versions.into_iter().collect();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_security_policy = strict;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Policy consumed by [`crate::client::Client`] (constructed via
/// `SocksClient::new`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPolicy {
    pub version: u8,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub encoding: Encoding,
    /// SOCKS4-only: the USERID field. Ignored for `version == 5`.
    #[serde(default)]
    pub socks4_user_id: String,
}

impl ClientPolicy {
    pub fn new(version: u8) -> Self {
        Self {
            version,
            credentials: None,
            encoding: Encoding::default(),
            socks4_user_id: String::new(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_socks4_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.socks4_user_id = user_id.into();
        self
    }
}

fn default_allowed_versions() -> HashSet<u8> {
    [4, 5].into_iter().collect()
}

fn default_strict_security_policy() -> bool {
    true
}
