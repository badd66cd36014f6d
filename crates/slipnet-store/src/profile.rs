//! Tunnel Profiles
//!
//! A [`ServerProfile`] is one named, storable tunnel configuration. The
//! protocol-specific parameters live in [`TunnelConfig`], which carries
//! exactly one payload per tunnel type. Consumers therefore never read a
//! field that is meaningless for the selected protocol.
//!
//! # Tunnel types
//!
//! | Token | Outer transport | Chained SSH |
//! |-------|-----------------|-------------|
//! | `slipstream` | QUIC over DNS | no |
//! | `slipstream_ssh` | QUIC over DNS | yes |
//! | `dnstt` | KCP + Noise over DNS | no |
//! | `dnstt_ssh` | KCP + Noise over DNS | yes |
//! | `ssh` | SSH | - |
//! | `doh` | DNS over HTTPS | no |
//! | `snowflake` | Tor bridges | no |

use crate::token::token_enum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default local SOCKS listen host
pub const DEFAULT_SOCKS_HOST: &str = "127.0.0.1";

/// Default local SOCKS listen port
pub const DEFAULT_SOCKS_PORT: u16 = 1080;

/// Default QUIC keep-alive interval (milliseconds)
pub const DEFAULT_KEEP_ALIVE_MS: u32 = 200;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default port for plain DNS resolvers
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Profile identifier, assigned by the store.
///
/// `0` marks a profile that has not been persisted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub u64);

impl ProfileId {
    /// Id of a profile that has not been stored
    pub const UNSAVED: ProfileId = ProfileId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Has the store assigned this id?
    pub fn is_saved(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

token_enum! {
    /// Tunnel protocol selected by a profile
    pub enum TunnelType (default = Dnstt) {
        /// QUIC tunnel carried over DNS
        Slipstream => "slipstream",
        /// SSH session inside a Slipstream tunnel
        SlipstreamSsh => "slipstream_ssh",
        /// KCP + Noise tunnel carried over DNS
        Dnstt => "dnstt",
        /// SSH session inside a DNSTT tunnel
        DnsttSsh => "dnstt_ssh",
        /// Direct SSH dynamic forwarding
        Ssh => "ssh",
        /// DNS-over-HTTPS only
        Doh => "doh",
        /// Tor with pluggable-transport bridges
        Snowflake => "snowflake",
    }
}

/// External engine that runs a tunnel's outer transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Slipstream,
    Dnstt,
    Ssh,
    Doh,
    Tor,
}

impl TunnelType {
    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            TunnelType::Slipstream => "Slipstream",
            TunnelType::SlipstreamSsh => "Slipstream + SSH",
            TunnelType::Dnstt => "DNSTT",
            TunnelType::DnsttSsh => "DNSTT + SSH",
            TunnelType::Ssh => "SSH",
            TunnelType::Doh => "DNS over HTTPS",
            TunnelType::Snowflake => "Tor (Snowflake)",
        }
    }

    /// Engine responsible for the outer transport
    pub fn engine(&self) -> EngineKind {
        match self {
            TunnelType::Slipstream | TunnelType::SlipstreamSsh => EngineKind::Slipstream,
            TunnelType::Dnstt | TunnelType::DnsttSsh => EngineKind::Dnstt,
            TunnelType::Ssh => EngineKind::Ssh,
            TunnelType::Doh => EngineKind::Doh,
            TunnelType::Snowflake => EngineKind::Tor,
        }
    }

    /// Uses the QUIC parameter group?
    pub fn uses_quic(&self) -> bool {
        matches!(self, TunnelType::Slipstream | TunnelType::SlipstreamSsh)
    }

    /// Uses the DNS-tunnel parameter group?
    pub fn uses_dnstt(&self) -> bool {
        matches!(self, TunnelType::Dnstt | TunnelType::DnsttSsh)
    }

    /// Uses the SSH parameter group?
    pub fn uses_ssh(&self) -> bool {
        matches!(
            self,
            TunnelType::Ssh | TunnelType::DnsttSsh | TunnelType::SlipstreamSsh
        )
    }

    /// Runs an SSH session through another tunnel?
    pub fn chains_ssh(&self) -> bool {
        matches!(self, TunnelType::DnsttSsh | TunnelType::SlipstreamSsh)
    }

    /// Tunnels through DNS queries (needs a domain and resolvers)?
    pub fn tunnels_over_dns(&self) -> bool {
        self.uses_quic() || self.uses_dnstt()
    }
}

token_enum! {
    /// QUIC congestion control algorithm
    pub enum CongestionControl (default = Bbr) {
        Bbr => "bbr",
        Dcubic => "dcubic",
    }
}

token_enum! {
    /// SSH authentication method
    pub enum SshAuthType (default = Password) {
        Password => "password",
        Key => "key",
    }
}

token_enum! {
    /// Transport used by DNSTT to reach the resolver
    pub enum DnsTransport (default = Udp) {
        Udp => "udp",
        /// DNS over TLS
        Dot => "dot",
        /// DNS over HTTPS
        Doh => "doh",
    }
}

/// DNS resolver used by the DNS-tunnelling transports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsResolver {
    /// Resolver host or IP
    pub host: String,
    /// Resolver port
    #[serde(default = "default_dns_port")]
    pub port: u16,
    /// Resolver is authoritative for the tunnel domain
    #[serde(default)]
    pub authoritative: bool,
}

fn default_dns_port() -> u16 {
    DEFAULT_DNS_PORT
}

impl DnsResolver {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            authoritative: false,
        }
    }

    /// Mark as authoritative
    pub fn authoritative(mut self) -> Self {
        self.authoritative = true;
        self
    }
}

impl fmt::Display for DnsResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Local SOCKS listener exposed by a running tunnel
#[derive(Clone, PartialEq, Eq)]
pub struct SocksListener {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SocksListener {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
        }
    }

    /// Require username/password authentication
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Listen address as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Proxy URL for clients of the tunnel
    pub fn proxy_url(&self) -> String {
        format!("socks5://{}", self.address())
    }
}

impl Default for SocksListener {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKS_HOST, DEFAULT_SOCKS_PORT)
    }
}

impl fmt::Debug for SocksListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocksListener")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// QUIC transport parameters (Slipstream)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuicParams {
    pub congestion_control: CongestionControl,
    /// Keep-alive interval (milliseconds)
    pub keep_alive_interval_ms: u32,
    /// Resolve through the authoritative server directly
    pub authoritative_dns: bool,
    /// Generic segmentation offload
    pub gso: bool,
}

impl Default for QuicParams {
    fn default() -> Self {
        Self {
            congestion_control: CongestionControl::Bbr,
            keep_alive_interval_ms: DEFAULT_KEEP_ALIVE_MS,
            authoritative_dns: false,
            gso: false,
        }
    }
}

/// DNS tunnel parameters (DNSTT)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsttParams {
    /// Server Noise public key (hex)
    pub public_key: String,
    pub transport: DnsTransport,
    /// Let the server use its own local resolver
    pub use_server_resolver: bool,
}

impl DnsttParams {
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            ..Self::default()
        }
    }
}

/// SSH parameters
///
/// Empty strings mean "not set"; the flat storage record uses the same
/// convention.
#[derive(Clone, PartialEq, Eq)]
pub struct SshParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: SshAuthType,
    pub password: String,
    /// Private key (PEM)
    pub private_key: String,
    pub key_passphrase: String,
    /// Preferred cipher, empty for the engine default
    pub cipher: String,
}

impl SshParams {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            ..Self::default()
        }
    }

    /// Authenticate with a password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.auth = SshAuthType::Password;
        self.password = password.into();
        self
    }

    /// Authenticate with a PEM private key
    pub fn with_private_key(mut self, pem: impl Into<String>, passphrase: impl Into<String>) -> Self {
        self.auth = SshAuthType::Key;
        self.private_key = pem.into();
        self.key_passphrase = passphrase.into();
        self
    }
}

impl Default for SshParams {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_SSH_PORT,
            username: String::new(),
            auth: SshAuthType::Password,
            password: String::new(),
            private_key: String::new(),
            key_passphrase: String::new(),
            cipher: String::new(),
        }
    }
}

impl fmt::Debug for SshParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &String| if s.is_empty() { "" } else { "[redacted]" };
        f.debug_struct("SshParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("auth", &self.auth)
            .field("password", &redact(&self.password))
            .field("private_key", &redact(&self.private_key))
            .field("key_passphrase", &redact(&self.key_passphrase))
            .field("cipher", &self.cipher)
            .finish()
    }
}

/// DNS-over-HTTPS parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DohParams {
    /// HTTPS endpoint URL
    pub url: String,
}

/// Tor bridge parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TorParams {
    /// Newline-delimited bridge lines; empty uses the built-in Snowflake bridge
    pub bridge_lines: String,
}

/// Protocol-specific configuration, one payload per tunnel type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelConfig {
    Slipstream(QuicParams),
    SlipstreamSsh { quic: QuicParams, ssh: SshParams },
    Dnstt(DnsttParams),
    DnsttSsh { dnstt: DnsttParams, ssh: SshParams },
    Ssh(SshParams),
    Doh(DohParams),
    Snowflake(TorParams),
}

impl TunnelConfig {
    /// Default parameters for a tunnel type
    pub fn default_for(tunnel_type: TunnelType) -> Self {
        match tunnel_type {
            TunnelType::Slipstream => TunnelConfig::Slipstream(QuicParams::default()),
            TunnelType::SlipstreamSsh => TunnelConfig::SlipstreamSsh {
                quic: QuicParams::default(),
                ssh: SshParams::default(),
            },
            TunnelType::Dnstt => TunnelConfig::Dnstt(DnsttParams::default()),
            TunnelType::DnsttSsh => TunnelConfig::DnsttSsh {
                dnstt: DnsttParams::default(),
                ssh: SshParams::default(),
            },
            TunnelType::Ssh => TunnelConfig::Ssh(SshParams::default()),
            TunnelType::Doh => TunnelConfig::Doh(DohParams::default()),
            TunnelType::Snowflake => TunnelConfig::Snowflake(TorParams::default()),
        }
    }

    /// Discriminant of this configuration
    pub fn tunnel_type(&self) -> TunnelType {
        match self {
            TunnelConfig::Slipstream(_) => TunnelType::Slipstream,
            TunnelConfig::SlipstreamSsh { .. } => TunnelType::SlipstreamSsh,
            TunnelConfig::Dnstt(_) => TunnelType::Dnstt,
            TunnelConfig::DnsttSsh { .. } => TunnelType::DnsttSsh,
            TunnelConfig::Ssh(_) => TunnelType::Ssh,
            TunnelConfig::Doh(_) => TunnelType::Doh,
            TunnelConfig::Snowflake(_) => TunnelType::Snowflake,
        }
    }

    pub fn quic(&self) -> Option<&QuicParams> {
        match self {
            TunnelConfig::Slipstream(quic) | TunnelConfig::SlipstreamSsh { quic, .. } => Some(quic),
            _ => None,
        }
    }

    pub fn dnstt(&self) -> Option<&DnsttParams> {
        match self {
            TunnelConfig::Dnstt(dnstt) | TunnelConfig::DnsttSsh { dnstt, .. } => Some(dnstt),
            _ => None,
        }
    }

    pub fn ssh(&self) -> Option<&SshParams> {
        match self {
            TunnelConfig::Ssh(ssh)
            | TunnelConfig::DnsttSsh { ssh, .. }
            | TunnelConfig::SlipstreamSsh { ssh, .. } => Some(ssh),
            _ => None,
        }
    }

    pub fn doh(&self) -> Option<&DohParams> {
        match self {
            TunnelConfig::Doh(doh) => Some(doh),
            _ => None,
        }
    }

    pub fn tor(&self) -> Option<&TorParams> {
        match self {
            TunnelConfig::Snowflake(tor) => Some(tor),
            _ => None,
        }
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        TunnelConfig::Dnstt(DnsttParams::default())
    }
}

/// One named, storable tunnel configuration
///
/// `is_active`, `last_connected_at` and the timestamps are owned by the
/// store: values set here are ignored by `create`/`update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProfile {
    pub id: ProfileId,
    pub name: String,
    /// Tunnel domain (DNS-tunnelling types)
    pub domain: String,
    pub resolvers: Vec<DnsResolver>,
    pub socks: SocksListener,
    pub is_active: bool,
    /// List position, lower sorts first
    pub sort_order: i32,
    /// Epoch milliseconds
    pub created_at: u64,
    /// Epoch milliseconds
    pub updated_at: u64,
    /// Epoch milliseconds, `0` if never connected
    pub last_connected_at: u64,
    pub tunnel: TunnelConfig,
}

impl ServerProfile {
    /// Create an unsaved profile
    pub fn new(name: impl Into<String>, tunnel: TunnelConfig) -> Self {
        Self {
            name: name.into(),
            tunnel,
            ..Self::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_resolver(mut self, resolver: DnsResolver) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn with_socks(mut self, socks: SocksListener) -> Self {
        self.socks = socks;
        self
    }

    pub fn tunnel_type(&self) -> TunnelType {
        self.tunnel.tunnel_type()
    }

    /// Has this profile ever connected?
    pub fn has_connected(&self) -> bool {
        self.last_connected_at != 0
    }
}

impl Default for ServerProfile {
    fn default() -> Self {
        Self {
            id: ProfileId::UNSAVED,
            name: String::new(),
            domain: String::new(),
            resolvers: Vec::new(),
            socks: SocksListener::default(),
            is_active: false,
            sort_order: 0,
            created_at: 0,
            updated_at: 0,
            last_connected_at: 0,
            tunnel: TunnelConfig::default(),
        }
    }
}
