//! Flat Profile Record
//!
//! Storage form of a [`ServerProfile`]: one wide record with every column,
//! the tunnel type selecting which columns are meaningful. Conversion to and
//! from the tagged [`TunnelConfig`] happens only here.
//!
//! Columns outside the active parameter group are written with their
//! defaults and ignored on load. Missing columns load as defaults, so older
//! and newer documents both deserialize.

use crate::profile::{
    CongestionControl, DnsResolver, DnsTransport, DnsttParams, DohParams, ProfileId, QuicParams,
    ServerProfile, SocksListener, SshAuthType, SshParams, TorParams, TunnelConfig, TunnelType,
    DEFAULT_KEEP_ALIVE_MS, DEFAULT_SOCKS_HOST, DEFAULT_SOCKS_PORT, DEFAULT_SSH_PORT,
};
use serde::{Deserialize, Serialize};

/// Persisted profile row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRecord {
    pub id: u64,
    pub name: String,
    pub domain: String,
    pub resolvers: Vec<DnsResolver>,
    pub socks_host: String,
    pub socks_port: u16,
    /// `None` when the listener needs no authentication
    pub socks_username: Option<String>,
    pub socks_password: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: u64,
    pub updated_at: u64,
    pub last_connected_at: u64,
    pub tunnel_type: TunnelType,

    // QUIC group
    pub congestion_control: CongestionControl,
    pub keep_alive_interval_ms: u32,
    pub authoritative_dns: bool,
    pub gso_enabled: bool,

    // DNS tunnel group
    pub dnstt_public_key: String,
    pub dns_transport: DnsTransport,
    pub use_server_resolver: bool,

    // SSH group
    pub ssh_host: String,
    pub ssh_port: u16,
    pub ssh_username: String,
    pub ssh_auth_type: SshAuthType,
    pub ssh_password: String,
    pub ssh_private_key: String,
    pub ssh_key_passphrase: String,
    pub ssh_cipher: String,

    // DoH group
    pub doh_url: String,

    // Tor group
    pub tor_bridge_lines: String,
}

impl Default for ProfileRecord {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            domain: String::new(),
            resolvers: Vec::new(),
            socks_host: DEFAULT_SOCKS_HOST.to_string(),
            socks_port: DEFAULT_SOCKS_PORT,
            socks_username: None,
            socks_password: None,
            is_active: false,
            sort_order: 0,
            created_at: 0,
            updated_at: 0,
            last_connected_at: 0,
            tunnel_type: TunnelType::Dnstt,
            congestion_control: CongestionControl::Bbr,
            keep_alive_interval_ms: DEFAULT_KEEP_ALIVE_MS,
            authoritative_dns: false,
            gso_enabled: false,
            dnstt_public_key: String::new(),
            dns_transport: DnsTransport::Udp,
            use_server_resolver: false,
            ssh_host: String::new(),
            ssh_port: DEFAULT_SSH_PORT,
            ssh_username: String::new(),
            ssh_auth_type: SshAuthType::Password,
            ssh_password: String::new(),
            ssh_private_key: String::new(),
            ssh_key_passphrase: String::new(),
            ssh_cipher: String::new(),
            doh_url: String::new(),
            tor_bridge_lines: String::new(),
        }
    }
}

impl ProfileRecord {
    fn put_quic(&mut self, quic: &QuicParams) {
        self.congestion_control = quic.congestion_control;
        self.keep_alive_interval_ms = quic.keep_alive_interval_ms;
        self.authoritative_dns = quic.authoritative_dns;
        self.gso_enabled = quic.gso;
    }

    fn put_dnstt(&mut self, dnstt: &DnsttParams) {
        self.dnstt_public_key = dnstt.public_key.clone();
        self.dns_transport = dnstt.transport;
        self.use_server_resolver = dnstt.use_server_resolver;
    }

    fn put_ssh(&mut self, ssh: &SshParams) {
        self.ssh_host = ssh.host.clone();
        self.ssh_port = ssh.port;
        self.ssh_username = ssh.username.clone();
        self.ssh_auth_type = ssh.auth;
        self.ssh_password = ssh.password.clone();
        self.ssh_private_key = ssh.private_key.clone();
        self.ssh_key_passphrase = ssh.key_passphrase.clone();
        self.ssh_cipher = ssh.cipher.clone();
    }

    fn quic(&self) -> QuicParams {
        QuicParams {
            congestion_control: self.congestion_control,
            keep_alive_interval_ms: self.keep_alive_interval_ms,
            authoritative_dns: self.authoritative_dns,
            gso: self.gso_enabled,
        }
    }

    fn dnstt(&self) -> DnsttParams {
        DnsttParams {
            public_key: self.dnstt_public_key.clone(),
            transport: self.dns_transport,
            use_server_resolver: self.use_server_resolver,
        }
    }

    fn ssh(&self) -> SshParams {
        SshParams {
            host: self.ssh_host.clone(),
            port: self.ssh_port,
            username: self.ssh_username.clone(),
            auth: self.ssh_auth_type,
            password: self.ssh_password.clone(),
            private_key: self.ssh_private_key.clone(),
            key_passphrase: self.ssh_key_passphrase.clone(),
            cipher: self.ssh_cipher.clone(),
        }
    }

    fn tunnel(&self) -> TunnelConfig {
        match self.tunnel_type {
            TunnelType::Slipstream => TunnelConfig::Slipstream(self.quic()),
            TunnelType::SlipstreamSsh => TunnelConfig::SlipstreamSsh {
                quic: self.quic(),
                ssh: self.ssh(),
            },
            TunnelType::Dnstt => TunnelConfig::Dnstt(self.dnstt()),
            TunnelType::DnsttSsh => TunnelConfig::DnsttSsh {
                dnstt: self.dnstt(),
                ssh: self.ssh(),
            },
            TunnelType::Ssh => TunnelConfig::Ssh(self.ssh()),
            TunnelType::Doh => TunnelConfig::Doh(DohParams {
                url: self.doh_url.clone(),
            }),
            TunnelType::Snowflake => TunnelConfig::Snowflake(TorParams {
                bridge_lines: self.tor_bridge_lines.clone(),
            }),
        }
    }
}

impl From<&ServerProfile> for ProfileRecord {
    fn from(profile: &ServerProfile) -> Self {
        let mut record = ProfileRecord {
            id: profile.id.0,
            name: profile.name.clone(),
            domain: profile.domain.clone(),
            resolvers: profile.resolvers.clone(),
            socks_host: profile.socks.host.clone(),
            socks_port: profile.socks.port,
            socks_username: profile.socks.username.clone(),
            socks_password: profile.socks.password.clone(),
            is_active: profile.is_active,
            sort_order: profile.sort_order,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
            last_connected_at: profile.last_connected_at,
            tunnel_type: profile.tunnel_type(),
            ..ProfileRecord::default()
        };

        match &profile.tunnel {
            TunnelConfig::Slipstream(quic) => record.put_quic(quic),
            TunnelConfig::SlipstreamSsh { quic, ssh } => {
                record.put_quic(quic);
                record.put_ssh(ssh);
            }
            TunnelConfig::Dnstt(dnstt) => record.put_dnstt(dnstt),
            TunnelConfig::DnsttSsh { dnstt, ssh } => {
                record.put_dnstt(dnstt);
                record.put_ssh(ssh);
            }
            TunnelConfig::Ssh(ssh) => record.put_ssh(ssh),
            TunnelConfig::Doh(doh) => record.doh_url = doh.url.clone(),
            TunnelConfig::Snowflake(tor) => record.tor_bridge_lines = tor.bridge_lines.clone(),
        }

        record
    }
}

impl From<&ProfileRecord> for ServerProfile {
    fn from(record: &ProfileRecord) -> Self {
        ServerProfile {
            id: ProfileId(record.id),
            name: record.name.clone(),
            domain: record.domain.clone(),
            resolvers: record.resolvers.clone(),
            socks: SocksListener {
                host: record.socks_host.clone(),
                port: record.socks_port,
                username: record.socks_username.clone(),
                password: record.socks_password.clone(),
            },
            is_active: record.is_active,
            sort_order: record.sort_order,
            created_at: record.created_at,
            updated_at: record.updated_at,
            last_connected_at: record.last_connected_at,
            tunnel: record.tunnel(),
        }
    }
}
