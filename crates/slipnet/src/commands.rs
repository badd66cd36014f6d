//! Subcommand handlers

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use slipnet_store::{
    Backend, BufferSize, ConfigStore, DarkMode, DnsResolver, DnsTransport, DnsttParams, DohParams,
    ProfileId, ServerProfile, SocksListener, SshParams, TorParams, TunnelConfig,
    DEFAULT_DNS_PORT, DEFAULT_SOCKS_HOST, DEFAULT_SOCKS_PORT, DEFAULT_SSH_PORT,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List stored profiles in display order
    List,

    /// Show one profile
    Show { id: u64 },

    /// Add a DNSTT profile, optionally chaining SSH through it
    AddDnstt {
        name: String,
        /// Tunnel domain
        #[arg(long)]
        domain: String,
        /// Server public key (hex)
        #[arg(long)]
        public_key: String,
        /// Resolver as host[:port], repeatable
        #[arg(long = "resolver")]
        resolvers: Vec<String>,
        /// udp, dot or doh
        #[arg(long, default_value = "udp")]
        transport: String,
        #[command(flatten)]
        ssh: SshArgs,
        #[arg(long, default_value_t = DEFAULT_SOCKS_PORT)]
        socks_port: u16,
    },

    /// Add a plain SSH profile
    AddSsh {
        name: String,
        #[command(flatten)]
        ssh: SshArgs,
        #[arg(long, default_value_t = DEFAULT_SOCKS_PORT)]
        socks_port: u16,
    },

    /// Add a DNS-over-HTTPS profile
    AddDoh {
        name: String,
        /// HTTPS endpoint, e.g. https://dns.example/dns-query
        #[arg(long)]
        url: String,
        #[arg(long, default_value_t = DEFAULT_SOCKS_PORT)]
        socks_port: u16,
    },

    /// Add a Tor (Snowflake) profile
    AddSnowflake {
        name: String,
        /// File with one bridge line per line; omit for the built-in bridge
        #[arg(long)]
        bridges: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_SOCKS_PORT)]
        socks_port: u16,
    },

    /// Make a profile the active one
    Activate { id: u64 },

    /// Delete a profile
    Delete { id: u64 },

    /// Put the given profiles first, in this order
    Reorder {
        #[arg(required = true)]
        ids: Vec<u64>,
    },

    /// Show settings and cumulative statistics
    Stats,

    /// Zero the cumulative statistics
    ResetStats,

    /// Change a setting
    Set { key: String, value: String },

    /// Check a profile is complete enough to connect with
    Validate { id: u64 },
}

/// SSH options shared by the SSH-capable profile types
#[derive(Debug, Clone, clap::Args)]
pub struct SshArgs {
    #[arg(long)]
    pub ssh_host: Option<String>,
    #[arg(long, default_value_t = DEFAULT_SSH_PORT)]
    pub ssh_port: u16,
    #[arg(long)]
    pub ssh_user: Option<String>,
    #[arg(long)]
    pub ssh_password: Option<String>,
    /// PEM private key file
    #[arg(long)]
    pub ssh_key: Option<PathBuf>,
    #[arg(long)]
    pub ssh_key_passphrase: Option<String>,
}

impl SshArgs {
    fn is_set(&self) -> bool {
        self.ssh_host.is_some()
    }

    async fn params(&self) -> Result<SshParams> {
        let host = self.ssh_host.clone().unwrap_or_default();
        let user = self.ssh_user.clone().unwrap_or_default();
        let mut params = SshParams::new(host, user);
        params.port = self.ssh_port;

        if let Some(path) = &self.ssh_key {
            let pem = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read SSH key {}", path.display()))?;
            params = params.with_private_key(pem, self.ssh_key_passphrase.clone().unwrap_or_default());
        } else {
            params = params.with_password(self.ssh_password.clone().unwrap_or_default());
        }
        Ok(params)
    }
}

/// Parse `host[:port]`
pub fn parse_resolver(raw: &str) -> Result<DnsResolver> {
    let raw = raw.trim();
    match raw.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            let port = port
                .parse()
                .with_context(|| format!("Invalid resolver port in {:?}", raw))?;
            Ok(DnsResolver::new(host, port))
        }
        // Bare IPv6 address or plain host
        _ if !raw.is_empty() => Ok(DnsResolver::new(raw, DEFAULT_DNS_PORT)),
        _ => bail!("Empty resolver"),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => bail!("Expected true/false, got {:?}", other),
    }
}

fn parse_number(value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .with_context(|| format!("Expected a number, got {:?}", value))
}

fn socks(port: u16) -> SocksListener {
    SocksListener::new(DEFAULT_SOCKS_HOST, port)
}

/// Apply `set <key> <value>`, returning the stored value for display
pub async fn apply_setting<B: Backend>(store: &ConfigStore<B>, key: &str, value: &str) -> Result<String> {
    let stored = match key {
        "auto_connect_on_boot" => {
            let enabled = parse_bool(value)?;
            store.set_auto_connect_on_boot(enabled).await?;
            enabled.to_string()
        }
        "debug_logging" => {
            let enabled = parse_bool(value)?;
            store.set_debug_logging(enabled).await?;
            enabled.to_string()
        }
        "dark_mode" => {
            let mode = DarkMode::parse(value)
                .with_context(|| format!("Unknown dark mode {:?}", value))?;
            store.set_dark_mode(mode).await?;
            mode.to_string()
        }
        "buffer_size" => {
            let size = BufferSize::parse(value)
                .with_context(|| format!("Unknown buffer size {:?}", value))?;
            store.set_buffer_size(size).await?;
            size.to_string()
        }
        "dns_timeout" => store.set_dns_timeout(parse_number(value)?).await?.to_string(),
        "connection_timeout" => store
            .set_connection_timeout(parse_number(value)?)
            .await?
            .to_string(),
        "connection_pool_size" => store
            .set_connection_pool_size(parse_number(value)?)
            .await?
            .to_string(),
        "last_connected_profile" => {
            let id = parse_profile_pointer(value)?;
            store.set_last_connected_profile_id(id).await?;
            value.trim().to_string()
        }
        "active_profile" => {
            let id = parse_profile_pointer(value)?;
            store.set_active_profile_id(id).await?;
            value.trim().to_string()
        }
        other => bail!("Unknown setting {:?}", other),
    };

    info!("Setting {} = {}", key, stored);
    Ok(stored)
}

/// `none` clears a pointer
fn parse_profile_pointer(value: &str) -> Result<Option<ProfileId>> {
    if value.trim().eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let id = value
        .trim()
        .parse()
        .with_context(|| format!("Expected a profile id or none, got {:?}", value))?;
    Ok(Some(ProfileId(id)))
}

fn describe(profile: &ServerProfile) -> String {
    let mut out = format!(
        "#{} {}{}\n  type:    {}\n  socks:   {}\n",
        profile.id,
        profile.name,
        if profile.is_active { " (active)" } else { "" },
        profile.tunnel_type().name(),
        profile.socks.proxy_url(),
    );

    if !profile.domain.is_empty() {
        out.push_str(&format!("  domain:  {}\n", profile.domain));
    }
    if !profile.resolvers.is_empty() {
        let resolvers: Vec<String> = profile.resolvers.iter().map(|r| r.to_string()).collect();
        out.push_str(&format!("  dns:     {}\n", resolvers.join(", ")));
    }
    if let Some(ssh) = profile.tunnel.ssh() {
        out.push_str(&format!("  ssh:     {}@{}:{} ({})\n", ssh.username, ssh.host, ssh.port, ssh.auth));
    }
    if let Some(doh) = profile.tunnel.doh() {
        out.push_str(&format!("  url:     {}\n", doh.url));
    }
    if let Some(tor) = profile.tunnel.tor() {
        let bridges = if tor.uses_default_bridge() {
            "built-in snowflake".to_string()
        } else {
            format!("{} custom", tor.lines().count())
        };
        out.push_str(&format!("  bridges: {}\n", bridges));
    }
    out
}

/// Run one subcommand against an open store
pub async fn run<B: Backend>(store: &ConfigStore<B>, command: Command) -> Result<()> {
    match command {
        Command::List => {
            let profiles = store.list().await;
            if profiles.is_empty() {
                println!("No profiles");
            }
            for profile in profiles {
                println!(
                    "{} {:>4}  {:<24} {}",
                    if profile.is_active { "*" } else { " " },
                    profile.id,
                    profile.name,
                    profile.tunnel_type()
                );
            }
        }

        Command::Show { id } => {
            let profile = store.get(ProfileId(id)).await?;
            print!("{}", describe(&profile));
        }

        Command::AddDnstt { name, domain, public_key, resolvers, transport, ssh, socks_port } => {
            let transport = DnsTransport::parse(&transport)
                .with_context(|| format!("Unknown DNS transport {:?}", transport))?;
            let dnstt = DnsttParams {
                public_key,
                transport,
                use_server_resolver: false,
            };
            let tunnel = if ssh.is_set() {
                TunnelConfig::DnsttSsh { dnstt, ssh: ssh.params().await? }
            } else {
                TunnelConfig::Dnstt(dnstt)
            };

            let mut profile = ServerProfile::new(name, tunnel)
                .with_domain(domain)
                .with_socks(socks(socks_port));
            for raw in &resolvers {
                profile = profile.with_resolver(parse_resolver(raw)?);
            }
            add(store, profile).await?;
        }

        Command::AddSsh { name, ssh, socks_port } => {
            let profile = ServerProfile::new(name, TunnelConfig::Ssh(ssh.params().await?))
                .with_socks(socks(socks_port));
            add(store, profile).await?;
        }

        Command::AddDoh { name, url, socks_port } => {
            let profile = ServerProfile::new(name, TunnelConfig::Doh(DohParams { url }))
                .with_socks(socks(socks_port));
            add(store, profile).await?;
        }

        Command::AddSnowflake { name, bridges, socks_port } => {
            let lines = match bridges {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read bridges file {}", path.display()))?,
                None => String::new(),
            };
            let profile = ServerProfile::new(name, TunnelConfig::Snowflake(TorParams::new(lines)))
                .with_socks(socks(socks_port));
            add(store, profile).await?;
        }

        Command::Activate { id } => {
            store.set_active(ProfileId(id)).await?;
            println!("Profile {} is now active", id);
        }

        Command::Delete { id } => {
            store.delete(ProfileId(id)).await?;
            println!("Deleted profile {}", id);
        }

        Command::Reorder { ids } => {
            let ids: Vec<ProfileId> = ids.into_iter().map(ProfileId).collect();
            store.reorder(&ids).await?;
            println!("Reordered {} profiles", store.list().await.len());
        }

        Command::Stats => {
            let settings = store.settings().await;
            let pointer = |id: Option<ProfileId>| id.map_or("none".to_string(), |id| id.to_string());

            println!("{}", settings.totals().format());
            println!("active profile:         {}", pointer(settings.active_profile_id));
            println!("last connected profile: {}", pointer(settings.last_connected_profile_id));
            println!("auto connect on boot:   {}", settings.auto_connect_on_boot);
            println!("debug logging:          {}", settings.debug_logging);
            println!("dark mode:              {}", settings.dark_mode);
            println!("dns timeout:            {} ms", settings.dns_timeout_ms);
            println!("connection timeout:     {} ms", settings.connection_timeout_ms);
            println!("buffer size:            {}", settings.buffer_size);
            println!("connection pool size:   {}", settings.connection_pool_size);
        }

        Command::ResetStats => {
            store.reset_total_stats().await?;
            println!("Statistics reset");
        }

        Command::Set { key, value } => {
            let stored = apply_setting(store, &key, &value).await?;
            println!("{} = {}", key, stored);
        }

        Command::Validate { id } => {
            let profile = store.resolve_for_connection(ProfileId(id)).await?;
            println!("Profile {} ({}) is ready to connect", profile.id, profile.tunnel_type());
        }
    }

    Ok(())
}

async fn add<B: Backend>(store: &ConfigStore<B>, profile: ServerProfile) -> Result<()> {
    // Incomplete profiles are stored; `validate` reports what is missing
    if let Err(e) = profile.validate() {
        eprintln!("warning: {}", e);
    }
    let id = store.create(profile).await?;
    println!("Created profile {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipnet_store::MemoryBackend;

    #[test]
    fn test_parse_resolver() {
        assert_eq!(parse_resolver("8.8.8.8").unwrap(), DnsResolver::new("8.8.8.8", 53));
        assert_eq!(parse_resolver("1.1.1.1:853").unwrap(), DnsResolver::new("1.1.1.1", 853));
        assert_eq!(parse_resolver("2001:db8::1").unwrap().port, 53);
        assert!(parse_resolver("host:abc").is_err());
        assert!(parse_resolver("  ").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("On").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_parse_profile_pointer() {
        assert_eq!(parse_profile_pointer("None").unwrap(), None);
        assert_eq!(
            parse_profile_pointer("5000000000").unwrap(),
            Some(ProfileId(5_000_000_000))
        );
        assert!(parse_profile_pointer("-1").is_err());
    }

    #[tokio::test]
    async fn test_apply_setting() {
        let store = ConfigStore::open(MemoryBackend::new()).await.unwrap();

        assert_eq!(apply_setting(&store, "dns_timeout", "500").await.unwrap(), "1000");
        assert_eq!(apply_setting(&store, "dark_mode", "DARK").await.unwrap(), "dark");
        assert_eq!(apply_setting(&store, "auto_connect_on_boot", "yes").await.unwrap(), "true");

        let settings = store.settings().await;
        assert_eq!(settings.dns_timeout_ms, 1000);
        assert_eq!(settings.dark_mode, DarkMode::Dark);
        assert!(settings.auto_connect_on_boot);

        assert!(apply_setting(&store, "buffer_size", "huge").await.is_err());
        assert!(apply_setting(&store, "colour", "blue").await.is_err());
        assert!(apply_setting(&store, "active_profile", "4").await.is_err());
        assert!(apply_setting(&store, "active_profile", "none").await.is_ok());
    }

    #[tokio::test]
    async fn test_add_and_describe() {
        let store = ConfigStore::open(MemoryBackend::new()).await.unwrap();

        run(
            &store,
            Command::AddDoh {
                name: "Cloud".to_string(),
                url: "https://dns.example/dns-query".to_string(),
                socks_port: 1090,
            },
        )
        .await
        .unwrap();

        let profile = store.list().await.remove(0);
        let text = describe(&profile);
        assert!(text.contains("Cloud"));
        assert!(text.contains("socks5://127.0.0.1:1090"));
        assert!(text.contains("https://dns.example/dns-query"));

        run(&store, Command::Activate { id: profile.id.0 }).await.unwrap();
        assert!(describe(&store.get(profile.id).await.unwrap()).contains("(active)"));
        assert!(run(&store, Command::Validate { id: 99 }).await.is_err());
    }
}
