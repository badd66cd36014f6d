//! Profile Validation
//!
//! Checks that a profile carries enough parameters for its tunnel type.
//! Connection orchestration runs this before acquiring any network
//! resource, so a bad profile fails up front instead of half-way through a
//! connection attempt.
//!
//! Errors name the offending field using its stored column name.

use crate::bridge::BridgeLine;
use crate::profile::{DnsttParams, DohParams, ServerProfile, SshAuthType, SshParams, TorParams, TunnelConfig};
use url::Url;

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ValidationError {
    /// Name of the offending field
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing { field } | ValidationError::Invalid { field, .. } => field,
        }
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

impl ServerProfile {
    /// Validate the parameters required by this profile's tunnel type
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.socks.port == 0 {
            return Err(ValidationError::invalid("socks_port", "port must be non-zero"));
        }

        match &self.tunnel {
            TunnelConfig::Slipstream(_) => Ok(()),
            TunnelConfig::SlipstreamSsh { ssh, .. } => validate_ssh(ssh),
            TunnelConfig::Dnstt(dnstt) => validate_dnstt(dnstt),
            TunnelConfig::DnsttSsh { dnstt, ssh } => {
                validate_dnstt(dnstt)?;
                validate_ssh(ssh)
            }
            TunnelConfig::Ssh(ssh) => validate_ssh(ssh),
            TunnelConfig::Doh(doh) => validate_doh(doh),
            TunnelConfig::Snowflake(tor) => validate_bridges(tor),
        }
    }
}

fn validate_dnstt(dnstt: &DnsttParams) -> Result<(), ValidationError> {
    if dnstt.public_key.trim().is_empty() {
        return Err(ValidationError::Missing {
            field: "dnstt_public_key",
        });
    }
    Ok(())
}

fn validate_ssh(ssh: &SshParams) -> Result<(), ValidationError> {
    if ssh.host.trim().is_empty() {
        return Err(ValidationError::Missing { field: "ssh_host" });
    }
    if ssh.port == 0 {
        return Err(ValidationError::invalid("ssh_port", "port must be non-zero"));
    }
    if ssh.password.is_empty() && ssh.private_key.trim().is_empty() {
        let field = match ssh.auth {
            SshAuthType::Password => "ssh_password",
            SshAuthType::Key => "ssh_private_key",
        };
        return Err(ValidationError::Missing { field });
    }
    Ok(())
}

fn validate_doh(doh: &DohParams) -> Result<(), ValidationError> {
    const FIELD: &str = "doh_url";

    let raw = doh.url.trim();
    if raw.is_empty() {
        return Err(ValidationError::Missing { field: FIELD });
    }

    let url = Url::parse(raw).map_err(|e| ValidationError::invalid(FIELD, e.to_string()))?;
    if url.scheme() != "https" {
        return Err(ValidationError::invalid(
            FIELD,
            format!("scheme must be https, got {}", url.scheme()),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::invalid(FIELD, "missing host"));
    }
    Ok(())
}

fn validate_bridges(tor: &TorParams) -> Result<(), ValidationError> {
    for line in tor.lines() {
        BridgeLine::parse(line)
            .map_err(|e| ValidationError::invalid("tor_bridge_lines", e.to_string()))?;
    }
    Ok(())
}
