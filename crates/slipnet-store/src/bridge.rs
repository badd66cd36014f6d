//! Tor Bridge Lines
//!
//! Snowflake profiles carry newline-delimited bridge lines in torrc form.
//! The pluggable transport of each line is its leading token; an optional
//! `Bridge` keyword in front of it is accepted.

use crate::profile::TorParams;
use crate::token::token_enum;

/// Built-in bridge used when a profile lists none
pub const DEFAULT_SNOWFLAKE_BRIDGE: &str = "snowflake 192.0.2.3:80 2B280B23E1107BB62ABFC40DDCC8824814F80A72 \
fingerprint=2B280B23E1107BB62ABFC40DDCC8824814F80A72 \
url=https://1098762253.rsc.cdn77.org/ fronts=www.cdn77.com,www.phpmyadmin.net \
ice=stun:stun.antisip.com:3478,stun:stun.epygi.com:3478,stun:stun.uls.co.za:3478 \
utls-imitate=hellorandomizedalpn";

token_enum! {
    /// Pluggable transport named by a bridge line
    pub enum BridgeTransport (default = Snowflake) {
        Snowflake => "snowflake",
        Obfs4 => "obfs4",
        Webtunnel => "webtunnel",
        MeekLite => "meek_lite",
    }
}

/// Bridge line errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("Empty bridge line")]
    Empty,

    #[error("Unknown bridge transport: {0}")]
    UnknownTransport(String),
}

/// One parsed bridge line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeLine {
    pub transport: BridgeTransport,
    /// Line without the `Bridge` keyword
    pub line: String,
}

impl BridgeLine {
    /// Parse a single line
    pub fn parse(raw: &str) -> Result<Self, BridgeError> {
        let mut line = raw.trim();
        if let Some(rest) = line.strip_prefix("Bridge ") {
            line = rest.trim_start();
        }

        let token = line.split_whitespace().next().ok_or(BridgeError::Empty)?;
        let transport = BridgeTransport::parse(token)
            .ok_or_else(|| BridgeError::UnknownTransport(token.to_string()))?;

        Ok(Self {
            transport,
            line: line.to_string(),
        })
    }
}

impl TorParams {
    pub fn new(bridge_lines: impl Into<String>) -> Self {
        Self {
            bridge_lines: bridge_lines.into(),
        }
    }

    /// Non-blank lines, trimmed
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.bridge_lines
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    /// No custom bridges configured?
    pub fn uses_default_bridge(&self) -> bool {
        self.lines().next().is_none()
    }

    /// Bridges to hand to Tor, falling back to the built-in Snowflake bridge
    pub fn bridges(&self) -> Result<Vec<BridgeLine>, BridgeError> {
        if self.uses_default_bridge() {
            return BridgeLine::parse(DEFAULT_SNOWFLAKE_BRIDGE).map(|b| vec![b]);
        }
        self.lines().map(BridgeLine::parse).collect()
    }

    /// Distinct transports the bridges need, in first-seen order
    pub fn transports(&self) -> Result<Vec<BridgeTransport>, BridgeError> {
        let mut out = Vec::new();
        for bridge in self.bridges()? {
            if !out.contains(&bridge.transport) {
                out.push(bridge.transport);
            }
        }
        Ok(out)
    }
}
