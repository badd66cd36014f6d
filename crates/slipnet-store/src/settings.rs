//! App Settings & Statistics
//!
//! The process-wide settings record: behaviour flags, presentation,
//! active/last-connected pointers, network tuning and cumulative usage
//! counters.
//!
//! Tuning values are clamped when written through the store. Values loaded
//! from disk are returned exactly as stored.

use crate::profile::ProfileId;
use crate::token::token_enum;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// DNS timeout bounds (milliseconds)
pub const DNS_TIMEOUT_RANGE: RangeInclusive<u32> = 1_000..=15_000;
pub const DEFAULT_DNS_TIMEOUT_MS: u32 = 5_000;

/// Connection timeout bounds (milliseconds)
pub const CONNECTION_TIMEOUT_RANGE: RangeInclusive<u32> = 10_000..=60_000;
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u32 = 30_000;

/// Connection pool size bounds
pub const CONNECTION_POOL_RANGE: RangeInclusive<u32> = 1..=20;
pub const DEFAULT_CONNECTION_POOL_SIZE: u32 = 10;

/// Clamp `value` into `range`
pub fn clamp(value: u32, range: &RangeInclusive<u32>) -> u32 {
    value.clamp(*range.start(), *range.end())
}

token_enum! {
    /// Theme preference
    pub enum DarkMode (default = System) {
        Light => "light",
        Dark => "dark",
        System => "system",
    }
}

token_enum! {
    /// Transfer buffer size tier
    pub enum BufferSize (default = Medium) {
        Small => "small",
        Medium => "medium",
        Large => "large",
    }
}

impl BufferSize {
    /// Buffer size in bytes
    pub fn bytes(&self) -> usize {
        match self {
            BufferSize::Small => 64 * 1024,
            BufferSize::Medium => 256 * 1024,
            BufferSize::Large => 512 * 1024,
        }
    }
}

/// Settings/statistics singleton
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub auto_connect_on_boot: bool,
    pub debug_logging: bool,
    pub dark_mode: DarkMode,
    pub active_profile_id: Option<ProfileId>,
    pub last_connected_profile_id: Option<ProfileId>,
    pub total_bytes_sent: u64,
    pub total_bytes_received: u64,
    pub total_connection_time_ms: u64,
    pub dns_timeout_ms: u32,
    pub connection_timeout_ms: u32,
    pub buffer_size: BufferSize,
    pub connection_pool_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_connect_on_boot: false,
            debug_logging: false,
            dark_mode: DarkMode::System,
            active_profile_id: None,
            last_connected_profile_id: None,
            total_bytes_sent: 0,
            total_bytes_received: 0,
            total_connection_time_ms: 0,
            dns_timeout_ms: DEFAULT_DNS_TIMEOUT_MS,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            buffer_size: BufferSize::Medium,
            connection_pool_size: DEFAULT_CONNECTION_POOL_SIZE,
        }
    }
}

impl Settings {
    /// Cumulative counters
    pub fn totals(&self) -> TotalStats {
        TotalStats {
            bytes_sent: self.total_bytes_sent,
            bytes_received: self.total_bytes_received,
            connection_time_ms: self.total_connection_time_ms,
        }
    }

    pub(crate) fn add_stats(&mut self, bytes_sent: u64, bytes_received: u64, connection_time_ms: u64) {
        self.total_bytes_sent = self.total_bytes_sent.saturating_add(bytes_sent);
        self.total_bytes_received = self.total_bytes_received.saturating_add(bytes_received);
        self.total_connection_time_ms = self.total_connection_time_ms.saturating_add(connection_time_ms);
    }

    pub(crate) fn reset_stats(&mut self) {
        self.total_bytes_sent = 0;
        self.total_bytes_received = 0;
        self.total_connection_time_ms = 0;
    }

    /// Drop pointers that reference `id`
    pub(crate) fn forget_profile(&mut self, id: ProfileId) {
        if self.active_profile_id == Some(id) {
            self.active_profile_id = None;
        }
        if self.last_connected_profile_id == Some(id) {
            self.last_connected_profile_id = None;
        }
    }
}

/// Cumulative usage counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TotalStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Milliseconds
    pub connection_time_ms: u64,
}

impl TotalStats {
    /// Format as human-readable string
    pub fn format(&self) -> String {
        format!(
            "TX: {}, RX: {}, Time: {}",
            Self::scaled(self.bytes_sent),
            Self::scaled(self.bytes_received),
            format_duration(self.connection_time_ms)
        )
    }

    /// Byte count in the largest binary unit that keeps it at or above 1
    fn scaled(bytes: u64) -> String {
        const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

        if bytes < 1024 {
            return format!("{} B", bytes);
        }
        let mut value = bytes as f64 / 1024.0;
        let mut unit = 0;
        while value >= 1024.0 && unit + 1 < UNITS.len() {
            value /= 1024.0;
            unit += 1;
        }
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Teardown report from a tunnel engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub duration_ms: u64,
}

fn format_duration(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}h {:02}m {:02}s", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.dark_mode, DarkMode::System);
        assert_eq!(settings.dns_timeout_ms, 5000);
        assert_eq!(settings.connection_timeout_ms, 30000);
        assert_eq!(settings.buffer_size.bytes(), 256 * 1024);
        assert_eq!(settings.connection_pool_size, 10);
        assert!(settings.active_profile_id.is_none());
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(500, &DNS_TIMEOUT_RANGE), 1000);
        assert_eq!(clamp(99_999, &DNS_TIMEOUT_RANGE), 15000);
        assert_eq!(clamp(7000, &DNS_TIMEOUT_RANGE), 7000);
        assert_eq!(clamp(0, &CONNECTION_POOL_RANGE), 1);
        assert_eq!(clamp(5, &CONNECTION_TIMEOUT_RANGE), 10000);
    }

    #[test]
    fn test_stats_saturate() {
        let mut settings = Settings::default();
        settings.add_stats(u64::MAX - 1, 10, 10);
        settings.add_stats(5, 5, 5);

        assert_eq!(settings.total_bytes_sent, u64::MAX);
        assert_eq!(settings.totals().bytes_received, 15);

        settings.reset_stats();
        assert_eq!(settings.totals(), TotalStats::default());
    }

    #[test]
    fn test_forget_profile() {
        let mut settings = Settings {
            active_profile_id: Some(ProfileId(3)),
            last_connected_profile_id: Some(ProfileId(4)),
            ..Settings::default()
        };

        settings.forget_profile(ProfileId(3));
        assert_eq!(settings.active_profile_id, None);
        assert_eq!(settings.last_connected_profile_id, Some(ProfileId(4)));
    }

    #[test]
    fn test_stored_values_not_reclamped() {
        let settings: Settings = serde_json::from_str(
            r#"{ "dns_timeout_ms": 50, "dark_mode": "sepia", "buffer_size": "large" }"#,
        )
        .unwrap();

        assert_eq!(settings.dns_timeout_ms, 50);
        assert_eq!(settings.dark_mode, DarkMode::System);
        assert_eq!(settings.buffer_size, BufferSize::Large);
        assert_eq!(settings.connection_pool_size, 10);
    }

    #[test]
    fn test_format() {
        let stats = TotalStats {
            bytes_sent: 1024,
            bytes_received: 3 * 1024 * 1024,
            connection_time_ms: 3_725_000,
        };
        assert_eq!(stats.format(), "TX: 1.00 KB, RX: 3.00 MB, Time: 1h 02m 05s");
    }

    #[test]
    fn test_scaled_units() {
        assert_eq!(TotalStats::scaled(0), "0 B");
        assert_eq!(TotalStats::scaled(1023), "1023 B");
        assert_eq!(TotalStats::scaled(1536), "1.50 KB");
        assert_eq!(TotalStats::scaled(5 * 1024 * 1024 * 1024), "5.00 GB");
        assert_eq!(TotalStats::scaled(2048 * 1024u64.pow(4)), "2048.00 TB");
    }
}
