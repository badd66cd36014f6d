//! SlipNet Store - Tunnel Profiles and Persistent Settings
//!
//! Data model for DNS-tunnelling VPN profiles plus the durable store that
//! keeps the profile list, the active/last-connected pointers, app settings
//! and cumulative usage statistics.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   create/update/    ┌──────────────────────────────┐
//! │  UI / CLI    │───set_active/...───▶│         ConfigStore          │
//! └──────────────┘                     │                              │
//!        ▲                             │  gate ─▶ next state ─▶ save  │
//!        │ Watch<T>                    │                   │          │
//!        └─────────────────────────────│── publish ◀── commit         │
//!                                      └───────────────────┬──────────┘
//! ┌──────────────┐   record_connected/                     │
//! │ Tunnel engine│───record_session───▶ (same gate)        ▼
//! └──────────────┘                              ┌─────────────────────┐
//!                                               │ Backend             │
//!                                               │ (state.json, atomic)│
//!                                               └─────────────────────┘
//! ```
//!
//! # Features
//!
//! - **Typed profiles**: each tunnel type carries only its own parameters
//! - **Stable tokens**: enums persist as strings, unknown tokens load as defaults
//! - **Atomic writes**: temp file plus rename, failed saves change nothing
//! - **Live values**: subscriptions for the profile list and every setting

mod backend;
mod bridge;
mod error;
mod profile;
mod record;
mod settings;
mod store;
mod token;
mod validate;
mod watch;

pub use backend::{Backend, JsonFileBackend, MemoryBackend, StateDocument, FORMAT_VERSION, STATE_FILE};
pub use bridge::{BridgeError, BridgeLine, BridgeTransport, DEFAULT_SNOWFLAKE_BRIDGE};
pub use error::{StorageError, StoreError, StoreResult};
pub use profile::{
    CongestionControl, DnsResolver, DnsTransport, DnsttParams, DohParams, EngineKind, ProfileId,
    QuicParams, ServerProfile, SocksListener, SshAuthType, SshParams, TorParams, TunnelConfig,
    TunnelType, DEFAULT_DNS_PORT, DEFAULT_KEEP_ALIVE_MS, DEFAULT_SOCKS_HOST, DEFAULT_SOCKS_PORT,
    DEFAULT_SSH_PORT,
};
pub use record::ProfileRecord;
pub use settings::{
    BufferSize, DarkMode, SessionReport, Settings, TotalStats,
    CONNECTION_POOL_RANGE, CONNECTION_TIMEOUT_RANGE, DEFAULT_CONNECTION_POOL_SIZE,
    DEFAULT_CONNECTION_TIMEOUT_MS, DEFAULT_DNS_TIMEOUT_MS, DNS_TIMEOUT_RANGE,
};
pub use store::ConfigStore;
pub use validate::ValidationError;
pub use watch::Watch;
