//! Configuration Store
//!
//! Single writer gate for all persisted state: the profile table and the
//! settings/statistics record.
//!
//! # Write path
//!
//! ```text
//! caller ──▶ gate (Mutex) ──▶ clone committed state ──▶ apply change
//!                                                          │
//!             publish (watch) ◀── commit ◀── backend.save ◀┘
//! ```
//!
//! Every write holds the gate while it builds the next state, persists it,
//! and only then commits and publishes it. A failed save leaves the
//! committed state untouched, and observers never see a half-applied
//! change. Writes that touch both records (delete, set_active) are still a
//! single transition.
//!
//! Save and commit run on their own task, which owns the gate until the
//! commit. Dropping the caller's future once the change is built does not
//! stop the write.
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = Arc::new(ConfigStore::open_dir("/var/lib/slipnet").await?);
//!
//! let id = store.create(ServerProfile::new("Home", TunnelConfig::Dnstt(DnsttParams::new("ab12")))).await?;
//! store.set_active(id).await?;
//!
//! // Engine teardown
//! store.record_session(SessionReport { bytes_sent: 1024, bytes_received: 4096, duration_ms: 60_000 }).await?;
//! ```

use crate::backend::{Backend, JsonFileBackend, StateDocument, FORMAT_VERSION};
use crate::error::{StorageError, StoreError, StoreResult};
use crate::profile::{ProfileId, ServerProfile};
use crate::record::ProfileRecord;
use crate::settings::{
    clamp, BufferSize, DarkMode, SessionReport, Settings, TotalStats, CONNECTION_POOL_RANGE,
    CONNECTION_TIMEOUT_RANGE, DNS_TIMEOUT_RANGE,
};
use crate::watch::Watch;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Current epoch time in milliseconds
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Committed state, shared with subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoreState {
    pub(crate) next_id: u64,
    /// Kept in list order
    pub(crate) profiles: Vec<ServerProfile>,
    pub(crate) settings: Settings,
}

impl StoreState {
    fn from_document(doc: StateDocument) -> Self {
        let mut profiles: Vec<ServerProfile> = Vec::with_capacity(doc.profiles.len());
        for record in &doc.profiles {
            if profiles.iter().any(|p| p.id.0 == record.id) {
                warn!("Duplicate profile id {} in stored state, keeping the first", record.id);
                continue;
            }
            profiles.push(ServerProfile::from(record));
        }
        let max_id = profiles.iter().map(|p| p.id.0).max().unwrap_or(0);

        let mut state = Self {
            next_id: doc.next_id.max(max_id.saturating_add(1)),
            profiles,
            settings: doc.settings,
        };

        // Pointers must reference stored profiles; flags follow the active pointer
        let active = state
            .settings
            .active_profile_id
            .filter(|id| state.find(*id).is_some());
        if active != state.settings.active_profile_id {
            warn!("Active profile {:?} not found, clearing", state.settings.active_profile_id);
        }
        if let Some(id) = state.settings.last_connected_profile_id {
            if state.find(id).is_none() {
                warn!("Last connected profile {} not found, clearing", id);
                state.settings.last_connected_profile_id = None;
            }
        }
        for profile in &mut state.profiles {
            profile.is_active = Some(profile.id) == active;
        }
        state.settings.active_profile_id = active;

        state.sort();
        state
    }

    fn to_document(&self) -> StateDocument {
        StateDocument {
            version: FORMAT_VERSION,
            next_id: self.next_id,
            profiles: self.profiles.iter().map(ProfileRecord::from).collect(),
            settings: self.settings.clone(),
        }
    }

    fn sort(&mut self) {
        self.profiles
            .sort_by_key(|p| (p.sort_order, p.created_at, p.id));
    }

    fn find(&self, id: ProfileId) -> Option<&ServerProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    fn find_mut(&mut self, id: ProfileId) -> StoreResult<&mut ServerProfile> {
        self.profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    fn next_sort_order(&self) -> i32 {
        self.profiles
            .iter()
            .map(|p| p.sort_order)
            .max()
            .map_or(0, |max| max.saturating_add(1))
    }

    fn insert(&mut self, mut profile: ServerProfile, sort_order: i32) -> ProfileId {
        let id = ProfileId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);

        let now = now_millis();
        profile.id = id;
        profile.sort_order = sort_order;
        profile.created_at = now;
        profile.updated_at = now;
        profile.is_active = false;
        profile.last_connected_at = 0;

        self.profiles.push(profile);
        id
    }

    fn activate(&mut self, id: Option<ProfileId>) -> StoreResult<()> {
        if let Some(id) = id {
            if self.find(id).is_none() {
                return Err(StoreError::NotFound(id));
            }
        }
        for profile in &mut self.profiles {
            profile.is_active = Some(profile.id) == id;
        }
        self.settings.active_profile_id = id;
        Ok(())
    }
}

impl Default for StoreState {
    fn default() -> Self {
        Self::from_document(StateDocument::default())
    }
}

/// Persistent configuration store
pub struct ConfigStore<B: Backend = JsonFileBackend> {
    inner: Arc<Inner<B>>,
}

/// Shared with in-flight write tasks
struct Inner<B> {
    backend: B,
    /// Serializes writers
    gate: Arc<Mutex<()>>,
    state: watch::Sender<Arc<StoreState>>,
}

impl ConfigStore<JsonFileBackend> {
    /// Open (or initialize) the store in a data directory
    pub async fn open_dir(dir: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(JsonFileBackend::in_dir(dir)).await
    }
}

impl<B: Backend> ConfigStore<B> {
    /// Load the stored state, or start from defaults if none exists
    pub async fn open(backend: B) -> StoreResult<Self> {
        let state = match backend.load().await? {
            Some(doc) => StoreState::from_document(doc),
            None => {
                info!("No stored configuration, starting from defaults");
                StoreState::default()
            }
        };

        info!(
            "Configuration store opened ({} profiles, active: {:?})",
            state.profiles.len(),
            state.settings.active_profile_id
        );

        let (tx, _) = watch::channel(Arc::new(state));
        Ok(Self {
            inner: Arc::new(Inner {
                backend,
                gate: Arc::new(Mutex::new(())),
                state: tx,
            }),
        })
    }

    /// Backend this store persists to
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Apply `change` to a copy of the committed state, persist it, then
    /// commit and publish it. Nothing is committed if `change` or the save
    /// fails.
    ///
    /// Once `change` has succeeded, the save and commit finish even if the
    /// returned future is dropped.
    async fn write<R, F>(&self, op: &'static str, change: F) -> StoreResult<R>
    where
        F: FnOnce(&mut StoreState) -> StoreResult<R> + Send,
        R: Send,
    {
        let gate = self.inner.gate.clone().lock_owned().await;

        let mut next = StoreState::clone(&self.inner.state.borrow());
        let out = change(&mut next)?;
        next.sort();

        let inner = self.inner.clone();
        let commit = tokio::spawn(async move {
            let _gate = gate;
            inner.backend.save(&next.to_document()).await?;
            inner.state.send_replace(Arc::new(next));
            debug!("Committed {}", op);
            Ok::<(), StorageError>(())
        });

        match commit.await {
            Ok(result) => result?,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => return Err(StorageError::Aborted(e.to_string()).into()),
        }
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let state = self.inner.state.borrow();
        f(&**state)
    }

    fn observe<T: Clone + PartialEq>(
        &self,
        project: impl Fn(&StoreState) -> T + Send + Sync + 'static,
    ) -> Watch<T> {
        Watch::new(self.inner.state.subscribe(), project)
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    /// Store a new profile at the end of the list and return its id
    pub async fn create(&self, profile: ServerProfile) -> StoreResult<ProfileId> {
        let id = self
            .write("create", move |state| {
                let order = state.next_sort_order();
                Ok(state.insert(profile, order))
            })
            .await?;

        info!("Created profile {}", id);
        Ok(id)
    }

    /// Store a new profile at an explicit list position
    pub async fn create_at(&self, profile: ServerProfile, sort_order: i32) -> StoreResult<ProfileId> {
        let id = self
            .write("create", move |state| Ok(state.insert(profile, sort_order)))
            .await?;

        info!("Created profile {} at position {}", id, sort_order);
        Ok(id)
    }

    /// Replace a stored profile with an edited version
    ///
    /// `created_at`, `is_active` and `last_connected_at` keep their stored
    /// values.
    pub async fn update(&self, profile: ServerProfile) -> StoreResult<()> {
        let id = profile.id;
        self.write("update", move |state| {
            let stored = state.find_mut(id)?;
            let updated = ServerProfile {
                created_at: stored.created_at,
                is_active: stored.is_active,
                last_connected_at: stored.last_connected_at,
                updated_at: now_millis(),
                ..profile
            };
            *stored = updated;
            Ok(())
        })
        .await?;

        debug!("Updated profile {}", id);
        Ok(())
    }

    /// Remove a profile, clearing any settings pointer that references it
    pub async fn delete(&self, id: ProfileId) -> StoreResult<()> {
        self.write("delete", move |state| {
            let before = state.profiles.len();
            state.profiles.retain(|p| p.id != id);
            if state.profiles.len() == before {
                return Err(StoreError::NotFound(id));
            }
            state.settings.forget_profile(id);
            Ok(())
        })
        .await?;

        info!("Deleted profile {}", id);
        Ok(())
    }

    /// Resolve one profile
    pub async fn get(&self, id: ProfileId) -> StoreResult<ServerProfile> {
        self.read(|state| state.find(id).cloned())
            .ok_or(StoreError::NotFound(id))
    }

    /// Resolve a profile and check it is complete enough to connect with
    pub async fn resolve_for_connection(&self, id: ProfileId) -> StoreResult<ServerProfile> {
        let profile = self.get(id).await?;
        profile.validate()?;
        Ok(profile)
    }

    /// All profiles, by `sort_order` then `created_at`
    pub async fn list(&self) -> Vec<ServerProfile> {
        self.read(|state| state.profiles.clone())
    }

    /// Live profile list
    pub fn observe_profiles(&self) -> Watch<Vec<ServerProfile>> {
        self.observe(|state| state.profiles.clone())
    }

    /// Make `id` the only active profile
    pub async fn set_active(&self, id: ProfileId) -> StoreResult<()> {
        self.write("set_active", move |state| state.activate(Some(id)))
            .await?;

        info!("Active profile is now {}", id);
        Ok(())
    }

    /// The active profile, if any
    pub async fn active_profile(&self) -> Option<ServerProfile> {
        self.read(|state| {
            state
                .settings
                .active_profile_id
                .and_then(|id| state.find(id).cloned())
        })
    }

    /// Rewrite list order: `ids` first in the given order, then every other
    /// profile in its existing relative order.
    pub async fn reorder(&self, ids: &[ProfileId]) -> StoreResult<()> {
        let ids = ids.to_vec();
        self.write("reorder", move |state| {
            let mut ordered: Vec<ProfileId> = Vec::with_capacity(state.profiles.len());
            for id in ids {
                if state.find(id).is_none() {
                    return Err(StoreError::NotFound(id));
                }
                if !ordered.contains(&id) {
                    ordered.push(id);
                }
            }
            for profile in &state.profiles {
                if !ordered.contains(&profile.id) {
                    ordered.push(profile.id);
                }
            }

            for (position, id) in ordered.into_iter().enumerate() {
                state.find_mut(id)?.sort_order = position as i32;
            }
            Ok(())
        })
        .await
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    /// Record that a connection with `id` came up
    pub async fn record_connected(&self, id: ProfileId) -> StoreResult<()> {
        self.write("record_connected", move |state| {
            state.find_mut(id)?.last_connected_at = now_millis();
            state.settings.last_connected_profile_id = Some(id);
            Ok(())
        })
        .await?;

        debug!("Recorded connection for profile {}", id);
        Ok(())
    }

    /// Fold a teardown report into the cumulative counters
    pub async fn record_session(&self, report: SessionReport) -> StoreResult<TotalStats> {
        self.update_total_stats(report.bytes_sent, report.bytes_received, report.duration_ms)
            .await
    }

    /// Profile to connect at boot: the active one, else the last connected,
    /// but only when auto-connect is enabled.
    pub async fn boot_target(&self) -> Option<ServerProfile> {
        self.read(|state| {
            if !state.settings.auto_connect_on_boot {
                return None;
            }
            state
                .settings
                .active_profile_id
                .or(state.settings.last_connected_profile_id)
                .and_then(|id| state.find(id).cloned())
        })
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Snapshot of the settings record
    pub async fn settings(&self) -> Settings {
        self.read(|state| state.settings.clone())
    }

    pub fn observe_settings(&self) -> Watch<Settings> {
        self.observe(|state| state.settings.clone())
    }

    pub fn observe_auto_connect_on_boot(&self) -> Watch<bool> {
        self.observe(|state| state.settings.auto_connect_on_boot)
    }

    pub fn observe_debug_logging(&self) -> Watch<bool> {
        self.observe(|state| state.settings.debug_logging)
    }

    pub fn observe_dark_mode(&self) -> Watch<DarkMode> {
        self.observe(|state| state.settings.dark_mode)
    }

    pub fn observe_active_profile_id(&self) -> Watch<Option<ProfileId>> {
        self.observe(|state| state.settings.active_profile_id)
    }

    pub fn observe_last_connected_profile_id(&self) -> Watch<Option<ProfileId>> {
        self.observe(|state| state.settings.last_connected_profile_id)
    }

    pub fn observe_total_stats(&self) -> Watch<TotalStats> {
        self.observe(|state| state.settings.totals())
    }

    pub fn observe_dns_timeout(&self) -> Watch<u32> {
        self.observe(|state| state.settings.dns_timeout_ms)
    }

    pub fn observe_connection_timeout(&self) -> Watch<u32> {
        self.observe(|state| state.settings.connection_timeout_ms)
    }

    pub fn observe_buffer_size(&self) -> Watch<BufferSize> {
        self.observe(|state| state.settings.buffer_size)
    }

    pub fn observe_connection_pool_size(&self) -> Watch<u32> {
        self.observe(|state| state.settings.connection_pool_size)
    }

    async fn write_settings(&self, op: &'static str, change: impl FnOnce(&mut Settings) + Send) -> StoreResult<()> {
        self.write(op, move |state| {
            change(&mut state.settings);
            Ok(())
        })
        .await
    }

    pub async fn set_auto_connect_on_boot(&self, enabled: bool) -> StoreResult<()> {
        self.write_settings("set_auto_connect_on_boot", move |s| s.auto_connect_on_boot = enabled)
            .await
    }

    pub async fn set_debug_logging(&self, enabled: bool) -> StoreResult<()> {
        self.write_settings("set_debug_logging", move |s| s.debug_logging = enabled)
            .await
    }

    pub async fn set_dark_mode(&self, mode: DarkMode) -> StoreResult<()> {
        self.write_settings("set_dark_mode", move |s| s.dark_mode = mode)
            .await
    }

    pub async fn set_buffer_size(&self, size: BufferSize) -> StoreResult<()> {
        self.write_settings("set_buffer_size", move |s| s.buffer_size = size)
            .await
    }

    /// Replace the active-profile pointer, keeping `is_active` flags in
    /// step. `None` deactivates every profile.
    pub async fn set_active_profile_id(&self, id: Option<ProfileId>) -> StoreResult<()> {
        self.write("set_active_profile_id", move |state| state.activate(id))
            .await
    }

    pub async fn set_last_connected_profile_id(&self, id: Option<ProfileId>) -> StoreResult<()> {
        self.write("set_last_connected_profile_id", move |state| {
            if let Some(id) = id {
                state.find_mut(id)?;
            }
            state.settings.last_connected_profile_id = id;
            Ok(())
        })
        .await
    }

    /// Set the DNS timeout, clamped to 1000..=15000 ms. Returns the stored value.
    pub async fn set_dns_timeout(&self, ms: u32) -> StoreResult<u32> {
        let value = clamp(ms, &DNS_TIMEOUT_RANGE);
        self.write_settings("set_dns_timeout", move |s| s.dns_timeout_ms = value)
            .await?;
        Ok(value)
    }

    /// Set the connection timeout, clamped to 10000..=60000 ms. Returns the stored value.
    pub async fn set_connection_timeout(&self, ms: u32) -> StoreResult<u32> {
        let value = clamp(ms, &CONNECTION_TIMEOUT_RANGE);
        self.write_settings("set_connection_timeout", move |s| s.connection_timeout_ms = value)
            .await?;
        Ok(value)
    }

    /// Set the connection pool size, clamped to 1..=20. Returns the stored value.
    pub async fn set_connection_pool_size(&self, size: u32) -> StoreResult<u32> {
        let value = clamp(size, &CONNECTION_POOL_RANGE);
        self.write_settings("set_connection_pool_size", move |s| s.connection_pool_size = value)
            .await?;
        Ok(value)
    }

    /// Add to the cumulative counters as one indivisible step.
    /// Returns the new totals.
    pub async fn update_total_stats(
        &self,
        bytes_sent: u64,
        bytes_received: u64,
        connection_time_ms: u64,
    ) -> StoreResult<TotalStats> {
        self.write("update_total_stats", move |state| {
            state.settings.add_stats(bytes_sent, bytes_received, connection_time_ms);
            Ok(state.settings.totals())
        })
        .await
    }

    /// Zero all three counters
    pub async fn reset_total_stats(&self) -> StoreResult<()> {
        self.write_settings("reset_total_stats", Settings::reset_stats)
            .await?;

        info!("Statistics reset");
        Ok(())
    }
}
