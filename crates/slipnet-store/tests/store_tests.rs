//! Store behaviour against the on-disk JSON backend

use slipnet_store::{
    BufferSize, ConfigStore, DarkMode, DnsResolver, DnsTransport, DnsttParams, DohParams,
    JsonFileBackend, ProfileId, QuicParams, ServerProfile, SocksListener, SshParams, StorageError,
    StoreError, TorParams, TunnelConfig, TunnelType, CongestionControl, STATE_FILE,
};
use std::sync::Arc;

fn dnstt_ssh_profile() -> ServerProfile {
    ServerProfile::new(
        "Office",
        TunnelConfig::DnsttSsh {
            dnstt: DnsttParams {
                public_key: "ab12cd34".to_string(),
                transport: DnsTransport::Dot,
                use_server_resolver: true,
            },
            ssh: SshParams::new("10.0.0.1", "admin").with_password("hunter2"),
        },
    )
    .with_domain("t.example.com")
    .with_resolver(DnsResolver::new("8.8.8.8", 53))
    .with_resolver(DnsResolver::new("1.1.1.1", 853).authoritative())
    .with_socks(SocksListener::new("127.0.0.1", 1081).with_credentials("user", "pass"))
}

fn slipstream_profile() -> ServerProfile {
    ServerProfile::new(
        "Fast",
        TunnelConfig::Slipstream(QuicParams {
            congestion_control: CongestionControl::Dcubic,
            keep_alive_interval_ms: 400,
            authoritative_dns: true,
            gso: true,
        }),
    )
    .with_domain("s.example.com")
}

#[tokio::test]
async fn test_reload_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    let (office, fast, doh, tor) = {
        let store = ConfigStore::open_dir(dir.path()).await.unwrap();
        let office = store.create(dnstt_ssh_profile()).await.unwrap();
        let fast = store.create(slipstream_profile()).await.unwrap();
        let doh = store
            .create(ServerProfile::new(
                "DoH",
                TunnelConfig::Doh(DohParams {
                    url: "https://dns.example/dns-query".to_string(),
                }),
            ))
            .await
            .unwrap();
        let tor = store
            .create(ServerProfile::new(
                "Tor",
                TunnelConfig::Snowflake(TorParams::new("obfs4 192.0.2.1:443 FP cert=x")),
            ))
            .await
            .unwrap();

        store.set_active(fast).await.unwrap();
        store.record_connected(office).await.unwrap();
        store.set_dark_mode(DarkMode::Dark).await.unwrap();
        store.set_buffer_size(BufferSize::Small).await.unwrap();
        store.update_total_stats(10, 20, 30).await.unwrap();
        (office, fast, doh, tor)
    };

    let before = {
        let store = ConfigStore::open_dir(dir.path()).await.unwrap();
        (store.list().await, store.settings().await)
    };

    let store = ConfigStore::open_dir(dir.path()).await.unwrap();
    let (profiles, settings) = (store.list().await, store.settings().await);
    assert_eq!(profiles, before.0);
    assert_eq!(settings, before.1);

    let ids: Vec<_> = profiles.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![office, fast, doh, tor]);

    let office_profile = store.get(office).await.unwrap();
    let mut expected = dnstt_ssh_profile();
    expected.id = office;
    expected.sort_order = office_profile.sort_order;
    expected.created_at = office_profile.created_at;
    expected.updated_at = office_profile.updated_at;
    expected.last_connected_at = office_profile.last_connected_at;
    assert_eq!(office_profile, expected);
    assert!(office_profile.has_connected());

    assert_eq!(store.get(fast).await.unwrap().tunnel, slipstream_profile().tunnel);
    assert_eq!(store.active_profile().await.map(|p| p.id), Some(fast));
    assert_eq!(settings.last_connected_profile_id, Some(office));
    assert_eq!(settings.dark_mode, DarkMode::Dark);
    assert_eq!(settings.buffer_size, BufferSize::Small);
    assert_eq!(settings.totals().connection_time_ms, 30);
}

#[tokio::test]
async fn test_enums_stored_as_tokens() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::open_dir(dir.path()).await.unwrap();
    store.create(dnstt_ssh_profile()).await.unwrap();
    store.set_dark_mode(DarkMode::Light).await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join(STATE_FILE)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

    let profile = &json["profiles"][0];
    assert_eq!(profile["tunnel_type"], "dnstt_ssh");
    assert_eq!(profile["dns_transport"], "dot");
    assert_eq!(profile["ssh_auth_type"], "password");
    assert_eq!(json["settings"]["dark_mode"], "light");
    assert_eq!(json["settings"]["buffer_size"], "medium");
}

#[tokio::test]
async fn test_unknown_tokens_load_as_defaults() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(STATE_FILE),
        r#"{
            "version": 1,
            "next_id": 8,
            "profiles": [
                { "id": 7, "name": "Future", "tunnel_type": "quantum", "dnstt_public_key": "ff" }
            ],
            "settings": { "dark_mode": "neon", "dns_timeout_ms": 200 }
        }"#,
    )
    .unwrap();

    let store = ConfigStore::open_dir(dir.path()).await.unwrap();
    let profile = store.get(ProfileId(7)).await.unwrap();
    assert_eq!(profile.tunnel_type(), TunnelType::Dnstt);

    let settings = store.settings().await;
    assert_eq!(settings.dark_mode, DarkMode::System);
    // Stored out-of-range values are not re-clamped on read
    assert_eq!(settings.dns_timeout_ms, 200);

    let next = store
        .create(ServerProfile::new("Next", TunnelConfig::default_for(TunnelType::Ssh)))
        .await
        .unwrap();
    assert_eq!(next, ProfileId(8));
}

#[tokio::test]
async fn test_ids_unique_across_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let first = {
        let store = ConfigStore::open_dir(dir.path()).await.unwrap();
        let a = store.create(slipstream_profile()).await.unwrap();
        let b = store.create(slipstream_profile()).await.unwrap();
        store.delete(b).await.unwrap();
        vec![a, b]
    };

    let store = ConfigStore::open_dir(dir.path()).await.unwrap();
    let c = store.create(slipstream_profile()).await.unwrap();
    assert!(!first.contains(&c));
}

#[tokio::test]
async fn test_concurrent_stats_updates() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ConfigStore::open_dir(dir.path()).await.unwrap());

    let tasks: Vec<_> = (0..20u64)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.update_total_stats(100, i, 1_000).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let totals = store.settings().await.totals();
    assert_eq!(totals.bytes_sent, 2_000);
    assert_eq!(totals.bytes_received, (0..20).sum::<u64>());
    assert_eq!(totals.connection_time_ms, 20_000);

    drop(store);
    let reopened = ConfigStore::open_dir(dir.path()).await.unwrap();
    assert_eq!(reopened.settings().await.totals(), totals);
}

#[tokio::test]
async fn test_concurrent_set_active_single_winner() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ConfigStore::open_dir(dir.path()).await.unwrap());

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(store.create(slipstream_profile()).await.unwrap());
    }

    let tasks: Vec<_> = ids
        .iter()
        .map(|&id| {
            let store = store.clone();
            tokio::spawn(async move { store.set_active(id).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let active: Vec<_> = store
        .list()
        .await
        .into_iter()
        .filter(|p| p.is_active)
        .map(|p| p.id)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(store.settings().await.active_profile_id, Some(active[0]));
}

#[tokio::test]
async fn test_delete_active_clears_pointer_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let a = {
        let store = ConfigStore::open_dir(dir.path()).await.unwrap();
        let a = store.create(slipstream_profile()).await.unwrap();
        store.set_active(a).await.unwrap();
        store.delete(a).await.unwrap();
        a
    };

    let store = ConfigStore::open_dir(dir.path()).await.unwrap();
    assert_eq!(store.settings().await.active_profile_id, None);
    assert!(matches!(store.get(a).await, Err(StoreError::NotFound(id)) if id == a));
}

#[tokio::test]
async fn test_reorder_persists() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::open_dir(dir.path()).await.unwrap();
    let one = store.create(slipstream_profile()).await.unwrap();
    let two = store.create(slipstream_profile()).await.unwrap();
    let three = store.create(slipstream_profile()).await.unwrap();

    store.reorder(&[three, one, two]).await.unwrap();
    drop(store);

    let store = ConfigStore::open_dir(dir.path()).await.unwrap();
    let ids: Vec<_> = store.list().await.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![three, one, two]);
}

#[tokio::test]
async fn test_clamped_values_persist() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::open_dir(dir.path()).await.unwrap();

    store.set_dns_timeout(500).await.unwrap();
    store.set_connection_timeout(90_000).await.unwrap();
    store.set_connection_pool_size(7).await.unwrap();
    drop(store);

    let settings = ConfigStore::open_dir(dir.path())
        .await
        .unwrap()
        .settings()
        .await;
    assert_eq!(settings.dns_timeout_ms, 1_000);
    assert_eq!(settings.connection_timeout_ms, 60_000);
    assert_eq!(settings.connection_pool_size, 7);
}

#[tokio::test]
async fn test_failed_save_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let store = ConfigStore::open_dir(&data_dir).await.unwrap();
    let id = store.create(slipstream_profile()).await.unwrap();

    // Swap the data directory for a regular file so the next save fails
    std::fs::remove_dir_all(&data_dir).unwrap();
    std::fs::write(&data_dir, b"not a directory").unwrap();

    let result = store.delete(id).await;
    assert!(matches!(result, Err(StoreError::Storage(StorageError::Io { .. }))));
    assert!(store.get(id).await.is_ok());

    let result = store.update_total_stats(1, 1, 1).await;
    assert!(result.is_err());
    assert_eq!(store.settings().await.totals().bytes_sent, 0);
}

#[tokio::test]
async fn test_watch_sees_current_then_changes() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::open_dir(dir.path()).await.unwrap();
    let mut profiles = store.observe_profiles();
    let mut active = store.observe_active_profile_id();

    assert_eq!(profiles.next().await, Some(Vec::new()));
    assert_eq!(active.next().await, Some(None));

    let id = store.create(slipstream_profile()).await.unwrap();
    store.set_active(id).await.unwrap();

    let latest = profiles.next().await.unwrap();
    assert_eq!(latest.len(), 1);
    assert!(latest[0].is_active);
    assert_eq!(active.next().await, Some(Some(id)));
}

#[tokio::test]
async fn test_store_on_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.json");
    let store = ConfigStore::open(JsonFileBackend::at(&path)).await.unwrap();

    store.set_auto_connect_on_boot(true).await.unwrap();
    assert!(path.exists());
    assert_eq!(store.backend().path(), path.as_path());
}
