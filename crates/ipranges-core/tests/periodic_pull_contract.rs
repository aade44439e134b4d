//! Contract Test: Periodic Pull
//!
//! This test verifies the background refresh loop against a paused clock.
//!
//! Constraints verified:
//! - The first refresh happens one interval after start, then once per interval
//! - A failing cycle never ends the loop
//! - Shutdown, or dropping the handle, stops the loop promptly
//!
//! If this test fails, ip ranges may go stale or the loop may leak.

mod common;

use common::*;
use ipranges_core::{CloudProviderName, Error};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};

async fn running_manager(
    fetcher: Arc<ScriptedFetcher>,
) -> Arc<ipranges_core::IpRangeManager> {
    let (manager, _) = build_manager(all_enabled_config(), fetcher).await;
    Arc::new(manager)
}

#[tokio::test(start_paused = true)]
async fn zero_interval_is_rejected() {
    let mut config = all_enabled_config();
    config.pull_interval_secs = 0;
    let (manager, _) = build_manager(config, seeded_fetcher()).await;
    let manager = Arc::new(manager);

    let err = assert_err!(manager.start_periodic_pull());
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test(start_paused = true)]
async fn unrepresentable_interval_is_rejected() {
    let mut config = all_enabled_config();
    config.pull_interval_secs = u64::MAX;
    assert_ok!(config.validate());
    let fetcher = seeded_fetcher();
    let (manager, _) = build_manager(config, fetcher.clone()).await;
    let manager = Arc::new(manager);

    let err = assert_err!(manager.start_periodic_pull());
    assert!(matches!(err, Error::Config(_)), "{err}");

    sleep(Duration::from_secs(120)).await;
    assert_eq!(fetcher.provider_calls(CloudProviderName::Aws), 1);
    assert_eq!(Arc::strong_count(&manager), 1, "no loop was spawned");
}

#[tokio::test(start_paused = true)]
async fn refreshes_once_per_interval() {
    let fetcher = seeded_fetcher();
    let manager = running_manager(fetcher.clone()).await;
    assert_eq!(manager.pull_interval(), Duration::from_secs(60));

    let handle = assert_ok!(manager.start_periodic_pull());

    sleep(Duration::from_secs(59)).await;
    assert_eq!(fetcher.provider_calls(CloudProviderName::Aws), 1, "no refresh before the first interval");

    sleep(Duration::from_secs(2)).await;
    assert_eq!(fetcher.provider_calls(CloudProviderName::Aws), 2);

    sleep(Duration::from_secs(60)).await;
    for name in CloudProviderName::ALL {
        assert_eq!(fetcher.provider_calls(name), 3);
    }

    assert_ok!(handle.shutdown().await);
}

#[tokio::test(start_paused = true)]
async fn refresh_installs_new_version_in_background() {
    let fetcher = seeded_fetcher();
    let manager = running_manager(fetcher.clone()).await;
    let handle = assert_ok!(manager.start_periodic_pull());

    fetcher.set_provider(
        CloudProviderName::Gcp,
        Scripted::Document(fixture_document("2", &[("googlecloud", &["34.1.0.0/16"])])),
    );
    sleep(Duration::from_secs(61)).await;

    assert_eq!(
        manager.get_service_list(CloudProviderName::Gcp),
        vec!["googlecloud"]
    );
    assert_ok!(handle.shutdown().await);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_loop() {
    let fetcher = seeded_fetcher();
    let manager = running_manager(fetcher.clone()).await;
    let handle = assert_ok!(manager.start_periodic_pull());

    sleep(Duration::from_secs(61)).await;
    assert_ok!(handle.shutdown().await);
    let calls = fetcher.total_calls();

    sleep(Duration::from_secs(600)).await;
    assert_eq!(fetcher.total_calls(), calls, "no refresh after shutdown");
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_the_loop() {
    let fetcher = seeded_fetcher();
    let manager = running_manager(fetcher.clone()).await;

    let handle = assert_ok!(manager.start_periodic_pull());
    drop(handle);

    sleep(Duration::from_secs(600)).await;
    assert_eq!(fetcher.total_calls(), 3, "only the initial pulls happened");

    // The loop released its reference to the manager
    assert_eq!(Arc::strong_count(&manager), 1);
}

#[tokio::test(start_paused = true)]
async fn failing_cycle_does_not_end_the_loop() {
    let fetcher = seeded_fetcher();
    let manager = running_manager(fetcher.clone()).await;
    let handle = assert_ok!(manager.start_periodic_pull());

    fetcher.set_provider(CloudProviderName::Aws, Scripted::Fail("502 Bad Gateway".to_string()));
    sleep(Duration::from_secs(121)).await;

    assert!(!handle.is_finished());
    assert_eq!(fetcher.provider_calls(CloudProviderName::Aws), 3);
    let status = manager.provider_status(CloudProviderName::Aws).unwrap();
    assert_eq!(status.consecutive_failures, 2);
    assert_eq!(manager.get_service_list(CloudProviderName::Aws), vec!["S3", "EC2"]);

    fetcher.set_provider(CloudProviderName::Aws, Scripted::Document(aws_v1()));
    sleep(Duration::from_secs(60)).await;
    let status = manager.provider_status(CloudProviderName::Aws).unwrap();
    assert_eq!(status.consecutive_failures, 0);

    assert_ok!(handle.shutdown().await);
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_refresh_keeps_installed_snapshot() {
    let fetcher = seeded_fetcher();
    let manager = running_manager(fetcher.clone()).await;
    let handle = assert_ok!(manager.start_periodic_pull());

    fetcher.set_provider(
        CloudProviderName::Gcp,
        Scripted::Delayed(
            Duration::from_secs(20),
            fixture_document("2", &[("googlecloud", &["34.1.0.0/16"])]),
        ),
    );

    // The GCP fetch is still sleeping at this point
    sleep(Duration::from_secs(65)).await;
    assert_ok!(handle.shutdown().await);

    let snapshot = manager.snapshot(CloudProviderName::Gcp).unwrap();
    assert_eq!(snapshot.version(), "1");
    assert_eq!(snapshot.service_list(), ["Google"]);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(manager.snapshot(CloudProviderName::Gcp).unwrap().version(), "1");
}
