use pkg_constants::controller::{
    APPSERVICE_KIND, DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_SECS,
    DEFAULT_RECONCILE_TIMEOUT_SECS, DEFAULT_RESYNC_INTERVAL_SECS,
};
use pkg_constants::state::{APPSERVICES, DEPLOYMENTS, SERVICES};
use pkg_state::Registry;
use pkg_state::registry::parse_object_key;
use pkg_state::watch::WatchEvent;
use pkg_types::appservice::AppService;
use pkg_types::meta::{ObjectKey, ObjectMeta, Resource};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ReconcileError;
use crate::queue::{Backoff, WorkQueue};
use crate::reconciler::AppServiceReconciler;

/// Timing knobs of the controller loop.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub resync_interval: Duration,
    pub reconcile_timeout: Duration,
    pub backoff: Backoff,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECS),
            reconcile_timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            backoff: Backoff {
                base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
                max: Duration::from_secs(DEFAULT_BACKOFF_MAX_SECS),
            },
        }
    }
}

/// Controller that keeps every AppService's Deployment and Service in line.
/// Woken by store events and a periodic full resync; failed keys are retried
/// with backoff.
pub struct AppServiceController {
    registry: Registry,
    reconciler: AppServiceReconciler<Registry>,
    config: ControllerConfig,
    shutdown: CancellationToken,
}

impl AppServiceController {
    pub fn new(registry: Registry, config: ControllerConfig, shutdown: CancellationToken) -> Self {
        Self {
            reconciler: AppServiceReconciler::new(registry.clone()),
            registry,
            config,
            shutdown,
        }
    }

    /// Start the controller loop as a background task. It exits once the
    /// shutdown token is cancelled.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "AppServiceController started (resync={}s, timeout={}s)",
                self.config.resync_interval.as_secs(),
                self.config.reconcile_timeout.as_secs()
            );
            self.run().await;
            info!("AppServiceController stopped");
        })
    }

    async fn run(&self) {
        let mut events = self.registry.events().subscribe();
        let mut queue = WorkQueue::new(self.config.backoff);
        let mut resync = tokio::time::interval(self.config.resync_interval);

        loop {
            if let Some(key) = queue.pop(Instant::now()) {
                self.process(&mut queue, key).await;
                if self.shutdown.is_cancelled() {
                    break;
                }
                continue;
            }

            let wake = queue
                .next_retry()
                .unwrap_or_else(|| Instant::now() + self.config.resync_interval);

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = resync.tick() => self.enqueue_all(&mut queue).await,
                event = events.recv() => match event {
                    Ok(event) => {
                        if let Some(key) = owner_key(&event) {
                            queue.add(key);
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!("AppServiceController missed {} events, resyncing", missed);
                        self.enqueue_all(&mut queue).await;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    async fn process(&self, queue: &mut WorkQueue, key: ObjectKey) {
        let timeout = self.config.reconcile_timeout;
        let result = tokio::time::timeout(
            timeout,
            self.reconciler.reconcile_until(&key, &self.shutdown),
        )
        .await
        .unwrap_or_else(|_| {
            Err(ReconcileError::TimedOut {
                key: key.clone(),
                after: timeout,
            })
        });

        match result {
            Ok(report) => {
                debug!("AppService {}: {:?}", key, report);
                queue.forget(&key);
            }
            Err(e) => {
                let delay = queue.retry_later(key.clone(), Instant::now());
                if e.is_conflict() {
                    debug!("AppService {}: {}, retrying in {:?}", key, e, delay);
                } else {
                    warn!(
                        "AppService {}: reconcile failed, retrying in {:?}: {}",
                        key, delay, e
                    );
                }
            }
        }
    }

    async fn enqueue_all(&self, queue: &mut WorkQueue) {
        match self.registry.list::<AppService>(None).await {
            Ok(apps) => {
                for app in apps {
                    queue.add(app.key());
                }
            }
            Err(e) => warn!("AppServiceController resync list failed: {}", e),
        }
    }
}

#[derive(Deserialize)]
struct MetadataOnly {
    metadata: ObjectMeta,
}

/// The AppService a store event concerns, if any.
///
/// Child events map to their controlling owner. Deletions carry no value, so a
/// deleted child maps to the AppService of the same name.
fn owner_key(event: &WatchEvent) -> Option<ObjectKey> {
    let (plural, key) = parse_object_key(&event.key)?;
    match plural {
        APPSERVICES => Some(key),
        DEPLOYMENTS | SERVICES => match &event.value {
            None => Some(key),
            Some(value) => {
                let child: MetadataOnly = serde_json::from_slice(value).ok()?;
                child
                    .metadata
                    .controller_owner()
                    .filter(|owner| owner.kind == APPSERVICE_KIND)
                    .map(|owner| ObjectKey::new(key.namespace, owner.name.clone()))
            }
        },
        _ => None,
    }
}
