//! Reconciles one AppService into its Deployment and Service.
//!
//! A pass moves the parent through one of four phases:
//!
//! - **Absent**: the AppService is gone. Nothing to do; its children are
//!   reclaimed by owner-reference garbage collection.
//! - **Bootstrapping**: no snapshot is recorded or a child is missing. When
//!   neither child exists the snapshot is written to the parent *first*, then
//!   both are created. When one already exists it may carry an older spec, so
//!   the children are converged first and the snapshot advanced afterwards.
//! - **Settled**: the recorded snapshot equals the current spec. No writes.
//! - **Drifted**: the spec moved away from the snapshot (or the snapshot is
//!   unreadable). Both children are rewritten from the current spec, and only
//!   once both writes landed is the snapshot advanced.
//!
//! Every write goes through the store's compare-and-swap. A version conflict
//! aborts the pass before any further child is touched; the caller reruns it
//! from a fresh read.

use pkg_state::{ObjectStore, StoreError};
use pkg_types::appservice::AppService;
use pkg_types::deployment::Deployment;
use pkg_types::meta::{ObjectKey, Resource};
use pkg_types::service::Service;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ReconcileError;
use crate::materialize;
use crate::snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Absent,
    Bootstrapping,
    Settled,
    Drifted,
}

/// What happened to one child during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildAction {
    Created,
    Updated,
    Unchanged,
}

impl std::fmt::Display for ChildAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChildAction::Created => write!(f, "created"),
            ChildAction::Updated => write!(f, "updated"),
            ChildAction::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Outcome of a successful pass. Children are `None` when they were not examined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub phase: Phase,
    pub workload: Option<ChildAction>,
    pub endpoint: Option<ChildAction>,
    pub snapshot_written: bool,
}

impl ReconcileReport {
    fn idle(phase: Phase) -> Self {
        Self {
            phase,
            workload: None,
            endpoint: None,
            snapshot_written: false,
        }
    }
}

/// Decide the phase of a fetched AppService.
///
/// A missing child always means Bootstrapping, whatever the snapshot says: a
/// deleted child is recreated rather than reported.
pub fn classify(app: &AppService, children_present: bool) -> Phase {
    let Some(raw) = snapshot::recorded(app) else {
        return Phase::Bootstrapping;
    };
    // Without the children the snapshot describes nothing that exists.
    if !children_present {
        return Phase::Bootstrapping;
    }
    match snapshot::decode(raw) {
        Ok(applied) if applied == app.spec => Phase::Settled,
        Ok(_) => Phase::Drifted,
        Err(e) => {
            warn!("AppService {}: {}, forcing resync", app.key(), e);
            Phase::Drifted
        }
    }
}

pub struct AppServiceReconciler<S> {
    store: S,
}

impl<S: ObjectStore> AppServiceReconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Like [`reconcile`](Self::reconcile), but gives up as soon as `cancel`
    /// fires. Each store write is atomic, so an abandoned pass leaves state as
    /// of its last completed write.
    pub async fn reconcile_until(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport, ReconcileError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ReconcileError::Cancelled { key: key.clone() }),
            result = self.reconcile(key) => result,
        }
    }

    /// One level-triggered pass for the AppService at `key`.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileReport, ReconcileError> {
        let Some(app) = self
            .store
            .get::<AppService>(&key.namespace, &key.name)
            .await?
        else {
            debug!("AppService {} not found, nothing to reconcile", key);
            return Ok(ReconcileReport::idle(Phase::Absent));
        };

        let workload: Option<Deployment> = self.store.get(&key.namespace, &key.name).await?;
        let endpoint: Option<Service> = self.store.get(&key.namespace, &key.name).await?;

        let phase = classify(&app, workload.is_some() && endpoint.is_some());
        match (phase, workload, endpoint) {
            (Phase::Settled, _, _) => {
                debug!("AppService {}: in sync", key);
                Ok(ReconcileReport::idle(Phase::Settled))
            }
            (Phase::Drifted, Some(workload), Some(endpoint)) => {
                self.resync(app, workload, endpoint).await
            }
            (_, workload, endpoint) => self.bootstrap(app, workload, endpoint).await,
        }
    }

    async fn bootstrap(
        &self,
        mut app: AppService,
        workload: Option<Deployment>,
        endpoint: Option<Service>,
    ) -> Result<ReconcileReport, ReconcileError> {
        let key = app.key();
        info!("AppService {}: bootstrapping children", key);

        let encoded = snapshot::encode(&app.spec)?;
        let snapshot_written = snapshot::recorded(&app) != Some(encoded.as_str());
        let fresh = workload.is_none() && endpoint.is_none();

        // With nothing created yet the snapshot goes first. A present child may
        // be stale, so then the snapshot waits until the children converged.
        let pending = match (snapshot_written, fresh) {
            (true, true) => {
                snapshot::record(&mut app, encoded);
                app = self.store.update(&app).await?;
                None
            }
            (true, false) => Some(encoded),
            (false, _) => None,
        };

        let (workload, endpoint) = self.apply_children(&app, workload, endpoint).await?;

        if let Some(encoded) = pending {
            snapshot::record(&mut app, encoded);
            self.store.update(&app).await?;
        }
        info!(
            "AppService {}: Deployment {}, Service {}",
            key, workload, endpoint
        );
        Ok(ReconcileReport {
            phase: Phase::Bootstrapping,
            workload: Some(workload),
            endpoint: Some(endpoint),
            snapshot_written,
        })
    }

    async fn resync(
        &self,
        mut app: AppService,
        workload: Deployment,
        endpoint: Service,
    ) -> Result<ReconcileReport, ReconcileError> {
        let key = app.key();
        info!("AppService {}: spec drifted, resyncing children", key);

        let (workload, endpoint) = self
            .apply_children(&app, Some(workload), Some(endpoint))
            .await?;

        // Only now is the new spec fully applied.
        let encoded = snapshot::encode(&app.spec)?;
        snapshot::record(&mut app, encoded);
        self.store.update(&app).await?;

        info!(
            "AppService {}: Deployment {}, Service {}",
            key, workload, endpoint
        );
        Ok(ReconcileReport {
            phase: Phase::Drifted,
            workload: Some(workload),
            endpoint: Some(endpoint),
            snapshot_written: true,
        })
    }

    /// Bring both children in line with `app`. A failure on one child does not
    /// stop the other from being attempted, except for a version conflict,
    /// which aborts right away.
    async fn apply_children(
        &self,
        app: &AppService,
        workload: Option<Deployment>,
        endpoint: Option<Service>,
    ) -> Result<(ChildAction, ChildAction), ReconcileError> {
        let workload = match self.apply_workload(app, workload).await {
            Err(e) if e.is_conflict() => return Err(e.into()),
            other => other,
        };
        let endpoint = self.apply_endpoint(app, endpoint).await;

        match (workload, endpoint) {
            (Ok(w), Ok(e)) => Ok((w, e)),
            (w, e) => Err(ReconcileError::ChildWrites {
                key: app.key(),
                failures: [w.err(), e.err()].into_iter().flatten().collect(),
            }),
        }
    }

    async fn apply_workload(
        &self,
        app: &AppService,
        live: Option<Deployment>,
    ) -> Result<ChildAction, StoreError> {
        let live = match live {
            Some(live) => live,
            None => match self.create_child(materialize::new_workload(app)).await? {
                Some(action) => return Ok(action),
                None => self.fetch_existing::<Deployment>(app).await?,
            },
        };

        let desired = materialize::materialize_workload(app);
        if live.spec == desired {
            return Ok(ChildAction::Unchanged);
        }
        let mut updated = live;
        updated.spec = desired;
        self.store.update(&updated).await?;
        Ok(ChildAction::Updated)
    }

    async fn apply_endpoint(
        &self,
        app: &AppService,
        live: Option<Service>,
    ) -> Result<ChildAction, StoreError> {
        let live = match live {
            Some(live) => live,
            None => match self.create_child(materialize::new_endpoint(app)).await? {
                Some(action) => return Ok(action),
                None => self.fetch_existing::<Service>(app).await?,
            },
        };

        let desired = materialize::materialize_endpoint(app, live.spec.cluster_ip.as_deref());
        if live.spec == desired {
            return Ok(ChildAction::Unchanged);
        }
        let mut updated = live;
        updated.spec = desired;
        self.store.update(&updated).await?;
        Ok(ChildAction::Updated)
    }

    /// `Ok(None)` means someone else created the child first; the caller
    /// then converges the copy that won.
    async fn create_child<R: Resource>(&self, child: R) -> Result<Option<ChildAction>, StoreError> {
        match self.store.create(&child).await {
            Ok(_) => Ok(Some(ChildAction::Created)),
            Err(e) if e.is_already_exists() => {
                debug!("{} {} already exists", R::KIND, child.key());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_existing<R: Resource>(&self, app: &AppService) -> Result<R, StoreError> {
        let key = app.key();
        self.store
            .get::<R>(&key.namespace, &key.name)
            .await?
            .ok_or(StoreError::NotFound { kind: R::KIND, key })
    }
}
