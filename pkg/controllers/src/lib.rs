//! AppService controller: derives a Deployment and a Service from each
//! AppService and keeps them in line with its spec.

pub mod appservice;
pub mod error;
pub mod materialize;
pub mod queue;
pub mod reconciler;
pub mod snapshot;

#[cfg(test)]
mod testing;

pub use appservice::{AppServiceController, ControllerConfig};
pub use error::{ReconcileError, SnapshotError};
pub use reconciler::{AppServiceReconciler, ChildAction, Phase, ReconcileReport};
