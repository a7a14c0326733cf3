use pkg_constants::state::DEPLOYMENTS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::meta::{ObjectMeta, Resource};
use crate::pod::PodTemplateSpec;

// --- Deployment spec ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub replicas: u32,
    /// Label selector for matching pods
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
    pub template: PodTemplateSpec,
}

// --- Deployment ---

/// Workload child: a replicated group of identical pods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub metadata: ObjectMeta,
    pub spec: DeploymentSpec,
}

impl Resource for Deployment {
    const KIND: &'static str = "Deployment";
    const PLURAL: &'static str = DEPLOYMENTS;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
