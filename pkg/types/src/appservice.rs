use pkg_constants::controller::APPSERVICE_KIND;
use pkg_constants::state::APPSERVICES;
use serde::{Deserialize, Serialize};

use crate::meta::{ObjectMeta, Resource};
use crate::pod::{EnvVar, ResourceRequirements};
use crate::service::ServicePort;

// --- AppService spec ---

/// What the user asked for. `size` and `image` are required when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppServiceSpec {
    /// Desired replica count
    pub size: u32,
    pub image: String,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

// --- AppService ---

/// Desired-state object reconciled into a Deployment and a Service of the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppService {
    pub metadata: ObjectMeta,
    pub spec: AppServiceSpec,
}

impl AppService {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: AppServiceSpec) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec,
        }
    }
}

impl Resource for AppService {
    const KIND: &'static str = APPSERVICE_KIND;
    const PLURAL: &'static str = APPSERVICES;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
