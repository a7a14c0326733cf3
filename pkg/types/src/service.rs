use pkg_constants::network::{CLUSTER_IP_FIRST_HOST, CLUSTER_IP_POOL_SIZE, CLUSTER_IP_PREFIX};
use pkg_constants::state::SERVICES;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::meta::{ObjectMeta, Resource};
use crate::pod::Protocol;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    #[default]
    ClusterIP,
    NodePort,
    LoadBalancer,
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceType::ClusterIP => write!(f, "ClusterIP"),
            ServiceType::NodePort => write!(f, "NodePort"),
            ServiceType::LoadBalancer => write!(f, "LoadBalancer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub protocol: Protocol,
    pub port: u16,
    pub target_port: u16,
    #[serde(default)]
    pub node_port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(default)]
    pub service_type: ServiceType,
    /// Allocated by the store on create; never chosen by a controller.
    #[serde(default)]
    pub cluster_ip: Option<String>,
    pub ports: Vec<ServicePort>,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

/// Endpoint child: a stable address load-balancing onto selected pods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub metadata: ObjectMeta,
    pub spec: ServiceSpec,
}

impl Resource for Service {
    const KIND: &'static str = "Service";
    const PLURAL: &'static str = SERVICES;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn on_create(&mut self) {
        if self.spec.cluster_ip.is_none() {
            self.spec.cluster_ip = Some(allocate_cluster_ip());
        }
    }
}

/// Pick a cluster address from the service range.
fn allocate_cluster_ip() -> String {
    let host = (Uuid::new_v4().as_bytes()[0] % CLUSTER_IP_POOL_SIZE) + CLUSTER_IP_FIRST_HOST;
    format!("{}.{}", CLUSTER_IP_PREFIX, host)
}
