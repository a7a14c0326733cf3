//! Pure derivation of the child resources of an AppService.

use pkg_constants::controller::{APP_LABEL, APPSERVICE_API_VERSION, APPSERVICE_KIND};
use pkg_types::appservice::AppService;
use pkg_types::deployment::{Deployment, DeploymentSpec};
use pkg_types::meta::{ObjectMeta, OwnerReference};
use pkg_types::pod::{ContainerPort, ContainerSpec, PodTemplateSpec};
use pkg_types::service::{Service, ServiceSpec, ServiceType};
use std::collections::BTreeMap;

/// `{app: <name>}`, used as label and selector on both children.
pub fn app_labels(app: &AppService) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), app.metadata.name.clone())])
}

pub fn owner_reference(app: &AppService) -> OwnerReference {
    OwnerReference {
        api_version: APPSERVICE_API_VERSION.to_string(),
        kind: APPSERVICE_KIND.to_string(),
        name: app.metadata.name.clone(),
        uid: app.metadata.uid.clone(),
        controller: true,
    }
}

/// Workload spec: one container named after the app, one port per service target port.
pub fn materialize_workload(app: &AppService) -> DeploymentSpec {
    let container = ContainerSpec {
        name: app.metadata.name.clone(),
        image: app.spec.image.clone(),
        ports: app
            .spec
            .ports
            .iter()
            .map(|p| ContainerPort {
                container_port: p.target_port,
                protocol: p.protocol,
            })
            .collect(),
        env: app.spec.env.clone(),
        resources: app.spec.resources.clone(),
    };

    DeploymentSpec {
        replicas: app.spec.size,
        selector: app_labels(app),
        template: PodTemplateSpec {
            labels: app_labels(app),
            containers: vec![container],
        },
    }
}

/// Endpoint spec. `assigned_cluster_ip` is whatever the live Service already
/// carries; it is copied forward untouched.
pub fn materialize_endpoint(app: &AppService, assigned_cluster_ip: Option<&str>) -> ServiceSpec {
    ServiceSpec {
        service_type: ServiceType::NodePort,
        cluster_ip: assigned_cluster_ip.map(str::to_string),
        ports: app.spec.ports.clone(),
        selector: app_labels(app),
    }
}

fn child_metadata(app: &AppService) -> ObjectMeta {
    let mut meta = ObjectMeta::new(&app.metadata.namespace, &app.metadata.name);
    meta.labels = app_labels(app);
    meta.owner_references = vec![owner_reference(app)];
    meta
}

/// A Deployment ready to be created for `app`.
pub fn new_workload(app: &AppService) -> Deployment {
    Deployment {
        metadata: child_metadata(app),
        spec: materialize_workload(app),
    }
}

/// A Service ready to be created for `app`; the store allocates its address.
pub fn new_endpoint(app: &AppService) -> Service {
    Service {
        metadata: child_metadata(app),
        spec: materialize_endpoint(app, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::appservice::AppServiceSpec;
    use pkg_types::pod::{EnvVar, Protocol, ResourceRequirements};
    use pkg_types::service::ServicePort;

    fn make_app() -> AppService {
        let mut app = AppService::new(
            "default",
            "web",
            AppServiceSpec {
                size: 3,
                image: "nginx:1.25".to_string(),
                resources: ResourceRequirements::default(),
                env: vec![EnvVar {
                    name: "MODE".to_string(),
                    value: "prod".to_string(),
                }],
                ports: vec![
                    ServicePort {
                        name: "http".to_string(),
                        protocol: Protocol::TCP,
                        port: 80,
                        target_port: 8080,
                        node_port: None,
                    },
                    ServicePort {
                        name: "dns".to_string(),
                        protocol: Protocol::UDP,
                        port: 53,
                        target_port: 5353,
                        node_port: Some(30053),
                    },
                ],
            },
        );
        app.metadata.uid = "uid-web".to_string();
        app
    }

    #[test]
    fn workload_mirrors_spec() {
        let app = make_app();
        let spec = materialize_workload(&app);

        assert_eq!(spec.replicas, 3);
        assert_eq!(spec.selector.get("app").map(String::as_str), Some("web"));
        assert_eq!(spec.template.labels, spec.selector);
        assert_eq!(spec.template.containers.len(), 1);

        let container = &spec.template.containers[0];
        assert_eq!(container.name, "web");
        assert_eq!(container.image, "nginx:1.25");
        assert_eq!(container.env, app.spec.env);
        assert_eq!(
            container.ports,
            vec![
                ContainerPort {
                    container_port: 8080,
                    protocol: Protocol::TCP,
                },
                ContainerPort {
                    container_port: 5353,
                    protocol: Protocol::UDP,
                },
            ]
        );
    }

    #[test]
    fn endpoint_copies_ports_and_retains_address() {
        let app = make_app();
        let spec = materialize_endpoint(&app, Some("10.43.0.17"));

        assert_eq!(spec.service_type, ServiceType::NodePort);
        assert_eq!(spec.cluster_ip.as_deref(), Some("10.43.0.17"));
        assert_eq!(spec.ports, app.spec.ports);
        assert_eq!(spec.selector, app_labels(&app));

        assert!(materialize_endpoint(&app, None).cluster_ip.is_none());
    }

    #[test]
    fn materialization_is_deterministic_and_pure() {
        let app = make_app();
        let before = app.clone();

        let a = serde_json::to_vec(&materialize_workload(&app)).unwrap();
        let b = serde_json::to_vec(&materialize_workload(&app)).unwrap();
        assert_eq!(a, b);

        let a = serde_json::to_vec(&materialize_endpoint(&app, Some("10.43.0.2"))).unwrap();
        let b = serde_json::to_vec(&materialize_endpoint(&app, Some("10.43.0.2"))).unwrap();
        assert_eq!(a, b);

        assert_eq!(app, before);
    }

    #[test]
    fn new_children_point_back_at_parent() {
        let app = make_app();
        let workload = new_workload(&app);
        let endpoint = new_endpoint(&app);

        for meta in [&workload.metadata, &endpoint.metadata] {
            assert_eq!(meta.name, "web");
            assert_eq!(meta.namespace, "default");
            assert_eq!(meta.labels, app_labels(&app));
            let owner = meta.controller_owner().unwrap();
            assert_eq!(owner.kind, "AppService");
            assert_eq!(owner.api_version, "app.ydzs.io/v1beta1");
            assert_eq!(owner.uid, "uid-web");
        }
        assert!(endpoint.spec.cluster_ip.is_none());
    }
}
