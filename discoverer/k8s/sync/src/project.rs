//! Projects discovered services into the Service and Endpoints resources that
//! should exist in the target cluster.
//!
//! Each input service yields exactly one Service and one Endpoints, both with
//! the same namespace and name. Services that map to the same name are not
//! merged.

use crate::action::DiscoveredEndpoints;
use consul_discoverer_core::Service;
use consul_discoverer_k8s_api::{self as k8s, labels, BackendName};

pub fn services(
    backend: &BackendName,
    namespace: &str,
    services: &[Service],
) -> Vec<k8s::Service> {
    services
        .iter()
        .map(|svc| k8s::Service {
            metadata: metadata(backend, namespace, svc),
            spec: Some(k8s::ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                cluster_ip: Some("None".to_string()),
                ports: Some(vec![k8s::ServicePort {
                    name: Some(port_name(svc.port)),
                    port: svc.port.into(),
                    // The API server defaults the target port to the port. Set
                    // it here so that observed Services compare equal.
                    target_port: Some(k8s::IntOrString::Int(svc.port.into())),
                    protocol: Some(k8s::PROTOCOL_TCP.to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect()
}

pub fn endpoints(
    backend: &BackendName,
    namespace: &str,
    services: &[Service],
) -> Vec<DiscoveredEndpoints> {
    services
        .iter()
        .map(|svc| {
            // All nodes share the service's single port, so they form one
            // subset.
            let subsets = if svc.nodes.is_empty() {
                None
            } else {
                Some(vec![k8s::EndpointSubset {
                    addresses: Some(
                        svc.nodes
                            .iter()
                            .map(|node| k8s::EndpointAddress {
                                ip: node.clone(),
                                ..Default::default()
                            })
                            .collect(),
                    ),
                    ports: Some(vec![k8s::EndpointPort {
                        name: Some(port_name(svc.port)),
                        port: svc.port.into(),
                        protocol: Some(k8s::PROTOCOL_TCP.to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }])
            };

            DiscoveredEndpoints {
                endpoints: k8s::Endpoints {
                    metadata: metadata(backend, namespace, svc),
                    subsets,
                },
                upstream_name: svc.id(),
            }
        })
        .collect()
}

fn metadata(backend: &BackendName, namespace: &str, svc: &Service) -> k8s::ObjectMeta {
    k8s::ObjectMeta {
        namespace: Some(namespace.to_string()),
        name: Some(labels::discovered_name(backend, &svc.name)),
        labels: Some(labels::discovered_labels(backend, &svc.name)),
        ..Default::default()
    }
}

fn port_name(port: u16) -> String {
    format!("port-{port}")
}
