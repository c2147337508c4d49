#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod backend;
mod cluster;
pub mod labels;

pub use self::{
    backend::{BackendName, InvalidBackendName},
    cluster::Cluster,
};
pub use k8s_openapi::{
    api::{
        self,
        core::v1::{
            EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Service, ServicePort,
            ServiceSpec,
        },
    },
    apimachinery::pkg::util::intstr::IntOrString,
};
pub use kube::{
    api::{Api, DeleteParams, ListParams, ObjectMeta, Patch, PatchParams, ResourceExt},
    Client, Error, Resource,
};

/// The only transport protocol projected services expose.
pub const PROTOCOL_TCP: &str = "TCP";
