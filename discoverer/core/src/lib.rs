#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod registry;
mod service;

pub use self::{
    registry::{Catalog, Instance, Registry, TagFilter},
    service::Service,
};
