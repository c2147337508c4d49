#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use consul_discoverer_consul as consul;
pub use consul_discoverer_core as core;
pub use consul_discoverer_k8s_api as k8s;
pub use consul_discoverer_k8s_sync as sync;

mod args;
mod duration;

pub use self::{args::Args, duration::Period};
