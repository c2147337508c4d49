#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod action;
pub mod diff;
pub mod executor;
pub mod metrics;
pub mod project;
mod reconcile;


pub use self::{
    action::{Action, DiscoveredEndpoints},
    executor::{Apply, Executor},
    metrics::{ExecutorMetrics, ReconcilerMetrics},
    reconcile::{Config, ObservedReadFailure, Reconciler},
};
