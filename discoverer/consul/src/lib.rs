#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod client;
mod config;

pub use self::{
    client::{Consul, Error},
    config::{Config, ConfigError, TlsConfig},
};
