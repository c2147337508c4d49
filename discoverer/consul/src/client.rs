use crate::config::{Config, TlsConfig};
use consul_discoverer_core::{Catalog, Instance, Registry};
use reqwest::{Certificate, Identity, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use std::{collections::BTreeMap, path::Path};
use thiserror::Error;

const TOKEN_HEADER: &str = "X-Consul-Token";

/// A client for the catalog and health APIs of a Consul agent.
#[derive(Clone, Debug)]
pub struct Consul {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid consul address {0:?}")]
    InvalidAddr(String),

    #[error("failed to read {}: {source}", path.display())]
    Tls {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{url}: unexpected status {status}")]
    Status { url: Url, status: StatusCode },

    #[error("agent configuration does not include a datacenter")]
    MissingDatacenter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AgentSelf {
    config: Option<AgentConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AgentConfig {
    datacenter: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    #[serde(default)]
    node: Option<HealthNode>,
    service: HealthService,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthNode {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthService {
    #[serde(default)]
    address: String,
    #[serde(default)]
    port: u16,
}

// === impl Consul ===

impl Consul {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let base = format!("{}://{}/", config.scheme(), config.addr());
        let base = Url::parse(&base).map_err(|_| Error::InvalidAddr(base.clone()))?;
        if base.cannot_be_a_base() {
            return Err(Error::InvalidAddr(base.to_string()));
        }

        let mut http = reqwest::Client::builder();
        if config.is_tls() {
            http = tls(http, &config.tls)?;
        }

        Ok(Self {
            http: http.build()?,
            base,
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Returns the datacenter of the agent, failing if it is unreachable.
    pub async fn datacenter(&self) -> Result<String, Error> {
        let agent = self.get::<AgentSelf>(&["agent", "self"], &[]).await?;
        agent
            .config
            .and_then(|c| c.datacenter)
            .ok_or(Error::MissingDatacenter)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, Error> {
        let url = self.url(path, query);
        let mut req = self.http.get(url.clone());
        if let Some(token) = &self.token {
            req = req.header(TOKEN_HEADER, token);
        }

        let rsp = req.send().await?;
        let status = rsp.status();
        if !status.is_success() {
            return Err(Error::Status { url, status });
        }
        Ok(rsp.json().await?)
    }

    fn url(&self, path: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .expect("base URL must be a base")
            .pop_if_empty()
            .push("v1")
            .extend(path);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }
}

#[async_trait::async_trait]
impl Registry for Consul {
    async fn list_tagged_services(&self) -> anyhow::Result<Catalog> {
        let services = self
            .get::<BTreeMap<String, Option<Vec<String>>>>(&["catalog", "services"], &[])
            .await?;
        Ok(services
            .into_iter()
            .map(|(name, tags)| (name, tags.unwrap_or_default()))
            .collect())
    }

    async fn list_healthy_instances(&self, name: &str) -> anyhow::Result<Vec<Instance>> {
        let entries = self
            .get::<Vec<HealthEntry>>(&["health", "service", name], &[("passing", "true")])
            .await?;
        Ok(instances(entries))
    }
}

/// Services registered without an address are reachable at their node's
/// address.
fn instances(entries: Vec<HealthEntry>) -> Vec<Instance> {
    entries
        .into_iter()
        .map(|HealthEntry { node, service }| {
            let address = if service.address.is_empty() {
                node.map(|n| n.address).unwrap_or_default()
            } else {
                service.address
            };
            Instance {
                address,
                port: service.port,
            }
        })
        .collect()
}

fn tls(
    mut http: reqwest::ClientBuilder,
    config: &TlsConfig,
) -> Result<reqwest::ClientBuilder, Error> {
    for path in config.ca_file.iter() {
        http = http.add_root_certificate(Certificate::from_pem(&read(path)?)?);
    }

    if let Some(dir) = &config.ca_path {
        let entries = std::fs::read_dir(dir).map_err(|source| Error::Tls {
            path: dir.clone(),
            source,
        })?;
        for entry in entries {
            let path = entry
                .map_err(|source| Error::Tls {
                    path: dir.clone(),
                    source,
                })?
                .path();
            if path.is_file() {
                http = http.add_root_certificate(Certificate::from_pem(&read(&path)?)?);
            }
        }
    }

    if let (Some(cert), Some(key)) = (&config.cert_file, &config.key_file) {
        let mut pem = read(cert)?;
        pem.push(b'\n');
        pem.extend(read(key)?);
        http = http.identity(Identity::from_pem(&pem)?);
    }

    if config.insecure_skip_verify {
        tracing::warn!("Consul TLS certificate verification is disabled");
        http = http.danger_accept_invalid_certs(true);
    }

    Ok(http)
}

fn read(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|source| Error::Tls {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    fn client(addr: &str) -> Consul {
        Consul::new(&Config {
            addr: addr.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn builds_urls() {
        let consul = client("consul.local:8500");
        assert_eq!(
            consul.url(&["catalog", "services"], &[]).as_str(),
            "http://consul.local:8500/v1/catalog/services"
        );
        assert_eq!(
            consul
                .url(&["health", "service", "web"], &[("passing", "true")])
                .as_str(),
            "http://consul.local:8500/v1/health/service/web?passing=true"
        );
    }

    #[test]
    fn accepts_scheme_prefixed_addr() {
        let consul = client("http://consul.local:8500");
        assert_eq!(
            consul.url(&["agent", "self"], &[]).as_str(),
            "http://consul.local:8500/v1/agent/self"
        );
    }

    #[test]
    fn escapes_service_names() {
        let consul = client("127.0.0.1:8500");
        assert_eq!(
            consul.url(&["health", "service", "a/b c"], &[]).as_str(),
            "http://127.0.0.1:8500/v1/health/service/a%2Fb%20c"
        );
    }

    #[test]
    fn rejects_bad_addresses() {
        let err = Consul::new(&Config {
            addr: "not a host:port".to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidAddr(_)), "{err}");
    }

    #[test]
    fn empty_token_is_not_sent() {
        let consul = Consul::new(&Config {
            token: Some(String::new()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(consul.token, None);
    }

    #[test]
    fn decodes_health_entries() {
        let entries = serde_json::from_str::<Vec<HealthEntry>>(
            r#"[
                {"Node": {"Node": "n1", "Address": "10.0.0.10"},
                 "Service": {"ID": "web-1", "Service": "web", "Address": "10.0.0.1", "Port": 8080},
                 "Checks": []},
                {"Node": {"Node": "n2", "Address": "10.0.0.20"},
                 "Service": {"ID": "web-2", "Service": "web", "Address": "", "Port": 8080}},
                {"Node": {"Node": "n3", "Address": "10.0.0.30"},
                 "Service": {"ID": "web-3", "Service": "web", "Address": "10.0.0.1", "Port": 0}}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            instances(entries),
            vec![
                Instance {
                    address: "10.0.0.1".to_string(),
                    port: 8080
                },
                Instance {
                    address: "10.0.0.20".to_string(),
                    port: 8080
                },
                Instance {
                    address: "10.0.0.1".to_string(),
                    port: 0
                },
            ]
        );
    }

    #[test]
    fn decodes_catalog() {
        let services = serde_json::from_str::<BTreeMap<String, Option<Vec<String>>>>(
            r#"{"consul": [], "web": ["gateway", "v1"], "db": null}"#,
        )
        .unwrap();
        assert_eq!(
            services,
            btreemap! {
                "consul".to_string() => Some(vec![]),
                "db".to_string() => None,
                "web".to_string() => Some(vec!["gateway".to_string(), "v1".to_string()]),
            }
        );
    }

    #[test]
    fn decodes_agent_self() {
        let agent = serde_json::from_str::<AgentSelf>(
            r#"{"Config": {"Datacenter": "dc1", "NodeName": "agent-0"}, "Member": {}}"#,
        )
        .unwrap();
        assert_eq!(
            agent.config.and_then(|c| c.datacenter).as_deref(),
            Some("dc1")
        );
    }
}
