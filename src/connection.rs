use std::time::Duration;

use crate::config::Config;

/// Where the client connects and how it authenticates.
///
/// Emulators accept any bearer token, so `token` is a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub endpoint: String,
    pub token: String,
    pub timeout: Duration,
}

impl Connection {
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn mgmt_url(&self) -> String {
        format!("{}/v1/rest/mgmt", self.endpoint)
    }

    pub fn query_url(&self) -> String {
        format!("{}/v2/rest/query", self.endpoint)
    }
}
