//! Operational HTTP server configuration.

use serde::{Deserialize, Serialize};

/// Operational HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address of the health endpoint.
    #[serde(default = "default_health_addr")]
    pub health_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            health_addr: default_health_addr(),
        }
    }
}

fn default_health_addr() -> String {
    "0.0.0.0:8080".to_string()
}
