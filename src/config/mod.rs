//! Configuration loading and management
//!
//! Per-service switches are read from YAML:
//!
//! ```yaml
//! services:
//!   - id: book
//!     disable_delete: true
//!   - id: author
//!     disable_soft_delete: true
//! ```
//!
//! A service without an entry gets [`ServiceConfig::default`], with every
//! operation enabled.

use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Operation switches of one service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service id the entry applies to
    pub id: String,

    #[serde(default)]
    pub disable_add: bool,

    #[serde(default)]
    pub disable_edit: bool,

    #[serde(default)]
    pub disable_delete: bool,

    #[serde(default)]
    pub disable_soft_delete: bool,
}

impl ServiceConfig {
    /// Everything enabled
    pub fn enabled(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Configuration for all services
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl ServicesConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => ConfigError::IoError {
                message: format!("{}: {}", path.display(), e),
            },
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            file: Some(path.display().to_string()),
            message: e.to_string(),
        })
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Merge several configurations
    ///
    /// A later entry for a service id replaces an earlier one; services keep
    /// the position of their first appearance.
    pub fn merge(configs: Vec<ServicesConfig>) -> ServicesConfig {
        let mut services: Vec<ServiceConfig> = Vec::new();
        for service in configs.into_iter().flat_map(|c| c.services) {
            match services.iter_mut().find(|existing| existing.id == service.id) {
                Some(existing) => *existing = service,
                None => services.push(service),
            }
        }
        ServicesConfig { services }
    }

    /// Switches for a service; defaults when the service is not listed
    pub fn service(&self, id: &str) -> ServiceConfig {
        self.services
            .iter()
            .find(|service| service.id == id)
            .cloned()
            .unwrap_or_else(|| ServiceConfig::enabled(id))
    }
}
