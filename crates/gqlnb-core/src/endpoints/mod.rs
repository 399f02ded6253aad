//! Endpoint resolution for documents.
//!
//! The coordinator only consumes `EndpointDescriptor`s; where they come from is
//! behind the `EndpointRegistry` trait. `GraphqlConfigRegistry` reads them from
//! a GraphQL project config file next to (or above) the document.

mod config;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::document::NotebookDocument;
use crate::error::Result;

pub use config::{CONFIG_FILE_NAMES, GraphqlConfigRegistry, find_config_file};

/// One configured endpoint.
///
/// Immutable for the duration of an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Endpoint name within its project.
    pub name: String,
    /// HTTP(S) address.
    pub url: String,
    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Owning project name.
    pub project: String,
    /// Directory holding the config file the endpoint came from.
    pub config_dir: PathBuf,
    /// Whether this is the project's default endpoint.
    pub is_default: bool,
}

impl EndpointDescriptor {
    /// Composite identity used to deduplicate controllers.
    pub fn identity(&self) -> EndpointIdentity {
        EndpointIdentity {
            config_dir: self.config_dir.clone(),
            project: self.project.clone(),
            endpoint: self.name.clone(),
        }
    }

    /// Display label, `"<project> - <endpoint>"`.
    pub fn label(&self) -> String {
        format!("{} - {}", self.project, self.name)
    }
}

/// `(config location, project, endpoint name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointIdentity {
    pub config_dir: PathBuf,
    pub project: String,
    pub endpoint: String,
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.config_dir.display(),
            self.project,
            self.endpoint
        )
    }
}

/// Source of the endpoints configured for a document.
///
/// Read once per document open. Implementations must not return an empty
/// list; zero endpoints is a `ConfigError`.
pub trait EndpointRegistry: Send + Sync {
    fn resolve_endpoints(&self, document: &NotebookDocument) -> Result<Vec<EndpointDescriptor>>;
}

/// Registry returning a fixed list, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    endpoints: Vec<EndpointDescriptor>,
}

impl StaticRegistry {
    pub fn new(endpoints: Vec<EndpointDescriptor>) -> Self {
        Self { endpoints }
    }

    /// A single default endpoint named `default` in project `default`.
    pub fn single(url: impl Into<String>) -> Self {
        Self::new(vec![EndpointDescriptor {
            name: "default".to_string(),
            url: url.into(),
            headers: BTreeMap::new(),
            project: "default".to_string(),
            config_dir: PathBuf::new(),
            is_default: true,
        }])
    }
}

impl EndpointRegistry for StaticRegistry {
    fn resolve_endpoints(&self, document: &NotebookDocument) -> Result<Vec<EndpointDescriptor>> {
        if self.endpoints.is_empty() {
            return Err(crate::error::ConfigError::NoEndpoints(document.path.clone()).into());
        }
        Ok(self.endpoints.clone())
    }
}

/// Pick the endpoint to run against: the named one, else the default, else
/// the first.
pub fn select_endpoint<'a>(
    endpoints: &'a [EndpointDescriptor],
    name: Option<&str>,
) -> Result<&'a EndpointDescriptor> {
    use crate::error::ConfigError;

    if let Some(name) = name {
        return endpoints
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| ConfigError::UnknownEndpoint(name.to_string()).into());
    }

    endpoints
        .iter()
        .find(|e| e.is_default)
        .or_else(|| endpoints.first())
        .ok_or_else(|| ConfigError::NoEndpoints(PathBuf::new()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, Error};

    fn endpoint(name: &str, is_default: bool) -> EndpointDescriptor {
        EndpointDescriptor {
            name: name.to_string(),
            url: format!("http://localhost/{}", name),
            headers: BTreeMap::new(),
            project: "app".to_string(),
            config_dir: PathBuf::from("/work"),
            is_default,
        }
    }

    #[test]
    fn test_label_and_identity() {
        let e = endpoint("prod", false);
        assert_eq!(e.label(), "app - prod");
        assert_eq!(e.identity().to_string(), "/work:app:prod");
        assert_eq!(e.identity(), endpoint("prod", true).identity());
    }

    #[test]
    fn test_select_prefers_default() {
        let endpoints = vec![endpoint("dev", false), endpoint("default", true)];
        assert_eq!(select_endpoint(&endpoints, None).unwrap().name, "default");
        assert_eq!(select_endpoint(&endpoints, Some("dev")).unwrap().name, "dev");
    }

    #[test]
    fn test_select_falls_back_to_first() {
        let endpoints = vec![endpoint("a", false), endpoint("b", false)];
        assert_eq!(select_endpoint(&endpoints, None).unwrap().name, "a");
    }

    #[test]
    fn test_select_unknown() {
        let endpoints = vec![endpoint("a", false)];
        let err = select_endpoint(&endpoints, Some("zzz")).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::UnknownEndpoint(_))));
    }

    #[test]
    fn test_static_registry_empty_is_config_error() {
        let doc = NotebookDocument::new("/tmp/x.gqlnb", Vec::new());
        let err = StaticRegistry::default().resolve_endpoints(&doc).unwrap_err();
        assert!(err.to_string().contains("no controller available"));
    }
}
