//! GraphQL project config files (`.graphqlrc` and friends).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::{EndpointDescriptor, EndpointRegistry};
use crate::document::NotebookDocument;
use crate::error::{ConfigError, Result};

/// File names searched for, in priority order, in each directory.
pub const CONFIG_FILE_NAMES: &[&str] = &[".graphqlrc", ".graphqlrc.json", "graphql.config.json"];

const DEFAULT_PROJECT: &str = "default";
const DEFAULT_ENDPOINT: &str = "default";

/// Find the nearest config file walking up from `start`.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let start = if start.as_os_str().is_empty() {
        Path::new(".")
    } else {
        start
    };
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());

    start.ancestors().find_map(|dir| {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Registry reading endpoints from the GraphQL config nearest the document.
#[derive(Debug, Clone, Default)]
pub struct GraphqlConfigRegistry {
    /// Explicit config file; skips discovery when set.
    config_path: Option<PathBuf>,
}

impl GraphqlConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific config file instead of searching for one.
    pub fn with_config_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Parse endpoints from config text. `path` is used for errors and as the
    /// config location part of each endpoint's identity.
    pub fn parse(path: &Path, text: &str) -> Result<Vec<EndpointDescriptor>> {
        let invalid = |message: String| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        };

        let root: Value = serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;
        let Value::Object(root) = root else {
            return Err(invalid("top level must be an object".to_string()).into());
        };

        let (project_name, project) = select_project(&root).map_err(invalid)?;
        let config_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let endpoints = match project
            .get("extensions")
            .and_then(|ext| ext.get("endpoints"))
        {
            Some(Value::Object(map)) => parse_endpoints(map).map_err(invalid)?,
            Some(_) => return Err(invalid("`extensions.endpoints` must be an object".to_string()).into()),
            None => schema_endpoint(project).into_iter().collect(),
        };

        if endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints(path.to_path_buf()).into());
        }

        Ok(endpoints
            .into_iter()
            .map(|(name, url, headers)| EndpointDescriptor {
                is_default: name == DEFAULT_ENDPOINT,
                name,
                url,
                headers,
                project: project_name.clone(),
                config_dir: config_dir.clone(),
            })
            .collect())
    }
}

impl EndpointRegistry for GraphqlConfigRegistry {
    fn resolve_endpoints(&self, document: &NotebookDocument) -> Result<Vec<EndpointDescriptor>> {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => find_config_file(document.dir())
                .ok_or_else(|| ConfigError::NotFound(document.path.clone()))?,
        };

        tracing::debug!(config = %path.display(), "loading GraphQL config");

        let text = fs::read_to_string(&path).map_err(|e| ConfigError::Invalid {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let endpoints = Self::parse(&path, &text)?;
        tracing::info!(
            config = %path.display(),
            count = endpoints.len(),
            "resolved endpoints"
        );
        Ok(endpoints)
    }
}

type RawEndpoint = (String, String, BTreeMap<String, String>);

/// The project to use: `projects.default` if present, else the first project,
/// else the root object itself as project `default`.
fn select_project(root: &Map<String, Value>) -> std::result::Result<(String, &Map<String, Value>), String> {
    let Some(projects) = root.get("projects") else {
        return Ok((DEFAULT_PROJECT.to_string(), root));
    };
    let Value::Object(projects) = projects else {
        return Err("`projects` must be an object".to_string());
    };

    let (name, project) = projects
        .get_key_value(DEFAULT_PROJECT)
        .or_else(|| projects.iter().next())
        .ok_or_else(|| "`projects` is empty".to_string())?;

    match project {
        Value::Object(project) => Ok((name.clone(), project)),
        _ => Err(format!("project `{}` must be an object", name)),
    }
}

fn parse_endpoints(map: &Map<String, Value>) -> std::result::Result<Vec<RawEndpoint>, String> {
    map.iter()
        .map(|(name, value)| match value {
            Value::String(url) => Ok((name.clone(), url.clone(), BTreeMap::new())),
            Value::Object(obj) => {
                let url = obj
                    .get("url")
                    .and_then(Value::as_str)
                    .ok_or_else(|| format!("endpoint `{}` has no `url`", name))?;
                let headers = obj
                    .get("headers")
                    .and_then(Value::as_object)
                    .map(|h| {
                        h.iter()
                            .map(|(k, v)| {
                                let v = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                                (k.clone(), v)
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok((name.clone(), url.to_string(), headers))
            }
            _ => Err(format!("endpoint `{}` must be a URL or an object", name)),
        })
        .collect()
}

/// First http(s) `schema` entry as the `default` endpoint.
fn schema_endpoint(project: &Map<String, Value>) -> Option<RawEndpoint> {
    let schemas: Vec<&str> = match project.get("schema")? {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    schemas
        .into_iter()
        .find(|s| s.starts_with("http://") || s.starts_with("https://"))
        .map(|url| (DEFAULT_ENDPOINT.to_string(), url.to_string(), BTreeMap::new()))
}
