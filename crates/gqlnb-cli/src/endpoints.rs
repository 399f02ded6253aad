//! Endpoints command: show what a notebook would run against.

use std::path::{Path, PathBuf};

use gqlnb_core::{EndpointRegistry, GraphqlConfigRegistry, NotebookDocument};

use crate::colors;

/// List the endpoints configured for a notebook or directory.
pub fn execute(path: &str, config: Option<PathBuf>) -> anyhow::Result<()> {
    let path = Path::new(path);
    // A directory stands in for a notebook inside it.
    let document = if path.is_dir() {
        NotebookDocument::new(path.join("_"), Vec::new())
    } else {
        NotebookDocument::new(path, Vec::new())
    };

    let registry = match config {
        Some(config) => GraphqlConfigRegistry::with_config_file(config),
        None => GraphqlConfigRegistry::new(),
    };
    let endpoints = registry.resolve_endpoints(&document)?;

    println!("{}Endpoints:{}", colors::BOLD, colors::RESET);
    for endpoint in &endpoints {
        let marker = if endpoint.is_default {
            format!(" {}(default){}", colors::GREEN, colors::RESET)
        } else {
            String::new()
        };
        println!(
            "  {}{}{}{} {}{}{}",
            colors::CYAN,
            endpoint.label(),
            colors::RESET,
            marker,
            colors::DIM,
            endpoint.url,
            colors::RESET
        );
        for name in endpoint.headers.keys() {
            println!("      {}header{} {}", colors::DIM, colors::RESET, name);
        }
    }

    Ok(())
}
