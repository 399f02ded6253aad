//! Per-endpoint controllers.
//!
//! A controller binds an `ExecutionCoordinator` to one configured endpoint.
//! The registry hands out at most one controller per endpoint identity, no
//! matter how many documents resolve to it.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::config::ExecutionConfig;
use crate::dispatch::Dispatcher;
use crate::document::{Cell, NotebookDocument};
use crate::endpoints::{EndpointDescriptor, EndpointIdentity, EndpointRegistry};
use crate::error::{ConfigError, Result};
use crate::variables::Prompter;

use super::context::ExecutionCallback;
use super::coordinator::{CellExecution, ExecutionCoordinator};

/// Runs cells against a single endpoint.
pub struct Controller {
    identity: EndpointIdentity,
    endpoint: EndpointDescriptor,
    coordinator: ExecutionCoordinator,
}

impl Controller {
    pub fn identity(&self) -> &EndpointIdentity {
        &self.identity
    }

    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }

    /// `"<project> - <endpoint>"`.
    pub fn label(&self) -> String {
        self.endpoint.label()
    }

    /// Execute one cell as an independently cancellable unit.
    pub fn execute_cell(&self, cell_index: usize, cell: &Cell) -> CellExecution {
        tracing::debug!(controller = %self.label(), cell = cell_index, "executing cell");
        self.coordinator.execute(cell_index, cell, self.endpoint.clone())
    }

    /// Execute several cells of a document concurrently.
    ///
    /// Indices that are out of range or point at markup cells are skipped.
    pub fn execute_cells(&self, document: &NotebookDocument, indices: &[usize]) -> Vec<CellExecution> {
        indices
            .iter()
            .filter_map(|&index| {
                document
                    .cells
                    .get(index)
                    .filter(|cell| cell.is_executable())
                    .map(|cell| self.execute_cell(index, cell))
            })
            .collect()
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("identity", &self.identity)
            .field("url", &self.endpoint.url)
            .finish()
    }
}

/// The controllers available to one document.
#[derive(Debug, Clone)]
pub struct DocumentControllers {
    controllers: Vec<Arc<Controller>>,
    preferred: usize,
}

impl DocumentControllers {
    /// The default endpoint's controller, or the first one.
    pub fn preferred(&self) -> &Arc<Controller> {
        &self.controllers[self.preferred]
    }

    /// Controller for the endpoint with the given name.
    pub fn by_name(&self, name: &str) -> Result<&Arc<Controller>> {
        self.controllers
            .iter()
            .find(|c| c.endpoint.name == name)
            .ok_or_else(|| ConfigError::UnknownEndpoint(name.to_string()).into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Controller>> {
        self.controllers.iter()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

/// Shared map from endpoint identity to controller.
pub struct ControllerRegistry {
    controllers: Mutex<FxHashMap<EndpointIdentity, Arc<Controller>>>,
    dispatcher: Arc<dyn Dispatcher>,
    prompter: Arc<dyn Prompter>,
    config: ExecutionConfig,
    callback: Option<Arc<dyn ExecutionCallback>>,
}

impl ControllerRegistry {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, prompter: Arc<dyn Prompter>, config: ExecutionConfig) -> Self {
        Self {
            controllers: Mutex::new(FxHashMap::default()),
            dispatcher,
            prompter,
            config,
            callback: None,
        }
    }

    /// Set the execution callback for controllers created from now on.
    pub fn with_callback(mut self, callback: Arc<dyn ExecutionCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Resolve the document's endpoints and return a controller for each,
    /// creating only those not registered yet.
    ///
    /// Zero endpoints is a `ConfigError` ("no controller available").
    pub fn ensure_controllers(
        &self,
        document: &NotebookDocument,
        registry: &dyn EndpointRegistry,
    ) -> Result<DocumentControllers> {
        let endpoints = registry.resolve_endpoints(document)?;
        if endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints(document.path.clone()).into());
        }

        let preferred = endpoints.iter().position(|e| e.is_default).unwrap_or(0);
        let controllers = endpoints.into_iter().map(|e| self.register(e)).collect();

        Ok(DocumentControllers {
            controllers,
            preferred,
        })
    }

    /// Return the controller for `endpoint`, creating it if needed.
    ///
    /// Registering an identity that already exists returns the existing
    /// controller unchanged.
    pub fn register(&self, endpoint: EndpointDescriptor) -> Arc<Controller> {
        let identity = endpoint.identity();
        let mut controllers = self.controllers.lock().unwrap_or_else(|e| e.into_inner());

        controllers
            .entry(identity.clone())
            .or_insert_with(|| {
                tracing::info!(controller = %endpoint.label(), %identity, "creating controller");
                let mut coordinator =
                    ExecutionCoordinator::new(self.dispatcher.clone(), self.prompter.clone(), &self.config);
                if let Some(callback) = &self.callback {
                    coordinator = coordinator.with_callback(callback.clone());
                }
                Arc::new(Controller {
                    identity,
                    endpoint,
                    coordinator,
                })
            })
            .clone()
    }

    pub fn get(&self, identity: &EndpointIdentity) -> Option<Arc<Controller>> {
        self.controllers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(identity)
            .cloned()
    }

    /// Number of distinct controllers.
    pub fn len(&self) -> usize {
        self.controllers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchItem, DispatchRequest};
    use crate::endpoints::StaticRegistry;
    use crate::execute::CancelToken;
    use crate::variables::StaticPrompter;
    use futures::stream::{self, BoxStream, StreamExt};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    struct NullDispatcher;

    impl Dispatcher for NullDispatcher {
        fn dispatch(&self, _: DispatchRequest, _: CancelToken) -> BoxStream<'static, DispatchItem> {
            stream::empty().boxed()
        }
    }

    fn registry() -> ControllerRegistry {
        ControllerRegistry::new(
            Arc::new(NullDispatcher),
            Arc::new(StaticPrompter::default()),
            ExecutionConfig::default(),
        )
    }

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
    fn test_register_is_idempotent() {
        let registry = registry();
        let first = registry.register(endpoint("dev", false));
        let second = registry.register(endpoint("dev", false));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_identity_includes_config_dir() {
        let registry = registry();
        let mut other = endpoint("dev", false);
        other.config_dir = PathBuf::from("/elsewhere");

        registry.register(endpoint("dev", false));
        registry.register(other);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_ensure_controllers_prefers_default() {
        let registry = registry();
        let endpoints = StaticRegistry::new(vec![endpoint("dev", false), endpoint("default", true)]);
        let doc = NotebookDocument::new("/work/a.gqlnb", Vec::new());

        let controllers = registry.ensure_controllers(&doc, &endpoints).unwrap();
        assert_eq!(controllers.len(), 2);
        assert_eq!(controllers.preferred().label(), "app - default");
        assert_eq!(controllers.by_name("dev").unwrap().endpoint().name, "dev");

        // Opening a second document with the same config creates nothing new.
        let doc2 = NotebookDocument::new("/work/b.gqlnb", Vec::new());
        registry.ensure_controllers(&doc2, &endpoints).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_registration_creates_one_controller() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.register(endpoint("dev", false)))
            })
            .collect();
        let controllers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        assert!(controllers.iter().all(|c| Arc::ptr_eq(c, &controllers[0])));
    }

    #[test]
    fn test_no_endpoints_is_no_controller_available() {
        let registry = registry();
        let doc = NotebookDocument::new("/work/a.gqlnb", Vec::new());
        let err = registry
            .ensure_controllers(&doc, &StaticRegistry::default())
            .unwrap_err();
        assert!(err.to_string().contains("no controller available"));
        assert!(registry.is_empty());
    }
}
