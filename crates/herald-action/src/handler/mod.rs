//! Action handler trait and plugin registry.
//!
//! Defines the `ActionHandler` async trait and the registry that resolves an
//! action name to its handler, either from explicit registrations or through
//! an injected `HandlerLoader`. Resolutions are cached for the lifetime of
//! the registry.

pub mod command;
pub mod event;
pub mod memory;
pub mod message;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::context::ExecutionContext;
use crate::error::{HandlerError, PluginError};
use crate::types::{ActionResult, ActionType};

/// Name of the operation a plugin module must export to be runnable.
pub const ENTRY_POINT: &str = "run";

/// Executable behaviour bound to an action name.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Payload schema the params must satisfy before `run` is called.
    ///
    /// Handlers returning `None` receive params unchecked.
    fn schema(&self) -> Option<ActionType> {
        None
    }

    async fn run(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ActionResult, HandlerError>;
}

/// The named operations a loader exposes for one plugin.
pub struct PluginModule {
    name: String,
    exports: HashMap<String, Arc<dyn ActionHandler>>,
}

impl PluginModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exports: HashMap::new(),
        }
    }

    /// A module exporting `handler` as its entry point.
    pub fn runnable(name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        Self::new(name).export(ENTRY_POINT, handler)
    }

    pub fn export(mut self, operation: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        self.exports.insert(operation.into(), handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_point(&self) -> Option<Arc<dyn ActionHandler>> {
        self.exports.get(ENTRY_POINT).cloned()
    }

    pub fn operations(&self) -> Vec<&str> {
        let mut ops: Vec<&str> = self.exports.keys().map(String::as_str).collect();
        ops.sort_unstable();
        ops
    }
}

/// Supplies plugin modules by name. Called at most once per distinct name.
pub trait HandlerLoader: Send + Sync {
    fn load(&self, name: &str) -> Option<PluginModule>;
}

/// Resolves action names to handlers, memoising every successful lookup.
pub struct PluginRegistry {
    loader: Option<Arc<dyn HandlerLoader>>,
    handlers: Mutex<HashMap<String, Arc<dyn ActionHandler>>>,
}

impl PluginRegistry {
    /// An empty registry with no loader: only registered handlers resolve.
    pub fn new() -> Self {
        Self {
            loader: None,
            handlers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_loader(loader: Arc<dyn HandlerLoader>) -> Self {
        Self {
            loader: Some(loader),
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// A registry backed by the built-in `message`, `event`, `command` and
    /// `memory` handlers.
    pub fn with_builtins() -> Self {
        Self::with_loader(Arc::new(BuiltinLoader))
    }

    /// Register a handler. Replaces any existing handler with the same name.
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        let name = name.into();
        tracing::info!(action = %name, "Registered handler");
        self.lock().insert(name, handler);
    }

    /// Resolve a name to its handler.
    ///
    /// The check-then-populate sequence runs under one lock, so concurrent
    /// first resolutions of a name invoke the loader once.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ActionHandler>, PluginError> {
        let mut handlers = self.lock();
        if let Some(handler) = handlers.get(name) {
            tracing::debug!(action = %name, "Handler cache hit");
            return Ok(Arc::clone(handler));
        }

        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| PluginError::Unknown(name.to_string()))?;

        tracing::info!(action = %name, "Loading handler");
        let module = loader
            .load(name)
            .ok_or_else(|| PluginError::Unknown(name.to_string()))?;

        let handler = module.entry_point().ok_or_else(|| PluginError::Invalid {
            name: name.to_string(),
            reason: format!(
                "module '{}' does not export '{}' (exports: [{}])",
                module.name(),
                ENTRY_POINT,
                module.operations().join(", ")
            ),
        })?;

        handlers.insert(name.to_string(), Arc::clone(&handler));
        Ok(handler)
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Names resolved or registered so far, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn ActionHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode typed params for handlers that declare a schema.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    params: &Map<String, Value>,
) -> Result<T, HandlerError> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| HandlerError::InvalidParams(e.to_string()))
}

/// Loader for the handlers shipped with this crate.
pub struct BuiltinLoader;

impl HandlerLoader for BuiltinLoader {
    fn load(&self, name: &str) -> Option<PluginModule> {
        let handler: Arc<dyn ActionHandler> = match name.parse::<ActionType>().ok()? {
            ActionType::Message => Arc::new(message::MessageHandler),
            ActionType::Event => Arc::new(event::EventHandler),
            ActionType::Command => Arc::new(command::CommandHandler),
            ActionType::Memory => Arc::new(memory::MemoryHandler),
        };
        Some(PluginModule::runnable(name, handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoHandler;

    #[async_trait]
    impl ActionHandler for EchoHandler {
        async fn run(
            &self,
            _ctx: &ExecutionContext,
            params: &Map<String, Value>,
        ) -> Result<ActionResult, HandlerError> {
            Ok(ActionResult::new(format!("echo {} params", params.len())))
        }
    }

    /// Loader that counts its invocations and can hand out broken modules.
    #[derive(Default)]
    struct CountingLoader {
        calls: AtomicUsize,
    }

    impl HandlerLoader for CountingLoader {
        fn load(&self, name: &str) -> Option<PluginModule> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match name {
                "echo" => Some(PluginModule::runnable("echo", Arc::new(EchoHandler))),
                "broken" => Some(PluginModule::new("broken").export("describe", Arc::new(EchoHandler))),
                _ => None,
            }
        }
    }

    #[test]
    fn test_registered_handler_resolves_without_loader() {
        let registry = PluginRegistry::new();
        registry.register("echo", Arc::new(EchoHandler));
        assert!(registry.resolve("echo").is_ok());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn test_unknown_without_loader() {
        let registry = PluginRegistry::new();
        let err = registry.resolve("nope").err().unwrap();
        assert_eq!(err, PluginError::Unknown("nope".to_string()));
    }

    #[test]
    fn test_resolution_is_memoised() {
        let loader = Arc::new(CountingLoader::default());
        let registry = PluginRegistry::with_loader(loader.clone());

        let first = registry.resolve("echo").unwrap();
        let second = registry.resolve("echo").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_cached("echo"));
    }

    #[test]
    fn test_unknown_from_loader_is_not_cached() {
        let loader = Arc::new(CountingLoader::default());
        let registry = PluginRegistry::with_loader(loader.clone());

        assert!(matches!(registry.resolve("ghost"), Err(PluginError::Unknown(_))));
        assert!(matches!(registry.resolve("ghost"), Err(PluginError::Unknown(_))));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_module_without_entry_point_is_invalid() {
        let registry = PluginRegistry::with_loader(Arc::new(CountingLoader::default()));
        match registry.resolve("broken").err().unwrap() {
            PluginError::Invalid { name, reason } => {
                assert_eq!(name, "broken");
                assert!(reason.contains("'run'"));
                assert!(reason.contains("describe"));
            }
            other => panic!("expected invalid plugin, got {:?}", other),
        }
        assert!(!registry.is_cached("broken"));
    }

    #[test]
    fn test_registration_shadows_loader() {
        let loader = Arc::new(CountingLoader::default());
        let registry = PluginRegistry::with_loader(loader.clone());
        registry.register("echo", Arc::new(EchoHandler));
        registry.resolve("echo").unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_concurrent_first_resolution_loads_once() {
        let loader = Arc::new(CountingLoader::default());
        let registry = Arc::new(PluginRegistry::with_loader(loader.clone()));
        std::thread::scope(|s| {
            for _ in 0..8 {
                let registry = Arc::clone(&registry);
                s.spawn(move || registry.resolve("echo").unwrap());
            }
        });
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_builtin_loader_supplies_typed_kinds() {
        let registry = PluginRegistry::with_builtins();
        for kind in ActionType::ALL {
            let handler = registry.resolve(kind.as_str()).unwrap();
            if kind == ActionType::Message {
                assert_eq!(handler.schema(), None);
            } else {
                assert_eq!(handler.schema(), Some(kind));
            }
        }
        assert!(matches!(registry.resolve("alarm"), Err(PluginError::Unknown(_))));
    }

    #[test]
    fn test_plugin_module_operations_sorted() {
        let module = PluginModule::runnable("echo", Arc::new(EchoHandler))
            .export("describe", Arc::new(EchoHandler));
        assert_eq!(module.operations(), vec!["describe", "run"]);
        assert_eq!(module.name(), "echo");
    }
}
