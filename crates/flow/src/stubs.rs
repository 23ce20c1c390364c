// Archivo: stubs.rs
// Propósito: implementaciones en memoria para pruebas y wiring rápido.
//
// Incluye un resultado respaldado por un mapa compartido (`InMemoryResult`)
// y un storage en memoria (`InMemoryStorage`). No son durables: sirven para
// demos, tests y como doble de los backends reales.
use crate::domain::{ExitStatus, Flow, FlowLookup};
use crate::errors::{FlowError, Result};
use crate::handler::{default_result_handler, ResultHandlerRef};
use crate::hashing::hash_bytes;
use crate::result::TaskResult;
use crate::storage::{EnvRunner, EnvRunnerProvider, FlowRegistry, FlowResolver, RestoreStorage, Storage,
                     StorageRecord, StorageState};
use dashmap::DashMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Prefijo de las locations en memoria.
pub const MEMORY_SCHEME: &str = "memory://";

/// Resultado guardado en un `DashMap` compartido entre instancias.
///
/// La location es `memory://<blake3 de los bytes>`, así que dos escritores
/// concurrentes de la misma location escriben los mismos bytes (gana el
/// último, sin diferencia observable).
#[derive(Debug, Clone)]
pub struct InMemoryResult {
    store: Arc<DashMap<String, Vec<u8>>>,
    value: Option<JsonValue>,
    location: Option<String>,
    handler: ResultHandlerRef,
}

impl InMemoryResult {
    /// Crea un resultado con un almacén propio y vacío.
    pub fn new() -> Self {
        Self::with_store(Arc::new(DashMap::new()))
    }

    /// Crea un resultado que comparte `store` con otras instancias.
    pub fn with_store(store: Arc<DashMap<String, Vec<u8>>>) -> Self {
        Self { store,
               value: None,
               location: None,
               handler: default_result_handler() }
    }

    pub fn with_result_handler(mut self, handler: ResultHandlerRef) -> Self {
        self.handler = handler;
        self
    }

    /// Almacén subyacente (para compartirlo o inspeccionarlo en tests).
    pub fn store(&self) -> Arc<DashMap<String, Vec<u8>>> {
        self.store.clone()
    }

    fn check_location(location: &str) -> Result<()> {
        match location.strip_prefix(MEMORY_SCHEME) {
            Some(key) if !key.is_empty() => Ok(()),
            _ => Err(FlowError::InvalidLocation(format!("se esperaba {MEMORY_SCHEME}<key>: '{location}'"))),
        }
    }
}

impl Default for InMemoryResult {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskResult for InMemoryResult {
    fn value(&self) -> Option<&JsonValue> {
        self.value.as_ref()
    }

    fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    fn result_handler(&self) -> &ResultHandlerRef {
        &self.handler
    }

    fn read(&self, location: &str) -> Result<Self> {
        Self::check_location(location).map_err(|e| FlowError::retrieval(location, e))?;
        let bytes = self.store
                        .get(location)
                        .map(|entry| entry.value().clone())
                        .ok_or_else(|| FlowError::retrieval(location, "no existe"))?;
        let value = self.handler
                        .deserialize(&bytes)
                        .map_err(|e| FlowError::retrieval(location, e))?;
        debug!("[memory] read {}", location);
        Ok(Self { store: self.store.clone(),
                  value: Some(value),
                  location: Some(location.to_string()),
                  handler: self.handler.clone() })
    }

    fn write(&self, value: &JsonValue) -> Result<Self> {
        let bytes = self.handler
                        .serialize(value)
                        .map_err(|e| FlowError::Persistence(e.to_string()))?;
        let location = format!("{MEMORY_SCHEME}{}", hash_bytes(&bytes));
        self.store.insert(location.clone(), bytes);
        debug!("[memory] write {}", location);
        Ok(Self { store: self.store.clone(),
                  value: Some(value.clone()),
                  location: Some(location),
                  handler: self.handler.clone() })
    }

    fn exists(&self, location: &str) -> Result<bool> {
        Self::check_location(location)?;
        Ok(self.store.contains_key(location))
    }
}

/// Función que "ejecuta" un flow en memoria. Útil para simular executors en
/// tests.
pub type FlowExecutor = Arc<dyn Fn(&Flow, &BTreeMap<String, String>) -> Result<ExitStatus> + Send + Sync>;

/// Entrada serializada de un flow en memoria.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredFlow {
    location: String,
    flow: Flow,
}

/// Storage en memoria.
///
/// - location: `memory://flows/<name>`;
/// - soporta `FlowResolver`;
/// - soporta `EnvRunnerProvider` sólo si se adjunta un executor;
/// - `add_flow` tras `build` falla con `StorageFrozen`.
pub struct InMemoryStorage {
    registry: FlowRegistry,
    handler: ResultHandlerRef,
    labels: BTreeSet<String>,
    executor: Option<FlowExecutor>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self { registry: FlowRegistry::new(),
               handler: default_result_handler(),
               labels: BTreeSet::new(),
               executor: None }
    }

    pub fn with_result_handler(mut self, handler: ResultHandlerRef) -> Self {
        self.handler = handler;
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Adjunta un executor; habilita `get_env_runner`.
    pub fn with_executor(mut self, executor: FlowExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Flows registrados (location, flow) en orden de registro.
    pub fn flows(&self) -> impl Iterator<Item = (&String, &Flow)> {
        self.registry.iter()
    }

    fn location_for(flow: &Flow) -> String {
        format!("{MEMORY_SCHEME}flows/{}", flow.name)
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for InMemoryStorage {
    fn labels(&self) -> BTreeSet<String> {
        self.labels.clone()
    }

    fn result_handler(&self) -> &ResultHandlerRef {
        &self.handler
    }

    fn state(&self) -> StorageState {
        self.registry.state()
    }

    fn add_flow(&mut self, flow: Flow) -> Result<String> {
        let location = Self::location_for(&flow);
        let name = flow.name.clone();
        let location = self.registry.register(location, flow)?;
        info!("[memory] flow '{}' registrado en {}", name, location);
        Ok(location)
    }

    fn contains(&self, obj: FlowLookup<'_>) -> bool {
        self.registry.contains(obj)
    }

    fn build(&mut self) -> Result<&mut Self> {
        if self.registry.state() != StorageState::Built {
            self.registry.mark_built();
            info!("[memory] build con {} flows", self.registry.len());
        }
        Ok(self)
    }

    fn parameters(&self) -> Result<JsonMap<String, JsonValue>> {
        let flows: Vec<StoredFlow> = self.registry
                                         .iter()
                                         .map(|(location, flow)| StoredFlow { location: location.clone(),
                                                                              flow: flow.clone() })
                                         .collect();
        let mut params = JsonMap::new();
        params.insert("flows".into(), serde_json::to_value(flows)?);
        params.insert("state".into(), serde_json::to_value(self.registry.state())?);
        Ok(params)
    }

    fn flow_resolver(&self) -> Option<&dyn FlowResolver> {
        Some(self)
    }

    fn env_runner_provider(&self) -> Option<&dyn EnvRunnerProvider> {
        match self.executor {
            Some(_) => Some(self),
            None => None,
        }
    }
}

impl FlowResolver for InMemoryStorage {
    fn resolve_flow(&self, location: &str) -> Result<Flow> {
        self.registry
            .get(location)
            .cloned()
            .ok_or_else(|| FlowError::NotFound(format!("flow en {location}")))
    }
}

struct ExecutorRunner {
    flow: Flow,
    executor: FlowExecutor,
}

impl EnvRunner for ExecutorRunner {
    fn run(&self, env: &BTreeMap<String, String>) -> Result<ExitStatus> {
        (self.executor)(&self.flow, env)
    }
}

impl EnvRunnerProvider for InMemoryStorage {
    fn env_runner(&self, location: &str) -> Result<Box<dyn EnvRunner>> {
        let executor = self.executor
                           .clone()
                           .ok_or_else(|| FlowError::unsupported(self.name(), "get_env_runner"))?;
        let flow = self.resolve_flow(location)?;
        Ok(Box::new(ExecutorRunner { flow, executor }))
    }
}

impl RestoreStorage for InMemoryStorage {
    fn from_record(record: &StorageRecord) -> Result<Self> {
        record.expect_type("InMemoryStorage")?;
        let flows: Vec<StoredFlow> = record.parameter("flows")?.unwrap_or_default();
        let state: StorageState = record.parameter("state")?.unwrap_or_default();
        let entries = flows.into_iter().map(|s| (s.location, s.flow));
        let registry = if state == StorageState::Built {
            FlowRegistry::restore_built(entries)?
        } else {
            let mut registry = FlowRegistry::new();
            for (location, flow) in entries {
                registry.register(location, flow)?;
            }
            registry
        };
        Ok(Self { registry,
                  handler: record.result_handler()?,
                  labels: record.labels()?,
                  executor: None })
    }
}
