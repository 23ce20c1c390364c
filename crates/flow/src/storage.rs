// Archivo: storage.rs
// Propósito: definir el contrato `Storage` (empaquetar, localizar y
// recuperar definiciones de flow), sus capacidades opcionales
// (`FlowResolver`, `EnvRunnerProvider`), el registro compartido de flows y el
// registro serializado (`StorageRecord`) que describe cómo reconstruir un
// storage.
use crate::domain::{ExitStatus, Flow, FlowLookup};
use crate::errors::{FlowError, Result};
use crate::handler::{default_result_handler, result_handler_from_kind, ResultHandlerRef};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Versión del formato de `StorageRecord`.
pub const STORAGE_RECORD_VERSION: &str = "1";

/// Estado de un storage. Las transiciones son monótonas:
/// `Empty -> Registering -> Built`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageState {
    #[default]
    Empty,
    Registering,
    Built,
}

/// Registro de flows compartido por las variantes de storage.
///
/// Política común:
/// - la identidad de un flow es su `name`: registrar dos veces el mismo
///   nombre falla con `DuplicateFlow`;
/// - tras `mark_built` no se aceptan registros (`StorageFrozen`);
/// - `evict` sólo se usa para deshacer entradas que no llegaron a
///   persistirse durante un build fallido.
#[derive(Debug, Clone, Default)]
pub struct FlowRegistry {
    flows: IndexMap<String, Flow>,
    names: HashMap<String, String>,
    state: StorageState,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstruye un registro ya construido (p.ej. desde un `StorageRecord`).
    pub fn restore_built<I>(flows: I) -> Result<Self>
        where I: IntoIterator<Item = (String, Flow)>
    {
        let mut registry = Self::new();
        for (location, flow) in flows {
            registry.register(location, flow)?;
        }
        registry.state = StorageState::Built;
        Ok(registry)
    }

    pub fn state(&self) -> StorageState {
        self.state
    }

    /// Comprueba, sin modificar nada, que `flow` se puede registrar.
    pub fn check_can_register(&self, flow: &Flow) -> Result<()> {
        if self.state == StorageState::Built {
            return Err(FlowError::StorageFrozen(format!("no se puede añadir '{}' después de build", flow.name)));
        }
        if self.names.contains_key(&flow.name) {
            return Err(FlowError::DuplicateFlow(flow.name.clone()));
        }
        Ok(())
    }

    /// Registra `flow` bajo `location` y devuelve la location.
    pub fn register(&mut self, location: String, flow: Flow) -> Result<String> {
        self.check_can_register(&flow)?;
        if self.flows.contains_key(&location) {
            return Err(FlowError::DuplicateFlow(format!("location ya registrada: {location}")));
        }
        self.names.insert(flow.name.clone(), location.clone());
        self.flows.insert(location.clone(), flow);
        self.state = StorageState::Registering;
        Ok(location)
    }

    pub fn contains(&self, lookup: FlowLookup<'_>) -> bool {
        match lookup {
            FlowLookup::Flow(f) => self.names
                                       .get(&f.name)
                                       .and_then(|loc| self.flows.get(loc))
                                       .is_some_and(|registered| registered.id == f.id),
            FlowLookup::Name(name) => self.names.contains_key(name),
            FlowLookup::Location(loc) => self.flows.contains_key(loc),
        }
    }

    pub fn get(&self, location: &str) -> Option<&Flow> {
        self.flows.get(location)
    }

    pub fn location_of(&self, name: &str) -> Option<&str> {
        self.names.get(name).map(|s| s.as_str())
    }

    /// Itera `(location, flow)` en orden de registro.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Flow)> {
        self.flows.iter()
    }

    /// Mapa nombre -> location, ordenado por nombre.
    pub fn name_index(&self) -> BTreeMap<String, String> {
        self.names.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn mark_built(&mut self) {
        self.state = StorageState::Built;
    }

    /// Elimina una entrada que no pudo persistirse.
    pub fn evict(&mut self, location: &str) -> Option<Flow> {
        let flow = self.flows.shift_remove(location)?;
        self.names.remove(&flow.name);
        Some(flow)
    }
}

/// Handle devuelto por `get_env_runner`: su única operación es `run`.
pub trait EnvRunner: Send + Sync {
    /// Ejecuta el flow con las variables de entorno dadas. Las claves
    /// desconocidas se pasan tal cual, nunca se rechazan.
    fn run(&self, env: &BTreeMap<String, String>) -> Result<ExitStatus>;
}

/// Capacidad opcional: resolver una location a su `Flow`.
pub trait FlowResolver {
    fn resolve_flow(&self, location: &str) -> Result<Flow>;
}

/// Capacidad opcional: obtener un runner para la location de un flow.
pub trait EnvRunnerProvider {
    fn env_runner(&self, location: &str) -> Result<Box<dyn EnvRunner>>;
}

/// Contrato de empaquetado y localización de flows.
///
/// Ciclo de vida: se construye con un handler por defecto (o explícito), se
/// muta con `add_flow` y se finaliza con `build`. El registro interno no está
/// pensado para mutación concurrente: el tooling de despliegue registra desde
/// un único hilo.
pub trait Storage: Send + Sync {
    /// Nombre del storage; por defecto el nombre del tipo.
    fn name(&self) -> String {
        let full = std::any::type_name_of_val(self);
        full.rsplit("::").next().unwrap_or(full).to_string()
    }

    /// Etiquetas de despliegue consumidas por el scheduling. Vacías por
    /// defecto.
    fn labels(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Handler por defecto para flows/tareas que no declaran el suyo.
    fn result_handler(&self) -> &ResultHandlerRef;

    fn state(&self) -> StorageState;

    /// Registra un flow y devuelve su location dentro de este storage.
    fn add_flow(&mut self, flow: Flow) -> Result<String>;

    /// Indica si `obj` está registrado y es resoluble en este storage.
    fn contains(&self, obj: FlowLookup<'_>) -> bool;

    /// Finaliza el empaquetado. Un build fallido no deja entradas "fantasma":
    /// lo que `contains` reporta debe poder recuperarse.
    fn build(&mut self) -> Result<&mut Self>
        where Self: Sized;

    /// Parámetros de constructor propios de la variante.
    fn parameters(&self) -> Result<JsonMap<String, JsonValue>>;

    /// Representación estructurada y agnóstica del backend.
    fn serialize(&self) -> Result<StorageRecord> {
        let mut parameters = self.parameters()?;
        parameters.insert("labels".into(), serde_json::to_value(self.labels())?);
        parameters.insert("result_handler".into(), JsonValue::from(self.result_handler().kind()));
        Ok(StorageRecord::new(self.name(), parameters))
    }

    /// Capacidad `FlowResolver`, si la variante la soporta.
    fn flow_resolver(&self) -> Option<&dyn FlowResolver> {
        None
    }

    /// Capacidad `EnvRunnerProvider`, si la variante la soporta.
    fn env_runner_provider(&self) -> Option<&dyn EnvRunnerProvider> {
        None
    }

    /// Resuelve una location a su flow; `Unsupported` si la variante no
    /// tiene la capacidad.
    fn get_flow(&self, location: &str) -> Result<Flow> {
        match self.flow_resolver() {
            Some(resolver) => resolver.resolve_flow(location),
            None => Err(FlowError::unsupported(self.name(), "get_flow")),
        }
    }

    /// Devuelve un runner para la location; `Unsupported` si la variante no
    /// tiene la capacidad.
    fn get_env_runner(&self, location: &str) -> Result<Box<dyn EnvRunner>> {
        match self.env_runner_provider() {
            Some(provider) => provider.env_runner(location),
            None => Err(FlowError::unsupported(self.name(), "get_env_runner")),
        }
    }

    /// Handler efectivo para `task` de `flow`: el de la tarea, si no el del
    /// flow, si no el del storage.
    fn handler_for(&self, flow: &Flow, task: Option<&str>) -> Result<ResultHandlerRef> {
        let task_kind = task.and_then(|t| flow.task(t)).and_then(|t| t.result_handler.as_deref());
        match task_kind.or(flow.result_handler.as_deref()) {
            Some(kind) => result_handler_from_kind(kind),
            None => Ok(self.result_handler().clone()),
        }
    }
}

/// Registro serializado de un storage: discriminador + parámetros de
/// constructor. Es la codificación duradera de "cómo recuperar este flow".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRecord {
    #[serde(rename = "__version__")]
    pub version: String,
    #[serde(rename = "type")]
    pub storage_type: String,
    #[serde(default)]
    pub parameters: JsonMap<String, JsonValue>,
}

impl StorageRecord {
    pub fn new(storage_type: impl Into<String>, parameters: JsonMap<String, JsonValue>) -> Self {
        Self { version: STORAGE_RECORD_VERSION.to_string(),
               storage_type: storage_type.into(),
               parameters }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let record: Self = serde_json::from_str(s)?;
        if record.version != STORAGE_RECORD_VERSION {
            return Err(FlowError::Serialization(format!("versión de StorageRecord no soportada: {}", record.version)));
        }
        Ok(record)
    }

    /// Falla si el discriminador no es `expected`.
    pub fn expect_type(&self, expected: &str) -> Result<()> {
        if self.storage_type != expected {
            return Err(FlowError::Serialization(format!("se esperaba un record de tipo {expected}, llegó {}",
                                                        self.storage_type)));
        }
        Ok(())
    }

    /// Lee un parámetro tipado; `None` si no está o es `null`.
    pub fn parameter<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.parameters.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone()).map(Some)
                                                       .map_err(|e| {
                                                           FlowError::Serialization(format!("parámetro '{key}': {e}"))
                                                       }),
        }
    }

    pub fn labels(&self) -> Result<BTreeSet<String>> {
        Ok(self.parameter("labels")?.unwrap_or_default())
    }

    /// Handler indicado en el record; el por defecto si no figura.
    pub fn result_handler(&self) -> Result<ResultHandlerRef> {
        match self.parameter::<String>("result_handler")? {
            Some(kind) => result_handler_from_kind(&kind),
            None => Ok(default_result_handler()),
        }
    }
}

/// Reconstrucción de una variante a partir de su `StorageRecord`.
pub trait RestoreStorage: Storage + Sized {
    fn from_record(record: &StorageRecord) -> Result<Self>;
}
