//! `LocalStorage`: flows empaquetados como ficheros JSON en un directorio.
//!
//! - `add_flow` escribe el fichero en el momento; si la escritura falla no se
//!   registra nada.
//! - `build` verifica que cada fichero registrado decodifica al flow
//!   registrado, expulsa los que no (devolviendo `FlowError::Build`) y escribe
//!   `manifest.json` con el `StorageRecord`.
//! - `add_flow` después de `build` falla con `StorageFrozen`.
//! - `get_env_runner` sólo está disponible si se configura un comando.
use crate::local_result::write_atomic;
use chrono::{DateTime, Utc};
use flow::{default_result_handler, EnvRunner, EnvRunnerProvider, ExitStatus, Flow, FlowError, FlowLookup,
           FlowRegistry, FlowResolver, RestoreStorage, Result, ResultHandlerRef, Storage, StorageRecord, StorageState};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Variable de entorno con la que el runner comunica la location del flow.
pub const FLOW_LOCATION_ENV: &str = "FLOWSTORE_FLOW_LOCATION";
/// Fichero escrito por `build` dentro del directorio.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Contenido de `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
  pub record: StorageRecord,
  pub built_at: DateTime<Utc>,
}

pub struct LocalStorage {
  directory: PathBuf,
  registry: FlowRegistry,
  handler: ResultHandlerRef,
  labels: BTreeSet<String>,
  runner_command: Option<Vec<String>>,
}

impl LocalStorage {
  /// Crea el storage sobre `directory`. Una ruta relativa se fija contra el
  /// directorio de trabajo actual para que el `StorageRecord` sea válido
  /// desde cualquier otro.
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    let directory = directory.into();
    Self { directory: std::path::absolute(&directory).unwrap_or(directory),
           registry: FlowRegistry::new(),
           handler: default_result_handler(),
           labels: BTreeSet::new(),
           runner_command: None }
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

  /// Comando (programa + argumentos) que ejecuta un flow. Habilita
  /// `get_env_runner`.
  pub fn with_runner_command<I, S>(mut self, command: I) -> Self
    where I: IntoIterator<Item = S>,
          S: Into<String>
  {
    let command: Vec<String> = command.into_iter().map(Into::into).collect();
    self.runner_command = if command.is_empty() { None } else { Some(command) };
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  /// Flows registrados (location, flow) en orden de registro.
  pub fn flows(&self) -> impl Iterator<Item = (&String, &Flow)> {
    self.registry.iter()
  }

  /// Lee el manifest escrito por un build previo en `directory`.
  pub fn load_manifest(directory: &Path) -> Result<Manifest> {
    let path = directory.join(MANIFEST_FILE);
    let bytes = fs::read(&path).map_err(|e| FlowError::retrieval(path.display().to_string(), e))?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  fn flow_path(&self, flow: &Flow) -> PathBuf {
    let fingerprint = flow.fingerprint();
    self.directory.join(format!("{}-{}.json", flow.slug(), &fingerprint[..12]))
  }

  fn read_flow_file(location: &str) -> Result<Flow> {
    let bytes = fs::read(location).map_err(|e| match e.kind() {
                                    ErrorKind::NotFound => FlowError::retrieval(location, "no existe"),
                                    _ => FlowError::retrieval(location, e),
                                  })?;
    serde_json::from_slice(&bytes).map_err(|e| FlowError::retrieval(location, e))
  }
}

impl Storage for LocalStorage {
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
    self.registry.check_can_register(&flow)?;
    let path = self.flow_path(&flow);
    let bytes = serde_json::to_vec_pretty(&flow).map_err(|e| FlowError::Persistence(e.to_string()))?;
    write_atomic(&path, &bytes).map_err(|e| FlowError::Persistence(format!("{}: {e}", path.display())))?;
    let location = path.to_string_lossy().into_owned();
    let name = flow.name.clone();
    let location = self.registry.register(location, flow)?;
    info!("[local] flow '{}' escrito en {}", name, location);
    Ok(location)
  }

  fn contains(&self, obj: FlowLookup<'_>) -> bool {
    self.registry.contains(obj)
  }

  fn build(&mut self) -> Result<&mut Self> {
    if self.registry.state() == StorageState::Built {
      return Ok(self);
    }
    let mut failed: Vec<(String, String)> = Vec::new();
    for (location, flow) in self.registry.iter() {
      match Self::read_flow_file(location) {
        Ok(stored) if stored == *flow => {}
        Ok(_) => failed.push((location.clone(), "el contenido no coincide".into())),
        Err(e) => failed.push((location.clone(), e.to_string())),
      }
    }
    if !failed.is_empty() {
      for (location, reason) in &failed {
        warn!("[local] expulsando {}: {}", location, reason);
        self.registry.evict(location);
      }
      let detail: Vec<String> = failed.iter().map(|(l, r)| format!("{l} ({r})")).collect();
      return Err(FlowError::Build(format!("{} flows no persistidos: {}", failed.len(), detail.join(", "))));
    }

    let manifest = Manifest { record: self.serialize()?,
                              built_at: Utc::now() };
    let bytes = serde_json::to_vec_pretty(&manifest).map_err(|e| FlowError::Build(e.to_string()))?;
    let path = self.directory.join(MANIFEST_FILE);
    write_atomic(&path, &bytes).map_err(|e| FlowError::Build(format!("{}: {e}", path.display())))?;
    self.registry.mark_built();
    info!("[local] build de {} flows en {}", self.registry.len(), self.directory.display());
    Ok(self)
  }

  fn parameters(&self) -> Result<JsonMap<String, JsonValue>> {
    let mut params = JsonMap::new();
    params.insert("directory".into(), JsonValue::from(self.directory.to_string_lossy().into_owned()));
    params.insert("flows".into(), serde_json::to_value(self.registry.name_index())?);
    params.insert("runner_command".into(), serde_json::to_value(&self.runner_command)?);
    Ok(params)
  }

  fn flow_resolver(&self) -> Option<&dyn FlowResolver> {
    Some(self)
  }

  fn env_runner_provider(&self) -> Option<&dyn EnvRunnerProvider> {
    match self.runner_command {
      Some(_) => Some(self),
      None => None,
    }
  }
}

impl FlowResolver for LocalStorage {
  fn resolve_flow(&self, location: &str) -> Result<Flow> {
    if !self.registry.contains(FlowLookup::Location(location)) {
      return Err(FlowError::NotFound(format!("flow en {location}")));
    }
    Self::read_flow_file(location)
  }
}

/// Runner que lanza el comando configurado con el entorno recibido.
pub struct CommandRunner {
  program: String,
  args: Vec<String>,
  location: String,
}

impl EnvRunner for CommandRunner {
  fn run(&self, env: &BTreeMap<String, String>) -> Result<ExitStatus> {
    info!("[local] ejecutando {} para {}", self.program, self.location);
    let status = Command::new(&self.program).args(&self.args)
                                            .envs(env)
                                            .env(FLOW_LOCATION_ENV, &self.location)
                                            .status()
                                            .map_err(|e| FlowError::Execution(format!("{}: {e}", self.program)))?;
    Ok(ExitStatus { code: status.code() })
  }
}

impl EnvRunnerProvider for LocalStorage {
  fn env_runner(&self, location: &str) -> Result<Box<dyn EnvRunner>> {
    let (program, args) = match self.runner_command.as_deref() {
      Some([program, args @ ..]) => (program.clone(), args.to_vec()),
      _ => return Err(FlowError::unsupported(self.name(), "get_env_runner")),
    };
    if !self.registry.contains(FlowLookup::Location(location)) {
      return Err(FlowError::NotFound(format!("flow en {location}")));
    }
    Ok(Box::new(CommandRunner { program,
                                args,
                                location: location.to_string() }))
  }
}

impl RestoreStorage for LocalStorage {
  /// Reconstruye el storage leyendo cada flow desde su fichero. El resultado
  /// queda en estado `Built`.
  fn from_record(record: &StorageRecord) -> Result<Self> {
    record.expect_type("LocalStorage")?;
    let directory: String = record.parameter("directory")?
                                  .ok_or_else(|| FlowError::Serialization("LocalStorage sin 'directory'".into()))?;
    let index: BTreeMap<String, String> = record.parameter("flows")?.unwrap_or_default();
    let mut entries = Vec::with_capacity(index.len());
    for (name, location) in index {
      let flow = Self::read_flow_file(&location)?;
      if flow.name != name {
        return Err(FlowError::Serialization(format!("{location} contiene '{}', se esperaba '{name}'", flow.name)));
      }
      entries.push((location, flow));
    }
    Ok(Self { directory: PathBuf::from(directory),
              registry: FlowRegistry::restore_built(entries)?,
              handler: record.result_handler()?,
              labels: record.labels()?,
              runner_command: record.parameter("runner_command")? })
  }
}
