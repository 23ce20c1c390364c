//! Configuración del store desde variables de entorno (y `.env`).
//!
//! Variables:
//! - `FLOWSTORE_HOME` (por defecto `.flowstore`)
//! - `FLOWSTORE_FLOWS_DIR` (por defecto `$FLOWSTORE_HOME/flows`)
//! - `FLOWSTORE_RESULTS_DIR` (por defecto `$FLOWSTORE_HOME/results`)
//! - `FLOWSTORE_LABELS` separadas por comas
//! - `FLOWSTORE_RESULT_HANDLER` (por defecto `noop`)
//! - `FLOWSTORE_RUNNER_COMMAND` separado por espacios, opcional

use crate::local_result::LocalResult;
use crate::local_storage::{LocalStorage, MANIFEST_FILE};
use dotenvy::dotenv;
use flow::{result_handler_from_kind, FlowError, NoopResultHandler, RestoreStorage, Result, ResultHandlerRef};
use log::info;
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
  let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_HOME: &str = ".flowstore";

#[derive(Debug, Clone)]
pub struct StoreConfig {
  pub home: PathBuf,
  pub flows_dir: PathBuf,
  pub results_dir: PathBuf,
  pub labels: BTreeSet<String>,
  pub result_handler: String,
  pub runner_command: Option<Vec<String>>,
}

impl StoreConfig {
  pub fn from_env() -> Result<Self> {
    // asegura que .env se haya cargado
    Lazy::force(&DOTENV_LOADED);
    Self::from_lookup(|key| env::var(key).ok())
  }

  /// Igual que `from_env` pero leyendo de `lookup`.
  pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where F: Fn(&str) -> Option<String>
  {
    let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let home = PathBuf::from(var("FLOWSTORE_HOME").unwrap_or_else(|| DEFAULT_HOME.to_string()));
    let flows_dir = var("FLOWSTORE_FLOWS_DIR").map(PathBuf::from).unwrap_or_else(|| home.join("flows"));
    let results_dir = var("FLOWSTORE_RESULTS_DIR").map(PathBuf::from).unwrap_or_else(|| home.join("results"));
    let labels = var("FLOWSTORE_LABELS").map(|v| {
                                           v.split(',')
                                            .map(str::trim)
                                            .filter(|l| !l.is_empty())
                                            .map(String::from)
                                            .collect()
                                         })
                                         .unwrap_or_default();

    let result_handler = var("FLOWSTORE_RESULT_HANDLER").unwrap_or_else(|| NoopResultHandler::KIND.to_string());
    result_handler_from_kind(&result_handler).map_err(|e| FlowError::Config(format!("FLOWSTORE_RESULT_HANDLER: {e}")))?;

    let runner_command = match lookup("FLOWSTORE_RUNNER_COMMAND") {
      None => None,
      Some(raw) => {
        let parts: Vec<String> = raw.split_whitespace().map(String::from).collect();
        if parts.is_empty() {
          return Err(FlowError::Config("FLOWSTORE_RUNNER_COMMAND está vacío".into()));
        }
        Some(parts)
      }
    };

    Ok(Self { home,
              flows_dir,
              results_dir,
              labels,
              result_handler,
              runner_command })
  }

  pub fn handler(&self) -> Result<ResultHandlerRef> {
    result_handler_from_kind(&self.result_handler)
  }

  /// `LocalStorage` sobre `flows_dir` con labels, handler y runner.
  pub fn local_storage(&self) -> Result<LocalStorage> {
    let storage = LocalStorage::new(&self.flows_dir).with_labels(self.labels.iter().cloned())
                                                    .with_result_handler(self.handler()?);
    Ok(match &self.runner_command {
      Some(cmd) => storage.with_runner_command(cmd.iter().cloned()),
      None => storage,
    })
  }

  /// Restaura el `LocalStorage` del último build si `flows_dir` tiene
  /// manifest (queda `Built`); si no, devuelve uno vacío como
  /// `local_storage`. Para abrir un ciclo nuevo sobre un directorio ya
  /// construido se usa `local_storage` directamente.
  pub fn open_local_storage(&self) -> Result<LocalStorage> {
    if !self.flows_dir.join(MANIFEST_FILE).is_file() {
      return self.local_storage();
    }
    let manifest = LocalStorage::load_manifest(&self.flows_dir)?;
    info!("[config] restaurando build del {}", manifest.built_at);
    LocalStorage::from_record(&manifest.record)
  }

  /// `LocalResult` sobre `results_dir` con el handler configurado.
  pub fn local_result(&self) -> Result<LocalResult> {
    Ok(LocalResult::new(&self.results_dir).with_result_handler(self.handler()?))
  }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
  Lazy::force(&DOTENV_LOADED);
}
