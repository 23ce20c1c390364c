//! `LocalResult`: resultados persistidos como ficheros bajo un directorio.
//!
//! Location por defecto: `<blake3 de los bytes>.json`, relativa al
//! directorio. Con una plantilla se admiten los marcadores `{hash}`, `{date}`
//! (UTC, `YYYY-MM-DD`) y `{uuid}`. Las locations absolutas se usan tal cual.
//!
//! Concurrencia: la escritura va a un fichero temporal hermano que luego se
//! renombra, así que un lector nunca ve un fichero a medias y entre dos
//! escritores de la misma location gana el último. Con la location por
//! defecto ambos escriben los mismos bytes.
use chrono::Utc;
use flow::hashing::hash_bytes;
use flow::{default_result_handler, FlowError, Result, ResultHandlerRef, TaskResult};
use log::debug;
use serde_json::Value as JsonValue;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct LocalResult {
  dir: PathBuf,
  location_template: Option<String>,
  value: Option<JsonValue>,
  location: Option<String>,
  handler: ResultHandlerRef,
}

impl LocalResult {
  /// Crea un resultado bajo `dir`. El directorio se crea al escribir.
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into(),
           location_template: None,
           value: None,
           location: None,
           handler: default_result_handler() }
  }

  pub fn with_location_template(mut self, template: impl Into<String>) -> Self {
    self.location_template = Some(template.into());
    self
  }

  pub fn with_result_handler(mut self, handler: ResultHandlerRef) -> Self {
    self.handler = handler;
    self
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Valida `location` y la resuelve contra el directorio.
  pub fn resolve_path(&self, location: &str) -> Result<PathBuf> {
    if location.is_empty() {
      return Err(FlowError::InvalidLocation("location vacía".into()));
    }
    if location.contains('\0') {
      return Err(FlowError::InvalidLocation(format!("carácter NUL en {location:?}")));
    }
    let path = Path::new(location);
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
      return Err(FlowError::InvalidLocation(format!("'..' no permitido: {location}")));
    }
    if path.is_absolute() {
      Ok(path.to_path_buf())
    } else {
      Ok(self.dir.join(path))
    }
  }

  fn render_location(&self, hash: &str) -> String {
    match &self.location_template {
      None => format!("{hash}.json"),
      Some(t) => t.replace("{hash}", hash)
                  .replace("{date}", &Utc::now().format("%Y-%m-%d").to_string())
                  .replace("{uuid}", &Uuid::new_v4().to_string()),
    }
  }
}

/// Escribe `bytes` en `path` mediante fichero temporal + rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
  let tmp = path.with_file_name(format!(".{file_name}.tmp-{}", Uuid::new_v4()));
  fs::write(&tmp, bytes)?;
  if let Err(e) = fs::rename(&tmp, path) {
    let _ = fs::remove_file(&tmp);
    return Err(e);
  }
  Ok(())
}

impl TaskResult for LocalResult {
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
    let path = self.resolve_path(location).map_err(|e| FlowError::retrieval(location, e))?;
    let bytes = fs::read(&path).map_err(|e| match e.kind() {
                                 ErrorKind::NotFound => FlowError::retrieval(location, "no existe"),
                                 _ => FlowError::retrieval(location, e),
                               })?;
    let value = self.handler
                    .deserialize(&bytes)
                    .map_err(|e| FlowError::retrieval(location, e))?;
    debug!("[local] read {}", path.display());
    Ok(Self { value: Some(value),
              location: Some(location.to_string()),
              ..self.clone() })
  }

  fn write(&self, value: &JsonValue) -> Result<Self> {
    let bytes = self.handler
                    .serialize(value)
                    .map_err(|e| FlowError::Persistence(e.to_string()))?;
    let location = self.render_location(&hash_bytes(&bytes));
    let path = self.resolve_path(&location)
                   .map_err(|e| FlowError::Persistence(e.to_string()))?;
    write_atomic(&path, &bytes).map_err(|e| FlowError::Persistence(format!("{}: {e}", path.display())))?;
    debug!("[local] write {}", path.display());
    Ok(Self { value: Some(value.clone()),
              location: Some(location),
              ..self.clone() })
  }

  fn exists(&self, location: &str) -> Result<bool> {
    Ok(self.resolve_path(location)?.is_file())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn default_location_is_content_hash() {
    let tmp = tempfile::tempdir().unwrap();
    let r = LocalResult::new(tmp.path());
    let a = r.write(&json!({"a": 1})).unwrap();
    let b = r.write(&json!({"a": 1})).unwrap();
    assert_eq!(a.location(), b.location());
    assert!(a.location().unwrap().ends_with(".json"));
    assert!(tmp.path().join(a.location().unwrap()).is_file());
  }

  #[test]
  fn template_placeholders_are_rendered() {
    let tmp = tempfile::tempdir().unwrap();
    let r = LocalResult::new(tmp.path()).with_location_template("runs/{date}/{hash}.out");
    let w = r.write(&json!([1])).unwrap();
    let loc = w.location().unwrap();
    assert!(loc.starts_with("runs/"));
    assert!(!loc.contains('{'));
    assert_eq!(r.read(loc).unwrap().value(), Some(&json!([1])));
  }

  #[test]
  fn malformed_locations_are_rejected() {
    let r = LocalResult::new("/tmp/unused");
    assert!(matches!(r.exists(""), Err(FlowError::InvalidLocation(_))));
    assert!(matches!(r.exists("../escape.json"), Err(FlowError::InvalidLocation(_))));
    assert!(matches!(r.exists("a\0b"), Err(FlowError::InvalidLocation(_))));
  }

  #[test]
  fn bad_template_fails_as_persistence_error() {
    let tmp = tempfile::tempdir().unwrap();
    let r = LocalResult::new(tmp.path()).with_location_template("../{hash}");
    assert!(matches!(r.write(&json!(1)), Err(FlowError::Persistence(_))));
  }
}
