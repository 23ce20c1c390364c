// Archivo: engine.rs
// Propósito: helper del lado del motor para checkpointing de resultados.
//
// Nota: la decisión de *cuándo* persistir y *qué* backend usar pertenece al
// motor y a la configuración del usuario. Este helper sólo encadena
// `exists`/`read`/`write` de un `TaskResult` ya configurado y propaga los
// errores sin reintentar.
use crate::errors::Result;
use crate::result::TaskResult;
use log::debug;
use serde_json::Value as JsonValue;

/// Configuración del motor de checkpoints.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointEngineConfig {
    /// Si es `false`, los valores calculados no se escriben.
    pub checkpointing: bool,
}

impl Default for CheckpointEngineConfig {
    fn default() -> Self {
        Self { checkpointing: true }
    }
}

/// Resultado de `CheckpointEngine::run_cached`.
#[derive(Debug, Clone)]
pub enum Checkpoint<R> {
    /// El valor ya existía en la location y se leyó.
    Cached(R),
    /// El valor se calculó y se persistió.
    Computed(R),
    /// El valor se calculó pero el checkpointing está desactivado.
    Uncheckpointed(JsonValue),
}

impl<R: TaskResult> Checkpoint<R> {
    /// Valor representado, sea cual sea la rama.
    pub fn value(&self) -> Option<&JsonValue> {
        match self {
            Checkpoint::Cached(r) | Checkpoint::Computed(r) => r.value(),
            Checkpoint::Uncheckpointed(v) => Some(v),
        }
    }

    /// Location persistida, si la hay.
    pub fn location(&self) -> Option<&str> {
        match self {
            Checkpoint::Cached(r) | Checkpoint::Computed(r) => r.location(),
            Checkpoint::Uncheckpointed(_) => None,
        }
    }
}

/// Envuelve un `TaskResult` configurado (la "plantilla") y ofrece las
/// operaciones que el motor encadena al terminar o reanudar una tarea.
pub struct CheckpointEngine<R>
    where R: TaskResult
{
    template: R,
    config: CheckpointEngineConfig,
}

impl<R> CheckpointEngine<R> where R: TaskResult
{
    pub fn new(template: R, config: CheckpointEngineConfig) -> Self {
        Self { template, config }
    }

    pub fn template(&self) -> &R {
        &self.template
    }

    /// Persiste `value` con la plantilla. Delegación directa a `write`.
    pub fn persist(&self, value: &JsonValue) -> Result<R> {
        self.template.write(value)
    }

    /// Lee el valor en `location`. Delegación directa a `read`.
    pub fn resolve(&self, location: &str) -> Result<R> {
        self.template.read(location)
    }

    /// Devuelve el valor cacheado en `location` si existe; si no, lo calcula
    /// con `compute` y (si el checkpointing está activo) lo persiste.
    pub fn run_cached<F>(&self, location: Option<&str>, compute: F) -> Result<Checkpoint<R>>
        where F: FnOnce() -> Result<JsonValue>
    {
        if let Some(loc) = location {
            if self.template.exists(loc)? {
                debug!("checkpoint cacheado en {}", loc);
                return Ok(Checkpoint::Cached(self.template.read(loc)?));
            }
        }
        let value = compute()?;
        if !self.config.checkpointing {
            return Ok(Checkpoint::Uncheckpointed(value));
        }
        let written = self.template.write(&value)?;
        debug!("checkpoint escrito en {:?}", written.location());
        Ok(Checkpoint::Computed(written))
    }
}
