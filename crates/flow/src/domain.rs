// Archivo: domain.rs
// Propósito: tipos de dominio que cruzan los contratos de persistencia:
// la definición de flow (`Flow`), sus tareas, el estado de salida de una
// ejecución y las formas de consultar un storage (`FlowLookup`).
use crate::hashing::hash_value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

/// Configuración de una tarea dentro de un flow.
///
/// `result_handler` es el kind de un `ResultHandler` (ver
/// `handler::result_handler_from_kind`). Si es `None` se usa el del flow o,
/// en su defecto, el del storage que lo contiene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    #[serde(default)]
    pub result_handler: Option<String>,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               result_handler: None }
    }

    pub fn with_result_handler(mut self, kind: impl Into<String>) -> Self {
        self.result_handler = Some(kind.into());
        self
    }
}

/// Definición de un workflow.
///
/// Para esta capa un `Flow` es opaco: sólo importa su identidad (`name`) y que
/// sea serializable para empaquetarlo. Los `with_*` devuelven un valor nuevo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    #[serde(default)]
    pub metadata: JsonValue,
    #[serde(default)]
    pub result_handler: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Flow {
    /// Crea un flow vacío con el nombre dado.
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(),
               name: name.into(),
               version: None,
               tasks: Vec::new(),
               metadata: json!({}),
               result_handler: None,
               created_at: Utc::now() }
    }

    pub fn with_version(&self, version: impl Into<String>) -> Self {
        let mut f = self.clone();
        f.version = Some(version.into());
        f
    }

    pub fn with_task(&self, task: TaskSpec) -> Self {
        let mut f = self.clone();
        f.tasks.push(task);
        f
    }

    pub fn with_metadata(&self, metadata: JsonValue) -> Self {
        let mut f = self.clone();
        f.metadata = metadata;
        f
    }

    pub fn with_result_handler(&self, kind: impl Into<String>) -> Self {
        let mut f = self.clone();
        f.result_handler = Some(kind.into());
        f
    }

    /// Busca una tarea por nombre.
    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Hash estable del contenido del flow (no incluye `id` ni `created_at`).
    pub fn fingerprint(&self) -> String {
        hash_value(&json!({
            "name": self.name,
            "version": self.version,
            "tasks": self.tasks,
            "metadata": self.metadata,
            "result_handler": self.result_handler,
        }))
    }

    /// Nombre apto para rutas de fichero: minúsculas, alfanuméricos y `-`.
    pub fn slug(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        for c in self.name.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
            } else if !out.ends_with('-') {
                out.push('-');
            }
        }
        let trimmed = out.trim_matches('-');
        if trimmed.is_empty() {
            "flow".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Estado de salida de una ejecución lanzada por un `EnvRunner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    /// Código de salida; `None` si el proceso terminó por una señal.
    pub code: Option<i32>,
}

impl ExitStatus {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Objeto consultado por `Storage::contains`.
#[derive(Debug, Clone, Copy)]
pub enum FlowLookup<'a> {
    /// Un flow concreto: debe estar registrado bajo su nombre con el mismo id.
    Flow(&'a Flow),
    /// Nombre del flow.
    Name(&'a str),
    /// Location devuelta por `add_flow`.
    Location(&'a str),
}

impl<'a> From<&'a Flow> for FlowLookup<'a> {
    fn from(flow: &'a Flow) -> Self {
        FlowLookup::Flow(flow)
    }
}
