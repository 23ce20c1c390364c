// Archivo: errors.rs
// Propósito: definir los errores de la capa de persistencia (resultados y
// storages) y el alias Result<T> usado por las APIs del crate.
use thiserror::Error;

/// Errores comunes de los contratos `TaskResult` y `Storage`.
///
/// Ningún error se reintenta dentro de esta capa: se devuelven al caller y es
/// el motor quien decide reintentar, usar un fallback o abortar.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Escritura sobre una variante de resultado que no admite escritura
    /// (por ejemplo `ConstantResult`). Nunca debe reintentarse.
    #[error("Resultado inmutable: {0}")]
    Immutable(String),
    /// No se pudo leer o decodificar el valor en `location`.
    #[error("Error de lectura en '{location}': {reason}")]
    Retrieval { location: String, reason: String },
    /// Falló la serialización o la E/S del backend al persistir.
    #[error("Error de persistencia: {0}")]
    Persistence(String),
    /// Ya existe un flow registrado con la misma identidad (nombre).
    #[error("Flow duplicado: {0}")]
    DuplicateFlow(String),
    /// El storage ya fue construido (`build`) y no acepta más registros.
    #[error("Storage congelado: {0}")]
    StorageFrozen(String),
    /// Capacidad opcional no soportada por el backend.
    #[error("Operación '{operation}' no soportada por {backend}")]
    Unsupported { backend: String, operation: &'static str },
    /// Falló el empaquetado de un storage.
    #[error("Error de build: {0}")]
    Build(String),
    /// Location mal formada (no confundir con una location ausente).
    #[error("Location inválida: {0}")]
    InvalidLocation(String),
    /// Location de flow desconocida para este storage.
    #[error("No encontrado: {0}")]
    NotFound(String),
    /// Error al (de)serializar registros o payloads.
    #[error("Error de serialización: {0}")]
    Serialization(String),
    /// Configuración inválida o incompleta.
    #[error("Error de configuración: {0}")]
    Config(String),
    /// No se pudo lanzar la ejecución de un flow.
    #[error("Error de ejecución: {0}")]
    Execution(String),
}

impl FlowError {
    /// Atajo para construir `FlowError::Retrieval`.
    pub fn retrieval(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::Retrieval { location: location.into(),
                          reason: reason.to_string() }
    }

    /// Atajo para construir `FlowError::Unsupported`.
    pub fn unsupported(backend: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported { backend: backend.into(),
                            operation }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, FlowError>;
