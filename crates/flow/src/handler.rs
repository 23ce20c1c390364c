//! Result handlers: el codec que un resultado o un storage usa para
//! (de)serializar valores.
//!
//! Cuando no se inyecta ninguno se sustituye `NoopResultHandler` (JSON plano)
//! en el constructor; nunca se busca un handler global implícito.
use crate::errors::{FlowError, Result};
use crate::hashing::to_canonical_json;
use serde_json::Value as JsonValue;
use std::fmt::Debug;
use std::sync::Arc;

/// Codec de valores persistidos.
pub trait ResultHandler: Send + Sync + Debug {
    /// Discriminador estable, usado al serializar storages.
    fn kind(&self) -> &'static str;

    /// Convierte un valor en bytes listos para el backend.
    fn serialize(&self, value: &JsonValue) -> Result<Vec<u8>>;

    /// Reconstruye un valor a partir de los bytes del backend.
    fn deserialize(&self, bytes: &[u8]) -> Result<JsonValue>;
}

/// Referencia compartida a un handler.
pub type ResultHandlerRef = Arc<dyn ResultHandler>;

/// Handler por defecto: JSON sin transformar.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResultHandler;

impl NoopResultHandler {
    pub const KIND: &'static str = "noop";
}

impl ResultHandler for NoopResultHandler {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn serialize(&self, value: &JsonValue) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<JsonValue> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// JSON canónico: valores iguales producen siempre los mismos bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct CanonicalJsonHandler;

impl CanonicalJsonHandler {
    pub const KIND: &'static str = "canonical-json";
}

impl ResultHandler for CanonicalJsonHandler {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn serialize(&self, value: &JsonValue) -> Result<Vec<u8>> {
        Ok(to_canonical_json(value).into_bytes())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<JsonValue> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Handler sustituido cuando no se configura ninguno.
pub fn default_result_handler() -> ResultHandlerRef {
    Arc::new(NoopResultHandler)
}

/// Resuelve un kind (p.ej. el guardado en un `StorageRecord`) a su handler.
pub fn result_handler_from_kind(kind: &str) -> Result<ResultHandlerRef> {
    match kind {
        NoopResultHandler::KIND => Ok(Arc::new(NoopResultHandler)),
        CanonicalJsonHandler::KIND => Ok(Arc::new(CanonicalJsonHandler)),
        other => Err(FlowError::Config(format!("result handler desconocido: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_handler_is_order_independent() {
        let h = CanonicalJsonHandler;
        let a = h.serialize(&json!({"b": 1, "a": 2})).unwrap();
        let b = h.serialize(&json!({"a": 2, "b": 1})).unwrap();
        assert_eq!(a, b);
        assert_eq!(h.deserialize(&a).unwrap(), json!({"a": 2, "b": 1}));
    }

    #[test]
    fn noop_handler_rejects_garbage() {
        let err = NoopResultHandler.deserialize(b"{not json").unwrap_err();
        assert!(matches!(err, FlowError::Serialization(_)));
    }

    #[test]
    fn kinds_resolve_back_to_handlers() {
        assert_eq!(result_handler_from_kind("noop").unwrap().kind(), "noop");
        assert_eq!(result_handler_from_kind("canonical-json").unwrap().kind(), "canonical-json");
        assert!(matches!(result_handler_from_kind("pickle"), Err(FlowError::Config(_))));
    }
}
