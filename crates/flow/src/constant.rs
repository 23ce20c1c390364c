//! `ConstantResult`: resultado cuyo "backend" es la propia instancia.
//!
//! Permite que valores literales o por defecto cumplan el mismo contrato que
//! los valores persistidos sin hacer E/S, rechazando explícitamente la
//! escritura.
use crate::errors::{FlowError, Result};
use crate::handler::{default_result_handler, ResultHandlerRef};
use crate::result::TaskResult;
use serde::Serialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone)]
pub struct ConstantResult {
    value: JsonValue,
    handler: ResultHandlerRef,
}

impl ConstantResult {
    pub fn new(value: JsonValue) -> Self {
        Self { value,
               handler: default_result_handler() }
    }

    /// Construye la constante a partir de cualquier valor `Serialize`.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    pub fn with_result_handler(mut self, handler: ResultHandlerRef) -> Self {
        self.handler = handler;
        self
    }
}

impl TaskResult for ConstantResult {
    fn value(&self) -> Option<&JsonValue> {
        Some(&self.value)
    }

    fn location(&self) -> Option<&str> {
        None
    }

    fn result_handler(&self) -> &ResultHandlerRef {
        &self.handler
    }

    /// Devuelve la propia constante; la location se ignora.
    fn read(&self, _location: &str) -> Result<Self> {
        Ok(self.clone())
    }

    /// Siempre falla: una constante no participa en el caching externo.
    fn write(&self, _value: &JsonValue) -> Result<Self> {
        Err(FlowError::Immutable("no se pueden escribir valores en ConstantResult".into()))
    }

    /// Una constante en memoria siempre existe.
    fn exists(&self, _location: &str) -> Result<bool> {
        Ok(true)
    }
}
