//! `InlineResult`: la location *es* el valor serializado (base64url del
//! payload producido por el handler). No hace E/S, así que es útil para
//! valores pequeños que deben viajar junto a los metadatos de un run.
use crate::errors::{FlowError, Result};
use crate::handler::{default_result_handler, ResultHandlerRef};
use crate::result::TaskResult;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone)]
pub struct InlineResult {
    value: Option<JsonValue>,
    location: Option<String>,
    handler: ResultHandlerRef,
}

impl InlineResult {
    pub fn new() -> Self {
        Self { value: None,
               location: None,
               handler: default_result_handler() }
    }

    pub fn with_result_handler(mut self, handler: ResultHandlerRef) -> Self {
        self.handler = handler;
        self
    }

    fn decode_location(location: &str) -> Result<Vec<u8>> {
        if location.is_empty() {
            return Err(FlowError::InvalidLocation("location vacía".into()));
        }
        URL_SAFE_NO_PAD.decode(location)
                       .map_err(|e| FlowError::InvalidLocation(format!("{location}: {e}")))
    }
}

impl Default for InlineResult {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskResult for InlineResult {
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
        let bytes = Self::decode_location(location).map_err(|e| FlowError::retrieval(location, e))?;
        let value = self.handler
                        .deserialize(&bytes)
                        .map_err(|e| FlowError::retrieval(location, e))?;
        Ok(Self { value: Some(value),
                  location: Some(location.to_string()),
                  handler: self.handler.clone() })
    }

    fn write(&self, value: &JsonValue) -> Result<Self> {
        let bytes = self.handler
                        .serialize(value)
                        .map_err(|e| FlowError::Persistence(e.to_string()))?;
        Ok(Self { value: Some(value.clone()),
                  location: Some(URL_SAFE_NO_PAD.encode(bytes)),
                  handler: self.handler.clone() })
    }

    fn exists(&self, location: &str) -> Result<bool> {
        let bytes = Self::decode_location(location)?;
        Ok(self.handler.deserialize(&bytes).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_then_read_round_trips() {
        let r = InlineResult::new();
        let written = r.write(&json!({"rows": 42, "ok": true})).unwrap();
        let loc = written.location().unwrap().to_string();
        let read = r.read(&loc).unwrap();
        assert_eq!(read.value(), Some(&json!({"rows": 42, "ok": true})));
        assert_eq!(read.location(), Some(loc.as_str()));
        assert!(r.value().is_none());
    }

    #[test]
    fn exists_distinguishes_malformed_from_absent() {
        let r = InlineResult::new();
        assert!(matches!(r.exists(""), Err(FlowError::InvalidLocation(_))));
        assert!(matches!(r.exists("not base64!"), Err(FlowError::InvalidLocation(_))));
        // base64 válido pero no es JSON
        let garbage = URL_SAFE_NO_PAD.encode(b"{{{");
        assert!(!r.exists(&garbage).unwrap());
        assert!(matches!(r.read(&garbage), Err(FlowError::Retrieval { .. })));
    }
}
