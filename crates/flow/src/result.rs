// Archivo: result.rs
// Propósito: definir el contrato `TaskResult`, que describe cómo se
// persiste, recupera y comprueba el valor producido por una unidad de
// trabajo. Las variantes concretas (constante, inline, memoria, disco)
// implementan este trait.
use crate::errors::{FlowError, Result};
use crate::handler::ResultHandlerRef;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Contrato de persistencia de un resultado.
///
/// Una instancia es inmutable respecto a su par `value`/`location`: `read` y
/// `write` devuelven instancias nuevas y nunca mutan `self`.
///
/// Concurrencia: el contrato asume un único escritor por location (lo impone
/// el motor). Cada variante documenta qué ocurre con escritores concurrentes.
pub trait TaskResult: Clone + Send + Sync + Sized {
    /// Valor representado, si ya se leyó o escribió.
    fn value(&self) -> Option<&JsonValue>;

    /// Location específica del backend, si la hay.
    fn location(&self) -> Option<&str>;

    /// Codec usado por esta instancia.
    fn result_handler(&self) -> &ResultHandlerRef;

    /// Lee y decodifica el valor en `location`.
    ///
    /// Falla con `FlowError::Retrieval` si la location no existe o el
    /// contenido no se puede decodificar.
    fn read(&self, location: &str) -> Result<Self>;

    /// Serializa y persiste `value`. Devuelve una instancia nueva con la
    /// `location` elegida por el backend y el valor ya cargado.
    ///
    /// Falla con `FlowError::Persistence` (o `Immutable` si la variante no
    /// admite escritura).
    fn write(&self, value: &JsonValue) -> Result<Self>;

    /// Comprueba existencia. Una location bien formada pero ausente devuelve
    /// `Ok(false)`; sólo la entrada mal formada produce error.
    fn exists(&self, location: &str) -> Result<bool>;

    /// Decodifica el valor a un tipo concreto.
    fn value_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.value() {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }

    /// Atajo para escribir cualquier valor `Serialize`.
    fn write_serialize<T: Serialize>(&self, value: &T) -> Result<Self> {
        let v = serde_json::to_value(value).map_err(|e| FlowError::Persistence(e.to_string()))?;
        self.write(&v)
    }
}
