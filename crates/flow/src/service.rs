// Archivo: service.rs
// Propósito: implementar `DeploymentService`, la capa que usa el tooling de
// despliegue: registra flows en un `Storage`, lo construye una vez y entrega
// el `StorageRecord` que acompañará a los metadatos de cada flow.
use crate::domain::Flow;
use crate::errors::Result;
use crate::storage::{Storage, StorageRecord};
use log::info;

/// Servicio de alto nivel sobre un storage concreto.
///
/// El registro es de un único hilo: el servicio posee el storage y expone
/// sus operaciones mutables a través de `&mut self`.
pub struct DeploymentService<S>
    where S: Storage
{
    storage: S,
}

impl<S> DeploymentService<S> where S: Storage
{
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Registra un flow y devuelve su location.
    pub fn register(&mut self, flow: Flow) -> Result<String> {
        self.storage.add_flow(flow)
    }

    /// Registra varios flows en orden; se detiene en el primer error. Los
    /// registrados antes del error permanecen registrados.
    pub fn register_all<I>(&mut self, flows: I) -> Result<Vec<String>>
        where I: IntoIterator<Item = Flow>
    {
        flows.into_iter().map(|f| self.storage.add_flow(f)).collect()
    }

    /// Construye el storage y devuelve su registro serializado.
    pub fn deploy(&mut self) -> Result<StorageRecord> {
        let built = self.storage.build()?;
        let record = built.serialize()?;
        info!("storage {} desplegado ({} labels)", record.storage_type, built.labels().len());
        Ok(record)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}
