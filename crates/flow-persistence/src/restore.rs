//! Reconstrucción de un storage a partir de su `StorageRecord`, despachando
//! por el discriminador `type`.
use crate::local_storage::LocalStorage;
use flow::{FlowError, InMemoryStorage, RestoreStorage, Result, Storage, StorageRecord};
use log::debug;

pub fn restore_storage(record: &StorageRecord) -> Result<Box<dyn Storage>> {
  debug!("[restore] record de tipo {}", record.storage_type);
  match record.storage_type.as_str() {
    "LocalStorage" => Ok(Box::new(LocalStorage::from_record(record)?)),
    "InMemoryStorage" => Ok(Box::new(InMemoryStorage::from_record(record)?)),
    other => Err(FlowError::Serialization(format!("tipo de storage desconocido: {other}"))),
  }
}
