//! Backends en sistema de ficheros para los contratos del crate `flow`.
//!
//! - `LocalResult`: resultados como ficheros bajo un directorio.
//! - `LocalStorage`: flows como ficheros JSON más un `manifest.json` tras
//!   `build`.
//! - `StoreConfig`: configuración desde variables de entorno / `.env`.
//! - `restore_storage`: reconstruye cualquier storage conocido desde su
//!   `StorageRecord`.

pub mod config;
pub mod local_result;
pub mod local_storage;
pub mod restore;

pub use config::{init_dotenv, StoreConfig};
pub use local_result::LocalResult;
pub use local_storage::{CommandRunner, LocalStorage, Manifest, FLOW_LOCATION_ENV, MANIFEST_FILE};
pub use restore::restore_storage;
