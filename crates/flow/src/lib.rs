//! Crate `flow`: contratos de persistencia de resultados y de storage de
//! flows.
//!
//! Este crate define los dos puntos de extensión que todo backend concreto
//! (disco, object store, base de datos, imagen de contenedor, constante en
//! memoria) debe cumplir:
//! - `TaskResult`: cómo se persiste (`write`), recupera (`read`) y comprueba
//!   (`exists`) el valor calculado por una unidad de trabajo;
//! - `Storage`: cómo se empaqueta (`add_flow` + `build`), localiza
//!   (`contains`) y recupera (`get_flow`, `get_env_runner`) una definición de
//!   flow.
//!
//! Diseño resumido:
//! - Las capacidades opcionales (`FlowResolver`, `EnvRunnerProvider`) son
//!   traits aparte; `Storage::get_flow` y `Storage::get_env_runner` devuelven
//!   `FlowError::Unsupported` cuando la variante no las ofrece.
//! - El handler de resultados se inyecta en el constructor; si no se indica se
//!   sustituye `NoopResultHandler`.
//! - Los logs usan la fachada `log`; el binario decide qué logger instalar.
//!
//! Ejemplo rápido:
//! ```rust
//! use flow::{ConstantResult, Flow, FlowLookup, InMemoryStorage, Storage, TaskResult};
//! let c = ConstantResult::new(serde_json::json!(42));
//! assert_eq!(c.read("ignorado").unwrap().value(), Some(&serde_json::json!(42)));
//!
//! let mut storage = InMemoryStorage::new();
//! let flow = Flow::new("etl");
//! let loc = storage.add_flow(flow.clone()).unwrap();
//! storage.build().unwrap();
//! assert!(storage.contains(FlowLookup::from(&flow)));
//! assert_eq!(storage.get_flow(&loc).unwrap(), flow);
//! ```
pub mod constant;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod handler;
pub mod hashing;
pub mod inline;
pub mod result;
pub mod service;
pub mod storage;
pub mod stubs;

pub use constant::ConstantResult;
pub use domain::*;
pub use engine::*;
pub use errors::*;
pub use handler::*;
pub use inline::InlineResult;
pub use result::TaskResult;
pub use service::DeploymentService;
pub use storage::*;
pub use stubs::*;
