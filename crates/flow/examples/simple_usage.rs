use flow::engine::{CheckpointEngine, CheckpointEngineConfig};
use flow::errors::FlowError;
use flow::stubs::InMemoryStorage;
use flow::{ConstantResult, DeploymentService, Flow, InMemoryResult, Storage, TaskResult, TaskSpec};
use serde_json::json;

fn main() -> Result<(), FlowError> {
    // Despliegue: registrar dos flows y construir el storage una vez
    let mut service = DeploymentService::new(InMemoryStorage::new().with_labels(["demo"]));
    let etl = Flow::new("etl").with_task(TaskSpec::new("extract"))
                              .with_task(TaskSpec::new("load").with_result_handler("canonical-json"));
    let locations = service.register_all(vec![etl, Flow::new("report")])?;
    println!("registered at {:?}", locations);
    let record = service.deploy()?;
    println!("storage record:\n{}\n", record.to_json()?);

    // Ejecución: recuperar el flow y resolver el handler de cada tarea
    let storage = service.into_inner();
    let flow = storage.get_flow(&locations[0])?;
    for task in &flow.tasks {
        let handler = storage.handler_for(&flow, Some(&task.name))?;
        println!("task {} -> handler {}", task.name, handler.kind());
    }

    // Resultados: constante (no escribible) y en memoria (round-trip)
    let constant = ConstantResult::new(json!({"threshold": 0.5}));
    println!("constant read: {:?}", constant.read("ignored")?.value());
    println!("constant write: {:?}", constant.write(&json!(1)).err());

    let engine = CheckpointEngine::new(InMemoryResult::new(), CheckpointEngineConfig::default());
    let first = engine.run_cached(None, || Ok(json!({"rows": 128})))?;
    let loc = first.location().map(String::from);
    println!("computed at {:?}", loc);
    let again = engine.run_cached(loc.as_deref(), || Ok(json!("never")))?;
    println!("cached value: {:?}", again.value());

    Ok(())
}
