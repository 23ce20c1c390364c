use anyhow::{Context, Result};
use flow::{Flow, Storage, StorageState, TaskResult, TaskSpec};
use flow_persistence::StoreConfig;
use log::info;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Pequeño menú interactivo sobre el `LocalStorage` y el `LocalResult`
/// configurados por entorno (`FLOWSTORE_*`, ver `StoreConfig`).
///
/// Opciones soportadas:
/// 1) Ver flows registrados
/// 2) Registrar flow
/// 3) Build y mostrar el StorageRecord
/// 4) Ejecutar flow por location
/// 5) Escribir resultado (JSON)
/// 6) Leer resultado por location
/// 7) Nuevo despliegue
/// 8) Salir
///
/// Al arrancar se restaura el último build (estado `Built`, no admite más
/// registros). La opción 7 abre un storage vacío sobre el mismo directorio;
/// su build sustituye al manifest anterior.
fn main() -> Result<()> {
    env_logger::init();
    let config = StoreConfig::from_env().context("configuración FLOWSTORE_*")?;
    let mut storage = config.open_local_storage().context("abriendo LocalStorage")?;
    let results = config.local_result()?;
    info!("flows en {}, resultados en {}", config.flows_dir.display(), config.results_dir.display());

    loop {
        println!("\n== Flowstore menu ({:?}) ==", storage.state());
        println!("1) Ver flows registrados");
        println!("2) Registrar flow");
        println!("3) Build y mostrar StorageRecord");
        println!("4) Ejecutar flow");
        println!("5) Escribir resultado (JSON)");
        println!("6) Leer resultado");
        println!("7) Nuevo despliegue (storage vacío)");
        println!("8) Salir");
        let choice = prompt("Elige una opción: ")?;
        match choice.trim() {
            "1" => {
                println!("\nNAME                 | TASKS | LOCATION");
                println!("-----------------------------------------------------------------------------------");
                for (location, flow) in storage.flows() {
                    println!("{:<20} | {:>5} | {}", flow.name, flow.tasks.len(), location);
                }
            }
            "2" => {
                if storage.state() == StorageState::Built {
                    eprintln!("El storage ya está construido; usa la opción 7 para un despliegue nuevo");
                    continue;
                }
                let name = prompt("Nombre del flow: ")?;
                if name.trim().is_empty() {
                    eprintln!("El nombre no puede estar vacío");
                    continue;
                }
                let tasks = prompt("Tareas separadas por comas (enter para ninguna): ")?;
                let flow = tasks.split(',')
                                .map(str::trim)
                                .filter(|t| !t.is_empty())
                                .fold(Flow::new(name.trim()), |f, t| f.with_task(TaskSpec::new(t)));
                match storage.add_flow(flow) {
                    Ok(location) => println!("Flow registrado en {}", location),
                    Err(e) => eprintln!("Error registrando flow: {}", e),
                }
            }
            "3" => match storage.build() {
                Ok(built) => match built.serialize().and_then(|r| r.to_json()) {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("Error serializando storage: {}", e),
                },
                Err(e) => eprintln!("Error en build: {}", e),
            },
            "4" => {
                let location = prompt("Location del flow: ")?;
                let vars = prompt("Variables KEY=VALUE separadas por espacios (opcional): ")?;
                let env: BTreeMap<String, String> = vars.split_whitespace()
                                                        .filter_map(|kv| kv.split_once('='))
                                                        .map(|(k, v)| (k.to_string(), v.to_string()))
                                                        .collect();
                match storage.get_env_runner(location.trim()).and_then(|runner| runner.run(&env)) {
                    Ok(status) => println!("Ejecución terminada: {:?}", status.code),
                    Err(e) => eprintln!("Error ejecutando flow: {}", e),
                }
            }
            "5" => {
                let raw = prompt("Valor (JSON o texto simple): ")?;
                let value = serde_json::from_str(raw.trim()).unwrap_or_else(|_| json!(raw.trim()));
                match results.write(&value) {
                    Ok(written) => println!("Resultado escrito en {}", written.location().unwrap_or("-")),
                    Err(e) => eprintln!("Error escribiendo resultado: {}", e),
                }
            }
            "6" => {
                let location = prompt("Location del resultado: ")?;
                match results.read(location.trim()) {
                    Ok(read) => println!("{}", read.value().map(|v| v.to_string()).unwrap_or_default()),
                    Err(e) => eprintln!("Error leyendo resultado: {}", e),
                }
            }
            "7" => match config.local_storage() {
                Ok(fresh) => {
                    storage = fresh;
                    println!("Nuevo despliegue en {}", storage.directory().display());
                }
                Err(e) => eprintln!("Error creando storage: {}", e),
            },
            "8" => {
                println!("Saliendo...");
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }

    Ok(())
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    if io::stdin().read_line(&mut s)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin cerrado"));
    }
    Ok(s)
}
