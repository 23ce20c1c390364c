use flow::{Flow, FlowError, FlowLookup, RestoreStorage, Storage, StorageRecord, StorageState, TaskSpec};
use flow_persistence::{restore_storage, LocalStorage, StoreConfig, MANIFEST_FILE};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[test]
fn add_flow_writes_file_and_get_flow_reads_it_back() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut storage = LocalStorage::new(dir.path());
  let flow = Flow::new("Daily ETL").with_task(TaskSpec::new("extract"))
                                   .with_metadata(json!({"owner": "data"}));

  let loc = storage.add_flow(flow.clone()).expect("add_flow");
  assert!(Path::new(&loc).is_file());
  assert!(Path::new(&loc).file_name().expect("file name").to_string_lossy().starts_with("daily-etl-"));
  assert!(storage.contains(FlowLookup::from(&flow)));
  assert!(storage.contains(FlowLookup::Location(&loc)));
  assert_eq!(storage.get_flow(&loc).expect("get_flow"), flow);
}

#[test]
fn build_writes_manifest_and_freezes() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut storage = LocalStorage::new(dir.path()).with_labels(["local"]);
  storage.add_flow(Flow::new("a")).expect("add a");
  storage.add_flow(Flow::new("b")).expect("add b");

  storage.build().expect("build");
  assert_eq!(storage.state(), StorageState::Built);
  assert!(dir.path().join(MANIFEST_FILE).is_file());

  let manifest = LocalStorage::load_manifest(dir.path()).expect("manifest");
  assert_eq!(manifest.record, storage.serialize().expect("serialize"));

  assert!(matches!(storage.add_flow(Flow::new("c")), Err(FlowError::StorageFrozen(_))));
  assert!(!storage.contains(FlowLookup::Name("c")));
  storage.build().expect("second build is a no-op");
}

#[test]
fn duplicate_name_is_rejected_without_writing() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut storage = LocalStorage::new(dir.path());
  storage.add_flow(Flow::new("etl")).expect("first");
  let files_before = fs::read_dir(dir.path()).expect("read_dir").count();
  assert!(matches!(storage.add_flow(Flow::new("etl").with_version("2")), Err(FlowError::DuplicateFlow(_))));
  assert_eq!(fs::read_dir(dir.path()).expect("read_dir").count(), files_before);
}

#[test]
fn build_evicts_flows_whose_file_disappeared() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut storage = LocalStorage::new(dir.path());
  let kept = storage.add_flow(Flow::new("kept")).expect("kept");
  let lost = storage.add_flow(Flow::new("lost")).expect("lost");
  fs::remove_file(&lost).expect("remove");

  assert!(matches!(storage.build(), Err(FlowError::Build(_))));
  assert!(!storage.contains(FlowLookup::Name("lost")));
  assert!(!storage.contains(FlowLookup::Location(&lost)));
  assert!(storage.contains(FlowLookup::Location(&kept)));
  assert_ne!(storage.state(), StorageState::Built);

  // lo que queda se construye sin problemas
  storage.build().expect("retry build");
  assert_eq!(storage.get_flow(&kept).expect("get_flow").name, "kept");
}

#[test]
fn build_evicts_flows_whose_file_was_tampered() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut storage = LocalStorage::new(dir.path());
  let loc = storage.add_flow(Flow::new("etl")).expect("add");
  fs::write(&loc, b"{ not json").expect("overwrite");

  assert!(matches!(storage.build(), Err(FlowError::Build(_))));
  assert!(!storage.contains(FlowLookup::Name("etl")));
}

#[test]
fn unknown_location_is_not_found() {
  let dir = tempfile::tempdir().expect("tempdir");
  let storage = LocalStorage::new(dir.path());
  let missing = dir.path().join("missing.json");
  assert!(matches!(storage.get_flow(&missing.to_string_lossy()), Err(FlowError::NotFound(_))));
}

#[test]
fn env_runner_requires_a_command() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut storage = LocalStorage::new(dir.path());
  let loc = storage.add_flow(Flow::new("etl")).expect("add");
  assert!(storage.env_runner_provider().is_none());
  assert!(matches!(storage.get_env_runner(&loc), Err(FlowError::Unsupported { .. })));
}

#[cfg(unix)]
#[test]
fn env_runner_passes_location_and_caller_env() {
  let dir = tempfile::tempdir().expect("tempdir");
  let script = r#"test "$FLOWSTORE_FLOW_LOCATION" = "$EXPECTED_LOCATION" || exit 3; exit "$EXIT_WITH""#;
  let mut storage = LocalStorage::new(dir.path()).with_runner_command(["sh", "-c", script]);
  let loc = storage.add_flow(Flow::new("etl")).expect("add");
  storage.build().expect("build");

  let runner = storage.get_env_runner(&loc).expect("runner");
  let mut env = BTreeMap::new();
  env.insert("EXPECTED_LOCATION".to_string(), loc.clone());
  env.insert("EXIT_WITH".to_string(), "0".to_string());
  assert!(runner.run(&env).expect("run").success());

  env.insert("EXIT_WITH".to_string(), "7".to_string());
  assert_eq!(runner.run(&env).expect("run").code, Some(7));
}

#[test]
fn missing_program_is_an_execution_error() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut storage = LocalStorage::new(dir.path()).with_runner_command(["definitely-not-a-real-program-xyz"]);
  let loc = storage.add_flow(Flow::new("etl")).expect("add");
  let runner = storage.get_env_runner(&loc).expect("runner");
  assert!(matches!(runner.run(&BTreeMap::new()), Err(FlowError::Execution(_))));
}

#[test]
fn serialize_and_restore_round_trip() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut storage = LocalStorage::new(dir.path()).with_labels(["gpu"])
                                                 .with_runner_command(["sh", "-c", "exit 0"]);
  let flow = Flow::new("etl").with_version("1.0");
  let loc = storage.add_flow(flow.clone()).expect("add");
  storage.build().expect("build");

  let record = storage.serialize().expect("serialize");
  assert_eq!(record.storage_type, "LocalStorage");
  let parsed = StorageRecord::from_json(&record.to_json().expect("to_json")).expect("from_json");

  let restored = LocalStorage::from_record(&parsed).expect("restore");
  assert_eq!(restored.state(), StorageState::Built);
  assert_eq!(restored.labels(), storage.labels());
  assert!(restored.contains(FlowLookup::from(&flow)));
  assert_eq!(restored.get_flow(&loc).expect("get_flow"), flow);
  assert!(restored.env_runner_provider().is_some());
  assert_eq!(restored.serialize().expect("serialize again"), record);

  let dynamic = restore_storage(&parsed).expect("restore_storage");
  assert_eq!(dynamic.name(), "LocalStorage");
  assert_eq!(dynamic.get_flow(&loc).expect("get_flow").name, "etl");
}

#[test]
fn restore_fails_when_flow_file_is_gone() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut storage = LocalStorage::new(dir.path());
  let loc = storage.add_flow(Flow::new("etl")).expect("add");
  storage.build().expect("build");
  let record = storage.serialize().expect("serialize");
  fs::remove_file(&loc).expect("remove");
  assert!(matches!(LocalStorage::from_record(&record), Err(FlowError::Retrieval { .. })));
}

#[test]
fn build_accepts_flows_with_hard_to_parse_floats() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut storage = LocalStorage::new(dir.path());
  let flow = Flow::new("etl").with_metadata(json!({"threshold": 1.0715660391465826e-75}));
  let loc = storage.add_flow(flow.clone()).expect("add");
  storage.build().expect("build");
  assert!(storage.contains(FlowLookup::from(&flow)));
  assert_eq!(storage.get_flow(&loc).expect("get_flow"), flow);
}

#[test]
fn relative_directory_is_recorded_as_absolute() {
  let storage = LocalStorage::new("relative/flows");
  assert!(storage.directory().is_absolute());
  assert!(storage.directory().ends_with("relative/flows"));

  let record = storage.serialize().expect("serialize");
  let directory: String = record.parameter("directory").expect("parameter").expect("directory");
  assert!(Path::new(&directory).is_absolute());
}

#[test]
fn reopening_restores_last_build_and_a_fresh_cycle_can_rebuild() {
  let dir = tempfile::tempdir().expect("tempdir");
  let home = dir.path().to_string_lossy().into_owned();
  let cfg = StoreConfig::from_lookup(|k| (k == "FLOWSTORE_HOME").then(|| home.clone())).expect("config");

  let mut first = cfg.open_local_storage().expect("open empty");
  assert_eq!(first.state(), StorageState::Empty);
  first.add_flow(Flow::new("etl")).expect("add etl");
  first.build().expect("build");

  let mut reopened = cfg.open_local_storage().expect("reopen");
  assert_eq!(reopened.state(), StorageState::Built);
  assert!(reopened.contains(FlowLookup::Name("etl")));
  assert!(matches!(reopened.add_flow(Flow::new("report")), Err(FlowError::StorageFrozen(_))));

  let mut next = cfg.local_storage().expect("fresh cycle");
  assert_eq!(next.state(), StorageState::Empty);
  next.add_flow(Flow::new("etl").with_version("2")).expect("re-add etl");
  next.add_flow(Flow::new("report")).expect("add report");
  next.build().expect("rebuild");

  let latest = cfg.open_local_storage().expect("reopen latest");
  assert!(latest.contains(FlowLookup::Name("report")));
  assert_eq!(latest.flows().count(), 2);
}
