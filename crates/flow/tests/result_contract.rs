use flow::{CanonicalJsonHandler, ConstantResult, FlowError, InMemoryResult, InlineResult, TaskResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

fn sample_values() -> Vec<Value> {
  vec![json!(null),
       json!(0),
       json!(-17.5),
       json!("texto con \"comillas\" y ñ"),
       json!([1, "dos", {"tres": 3}]),
       json!({"nested": {"list": [true, false], "n": 1}})]
}

#[test]
fn constant_read_returns_wrapped_value_for_any_location() {
  for v in sample_values() {
    let c = ConstantResult::new(v.clone());
    for loc in ["", "anything", "/abs/path", "memory://x"] {
      let read = c.read(loc).expect("read constant");
      assert_eq!(read.value(), Some(&v));
    }
  }
}

#[test]
fn constant_write_always_fails_as_immutable() {
  for v in sample_values() {
    let c = ConstantResult::new(v.clone());
    match c.write(&v) {
      Err(FlowError::Immutable(_)) => {}
      other => panic!("expected Immutable, got {:?}", other.map(|r| r.value().cloned())),
    }
  }
}

#[test]
fn constant_exists_is_always_true() {
  let c = ConstantResult::new(json!({"a": 1}));
  for loc in ["", "missing", "s3://nope"] {
    assert!(c.exists(loc).expect("exists"));
  }
}

#[test]
fn inline_result_round_trips_every_value() {
  let template = InlineResult::new();
  for v in sample_values() {
    let written = template.write(&v).expect("write inline");
    assert_eq!(written.value(), Some(&v));
    let loc = written.location().expect("location").to_string();
    assert!(template.exists(&loc).expect("exists"));
    assert_eq!(template.read(&loc).expect("read").value(), Some(&v));
  }
}

#[test]
fn memory_result_round_trips_across_instances_sharing_a_store() {
  let writer = InMemoryResult::new();
  let reader = InMemoryResult::with_store(writer.store());
  for v in sample_values() {
    let written = writer.write(&v).expect("write memory");
    let loc = written.location().expect("location");
    assert!(reader.exists(loc).expect("exists"));
    assert_eq!(reader.read(loc).expect("read").value(), Some(&v));
  }
  // un almacén distinto no ve las escrituras
  let other = InMemoryResult::new();
  let loc = writer.write(&json!(1)).expect("write").location().map(String::from).expect("loc");
  assert!(!other.exists(&loc).expect("exists"));
}

#[test]
fn write_does_not_mutate_the_template() {
  let template = InMemoryResult::new().with_result_handler(Arc::new(CanonicalJsonHandler));
  let written = template.write(&json!({"b": 1, "a": 2})).expect("write");
  assert!(template.value().is_none());
  assert!(template.location().is_none());
  assert_eq!(written.result_handler().kind(), "canonical-json");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Report {
  rows: u32,
  source: String,
}

#[test]
fn typed_helpers_serialize_and_decode() {
  let template = InlineResult::new();
  let report = Report { rows: 10, source: "db".into() };
  let written = template.write_serialize(&report).expect("write typed");
  let read = template.read(written.location().expect("loc")).expect("read");
  assert_eq!(read.value_as::<Report>().expect("decode"), Some(report));
}

#[test]
fn read_of_absent_location_is_a_retrieval_error() {
  let r = InMemoryResult::new();
  match r.read("memory://0000") {
    Err(FlowError::Retrieval { location, .. }) => assert_eq!(location, "memory://0000"),
    other => panic!("expected Retrieval, got {:?}", other.is_ok()),
  }
}

#[test]
fn floats_round_trip_bit_for_bit() {
  let values = [json!(1.0715660391465826e-75), json!({"ratio": 0.1 + 0.2, "tiny": 5e-324, "big": 1.7976931348623157e308})];
  for v in &values {
    let memory = InMemoryResult::new().write(v).expect("memory write");
    let memory_read = memory.read(memory.location().expect("location")).expect("memory read");
    assert_eq!(memory_read.value(), Some(v));

    let inline = InlineResult::new().with_result_handler(Arc::new(CanonicalJsonHandler));
    let written = inline.write(v).expect("inline write");
    let inline_read = inline.read(written.location().expect("location")).expect("inline read");
    assert_eq!(inline_read.value(), Some(v));
  }
}
