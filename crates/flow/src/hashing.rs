//! Hashing y JSON canónico.
//!
//! Las locations derivadas de contenido y los fingerprints de flows se
//! calculan sobre el JSON canónico (claves ordenadas, sin espacios) para que
//! valores iguales produzcan siempre el mismo hash.
use blake3::Hasher;
use serde_json::Value;
use std::collections::BTreeMap;

/// Serializa `value` como JSON canónico.
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let tree: BTreeMap<&String, String> = map.iter().map(|(k, v)| (k, to_canonical_json(v))).collect();
            let items: Vec<String> = tree.into_iter().map(|(k, v)| format!("{}:{}", quote(k), v)).collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

// `Display` de `Value::String` escapa igual que serde_json y no falla.
fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Hashea bytes y devuelve hex (blake3, 64 caracteres).
pub fn hash_bytes(input: &[u8]) -> String {
    let mut h = Hasher::new();
    h.update(input);
    h.finalize().to_hex().to_string()
}

/// Hash del JSON canónico de `value`.
pub fn hash_value(value: &Value) -> String {
    hash_bytes(to_canonical_json(value).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let v = json!({"b": {"z": 1, "a": [true, null]}, "a": "x\"y"});
        assert_eq!(to_canonical_json(&v), r#"{"a":"x\"y","b":{"a":[true,null],"z":1}}"#);
    }

    #[test]
    fn hash_value_ignores_key_order() {
        let h1 = hash_value(&json!({"b": 2, "a": 1}));
        let h2 = hash_value(&json!({"a": 1, "b": 2}));
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }
}
