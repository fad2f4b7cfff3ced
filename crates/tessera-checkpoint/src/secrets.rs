//! Secret collection and masking for checkpoint data.

use std::collections::BTreeSet;

use serde_json::Value;

/// Replacement text for masked secrets.
pub const SECRET_MASK: &str = "[secret]";

/// Look up a dot-separated path in a JSON object.
pub(crate) fn value_at_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
  path
    .split('.')
    .try_fold(value, |current, key| current.as_object()?.get(key))
}

/// Collect every string of at least `min_len` bytes found in `value`.
pub(crate) fn collect_secrets(value: &Value, min_len: usize, out: &mut BTreeSet<String>) {
  match value {
    Value::String(s) if s.len() >= min_len => {
      out.insert(s.clone());
    }
    Value::Array(items) => {
      for item in items {
        collect_secrets(item, min_len, out);
      }
    }
    Value::Object(map) => {
      for item in map.values() {
        collect_secrets(item, min_len, out);
      }
    }
    _ => {}
  }
}

/// Order secrets longest first so overlapping secrets mask completely.
pub(crate) fn ordered<'a>(secrets: impl IntoIterator<Item = &'a String>) -> Vec<&'a str> {
  let mut ordered: Vec<&str> = secrets.into_iter().map(String::as_str).collect();
  ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
  ordered.dedup();
  ordered
}

/// Return a copy of `value` with every occurrence of a secret masked.
///
/// `secrets` must already be ordered longest first.
pub(crate) fn scrub(value: &Value, secrets: &[&str]) -> Value {
  if secrets.is_empty() {
    return value.clone();
  }

  match value {
    Value::String(s) => Value::String(scrub_str(s, secrets)),
    Value::Number(n) => {
      let text = n.to_string();
      let scrubbed = scrub_str(&text, secrets);
      if scrubbed == text {
        value.clone()
      } else {
        Value::String(scrubbed)
      }
    }
    Value::Array(items) => Value::Array(items.iter().map(|v| scrub(v, secrets)).collect()),
    Value::Object(map) => Value::Object(
      map
        .iter()
        .map(|(k, v)| (k.clone(), scrub(v, secrets)))
        .collect(),
    ),
    Value::Null | Value::Bool(_) => value.clone(),
  }
}

fn scrub_str(s: &str, secrets: &[&str]) -> String {
  secrets
    .iter()
    .fold(s.to_string(), |acc, secret| acc.replace(secret, SECRET_MASK))
}
