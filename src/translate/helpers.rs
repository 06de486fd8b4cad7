//! Small helpers shared by every adapter: response ids, timestamps, lenient
//! field access and tool-argument parsing.
//!
//! Id and clock access go through the [`IdSource`] and [`Clock`] traits so
//! stream translators can be driven deterministically in tests.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde_json::{Map, Value};

/// Highest timestamp handed out so far; keeps [`now`] non-decreasing even if
/// the wall clock steps backwards.
static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Generate an opaque, unique response id.
pub fn new_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

/// Current Unix timestamp in seconds, monotonically non-decreasing within the process.
pub fn now() -> i64 {
    let wall = chrono::Utc::now().timestamp();
    let previous = LAST_TIMESTAMP.fetch_max(wall, Ordering::Relaxed);
    previous.max(wall)
}

/// The model id to put on the wire: the caller-chosen id, else the one in the request.
pub fn target_model(model: &str, requested: &str) -> String {
    if model.is_empty() {
        requested.to_string()
    } else {
        model.to_string()
    }
}

/// String value of `key`, or `""` when absent or not a string.
pub fn get_string_field<'a>(map: &'a Map<String, Value>, key: &str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Parse a JSON-string tool-call argument into an object for the provider wire.
///
/// An empty string becomes `{}`. Unparseable input becomes a placeholder
/// object carrying the raw text, so a single bad call never aborts a request.
pub fn parse_arguments(arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(arguments) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => serde_json::json!({ "value": other }),
        Err(e) => {
            tracing::debug!(error = %e, "tool call arguments are not valid JSON");
            serde_json::json!({
                "error": "invalid tool call arguments",
                "raw_arguments": arguments,
            })
        }
    }
}

/// Serialize a provider-side argument object back into the canonical JSON string.
pub fn stringify_arguments(input: &Value) -> String {
    match input {
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

pub trait IdSource: Send + Sync {
    fn new_id(&self) -> String;
    fn new_tool_call_id(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        now()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn new_id(&self) -> String {
        new_id()
    }

    fn new_tool_call_id(&self) -> String {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

/// Ids of the form `{prefix}-{n}` / `call_{n}` with a shared counter.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }

    fn bump(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl IdSource for SequentialIds {
    fn new_id(&self) -> String {
        format!("{}-{}", self.prefix, self.bump())
    }

    fn new_tool_call_id(&self) -> String {
        format!("call_{}", self.bump())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_id_is_unique() {
        let a = new_id();
        let b = new_id();
        assert!(a.starts_with("chatcmpl-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_now_never_goes_backwards() {
        let first = now();
        let second = now();
        assert!(second >= first);
        assert!(first > 1_600_000_000);
    }

    #[test]
    fn test_get_string_field() {
        let map = json!({"a": "x", "b": 3}).as_object().cloned().unwrap();
        assert_eq!(get_string_field(&map, "a"), "x");
        assert_eq!(get_string_field(&map, "b"), "");
        assert_eq!(get_string_field(&map, "missing"), "");
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(
            parse_arguments(r#"{"location":"London"}"#),
            json!({"location": "London"})
        );
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("[1,2]"), json!({"value": [1, 2]}));

        let broken = parse_arguments("{not json");
        assert_eq!(broken["error"], "invalid tool call arguments");
        assert_eq!(broken["raw_arguments"], "{not json");
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIds::new("chatcmpl-test");
        assert_eq!(ids.new_id(), "chatcmpl-test-0");
        assert_eq!(ids.new_tool_call_id(), "call_1");
    }
}
