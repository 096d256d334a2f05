//! The mutable JSON event document threaded through expression evaluation.
//!
//! An [`Event`] is a reference-counted handle to a single JSON document.
//! The router hands the *same* handle to every node of a policy's
//! expression tree for one evaluation, so side-effecting helpers observe
//! each other's prior writes in program order (see `spec.md` §3 and §5).
//! An `Event` is never shared across worker threads concurrently: each
//! worker owns the only live set of clones for the event it is currently
//! evaluating.
//!
//! [`Document`] is the typed capability set helpers are written against.
//! It is a trait, not a concrete `serde_json::Value` API, so the core
//! stays portable across JSON backends; [`Event`] is simply the shipped
//! implementation backed by `serde_json`.

use std::sync::Arc;

use miette::Diagnostic;
use parking_lot::{Mutex, MutexGuard};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised by [`Document`] write operations.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum DocumentError {
    #[error("invalid pointer path \"{0}\"")]
    #[diagnostic(code(eventcascade::event::invalid_pointer))]
    InvalidPointer(String),
    #[error("path \"{0}\" does not resolve to an object; cannot set a child key")]
    #[diagnostic(code(eventcascade::event::not_an_object))]
    NotAnObject(String),
}

/// Typed read/write access to a JSON document by JSON Pointer path.
///
/// Every accessor takes a pointer path such as `/a/b/c`; the empty string
/// `""` refers to the document root. Getters return `None`/`false` when the
/// path is absent or the value is of the wrong type — callers distinguish
/// "not found" from "wrong type" by also checking [`Document::exists`],
/// matching the helper library's "not found" vs "wrong type" trace
/// distinction (`spec.md` §4.3).
pub trait Document: Send + Sync {
    fn exists(&self, path: &str) -> bool;
    fn get_any(&self, path: &str) -> Option<Value>;
    fn get_string(&self, path: &str) -> Option<String>;
    fn get_int(&self, path: &str) -> Option<i32>;
    fn get_int64(&self, path: &str) -> Option<i64>;
    fn get_double(&self, path: &str) -> Option<f64>;
    fn get_bool(&self, path: &str) -> Option<bool>;
    fn get_array(&self, path: &str) -> Option<Vec<Value>>;
    fn get_object(&self, path: &str) -> Option<Map<String, Value>>;

    fn is_string(&self, path: &str) -> bool;
    fn is_number(&self, path: &str) -> bool;
    fn is_bool(&self, path: &str) -> bool;
    fn is_array(&self, path: &str) -> bool;
    fn is_object(&self, path: &str) -> bool;
    fn is_null(&self, path: &str) -> bool;

    fn set_string(&self, path: &str, value: &str) -> Result<(), DocumentError>;
    fn set_bool(&self, path: &str, value: bool) -> Result<(), DocumentError>;
    fn set_int(&self, path: &str, value: i64) -> Result<(), DocumentError>;
    fn set_object(&self, path: &str, value: Value) -> Result<(), DocumentError>;
}

/// A reference-counted, mutable JSON event document.
///
/// Cloning an `Event` is cheap (an `Arc` bump) and yields a handle to the
/// *same* underlying document — this is what lets a `Term` mutate the
/// event and have downstream siblings in the same `Chain`/`Broadcast`
/// observe the write.
#[derive(Clone, Debug)]
pub struct Event(Arc<Mutex<Value>>);

impl Event {
    /// Wrap an existing JSON value as an event document.
    pub fn new(value: Value) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    /// Parse a raw JSON payload (as received from an endpoint) into an
    /// event document.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    /// True iff `a` and `b` are handles to the same underlying document.
    pub fn ptr_eq(a: &Event, b: &Event) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Clone the current document out as a plain `serde_json::Value`, for
    /// serialization (e.g. spilling to the flood file).
    pub fn to_value(&self) -> Value {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.0.lock()
    }
}

impl Document for Event {
    fn exists(&self, path: &str) -> bool {
        resolve(&self.lock(), path).is_some()
    }

    fn get_any(&self, path: &str) -> Option<Value> {
        resolve(&self.lock(), path).cloned()
    }

    fn get_string(&self, path: &str) -> Option<String> {
        resolve(&self.lock(), path)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn get_int(&self, path: &str) -> Option<i32> {
        resolve(&self.lock(), path)
            .and_then(Value::as_i64)
            .and_then(|v| i32::try_from(v).ok())
    }

    fn get_int64(&self, path: &str) -> Option<i64> {
        resolve(&self.lock(), path).and_then(Value::as_i64)
    }

    fn get_double(&self, path: &str) -> Option<f64> {
        resolve(&self.lock(), path).and_then(Value::as_f64)
    }

    fn get_bool(&self, path: &str) -> Option<bool> {
        resolve(&self.lock(), path).and_then(Value::as_bool)
    }

    fn get_array(&self, path: &str) -> Option<Vec<Value>> {
        resolve(&self.lock(), path)
            .and_then(Value::as_array)
            .cloned()
    }

    fn get_object(&self, path: &str) -> Option<Map<String, Value>> {
        resolve(&self.lock(), path)
            .and_then(Value::as_object)
            .cloned()
    }

    fn is_string(&self, path: &str) -> bool {
        resolve(&self.lock(), path).is_some_and(Value::is_string)
    }

    fn is_number(&self, path: &str) -> bool {
        resolve(&self.lock(), path).is_some_and(Value::is_number)
    }

    fn is_bool(&self, path: &str) -> bool {
        resolve(&self.lock(), path).is_some_and(Value::is_boolean)
    }

    fn is_array(&self, path: &str) -> bool {
        resolve(&self.lock(), path).is_some_and(Value::is_array)
    }

    fn is_object(&self, path: &str) -> bool {
        resolve(&self.lock(), path).is_some_and(Value::is_object)
    }

    fn is_null(&self, path: &str) -> bool {
        resolve(&self.lock(), path).is_some_and(Value::is_null)
    }

    fn set_string(&self, path: &str, value: &str) -> Result<(), DocumentError> {
        assign(&mut self.lock(), path, Value::String(value.to_string()))
    }

    fn set_bool(&self, path: &str, value: bool) -> Result<(), DocumentError> {
        assign(&mut self.lock(), path, Value::Bool(value))
    }

    fn set_int(&self, path: &str, value: i64) -> Result<(), DocumentError> {
        assign(&mut self.lock(), path, Value::from(value))
    }

    fn set_object(&self, path: &str, value: Value) -> Result<(), DocumentError> {
        assign(&mut self.lock(), path, value)
    }
}

fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    root.pointer(path)
}

/// Assign `value` at `path`, auto-vivifying missing intermediate objects
/// the same way `serde_json`'s own `Value::Object` construction works —
/// but refusing to overwrite a non-object, non-null intermediate, which
/// would silently discard sibling data.
fn assign(root: &mut Value, path: &str, value: Value) -> Result<(), DocumentError> {
    if path.is_empty() {
        *root = value;
        return Ok(());
    }
    if !path.starts_with('/') {
        return Err(DocumentError::InvalidPointer(path.to_string()));
    }
    let segments: Vec<String> = path[1..].split('/').map(unescape_segment).collect();
    let mut current = root;
    for segment in &segments[..segments.len() - 1] {
        vivify(current, path)?;
        let obj = current.as_object_mut().expect("vivified above");
        current = obj
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    vivify(current, path)?;
    current
        .as_object_mut()
        .expect("vivified above")
        .insert(segments[segments.len() - 1].clone(), value);
    Ok(())
}

fn vivify(current: &mut Value, path: &str) -> Result<(), DocumentError> {
    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    if !current.is_object() {
        return Err(DocumentError::NotAnObject(path.to_string()));
    }
    Ok(())
}

fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_the_same_document() {
        let a = Event::new(json!({"f": 1}));
        let b = a.clone();
        assert!(Event::ptr_eq(&a, &b));
        b.set_int("/f", 2).unwrap();
        assert_eq!(a.get_int64("/f"), Some(2));
    }

    #[test]
    fn get_distinguishes_missing_from_wrong_type() {
        let e = Event::new(json!({"f": "text"}));
        assert!(e.exists("/f"));
        assert_eq!(e.get_int64("/f"), None);
        assert!(!e.exists("/missing"));
        assert_eq!(e.get_int64("/missing"), None);
    }

    #[test]
    fn set_auto_vivifies_intermediate_objects() {
        let e = Event::new(json!({}));
        e.set_string("/a/b/c", "hi").unwrap();
        assert_eq!(e.get_string("/a/b/c"), Some("hi".to_string()));
        assert!(e.is_object("/a/b"));
    }

    #[test]
    fn set_refuses_to_clobber_non_object_intermediate() {
        let e = Event::new(json!({"a": 1}));
        let err = e.set_string("/a/b", "hi").unwrap_err();
        assert_eq!(err, DocumentError::NotAnObject("/a/b".to_string()));
    }

    #[test]
    fn root_assignment_replaces_whole_document() {
        let e = Event::new(json!({"old": true}));
        e.set_object("", json!({"new": true})).unwrap();
        assert_eq!(e.to_value(), json!({"new": true}));
    }

    #[test]
    fn type_predicates() {
        let e = Event::new(json!({
            "s": "x", "n": 1, "b": true, "a": [1], "o": {}, "z": null
        }));
        assert!(e.is_string("/s"));
        assert!(e.is_number("/n"));
        assert!(e.is_bool("/b"));
        assert!(e.is_array("/a"));
        assert!(e.is_object("/o"));
        assert!(e.is_null("/z"));
        assert!(!e.is_string("/n"));
    }
}
