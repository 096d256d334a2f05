//! `array_contains` (`spec.md` §4.3, "Array").

use std::sync::Arc;

use serde_json::Value;

use crate::event::{Document, Event};
use crate::expr::{EvalResult, Expression};
use crate::param::Parameter;
use crate::registry::Registry;

use super::{parse_params, require_arity_min, trace_name};

pub fn register(registry: &mut Registry) -> Result<(), crate::registry::RegistryError> {
    registry.register("array_contains", build())
}

fn build() -> super::Builder {
    Arc::new(|target, raw| {
        let name = "array_contains";
        let params = parse_params(name, raw)?;
        require_arity_min(name, &params, 1)?;
        let target = target.to_string();
        let trace = trace_name(name, &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let Some(array) = event.get_array(&target) else {
                    return EvalResult::failure(event, format!("{name}: target missing or not an array"));
                };
                for param in &params {
                    // A REFERENCE whose path is absent is silently skipped
                    // rather than treated as a build/eval error.
                    let candidate = match param {
                        Parameter::Value(v) => Some(v.clone()),
                        Parameter::Reference { path, .. } => event.get_any(path).as_ref().and_then(value_to_text),
                    };
                    let Some(candidate) = candidate else { continue };
                    if array.iter().any(|el| value_to_text(el).as_deref() == Some(candidate.as_str())) {
                        return EvalResult::success(event, format!("{name}: found \"{candidate}\""));
                    }
                }
                EvalResult::failure(event, format!("{name}: no parameter matched an array element"))
            }),
        ))
    })
}

fn value_to_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn succeeds_when_any_value_matches() {
        let builder = build();
        let expr = builder("/tags", &["b".to_string(), "z".to_string()]).unwrap();
        assert!(expr.eval(Event::new(json!({"tags": ["a", "b", "c"]}))).ok);
    }

    #[test]
    fn fails_when_target_missing_or_not_array() {
        let builder = build();
        let expr = builder("/tags", &["b".to_string()]).unwrap();
        assert!(!expr.eval(Event::new(json!({}))).ok);
        assert!(!expr.eval(Event::new(json!({"tags": "not-an-array"}))).ok);
    }

    #[test]
    fn missing_reference_parameter_is_skipped_not_a_failure_cause() {
        let builder = build();
        let expr = builder("/tags", &["$missing".to_string(), "b".to_string()]).unwrap();
        assert!(expr.eval(Event::new(json!({"tags": ["a", "b"]}))).ok);
    }
}
