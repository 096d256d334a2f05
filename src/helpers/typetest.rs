//! Type-test helpers (`spec.md` §4.3, "Type tests").
//!
//! Each tester distinguishes "not found" from "wrong type" in its failure
//! trace, per the spec's invariant that those are separate failure kinds.

use std::sync::Arc;

use serde_json::Value;

use crate::event::{Document, Event};
use crate::expr::{EvalResult, Expression};
use crate::registry::Registry;

use super::{parse_params, require_arity_exact, trace_name};

type Predicate = fn(&Value) -> bool;

const TESTS: &[(&str, Predicate, bool)] = &[
    ("is_number", Value::is_number, true),
    ("is_not_number", Value::is_number, false),
    ("is_string", Value::is_string, true),
    ("is_not_string", Value::is_string, false),
    ("is_boolean", Value::is_boolean, true),
    ("is_not_boolean", Value::is_boolean, false),
    ("is_array", Value::is_array, true),
    ("is_not_array", Value::is_array, false),
    ("is_object", Value::is_object, true),
    ("is_not_object", Value::is_object, false),
    ("is_null", Value::is_null, true),
    ("is_not_null", Value::is_null, false),
    ("is_true", |v| v.as_bool() == Some(true), true),
    ("is_false", |v| v.as_bool() == Some(false), true),
];

pub fn register(registry: &mut Registry) -> Result<(), crate::registry::RegistryError> {
    for (name, predicate, expect) in TESTS {
        registry.register(*name, build(name, *predicate, *expect))?;
    }
    Ok(())
}

fn build(name: &'static str, predicate: Predicate, expect: bool) -> super::Builder {
    Arc::new(move |target, raw| {
        let params = parse_params(name, raw)?;
        require_arity_exact(name, &params, 0)?;
        let target = target.to_string();
        let trace = trace_name(name, &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let Some(value) = event.get_any(&target) else {
                    return EvalResult::failure(event, format!("{name}: target not found"));
                };
                if predicate(&value) == expect {
                    EvalResult::success(event, format!("{name}: {target} ok"))
                } else {
                    EvalResult::failure(event, format!("{name}: {target} is the wrong type"))
                }
            }),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn is_number_distinguishes_missing_from_wrong_type() {
        let builder = build("is_number", Value::is_number, true);
        let expr = builder("/f", &[]).unwrap();
        assert!(expr.eval(Event::new(json!({"f": 1}))).ok);
        let wrong_type = expr.eval(Event::new(json!({"f": "x"})));
        assert!(!wrong_type.ok);
        assert!(wrong_type.trace.contains("wrong type"));
        let missing = expr.eval(Event::new(json!({})));
        assert!(!missing.ok);
        assert!(missing.trace.contains("not found"));
    }

    #[test]
    fn is_true_and_is_false_are_exact() {
        let is_true = build("is_true", |v| v.as_bool() == Some(true), true);
        let expr = is_true("/f", &[]).unwrap();
        assert!(expr.eval(Event::new(json!({"f": true}))).ok);
        assert!(!expr.eval(Event::new(json!({"f": false}))).ok);
    }
}
