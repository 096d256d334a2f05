//! Integer and string comparison helpers (`spec.md` §4.3, "Comparison").

use std::cmp::Ordering;
use std::sync::Arc;

use crate::event::{Document, Event};
use crate::expr::{EvalResult, Expression};
use crate::param::Parameter;
use crate::registry::Registry;

use super::{
    parse_params, require_arity_exact, resolve_int64, resolve_string, trace_name,
    validate_int_literal,
};

/// Register every comparison helper under its canonical name.
pub fn register(registry: &mut Registry) -> Result<(), crate::registry::RegistryError> {
    for (name, cmp) in INT_COMPARATORS {
        registry.register(*name, build_int_comparator(name, *cmp))?;
    }
    for (name, cmp) in STRING_COMPARATORS {
        registry.register(*name, build_string_comparator(name, *cmp))?;
    }
    registry.register("starts_with", build_starts_with())?;
    registry.register("contains", build_contains())?;
    Ok(())
}

type IntCmp = fn(i64, i64) -> bool;
type StrCmp = fn(&str, &str) -> bool;

const INT_COMPARATORS: &[(&str, IntCmp)] = &[
    ("int_equal", |a, b| a == b),
    ("int_not_equal", |a, b| a != b),
    ("int_greater", |a, b| a > b),
    ("int_greater_or_equal", |a, b| a >= b),
    ("int_less", |a, b| a < b),
    ("int_less_or_equal", |a, b| a <= b),
];

const STRING_COMPARATORS: &[(&str, StrCmp)] = &[
    ("string_equal", |a, b| a == b),
    ("string_not_equal", |a, b| a != b),
    ("string_greater", |a, b| a.cmp(b) == Ordering::Greater),
    ("string_greater_or_equal", |a, b| a.cmp(b) != Ordering::Less),
    ("string_less", |a, b| a.cmp(b) == Ordering::Less),
    ("string_less_or_equal", |a, b| a.cmp(b) != Ordering::Greater),
];

fn build_int_comparator(name: &'static str, cmp: IntCmp) -> super::Builder {
    Arc::new(move |target, raw| {
        let params = parse_params(name, raw)?;
        require_arity_exact(name, &params, 1)?;
        validate_int_literal(name, &params[0])?;
        let target = target.to_string();
        let operand = params[0].clone();
        let trace = trace_name(name, &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let left = match event.get_int64(&target) {
                    Some(v) => v,
                    None => return EvalResult::failure(event, format!("{name}: target not found")),
                };
                let right = match resolve_int64(&event, &operand) {
                    Ok(v) => v,
                    Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                };
                if cmp(left, right) {
                    EvalResult::success(event, format!("{name}: {left} vs {right} ok"))
                } else {
                    EvalResult::failure(event, format!("{name}: {left} vs {right} failed"))
                }
            }),
        ))
    })
}

fn build_string_comparator(name: &'static str, cmp: StrCmp) -> super::Builder {
    Arc::new(move |target, raw| {
        let params = parse_params(name, raw)?;
        require_arity_exact(name, &params, 1)?;
        let target = target.to_string();
        let operand = params[0].clone();
        let trace = trace_name(name, &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| eval_string_binary(&event, &target, &operand, name, cmp)),
        ))
    })
}

fn build_starts_with() -> super::Builder {
    Arc::new(|target, raw| {
        let params = parse_params("starts_with", raw)?;
        require_arity_exact("starts_with", &params, 1)?;
        let target = target.to_string();
        let operand = params[0].clone();
        let trace = trace_name("starts_with", &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                eval_string_binary(&event, &target, &operand, "starts_with", |l, r| l.starts_with(r))
            }),
        ))
    })
}

fn build_contains() -> super::Builder {
    Arc::new(|target, raw| {
        let params = parse_params("contains", raw)?;
        require_arity_exact("contains", &params, 1)?;
        let target = target.to_string();
        let operand = params[0].clone();
        let trace = trace_name("contains", &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                eval_string_binary(&event, &target, &operand, "contains", |l, r| {
                    !r.is_empty() && l.contains(r)
                })
            }),
        ))
    })
}

fn eval_string_binary(
    event: &Event,
    target: &str,
    operand: &Parameter,
    name: &str,
    cmp: impl Fn(&str, &str) -> bool,
) -> EvalResult {
    let event = event.clone();
    let left = match event.get_string(target) {
        Some(v) => v,
        None => return EvalResult::failure(event, format!("{name}: target not found")),
    };
    let right = match resolve_string(&event, operand) {
        Ok(v) => v,
        Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
    };
    if cmp(&left, &right) {
        EvalResult::success(event, format!("{name}: \"{left}\" vs \"{right}\" ok"))
    } else {
        EvalResult::failure(event, format!("{name}: \"{left}\" vs \"{right}\" failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int_greater_direct_value() {
        let builder = build_int_comparator("int_greater", |a, b| a > b);
        let expr = builder("/f", &["10".to_string()]).unwrap();
        assert!(expr.eval(Event::new(json!({"f": 12}))).ok);
        assert!(!expr.eval(Event::new(json!({"f": 9}))).ok);
    }

    #[test]
    fn int_literal_must_be_base10_at_build_time() {
        let builder = build_int_comparator("int_greater", |a, b| a > b);
        assert!(builder("/f", &["not-a-number".to_string()]).is_err());
    }

    #[test]
    fn string_less_or_equal_by_reference() {
        let builder = build_string_comparator("string_less_or_equal", |a, b| a.cmp(b) != Ordering::Greater);
        let expr = builder("/a/f", &["$b.f".to_string()]).unwrap();
        assert!(expr
            .eval(Event::new(json!({"a": {"f": "value1"}, "b": {"f": "value2"}})))
            .ok);
        assert!(!expr
            .eval(Event::new(json!({"a": {"f": "value2"}, "b": {"f": "value1"}})))
            .ok);
    }

    #[test]
    fn contains_rejects_empty_operand() {
        let builder = build_contains();
        let expr = builder("/f", &["".to_string()]).unwrap();
        assert!(!expr.eval(Event::new(json!({"f": "hello"}))).ok);
    }

    #[test]
    fn missing_target_is_a_distinct_failure() {
        let builder = build_int_comparator("int_equal", |a, b| a == b);
        let expr = builder("/missing", &["1".to_string()]).unwrap();
        let result = expr.eval(Event::new(json!({})));
        assert!(!result.ok);
        assert!(result.trace.contains("target not found"));
    }
}
