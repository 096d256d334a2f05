//! `exists` / `not_exists` (`spec.md` §4.3, "Existence").

use std::sync::Arc;

use crate::event::{Document, Event};
use crate::expr::{EvalResult, Expression};
use crate::registry::Registry;

use super::{parse_params, require_arity_exact, trace_name};

pub fn register(registry: &mut Registry) -> Result<(), crate::registry::RegistryError> {
    registry.register("exists", build(true))?;
    registry.register("not_exists", build(false))?;
    Ok(())
}

fn build(expect_present: bool) -> super::Builder {
    let name = if expect_present { "exists" } else { "not_exists" };
    Arc::new(move |target, raw| {
        let params = parse_params(name, raw)?;
        require_arity_exact(name, &params, 0)?;
        let target = target.to_string();
        let trace = trace_name(name, &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let present = event.exists(&target);
                if present == expect_present {
                    EvalResult::success(event, format!("{name}: {target} ok"))
                } else {
                    EvalResult::failure(event, format!("{name}: {target} failed"))
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
    fn exists_checks_presence() {
        let builder = build(true);
        let expr = builder("/f", &[]).unwrap();
        assert!(expr.eval(Event::new(json!({"f": 1}))).ok);
        assert!(!expr.eval(Event::new(json!({}))).ok);
    }

    #[test]
    fn not_exists_is_the_negation() {
        let builder = build(false);
        let expr = builder("/f", &[]).unwrap();
        assert!(!expr.eval(Event::new(json!({"f": 1}))).ok);
        assert!(expr.eval(Event::new(json!({}))).ok);
    }

    #[test]
    fn rejects_any_arguments() {
        let builder = build(true);
        assert!(builder("/f", &["oops".to_string()]).is_err());
    }
}
