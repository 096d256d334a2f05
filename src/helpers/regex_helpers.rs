//! `regex_match` / `regex_not_match` (`spec.md` §4.3, "Regex").

use std::sync::Arc;

use regex::Regex;

use crate::event::{Document, Event};
use crate::expr::{EvalResult, Expression};
use crate::registry::Registry;

use super::{parse_params, require_arity_exact, trace_name, HelperBuildError};

pub fn register(registry: &mut Registry) -> Result<(), crate::registry::RegistryError> {
    registry.register("regex_match", build(true))?;
    registry.register("regex_not_match", build(false))?;
    Ok(())
}

fn build(expect_match: bool) -> super::Builder {
    let name = if expect_match { "regex_match" } else { "regex_not_match" };
    Arc::new(move |target, raw| {
        let params = parse_params(name, raw)?;
        require_arity_exact(name, &params, 1)?;
        let pattern = match &params[0] {
            crate::param::Parameter::Value(v) => v.clone(),
            crate::param::Parameter::Reference { .. } => {
                return Err(HelperBuildError::ParameterType {
                    helper: name.to_string(),
                    index: 0,
                    expected: "a literal VALUE (pattern must be known at build time)",
                })
            }
        };
        let regex = Regex::new(&pattern).map_err(|e| HelperBuildError::InvalidLiteral {
            helper: name.to_string(),
            reason: format!("invalid regex \"{pattern}\": {e}"),
        })?;
        let target = target.to_string();
        let trace = trace_name(name, &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let value = match event.get_string(&target) {
                    Some(v) => v,
                    None => return EvalResult::failure(event, format!("{name}: target not found")),
                };
                let matched = regex.is_match(&value);
                if matched == expect_match {
                    EvalResult::success(event, format!("{name}: \"{value}\" ok"))
                } else {
                    EvalResult::failure(event, format!("{name}: \"{value}\" failed"))
                }
            }),
        ))
    })
}
