//! The helper library: ~60 leaf operations built from `(target, name, args)`
//! triples into [`Expression::Term`] nodes (`spec.md` §4.3).
//!
//! Every helper module in this family shares the same build-time shape:
//! parse raw argument tokens into [`Parameter`]s, check arity and parameter
//! kind, validate any literal operands that must already be well-formed at
//! build time, format a trace name, and close over an evaluation closure.
//! This module holds that shared scaffolding so individual helper files
//! read as a short table of comparators/parsers rather than boilerplate.

pub mod array;
pub mod cidr;
pub mod compare;
pub mod existence;
pub mod hlp;
pub mod kvdb_helpers;
pub mod regex_helpers;
pub mod socket_helpers;
pub mod typetest;

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

use crate::collaborators::{Kvdb, WdbClient};
use crate::event::Event;
use crate::expr::Expression;
use crate::param::{self, ParamError, Parameter};
use crate::registry::{Registry, RegistryError};

/// A registered helper builder: `(targetField, rawParameters) -> Expression`.
pub type Builder = Arc<dyn Fn(&str, &[String]) -> Result<Expression, HelperBuildError> + Send + Sync>;

/// Failures raised while turning a helper definition into an [`Expression`].
///
/// Always a build-time (compile-time) error — once a helper has built
/// successfully its `Term` never fails this way again; evaluate-time
/// problems become [`crate::expr::EvalResult::failure`] traces instead
/// (`spec.md` §7: "never unwind into the evaluator").
#[derive(Debug, Error, Diagnostic)]
pub enum HelperBuildError {
    #[error("malformed definition for helper \"{helper}\": {reason}")]
    #[diagnostic(code(eventcascade::helper::malformed_definition))]
    MalformedDefinition { helper: String, reason: String },
    #[error("helper \"{helper}\" expects {expected} argument(s), got {actual}")]
    #[diagnostic(code(eventcascade::helper::arity))]
    Arity {
        helper: String,
        expected: String,
        actual: usize,
    },
    #[error("helper \"{helper}\" argument {index} must be {expected}")]
    #[diagnostic(code(eventcascade::helper::parameter_type))]
    ParameterType {
        helper: String,
        index: usize,
        expected: &'static str,
    },
    #[error("helper \"{helper}\" could not build: {reason}")]
    #[diagnostic(
        code(eventcascade::helper::invalid_literal),
        help("literal operands must already be well-formed at build time")
    )]
    InvalidLiteral { helper: String, reason: String },
    #[error("helper \"{helper}\" parameter error: {source}")]
    #[diagnostic(code(eventcascade::helper::param))]
    Param {
        helper: String,
        #[source]
        source: ParamError,
    },
}

pub(crate) fn parse_params(helper: &str, raw: &[String]) -> Result<Vec<Parameter>, HelperBuildError> {
    param::parse_all(raw.iter().map(String::as_str)).map_err(|source| HelperBuildError::Param {
        helper: helper.to_string(),
        source,
    })
}

pub(crate) fn require_arity_exact(
    helper: &str,
    params: &[Parameter],
    n: usize,
) -> Result<(), HelperBuildError> {
    if params.len() != n {
        return Err(HelperBuildError::Arity {
            helper: helper.to_string(),
            expected: n.to_string(),
            actual: params.len(),
        });
    }
    Ok(())
}

pub(crate) fn require_arity_min(
    helper: &str,
    params: &[Parameter],
    min: usize,
) -> Result<(), HelperBuildError> {
    if params.len() < min {
        return Err(HelperBuildError::Arity {
            helper: helper.to_string(),
            expected: format!("at least {min}"),
            actual: params.len(),
        });
    }
    Ok(())
}

pub(crate) fn require_arity_range(
    helper: &str,
    params: &[Parameter],
    min: usize,
    max: usize,
) -> Result<(), HelperBuildError> {
    if params.len() < min || params.len() > max {
        return Err(HelperBuildError::Arity {
            helper: helper.to_string(),
            expected: format!("{min}-{max}"),
            actual: params.len(),
        });
    }
    Ok(())
}

/// Format the trace-friendly name described in `spec.md` §4.3 step 4:
/// `helper.<name>[<target>, <arg1>, …]`.
pub(crate) fn trace_name(helper: &str, target: &str, params: &[Parameter]) -> String {
    if params.is_empty() {
        format!("helper.{helper}[{target}]")
    } else {
        let args: Vec<&str> = params.iter().map(Parameter::raw).collect();
        format!("helper.{helper}[{target}, {}]", args.join(", "))
    }
}

/// Resolve a parameter to its string value at evaluation time.
///
/// A `VALUE` resolves to its literal text; a `REFERENCE` is read back out
/// of the event, which is how trace messages distinguish "target not
/// found" from "parameter not found" (`spec.md` §4.3, invariant 6).
pub(crate) fn resolve_string(event: &Event, p: &Parameter) -> Result<String, String> {
    use crate::event::Document;
    match p {
        Parameter::Value(v) => Ok(v.clone()),
        Parameter::Reference { raw, path } => event
            .get_string(path)
            .ok_or_else(|| format!("parameter \"{raw}\" not found")),
    }
}

/// Resolve a parameter to an `i64` at evaluation time. Callers that must
/// reject malformed `VALUE` literals at build time should validate with
/// [`validate_int_literal`] first; this function still re-parses a VALUE
/// defensively since some callers (array helpers) accept non-numeric
/// literals interchangeably with numeric ones.
pub(crate) fn resolve_int64(event: &Event, p: &Parameter) -> Result<i64, String> {
    use crate::event::Document;
    match p {
        Parameter::Value(v) => v
            .parse::<i64>()
            .map_err(|_| format!("value \"{v}\" is not an integer")),
        Parameter::Reference { raw, path } => event
            .get_int64(path)
            .ok_or_else(|| format!("parameter \"{raw}\" not found")),
    }
}

/// Validate that a `VALUE` parameter parses as a base-10 integer at build
/// time (`spec.md` §4.3: "VALUE operands must parse as base-10 int at
/// build time; otherwise BuildError"). References are left unchecked —
/// their type is only known at evaluation time.
pub(crate) fn validate_int_literal(helper: &str, p: &Parameter) -> Result<(), HelperBuildError> {
    if let Parameter::Value(v) = p {
        v.parse::<i64>()
            .map_err(|_| HelperBuildError::InvalidLiteral {
                helper: helper.to_string(),
                reason: format!("argument \"{v}\" is not a base-10 integer"),
            })?;
    }
    Ok(())
}

/// Resolve the current value at `target`, as JSON, returning `None` when
/// absent so callers can distinguish "target not found" from other
/// failure kinds in their trace text.
pub(crate) fn target_exists(event: &Event, target: &str) -> bool {
    use crate::event::Document;
    event.exists(target)
}

/// Register every built-in helper under its canonical name.
///
/// This is the one place that wires the pure helper families together with
/// the two collaborator-backed families (`kvdb_*`, `wdb_update`) — it is
/// meant to run once at startup, after which the registry is shared
/// read-only (`spec.md` §4.4, §5).
pub fn register_builtin_helpers(
    registry: &mut Registry,
    kvdb: Arc<dyn Kvdb>,
    wdb: Arc<dyn WdbClient>,
) -> Result<(), RegistryError> {
    compare::register(registry)?;
    regex_helpers::register(registry)?;
    cidr::register(registry)?;
    existence::register(registry)?;
    array::register(registry)?;
    typetest::register(registry)?;
    hlp::register(registry)?;
    kvdb_helpers::register(registry, kvdb)?;
    socket_helpers::register(registry, wdb)?;
    Ok(())
}
