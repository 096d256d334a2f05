//! Parameter parsing for helper argument lists.
//!
//! Raw argument tokens taken from an asset's YAML body come in two shapes:
//! a literal value, or a `$`-prefixed reference into the event document.
//! This module turns the raw string form into a [`Parameter`], resolving
//! reference tokens to a JSON Pointer path exactly once so helpers never
//! re-parse the dotted form at evaluation time.

use miette::Diagnostic;
use thiserror::Error;

/// One parsed helper argument: either a literal value or a resolved
/// reference into the event document.
///
/// Parameters are immutable once parsed; the pointer path carried by a
/// [`Parameter::Reference`] is computed at parse time, not at evaluation
/// time, so a helper's hot path never re-derives it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Parameter {
    /// A literal token, taken verbatim from the asset source.
    Value(String),
    /// A reference to a location in the event document.
    Reference {
        /// The original `$...` token, kept for trace messages.
        raw: String,
        /// The JSON Pointer path the token resolves to (e.g. `/a/b`).
        path: String,
    },
}

impl Parameter {
    /// The original token as it appeared in the asset source.
    pub fn raw(&self) -> &str {
        match self {
            Parameter::Value(v) => v,
            Parameter::Reference { raw, .. } => raw,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Parameter::Reference { .. })
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Parameter::Value(_))
    }

    /// The resolved pointer path, if this parameter is a reference.
    pub fn pointer_path(&self) -> Option<&str> {
        match self {
            Parameter::Reference { path, .. } => Some(path),
            Parameter::Value(_) => None,
        }
    }
}

/// Errors raised while translating a raw token into a [`Parameter`].
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum ParamError {
    #[error("invalid reference \"{0}\": remainder is empty")]
    #[diagnostic(code(eventcascade::param::empty_reference))]
    EmptyReference(String),
    #[error("invalid reference \"{0}\": contains a forbidden character")]
    #[diagnostic(code(eventcascade::param::forbidden_character))]
    ForbiddenCharacter(String),
}

/// Parse one raw argument token.
///
/// A token starting with `$` is a REFERENCE; everything else is a VALUE.
/// No quoting/unquoting happens here — that belongs to the asset's YAML
/// parser, which has already stripped quotes by the time helpers see the
/// token.
pub fn parse_one(token: &str) -> Result<Parameter, ParamError> {
    match token.strip_prefix('$') {
        Some(rest) => {
            let path = translate_reference(token, rest)?;
            Ok(Parameter::Reference {
                raw: token.to_string(),
                path,
            })
        }
        None => Ok(Parameter::Value(token.to_string())),
    }
}

/// Parse a whole argument list in document order.
pub fn parse_all<'a, I>(tokens: I) -> Result<Vec<Parameter>, ParamError>
where
    I: IntoIterator<Item = &'a str>,
{
    tokens.into_iter().map(parse_one).collect()
}

/// Translate `a.b.c` into the JSON Pointer path `/a/b/c`, escaping `~` and
/// `/` within each dotted segment per RFC 6901.
fn translate_reference(original: &str, remainder: &str) -> Result<String, ParamError> {
    if remainder.is_empty() {
        return Err(ParamError::EmptyReference(original.to_string()));
    }
    let mut path = String::with_capacity(remainder.len() + 1);
    for segment in remainder.split('.') {
        if segment.is_empty() {
            return Err(ParamError::ForbiddenCharacter(original.to_string()));
        }
        path.push('/');
        for ch in segment.chars() {
            match ch {
                '~' => path.push_str("~0"),
                '/' => path.push_str("~1"),
                c if c.is_control() => {
                    return Err(ParamError::ForbiddenCharacter(original.to_string()))
                }
                c => path.push(c),
            }
        }
    }
    Ok(path)
}
