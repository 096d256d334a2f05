//! The HLP (high-level parser) helper family (`spec.md` §4.3, "HLP
//! parsers"): each reads an input value, attempts a typed parse, and on
//! success writes the parsed value into `targetField`; on failure the
//! event is left untouched.

use std::net::IpAddr;
use std::sync::Arc;

use base64::Engine;
use serde_json::{json, Map, Value};

use crate::event::{Document, Event};
use crate::expr::{EvalResult, Expression};
use crate::param::Parameter;
use crate::registry::Registry;

use super::{
    parse_params, require_arity_exact, require_arity_min, require_arity_range, resolve_string,
    trace_name, HelperBuildError,
};

pub fn register(registry: &mut Registry) -> Result<(), crate::registry::RegistryError> {
    registry.register("parse_bool", build_parse_bool())?;
    registry.register("parse_byte", build_parse_byte())?;
    registry.register("parse_long", build_parse_long())?;
    registry.register("parse_float", build_parse_float())?;
    registry.register("parse_binary", build_parse_binary())?;
    registry.register("parse_date", build_parse_date())?;
    registry.register("parse_ip", build_parse_ip())?;
    registry.register("parse_uri", build_parse_uri())?;
    registry.register("parse_useragent", build_parse_useragent())?;
    registry.register("parse_fqdn", build_parse_fqdn())?;
    registry.register("parse_file", build_parse_file())?;
    registry.register("parse_json", build_parse_json())?;
    registry.register("parse_xml", build_parse_xml())?;
    registry.register("parse_csv", build_parse_csv())?;
    registry.register("parse_key_value", build_parse_key_value())?;
    registry.register("parse_quoted", build_parse_quoted())?;
    registry.register("parse_between", build_parse_between())?;
    Ok(())
}

fn write_parsed(event: Event, target: &str, value: Value, name: &str) -> EvalResult {
    match event.set_object(target, value) {
        Ok(()) => EvalResult::success(event, format!("{name}: ok")),
        Err(e) => EvalResult::failure(event, format!("{name}: could not write target: {e}")),
    }
}

fn input_text(event: &Event, input: &Parameter, name: &str) -> Result<String, EvalResult> {
    resolve_string(event, input).map_err(|reason| {
        EvalResult::failure(event.clone(), format!("{name}: {reason}"))
    })
}

/// Shared scaffolding for the single-argument `(input only)` parsers.
fn build_unary(name: &'static str, parse: impl Fn(&str) -> Result<Value, String> + Send + Sync + 'static) -> super::Builder {
    Arc::new(move |target, raw| {
        let params = parse_params(name, raw)?;
        require_arity_exact(name, &params, 1)?;
        let target = target.to_string();
        let input = params[0].clone();
        let trace = trace_name(name, &target, &params);
        let parse = Arc::new(parse);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let text = match input_text(&event, &input, name) {
                    Ok(t) => t,
                    Err(failure) => return failure,
                };
                match parse(&text) {
                    Ok(value) => write_parsed(event, &target, value, name),
                    Err(reason) => EvalResult::failure(event, format!("{name}: {reason}")),
                }
            }),
        ))
    })
}

fn build_parse_bool() -> super::Builder {
    build_unary("parse_bool", |text| match text.to_ascii_lowercase().as_str() {
        "true" => Ok(json!(true)),
        "false" => Ok(json!(false)),
        _ => Err(format!("\"{text}\" is not a boolean")),
    })
}

fn build_parse_byte() -> super::Builder {
    build_unary("parse_byte", |text| {
        text.trim()
            .parse::<u8>()
            .map(|b| json!(b))
            .map_err(|_| format!("\"{text}\" is not a byte (0-255)"))
    })
}

fn build_parse_long() -> super::Builder {
    build_unary("parse_long", |text| {
        text.trim()
            .parse::<i64>()
            .map(|v| json!(v))
            .map_err(|_| format!("\"{text}\" is not a 64-bit integer"))
    })
}

fn build_parse_float() -> super::Builder {
    build_unary("parse_float", |text| {
        text.trim()
            .parse::<f64>()
            .map(|v| json!(v))
            .map_err(|_| format!("\"{text}\" is not a float"))
    })
}

fn build_parse_binary() -> super::Builder {
    build_unary("parse_binary", |text| {
        base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .map(|bytes| Value::Array(bytes.into_iter().map(|b| json!(b)).collect()))
            .map_err(|e| format!("\"{text}\" is not valid base64: {e}"))
    })
}

fn build_parse_ip() -> super::Builder {
    build_unary("parse_ip", |text| {
        text.trim()
            .parse::<IpAddr>()
            .map(|ip| json!(ip.to_string()))
            .map_err(|_| format!("\"{text}\" is not a valid IP address"))
    })
}

fn build_parse_uri() -> super::Builder {
    build_unary("parse_uri", |text| {
        url::Url::parse(text.trim())
            .map(|u| {
                json!({
                    "raw": u.as_str(),
                    "scheme": u.scheme(),
                    "host": u.host_str(),
                    "path": u.path(),
                    "query": u.query(),
                })
            })
            .map_err(|e| format!("\"{text}\" is not a valid URI: {e}"))
    })
}

fn build_parse_fqdn() -> super::Builder {
    build_unary("parse_fqdn", |text| {
        let text = text.trim();
        if is_valid_fqdn(text) {
            Ok(json!(text.to_ascii_lowercase()))
        } else {
            Err(format!("\"{text}\" is not a valid FQDN"))
        }
    })
}

fn is_valid_fqdn(text: &str) -> bool {
    if text.is_empty() || text.len() > 253 {
        return false;
    }
    text.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

fn build_parse_file() -> super::Builder {
    build_unary("parse_file", |text| {
        let path = std::path::Path::new(text);
        Ok(json!({
            "path": text,
            "directory": path.parent().and_then(|p| p.to_str()).unwrap_or(""),
            "name": path.file_stem().and_then(|s| s.to_str()).unwrap_or(""),
            "extension": path.extension().and_then(|s| s.to_str()).unwrap_or(""),
        }))
    })
}

fn build_parse_json() -> super::Builder {
    build_unary("parse_json", |text| {
        serde_json::from_str::<Value>(text).map_err(|e| format!("\"{text}\" is not valid JSON: {e}"))
    })
}

/// Heuristic user-agent parse: no dedicated UA database is in scope, so
/// this extracts the leading `product/version` token and any parenthesized
/// comment, which covers the common `Mozilla/5.0 (...) Product/Version`
/// shape well enough for routing decisions.
fn build_parse_useragent() -> super::Builder {
    build_unary("parse_useragent", |text| {
        if text.trim().is_empty() {
            return Err("empty user-agent string".to_string());
        }
        let comment = text
            .find('(')
            .and_then(|start| text[start..].find(')').map(|end| &text[start + 1..start + end]));
        let product = text.split_whitespace().next().unwrap_or(text);
        Ok(json!({
            "raw": text,
            "product": product,
            "comment": comment,
        }))
    })
}

fn build_parse_date() -> super::Builder {
    let name = "parse_date";
    Arc::new(move |target, raw| {
        let params = parse_params(name, raw)?;
        require_arity_range(name, &params, 2, 3)?;
        if params.len() == 3 {
            return Err(HelperBuildError::MalformedDefinition {
                helper: name.to_string(),
                reason: "a third (locale) argument is not yet supported; call with input and \
                         format only"
                    .to_string(),
            });
        }
        let target = target.to_string();
        let input = params[0].clone();
        let format = params[1].clone();
        let trace = trace_name(name, &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let text = match input_text(&event, &input, name) {
                    Ok(t) => t,
                    Err(failure) => return failure,
                };
                let format_text = match resolve_string(&event, &format) {
                    Ok(v) => v,
                    Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                };
                match chrono::NaiveDateTime::parse_from_str(&text, &format_text)
                    .or_else(|_| {
                        chrono::NaiveDate::parse_from_str(&text, &format_text)
                            .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is valid"))
                    }) {
                    Ok(parsed) => write_parsed(
                        event,
                        &target,
                        json!(parsed.and_utc().to_rfc3339()),
                        name,
                    ),
                    Err(e) => EvalResult::failure(event, format!("{name}: \"{text}\" does not match \"{format_text}\": {e}")),
                }
            }),
        ))
    })
}

fn build_parse_xml() -> super::Builder {
    let name = "parse_xml";
    Arc::new(move |target, raw| {
        let params = parse_params(name, raw)?;
        require_arity_range(name, &params, 1, 2)?;
        let target = target.to_string();
        let input = params[0].clone();
        let trace = trace_name(name, &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let text = match input_text(&event, &input, name) {
                    Ok(t) => t,
                    Err(failure) => return failure,
                };
                match roxmltree::Document::parse(&text) {
                    Ok(doc) => {
                        let root = doc.root_element();
                        let mut attrs = Map::new();
                        for attr in root.attributes() {
                            attrs.insert(attr.name().to_string(), json!(attr.value()));
                        }
                        let value = json!({
                            "tag": root.tag_name().name(),
                            "text": root.text(),
                            "attributes": Value::Object(attrs),
                        });
                        write_parsed(event, &target, value, name)
                    }
                    Err(e) => EvalResult::failure(event, format!("{name}: \"{text}\" is not valid XML: {e}")),
                }
            }),
        ))
    })
}

fn build_parse_csv() -> super::Builder {
    let name = "parse_csv";
    Arc::new(move |target, raw| {
        let params = parse_params(name, raw)?;
        require_arity_min(name, &params, 3)?;
        let target = target.to_string();
        let input = params[0].clone();
        let columns = params[1..].to_vec();
        let trace = trace_name(name, &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let text = match input_text(&event, &input, name) {
                    Ok(t) => t,
                    Err(failure) => return failure,
                };
                let fields: Vec<&str> = text.split(',').map(str::trim).collect();
                let mut object = Map::new();
                for (i, column) in columns.iter().enumerate() {
                    let column_name = match resolve_string(&event, column) {
                        Ok(v) => v,
                        Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                    };
                    let value = fields.get(i).map(|f| json!(*f)).unwrap_or(Value::Null);
                    object.insert(column_name, value);
                }
                write_parsed(event, &target, Value::Object(object), name)
            }),
        ))
    })
}

fn build_parse_key_value() -> super::Builder {
    let name = "parse_key_value";
    Arc::new(move |target, raw| {
        let params = parse_params(name, raw)?;
        require_arity_exact(name, &params, 5)?;
        let target = target.to_string();
        let input = params[0].clone();
        let pair_sep = params[1].clone();
        let kv_sep = params[2].clone();
        let quote = params[3].clone();
        let escape = params[4].clone();
        let trace = trace_name(name, &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let text = match input_text(&event, &input, name) {
                    Ok(t) => t,
                    Err(failure) => return failure,
                };
                let (pair_sep, kv_sep, quote, escape) = match (
                    resolve_string(&event, &pair_sep),
                    resolve_string(&event, &kv_sep),
                    resolve_string(&event, &quote),
                    resolve_string(&event, &escape),
                ) {
                    (Ok(a), Ok(b), Ok(c), Ok(d)) => (a, b, c, d),
                    _ => return EvalResult::failure(event, format!("{name}: delimiter parameters not found")),
                };
                if pair_sep.is_empty() || kv_sep.is_empty() {
                    return EvalResult::failure(event, format!("{name}: separators must not be empty"));
                }
                let quote_ch = quote.chars().next();
                let escape_ch = escape.chars().next();
                let mut object = Map::new();
                for pair in text.split(pair_sep.as_str()) {
                    let Some((key, value)) = pair.split_once(kv_sep.as_str()) else {
                        continue;
                    };
                    let value = strip_quotes(value.trim(), quote_ch, escape_ch);
                    object.insert(key.trim().to_string(), json!(value));
                }
                write_parsed(event, &target, Value::Object(object), name)
            }),
        ))
    })
}

fn build_parse_quoted() -> super::Builder {
    let name = "parse_quoted";
    Arc::new(move |target, raw| {
        let params = parse_params(name, raw)?;
        require_arity_range(name, &params, 1, 3)?;
        let target = target.to_string();
        let input = params[0].clone();
        let quote_param = params.get(1).cloned();
        let escape_param = params.get(2).cloned();
        let trace = trace_name(name, &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let text = match input_text(&event, &input, name) {
                    Ok(t) => t,
                    Err(failure) => return failure,
                };
                let quote_ch = match &quote_param {
                    Some(p) => match resolve_string(&event, p) {
                        Ok(v) => v.chars().next().unwrap_or('"'),
                        Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                    },
                    None => '"',
                };
                let escape_ch = match &escape_param {
                    Some(p) => match resolve_string(&event, p) {
                        Ok(v) => v.chars().next(),
                        Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                    },
                    None => None,
                };
                let trimmed = text.trim();
                let Some(inner) = trimmed
                    .strip_prefix(quote_ch)
                    .and_then(|s| s.strip_suffix(quote_ch))
                else {
                    return EvalResult::failure(event, format!("{name}: \"{text}\" is not quoted with '{quote_ch}'"));
                };
                let unescaped = strip_quotes(inner, None, escape_ch);
                write_parsed(event, &target, json!(unescaped), name)
            }),
        ))
    })
}

fn build_parse_between() -> super::Builder {
    let name = "parse_between";
    Arc::new(move |target, raw| {
        let params = parse_params(name, raw)?;
        require_arity_exact(name, &params, 3)?;
        let target = target.to_string();
        let input = params[0].clone();
        let start_param = params[1].clone();
        let end_param = params[2].clone();
        let trace = trace_name(name, &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let text = match input_text(&event, &input, name) {
                    Ok(t) => t,
                    Err(failure) => return failure,
                };
                let (start, end) = match (resolve_string(&event, &start_param), resolve_string(&event, &end_param)) {
                    (Ok(a), Ok(b)) => (a, b),
                    _ => return EvalResult::failure(event, format!("{name}: markers not found")),
                };
                let Some(start_idx) = text.find(start.as_str()) else {
                    return EvalResult::failure(event, format!("{name}: start marker \"{start}\" not found"));
                };
                let after_start = start_idx + start.len();
                let Some(end_offset) = text[after_start..].find(end.as_str()) else {
                    return EvalResult::failure(event, format!("{name}: end marker \"{end}\" not found"));
                };
                let extracted = &text[after_start..after_start + end_offset];
                write_parsed(event, &target, json!(extracted), name)
            }),
        ))
    })
}

/// Strip an optional quote character (if present on both ends) and resolve
/// an optional escape character within the remainder. With no escape
/// character, the sequence is returned verbatim (`spec.md` §9: a missing
/// escape char means no escaping is recognized).
fn strip_quotes(text: &str, quote_ch: Option<char>, escape_ch: Option<char>) -> String {
    let text = match quote_ch {
        Some(q) => text
            .strip_prefix(q)
            .and_then(|s| s.strip_suffix(q))
            .unwrap_or(text),
        None => text,
    };
    match escape_ch {
        None => text.to_string(),
        Some(esc) => {
            let mut out = String::with_capacity(text.len());
            let mut chars = text.chars().peekable();
            while let Some(c) = chars.next() {
                if c == esc {
                    if let Some(next) = chars.next() {
                        out.push(next);
                        continue;
                    }
                }
                out.push(c);
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_long_handles_i64_min() {
        let builder = build_parse_long();
        let expr = builder("/field", &["-9223372036854775808".to_string()]).unwrap();
        let result = expr.eval(Event::new(json!({"field": "test"})));
        assert!(result.ok);
        assert_eq!(result.event.get_int64("/field"), Some(i64::MIN));
    }

    #[test]
    fn parse_bool_accepts_case_insensitive_literal() {
        let builder = build_parse_bool();
        let expr = builder("/f", &["$raw".to_string()]).unwrap();
        let result = expr.eval(Event::new(json!({"raw": "TRUE"})));
        assert!(result.ok);
        assert_eq!(result.event.get_bool("/f"), Some(true));
    }

    #[test]
    fn parse_json_round_trips_structured_values() {
        let builder = build_parse_json();
        let expr = builder("/f", &[r#"{"a":1}"#.to_string()]).unwrap();
        let result = expr.eval(Event::new(json!({})));
        assert!(result.ok);
        assert_eq!(result.event.get_object("/f").unwrap().get("a"), Some(&json!(1)));
    }

    #[test]
    fn parse_between_extracts_the_inner_span() {
        let builder = build_parse_between();
        let expr = builder("/f", &["[id]".to_string(), "[".to_string(), "]".to_string()]).unwrap();
        let result = expr.eval(Event::new(json!({})));
        assert!(result.ok);
        assert_eq!(result.event.get_string("/f"), Some("id".to_string()));
    }

    #[test]
    fn parse_quoted_without_escape_char_leaves_escapes_verbatim() {
        let builder = build_parse_quoted();
        let expr = builder("/f", &[r#""a\"b""#.to_string()]).unwrap();
        let result = expr.eval(Event::new(json!({})));
        assert!(result.ok);
        assert_eq!(result.event.get_string("/f"), Some(r#"a\"b"#.to_string()));
    }

    #[test]
    fn parse_quoted_with_escape_char_unescapes() {
        let builder = build_parse_quoted();
        let expr = builder(
            "/f",
            &[r#""a\"b""#.to_string(), "\"".to_string(), "\\".to_string()],
        )
        .unwrap();
        let result = expr.eval(Event::new(json!({})));
        assert!(result.ok);
        assert_eq!(result.event.get_string("/f"), Some("a\"b".to_string()));
    }

    #[test]
    fn parse_csv_maps_fields_to_named_columns() {
        let builder = build_parse_csv();
        let expr = builder(
            "/f",
            &["1,two,3".to_string(), "a".to_string(), "b".to_string(), "c".to_string()],
        )
        .unwrap();
        let result = expr.eval(Event::new(json!({})));
        assert!(result.ok);
        let obj = result.event.get_object("/f").unwrap();
        assert_eq!(obj.get("b"), Some(&json!("two")));
    }

    #[test]
    fn parse_fqdn_rejects_invalid_labels() {
        let builder = build_parse_fqdn();
        let expr = builder("/f", &["-bad.example.com".to_string()]).unwrap();
        assert!(!expr.eval(Event::new(json!({}))).ok);
    }

    #[test]
    fn parse_date_accepts_input_and_format() {
        let builder = build_parse_date();
        let expr = builder(
            "/f",
            &["2024-01-05".to_string(), "%Y-%m-%d".to_string()],
        )
        .unwrap();
        let result = expr.eval(Event::new(json!({})));
        assert!(result.ok);
        assert!(result.event.get_string("/f").unwrap().starts_with("2024-01-05"));
    }

    #[test]
    fn parse_date_rejects_a_locale_argument() {
        let builder = build_parse_date();
        let err = builder(
            "/f",
            &["2024-01-05".to_string(), "%Y-%m-%d".to_string(), "fr_FR".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, HelperBuildError::MalformedDefinition { .. }));
    }
}
