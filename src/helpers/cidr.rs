//! `ip_cidr_match` (`spec.md` §4.3, "IPv4 CIDR").

use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::event::{Document, Event};
use crate::expr::{EvalResult, Expression};
use crate::param::Parameter;
use crate::registry::Registry;

use super::{parse_params, require_arity_exact, resolve_string, trace_name, HelperBuildError};

pub fn register(registry: &mut Registry) -> Result<(), crate::registry::RegistryError> {
    registry.register("ip_cidr_match", build())
}

fn build() -> super::Builder {
    Arc::new(|target, raw| {
        let name = "ip_cidr_match";
        let params = parse_params(name, raw)?;
        require_arity_exact(name, &params, 2)?;
        let network = params[0].clone();
        let mask = params[1].clone();
        // Validate literal operands eagerly so a malformed CIDR fails at
        // build time rather than silently on every event.
        if let Parameter::Value(v) = &network {
            parse_ipv4(v).map_err(|e| HelperBuildError::InvalidLiteral {
                helper: name.to_string(),
                reason: e,
            })?;
        }
        if let Parameter::Value(v) = &mask {
            parse_mask(v).map_err(|e| HelperBuildError::InvalidLiteral {
                helper: name.to_string(),
                reason: e,
            })?;
        }
        let target = target.to_string();
        let trace = trace_name(name, &target, &params);
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let ip_text = match event.get_string(&target) {
                    Some(v) => v,
                    None => return EvalResult::failure(event, format!("{name}: target not found")),
                };
                let ip = match parse_ipv4(&ip_text) {
                    Ok(ip) => ip,
                    Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                };
                let network_text = match resolve_string(&event, &network) {
                    Ok(v) => v,
                    Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                };
                let mask_text = match resolve_string(&event, &mask) {
                    Ok(v) => v,
                    Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                };
                let net = match parse_ipv4(&network_text) {
                    Ok(v) => v,
                    Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                };
                let mask_bits = match parse_mask(&mask_text) {
                    Ok(v) => v,
                    Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                };
                let net_lower = u32::from(net) & mask_bits;
                let net_upper = net_lower | !mask_bits;
                let addr = u32::from(ip);
                if net_lower <= addr && addr <= net_upper {
                    EvalResult::success(event, format!("{name}: {ip} in {network_text}/{mask_text}"))
                } else {
                    EvalResult::failure(event, format!("{name}: {ip} not in {network_text}/{mask_text}"))
                }
            }),
        ))
    })
}

fn parse_ipv4(text: &str) -> Result<Ipv4Addr, String> {
    text.parse::<Ipv4Addr>()
        .map_err(|_| format!("\"{text}\" is not a valid IPv4 address"))
}

/// Accept either a prefix length (`24`) or a dotted-quad mask
/// (`255.255.255.0`).
fn parse_mask(text: &str) -> Result<u32, String> {
    if let Ok(prefix) = text.parse::<u32>() {
        if prefix > 32 {
            return Err(format!("mask prefix \"{text}\" exceeds 32 bits"));
        }
        return Ok(if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - prefix)
        });
    }
    parse_ipv4(text).map(u32::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn matches_with_prefix_length_mask() {
        let builder = build();
        let expr = builder(
            "/ip",
            &["192.168.0.0".to_string(), "24".to_string()],
        )
        .unwrap();
        assert!(expr.eval(Event::new(json!({"ip": "192.168.0.42"}))).ok);
        assert!(!expr.eval(Event::new(json!({"ip": "192.168.1.42"}))).ok);
    }

    #[test]
    fn matches_with_dotted_quad_mask() {
        let builder = build();
        let expr = builder(
            "/ip",
            &["10.0.0.0".to_string(), "255.0.0.0".to_string()],
        )
        .unwrap();
        assert!(expr.eval(Event::new(json!({"ip": "10.255.0.1"}))).ok);
        assert!(!expr.eval(Event::new(json!({"ip": "11.0.0.1"}))).ok);
    }

    #[test]
    fn invalid_literal_network_fails_at_build_time() {
        let builder = build();
        assert!(builder("/ip", &["not-an-ip".to_string(), "24".to_string()]).is_err());
    }

    #[test]
    fn malformed_ip_at_eval_time_is_a_failure_not_a_panic() {
        let builder = build();
        let expr = builder("/ip", &["10.0.0.0".to_string(), "8".to_string()]).unwrap();
        let result = expr.eval(Event::new(json!({"ip": "garbage"})));
        assert!(!result.ok);
    }
}
