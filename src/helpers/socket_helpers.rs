//! `wdb_update` (`spec.md` §4.3, "External socket call").

use std::sync::Arc;

use crate::collaborators::WdbClient;
use crate::event::{Document, Event};
use crate::expr::{EvalResult, Expression};
use crate::registry::Registry;

use super::{parse_params, require_arity_exact, resolve_string, trace_name};

pub fn register(registry: &mut Registry, wdb: Arc<dyn WdbClient>) -> Result<(), crate::registry::RegistryError> {
    registry.register("wdb_update", build(wdb))
}

fn build(wdb: Arc<dyn WdbClient>) -> super::Builder {
    Arc::new(move |target, raw| {
        let name = "wdb_update";
        let params = parse_params(name, raw)?;
        require_arity_exact(name, &params, 1)?;
        let target = target.to_string();
        let request_param = params[0].clone();
        let trace = trace_name(name, &target, &params);
        let wdb = wdb.clone();
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let request = match resolve_string(&event, &request_param) {
                    Ok(v) => v,
                    Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                };
                match wdb.query(&request) {
                    Ok(reply) => {
                        let verdict = reply_is_ok(&reply);
                        if let Err(e) = event.set_bool(&target, verdict) {
                            return EvalResult::failure(event, format!("{name}: {e}"));
                        }
                        // A Term always succeeds regardless of the verdict
                        // written — only the I/O itself can fail it.
                        EvalResult::success(event, format!("{name}: reply \"{reply}\" -> {verdict}"))
                    }
                    Err(e) => EvalResult::failure(event, format!("{name}: {e}")),
                }
            }),
        ))
    })
}

/// `true` iff `reply` begins with `"ok"`, optionally followed by
/// whitespace and a payload (`spec.md` §8 scenario 5: `"ok "` still
/// counts).
fn reply_is_ok(reply: &str) -> bool {
    reply == "ok" || reply.starts_with("ok ") || reply.starts_with("ok\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::WdbError;
    use serde_json::json;
    use std::sync::Mutex;

    struct StubWdb {
        reply: Mutex<Result<String, String>>,
    }

    impl WdbClient for StubWdb {
        fn query(&self, _request: &str) -> Result<String, WdbError> {
            match &*self.reply.lock().unwrap() {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(WdbError::Io("stub failure".to_string())),
            }
        }
    }

    fn stub(reply: &str) -> Arc<StubWdb> {
        Arc::new(StubWdb {
            reply: Mutex::new(Ok(reply.to_string())),
        })
    }

    #[test]
    fn ok_reply_writes_true() {
        let builder = build(stub("ok 200"));
        let expr = builder("/wdb/result", &["$wdb.query_parameters".to_string()]).unwrap();
        let result = expr.eval(Event::new(json!({"wdb": {"query_parameters": "q"}})));
        assert!(result.ok);
        assert_eq!(result.event.get_bool("/wdb/result"), Some(true));
    }

    #[test]
    fn non_ok_reply_writes_false_but_term_still_succeeds() {
        let builder = build(stub("NotOk"));
        let expr = builder("/wdb/result", &["$wdb.query_parameters".to_string()]).unwrap();
        let result = expr.eval(Event::new(json!({"wdb": {"query_parameters": "q"}})));
        assert!(result.ok);
        assert_eq!(result.event.get_bool("/wdb/result"), Some(false));
    }

    #[test]
    fn ok_with_trailing_space_counts_as_ok() {
        let builder = build(stub("ok "));
        let expr = builder("/wdb/result", &["$wdb.query_parameters".to_string()]).unwrap();
        let result = expr.eval(Event::new(json!({"wdb": {"query_parameters": "q"}})));
        assert_eq!(result.event.get_bool("/wdb/result"), Some(true));
    }

    #[test]
    fn io_failure_surfaces_as_failure() {
        let wdb = Arc::new(StubWdb {
            reply: Mutex::new(Err("boom".to_string())),
        });
        let builder = build(wdb);
        let expr = builder("/wdb/result", &["$wdb.query_parameters".to_string()]).unwrap();
        let result = expr.eval(Event::new(json!({"wdb": {"query_parameters": "q"}})));
        assert!(!result.ok);
    }
}
