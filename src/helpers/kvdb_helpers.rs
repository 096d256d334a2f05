//! `kvdb_get`, `kvdb_match`, `kvdb_delete` (`spec.md` §4.3, "KVDB").
//!
//! Unlike the pure helpers, these close over a shared [`Kvdb`] collaborator
//! handed to [`register`] at startup, so registration for this family is
//! parameterized rather than a bare name table.

use std::sync::Arc;

use crate::collaborators::Kvdb;
use crate::event::{Document, Event};
use crate::expr::{EvalResult, Expression};
use crate::registry::Registry;

use super::{parse_params, require_arity_exact, resolve_string, trace_name};

pub fn register(registry: &mut Registry, kvdb: Arc<dyn Kvdb>) -> Result<(), crate::registry::RegistryError> {
    registry.register("kvdb_get", build_get(kvdb.clone()))?;
    registry.register("kvdb_match", build_match(kvdb.clone()))?;
    registry.register("kvdb_delete", build_delete(kvdb))?;
    Ok(())
}

fn build_get(kvdb: Arc<dyn Kvdb>) -> super::Builder {
    Arc::new(move |target, raw| {
        let name = "kvdb_get";
        let params = parse_params(name, raw)?;
        require_arity_exact(name, &params, 1)?;
        let target = target.to_string();
        let db_param = params[0].clone();
        let trace = trace_name(name, &target, &params);
        let kvdb = kvdb.clone();
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let db_name = match resolve_string(&event, &db_param) {
                    Ok(v) => v,
                    Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                };
                let key = match event.get_string(&target) {
                    Some(v) => v,
                    None => return EvalResult::failure(event, format!("{name}: target not found")),
                };
                let handle = match kvdb.open(&db_name, false) {
                    Ok(h) => h,
                    Err(e) => return EvalResult::failure(event, format!("{name}: {e}")),
                };
                match kvdb.get(&handle, &key) {
                    Ok(Some(value)) => {
                        if let Err(e) = event.set_object(&target, value) {
                            return EvalResult::failure(event, format!("{name}: {e}"));
                        }
                        EvalResult::success(event, format!("{name}: {db_name}/{key} ok"))
                    }
                    Ok(None) => EvalResult::failure(event, format!("{name}: key \"{key}\" not found")),
                    Err(e) => EvalResult::failure(event, format!("{name}: {e}")),
                }
            }),
        ))
    })
}

fn build_match(kvdb: Arc<dyn Kvdb>) -> super::Builder {
    Arc::new(move |target, raw| {
        let name = "kvdb_match";
        let params = parse_params(name, raw)?;
        require_arity_exact(name, &params, 1)?;
        let target = target.to_string();
        let db_param = params[0].clone();
        let trace = trace_name(name, &target, &params);
        let kvdb = kvdb.clone();
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let db_name = match resolve_string(&event, &db_param) {
                    Ok(v) => v,
                    Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                };
                let key = match event.get_string(&target) {
                    Some(v) => v,
                    None => return EvalResult::failure(event, format!("{name}: target not found")),
                };
                let handle = match kvdb.open(&db_name, false) {
                    Ok(h) => h,
                    Err(e) => return EvalResult::failure(event, format!("{name}: {e}")),
                };
                match kvdb.exists(&handle, &key) {
                    Ok(true) => EvalResult::success(event, format!("{name}: {db_name}/{key} present")),
                    Ok(false) => EvalResult::failure(event, format!("{name}: {db_name}/{key} absent")),
                    Err(e) => EvalResult::failure(event, format!("{name}: {e}")),
                }
            }),
        ))
    })
}

fn build_delete(kvdb: Arc<dyn Kvdb>) -> super::Builder {
    Arc::new(move |target, raw| {
        let name = "kvdb_delete";
        let params = parse_params(name, raw)?;
        require_arity_exact(name, &params, 1)?;
        let target = target.to_string();
        let db_param = params[0].clone();
        let trace = trace_name(name, &target, &params);
        let kvdb = kvdb.clone();
        Ok(Expression::term(
            trace,
            Arc::new(move |event: Event| {
                let db_name = match resolve_string(&event, &db_param) {
                    Ok(v) => v,
                    Err(reason) => return EvalResult::failure(event, format!("{name}: {reason}")),
                };
                let key = match event.get_string(&target) {
                    Some(v) => v,
                    None => return EvalResult::failure(event, format!("{name}: target not found")),
                };
                let handle = match kvdb.open(&db_name, false) {
                    Ok(h) => h,
                    Err(e) => return EvalResult::failure(event, format!("{name}: {e}")),
                };
                match kvdb.delete(&handle, &key) {
                    Ok(()) => EvalResult::success(event, format!("{name}: {db_name}/{key} deleted")),
                    Err(e) => EvalResult::failure(event, format!("{name}: {e}")),
                }
            }),
        ))
    })
}
