//! The builder registry: name → helper builder, immutable after startup
//! (`spec.md` §4.4).

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::helpers::Builder;

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum RegistryError {
    #[error("helper \"{0}\" is already registered")]
    #[diagnostic(code(eventcascade::registry::already_registered))]
    AlreadyRegistered(String),
    #[error("helper \"{0}\" is not registered")]
    #[diagnostic(
        code(eventcascade::registry::not_found),
        help("check the asset's helper name against the registered builtin helpers")
    )]
    NotFound(String),
}

/// Name → builder map for helper factories.
///
/// Registration happens once at startup (`spec.md` §4.4, §5: "shared,
/// read-only after startup"); nothing in this type makes that contract
/// impossible to violate, but `HelperRegistry::freeze`-style construction
/// in the compiler wires it up once and shares it read-only from then on.
#[derive(Default)]
pub struct Registry {
    builders: FxHashMap<String, Builder>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            builders: FxHashMap::default(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, builder: Builder) -> Result<(), RegistryError> {
        let name = name.into();
        if self.builders.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.builders.insert(name, builder);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Builder, RegistryError> {
        self.builders
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn clear(&mut self) {
        self.builders.clear();
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::expr::{EvalResult, Expression};
    use serde_json::json;
    use std::sync::Arc;

    fn dummy_builder() -> Builder {
        Arc::new(|target, _raw| {
            let target = target.to_string();
            Ok(Expression::term(
                "dummy",
                Arc::new(move |e| EvalResult::success(e, target.clone())),
            ))
        })
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut r = Registry::new();
        r.register("exists", dummy_builder()).unwrap();
        let err = r.register("exists", dummy_builder()).unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered("exists".to_string()));
    }

    #[test]
    fn lookup_missing_fails() {
        let r = Registry::new();
        let err = r.lookup("nope").unwrap_err();
        assert_eq!(err, RegistryError::NotFound("nope".to_string()));
    }

    #[test]
    fn clear_empties_the_registry() {
        let mut r = Registry::new();
        r.register("exists", dummy_builder()).unwrap();
        r.clear();
        assert!(r.is_empty());
        assert!(r.lookup("exists").is_err());
    }

    #[test]
    fn registered_builder_is_usable() {
        let mut r = Registry::new();
        r.register("exists", dummy_builder()).unwrap();
        let builder = r.lookup("exists").unwrap();
        let expr = builder("/f", &[]).unwrap();
        let result = expr.eval(Event::new(json!({})));
        assert!(result.ok);
    }
}
