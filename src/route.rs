//! The route table (`spec.md` §3, §4.8): `(name, priority, filter,
//! policyExpr)` entries ordered ascending by priority, ties broken by
//! insertion order.

use miette::Diagnostic;
use thiserror::Error;

use crate::expr::Expression;

#[derive(Clone)]
pub struct Route {
    pub name: String,
    pub priority: i64,
    pub filter: Expression,
    pub policy: Expression,
    sequence: u64,
}

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum RouteError {
    #[error("route \"{0}\" already exists")]
    #[diagnostic(code(eventcascade::route::already_exists))]
    AlreadyExists(String),
}

/// Held by the router; mutated only under a writer lock (`spec.md` §3,
/// §5). The lock itself lives one level up, in [`crate::router::Router`] —
/// this type is the plain ordered collection it guards.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    next_sequence: u64,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        name: impl Into<String>,
        priority: i64,
        filter: Expression,
        policy: Expression,
    ) -> Result<(), RouteError> {
        let name = name.into();
        if self.routes.iter().any(|r| r.name == name) {
            return Err(RouteError::AlreadyExists(name));
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.routes.push(Route {
            name,
            priority,
            filter,
            policy,
            sequence,
        });
        self.routes.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.sequence.cmp(&b.sequence)));
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.routes.len();
        self.routes.retain(|r| r.name != name);
        before != self.routes.len()
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }

    /// Routes in dispatch order: ascending priority, ties by insertion
    /// order (`spec.md` §8, invariant 8).
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::EvalResult;
    use std::sync::Arc;

    fn always_ok(name: &str) -> Expression {
        Expression::term(name.to_string(), Arc::new(|e| EvalResult::success(e, "ok")))
    }

    #[test]
    fn lower_priority_sorts_first() {
        let mut table = RouteTable::new();
        table.add("b", 5, always_ok("f"), always_ok("p")).unwrap();
        table.add("a", 1, always_ok("f"), always_ok("p")).unwrap();
        let names: Vec<_> = table.routes().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut table = RouteTable::new();
        table.add("first", 1, always_ok("f"), always_ok("p")).unwrap();
        table.add("second", 1, always_ok("f"), always_ok("p")).unwrap();
        let names: Vec<_> = table.routes().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut table = RouteTable::new();
        table.add("a", 1, always_ok("f"), always_ok("p")).unwrap();
        assert_eq!(
            table.add("a", 2, always_ok("f"), always_ok("p")).unwrap_err(),
            RouteError::AlreadyExists("a".to_string())
        );
    }

    #[test]
    fn remove_and_clear() {
        let mut table = RouteTable::new();
        table.add("a", 1, always_ok("f"), always_ok("p")).unwrap();
        assert!(table.remove("a"));
        assert!(!table.remove("a"));
        table.add("b", 1, always_ok("f"), always_ok("p")).unwrap();
        table.clear();
        assert!(table.routes().is_empty());
    }
}
