//! The expression algebra: a tagged tree of chains, ORs, broadcasts,
//! implications, and leaf terms (`spec.md` §3–§4.1).
//!
//! `Expression` is a single polymorphic node type with six variants
//! instead of a trait-object hierarchy: matching replaces virtual dispatch
//! and keeps traversal auditable. Nodes are reference-counted (`Arc`) so
//! the same filter or helper subgraph can be shared under many parents
//! without cloning (`spec.md` §9, "Shared subgraphs").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::event::Event;

/// Global switch for trace string formatting.
///
/// Traces are opt-in (`spec.md` §4.9): evaluators check this before
/// building trace strings so a production deployment that never reads
/// traces doesn't pay for the allocations. Defaults to enabled, since the
/// engine is usually run with tracing available for diagnostics.
static TRACE_ENABLED: AtomicBool = AtomicBool::new(true);

/// Enable or disable trace string formatting process-wide.
pub fn set_trace_enabled(enabled: bool) {
    TRACE_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Whether trace formatting is currently enabled.
pub fn trace_enabled() -> bool {
    TRACE_ENABLED.load(Ordering::Relaxed)
}

/// A leaf operation: evaluates against an event, returning its own result.
/// May mutate the event in place.
pub type Op = Arc<dyn Fn(Event) -> EvalResult + Send + Sync>;

/// The outcome of evaluating one expression node.
///
/// Both successful and failed results carry the (possibly mutated) event —
/// a failure never discards prior writes (`spec.md` §3, §9).
#[derive(Clone, Debug)]
pub struct EvalResult {
    pub ok: bool,
    pub event: Event,
    pub trace: String,
}

impl EvalResult {
    pub fn success(event: Event, trace: impl Into<String>) -> Self {
        Self {
            ok: true,
            event,
            trace: if trace_enabled() { trace.into() } else { String::new() },
        }
    }

    pub fn failure(event: Event, trace: impl Into<String>) -> Self {
        Self {
            ok: false,
            event,
            trace: if trace_enabled() { trace.into() } else { String::new() },
        }
    }
}

struct TermNode {
    name: String,
    op: Op,
}

struct NodeList {
    name: String,
    children: Vec<Expression>,
}

struct ImplicationNode {
    name: String,
    antecedent: Expression,
    consequent: Expression,
}

/// A node in the composed expression tree.
///
/// Invariants (enforced by construction where practical, documented where
/// not): node names are non-empty; `Implication` always carries exactly
/// two operands (the type itself makes a third impossible); the tree is
/// finite and acyclic because it is built bottom-up from already-built
/// `Expression` values, never mutated after construction.
#[derive(Clone)]
pub enum Expression {
    /// Leaf; invokes `op(event)` and returns its result unchanged.
    Term(Arc<TermNode>),
    /// Evaluates children left-to-right; short-circuits on first failure.
    And(Arc<NodeList>),
    /// Evaluates children left-to-right; short-circuits on first success.
    Or(Arc<NodeList>),
    /// Evaluates all children unconditionally; always succeeds.
    Chain(Arc<NodeList>),
    /// Like `Chain`, but children are logically independent (the reference
    /// evaluator still runs them sequentially; see `spec.md` §9).
    Broadcast(Arc<NodeList>),
    /// Evaluates the antecedent, then (if it succeeded) the consequent;
    /// overall success equals the antecedent's, regardless of consequent.
    Implication(Arc<ImplicationNode>),
}

impl Expression {
    pub fn term(name: impl Into<String>, op: Op) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "expression node name must not be empty");
        Expression::Term(Arc::new(TermNode { name, op }))
    }

    pub fn and(name: impl Into<String>, children: Vec<Expression>) -> Self {
        Expression::And(Arc::new(NodeList::new(name, children)))
    }

    pub fn or(name: impl Into<String>, children: Vec<Expression>) -> Self {
        Expression::Or(Arc::new(NodeList::new(name, children)))
    }

    pub fn chain(name: impl Into<String>, children: Vec<Expression>) -> Self {
        Expression::Chain(Arc::new(NodeList::new(name, children)))
    }

    pub fn broadcast(name: impl Into<String>, children: Vec<Expression>) -> Self {
        Expression::Broadcast(Arc::new(NodeList::new(name, children)))
    }

    pub fn implication(name: impl Into<String>, antecedent: Expression, consequent: Expression) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "expression node name must not be empty");
        Expression::Implication(Arc::new(ImplicationNode {
            name,
            antecedent,
            consequent,
        }))
    }

    /// The node's name, used in trace output and as a debugging handle.
    pub fn name(&self) -> &str {
        match self {
            Expression::Term(t) => &t.name,
            Expression::And(n) | Expression::Or(n) | Expression::Chain(n) | Expression::Broadcast(n) => {
                &n.name
            }
            Expression::Implication(i) => &i.name,
        }
    }

    /// Evaluate this node against `event`, per the semantics in `spec.md` §4.1.
    pub fn eval(&self, event: Event) -> EvalResult {
        match self {
            Expression::Term(t) => (t.op)(event),
            Expression::And(n) => eval_and(n, event),
            Expression::Or(n) => eval_or(n, event),
            Expression::Chain(n) => eval_sequence(n, event),
            Expression::Broadcast(n) => eval_sequence(n, event),
            Expression::Implication(i) => eval_implication(i, event),
        }
    }
}

impl NodeList {
    fn new(name: impl Into<String>, children: Vec<Expression>) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "expression node name must not be empty");
        Self { name, children }
    }
}

fn eval_and(n: &NodeList, event: Event) -> EvalResult {
    if n.children.is_empty() {
        let trace = if trace_enabled() {
            format!("{}: vacuous success (no children)", n.name)
        } else {
            String::new()
        };
        return EvalResult::success(event, trace);
    }
    let mut last = None;
    for child in &n.children {
        let result = child.eval(event.clone());
        if !result.ok {
            return result;
        }
        last = Some(result);
    }
    last.expect("children is non-empty")
}

fn eval_or(n: &NodeList, event: Event) -> EvalResult {
    if n.children.is_empty() {
        let trace = if trace_enabled() {
            format!("{}: vacuous failure (no children)", n.name)
        } else {
            String::new()
        };
        return EvalResult::failure(event, trace);
    }
    let mut last = None;
    for child in &n.children {
        let result = child.eval(event.clone());
        if result.ok {
            return result;
        }
        last = Some(result);
    }
    last.expect("children is non-empty")
}

/// Shared semantics for `Chain` and `Broadcast`: run every child
/// unconditionally and return success with the (possibly mutated) event.
/// Per-child failures are folded into the aggregate trace, never
/// propagated as this node's own failure.
fn eval_sequence(n: &NodeList, event: Event) -> EvalResult {
    if !trace_enabled() {
        for child in &n.children {
            child.eval(event.clone());
        }
        return EvalResult::success(event, "");
    }
    let mut parts = Vec::with_capacity(n.children.len());
    for child in &n.children {
        let result = child.eval(event.clone());
        parts.push(format!(
            "{}[{}]: {}",
            child.name(),
            if result.ok { "ok" } else { "fail" },
            result.trace
        ));
    }
    EvalResult::success(event, format!("{}{{ {} }}", n.name, parts.join("; ")))
}

fn eval_implication(i: &ImplicationNode, event: Event) -> EvalResult {
    let ant = i.antecedent.eval(event);
    if !ant.ok {
        return EvalResult {
            ok: false,
            event: ant.event,
            trace: if trace_enabled() {
                format!("{}: antecedent failed: {}", i.name, ant.trace)
            } else {
                String::new()
            },
        };
    }
    let cons = i.consequent.eval(ant.event);
    EvalResult {
        ok: true,
        event: cons.event,
        trace: if trace_enabled() {
            format!("{}: antecedent ok; consequent: {}", i.name, cons.trace)
        } else {
            String::new()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AOrd};

    fn counting_term(name: &str, ok: bool, counter: Arc<AtomicUsize>) -> Expression {
        Expression::term(
            name.to_string(),
            Arc::new(move |event: Event| {
                counter.fetch_add(1, AOrd::SeqCst);
                if ok {
                    EvalResult::success(event, format!("{name} ok"))
                } else {
                    EvalResult::failure(event, format!("{name} fail"))
                }
            }),
        )
    }

    #[test]
    fn term_preserves_event_identity() {
        let event = Event::new(json!({}));
        let term = Expression::term(
            "noop",
            Arc::new(|e: Event| EvalResult::success(e, "noop")),
        );
        let result = term.eval(event.clone());
        assert!(Event::ptr_eq(&event, &result.event));
    }

    #[test]
    fn or_short_circuits_on_first_success() {
        let counter = Arc::new(AtomicUsize::new(0));
        let expr = Expression::or(
            "root",
            vec![
                counting_term("a", true, counter.clone()),
                counting_term("b", true, counter.clone()),
                counting_term("c", true, counter.clone()),
            ],
        );
        let result = expr.eval(Event::new(json!({})));
        assert!(result.ok);
        assert_eq!(counter.load(AOrd::SeqCst), 1);
    }

    #[test]
    fn and_short_circuits_on_first_failure() {
        let counter = Arc::new(AtomicUsize::new(0));
        let expr = Expression::and(
            "root",
            vec![
                counting_term("a", false, counter.clone()),
                counting_term("b", true, counter.clone()),
            ],
        );
        let result = expr.eval(Event::new(json!({})));
        assert!(!result.ok);
        assert_eq!(counter.load(AOrd::SeqCst), 1);
    }

    #[test]
    fn chain_always_succeeds() {
        let counter = Arc::new(AtomicUsize::new(0));
        let expr = Expression::chain(
            "root",
            vec![
                counting_term("a", false, counter.clone()),
                counting_term("b", false, counter.clone()),
            ],
        );
        let result = expr.eval(Event::new(json!({})));
        assert!(result.ok);
        assert_eq!(counter.load(AOrd::SeqCst), 2);
    }

    #[test]
    fn implication_ok_bit_follows_antecedent_only() {
        let consequent_ran = Arc::new(AtomicUsize::new(0));
        let consequent = counting_term("cons", false, consequent_ran.clone());
        let succeeding = Expression::implication(
            "imp",
            Expression::term("ant", Arc::new(|e| EvalResult::success(e, "ant ok"))),
            consequent.clone(),
        );
        let result = succeeding.eval(Event::new(json!({})));
        assert!(result.ok);
        assert_eq!(consequent_ran.load(AOrd::SeqCst), 1);

        let failing = Expression::implication(
            "imp",
            Expression::term("ant", Arc::new(|e| EvalResult::failure(e, "ant fail"))),
            consequent,
        );
        let result = failing.eval(Event::new(json!({})));
        assert!(!result.ok);
        // Consequent never evaluated when antecedent fails.
        assert_eq!(consequent_ran.load(AOrd::SeqCst), 1);
    }

    #[test]
    fn or_failure_still_carries_mutated_event() {
        let expr = Expression::or(
            "root",
            vec![Expression::term(
                "mutate_then_fail",
                Arc::new(|e: Event| {
                    e.set_bool("/touched", true).unwrap();
                    EvalResult::failure(e, "fail")
                }),
            )],
        );
        let result = expr.eval(Event::new(json!({})));
        assert!(!result.ok);
        assert_eq!(result.event.get_bool("/touched"), Some(true));
    }
}
