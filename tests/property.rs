//! Property tests for invariants that are easier to state over arbitrary
//! input than to enumerate by hand (`spec.md` §8 invariants 7 and 10).

use eventcascade::event::Event;
use eventcascade::expr::EvalResult;
use eventcascade::helpers::compare::register;
use eventcascade::param::parse_one;
use eventcascade::registry::Registry;
use proptest::prelude::*;
use serde_json::json;

fn safe_segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,12}".prop_map(String::from)
}

proptest! {
    /// Invariant 7: `$a.b.c` always resolves to pointer path `/a/b/c`,
    /// for any sequence of alphanumeric segments (no `~`/`/` to escape).
    #[test]
    fn dotted_reference_translates_to_matching_pointer(
        segments in prop::collection::vec(safe_segment(), 1..5)
    ) {
        let token = format!("${}", segments.join("."));
        let parsed = parse_one(&token).unwrap();
        let expected = format!("/{}", segments.join("/"));
        prop_assert_eq!(parsed.pointer_path(), Some(expected.as_str()));
    }

    /// Invariant 10: `string_less`/`string_greater` impose a strict total
    /// order consistent with Rust's own `str` ordering, for any two
    /// strings routed through the compiled helper rather than compared
    /// directly.
    #[test]
    fn string_less_matches_rust_str_ordering(a in "[^$]{0,20}", b in "[^$]{0,20}") {
        let mut registry = Registry::new();
        register(&mut registry).unwrap();
        let builder = registry.lookup("string_less").unwrap();
        let expr = builder("/a", &[b.clone()]).unwrap();

        let event = Event::new(json!({"a": a}));
        let result: EvalResult = expr.eval(event.clone());
        prop_assert_eq!(result.ok, a.as_str() < b.as_str());
        prop_assert!(Event::ptr_eq(&event, &result.event));
    }
}
