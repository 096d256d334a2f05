//! Renders a successful and a failing route trace, then renders a
//! compiler error's `source()` chain through the same formatter.
//!
//! ```bash
//! cargo run --example telemetry_and_errors
//! ```

use std::sync::Arc;

use eventcascade::asset::{AssetDef, AssetKind, HelperInvocation};
use eventcascade::event::Event;
use eventcascade::expr::EvalResult;
use eventcascade::helpers::register_builtin_helpers;
use eventcascade::policy::{compose, PolicyDef};
use eventcascade::registry::Registry;
use eventcascade::telemetry::{PlainFormatter, TelemetryFormatter};
use eventcascade::collaborators::kvdb::MemoryKvdb;
use eventcascade::collaborators::wdb::UnixSocketWdbClient;
use miette::Result;
use serde_json::json;

fn main() -> Result<()> {
    let formatter = PlainFormatter;

    let ok = EvalResult::success(Event::new(json!({})), "helper.string_equal[/level, high]: ok");
    let fail = EvalResult::failure(Event::new(json!({})), "helper.string_equal[/level, high]: mismatch");

    print!("{}", formatter.render_result("demo-route", &ok).join_lines());
    print!("{}", formatter.render_result("demo-route", &fail).join_lines());

    // Now render a genuine compile-time error: a rule whose stage invokes
    // a helper that was never registered.
    let mut registry = Registry::new();
    register_builtin_helpers(
        &mut registry,
        Arc::new(MemoryKvdb::new()),
        Arc::new(UnixSocketWdbClient::new("/var/run/eventcascade/wdb.sock")),
    )
    .expect("built-in helper registration never collides on a fresh registry");

    let mut policy = PolicyDef::new("demo");
    let mut rule = AssetDef::new("bad-rule", AssetKind::Rule);
    rule.check.push(HelperInvocation::new(
        "/level",
        "not_a_real_helper",
        vec![],
    ));
    policy.rules.push(rule);

    if let Err(err) = compose(&policy, &registry) {
        print!("{}", formatter.render_error(&err).join_lines());
    }

    Ok(())
}
