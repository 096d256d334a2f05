//! Compiles an inline policy document, wires it into a router, and pushes
//! one event through it end to end — no network endpoints involved.
//!
//! ```bash
//! cargo run --example policy_walkthrough
//! ```

use std::sync::Arc;
use std::time::Duration;

use eventcascade::asset::{AssetDef, AssetKind, HelperInvocation};
use eventcascade::collaborators::kvdb::MemoryKvdb;
use eventcascade::collaborators::wdb::UnixSocketWdbClient;
use eventcascade::event::{Document, Event};
use eventcascade::helpers::register_builtin_helpers;
use eventcascade::policy::{compose, PolicyDef};
use eventcascade::queue::{EventQueue, QueueConfig};
use eventcascade::registry::Registry;
use eventcascade::router::Router;
use miette::{IntoDiagnostic, Result};
use serde_json::json;
use tracing_subscriber::{fmt, layer::SubscriberInitExt, util::SubscriberExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    miette::set_panic_hook();

    let mut registry = Registry::new();
    register_builtin_helpers(
        &mut registry,
        Arc::new(MemoryKvdb::new()),
        Arc::new(UnixSocketWdbClient::new("/var/run/eventcascade/wdb.sock")),
    )
    .into_diagnostic()?;

    // A one-rule policy: flag any event whose "/level" field equals "high".
    let mut policy = PolicyDef::new("demo");
    let mut rule = AssetDef::new("flag-high-severity", AssetKind::Rule);
    rule.check.push(HelperInvocation::new(
        "/level",
        "string_equal",
        vec!["high".to_string()],
    ));
    rule.stages.push(eventcascade::asset::Stage {
        name: "mark".to_string(),
        entries: vec![HelperInvocation::new(
            "/flagged",
            "parse_bool",
            vec!["true".to_string()],
        )],
    });
    policy.rules.push(rule);

    let compiled = compose(&policy, &registry).into_diagnostic()?;

    let mut router = Router::new();
    router
        .add_route("demo-route", 0, compiled.root.clone(), compiled.root)
        .into_diagnostic()?;

    let dir = tempfile::tempdir().into_diagnostic()?;
    let queue = Arc::new(EventQueue::new(QueueConfig {
        capacity: 16,
        flood_file: dir.path().join("flood.jsonl"),
        flood_attempts: 3,
        flood_sleep: Duration::from_millis(5),
    }));

    router.run(queue.clone(), 2);

    let event = Event::new(json!({"level": "high"}));
    queue.push(event.clone());

    for _ in 0..50 {
        if event.exists("/flagged") {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    router.stop();

    println!("final document: {}", event.to_value());
    Ok(())
}
