//! Throughput of compiling a moderately sized policy document
//! (`spec.md` §4.5/§4.6: compilation happens once at load time, but the
//! daemon recompiles on every config reload, so its cost is worth tracking).

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use eventcascade::asset::{AssetDef, AssetKind, HelperInvocation, Stage};
use eventcascade::collaborators::kvdb::MemoryKvdb;
use eventcascade::collaborators::wdb::UnixSocketWdbClient;
use eventcascade::helpers::register_builtin_helpers;
use eventcascade::policy::{compose, PolicyDef};
use eventcascade::registry::Registry;

fn build_registry() -> Registry {
    let mut registry = Registry::new();
    register_builtin_helpers(
        &mut registry,
        Arc::new(MemoryKvdb::new()),
        Arc::new(UnixSocketWdbClient::new("/var/run/eventcascade/wdb.sock")),
    )
    .unwrap();
    registry
}

fn decoder(name: &str, parent: Option<&str>) -> AssetDef {
    let mut def = AssetDef::new(name, AssetKind::Decoder);
    def.check.push(HelperInvocation::new("/kind", "string_equal", vec![name.to_string()]));
    def.stages.push(Stage {
        name: "tag".to_string(),
        entries: vec![HelperInvocation::new("/seen", "parse_bool", vec!["true".to_string()])],
    });
    if let Some(p) = parent {
        def.parents.push(p.to_string());
    }
    def
}

fn sample_policy() -> PolicyDef {
    let mut def = PolicyDef::new("bench");
    for i in 0..10 {
        let root_name = format!("d{i}");
        def.decoders.push(decoder(&root_name, None));
        def.decoders.push(decoder(&format!("{root_name}_child"), Some(&root_name)));
    }
    def
}

fn bench_compose(c: &mut Criterion) {
    let registry = build_registry();
    let policy = sample_policy();
    c.bench_function("compose_ten_decoder_trees", |b| {
        b.iter(|| black_box(compose(&policy, &registry).unwrap()))
    });
}

criterion_group!(benches, bench_compose);
criterion_main!(benches);
