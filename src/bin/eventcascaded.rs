//! `eventcascaded` — the daemon entry point: resolves configuration, wires
//! the collaborators and router together, and hosts the event/API
//! endpoints (`spec.md` §6, listed "where they touch the core" only; the
//! core itself never parses argv or a config file).

use std::sync::Arc;

use clap::Parser;
use eventcascade::asset::{compile_asset, AssetDef};
use eventcascade::collaborators::kvdb::MemoryKvdb;
use eventcascade::collaborators::store::{AssetStore, FileAssetStore};
use eventcascade::collaborators::wdb::{UnixSocketWdbClient, FIXED_SOCKET_PATH};
use eventcascade::config::{CliArgs, EngineConfig};
use eventcascade::event::Event;
use eventcascade::expr::Expression;
use eventcascade::helpers::register_builtin_helpers;
use eventcascade::policy::{compose, PolicyDef};
use eventcascade::queue::{EventQueue, QueueConfig};
use eventcascade::registry::Registry;
use eventcascade::router::Router;
use miette::{Context, IntoDiagnostic, Result};
use tokio::net::{UnixDatagram, UnixListener};
use tracing::{info, instrument, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,eventcascade=info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(ErrorLayer::default())
        .init();
}

fn init_miette() {
    miette::set_panic_hook();
}

/// Resolve a filter asset name into its compiled check expression.
fn resolve_filter(store: &dyn AssetStore, registry: &Registry, name: &str) -> Result<Expression> {
    let doc = store.get(name).into_diagnostic().wrap_err("loading filter asset")?;
    let def: AssetDef = serde_yaml::from_value(doc).into_diagnostic().wrap_err("parsing filter asset")?;
    let asset = compile_asset(&def, registry).into_diagnostic().wrap_err("compiling filter asset")?;
    Ok(asset.expression)
}

/// Resolve a policy name into its composed root expression.
fn resolve_policy(store: &dyn AssetStore, registry: &Registry, name: &str) -> Result<Expression> {
    let doc = store.get(name).into_diagnostic().wrap_err("loading policy")?;
    let def: PolicyDef = serde_yaml::from_value(doc).into_diagnostic().wrap_err("parsing policy")?;
    let policy = compose(&def, registry).into_diagnostic().wrap_err("composing policy")?;
    Ok(policy.root)
}

fn build_router(config: &EngineConfig, registry: &Registry, store: &dyn AssetStore) -> Result<Router> {
    // `config.policy` is already the fully resolved route list: `apply_cli`
    // decided merge-vs-replace against the file-sourced routes before this
    // ever runs, so the router is built fresh from it in one pass.
    let router = Router::new();
    for route in &config.policy {
        let filter = resolve_filter(store, registry, &route.filter)?;
        let policy = resolve_policy(store, registry, &route.policy)?;
        router
            .add_route(route.name.clone(), route.priority, filter, policy)
            .into_diagnostic()
            .wrap_err("registering initial route")?;
    }
    Ok(router)
}

/// One datagram = one raw agent event (`spec.md` §6).
#[instrument(skip(queue))]
async fn run_event_endpoint(socket_path: std::path::PathBuf, queue: Arc<EventQueue>) -> Result<()> {
    let _ = std::fs::remove_file(&socket_path);
    let socket = UnixDatagram::bind(&socket_path).into_diagnostic().wrap_err("binding event socket")?;
    info!(path = %socket_path.display(), "event endpoint listening");
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let (n, _addr) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "event endpoint recv failed");
                continue;
            }
        };
        let raw = String::from_utf8_lossy(&buf[..n]);
        match Event::from_json_str(&raw) {
            Ok(event) => queue.push(event),
            Err(e) => warn!(error = %e, "dropping malformed event payload"),
        }
    }
}

/// Stream socket with length-prefixed framing, one request per response
/// (`spec.md` §6). Kept thin: the request/response payload handling itself
/// is out of scope for the core.
#[instrument(skip(_queue))]
async fn run_api_endpoint(socket_path: std::path::PathBuf, _queue: Arc<EventQueue>) -> Result<()> {
    let _ = std::fs::remove_file(&socket_path);
    let listener = UnixListener::bind(&socket_path).into_diagnostic().wrap_err("binding API socket")?;
    info!(path = %socket_path.display(), "API endpoint listening");
    loop {
        let (stream, _addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "API endpoint accept failed");
                continue;
            }
        };
        tokio::spawn(async move {
            if let Err(e) = serve_api_connection(stream).await {
                warn!(error = %e, "API connection closed with an error");
            }
        });
    }
}

async fn serve_api_connection(mut stream: tokio::net::UnixStream) -> Result<()> {
    use bytes::BytesMut;
    use eventcascade::collaborators::codec;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut buf = BytesMut::with_capacity(4096);
    loop {
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.into_diagnostic()?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        while let Some(frame) = codec::decode(&mut buf).into_diagnostic()? {
            let ack = codec::encode(&frame);
            stream.write_all(&ack).await.into_diagnostic()?;
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    init_miette();

    let cli = CliArgs::parse();
    let mut config = EngineConfig::load(&cli.config).unwrap_or_else(|e| {
        warn!(error = %e, "could not load config file, using defaults");
        EngineConfig::default()
    });
    config.apply_cli(&cli);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server_threads.clamp(1, 1024))
        .enable_all()
        .build()
        .into_diagnostic()
        .wrap_err("building the server thread pool")?;

    runtime.block_on(run(config))
}

async fn run(config: EngineConfig) -> Result<()> {
    let kvdb = Arc::new(MemoryKvdb::new());
    let wdb = Arc::new(UnixSocketWdbClient::new(
        std::env::var("EVENTCASCADE_WDB_SOCKET").unwrap_or_else(|_| FIXED_SOCKET_PATH.to_string()),
    ));
    let mut registry = Registry::new();
    register_builtin_helpers(&mut registry, kvdb, wdb)
        .into_diagnostic()
        .wrap_err("registering builtin helpers")?;

    let store = FileAssetStore::new(config.store_path.clone());

    let mut router = build_router(&config, &registry, &store)?;

    let queue = Arc::new(EventQueue::new(QueueConfig {
        capacity: config.queue_size,
        flood_file: config.queue_flood_file.clone(),
        flood_attempts: config.queue_flood_attempts,
        flood_sleep: config.queue_flood_sleep,
    }));

    router.run(queue.clone(), config.router_threads);

    let event_task = tokio::spawn(run_event_endpoint(config.event_socket.clone(), queue.clone()));
    let api_task = tokio::spawn(run_api_endpoint(config.api_socket.clone(), queue.clone()));

    tokio::signal::ctrl_c().await.into_diagnostic().wrap_err("waiting for shutdown signal")?;
    info!("shutdown requested, draining router");
    router.stop();
    event_task.abort();
    api_task.abort();

    Ok(())
}
