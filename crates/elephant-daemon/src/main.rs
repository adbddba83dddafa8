//! elephant - providers of all kinds, behind one socket.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use elephant_core::config;
use elephant_daemon::{Server, ServerConfig, Service, Subscriptions, providers};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let global = config::load_global();
    let subscriptions = Subscriptions::new();
    let registry = providers::load(&global, subscriptions.sender());

    let mut args = std::env::args().skip(1);
    if let Some("--doc") = args.next().as_deref() {
        print_docs(&registry, args.next().as_deref());
        return Ok(());
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        providers = registry.len(),
        "starting elephant"
    );

    registry.spawn_setup();

    let service = Service::new(registry, subscriptions);
    let server = Server::bind(ServerConfig::default()).context("failed to bind socket")?;

    tokio::select! {
        result = server.run(service) => {
            if let Err(err) = result {
                error!(error = %err, "server stopped");
            }
        }
        _ = shutdown_signal() => {
            info!("shutting down");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

/// Print provider documentation, optionally filtered to one provider.
fn print_docs(registry: &elephant_core::Registry, provider: Option<&str>) {
    let mut providers: Vec<_> = registry.iter().collect();
    providers.sort_by(|a, b| a.0.cmp(b.0));

    for (name, instance) in providers {
        if provider.is_some_and(|p| !p.eq_ignore_ascii_case(name)) {
            continue;
        }

        println!("{}", instance.doc());
        println!();
    }
}
