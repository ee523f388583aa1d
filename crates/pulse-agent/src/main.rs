// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod api;

use std::{env, net::SocketAddr, sync::Arc};
use tokio::{
    net::TcpListener,
    time::{interval, Duration},
};
use tracing::{debug, error, info, Metadata};
use tracing_subscriber::{
    filter::filter_fn, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use pulse::{prefix_level, Config, MemoryStore, Pulse};

const DEFAULT_FLUSH_INTERVAL: u64 = 10;
const DEFAULT_PORT: u16 = 8080;
const AGENT_HOST: &str = "0.0.0.0";

#[tokio::main]
pub async fn main() {
    let log_level = env::var("PULSE_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let port: u16 = env::var("PULSE_PORT")
        .ok()
        .and_then(|port| port.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let flush_interval_secs: u64 = env::var("PULSE_FLUSH_INTERVAL_SECS")
        .ok()
        .and_then(|secs| secs.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_FLUSH_INTERVAL);

    let config = match Config::from_env() {
        Ok(config) => Config {
            level_classifier: Some(Arc::new(prefix_level)),
            ..config
        },
        Err(e) => {
            eprintln!("PULSE | Error reading configuration on startup: {e}");
            return;
        }
    };

    // The agent's own log lines are recorded as Beats too
    let pulse = match Pulse::new(config, Arc::new(MemoryStore::new())).await {
        Ok(pulse) => pulse,
        Err(e) => {
            eprintln!("PULSE | Error creating pulse on startup: {e}");
            return;
        }
    };

    let env_filter = format!("h2=off,hyper=off,{log_level}");

    #[allow(clippy::expect_used)]
    let env_filter =
        EnvFilter::try_new(env_filter).expect("could not parse log level in configuration");
    let console = tracing_subscriber::fmt::layer()
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time();
    let beats = tracing_subscriber::fmt::layer()
        .with_writer(pulse.writer())
        .with_ansi(false)
        .with_level(true)
        .with_target(false)
        .without_time()
        .with_filter(filter_fn(outside_pulse));

    #[allow(clippy::expect_used)]
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(beats)
        .try_init()
        .expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let addr: SocketAddr = match format!("{AGENT_HOST}:{port}").parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid listen address {AGENT_HOST}:{port}: {e}");
            return;
        }
    };
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to listen on {addr}: {e}");
            return;
        }
    };
    info!("pulse-agent: listening on {addr}");

    let flusher = pulse.clone();
    tokio::spawn(async move {
        let mut flush_interval = interval(Duration::from_secs(flush_interval_secs));
        flush_interval.tick().await; // discard first tick, which is instantaneous

        loop {
            flush_interval.tick().await;
            debug!("Flushing buffered beats and hits");
            flusher.flush().await;
        }
    });

    let app = api::router(pulse.clone());
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;
    if let Err(e) = served {
        error!("Server error: {e}");
    }

    info!("pulse-agent: shutting down");
    pulse.flush().await;
}

/// Events from the pulse crate itself are not turned into Beats, so a flush
/// never logs into the buffer it is draining.
fn outside_pulse(metadata: &Metadata<'_>) -> bool {
    !is_pulse_target(metadata.target())
}

fn is_pulse_target(target: &str) -> bool {
    target == "pulse" || target.starts_with("pulse::")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    debug!("Shutdown signal received, shutting down");
}
