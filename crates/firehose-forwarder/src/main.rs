// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, future::Future, process, sync::Arc, time::Duration};
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, BufReader},
    time::interval,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use firehose_router::{
    caching::NoopAppCache, config::RouterConfig, envelope::Envelope, stats::Stats, EventRouter,
};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("FIREHOSE_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,reqwest=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match RouterConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on firehose forwarder startup: {e}");
            process::exit(1);
        }
    };

    let stats = Arc::new(Stats::new());
    let router = match EventRouter::from_config(&config, Arc::new(NoopAppCache), Arc::clone(&stats))
    {
        Ok(router) => router,
        Err(e) => {
            error!("Error setting up event routing: {e}");
            process::exit(1);
        }
    };
    info!(
        "Forwarding firehose events to {} with filters {:?}",
        config.forward_url,
        router.filters()
    );

    run(
        &router,
        &stats,
        BufReader::new(io::stdin()),
        config.stats_interval,
        tokio::signal::ctrl_c(),
    )
    .await;
}

/// Routes envelopes read line by line from `input` until it is exhausted or `shutdown`
/// completes, logging the counters every `stats_every` and once more on exit.
async fn run<R, S>(
    router: &EventRouter,
    stats: &Stats,
    input: R,
    stats_every: Duration,
    shutdown: S,
) where
    R: AsyncBufRead + Unpin,
    S: Future,
{
    let mut lines = input.lines();
    let mut stats_interval = interval(stats_every);
    stats_interval.tick().await; // discard first tick, which is instantaneous

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(envelope) = decode_line(&line) {
                        dispatch(router, &envelope).await;
                    }
                }
                Ok(None) => {
                    info!("Input closed, shutting down");
                    break;
                }
                Err(e) => {
                    error!("Failed to read input: {e}");
                    break;
                }
            },
            _ = stats_interval.tick() => log_stats(stats),
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    log_stats(stats);
}

/// Routes the envelope unless its type was not selected. Unknown payloads are always routed so
/// they are counted.
async fn dispatch(router: &EventRouter, envelope: &Envelope) {
    if let Some(kind) = envelope.event.kind() {
        if !router.is_selected(kind) {
            return;
        }
    }
    let outcome = router.route(envelope).await;
    debug!("Routed envelope from {}: {:?}", envelope.origin, outcome);
}

fn decode_line(line: &str) -> Option<Envelope> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            warn!("Skipping undecodable envelope: {e}");
            None
        }
    }
}

fn log_stats(stats: &Stats) {
    match serde_json::to_string(&stats.snapshot()) {
        Ok(snapshot) => info!("Firehose stats: {snapshot}"),
        Err(e) => error!("Failed to serialize stats: {e}"),
    }
}
