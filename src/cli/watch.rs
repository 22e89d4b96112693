use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::watcher::Watcher;

use super::context::CliContext;

pub async fn cmd_watch(ctx: &CliContext) -> Result<()> {
    let runtime = ctx.runtime().await?;
    let cancel = CancellationToken::new();
    let watcher = Watcher::new(
        runtime.cdp(),
        runtime.registry.clone(),
        runtime.adapter.subscribe(),
    );
    let task = tokio::spawn(watcher.run(cancel.clone()));

    println!("Watching chat tabs for pending prompts; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("stopping watcher");
    cancel.cancel();

    let summary = task.await.context("Watcher task panicked")?;
    runtime.adapter.shutdown().await;
    println!(
        "Pages loaded: {}, pending prompts delivered: {}, failures: {}",
        summary.loads, summary.pickups, summary.failures
    );

    let deliveries = site_adapters::metrics::snapshot();
    let cdp = cdp_adapter::metrics::snapshot();
    debug!(
        submitted = deliveries.submitted,
        skipped = deliveries.skipped,
        fallbacks = deliveries.fallbacks,
        stale = deliveries.stale_discards,
        cdp_commands = cdp.commands,
        cdp_failures = cdp.failures,
        cdp_events = cdp.events,
        "session metrics"
    );
    if let Some(mean) = cdp.mean_latency() {
        println!(
            "CDP commands: {} ({} failed, mean {:?})",
            cdp.commands, cdp.failures, mean
        );
    }
    Ok(())
}
