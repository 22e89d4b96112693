use anyhow::Result;
use clap::{Args, Subcommand};
use pending_store::{PendingPayload, PendingStore};
use promptrelay_core_types::{format_timestamp, timestamp_now, SiteId};
use serde::Serialize;

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct PendingArgs {
    #[command(subcommand)]
    pub command: PendingCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum PendingCommand {
    /// Show stored prompts with their age
    List,
    /// Remove every stored prompt
    Clear,
    /// Remove the prompt stored for one site
    Drop {
        /// Site whose prompt to remove
        site: SiteId,
    },
}

#[derive(Serialize)]
struct PendingRow<'a> {
    #[serde(flatten)]
    payload: &'a PendingPayload,
    age_secs: u64,
    created_at: String,
}

pub async fn cmd_pending(args: PendingArgs, ctx: &CliContext) -> Result<()> {
    let store = ctx.store().await?;
    match args.command {
        PendingCommand::List => {
            let payloads = store.list().await?;
            let now = timestamp_now();
            let rows: Vec<PendingRow<'_>> = payloads
                .iter()
                .map(|payload| PendingRow {
                    payload,
                    age_secs: payload.age_ms(now) / 1_000,
                    created_at: format_timestamp(payload.created_at_ms),
                })
                .collect();
            ctx.output().emit(&rows, |rows| {
                if rows.is_empty() {
                    println!("[no pending prompts]");
                    return;
                }
                println!("{:<12} {:<8} {:<8} {}", "Site", "Age(s)", "Chars", "Source");
                println!("{}", "-".repeat(64));
                for row in rows {
                    println!(
                        "{:<12} {:<8} {:<8} {}",
                        row.payload.site,
                        row.age_secs,
                        row.payload.prompt.chars().count(),
                        row.payload.source_url.as_deref().unwrap_or("-")
                    );
                }
            })
        }
        PendingCommand::Clear => {
            let removed = store.clear().await?;
            println!("Removed {removed} pending prompt(s)");
            Ok(())
        }
        PendingCommand::Drop { site } => {
            match store.take(site).await? {
                Some(payload) => println!("Removed pending prompt {} for {site}", payload.id),
                None => println!("No pending prompt for {site}"),
            }
            Ok(())
        }
    }
}

