use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use promptrelay_core_types::SiteId;

use crate::dispatcher::DispatchOutcome;

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct DeliverArgs {
    /// Destination site (defaults to delivery.default_site)
    #[arg(long)]
    pub site: Option<SiteId>,

    /// Prompt text
    #[arg(long, conflicts_with = "file")]
    pub text: Option<String>,

    /// Read the prompt from a file; stdin is used when neither flag is given
    #[arg(long)]
    pub file: Option<PathBuf>,
}

pub async fn cmd_deliver(args: DeliverArgs, ctx: &CliContext) -> Result<()> {
    let site = match args.site {
        Some(site) => site,
        None => ctx.config().default_site()?,
    };
    let prompt = match (args.text, args.file) {
        (Some(text), _) => text,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read prompt from stdin")?;
            buf
        }
    };
    if prompt.trim().is_empty() {
        bail!("Prompt is empty");
    }

    let runtime = ctx.runtime().await?;
    let outcome = runtime.dispatcher.dispatch(site, &prompt, None).await?;
    print_outcome(ctx, &outcome)
}

pub(crate) fn print_outcome(ctx: &CliContext, outcome: &DispatchOutcome) -> Result<()> {
    ctx.output().emit(outcome, |outcome| {
        let report = &outcome.report;
        if report.is_submitted() {
            println!(
                "Submitted to {} in {}ms ({} attempt(s){})",
                outcome.site,
                report.latency_ms,
                outcome.attempts,
                if report.fallback_used { ", fallback" } else { "" }
            );
        } else {
            println!(
                "Not submitted to {}: {:?}; prompt kept pending",
                outcome.site, report.outcome
            );
        }
        if let Some(strategy) = report.strategy {
            println!("  strategy:   {}", strategy.as_str());
        }
        if let Some(path) = report.submit_path {
            println!("  submit:     {:?}", path);
        }
        println!("  delivery:   {}", outcome.id);
        println!("  reused tab: {}", outcome.reused_tab);
    })
}
