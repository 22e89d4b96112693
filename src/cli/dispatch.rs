use anyhow::Result;

use super::commands::Commands;
use super::context::CliContext;
use super::deliver::cmd_deliver;
use super::env::CliArgs;
use super::pending::cmd_pending;
use super::send::cmd_send;
use super::sites::cmd_sites;
use super::templates::cmd_templates;
use super::watch::cmd_watch;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Send(args) => cmd_send(args, ctx).await,
        Commands::Deliver(args) => cmd_deliver(args, ctx).await,
        Commands::Watch => cmd_watch(ctx).await,
        Commands::Pending(args) => cmd_pending(args, ctx).await,
        Commands::Sites => cmd_sites(ctx).await,
        Commands::Templates => cmd_templates(ctx).await,
    }
}
