use clap::Subcommand;

use super::deliver::DeliverArgs;
use super::pending::PendingArgs;
use super::send::SendArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Extract a page, wrap it in a template and send it to a chat site
    Send(SendArgs),

    /// Send raw text to a chat site
    Deliver(DeliverArgs),

    /// Deliver pending prompts as destination tabs load, until Ctrl-C
    Watch,

    /// Inspect or clear stored pending prompts
    Pending(PendingArgs),

    /// List supported chat sites
    Sites,

    /// List prompt templates
    Templates,
}
