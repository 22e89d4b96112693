use anyhow::{anyhow, Context, Result};
use clap::Args;
use page_extract::Extractor;
use promptrelay_core_types::SiteId;
use tracing::info;

use super::context::CliContext;
use super::deliver::print_outcome;

#[derive(Args, Clone, Debug)]
pub struct SendArgs {
    /// Page to extract
    #[arg(long)]
    pub url: String,

    /// Destination site (defaults to delivery.default_site)
    #[arg(long)]
    pub site: Option<SiteId>,

    /// Template name (defaults to delivery.default_template)
    #[arg(short, long)]
    pub template: Option<String>,

    /// Keep the source tab open after extraction
    #[arg(long)]
    pub keep_source: bool,
}

pub async fn cmd_send(args: SendArgs, ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let site = match args.site {
        Some(site) => site,
        None => config.default_site()?,
    };
    let templates = config.template_set();
    let template_name = args
        .template
        .as_deref()
        .unwrap_or(&config.delivery.default_template);
    let template = templates
        .get(template_name)
        .ok_or_else(|| anyhow!("Template '{}' not found", template_name))?
        .clone();

    let runtime = ctx.runtime().await?;
    let cdp = runtime.cdp();
    let source = cdp
        .create_page(&args.url)
        .await
        .with_context(|| format!("Failed to open {}", args.url))?;
    let extracted = Extractor::new(config.delivery.max_content_chars)
        .extract(cdp.as_ref(), source)
        .await
        .with_context(|| format!("Failed to extract {}", args.url));
    if !args.keep_source {
        let _ = cdp.close_page(source).await;
    }
    let content = extracted?;
    info!(
        kind = content.kind.as_str(),
        chars = content.char_count(),
        truncated = content.truncated,
        "page extracted"
    );

    let prompt = template.render(&content);
    let outcome = runtime
        .dispatcher
        .dispatch(site, &prompt, Some(content.url.clone()))
        .await?;
    print_outcome(ctx, &outcome)
}
