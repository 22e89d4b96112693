use anyhow::Result;
use page_extract::PromptTemplate;

use super::context::CliContext;

pub async fn cmd_templates(ctx: &CliContext) -> Result<()> {
    let templates: Vec<PromptTemplate> = ctx.config().template_set().iter().cloned().collect();
    let default = ctx.config().delivery.default_template.clone();
    ctx.output().emit(&templates, |templates| {
        for template in templates {
            let marker = if template.name == default { "*" } else { " " };
            println!(
                "{marker} {:<16} {}",
                template.name,
                template.description.as_deref().unwrap_or("")
            );
        }
    })
}
