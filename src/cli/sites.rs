use anyhow::Result;

use super::context::CliContext;

pub async fn cmd_sites(ctx: &CliContext) -> Result<()> {
    let profiles = ctx.site_profiles()?;
    ctx.output().emit(&profiles, |profiles| {
        println!(
            "{:<12} {:<12} {:<10} {:<10} {}",
            "Site", "Name", "Fresh(s)", "Exclusive", "Start URL"
        );
        println!("{}", "-".repeat(72));
        for profile in profiles {
            println!(
                "{:<12} {:<12} {:<10} {:<10} {}",
                profile.id.as_str(),
                profile.display_name,
                profile.freshness.as_secs(),
                if profile.exclusive { "yes" } else { "no" },
                profile.start_url
            );
        }
    })
}
