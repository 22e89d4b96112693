#[tokio::main]
async fn main() -> anyhow::Result<()> {
    promptrelay::cli::run().await
}
