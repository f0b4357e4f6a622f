#[tokio::main]
async fn main() -> anyhow::Result<()> {
    screening_agent::cli::run().await
}
