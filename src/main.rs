use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    uiflow_cli::cli::app::run().await
}
