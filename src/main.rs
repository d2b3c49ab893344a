//! civic-desk server binary.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    civic_desk::server::run().await
}
