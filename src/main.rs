#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cp_tracker::run().await
}
