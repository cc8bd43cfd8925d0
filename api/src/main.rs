#[tokio::main]
async fn main() -> anyhow::Result<()> {
    streaming_analytics_api::run().await
}
