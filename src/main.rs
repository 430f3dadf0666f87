#[tokio::main]
async fn main() -> anyhow::Result<()> {
    detect_ai_lib::run().await
}
