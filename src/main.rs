#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cookieswitch_lib::run().await
}
