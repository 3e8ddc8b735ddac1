#[tokio::main]
async fn main() -> std::io::Result<()> {
    swarm_control::run_with_config().await
}
