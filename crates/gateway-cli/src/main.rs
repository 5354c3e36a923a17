#[tokio::main]
async fn main() {
    gateway_cli::init_logging();
    if let Err(e) = gateway_cli::run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
