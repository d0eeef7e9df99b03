#[tokio::main]
async fn main() {
    if let Err(e) = medtrack::start_server().await {
        eprintln!("medtrack: {}", e);
        std::process::exit(1);
    }
}
