use hemmer_provider_webarena::{init_logging, serve, WebArenaProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    serve(WebArenaProvider::new(env!("CARGO_PKG_VERSION"))).await
}
