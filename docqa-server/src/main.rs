use docqa_server::{ServerConfig, run_server};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,docqa_rag=debug"));
    let json = std::env::var("DOCQA_LOG_JSON")
        .is_ok_and(|value| value == "1" || value.eq_ignore_ascii_case("true"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    run_server(config).await
}
