/**
 * XFChat Server Entry Point
 *
 * Loads configuration (`xfchat.toml` plus `XFCHAT_*` environment overrides),
 * initializes tracing, and serves the Axum app.
 */

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,xfchat=debug".to_string());
    eprintln!("[STARTUP] Setting RUST_LOG={}", env_filter);

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    tracing::info!("[STARTUP] Server initialization started");

    let config = xfchat::shared::AppConfig::load()?;
    let addr = config.bind_addr();

    let app = xfchat::backend::server::create_app(config).await?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("[STARTUP] Listening on {}", addr);
    tracing::info!("[STARTUP] Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
