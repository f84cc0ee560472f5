use bevops::config;
use bevops::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up PG_*, SESSION_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config().clone();
    let port = config.server.port;

    let state = AppState::new(config).unwrap_or_else(|e| panic!("failed to build app state: {}", e));
    let app = bevops::app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    println!("Bevops server running: http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}
