use inkrelay::services::sweep;
use inkrelay::state::{AppState, ServerConfig};
use inkrelay::routes;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let state = AppState::new(ServerConfig::from_env());

    // Background reclamation of abandoned edit locks.
    let _sweep = sweep::spawn_lock_sweep(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "inkrelay listening");
    axum::serve(listener, app).await.expect("server failed");
}
