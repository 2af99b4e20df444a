//! Shared helper: serve a stub upstream on an ephemeral port.

use axum::Router;
use tokio::net::TcpListener;

/// Bind an ephemeral port, build the router from the resulting base URL
/// (so handlers can emit absolute next-page links), and serve it in the
/// background. Returns the base URL.
pub async fn spawn_stub<F>(make_router: F) -> String
where
    F: FnOnce(&str) -> Router,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let router = make_router(&base);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    base
}
