pub mod error;
pub mod state;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::routing::get;
use chrono_tz::Tz;
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use crate::chain::ChainResponse;
use crate::chain::expirations::ExpirationEntry;

use error::ApiError;
use state::AppState;

pub async fn serve(host: &str, port: u16, state: AppState) -> Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    let addr = format!("{host}:{port}");
    println!("options-chain API server listening on {addr}");
    println!("  Health:      GET http://{addr}/health");
    println!("  Expirations: GET http://{addr}/api/options/expirations?symbol=AAPL");
    println!("  Chain:       GET http://{addr}/api/options/chain?symbol=AAPL&exp=20250919");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    axum::serve(listener, app).await.context("running server")?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/options/expirations", get(expirations))
        .route("/api/options/chain", get(options_chain))
        .with_state(state)
}

#[derive(Deserialize)]
struct ExpirationsQuery {
    symbol: Option<String>,
    /// Accepted as an alias; some clients still send `root`.
    root: Option<String>,
    tz: Option<String>,
}

async fn expirations(
    State(state): State<AppState>,
    Query(query): Query<ExpirationsQuery>,
) -> Result<axum::Json<Vec<ExpirationEntry>>, ApiError> {
    let symbol = symbol_param(query.symbol, query.root)?;
    let tz = match query.tz {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| ApiError::BadRequest(format!("unknown timezone `{name}`")))?,
        None => state.default_tz,
    };

    let entries = state.chain.get_expirations(&symbol, tz).await?;
    Ok(axum::Json(entries))
}

#[derive(Deserialize)]
struct ChainQuery {
    symbol: Option<String>,
    root: Option<String>,
    exp: Option<String>,
}

async fn options_chain(
    State(state): State<AppState>,
    Query(query): Query<ChainQuery>,
) -> Result<axum::Json<ChainResponse>, ApiError> {
    let symbol = symbol_param(query.symbol, query.root)?;
    let exp = query
        .exp
        .ok_or_else(|| ApiError::BadRequest("required query param: exp".to_string()))?;

    let chain = state.chain.get_options_chain(&symbol, &exp).await?;
    Ok(axum::Json(chain))
}

fn symbol_param(symbol: Option<String>, root: Option<String>) -> Result<String, ApiError> {
    symbol
        .or(root)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("required query param: symbol".to_string()))
}
