//! Client-facing HTTP surface: the WebSocket upgrade, a health check and
//! the tweet ingest callback.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::WebSocket,
        ConnectInfo, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::channel::WsChannel;
use crate::collection::Collection;
use crate::tweets::{FeedTweet, TweetSender};

/// Shared application state.
pub struct AppState {
    pub collection: Arc<Collection>,
    pub tweets: TweetSender,
}

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/w", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/tweet", post(tweet_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let games = state.collection.games().len();
    let subscriptions = state.collection.subscription_count();
    let clients = state.collection.client_count().await;
    format!(
        r#"{{"status":"ok","games":{},"subscriptions":{},"clients":{}}}"#,
        games, subscriptions, clients
    )
}

/// Tweet ingest: the concrete form of the feed's push callback. Must not
/// block, and does not — the sender drops on a full queue.
async fn tweet_handler(
    State(state): State<Arc<AppState>>,
    Json(tweet): Json<FeedTweet>,
) -> impl IntoResponse {
    state.tweets.push(tweet);
    StatusCode::ACCEPTED
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

/// Hand the upgraded socket to the collection; the first message decides
/// which subscription it joins.
async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: Arc<AppState>) {
    info!("client {addr} connected");
    let chan = WsChannel::new(socket, addr.to_string());
    state.collection.join(Box::new(chan)).await;
}
