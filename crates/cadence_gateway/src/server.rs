use crate::types::IngestMessage;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use cadence_scheduler::{OutboundDirective, Scheduler};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

/// Shared state for the gateway routes.
#[derive(Clone)]
struct AppState {
    scheduler: Scheduler,
    /// Fan-out of outbound directives for WebSocket subscribers.
    directives: broadcast::Sender<OutboundDirective>,
}

/// The gateway HTTP + WebSocket server.
///
/// Routes:
/// - `POST /message`: inject a normalized inbound message, returns the
///   gate verdict
/// - `GET /stats`: diagnostic snapshot
/// - `GET /ws`: outbound directive stream
/// - `GET /health`: liveness check
pub struct GatewayServer {
    scheduler: Scheduler,
    directives: broadcast::Sender<OutboundDirective>,
    host: String,
    port: u16,
}

impl GatewayServer {
    /// `directives` is the same broadcast the directive consumer publishes
    /// fired turns on; every WebSocket client gets its own subscription.
    pub fn new(
        scheduler: Scheduler,
        directives: broadcast::Sender<OutboundDirective>,
        host: &str,
        port: u16,
    ) -> Self {
        Self {
            scheduler,
            directives,
            host: host.to_string(),
            port,
        }
    }

    fn router(&self) -> Router {
        let state = AppState {
            scheduler: self.scheduler.clone(),
            directives: self.directives.clone(),
        };
        Router::new()
            .route("/health", get(health))
            .route("/message", post(handle_message))
            .route("/stats", get(handle_stats))
            .route("/ws", get(ws_upgrade))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and start serving. Binding errors surface immediately; the
    /// serve loop itself runs on a background task.
    pub async fn start(self) -> anyhow::Result<tokio::task::JoinHandle<()>> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("gateway listening on {}", addr);
        let app = self.router();
        Ok(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("gateway server stopped: {}", e);
            }
        }))
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn handle_message(
    State(state): State<AppState>,
    Json(payload): Json<IngestMessage>,
) -> impl IntoResponse {
    match state.scheduler.submit(payload.into_inbound()).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(e) => {
            tracing::error!("gateway submit failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn handle_stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.scheduler.stats().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => {
            tracing::error!("gateway stats failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let rx = state.directives.subscribe();
    ws.on_upgrade(move |socket| stream_directives(socket, rx))
}

/// Push every fired directive to the subscriber as a JSON text frame.
async fn stream_directives(socket: WebSocket, mut rx: broadcast::Receiver<OutboundDirective>) {
    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            directive = rx.recv() => {
                match directive {
                    Ok(directive) => {
                        let payload = match serde_json::to_string(&directive) {
                            Ok(p) => p,
                            Err(e) => {
                                tracing::error!("directive serialization failed: {}", e);
                                continue;
                            }
                        };
                        if sink.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged, {} directives skipped", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            inbound = stream.next() => {
                // Subscribers only listen; anything but a ping/pong closes.
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use cadence_core::{CadenceConfig, SeededEntropy};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_server() -> GatewayServer {
        let (scheduler, _out_rx, _join) = cadence_scheduler::spawn(
            CadenceConfig::default(),
            Box::new(SeededEntropy::new(42)),
        );
        let (directives, _) = broadcast::channel(32);
        GatewayServer::new(scheduler, directives, "127.0.0.1", 0)
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_server().router();
        let res = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_message_roundtrip() {
        let app = test_server().router();
        let body = r#"{"platform": "discord", "username": "alice", "text": "hey cadence?"}"#;
        let res = app
            .oneshot(
                Request::post("/message")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let receipt: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(receipt["scheduled"].as_bool().unwrap());
        assert!(receipt["turn_id"].is_string());
    }

    #[tokio::test]
    async fn test_stats_route() {
        let app = test_server().router();
        let res = app
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let stats: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stats["heat"].as_array().unwrap().len(), 4);
        assert_eq!(stats["pending_turns"], 0);
    }
}
