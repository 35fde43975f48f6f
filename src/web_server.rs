use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{Html, IntoResponse},
    routing::get,
    serve, Json, Router,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::mpsc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::chat::EXAMPLE_QUERIES;
use crate::constants;
use crate::gazetteer::Gazetteer;
use crate::geocode::Geocoder;
use crate::map_view::{MapRenderController, MapView};
use crate::resolver::{LookupOutcome, Resolver};
use crate::session::{ClientEvent, ServerEvent, Session};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    gazetteer: Arc<Gazetteer>,
    // None means gazetteer-only mode
    geocoder: Option<Arc<dyn Geocoder>>,
}

impl AppState {
    pub fn new(
        templates_dir: &str,
        gazetteer: Arc<Gazetteer>,
        geocoder: Option<Arc<dyn Geocoder>>,
    ) -> Self {
        Self {
            templates: Arc::new(create_minijinja_env(templates_dir.to_string())),
            gazetteer,
            geocoder,
        }
    }

    /// Every session and one-shot request gets its own resolver over the shared table.
    fn resolver(&self) -> Resolver {
        Resolver::new(self.gazetteer.clone(), self.geocoder.clone())
    }
}

// Minijinja Environment setup
fn create_minijinja_env(templates_dir: String) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(templates_dir.clone()));
        notifier.watch_path(&templates_dir, true);
        Ok(env)
    })
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, Html<String>> {
    state
        .templates
        .acquire_env()
        .and_then(|env| {
            env.get_template("index.html").and_then(|tmpl| {
                let context = minijinja::context! {
                    title => "Avocado",
                    examples => EXAMPLE_QUERIES,
                    map_configured => state.geocoder.is_some(),
                };
                tmpl.render(context)
            })
        })
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template: {}", e);
            Html(format!("Internal Server Error: {}", e))
        })
}

#[derive(Debug, Deserialize)]
struct MapParams {
    city: String,
}

/// One-shot resolution with a fresh resolver.
async fn map_handler(
    State(state): State<AppState>,
    Query(params): Query<MapParams>,
) -> Json<MapView> {
    let mut resolver = state.resolver();
    let mut map = MapRenderController::new();
    let result = resolver.resolve(&params.city).await;
    Json(map.project(result, state.geocoder.is_some()))
}

async fn cities_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(
        state
            .gazetteer
            .entries()
            .iter()
            .map(|entry| entry.name.clone())
            .collect(),
    )
}

// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &ServerEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json_msg) => sender.send(Message::Text(json_msg)).await.is_ok(),
        Err(e) => {
            error!("Failed to serialize server event: {}", e);
            true
        }
    }
}

// Drives one session. Lookups run on their own tasks; their outcomes come back
// through `lookup_rx` so the session is only ever touched from this loop.
async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("New WebSocket connection established");
    let (mut sender, mut receiver) = socket.split();
    let mut session = Session::new(state.resolver());
    let (lookup_tx, mut lookup_rx) = mpsc::channel::<LookupOutcome>(16);

    let initial = ServerEvent::Map {
        view: session.map_view(),
    };
    if !send_event(&mut sender, &initial).await {
        warn!("Failed to send initial map state to new WebSocket client");
        return;
    }

    loop {
        tokio::select! {
            Some(outcome) = lookup_rx.recv() => {
                if let Some(event) = session.complete(outcome) {
                    if !send_event(&mut sender, &event).await {
                        warn!("WebSocket client disconnected or send error. Closing connection.");
                        break;
                    }
                }
            }

            frame = receiver.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Client closed WebSocket");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                };

                let event: ClientEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("Ignoring malformed client event: {}", e);
                        continue;
                    }
                };

                let reaction = session.handle(event);
                if let Some(lookup) = reaction.lookup {
                    let tx = lookup_tx.clone();
                    tokio::spawn(async move {
                        // Receiver gone means the socket closed; nothing left to update.
                        let _ = tx.send(lookup.run().await).await;
                    });
                }
                let mut open = true;
                for event in &reaction.events {
                    if !send_event(&mut sender, event).await {
                        open = false;
                        break;
                    }
                }
                if !open {
                    warn!("WebSocket client disconnected or send error. Closing connection.");
                    break;
                }
            }
        }
    }
    info!("WebSocket connection closed");
}

pub fn router(state: AppState, static_dir: &str) -> Router {
    let static_files_service = ServeDir::new(static_dir).not_found_service(tower::service_fn(
        |_: axum::extract::Request| async {
            Ok::<_, std::convert::Infallible>(
                (hyper::StatusCode::NOT_FOUND, "Not Found").into_response(),
            )
        },
    ));

    Router::new()
        .route("/", get(index_handler))
        .route("/api/map", get(map_handler))
        .route("/api/cities", get(cities_handler))
        .route("/ws", get(ws_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_web_server(port: u16, state: AppState) -> Result<()> {
    let app = router(state, &constants::STATIC_DIR);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
