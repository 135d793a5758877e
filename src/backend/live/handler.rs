/**
 * Live Socket Endpoint
 *
 * GET /socket upgrades to a WebSocket and hands the connection to the
 * coordinator. Each socket gets one reader loop (this task) and one writer
 * task fed by an unbounded channel, so events are written in the order the
 * coordinator queued them.
 *
 * A `?token=` query parameter binds the socket to that user. With
 * `live.require_auth` enabled, sockets without a valid token are refused.
 */

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::auth::users::get_user_by_id;
use crate::backend::error::{ApiResult, BackendError};
use crate::backend::live::coordinator::{BoundUser, LiveCoordinator};
use crate::backend::server::state::AppState;
use crate::shared::event::ServerEvent;

#[derive(Debug, Default, Deserialize)]
pub struct SocketQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// The token is checked before the upgrade so refused sockets get a plain 401.
pub async fn socket_handler(
    State(state): State<AppState>,
    Query(query): Query<SocketQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> ApiResult<Response> {
    let user = authenticate(&state, query.token.as_deref()).await?;
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    let live = state.live.clone();
    Ok(ws.on_upgrade(move |socket| run_socket(socket, live, user)))
}

/// Resolve the optional socket token into a bound identity.
async fn authenticate(state: &AppState, token: Option<&str>) -> ApiResult<Option<BoundUser>> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        if state.config.live.require_auth {
            tracing::warn!("Socket refused: no token");
            return Err(BackendError::unauthorized("Not authenticated"));
        }
        return Ok(None);
    };

    let claims = state.tokens.verify(token).map_err(|e| {
        tracing::warn!("Socket refused: invalid token: {:?}", e);
        BackendError::unauthorized("Not authenticated")
    })?;

    // Prefer the stored name; fall back to the email when there is no database.
    let user_name = match (&state.db_pool, Uuid::parse_str(&claims.sub)) {
        (Some(pool), Ok(user_id)) => get_user_by_id(pool, user_id)
            .await?
            .ok_or_else(|| BackendError::unauthorized("Not authenticated"))?
            .full_name,
        _ => claims.email.clone(),
    };

    Ok(Some(BoundUser {
        user_id: claims.sub,
        user_name,
    }))
}

async fn run_socket(socket: WebSocket, live: LiveCoordinator, user: Option<BoundUser>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let connection = live.connect(tx, user).await;

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to encode live event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                tracing::debug!("Socket {} closed while writing", connection);
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => live.handle_text(connection, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Socket {} read error: {}", connection, e);
                break;
            }
        }
    }

    live.disconnect(connection).await;
    writer.abort();
}
