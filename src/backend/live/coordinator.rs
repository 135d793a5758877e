/**
 * Live Session Coordinator
 *
 * In-memory registry of socket connections and the learning-session rooms
 * they joined. Every operation mutates the registry and queues outbound events
 * while holding the lock, so each connection sees events in mutation order.
 *
 * # Layout
 *
 * - `connections`: connection id -> outbound sender (plus the user bound at
 *   connect time, if the socket presented a token)
 * - `rooms`: session id -> member connections, chat participants and WebRTC peers
 *
 * Nothing here is persisted. A restart drops every room.
 */

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::shared::event::{
    ClientEvent, ClientFrame, ErrorAck, JoinAck, JoinSession, ParticipantInfo, PeerJoinAck,
    SendMessage, ServerEvent, SuccessAck, WebrtcLeave, WebrtcSignal, WhiteboardUpdate,
};
use crate::shared::peer::SessionStatus;

pub type ConnectionId = Uuid;
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

const UNKNOWN_USER_NAME: &str = "Unknown";

/// Rejections returned to the client as acknowledgement payloads
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LiveError {
    #[error("Missing session_id or user_id")]
    MissingSessionOrUser,

    #[error("Missing session_id")]
    MissingSession,

    #[error("Missing session_id or target_user_id")]
    MissingSessionOrTarget,

    #[error("Target peer not found")]
    TargetNotFound,

    #[error("Peer not found")]
    PeerNotFound,
}

/// Identity attached to a connection that authenticated with a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundUser {
    pub user_id: String,
    pub user_name: String,
}

struct Connection {
    tx: EventSender,
    user: Option<BoundUser>,
}

#[derive(Debug, Clone)]
struct Member {
    connection: ConnectionId,
    user_name: String,
}

#[derive(Default)]
struct Room {
    connections: HashSet<ConnectionId>,
    participants: HashMap<String, Member>,
    peers: HashMap<String, Member>,
}

impl Room {
    fn is_empty(&self) -> bool {
        self.connections.is_empty() && self.participants.is_empty() && self.peers.is_empty()
    }

    fn participant_list(&self) -> Vec<ParticipantInfo> {
        let mut list: Vec<ParticipantInfo> = self
            .participants
            .iter()
            .map(|(user_id, member)| ParticipantInfo {
                user_id: user_id.clone(),
                user_name: member.user_name.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        list
    }
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<String, Room>,
}

impl Inner {
    fn send_to(&self, connection: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(&connection) {
            Some(conn) => conn.tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Queue `event` for every connection in the room, optionally skipping one.
    fn broadcast(&self, session_id: &str, event: &ServerEvent, skip: Option<ConnectionId>) -> usize {
        let Some(room) = self.rooms.get(session_id) else {
            return 0;
        };
        room.connections
            .iter()
            .filter(|c| Some(**c) != skip)
            .filter(|c| self.send_to(**c, event.clone()))
            .count()
    }

    fn bound_user(&self, connection: ConnectionId) -> Option<&BoundUser> {
        self.connections.get(&connection).and_then(|c| c.user.as_ref())
    }

    /// Resolve `(user_id, user_name)` for a join, preferring the bound identity.
    fn identity(&self, connection: ConnectionId, payload: &JoinSession) -> Option<(String, String)> {
        match self.bound_user(connection) {
            Some(user) => Some((
                user.user_id.clone(),
                payload.user_name.clone().unwrap_or_else(|| user.user_name.clone()),
            )),
            None => payload.user_id.clone().map(|id| {
                (id, payload.user_name.clone().unwrap_or_else(|| UNKNOWN_USER_NAME.to_string()))
            }),
        }
    }

    /// Remove everything `connection` owns; returns the number of rooms dropped.
    fn detach(&mut self, connection: ConnectionId) -> usize {
        let mut notices: Vec<(String, ServerEvent)> = Vec::new();

        for (session_id, room) in self.rooms.iter_mut() {
            room.connections.remove(&connection);

            let leaving: Vec<String> = room
                .participants
                .iter()
                .filter(|(_, m)| m.connection == connection)
                .map(|(user_id, _)| user_id.clone())
                .collect();
            for user_id in leaving {
                room.participants.remove(&user_id);
                tracing::info!("User {} left session {}", user_id, session_id);
                notices.push((
                    session_id.clone(),
                    ServerEvent::UserLeft {
                        user_id: user_id.clone(),
                        session_id: session_id.clone(),
                    },
                ));
                if room.peers.remove(&user_id).is_some() {
                    notices.push((session_id.clone(), ServerEvent::PeerLeft { user_id }));
                }
            }

            // Peers registered from this socket without a chat join.
            let orphaned: Vec<String> = room
                .peers
                .iter()
                .filter(|(_, m)| m.connection == connection)
                .map(|(user_id, _)| user_id.clone())
                .collect();
            for user_id in orphaned {
                room.peers.remove(&user_id);
                notices.push((session_id.clone(), ServerEvent::PeerLeft { user_id }));
            }
        }

        for (session_id, event) in &notices {
            self.broadcast(session_id, event, Some(connection));
        }
        self.prune_rooms()
    }

    fn prune_rooms(&mut self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, room| !room.is_empty());
        before - self.rooms.len()
    }
}

/// Shared handle to the coordinator; clones point at the same registry.
#[derive(Clone, Default)]
pub struct LiveCoordinator {
    inner: Arc<RwLock<Inner>>,
}

impl LiveCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and greet it with its id.
    pub async fn connect(&self, tx: EventSender, user: Option<BoundUser>) -> ConnectionId {
        let connection = Uuid::new_v4();
        let mut inner = self.inner.write().await;
        match &user {
            Some(u) => tracing::info!("Client connected: {} as user {}", connection, u.user_id),
            None => tracing::info!("Client connected: {}", connection),
        }
        inner.connections.insert(connection, Connection { tx, user });
        inner.send_to(
            connection,
            ServerEvent::Connected {
                sid: connection.to_string(),
            },
        );
        connection
    }

    pub async fn disconnect(&self, connection: ConnectionId) {
        let mut inner = self.inner.write().await;
        let dropped = inner.detach(connection);
        inner.connections.remove(&connection);
        tracing::info!("Client disconnected: {} ({} empty rooms dropped)", connection, dropped);
    }

    pub async fn join_session(&self, connection: ConnectionId, payload: JoinSession) -> Result<JoinAck, LiveError> {
        let mut inner = self.inner.write().await;
        let session_id = payload.session_id.clone().ok_or(LiveError::MissingSessionOrUser)?;
        let (user_id, user_name) = inner
            .identity(connection, &payload)
            .ok_or(LiveError::MissingSessionOrUser)?;

        tracing::info!("User {} ({}) joining session {}", user_id, user_name, session_id);

        let room = inner.rooms.entry(session_id.clone()).or_default();
        room.participants.insert(
            user_id.clone(),
            Member {
                connection,
                user_name: user_name.clone(),
            },
        );
        room.connections.insert(connection);

        let mut peers: Vec<String> = room.peers.keys().cloned().collect();
        peers.sort();
        let ack = JoinAck {
            success: true,
            participants: room.participant_list(),
            peers,
        };

        let notice = ServerEvent::UserJoined {
            user_id,
            user_name,
            session_id: session_id.clone(),
        };
        inner.broadcast(&session_id, &notice, Some(connection));
        Ok(ack)
    }

    pub async fn send_message(&self, connection: ConnectionId, payload: SendMessage) -> Result<SuccessAck, LiveError> {
        let inner = self.inner.read().await;
        let session_id = payload.session_id.ok_or(LiveError::MissingSession)?;
        let delivered = inner.broadcast(&session_id, &ServerEvent::NewMessage(payload.message), None);
        tracing::debug!(
            "Message from {} in session {} delivered to {} connections",
            connection,
            session_id,
            delivered
        );
        Ok(SuccessAck::ok())
    }

    pub async fn whiteboard_update(
        &self,
        connection: ConnectionId,
        payload: WhiteboardUpdate,
    ) -> Result<SuccessAck, LiveError> {
        let inner = self.inner.read().await;
        let session_id = payload.session_id.ok_or(LiveError::MissingSession)?;
        let user_id = payload
            .user_id
            .or_else(|| inner.bound_user(connection).map(|u| u.user_id.clone()));
        let event = ServerEvent::WhiteboardChanged {
            elements: payload.elements,
            app_state: payload.app_state,
            user_id,
        };
        inner.broadcast(&session_id, &event, Some(connection));
        Ok(SuccessAck::ok())
    }

    pub async fn webrtc_join(&self, connection: ConnectionId, payload: JoinSession) -> Result<PeerJoinAck, LiveError> {
        let mut inner = self.inner.write().await;
        let session_id = payload.session_id.clone().ok_or(LiveError::MissingSessionOrUser)?;
        let (user_id, user_name) = inner
            .identity(connection, &payload)
            .ok_or(LiveError::MissingSessionOrUser)?;

        tracing::info!("WebRTC: user {} joining voice channel in session {}", user_id, session_id);

        let room = inner.rooms.entry(session_id.clone()).or_default();
        room.peers.insert(
            user_id.clone(),
            Member {
                connection,
                user_name: user_name.clone(),
            },
        );
        let mut peers: Vec<ParticipantInfo> = room
            .peers
            .iter()
            .filter(|(id, _)| **id != user_id)
            .map(|(id, member)| ParticipantInfo {
                user_id: id.clone(),
                user_name: member.user_name.clone(),
            })
            .collect();
        peers.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        inner.broadcast(&session_id, &ServerEvent::PeerJoined { user_id, user_name }, Some(connection));
        Ok(PeerJoinAck { success: true, peers })
    }

    pub async fn webrtc_signal(&self, connection: ConnectionId, payload: WebrtcSignal) -> Result<SuccessAck, LiveError> {
        let inner = self.inner.read().await;
        let (Some(session_id), Some(target)) = (payload.session_id, payload.target_user_id) else {
            return Err(LiveError::MissingSessionOrTarget);
        };
        let target_connection = inner
            .rooms
            .get(&session_id)
            .and_then(|room| room.peers.get(&target))
            .map(|member| member.connection)
            .ok_or(LiveError::TargetNotFound)?;

        let from_user_id = match inner.bound_user(connection) {
            Some(user) => Some(user.user_id.clone()),
            None => payload.from_user_id,
        };
        tracing::debug!("WebRTC signal forwarded from {:?} to {}", from_user_id, target);
        inner.send_to(
            target_connection,
            ServerEvent::WebrtcSignal {
                from_user_id,
                signal: payload.signal,
            },
        );
        Ok(SuccessAck::ok())
    }

    pub async fn webrtc_leave(&self, connection: ConnectionId, payload: WebrtcLeave) -> Result<SuccessAck, LiveError> {
        let mut inner = self.inner.write().await;
        let user_id = match inner.bound_user(connection) {
            Some(user) => Some(user.user_id.clone()),
            None => payload.user_id,
        };
        let (Some(session_id), Some(user_id)) = (payload.session_id, user_id) else {
            return Err(LiveError::PeerNotFound);
        };
        let removed = inner
            .rooms
            .get_mut(&session_id)
            .and_then(|room| room.peers.remove(&user_id))
            .is_some();
        if !removed {
            return Err(LiveError::PeerNotFound);
        }

        tracing::info!("WebRTC: user {} left voice channel in session {}", user_id, session_id);
        inner.broadcast(&session_id, &ServerEvent::PeerLeft { user_id }, None);
        inner.prune_rooms();
        Ok(SuccessAck::ok())
    }

    /// Tell everyone in the room that the persisted session changed state.
    pub async fn notify_session_status(&self, session_id: &str, status: SessionStatus) -> usize {
        let inner = self.inner.read().await;
        let event = ServerEvent::SessionStatus {
            session_id: session_id.to_string(),
            status: status.as_str().to_string(),
        };
        let delivered = inner.broadcast(session_id, &event, None);
        tracing::debug!("Session {} is now {} ({} connections notified)", session_id, status, delivered);
        delivered
    }

    /// Run a decoded event and return the acknowledgement payload.
    pub async fn dispatch(&self, connection: ConnectionId, event: ClientEvent) -> Value {
        let result = match event {
            ClientEvent::JoinSession(p) => self.join_session(connection, p).await.map(to_value),
            ClientEvent::SendMessage(p) => self.send_message(connection, p).await.map(to_value),
            ClientEvent::WhiteboardUpdate(p) => self.whiteboard_update(connection, p).await.map(to_value),
            ClientEvent::WebrtcJoin(p) => self.webrtc_join(connection, p).await.map(to_value),
            ClientEvent::WebrtcSignal(p) => self.webrtc_signal(connection, p).await.map(to_value),
            ClientEvent::WebrtcLeave(p) => self.webrtc_leave(connection, p).await.map(to_value),
        };
        result.unwrap_or_else(|e| {
            tracing::debug!("Live request from {} rejected: {}", connection, e);
            to_value(ErrorAck { error: e.to_string() })
        })
    }

    /// Handle one text frame from `connection`, replying on its own channel.
    ///
    /// Frames that carry an `ack` id get an `ack` event with the result.
    /// Frames that cannot be decoded get an `error` event.
    pub async fn handle_text(&self, connection: ConnectionId, text: &str) {
        let frame = match ClientFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Malformed frame from {}: {}", connection, e);
                self.reply(connection, ServerEvent::error(e.to_string())).await;
                return;
            }
        };
        let event = match ClientEvent::from_frame(&frame) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Rejected frame from {}: {}", connection, e);
                self.reply(connection, ServerEvent::error(e.to_string())).await;
                return;
            }
        };

        tracing::debug!("Live event {} from {}", frame.event, connection);
        let result = self.dispatch(connection, event).await;
        if let Some(id) = frame.ack {
            self.reply(connection, ServerEvent::ack(id, result)).await;
        }
    }

    async fn reply(&self, connection: ConnectionId, event: ServerEvent) {
        self.inner.read().await.send_to(connection, event);
    }

    /// Disconnect sockets whose writer has gone away and drop empty rooms.
    pub async fn sweep(&self) -> usize {
        let mut inner = self.inner.write().await;
        let closed: Vec<ConnectionId> = inner
            .connections
            .iter()
            .filter(|(_, c)| c.tx.is_closed())
            .map(|(id, _)| *id)
            .collect();
        for connection in &closed {
            inner.detach(*connection);
            inner.connections.remove(connection);
        }
        inner.prune_rooms();
        closed.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    /// Chat participants currently in a session, sorted by user id.
    pub async fn participants(&self, session_id: &str) -> Vec<ParticipantInfo> {
        self.inner
            .read()
            .await
            .rooms
            .get(session_id)
            .map(Room::participant_list)
            .unwrap_or_default()
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }))
}
