use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::{
    events::{ClientEvent, Outbound, Target},
    hub::Hub,
    state::{Clients, ConnId, SharedHub},
    utils::room,
};

pub fn router() -> Router {
    Router::new().route("/chat", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(hub): Extension<SharedHub>,
    Extension(clients): Extension<Clients>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_session(socket, hub, clients))
}

/* ---------------- per connection ---------------- */

async fn client_session(socket: WebSocket, hub: SharedHub, clients: Clients) {
    let id: ConnId = uuid::Uuid::new_v4().to_string();
    let (mut sink, mut stream) = socket.split();

    // frames for this client funnel through a channel so room broadcasts
    // never wait on a slow socket
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    clients.write().await.insert(id.clone(), tx);
    debug!("client connected: {id}");

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(raw) = msg else { continue };
        let event = match serde_json::from_str::<ClientEvent>(&raw) {
            Ok(ev) => normalized(ev),
            Err(err) => {
                // out-of-contract input gets no reply
                warn!("client {id} sent an unparseable frame: {err}");
                continue;
            }
        };
        let deliveries = {
            let mut hub = hub.lock().await;
            let outbound = hub.apply(&id, event, Utc::now());
            expand(&hub, outbound)
        };
        deliver(&clients, deliveries).await;
    }

    // transport closed: drop all memberships and tell the rooms
    let deliveries = {
        let mut hub = hub.lock().await;
        let outbound = hub.disconnect(&id);
        expand(&hub, outbound)
    };
    deliver(&clients, deliveries).await;
    clients.write().await.remove(&id);
    send_task.abort();
    debug!("client disconnected: {id}");
}

/// Caller-side room name contract: names reach the core lowercased with
/// whitespace collapsed; blank names mean "no room given".
fn normalized(event: ClientEvent) -> ClientEvent {
    fn norm(room_name: Option<String>) -> Option<String> {
        room_name
            .map(|r| room::normalize(&r))
            .filter(|r| !r.is_empty())
    }
    match event {
        ClientEvent::JoinRoom { name, room_name } => ClientEvent::JoinRoom {
            name,
            room_name: norm(room_name),
        },
        ClientEvent::LeaveRoom { room_name } => ClientEvent::LeaveRoom {
            room_name: norm(room_name),
        },
        ClientEvent::SwitchRoom { room_name } => ClientEvent::SwitchRoom {
            room_name: norm(room_name),
        },
        ClientEvent::SendChatMessage { message, room_name } => ClientEvent::SendChatMessage {
            message,
            room_name: norm(room_name),
        },
        other => other,
    }
}

/// Expand planned deliveries into concrete (connection, frame) pairs while
/// the hub is still locked, so membership reads match the mutation that
/// produced them.
fn expand(hub: &Hub, outbound: Vec<Outbound>) -> Vec<(ConnId, String)> {
    let mut frames = Vec::new();
    for Outbound { target, event } in outbound {
        let Ok(frame) = serde_json::to_string(&event) else {
            continue;
        };
        match target {
            Target::To(conn) => frames.push((conn, frame)),
            Target::RoomExcept(room, skip) => {
                for member in hub.rooms().members(&room) {
                    if *member != skip {
                        frames.push((member.clone(), frame.clone()));
                    }
                }
            }
        }
    }
    frames
}

async fn deliver(clients: &Clients, frames: Vec<(ConnId, String)>) {
    let map = clients.read().await;
    for (conn, frame) in frames {
        // send fails only for a client that vanished mid-delivery
        if let Some(tx) = map.get(&conn) {
            let _ = tx.send(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_skips_the_triggering_connection() {
        let mut hub = Hub::default();
        let (a, b) = ("a".to_string(), "b".to_string());
        hub.join(&a, "alice", Some("public"));

        let outbound = hub.join(&b, "bob", Some("public"));
        let frames = expand(&hub, outbound);

        // user-joined goes to alice only, the room-joined reply to bob
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, a);
        assert!(frames[0].1.contains(r#""type":"user-joined""#));
        assert_eq!(frames[1].0, b);
        assert!(frames[1].1.contains(r#""type":"room-joined""#));
    }

    #[test]
    fn room_names_are_normalized_before_the_core() {
        let ev = normalized(ClientEvent::JoinRoom {
            name: "alice".into(),
            room_name: Some("  Rust Lang  ".into()),
        });
        assert_eq!(
            ev,
            ClientEvent::JoinRoom {
                name: "alice".into(),
                room_name: Some("rust-lang".into()),
            }
        );

        // blank room names fall through to the default-room rule
        let ev = normalized(ClientEvent::LeaveRoom {
            room_name: Some("   ".into()),
        });
        assert_eq!(ev, ClientEvent::LeaveRoom { room_name: None });
    }
}
