use serde::{Deserialize, Serialize};

use crate::state::ConnId;

/// Inbound client requests. One JSON object per WebSocket text frame,
/// tagged with a kebab-case `type` field; payload fields are camelCase.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinRoom {
        name: String,
        #[serde(default)]
        room_name: Option<String>,
    },
    LeaveRoom {
        #[serde(default)]
        room_name: Option<String>,
    },
    SwitchRoom {
        #[serde(default)]
        room_name: Option<String>,
    },
    SendChatMessage {
        message: String,
        #[serde(default)]
        room_name: Option<String>,
    },
    GetJoinedRooms,
}

/// Outbound notifications, same tagging scheme as [`ClientEvent`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Reply to a join request: snapshot of the joined room.
    RoomJoined {
        room: String,
        user_count: usize,
        user_names: Vec<String>,
        joined_rooms: Vec<String>,
        /// Present (and true) only when the join made this room active.
        #[serde(skip_serializing_if = "Option::is_none")]
        is_current_room: Option<bool>,
    },
    /// Someone else entered a room you are in.
    UserJoined {
        name: String,
        room: String,
        user_count: usize,
        user_names: Vec<String>,
    },
    /// Someone else left a room you are in.
    UserLeft {
        name: String,
        room: String,
        user_count: usize,
        user_names: Vec<String>,
    },
    /// Your active room changed; carries the new active room's snapshot.
    RoomSwitched {
        room: String,
        user_count: usize,
        user_names: Vec<String>,
        joined_rooms: Vec<String>,
    },
    /// Your joined-rooms list changed without an active-room change.
    RoomsUpdated { joined_rooms: Vec<String> },
    ChatMessage {
        message: String,
        name: String,
        timestamp: String,
        room: String,
    },
    JoinedRoomsList { joined_rooms: Vec<String> },
}

/* ------------ delivery plan ------------ */

/// Where one outbound event goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Reply to a single connection.
    To(ConnId),
    /// Broadcast to every current member of the room except one connection,
    /// so a client never receives the event its own request triggered.
    RoomExcept(String, ConnId),
}

/// One planned delivery. Protocol operations return these in order; the
/// transport expands targets against the room directory and sends.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub target: Target,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn to(id: &ConnId, event: ServerEvent) -> Self {
        Self {
            target: Target::To(id.clone()),
            event,
        }
    }

    pub fn room_except(room: impl Into<String>, skip: &ConnId, event: ServerEvent) -> Self {
        Self {
            target: Target::RoomExcept(room.into(), skip.clone()),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_use_wire_names() {
        let ev: ClientEvent =
            serde_json::from_str(r#"{"type":"join-room","name":"alice","roomName":"rust"}"#)
                .unwrap();
        assert_eq!(
            ev,
            ClientEvent::JoinRoom {
                name: "alice".into(),
                room_name: Some("rust".into()),
            }
        );

        // roomName is optional everywhere it appears
        let ev: ClientEvent = serde_json::from_str(r#"{"type":"leave-room"}"#).unwrap();
        assert_eq!(ev, ClientEvent::LeaveRoom { room_name: None });

        let ev: ClientEvent = serde_json::from_str(r#"{"type":"get-joined-rooms"}"#).unwrap();
        assert_eq!(ev, ClientEvent::GetJoinedRooms);
    }

    #[test]
    fn server_events_use_wire_names() {
        let v = serde_json::to_value(ServerEvent::UserJoined {
            name: "bob".into(),
            room: "public".into(),
            user_count: 2,
            user_names: vec!["alice".into(), "bob".into()],
        })
        .unwrap();
        assert_eq!(v["type"], "user-joined");
        assert_eq!(v["userCount"], 2);
        assert_eq!(v["userNames"][0], "alice");
    }

    #[test]
    fn refresh_join_reply_omits_current_room_flag() {
        let v = serde_json::to_value(ServerEvent::RoomJoined {
            room: "public".into(),
            user_count: 1,
            user_names: vec!["alice".into()],
            joined_rooms: vec!["public".into()],
            is_current_room: None,
        })
        .unwrap();
        assert!(v.get("isCurrentRoom").is_none());
        assert_eq!(v["joinedRooms"][0], "public");
    }
}
