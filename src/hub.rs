//! Presence coordination: the protocol state machine over the connection
//! registry and room directory.
//!
//! Operations mutate both stores together and return the deliveries they
//! produced; they never touch a socket. The transport applies one operation
//! at a time (single lock), so no event ever observes a half-applied
//! mutation.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::events::{ClientEvent, Outbound, ServerEvent};
use crate::state::{ConnId, Registry, Rooms};

/// Fallback room every connection belongs to when nothing else remains.
pub const DEFAULT_ROOM: &str = "public";

#[derive(Debug, Default)]
pub struct Hub {
    registry: Registry,
    rooms: Rooms,
}

impl Hub {
    pub fn new(registry: Registry, rooms: Rooms) -> Self {
        Self { registry, rooms }
    }

    pub fn rooms(&self) -> &Rooms {
        &self.rooms
    }

    /// Member count and display names for a room. Ids without a registry
    /// record are skipped from the name list; the count stays the raw
    /// member count.
    pub fn snapshot(&self, room: &str) -> (usize, Vec<String>) {
        let members = self.rooms.members(room);
        let names = members
            .iter()
            .filter_map(|id| self.registry.get(id))
            .map(|conn| conn.name.clone())
            .collect();
        (members.len(), names)
    }

    /// Dispatch one inbound event. `now` stamps outgoing chat messages.
    pub fn apply(&mut self, id: &ConnId, event: ClientEvent, now: DateTime<Utc>) -> Vec<Outbound> {
        match event {
            ClientEvent::JoinRoom { name, room_name } => {
                self.join(id, &name, room_name.as_deref())
            }
            ClientEvent::LeaveRoom { room_name } => self.leave(id, room_name.as_deref()),
            ClientEvent::SwitchRoom { room_name } => self.switch(id, room_name.as_deref()),
            ClientEvent::SendChatMessage { message, room_name } => {
                self.send_message(id, &message, room_name.as_deref(), now)
            }
            ClientEvent::GetJoinedRooms => self.list_joined_rooms(id),
        }
    }

    pub fn join(&mut self, id: &ConnId, name: &str, room_name: Option<&str>) -> Vec<Outbound> {
        let room = room_name.unwrap_or(DEFAULT_ROOM).to_owned();

        // every join doubles as a rename
        let conn = self.registry.register(id.clone());
        conn.name = name.to_owned();

        if conn.joined_rooms.contains(&room) {
            // refresh: reply with the current snapshot, change nothing else
            let joined_rooms = conn.joined_rooms.clone();
            let (user_count, user_names) = self.snapshot(&room);
            return vec![Outbound::to(
                id,
                ServerEvent::RoomJoined {
                    room,
                    user_count,
                    user_names,
                    joined_rooms,
                    is_current_room: None,
                },
            )];
        }

        self.rooms.add_member(&room, id);
        let Some(conn) = self.registry.get_mut(id) else {
            return Vec::new();
        };
        conn.joined_rooms.push(room.clone());
        // a newly joined room always becomes the active one
        conn.active_room = Some(room.clone());
        let joined_rooms = conn.joined_rooms.clone();

        let (user_count, user_names) = self.snapshot(&room);
        vec![
            Outbound::room_except(
                room.clone(),
                id,
                ServerEvent::UserJoined {
                    name: name.to_owned(),
                    room: room.clone(),
                    user_count,
                    user_names: user_names.clone(),
                },
            ),
            Outbound::to(
                id,
                ServerEvent::RoomJoined {
                    room,
                    user_count,
                    user_names,
                    joined_rooms,
                    is_current_room: Some(true),
                },
            ),
        ]
    }

    pub fn leave(&mut self, id: &ConnId, room_name: Option<&str>) -> Vec<Outbound> {
        let room = room_name.unwrap_or(DEFAULT_ROOM).to_owned();
        let Some(conn) = self.registry.get(id) else {
            return Vec::new();
        };
        if !conn.joined_rooms.contains(&room) {
            return Vec::new();
        }
        let was_active = conn.active_room.as_deref() == Some(room.as_str());
        let name = conn.name.clone();

        self.rooms.remove_member(&room, id);
        let Some(conn) = self.registry.get_mut(id) else {
            return Vec::new();
        };
        conn.joined_rooms.retain(|r| r != &room);
        let joined_rooms = conn.joined_rooms.clone();

        let mut out = Vec::new();
        if self.rooms.member_count(&room) > 0 {
            let (user_count, user_names) = self.snapshot(&room);
            out.push(Outbound::room_except(
                room.clone(),
                id,
                ServerEvent::UserLeft {
                    name,
                    room: room.clone(),
                    user_count,
                    user_names,
                },
            ));
        }

        if was_active && !joined_rooms.is_empty() {
            // fall back to the oldest room still joined
            let next = joined_rooms[0].clone();
            if let Some(conn) = self.registry.get_mut(id) {
                conn.active_room = Some(next.clone());
            }
            out.push(Outbound::to(id, self.room_switched(&next, joined_rooms)));
        } else if was_active {
            // nothing left: rejoin the default room. The user-left above
            // already told everyone what happened, so no user-joined here.
            self.rooms.add_member(DEFAULT_ROOM, id);
            if let Some(conn) = self.registry.get_mut(id) {
                conn.joined_rooms.push(DEFAULT_ROOM.to_owned());
                conn.active_room = Some(DEFAULT_ROOM.to_owned());
            }
            out.push(Outbound::to(
                id,
                self.room_switched(DEFAULT_ROOM, vec![DEFAULT_ROOM.to_owned()]),
            ));
        } else {
            out.push(Outbound::to(id, ServerEvent::RoomsUpdated { joined_rooms }));
        }
        out
    }

    pub fn switch(&mut self, id: &ConnId, room_name: Option<&str>) -> Vec<Outbound> {
        let room = room_name.unwrap_or(DEFAULT_ROOM).to_owned();
        let Some(conn) = self.registry.get_mut(id) else {
            return Vec::new();
        };
        // switching requires a prior join
        if !conn.joined_rooms.contains(&room) {
            return Vec::new();
        }
        conn.active_room = Some(room.clone());
        let joined_rooms = conn.joined_rooms.clone();
        vec![Outbound::to(id, self.room_switched(&room, joined_rooms))]
    }

    pub fn send_message(
        &self,
        id: &ConnId,
        message: &str,
        room_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<Outbound> {
        let Some(conn) = self.registry.get(id) else {
            return Vec::new();
        };
        let room = room_name
            .map(str::to_owned)
            .or_else(|| conn.active_room.clone())
            .unwrap_or_else(|| DEFAULT_ROOM.to_owned());
        // only members may post
        if !conn.joined_rooms.contains(&room) {
            return Vec::new();
        }
        vec![Outbound::room_except(
            room.clone(),
            id,
            ServerEvent::ChatMessage {
                message: message.to_owned(),
                name: conn.name.clone(),
                timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
                room,
            },
        )]
    }

    /// Drop every membership of `id`, telling each room it left, then
    /// forget the connection. No reply: the connection is gone.
    pub fn disconnect(&mut self, id: &ConnId) -> Vec<Outbound> {
        let Some(conn) = self.registry.remove(id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for room in conn.joined_rooms {
            self.rooms.remove_member(&room, id);
            if self.rooms.member_count(&room) > 0 {
                let (user_count, user_names) = self.snapshot(&room);
                out.push(Outbound::room_except(
                    room.clone(),
                    id,
                    ServerEvent::UserLeft {
                        name: conn.name.clone(),
                        room,
                        user_count,
                        user_names,
                    },
                ));
            }
        }
        out
    }

    pub fn list_joined_rooms(&self, id: &ConnId) -> Vec<Outbound> {
        let Some(conn) = self.registry.get(id) else {
            return Vec::new();
        };
        vec![Outbound::to(
            id,
            ServerEvent::JoinedRoomsList {
                joined_rooms: conn.joined_rooms.clone(),
            },
        )]
    }

    fn room_switched(&self, room: &str, joined_rooms: Vec<String>) -> ServerEvent {
        let (user_count, user_names) = self.snapshot(room);
        ServerEvent::RoomSwitched {
            room: room.to_owned(),
            user_count,
            user_names,
            joined_rooms,
        }
    }
}
