use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::hub::Hub;

/// Opaque connection identifier, minted by the transport at upgrade time.
pub type ConnId = String;

/// Outbound frame channel for one connected client.
pub type Tx = mpsc::UnboundedSender<String>;

/* ------------ shared handles ------------ */
pub type SharedHub = Arc<Mutex<Hub>>;
pub type Clients = Arc<RwLock<HashMap<ConnId, Tx>>>;

/* ------------ connection registry ------------ */

/// Membership state for one live client link.
#[derive(Debug, Default, Clone)]
pub struct Connection {
    /// Display name, set on first join and overwritten by later joins.
    pub name: String,
    /// Rooms this connection belongs to, in join order, no duplicates.
    pub joined_rooms: Vec<String>,
    /// The room that receives messages sent without an explicit room name.
    /// `None` only transiently while a leave falls back to another room.
    pub active_room: Option<String>,
}

#[derive(Debug, Default)]
pub struct Registry {
    conns: HashMap<ConnId, Connection>,
}

impl Registry {
    /// Get-or-create the record for `id`, starting from empty state.
    pub fn register(&mut self, id: ConnId) -> &mut Connection {
        self.conns.entry(id).or_default()
    }

    pub fn get(&self, id: &ConnId) -> Option<&Connection> {
        self.conns.get(id)
    }

    pub fn get_mut(&mut self, id: &ConnId) -> Option<&mut Connection> {
        self.conns.get_mut(id)
    }

    pub fn remove(&mut self, id: &ConnId) -> Option<Connection> {
        self.conns.remove(id)
    }
}

/* ------------ room directory ------------ */

/// Room name -> member connection ids, insertion order preserved per room.
#[derive(Debug, Default)]
pub struct Rooms {
    rooms: BTreeMap<String, Vec<ConnId>>,
}

impl Rooms {
    /// Insert `id` into `room`, creating the room on first membership.
    /// No-op if already a member.
    pub fn add_member(&mut self, room: &str, id: &ConnId) {
        let members = self.rooms.entry(room.to_owned()).or_default();
        if !members.contains(id) {
            members.push(id.clone());
        }
    }

    /// Remove `id` from `room`; no-op if absent. Rooms with no members
    /// left are pruned.
    pub fn remove_member(&mut self, room: &str, id: &ConnId) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.retain(|m| m != id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }

    pub fn members(&self, room: &str) -> &[ConnId] {
        self.rooms.get(room).map_or(&[], Vec::as_slice)
    }

    pub fn member_count(&self, room: &str) -> usize {
        self.members(room).len()
    }

    /// Room names in deterministic (lexicographic) order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_keep_join_order() {
        let mut rooms = Rooms::default();
        rooms.add_member("lobby", &"c".to_string());
        rooms.add_member("lobby", &"a".to_string());
        rooms.add_member("lobby", &"b".to_string());
        assert_eq!(rooms.members("lobby"), ["c", "a", "b"]);
    }

    #[test]
    fn add_member_is_idempotent() {
        let mut rooms = Rooms::default();
        rooms.add_member("lobby", &"a".to_string());
        rooms.add_member("lobby", &"a".to_string());
        assert_eq!(rooms.member_count("lobby"), 1);
    }

    #[test]
    fn remove_prunes_empty_rooms() {
        let mut rooms = Rooms::default();
        rooms.add_member("lobby", &"a".to_string());
        rooms.remove_member("lobby", &"a".to_string());
        assert_eq!(rooms.member_count("lobby"), 0);
        assert_eq!(rooms.names().count(), 0);
        // removing from a room that never existed is fine too
        rooms.remove_member("nowhere", &"a".to_string());
    }
}
