//! Room registry.
//!
//! All state is ephemeral and held in memory. On server restart every room
//! is gone and clients see "room not found".

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::barrier::{Barrier, OnDisconnect};
use crate::commitment::Commitment;
use crate::error::RendezvousError;
use crate::protocol::Verdict;
use crate::room_id::RoomId;

/// One comparison session between two participants.
#[derive(Debug)]
pub struct Room {
    /// Releases once both participants are present.
    pub join: Barrier<(), ()>,
    /// Releases once both commitments are in.
    pub submit: Barrier<Commitment, Verdict>,
    /// Set when the join barrier releases. Gates the submit barrier.
    pub ready: bool,
    /// When the room was created.
    pub created_at: Instant,
}

impl Room {
    pub fn new() -> Self {
        Self {
            join: Barrier::new(OnDisconnect::Reset),
            submit: Barrier::new(OnDisconnect::DestroyRoom),
            ready: false,
            created_at: Instant::now(),
        }
    }

    /// Whether anyone is currently held on either barrier.
    pub fn has_waiter(&self) -> bool {
        self.join.is_waiting() || self.submit.is_waiting()
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a room survives the critical section that just ran on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retain {
    Keep,
    Remove,
}

/// Live rooms indexed by id.
///
/// Every mutation goes through a single map entry, so the entry's shard
/// lock is the per-room critical section. Only the rendezvous service
/// mutates the store.
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: DashMap<RoomId, Room>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Mint a fresh id and store an empty room under it.
    pub(crate) fn create(&self) -> Result<RoomId, RendezvousError> {
        let mut rng = rand::thread_rng();
        loop {
            let room_id = RoomId::generate(&mut rng, |id| self.rooms.contains_key(id))?;
            // Another creator may have claimed the same id in between.
            if let Entry::Vacant(vacant) = self.rooms.entry(room_id) {
                vacant.insert(Room::new());
                return Ok(room_id);
            }
        }
    }

    /// Run `f` on the room while holding its entry lock.
    ///
    /// Returns `None` if the room does not exist. The room is removed if `f`
    /// asks for it.
    pub(crate) fn update<R>(
        &self,
        room_id: &RoomId,
        f: impl FnOnce(&mut Room) -> (R, Retain),
    ) -> Option<R> {
        match self.rooms.entry(*room_id) {
            Entry::Occupied(mut occupied) => {
                let (result, retain) = f(occupied.get_mut());
                if retain == Retain::Remove {
                    occupied.remove();
                }
                Some(result)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Drop rooms older than `ttl` that nobody is waiting in.
    ///
    /// Returns the number of rooms removed.
    pub(crate) fn cleanup_expired(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let before = self.rooms.len();
        self.rooms
            .retain(|_, room| room.has_waiter() || now.duration_since(room.created_at) < ttl);
        before.saturating_sub(self.rooms.len())
    }

    #[cfg(test)]
    pub(crate) fn inspect<R>(&self, room_id: &RoomId, f: impl FnOnce(&Room) -> R) -> Option<R> {
        self.rooms.get(room_id).map(|room| f(room.value()))
    }
}
