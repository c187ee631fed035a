//! Participant side of the comparison.
//!
//! ```text
//! host:   salt <- random, room <- create_room, hand out {room, salt}
//! both:   join(room)                      (held until the other joins)
//! both:   c = H(H(secret) ++ salt)
//! both:   submit(room, c) -> verdict      (held until the other submits)
//! ```
//!
//! The service only ever sees the room id and `c`.

use tracing::{debug, info};

use crate::commitment::{Commitment, Salt};
use crate::error::RendezvousError;
use crate::protocol::{Invite, Verdict};
use crate::room_id::RoomId;

/// Transport to a rendezvous service.
///
/// Implemented in-process by [`crate::RendezvousService`] and over HTTP by
/// [`crate::RendezvousClient`].
#[allow(async_fn_in_trait)]
pub trait Rendezvous {
    type Error: std::error::Error + From<RendezvousError>;

    async fn create_room(&self) -> Result<RoomId, Self::Error>;

    async fn join(&self, room_id: &RoomId) -> Result<(), Self::Error>;

    async fn submit(&self, room_id: &RoomId, commitment: &Commitment)
        -> Result<Verdict, Self::Error>;
}

/// Drives one participant through the protocol.
#[derive(Debug)]
pub struct EqualityPeer<'a, R> {
    rendezvous: &'a R,
}

impl<'a, R: Rendezvous> EqualityPeer<'a, R> {
    pub fn new(rendezvous: &'a R) -> Self {
        Self { rendezvous }
    }

    /// Open a room and produce the invite to pass to the other participant.
    ///
    /// The salt is generated locally and must only travel with the invite.
    pub async fn host(&self) -> Result<Invite, R::Error> {
        let salt = Salt::generate();
        let room_id = self.rendezvous.create_room().await?;
        info!(%room_id, "Hosting comparison");
        Ok(Invite { room_id, salt })
    }

    /// Join the invite's room and compare `secret` against the other side.
    ///
    /// Surrounding whitespace in `secret` is ignored.
    pub async fn compare(&self, invite: &Invite, secret: &str) -> Result<Verdict, R::Error> {
        self.join(invite).await?;
        self.submit(invite, secret).await
    }

    /// Wait until the other participant is in the room.
    pub async fn join(&self, invite: &Invite) -> Result<(), R::Error> {
        let room_id = &invite.room_id;
        debug!(%room_id, "Joining");
        self.rendezvous.join(room_id).await?;
        debug!(%room_id, "Both participants present");
        Ok(())
    }

    /// Commit to `secret` and wait for the verdict. Only valid after [`Self::join`].
    pub async fn submit(&self, invite: &Invite, secret: &str) -> Result<Verdict, R::Error> {
        let room_id = &invite.room_id;
        let commitment = Commitment::derive(secret.trim(), &invite.salt);
        let verdict = self.rendezvous.submit(room_id, &commitment).await?;

        info!(%room_id, matched = verdict.matched, "Comparison finished");
        Ok(verdict)
    }
}
