//! Rendezvous orchestration.
//!
//! A room passes through two barriers. `join` holds the first participant
//! until the second one shows up. `submit` then holds the first commitment
//! until the second arrives, compares them, releases both callers with the
//! same verdict and removes the room.
//!
//! A held call that is abandoned (the client hung up and the request
//! future was dropped, or the hold deadline passed) withdraws itself through
//! a drop guard. On the join barrier that simply frees the slot again. On
//! the submit barrier the room is destroyed, and the other participant will
//! see "room not found".

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::barrier::{Arrival, BarrierError, OnDisconnect, Ticket};
use crate::commitment::Commitment;
use crate::error::RendezvousError;
use crate::peer::Rendezvous;
use crate::protocol::Verdict;
use crate::room_id::RoomId;
use crate::state::{Retain, RoomStore};

/// Default deadline for a held request.
pub const DEFAULT_HOLD_TIMEOUT: Duration = Duration::from_secs(30);

/// Default age after which an idle room is dropped.
pub const DEFAULT_ROOM_TTL: Duration = Duration::from_secs(3600);

/// Tunables for [`RendezvousService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How long a join or submit may be held. `None` waits until the
    /// transport gives up.
    pub hold_timeout: Option<Duration>,
    /// Rooms older than this with nobody waiting are removed by
    /// [`RendezvousService::cleanup_expired`].
    pub room_ttl: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            hold_timeout: Some(DEFAULT_HOLD_TIMEOUT),
            room_ttl: DEFAULT_ROOM_TTL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Join,
    Submit,
}

/// Pairs participants and decides equality. Owns the room store.
#[derive(Debug)]
pub struct RendezvousService {
    rooms: RoomStore,
    config: ServiceConfig,
    next_ticket: AtomicU64,
}

impl Default for RendezvousService {
    fn default() -> Self {
        Self::new(ServiceConfig::default())
    }
}

impl RendezvousService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            rooms: RoomStore::new(),
            config,
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Number of rooms currently alive.
    pub fn live_rooms(&self) -> usize {
        self.rooms.len()
    }

    /// Create an empty room and return its id.
    pub fn create_room(&self) -> Result<RoomId, RendezvousError> {
        let room_id = self.rooms.create()?;
        info!(%room_id, "Room created");
        Ok(room_id)
    }

    /// Wait until a second participant joins `room_id`.
    pub async fn join(&self, room_id: &RoomId) -> Result<(), RendezvousError> {
        let ticket = self.ticket();
        let arrival = self
            .rooms
            .update(room_id, |room| {
                let arrival = room.join.arrive(ticket, (), |_, _| ());
                if matches!(arrival, Ok(Arrival::Released(()))) {
                    room.ready = true;
                }
                (arrival, Retain::Keep)
            })
            .ok_or(RendezvousError::NotFound(*room_id))?
            .map_err(|e| barrier_failure(room_id, Phase::Join, e))?;

        match arrival {
            Arrival::Released(()) => {
                info!(%room_id, "Both participants joined");
                Ok(())
            }
            Arrival::Held(release) => {
                debug!(%room_id, ticket, "Waiting for the other participant to join");
                self.hold(room_id, Phase::Join, ticket, release).await
            }
        }
    }

    /// Submit a commitment and wait for the verdict.
    ///
    /// The room is gone once this returns a verdict.
    pub async fn submit(
        &self,
        room_id: &RoomId,
        commitment: Commitment,
    ) -> Result<Verdict, RendezvousError> {
        let ticket = self.ticket();
        let arrival = self
            .rooms
            .update(room_id, |room| {
                if !room.ready {
                    return (Err(RendezvousError::NotReady(*room_id)), Retain::Keep);
                }
                let arrival = room
                    .submit
                    .arrive(ticket, commitment, |first, second| {
                        Verdict::new(first == second)
                    });
                let retain = match arrival {
                    Ok(Arrival::Released(_)) | Err(BarrierError::PeerVanished) => Retain::Remove,
                    _ => Retain::Keep,
                };
                (
                    arrival.map_err(|e| barrier_failure(room_id, Phase::Submit, e)),
                    retain,
                )
            })
            .ok_or(RendezvousError::NotFound(*room_id))??;

        match arrival {
            Arrival::Released(verdict) => {
                info!(%room_id, matched = verdict.matched, "Comparison complete, room closed");
                Ok(verdict)
            }
            Arrival::Held(release) => {
                debug!(%room_id, ticket, "Waiting for the other participant to submit");
                self.hold(room_id, Phase::Submit, ticket, release).await
            }
        }
    }

    /// Remove idle rooms older than the configured TTL.
    pub fn cleanup_expired(&self) -> usize {
        let removed = self.rooms.cleanup_expired(self.config.room_ttl);
        if removed > 0 {
            info!(removed, "Expired idle rooms");
        }
        removed
    }

    fn ticket(&self) -> Ticket {
        self.next_ticket.fetch_add(1, Ordering::Relaxed)
    }

    async fn hold<O>(
        &self,
        room_id: &RoomId,
        phase: Phase,
        ticket: Ticket,
        release: oneshot::Receiver<O>,
    ) -> Result<O, RendezvousError> {
        let guard = HoldGuard {
            service: self,
            room_id: *room_id,
            phase,
            ticket,
            armed: true,
        };

        let outcome = match self.config.hold_timeout {
            Some(limit) => match tokio::time::timeout(limit, release).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(%room_id, ?phase, "Timed out waiting for the other participant");
                    return Err(RendezvousError::Timeout);
                }
            },
            None => release.await,
        };
        guard.disarm();

        // The sender only disappears without a value if the room was torn down.
        outcome.map_err(|_| RendezvousError::NotFound(*room_id))
    }

    /// Withdraw a held participant and apply the barrier's disconnect policy.
    fn withdraw(&self, room_id: &RoomId, phase: Phase, ticket: Ticket) {
        let policy = self
            .rooms
            .update(room_id, |room| {
                let policy = match phase {
                    Phase::Join => room.join.cancel(ticket),
                    Phase::Submit => room.submit.cancel(ticket),
                };
                let retain = match policy {
                    Some(OnDisconnect::DestroyRoom) => Retain::Remove,
                    _ => Retain::Keep,
                };
                (policy, retain)
            })
            .flatten();

        match policy {
            Some(OnDisconnect::Reset) => {
                info!(%room_id, ?phase, "Waiting participant left, room is joinable again")
            }
            Some(OnDisconnect::DestroyRoom) => {
                info!(%room_id, ?phase, "Waiting participant left, room destroyed")
            }
            None => {}
        }
    }
}

fn barrier_failure(room_id: &RoomId, phase: Phase, err: BarrierError) -> RendezvousError {
    match err {
        BarrierError::AlreadyReleased => {
            warn!(%room_id, ?phase, "Extra arrival at a released barrier");
            RendezvousError::Internal(format!("{phase:?} barrier of room {room_id} already released"))
        }
        BarrierError::PeerVanished => {
            info!(%room_id, ?phase, "Other participant vanished, room destroyed");
            RendezvousError::NotFound(*room_id)
        }
    }
}

/// Withdraws a held call from its barrier unless disarmed.
struct HoldGuard<'a> {
    service: &'a RendezvousService,
    room_id: RoomId,
    phase: Phase,
    ticket: Ticket,
    armed: bool,
}

impl HoldGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for HoldGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.service
                .withdraw(&self.room_id, self.phase, self.ticket);
        }
    }
}

impl Rendezvous for RendezvousService {
    type Error = RendezvousError;

    async fn create_room(&self) -> Result<RoomId, Self::Error> {
        RendezvousService::create_room(self)
    }

    async fn join(&self, room_id: &RoomId) -> Result<(), Self::Error> {
        RendezvousService::join(self, room_id).await
    }

    async fn submit(&self, room_id: &RoomId, commitment: &Commitment) -> Result<Verdict, Self::Error> {
        RendezvousService::submit(self, room_id, commitment.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commitment::Salt;

    fn service() -> RendezvousService {
        RendezvousService::new(ServiceConfig {
            hold_timeout: None,
            ..Default::default()
        })
    }

    fn commit(secret: &str, salt: &Salt) -> Commitment {
        Commitment::derive(secret, salt)
    }

    /// Yield until someone is held on the given barrier.
    async fn until_waiting(svc: &RendezvousService, room_id: &RoomId, phase: Phase) {
        loop {
            let waiting = svc.rooms.inspect(room_id, |room| match phase {
                Phase::Join => room.join.is_waiting(),
                Phase::Submit => room.submit.is_waiting(),
            });
            if waiting == Some(true) {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    async fn joined_room(svc: &RendezvousService) -> RoomId {
        let room_id = svc.create_room().unwrap();
        let (a, b) = tokio::join!(svc.join(&room_id), svc.join(&room_id));
        a.unwrap();
        b.unwrap();
        room_id
    }

    #[tokio::test]
    async fn test_matching_secrets() {
        let svc = service();
        let salt = Salt::generate();
        let room_id = joined_room(&svc).await;

        let (a, b) = tokio::join!(
            svc.submit(&room_id, commit("hello", &salt)),
            svc.submit(&room_id, commit("hello", &salt)),
        );
        assert_eq!(a.unwrap(), Verdict::new(true));
        assert_eq!(b.unwrap(), Verdict::new(true));

        // Single use
        assert_eq!(svc.join(&room_id).await, Err(RendezvousError::NotFound(room_id)));
        assert_eq!(
            svc.submit(&room_id, commit("hello", &salt)).await,
            Err(RendezvousError::NotFound(room_id))
        );
        assert_eq!(svc.live_rooms(), 0);
    }

    #[tokio::test]
    async fn test_different_secrets() {
        let svc = service();
        let salt = Salt::generate();
        let room_id = joined_room(&svc).await;

        let (a, b) = tokio::join!(
            svc.submit(&room_id, commit("hello", &salt)),
            svc.submit(&room_id, commit("world", &salt)),
        );
        assert_eq!(a.unwrap(), Verdict::new(false));
        assert_eq!(b.unwrap(), Verdict::new(false));
        assert!(!svc.rooms.contains(&room_id));
    }

    #[tokio::test]
    async fn test_join_unknown_room_is_immediate() {
        let svc = service();
        let missing = RoomId::parse("ZZZZZZZZ").unwrap();
        assert_eq!(svc.join(&missing).await, Err(RendezvousError::NotFound(missing)));
    }

    #[tokio::test]
    async fn test_submit_before_ready() {
        let svc = Arc::new(service());
        let salt = Salt::generate();
        let room_id = svc.create_room().unwrap();

        // Nobody joined
        assert_eq!(
            svc.submit(&room_id, commit("hello", &salt)).await,
            Err(RendezvousError::NotReady(room_id))
        );

        // Only one joined
        let joiner = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.join(&room_id).await })
        };
        until_waiting(&svc, &room_id, Phase::Join).await;
        assert_eq!(
            svc.submit(&room_id, commit("hello", &salt)).await,
            Err(RendezvousError::NotReady(room_id))
        );

        // NotReady left no trace; the room still pairs normally
        svc.join(&room_id).await.unwrap();
        joiner.await.unwrap().unwrap();
        let (a, b) = tokio::join!(
            svc.submit(&room_id, commit("hello", &salt)),
            svc.submit(&room_id, commit("hello", &salt)),
        );
        assert!(a.unwrap().matched && b.unwrap().matched);
    }

    #[tokio::test]
    async fn test_join_disconnect_is_recoverable() {
        let svc = Arc::new(service());
        let room_id = svc.create_room().unwrap();

        let abandoned = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.join(&room_id).await })
        };
        until_waiting(&svc, &room_id, Phase::Join).await;
        abandoned.abort();
        assert!(abandoned.await.unwrap_err().is_cancelled());

        assert_eq!(svc.rooms.inspect(&room_id, |room| room.join.is_waiting()), Some(false));

        // A fresh pair still gets through
        let (a, b) = tokio::join!(svc.join(&room_id), svc.join(&room_id));
        a.unwrap();
        b.unwrap();
        assert_eq!(svc.rooms.inspect(&room_id, |room| room.ready), Some(true));
    }

    #[tokio::test]
    async fn test_submit_disconnect_destroys_room() {
        let svc = Arc::new(service());
        let salt = Salt::generate();
        let room_id = joined_room(&svc).await;

        let abandoned = {
            let svc = Arc::clone(&svc);
            let commitment = commit("hello", &salt);
            tokio::spawn(async move { svc.submit(&room_id, commitment).await })
        };
        until_waiting(&svc, &room_id, Phase::Submit).await;
        abandoned.abort();
        let _ = abandoned.await;

        assert_eq!(
            svc.submit(&room_id, commit("hello", &salt)).await,
            Err(RendezvousError::NotFound(room_id))
        );
        assert_eq!(svc.join(&room_id).await, Err(RendezvousError::NotFound(room_id)));
    }

    #[tokio::test]
    async fn test_third_join_fails_closed() {
        let svc = service();
        let salt = Salt::generate();
        let room_id = joined_room(&svc).await;

        assert!(matches!(
            svc.join(&room_id).await,
            Err(RendezvousError::Internal(_))
        ));

        // The real pair is unaffected
        let (a, b) = tokio::join!(
            svc.submit(&room_id, commit("same", &salt)),
            svc.submit(&room_id, commit("same", &salt)),
        );
        assert!(a.unwrap().matched && b.unwrap().matched);

        // After completion, the stale retry sees the room is gone
        assert_eq!(svc.join(&room_id).await, Err(RendezvousError::NotFound(room_id)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_timeout_resets_room() {
        let svc = RendezvousService::new(ServiceConfig {
            hold_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let room_id = svc.create_room().unwrap();

        assert_eq!(svc.join(&room_id).await, Err(RendezvousError::Timeout));
        assert_eq!(svc.rooms.inspect(&room_id, |room| room.join.is_waiting()), Some(false));

        let (a, b) = tokio::join!(svc.join(&room_id), svc.join(&room_id));
        a.unwrap();
        b.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_timeout_destroys_room() {
        let svc = RendezvousService::new(ServiceConfig {
            hold_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let salt = Salt::generate();
        let room_id = joined_room(&svc).await;

        assert_eq!(
            svc.submit(&room_id, commit("hello", &salt)).await,
            Err(RendezvousError::Timeout)
        );
        assert!(!svc.rooms.contains(&room_id));
    }

    #[tokio::test]
    async fn test_rooms_are_independent() {
        let svc = service();
        let salt = Salt::generate();
        let first = joined_room(&svc).await;
        let second = joined_room(&svc).await;

        let (a, b, c, d) = tokio::join!(
            svc.submit(&first, commit("one", &salt)),
            svc.submit(&second, commit("two", &salt)),
            svc.submit(&first, commit("one", &salt)),
            svc.submit(&second, commit("three", &salt)),
        );
        assert!(a.unwrap().matched);
        assert!(c.unwrap().matched);
        assert!(!b.unwrap().matched);
        assert!(!d.unwrap().matched);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rooms_pair_exactly() {
        let svc = Arc::new(service());
        let salt = Salt::generate();

        let mut tasks = Vec::new();
        for i in 0..32 {
            let room_id = svc.create_room().unwrap();
            for _ in 0..2 {
                let svc = Arc::clone(&svc);
                let commitment = commit(&format!("secret-{i}"), &salt);
                tasks.push(tokio::spawn(async move {
                    svc.join(&room_id).await?;
                    svc.submit(&room_id, commitment).await
                }));
            }
        }

        for task in tasks {
            assert!(task.await.unwrap().unwrap().matched);
        }
        assert_eq!(svc.live_rooms(), 0);
    }

    #[test]
    fn test_cleanup_expired_uses_ttl() {
        let svc = RendezvousService::new(ServiceConfig {
            hold_timeout: None,
            room_ttl: Duration::ZERO,
        });
        svc.create_room().unwrap();
        svc.create_room().unwrap();

        assert_eq!(svc.cleanup_expired(), 2);
        assert_eq!(svc.live_rooms(), 0);
    }
}
