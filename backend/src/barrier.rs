//! Two-party rendezvous gate.
//!
//! The first party to arrive is held: it gets back a receiver and waits on
//! it. The second party computes the joint outcome from both payloads, sends
//! it to the held party and returns it directly. A barrier releases exactly
//! once.
//!
//! The barrier itself is not synchronized. Callers keep it behind a lock
//! (the room's map entry) so that every `arrive` and `cancel` is a single
//! critical section, and never hold that lock across an await.

use tokio::sync::oneshot;

/// Identifies one held call so that a late cancellation cannot clear a
/// slot that has since been taken by someone else.
pub type Ticket = u64;

/// What happens when the held party goes away before release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDisconnect {
    /// Clear the slot; a later arrival starts the barrier over.
    Reset,
    /// The whole room is unrecoverable and must be removed.
    DestroyRoom,
}

/// Result of a successful arrival.
#[derive(Debug)]
pub enum Arrival<O> {
    /// First to arrive. The outcome will be delivered on this receiver.
    Held(oneshot::Receiver<O>),
    /// Second to arrive. Both parties are released with this outcome.
    Released(O),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BarrierError {
    #[error("barrier has already released")]
    AlreadyReleased,

    /// The held party disconnected and the policy forbids starting over.
    #[error("the waiting party disconnected")]
    PeerVanished,
}

#[derive(Debug)]
struct Held<T, O> {
    ticket: Ticket,
    payload: T,
    release: oneshot::Sender<O>,
}

/// One-shot gate for exactly two arrivals.
#[derive(Debug)]
pub struct Barrier<T, O> {
    held: Option<Held<T, O>>,
    released: bool,
    on_disconnect: OnDisconnect,
}

impl<T, O: Clone> Barrier<T, O> {
    pub fn new(on_disconnect: OnDisconnect) -> Self {
        Self {
            held: None,
            released: false,
            on_disconnect,
        }
    }

    /// Register an arrival.
    ///
    /// `decide` receives `(first, second)` payloads and is only called on
    /// the releasing arrival.
    pub fn arrive<F>(
        &mut self,
        ticket: Ticket,
        payload: T,
        decide: F,
    ) -> Result<Arrival<O>, BarrierError>
    where
        F: FnOnce(&T, &T) -> O,
    {
        if self.released {
            return Err(BarrierError::AlreadyReleased);
        }

        let Some(held) = self.held.take() else {
            return Ok(self.hold(ticket, payload));
        };

        // The first party dropped its receiver but its cancellation has not
        // run yet. Treat it exactly as if it had.
        if held.release.is_closed() {
            return self.vanished(ticket, payload);
        }

        let outcome = decide(&held.payload, &payload);
        if held.release.send(outcome.clone()).is_err() {
            return self.vanished(ticket, payload);
        }
        self.released = true;
        Ok(Arrival::Released(outcome))
    }

    /// Withdraw the held party identified by `ticket`.
    ///
    /// Returns the disconnect policy if that party was actually held, and
    /// `None` if it was already released or replaced.
    pub fn cancel(&mut self, ticket: Ticket) -> Option<OnDisconnect> {
        match &self.held {
            Some(held) if held.ticket == ticket => {
                self.held = None;
                Some(self.on_disconnect)
            }
            _ => None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.held.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn hold(&mut self, ticket: Ticket, payload: T) -> Arrival<O> {
        let (release, receiver) = oneshot::channel();
        self.held = Some(Held {
            ticket,
            payload,
            release,
        });
        Arrival::Held(receiver)
    }

    fn vanished(&mut self, ticket: Ticket, payload: T) -> Result<Arrival<O>, BarrierError> {
        match self.on_disconnect {
            OnDisconnect::Reset => Ok(self.hold(ticket, payload)),
            OnDisconnect::DestroyRoom => Err(BarrierError::PeerVanished),
        }
    }
}
