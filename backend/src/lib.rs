//! Tandem - blind secret equality
//!
//! Two people find out whether they typed the same secret without either
//! of them, or the server in between, seeing the other's secret.
//!
//! The server pairs two anonymous participants in a room and synchronizes
//! them through two held-request barriers (join, then submit). Each
//! participant submits `H(H(secret) ++ salt)`, where the salt was shared in
//! the fragment of the invite link and never reaches the server. The server
//! compares the two commitments and returns the same verdict to both.
//!
//! ## Design Principles
//!
//! * **Blind server**: it only ever sees room ids and salted hashes
//! * **Zero persistent state**: rooms live in memory and are single use
//! * **No polling**: requests are held open until the other party arrives
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tandem::{handler, RendezvousService, ServiceConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = Arc::new(RendezvousService::new(ServiceConfig::default()));
//! let app = handler::router(service);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod barrier;
pub mod client;
pub mod commitment;
pub mod error;
pub mod handler;
pub mod peer;
pub mod protocol;
pub mod room_id;
pub mod service;
pub mod state;

// Re-export main types for convenience
pub use barrier::{Arrival, Barrier, BarrierError, OnDisconnect};
pub use client::{ClientError, RendezvousClient};
pub use commitment::{Commitment, Salt};
pub use error::{MalformedInput, RendezvousError};
pub use peer::{EqualityPeer, Rendezvous};
pub use protocol::{Health, Invite, InviteLink, Verdict};
pub use room_id::RoomId;
pub use service::{RendezvousService, ServiceConfig};
pub use state::{Room, RoomStore};
