//! Wire-level vocabulary shared by the server and the peers.
//!
//! Everything is plain `GET` requests with text bodies:
//!
//! - `GET /newRoom` returns the room id.
//! - `GET /join/{room_id}` is held until both peers joined, then `204`.
//! - `GET /submit/{room_id}/{commitment}` is held until both peers
//!   submitted, then `200` with `good` or `bad`.
//!
//! The comparison salt never appears in a request. It rides in the fragment
//! of the invite link (`{server}/{room_id}#{salt}`), which clients do not
//! send to the server.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::commitment::Salt;
use crate::error::MalformedInput;
use crate::room_id::RoomId;

pub const NEW_ROOM_PATH: &str = "/newRoom";
pub const JOIN_PATH: &str = "/join";
pub const SUBMIT_PATH: &str = "/submit";
pub const HEALTH_PATH: &str = "/health";

/// Body sent to both peers when their commitments match.
pub const MATCH_WORD: &str = "good";
/// Body sent to both peers when their commitments differ.
pub const MISMATCH_WORD: &str = "bad";

/// Outcome of a comparison, identical for both participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub matched: bool,
}

impl Verdict {
    pub fn new(matched: bool) -> Self {
        Self { matched }
    }

    pub fn as_wire(&self) -> &'static str {
        if self.matched {
            MATCH_WORD
        } else {
            MISMATCH_WORD
        }
    }

    /// Parse a verdict body, or `None` for anything unrecognized.
    pub fn from_wire(body: &str) -> Option<Self> {
        match body {
            MATCH_WORD => Some(Self::new(true)),
            MISMATCH_WORD => Some(Self::new(false)),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.matched { "MATCH" } else { "NO MATCH" })
    }
}

/// Health document served at [`HEALTH_PATH`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
    pub live_rooms: usize,
}

/// What one participant hands the other: the room and the comparison salt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    pub room_id: RoomId,
    pub salt: Salt,
}

/// An invite bound to the server it lives on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteLink {
    /// Server base URL without a trailing slash.
    pub server: String,
    pub invite: Invite,
}

impl InviteLink {
    pub fn new(server: &str, invite: Invite) -> Self {
        Self {
            server: server.trim_end_matches('/').to_owned(),
            invite,
        }
    }
}

impl fmt::Display for InviteLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}#{}",
            self.server,
            self.invite.room_id,
            self.invite.salt.as_str()
        )
    }
}

impl FromStr for InviteLink {
    type Err = MalformedInput;

    fn from_str(link: &str) -> Result<Self, Self::Err> {
        let link = link.trim();
        let invalid = || MalformedInput::InviteLink(link.to_owned());

        let (location, fragment) = link.split_once('#').ok_or_else(invalid)?;
        let (server, room) = location.rsplit_once('/').ok_or_else(invalid)?;

        let room_id = RoomId::parse(room).map_err(|_| invalid())?;
        let salt = Salt::parse(fragment).map_err(|_| invalid())?;

        Ok(Self {
            server: server.to_owned(),
            invite: Invite { room_id, salt },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite() -> Invite {
        Invite {
            room_id: RoomId::parse("ABCDEFGH").unwrap(),
            salt: Salt::parse("0123456789abcdef0123456789abcdef").unwrap(),
        }
    }

    #[test]
    fn test_verdict_wire_words() {
        assert_eq!(Verdict::new(true).as_wire(), "good");
        assert_eq!(Verdict::new(false).as_wire(), "bad");
        assert_eq!(Verdict::from_wire("good"), Some(Verdict::new(true)));
        assert_eq!(Verdict::from_wire("bad"), Some(Verdict::new(false)));
        assert_eq!(Verdict::from_wire("maybe"), None);
    }

    #[test]
    fn test_invite_link_format() {
        let link = InviteLink::new("https://example.org/", invite());
        assert_eq!(
            link.to_string(),
            "https://example.org/ABCDEFGH#0123456789abcdef0123456789abcdef"
        );
    }

    #[test]
    fn test_invite_link_parse() {
        let link: InviteLink = "http://127.0.0.1:8080/ABCDEFGH#0123456789abcdef0123456789abcdef"
            .parse()
            .unwrap();
        assert_eq!(link.server, "http://127.0.0.1:8080");
        assert_eq!(link.invite, invite());
    }

    #[test]
    fn test_invite_link_rejects_bad_links() {
        for bad in [
            "http://example.org/ABCDEFGH",
            "http://example.org/ABCDEFGH#short",
            "http://example.org/abcdefgh#0123456789abcdef0123456789abcdef",
            "http://example.org/ABCDEFGH#0123456789ABCDEF0123456789ABCDEF",
            "ABCDEFGH#0123456789abcdef0123456789abcdef",
        ] {
            assert!(
                matches!(bad.parse::<InviteLink>(), Err(MalformedInput::InviteLink(_))),
                "{bad} should be rejected"
            );
        }
    }
}
