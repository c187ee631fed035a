//! Room identifiers.
//!
//! Ids are short enough to read over the phone: eight uppercase letters,
//! giving 26^8 (about 2 * 10^11) possibilities.

use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::error::{MalformedInput, RendezvousError};

/// Number of letters in a room id.
pub const ROOM_ID_LEN: usize = 8;

/// Upper bound on resampling when every draw collides with a live room.
const MAX_GENERATE_ATTEMPTS: usize = 1024;

/// An eight-letter uppercase room identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId([u8; ROOM_ID_LEN]);

impl RoomId {
    /// Mint a random id that `is_taken` rejects neither.
    ///
    /// Each letter is drawn uniformly from `A..=Z`. Collisions are resampled;
    /// the attempt cap only trips if the id space is effectively full.
    pub fn generate<R, F>(rng: &mut R, is_taken: F) -> Result<Self, RendezvousError>
    where
        R: Rng,
        F: Fn(&RoomId) -> bool,
    {
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            let mut letters = [0u8; ROOM_ID_LEN];
            for letter in letters.iter_mut() {
                *letter = rng.gen_range(b'A'..=b'Z');
            }
            let id = Self(letters);
            if !is_taken(&id) {
                return Ok(id);
            }
        }
        Err(RendezvousError::Internal(format!(
            "no free room id after {MAX_GENERATE_ATTEMPTS} attempts"
        )))
    }

    /// Parse an id exactly as it appears on the wire.
    pub fn parse(s: &str) -> Result<Self, MalformedInput> {
        let bytes: [u8; ROOM_ID_LEN] = s
            .as_bytes()
            .try_into()
            .map_err(|_| MalformedInput::RoomId)?;
        if !bytes.iter().all(u8::is_ascii_uppercase) {
            return Err(MalformedInput::RoomId);
        }
        Ok(Self(bytes))
    }

    /// Parse an id typed by a person: surrounding whitespace and case are ignored.
    pub fn parse_typed(s: &str) -> Result<Self, MalformedInput> {
        Self::parse(&s.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII letters are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomId {
    type Err = MalformedInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_generate_shape() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let id = RoomId::generate(&mut rng, |_| false).unwrap();
            assert_eq!(id.as_str().len(), ROOM_ID_LEN);
            assert!(id.as_str().chars().all(|c| c.is_ascii_uppercase()));
            assert_eq!(RoomId::parse(id.as_str()).unwrap(), id);
        }
    }

    #[test]
    fn test_generate_resamples_on_collision() {
        // Replaying the same seed yields the same first draw, which is then taken.
        let first = RoomId::generate(&mut rand::rngs::StdRng::seed_from_u64(7), |_| false).unwrap();
        let taken: HashSet<RoomId> = [first].into_iter().collect();

        let second =
            RoomId::generate(&mut rand::rngs::StdRng::seed_from_u64(7), |id| taken.contains(id))
                .unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_generate_gives_up_when_everything_is_taken() {
        let result = RoomId::generate(&mut rand::thread_rng(), |_| true);
        assert!(matches!(result, Err(RendezvousError::Internal(_))));
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert_eq!(RoomId::parse("ABCDEFGH").unwrap().as_str(), "ABCDEFGH");
        assert_eq!(RoomId::parse("abcdefgh"), Err(MalformedInput::RoomId));
        assert_eq!(RoomId::parse("ABCDEFG"), Err(MalformedInput::RoomId));
        assert_eq!(RoomId::parse("ABCDEFGHI"), Err(MalformedInput::RoomId));
        assert_eq!(RoomId::parse("ABCD3FGH"), Err(MalformedInput::RoomId));
        assert_eq!(RoomId::parse(""), Err(MalformedInput::RoomId));
    }

    #[test]
    fn test_parse_typed_normalizes() {
        assert_eq!(RoomId::parse_typed("  abcdEFGH\n").unwrap().as_str(), "ABCDEFGH");
    }
}
