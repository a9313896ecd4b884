//! Record ID allocation.
//!
//! IDs are three decimal digits and two uppercase letters in a random
//! order, for example `4K0Z7`. There are 6.76 million such codes, so a
//! plain resample loop finds a free one almost immediately.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{RecordId, Snapshot};
use crate::{Error, Result};

const DIGITS: &[u8] = b"0123456789";
const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Upper bound on resampling before giving up.
pub const MAX_DRAWS: usize = 10_000;

/// Generate an ID absent from `existing` using the thread-local RNG.
pub fn generate(existing: &HashSet<String>) -> Result<RecordId> {
    generate_with(&mut rand::thread_rng(), existing)
}

/// Generate an ID absent from `existing` using the given RNG.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, existing: &HashSet<String>) -> Result<RecordId> {
    for _ in 0..MAX_DRAWS {
        let candidate = draw(rng);
        if !existing.contains(&candidate) {
            return Ok(RecordId::from_generated(candidate));
        }
    }
    Err(Error::IdSpaceExhausted(MAX_DRAWS))
}

fn draw<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut chars = [0u8; RecordId::LEN];
    for slot in &mut chars[..3] {
        *slot = DIGITS[rng.gen_range(0..DIGITS.len())];
    }
    for slot in &mut chars[3..] {
        *slot = LETTERS[rng.gen_range(0..LETTERS.len())];
    }
    chars.shuffle(rng);
    chars.iter().copied().map(char::from).collect()
}

/// Session-scoped allocator.
///
/// Remembers every ID it handed out so records created before the next
/// save never collide with each other, not only with the stored snapshot.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    reserved: HashSet<String>,
}

impl IdAllocator {
    /// Seed the allocator with the IDs of the last known snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            reserved: snapshot.ids(),
        }
    }

    /// Mark IDs as taken, e.g. after refreshing the snapshot.
    pub fn reserve<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(ids.into_iter().map(Into::into));
    }

    /// Allocate a fresh ID and reserve it.
    pub fn allocate(&mut self) -> Result<RecordId> {
        let id = generate(&self.reserved)?;
        self.reserved.insert(id.as_str().to_string());
        Ok(id)
    }

    #[must_use]
    pub fn is_reserved(&self, id: &str) -> bool {
        self.reserved.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::models::Record;

    fn has_id_shape(id: &str) -> bool {
        id.len() == 5
            && id.chars().filter(char::is_ascii_digit).count() == 3
            && id.chars().filter(char::is_ascii_uppercase).count() == 2
    }

    #[test]
    fn sequential_generation_yields_distinct_well_formed_ids() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut existing = HashSet::new();

        for _ in 0..2_000 {
            let id = generate_with(&mut rng, &existing).unwrap();
            assert!(has_id_shape(id.as_str()), "bad id {id}");
            assert!(existing.insert(id.as_str().to_string()), "duplicate id {id}");
        }
        assert_eq!(existing.len(), 2_000);
    }

    #[test]
    fn digits_and_letters_are_interleaved_across_draws() {
        let mut rng = StdRng::seed_from_u64(42);
        let existing = HashSet::new();
        let leading_letter = (0..200)
            .map(|_| generate_with(&mut rng, &existing).unwrap())
            .any(|id| id.as_str().starts_with(|c: char| c.is_ascii_uppercase()));
        assert!(leading_letter);
    }

    #[test]
    fn exhausted_space_reports_error() {
        let first = generate_with(&mut StepRng::new(0, 0), &HashSet::new()).unwrap();
        let existing = HashSet::from([first.as_str().to_string()]);

        let err = generate_with(&mut StepRng::new(0, 0), &existing).unwrap_err();
        assert!(matches!(err, Error::IdSpaceExhausted(MAX_DRAWS)));
    }

    #[test]
    fn allocator_never_repeats_within_session() {
        let snapshot = Snapshot {
            records: vec![Record::with_id("001AB")],
            ..Snapshot::default()
        };
        let mut allocator = IdAllocator::from_snapshot(&snapshot);
        assert!(allocator.is_reserved("001AB"));

        let first = allocator.allocate().unwrap();
        let second = allocator.allocate().unwrap();
        assert_ne!(first, second);
        assert!(allocator.is_reserved(first.as_str()));
        assert!(allocator.is_reserved(second.as_str()));
    }
}
