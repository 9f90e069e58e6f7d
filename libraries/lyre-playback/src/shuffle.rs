//! Shuffle algorithm for queue randomization
//!
//! Pure random (Fisher-Yates) permutation with the current track pinned to the
//! front, so enabling shuffle never interrupts what is playing.

use lyre_core::Track;
use rand::seq::SliceRandom;
use rand::Rng;

/// Produce a random permutation of `tracks` with `current` (if present) first
///
/// Returns the permutation and whether `current` was found and pinned.
pub fn shuffled_with_current_first<R: Rng + ?Sized>(
    tracks: &[Track],
    current: Option<&Track>,
    rng: &mut R,
) -> (Vec<Track>, bool) {
    let mut permutation = tracks.to_vec();
    permutation.shuffle(rng);

    let Some(current) = current else {
        return (permutation, false);
    };

    match permutation.iter().position(|track| track == current) {
        Some(pos) => {
            let track = permutation.remove(pos);
            permutation.insert(0, track);
            (permutation, true)
        }
        None => (permutation, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn tracks(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track::local(format!("t{i}"), format!("Track {i}"), format!("t{i}")))
            .collect()
    }

    #[test]
    fn keeps_every_track() {
        let original = tracks(20);
        let mut rng = StdRng::seed_from_u64(7);
        let (shuffled, _) = shuffled_with_current_first(&original, None, &mut rng);

        assert_eq!(shuffled.len(), original.len());
        let ids: HashSet<_> = shuffled.iter().map(|t| t.id().to_string()).collect();
        assert_eq!(ids.len(), original.len());
    }

    #[test]
    fn current_track_moves_to_front() {
        let original = tracks(10);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let (shuffled, pinned) =
                shuffled_with_current_first(&original, Some(&original[6]), &mut rng);
            assert!(pinned);
            assert_eq!(shuffled[0].id(), "t6");
        }
    }

    #[test]
    fn missing_current_is_not_pinned() {
        let original = tracks(5);
        let stranger = Track::local("nope", "Stranger", "nope");
        let mut rng = StdRng::seed_from_u64(1);
        let (shuffled, pinned) = shuffled_with_current_first(&original, Some(&stranger), &mut rng);

        assert!(!pinned);
        assert_eq!(shuffled.len(), 5);
    }

    #[test]
    fn empty_input() {
        let mut rng = StdRng::seed_from_u64(3);
        let (shuffled, pinned) = shuffled_with_current_first(&[], None, &mut rng);
        assert!(shuffled.is_empty());
        assert!(!pinned);
    }
}
