//! Ordered walk over a lesson's challenges.

use crate::model::Challenge;

/// Holds the fixed challenge list and the active position within it.
///
/// The position starts at the first challenge without recorded progress. A
/// lesson that is already fully complete starts again at index 0 as a practice
/// pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeSequencer {
    challenges: Vec<Challenge>,
    active: usize,
    practice_pass: bool,
}

impl ChallengeSequencer {
    #[must_use]
    pub fn new(challenges: Vec<Challenge>) -> Self {
        let first_incomplete = challenges.iter().position(|c| !c.completed());
        let practice_pass = !challenges.is_empty() && first_incomplete.is_none();
        Self {
            active: first_incomplete.unwrap_or(0),
            challenges,
            practice_pass,
        }
    }

    /// True when every challenge was already completed before this run.
    #[must_use]
    pub fn is_practice_pass(&self) -> bool {
        self.practice_pass
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }

    #[must_use]
    pub fn challenges(&self) -> &[Challenge] {
        &self.challenges
    }

    /// The active challenge, or `None` once the list is exhausted.
    #[must_use]
    pub fn current(&self) -> Option<&Challenge> {
        self.challenges.get(self.active)
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.active >= self.challenges.len()
    }

    /// Move one step forward. Does nothing once exhausted.
    pub fn advance(&mut self) {
        if !self.is_exhausted() {
            self.active += 1;
        }
    }

    /// Move by `delta`, clamped into `[0, len - 1]`. Debug aid only.
    pub fn debug_seek(&mut self, delta: isize) {
        let Some(last) = self.challenges.len().checked_sub(1) else {
            return;
        };
        let target = if delta.is_negative() {
            self.active.saturating_sub(delta.unsigned_abs())
        } else {
            self.active.saturating_add(delta.unsigned_abs())
        };
        self.active = target.min(last);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChallengeId, ChallengeKind};

    fn challenge(id: u64, completed: bool) -> Challenge {
        Challenge::new(
            ChallengeId::new(id),
            ChallengeKind::VideoLearn,
            u32::try_from(id).unwrap(),
            format!("sign {id}"),
            None,
            Vec::new(),
        )
        .unwrap()
        .with_completed(completed)
    }

    #[test]
    fn starts_at_zero_when_nothing_completed() {
        let seq = ChallengeSequencer::new((1..=4).map(|id| challenge(id, false)).collect());
        assert_eq!(seq.active_index(), 0);
        assert!(!seq.is_practice_pass());
    }

    #[test]
    fn resumes_at_first_incomplete() {
        for k in 0..5_u64 {
            let list = (0..5_u64).map(|i| challenge(i + 1, i < k)).collect();
            let seq = ChallengeSequencer::new(list);
            assert_eq!(seq.active_index(), usize::try_from(k).unwrap());
        }

        let gaps = vec![challenge(1, true), challenge(2, false), challenge(3, true)];
        assert_eq!(ChallengeSequencer::new(gaps).active_index(), 1);
    }

    #[test]
    fn fully_completed_lesson_is_a_practice_pass_from_zero() {
        let seq = ChallengeSequencer::new((1..=3).map(|id| challenge(id, true)).collect());
        assert_eq!(seq.active_index(), 0);
        assert!(seq.is_practice_pass());
    }

    #[test]
    fn advance_stops_at_terminal() {
        let mut seq = ChallengeSequencer::new(vec![challenge(1, false)]);
        seq.advance();
        assert!(seq.current().is_none());
        assert!(seq.is_exhausted());
        seq.advance();
        assert_eq!(seq.active_index(), 1);
    }

    #[test]
    fn debug_seek_clamps_to_valid_range() {
        let mut seq = ChallengeSequencer::new((1..=3).map(|id| challenge(id, false)).collect());
        seq.debug_seek(-5);
        assert_eq!(seq.active_index(), 0);
        seq.debug_seek(10);
        assert_eq!(seq.active_index(), 2);
        seq.debug_seek(-1);
        assert_eq!(seq.current().unwrap().id(), ChallengeId::new(2));
    }
}
