use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::configuration::FeatureVector;
use crate::transition::Transition;

/// A scored, not yet materialized successor of a beam member
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    /// Rank of the parent in the current beam
    pub(crate) parent: usize,
    /// `None` carries a terminal parent over unchanged
    pub(crate) transition: Option<Transition>,
    /// Cumulative score of the successor
    pub(crate) score: f64,
    /// Features of the parent, shared by all of its candidates
    pub(crate) features: Option<Arc<FeatureVector>>,
    /// Whether the successor is still on the gold path
    pub(crate) gold: bool,
}

impl Ord for Candidate {
    /// `Greater` is better: higher score, then lower parent rank, then lower
    /// transition ID
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.parent.cmp(&self.parent))
            .then_with(|| other.transition.cmp(&self.transition))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// The `capacity` best candidates seen so far
///
/// Backed by a min-heap so the worst survivor is evicted in `O(log B)`.
/// Workers push concurrently; the lock covers only the compare-and-evict step.
pub(crate) struct Agenda {
    capacity: usize,
    heap: Mutex<BinaryHeap<Reverse<Candidate>>>,
}

impl Agenda {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: Mutex::new(BinaryHeap::with_capacity(capacity + 1)),
        }
    }

    pub(crate) fn push(&self, candidate: Candidate) {
        let mut heap = self.heap.lock();
        if heap.len() < self.capacity {
            heap.push(Reverse(candidate));
        } else if let Some(mut worst) = heap.peek_mut() {
            if candidate > worst.0 {
                *worst = Reverse(candidate);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.heap.lock().len()
    }

    /// Drain the survivors, best first
    pub(crate) fn into_sorted(self) -> Vec<Candidate> {
        self.heap
            .into_inner()
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(c)| c)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(parent: usize, transition: u32, score: f64) -> Candidate {
        Candidate {
            parent,
            transition: Some(Transition(transition)),
            score,
            features: None,
            gold: false,
        }
    }

    #[test]
    fn test_keeps_best_candidates() {
        let agenda = Agenda::new(2);
        agenda.push(candidate(0, 1, 1.0));
        agenda.push(candidate(0, 2, 3.0));
        agenda.push(candidate(1, 1, 2.0));
        agenda.push(candidate(1, 2, -1.0));
        assert_eq!(agenda.len(), 2);

        let sorted = agenda.into_sorted();
        let scores: Vec<f64> = sorted.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![3.0, 2.0]);
    }

    #[test]
    fn test_ties_prefer_lower_parent_then_transition() {
        let agenda = Agenda::new(3);
        agenda.push(candidate(1, 1, 0.0));
        agenda.push(candidate(0, 5, 0.0));
        agenda.push(candidate(0, 2, 0.0));
        agenda.push(candidate(2, 0, 0.0));

        let order: Vec<(usize, Option<Transition>)> = agenda
            .into_sorted()
            .iter()
            .map(|c| (c.parent, c.transition))
            .collect();
        assert_eq!(
            order,
            vec![
                (0, Some(Transition(2))),
                (0, Some(Transition(5))),
                (1, Some(Transition(1))),
            ]
        );
    }

    #[test]
    fn test_carried_candidate_wins_tie() {
        let agenda = Agenda::new(1);
        agenda.push(candidate(0, 1, 0.0));
        agenda.push(Candidate {
            transition: None,
            ..candidate(0, 0, 0.0)
        });
        assert_eq!(agenda.into_sorted()[0].transition, None);
    }
}
