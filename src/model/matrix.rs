use ndarray::Array1;

use crate::error::{Error, Result};
use crate::transition::Transition;

use super::sparse::SparseVector;

/// A weight together with the history needed to average it
///
/// `total` is the sum of `value` over every generation up to `stamp`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistoryValue {
    pub value: f64,
    pub total: f64,
    pub stamp: u64,
}

impl HistoryValue {
    fn fold(&mut self, generation: u64) {
        self.total += generation.saturating_sub(self.stamp) as f64 * self.value;
        self.stamp = generation;
    }

    fn add(&mut self, generation: u64, amount: f64) {
        self.fold(generation);
        self.value += amount;
    }

    fn integrate(&mut self, generation: u64) {
        self.fold(generation);
        self.value = self.total / generation as f64;
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0.0 && self.total == 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct TransitionRow {
    cells: Vec<HistoryValue>,
}

/// Feature by transition weights with per-cell averaging history
///
/// Rows are indexed by feature ID and cells by transition ID. Both grow on
/// demand, so the matrix never needs to know the vocabulary sizes up front.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AveragedMatrix {
    rows: Vec<Option<TransitionRow>>,
    generation: u64,
    integrations: usize,
    integrated_at: Option<u64>,
    finalized: bool,
}

impl AveragedMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_cells<I>(generation: u64, finalized: bool, cells: I) -> Self
    where
        I: IntoIterator<Item = (u32, Transition, HistoryValue)>,
    {
        let mut matrix = Self {
            generation,
            finalized,
            integrated_at: if finalized { Some(generation) } else { None },
            integrations: usize::from(finalized),
            ..Self::default()
        };
        for (feature, transition, cell) in cells {
            *matrix.cell_mut(feature, transition) = cell;
        }
        matrix
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Close the current generation, called once per training instance
    pub fn advance_generation(&mut self) {
        self.generation += 1;
    }

    pub fn integrations(&self) -> usize {
        self.integrations
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn cell(&self, feature: u32, transition: Transition) -> Option<&HistoryValue> {
        self.rows
            .get(feature as usize)?
            .as_ref()?
            .cells
            .get(transition.0 as usize)
    }

    fn cell_mut(&mut self, feature: u32, transition: Transition) -> &mut HistoryValue {
        let (f, t) = (feature as usize, transition.0 as usize);
        if self.rows.len() <= f {
            self.rows.resize_with(f + 1, || None);
        }
        let row = self.rows[f].get_or_insert_with(TransitionRow::default);
        if row.cells.len() <= t {
            row.cells.resize(t + 1, HistoryValue::default());
        }
        &mut row.cells[t]
    }

    /// Drop trailing empty cells and rows left without any weight
    fn compact(&mut self, feature: u32) {
        let f = feature as usize;
        if let Some(Some(row)) = self.rows.get_mut(f) {
            while row.cells.last().map_or(false, HistoryValue::is_empty) {
                row.cells.pop();
            }
            if row.cells.is_empty() {
                self.rows[f] = None;
            }
        }
        while matches!(self.rows.last(), Some(None)) {
            self.rows.pop();
        }
    }

    pub fn weight(&self, feature: u32, transition: Transition) -> f64 {
        self.cell(feature, transition).map_or(0.0, |c| c.value)
    }

    pub fn score(&self, features: &[u32], transition: Transition) -> f64 {
        features
            .iter()
            .map(|&f| self.weight(f, transition))
            .sum()
    }

    /// Scores of every transition in `transitions`, in the same order
    pub fn score_transitions(&self, features: &[u32], transitions: &[Transition]) -> Array1<f64> {
        let mut scores = Array1::zeros(transitions.len());
        for &f in features {
            let row = match self.rows.get(f as usize) {
                Some(Some(row)) => row,
                _ => continue,
            };
            for (score, t) in scores.iter_mut().zip(transitions) {
                if let Some(cell) = row.cells.get(t.0 as usize) {
                    *score += cell.value;
                }
            }
        }
        scores
    }

    fn check_trainable(&self) -> Result<()> {
        if self.finalized {
            return Err(Error::precondition(
                "model was finalized, reinitialize it before training further",
            ));
        }
        Ok(())
    }

    fn add(&mut self, feature: u32, transition: Transition, amount: f64) {
        let generation = self.generation;
        let cell = self.cell_mut(feature, transition);
        cell.add(generation, amount);
        if cell.is_empty() {
            *cell = HistoryValue::default();
            self.compact(feature);
        }
    }

    pub fn increment(&mut self, features: &[u32], transition: Transition) -> Result<()> {
        self.check_trainable()?;
        for &f in features {
            self.add(f, transition, 1.0);
        }
        Ok(())
    }

    pub fn decrement(&mut self, features: &[u32], transition: Transition) -> Result<()> {
        self.check_trainable()?;
        for &f in features {
            self.add(f, transition, -1.0);
        }
        Ok(())
    }

    /// Apply a structured `(gold - predicted)` update
    pub fn apply_delta(&mut self, delta: &SparseVector<(u32, Transition)>) -> Result<()> {
        self.check_trainable()?;
        for (&(f, t), &amount) in delta.iter() {
            self.add(f, t, amount);
        }
        Ok(())
    }

    /// Replace every weight by its average over `generation` generations
    ///
    /// This finalizes the matrix; further updates need [`reinitialize`].
    ///
    /// [`reinitialize`]: AveragedMatrix::reinitialize
    pub fn integrate(&mut self, generation: u64) -> Result<()> {
        if generation == 0 {
            return Err(Error::DivideByZero("integrate at generation 0"));
        }
        if self.integrated_at == Some(generation) {
            return Err(Error::AlreadyIntegrated(generation));
        }
        self.check_trainable()?;
        if generation < self.generation {
            return Err(Error::precondition(format!(
                "cannot integrate at generation {} after reaching {}",
                generation, self.generation
            )));
        }
        for row in self.rows.iter_mut().flatten() {
            for cell in row.cells.iter_mut() {
                cell.integrate(generation);
            }
        }
        self.generation = generation;
        self.integrated_at = Some(generation);
        self.integrations += 1;
        self.finalized = true;
        Ok(())
    }

    /// Mark the current weights as final without averaging them
    pub fn finalize_raw(&mut self) {
        self.finalized = true;
    }

    /// Make a finalized matrix trainable again
    ///
    /// The current weights become the starting point and the averaging
    /// history starts over.
    pub fn reinitialize(&mut self) {
        for row in self.rows.iter_mut().flatten() {
            for cell in row.cells.iter_mut() {
                *cell = HistoryValue {
                    value: cell.value,
                    total: 0.0,
                    stamp: 0,
                };
            }
        }
        self.generation = 0;
        self.integrated_at = None;
        self.finalized = false;
    }

    /// The weights as they would be deployed right now
    pub fn averaged_snapshot(&self) -> Result<AveragedMatrix> {
        let mut snapshot = self.clone();
        if !self.finalized && self.generation > 0 {
            snapshot.integrate(self.generation)?;
        }
        Ok(snapshot)
    }

    /// Number of cells holding a weight or history
    pub fn nnz(&self) -> usize {
        self.rows
            .iter()
            .flatten()
            .map(|r| r.cells.iter().filter(|c| !c.is_empty()).count())
            .sum()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Every non-empty cell as `(feature, transition, history)`
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, Transition, HistoryValue)> + '_ {
        self.rows.iter().enumerate().flat_map(|(f, row)| {
            row.iter().flat_map(move |row| {
                row.cells
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| !c.is_empty())
                    .map(move |(t, c)| (f as u32, Transition(t as u32), *c))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_then_decrement_is_empty() {
        let mut m = AveragedMatrix::new();
        m.increment(&[10, 3], Transition(7)).unwrap();
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.num_rows(), 11);
        m.decrement(&[10, 3], Transition(7)).unwrap();
        assert_eq!(m.nnz(), 0);
        assert_eq!(m.num_rows(), 0);
        assert_eq!(m.iter_cells().count(), 0);
    }

    #[test]
    fn test_scores() {
        let mut m = AveragedMatrix::new();
        m.increment(&[1, 2], Transition(1)).unwrap();
        m.increment(&[2], Transition(4)).unwrap();
        m.decrement(&[1], Transition(4)).unwrap();
        assert_eq!(m.score(&[1, 2, 99], Transition(1)), 2.0);
        assert_eq!(m.score(&[1, 2], Transition(4)), 0.0);
        assert_eq!(m.score(&[1, 2], Transition(500)), 0.0);
        let row = m.score_transitions(&[1, 2], &[Transition(1), Transition(4), Transition(9)]);
        assert_eq!(row.to_vec(), vec![2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_averaging() {
        let mut m = AveragedMatrix::new();
        // weight 1 for two generations, then 3 for two more
        m.increment(&[0], Transition(2)).unwrap();
        m.advance_generation();
        m.advance_generation();
        let mut delta = SparseVector::new();
        delta.add_to((0, Transition(2)), 2.0);
        m.apply_delta(&delta).unwrap();
        m.advance_generation();
        m.advance_generation();

        let snapshot = m.averaged_snapshot().unwrap();
        assert_eq!(snapshot.weight(0, Transition(2)), 2.0);
        assert!(!m.is_finalized());

        m.integrate(4).unwrap();
        assert_eq!(m.weight(0, Transition(2)), 2.0);
        assert_eq!(m.integrations(), 1);
    }

    #[test]
    fn test_integrate_misuse() {
        let mut m = AveragedMatrix::new();
        m.increment(&[0], Transition(1)).unwrap();
        assert!(matches!(m.integrate(0), Err(Error::DivideByZero(_))));
        m.advance_generation();
        m.integrate(1).unwrap();
        assert!(matches!(m.integrate(1), Err(Error::AlreadyIntegrated(1))));
        assert_eq!(m.integrations(), 1);
        assert!(matches!(
            m.increment(&[0], Transition(1)),
            Err(Error::PreconditionViolation(_))
        ));

        m.reinitialize();
        m.increment(&[0], Transition(1)).unwrap();
        assert_eq!(m.weight(0, Transition(1)), 2.0);
    }

    #[test]
    fn test_from_cells_round_trip() {
        let mut m = AveragedMatrix::new();
        m.increment(&[4, 1], Transition(3)).unwrap();
        m.advance_generation();
        m.decrement(&[4], Transition(0)).unwrap();
        let copy = AveragedMatrix::from_cells(m.generation(), false, m.iter_cells());
        assert_eq!(copy, m);
    }
}
