use crate::error::Result;
use crate::model::AveragedMatrix;

use super::{Averaged, Trivial};

/// How weights evolve between instances and what gets deployed
pub trait UpdateStrategy {
    fn name() -> &'static str;

    /// Called once per training instance, after its update if any
    fn step(model: &mut AveragedMatrix);

    /// Turn the live weights into the deployed model
    fn finalize(model: &mut AveragedMatrix) -> Result<()>;
}

/// Deploys the time-weighted average of the weights over all instances
impl UpdateStrategy for Averaged {
    fn name() -> &'static str {
        "averaged"
    }

    fn step(model: &mut AveragedMatrix) {
        model.advance_generation();
    }

    fn finalize(model: &mut AveragedMatrix) -> Result<()> {
        model.integrate(model.generation())
    }
}

/// Deploys the last weights as they are
impl UpdateStrategy for Trivial {
    fn name() -> &'static str {
        "trivial"
    }

    fn step(_model: &mut AveragedMatrix) {}

    fn finalize(model: &mut AveragedMatrix) -> Result<()> {
        model.finalize_raw();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transition::Transition;

    #[test]
    fn test_averaged_divides_by_generations() {
        let mut model = AveragedMatrix::new();
        model.increment(&[0], Transition(1)).unwrap();
        Averaged::step(&mut model);
        Averaged::step(&mut model);
        model.decrement(&[0], Transition(1)).unwrap();
        Averaged::step(&mut model);
        Averaged::step(&mut model);
        Averaged::finalize(&mut model).unwrap();
        // weight 1 for two generations, then 0 for two
        assert_eq!(model.weight(0, Transition(1)), 0.5);
        assert!(matches!(
            model.increment(&[0], Transition(1)),
            Err(Error::PreconditionViolation(_))
        ));
    }

    #[test]
    fn test_averaged_needs_a_generation() {
        let mut model = AveragedMatrix::new();
        assert!(matches!(
            Averaged::finalize(&mut model),
            Err(Error::DivideByZero(_))
        ));
    }

    #[test]
    fn test_trivial_keeps_last_weights() {
        let mut model = AveragedMatrix::new();
        model.increment(&[3], Transition(2)).unwrap();
        Trivial::step(&mut model);
        model.increment(&[3], Transition(2)).unwrap();
        Trivial::finalize(&mut model).unwrap();
        assert_eq!(model.weight(3, Transition(2)), 2.0);
        assert!(model.is_finalized());
    }
}
