//! Maximum eigenvalue estimation.

use crate::alg::{PowerIteration, Solver};
use crate::backend::{Backend, Real};
use crate::error::Result;
use crate::linop::SharedOp;

use super::App;

/// Estimates the largest eigenvalue magnitude of a Hermitian operator by
/// power iteration from a random start.
///
/// Each run draws a fresh starting vector from the backend's RNG, so
/// repeated runs agree only when the backend is seeded identically. The
/// estimate carries power iteration's convergence rate and nothing more;
/// the assemblers use it to calibrate step sizes, where a few iterations
/// give a serviceable spectral-norm bound.
pub struct MaxEig<B: Backend> {
    solver: Solver<B>,
    show_progress: bool,
}

impl<B: Backend> MaxEig<B> {
    pub fn new(backend: B, a: SharedOp<B>, max_iter: usize) -> Result<Self> {
        let x = backend.zeros(a.domain())?;
        let power = PowerIteration::new(backend, a, x, max_iter)?;
        Ok(Self {
            solver: power.into(),
            show_progress: false,
        })
    }

    pub fn show_progress(mut self, on: bool) -> Self {
        self.show_progress = on;
        self
    }

    fn power(&mut self) -> &mut PowerIteration<B> {
        match &mut self.solver {
            Solver::Power(power) => power,
            _ => unreachable!("max eig always wraps power iteration"),
        }
    }
}

impl<B: Backend> App<B> for MaxEig<B> {
    type Output = Real<B>;

    fn solver(&self) -> &Solver<B> {
        &self.solver
    }

    fn solver_mut(&mut self) -> &mut Solver<B> {
        &mut self.solver
    }

    fn show_progress(&self) -> bool {
        self.show_progress
    }

    fn init(&mut self) -> Result<()> {
        self.power().randomize()
    }

    fn summarize(&mut self) -> Result<()> {
        if self.show_progress {
            log::debug!("[max eig] estimate {:e}", self.power().max_eig());
        }
        Ok(())
    }

    fn output(&mut self) -> Result<Real<B>> {
        Ok(self.power().max_eig())
    }
}
