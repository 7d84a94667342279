//! Applications: harnesses that drive a solver kernel to completion.
//!
//! An [`App`] owns exactly one [`Solver`] and layers hooks around its
//! lifecycle. The provided [`App::run`] performs the whole schedule: harness
//! init, solver init, one `update` per loop turn until `done`, then solver
//! and harness cleanup, and finally output extraction. Hooks default to
//! no-ops; concrete apps override the ones they need, such as wiring a
//! right-hand side or derived step sizes during `init`, or recording an
//! objective trace in `summarize`.
//!
//! The concrete apps here are [`MaxEig`] for step-size calibration,
//! [`LinearLeastSquares`] for regularized least squares, and
//! [`L2ConstrainedMinimization`] for L2-ball constrained problems.

mod constrained;
mod least_squares;
mod max_eig;

pub use constrained::{ConstrainedOptions, L2ConstrainedMinimization};
pub use least_squares::{LeastSquaresOptions, LinearLeastSquares, LsqMethod, ObjectiveFn};
pub use max_eig::MaxEig;

use crate::alg::Solver;
use crate::backend::Backend;
use crate::error::Result;

/// One iterative application: a solver plus the hooks that surround it.
///
/// Cleanup always runs, for both the solver and the harness, before any
/// failure from init, the loop, or a hook propagates to the caller. The
/// loop never calls `update` once `done` reports true.
pub trait App<B: Backend> {
    /// Value extracted after the run completes.
    type Output;

    fn solver(&self) -> &Solver<B>;

    fn solver_mut(&mut self) -> &mut Solver<B>;

    /// Emit a progress line per iteration.
    fn show_progress(&self) -> bool {
        false
    }

    /// Runs before the solver's own `init`.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn pre_update(&mut self) -> Result<()> {
        Ok(())
    }

    fn post_update(&mut self) -> Result<()> {
        Ok(())
    }

    /// Runs after every update, for trace collection and progress display.
    fn summarize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Releases harness bookkeeping. Runs after the solver's cleanup.
    fn cleanup(&mut self) {}

    /// Extracts the result after a successful run.
    fn output(&mut self) -> Result<Self::Output>;

    /// Drives the solver through its full lifecycle and returns the output.
    fn run(&mut self) -> Result<Self::Output>
    where
        Self: Sized,
    {
        let driven = drive(self);
        self.solver_mut().cleanup();
        self.cleanup();
        driven?;
        self.output()
    }
}

fn drive<B: Backend, A: App<B>>(app: &mut A) -> Result<()> {
    app.init()?;
    app.solver_mut().init()?;
    while !app.solver().done() {
        app.pre_update()?;
        app.solver_mut().update()?;
        app.post_update()?;
        app.summarize()?;
        if app.show_progress() {
            let solver = app.solver();
            match solver.residual() {
                Some(resid) => log::debug!(
                    "[{}] iteration {}/{} resid {:e}",
                    solver.name(),
                    solver.iter(),
                    solver.max_iter(),
                    resid,
                ),
                None => log::debug!(
                    "[{}] iteration {}/{}",
                    solver.name(),
                    solver.iter(),
                    solver.max_iter(),
                ),
            }
        }
    }
    Ok(())
}
