//! Iterative solver kernels.
//!
//! Every kernel follows the same lifecycle: construct it with its problem
//! data, `init` once to allocate scratch state, call `update` until `done`
//! reports true, then `cleanup` to release the scratch. The harness in
//! [`crate::app`] drives that lifecycle and layers hooks around it; the
//! kernels only know how to take one step.
//!
//! [`Solver`] is the closed set of kernels the harness can drive. Each
//! variant is also usable on its own when no hooks are needed.

mod alt_min;
mod conjugate_gradient;
mod gradient;
mod newton;
mod power;
mod primal_dual;
mod proximal_point;

pub use alt_min::AlternatingMin;
pub use conjugate_gradient::{CgOptions, ConjugateGradient};
pub use gradient::{GradientOptions, ProximalGradient};
pub use newton::{NewtonOptions, ProximalNewton};
pub use power::PowerIteration;
pub use primal_dual::{PdhgOptions, PrimalDual};
pub use proximal_point::ProximalPoint;

use crate::backend::{Backend, Real};
use crate::error::Result;
use crate::linop::SharedOp;

/// Vector-valued callback on device buffers, e.g. a gradient map.
pub type VectorFn<B> =
    Box<dyn Fn(&B, &<B as Backend>::Buffer) -> Result<<B as Backend>::Buffer>>;

/// Produces the Hessian operator at a point.
pub type HessianFn<B> = Box<dyn Fn(&B, &<B as Backend>::Buffer) -> Result<SharedOp<B>>>;

/// Proximal map taken in the metric induced by a Hessian operator.
pub type HessProxFn<B> = Box<
    dyn Fn(&B, &SharedOp<B>, &<B as Backend>::Buffer) -> Result<<B as Backend>::Buffer>,
>;

/// One block minimization pass of an alternating scheme.
pub type BlockMinFn = Box<dyn FnMut() -> Result<()>>;

/// The solver kernels, dispatched as one closed sum.
///
/// Holding the kernels in a sum rather than behind a trait object keeps the
/// set closed: the harness and the assemblers can match on the concrete
/// variant to wire step sizes or right-hand sides during their init hooks.
pub enum Solver<B: Backend> {
    Power(PowerIteration<B>),
    ProximalPoint(ProximalPoint<B>),
    Gradient(ProximalGradient<B>),
    ConjugateGradient(ConjugateGradient<B>),
    Newton(ProximalNewton<B>),
    PrimalDual(PrimalDual<B>),
    AltMin(AlternatingMin<B>),
}

impl<B: Backend> Solver<B> {
    /// Resets the iteration count and allocates per-run scratch state.
    pub fn init(&mut self) -> Result<()> {
        match self {
            Solver::Power(s) => s.init(),
            Solver::ProximalPoint(s) => s.init(),
            Solver::Gradient(s) => s.init(),
            Solver::ConjugateGradient(s) => s.init(),
            Solver::Newton(s) => s.init(),
            Solver::PrimalDual(s) => s.init(),
            Solver::AltMin(s) => s.init(),
        }
    }

    /// Takes one step and advances the iteration count.
    pub fn update(&mut self) -> Result<()> {
        match self {
            Solver::Power(s) => s.update(),
            Solver::ProximalPoint(s) => s.update(),
            Solver::Gradient(s) => s.update(),
            Solver::ConjugateGradient(s) => s.update(),
            Solver::Newton(s) => s.update(),
            Solver::PrimalDual(s) => s.update(),
            Solver::AltMin(s) => s.update(),
        }
    }

    /// Whether iteration should stop. Pure: holds no side effects and may be
    /// polled repeatedly.
    pub fn done(&self) -> bool {
        match self {
            Solver::Power(s) => s.done(),
            Solver::ProximalPoint(s) => s.done(),
            Solver::Gradient(s) => s.done(),
            Solver::ConjugateGradient(s) => s.done(),
            Solver::Newton(s) => s.done(),
            Solver::PrimalDual(s) => s.done(),
            Solver::AltMin(s) => s.done(),
        }
    }

    /// Releases scratch state. Results such as the iterate and the last
    /// residual survive cleanup.
    pub fn cleanup(&mut self) {
        match self {
            Solver::Power(s) => s.cleanup(),
            Solver::ProximalPoint(s) => s.cleanup(),
            Solver::Gradient(s) => s.cleanup(),
            Solver::ConjugateGradient(s) => s.cleanup(),
            Solver::Newton(s) => s.cleanup(),
            Solver::PrimalDual(s) => s.cleanup(),
            Solver::AltMin(s) => s.cleanup(),
        }
    }

    pub fn iter(&self) -> usize {
        match self {
            Solver::Power(s) => s.iter(),
            Solver::ProximalPoint(s) => s.iter(),
            Solver::Gradient(s) => s.iter(),
            Solver::ConjugateGradient(s) => s.iter(),
            Solver::Newton(s) => s.iter(),
            Solver::PrimalDual(s) => s.iter(),
            Solver::AltMin(s) => s.iter(),
        }
    }

    pub fn max_iter(&self) -> usize {
        match self {
            Solver::Power(s) => s.max_iter(),
            Solver::ProximalPoint(s) => s.max_iter(),
            Solver::Gradient(s) => s.max_iter(),
            Solver::ConjugateGradient(s) => s.max_iter(),
            Solver::Newton(s) => s.max_iter(),
            Solver::PrimalDual(s) => s.max_iter(),
            Solver::AltMin(s) => s.max_iter(),
        }
    }

    /// Residual of the last step, for the kernels that track one.
    pub fn residual(&self) -> Option<Real<B>> {
        match self {
            Solver::Gradient(s) => Some(s.residual()),
            Solver::ConjugateGradient(s) => Some(s.residual()),
            Solver::PrimalDual(s) => Some(s.residual()),
            _ => None,
        }
    }

    /// Current primary iterate. Alternating minimization keeps its blocks
    /// inside the caller's closures and exposes none.
    pub fn iterate(&self) -> Option<&B::Buffer> {
        match self {
            Solver::Power(s) => Some(s.eigenvector()),
            Solver::ProximalPoint(s) => Some(s.x()),
            Solver::Gradient(s) => Some(s.x()),
            Solver::ConjugateGradient(s) => Some(s.x()),
            Solver::Newton(s) => Some(s.x()),
            Solver::PrimalDual(s) => Some(s.x()),
            Solver::AltMin(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Solver::Power(_) => "power iteration",
            Solver::ProximalPoint(_) => "proximal point",
            Solver::Gradient(_) => "proximal gradient",
            Solver::ConjugateGradient(_) => "conjugate gradient",
            Solver::Newton(_) => "proximal newton",
            Solver::PrimalDual(_) => "primal-dual",
            Solver::AltMin(_) => "alternating minimization",
        }
    }
}

impl<B: Backend> From<PowerIteration<B>> for Solver<B> {
    fn from(s: PowerIteration<B>) -> Self {
        Solver::Power(s)
    }
}

impl<B: Backend> From<ProximalPoint<B>> for Solver<B> {
    fn from(s: ProximalPoint<B>) -> Self {
        Solver::ProximalPoint(s)
    }
}

impl<B: Backend> From<ProximalGradient<B>> for Solver<B> {
    fn from(s: ProximalGradient<B>) -> Self {
        Solver::Gradient(s)
    }
}

impl<B: Backend> From<ConjugateGradient<B>> for Solver<B> {
    fn from(s: ConjugateGradient<B>) -> Self {
        Solver::ConjugateGradient(s)
    }
}

impl<B: Backend> From<ProximalNewton<B>> for Solver<B> {
    fn from(s: ProximalNewton<B>) -> Self {
        Solver::Newton(s)
    }
}

impl<B: Backend> From<PrimalDual<B>> for Solver<B> {
    fn from(s: PrimalDual<B>) -> Self {
        Solver::PrimalDual(s)
    }
}

impl<B: Backend> From<AlternatingMin<B>> for Solver<B> {
    fn from(s: AlternatingMin<B>) -> Self {
        Solver::AltMin(s)
    }
}
