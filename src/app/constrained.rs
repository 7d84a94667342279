//! L2-ball constrained minimization.

use num_traits::One;

use crate::alg::{PdhgOptions, PrimalDual, Solver};
use crate::backend::{check_len, Backend, Real};
use crate::error::{Error, Result};
use crate::linop::{self, SharedOp};
use crate::prox::{self, SharedProx};

use super::{App, MaxEig};

/// Options for [`L2ConstrainedMinimization`].
pub struct ConstrainedOptions<B: Backend> {
    /// Operator inside the objective, making it `g(G x)`.
    pub g_op: Option<SharedOp<B>>,
    /// Per-sample weights folded into the constraint.
    pub weights: Option<B::Buffer>,
    pub max_iter: usize,
    /// Primal step size. When either step size is unset, both are derived
    /// at init time: `tau = 1`, `sigma` from a spectral-norm estimate.
    pub tau: Option<Real<B>>,
    /// Dual step size.
    pub sigma: Option<Real<B>>,
    /// Extrapolation weight.
    pub theta: Real<B>,
    /// Power iterations spent estimating the spectral norm.
    pub max_power_iter: usize,
    pub show_progress: bool,
}

impl<B: Backend> Default for ConstrainedOptions<B> {
    fn default() -> Self {
        Self {
            g_op: None,
            weights: None,
            max_iter: 100,
            tau: None,
            sigma: None,
            theta: <Real<B> as One>::one(),
            max_power_iter: 30,
            show_progress: false,
        }
    }
}

/// Solves `min_x g(G x)` subject to `||A x - y||_2 <= eps`.
///
/// The constraint enters through the conjugate of the L2-ball projection on
/// the dual side of a primal-dual hybrid gradient run. With a `G` operator
/// the ball projection and `g` stack over `[A; G]` and the primal proximal
/// step degenerates to the identity.
pub struct L2ConstrainedMinimization<B: Backend> {
    backend: B,
    solver: Solver<B>,
    /// Normal operator whose top eigenvalue calibrates `sigma`.
    normal: SharedOp<B>,
    max_power_iter: usize,
    show_progress: bool,
}

impl<B: Backend> L2ConstrainedMinimization<B> {
    pub fn new(
        backend: B,
        a: SharedOp<B>,
        y: B::Buffer,
        x: B::Buffer,
        proxg: SharedProx<B>,
        eps: Real<B>,
        options: ConstrainedOptions<B>,
    ) -> Result<Self> {
        check_len(&backend, &y, a.range(), "constraint observation")?;
        check_len(&backend, &x, a.domain(), "constrained start vector")?;
        let n = a.domain();

        let (a_eff, y_eff) = match &options.weights {
            Some(weights) => {
                check_len(&backend, weights, a.range(), "constraint weights")?;
                let w_sqrt = backend.sqrt(weights)?;
                let folded_y = backend.mul(&w_sqrt, &y)?;
                let w_half = linop::diag(&backend, w_sqrt)?;
                (linop::compose(w_half, a.clone())?, folded_y)
            }
            None => (a.clone(), y),
        };
        let m = a_eff.range();

        let (op, proxfc, primal_prox, u) = match &options.g_op {
            None => {
                let proxfc = prox::conj_prox(prox::l2_proj::<B>(m, eps, Some(y_eff)));
                let u = backend.zeros(m)?;
                (a_eff, proxfc, proxg, u)
            }
            Some(g_op) => {
                if g_op.domain() != n {
                    return Err(Error::ShapeMismatch {
                        expected: n,
                        actual: g_op.domain(),
                        context: "objective operator".to_string(),
                    });
                }
                let stacked = linop::vstack(vec![a_eff, g_op.clone()])?;
                let proxfc = prox::conj_prox(prox::stack_prox(vec![
                    prox::l2_proj::<B>(m, eps, Some(y_eff)),
                    proxg,
                ])?);
                let u = backend.zeros(stacked.range())?;
                (stacked, proxfc, prox::no_op::<B>(n), u)
            }
        };

        let normal = linop::compose(linop::adjoint(op.clone()), op.clone())?;
        let alg = PrimalDual::new(
            backend.clone(),
            proxfc,
            primal_prox,
            op,
            x,
            u,
            PdhgOptions {
                tau: options.tau,
                sigma: options.sigma,
                theta: options.theta,
                max_iter: options.max_iter,
                ..PdhgOptions::default()
            },
        )?;

        Ok(Self {
            backend,
            solver: alg.into(),
            normal,
            max_power_iter: options.max_power_iter,
            show_progress: options.show_progress,
        })
    }
}

impl<B: Backend> App<B> for L2ConstrainedMinimization<B> {
    type Output = B::Buffer;

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
        let needs_steps = match &self.solver {
            Solver::PrimalDual(pd) => pd.tau().is_none() || pd.sigma().is_none(),
            _ => unreachable!("constrained minimization wraps a primal-dual kernel"),
        };
        if needs_steps {
            let one = <Real<B> as One>::one();
            let max_eig = MaxEig::new(
                self.backend.clone(),
                self.normal.clone(),
                self.max_power_iter,
            )?
            .show_progress(self.show_progress)
            .run()?;
            if let Solver::PrimalDual(pd) = &mut self.solver {
                pd.set_tau(one);
                pd.set_sigma(one / max_eig);
            }
        }
        Ok(())
    }

    fn output(&mut self) -> Result<B::Buffer> {
        let x = self.solver.iterate().ok_or_else(|| Error::Uninitialized {
            context: "constrained iterate".to_string(),
        })?;
        self.backend.copy(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::linop::identity;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    type B = CpuBackend<f64>;

    fn l1_prox(lamda: f64, n: usize) -> SharedProx<B> {
        struct Soft {
            lamda: f64,
            n: usize,
        }
        impl crate::prox::ProxOp<B> for Soft {
            fn len(&self) -> usize {
                self.n
            }
            fn prox(&self, _backend: &B, step: f64, v: &Vec<f64>) -> Result<Vec<f64>> {
                let t = step * self.lamda;
                Ok(v.iter()
                    .map(|&x| x.signum() * (x.abs() - t).max(0.0))
                    .collect())
            }
        }
        Arc::new(Soft { lamda, n })
    }

    #[test]
    fn test_solution_lands_on_constraint_boundary() {
        // min ||x||_1 s.t. ||x - y|| <= eps pulls each coordinate toward
        // zero until the ball stops it.
        let backend = B::seeded(41);
        let y = vec![3.0, 0.0];
        let eps = 1.0;
        let mut app = L2ConstrainedMinimization::new(
            backend.clone(),
            identity(2),
            y.clone(),
            vec![0.0; 2],
            l1_prox(1.0, 2),
            eps,
            ConstrainedOptions {
                max_iter: 3000,
                ..ConstrainedOptions::default()
            },
        )
        .unwrap();
        let x = app.run().unwrap();
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-2);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-2);
        let r = backend.sub(&x, &y).unwrap();
        assert_relative_eq!(backend.norm(&r).unwrap(), eps, epsilon = 1e-2);
    }

    #[test]
    fn test_feasible_start_with_zero_objective_stays_feasible() {
        // With g = 0 any feasible point is optimal; the run must keep the
        // iterate inside the ball.
        let backend = B::seeded(43);
        let y = vec![1.0, 2.0];
        let mut app = L2ConstrainedMinimization::new(
            backend.clone(),
            identity(2),
            y.clone(),
            vec![1.0, 2.0],
            prox::no_op::<B>(2),
            0.5,
            ConstrainedOptions {
                max_iter: 200,
                ..ConstrainedOptions::default()
            },
        )
        .unwrap();
        let x = app.run().unwrap();
        let r = backend.sub(&x, &y).unwrap();
        assert!(backend.norm(&r).unwrap() <= 0.5 + 1e-6);
    }

    #[test]
    fn test_default_steps_are_derived_at_init() {
        let backend = B::seeded(47);
        let mut app = L2ConstrainedMinimization::new(
            backend,
            identity(2),
            vec![1.0, 1.0],
            vec![0.0; 2],
            prox::no_op::<B>(2),
            1.0,
            ConstrainedOptions {
                max_iter: 1,
                ..ConstrainedOptions::default()
            },
        )
        .unwrap();
        app.run().unwrap();
        if let Solver::PrimalDual(pd) = app.solver() {
            // Identity operator: sigma = 1 / max_eig(I) = 1, tau = 1.
            assert_relative_eq!(pd.tau().unwrap(), 1.0);
            assert_relative_eq!(pd.sigma().unwrap(), 1.0, epsilon = 1e-9);
        } else {
            panic!("expected the primal-dual kernel");
        }
    }

    #[test]
    fn test_stacked_objective_operator() {
        // min ||G x||_1 with G = 2 I s.t. ||x - y|| <= eps still shrinks
        // toward zero along the feasible ball.
        let backend = B::seeded(53);
        let y = vec![4.0];
        let mut app = L2ConstrainedMinimization::new(
            backend,
            identity(1),
            y,
            vec![0.0],
            l1_prox(1.0, 1),
            1.0,
            ConstrainedOptions {
                g_op: Some(linop::scaled(2.0, identity(1))),
                max_iter: 4000,
                ..ConstrainedOptions::default()
            },
        )
        .unwrap();
        let x = app.run().unwrap();
        assert_relative_eq!(x[0], 3.0, epsilon = 5e-2);
    }
}
