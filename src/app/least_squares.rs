//! Regularized linear least squares.

use std::str::FromStr;

use num_traits::{One, Zero};

use crate::alg::{
    CgOptions, ConjugateGradient, GradientOptions, PdhgOptions, PrimalDual, ProximalGradient,
    Solver, VectorFn,
};
use crate::backend::{check_len, Backend, Real};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::linop::{self, SharedOp};
use crate::prox::{self, SharedProx};

use super::{App, MaxEig};

/// Closed-form value of the regularization function, used for objective
/// evaluation when a proximal regularizer is in play.
pub type ObjectiveFn<B> = Box<dyn Fn(&B, &<B as Backend>::Buffer) -> Result<Real<B>>>;

/// Which solver kernel [`LinearLeastSquares`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsqMethod {
    /// Conjugate gradient on the normal equations. Requires no proximal
    /// regularizer.
    ConjugateGradient,
    /// Proximal gradient descent. Requires the regularizer to act on `x`
    /// directly, without a `G` operator.
    ProximalGradient,
    /// Primal-dual hybrid gradient over the stacked operator. Requires the
    /// `R` term to be folded into `A` beforehand.
    PrimalDual,
}

impl LsqMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConjugateGradient => "conjugate_gradient",
            Self::ProximalGradient => "proximal_gradient",
            Self::PrimalDual => "primal_dual",
        }
    }
}

impl FromStr for LsqMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "conjugate_gradient" => Ok(Self::ConjugateGradient),
            "proximal_gradient" => Ok(Self::ProximalGradient),
            "primal_dual" => Ok(Self::PrimalDual),
            _ => Err(Error::UnknownAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

/// Options for [`LinearLeastSquares`].
pub struct LeastSquaresOptions<B: Backend> {
    /// Proximal operator of the regularization function `g`.
    pub proxg: Option<SharedProx<B>>,
    /// Closed form of `g`, needed only to evaluate the objective.
    pub g: Option<ObjectiveFn<B>>,
    /// Operator inside `g`, making the regularizer `g(G x)`.
    pub g_op: Option<SharedOp<B>>,
    /// L2 regularization weight `lamda`.
    pub lamda: Real<B>,
    /// L2 regularization operator `R`; identity when unset.
    pub reg_op: Option<SharedOp<B>>,
    /// Per-sample least-squares weights.
    pub weights: Option<B::Buffer>,
    /// L2 bias regularization weight `mu`.
    pub mu: Real<B>,
    /// Bias target `z`; zero when unset.
    pub bias: Option<B::Buffer>,
    /// Solver kernel override. Unset picks by problem shape: conjugate
    /// gradient without `proxg`, proximal gradient with `proxg` alone, and
    /// primal-dual once `g_op` joins it.
    pub method: Option<LsqMethod>,
    pub max_iter: usize,
    /// Preconditioner for the conjugate gradient path.
    pub precond: Option<SharedOp<B>>,
    /// Gradient step size; derived from a spectral-norm estimate when unset.
    pub alpha: Option<Real<B>>,
    /// Nesterov acceleration for the gradient path.
    pub accelerate: bool,
    /// Power iterations spent estimating step sizes.
    pub max_power_iter: usize,
    /// Primal step size; derived when unset.
    pub tau: Option<Real<B>>,
    /// Dual step size; derived when unset.
    pub sigma: Option<Real<B>>,
    /// Record the objective after every iteration.
    pub save_objective_values: bool,
    pub show_progress: bool,
}

impl<B: Backend> Default for LeastSquaresOptions<B> {
    fn default() -> Self {
        Self {
            proxg: None,
            g: None,
            g_op: None,
            lamda: <Real<B> as Zero>::zero(),
            reg_op: None,
            weights: None,
            mu: <Real<B> as Zero>::zero(),
            bias: None,
            method: None,
            max_iter: 100,
            precond: None,
            alpha: None,
            accelerate: true,
            max_power_iter: 10,
            tau: None,
            sigma: None,
            save_objective_values: false,
            show_progress: false,
        }
    }
}

/// Solves `min_x 1/2 ||A x - y||_W^2 + g(G x) + lamda/2 ||R x||^2
/// + mu/2 ||x - z||^2`.
///
/// One of three kernels runs depending on the regularizer: conjugate
/// gradient on the normal equations when `g` has no proximal part, proximal
/// gradient when `proxg` acts on `x` directly, and primal-dual hybrid
/// gradient over the stacked operator `[A; G]` otherwise. Step sizes not
/// supplied by the caller are calibrated with a power-iteration estimate of
/// the relevant spectral norm during `init`, so assembly itself stays cheap.
pub struct LinearLeastSquares<B: Backend> {
    backend: B,
    a: SharedOp<B>,
    y: B::Buffer,
    solver: Solver<B>,
    method: LsqMethod,
    proxg: Option<SharedProx<B>>,
    g: Option<ObjectiveFn<B>>,
    g_op: Option<SharedOp<B>>,
    reg_op: Option<SharedOp<B>>,
    weights: Option<B::Buffer>,
    lamda: Real<B>,
    mu: Real<B>,
    bias: Option<B::Buffer>,
    alpha: Option<Real<B>>,
    max_power_iter: usize,
    save_objective_values: bool,
    objective_values: Vec<Real<B>>,
    show_progress: bool,
}

impl<B: Backend> LinearLeastSquares<B> {
    pub fn new(
        backend: B,
        a: SharedOp<B>,
        y: B::Buffer,
        x: B::Buffer,
        options: LeastSquaresOptions<B>,
    ) -> Result<Self> {
        check_len(&backend, &y, a.range(), "least squares observation")?;
        check_len(&backend, &x, a.domain(), "least squares start vector")?;
        if let Some(weights) = &options.weights {
            check_len(&backend, weights, a.range(), "least squares weights")?;
        }
        if let Some(bias) = &options.bias {
            check_len(&backend, bias, a.domain(), "least squares bias target")?;
        }
        if let Some(reg_op) = &options.reg_op {
            if reg_op.domain() != a.domain() {
                return Err(Error::ShapeMismatch {
                    expected: a.domain(),
                    actual: reg_op.domain(),
                    context: "l2 regularization operator".to_string(),
                });
            }
        }
        if let Some(g_op) = &options.g_op {
            if g_op.domain() != a.domain() {
                return Err(Error::ShapeMismatch {
                    expected: a.domain(),
                    actual: g_op.domain(),
                    context: "regularization operator".to_string(),
                });
            }
        }

        let method = match options.method {
            Some(method) => method,
            None => {
                if options.proxg.is_none() {
                    LsqMethod::ConjugateGradient
                } else if options.g_op.is_none() {
                    LsqMethod::ProximalGradient
                } else {
                    LsqMethod::PrimalDual
                }
            }
        };

        let solver = match method {
            LsqMethod::ConjugateGradient => {
                if options.proxg.is_some() {
                    return Err(Error::InvalidConfiguration {
                        message: "conjugate gradient cannot run with proxg; \
                                  pick the proximal gradient or primal-dual method"
                            .to_string(),
                    });
                }
                Self::build_conjugate_gradient(&backend, &a, x, &options)?
            }
            LsqMethod::ProximalGradient => {
                if options.g_op.is_some() {
                    return Err(Error::InvalidConfiguration {
                        message: "proximal gradient cannot run with a regularization \
                                  operator; pick the primal-dual method"
                            .to_string(),
                    });
                }
                Self::build_proximal_gradient(&backend, &a, &y, x, &options)?
            }
            LsqMethod::PrimalDual => {
                if options.reg_op.is_some() {
                    return Err(Error::InvalidConfiguration {
                        message: "primal-dual cannot run with an l2 regularization \
                                  operator; fold it into the forward operator"
                            .to_string(),
                    });
                }
                Self::build_primal_dual(&backend, &a, &y, x, &options)?
            }
        };

        Ok(Self {
            backend,
            a,
            y,
            solver,
            method,
            proxg: options.proxg,
            g: options.g,
            g_op: options.g_op,
            reg_op: options.reg_op,
            weights: options.weights,
            lamda: options.lamda,
            mu: options.mu,
            bias: options.bias,
            alpha: options.alpha,
            max_power_iter: options.max_power_iter,
            save_objective_values: options.save_objective_values,
            objective_values: Vec::new(),
            show_progress: options.show_progress,
        })
    }

    /// The kernel the assembly settled on.
    pub fn method(&self) -> LsqMethod {
        self.method
    }

    /// Objective trace recorded while `save_objective_values` was set.
    pub fn objective_values(&self) -> &[Real<B>] {
        &self.objective_values
    }

    /// `A^H W A + lamda R^H R + mu I` as an operator expression.
    fn normal_operator(
        backend: &B,
        a: &SharedOp<B>,
        weights: Option<&B::Buffer>,
        lamda: Real<B>,
        reg_op: Option<&SharedOp<B>>,
        mu: Real<B>,
    ) -> Result<SharedOp<B>> {
        let n = a.domain();
        let zero = <Real<B> as Zero>::zero();

        let aha = match weights {
            Some(weights) => {
                let w = linop::diag(backend, backend.copy(weights)?)?;
                linop::compose(linop::adjoint(a.clone()), linop::compose(w, a.clone())?)?
            }
            None => linop::compose(linop::adjoint(a.clone()), a.clone())?,
        };

        let mut terms = vec![aha];
        if lamda != zero {
            let rhr = match reg_op {
                Some(r) => linop::compose(linop::adjoint(r.clone()), r.clone())?,
                None => linop::identity(n),
            };
            terms.push(linop::scaled(lamda, rhr));
        }
        if mu != zero {
            terms.push(linop::scaled(mu, linop::identity(n)));
        }
        linop::sum_of(terms)
    }

    fn build_conjugate_gradient(
        backend: &B,
        a: &SharedOp<B>,
        x: B::Buffer,
        options: &LeastSquaresOptions<B>,
    ) -> Result<Solver<B>> {
        let normal = Self::normal_operator(
            backend,
            a,
            options.weights.as_ref(),
            options.lamda,
            options.reg_op.as_ref(),
            options.mu,
        )?;
        let cg = ConjugateGradient::pending_rhs(
            backend.clone(),
            normal,
            x,
            CgOptions {
                precond: options.precond.clone(),
                max_iter: options.max_iter,
            },
        )?;
        Ok(cg.into())
    }

    fn build_proximal_gradient(
        backend: &B,
        a: &SharedOp<B>,
        y: &B::Buffer,
        x: B::Buffer,
        options: &LeastSquaresOptions<B>,
    ) -> Result<Solver<B>> {
        let a = a.clone();
        let y = backend.copy(y)?;
        let weights = match &options.weights {
            Some(weights) => Some(backend.copy(weights)?),
            None => None,
        };
        let reg_op = options.reg_op.clone();
        let bias = match &options.bias {
            Some(bias) => Some(backend.copy(bias)?),
            None => None,
        };
        let lamda = options.lamda;
        let mu = options.mu;
        let zero = <Real<B> as Zero>::zero();

        // gradf(x) = A^H W (A x - y) + lamda R^H R x + mu (x - z)
        let gradf: VectorFn<B> = Box::new(move |backend: &B, x: &B::Buffer| {
            let mut r = a.apply(backend, x)?;
            r = backend.sub(&r, &y)?;
            if let Some(weights) = &weights {
                r = backend.mul(weights, &r)?;
            }
            let mut grad = a.adjoint_apply(backend, &r)?;

            if lamda != zero {
                let reg = match &reg_op {
                    Some(r) => {
                        let rx = r.apply(backend, x)?;
                        r.adjoint_apply(backend, &rx)?
                    }
                    None => backend.copy(x)?,
                };
                backend.axpy(&mut grad, B::Elem::from_real(lamda), &reg)?;
            }

            if mu != zero {
                let pull = match &bias {
                    Some(bias) => backend.sub(x, bias)?,
                    None => backend.copy(x)?,
                };
                backend.axpy(&mut grad, B::Elem::from_real(mu), &pull)?;
            }

            Ok(grad)
        });

        let alg = ProximalGradient::new(
            backend.clone(),
            gradf,
            x,
            GradientOptions {
                proxg: options.proxg.clone(),
                alpha: options.alpha,
                accelerate: options.accelerate,
                max_iter: options.max_iter,
            },
        )?;
        Ok(alg.into())
    }

    fn build_primal_dual(
        backend: &B,
        a: &SharedOp<B>,
        y: &B::Buffer,
        x: B::Buffer,
        options: &LeastSquaresOptions<B>,
    ) -> Result<Solver<B>> {
        let n = a.domain();
        let zero = <Real<B> as Zero>::zero();
        let one = <Real<B> as One>::one();

        // Fold the weights in as W^{1/2} A and W^{1/2} y so the data term
        // becomes a plain L2 distance.
        let (a_eff, neg_y) = match &options.weights {
            Some(weights) => {
                let w_sqrt = backend.sqrt(weights)?;
                let folded_y = backend.mul(&w_sqrt, y)?;
                let neg_y = backend.scaled(&folded_y, B::Elem::from_real(-one))?;
                let w_half = linop::diag(backend, w_sqrt)?;
                (linop::compose(w_half, a.clone())?, neg_y)
            }
            None => (
                a.clone(),
                backend.scaled(y, B::Elem::from_real(-one))?,
            ),
        };
        let m = a_eff.range();

        // The smooth lamda and mu terms ride along as an explicit gradient
        // and contribute their strong convexity to the primal side.
        let gamma_primal = options.lamda + options.mu;
        let gradh = if gamma_primal != zero {
            let lamda = options.lamda;
            let mu = options.mu;
            let bias = match &options.bias {
                Some(bias) => Some(backend.copy(bias)?),
                None => None,
            };
            let gradh: VectorFn<B> = Box::new(move |backend: &B, x: &B::Buffer| {
                let mut grad = backend.zeros(backend.len(x))?;
                if lamda != zero {
                    backend.axpy(&mut grad, B::Elem::from_real(lamda), x)?;
                }
                if mu != zero {
                    let pull = match &bias {
                        Some(bias) => backend.sub(x, bias)?,
                        None => backend.copy(x)?,
                    };
                    backend.axpy(&mut grad, B::Elem::from_real(mu), &pull)?;
                }
                Ok(grad)
            });
            Some(gradh)
        } else {
            None
        };

        let proxg = match &options.proxg {
            Some(proxg) => proxg.clone(),
            None => prox::no_op::<B>(n),
        };

        let (op, proxfc, primal_prox, u, gamma_dual) = match &options.g_op {
            // Dual variable pairs with the residual alone; the conjugate of
            // the shifted L2 data term is 1-strongly convex.
            None => {
                let proxfc = prox::l2_reg::<B>(m, one, Some(neg_y));
                let u = backend.zeros(m)?;
                (a_eff, proxfc, proxg, u, one)
            }
            // Stack the data term with g(G x) and push all of g into the
            // dual side.
            Some(g_op) => {
                let stacked = linop::vstack(vec![a_eff, g_op.clone()])?;
                let proxfc = prox::stack_prox(vec![
                    prox::l2_reg::<B>(m, one, Some(neg_y)),
                    prox::conj_prox(proxg),
                ])?;
                let u = backend.zeros(stacked.range())?;
                (stacked, proxfc, prox::no_op::<B>(n), u, zero)
            }
        };

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
                theta: one,
                gradh,
                gamma_primal,
                gamma_dual,
                max_iter: options.max_iter,
            },
        )?;
        Ok(alg.into())
    }

    /// Right-hand side of the normal equations, `A^H (W y) + mu z`.
    fn cg_rhs(&self) -> Result<B::Buffer> {
        let weighted = match &self.weights {
            Some(weights) => self.backend.mul(weights, &self.y)?,
            None => self.backend.copy(&self.y)?,
        };
        let mut b = self.a.adjoint_apply(&self.backend, &weighted)?;
        let zero = <Real<B> as Zero>::zero();
        if self.mu != zero {
            if let Some(bias) = &self.bias {
                self.backend
                    .axpy(&mut b, B::Elem::from_real(self.mu), bias)?;
            }
        }
        Ok(b)
    }

    fn max_eig(&self, op: SharedOp<B>) -> Result<Real<B>> {
        MaxEig::new(self.backend.clone(), op, self.max_power_iter)?
            .show_progress(self.show_progress)
            .run()
    }

    fn derive_alpha(&self) -> Result<Real<B>> {
        let normal = Self::normal_operator(
            &self.backend,
            &self.a,
            self.weights.as_ref(),
            self.lamda,
            self.reg_op.as_ref(),
            self.mu,
        )?;
        Ok(<Real<B> as One>::one() / self.max_eig(normal)?)
    }

    /// `1 / (max_eig(sigma A^H A) + lamda + mu)` for the primal step.
    fn derive_tau(&self, op: &SharedOp<B>, sigma: Real<B>) -> Result<Real<B>> {
        let normal = linop::scaled(
            sigma,
            linop::compose(linop::adjoint(op.clone()), op.clone())?,
        );
        let one = <Real<B> as One>::one();
        Ok(one / (self.max_eig(normal)? + self.lamda + self.mu))
    }

    /// `1 / max_eig(tau A A^H)` for the dual step.
    fn derive_sigma(&self, op: &SharedOp<B>, tau: Real<B>) -> Result<Real<B>> {
        let normal = linop::scaled(
            tau,
            linop::compose(op.clone(), linop::adjoint(op.clone()))?,
        );
        Ok(<Real<B> as One>::one() / self.max_eig(normal)?)
    }

    /// Current value of the full objective.
    pub fn objective(&self) -> Result<Real<B>> {
        let x = self.solver.iterate().ok_or_else(|| Error::Uninitialized {
            context: "least squares iterate".to_string(),
        })?;
        let one = <Real<B> as One>::one();
        let two = one + one;
        let zero = <Real<B> as Zero>::zero();

        let mut r = self.a.apply(&self.backend, x)?;
        r = self.backend.sub(&r, &self.y)?;
        if let Some(weights) = &self.weights {
            let w_sqrt = self.backend.sqrt(weights)?;
            r = self.backend.mul(&w_sqrt, &r)?;
        }
        let mut obj = self.backend.norm_sq(&r)? / two;

        if self.lamda > zero {
            let reg = match &self.reg_op {
                Some(reg_op) => {
                    let rx = reg_op.apply(&self.backend, x)?;
                    self.backend.norm_sq(&rx)?
                }
                None => self.backend.norm_sq(x)?,
            };
            obj = obj + self.lamda / two * reg;
        }

        if self.mu != zero {
            let pull = match &self.bias {
                Some(bias) => self.backend.sub(x, bias)?,
                None => self.backend.copy(x)?,
            };
            obj = obj + self.mu / two * self.backend.norm_sq(&pull)?;
        }

        if self.proxg.is_some() {
            let g = self.g.as_ref().ok_or_else(|| Error::InvalidConfiguration {
                message: "objective needs the closed form of g when proxg is set".to_string(),
            })?;
            obj = obj
                + match &self.g_op {
                    Some(g_op) => {
                        let gx = g_op.apply(&self.backend, x)?;
                        g(&self.backend, &gx)?
                    }
                    None => g(&self.backend, x)?,
                };
        }

        Ok(obj)
    }
}

impl<B: Backend> App<B> for LinearLeastSquares<B> {
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
        match self.method {
            LsqMethod::ConjugateGradient => {
                let b = self.cg_rhs()?;
                if let Solver::ConjugateGradient(cg) = &mut self.solver {
                    cg.set_rhs(b)?;
                }
            }
            LsqMethod::ProximalGradient => {
                if self.alpha.is_none() {
                    let alpha = self.derive_alpha()?;
                    if let Solver::Gradient(alg) = &mut self.solver {
                        alg.set_alpha(alpha);
                    }
                }
            }
            LsqMethod::PrimalDual => {
                let (op, tau, sigma) = match &self.solver {
                    Solver::PrimalDual(pd) => (pd.operator().clone(), pd.tau(), pd.sigma()),
                    _ => unreachable!("primal-dual method wraps a primal-dual kernel"),
                };
                let one = <Real<B> as One>::one();
                let (tau, sigma) = match (tau, sigma) {
                    (None, Some(sigma)) => (Some(self.derive_tau(&op, sigma)?), Some(sigma)),
                    (Some(tau), None) => (Some(tau), Some(self.derive_sigma(&op, tau)?)),
                    (None, None) => (Some(self.derive_tau(&op, one)?), Some(one)),
                    supplied => supplied,
                };
                if let Solver::PrimalDual(pd) = &mut self.solver {
                    if let Some(tau) = tau {
                        pd.set_tau(tau);
                    }
                    if let Some(sigma) = sigma {
                        pd.set_sigma(sigma);
                    }
                }
            }
        }

        self.objective_values.clear();
        Ok(())
    }

    fn summarize(&mut self) -> Result<()> {
        if self.save_objective_values {
            let obj = self.objective()?;
            self.objective_values.push(obj);
            if self.show_progress {
                log::debug!("[least squares] objective {:e}", obj);
            }
        }
        Ok(())
    }

    fn output(&mut self) -> Result<B::Buffer> {
        let x = self.solver.iterate().ok_or_else(|| Error::Uninitialized {
            context: "least squares iterate".to_string(),
        })?;
        self.backend.copy(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CpuBackend, DenseMatrix};
    use crate::linop::identity;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    type B = CpuBackend<f64>;

    #[test]
    fn test_method_strings_round_trip() {
        for method in [
            LsqMethod::ConjugateGradient,
            LsqMethod::ProximalGradient,
            LsqMethod::PrimalDual,
        ] {
            assert_eq!(method.as_str().parse::<LsqMethod>().unwrap(), method);
        }
        assert!(matches!(
            "newton".parse::<LsqMethod>(),
            Err(Error::UnknownAlgorithm { .. })
        ));
    }

    #[test]
    fn test_auto_selection() {
        let backend = B::seeded(1);
        let y = vec![1.0, 2.0];

        let app = LinearLeastSquares::new(
            backend.clone(),
            identity(2),
            y.clone(),
            vec![0.0; 2],
            LeastSquaresOptions::default(),
        )
        .unwrap();
        assert_eq!(app.method(), LsqMethod::ConjugateGradient);

        let app = LinearLeastSquares::new(
            backend.clone(),
            identity(2),
            y.clone(),
            vec![0.0; 2],
            LeastSquaresOptions {
                proxg: Some(prox::no_op::<B>(2)),
                ..LeastSquaresOptions::default()
            },
        )
        .unwrap();
        assert_eq!(app.method(), LsqMethod::ProximalGradient);

        let app = LinearLeastSquares::new(
            backend,
            identity(2),
            y,
            vec![0.0; 2],
            LeastSquaresOptions {
                proxg: Some(prox::no_op::<B>(2)),
                g_op: Some(identity(2)),
                ..LeastSquaresOptions::default()
            },
        )
        .unwrap();
        assert_eq!(app.method(), LsqMethod::PrimalDual);
    }

    #[test]
    fn test_conflicting_options_are_rejected() {
        let backend = B::new();

        // proxg on the conjugate gradient path.
        assert!(matches!(
            LinearLeastSquares::new(
                backend.clone(),
                identity(2),
                vec![0.0; 2],
                vec![0.0; 2],
                LeastSquaresOptions {
                    proxg: Some(prox::no_op::<B>(2)),
                    method: Some(LsqMethod::ConjugateGradient),
                    ..LeastSquaresOptions::default()
                },
            ),
            Err(Error::InvalidConfiguration { .. })
        ));

        // G on the gradient path.
        assert!(matches!(
            LinearLeastSquares::new(
                backend.clone(),
                identity(2),
                vec![0.0; 2],
                vec![0.0; 2],
                LeastSquaresOptions {
                    proxg: Some(prox::no_op::<B>(2)),
                    g_op: Some(identity(2)),
                    method: Some(LsqMethod::ProximalGradient),
                    ..LeastSquaresOptions::default()
                },
            ),
            Err(Error::InvalidConfiguration { .. })
        ));

        // R on the primal-dual path.
        assert!(matches!(
            LinearLeastSquares::new(
                backend,
                identity(2),
                vec![0.0; 2],
                vec![0.0; 2],
                LeastSquaresOptions {
                    proxg: Some(prox::no_op::<B>(2)),
                    g_op: Some(identity(2)),
                    reg_op: Some(identity(2)),
                    ..LeastSquaresOptions::default()
                },
            ),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_identity_recovers_observation() {
        let backend = B::seeded(4);
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let mut app = LinearLeastSquares::new(
            backend,
            identity(4),
            y.clone(),
            vec![0.0; 4],
            LeastSquaresOptions {
                max_iter: 5,
                ..LeastSquaresOptions::default()
            },
        )
        .unwrap();
        let x = app.run().unwrap();
        for (xi, yi) in x.iter().zip(&y) {
            assert_relative_eq!(xi, yi, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_weighted_regularized_normal_equations() {
        // min 1/2 ||Ax - y||_W^2 + lamda/2 ||x||^2 with diagonal A has the
        // closed-form solution (a_i^2 w_i y_i / a_i) / (a_i^2 w_i + lamda).
        let backend = B::seeded(8);
        let a = Arc::new(DenseMatrix::new(2, 2, vec![2.0, 0.0, 0.0, 1.0]).unwrap());
        let y = vec![4.0, 3.0];
        let weights = vec![1.0, 2.0];
        let lamda = 0.5;
        let mut app = LinearLeastSquares::new(
            backend,
            a,
            y,
            vec![0.0; 2],
            LeastSquaresOptions {
                lamda,
                weights: Some(weights),
                max_iter: 10,
                ..LeastSquaresOptions::default()
            },
        )
        .unwrap();
        let x = app.run().unwrap();
        assert_relative_eq!(x[0], 2.0 * 1.0 * 4.0 / (4.0 + 0.5), epsilon = 1e-8);
        assert_relative_eq!(x[1], 1.0 * 2.0 * 3.0 / (2.0 + 0.5), epsilon = 1e-8);
    }

    fn soft_threshold(lamda: f64, n: usize) -> SharedProx<B> {
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
    fn test_gradient_path_derives_alpha_from_spectral_norm() {
        // A = diag(2, 1) gives A^H A max eigenvalue 4, so alpha ~= 1/4.
        let backend = B::seeded(13);
        let a = Arc::new(DenseMatrix::new(2, 2, vec![2.0, 0.0, 0.0, 1.0]).unwrap());
        let mut app = LinearLeastSquares::new(
            backend,
            a,
            vec![2.0, 2.0],
            vec![0.0; 2],
            LeastSquaresOptions {
                proxg: Some(soft_threshold(0.1, 2)),
                max_iter: 50,
                max_power_iter: 40,
                ..LeastSquaresOptions::default()
            },
        )
        .unwrap();
        assert_eq!(app.method(), LsqMethod::ProximalGradient);
        app.run().unwrap();
        if let Solver::Gradient(alg) = app.solver() {
            assert_relative_eq!(alg.alpha().unwrap(), 0.25, epsilon = 1e-4);
        } else {
            panic!("expected the gradient kernel");
        }
    }

    #[test]
    fn test_lasso_solution_soft_thresholds() {
        // min 1/2 ||x - y||^2 + 0.1 ||x||_1 soft-thresholds y at 0.1.
        let backend = B::seeded(23);
        let y = vec![1.0, -0.05, 0.5];
        let mut app = LinearLeastSquares::new(
            backend,
            identity(3),
            y,
            vec![0.0; 3],
            LeastSquaresOptions {
                proxg: Some(soft_threshold(0.1, 3)),
                alpha: Some(1.0),
                max_iter: 100,
                ..LeastSquaresOptions::default()
            },
        )
        .unwrap();
        let x = app.run().unwrap();
        assert_relative_eq!(x[0], 0.9, epsilon = 1e-6);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(x[2], 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_primal_dual_path_matches_cg_solution() {
        // With proxg absent but the method forced, primal-dual solves the
        // same quadratic as conjugate gradient.
        let backend = B::seeded(31);
        let a = Arc::new(DenseMatrix::new(2, 2, vec![2.0, 1.0, 0.0, 1.0]).unwrap());
        let y = vec![3.0, 1.0];

        let mut cg = LinearLeastSquares::new(
            backend.clone(),
            a.clone(),
            y.clone(),
            vec![0.0; 2],
            LeastSquaresOptions {
                max_iter: 10,
                ..LeastSquaresOptions::default()
            },
        )
        .unwrap();
        let x_cg = cg.run().unwrap();

        let mut pd = LinearLeastSquares::new(
            backend,
            a,
            y,
            vec![0.0; 2],
            LeastSquaresOptions {
                method: Some(LsqMethod::PrimalDual),
                max_iter: 2000,
                max_power_iter: 30,
                ..LeastSquaresOptions::default()
            },
        )
        .unwrap();
        let x_pd = pd.run().unwrap();

        assert_relative_eq!(x_pd[0], x_cg[0], epsilon = 1e-4);
        assert_relative_eq!(x_pd[1], x_cg[1], epsilon = 1e-4);
    }

    #[test]
    fn test_objective_trace_decreases() {
        let backend = B::seeded(19);
        let y = vec![2.0, -1.0];
        let mut app = LinearLeastSquares::new(
            backend,
            identity(2),
            y,
            vec![0.0; 2],
            LeastSquaresOptions {
                proxg: Some(soft_threshold(0.1, 2)),
                g: Some(Box::new(|_backend: &B, x: &Vec<f64>| {
                    Ok(0.1 * x.iter().map(|v| v.abs()).sum::<f64>())
                })),
                alpha: Some(0.5),
                accelerate: false,
                max_iter: 20,
                save_objective_values: true,
                ..LeastSquaresOptions::default()
            },
        )
        .unwrap();
        app.run().unwrap();
        let trace = app.objective_values();
        assert!(!trace.is_empty());
        for pair in trace.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12);
        }
    }

    #[test]
    fn test_objective_without_g_closed_form_is_rejected() {
        let backend = B::new();
        let mut app = LinearLeastSquares::new(
            backend,
            identity(2),
            vec![1.0, 1.0],
            vec![0.0; 2],
            LeastSquaresOptions {
                proxg: Some(soft_threshold(0.1, 2)),
                alpha: Some(1.0),
                max_iter: 1,
                ..LeastSquaresOptions::default()
            },
        )
        .unwrap();
        app.run().unwrap();
        assert!(matches!(
            app.objective(),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_plain_gradient_descent_strictly_decreases_objective() {
        // Convex quadratic with L = 4; alpha = 0.1 < 1/L.
        let backend = B::seeded(3);
        let a = Arc::new(DenseMatrix::new(2, 2, vec![2.0, 0.0, 0.0, 1.0]).unwrap());
        let mut app = LinearLeastSquares::new(
            backend,
            a,
            vec![2.0, -2.0],
            vec![0.0; 2],
            LeastSquaresOptions {
                method: Some(LsqMethod::ProximalGradient),
                alpha: Some(0.1),
                accelerate: false,
                max_iter: 15,
                save_objective_values: true,
                ..LeastSquaresOptions::default()
            },
        )
        .unwrap();
        app.run().unwrap();
        let trace = app.objective_values();
        assert_eq!(trace.len(), 15);
        for pair in trace.windows(2) {
            assert!(pair[1] < pair[0]);
        }
    }

    #[test]
    fn test_bias_pulls_solution_toward_target() {
        // min 1/2 ||x - y||^2 + mu/2 ||x - z||^2 has solution
        // (y + mu z) / (1 + mu).
        let backend = B::seeded(6);
        let mut app = LinearLeastSquares::new(
            backend,
            identity(1),
            vec![1.0],
            vec![0.0],
            LeastSquaresOptions {
                mu: 3.0,
                bias: Some(vec![5.0]),
                max_iter: 10,
                ..LeastSquaresOptions::default()
            },
        )
        .unwrap();
        let x = app.run().unwrap();
        assert_relative_eq!(x[0], (1.0 + 15.0) / 4.0, epsilon = 1e-8);
    }
}
