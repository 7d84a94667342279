//! Primal-dual hybrid gradient method.

use num_traits::{Float, One, Zero};

use crate::backend::{check_len, Backend, Real};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::linop::SharedOp;
use crate::prox::SharedProx;

use super::VectorFn;

/// Configuration for [`PrimalDual`].
pub struct PdhgOptions<B: Backend> {
    /// Primal step size. Leave unset to fill in before the first update.
    pub tau: Option<Real<B>>,
    /// Dual step size. Leave unset to fill in before the first update.
    pub sigma: Option<Real<B>>,
    /// Extrapolation weight.
    pub theta: Real<B>,
    /// Gradient of an extra smooth primal term.
    pub gradh: Option<VectorFn<B>>,
    /// Strong convexity of the primal objective. Positive values steer the
    /// step-size rebalancing.
    pub gamma_primal: Real<B>,
    /// Strong convexity of the dual objective.
    pub gamma_dual: Real<B>,
    pub max_iter: usize,
}

impl<B: Backend> Default for PdhgOptions<B> {
    fn default() -> Self {
        Self {
            tau: None,
            sigma: None,
            theta: <Real<B> as One>::one(),
            gradh: None,
            gamma_primal: <Real<B> as Zero>::zero(),
            gamma_dual: <Real<B> as Zero>::zero(),
            max_iter: 100,
        }
    }
}

/// Solves `min_x max_u <A x, u> + g(x) + h(x) - f*(u)` by alternating a
/// dual ascent step through `proxfc` with a primal descent step through
/// `proxg`, extrapolating the primal iterate between steps.
///
/// When exactly one of the strong convexity constants is positive, the
/// step sizes are rebalanced every iteration: the strongly convex side's
/// step shrinks while the other grows, with the extrapolation weight
/// following. When both are positive the steps are left fixed; the
/// accelerated schedule is only defined for one-sided strong convexity.
pub struct PrimalDual<B: Backend> {
    backend: B,
    proxfc: SharedProx<B>,
    proxg: SharedProx<B>,
    a: SharedOp<B>,
    x: B::Buffer,
    u: B::Buffer,
    tau: Option<Real<B>>,
    sigma: Option<Real<B>>,
    theta: Real<B>,
    gamma_primal: Real<B>,
    gamma_dual: Real<B>,
    gradh: Option<VectorFn<B>>,
    resid: Real<B>,
    x_ext: Option<B::Buffer>,
    iter: usize,
    max_iter: usize,
}

impl<B: Backend> PrimalDual<B> {
    pub fn new(
        backend: B,
        proxfc: SharedProx<B>,
        proxg: SharedProx<B>,
        a: SharedOp<B>,
        x: B::Buffer,
        u: B::Buffer,
        options: PdhgOptions<B>,
    ) -> Result<Self> {
        check_len(&backend, &x, a.domain(), "primal iterate")?;
        check_len(&backend, &u, a.range(), "dual iterate")?;
        if proxfc.len() != a.range() {
            return Err(Error::ShapeMismatch {
                expected: a.range(),
                actual: proxfc.len(),
                context: "dual prox".to_string(),
            });
        }
        if proxg.len() != a.domain() {
            return Err(Error::ShapeMismatch {
                expected: a.domain(),
                actual: proxg.len(),
                context: "primal prox".to_string(),
            });
        }
        Ok(Self {
            backend,
            proxfc,
            proxg,
            a,
            x,
            u,
            tau: options.tau,
            sigma: options.sigma,
            theta: options.theta,
            gamma_primal: options.gamma_primal,
            gamma_dual: options.gamma_dual,
            gradh: options.gradh,
            resid: Real::<B>::infinity(),
            x_ext: None,
            iter: 0,
            max_iter: options.max_iter,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        let _ctx = self.backend.scope();
        self.iter = 0;
        self.resid = Real::<B>::infinity();
        self.x_ext = Some(self.backend.copy(&self.x)?);
        Ok(())
    }

    pub fn update(&mut self) -> Result<()> {
        let _ctx = self.backend.scope();
        let tau = self.tau.ok_or_else(|| Error::Uninitialized {
            context: "primal step size".to_string(),
        })?;
        let sigma = self.sigma.ok_or_else(|| Error::Uninitialized {
            context: "dual step size".to_string(),
        })?;

        let u_old = self.backend.copy(&self.u)?;
        let x_old = self.backend.copy(&self.x)?;

        // Dual ascent at the extrapolated primal point.
        {
            let x_ext = self.x_ext.as_ref().ok_or_else(|| Error::Uninitialized {
                context: "primal-dual state".to_string(),
            })?;
            let ax = self.a.apply(&self.backend, x_ext)?;
            self.backend
                .axpy(&mut self.u, B::Elem::from_real(sigma), &ax)?;
        }
        self.u = self.proxfc.prox(&self.backend, sigma, &self.u)?;

        // Primal descent.
        let mut dx = self.a.adjoint_apply(&self.backend, &self.u)?;
        if let Some(gradh) = &self.gradh {
            let g = gradh(&self.backend, &self.x)?;
            dx = self.backend.add(&dx, &g)?;
        }
        self.backend
            .axpy(&mut self.x, B::Elem::from_real(-tau), &dx)?;
        self.x = self.proxg.prox(&self.backend, tau, &self.x)?;

        // Step-size rebalancing under one-sided strong convexity.
        let zero = <Real<B> as Zero>::zero();
        let one = <Real<B> as One>::one();
        let two = one + one;
        let (theta, tau_new, sigma_new) =
            if self.gamma_primal > zero && self.gamma_dual == zero {
                let theta = one / (one + two * self.gamma_primal * tau).sqrt();
                (theta, tau * theta, sigma / theta)
            } else if self.gamma_dual > zero && self.gamma_primal == zero {
                let theta = one / (one + two * self.gamma_dual * sigma).sqrt();
                (theta, tau / theta, sigma * theta)
            } else {
                (self.theta, tau, sigma)
            };
        self.theta = theta;
        self.tau = Some(tau_new);
        self.sigma = Some(sigma_new);

        // Extrapolate for the next dual step.
        let diff_x = self.backend.sub(&self.x, &x_old)?;
        let mut x_ext = self.backend.copy(&self.x)?;
        self.backend
            .axpy(&mut x_ext, B::Elem::from_real(theta), &diff_x)?;
        self.x_ext = Some(x_ext);

        let diff_u = self.backend.sub(&self.u, &u_old)?;
        let resid_sq = self.backend.norm_sq(&diff_x)? / tau_new
            + self.backend.norm_sq(&diff_u)? / sigma_new;
        self.resid = resid_sq.sqrt();
        self.iter += 1;
        Ok(())
    }

    pub fn done(&self) -> bool {
        self.iter >= self.max_iter
    }

    pub fn cleanup(&mut self) {
        self.x_ext = None;
    }

    pub fn iter(&self) -> usize {
        self.iter
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn residual(&self) -> Real<B> {
        self.resid
    }

    pub fn x(&self) -> &B::Buffer {
        &self.x
    }

    pub fn dual(&self) -> &B::Buffer {
        &self.u
    }

    /// The coupling operator the saddle problem was posed with.
    pub fn operator(&self) -> &SharedOp<B> {
        &self.a
    }

    pub fn tau(&self) -> Option<Real<B>> {
        self.tau
    }

    pub fn sigma(&self) -> Option<Real<B>> {
        self.sigma
    }

    pub fn set_tau(&mut self, tau: Real<B>) {
        self.tau = Some(tau);
    }

    pub fn set_sigma(&mut self, sigma: Real<B>) {
        self.sigma = Some(sigma);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::linop::identity;
    use crate::prox::{conj_prox, l2_reg, no_op};
    use approx::assert_relative_eq;

    type B = CpuBackend<f64>;

    fn l2_fit(y: Vec<f64>, options: PdhgOptions<B>) -> PrimalDual<B> {
        // min_x ||x - y||^2 / 2 posed in saddle form with A = I.
        let n = y.len();
        let backend = B::new();
        let proxfc = conj_prox(l2_reg::<B>(n, 1.0, Some(y)));
        PrimalDual::new(
            backend,
            proxfc,
            no_op::<B>(n),
            identity(n),
            vec![0.0; n],
            vec![0.0; n],
            options,
        )
        .unwrap()
    }

    #[test]
    fn test_recovers_l2_fit() {
        let options = PdhgOptions {
            tau: Some(0.5),
            sigma: Some(0.5),
            max_iter: 200,
            ..PdhgOptions::default()
        };
        let mut alg = l2_fit(vec![1.0, -2.0, 3.0], options);
        alg.init().unwrap();
        while !alg.done() {
            alg.update().unwrap();
        }
        assert_relative_eq!(alg.x()[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(alg.x()[1], -2.0, epsilon = 1e-6);
        assert_relative_eq!(alg.x()[2], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_primal_acceleration_rebalances_steps() {
        let options = PdhgOptions {
            tau: Some(1.0),
            sigma: Some(1.0),
            gamma_primal: 1.0,
            max_iter: 5,
            ..PdhgOptions::default()
        };
        let mut alg = l2_fit(vec![1.0], options);
        alg.init().unwrap();
        let mut tau_prev = alg.tau().unwrap();
        let mut sigma_prev = alg.sigma().unwrap();
        while !alg.done() {
            alg.update().unwrap();
            let tau = alg.tau().unwrap();
            let sigma = alg.sigma().unwrap();
            assert!(tau < tau_prev);
            assert!(sigma > sigma_prev);
            // Rebalancing preserves the step-size product.
            assert_relative_eq!(tau * sigma, 1.0, epsilon = 1e-12);
            tau_prev = tau;
            sigma_prev = sigma;
        }
    }

    #[test]
    fn test_dual_acceleration_mirrors_primal() {
        let options = PdhgOptions {
            tau: Some(1.0),
            sigma: Some(1.0),
            gamma_dual: 1.0,
            max_iter: 3,
            ..PdhgOptions::default()
        };
        let mut alg = l2_fit(vec![1.0], options);
        alg.init().unwrap();
        alg.update().unwrap();
        assert!(alg.sigma().unwrap() < 1.0);
        assert!(alg.tau().unwrap() > 1.0);
    }

    #[test]
    fn test_two_sided_strong_convexity_keeps_steps_fixed() {
        let options = PdhgOptions {
            tau: Some(0.7),
            sigma: Some(0.9),
            gamma_primal: 1.0,
            gamma_dual: 1.0,
            max_iter: 4,
            ..PdhgOptions::default()
        };
        let mut alg = l2_fit(vec![1.0], options);
        alg.init().unwrap();
        while !alg.done() {
            alg.update().unwrap();
        }
        assert_relative_eq!(alg.tau().unwrap(), 0.7);
        assert_relative_eq!(alg.sigma().unwrap(), 0.9);
    }

    #[test]
    fn test_unset_steps_are_reported() {
        let mut alg = l2_fit(vec![1.0], PdhgOptions::default());
        alg.init().unwrap();
        assert!(matches!(alg.update(), Err(Error::Uninitialized { .. })));
    }
}
