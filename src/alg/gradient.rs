//! Proximal gradient method, with optional Nesterov acceleration.

use num_traits::{Float, One, Zero};

use crate::backend::{check_len, Backend, Real};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::prox::SharedProx;

use super::VectorFn;

/// Configuration for [`ProximalGradient`].
pub struct GradientOptions<B: Backend> {
    /// Proximal operator of the nonsmooth term. `None` runs plain gradient
    /// descent.
    pub proxg: Option<SharedProx<B>>,
    /// Step size. Leave unset to fill in later, e.g. from a spectral norm
    /// estimate, before the first update.
    pub alpha: Option<Real<B>>,
    /// Nesterov momentum.
    pub accelerate: bool,
    pub max_iter: usize,
}

impl<B: Backend> Default for GradientOptions<B> {
    fn default() -> Self {
        Self {
            proxg: None,
            alpha: None,
            accelerate: false,
            max_iter: 100,
        }
    }
}

struct Momentum<B: Backend> {
    z: B::Buffer,
    t: Real<B>,
}

/// Minimizes `f(x) + g(x)` where `f` is smooth and `g` has a cheap proximal
/// operator.
///
/// Each step descends along `gradf`, then applies `proxg`. With
/// `accelerate` the step is taken from the extrapolated point `z` and the
/// momentum weight follows the Nesterov sequence. The residual is the norm
/// of the last effective step, scaled by `1 / sqrt(alpha)`; for plain
/// descent it is the gradient norm. Iteration stops early only when the
/// residual is exactly zero, i.e. a true fixed point.
pub struct ProximalGradient<B: Backend> {
    backend: B,
    gradf: VectorFn<B>,
    x: B::Buffer,
    alpha: Option<Real<B>>,
    proxg: Option<SharedProx<B>>,
    accelerate: bool,
    resid: Real<B>,
    momentum: Option<Momentum<B>>,
    iter: usize,
    max_iter: usize,
}

impl<B: Backend> ProximalGradient<B> {
    pub fn new(
        backend: B,
        gradf: VectorFn<B>,
        x: B::Buffer,
        options: GradientOptions<B>,
    ) -> Result<Self> {
        if let Some(proxg) = &options.proxg {
            check_len(&backend, &x, proxg.len(), "proximal gradient start vector")?;
        }
        Ok(Self {
            backend,
            gradf,
            x,
            alpha: options.alpha,
            proxg: options.proxg,
            accelerate: options.accelerate,
            resid: Real::<B>::infinity(),
            momentum: None,
            iter: 0,
            max_iter: options.max_iter,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        let _ctx = self.backend.scope();
        self.iter = 0;
        self.resid = Real::<B>::infinity();
        self.momentum = if self.accelerate {
            Some(Momentum {
                z: self.backend.copy(&self.x)?,
                t: <Real<B> as One>::one(),
            })
        } else {
            None
        };
        Ok(())
    }

    pub fn update(&mut self) -> Result<()> {
        let _ctx = self.backend.scope();
        let alpha = self.alpha.ok_or_else(|| Error::Uninitialized {
            context: "gradient step size".to_string(),
        })?;

        let x_old = if self.accelerate || self.proxg.is_some() {
            Some(self.backend.copy(&self.x)?)
        } else {
            None
        };

        if self.accelerate {
            let momentum = self.momentum.as_ref().ok_or_else(|| Error::Uninitialized {
                context: "gradient momentum".to_string(),
            })?;
            self.backend.copy_into(&momentum.z, &mut self.x)?;
        }

        let gradient = (self.gradf)(&self.backend, &self.x)?;
        self.backend
            .axpy(&mut self.x, B::Elem::from_real(-alpha), &gradient)?;

        if let Some(proxg) = &self.proxg {
            self.x = proxg.prox(&self.backend, alpha, &self.x)?;
        }

        if let Some(x_old) = &x_old {
            let diff = self.backend.sub(&self.x, x_old)?;
            if self.accelerate {
                let momentum = self.momentum.as_mut().ok_or_else(|| Error::Uninitialized {
                    context: "gradient momentum".to_string(),
                })?;
                let one = <Real<B> as One>::one();
                let two = one + one;
                let four = two + two;
                let t_old = momentum.t;
                momentum.t = (one + (one + four * t_old * t_old).sqrt()) / two;
                let mut z = self.backend.copy(&self.x)?;
                self.backend.axpy(
                    &mut z,
                    B::Elem::from_real((t_old - one) / momentum.t),
                    &diff,
                )?;
                momentum.z = z;
            }
            self.resid = self.backend.norm(&diff)? / alpha.sqrt();
        } else {
            self.resid = self.backend.norm(&gradient)?;
        }

        self.iter += 1;
        Ok(())
    }

    pub fn done(&self) -> bool {
        self.iter >= self.max_iter || self.resid == <Real<B> as Zero>::zero()
    }

    pub fn cleanup(&mut self) {
        self.momentum = None;
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

    pub fn alpha(&self) -> Option<Real<B>> {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: Real<B>) {
        self.alpha = Some(alpha);
    }
}
