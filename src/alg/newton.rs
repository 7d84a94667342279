//! Proximal Newton method.

use num_traits::{Float, One};

use crate::backend::{Backend, Real};
use crate::element::Element;
use crate::error::Result;

use super::{HessProxFn, HessianFn, VectorFn};

/// Configuration for [`ProximalNewton`].
pub struct NewtonOptions<B: Backend> {
    /// Proximity threshold below which the damped step switches to a full
    /// step.
    pub sigma: Real<B>,
    pub max_iter: usize,
}

impl<B: Backend> Default for NewtonOptions<B> {
    fn default() -> Self {
        let one = <Real<B> as One>::one();
        let two = one + one;
        let five = two + two + one;
        Self {
            sigma: (two + one - five.sqrt()) / two,
            max_iter: 10,
        }
    }
}

/// Minimizes `f(x) + g(x)` for self-concordant `f`, taking Newton steps
/// through a proximal map in the Hessian metric.
///
/// Each step solves for the scaled proximal point
/// `s = prox_{g}^{H}(H(x) x - gradf(x))`, measures the decrement
/// `lamda = sqrt(d^H H d)` along `d = s - x`, and moves by the damped
/// step `1 / (1 + lamda)` until the decrement falls to `sigma`, after
/// which full steps are taken.
pub struct ProximalNewton<B: Backend> {
    backend: B,
    gradf: VectorFn<B>,
    hessf: HessianFn<B>,
    prox_hg: HessProxFn<B>,
    x: B::Buffer,
    sigma: Real<B>,
    lamda: Real<B>,
    iter: usize,
    max_iter: usize,
}

impl<B: Backend> ProximalNewton<B> {
    pub fn new(
        backend: B,
        gradf: VectorFn<B>,
        hessf: HessianFn<B>,
        prox_hg: HessProxFn<B>,
        x: B::Buffer,
        options: NewtonOptions<B>,
    ) -> Self {
        Self {
            backend,
            gradf,
            hessf,
            prox_hg,
            x,
            sigma: options.sigma,
            lamda: Real::<B>::infinity(),
            iter: 0,
            max_iter: options.max_iter,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        let _ctx = self.backend.scope();
        self.iter = 0;
        Ok(())
    }

    pub fn update(&mut self) -> Result<()> {
        let _ctx = self.backend.scope();
        let hess = (self.hessf)(&self.backend, &self.x)?;
        let hx = hess.apply(&self.backend, &self.x)?;
        let grad = (self.gradf)(&self.backend, &self.x)?;
        let target = self.backend.sub(&hx, &grad)?;
        let s = (self.prox_hg)(&self.backend, &hess, &target)?;

        let d = self.backend.sub(&s, &self.x)?;
        let hd = hess.apply(&self.backend, &d)?;
        let curvature = self.backend.dot(&d, &hd)?;
        self.lamda = curvature.abs().sqrt();

        let one = <Real<B> as One>::one();
        let step = if self.lamda <= self.sigma {
            one
        } else {
            one / (one + self.lamda)
        };
        self.backend
            .axpy(&mut self.x, B::Elem::from_real(step), &d)?;
        self.iter += 1;
        Ok(())
    }

    pub fn done(&self) -> bool {
        self.iter >= self.max_iter
    }

    pub fn cleanup(&mut self) {}

    pub fn iter(&self) -> usize {
        self.iter
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Newton decrement measured by the last step.
    pub fn decrement(&self) -> Real<B> {
        self.lamda
    }

    pub fn x(&self) -> &B::Buffer {
        &self.x
    }
}
