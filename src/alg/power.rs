//! Power iteration for the largest eigenvalue.

use num_traits::{Float, One};

use crate::backend::{check_len, Backend, Real};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::linop::SharedOp;

/// Estimates the maximum eigenvalue of a square operator `A`.
///
/// Each step applies `A`, takes the norm of the result as the current
/// estimate and normalizes it into the next iterate. For Hermitian positive
/// semidefinite `A` the estimate grows monotonically toward the top
/// eigenvalue.
pub struct PowerIteration<B: Backend> {
    backend: B,
    a: SharedOp<B>,
    x: B::Buffer,
    max_eig: Real<B>,
    iter: usize,
    max_iter: usize,
}

impl<B: Backend> PowerIteration<B> {
    pub fn new(backend: B, a: SharedOp<B>, x: B::Buffer, max_iter: usize) -> Result<Self> {
        if a.domain() != a.range() {
            return Err(Error::InvalidConfiguration {
                message: "power iteration needs a square operator".to_string(),
            });
        }
        check_len(&backend, &x, a.domain(), "power iteration start vector")?;
        Ok(Self {
            backend,
            a,
            x,
            max_eig: Real::<B>::infinity(),
            iter: 0,
            max_iter,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        let _ctx = self.backend.scope();
        self.iter = 0;
        Ok(())
    }

    pub fn update(&mut self) -> Result<()> {
        let _ctx = self.backend.scope();
        let y = self.a.apply(&self.backend, &self.x)?;
        self.max_eig = self.backend.norm(&y)?;
        let inv = <Real<B> as One>::one() / self.max_eig;
        self.x = self.backend.scaled(&y, B::Elem::from_real(inv))?;
        self.iter += 1;
        Ok(())
    }

    pub fn done(&self) -> bool {
        self.iter >= self.max_iter
    }

    pub fn cleanup(&mut self) {}

    /// Replaces the iterate with a fresh random vector.
    pub fn randomize(&mut self) -> Result<()> {
        let _ctx = self.backend.scope();
        self.x = self.backend.randn(self.a.domain())?;
        Ok(())
    }

    pub fn iter(&self) -> usize {
        self.iter
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Current eigenvalue estimate.
    pub fn max_eig(&self) -> Real<B> {
        self.max_eig
    }

    /// Current normalized iterate.
    pub fn eigenvector(&self) -> &B::Buffer {
        &self.x
    }
}
