//! Proximal point method.

use crate::backend::{check_len, Backend, Real};
use crate::error::Result;
use crate::prox::SharedProx;

/// Minimizes `f` by repeatedly applying its proximal operator with a fixed
/// step `alpha`.
pub struct ProximalPoint<B: Backend> {
    backend: B,
    proxf: SharedProx<B>,
    x: B::Buffer,
    alpha: Real<B>,
    iter: usize,
    max_iter: usize,
}

impl<B: Backend> ProximalPoint<B> {
    pub fn new(
        backend: B,
        proxf: SharedProx<B>,
        x: B::Buffer,
        alpha: Real<B>,
        max_iter: usize,
    ) -> Result<Self> {
        check_len(&backend, &x, proxf.len(), "proximal point start vector")?;
        Ok(Self {
            backend,
            proxf,
            x,
            alpha,
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
        self.x = self.proxf.prox(&self.backend, self.alpha, &self.x)?;
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

    pub fn x(&self) -> &B::Buffer {
        &self.x
    }
}
