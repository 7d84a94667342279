//! Alternating minimization.

use crate::backend::Backend;
use crate::error::Result;

use super::BlockMinFn;

/// Minimizes over two blocks of variables by calling the caller's two block
/// solvers in turn. The blocks live inside the closures; the kernel only
/// owns the schedule.
pub struct AlternatingMin<B: Backend> {
    backend: B,
    min1: BlockMinFn,
    min2: BlockMinFn,
    iter: usize,
    max_iter: usize,
}

impl<B: Backend> AlternatingMin<B> {
    pub fn new(backend: B, min1: BlockMinFn, min2: BlockMinFn, max_iter: usize) -> Self {
        Self {
            backend,
            min1,
            min2,
            iter: 0,
            max_iter,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        let _ctx = self.backend.scope();
        self.iter = 0;
        Ok(())
    }

    pub fn update(&mut self) -> Result<()> {
        let _ctx = self.backend.scope();
        (self.min1)()?;
        (self.min2)()?;
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
}
