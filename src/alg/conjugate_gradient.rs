//! Conjugate gradient method.

use num_traits::{Float, Zero};

use crate::backend::{check_len, Backend, Real};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::linop::SharedOp;

/// Configuration for [`ConjugateGradient`].
pub struct CgOptions<B: Backend> {
    /// Preconditioner applied to the residual. Must be Hermitian positive
    /// definite for the recurrence to stay valid.
    pub precond: Option<SharedOp<B>>,
    pub max_iter: usize,
}

impl<B: Backend> Default for CgOptions<B> {
    fn default() -> Self {
        Self {
            precond: None,
            max_iter: 100,
        }
    }
}

struct CgScratch<B: Backend> {
    r: B::Buffer,
    p: B::Buffer,
    rzold: B::Elem,
}

/// Solves `A x = b` for Hermitian positive definite `A`.
///
/// `init` forms the initial residual `r = b - A x`, consuming the stored
/// right-hand side, so each run needs the right-hand side set beforehand.
/// A step that measures zero curvature `p^H A p` flags the run as stalled
/// and stops without touching the iterate; the search direction recurrence
/// is skipped on the final scheduled iteration where its result could never
/// be used.
pub struct ConjugateGradient<B: Backend> {
    backend: B,
    a: SharedOp<B>,
    b: Option<B::Buffer>,
    x: B::Buffer,
    precond: Option<SharedOp<B>>,
    zero_curvature: bool,
    resid: Real<B>,
    scratch: Option<CgScratch<B>>,
    iter: usize,
    max_iter: usize,
}

impl<B: Backend> ConjugateGradient<B> {
    pub fn new(
        backend: B,
        a: SharedOp<B>,
        b: B::Buffer,
        x: B::Buffer,
        options: CgOptions<B>,
    ) -> Result<Self> {
        let mut alg = Self::pending_rhs(backend, a, x, options)?;
        check_len(&alg.backend, &b, alg.a.range(), "conjugate gradient rhs")?;
        alg.b = Some(b);
        Ok(alg)
    }

    /// Builds the solver without a right-hand side, for assemblers that
    /// produce `b` only at init time. [`ConjugateGradient::set_rhs`] must be
    /// called before `init`.
    pub(crate) fn pending_rhs(
        backend: B,
        a: SharedOp<B>,
        x: B::Buffer,
        options: CgOptions<B>,
    ) -> Result<Self> {
        if a.domain() != a.range() {
            return Err(Error::InvalidConfiguration {
                message: "conjugate gradient needs a square operator".to_string(),
            });
        }
        check_len(&backend, &x, a.domain(), "conjugate gradient start vector")?;
        if let Some(precond) = &options.precond {
            if precond.domain() != a.domain() || precond.range() != a.domain() {
                return Err(Error::InvalidConfiguration {
                    message: "preconditioner shape does not match the system".to_string(),
                });
            }
        }
        Ok(Self {
            backend,
            a,
            b: None,
            x,
            precond: options.precond,
            zero_curvature: false,
            resid: Real::<B>::infinity(),
            scratch: None,
            iter: 0,
            max_iter: options.max_iter,
        })
    }

    pub fn set_rhs(&mut self, b: B::Buffer) -> Result<()> {
        check_len(&self.backend, &b, self.a.range(), "conjugate gradient rhs")?;
        self.b = Some(b);
        Ok(())
    }

    pub fn init(&mut self) -> Result<()> {
        let _ctx = self.backend.scope();
        self.iter = 0;
        self.zero_curvature = false;

        let mut r = self.b.take().ok_or_else(|| Error::Uninitialized {
            context: "conjugate gradient rhs".to_string(),
        })?;
        let ax = self.a.apply(&self.backend, &self.x)?;
        let one = num_traits::one::<Real<B>>();
        self.backend.axpy(&mut r, B::Elem::from_real(-one), &ax)?;

        let z = match &self.precond {
            Some(precond) => precond.apply(&self.backend, &r)?,
            None => self.backend.copy(&r)?,
        };
        let rzold = self.backend.dot(&r, &z)?;
        self.resid = rzold.abs().sqrt();
        self.scratch = Some(CgScratch { r, p: z, rzold });
        Ok(())
    }

    pub fn update(&mut self) -> Result<()> {
        let _ctx = self.backend.scope();
        let scratch = self.scratch.as_mut().ok_or_else(|| Error::Uninitialized {
            context: "conjugate gradient state".to_string(),
        })?;

        let ap = self.a.apply(&self.backend, &scratch.p)?;
        let p_ap = self.backend.dot(&scratch.p, &ap)?;
        if p_ap == B::Elem::zero() {
            self.zero_curvature = true;
            self.iter += 1;
            return Ok(());
        }

        let alpha = scratch.rzold / p_ap;
        self.backend.axpy(&mut self.x, alpha, &scratch.p)?;

        // On the last scheduled iteration the next search direction would
        // never be used.
        if self.iter + 1 < self.max_iter {
            self.backend.axpy(&mut scratch.r, -alpha, &ap)?;
            let z = match &self.precond {
                Some(precond) => precond.apply(&self.backend, &scratch.r)?,
                None => self.backend.copy(&scratch.r)?,
            };
            let rznew = self.backend.dot(&scratch.r, &z)?;
            let beta = rznew / scratch.rzold;
            self.backend.xpay(&mut scratch.p, beta, &z)?;
            scratch.rzold = rznew;
        }

        self.resid = scratch.rzold.abs().sqrt();
        self.iter += 1;
        Ok(())
    }

    pub fn done(&self) -> bool {
        self.iter >= self.max_iter
            || self.zero_curvature
            || self.resid == <Real<B> as Zero>::zero()
    }

    pub fn cleanup(&mut self) {
        self.scratch = None;
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

    /// Whether the last step found a direction with zero curvature.
    pub fn stalled(&self) -> bool {
        self.zero_curvature
    }

    pub fn x(&self) -> &B::Buffer {
        &self.x
    }
}
