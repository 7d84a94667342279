//! Proximal operators.
//!
//! A proximal operator maps `v` to `argmin_x step * f(x) + ||x - v||^2 / 2`
//! for its underlying function `f`. The solvers only ever evaluate the map,
//! so the trait is a single method plus the length it acts on. The
//! combinators here cover what the assemblers need: the scaled L2 penalty,
//! the L2 ball projection, convex conjugation through the Moreau identity,
//! and stacking over concatenated segments.

use std::sync::Arc;

use num_traits::One;

use crate::backend::{check_len, Backend, Real};
use crate::element::Element;
use crate::error::{Error, Result};

/// Evaluates `prox_{step * f}` at a point.
pub trait ProxOp<B: Backend> {
    /// Length of the vectors this operator acts on.
    fn len(&self) -> usize;

    fn prox(&self, backend: &B, step: Real<B>, v: &B::Buffer) -> Result<B::Buffer>;
}

/// Shared handle to a proximal operator.
pub type SharedProx<B> = Arc<dyn ProxOp<B>>;

struct NoOpProx {
    len: usize,
}

impl<B: Backend> ProxOp<B> for NoOpProx {
    fn len(&self) -> usize {
        self.len
    }

    fn prox(&self, backend: &B, _step: Real<B>, v: &B::Buffer) -> Result<B::Buffer> {
        check_len(backend, v, self.len, "no-op prox")?;
        backend.copy(v)
    }
}

/// Proximal operator of the zero function, the identity map.
pub fn no_op<B: Backend>(len: usize) -> SharedProx<B> {
    Arc::new(NoOpProx { len })
}

struct L2RegProx<B: Backend> {
    lamda: Real<B>,
    bias: Option<B::Buffer>,
    len: usize,
}

impl<B: Backend> ProxOp<B> for L2RegProx<B> {
    fn len(&self) -> usize {
        self.len
    }

    fn prox(&self, backend: &B, step: Real<B>, v: &B::Buffer) -> Result<B::Buffer> {
        check_len(backend, v, self.len, "l2 penalty prox")?;
        let t = step * self.lamda;
        let shrink = <Real<B> as One>::one() / (<Real<B> as One>::one() + t);
        let mut out = backend.copy(v)?;
        if let Some(bias) = &self.bias {
            backend.axpy(&mut out, B::Elem::from_real(t), bias)?;
        }
        backend.scale(&mut out, B::Elem::from_real(shrink))?;
        Ok(out)
    }
}

/// Proximal operator of `lamda / 2 * ||x - bias||^2`:
/// `(v + step * lamda * bias) / (1 + step * lamda)`.
pub fn l2_reg<B: Backend>(len: usize, lamda: Real<B>, bias: Option<B::Buffer>) -> SharedProx<B> {
    Arc::new(L2RegProx { lamda, bias, len })
}

struct L2ProjProx<B: Backend> {
    eps: Real<B>,
    center: Option<B::Buffer>,
    len: usize,
}

impl<B: Backend> ProxOp<B> for L2ProjProx<B> {
    fn len(&self) -> usize {
        self.len
    }

    fn prox(&self, backend: &B, _step: Real<B>, v: &B::Buffer) -> Result<B::Buffer> {
        check_len(backend, v, self.len, "l2 ball projection")?;
        let diff = match &self.center {
            Some(center) => backend.sub(v, center)?,
            None => backend.copy(v)?,
        };
        let dist = backend.norm(&diff)?;
        if dist <= self.eps {
            return backend.copy(v);
        }
        let shrink = self.eps / dist;
        match &self.center {
            Some(center) => {
                let mut out = backend.copy(center)?;
                backend.axpy(&mut out, B::Elem::from_real(shrink), &diff)?;
                Ok(out)
            }
            None => backend.scaled(&diff, B::Elem::from_real(shrink)),
        }
    }
}

/// Projection onto the L2 ball of radius `eps` around `center`. The step
/// size is irrelevant for a projection.
pub fn l2_proj<B: Backend>(len: usize, eps: Real<B>, center: Option<B::Buffer>) -> SharedProx<B> {
    Arc::new(L2ProjProx { eps, center, len })
}

struct ConjProx<B: Backend> {
    inner: SharedProx<B>,
}

impl<B: Backend> ProxOp<B> for ConjProx<B> {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn prox(&self, backend: &B, step: Real<B>, v: &B::Buffer) -> Result<B::Buffer> {
        let inv = <Real<B> as One>::one() / step;
        let scaled_v = backend.scaled(v, B::Elem::from_real(inv))?;
        let inner_out = self.inner.prox(backend, inv, &scaled_v)?;
        let mut out = backend.copy(v)?;
        backend.axpy(&mut out, B::Elem::from_real(-step), &inner_out)?;
        Ok(out)
    }
}

/// Proximal operator of the convex conjugate, through the Moreau identity
/// `prox_{step f*}(v) = v - step * prox_{f / step}(v / step)`.
pub fn conj_prox<B: Backend>(inner: SharedProx<B>) -> SharedProx<B> {
    Arc::new(ConjProx { inner })
}

struct StackProx<B: Backend> {
    parts: Vec<SharedProx<B>>,
    offsets: Vec<usize>,
    len: usize,
}

impl<B: Backend> ProxOp<B> for StackProx<B> {
    fn len(&self) -> usize {
        self.len
    }

    fn prox(&self, backend: &B, step: Real<B>, v: &B::Buffer) -> Result<B::Buffer> {
        check_len(backend, v, self.len, "stacked prox")?;
        let mut blocks = Vec::with_capacity(self.parts.len());
        for (part, &offset) in self.parts.iter().zip(&self.offsets) {
            let segment = backend.slice(v, offset, part.len())?;
            blocks.push(part.prox(backend, step, &segment)?);
        }
        let refs: Vec<&B::Buffer> = blocks.iter().collect();
        backend.concat(&refs)
    }
}

/// Applies one proximal operator per segment of a concatenated vector, all
/// with the same step.
pub fn stack_prox<B: Backend>(parts: Vec<SharedProx<B>>) -> Result<SharedProx<B>> {
    if parts.is_empty() {
        return Err(Error::InvalidConfiguration {
            message: "prox stack needs at least one part".to_string(),
        });
    }
    let mut offsets = Vec::with_capacity(parts.len());
    let mut len = 0;
    for part in &parts {
        offsets.push(len);
        len += part.len();
    }
    Ok(Arc::new(StackProx {
        parts,
        offsets,
        len,
    }))
}
