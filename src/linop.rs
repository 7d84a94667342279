//! Linear operators and the combinators the assemblers build models from.
//!
//! An operator only knows how to apply itself and its adjoint through a
//! backend; composition, scaling, summation and stacking are handled here so
//! normal operators like `A^H W A + lamda R^H R + mu I` can be assembled
//! without materializing anything.

use std::sync::Arc;

use crate::backend::{check_len, Backend, Real};
use crate::element::Element;
use crate::error::{Error, Result};

/// A linear map between flat buffers.
pub trait LinearOp<B: Backend> {
    /// Input length.
    fn domain(&self) -> usize;

    /// Output length.
    fn range(&self) -> usize;

    fn apply(&self, backend: &B, x: &B::Buffer) -> Result<B::Buffer>;

    fn adjoint_apply(&self, backend: &B, y: &B::Buffer) -> Result<B::Buffer>;
}

/// Shared handle to an operator, the form the solvers hold.
pub type SharedOp<B> = Arc<dyn LinearOp<B>>;

struct IdentityOp {
    len: usize,
}

impl<B: Backend> LinearOp<B> for IdentityOp {
    fn domain(&self) -> usize {
        self.len
    }

    fn range(&self) -> usize {
        self.len
    }

    fn apply(&self, backend: &B, x: &B::Buffer) -> Result<B::Buffer> {
        check_len(backend, x, self.len, "identity apply")?;
        backend.copy(x)
    }

    fn adjoint_apply(&self, backend: &B, y: &B::Buffer) -> Result<B::Buffer> {
        check_len(backend, y, self.len, "identity adjoint")?;
        backend.copy(y)
    }
}

/// Identity on vectors of length `len`.
pub fn identity<B: Backend>(len: usize) -> SharedOp<B> {
    Arc::new(IdentityOp { len })
}

struct DiagOp<B: Backend> {
    weights: B::Buffer,
    conj_weights: B::Buffer,
    len: usize,
}

impl<B: Backend> LinearOp<B> for DiagOp<B> {
    fn domain(&self) -> usize {
        self.len
    }

    fn range(&self) -> usize {
        self.len
    }

    fn apply(&self, backend: &B, x: &B::Buffer) -> Result<B::Buffer> {
        check_len(backend, x, self.len, "diagonal apply")?;
        backend.mul(&self.weights, x)
    }

    fn adjoint_apply(&self, backend: &B, y: &B::Buffer) -> Result<B::Buffer> {
        check_len(backend, y, self.len, "diagonal adjoint")?;
        backend.mul(&self.conj_weights, y)
    }
}

/// Diagonal operator with the given weights on its diagonal.
pub fn diag<B: Backend>(backend: &B, weights: B::Buffer) -> Result<SharedOp<B>> {
    let conj_weights = backend.conj(&weights)?;
    let len = backend.len(&weights);
    Ok(Arc::new(DiagOp::<B> {
        weights,
        conj_weights,
        len,
    }))
}

struct ScaledOp<B: Backend> {
    scalar: B::Elem,
    inner: SharedOp<B>,
}

impl<B: Backend> LinearOp<B> for ScaledOp<B> {
    fn domain(&self) -> usize {
        self.inner.domain()
    }

    fn range(&self) -> usize {
        self.inner.range()
    }

    fn apply(&self, backend: &B, x: &B::Buffer) -> Result<B::Buffer> {
        let y = self.inner.apply(backend, x)?;
        backend.scaled(&y, self.scalar)
    }

    fn adjoint_apply(&self, backend: &B, y: &B::Buffer) -> Result<B::Buffer> {
        let x = self.inner.adjoint_apply(backend, y)?;
        backend.scaled(&x, self.scalar.conj())
    }
}

/// `s * op` for a real scale factor.
pub fn scaled<B: Backend>(s: Real<B>, op: SharedOp<B>) -> SharedOp<B> {
    Arc::new(ScaledOp {
        scalar: B::Elem::from_real(s),
        inner: op,
    })
}

struct AdjointOp<B: Backend> {
    inner: SharedOp<B>,
}

impl<B: Backend> LinearOp<B> for AdjointOp<B> {
    fn domain(&self) -> usize {
        self.inner.range()
    }

    fn range(&self) -> usize {
        self.inner.domain()
    }

    fn apply(&self, backend: &B, x: &B::Buffer) -> Result<B::Buffer> {
        self.inner.adjoint_apply(backend, x)
    }

    fn adjoint_apply(&self, backend: &B, y: &B::Buffer) -> Result<B::Buffer> {
        self.inner.apply(backend, y)
    }
}

/// Formal adjoint `op^H`.
pub fn adjoint<B: Backend>(op: SharedOp<B>) -> SharedOp<B> {
    Arc::new(AdjointOp { inner: op })
}

struct ComposeOp<B: Backend> {
    outer: SharedOp<B>,
    inner: SharedOp<B>,
}

impl<B: Backend> LinearOp<B> for ComposeOp<B> {
    fn domain(&self) -> usize {
        self.inner.domain()
    }

    fn range(&self) -> usize {
        self.outer.range()
    }

    fn apply(&self, backend: &B, x: &B::Buffer) -> Result<B::Buffer> {
        let mid = self.inner.apply(backend, x)?;
        self.outer.apply(backend, &mid)
    }

    fn adjoint_apply(&self, backend: &B, y: &B::Buffer) -> Result<B::Buffer> {
        let mid = self.outer.adjoint_apply(backend, y)?;
        self.inner.adjoint_apply(backend, &mid)
    }
}

/// `outer . inner`, applied right to left.
pub fn compose<B: Backend>(outer: SharedOp<B>, inner: SharedOp<B>) -> Result<SharedOp<B>> {
    if inner.range() != outer.domain() {
        return Err(Error::ShapeMismatch {
            expected: outer.domain(),
            actual: inner.range(),
            context: "operator composition".to_string(),
        });
    }
    Ok(Arc::new(ComposeOp { outer, inner }))
}

struct SumOp<B: Backend> {
    terms: Vec<SharedOp<B>>,
}

impl<B: Backend> LinearOp<B> for SumOp<B> {
    fn domain(&self) -> usize {
        self.terms[0].domain()
    }

    fn range(&self) -> usize {
        self.terms[0].range()
    }

    fn apply(&self, backend: &B, x: &B::Buffer) -> Result<B::Buffer> {
        let mut acc = self.terms[0].apply(backend, x)?;
        for term in &self.terms[1..] {
            let y = term.apply(backend, x)?;
            acc = backend.add(&acc, &y)?;
        }
        Ok(acc)
    }

    fn adjoint_apply(&self, backend: &B, y: &B::Buffer) -> Result<B::Buffer> {
        let mut acc = self.terms[0].adjoint_apply(backend, y)?;
        for term in &self.terms[1..] {
            let x = term.adjoint_apply(backend, y)?;
            acc = backend.add(&acc, &x)?;
        }
        Ok(acc)
    }
}

/// Sum of operators with identical domain and range.
pub fn sum_of<B: Backend>(mut terms: Vec<SharedOp<B>>) -> Result<SharedOp<B>> {
    let first = terms.first().ok_or_else(|| Error::InvalidConfiguration {
        message: "operator sum needs at least one term".to_string(),
    })?;
    let (domain, range) = (first.domain(), first.range());
    for term in &terms[1..] {
        if term.domain() != domain {
            return Err(Error::ShapeMismatch {
                expected: domain,
                actual: term.domain(),
                context: "operator sum domain".to_string(),
            });
        }
        if term.range() != range {
            return Err(Error::ShapeMismatch {
                expected: range,
                actual: term.range(),
                context: "operator sum range".to_string(),
            });
        }
    }
    if terms.len() == 1 {
        return Ok(terms.swap_remove(0));
    }
    Ok(Arc::new(SumOp { terms }))
}

struct VstackOp<B: Backend> {
    parts: Vec<SharedOp<B>>,
    offsets: Vec<usize>,
    domain: usize,
    range: usize,
}

impl<B: Backend> LinearOp<B> for VstackOp<B> {
    fn domain(&self) -> usize {
        self.domain
    }

    fn range(&self) -> usize {
        self.range
    }

    fn apply(&self, backend: &B, x: &B::Buffer) -> Result<B::Buffer> {
        let mut blocks = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            blocks.push(part.apply(backend, x)?);
        }
        let refs: Vec<&B::Buffer> = blocks.iter().collect();
        backend.concat(&refs)
    }

    fn adjoint_apply(&self, backend: &B, y: &B::Buffer) -> Result<B::Buffer> {
        check_len(backend, y, self.range, "stacked adjoint")?;
        let mut acc = backend.zeros(self.domain)?;
        for (part, &offset) in self.parts.iter().zip(&self.offsets) {
            let block = backend.slice(y, offset, part.range())?;
            let x = part.adjoint_apply(backend, &block)?;
            acc = backend.add(&acc, &x)?;
        }
        Ok(acc)
    }
}

/// Vertical stack: applies every part to the same input and concatenates the
/// outputs in order.
pub fn vstack<B: Backend>(parts: Vec<SharedOp<B>>) -> Result<SharedOp<B>> {
    let first = parts.first().ok_or_else(|| Error::InvalidConfiguration {
        message: "operator stack needs at least one part".to_string(),
    })?;
    let domain = first.domain();
    let mut offsets = Vec::with_capacity(parts.len());
    let mut range = 0;
    for part in &parts {
        if part.domain() != domain {
            return Err(Error::ShapeMismatch {
                expected: domain,
                actual: part.domain(),
                context: "operator stack domain".to_string(),
            });
        }
        offsets.push(range);
        range += part.range();
    }
    Ok(Arc::new(VstackOp {
        parts,
        offsets,
        domain,
        range,
    }))
}
