//! Compute-backend capability consumed by the solvers.
//!
//! The solvers never touch array storage directly; they see a [`Backend`]
//! that owns a buffer type and the handful of kernels iterative methods are
//! made of (scaled accumulation, inner products, norms, random and zero
//! construction). A backend value is bound to one device, and every solver
//! method body runs inside the guard returned by [`Backend::scope`], so ops
//! dispatch to the right place even when an error unwinds the call.

mod cpu;

pub use cpu::{CpuBackend, CpuDevice, CpuScope, DenseMatrix};

use std::fmt;

use crate::element::Element;
use crate::error::{Error, Result};

/// Real scalar type associated with a backend's element type.
pub type Real<B> = <<B as Backend>::Elem as Element>::Real;

/// Identifies a compute device.
pub trait Device: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    fn id(&self) -> usize;
    fn name(&self) -> String;
}

/// Device-resident numeric arrays plus the kernels the solvers run on them.
///
/// Out-of-place methods return fresh buffers on the backend's device; the
/// only mutating methods are the ones taking `&mut` buffers. Binary
/// operations fail with [`Error::ShapeMismatch`] when operand lengths differ.
pub trait Backend: Clone + Send + Sync + 'static {
    type Elem: Element;
    type Buffer;
    type Device: Device;

    /// Guard holding the backend's compute context. Dropping it restores the
    /// previous context, including on early return and unwind.
    type Scope;

    fn device(&self) -> &Self::Device;

    /// Enters the compute context for the lifetime of the returned guard.
    fn scope(&self) -> Self::Scope;

    fn zeros(&self, len: usize) -> Result<Self::Buffer>;

    fn from_slice(&self, data: &[Self::Elem]) -> Result<Self::Buffer>;

    /// Fresh buffer of standard-normal samples from the backend's RNG.
    fn randn(&self, len: usize) -> Result<Self::Buffer>;

    /// Deep copy.
    fn copy(&self, x: &Self::Buffer) -> Result<Self::Buffer>;

    /// Copies the contents of `src` into `dst`.
    fn copy_into(&self, src: &Self::Buffer, dst: &mut Self::Buffer) -> Result<()>;

    /// Host readback.
    fn to_vec(&self, x: &Self::Buffer) -> Result<Vec<Self::Elem>>;

    fn len(&self, x: &Self::Buffer) -> usize;

    fn add(&self, a: &Self::Buffer, b: &Self::Buffer) -> Result<Self::Buffer>;

    fn sub(&self, a: &Self::Buffer, b: &Self::Buffer) -> Result<Self::Buffer>;

    /// Elementwise (Hadamard) product.
    fn mul(&self, a: &Self::Buffer, b: &Self::Buffer) -> Result<Self::Buffer>;

    /// Elementwise principal square root.
    fn sqrt(&self, a: &Self::Buffer) -> Result<Self::Buffer>;

    /// Elementwise complex conjugate.
    fn conj(&self, a: &Self::Buffer) -> Result<Self::Buffer>;

    /// `s * a` out of place.
    fn scaled(&self, a: &Self::Buffer, s: Self::Elem) -> Result<Self::Buffer>;

    /// `a *= s` in place.
    fn scale(&self, a: &mut Self::Buffer, s: Self::Elem) -> Result<()>;

    /// `y += s * x`.
    fn axpy(&self, y: &mut Self::Buffer, s: Self::Elem, x: &Self::Buffer) -> Result<()>;

    /// `y = x + s * y`.
    fn xpay(&self, y: &mut Self::Buffer, s: Self::Elem, x: &Self::Buffer) -> Result<()>;

    /// Conjugated inner product `sum(conj(a) * b)`.
    fn dot(&self, a: &Self::Buffer, b: &Self::Buffer) -> Result<Self::Elem>;

    /// L2 norm.
    fn norm(&self, a: &Self::Buffer) -> Result<Real<Self>>;

    /// Squared L2 norm.
    fn norm_sq(&self, a: &Self::Buffer) -> Result<Real<Self>>;

    /// Concatenates buffers in order.
    fn concat(&self, parts: &[&Self::Buffer]) -> Result<Self::Buffer>;

    /// Copies `len` elements starting at `offset` into a fresh buffer.
    fn slice(&self, a: &Self::Buffer, offset: usize, len: usize) -> Result<Self::Buffer>;
}

/// Validates a buffer length against what an operator or solver expects.
pub(crate) fn check_len<B: Backend>(
    backend: &B,
    buf: &B::Buffer,
    expected: usize,
    context: &str,
) -> Result<()> {
    let actual = backend.len(buf);
    if actual != expected {
        return Err(Error::ShapeMismatch {
            expected,
            actual,
            context: context.to_string(),
        });
    }
    Ok(())
}
