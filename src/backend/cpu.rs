//! Reference backend on host memory.
//!
//! Buffers are plain `Vec`s and every kernel is a straight loop. This is the
//! backend the test suite runs on and the fallback when no accelerator is
//! configured.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use num_traits::{Float, Zero};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::backend::{check_len, Backend, Device, Real};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::linop::LinearOp;

/// The single host device.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CpuDevice;

impl Device for CpuDevice {
    fn id(&self) -> usize {
        0
    }

    fn name(&self) -> String {
        "cpu:0".to_string()
    }
}

/// Context guard for [`CpuBackend`]. The host has no device context to
/// switch, so the guard carries no state.
pub struct CpuScope(());

/// Host backend over `Vec` storage.
///
/// The RNG is shared behind a mutex so cloned handles draw from one stream;
/// [`CpuBackend::seeded`] makes that stream reproducible.
pub struct CpuBackend<T: Element> {
    device: CpuDevice,
    rng: Arc<Mutex<StdRng>>,
    _marker: PhantomData<T>,
}

impl<T: Element> Clone for CpuBackend<T> {
    fn clone(&self) -> Self {
        Self {
            device: self.device,
            rng: Arc::clone(&self.rng),
            _marker: PhantomData,
        }
    }
}

impl<T: Element> CpuBackend<T> {
    pub fn new() -> Self {
        Self {
            device: CpuDevice,
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
            _marker: PhantomData,
        }
    }

    /// Backend with a deterministic random stream.
    pub fn seeded(seed: u64) -> Self {
        Self {
            device: CpuDevice,
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
            _marker: PhantomData,
        }
    }
}

impl<T: Element> Default for CpuBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Backend for CpuBackend<T> {
    type Elem = T;
    type Buffer = Vec<T>;
    type Device = CpuDevice;
    type Scope = CpuScope;

    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn scope(&self) -> CpuScope {
        CpuScope(())
    }

    fn zeros(&self, len: usize) -> Result<Vec<T>> {
        Ok(vec![T::zero(); len])
    }

    fn from_slice(&self, data: &[T]) -> Result<Vec<T>> {
        Ok(data.to_vec())
    }

    fn randn(&self, len: usize) -> Result<Vec<T>> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Ok((0..len).map(|_| T::standard_normal(&mut rng)).collect())
    }

    fn copy(&self, x: &Vec<T>) -> Result<Vec<T>> {
        Ok(x.clone())
    }

    fn copy_into(&self, src: &Vec<T>, dst: &mut Vec<T>) -> Result<()> {
        check_len(self, src, dst.len(), "copy_into")?;
        dst.copy_from_slice(src);
        Ok(())
    }

    fn to_vec(&self, x: &Vec<T>) -> Result<Vec<T>> {
        Ok(x.clone())
    }

    fn len(&self, x: &Vec<T>) -> usize {
        x.len()
    }

    fn add(&self, a: &Vec<T>, b: &Vec<T>) -> Result<Vec<T>> {
        check_len(self, b, a.len(), "add")?;
        Ok(a.iter().zip(b).map(|(&x, &y)| x + y).collect())
    }

    fn sub(&self, a: &Vec<T>, b: &Vec<T>) -> Result<Vec<T>> {
        check_len(self, b, a.len(), "sub")?;
        Ok(a.iter().zip(b).map(|(&x, &y)| x - y).collect())
    }

    fn mul(&self, a: &Vec<T>, b: &Vec<T>) -> Result<Vec<T>> {
        check_len(self, b, a.len(), "mul")?;
        Ok(a.iter().zip(b).map(|(&x, &y)| x * y).collect())
    }

    fn sqrt(&self, a: &Vec<T>) -> Result<Vec<T>> {
        Ok(a.iter().map(|&x| Element::sqrt(x)).collect())
    }

    fn conj(&self, a: &Vec<T>) -> Result<Vec<T>> {
        Ok(a.iter().map(|&x| Element::conj(x)).collect())
    }

    fn scaled(&self, a: &Vec<T>, s: T) -> Result<Vec<T>> {
        Ok(a.iter().map(|&x| x * s).collect())
    }

    fn scale(&self, a: &mut Vec<T>, s: T) -> Result<()> {
        for x in a.iter_mut() {
            *x = *x * s;
        }
        Ok(())
    }

    fn axpy(&self, y: &mut Vec<T>, s: T, x: &Vec<T>) -> Result<()> {
        check_len(self, x, y.len(), "axpy")?;
        for (yi, &xi) in y.iter_mut().zip(x) {
            *yi = *yi + s * xi;
        }
        Ok(())
    }

    fn xpay(&self, y: &mut Vec<T>, s: T, x: &Vec<T>) -> Result<()> {
        check_len(self, x, y.len(), "xpay")?;
        for (yi, &xi) in y.iter_mut().zip(x) {
            *yi = xi + s * *yi;
        }
        Ok(())
    }

    fn dot(&self, a: &Vec<T>, b: &Vec<T>) -> Result<T> {
        check_len(self, b, a.len(), "dot")?;
        let mut acc = T::zero();
        for (&x, &y) in a.iter().zip(b) {
            acc = acc + x.conj() * y;
        }
        Ok(acc)
    }

    fn norm(&self, a: &Vec<T>) -> Result<Real<Self>> {
        Ok(self.norm_sq(a)?.sqrt())
    }

    fn norm_sq(&self, a: &Vec<T>) -> Result<Real<Self>> {
        let mut acc = <T::Real as Zero>::zero();
        for &x in a {
            acc = acc + x.abs_sq();
        }
        Ok(acc)
    }

    fn concat(&self, parts: &[&Vec<T>]) -> Result<Vec<T>> {
        let total = parts.iter().map(|p| p.len()).sum();
        let mut out = Vec::with_capacity(total);
        for part in parts {
            out.extend_from_slice(part);
        }
        Ok(out)
    }

    fn slice(&self, a: &Vec<T>, offset: usize, len: usize) -> Result<Vec<T>> {
        if offset + len > a.len() {
            return Err(Error::ShapeMismatch {
                expected: offset + len,
                actual: a.len(),
                context: "slice".to_string(),
            });
        }
        Ok(a[offset..offset + len].to_vec())
    }
}

/// Dense row-major matrix acting as a linear operator on [`CpuBackend`].
///
/// Meant for tests and small host-side problems; structured operators should
/// implement [`LinearOp`] directly instead of materializing entries.
pub struct DenseMatrix<T: Element> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Element> DenseMatrix<T> {
    /// Builds a `rows x cols` matrix from row-major entries.
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::ShapeMismatch {
                expected: rows * cols,
                actual: data.len(),
                context: "dense matrix entries".to_string(),
            });
        }
        Ok(Self { rows, cols, data })
    }
}

impl<T: Element> LinearOp<CpuBackend<T>> for DenseMatrix<T> {
    fn domain(&self) -> usize {
        self.cols
    }

    fn range(&self) -> usize {
        self.rows
    }

    fn apply(&self, backend: &CpuBackend<T>, x: &Vec<T>) -> Result<Vec<T>> {
        check_len(backend, x, self.cols, "dense matrix apply")?;
        let mut y = vec![T::zero(); self.rows];
        for i in 0..self.rows {
            let row = &self.data[i * self.cols..(i + 1) * self.cols];
            let mut acc = T::zero();
            for (&a, &xj) in row.iter().zip(x) {
                acc = acc + a * xj;
            }
            y[i] = acc;
        }
        Ok(y)
    }

    fn adjoint_apply(&self, backend: &CpuBackend<T>, y: &Vec<T>) -> Result<Vec<T>> {
        check_len(backend, y, self.rows, "dense matrix adjoint")?;
        let mut x = vec![T::zero(); self.cols];
        for i in 0..self.rows {
            let row = &self.data[i * self.cols..(i + 1) * self.cols];
            for (j, &a) in row.iter().enumerate() {
                x[j] = x[j] + a.conj() * y[i];
            }
        }
        Ok(x)
    }
}
