//! Iterative proximal and first-order solvers for inverse problems.
//!
//! proxr drives large convex problems of the form `minimize f(x) + g(x)`
//! (and their primal-dual saddle formulations) by repeated operator-level
//! updates until convergence or an iteration budget. Problems too large to
//! solve directly are expressed through two capability seams the crate
//! consumes rather than implements: a [`backend::Backend`] owning array
//! storage and the elementwise kernels, and [`linop::LinearOp`] /
//! [`prox::ProxOp`] for the model operators.
//!
//! # Modules
//!
//! - [`alg`] - Solver kernels sharing one `init`/`update`/`done`/`cleanup`
//!   lifecycle: power iteration, proximal point, proximal gradient,
//!   conjugate gradient, proximal Newton, primal-dual hybrid gradient, and
//!   alternating minimization
//! - [`app`] - Harnesses that drive a kernel to completion: eigenvalue
//!   estimation, regularized linear least squares, and L2-ball constrained
//!   minimization
//! - [`backend`] - The compute capability trait and a `Vec`-backed CPU
//!   reference backend
//! - [`linop`] / [`prox`] - Operator capabilities and the combinators the
//!   assemblers build models from
//!
//! # Example
//!
//! ```
//! use proxr::app::{App, LeastSquaresOptions, LinearLeastSquares};
//! use proxr::backend::CpuBackend;
//! use proxr::linop::identity;
//!
//! let backend = CpuBackend::<f64>::new();
//! let y = vec![1.0, 2.0, 3.0, 4.0];
//! let mut app = LinearLeastSquares::new(
//!     backend,
//!     identity(4),
//!     y.clone(),
//!     vec![0.0; 4],
//!     LeastSquaresOptions { max_iter: 5, ..LeastSquaresOptions::default() },
//! )?;
//! let x = app.run()?;
//! assert!((x[2] - 3.0).abs() < 1e-10);
//! # Ok::<(), proxr::Error>(())
//! ```

pub mod alg;
pub mod app;
pub mod backend;
pub mod element;
pub mod error;
pub mod linop;
pub mod prox;

pub use error::{Error, Result};
