pub mod faer;
pub mod nalgebra;

/// Failure of a global linear solve.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
  #[error("sparse LU factorization failed: {0}")]
  Factorization(String),
  #[error("system is not square ({nrows}x{ncols})")]
  NotSquare { nrows: usize, ncols: usize },
  #[error("solution contains non-finite entries (singular system)")]
  NonFinite,
  #[error("relative residual {residual:e} exceeds tolerance {tolerance:e}")]
  IllConditioned { residual: f64, tolerance: f64 },
}
