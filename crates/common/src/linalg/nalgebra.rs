pub type Vector<T = f64> = na::DVector<T>;
pub type Matrix<T = f64> = na::DMatrix<T>;
pub type VectorView<'a, T = f64> = na::DVectorView<'a, T>;

pub type CooMatrix<T = f64> = nas::CooMatrix<T>;
pub type CsrMatrix<T = f64> = nas::CsrMatrix<T>;

pub trait DMatrixExt {
  fn condition_number(&self) -> f64;
}
impl DMatrixExt for Matrix {
  /// Ratio of the largest to the smallest singular value.
  /// Infinite for rank deficient matrices.
  fn condition_number(&self) -> f64 {
    let singular_values = self.singular_values();
    let max = singular_values.max();
    let min = singular_values.min();
    if min == 0.0 {
      f64::INFINITY
    } else {
      max / min
    }
  }
}

/// $norm(A x - b) / norm(b)$, falling back to the absolute residual for $b = 0$.
pub fn relative_residual(a: &CsrMatrix, x: &Vector, b: &Vector) -> f64 {
  let residual = (a * x - b).norm();
  let bnorm = b.norm();
  if bnorm == 0.0 {
    residual
  } else {
    residual / bnorm
  }
}
