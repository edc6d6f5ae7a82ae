use faer::linalg::solvers::Solve;

use super::{
  nalgebra::{CsrMatrix, Vector},
  SolveError,
};

type SparseMatrixFaer = faer::sparse::SparseRowMat<usize, f64>;

pub fn nalgebra2faer(m: CsrMatrix) -> SparseMatrixFaer {
  let nrows = m.nrows();
  let ncols = m.ncols();
  let (row_offsets, col_indices, values) = m.disassemble();

  let symbolic =
    faer::sparse::SymbolicSparseRowMat::new_checked(nrows, ncols, row_offsets, None, col_indices);
  faer::sparse::SparseRowMat::new(symbolic, values)
}

/// Sparse LU factorization, for general (non-symmetric) systems.
pub struct FaerLu {
  raw: faer::sparse::linalg::solvers::Lu<usize, f64>,
}
impl FaerLu {
  pub fn try_new(a: CsrMatrix) -> Result<Self, SolveError> {
    if a.nrows() != a.ncols() {
      return Err(SolveError::NotSquare {
        nrows: a.nrows(),
        ncols: a.ncols(),
      });
    }
    let raw = nalgebra2faer(a)
      .sp_lu()
      .map_err(|err| SolveError::Factorization(format!("{err:?}")))?;
    Ok(Self { raw })
  }

  pub fn solve(&self, b: &Vector) -> Result<Vector, SolveError> {
    let b = faer::Col::from_fn(b.nrows(), |i| b[i]);
    let x = self.raw.solve(b);
    let x = Vector::from_iterator(x.nrows(), x.iter().copied());
    if x.iter().all(|v| v.is_finite()) {
      Ok(x)
    } else {
      Err(SolveError::NonFinite)
    }
  }
}
