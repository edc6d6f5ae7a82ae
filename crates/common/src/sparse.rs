use crate::linalg::nalgebra::{CooMatrix, CsrMatrix, Matrix};

/// Triplet accumulator for sparse matrices.
///
/// Entries with equal `(row, col)` are summed when converting.
#[derive(Default, Debug, Clone)]
pub struct SparseMatrix {
  nrows: usize,
  ncols: usize,
  triplets: Vec<(usize, usize, f64)>,
}

impl SparseMatrix {
  pub fn zeros(nrows: usize, ncols: usize) -> Self {
    Self::new(nrows, ncols, Vec::new())
  }
  pub fn new(nrows: usize, ncols: usize, triplets: Vec<(usize, usize, f64)>) -> Self {
    Self {
      nrows,
      ncols,
      triplets,
    }
  }

  pub fn nrows(&self) -> usize {
    self.nrows
  }
  pub fn ncols(&self) -> usize {
    self.ncols
  }
  pub fn triplets(&self) -> &[(usize, usize, f64)] {
    &self.triplets
  }
  pub fn ntriplets(&self) -> usize {
    self.triplets.len()
  }

  pub fn push(&mut self, r: usize, c: usize, v: f64) {
    assert!(r < self.nrows() && c < self.ncols());
    if v != 0.0 {
      self.triplets.push((r, c, v));
    }
  }

  pub fn set_zero<F>(&mut self, predicate: F)
  where
    F: Fn(usize, usize) -> bool,
  {
    let mut i = 0;
    while i < self.triplets.len() {
      let (r, c, _) = self.triplets[i];
      if predicate(r, c) {
        self.triplets.swap_remove(i);
      } else {
        i += 1;
      }
    }
  }

  pub fn to_nalgebra_coo(&self) -> CooMatrix {
    let mut coo = CooMatrix::new(self.nrows, self.ncols);
    for &(r, c, v) in &self.triplets {
      coo.push(r, c, v);
    }
    coo
  }

  pub fn to_nalgebra_csr(&self) -> CsrMatrix {
    (&self.to_nalgebra_coo()).into()
  }

  pub fn to_nalgebra_dense(&self) -> Matrix {
    (&self.to_nalgebra_coo()).into()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn duplicates_are_summed() {
    let mut mat = SparseMatrix::zeros(2, 2);
    mat.push(0, 1, 1.5);
    mat.push(0, 1, 2.0);
    mat.push(1, 0, 0.0);
    assert_eq!(mat.ntriplets(), 2);

    let csr = mat.to_nalgebra_csr();
    assert_eq!(csr.nnz(), 1);
    assert_eq!(mat.to_nalgebra_dense()[(0, 1)], 3.5);
  }

  #[test]
  fn set_zero_removes_rows_and_cols() {
    let mut mat = SparseMatrix::zeros(3, 3);
    for i in 0..3 {
      for j in 0..3 {
        mat.push(i, j, 1.0 + (i * 3 + j) as f64);
      }
    }
    mat.set_zero(|r, c| r == 1 || c == 1);
    assert_eq!(mat.ntriplets(), 4);
    assert!(mat.triplets().iter().all(|&(r, c, _)| r != 1 && c != 1));
  }
}
