use common::linalg::nalgebra::{Matrix, Vector, VectorView};

/// Orthonormal basis (as columns) of the subspace orthogonal to `normal`.
///
/// Spanned by the eigenvectors of the projector $I - n n^T$ with eigenvalue
/// one. `None` for zero or non-finite normals.
pub fn tangent_basis(normal: VectorView) -> Option<Matrix> {
  let dim = normal.len();
  let norm = normal.norm();
  if !norm.is_finite() || norm <= f64::EPSILON {
    return None;
  }
  let n = normal / norm;
  let projector = Matrix::identity(dim, dim) - &n * n.transpose();

  let na::SymmetricEigen {
    eigenvalues,
    eigenvectors,
  } = projector.symmetric_eigen();
  let columns: Vec<Vector> = eigenvalues
    .iter()
    .zip(eigenvectors.column_iter())
    .filter(|(eigenvalue, _)| **eigenvalue > 0.5)
    .map(|(_, eigenvector)| eigenvector.normalize())
    .collect();
  (columns.len() + 1 == dim).then(|| Matrix::from_columns(&columns))
}

/// Local coordinates $T^T (x_j - x_i)$ of a displacement.
pub fn project(tangent: &Matrix, displacement: &Vector) -> Vector {
  tangent.tr_mul(displacement)
}

#[cfg(test)]
mod test {
  use super::*;

  use approx::assert_relative_eq;

  #[test]
  fn orthonormal_and_tangent() {
    for normal in [
      vec![0.6, 0.8],
      vec![-1.0, 0.0],
      vec![0.0, 0.0, 2.0],
      vec![1.0, -2.0, 0.5],
    ] {
      let normal = Vector::from_vec(normal);
      let dim = normal.len();
      let tangent = tangent_basis(normal.as_view()).unwrap();
      assert_eq!(tangent.shape(), (dim, dim - 1));
      assert_relative_eq!(
        tangent.transpose() * &tangent,
        Matrix::identity(dim - 1, dim - 1),
        epsilon = 1e-12
      );
      assert_relative_eq!(
        tangent.tr_mul(&normal).norm(),
        0.0,
        epsilon = 1e-12
      );
    }
  }

  #[test]
  fn projection_along_circle_tangent() {
    let normal = Vector::from_vec(vec![1.0, 0.0]);
    let tangent = tangent_basis(normal.as_view()).unwrap();
    let xi = project(&tangent, &Vector::from_vec(vec![0.3, -0.2]));
    assert_relative_eq!(xi[0].abs(), 0.2, epsilon = 1e-14);
  }

  #[test]
  fn degenerate_normals() {
    assert!(tangent_basis(Vector::zeros(2).as_view()).is_none());
    assert!(tangent_basis(Vector::from_vec(vec![f64::NAN, 1.0]).as_view()).is_none());
  }
}
