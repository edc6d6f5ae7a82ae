//! Surface derivative stencils.
//!
//! For every owned particle the requested embedding space derivative is
//! restricted to the tangent space at that particle and approximated by a
//! weighted least squares fit of neighbor differences $u_j - u_i$ in local
//! tangent coordinates.

use crate::{
  basis::{self, MultiIndex},
  tangent, DcpseError,
};

use common::linalg::nalgebra::{DMatrixExt, Matrix, Vector};
use particles::{neighbors::VerletList, Dim, ParticleIdx, ParticleSet, ScalarAttr};

use indexmap::IndexMap;
use itertools::Itertools;
use rayon::prelude::*;

/// Moment matrices worse conditioned than this are treated as singular.
const MAX_MOMENT_CONDITION: f64 = 1e12;

/// Partial derivative in embedding coordinates, given by its multi-index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceDerivative {
  alpha: MultiIndex,
}

impl SurfaceDerivative {
  pub fn new(exponents: Vec<usize>) -> Result<Self, DcpseError> {
    let alpha = MultiIndex::new(exponents);
    if alpha.order() == 0 {
      return Err(DcpseError::InvalidDerivative(format!(
        "{:?} is of order zero",
        alpha.exponents()
      )));
    }
    Ok(Self { alpha })
  }

  /// $partial_a$
  pub fn first(dim: Dim, a: usize) -> Self {
    assert!(a < dim);
    Self {
      alpha: MultiIndex::from_occurences(dim, [a]),
    }
  }
  /// $partial_a partial_b$
  pub fn second(dim: Dim, a: usize, b: usize) -> Self {
    assert!(a < dim && b < dim);
    Self {
      alpha: MultiIndex::from_occurences(dim, [a, b]),
    }
  }

  pub fn x() -> Self {
    Self::first(2, 0)
  }
  pub fn y() -> Self {
    Self::first(2, 1)
  }
  pub fn xx() -> Self {
    Self::second(2, 0, 0)
  }
  pub fn yy() -> Self {
    Self::second(2, 1, 1)
  }
  pub fn xy() -> Self {
    Self::second(2, 0, 1)
  }

  pub fn dim(&self) -> Dim {
    self.alpha.nvars()
  }
  pub fn order(&self) -> usize {
    self.alpha.order()
  }
  pub fn exponents(&self) -> &[usize] {
    self.alpha.exponents()
  }

  /// Coefficients $c_gamma$ of the derivative restricted to the tangent
  /// space, $partial^alpha = sum_gamma c_gamma partial_xi^gamma$, using
  /// $partial_a = sum_p T_(a p) partial_(xi_p)$.
  ///
  /// Curvature terms of the surface are not included.
  pub fn tangent_coefficients(&self, tangent: &Matrix) -> IndexMap<MultiIndex, f64> {
    let axes = self.alpha.occurences();
    let ntangent = tangent.ncols();

    let mut coeffs = IndexMap::new();
    for tangent_axes in (0..axes.len())
      .map(|_| 0..ntangent)
      .multi_cartesian_product()
    {
      let coeff: f64 = axes
        .iter()
        .zip(&tangent_axes)
        .map(|(&a, &p)| tangent[(a, p)])
        .product();
      let gamma = MultiIndex::from_occurences(ntangent, tangent_axes);
      *coeffs.entry(gamma).or_insert(0.0) += coeff;
    }
    coeffs
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcpseParams {
  /// Convergence order of the approximation.
  pub order: usize,
  /// Characteristic particle spacing $epsilon$. Scales the kernel and the
  /// local coordinates.
  pub spacing: f64,
}
impl Default for DcpseParams {
  fn default() -> Self {
    Self {
      order: 2,
      spacing: 1.0,
    }
  }
}
impl DcpseParams {
  pub fn validate(&self) -> Result<(), DcpseError> {
    if self.order == 0 {
      return Err(DcpseError::InvalidConfig(
        "convergence order must be at least one".into(),
      ));
    }
    if !(self.spacing.is_finite() && self.spacing > 0.0) {
      return Err(DcpseError::InvalidConfig(format!(
        "spacing must be positive, got {}",
        self.spacing
      )));
    }
    Ok(())
  }

  /// Polynomial degree of the fit.
  pub fn degree(&self, derivative: &SurfaceDerivative) -> usize {
    derivative.order() + self.order - 1
  }
}

/// Stencil of one particle. Contains the target itself.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorRow {
  pub target: ParticleIdx,
  pub entries: Vec<(ParticleIdx, f64)>,
}
impl OperatorRow {
  /// `values` is indexed by [`ParticleIdx`], so it must cover the owned and
  /// the halo particles (`size_with_ghost()` entries).
  pub fn apply(&self, values: &[f64]) -> f64 {
    self.entries.iter().map(|&(j, w)| w * values[j]).sum()
  }
}

/// One stencil per owned particle, ordered like the owned particles.
#[derive(Debug, Clone)]
pub struct SurfaceOperator {
  derivative: SurfaceDerivative,
  params: DcpseParams,
  rows: Vec<OperatorRow>,
  /// Owned plus halo particles at construction.
  ncols: usize,
}
impl SurfaceOperator {
  pub fn derivative(&self) -> &SurfaceDerivative {
    &self.derivative
  }
  pub fn params(&self) -> &DcpseParams {
    &self.params
  }
  pub fn rows(&self) -> &[OperatorRow] {
    &self.rows
  }
  pub fn row(&self, i: ParticleIdx) -> &OperatorRow {
    &self.rows[i]
  }
  pub fn nrows(&self) -> usize {
    self.rows.len()
  }
  pub fn ncols(&self) -> usize {
    self.ncols
  }

  /// Approximate derivative at every owned particle, given values for
  /// owned and halo particles.
  pub fn apply(&self, values: &[f64]) -> Result<Vec<f64>, DcpseError> {
    if values.len() != self.ncols {
      return Err(DcpseError::OperatorMismatch(format!(
        "{} values given, stencils refer to {} owned and halo particles",
        values.len(),
        self.ncols
      )));
    }
    Ok(self.rows.iter().map(|row| row.apply(values)).collect())
  }
  pub fn apply_attr(
    &self,
    particles: &ParticleSet,
    attr: ScalarAttr,
  ) -> Result<Vec<f64>, DcpseError> {
    self.apply(&particles.scalar_values(attr))
  }
}

/// Builds the stencils of `derivative` for all owned particles.
///
/// Fails if any particle has fewer neighbors than basis functions, a
/// singular moment matrix or a degenerate normal.
pub fn build_surface_operator(
  particles: &ParticleSet,
  verlet: &VerletList,
  derivative: &SurfaceDerivative,
  params: DcpseParams,
) -> Result<SurfaceOperator, DcpseError> {
  params.validate()?;
  let dim = particles.dim();
  if dim < 2 {
    return Err(DcpseError::InvalidConfig(format!(
      "surface operators need an embedding of dimension two or more, got {dim}"
    )));
  }
  if derivative.dim() != dim {
    return Err(DcpseError::InvalidDerivative(format!(
      "derivative of dimension {} on particles of dimension {dim}",
      derivative.dim()
    )));
  }
  if verlet.len() != particles.size_local() {
    return Err(DcpseError::OperatorMismatch(format!(
      "verlet list has {} entries for {} owned particles",
      verlet.len(),
      particles.size_local()
    )));
  }

  let degree = params.degree(derivative);
  let basis = basis::monomial_basis(dim - 1, degree);

  let rows = particles
    .owned()
    .into_par_iter()
    .map(|i| fit_row(particles, verlet, i, derivative, &basis, params))
    .collect::<Result<Vec<_>, _>>()?;

  tracing::debug!(
    "built {:?} stencils for {} particles, degree {degree}, {} basis functions",
    derivative.exponents(),
    rows.len(),
    basis.len()
  );

  Ok(SurfaceOperator {
    derivative: derivative.clone(),
    params,
    rows,
    ncols: particles.size_with_ghost(),
  })
}

fn fit_row(
  particles: &ParticleSet,
  verlet: &VerletList,
  i: ParticleIdx,
  derivative: &SurfaceDerivative,
  basis: &[MultiIndex],
  params: DcpseParams,
) -> Result<OperatorRow, DcpseError> {
  let particle = particles.gid(i);
  let neighbors: Vec<ParticleIdx> = verlet
    .neighbors(i)
    .iter()
    .copied()
    .filter(|&j| j != i)
    .collect();
  if neighbors.len() < basis.len() {
    return Err(DcpseError::InsufficientNeighbors {
      particle,
      neighbors: neighbors.len(),
      required: basis.len(),
      degree: params.degree(derivative),
    });
  }

  let tangent =
    tangent::tangent_basis(particles.normal(i)).ok_or(DcpseError::DegenerateNormal { particle })?;
  let eps = params.spacing;
  let xi = particles.pos(i);

  // Vandermonde matrix P in scaled tangent coordinates and kernel W.
  let mut vandermonde = Matrix::zeros(neighbors.len(), basis.len());
  let mut kernel = Vector::zeros(neighbors.len());
  for (irow, &j) in neighbors.iter().enumerate() {
    let displacement = particles.pos(j) - xi;
    let r = displacement.norm() / eps;
    kernel[irow] = (-r * r).exp();

    let z = tangent::project(&tangent, &displacement) / eps;
    for (icol, beta) in basis.iter().enumerate() {
      vandermonde[(irow, icol)] = beta.eval_monomial(z.as_slice());
    }
  }

  let mut weighted = vandermonde.clone();
  for (mut row, &w) in weighted.row_iter_mut().zip(kernel.iter()) {
    row *= w;
  }
  let moments = vandermonde.tr_mul(&weighted);
  if !(moments.condition_number() <= MAX_MOMENT_CONDITION) {
    return Err(DcpseError::SingularMoments { particle });
  }
  let moments = moments
    .cholesky()
    .ok_or(DcpseError::SingularMoments { particle })?;

  let scale = eps.powi(-(derivative.order() as i32));
  let mut rhs = Vector::zeros(basis.len());
  for (gamma, coeff) in derivative.tangent_coefficients(&tangent) {
    if let Some(k) = basis.iter().position(|beta| *beta == gamma) {
      rhs[k] = coeff * gamma.factorial() as f64 * scale;
    }
  }

  let weights = weighted * moments.solve(&rhs);
  let self_weight = -weights.sum();

  let entries = std::iter::once((i, self_weight))
    .chain(neighbors.into_iter().zip(weights.iter().copied()))
    .collect();
  Ok(OperatorRow { target: i, entries })
}
