//! Assembly of particle equations into one sparse linear system.
//!
//! Every owned particle receives exactly one equation: either a sum of
//! operator stencils equal to a source, or an identity fixing its value.

use crate::{operator::SurfaceOperator, DcpseError};

use common::{
  linalg::{
    faer::FaerLu,
    nalgebra::{relative_residual, Vector},
    SolveError,
  },
  sparse::SparseMatrix,
  util,
};
use particles::{comm::Communicator, GlobalIdx, ParticleIdx, ParticleSet, ScalarAttr};

use indexmap::IndexMap;

/// Largest accepted relative residual of the solution.
pub const RESIDUAL_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
enum Equation {
  /// $sum_j a_j u_j = f$
  Operator { entries: Vec<(usize, f64)>, rhs: f64 },
  /// $u = g$
  Identity { value: f64 },
}

/// Collects equations of the owned particles.
pub struct EquationSystem<'a> {
  particles: &'a ParticleSet,
  equations: Vec<Option<Equation>>,
}

impl<'a> EquationSystem<'a> {
  pub fn new(particles: &'a ParticleSet) -> Self {
    Self {
      particles,
      equations: vec![None; particles.size_local()],
    }
  }

  fn claim(&self, i: ParticleIdx) -> Result<(), DcpseError> {
    match self.equations.get(i) {
      None => Err(DcpseError::ParticleOutOfRange {
        index: i,
        len: self.equations.len(),
      }),
      Some(Some(_)) => Err(DcpseError::OverlappingEquation {
        particle: self.particles.gid(i),
      }),
      Some(None) => Ok(()),
    }
  }

  /// For each particle in `rows`: the sum of the stencils of all `terms`
  /// equals the `rhs` attribute.
  pub fn impose_operator(
    &mut self,
    terms: &[&SurfaceOperator],
    rows: &[ParticleIdx],
    rhs: ScalarAttr,
  ) -> Result<(), DcpseError> {
    if terms.is_empty() {
      return Err(DcpseError::OperatorMismatch(
        "an operator equation needs at least one term".into(),
      ));
    }
    if let Some(term) = terms
      .iter()
      .find(|term| term.nrows() != self.particles.size_local())
    {
      return Err(DcpseError::OperatorMismatch(format!(
        "operator has {} rows for {} owned particles",
        term.nrows(),
        self.particles.size_local()
      )));
    }

    for &i in rows {
      self.claim(i)?;
      let mut entries: IndexMap<ParticleIdx, f64> = IndexMap::new();
      for term in terms {
        for &(j, w) in &term.row(i).entries {
          *entries.entry(j).or_insert(0.0) += w;
        }
      }
      self.equations[i] = Some(Equation::Operator {
        entries: entries.into_iter().collect(),
        rhs: self.particles.scalar(rhs, i),
      });
    }
    Ok(())
  }

  /// For each particle in `rows`: the unknown equals the `value` attribute.
  pub fn impose_identity(
    &mut self,
    rows: &[ParticleIdx],
    value: ScalarAttr,
  ) -> Result<(), DcpseError> {
    for &i in rows {
      self.claim(i)?;
      self.equations[i] = Some(Equation::Identity {
        value: self.particles.scalar(value, i),
      });
    }
    Ok(())
  }

  pub fn nimposed(&self) -> usize {
    self.equations.iter().flatten().count()
  }

  /// Checks that every owned particle has an equation.
  pub fn finalize(self) -> Result<AssembledSystem, DcpseError> {
    let missing = util::flags_to_indicies(
      &self
        .equations
        .iter()
        .map(Option::is_none)
        .collect::<Vec<_>>(),
    );
    if let Some(&first) = missing.first() {
      return Err(DcpseError::MissingEquations {
        count: missing.len(),
        first: self.particles.gid(first),
      });
    }

    let particles = self.particles;
    let rows = self
      .equations
      .into_iter()
      .flatten()
      .enumerate()
      .map(|(i, equation)| {
        let equation = match equation {
          Equation::Operator { entries, rhs } => Equation::Operator {
            entries: entries
              .into_iter()
              .map(|(j, w)| (particles.gid(j), w))
              .collect(),
            rhs,
          },
          identity => identity,
        };
        (particles.gid(i), equation)
      })
      .collect();
    Ok(AssembledSystem { rows })
  }
}

/// Equations of all owned particles, indexed by global ids.
#[derive(Debug, Clone)]
pub struct AssembledSystem {
  rows: Vec<(GlobalIdx, Equation)>,
}

impl AssembledSystem {
  pub fn nrows(&self) -> usize {
    self.rows.len()
  }

  /// Solves the global system formed by the equations of all partitions
  /// and writes the solution into `unknown` of the owned particles.
  ///
  /// Rank 0 gathers, factorizes and solves, the solution is broadcast.
  /// Identity equations are written with their prescribed value.
  /// After an error `unknown` is left untouched.
  pub fn solve<C: Communicator>(
    self,
    particles: &mut ParticleSet,
    unknown: ScalarAttr,
    comm: &C,
  ) -> Result<(), DcpseError> {
    if particles.size_local() != self.rows.len() {
      return Err(DcpseError::OperatorMismatch(format!(
        "system has {} equations for {} owned particles",
        self.rows.len(),
        particles.size_local()
      )));
    }

    let gathered = comm.all_gather(self.rows.clone())?;
    let outcome = comm
      .is_root()
      .then(|| solve_global(gathered.into_iter().flatten().collect()));
    let payload = outcome.as_ref().map(|outcome| {
      outcome
        .as_ref()
        .map(|x| x.as_slice().to_vec())
        .map_err(|err| err.to_string())
    });
    let solution = comm.broadcast(payload, 0)?;
    if let Some(Err(err)) = outcome {
      return Err(err);
    }
    let solution = solution.map_err(DcpseError::RootSolve)?;

    for (i, (gid, equation)) in self.rows.iter().enumerate() {
      let value = match equation {
        Equation::Identity { value } => *value,
        Equation::Operator { .. } => solution[*gid],
      };
      particles.set_scalar(unknown, i, value);
    }
    Ok(())
  }
}

fn solve_global(rows: Vec<(GlobalIdx, Equation)>) -> Result<Vector, DcpseError> {
  let n = rows.len();

  let mut equations: Vec<Option<Equation>> = vec![None; n];
  for (gid, equation) in rows {
    // Out of range ids leave a gap, reported below.
    if let Some(slot) = equations.get_mut(gid) {
      if slot.is_some() {
        return Err(DcpseError::OverlappingEquation { particle: gid });
      }
      *slot = Some(equation);
    }
  }
  let missing = util::flags_to_indicies(&equations.iter().map(Option::is_none).collect::<Vec<_>>());
  if let Some(&first) = missing.first() {
    return Err(DcpseError::MissingEquations {
      count: missing.len(),
      first,
    });
  }

  let mut matrix = SparseMatrix::zeros(n, n);
  let mut rhs = Vector::zeros(n);
  let mut fixed = Vec::new();
  for (row, equation) in equations.into_iter().flatten().enumerate() {
    match equation {
      Equation::Operator { entries, rhs: f } => {
        for (col, w) in entries {
          if col >= n {
            return Err(DcpseError::OperatorMismatch(format!(
              "stencil of particle {row} refers to unknown particle {col}"
            )));
          }
          matrix.push(row, col, w);
        }
        rhs[row] = f;
      }
      Equation::Identity { value } => fixed.push((row, value)),
    }
  }
  tracing::info!(
    "assembled {n} equations ({} fixed), {} nonzeros",
    fixed.len(),
    matrix.ntriplets()
  );

  fix_dofs_coeff(&fixed, &mut matrix, &mut rhs);

  let matrix = matrix.to_nalgebra_csr();
  let x = FaerLu::try_new(matrix.clone())?.solve(&rhs)?;
  let residual = relative_residual(&matrix, &x, &rhs);
  if !(residual <= RESIDUAL_TOLERANCE) {
    return Err(
      SolveError::IllConditioned {
        residual,
        tolerance: RESIDUAL_TOLERANCE,
      }
      .into(),
    );
  }
  tracing::info!("solved, relative residual {residual:.3e}");
  Ok(x)
}

/// Fixes the unknowns `dof_coeffs` to the given values.
///
/// Modifies matrix and right-hand side, such that
/// $mat(A_0, 0; 0, I) vec(u_0, u_fixed) = vec(f - A_(0 fixed) g, g)$.
pub fn fix_dofs_coeff(dof_coeffs: &[(usize, f64)], matrix: &mut SparseMatrix, rhs: &mut Vector) {
  let ndofs = matrix.nrows();

  let dof_coeffs_opt = util::sparse_to_dense_data(dof_coeffs.to_vec(), ndofs);
  let dof_coeffs_zeroed =
    Vector::from_iterator(ndofs, dof_coeffs_opt.iter().map(|v| v.unwrap_or(0.0)));

  // Move known columns to the right-hand side.
  *rhs -= matrix.to_nalgebra_csr() * dof_coeffs_zeroed;

  dof_coeffs.iter().for_each(|&(i, v)| rhs[i] = v);

  matrix.set_zero(|r, c| dof_coeffs_opt[r].is_some() || dof_coeffs_opt[c].is_some());
  for &(i, _) in dof_coeffs {
    matrix.push(i, i, 1.0);
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::operator::{build_surface_operator, DcpseParams, SurfaceDerivative};

  use approx::assert_relative_eq;
  use particles::{
    comm::SerialComm,
    neighbors::{NeighborConfig, VerletList},
    Subset,
  };

  /// $u'' = 2$ on $[0, 1]$ with $u(0) = 0$, $u(1) = 1$.
  fn line_problem(npoints: usize) -> (ParticleSet, SurfaceOperator) {
    let h = 1.0 / (npoints - 1) as f64;
    let mut particles = ParticleSet::new(2);
    for k in 0..npoints {
      let t = k as f64 * h;
      particles.add_at(&[t, 0.0]);
      particles.last_normal_mut().copy_from_slice(&[0.0, 1.0]);
      *particles.last_scalar_mut(ScalarAttr::Source) = 2.0;
      *particles.last_scalar_mut(ScalarAttr::Analytic) = t * t;
      if k == 0 || k + 1 == npoints {
        particles.assign_subset(Subset::Boundary);
      }
    }
    let verlet = VerletList::build(
      &particles,
      NeighborConfig {
        cutoff: 3.5 * h,
        skip_self: true,
      },
    )
    .unwrap();
    let params = DcpseParams {
      order: 2,
      spacing: h,
    };
    let op = build_surface_operator(&particles, &verlet, &SurfaceDerivative::xx(), params).unwrap();
    (particles, op)
  }

  #[test]
  fn quadratic_solution_on_line() {
    let (mut particles, op) = line_problem(11);
    let bulk = particles.subset_ids(Subset::Bulk);
    let boundary = particles.subset_ids(Subset::Boundary);

    let mut system = EquationSystem::new(&particles);
    system
      .impose_operator(&[&op], &bulk, ScalarAttr::Source)
      .unwrap();
    system
      .impose_identity(&boundary, ScalarAttr::Analytic)
      .unwrap();
    assert_eq!(system.nimposed(), 11);
    let system = system.finalize().unwrap();
    system
      .solve(&mut particles, ScalarAttr::Field, &SerialComm)
      .unwrap();

    for i in particles.owned() {
      assert_relative_eq!(
        particles.scalar(ScalarAttr::Field, i),
        particles.scalar(ScalarAttr::Analytic, i),
        epsilon = 1e-8
      );
    }
    assert_eq!(
      particles.scalar(ScalarAttr::Field, 10),
      particles.scalar(ScalarAttr::Analytic, 10)
    );
  }

  #[test]
  fn overlap_and_range() {
    let (particles, op) = line_problem(6);
    let mut system = EquationSystem::new(&particles);
    system
      .impose_identity(&[0, 5], ScalarAttr::Analytic)
      .unwrap();
    assert!(matches!(
      system.impose_operator(&[&op], &[1, 2, 5], ScalarAttr::Source),
      Err(DcpseError::OverlappingEquation { particle: 5 })
    ));
    assert!(matches!(
      system.impose_identity(&[6], ScalarAttr::Analytic),
      Err(DcpseError::ParticleOutOfRange { index: 6, len: 6 })
    ));
    assert!(matches!(
      system.impose_operator(&[], &[3], ScalarAttr::Source),
      Err(DcpseError::OperatorMismatch(_))
    ));
  }

  #[test]
  fn gaps_are_reported() {
    let (particles, op) = line_problem(6);
    let mut system = EquationSystem::new(&particles);
    system
      .impose_operator(&[&op, &op], &[1, 2, 3, 4], ScalarAttr::Source)
      .unwrap();
    assert!(matches!(
      system.finalize(),
      Err(DcpseError::MissingEquations { count: 2, first: 0 })
    ));
  }

  #[test]
  fn fixed_dofs_are_eliminated() {
    let mut matrix = SparseMatrix::zeros(3, 3);
    for (r, c, v) in [
      (0, 0, 2.0),
      (0, 1, -1.0),
      (1, 0, -1.0),
      (1, 1, 2.0),
      (1, 2, -1.0),
      (2, 1, -1.0),
      (2, 2, 2.0),
    ] {
      matrix.push(r, c, v);
    }
    let mut rhs = Vector::from_vec(vec![0.0, 1.0, 0.0]);
    fix_dofs_coeff(&[(0, 3.0), (2, -1.0)], &mut matrix, &mut rhs);

    let expected = na::DMatrix::from_row_slice(3, 3, &[1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0]);
    assert_eq!(matrix.to_nalgebra_dense(), expected);
    assert_eq!(rhs, Vector::from_vec(vec![3.0, 1.0 + 3.0 - 1.0, -1.0]));
  }
}
