//! Error norms against a reference solution.

use particles::{
  comm::{CommError, Communicator, Reductions},
  ParticleSet, ScalarAttr,
};

/// Error norms of one partition, not yet reduced.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PartialNorms {
  pub max_error: f64,
  pub sum_sq: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorNorms {
  /// Square root of the sum of squared pointwise errors.
  pub l2: f64,
  pub linf: f64,
}

impl PartialNorms {
  pub fn merge(self, other: Self) -> Self {
    Self {
      max_error: self.max_error.max(other.max_error),
      sum_sq: self.sum_sq + other.sum_sq,
    }
  }

  /// Sum and max over all partitions, flushed in a single collective.
  pub fn reduce<C: Communicator>(self, comm: &C) -> Result<ErrorNorms, CommError> {
    let mut reductions = Reductions::new();
    let sum_sq = reductions.sum(self.sum_sq);
    let max_error = reductions.max(self.max_error);
    let reduced = comm.execute(reductions)?;
    Ok(ErrorNorms {
      l2: reduced[sum_sq].sqrt(),
      linf: reduced[max_error],
    })
  }
}

/// Pointwise $|u - u_"ref"|$ over the owned particles, stored in
/// `error_attr`.
pub fn compute_errors(
  particles: &mut ParticleSet,
  computed: ScalarAttr,
  reference: ScalarAttr,
  error_attr: ScalarAttr,
) -> PartialNorms {
  let mut norms = PartialNorms::default();
  for i in particles.owned() {
    let error = (particles.scalar(computed, i) - particles.scalar(reference, i)).abs();
    particles.set_scalar(error_attr, i, error);
    norms = norms.merge(PartialNorms {
      max_error: error,
      sum_sq: error * error,
    });
  }
  norms
}

#[cfg(test)]
mod test {
  use super::*;

  use approx::assert_relative_eq;
  use particles::comm::{LocalCluster, SerialComm};

  #[test]
  fn pointwise_errors() {
    let mut particles = ParticleSet::new(1);
    for (u, u_ref) in [(1.0, 1.5), (2.0, 0.0), (-1.0, -1.0)] {
      particles.add_at(&[0.0]);
      *particles.last_scalar_mut(ScalarAttr::Field) = u;
      *particles.last_scalar_mut(ScalarAttr::Analytic) = u_ref;
    }
    let norms = compute_errors(
      &mut particles,
      ScalarAttr::Field,
      ScalarAttr::Analytic,
      ScalarAttr::Error,
    );
    assert_eq!(norms.max_error, 2.0);
    assert_eq!(norms.sum_sq, 4.25);
    assert_eq!(particles.scalar(ScalarAttr::Error, 0), 0.5);

    let global = norms.reduce(&SerialComm).unwrap();
    assert_relative_eq!(global.l2, 4.25f64.sqrt());
    assert_eq!(global.linf, 2.0);
  }

  #[test]
  fn two_partition_reduction() {
    let results = LocalCluster::run(2, |comm| {
      let partial = if comm.rank() == 0 {
        PartialNorms {
          max_error: 1.0,
          sum_sq: 1.0 + 4.0,
        }
      } else {
        PartialNorms {
          max_error: 3.0,
          sum_sq: 9.0 + 0.25,
        }
      };
      partial.reduce(&comm).unwrap()
    });
    for norms in results {
      assert_eq!(norms.linf, 3.0);
      assert_relative_eq!(norms.l2, (1.0f64 + 4.0 + 9.0 + 0.25).sqrt());
    }
  }
}
