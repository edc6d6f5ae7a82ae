use crate::{ParticleIdx, ParticleSet};

use itertools::Itertools;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborConfig {
  pub cutoff: f64,
  /// Exclude the particle itself from its own list.
  pub skip_self: bool,
}
impl Default for NeighborConfig {
  fn default() -> Self {
    Self {
      cutoff: 1.0,
      skip_self: true,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("neighbor cutoff must be positive and finite, got {0}")]
pub struct InvalidCutoff(pub f64);

type Cell = Vec<i64>;

fn cell_of(coord: &[f64], edge: f64) -> Cell {
  coord.iter().map(|x| (x / edge).floor() as i64).collect()
}

/// Particles within the cutoff radius of each owned particle.
///
/// Every owned particle queries its own neighborhood, so `j` in the list of
/// `i` does not imply the converse. Halo particles may appear as neighbors
/// but get no list of their own.
#[derive(Debug, Clone)]
pub struct VerletList {
  cutoff: f64,
  lists: Vec<Vec<ParticleIdx>>,
}

impl VerletList {
  pub fn build(particles: &ParticleSet, config: NeighborConfig) -> Result<Self, InvalidCutoff> {
    let NeighborConfig { cutoff, skip_self } = config;
    if !(cutoff.is_finite() && cutoff > 0.0) {
      return Err(InvalidCutoff(cutoff));
    }
    let dim = particles.dim();

    let mut cells: HashMap<Cell, Vec<ParticleIdx>> = HashMap::new();
    for i in 0..particles.size_with_ghost() {
      cells
        .entry(cell_of(particles.pos_slice(i), cutoff))
        .or_default()
        .push(i);
    }

    let cutoff_sq = cutoff * cutoff;
    let lists: Vec<Vec<ParticleIdx>> = particles
      .owned()
      .map(|i| {
        let xi = particles.pos_slice(i);
        let center = cell_of(xi, cutoff);
        let mut list: Vec<ParticleIdx> = (0..dim)
          .map(|_| -1i64..=1)
          .multi_cartesian_product()
          .filter_map(|offset| {
            let cell: Cell = center.iter().zip(&offset).map(|(c, o)| c + o).collect();
            cells.get(&cell)
          })
          .flatten()
          .copied()
          .filter(|&j| !(skip_self && j == i))
          .filter(|&j| {
            let dist_sq: f64 = xi
              .iter()
              .zip(particles.pos_slice(j))
              .map(|(a, b)| (a - b).powi(2))
              .sum();
            dist_sq <= cutoff_sq
          })
          .collect();
        list.sort_unstable();
        list
      })
      .collect();

    let this = Self { cutoff, lists };
    tracing::debug!(
      "built verlet list: {} particles, {} candidates, min {} neighbors",
      this.len(),
      particles.size_with_ghost(),
      this.min_count()
    );
    Ok(this)
  }

  pub fn cutoff(&self) -> f64 {
    self.cutoff
  }
  /// Number of particles with a list (the owned ones).
  pub fn len(&self) -> usize {
    self.lists.len()
  }
  pub fn is_empty(&self) -> bool {
    self.lists.is_empty()
  }
  pub fn neighbors(&self, i: ParticleIdx) -> &[ParticleIdx] {
    &self.lists[i]
  }
  pub fn min_count(&self) -> usize {
    self.lists.iter().map(Vec::len).min().unwrap_or(0)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn brute_force(particles: &ParticleSet, i: ParticleIdx, cutoff: f64) -> Vec<ParticleIdx> {
    (0..particles.size_with_ghost())
      .filter(|&j| j != i && (particles.pos(i) - particles.pos(j)).norm() <= cutoff)
      .collect()
  }

  #[test]
  fn matches_brute_force() {
    let mut particles = ParticleSet::new(2);
    for i in 0..40 {
      let t = i as f64 * 0.37;
      particles.add_at(&[1.3 * t.sin() + 0.1 * t, (2.0 * t).cos() - 0.2]);
    }
    let cutoff = 0.45;
    let verlet = VerletList::build(
      &particles,
      NeighborConfig {
        cutoff,
        skip_self: true,
      },
    )
    .unwrap();
    assert_eq!(verlet.len(), 40);
    for i in 0..40 {
      assert_eq!(verlet.neighbors(i), brute_force(&particles, i, cutoff));
    }
  }

  #[test]
  fn self_included() {
    let mut particles = ParticleSet::new(1);
    particles.add_at(&[0.0]);
    particles.add_at(&[0.5]);
    particles.add_at(&[2.0]);
    let verlet = VerletList::build(
      &particles,
      NeighborConfig {
        cutoff: 1.0,
        skip_self: false,
      },
    )
    .unwrap();
    assert_eq!(verlet.neighbors(0), &[0, 1]);
    assert_eq!(verlet.neighbors(2), &[2]);
    assert_eq!(verlet.min_count(), 1);
  }

  #[test]
  fn ghosts_are_candidates_only() {
    let mut particles = ParticleSet::new(1);
    particles.add_at(&[0.0]);
    let mut ghost = particles.record(0);
    ghost.gid = 1;
    ghost.pos = vec![0.3];
    particles.push_ghost(ghost);

    let verlet = VerletList::build(&particles, NeighborConfig::default()).unwrap();
    assert_eq!(verlet.len(), 1);
    assert_eq!(verlet.neighbors(0), &[1]);
  }

  #[test]
  fn rejects_bad_cutoff() {
    let particles = ParticleSet::new(2);
    let config = NeighborConfig {
      cutoff: 0.0,
      skip_self: true,
    };
    assert_eq!(
      VerletList::build(&particles, config).unwrap_err(),
      InvalidCutoff(0.0)
    );
  }
}
