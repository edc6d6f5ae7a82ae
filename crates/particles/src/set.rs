use crate::{CoordRef, Dim, GlobalIdx, ParticleIdx};

use std::ops::Range;

/// Scalar per-particle attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarAttr {
  /// The unknown field.
  Field,
  /// Right-hand side of the PDE.
  Source,
  /// Analytic reference solution.
  Analytic,
  /// Pointwise error against the reference.
  Error,
  /// Parametric coordinate on the curve.
  Theta,
}
impl ScalarAttr {
  pub const COUNT: usize = 5;
  pub const ALL: [Self; Self::COUNT] = [
    Self::Field,
    Self::Source,
    Self::Analytic,
    Self::Error,
    Self::Theta,
  ];

  pub fn index(self) -> usize {
    self as usize
  }
  pub fn name(self) -> &'static str {
    match self {
      Self::Field => "f",
      Self::Source => "Df",
      Self::Analytic => "AnaDf",
      Self::Error => "error",
      Self::Theta => "Theta",
    }
  }
}

/// Any named attribute, used to scope halo synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
  Scalar(ScalarAttr),
  Normal,
}
impl From<ScalarAttr> for Attr {
  fn from(attr: ScalarAttr) -> Self {
    Self::Scalar(attr)
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subset {
  /// Governed by the differential operator.
  #[default]
  Bulk,
  /// Carries a prescribed value.
  Boundary,
}

/// Self-contained copy of one particle, as exchanged between partitions
/// and stored in snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleRecord {
  pub gid: GlobalIdx,
  pub pos: Vec<f64>,
  pub normal: Vec<f64>,
  pub scalars: [f64; ScalarAttr::COUNT],
  pub subset: Subset,
}

/// Particles owned by this partition, followed by a read-only halo of
/// copies owned by other partitions.
///
/// Owned particles occupy `0..size_local()`, the halo follows.
#[derive(Debug, Clone)]
pub struct ParticleSet {
  dim: Dim,
  nowned: usize,
  gids: Vec<GlobalIdx>,
  positions: Vec<f64>,
  normals: Vec<f64>,
  scalars: Vec<[f64; ScalarAttr::COUNT]>,
  subsets: Vec<Subset>,
}

// constructors
impl ParticleSet {
  pub fn new(dim: Dim) -> Self {
    Self {
      dim,
      nowned: 0,
      gids: Vec::new(),
      positions: Vec::new(),
      normals: Vec::new(),
      scalars: Vec::new(),
      subsets: Vec::new(),
    }
  }

  /// Appends an owned particle at the origin with default attributes.
  ///
  /// The halo is a cache of other partitions' particles and is dropped.
  pub fn add(&mut self) -> ParticleIdx {
    self.delete_ghost();
    let idx = self.nowned;
    self.gids.push(idx);
    self.positions.extend(std::iter::repeat(0.0).take(self.dim));
    self.normals.extend(std::iter::repeat(0.0).take(self.dim));
    self.scalars.push([0.0; ScalarAttr::COUNT]);
    self.subsets.push(Subset::default());
    self.nowned += 1;
    idx
  }

  pub fn add_at(&mut self, coord: &[f64]) -> ParticleIdx {
    assert_eq!(coord.len(), self.dim, "coordinate has wrong dimension");
    let idx = self.add();
    self.pos_mut(idx).copy_from_slice(coord);
    idx
  }

  pub(crate) fn push_owned(&mut self, record: ParticleRecord) {
    debug_assert_eq!(self.nghosts(), 0);
    self.push_record(record);
    self.nowned += 1;
  }

  pub(crate) fn push_ghost(&mut self, record: ParticleRecord) {
    self.push_record(record);
  }

  fn push_record(&mut self, record: ParticleRecord) {
    assert_eq!(record.pos.len(), self.dim);
    assert_eq!(record.normal.len(), self.dim);
    self.gids.push(record.gid);
    self.positions.extend_from_slice(&record.pos);
    self.normals.extend_from_slice(&record.normal);
    self.scalars.push(record.scalars);
    self.subsets.push(record.subset);
  }

  pub(crate) fn set_gid(&mut self, i: ParticleIdx, gid: GlobalIdx) {
    self.gids[i] = gid;
  }

  /// Drops all halo particles.
  pub fn delete_ghost(&mut self) {
    let n = self.nowned;
    self.gids.truncate(n);
    self.positions.truncate(n * self.dim);
    self.normals.truncate(n * self.dim);
    self.scalars.truncate(n);
    self.subsets.truncate(n);
  }
}

// getters
impl ParticleSet {
  pub fn dim(&self) -> Dim {
    self.dim
  }
  /// Number of owned particles.
  pub fn size_local(&self) -> usize {
    self.nowned
  }
  /// Number of owned plus halo particles.
  pub fn size_with_ghost(&self) -> usize {
    self.gids.len()
  }
  pub fn nghosts(&self) -> usize {
    self.size_with_ghost() - self.nowned
  }
  pub fn is_ghost(&self, i: ParticleIdx) -> bool {
    i >= self.nowned
  }
  pub fn owned(&self) -> Range<ParticleIdx> {
    0..self.nowned
  }

  pub fn gid(&self, i: ParticleIdx) -> GlobalIdx {
    self.gids[i]
  }

  pub fn pos(&self, i: ParticleIdx) -> CoordRef {
    CoordRef::from_slice(self.pos_slice(i), self.dim)
  }
  pub fn pos_slice(&self, i: ParticleIdx) -> &[f64] {
    &self.positions[i * self.dim..(i + 1) * self.dim]
  }
  pub fn pos_mut(&mut self, i: ParticleIdx) -> &mut [f64] {
    &mut self.positions[i * self.dim..(i + 1) * self.dim]
  }

  pub fn normal(&self, i: ParticleIdx) -> CoordRef {
    CoordRef::from_slice(&self.normals[i * self.dim..(i + 1) * self.dim], self.dim)
  }
  pub fn normal_mut(&mut self, i: ParticleIdx) -> &mut [f64] {
    &mut self.normals[i * self.dim..(i + 1) * self.dim]
  }

  pub fn scalar(&self, attr: ScalarAttr, i: ParticleIdx) -> f64 {
    self.scalars[i][attr.index()]
  }
  pub fn scalar_mut(&mut self, attr: ScalarAttr, i: ParticleIdx) -> &mut f64 {
    &mut self.scalars[i][attr.index()]
  }
  pub fn set_scalar(&mut self, attr: ScalarAttr, i: ParticleIdx, value: f64) {
    *self.scalar_mut(attr, i) = value;
  }
  /// Values of a scalar attribute for owned and halo particles.
  pub fn scalar_values(&self, attr: ScalarAttr) -> Vec<f64> {
    self.scalars.iter().map(|s| s[attr.index()]).collect()
  }

  pub fn subset(&self, i: ParticleIdx) -> Subset {
    self.subsets[i]
  }
  pub fn set_subset(&mut self, i: ParticleIdx, subset: Subset) {
    self.subsets[i] = subset;
  }
  /// Owned particles carrying the subset tag.
  pub fn subset_ids(&self, subset: Subset) -> Vec<ParticleIdx> {
    self
      .owned()
      .filter(|&i| self.subsets[i] == subset)
      .collect()
  }

  /// A copy of particle `i` carrying only the listed attributes.
  /// Position, gid and subset are always included, the rest is zeroed.
  pub fn record_scoped(&self, i: ParticleIdx, attrs: &[Attr]) -> ParticleRecord {
    let mut record = self.record(i);
    if !attrs.contains(&Attr::Normal) {
      record.normal.iter_mut().for_each(|v| *v = 0.0);
    }
    for attr in ScalarAttr::ALL {
      if !attrs.contains(&Attr::Scalar(attr)) {
        record.scalars[attr.index()] = 0.0;
      }
    }
    record
  }

  pub fn record(&self, i: ParticleIdx) -> ParticleRecord {
    ParticleRecord {
      gid: self.gids[i],
      pos: self.pos_slice(i).to_vec(),
      normal: self.normals[i * self.dim..(i + 1) * self.dim].to_vec(),
      scalars: self.scalars[i],
      subset: self.subsets[i],
    }
  }
}

/// Accessors for the most recently added particle.
///
/// All of them panic if no particle was added yet.
impl ParticleSet {
  fn last(&self) -> ParticleIdx {
    assert!(self.nowned > 0, "particle set is empty");
    self.nowned - 1
  }

  pub fn last_pos_mut(&mut self) -> &mut [f64] {
    let i = self.last();
    self.pos_mut(i)
  }
  pub fn last_normal_mut(&mut self) -> &mut [f64] {
    let i = self.last();
    self.normal_mut(i)
  }
  pub fn last_scalar_mut(&mut self, attr: ScalarAttr) -> &mut f64 {
    let i = self.last();
    self.scalar_mut(attr, i)
  }
  pub fn assign_subset(&mut self, subset: Subset) {
    let i = self.last();
    self.subsets[i] = subset;
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn add_and_tag() {
    let mut particles = ParticleSet::new(2);
    for i in 0..4 {
      particles.add();
      particles.last_pos_mut().copy_from_slice(&[i as f64, 0.0]);
      *particles.last_scalar_mut(ScalarAttr::Field) = 2.0 * i as f64;
      if i == 0 {
        particles.assign_subset(Subset::Boundary);
      }
    }

    assert_eq!(particles.size_local(), 4);
    assert_eq!(particles.size_with_ghost(), 4);
    assert_eq!(particles.subset_ids(Subset::Boundary), vec![0]);
    assert_eq!(particles.subset_ids(Subset::Bulk), vec![1, 2, 3]);
    assert_eq!(particles.scalar(ScalarAttr::Field, 3), 6.0);
    assert_eq!(particles.pos(2)[0], 2.0);
    assert_eq!(particles.gid(3), 3);
  }

  #[test]
  fn halo_is_dropped_on_add() {
    let mut particles = ParticleSet::new(1);
    particles.add_at(&[0.5]);
    let mut ghost = particles.record(0);
    ghost.gid = 7;
    particles.push_ghost(ghost);
    assert_eq!(particles.nghosts(), 1);
    assert!(particles.is_ghost(1));
    assert!(particles.subset_ids(Subset::Bulk).iter().all(|&i| i < 1));

    particles.add_at(&[1.0]);
    assert_eq!(particles.nghosts(), 0);
    assert_eq!(particles.size_local(), 2);
  }

  #[test]
  fn scoped_record_defaults_unlisted() {
    let mut particles = ParticleSet::new(2);
    particles.add_at(&[1.0, 2.0]);
    particles.last_normal_mut().copy_from_slice(&[0.0, 1.0]);
    *particles.last_scalar_mut(ScalarAttr::Field) = 3.0;
    *particles.last_scalar_mut(ScalarAttr::Source) = 4.0;

    let record = particles.record_scoped(0, &[Attr::Normal, ScalarAttr::Field.into()]);
    assert_eq!(record.normal, vec![0.0, 1.0]);
    assert_eq!(record.scalars[ScalarAttr::Field.index()], 3.0);
    assert_eq!(record.scalars[ScalarAttr::Source.index()], 0.0);
    assert_eq!(record.pos, vec![1.0, 2.0]);
  }
}
