//! Particle container for meshfree discretizations.
//!
//! - Owned particles with typed per-particle attributes and subset tags.
//! - Partitioning across workers: redistribution and halo (ghost) exchange.
//! - Cutoff-radius neighbor lists.
//! - Binary snapshots.

extern crate nalgebra as na;

pub mod comm;
pub mod decomposition;
pub mod exchange;
pub mod io;
pub mod neighbors;
pub mod set;

pub use common::Dim;
pub use set::{Attr, ParticleRecord, ParticleSet, ScalarAttr, Subset};

/// Index into the local storage of a [`ParticleSet`] (owned and halo).
pub type ParticleIdx = usize;
/// Partition independent identifier of a particle.
pub type GlobalIdx = usize;

pub type CoordRef<'a> = na::DVectorView<'a, f64>;
