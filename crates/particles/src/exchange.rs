//! Redistribution and halo synchronization between partitions.

use crate::{
  comm::{CommError, Communicator},
  decomposition::SlabDecomposition,
  Attr, ParticleRecord, ParticleSet,
};

use common::util::exclusive_offsets;

fn check_parts<C: Communicator>(comm: &C, decomp: &SlabDecomposition) -> Result<(), CommError> {
  if decomp.nparts() != comm.size() {
    return Err(CommError::ShapeMismatch {
      rank: comm.rank(),
      expected: comm.size(),
      got: decomp.nparts(),
    });
  }
  Ok(())
}

impl ParticleSet {
  /// Sends every owned particle to the partition owning its position and
  /// renumbers global ids to `0..N`, ordered by partition.
  ///
  /// Any halo is dropped.
  pub fn map<C: Communicator>(
    &mut self,
    comm: &C,
    decomp: &SlabDecomposition,
  ) -> Result<(), CommError> {
    check_parts(comm, decomp)?;
    self.delete_ghost();

    let mut outgoing: Vec<Vec<ParticleRecord>> = vec![Vec::new(); comm.size()];
    for i in self.owned() {
      outgoing[decomp.owner_of(self.pos_slice(i))].push(self.record(i));
    }
    let mut incoming = comm.all_to_all(outgoing)?;
    incoming.sort_by_key(|record| record.gid);

    let mut mapped = ParticleSet::new(self.dim());
    incoming
      .into_iter()
      .for_each(|record| mapped.push_owned(record));

    let counts = comm.all_gather(mapped.size_local())?;
    let offset = exclusive_offsets(&counts)[comm.rank()];
    for i in mapped.owned() {
      mapped.set_gid(i, offset + i);
    }
    *self = mapped;

    tracing::debug!(
      "rank {}: mapped {} of {} particles",
      comm.rank(),
      self.size_local(),
      counts.iter().sum::<usize>()
    );
    Ok(())
  }

  /// Rebuilds the halo with copies of all particles of other partitions
  /// lying within `width` of this partition's region.
  ///
  /// Positions, global ids and subset tags are always copied. Other
  /// attributes are copied only if listed in `attrs`, else zero.
  pub fn ghost_get<C: Communicator>(
    &mut self,
    comm: &C,
    decomp: &SlabDecomposition,
    width: f64,
    attrs: &[Attr],
  ) -> Result<(), CommError> {
    check_parts(comm, decomp)?;
    self.delete_ghost();

    let mut outgoing: Vec<Vec<ParticleRecord>> = vec![Vec::new(); comm.size()];
    for i in self.owned() {
      let pos = self.pos_slice(i);
      for (part, bucket) in outgoing.iter_mut().enumerate() {
        if part != comm.rank() && decomp.distance_to_part(pos, part) <= width {
          bucket.push(self.record_scoped(i, attrs));
        }
      }
    }
    let incoming = comm.all_to_all(outgoing)?;
    let nghosts = incoming.len();
    incoming
      .into_iter()
      .for_each(|record| self.push_ghost(record));

    tracing::debug!("rank {}: received {} ghosts", comm.rank(), nghosts);
    Ok(())
  }
}
