use particles::{
  comm::{Communicator, LocalCluster, SerialComm},
  decomposition::SlabDecomposition,
  io::{read_snapshot, write_frame},
  neighbors::{NeighborConfig, VerletList},
  Attr, ParticleSet, ScalarAttr, Subset,
};

const NPARTICLES: usize = 24;

fn circle(comm: &impl Communicator) -> ParticleSet {
  let mut particles = ParticleSet::new(2);
  if comm.is_root() {
    for i in 0..NPARTICLES {
      let theta = 2.0 * std::f64::consts::PI * i as f64 / NPARTICLES as f64;
      particles.add_at(&[theta.cos(), theta.sin()]);
      particles
        .last_normal_mut()
        .copy_from_slice(&[theta.cos(), theta.sin()]);
      *particles.last_scalar_mut(ScalarAttr::Theta) = theta;
      *particles.last_scalar_mut(ScalarAttr::Field) = 1.0;
      if i == 0 {
        particles.assign_subset(Subset::Boundary);
      }
    }
  }
  particles
}

fn decomposition(nparts: usize) -> SlabDecomposition {
  SlabDecomposition::along_first_axis(vec![-1.5, -1.5], vec![1.5, 1.5], nparts)
}

/// Neighbor thetas of every owned particle, keyed by its own theta.
fn neighbor_thetas(particles: &ParticleSet, verlet: &VerletList) -> Vec<(f64, Vec<f64>)> {
  particles
    .owned()
    .map(|i| {
      let mut thetas: Vec<f64> = verlet
        .neighbors(i)
        .iter()
        .map(|&j| particles.scalar(ScalarAttr::Theta, j))
        .collect();
      thetas.sort_by(f64::total_cmp);
      (particles.scalar(ScalarAttr::Theta, i), thetas)
    })
    .collect()
}

#[test]
fn map_assigns_owners_and_contiguous_ids() {
  let results = LocalCluster::run(2, |comm| {
    let decomp = decomposition(comm.size());
    let mut particles = circle(&comm);
    particles.map(&comm, &decomp).unwrap();
    for i in particles.owned() {
      assert_eq!(decomp.owner_of(particles.pos_slice(i)), comm.rank());
    }
    particles.owned().map(|i| particles.gid(i)).collect::<Vec<_>>()
  });

  let mut gids: Vec<_> = results.iter().flatten().copied().collect();
  assert_eq!(gids.len(), NPARTICLES);
  assert!(results.iter().all(|r| !r.is_empty()));
  assert!(results[0].iter().all(|&g| g < results[0].len()));
  gids.sort_unstable();
  assert_eq!(gids, (0..NPARTICLES).collect::<Vec<_>>());
}

#[test]
fn halo_carries_requested_attributes_only() {
  let width = 0.3;
  LocalCluster::run(2, |comm| {
    let decomp = decomposition(comm.size());
    let mut particles = circle(&comm);
    particles.map(&comm, &decomp).unwrap();
    particles
      .ghost_get(&comm, &decomp, width, &[Attr::Normal])
      .unwrap();

    assert!(particles.nghosts() > 0);
    for g in particles.size_local()..particles.size_with_ghost() {
      assert_ne!(decomp.owner_of(particles.pos_slice(g)), comm.rank());
      assert!(decomp.distance_to_part(particles.pos_slice(g), comm.rank()) <= width);
      assert_eq!(particles.normal(g), particles.pos(g));
      assert_eq!(particles.scalar(ScalarAttr::Field, g), 0.0);
      assert_eq!(particles.scalar(ScalarAttr::Theta, g), 0.0);
    }
  });
}

#[test]
fn distributed_neighbors_match_serial() {
  let cutoff = 0.6;
  let config = NeighborConfig {
    cutoff,
    skip_self: true,
  };

  let mut serial = circle(&SerialComm);
  let decomp = decomposition(1);
  serial.map(&SerialComm, &decomp).unwrap();
  let verlet = VerletList::build(&serial, config).unwrap();
  let mut expected = neighbor_thetas(&serial, &verlet);
  expected.sort_by(|a, b| a.0.total_cmp(&b.0));

  let results = LocalCluster::run(2, |comm| {
    let decomp = decomposition(comm.size());
    let mut particles = circle(&comm);
    particles.map(&comm, &decomp).unwrap();
    particles
      .ghost_get(&comm, &decomp, cutoff, &[ScalarAttr::Theta.into()])
      .unwrap();
    let verlet = VerletList::build(&particles, config).unwrap();
    neighbor_thetas(&particles, &verlet)
  });
  let mut distributed: Vec<_> = results.into_iter().flatten().collect();
  distributed.sort_by(|a, b| a.0.total_cmp(&b.0));

  assert_eq!(distributed, expected);
}

#[test]
fn snapshot_per_partition() {
  let dir = std::env::temp_dir();
  let stem = format!("partitioning_snapshot_{}", std::process::id());
  LocalCluster::run(2, |comm| {
    let decomp = decomposition(comm.size());
    let mut particles = circle(&comm);
    particles.map(&comm, &decomp).unwrap();

    let path = write_frame(&particles, &dir, &stem, comm.rank(), 0).unwrap();
    let restored = read_snapshot(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(restored.size_local(), particles.size_local());
    for i in particles.owned() {
      assert_eq!(restored.record(i), particles.record(i));
    }
  });
}
