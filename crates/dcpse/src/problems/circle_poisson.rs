//! Laplace-Beltrami source problem on the unit circle.
//!
//! $Delta_Gamma u = -k^2 sin(k theta)$ with exact solution $u = sin(k theta)$.
//! The particle at $theta = 0$ is fixed to the exact solution.

use crate::{
  assemble::EquationSystem,
  diagnostics::{self, ErrorNorms},
  operator::{build_surface_operator, DcpseParams, SurfaceDerivative},
  DcpseError,
};

use particles::{
  comm::Communicator,
  decomposition::SlabDecomposition,
  io,
  neighbors::{NeighborConfig, VerletList},
  Attr, ParticleSet, ScalarAttr, Subset,
};

use std::{
  f64::consts::TAU,
  path::PathBuf,
  time::{Duration, Instant},
};

const BOX_LO: f64 = -1.5;
const BOX_HI: f64 = 1.5;
const SNAPSHOT_STEM: &str = "particles";

#[derive(Debug, Clone, PartialEq)]
pub struct CirclePoissonConfig {
  pub nparticles: usize,
  /// Frequency $k$ of the exact solution.
  pub mode: usize,
  /// Convergence order of the surface operators.
  pub order: usize,
  /// Cutoff radius in multiples of the particle spacing.
  pub cutoff_factor: f64,
  /// Snapshots before and after the solve are written here, if given.
  pub output_dir: Option<PathBuf>,
}
impl Default for CirclePoissonConfig {
  fn default() -> Self {
    Self {
      nparticles: 100,
      mode: 4,
      order: 2,
      cutoff_factor: 3.9,
      output_dir: None,
    }
  }
}
impl CirclePoissonConfig {
  pub fn validate(&self) -> Result<(), DcpseError> {
    if self.nparticles < 3 {
      return Err(DcpseError::InvalidConfig(format!(
        "at least 3 particles are needed, got {}",
        self.nparticles
      )));
    }
    if self.order == 0 {
      return Err(DcpseError::InvalidConfig(
        "convergence order must be at least one".into(),
      ));
    }
    if !(self.cutoff_factor.is_finite() && self.cutoff_factor > 0.0) {
      return Err(DcpseError::InvalidConfig(format!(
        "cutoff factor must be positive, got {}",
        self.cutoff_factor
      )));
    }
    Ok(())
  }

  /// Angle between neighboring particles.
  pub fn dtheta(&self) -> f64 {
    TAU / self.nparticles as f64
  }
  /// Arc length between neighboring particles, not the spacing of a grid
  /// over the enclosing box. Kernel width and cutoff scale with it.
  pub fn spacing(&self) -> f64 {
    self.dtheta()
  }
  pub fn cutoff(&self) -> f64 {
    self.cutoff_factor * self.spacing()
  }
  pub fn ghost_width(&self) -> f64 {
    self.cutoff() + self.spacing() / 8.0
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CirclePoissonReport {
  pub nparticles: usize,
  pub dtheta: f64,
  pub spacing: f64,
  pub cutoff: f64,
  /// Particles owned by this partition.
  pub nlocal: usize,
  pub norms: ErrorNorms,
  pub elapsed: Duration,
}

/// Particles on the unit circle, all created by the root partition.
pub fn create_particles<C: Communicator>(config: &CirclePoissonConfig, comm: &C) -> ParticleSet {
  let mut particles = ParticleSet::new(2);
  if !comm.is_root() {
    return particles;
  }

  let k = config.mode as f64;
  for i in 0..config.nparticles {
    let theta = i as f64 * config.dtheta();
    let (sin, cos) = theta.sin_cos();

    particles.add();
    particles.last_pos_mut().copy_from_slice(&[cos, sin]);
    particles.last_normal_mut().copy_from_slice(&[cos, sin]);
    *particles.last_scalar_mut(ScalarAttr::Field) = sin + cos;
    *particles.last_scalar_mut(ScalarAttr::Analytic) = (k * theta).sin();
    *particles.last_scalar_mut(ScalarAttr::Source) = -k.powi(2) * (k * theta).sin();
    *particles.last_scalar_mut(ScalarAttr::Theta) = theta;
    if i == 0 {
      particles.assign_subset(Subset::Boundary);
    }
  }
  particles
}

/// Runs the whole pipeline on every partition of `comm`.
///
/// Returns the report and the owned particles holding the solution in
/// [`ScalarAttr::Field`] and the pointwise error in [`ScalarAttr::Error`].
pub fn solve_circle_poisson<C: Communicator>(
  config: &CirclePoissonConfig,
  comm: &C,
) -> Result<(CirclePoissonReport, ParticleSet), DcpseError> {
  config.validate()?;
  let timer = Instant::now();
  let rank = comm.rank();

  let spacing = config.spacing();
  let cutoff = config.cutoff();
  let decomp =
    SlabDecomposition::along_first_axis(vec![BOX_LO, BOX_LO], vec![BOX_HI, BOX_HI], comm.size());

  let mut particles = create_particles(config, comm);
  if comm.is_root() {
    tracing::info!(
      "n: {} - spacing: {spacing} - cutoff: {cutoff} - dtheta: {}",
      config.nparticles,
      config.dtheta()
    );
  }

  particles.map(comm, &decomp)?;
  tracing::info!("rank {rank}: size {}", particles.size_local());
  if let Some(dir) = &config.output_dir {
    std::fs::create_dir_all(dir)?;
    io::write_frame(&particles, dir, SNAPSHOT_STEM, rank, 0)?;
  }
  particles.ghost_get(
    comm,
    &decomp,
    config.ghost_width(),
    &[Attr::Normal, ScalarAttr::Field.into()],
  )?;

  let verlet = VerletList::build(
    &particles,
    NeighborConfig {
      cutoff,
      skip_self: true,
    },
  )?;
  let params = DcpseParams {
    order: config.order,
    spacing,
  };
  let sdxx = build_surface_operator(&particles, &verlet, &SurfaceDerivative::xx(), params)?;
  let sdyy = build_surface_operator(&particles, &verlet, &SurfaceDerivative::yy(), params)?;

  let bulk = particles.subset_ids(Subset::Bulk);
  let boundary = particles.subset_ids(Subset::Boundary);
  let mut system = EquationSystem::new(&particles);
  system.impose_operator(&[&sdxx, &sdyy], &bulk, ScalarAttr::Source)?;
  system.impose_identity(&boundary, ScalarAttr::Analytic)?;
  let system = system.finalize()?;
  system.solve(&mut particles, ScalarAttr::Field, comm)?;

  let norms = diagnostics::compute_errors(
    &mut particles,
    ScalarAttr::Field,
    ScalarAttr::Analytic,
    ScalarAttr::Error,
  )
  .reduce(comm)?;
  if comm.is_root() {
    tracing::info!("L2: {:.17e} - L_inf: {:.17e}", norms.l2, norms.linf);
  }

  particles.delete_ghost();
  if let Some(dir) = &config.output_dir {
    io::write_final(&particles, dir, SNAPSHOT_STEM, rank)?;
  }

  let report = CirclePoissonReport {
    nparticles: config.nparticles,
    dtheta: config.dtheta(),
    spacing,
    cutoff,
    nlocal: particles.size_local(),
    norms,
    elapsed: timer.elapsed(),
  };
  Ok((report, particles))
}
