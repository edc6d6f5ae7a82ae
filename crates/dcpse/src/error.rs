use common::linalg::SolveError;
use particles::{comm::CommError, io::SnapshotError, neighbors::InvalidCutoff, GlobalIdx};

/// Particles are identified by their global id.
#[derive(Debug, thiserror::Error)]
pub enum DcpseError {
  #[error(
    "particle {particle} has {neighbors} neighbors, a degree {degree} fit needs at least {required}"
  )]
  InsufficientNeighbors {
    particle: GlobalIdx,
    neighbors: usize,
    required: usize,
    degree: usize,
  },
  #[error("moment matrix of particle {particle} is singular")]
  SingularMoments { particle: GlobalIdx },
  #[error("particle {particle} has a zero or non-finite normal")]
  DegenerateNormal { particle: GlobalIdx },
  #[error("invalid derivative: {0}")]
  InvalidDerivative(String),
  #[error("operator does not fit the particle set: {0}")]
  OperatorMismatch(String),
  #[error("particle {particle} already has an equation")]
  OverlappingEquation { particle: GlobalIdx },
  #[error("{count} particles have no equation, the first is {first}")]
  MissingEquations { count: usize, first: GlobalIdx },
  #[error("particle index {index} is not owned, only {len} particles are")]
  ParticleOutOfRange { index: usize, len: usize },
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),
  #[error(transparent)]
  Cutoff(#[from] InvalidCutoff),
  #[error("linear solve failed: {0}")]
  Solve(#[from] SolveError),
  #[error("linear solve failed on the root partition: {0}")]
  RootSolve(String),
  #[error("collective failed: {0}")]
  Comm(#[from] CommError),
  #[error("snapshot failed: {0}")]
  Snapshot(#[from] SnapshotError),
  #[error(transparent)]
  Io(#[from] std::io::Error),
}
