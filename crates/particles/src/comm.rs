//! Collectives between partitions.
//!
//! Every collective is built from [`Communicator::all_gather`]. All
//! partitions must issue the same sequence of collective calls.

use std::{
  any::Any,
  ops::Index,
  sync::{Arc, Condvar, Mutex},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommError {
  #[error("exchange state poisoned by a panicking partition")]
  Poisoned,
  #[error("partition {rank} contributed a value of a different type")]
  TypeMismatch { rank: usize },
  #[error("partition {rank} did not contribute to the collective")]
  Disconnected { rank: usize },
  #[error("partition {rank} contributed {got} items, expected {expected}")]
  ShapeMismatch {
    rank: usize,
    expected: usize,
    got: usize,
  },
}

pub trait Communicator {
  fn rank(&self) -> usize;
  fn size(&self) -> usize;

  /// Every partition contributes one value and receives all of them,
  /// indexed by rank.
  fn all_gather<T: Clone + Send + 'static>(&self, local: T) -> Result<Vec<T>, CommError>;

  fn barrier(&self) -> Result<(), CommError> {
    self.all_gather(())?;
    Ok(())
  }

  fn is_root(&self) -> bool {
    self.rank() == 0
  }

  /// `outgoing[r]` is delivered to partition `r`.
  /// Returns the items addressed to this partition, ordered by source rank.
  fn all_to_all<T: Clone + Send + 'static>(
    &self,
    outgoing: Vec<Vec<T>>,
  ) -> Result<Vec<T>, CommError> {
    if outgoing.len() != self.size() {
      return Err(CommError::ShapeMismatch {
        rank: self.rank(),
        expected: self.size(),
        got: outgoing.len(),
      });
    }
    let me = self.rank();
    let all = self.all_gather(outgoing)?;
    let mut incoming = Vec::new();
    for (src, mut buckets) in all.into_iter().enumerate() {
      if buckets.len() != self.size() {
        return Err(CommError::ShapeMismatch {
          rank: src,
          expected: self.size(),
          got: buckets.len(),
        });
      }
      incoming.append(&mut buckets[me]);
    }
    Ok(incoming)
  }

  /// The value held by `root` is returned on every partition.
  fn broadcast<T: Clone + Send + 'static>(
    &self,
    value: Option<T>,
    root: usize,
  ) -> Result<T, CommError> {
    self
      .all_gather(value)?
      .swap_remove(root)
      .ok_or(CommError::Disconnected { rank: root })
  }

  /// Flushes all queued reductions in a single collective.
  fn execute(&self, reductions: Reductions) -> Result<Reduced, CommError> {
    let (ops, local): (Vec<_>, Vec<_>) = reductions.ops.into_iter().unzip();
    let nops = ops.len();
    let all = self.all_gather(local)?;
    let mut values = Vec::with_capacity(nops);
    for (i, op) in ops.into_iter().enumerate() {
      let mut acc = op.identity();
      for (rank, contribution) in all.iter().enumerate() {
        let v = contribution.get(i).ok_or(CommError::ShapeMismatch {
          rank,
          expected: nops,
          got: contribution.len(),
        })?;
        acc = op.apply(acc, *v);
      }
      values.push(acc);
    }
    Ok(Reduced { values })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
  Sum,
  Max,
}
impl ReduceOp {
  fn identity(self) -> f64 {
    match self {
      Self::Sum => 0.0,
      Self::Max => f64::NEG_INFINITY,
    }
  }
  fn apply(self, acc: f64, v: f64) -> f64 {
    match self {
      Self::Sum => acc + v,
      Self::Max => acc.max(v),
    }
  }
}

/// Scalar reductions queued for a single [`Communicator::execute`].
#[derive(Debug, Default, Clone)]
pub struct Reductions {
  ops: Vec<(ReduceOp, f64)>,
}
impl Reductions {
  pub fn new() -> Self {
    Self::default()
  }
  pub fn sum(&mut self, local: f64) -> ReductionHandle {
    self.push(ReduceOp::Sum, local)
  }
  pub fn max(&mut self, local: f64) -> ReductionHandle {
    self.push(ReduceOp::Max, local)
  }
  fn push(&mut self, op: ReduceOp, local: f64) -> ReductionHandle {
    self.ops.push((op, local));
    ReductionHandle(self.ops.len() - 1)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReductionHandle(usize);

#[derive(Debug, Clone)]
pub struct Reduced {
  values: Vec<f64>,
}
impl Index<ReductionHandle> for Reduced {
  type Output = f64;
  fn index(&self, handle: ReductionHandle) -> &f64 {
    &self.values[handle.0]
  }
}

/// The whole particle set lives in one partition.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialComm;
impl Communicator for SerialComm {
  fn rank(&self) -> usize {
    0
  }
  fn size(&self) -> usize {
    1
  }
  fn all_gather<T: Clone + Send + 'static>(&self, local: T) -> Result<Vec<T>, CommError> {
    Ok(vec![local])
  }
}

struct Exchange {
  size: usize,
  slots: Mutex<Vec<Option<Box<dyn Any + Send>>>>,
  rendezvous: Mutex<Rendezvous>,
  arrivals: Condvar,
}

#[derive(Debug, Default)]
struct Rendezvous {
  arrived: usize,
  generation: u64,
  /// First partition that dropped its communicator.
  departed: Option<usize>,
}

impl Exchange {
  /// Blocks until all partitions arrived. Fails once a partition left, so
  /// peers of a failed partition do not wait forever.
  fn wait(&self) -> Result<(), CommError> {
    let mut state = self.rendezvous.lock().map_err(|_| CommError::Poisoned)?;
    if let Some(rank) = state.departed {
      return Err(CommError::Disconnected { rank });
    }
    let generation = state.generation;
    state.arrived += 1;
    if state.arrived == self.size {
      state.arrived = 0;
      state.generation += 1;
      self.arrivals.notify_all();
      return Ok(());
    }
    while state.generation == generation && state.departed.is_none() {
      state = self
        .arrivals
        .wait(state)
        .map_err(|_| CommError::Poisoned)?;
    }
    match state.departed {
      Some(rank) if state.generation == generation => Err(CommError::Disconnected { rank }),
      _ => Ok(()),
    }
  }

  fn depart(&self, rank: usize) {
    let mut state = match self.rendezvous.lock() {
      Ok(state) => state,
      Err(poisoned) => poisoned.into_inner(),
    };
    state.departed.get_or_insert(rank);
    self.arrivals.notify_all();
  }
}

/// Partition of a [`LocalCluster`], backed by shared memory.
pub struct LocalComm {
  rank: usize,
  size: usize,
  exchange: Arc<Exchange>,
}
impl LocalComm {
  fn gathered<T: Clone + 'static>(&self) -> Result<Vec<T>, CommError> {
    let slots = self
      .exchange
      .slots
      .lock()
      .map_err(|_| CommError::Poisoned)?;
    slots
      .iter()
      .enumerate()
      .map(|(rank, slot)| {
        let value: &(dyn Any + Send) = slot
          .as_deref()
          .ok_or(CommError::Disconnected { rank })?;
        value
          .downcast_ref::<T>()
          .cloned()
          .ok_or(CommError::TypeMismatch { rank })
      })
      .collect()
  }
}
impl Communicator for LocalComm {
  fn rank(&self) -> usize {
    self.rank
  }
  fn size(&self) -> usize {
    self.size
  }

  fn all_gather<T: Clone + Send + 'static>(&self, local: T) -> Result<Vec<T>, CommError> {
    // Both rendezvous must be reached, also on error.
    let deposited = match self.exchange.slots.lock() {
      Ok(mut slots) => {
        slots[self.rank] = Some(Box::new(local));
        Ok(())
      }
      Err(_) => Err(CommError::Poisoned),
    };
    self.exchange.wait()?;
    let gathered = deposited.and_then(|()| self.gathered());
    self.exchange.wait()?;
    gathered
  }
}

impl Drop for LocalComm {
  fn drop(&mut self) {
    self.exchange.depart(self.rank);
  }
}

/// Runs partitions as scoped threads of this process.
pub struct LocalCluster;
impl LocalCluster {
  /// Calls `f` once per partition and returns the results ordered by rank.
  ///
  /// A partition leaves the cluster when `f` returns or panics. Collectives
  /// of the remaining partitions then fail with [`CommError::Disconnected`].
  /// A panic in any partition is propagated once all partitions finished.
  pub fn run<F, R>(size: usize, f: F) -> Vec<R>
  where
    F: Fn(LocalComm) -> R + Sync,
    R: Send,
  {
    assert!(size > 0, "cluster needs at least one partition");
    let exchange = Arc::new(Exchange {
      slots: Mutex::new((0..size).map(|_| None).collect()),
      size,
      rendezvous: Mutex::new(Rendezvous::default()),
      arrivals: Condvar::new(),
    });
    let f = &f;
    std::thread::scope(|scope| {
      let handles: Vec<_> = (0..size)
        .map(|rank| {
          let comm = LocalComm {
            rank,
            size,
            exchange: Arc::clone(&exchange),
          };
          scope.spawn(move || f(comm))
        })
        .collect();
      handles
        .into_iter()
        .map(|handle| match handle.join() {
          Ok(r) => r,
          Err(payload) => std::panic::resume_unwind(payload),
        })
        .collect()
    })
  }
}
