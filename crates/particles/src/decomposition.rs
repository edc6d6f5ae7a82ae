use crate::Dim;

/// Splits an axis aligned box into `nparts` slabs of equal width along one
/// axis. Partition `r` owns the `r`-th slab.
///
/// Non-periodic: coordinates outside the box belong to the nearest slab.
#[derive(Debug, Clone, PartialEq)]
pub struct SlabDecomposition {
  lo: Vec<f64>,
  hi: Vec<f64>,
  axis: usize,
  nparts: usize,
}

impl SlabDecomposition {
  pub fn new(lo: Vec<f64>, hi: Vec<f64>, axis: usize, nparts: usize) -> Self {
    assert_eq!(lo.len(), hi.len(), "box corners differ in dimension");
    assert!(axis < lo.len(), "slab axis out of range");
    assert!(nparts > 0, "need at least one part");
    assert!(
      lo.iter().zip(&hi).all(|(l, h)| l < h),
      "box must have positive extent"
    );
    Self {
      lo,
      hi,
      axis,
      nparts,
    }
  }

  /// Splits along the first axis.
  pub fn along_first_axis(lo: Vec<f64>, hi: Vec<f64>, nparts: usize) -> Self {
    Self::new(lo, hi, 0, nparts)
  }

  pub fn dim(&self) -> Dim {
    self.lo.len()
  }
  pub fn nparts(&self) -> usize {
    self.nparts
  }
  pub fn axis(&self) -> usize {
    self.axis
  }

  fn slab_width(&self) -> f64 {
    (self.hi[self.axis] - self.lo[self.axis]) / self.nparts as f64
  }

  /// Extent of slab `part` along the split axis.
  pub fn slab_bounds(&self, part: usize) -> (f64, f64) {
    let width = self.slab_width();
    let lo = self.lo[self.axis] + part as f64 * width;
    (lo, lo + width)
  }

  pub fn owner_of(&self, coord: &[f64]) -> usize {
    debug_assert_eq!(coord.len(), self.dim());
    let rel = (coord[self.axis] - self.lo[self.axis]) / self.slab_width();
    if rel <= 0.0 || !rel.is_finite() {
      0
    } else {
      (rel.floor() as usize).min(self.nparts - 1)
    }
  }

  /// Distance along the split axis from `coord` to the region of `part`.
  ///
  /// The outermost slabs extend to infinity, matching [`Self::owner_of`].
  pub fn distance_to_part(&self, coord: &[f64], part: usize) -> f64 {
    let x = coord[self.axis];
    let (mut lo, mut hi) = self.slab_bounds(part);
    if part == 0 {
      lo = f64::NEG_INFINITY;
    }
    if part + 1 == self.nparts {
      hi = f64::INFINITY;
    }
    if x < lo {
      lo - x
    } else if x > hi {
      x - hi
    } else {
      0.0
    }
  }
}
