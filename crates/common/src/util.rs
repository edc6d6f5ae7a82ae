pub trait CumsumExt {
  fn cumsum(self) -> impl Iterator<Item = usize>;
}
impl<I: IntoIterator<Item = usize>> CumsumExt for I {
  fn cumsum(self) -> impl Iterator<Item = usize> {
    self.into_iter().scan(0, |acc, x| {
      *acc += x;
      Some(*acc)
    })
  }
}

/// Exclusive prefix sum: `[3, 1, 2]` gives `[0, 3, 4]`.
pub fn exclusive_offsets(counts: &[usize]) -> Vec<usize> {
  std::iter::once(0)
    .chain(counts.iter().copied().cumsum())
    .take(counts.len())
    .collect()
}

pub fn algebraic_convergence_rate(next: f64, prev: f64) -> f64 {
  let quot: f64 = next / prev;
  -quot.log2()
}

pub fn flags_to_indicies(flags: &[bool]) -> Vec<usize> {
  flags
    .iter()
    .enumerate()
    .filter_map(|(i, &flag)| flag.then_some(i))
    .collect()
}

pub fn sparse_to_dense_data<T>(sparse: Vec<(usize, T)>, len: usize) -> Vec<Option<T>> {
  let mut dense = Vec::from_iter((0..len).map(|_| None));
  sparse.into_iter().for_each(|(i, t)| dense[i] = Some(t));
  dense
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn offsets() {
    assert_eq!(exclusive_offsets(&[3, 1, 2]), vec![0, 3, 4]);
    assert_eq!(exclusive_offsets(&[]), Vec::<usize>::new());
  }

  #[test]
  fn set_flags() {
    let flags = [true, false, false, true, false];
    assert_eq!(flags_to_indicies(&flags), vec![0, 3]);
    assert_eq!(flags_to_indicies(&[false; 3]), Vec::<usize>::new());
  }

  #[test]
  fn second_order_rate() {
    let rate = algebraic_convergence_rate(0.25, 1.0);
    assert!((rate - 2.0).abs() < 1e-12);
  }
}
