//! Monomial bases in local tangent coordinates.

use itertools::Itertools;

pub fn binomial(n: usize, k: usize) -> usize {
  num_integer::binomial(n, k)
}
pub fn factorial(num: usize) -> usize {
  (1..=num).product()
}

/// Exponent per coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MultiIndex(Vec<usize>);

impl MultiIndex {
  pub fn new(exponents: Vec<usize>) -> Self {
    Self(exponents)
  }
  /// The multi-index counting how often each of `nvars` coordinates occurs.
  pub fn from_occurences(nvars: usize, vars: impl IntoIterator<Item = usize>) -> Self {
    let mut exponents = vec![0; nvars];
    vars.into_iter().for_each(|v| exponents[v] += 1);
    Self(exponents)
  }

  pub fn nvars(&self) -> usize {
    self.0.len()
  }
  pub fn exponents(&self) -> &[usize] {
    &self.0
  }
  pub fn order(&self) -> usize {
    self.0.iter().sum()
  }
  /// $alpha! = alpha_1! dots alpha_n!$
  pub fn factorial(&self) -> usize {
    self.0.iter().map(|&e| factorial(e)).product()
  }

  pub fn eval_monomial(&self, coord: &[f64]) -> f64 {
    debug_assert_eq!(coord.len(), self.nvars());
    self
      .0
      .iter()
      .zip(coord)
      .map(|(&e, x)| x.powi(e as i32))
      .product()
  }

  /// Coordinates with multiplicity, e.g. `[2, 1]` gives `[0, 0, 1]`.
  pub fn occurences(&self) -> Vec<usize> {
    self
      .0
      .iter()
      .enumerate()
      .flat_map(|(var, &e)| std::iter::repeat(var).take(e))
      .collect()
  }
}

/// All monomials in `nvars` variables of total degree `1..=degree`,
/// ordered by degree.
///
/// The constant is left out: stencils are fitted to differences.
pub fn monomial_basis(nvars: usize, degree: usize) -> Vec<MultiIndex> {
  (1..=degree)
    .flat_map(|d| {
      (0..nvars)
        .map(|_| 0..=d)
        .multi_cartesian_product()
        .filter(move |exps| exps.iter().sum::<usize>() == d)
        .map(MultiIndex)
    })
    .collect()
}

pub fn basis_size(nvars: usize, degree: usize) -> usize {
  binomial(nvars + degree, nvars) - 1
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn basis_sizes() {
    for nvars in 1..=3 {
      for degree in 1..=4 {
        assert_eq!(
          monomial_basis(nvars, degree).len(),
          basis_size(nvars, degree)
        );
      }
    }
    assert_eq!(basis_size(1, 3), 3);
    assert_eq!(basis_size(2, 3), 9);
  }

  #[test]
  fn graded_order() {
    let basis = monomial_basis(2, 2);
    let orders: Vec<_> = basis.iter().map(MultiIndex::order).collect();
    assert_eq!(orders, vec![1, 1, 2, 2, 2]);
    assert!(basis.contains(&MultiIndex::new(vec![1, 1])));
  }

  #[test]
  fn monomials() {
    let alpha = MultiIndex::new(vec![2, 1]);
    assert_eq!(alpha.factorial(), 2);
    assert_eq!(alpha.occurences(), vec![0, 0, 1]);
    assert_eq!(MultiIndex::from_occurences(2, [1, 0, 0]), alpha);
    assert_eq!(alpha.eval_monomial(&[3.0, -2.0]), -18.0);
  }
}
