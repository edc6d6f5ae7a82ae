//! Linear algebra plumbing shared by the particle and operator crates.

extern crate nalgebra as na;
extern crate nalgebra_sparse as nas;

pub mod linalg;
pub mod sparse;
pub mod util;

pub type Dim = usize;
