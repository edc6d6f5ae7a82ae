//! Meshfree surface differential operators on scattered particles.
//!
//! Stencils are fitted by weighted least squares in the tangent space of
//! each particle and coupled into one sparse linear system.

extern crate nalgebra as na;

pub mod assemble;
pub mod basis;
pub mod diagnostics;
pub mod error;
pub mod operator;
pub mod problems;
pub mod tangent;

pub use error::DcpseError;
