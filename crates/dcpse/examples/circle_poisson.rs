//! Solves $Delta_Gamma u = -k^2 sin(k theta)$ on the unit circle
//! for increasing particle counts and reports the convergence rate.

use common::util::algebraic_convergence_rate;
use dcpse::problems::circle_poisson::{solve_circle_poisson, CirclePoissonConfig};
use particles::comm::SerialComm;

use std::path::PathBuf;

fn main() {
  tracing_subscriber::fmt::init();

  let output_dir: Option<PathBuf> = std::env::args().nth(1).map(Into::into);

  fn print_seperator() {
    let nchar = 98;
    println!("{}", "-".repeat(nchar));
  }

  print_seperator();
  println!(
    "| {:>5} | {:>10} | {:>32} | {:>32} | {:>5} |",
    "n", "dtheta", "L2 error", "L_inf error", "rate"
  );
  print_seperator();

  let mut prev_error = None;
  for nparticles in [50, 100, 200, 400] {
    let config = CirclePoissonConfig {
      nparticles,
      output_dir: output_dir
        .as_ref()
        .map(|dir| dir.join(format!("n{nparticles}"))),
      ..Default::default()
    };

    let report = match solve_circle_poisson(&config, &SerialComm) {
      Ok((report, _)) => report,
      Err(err) => {
        tracing::error!("circle poisson with {nparticles} particles failed: {err}");
        std::process::exit(1);
      }
    };

    let l2 = report.norms.l2;
    let conv_rate = prev_error
      .map(|prev| algebraic_convergence_rate(l2, prev))
      .unwrap_or(f64::INFINITY);
    prev_error = Some(l2);

    println!(
      "| {:>5} | {:>10.3e} | {:>32.30} | {:>32.30} | {:>5.2} |",
      report.nparticles, report.dtheta, l2, report.norms.linf, conv_rate
    );
    tracing::info!("solved in {:?}", report.elapsed);
  }
  print_seperator();
}
