pub mod circle_poisson;
