//! Feasibility surrogate: GP regression over signed margins.

pub mod gpr;
pub mod normalize;

pub use gpr::{GaussianProcess, GprConfig};
pub use normalize::{normal_cdf, split_normalize};
