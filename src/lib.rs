mod binning;
pub mod config;
pub mod data;
pub mod errors;
pub mod eval;
pub mod executor;
pub mod gradient;
pub mod gradientbooster;
mod histogram;
pub mod krr;
pub mod learner;
pub mod linear;
pub mod metric;
pub mod objective;
mod splitter;
pub mod tree;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::{BoosterConfig, InitPolicy};
pub use data::{Matrix, OutputMatrix};
pub use errors::BoostError;
pub use eval::{EvalResult, EvalSet};
pub use gradientbooster::GradientBooster;
pub use learner::{BaseLearner, BaseModel};
