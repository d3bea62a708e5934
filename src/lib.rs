//! A TAGE conditional branch predictor for use inside a cycle-level
//! simulator.

pub mod branch;
pub mod history;
pub mod predictor;
pub mod stats;

pub use branch::*;
pub use history::*;
pub use predictor::*;
